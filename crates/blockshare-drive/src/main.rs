use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::debug;

use blockshare_auth::{AuthClient, AuthConfig, RegisterForm};
use blockshare_core::{Address, CONTRACT_ADDRESS_KEY, ClientStore, SigningProvider};
use blockshare_drive::cli::{Cli, Command};
use blockshare_drive::{
    Drive, DriveConfig, GalleryResolver, HttpContentProbe, ItemState, SelectedFile, UploadEvent,
    UploadPipeline,
};
use blockshare_evm::{EvmBinder, LocalWalletProvider, SharedWallet};
use blockshare_logging::{BlockShareSubscriberBuilder, LogConfig, SessionContextGuard};
use blockshare_registry::{GatewayFactory, resolve_contract_address};
use blockshare_session::SessionNegotiator;
use blockshare_storage::{ImageCompressor, PinataClient, RedbClientStore};

const PROBE_TIMEOUT: Duration = Duration::from_secs(20);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_config = match &cli.log_dir {
        Some(dir) => LogConfig::production(dir.clone()),
        None => LogConfig::development(),
    };
    let _log_guard = BlockShareSubscriberBuilder::new()
        .with_config(log_config)
        .with_level(cli.log_level.clone())
        .init()?;

    let config = DriveConfig::load(cli.config.as_deref())?;
    let store = open_store(&config)?;

    match cli.command {
        Command::Login { email, password } => {
            let auth = auth_client(&config, store)?;
            let session = auth.login(&email, &password).await?;
            println!("Logged in as {} <{}>", session.username, session.email);
        }

        Command::Register {
            username,
            email,
            password,
            confirm_password,
        } => {
            let auth = auth_client(&config, store)?;
            let mut form = RegisterForm::new(username, email, password);
            if let Some(confirm) = confirm_password {
                form = form.with_confirmation(confirm);
            }
            let session = auth.register(&form).await?;
            println!("Registered {} <{}>", session.username, session.email);
        }

        Command::Contract { address } => {
            // Stored for later runs; no wallet is needed to change it.
            let contract = Address::parse(address.trim())?;
            store.set(CONTRACT_ADDRESS_KEY, &contract.to_hex())?;
            println!("Registry contract set to {contract}");
        }

        Command::Logout => {
            auth_client(&config, store)?.logout()?;
            println!("Logged out");
        }

        Command::Whoami => {
            let auth = auth_client(&config, store)?;
            match auth.current_session()? {
                None => println!("Not logged in"),
                Some(session) => {
                    println!("{} <{}> (id {})", session.username, session.email, session.user_id);
                    match auth.verify_token().await {
                        Ok(_) => println!("Token verified"),
                        Err(e) => println!("Token not accepted: {e}"),
                    }
                }
            }
        }

        command => {
            let drive = build_drive(&config, store).await?;
            run_drive_command(&drive, command).await?;
        }
    }

    Ok(())
}

async fn run_drive_command(drive: &Drive, command: Command) -> anyhow::Result<()> {
    let identity = drive.connect().await?;
    let _ctx = SessionContextGuard::new(&identity);

    match command {
        Command::Connect => {
            println!("Connected as {} on chain {}", identity.address, identity.chain_id);
            match drive.session().contract_address() {
                Some(contract) => println!("Registry contract {contract}"),
                None => println!("No registry contract configured"),
            }
        }

        Command::Upload { path } => {
            let file = SelectedFile::from_path(&path)
                .await
                .with_context(|| format!("could not read {}", path.display()))?;
            let mut events = drive.uploads().subscribe();
            let upload = drive.upload(file);
            tokio::pin!(upload);
            let result = loop {
                tokio::select! {
                    result = &mut upload => break result,
                    Ok(event) = events.recv() => match event {
                        UploadEvent::Phase(phase) => debug!(?phase, "Upload phase"),
                        UploadEvent::Progress(percent) => eprint!("\rUploading {percent:>3}%"),
                        _ => {}
                    },
                }
            };
            eprintln!();
            let outcome = result?;
            println!("Pinned {} ({})", outcome.cid, outcome.pointer);
            if outcome.compressed {
                println!("Image was compressed before upload");
            }
            println!("Registered in tx {}", outcome.receipt.tx);
        }

        Command::Gallery { owner, no_probe } => {
            let outcome = drive.gallery(owner.as_deref()).await?;
            if outcome.items().is_empty() {
                println!("No files stored for {}", outcome.owner());
                return Ok(());
            }
            let items = if no_probe {
                outcome.items().to_vec()
            } else {
                drive.gallery_resolver().load(&outcome).settle().await
            };
            for item in items {
                let status = match &item.state {
                    ItemState::Loading => "pending".to_string(),
                    ItemState::Loaded(info) => info
                        .content_type
                        .clone()
                        .unwrap_or_else(|| "ok".to_string()),
                    ItemState::Failed(reason) => format!("failed: {reason}"),
                };
                println!("{}  [{}]", item.url, status);
            }
        }

        Command::Share { grantee } => {
            let address = drive.grant(&grantee).await?;
            println!("Granted access to {address}");
        }

        Command::Revoke { grantee } => {
            let address = drive.revoke(&grantee).await?;
            println!("Revoked access for {address}");
        }

        Command::Access => {
            let panel = drive.access_panel().await?;
            let rows = panel.rows();
            if rows.is_empty() {
                println!("You have not shared access with anyone");
            }
            for row in rows {
                println!("{}  {}", row.display, row.status);
            }
        }

        _ => {}
    }

    Ok(())
}

fn open_store(config: &DriveConfig) -> anyhow::Result<Arc<dyn ClientStore>> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("could not create {}", config.data_dir.display()))?;
    let store = RedbClientStore::open(config.store_path())?;
    Ok(Arc::new(store))
}

fn auth_client(config: &DriveConfig, store: Arc<dyn ClientStore>) -> anyhow::Result<AuthClient> {
    let auth_config = AuthConfig::default().with_base_url(config.auth_url.clone());
    Ok(AuthClient::new(auth_config, store)?)
}

async fn build_drive(config: &DriveConfig, store: Arc<dyn ClientStore>) -> anyhow::Result<Drive> {
    let network = config.network_descriptor();
    let key = config
        .private_key
        .as_deref()
        .context("no private key configured; set BLOCKSHARE_PRIVATE_KEY")?;
    let rpc_url = network
        .primary_rpc_url()
        .with_context(|| format!("{} has no RPC endpoint", network.chain_name))?;

    // A configured key is consent to sign, so the wallet starts authorized.
    let wallet: SharedWallet = Arc::new(
        LocalWalletProvider::connect_with_key(key, rpc_url)
            .await?
            .authorized(),
    );
    let provider: Arc<dyn SigningProvider> = wallet.clone();

    let contract = resolve_contract_address(config.contract_address.as_deref(), store.as_ref());
    let factory = Arc::new(GatewayFactory::new(
        contract,
        Arc::new(EvmBinder::new(wallet)),
    ));
    let session = SessionNegotiator::new(Some(provider), network, factory);

    let pinning = PinataClient::new(config.pinata.client_config())?;
    let compressor = ImageCompressor::new(config.compression);
    let uploads = UploadPipeline::new(Arc::new(pinning), Arc::new(compressor));

    let probe = HttpContentProbe::new(PROBE_TIMEOUT)?;
    let gallery = GalleryResolver::new(config.gateway_url.clone(), Arc::new(probe));

    Ok(Drive::new(session, uploads, gallery, store))
}
