//! The drive: one session plus the features built on its gateway.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use blockshare_core::{
    Address, CONTRACT_ADDRESS_KEY, CapabilityEntry, ClientStore, DriveError, DriveResult,
    Identity,
};
use blockshare_registry::RegistryGateway;
use blockshare_session::SessionNegotiator;

use crate::access_panel::AccessPanel;
use crate::gallery::{GalleryOutcome, GalleryResolver, GalleryView};
use crate::upload::{SelectedFile, UploadError, UploadOutcome, UploadPipeline};

/// Entry point for everything a connected user does.
///
/// Reads run on the current gateway and are discarded as
/// [`DriveError::Stale`] if the session changed underneath them. Ledger
/// writes first bring the provider onto the required network.
///
/// # Example
///
/// ```ignore
/// let drive = Drive::new(session, pipeline, gallery, store);
/// drive.connect().await?;
/// drive.upload(SelectedFile::from_path(path).await?).await?;
/// let outcome = drive.gallery(None).await?;
/// ```
pub struct Drive {
    session: SessionNegotiator,
    uploads: Arc<UploadPipeline>,
    gallery: GalleryResolver,
    store: Arc<dyn ClientStore>,
}

impl Drive {
    pub fn new(
        session: SessionNegotiator,
        uploads: UploadPipeline,
        gallery: GalleryResolver,
        store: Arc<dyn ClientStore>,
    ) -> Self {
        Self {
            session,
            uploads: Arc::new(uploads),
            gallery,
            store,
        }
    }

    pub fn session(&self) -> &SessionNegotiator {
        &self.session
    }

    pub fn uploads(&self) -> &Arc<UploadPipeline> {
        &self.uploads
    }

    pub fn gallery_resolver(&self) -> &GalleryResolver {
        &self.gallery
    }

    pub fn identity(&self) -> Option<Identity> {
        self.session.identity()
    }

    /// Restore an authorized account silently, prompting only if none.
    #[instrument(skip(self))]
    pub async fn connect(&self) -> DriveResult<Identity> {
        if let Some(identity) = self.session.restore_silent().await? {
            if identity.chain_id == self.session.required_network().chain_id {
                return Ok(identity);
            }
            debug!(chain = %identity.chain_id, "Restored on the wrong network; reconnecting");
        }
        self.session.connect().await
    }

    pub async fn disconnect(&self) {
        self.session.disconnect().await;
    }

    /// Gateway of the current binding.
    pub fn gateway(&self) -> DriveResult<RegistryGateway> {
        if self.session.identity().is_none() {
            return Err(DriveError::NotConnected);
        }
        self.session.gateway().ok_or(DriveError::NotConfigured)
    }

    /// Gateway for a ledger write, after network reconciliation.
    async fn write_gateway(&self) -> DriveResult<RegistryGateway> {
        self.gateway()?;
        let identity = self.session.ensure_network().await?;
        let gateway = self.gateway()?;
        if gateway.epoch() != identity.epoch {
            return Err(DriveError::Stale);
        }
        Ok(gateway)
    }

    fn check_current(&self, gateway: &RegistryGateway) -> DriveResult<()> {
        if self.session.is_current(gateway.epoch()) {
            Ok(())
        } else {
            debug!(epoch = gateway.epoch().0, "Discarding stale result");
            Err(DriveError::Stale)
        }
    }

    // ------------------------------------------------------------------
    // Uploads
    // ------------------------------------------------------------------

    /// Select `file` and run it through the pipeline.
    pub async fn upload(&self, file: SelectedFile) -> Result<UploadOutcome, UploadError> {
        self.uploads.select(file)?;
        self.submit().await
    }

    /// Run whatever is selected, or retry a failed attempt.
    pub async fn submit(&self) -> Result<UploadOutcome, UploadError> {
        let gateway = self.write_gateway().await.map_err(UploadError::Session)?;
        self.uploads.submit(&gateway).await
    }

    pub async fn retry_upload(&self) -> Result<UploadOutcome, UploadError> {
        let gateway = self.write_gateway().await.map_err(UploadError::Session)?;
        self.uploads.retry(&gateway).await
    }

    // ------------------------------------------------------------------
    // Gallery
    // ------------------------------------------------------------------

    /// List `target`'s content, defaulting to the connected identity.
    pub async fn gallery(&self, target: Option<&str>) -> DriveResult<GalleryOutcome> {
        let gateway = self.gateway()?;
        let outcome = self.gallery.resolve(&gateway, target).await?;
        self.check_current(&gateway)?;
        Ok(outcome)
    }

    /// Resolve and start loading every item.
    pub async fn open_gallery(&self, target: Option<&str>) -> DriveResult<GalleryView> {
        let outcome = self.gallery(target).await?;
        Ok(self.gallery.load(&outcome))
    }

    // ------------------------------------------------------------------
    // Access control
    // ------------------------------------------------------------------

    /// A panel for the connected owner, already filled.
    pub async fn access_panel(&self) -> DriveResult<AccessPanel> {
        let panel = AccessPanel::open(self.session.clone())?;
        panel.refresh().await?;
        Ok(panel)
    }

    pub async fn capabilities(&self) -> DriveResult<Vec<CapabilityEntry>> {
        let gateway = self.gateway()?;
        let entries = gateway.list_capabilities().await?;
        self.check_current(&gateway)?;
        Ok(entries)
    }

    /// Grant read access; the owner's list is re-read afterwards.
    #[instrument(skip(self))]
    pub async fn grant(&self, grantee: &str) -> DriveResult<Address> {
        if grantee.trim().is_empty() {
            return Err(DriveError::invalid_address(grantee));
        }
        AccessPanel::open(self.session.clone())?.grant(grantee).await
    }

    #[instrument(skip(self))]
    pub async fn revoke(&self, grantee: &str) -> DriveResult<Address> {
        if grantee.trim().is_empty() {
            return Err(DriveError::invalid_address(grantee));
        }
        AccessPanel::open(self.session.clone())?.revoke(grantee).await
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Validate, persist, and switch to another registry contract.
    #[instrument(skip(self))]
    pub fn set_contract_address(&self, input: &str) -> DriveResult<Address> {
        let contract = Address::parse(input.trim())?;
        self.store.set(CONTRACT_ADDRESS_KEY, &contract.to_hex())?;
        self.session.set_contract_address(Some(contract));
        info!(contract = %contract.short(), "Registry contract set");
        Ok(contract)
    }

    /// Forget the persisted contract; registry features report
    /// [`DriveError::NotConfigured`] afterwards.
    pub fn clear_contract_address(&self) -> DriveResult<()> {
        if let Err(e) = self.store.remove(CONTRACT_ADDRESS_KEY) {
            warn!(error = %e, "Could not clear persisted contract address");
            return Err(e.into());
        }
        self.session.set_contract_address(None);
        Ok(())
    }
}
