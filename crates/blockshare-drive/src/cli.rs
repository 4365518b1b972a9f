use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "blockshare", about = "Content-addressed file sharing with on-chain access control")]
pub struct Cli {
    /// TOML config file; `BLOCKSHARE_*` variables override it
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Write rotated JSON logs to this directory instead of the console
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Connect the wallet and show the bound identity
    Connect,
    /// Pin a file and register it under your address
    Upload {
        /// File to upload
        path: PathBuf,
    },
    /// List the files stored under an address
    Gallery {
        /// Owner address or name (defaults to your own)
        owner: Option<String>,
        /// Skip probing each item through the gateway
        #[arg(long)]
        no_probe: bool,
    },
    /// Give an address read access to your files
    Share {
        /// Grantee address or name
        grantee: String,
    },
    /// Take read access away from an address
    Revoke {
        /// Grantee address or name
        grantee: String,
    },
    /// List the addresses you have granted access to
    Access,
    /// Set the registry contract address
    Contract {
        /// Contract address
        address: String,
    },
    /// Log in to the account backend
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account on the backend
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Password confirmation (defaults to the password)
        #[arg(long)]
        confirm_password: Option<String>,
    },
    /// Clear the stored account session
    Logout,
    /// Show the stored account and verify its token
    Whoami,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_share() {
        let cli = Cli::parse_from(["blockshare", "share", "0xabc", "--log-level", "debug"]);
        assert_eq!(cli.log_level, "debug");
        assert!(matches!(cli.command, Command::Share { grantee } if grantee == "0xabc"));
    }

    #[test]
    fn test_parse_gallery_defaults_to_self() {
        let cli = Cli::parse_from(["blockshare", "gallery"]);
        assert!(matches!(
            cli.command,
            Command::Gallery { owner: None, no_probe: false }
        ));
    }

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
