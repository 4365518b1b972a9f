//! # BlockShare Drive
//!
//! The user-facing features on top of a wallet session:
//!
//! - [`UploadPipeline`]: select, compress, pin, register
//! - [`AccessPanel`]: grant and revoke read access, list grants
//! - [`GalleryResolver`]: an owner's pointers as fetchable content URLs
//! - [`Drive`]: ties them to one [`SessionNegotiator`](blockshare_session::SessionNegotiator)
//!
//! Configuration comes from [`DriveConfig`]; the `blockshare` binary wires
//! everything to a JSON-RPC node, Pinata, and the account backend.

pub mod access_panel;
pub mod cli;
pub mod config;
pub mod drive;
pub mod gallery;
pub mod upload;

pub use access_panel::{AccessPanel, AccessRow};
pub use config::{ConfigError, DriveConfig, NetworkPreset, PinataSettings};
pub use drive::Drive;
pub use gallery::{
    ContentInfo, ContentProbe, DEFAULT_GATEWAY_URL, GalleryItem, GalleryOutcome, GalleryResolver,
    GalleryView, HttpContentProbe, ItemState, content_url,
};
pub use upload::{
    PendingUpload, SelectedFile, UploadError, UploadEvent, UploadOutcome, UploadPhase,
    UploadPipeline,
};
