//! # BlockShare Storage
//!
//! Concrete implementations of the storage-side boundaries:
//!
//! - [`PinataClient`]: [`PinningService`](blockshare_core::PinningService)
//!   over the Pinata HTTP API, with streamed byte progress
//! - [`ImageCompressor`]: downscale and JPEG re-encode on a blocking worker
//! - [`RedbClientStore`]: [`ClientStore`](blockshare_core::ClientStore) on redb

pub mod client_store;
pub mod compression;
pub mod pinata;

pub use client_store::RedbClientStore;
pub use compression::{
    CompressionError, CompressionPolicy, Compressed, Compressor, ImageCompressor, JPEG_MIME,
    jpeg_file_name,
};
pub use pinata::{PINATA_PIN_FILE_URL, PinataClient, PinataConfig, PinataCredentials};
