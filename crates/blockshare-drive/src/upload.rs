//! The upload pipeline: select, compress when worthwhile, pin, register.
//!
//! Stages run strictly in order and an attempt is never retried on its own.
//! A failed attempt keeps the selected file so the user can retry; a pin
//! that succeeded before registration failed is reported as an orphaned
//! pin, and a retry of that attempt only re-registers the pointer.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, instrument, warn};

use blockshare_core::{
    Address, ContentId, DriveError, ErrorKind, PinRequest, PinningService, Pointer,
    SessionEpoch, TransferProgress, TxReceipt,
};
use blockshare_registry::RegistryGateway;
use blockshare_storage::{CompressionError, Compressor, jpeg_file_name};

const EVENT_CAPACITY: usize = 64;

/// A file chosen for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub mime: String,
    pub bytes: Bytes,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk. The MIME type is sniffed from the content,
    /// falling back to the extension.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let mime = guess_mime(path, &bytes);
        Ok(Self::new(name, mime, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

fn guess_mime(path: &Path, bytes: &[u8]) -> String {
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type().to_string();
    }
    mime_guess::from_path(path).first_or_octet_stream().to_string()
}

/// Lifecycle of the pending upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum UploadPhase {
    #[default]
    Idle,
    Selected,
    Compressing,
    Pinning,
    Registering,
    Done,
    Failed,
}

impl UploadPhase {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Compressing | Self::Pinning | Self::Registering)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("No file selected")]
    NothingSelected,

    #[error("The selected file is empty")]
    EmptyFile,

    #[error("An upload is already in progress")]
    Busy,

    #[error("Compression failed: {0}")]
    Compression(#[from] CompressionError),

    #[error("{0}")]
    Pin(DriveError),

    /// Pinned, but the registry write failed; the content is not listed.
    #[error("Upload succeeded, but saving to the registry failed: {cause}")]
    OrphanedPin { pointer: Pointer, cause: DriveError },

    /// The session could not be used for the upload.
    #[error("{0}")]
    Session(DriveError),
}

impl UploadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NothingSelected | Self::EmptyFile | Self::Busy | Self::Compression(_) => {
                ErrorKind::Unknown
            }
            Self::Pin(e) | Self::Session(e) => e.kind(),
            Self::OrphanedPin { .. } => ErrorKind::ContractRejected,
        }
    }

    pub fn is_orphaned_pin(&self) -> bool {
        matches!(self, Self::OrphanedPin { .. })
    }
}

impl From<UploadError> for DriveError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::Pin(e) | UploadError::Session(e) => e,
            UploadError::OrphanedPin { cause, .. } => DriveError::ContractRejected {
                reason: cause.to_string(),
            },
            other => DriveError::Unknown(other.to_string()),
        }
    }
}

/// Published while an upload runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    Phase(UploadPhase),
    /// Percent of bytes sent, never decreasing within an attempt.
    Progress(u8),
    /// Registered; galleries showing `owner` should refresh. `epoch` is the
    /// binding the write was signed under.
    Completed {
        owner: Address,
        epoch: SessionEpoch,
        pointer: Pointer,
        receipt: TxReceipt,
    },
    Failed(UploadError),
}

/// The upload being worked on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    pub file: SelectedFile,
    /// Bytes actually pinned: compressed or original.
    pub payload: Option<PinRequest>,
    pub compressed: bool,
    pub progress: u8,
    pub phase: UploadPhase,
    pub error: Option<UploadError>,
    /// Set once pinning succeeded.
    pub pinned: Option<ContentId>,
}

impl PendingUpload {
    fn new(file: SelectedFile) -> Self {
        Self {
            file,
            payload: None,
            compressed: false,
            progress: 0,
            phase: UploadPhase::Selected,
            error: None,
            pinned: None,
        }
    }
}

/// Successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub cid: ContentId,
    pub pointer: Pointer,
    pub receipt: TxReceipt,
    pub compressed: bool,
}

#[derive(Default)]
struct PipelineState {
    phase: UploadPhase,
    pending: Option<PendingUpload>,
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Runs one upload at a time through compress, pin, and register.
pub struct UploadPipeline {
    pinning: Arc<dyn PinningService>,
    compressor: Arc<dyn Compressor>,
    state: Mutex<PipelineState>,
    running: AtomicBool,
    events: broadcast::Sender<UploadEvent>,
}

impl UploadPipeline {
    pub fn new(pinning: Arc<dyn PinningService>, compressor: Arc<dyn Compressor>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            pinning,
            compressor,
            state: Mutex::new(PipelineState::default()),
            running: AtomicBool::new(false),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.events.subscribe()
    }

    pub fn phase(&self) -> UploadPhase {
        self.state.lock().phase
    }

    pub fn pending(&self) -> Option<PendingUpload> {
        self.state.lock().pending.clone()
    }

    pub fn progress(&self) -> u8 {
        self.state.lock().pending.as_ref().map_or(0, |p| p.progress)
    }

    /// Replace the selection. Only emptiness is checked.
    pub fn select(&self, file: SelectedFile) -> Result<(), UploadError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(UploadError::Busy);
        }
        if file.bytes.is_empty() {
            return Err(UploadError::EmptyFile);
        }
        debug!(name = %file.name, size = file.size(), mime = %file.mime, "File selected");
        {
            let mut state = self.state.lock();
            state.pending = Some(PendingUpload::new(file));
            state.phase = UploadPhase::Selected;
        }
        self.emit(UploadEvent::Phase(UploadPhase::Selected));
        Ok(())
    }

    /// Drop the pending upload and return to idle.
    pub fn reset(&self) -> Result<(), UploadError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(UploadError::Busy);
        }
        *self.state.lock() = PipelineState::default();
        self.emit(UploadEvent::Phase(UploadPhase::Idle));
        Ok(())
    }

    /// Run the selected file through the pipeline under `gateway`'s signer.
    #[instrument(skip(self, gateway), fields(owner = %gateway.owner().short()))]
    pub async fn submit(&self, gateway: &RegistryGateway) -> Result<UploadOutcome, UploadError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(UploadError::Busy);
        }
        let _running = RunningGuard(&self.running);

        let pending = self.pending().ok_or(UploadError::NothingSelected)?;
        let result = self.run(gateway, pending).await;
        match &result {
            Ok(outcome) => {
                info!(cid = %outcome.cid, "Upload complete");
                {
                    let mut state = self.state.lock();
                    state.pending = None;
                    state.phase = UploadPhase::Done;
                }
                self.emit(UploadEvent::Phase(UploadPhase::Done));
                self.emit(UploadEvent::Completed {
                    owner: gateway.owner(),
                    epoch: gateway.epoch(),
                    pointer: outcome.pointer.clone(),
                    receipt: outcome.receipt,
                });
            }
            Err(e) => {
                warn!(error = %e, "Upload failed");
                {
                    let mut state = self.state.lock();
                    state.phase = UploadPhase::Failed;
                    if let Some(pending) = state.pending.as_mut() {
                        pending.phase = UploadPhase::Failed;
                        pending.error = Some(e.clone());
                    }
                }
                self.emit(UploadEvent::Phase(UploadPhase::Failed));
                self.emit(UploadEvent::Failed(e.clone()));
            }
        }
        result
    }

    /// Try a failed upload again with the retained file.
    pub async fn retry(&self, gateway: &RegistryGateway) -> Result<UploadOutcome, UploadError> {
        if self.phase() != UploadPhase::Failed {
            return Err(UploadError::NothingSelected);
        }
        self.submit(gateway).await
    }

    async fn run(
        &self,
        gateway: &RegistryGateway,
        pending: PendingUpload,
    ) -> Result<UploadOutcome, UploadError> {
        let (cid, compressed) = match pending.pinned.clone() {
            Some(cid) => {
                debug!(%cid, "Content already pinned; registering only");
                (cid, pending.compressed)
            }
            None => {
                let (payload, compressed) = self.prepare(&pending.file).await?;
                self.update(|p| p.compressed = compressed);
                let cid = self.pin(payload).await?;
                (cid, compressed)
            }
        };

        self.set_phase(UploadPhase::Registering);
        let pointer = Pointer::ipfs(&cid);
        let receipt = gateway
            .register_pointer(&pointer)
            .await
            .map_err(|cause| UploadError::OrphanedPin {
                pointer: pointer.clone(),
                cause,
            })?;

        Ok(UploadOutcome {
            cid,
            pointer,
            receipt,
            compressed,
        })
    }

    async fn prepare(&self, file: &SelectedFile) -> Result<(PinRequest, bool), UploadError> {
        if !self.compressor.policy().applies_to(file.size(), &file.mime) {
            return Ok((
                PinRequest::new(file.name.clone(), file.mime.clone(), file.bytes.clone()),
                false,
            ));
        }

        self.set_phase(UploadPhase::Compressing);
        let compressed = self.compressor.compress(file.bytes.clone()).await?;
        debug!(
            original = file.size(),
            compressed = compressed.bytes.len(),
            "Compressed before pinning"
        );
        Ok((
            PinRequest::new(jpeg_file_name(&file.name), compressed.mime, compressed.bytes),
            true,
        ))
    }

    async fn pin(&self, payload: PinRequest) -> Result<ContentId, UploadError> {
        self.set_phase(UploadPhase::Pinning);
        self.update(|p| {
            p.payload = Some(payload.clone());
            p.progress = 0;
        });
        self.emit(UploadEvent::Progress(0));

        let (tx, mut rx) = watch::channel(TransferProgress::default());
        let pin = self.pinning.pin(payload, tx);
        tokio::pin!(pin);

        let result = loop {
            tokio::select! {
                result = &mut pin => break result,
                changed = rx.changed() => {
                    if changed.is_err() {
                        break (&mut pin).await;
                    }
                    let percent = rx.borrow_and_update().percent();
                    self.advance(percent);
                }
            }
        };

        let cid = result.map_err(|e| UploadError::Pin(e.into()))?;
        self.advance(100);
        self.update(|p| p.pinned = Some(cid.clone()));
        Ok(cid)
    }

    /// Raise progress to `percent` if that is higher than what was reported.
    fn advance(&self, percent: u8) {
        let raised = {
            let mut state = self.state.lock();
            match state.pending.as_mut() {
                Some(p) if percent > p.progress => {
                    p.progress = percent.min(100);
                    true
                }
                _ => false,
            }
        };
        if raised {
            self.emit(UploadEvent::Progress(percent.min(100)));
        }
    }

    fn set_phase(&self, phase: UploadPhase) {
        {
            let mut state = self.state.lock();
            state.phase = phase;
            if let Some(p) = state.pending.as_mut() {
                p.phase = phase;
            }
        }
        debug!(?phase, "Upload phase");
        self.emit(UploadEvent::Phase(phase));
    }

    fn update(&self, f: impl FnOnce(&mut PendingUpload)) {
        if let Some(p) = self.state.lock().pending.as_mut() {
            f(p);
        }
    }

    fn emit(&self, event: UploadEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_from_extension() {
        let text = b"not really an image";
        assert_eq!(guess_mime(Path::new("photo.PNG"), text), "image/png");
        assert_eq!(guess_mime(Path::new("scan.tiff"), text), "image/tiff");
        assert!(guess_mime(Path::new("icon.ico"), text).starts_with("image/"));
        assert_eq!(guess_mime(Path::new("report"), text), "application/octet-stream");
    }

    #[test]
    fn test_mime_sniffed_from_content() {
        let png = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0];
        assert_eq!(guess_mime(Path::new("upload.bin"), &png), "image/png");
    }

    #[test]
    fn test_orphaned_pin_kind() {
        let err = UploadError::OrphanedPin {
            pointer: Pointer::from_raw("ipfs://Qm1"),
            cause: DriveError::RegistryWriteRejected {
                reason: "reverted".into(),
            },
        };
        assert_eq!(err.kind(), ErrorKind::ContractRejected);
        assert!(err.is_orphaned_pin());
        assert_eq!(DriveError::from(err).kind(), ErrorKind::ContractRejected);
    }

    #[test]
    fn test_pin_error_keeps_kind() {
        let err = UploadError::Pin(DriveError::RateLimited);
        assert_eq!(err.kind(), ErrorKind::RateLimited);
    }

    #[tokio::test]
    async fn test_from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        tokio::fs::write(&path, b"hello").await.unwrap();

        let file = SelectedFile::from_path(&path).await.unwrap();
        assert_eq!(file.name, "notes.txt");
        assert_eq!(file.mime, "text/plain");
        assert_eq!(file.size(), 5);
    }
}
