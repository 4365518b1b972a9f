//! Drive wired to the in-memory doubles.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

use blockshare_core::testing::{InMemoryLedger, MockPinningService, MockSigningProvider, test_address};
use blockshare_core::{Address, ChainId, MemoryClientStore, NetworkDescriptor, SigningProvider};
use blockshare_drive::{
    ContentInfo, ContentProbe, Drive, GalleryResolver, UploadPipeline,
};
use blockshare_registry::GatewayFactory;
use blockshare_session::SessionNegotiator;
use blockshare_storage::{
    Compressed, CompressionError, CompressionPolicy, Compressor, JPEG_MIME,
};

pub const HARDHAT: ChainId = ChainId(31337);
pub const GATEWAY_URL: &str = "https://gateway.test/ipfs/";

pub fn owner() -> Address {
    test_address(0xa1)
}

pub fn contract() -> Address {
    test_address(0xcc)
}

/// Compressor that records calls and returns a fixed small JPEG body.
#[derive(Default)]
pub struct StubCompressor {
    policy: CompressionPolicy,
    calls: AtomicUsize,
}

impl StubCompressor {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Compressor for StubCompressor {
    fn policy(&self) -> &CompressionPolicy {
        &self.policy
    }

    async fn compress(&self, _input: Bytes) -> Result<Compressed, CompressionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Compressed {
            bytes: Bytes::from_static(b"jpeg-bytes"),
            mime: JPEG_MIME.to_string(),
            width: 1920,
            height: 1080,
            quality: 85,
        })
    }
}

/// Probe failing every URL that contains one of `failing`.
#[derive(Default)]
pub struct ScriptedProbe {
    pub failing: Vec<String>,
}

#[async_trait]
impl ContentProbe for ScriptedProbe {
    async fn probe(&self, url: &str) -> Result<ContentInfo, String> {
        tokio::task::yield_now().await;
        if self.failing.iter().any(|f| url.contains(f.as_str())) {
            return Err("gateway returned HTTP 504".to_string());
        }
        Ok(ContentInfo {
            content_type: Some("application/octet-stream".to_string()),
            size: None,
        })
    }
}

pub struct Harness {
    pub provider: Arc<MockSigningProvider>,
    pub ledger: InMemoryLedger,
    pub pinning: Arc<MockPinningService>,
    pub compressor: Arc<StubCompressor>,
    pub store: Arc<MemoryClientStore>,
    pub drive: Drive,
}

pub struct HarnessBuilder {
    provider: MockSigningProvider,
    contract: Option<Address>,
    pinning: MockPinningService,
    compressor: Option<Arc<dyn Compressor>>,
    probe: Arc<dyn ContentProbe>,
}

impl HarnessBuilder {
    /// Authorized `owner()` on Hardhat, a contract, and pins answering `Qm123`.
    pub fn new() -> Self {
        Self {
            provider: MockSigningProvider::new(HARDHAT)
                .with_account(owner())
                .authorized(),
            contract: Some(contract()),
            pinning: MockPinningService::returning("Qm123"),
            compressor: None,
            probe: Arc::new(ScriptedProbe::default()),
        }
    }

    pub fn provider(mut self, provider: MockSigningProvider) -> Self {
        self.provider = provider;
        self
    }

    pub fn without_contract(mut self) -> Self {
        self.contract = None;
        self
    }

    pub fn pinning(mut self, pinning: MockPinningService) -> Self {
        self.pinning = pinning;
        self
    }

    pub fn compressor(mut self, compressor: Arc<dyn Compressor>) -> Self {
        self.compressor = Some(compressor);
        self
    }

    pub fn probe(mut self, probe: impl ContentProbe + 'static) -> Self {
        self.probe = Arc::new(probe);
        self
    }

    pub fn build(self) -> Harness {
        let provider = Arc::new(self.provider);
        let ledger = InMemoryLedger::new();
        let pinning = Arc::new(self.pinning);
        let stub = Arc::new(StubCompressor::default());
        let compressor = self
            .compressor
            .unwrap_or_else(|| stub.clone() as Arc<dyn Compressor>);
        let store = Arc::new(MemoryClientStore::new());

        let factory = GatewayFactory::new(self.contract, ledger.binder());
        let session = SessionNegotiator::new(
            Some(provider.clone() as Arc<dyn SigningProvider>),
            NetworkDescriptor::hardhat_local(),
            Arc::new(factory),
        );
        let uploads = UploadPipeline::new(pinning.clone(), compressor);
        let gallery = GalleryResolver::new(GATEWAY_URL, self.probe);
        let drive = Drive::new(session, uploads, gallery, store.clone());

        Harness {
            provider,
            ledger,
            pinning,
            compressor: stub,
            store,
            drive,
        }
    }
}

/// A connected drive with default doubles.
pub async fn connected() -> Harness {
    let harness = HarnessBuilder::new().build();
    harness.drive.connect().await.unwrap();
    harness
}
