//! Gallery resolution: registry pointers to fetchable content URLs.
//!
//! Each item loads on its own task. A failed item is marked failed and
//! the rest carry on.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

use blockshare_core::{Address, DriveResult, Liveness, Pointer};
use blockshare_registry::RegistryGateway;

pub const DEFAULT_GATEWAY_URL: &str = "https://gateway.pinata.cloud/ipfs/";

/// `<gateway>/<cid>` for `pointer`, with any scheme marker removed.
pub fn content_url(gateway_url: &str, pointer: &Pointer) -> String {
    format!(
        "{}/{}",
        gateway_url.trim_end_matches('/'),
        pointer.content_id()
    )
}

/// What a content probe learned about an item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentInfo {
    pub content_type: Option<String>,
    pub size: Option<u64>,
}

/// Load lifecycle of one gallery item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemState {
    Loading,
    Loaded(ContentInfo),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryItem {
    pub pointer: Pointer,
    pub url: String,
    pub state: ItemState,
}

/// Result of listing an owner's pointers.
///
/// An empty list and a denied read are different answers: denial comes
/// back as [`DriveError::AccessDenied`](blockshare_core::DriveError::AccessDenied).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GalleryOutcome {
    Empty { owner: Address },
    Items { owner: Address, items: Vec<GalleryItem> },
}

impl GalleryOutcome {
    pub fn owner(&self) -> Address {
        match self {
            Self::Empty { owner } | Self::Items { owner, .. } => *owner,
        }
    }

    pub fn items(&self) -> &[GalleryItem] {
        match self {
            Self::Empty { .. } => &[],
            Self::Items { items, .. } => items,
        }
    }
}

/// Checks that a content URL can be fetched.
#[async_trait]
pub trait ContentProbe: Send + Sync {
    async fn probe(&self, url: &str) -> Result<ContentInfo, String>;
}

/// [`ContentProbe`] issuing a `HEAD` against the gateway.
#[derive(Debug, Clone)]
pub struct HttpContentProbe {
    http: reqwest::Client,
}

impl HttpContentProbe {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }
}

#[async_trait]
impl ContentProbe for HttpContentProbe {
    async fn probe(&self, url: &str) -> Result<ContentInfo, String> {
        let response = self
            .http
            .head(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("gateway returned HTTP {}", status.as_u16()));
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(ContentInfo {
            content_type,
            size: response.content_length(),
        })
    }
}

/// Lists pointers and hands out [`GalleryView`]s that load them.
#[derive(Clone)]
pub struct GalleryResolver {
    gateway_url: String,
    probe: Arc<dyn ContentProbe>,
}

impl GalleryResolver {
    pub fn new(gateway_url: impl Into<String>, probe: Arc<dyn ContentProbe>) -> Self {
        Self {
            gateway_url: gateway_url.into(),
            probe,
        }
    }

    pub fn gateway_url(&self) -> &str {
        &self.gateway_url
    }

    /// List `target`'s pointers (the connected identity when `None` or blank).
    #[instrument(skip(self, gateway))]
    pub async fn resolve(
        &self,
        gateway: &RegistryGateway,
        target: Option<&str>,
    ) -> DriveResult<GalleryOutcome> {
        let owner = match target.map(str::trim).filter(|t| !t.is_empty()) {
            Some(input) => gateway.resolve_grantee(input).await?,
            None => gateway.owner(),
        };

        let pointers = gateway.list_pointers(owner).await?;
        if pointers.is_empty() {
            debug!(owner = %owner.short(), "Gallery empty");
            return Ok(GalleryOutcome::Empty { owner });
        }

        let items = pointers
            .into_iter()
            .map(|pointer| GalleryItem {
                url: content_url(&self.gateway_url, &pointer),
                pointer,
                state: ItemState::Loading,
            })
            .collect();
        Ok(GalleryOutcome::Items { owner, items })
    }

    /// Start loading every item of `outcome`, each independently.
    pub fn load(&self, outcome: &GalleryOutcome) -> GalleryView {
        let items = Arc::new(RwLock::new(outcome.items().to_vec()));
        let liveness = Liveness::new();
        let mut tasks = JoinSet::new();

        for (index, item) in outcome.items().iter().enumerate() {
            let probe = self.probe.clone();
            let url = item.url.clone();
            let items = items.clone();
            let liveness = liveness.clone();
            tasks.spawn(async move {
                let state = match probe.probe(&url).await {
                    Ok(info) => ItemState::Loaded(info),
                    Err(reason) => {
                        warn!(%url, %reason, "Gallery item failed to load");
                        ItemState::Failed(reason)
                    }
                };
                if !liveness.is_alive() {
                    return;
                }
                if let Some(item) = items.write().get_mut(index) {
                    item.state = state;
                }
            });
        }

        GalleryView {
            owner: outcome.owner(),
            items,
            liveness,
            tasks,
        }
    }
}

/// Live view of a gallery whose items are loading in the background.
pub struct GalleryView {
    owner: Address,
    items: Arc<RwLock<Vec<GalleryItem>>>,
    liveness: Liveness,
    tasks: JoinSet<()>,
}

impl GalleryView {
    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn items(&self) -> Vec<GalleryItem> {
        self.items.read().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.items
            .read()
            .iter()
            .any(|item| item.state == ItemState::Loading)
    }

    /// Wait until every item has settled.
    pub async fn settle(&mut self) -> Vec<GalleryItem> {
        while self.tasks.join_next().await.is_some() {}
        self.items()
    }

    /// Drop the view; loads still in flight are discarded.
    pub fn teardown(&mut self) {
        self.liveness.teardown();
        self.tasks.abort_all();
    }
}

impl Drop for GalleryView {
    fn drop(&mut self) {
        self.liveness.teardown();
    }
}
