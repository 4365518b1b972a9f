//! Grant, revoke, and list read access.

use parking_lot::RwLock;
use tracing::{debug, info, instrument};

use blockshare_core::{Address, CapabilityEntry, DriveError, DriveResult, Liveness};
use blockshare_registry::RegistryGateway;
use blockshare_session::SessionNegotiator;

/// One rendered capability row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRow {
    pub grantee: Address,
    pub display: String,
    pub status: &'static str,
    pub active: bool,
}

impl From<&CapabilityEntry> for AccessRow {
    fn from(entry: &CapabilityEntry) -> Self {
        Self {
            grantee: entry.grantee,
            display: entry.grantee.short(),
            status: entry.status_label(),
            active: entry.active,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum AccessWrite {
    Grant,
    Revoke,
}

/// Capability list for the owner the panel was opened for.
///
/// The panel follows the live session rather than a captured gateway: a
/// network reload for the same owner is picked up, an account switch makes
/// every later call fail with [`DriveError::Stale`]. The list is only ever
/// replaced by a fresh `shareAccess` read, including after the panel's own
/// writes.
pub struct AccessPanel {
    session: SessionNegotiator,
    owner: Address,
    entries: RwLock<Vec<CapabilityEntry>>,
    liveness: Liveness,
}

impl AccessPanel {
    /// Open an empty panel for the connected identity.
    pub fn open(session: SessionNegotiator) -> DriveResult<Self> {
        let identity = session.identity().ok_or(DriveError::NotConnected)?;
        if session.gateway().is_none() {
            return Err(DriveError::NotConfigured);
        }
        Ok(Self {
            session,
            owner: identity.address,
            entries: RwLock::new(Vec::new()),
            liveness: Liveness::new(),
        })
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Handle to hand to work that may outlive the panel.
    pub fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }

    pub fn teardown(&self) {
        self.liveness.teardown();
    }

    pub fn entries(&self) -> Vec<CapabilityEntry> {
        self.entries.read().clone()
    }

    /// Entries in registry order; revoked ones are kept and marked.
    pub fn rows(&self) -> Vec<AccessRow> {
        self.entries.read().iter().map(AccessRow::from).collect()
    }

    #[instrument(skip(self), fields(owner = %self.owner.short()))]
    pub async fn refresh(&self) -> DriveResult<Vec<CapabilityEntry>> {
        let gateway = self.gateway()?;
        let entries = gateway.list_capabilities().await?;
        if !self.session.is_current(gateway.epoch()) {
            debug!(epoch = gateway.epoch().0, "Discarding stale capability list");
            return Err(DriveError::Stale);
        }
        if self.liveness.is_alive() {
            *self.entries.write() = entries.clone();
        } else {
            debug!("Panel torn down; dropping capability list");
        }
        Ok(entries)
    }

    pub async fn grant(&self, input: &str) -> DriveResult<Address> {
        self.write(AccessWrite::Grant, input).await
    }

    pub async fn revoke(&self, input: &str) -> DriveResult<Address> {
        self.write(AccessWrite::Revoke, input).await
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Gateway of the live binding, as long as it still signs for `owner`.
    fn gateway(&self) -> DriveResult<RegistryGateway> {
        if self.session.identity().is_none() {
            return Err(DriveError::NotConnected);
        }
        let gateway = self.session.gateway().ok_or(DriveError::NotConfigured)?;
        if gateway.owner() != self.owner {
            debug!(
                opened_for = %self.owner.short(),
                current = %gateway.owner().short(),
                "Account changed since the panel was opened"
            );
            return Err(DriveError::Stale);
        }
        Ok(gateway)
    }

    #[instrument(skip(self), fields(owner = %self.owner.short()))]
    async fn write(&self, op: AccessWrite, input: &str) -> DriveResult<Address> {
        if input.trim().is_empty() {
            return Err(DriveError::invalid_address(input));
        }
        self.gateway()?;

        let identity = self.session.ensure_network().await?;
        let gateway = self.gateway()?;
        if gateway.epoch() != identity.epoch {
            return Err(DriveError::Stale);
        }

        let grantee = match op {
            AccessWrite::Grant => gateway.grant_access(input).await?,
            AccessWrite::Revoke => gateway.revoke_access(input).await?,
        };
        info!(grantee = %grantee.short(), "Access updated");

        self.refresh().await?;
        Ok(grantee)
    }
}
