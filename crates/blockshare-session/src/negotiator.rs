//! The session negotiator.
//!
//! Owns the connection to the signing provider. All transitions run under a
//! single async transition lock so provider events and user calls never
//! interleave; the connect flight flag sits outside that lock so a second
//! connect is rejected immediately instead of queueing behind the first.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use blockshare_core::{
    Address, ChainId, DriveError, DriveResult, EpochCounter, Identity, NetworkDescriptor,
    ProviderRequest, SessionEpoch, SigningProvider, parse_accounts,
};
use blockshare_registry::{GatewayFactory, RegistryGateway};

use crate::listener;
use crate::reconcile::{self, Reconciled};
use crate::state::{SessionEvent, SessionState};

const EVENT_CAPACITY: usize = 64;

#[derive(Default)]
struct Slot {
    state: SessionState,
    gateway: Option<RegistryGateway>,
}

pub(crate) struct Inner {
    provider: Option<Arc<dyn SigningProvider>>,
    required: NetworkDescriptor,
    factory: Arc<GatewayFactory>,
    slot: RwLock<Slot>,
    connect_in_flight: AtomicBool,
    transition: tokio::sync::Mutex<()>,
    listener: Mutex<Option<JoinHandle<()>>>,
    epochs: EpochCounter,
    events: broadcast::Sender<SessionEvent>,
}

/// Clears the connect flight flag when the attempt ends, however it ends.
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Establishes and maintains the signing identity.
///
/// Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct SessionNegotiator {
    inner: Arc<Inner>,
}

impl SessionNegotiator {
    /// `provider` is `None` when no wallet is injected; every operation then
    /// fails with [`DriveError::ProviderUnavailable`].
    pub fn new(
        provider: Option<Arc<dyn SigningProvider>>,
        required: NetworkDescriptor,
        factory: Arc<GatewayFactory>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                provider,
                required,
                factory,
                slot: RwLock::new(Slot::default()),
                connect_in_flight: AtomicBool::new(false),
                transition: tokio::sync::Mutex::new(()),
                listener: Mutex::new(None),
                epochs: EpochCounter::new(),
                events,
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    pub fn state(&self) -> SessionState {
        self.inner.slot.read().state.clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.inner.slot.read().state.identity().copied()
    }

    /// The registry gateway for the current binding, if a contract is configured.
    pub fn gateway(&self) -> Option<RegistryGateway> {
        self.inner.slot.read().gateway.clone()
    }

    pub fn required_network(&self) -> &NetworkDescriptor {
        &self.inner.required
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn current_epoch(&self) -> SessionEpoch {
        self.inner.epochs.current()
    }

    /// Whether work started under `epoch` may still be applied.
    pub fn is_current(&self, epoch: SessionEpoch) -> bool {
        self.inner.epochs.is_current(epoch)
    }

    pub fn contract_address(&self) -> Option<Address> {
        self.inner.factory.contract_address()
    }

    pub fn listener_installed(&self) -> bool {
        self.inner
            .listener
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Re-bind to already-authorized accounts without prompting.
    ///
    /// Never switches networks: a wrong chain ends in
    /// [`SessionState::NetworkMismatch`].
    #[instrument(skip(self))]
    pub async fn restore_silent(&self) -> DriveResult<Option<Identity>> {
        let provider = self.provider()?;
        let _transition = self.inner.transition.lock().await;
        self.restore_locked(provider.as_ref()).await
    }

    /// Reconcile the network, then ask the user to authorize an account.
    ///
    /// Only one connect may be in flight; a concurrent call fails with
    /// [`DriveError::RequestAlreadyPending`] and opens no prompt.
    #[instrument(skip(self))]
    pub async fn connect(&self) -> DriveResult<Identity> {
        let provider = match self.provider() {
            Ok(provider) => provider,
            Err(e) => {
                self.set_state(SessionState::ConnectFailed(e.clone()));
                return Err(e);
            }
        };

        if self.inner.connect_in_flight.swap(true, Ordering::SeqCst) {
            debug!("Connect already in flight");
            self.hint(&DriveError::RequestAlreadyPending);
            return Err(DriveError::RequestAlreadyPending);
        }
        let _flight = FlightGuard(&self.inner.connect_in_flight);

        let _transition = self.inner.transition.lock().await;
        self.set_state(SessionState::Connecting);

        match self.connect_locked(provider.as_ref()).await {
            Ok(identity) => Ok(identity),
            Err(e) => {
                if e.is_hint() {
                    self.hint(&e);
                }
                warn!(error = %e, "Connect failed");
                self.clear_binding();
                self.set_state(SessionState::ConnectFailed(e.clone()));
                Err(e)
            }
        }
    }

    /// Make sure the provider is on the required network before a mutation.
    ///
    /// Returns the identity to sign with, which carries a new epoch if the
    /// session had to be rebuilt.
    #[instrument(skip(self))]
    pub async fn ensure_network(&self) -> DriveResult<Identity> {
        let provider = self.provider()?;
        let _transition = self.inner.transition.lock().await;
        let identity = self.identity().ok_or(DriveError::NotConnected)?;

        let outcome = reconcile::reconcile(provider.as_ref(), &self.inner.required).await?;
        if let Some(e) = outcome.blocking_error() {
            if e.is_hint() {
                self.hint(&e);
            }
            return Err(e);
        }

        if outcome == Reconciled::Matched && identity.chain_id == self.inner.required.chain_id {
            return Ok(identity);
        }

        self.reload_locked(provider.as_ref())
            .await?
            .filter(|id| id.chain_id == self.inner.required.chain_id)
            .ok_or(DriveError::NotConnected)
    }

    /// Local reset: clear the binding and stop listening. The wallet keeps
    /// its authorization.
    #[instrument(skip(self))]
    pub async fn disconnect(&self) {
        let _transition = self.inner.transition.lock().await;
        if let Some(handle) = self.inner.listener.lock().take() {
            handle.abort();
        }
        self.teardown();
        info!("Session disconnected");
    }

    /// Point the session at another registry contract and rebuild the gateway.
    pub fn set_contract_address(&self, contract: Option<Address>) {
        self.inner.factory.set_contract_address(contract);
        let mut slot = self.inner.slot.write();
        slot.gateway = slot
            .state
            .identity()
            .and_then(|identity| self.inner.factory.build(identity));
    }

    // ------------------------------------------------------------------
    // Transitions. Callers hold the transition lock.
    // ------------------------------------------------------------------

    async fn connect_locked(&self, provider: &dyn SigningProvider) -> DriveResult<Identity> {
        let outcome = reconcile::reconcile(provider, &self.inner.required).await?;
        if outcome == Reconciled::Pending {
            self.hint(&DriveError::RequestAlreadyPending);
        }

        let accounts = provider.request(ProviderRequest::RequestAccounts).await?;
        let account = parse_accounts(&accounts)?
            .into_iter()
            .next()
            .ok_or_else(|| DriveError::Unknown("provider returned no accounts".into()))?;
        let chain = reconcile::active_chain(provider).await?;

        let identity = self.bind(account, chain);
        self.install_listener(provider);
        info!(account = %account.short(), chain = %chain, "Wallet connected");
        Ok(identity)
    }

    pub(crate) async fn restore_locked(
        &self,
        provider: &dyn SigningProvider,
    ) -> DriveResult<Option<Identity>> {
        let accounts = provider.request(ProviderRequest::Accounts).await?;
        let Some(account) = parse_accounts(&accounts)?.into_iter().next() else {
            debug!("No authorized accounts to restore");
            self.set_state(SessionState::Disconnected);
            return Ok(None);
        };
        let chain = reconcile::active_chain(provider).await?;

        let identity = self.bind(account, chain);
        self.install_listener(provider);
        info!(account = %account.short(), chain = %chain, "Session restored");
        Ok(Some(identity))
    }

    /// Full reload: drop the binding, then restore silently.
    pub(crate) async fn reload_locked(
        &self,
        provider: &dyn SigningProvider,
    ) -> DriveResult<Option<Identity>> {
        self.emit(SessionEvent::Reloading);
        self.clear_binding();
        self.restore_locked(provider).await
    }

    /// Re-bind the current session to `account`, keeping its chain.
    pub(crate) fn rebind_account(&self, account: Address) -> Option<Identity> {
        let identity = self.identity()?;
        if identity.address == account {
            return Some(identity);
        }
        let rebound = self.bind(account, identity.chain_id);
        self.emit(SessionEvent::AccountChanged(Some(account)));
        info!(account = %account.short(), "Account switched");
        Some(rebound)
    }

    /// Bind a new identity under a fresh epoch and derive its gateway.
    fn bind(&self, account: Address, chain: ChainId) -> Identity {
        let epoch = self.inner.epochs.advance();
        let identity = Identity::new(account, chain, epoch);
        let required = self.inner.required.chain_id;
        let state = if chain == required {
            SessionState::Connected(identity)
        } else {
            SessionState::NetworkMismatch { identity, required }
        };

        {
            let mut slot = self.inner.slot.write();
            slot.gateway = self.inner.factory.build(&identity);
            slot.state = state.clone();
        }
        self.emit(SessionEvent::StateChanged(state));
        identity
    }

    /// Invalidate the binding without changing the published state.
    fn clear_binding(&self) {
        self.inner.epochs.advance();
        let mut slot = self.inner.slot.write();
        slot.gateway = None;
        if slot.state.identity().is_some() {
            slot.state = SessionState::Disconnected;
        }
    }

    /// Clear everything and publish `Disconnected`.
    pub(crate) fn teardown(&self) {
        self.clear_binding();
        self.set_state(SessionState::Disconnected);
        self.emit(SessionEvent::AccountChanged(None));
        self.emit(SessionEvent::Disconnected);
    }

    /// Forget the listener handle without aborting it; used by the listener
    /// task itself when it decides to stop.
    pub(crate) fn release_listener(&self) {
        self.inner.listener.lock().take();
    }

    fn install_listener(&self, provider: &dyn SigningProvider) {
        let mut slot = self.inner.listener.lock();
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let events = provider.subscribe();
        let weak = Arc::downgrade(&self.inner);
        *slot = Some(tokio::spawn(listener::run(weak, events)));
        debug!("Provider listener installed");
    }

    pub(crate) fn provider(&self) -> DriveResult<Arc<dyn SigningProvider>> {
        self.inner
            .provider
            .clone()
            .ok_or(DriveError::ProviderUnavailable)
    }

    pub(crate) fn transition(&self) -> &tokio::sync::Mutex<()> {
        &self.inner.transition
    }

    fn set_state(&self, state: SessionState) {
        self.inner.slot.write().state = state.clone();
        self.emit(SessionEvent::StateChanged(state));
    }

    fn hint(&self, error: &DriveError) {
        self.emit(SessionEvent::Hint(error.to_string()));
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }
}

impl std::fmt::Debug for SessionNegotiator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionNegotiator")
            .field("state", &self.state())
            .field("required", &self.inner.required.chain_id)
            .field("epoch", &self.current_epoch())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockshare_core::testing::{InMemoryLedger, MockSigningProvider, test_address};
    use blockshare_core::{ErrorKind, ProviderError};

    const HARDHAT: ChainId = ChainId(31337);

    fn negotiator(provider: Option<Arc<MockSigningProvider>>) -> SessionNegotiator {
        let ledger = InMemoryLedger::new();
        let factory = GatewayFactory::new(Some(test_address(0xcc)), ledger.binder());
        SessionNegotiator::new(
            provider.map(|p| p as Arc<dyn SigningProvider>),
            NetworkDescriptor::hardhat_local(),
            Arc::new(factory),
        )
    }

    #[tokio::test]
    async fn test_missing_provider() {
        let session = negotiator(None);
        assert_eq!(
            session.connect().await.unwrap_err(),
            DriveError::ProviderUnavailable
        );
        assert_eq!(
            session.state(),
            SessionState::ConnectFailed(DriveError::ProviderUnavailable)
        );
        assert_eq!(
            session.restore_silent().await.unwrap_err().kind(),
            ErrorKind::ProviderUnavailable
        );
    }

    #[tokio::test]
    async fn test_connect_binds_identity_and_gateway() {
        let provider = Arc::new(MockSigningProvider::new(HARDHAT).with_account(test_address(0xa1)));
        let session = negotiator(Some(provider.clone()));

        let identity = session.connect().await.unwrap();
        assert_eq!(identity.address, test_address(0xa1));
        assert_eq!(session.state(), SessionState::Connected(identity));
        assert_eq!(session.gateway().unwrap().owner(), test_address(0xa1));
        assert!(session.is_current(identity.epoch));
        assert!(session.listener_installed());
    }

    #[tokio::test]
    async fn test_rejected_connect_can_be_retried() {
        let provider = Arc::new(MockSigningProvider::new(HARDHAT).with_account(test_address(0xa1)));
        provider.fail_next("eth_requestAccounts", ProviderError::user_rejected());
        let session = negotiator(Some(provider.clone()));

        assert_eq!(session.connect().await.unwrap_err(), DriveError::UserRejected);
        assert_eq!(
            session.state(),
            SessionState::ConnectFailed(DriveError::UserRejected)
        );
        assert!(session.gateway().is_none());

        session.connect().await.unwrap();
        assert!(session.state().is_connected());
    }

    #[tokio::test]
    async fn test_restore_without_authorization_stays_disconnected() {
        let provider = Arc::new(MockSigningProvider::new(HARDHAT).with_account(test_address(0xa1)));
        let session = negotiator(Some(provider.clone()));

        assert_eq!(session.restore_silent().await.unwrap(), None);
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(provider.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_clears_and_invalidates() {
        let provider = Arc::new(
            MockSigningProvider::new(HARDHAT)
                .with_account(test_address(0xa1))
                .authorized(),
        );
        let session = negotiator(Some(provider.clone()));
        let identity = session.restore_silent().await.unwrap().unwrap();

        session.disconnect().await;
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(session.gateway().is_none());
        assert!(!session.is_current(identity.epoch));
        assert!(!session.listener_installed());
    }

    #[tokio::test]
    async fn test_set_contract_rebuilds_gateway() {
        let provider = Arc::new(
            MockSigningProvider::new(HARDHAT)
                .with_account(test_address(0xa1))
                .authorized(),
        );
        let session = negotiator(Some(provider));
        session.restore_silent().await.unwrap();

        session.set_contract_address(None);
        assert!(session.gateway().is_none());

        session.set_contract_address(Some(test_address(0xdd)));
        assert_eq!(
            session.gateway().unwrap().contract_address(),
            test_address(0xdd)
        );
    }

    #[tokio::test]
    async fn test_ensure_network_requires_session() {
        let provider = Arc::new(MockSigningProvider::new(HARDHAT));
        let session = negotiator(Some(provider));
        assert_eq!(
            session.ensure_network().await.unwrap_err(),
            DriveError::NotConnected
        );
    }
}
