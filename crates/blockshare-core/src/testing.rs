//! In-memory doubles for the boundary traits.
//!
//! Used by the unit and integration tests of every BlockShare crate so the
//! orchestration logic can be exercised without a wallet, a chain, or a
//! pinning service.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use blockshare_core::testing::{InMemoryLedger, MockSigningProvider};
//!
//! let provider = MockSigningProvider::new(ChainId(1))
//!     .with_account(alice)
//!     .knows_chain(ChainId(31337));
//! let ledger = InMemoryLedger::new();
//! let binder = ledger.binder();
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::{Notify, broadcast, watch};

use crate::capability::CapabilityEntry;
use crate::error::{ContractError, PinError, ProviderError};
use crate::identity::{Address, ChainId, Identity};
use crate::pointer::ContentId;
use crate::provider::{ProviderEvent, ProviderRequest, SigningProvider};
use crate::registry::{ContractBinder, RegistryContract, TxHash, TxReceipt};
use crate::storage::{PinRequest, PinningService, TransferProgress};

/// Deterministic test address: every byte set to `byte`.
pub fn test_address(byte: u8) -> Address {
    Address::from_bytes([byte; 20])
}

// ============================================================================
// Signing provider
// ============================================================================

struct ProviderState {
    accounts: Vec<Address>,
    authorized: bool,
    active_chain: ChainId,
    known_chains: HashSet<ChainId>,
    failures: HashMap<&'static str, VecDeque<ProviderError>>,
    log: Vec<ProviderRequest>,
}

/// Scriptable wallet double.
///
/// Behaves like an injected browser wallet: `eth_accounts` only reports
/// accounts once authorized, `eth_requestAccounts` authorizes, switching to
/// an unknown chain fails with 4902 until the chain is added. Failures can be
/// queued per method and account requests can be held open with a gate.
pub struct MockSigningProvider {
    state: Mutex<ProviderState>,
    events: broadcast::Sender<ProviderEvent>,
    gate: Mutex<Option<Arc<Notify>>>,
    prompts: AtomicUsize,
}

impl MockSigningProvider {
    /// A provider on `active_chain` with no accounts.
    pub fn new(active_chain: ChainId) -> Self {
        let (events, _) = broadcast::channel(64);
        let mut known_chains = HashSet::new();
        known_chains.insert(active_chain);
        Self {
            state: Mutex::new(ProviderState {
                accounts: Vec::new(),
                authorized: false,
                active_chain,
                known_chains,
                failures: HashMap::new(),
                log: Vec::new(),
            }),
            events,
            gate: Mutex::new(None),
            prompts: AtomicUsize::new(0),
        }
    }

    pub fn with_account(self, account: Address) -> Self {
        self.state.lock().accounts.push(account);
        self
    }

    /// Mark accounts as already authorized, as after an earlier session.
    pub fn authorized(self) -> Self {
        self.state.lock().authorized = true;
        self
    }

    pub fn knows_chain(self, chain: ChainId) -> Self {
        self.state.lock().known_chains.insert(chain);
        self
    }

    /// Queue `error` for the next request with the given method name.
    pub fn fail_next(&self, method: &'static str, error: ProviderError) {
        self.state
            .lock()
            .failures
            .entry(method)
            .or_default()
            .push_back(error);
    }

    /// Hold every `eth_requestAccounts` until [`Self::release_account_request`].
    pub fn gate_account_requests(&self) {
        *self.gate.lock() = Some(Arc::new(Notify::new()));
    }

    pub fn release_account_request(&self) {
        if let Some(gate) = self.gate.lock().as_ref() {
            gate.notify_one();
        }
    }

    /// Number of user-facing prompts opened so far.
    pub fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.state.lock().log.clone()
    }

    pub fn count(&self, method: &str) -> usize {
        self.state
            .lock()
            .log
            .iter()
            .filter(|r| r.method() == method)
            .count()
    }

    pub fn active_chain(&self) -> ChainId {
        self.state.lock().active_chain
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    /// Simulate the user switching accounts in the wallet.
    pub fn emit_accounts_changed(&self, accounts: Vec<Address>) {
        {
            let mut state = self.state.lock();
            state.accounts = accounts.clone();
            if accounts.is_empty() {
                state.authorized = false;
            }
        }
        let _ = self.events.send(ProviderEvent::AccountsChanged(accounts));
    }

    /// Simulate the user switching networks in the wallet.
    pub fn emit_chain_changed(&self, chain: ChainId) {
        {
            let mut state = self.state.lock();
            state.active_chain = chain;
            state.known_chains.insert(chain);
        }
        let _ = self.events.send(ProviderEvent::ChainChanged(chain));
    }

    fn take_failure(&self, method: &'static str) -> Option<ProviderError> {
        self.state
            .lock()
            .failures
            .get_mut(method)
            .and_then(VecDeque::pop_front)
    }

    fn account_list(state: &ProviderState) -> Value {
        if state.authorized {
            json!(state.accounts.iter().map(Address::to_hex).collect::<Vec<_>>())
        } else {
            json!([])
        }
    }
}

#[async_trait]
impl SigningProvider for MockSigningProvider {
    async fn request(&self, request: ProviderRequest) -> Result<Value, ProviderError> {
        let method = request.method();
        self.state.lock().log.push(request.clone());
        if request.prompts() {
            self.prompts.fetch_add(1, Ordering::SeqCst);
        }

        if matches!(request, ProviderRequest::RequestAccounts) {
            let gate = self.gate.lock().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
        }

        if let Some(err) = self.take_failure(method) {
            return Err(err);
        }

        match request {
            ProviderRequest::Accounts => Ok(Self::account_list(&self.state.lock())),
            ProviderRequest::RequestAccounts => {
                let mut state = self.state.lock();
                if state.accounts.is_empty() {
                    return Err(ProviderError::user_rejected());
                }
                state.authorized = true;
                Ok(Self::account_list(&state))
            }
            ProviderRequest::ChainId => Ok(json!(self.state.lock().active_chain.to_hex())),
            ProviderRequest::SwitchChain(chain) => {
                let changed = {
                    let mut state = self.state.lock();
                    if !state.known_chains.contains(&chain) {
                        return Err(ProviderError::unrecognized_chain(&chain.to_hex()));
                    }
                    let changed = state.active_chain != chain;
                    state.active_chain = chain;
                    changed
                };
                if changed {
                    let _ = self.events.send(ProviderEvent::ChainChanged(chain));
                }
                Ok(Value::Null)
            }
            ProviderRequest::AddChain(descriptor) => {
                self.state.lock().known_chains.insert(descriptor.chain_id);
                Ok(Value::Null)
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}

// ============================================================================
// Registry ledger
// ============================================================================

/// Which ledger call a queued fault applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerCall {
    Add,
    Allow,
    Disallow,
    Display,
    ShareAccess,
    Confirm,
}

#[derive(Default)]
struct LedgerState {
    files: HashMap<Address, Vec<String>>,
    grants: HashMap<Address, Vec<CapabilityEntry>>,
    receipts: HashMap<TxHash, bool>,
    faults: HashMap<LedgerCall, VecDeque<ContractError>>,
    failing_receipts: usize,
    calls: HashMap<LedgerCall, usize>,
}

/// Shared simulation of the registry contract.
///
/// Access rules: only the signer may extend its own list; `display(owner)`
/// succeeds for the owner or an active grantee and reverts otherwise;
/// `allow` re-activates an existing entry before appending a new one;
/// `disallow` deactivates without removing.
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<Mutex<LedgerState>>,
    next_tx: Arc<AtomicU64>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A contract view signed by `signer`.
    pub fn registry_for(&self, signer: Address) -> InMemoryRegistry {
        InMemoryRegistry {
            ledger: self.clone(),
            signer,
        }
    }

    pub fn binder(&self) -> Arc<InMemoryBinder> {
        Arc::new(InMemoryBinder {
            ledger: self.clone(),
            bound: Mutex::new(Vec::new()),
        })
    }

    /// Queue a fault for the next call of `call`.
    pub fn fail_next(&self, call: LedgerCall, error: ContractError) {
        self.state
            .lock()
            .faults
            .entry(call)
            .or_default()
            .push_back(error);
    }

    /// Make the next `confirm` report a failed receipt.
    pub fn fail_next_receipt(&self) {
        self.state.lock().failing_receipts += 1;
    }

    pub fn calls(&self, call: LedgerCall) -> usize {
        self.state.lock().calls.get(&call).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().calls.values().sum()
    }

    /// Pointers stored for `owner`, bypassing the access check.
    pub fn stored(&self, owner: Address) -> Vec<String> {
        self.state.lock().files.get(&owner).cloned().unwrap_or_default()
    }

    /// Seed pointers for `owner` directly.
    pub fn seed(&self, owner: Address, pointers: &[&str]) {
        self.state
            .lock()
            .files
            .entry(owner)
            .or_default()
            .extend(pointers.iter().map(|p| p.to_string()));
    }

    fn enter(&self, call: LedgerCall) -> Result<(), ContractError> {
        let mut state = self.state.lock();
        *state.calls.entry(call).or_insert(0) += 1;
        match state.faults.get_mut(&call).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn mint_tx(&self, state: &mut LedgerState, success: bool) -> TxHash {
        let n = self.next_tx.fetch_add(1, Ordering::SeqCst) + 1;
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&n.to_be_bytes());
        let tx = TxHash(bytes);
        state.receipts.insert(tx, success);
        tx
    }

    fn can_read(state: &LedgerState, owner: Address, reader: Address) -> bool {
        owner == reader
            || state
                .grants
                .get(&owner)
                .is_some_and(|list| list.iter().any(|e| e.grantee == reader && e.active))
    }
}

/// [`RegistryContract`] view of an [`InMemoryLedger`] bound to one signer.
#[derive(Clone)]
pub struct InMemoryRegistry {
    ledger: InMemoryLedger,
    signer: Address,
}

impl InMemoryRegistry {
    pub fn signer(&self) -> Address {
        self.signer
    }
}

#[async_trait]
impl RegistryContract for InMemoryRegistry {
    async fn add(&self, owner: Address, pointer: &str) -> Result<TxHash, ContractError> {
        self.ledger.enter(LedgerCall::Add)?;
        if owner != self.signer {
            return Err(ContractError::Reverted("only the owner can add files".into()));
        }
        let mut state = self.ledger.state.lock();
        state.files.entry(owner).or_default().push(pointer.to_string());
        Ok(self.ledger.mint_tx(&mut state, true))
    }

    async fn allow(&self, grantee: Address) -> Result<TxHash, ContractError> {
        self.ledger.enter(LedgerCall::Allow)?;
        let mut state = self.ledger.state.lock();
        let list = state.grants.entry(self.signer).or_default();
        match list.iter_mut().find(|e| e.grantee == grantee) {
            Some(entry) => entry.active = true,
            None => list.push(CapabilityEntry::active(grantee)),
        }
        Ok(self.ledger.mint_tx(&mut state, true))
    }

    async fn disallow(&self, grantee: Address) -> Result<TxHash, ContractError> {
        self.ledger.enter(LedgerCall::Disallow)?;
        let mut state = self.ledger.state.lock();
        if let Some(entry) = state
            .grants
            .get_mut(&self.signer)
            .and_then(|list| list.iter_mut().find(|e| e.grantee == grantee))
        {
            entry.active = false;
        }
        Ok(self.ledger.mint_tx(&mut state, true))
    }

    async fn display(&self, owner: Address) -> Result<Vec<String>, ContractError> {
        self.ledger.enter(LedgerCall::Display)?;
        let state = self.ledger.state.lock();
        if !InMemoryLedger::can_read(&state, owner, self.signer) {
            return Err(ContractError::Reverted("You don't have access".into()));
        }
        Ok(state.files.get(&owner).cloned().unwrap_or_default())
    }

    async fn share_access(&self) -> Result<Vec<CapabilityEntry>, ContractError> {
        self.ledger.enter(LedgerCall::ShareAccess)?;
        Ok(self
            .ledger
            .state
            .lock()
            .grants
            .get(&self.signer)
            .cloned()
            .unwrap_or_default())
    }

    async fn confirm(&self, tx: TxHash) -> Result<TxReceipt, ContractError> {
        self.ledger.enter(LedgerCall::Confirm)?;
        let mut state = self.ledger.state.lock();
        let mut success = *state
            .receipts
            .get(&tx)
            .ok_or_else(|| ContractError::Transport(format!("unknown transaction {tx}")))?;
        if state.failing_receipts > 0 {
            state.failing_receipts -= 1;
            success = false;
        }
        Ok(TxReceipt {
            tx,
            success,
            block_number: Some(state.receipts.len() as u64),
        })
    }
}

/// [`ContractBinder`] over an [`InMemoryLedger`]; records every binding.
pub struct InMemoryBinder {
    ledger: InMemoryLedger,
    bound: Mutex<Vec<(Address, Address)>>,
}

impl InMemoryBinder {
    /// `(contract, signer)` pairs bound so far.
    pub fn bindings(&self) -> Vec<(Address, Address)> {
        self.bound.lock().clone()
    }
}

impl ContractBinder for InMemoryBinder {
    fn bind(&self, contract: Address, signer: &Identity) -> Arc<dyn RegistryContract> {
        self.bound.lock().push((contract, signer.address));
        Arc::new(self.ledger.registry_for(signer.address))
    }
}

// ============================================================================
// Pinning service
// ============================================================================

/// Pinning double that reports progress in fixed steps.
pub struct MockPinningService {
    cid: Option<ContentId>,
    steps: u64,
    failures: Mutex<VecDeque<PinError>>,
    pinned: Mutex<Vec<PinRequest>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl MockPinningService {
    /// Returns a blake3-derived CID for whatever is pinned.
    pub fn new() -> Self {
        Self {
            cid: None,
            steps: 4,
            failures: Mutex::new(VecDeque::new()),
            pinned: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
        }
    }

    /// Always returns `cid`.
    pub fn returning(cid: impl Into<String>) -> Self {
        Self {
            cid: Some(ContentId::new(cid)),
            ..Self::new()
        }
    }

    pub fn fail_next(&self, error: PinError) {
        self.failures.lock().push_back(error);
    }

    /// Hold the next pin after its first progress update until released.
    pub fn gate(&self) {
        *self.gate.lock() = Some(Arc::new(Notify::new()));
    }

    pub fn release(&self) {
        if let Some(gate) = self.gate.lock().take() {
            gate.notify_one();
        }
    }

    pub fn pinned(&self) -> Vec<PinRequest> {
        self.pinned.lock().clone()
    }

    pub fn pin_count(&self) -> usize {
        self.pinned.lock().len()
    }
}

impl Default for MockPinningService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PinningService for MockPinningService {
    async fn pin(
        &self,
        request: PinRequest,
        progress: watch::Sender<TransferProgress>,
    ) -> Result<ContentId, PinError> {
        self.pinned.lock().push(request.clone());
        if let Some(err) = self.failures.lock().pop_front() {
            return Err(err);
        }

        let total = request.size();
        for step in 1..=self.steps {
            progress.send_replace(TransferProgress::new(total * step / self.steps, total));
            if step == 1 {
                let gate = self.gate.lock().clone();
                if let Some(gate) = gate {
                    gate.notified().await;
                }
            }
            tokio::task::yield_now().await;
        }

        Ok(self
            .cid
            .clone()
            .unwrap_or_else(|| ContentId::digest_of(&request.bytes)))
    }
}
