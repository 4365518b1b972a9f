//! Network reconciliation: bring the provider onto the required chain.
//!
//! Protocol: read `eth_chainId`; if it differs, `wallet_switchEthereumChain`.
//! A 4902 answer means the wallet does not know the chain, so
//! `wallet_addEthereumChain` is sent with the full descriptor and the switch
//! is retried once.

use tracing::{debug, info, warn};

use blockshare_core::{
    ChainId, DriveError, DriveResult, NetworkDescriptor, ProviderError, ProviderRequest,
    SigningProvider, parse_chain_id,
};

/// How a reconciliation attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    /// Already on the required chain.
    Matched,
    /// The provider switched (possibly after adding the chain).
    Switched,
    /// The user declined the switch or add prompt.
    Declined,
    /// A prompt of the same kind is already open in the wallet.
    Pending,
}

impl Reconciled {
    pub fn on_required_chain(&self) -> bool {
        matches!(self, Self::Matched | Self::Switched)
    }

    /// The error to report when a mutation cannot proceed.
    pub fn blocking_error(&self) -> Option<DriveError> {
        match self {
            Self::Matched | Self::Switched => None,
            Self::Declined => Some(DriveError::UserRejected),
            Self::Pending => Some(DriveError::RequestAlreadyPending),
        }
    }
}

pub(crate) async fn active_chain(provider: &dyn SigningProvider) -> DriveResult<ChainId> {
    let value = provider.request(ProviderRequest::ChainId).await?;
    Ok(parse_chain_id(&value)?)
}

/// Run the reconciliation protocol.
///
/// Only two outcomes are errors: the add failing for a reason other than
/// rejection or a pending prompt, and the chain still being unrecognised
/// after a successful add.
pub(crate) async fn reconcile(
    provider: &dyn SigningProvider,
    required: &NetworkDescriptor,
) -> DriveResult<Reconciled> {
    let active = active_chain(provider).await?;
    if active == required.chain_id {
        debug!(chain = %active, "Provider already on required network");
        return Ok(Reconciled::Matched);
    }

    info!(active = %active, required = %required.chain_id, "Switching network");
    match switch(provider, required.chain_id).await {
        Ok(()) => Ok(Reconciled::Switched),
        Err(e) if e.is_unrecognized_chain() => add_then_switch(provider, required).await,
        Err(e) => Ok(soft_failure("switch", e)),
    }
}

async fn add_then_switch(
    provider: &dyn SigningProvider,
    required: &NetworkDescriptor,
) -> DriveResult<Reconciled> {
    info!(chain = %required.chain_id, name = %required.chain_name, "Adding network to provider");
    match provider
        .request(ProviderRequest::AddChain(required.clone()))
        .await
    {
        Ok(_) => {}
        Err(e) if e.is_user_rejected() || e.is_request_pending() => {
            return Ok(soft_failure("add", e));
        }
        Err(e) => {
            warn!(error = %e, "Provider refused to add network");
            return Err(e.into());
        }
    }

    match switch(provider, required.chain_id).await {
        Ok(()) => Ok(Reconciled::Switched),
        Err(e) if e.is_unrecognized_chain() => {
            warn!(chain = %required.chain_id, "Network still unrecognised after add");
            Err(DriveError::Unknown(format!(
                "provider does not recognise chain {} after adding it",
                required.chain_id.to_hex()
            )))
        }
        Err(e) => Ok(soft_failure("switch", e)),
    }
}

async fn switch(provider: &dyn SigningProvider, chain: ChainId) -> Result<(), ProviderError> {
    provider
        .request(ProviderRequest::SwitchChain(chain))
        .await
        .map(|_| ())
}

fn soft_failure(step: &str, e: ProviderError) -> Reconciled {
    if e.is_request_pending() {
        debug!(step, "Network prompt already pending");
        Reconciled::Pending
    } else {
        if !e.is_user_rejected() {
            warn!(step, error = %e, "Network change failed; staying on current network");
        }
        Reconciled::Declined
    }
}
