//! Provider event listener.
//!
//! One task per connected session. It holds only a weak reference to the
//! negotiator so a dropped session stops it.

use std::sync::Weak;

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use blockshare_core::ProviderEvent;

use crate::negotiator::{Inner, SessionNegotiator};

/// Whether the listener keeps running after an event.
enum Flow {
    Continue,
    Stop,
}

pub(crate) async fn run(inner: Weak<Inner>, mut events: broadcast::Receiver<ProviderEvent>) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Provider listener lagged");
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        let Some(inner) = inner.upgrade() else {
            break;
        };
        let session = SessionNegotiator::from_inner(inner);
        if let Flow::Stop = handle(&session, event).await {
            break;
        }
    }
    debug!("Provider listener stopped");
}

async fn handle(session: &SessionNegotiator, event: ProviderEvent) -> Flow {
    let _transition = session.transition().lock().await;

    match event {
        ProviderEvent::AccountsChanged(accounts) => match accounts.first() {
            None => {
                info!("Wallet reported no accounts; tearing down session");
                session.release_listener();
                session.teardown();
                Flow::Stop
            }
            Some(&account) => {
                if session.rebind_account(account).is_none() {
                    debug!("Account change ignored; no session bound");
                }
                Flow::Continue
            }
        },
        ProviderEvent::ChainChanged(chain) => {
            let Some(identity) = session.identity() else {
                debug!(%chain, "Chain change ignored; no session bound");
                return Flow::Continue;
            };
            if identity.chain_id == chain {
                debug!(%chain, "Chain change already applied");
                return Flow::Continue;
            }

            info!(from = %identity.chain_id, to = %chain, "Network changed; reloading session");
            let provider = match session.provider() {
                Ok(provider) => provider,
                Err(_) => return Flow::Stop,
            };
            if let Err(e) = session.reload_locked(provider.as_ref()).await {
                warn!(error = %e, "Session reload failed");
                session.teardown();
            }
            Flow::Continue
        }
    }
}
