//! Whole workflows: connect, upload, share, browse.

mod common;

use std::time::Duration;

use blockshare_core::testing::{LedgerCall, MockSigningProvider, test_address};
use blockshare_core::{ChainId, ProviderRequest};
use blockshare_drive::{ItemState, SelectedFile};
use blockshare_session::SessionState;

use common::{HARDHAT, HarnessBuilder, connected, owner};

const MAINNET: ChainId = ChainId(1);

async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !check() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn test_upload_then_gallery_lists_it() {
    let h = connected().await;

    let file = SelectedFile::new(
        "archive.bin",
        "application/octet-stream",
        vec![0x5au8; 2 * 1024 * 1024],
    );
    let outcome = h.drive.upload(file).await.unwrap();
    assert_eq!(outcome.cid.as_str(), "Qm123");
    assert!(!outcome.compressed);
    assert!(outcome.receipt.success);

    let gallery = h.drive.gallery(None).await.unwrap();
    assert_eq!(gallery.owner(), owner());
    assert_eq!(gallery.items().len(), 1);
    assert!(gallery.items()[0].url.contains("Qm123"));
    assert!(!gallery.items()[0].url.contains("ipfs://"));

    let mut view = h.drive.open_gallery(None).await.unwrap();
    let items = view.settle().await;
    assert!(matches!(items[0].state, ItemState::Loaded(_)));
}

#[tokio::test]
async fn test_connect_adds_and_switches_network() {
    let provider = MockSigningProvider::new(MAINNET).with_account(owner());
    let h = HarnessBuilder::new().provider(provider).build();

    let identity = h.drive.connect().await.unwrap();
    assert_eq!(identity.address, owner());
    assert_eq!(identity.chain_id, HARDHAT);
    assert_eq!(h.provider.active_chain(), HARDHAT);

    let methods: Vec<_> = h
        .provider
        .requests()
        .iter()
        .map(ProviderRequest::method)
        .collect();
    let switch = methods
        .iter()
        .position(|m| *m == "wallet_switchEthereumChain")
        .unwrap();
    let add = methods
        .iter()
        .position(|m| *m == "wallet_addEthereumChain")
        .unwrap();
    let request = methods
        .iter()
        .position(|m| *m == "eth_requestAccounts")
        .unwrap();
    assert!(switch < add && add < request, "{methods:?}");
    assert_eq!(h.provider.count("wallet_switchEthereumChain"), 2);

    assert!(matches!(h.drive.session().state(), SessionState::Connected(_)));
    assert!(h.drive.gateway().is_ok());
}

#[tokio::test]
async fn test_silent_restore_does_not_prompt() {
    let h = connected().await;
    assert_eq!(h.provider.prompt_count(), 0);
    assert_eq!(h.provider.count("eth_requestAccounts"), 0);
}

#[tokio::test]
async fn test_write_after_network_drift_switches_back() {
    let h = connected().await;
    h.provider.emit_chain_changed(MAINNET);
    eventually("network mismatch", || {
        matches!(
            h.drive.session().state(),
            SessionState::NetworkMismatch { .. }
        )
    })
    .await;

    // Reads keep working on the mismatched binding.
    assert!(h.drive.gallery(None).await.is_ok());

    let friend = test_address(0xb2);
    h.drive.grant(&friend.to_hex()).await.unwrap();
    assert_eq!(h.provider.active_chain(), HARDHAT);
    assert_eq!(h.ledger.calls(LedgerCall::Allow), 1);
}

#[tokio::test]
async fn test_share_then_friend_browses() {
    let h = connected().await;
    h.drive
        .upload(SelectedFile::new("notes.txt", "text/plain", b"shared".to_vec()))
        .await
        .unwrap();

    let friend = test_address(0xb2);
    h.drive.grant(&friend.to_hex()).await.unwrap();

    h.provider.emit_accounts_changed(vec![friend]);
    eventually("friend bound", || {
        h.drive.identity().map(|i| i.address) == Some(friend)
    })
    .await;

    let theirs = h.drive.gallery(Some(&owner().to_hex())).await.unwrap();
    assert_eq!(theirs.owner(), owner());
    assert_eq!(theirs.items().len(), 1);

    let own = h.drive.gallery(None).await.unwrap();
    assert!(own.items().is_empty());
}

#[tokio::test]
async fn test_disconnect_clears_drive() {
    let h = connected().await;
    h.drive.disconnect().await;

    assert!(h.drive.identity().is_none());
    assert!(h.drive.gateway().is_err());
    assert!(h.drive.capabilities().await.is_err());
    assert!(!h.drive.session().listener_installed());
}
