//! Selection, connect, and disconnect flows through the public session API.

mod common;

use std::time::Duration;

use alloy::primitives::Address;
use common::{cafe, connected, fluent_core, harness, harness_with, metamask};
use wallet_session::error::ErrorKind;
use wallet_session::provider::{SimFlavor, SimWallet};
use wallet_session::{Account, ChainId, ChangeEvent, SessionState, WalletError};

#[tokio::test]
async fn test_registry_lists_spaces_and_providers() {
    let h = harness();
    let registry = h.manager.registry();

    let spaces: Vec<_> = registry.list_spaces().iter().map(|s| s.as_str()).collect();
    assert_eq!(spaces, vec!["espace", "core"]);

    let espace: Vec<_> = registry
        .list_providers(registry.resolve_space("espace").unwrap())
        .unwrap()
        .iter()
        .map(|d| d.name())
        .collect();
    assert_eq!(espace, vec!["MetaMask", "Fluent"]);

    let core: Vec<_> = registry
        .list_providers(registry.resolve_space("core").unwrap())
        .unwrap()
        .iter()
        .map(|d| d.name())
        .collect();
    assert_eq!(core, vec!["Fluent"]);
}

#[tokio::test]
async fn test_unknown_provider_keeps_space_selected() {
    let h = harness();
    h.manager.select_space("espace").await.unwrap();

    let err = h.manager.select_provider("Missing").await.unwrap_err();
    assert!(matches!(err, WalletError::InvalidProvider { .. }));
    assert_eq!(h.manager.state().await, SessionState::SpaceSelected);
    assert!(h.manager.provider().await.is_none());
    assert!(h.log.events().is_empty());
}

#[tokio::test]
async fn test_metamask_is_not_offered_in_core() {
    let h = harness();
    h.manager.select_space("core").await.unwrap();

    let err = h.manager.select_provider("MetaMask").await.unwrap_err();
    assert!(matches!(err, WalletError::InvalidProvider { .. }));
    assert_eq!(h.manager.state().await, SessionState::SpaceSelected);
}

#[tokio::test]
async fn test_connect_in_espace() {
    let h = harness();
    h.manager.select_space("espace").await.unwrap();
    h.manager.select_provider("metamask").await.unwrap();
    assert_eq!(h.manager.state().await, SessionState::ProviderSelected);
    assert!(h.manager.is_wallet_installed().await);

    let account = h.manager.connect().await.unwrap();
    assert_eq!(account, Account::Hex(cafe()));
    assert_eq!(h.manager.state().await, SessionState::Connected);
    assert_eq!(h.manager.get_chain_id().await, Some(ChainId(1030)));

    assert_eq!(
        h.log.events(),
        vec![ChangeEvent::ConnectionEstablished {
            account,
            chain_id: ChainId(1030),
        }]
    );
}

#[tokio::test]
async fn test_connect_in_core_uses_base32_account() {
    let h = connected("core", "Fluent").await;

    let account = h.manager.get_account().await.unwrap();
    assert!(account.to_string().starts_with("cfx:"));
    assert_eq!(account.address(), cafe());
    assert_eq!(h.manager.get_chain_id().await, Some(ChainId(1029)));
    assert_eq!(h.manager.get_chain_info().await.unwrap().id, ChainId(1029));
}

#[tokio::test]
async fn test_connect_is_idempotent() {
    let h = connected("espace", "MetaMask").await;
    let first = h.manager.get_account().await.unwrap();

    let again = h.manager.connect().await.unwrap();
    assert_eq!(again, first);
    assert_eq!(h.manager.state().await, SessionState::Connected);
    // One set of listeners, not two.
    assert_eq!(h.ethereum.listener_count(), 2);
}

#[tokio::test]
async fn test_rejected_connect_stays_provider_selected() {
    let wallet = SimWallet::builder(SimFlavor::Evm)
        .metamask()
        .accounts(vec![cafe()])
        .reject_connect()
        .build();
    let h = harness_with(wallet, fluent_core());
    h.manager.select_space("espace").await.unwrap();
    h.manager.select_provider("MetaMask").await.unwrap();

    let err = h.manager.connect().await.unwrap_err();
    assert!(matches!(err, WalletError::ConnectionRejected(_)));
    assert_eq!(h.manager.state().await, SessionState::ProviderSelected);
    assert!(h.manager.get_account().await.is_none());
    assert_eq!(h.ethereum.listener_count(), 0);

    match h.log.events().as_slice() {
        [ChangeEvent::ErrorRaised { kind, .. }] => assert_eq!(*kind, ErrorKind::ConnectionRejected),
        other => panic!("unexpected events: {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_wallet_fails_with_no_accounts() {
    let wallet = SimWallet::builder(SimFlavor::Evm)
        .metamask()
        .accounts(Vec::<Address>::new())
        .build();
    let h = harness_with(wallet, fluent_core());
    h.manager.select_space("espace").await.unwrap();
    h.manager.select_provider("MetaMask").await.unwrap();

    assert_eq!(h.manager.connect().await, Err(WalletError::NoAccounts));
    assert_eq!(h.manager.state().await, SessionState::ProviderSelected);
}

#[tokio::test]
async fn test_connect_switches_wallet_to_required_chain() {
    let wallet = SimWallet::builder(SimFlavor::Evm)
        .metamask()
        .accounts(vec![cafe()])
        .chain_id(1)
        .build();
    let h = harness_with(wallet, fluent_core());
    h.manager.select_space("espace").await.unwrap();
    h.manager.select_provider("MetaMask").await.unwrap();

    h.manager.connect().await.unwrap();
    assert_eq!(h.manager.get_chain_id().await, Some(ChainId(1030)));
    assert_eq!(h.ethereum.chain_id(), ChainId(1030));
}

#[tokio::test]
async fn test_rejected_switch_fails_connect() {
    let wallet = SimWallet::builder(SimFlavor::Evm)
        .metamask()
        .accounts(vec![cafe()])
        .chain_id(1)
        .reject_switch()
        .build();
    let h = harness_with(wallet, fluent_core());
    h.manager.select_space("espace").await.unwrap();
    h.manager.select_provider("MetaMask").await.unwrap();

    let err = h.manager.connect().await.unwrap_err();
    assert!(matches!(
        err,
        WalletError::ChainSwitchFailed {
            target: ChainId(1030),
            ..
        }
    ));
    assert_eq!(h.manager.state().await, SessionState::ProviderSelected);
}

#[tokio::test]
async fn test_missing_wallet_is_not_installed() {
    // The Ethereum slot holds MetaMask, so Fluent is not detected in eSpace.
    let h = harness_with(metamask(), fluent_core());
    h.manager.select_space("espace").await.unwrap();
    h.manager.select_provider("Fluent").await.unwrap();

    assert!(!h.manager.is_wallet_installed().await);
    assert!(matches!(
        h.manager.connect().await,
        Err(WalletError::ProviderUnavailable(_))
    ));
    assert_eq!(h.manager.state().await, SessionState::ProviderSelected);
}

#[tokio::test]
async fn test_disconnect_emits_connection_lost_once() {
    let h = connected("espace", "MetaMask").await;

    h.manager.disconnect().await;
    assert_eq!(h.log.events(), vec![ChangeEvent::ConnectionLost]);
    assert_eq!(h.manager.state().await, SessionState::ProviderSelected);
    assert!(h.manager.get_account().await.is_none());
    assert!(h.manager.get_chain_id().await.is_none());
    assert_eq!(h.ethereum.listener_count(), 0);

    // The space and provider selection survive a disconnect.
    assert_eq!(h.manager.provider().await.unwrap().name(), "MetaMask");
    h.manager.connect().await.unwrap();
    assert_eq!(h.manager.state().await, SessionState::Connected);
}

#[tokio::test]
async fn test_space_switch_tears_down_connection() {
    let h = connected("espace", "MetaMask").await;

    h.manager.select_space("core").await.unwrap();
    assert_eq!(h.log.events(), vec![ChangeEvent::ConnectionLost]);
    assert_eq!(h.manager.state().await, SessionState::SpaceSelected);
    assert!(h.manager.provider().await.is_none());
    assert_eq!(h.ethereum.listener_count(), 0);

    h.manager.select_provider("Fluent").await.unwrap();
    h.manager.connect().await.unwrap();
    assert_eq!(h.manager.get_chain_id().await, Some(ChainId(1029)));
}

#[tokio::test]
async fn test_snapshot_reflects_connection() {
    let h = connected("espace", "MetaMask").await;

    let snapshot = serde_json::to_value(h.manager.snapshot().await).unwrap();
    assert_eq!(snapshot["state"], "connected");
    assert_eq!(snapshot["space"], "espace");
    assert_eq!(snapshot["provider"], "MetaMask");
    assert_eq!(snapshot["installed"], true);
    assert_eq!(snapshot["chain_id"], 1030);
}

#[tokio::test]
async fn test_reconnect_hides_previous_connection_until_handshake_settles() {
    let wallet = SimWallet::builder(SimFlavor::Evm)
        .metamask()
        .accounts(vec![cafe()])
        .latency(Duration::from_millis(50))
        .build();
    let h = harness_with(wallet, fluent_core());
    h.manager.select_space("espace").await.unwrap();
    h.manager.select_provider("MetaMask").await.unwrap();
    h.manager.connect().await.unwrap();

    let reconnect = tokio::spawn({
        let manager = h.manager.clone();
        async move { manager.connect().await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(h.manager.state().await, SessionState::ProviderSelected);
    assert!(h.manager.get_account().await.is_none());
    assert!(h.manager.get_chain_id().await.is_none());
    assert_eq!(h.manager.get_balance().await, Err(WalletError::NotConnected));

    assert_eq!(reconnect.await.unwrap(), Ok(Account::Hex(cafe())));
    assert_eq!(h.manager.state().await, SessionState::Connected);
    assert_eq!(h.manager.get_chain_id().await, Some(ChainId(1030)));
}

#[tokio::test]
async fn test_switch_network_requires_connection() {
    let h = harness();
    h.manager.select_space("espace").await.unwrap();
    h.manager.select_provider("MetaMask").await.unwrap();

    assert_eq!(h.manager.switch_network().await, Err(WalletError::NotConnected));
    assert!(h.log.events().is_empty());
}

#[tokio::test]
async fn test_switch_network_returns_to_required_chain() {
    let h = connected("espace", "MetaMask").await;
    h.ethereum.set_reject_switch(true);
    h.ethereum.set_chain(1);
    assert!(h.log.wait_for("chain_changed", 1).await);

    h.ethereum.set_reject_switch(false);
    h.log.clear();

    assert_eq!(h.manager.switch_network().await, Ok(ChainId(1030)));
    assert_eq!(h.manager.get_chain_id().await, Some(ChainId(1030)));
    assert_eq!(h.ethereum.chain_id(), ChainId(1030));
    assert_eq!(h.log.count("network_switched"), 1);
    assert!(h.log.events().contains(&ChangeEvent::NetworkSwitched {
        chain_id: ChainId(1030)
    }));
    assert_eq!(h.manager.state().await, SessionState::Connected);
}

#[tokio::test]
async fn test_refused_network_switch_keeps_connection() {
    let h = connected("espace", "MetaMask").await;
    h.ethereum.set_reject_switch(true);
    h.ethereum.set_chain(1);
    assert!(h.log.wait_for("chain_changed", 1).await);
    h.log.clear();

    let err = h.manager.switch_network().await.unwrap_err();
    assert!(matches!(
        err,
        WalletError::ChainSwitchFailed {
            target: ChainId(1030),
            ..
        }
    ));

    let kinds: Vec<_> = h
        .log
        .events()
        .into_iter()
        .filter_map(|e| match e {
            ChangeEvent::ErrorRaised { kind, .. } => Some(kind),
            _ => None,
        })
        .collect();
    assert_eq!(kinds, vec![ErrorKind::ChainSwitchFailed]);
    assert_eq!(h.log.count("network_switched"), 0);
    assert_eq!(h.manager.state().await, SessionState::Connected);
    assert_eq!(h.manager.get_chain_id().await, Some(ChainId(1)));
}
