//! Shared utilities for session integration tests.

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{Address, U256};
use wallet_session::config::SessionConfig;
use wallet_session::provider::{InjectionSlot, SimFlavor, SimWallet, StaticDiscovery};
use wallet_session::{ChangeEvent, SessionManager};

pub const CAFE: &str = "0xcafe000000000000000000000000000000000001";
pub const BEEF: &str = "0xbeef000000000000000000000000000000000002";

pub fn cafe() -> Address {
    Address::from_str(CAFE).unwrap()
}

pub fn beef() -> Address {
    Address::from_str(BEEF).unwrap()
}

/// One whole CFX in drip/wei.
pub fn cfx(units: u64) -> U256 {
    U256::from(units) * U256::from(1_000_000_000_000_000_000u128)
}

/// Config with a short poll interval so confirmation tests run quickly.
pub fn fast_config() -> SessionConfig {
    let mut config = SessionConfig::default();
    config.confirmation.poll_interval_ms = 2;
    config.confirmation.max_attempts = 10;
    config.provider.request_timeout_secs = 2;
    config
}

/// eSpace wallet injected as MetaMask, holding the 0xcafe… account.
pub fn metamask() -> SimWallet {
    SimWallet::builder(SimFlavor::Evm)
        .metamask()
        .accounts(vec![cafe()])
        .chain_id(1030)
        .build()
}

/// Core wallet injected as Fluent, holding the 0xcafe… account.
pub fn fluent_core() -> SimWallet {
    SimWallet::builder(SimFlavor::Conflux)
        .fluent()
        .accounts(vec![cafe()])
        .chain_id(1029)
        .build()
}

/// Records every published change event.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<ChangeEvent>>>,
}

impl EventLog {
    pub fn events(&self) -> Vec<ChangeEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.name()).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.names().into_iter().filter(|n| *n == name).count()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    /// Wait until an event named `name` has been recorded `times` times.
    pub async fn wait_for(&self, name: &str, times: usize) -> bool {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while tokio::time::Instant::now() < deadline {
            if self.count(name) >= times {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }
}

pub struct Harness {
    pub manager: SessionManager,
    pub ethereum: SimWallet,
    pub conflux: SimWallet,
    pub log: EventLog,
}

/// Manager wired to `ethereum` and `conflux` slots with an event recorder.
pub fn harness_with(ethereum: SimWallet, conflux: SimWallet) -> Harness {
    harness_configured(ethereum, conflux, fast_config())
}

pub fn harness_configured(ethereum: SimWallet, conflux: SimWallet, config: SessionConfig) -> Harness {
    let discovery = StaticDiscovery::empty()
        .inject(InjectionSlot::Ethereum, Arc::new(ethereum.clone()))
        .inject(InjectionSlot::Conflux, Arc::new(conflux.clone()));

    let manager = SessionManager::builder()
        .config(config)
        .discovery(discovery)
        .build();

    let log = EventLog::default();
    let sink = log.events.clone();
    manager.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

    Harness {
        manager,
        ethereum,
        conflux,
        log,
    }
}

pub fn harness() -> Harness {
    harness_with(metamask(), fluent_core())
}

/// Harness already connected to `space` through `provider`.
pub async fn connected(space: &str, provider: &str) -> Harness {
    let h = harness();
    h.manager.select_space(space).await.unwrap();
    h.manager.select_provider(provider).await.unwrap();
    h.manager.connect().await.unwrap();
    h.log.clear();
    h
}
