//! Session aggregate and its derived state.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::adapter::WalletAdapter;
use crate::chain::{Account, ChainId};
use crate::space::{ProviderDescriptor, Space};

/// Position in the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    SpaceSelected,
    ProviderSelected,
    Connected,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::SpaceSelected => "space_selected",
            Self::ProviderSelected => "provider_selected",
            Self::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// Serializable copy of the session for observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub space: Option<Space>,
    pub provider: Option<&'static str>,
    pub installed: bool,
    pub account: Option<Account>,
    pub chain_id: Option<ChainId>,
}

/// Mutable session aggregate owned by the manager.
///
/// `account` is only set while `adapter` is present and connected;
/// `space` being unset implies no provider and no adapter.
#[derive(Default)]
pub(crate) struct Session {
    pub space: Option<Space>,
    pub provider: Option<ProviderDescriptor>,
    pub adapter: Option<Arc<dyn WalletAdapter>>,
    pub account: Option<Account>,
    pub chain_id: Option<ChainId>,
    /// Bumped on every teardown; stale callbacks compare against it.
    pub generation: u64,
}

impl Session {
    pub fn state(&self) -> SessionState {
        match (&self.space, &self.adapter, &self.account) {
            (None, _, _) => SessionState::Idle,
            (Some(_), None, _) => SessionState::SpaceSelected,
            (Some(_), Some(_), None) => SessionState::ProviderSelected,
            (Some(_), Some(_), Some(_)) => SessionState::Connected,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// The adapter, only while connected.
    pub fn connected_adapter(&self) -> Option<Arc<dyn WalletAdapter>> {
        if self.is_connected() {
            self.adapter.clone()
        } else {
            None
        }
    }

    /// Drop account and chain and bump the generation.
    ///
    /// Returns the torn-down generation and whether the session was connected.
    pub fn clear_connection(&mut self) -> (u64, bool) {
        let was_connected = self.is_connected();
        let torn_down = self.generation;
        self.account = None;
        self.chain_id = None;
        self.generation += 1;
        (torn_down, was_connected)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state(),
            space: self.space,
            provider: self.provider.map(|p| p.name()),
            installed: self.adapter.as_ref().is_some_and(|a| a.is_installed()),
            account: self.account,
            chain_id: self.chain_id,
        }
    }
}
