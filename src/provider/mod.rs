//! Injected wallet provider boundary.
//!
//! # Data Flow
//! ```text
//! host environment ("ethereum" / "conflux" globals)
//!     → ProviderDiscovery::discover(slot)
//!     → Arc<dyn InjectedProvider> (request / on / remove_listener)
//!     → transport.rs (typed decode + per-request deadline)
//!     → adapters
//! ```
//!
//! # Design Decisions
//! - The provider surface mirrors EIP-1193: one `request` entry point plus event listeners
//! - Discovery is injected so the session layer never touches process globals
//! - `sim.rs` provides an in-process provider for the CLI and tests

pub mod sim;
pub mod transport;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use sim::{SimFlavor, SimWallet, SimWalletBuilder};
pub use transport::{RpcTransport, TransportError};

/// Host global a provider object is injected under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InjectionSlot {
    /// `window.ethereum`
    Ethereum,
    /// `window.conflux`
    Conflux,
}

impl InjectionSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ethereum => "ethereum",
            Self::Conflux => "conflux",
        }
    }
}

impl fmt::Display for InjectionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability flag a provider advertises about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderFlag {
    MetaMask,
    Fluent,
}

/// Flags exposed by an injected provider object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProviderFlags {
    pub is_metamask: bool,
    pub is_fluent: bool,
}

impl ProviderFlags {
    pub fn has(&self, flag: ProviderFlag) -> bool {
        match flag {
            ProviderFlag::MetaMask => self.is_metamask,
            ProviderFlag::Fluent => self.is_fluent,
        }
    }
}

/// Event kinds a listener can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderEventKind {
    AccountsChanged,
    ChainChanged,
}

/// Change notification pushed by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// New account list; empty means the user revoked access.
    AccountsChanged(Vec<String>),
    /// New chain id as reported by the provider (hex string).
    ChainChanged(String),
}

impl ProviderEvent {
    pub fn kind(&self) -> ProviderEventKind {
        match self {
            Self::AccountsChanged(_) => ProviderEventKind::AccountsChanged,
            Self::ChainChanged(_) => ProviderEventKind::ChainChanged,
        }
    }
}

/// Identifier returned by [`InjectedProvider::on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

pub type ProviderListener = Arc<dyn Fn(&ProviderEvent) + Send + Sync>;

/// EIP-1193 style provider error.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("provider error {code}: {message}")]
pub struct ProviderRpcError {
    pub code: i64,
    pub message: String,
}

impl ProviderRpcError {
    pub const USER_REJECTED: i64 = 4001;
    pub const UNAUTHORIZED: i64 = 4100;
    pub const UNSUPPORTED_METHOD: i64 = 4200;
    pub const DISCONNECTED: i64 = 4900;
    pub const CHAIN_DISCONNECTED: i64 = 4901;
    pub const UNRECOGNIZED_CHAIN: i64 = 4902;
    pub const INTERNAL: i64 = -32603;

    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn user_rejected() -> Self {
        Self::new(Self::USER_REJECTED, "User rejected the request.")
    }

    pub fn is_user_rejection(&self) -> bool {
        self.code == Self::USER_REJECTED || self.code == Self::UNAUTHORIZED
    }
}

/// An injected wallet provider object.
#[async_trait]
pub trait InjectedProvider: Send + Sync {
    fn flags(&self) -> ProviderFlags;

    /// Issue a JSON-RPC request (`params` is a JSON array).
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError>;

    /// Register a listener for `kind`. Listeners may be invoked from any thread.
    fn on(&self, kind: ProviderEventKind, listener: ProviderListener) -> ListenerId;

    /// Remove a listener. Returns false if it was not registered.
    fn remove_listener(&self, id: ListenerId) -> bool;
}

/// Resolves injection slots to provider objects.
pub trait ProviderDiscovery: Send + Sync {
    fn discover(&self, slot: InjectionSlot) -> Option<Arc<dyn InjectedProvider>>;
}

impl<F> ProviderDiscovery for F
where
    F: Fn(InjectionSlot) -> Option<Arc<dyn InjectedProvider>> + Send + Sync,
{
    fn discover(&self, slot: InjectionSlot) -> Option<Arc<dyn InjectedProvider>> {
        self(slot)
    }
}

/// Fixed slot → provider table.
#[derive(Clone, Default)]
pub struct StaticDiscovery {
    slots: HashMap<InjectionSlot, Arc<dyn InjectedProvider>>,
}

impl StaticDiscovery {
    /// Discovery with nothing installed.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn inject(mut self, slot: InjectionSlot, provider: Arc<dyn InjectedProvider>) -> Self {
        self.slots.insert(slot, provider);
        self
    }
}

impl ProviderDiscovery for StaticDiscovery {
    fn discover(&self, slot: InjectionSlot) -> Option<Arc<dyn InjectedProvider>> {
        self.slots.get(&slot).cloned()
    }
}

impl fmt::Debug for StaticDiscovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut slots: Vec<_> = self.slots.keys().map(|s| s.as_str()).collect();
        slots.sort_unstable();
        f.debug_struct("StaticDiscovery").field("slots", &slots).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let flags = ProviderFlags {
            is_metamask: true,
            is_fluent: false,
        };
        assert!(flags.has(ProviderFlag::MetaMask));
        assert!(!flags.has(ProviderFlag::Fluent));
    }

    #[test]
    fn test_rpc_error() {
        let err = ProviderRpcError::user_rejected();
        assert!(err.is_user_rejection());
        assert_eq!(err.to_string(), "provider error 4001: User rejected the request.");
        assert!(!ProviderRpcError::new(ProviderRpcError::UNRECOGNIZED_CHAIN, "x").is_user_rejection());
    }

    #[test]
    fn test_static_discovery() {
        let wallet = SimWallet::builder(SimFlavor::Evm).metamask().build();
        let discovery = StaticDiscovery::empty().inject(InjectionSlot::Ethereum, Arc::new(wallet));

        assert!(discovery.discover(InjectionSlot::Ethereum).is_some());
        assert!(discovery.discover(InjectionSlot::Conflux).is_none());
    }

    #[test]
    fn test_closure_discovery() {
        let discovery = |_slot: InjectionSlot| -> Option<Arc<dyn InjectedProvider>> { None };
        assert!(discovery.discover(InjectionSlot::Ethereum).is_none());
    }
}
