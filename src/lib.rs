//! Wallet session orchestration.
//!
//! Holds an active session with exactly one injected wallet provider at a
//! time, across the Conflux eSpace and Core chain spaces.
//!
//! # Architecture Overview
//!
//! ```text
//!     UI / caller
//!        │ select_space / select_provider / connect / send_transaction
//!        ▼
//!   ┌────────────────┐      ┌───────────────┐
//!   │ SessionManager │─────▶│ SpaceRegistry │
//!   │  (session/)    │      │   (space/)    │
//!   └───────┬────────┘      └───────────────┘
//!           │ owns one
//!           ▼
//!   ┌────────────────┐      ┌──────────────────┐
//!   │ WalletAdapter  │─────▶│ InjectedProvider │◀── ProviderDiscovery
//!   │  (adapter/)    │ RPC  │   (provider/)    │
//!   └───────┬────────┘      └──────────────────┘
//!           │ account / chain callbacks
//!           ▼
//!   ┌────────────────┐
//!   │ ChangeNotifier │──▶ subscribers
//!   │  (notifier/)   │
//!   └────────────────┘
//! ```

// Core subsystems
pub mod adapter;
pub mod chain;
pub mod notifier;
pub mod provider;
pub mod session;
pub mod space;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod observability;

pub use chain::{Account, Amount, ChainId, ChainInfo, TxHash};
pub use config::SessionConfig;
pub use error::{ErrorKind, WalletError, WalletResult};
pub use notifier::{ChangeEvent, ChangeNotifier, SubscriptionHandle};
pub use session::{SessionManager, SessionState};
pub use space::{Space, SpaceRegistry};
