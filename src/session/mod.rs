//! Session orchestration subsystem.
//!
//! # Data Flow
//! ```text
//! select_space(name)     → SpaceRegistry::resolve_space
//! select_provider(name)  → SpaceRegistry::find_provider → adapter::instantiate
//! connect()              → WalletAdapter::connect → reconciler task spawned
//!                             provider callbacks → mpsc → reconcile under state lock
//! send_transaction()     → WalletAdapter::send_transaction
//!                             → confirmation.rs (poll until mined / bound / teardown)
//! switch_network()       → WalletAdapter::switch_network → NetworkSwitched
//!
//! Every state change → ChangeEvent list → published after the lock is released
//! ```
//!
//! # Design Decisions
//! - One async mutex serializes all session mutation
//! - At most one connect, switch or send runs at a time; a second caller gets `OperationInFlight`
//! - Teardown bumps a generation counter; stale callbacks and handshakes are discarded
//! - Disconnect never waits on the operation gate so it can cancel a pending confirmation

pub mod confirmation;
pub mod manager;
pub mod state;
pub mod teardown;

pub use confirmation::{wait_for_receipt, ConfirmationPolicy, TransactionRecord};
pub use manager::{SessionManager, SessionManagerBuilder};
pub use state::{SessionSnapshot, SessionState};
pub use teardown::Teardown;
