//! Chain primitives.
//!
//! # Data Flow
//! ```text
//! provider JSON (hex quantities, address strings)
//!     → address.rs (Account: hex for eSpace, CIP-37 base32 for Core)
//!     → types.rs (ChainId, Amount, TransactionReceipt)
//!     → session manager / change events
//! ```

pub mod address;
pub mod types;

pub use address::Account;
pub use types::{
    parse_quantity, Amount, ChainId, ChainInfo, ReceiptStatus, TransactionReceipt, TxHash,
};
