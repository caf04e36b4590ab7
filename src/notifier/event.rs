//! Change events published by the session manager.

use serde::Serialize;

use crate::chain::{Account, Amount, ChainId, TxHash};
use crate::error::{ErrorKind, WalletError};

/// A session state transition, delivered fire-and-forget to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEvent {
    ConnectionEstablished { account: Account, chain_id: ChainId },
    ConnectionLost,
    AccountChanged { account: Account },
    ChainChanged { chain_id: ChainId },
    /// Caller-requested switch onto the required chain completed.
    NetworkSwitched { chain_id: ChainId },
    BalanceUpdated { amount: Amount },
    BlockNumberUpdated { block_number: u64 },
    TransactionSent { hash: TxHash },
    TransactionConfirmed { hash: TxHash, block_number: Option<u64> },
    ErrorRaised { kind: ErrorKind, message: String },
}

impl ChangeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConnectionEstablished { .. } => "connection_established",
            Self::ConnectionLost => "connection_lost",
            Self::AccountChanged { .. } => "account_changed",
            Self::ChainChanged { .. } => "chain_changed",
            Self::NetworkSwitched { .. } => "network_switched",
            Self::BalanceUpdated { .. } => "balance_updated",
            Self::BlockNumberUpdated { .. } => "block_number_updated",
            Self::TransactionSent { .. } => "transaction_sent",
            Self::TransactionConfirmed { .. } => "transaction_confirmed",
            Self::ErrorRaised { .. } => "error_raised",
        }
    }
}

impl From<&WalletError> for ChangeEvent {
    fn from(error: &WalletError) -> Self {
        Self::ErrorRaised {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}
