//! Session error taxonomy.
//!
//! Selection errors (`InvalidSpace`, `InvalidProvider`, `NoSpaceSelected`,
//! `NoProviderSelected`) are programmer/caller mistakes and are returned
//! directly. Everything else originates from provider interaction and is
//! additionally announced on the change notifier as `ErrorRaised`.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::chain::{ChainId, TxHash};

/// Errors that can occur while driving a wallet session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    /// Requested space name is not known.
    #[error("Invalid space: {0}")]
    InvalidSpace(String),

    /// Space is known but has no entry in the registry in use.
    #[error("Space not registered: {0}")]
    UnknownSpace(String),

    /// Provider name is not registered for the given space.
    #[error("Provider '{name}' is not available in space '{space}'")]
    InvalidProvider { space: String, name: String },

    #[error("No space selected")]
    NoSpaceSelected,

    #[error("No provider selected")]
    NoProviderSelected,

    /// The provider's injected object was not found in the host environment.
    #[error("Provider not installed: {0}")]
    ProviderUnavailable(String),

    /// The provider refused account access.
    #[error("Connection rejected: {0}")]
    ConnectionRejected(String),

    #[error("Provider returned no accounts")]
    NoAccounts,

    /// The provider refused or failed to switch to the required chain.
    #[error("Failed to switch to chain {target}: {reason}")]
    ChainSwitchFailed { target: ChainId, reason: String },

    #[error("Wallet not connected")]
    NotConnected,

    /// The user declined to sign the transaction.
    #[error("Transaction rejected: {0}")]
    TransactionRejected(String),

    /// Submission failed, or the transaction was mined with a failed status.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// The operation was superseded by a disconnect or reselection.
    #[error("Operation cancelled")]
    Cancelled,

    /// No receipt was observed within the poll bound.
    #[error("Transaction {hash} not confirmed after {attempts} polls")]
    ConfirmationTimeout { hash: TxHash, attempts: u32 },

    #[error("Invalid {space} address: {input}")]
    InvalidAddress { space: String, input: String },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// A read-only provider request failed.
    #[error("Provider request {method} failed: {reason}")]
    RequestFailed { method: String, reason: String },

    /// A provider request exceeded its deadline.
    #[error("Provider request {method} timed out after {after:?}")]
    Timeout { method: String, after: Duration },

    /// Another connect or send is already running on this session.
    #[error("Another wallet operation is in flight")]
    OperationInFlight,
}

/// Result type for wallet session operations.
pub type WalletResult<T> = Result<T, WalletError>;

/// Field-less mirror of [`WalletError`] carried in `ErrorRaised` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidSpace,
    UnknownSpace,
    InvalidProvider,
    NoSpaceSelected,
    NoProviderSelected,
    ProviderUnavailable,
    ConnectionRejected,
    NoAccounts,
    ChainSwitchFailed,
    NotConnected,
    TransactionRejected,
    TransactionFailed,
    Cancelled,
    ConfirmationTimeout,
    InvalidAddress,
    InvalidAmount,
    RequestFailed,
    Timeout,
    OperationInFlight,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidSpace => "invalid_space",
            Self::UnknownSpace => "unknown_space",
            Self::InvalidProvider => "invalid_provider",
            Self::NoSpaceSelected => "no_space_selected",
            Self::NoProviderSelected => "no_provider_selected",
            Self::ProviderUnavailable => "provider_unavailable",
            Self::ConnectionRejected => "connection_rejected",
            Self::NoAccounts => "no_accounts",
            Self::ChainSwitchFailed => "chain_switch_failed",
            Self::NotConnected => "not_connected",
            Self::TransactionRejected => "transaction_rejected",
            Self::TransactionFailed => "transaction_failed",
            Self::Cancelled => "cancelled",
            Self::ConfirmationTimeout => "confirmation_timeout",
            Self::InvalidAddress => "invalid_address",
            Self::InvalidAmount => "invalid_amount",
            Self::RequestFailed => "request_failed",
            Self::Timeout => "timeout",
            Self::OperationInFlight => "operation_in_flight",
        }
    }
}

impl WalletError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidSpace(_) => ErrorKind::InvalidSpace,
            Self::UnknownSpace(_) => ErrorKind::UnknownSpace,
            Self::InvalidProvider { .. } => ErrorKind::InvalidProvider,
            Self::NoSpaceSelected => ErrorKind::NoSpaceSelected,
            Self::NoProviderSelected => ErrorKind::NoProviderSelected,
            Self::ProviderUnavailable(_) => ErrorKind::ProviderUnavailable,
            Self::ConnectionRejected(_) => ErrorKind::ConnectionRejected,
            Self::NoAccounts => ErrorKind::NoAccounts,
            Self::ChainSwitchFailed { .. } => ErrorKind::ChainSwitchFailed,
            Self::NotConnected => ErrorKind::NotConnected,
            Self::TransactionRejected(_) => ErrorKind::TransactionRejected,
            Self::TransactionFailed(_) => ErrorKind::TransactionFailed,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::ConfirmationTimeout { .. } => ErrorKind::ConfirmationTimeout,
            Self::InvalidAddress { .. } => ErrorKind::InvalidAddress,
            Self::InvalidAmount(_) => ErrorKind::InvalidAmount,
            Self::RequestFailed { .. } => ErrorKind::RequestFailed,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::OperationInFlight => ErrorKind::OperationInFlight,
        }
    }

    /// True for caller mistakes that are never announced as events.
    pub fn is_selection_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidSpace(_)
                | Self::UnknownSpace(_)
                | Self::InvalidProvider { .. }
                | Self::NoSpaceSelected
                | Self::NoProviderSelected
        )
    }
}
