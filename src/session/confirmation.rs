//! Bounded, cancellable wait for a transaction receipt.
//!
//! # Responsibilities
//! - Poll the adapter for a receipt at a fixed interval
//! - Stop at the first terminal receipt, the attempt bound, or teardown
//! - Classify the terminal receipt as success or failure

use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};

use crate::adapter::WalletAdapter;
use crate::chain::{TransactionReceipt, TxHash};
use crate::config::ConfirmationConfig;
use crate::error::{WalletError, WalletResult};
use crate::observability::metrics;

/// Shortest poll interval the wait loop will tick at.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Poll cadence and bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub poll_interval: Duration,
    pub max_attempts: u32,
}

impl From<&ConfirmationConfig> for ConfirmationPolicy {
    fn from(config: &ConfirmationConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            max_attempts: config.attempt_bound(),
        }
    }
}

/// A submitted transaction awaiting its receipt.
#[derive(Debug, Clone, Copy)]
pub struct TransactionRecord {
    pub hash: TxHash,
    pub submitted_at: Instant,
}

impl TransactionRecord {
    pub fn new(hash: TxHash) -> Self {
        Self {
            hash,
            submitted_at: Instant::now(),
        }
    }
}

/// Wait for `record` to be mined.
///
/// `teardown` must be subscribed before the transaction was submitted; any
/// signal on it cancels the wait. Receipt errors are logged and count as an
/// attempt. A mined receipt with a failed status yields `TransactionFailed`.
pub async fn wait_for_receipt(
    adapter: &dyn WalletAdapter,
    record: &TransactionRecord,
    policy: &ConfirmationPolicy,
    teardown: &mut broadcast::Receiver<u64>,
) -> WalletResult<TransactionReceipt> {
    let hash = record.hash;
    // At least one poll, and a tick period the timer accepts.
    let max_attempts = policy.max_attempts.max(1);
    let mut ticker = interval(policy.poll_interval.max(MIN_POLL_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    for attempt in 1..=max_attempts {
        tokio::select! {
            biased;
            _ = teardown.recv() => return Err(cancelled(hash, attempt)),
            _ = ticker.tick() => {}
        }

        let polled = tokio::select! {
            biased;
            _ = teardown.recv() => return Err(cancelled(hash, attempt)),
            result = adapter.get_transaction_receipt(&hash) => result,
        };

        match polled {
            Ok(Some(receipt)) => {
                metrics::record_confirmation_polls(attempt);
                tracing::info!(
                    tx_hash = %hash,
                    attempt,
                    block_number = ?receipt.block_number,
                    elapsed_ms = record.submitted_at.elapsed().as_millis() as u64,
                    succeeded = receipt.succeeded(),
                    "Transaction mined"
                );

                if receipt.succeeded() {
                    return Ok(receipt);
                }
                return Err(WalletError::TransactionFailed(format!(
                    "transaction {hash} failed on-chain"
                )));
            }
            Ok(None) => {
                tracing::debug!(tx_hash = %hash, attempt, "Transaction pending");
            }
            Err(WalletError::NotConnected) => return Err(cancelled(hash, attempt)),
            Err(e) => {
                tracing::warn!(tx_hash = %hash, attempt, error = %e, "Receipt poll failed");
            }
        }
    }

    metrics::record_confirmation_polls(max_attempts);
    tracing::warn!(
        tx_hash = %hash,
        attempts = max_attempts,
        "Transaction not confirmed within poll bound"
    );
    Err(WalletError::ConfirmationTimeout {
        hash,
        attempts: max_attempts,
    })
}

fn cancelled(hash: TxHash, attempt: u32) -> WalletError {
    tracing::info!(tx_hash = %hash, attempt, "Confirmation wait cancelled by teardown");
    WalletError::Cancelled
}
