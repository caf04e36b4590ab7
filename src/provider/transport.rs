//! Typed JSON-RPC calls over an injected provider.
//!
//! # Responsibilities
//! - Apply a deadline to every provider request
//! - Decode results into typed values
//! - Keep provider-level error codes intact for callers to classify

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::time::timeout;

use crate::provider::{InjectedProvider, ProviderRpcError};

/// Failure modes of a single provider request.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Provider answered with an error object.
    #[error(transparent)]
    Rpc(#[from] ProviderRpcError),

    /// Provider did not answer before the deadline.
    #[error("{method} timed out after {after:?}")]
    Timeout { method: String, after: Duration },

    /// Provider answered with an unexpected payload shape.
    #[error("{method} returned an unexpected payload: {reason}")]
    Decode { method: String, reason: String },
}

impl TransportError {
    pub fn is_user_rejection(&self) -> bool {
        matches!(self, Self::Rpc(e) if e.is_user_rejection())
    }
}

/// Provider handle with a request deadline.
#[derive(Clone)]
pub struct RpcTransport {
    provider: Arc<dyn InjectedProvider>,
    timeout_duration: Duration,
}

impl RpcTransport {
    pub fn new(provider: Arc<dyn InjectedProvider>, timeout_duration: Duration) -> Self {
        Self {
            provider,
            timeout_duration,
        }
    }

    pub fn provider(&self) -> &Arc<dyn InjectedProvider> {
        &self.provider
    }

    /// Issue `method` and return the raw JSON result.
    pub async fn call_raw(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        match timeout(self.timeout_duration, self.provider.request(method, params)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                tracing::debug!(method, code = e.code, error = %e.message, "Provider request failed");
                Err(TransportError::Rpc(e))
            }
            Err(_) => {
                tracing::warn!(
                    method,
                    timeout_ms = self.timeout_duration.as_millis() as u64,
                    "Provider request timed out"
                );
                Err(TransportError::Timeout {
                    method: method.to_string(),
                    after: self.timeout_duration,
                })
            }
        }
    }

    /// Issue `method` and decode the result as `T`.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, TransportError> {
        let value = self.call_raw(method, params).await?;
        serde_json::from_value(value).map_err(|e| TransportError::Decode {
            method: method.to_string(),
            reason: e.to_string(),
        })
    }
}
