//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files, and
//! every field has a default so an empty file is a valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chain::{ChainId, ChainInfo};
use crate::space::Space;

/// Root configuration for a wallet session.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SessionConfig {
    /// Receipt polling after a transaction is submitted.
    pub confirmation: ConfirmationConfig,

    /// Provider request settings.
    pub provider: ProviderConfig,

    /// Required chain per space.
    pub spaces: SpacesConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Simulated wallet used by the CLI driver.
    pub simulator: SimulatorConfig,
}

/// Confirmation-wait loop settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// Fixed delay between receipt polls.
    pub poll_interval_ms: u64,

    /// Upper bound on receipt polls before giving up.
    pub max_attempts: u32,
}

impl ConfirmationConfig {
    const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
    const DEFAULT_MAX_ATTEMPTS: u32 = 120;

    /// Poll interval; zero means the default.
    pub fn poll_interval(&self) -> Duration {
        match self.poll_interval_ms {
            0 => Duration::from_millis(Self::DEFAULT_POLL_INTERVAL_MS),
            ms => Duration::from_millis(ms),
        }
    }

    /// Attempt bound; zero means the default.
    pub fn attempt_bound(&self) -> u32 {
        match self.max_attempts {
            0 => Self::DEFAULT_MAX_ATTEMPTS,
            n => n,
        }
    }
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: Self::DEFAULT_POLL_INTERVAL_MS,
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Provider request settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Deadline for a single provider request. Covers user prompts, so it is generous.
    pub request_timeout_secs: u64,
}

impl ProviderConfig {
    const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

    /// Request deadline; zero means the default.
    pub fn request_timeout(&self) -> Duration {
        match self.request_timeout_secs {
            0 => Duration::from_secs(Self::DEFAULT_REQUEST_TIMEOUT_SECS),
            secs => Duration::from_secs(secs),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: Self::DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// Per-space overrides of the required chain.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SpacesConfig {
    pub espace: ChainOverride,
    pub core: ChainOverride,
}

impl SpacesConfig {
    /// Required chain for `space` with overrides applied.
    pub fn chain_info(&self, space: Space) -> ChainInfo {
        match space {
            Space::ESpace => self.espace.apply(ChainInfo::espace_mainnet()),
            Space::Core => self.core.apply(ChainInfo::core_mainnet()),
        }
    }
}

/// Optional replacement values for a [`ChainInfo`].
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ChainOverride {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub currency_symbol: Option<String>,
    pub decimals: Option<u8>,
    pub rpc_url: Option<String>,
    pub explorer_url: Option<String>,
}

impl ChainOverride {
    pub fn apply(&self, mut base: ChainInfo) -> ChainInfo {
        if let Some(id) = self.id {
            base.id = ChainId(id);
        }
        if let Some(name) = &self.name {
            base.name = name.clone();
        }
        if let Some(symbol) = &self.currency_symbol {
            base.currency_symbol = symbol.clone();
        }
        if let Some(decimals) = self.decimals {
            base.decimals = decimals;
        }
        if self.rpc_url.is_some() {
            base.rpc_url = self.rpc_url.clone();
        }
        if self.explorer_url.is_some() {
            base.explorer_url = self.explorer_url.clone();
        }
        base
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9100".to_string(),
        }
    }
}

/// Seed state for the simulated wallet.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Accounts as 20-byte hex; Core renders them in base32.
    pub accounts: Vec<String>,

    /// Balance in whole native units (decimal string).
    pub balance: String,

    /// Chain the wallet starts on. Defaults to the required chain.
    pub start_chain_id: Option<u64>,

    /// Current block (eSpace) or epoch (Core) number.
    pub block_number: u64,

    /// Receipt polls that return null before a receipt appears.
    pub receipt_after_polls: u32,

    /// Which wallet answers on the `ethereum` slot: "metamask" or "fluent".
    pub ethereum_flavor: String,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            accounts: vec!["0xcafe000000000000000000000000000000000001".to_string()],
            balance: "10".to_string(),
            start_chain_id: None,
            block_number: 1,
            receipt_after_polls: 1,
            ethereum_flavor: "metamask".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_default() {
        let config: SessionConfig = toml::from_str("").unwrap();
        assert_eq!(config.confirmation.poll_interval_ms, 1000);
        assert_eq!(config.confirmation.max_attempts, 120);
        assert_eq!(config.provider.request_timeout(), Duration::from_secs(120));
        assert!(!config.observability.metrics_enabled);
    }

    #[test]
    fn test_zero_durations_fall_back_to_defaults() {
        let mut config = SessionConfig::default();
        config.confirmation.poll_interval_ms = 0;
        config.confirmation.max_attempts = 0;
        config.provider.request_timeout_secs = 0;

        assert_eq!(config.confirmation.poll_interval(), Duration::from_millis(1000));
        assert_eq!(config.confirmation.attempt_bound(), 120);
        assert_eq!(config.provider.request_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_chain_override() {
        let config: SessionConfig = toml::from_str(
            r#"
            [spaces.espace]
            id = 71
            name = "Conflux eSpace Testnet"
            "#,
        )
        .unwrap();

        let espace = config.spaces.chain_info(Space::ESpace);
        assert_eq!(espace.id, ChainId(71));
        assert_eq!(espace.name, "Conflux eSpace Testnet");
        assert_eq!(espace.currency_symbol, "CFX");

        let core = config.spaces.chain_info(Space::Core);
        assert_eq!(core, ChainInfo::core_mainnet());
    }

    #[test]
    fn test_partial_sections() {
        let config: SessionConfig = toml::from_str(
            r#"
            [confirmation]
            max_attempts = 5

            [simulator]
            ethereum_flavor = "fluent"
            "#,
        )
        .unwrap();

        assert_eq!(config.confirmation.max_attempts, 5);
        assert_eq!(config.confirmation.poll_interval_ms, 1000);
        assert_eq!(config.simulator.ethereum_flavor, "fluent");
        assert_eq!(config.simulator.balance, "10");
    }
}
