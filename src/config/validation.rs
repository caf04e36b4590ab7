//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals, attempts, timeouts > 0)
//! - Check chain overrides are coherent across spaces
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SessionConfig → Result<(), Vec<ValidationError>>

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use alloy::primitives::Address;

use crate::chain::Amount;
use crate::config::schema::SessionConfig;
use crate::space::Space;

/// Largest decimals value a U256 amount can meaningfully carry.
const MAX_DECIMALS: u8 = 77;

/// One semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check `config` for semantic errors.
pub fn validate_config(config: &SessionConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.confirmation.poll_interval_ms == 0 {
        errors.push(ValidationError::new("confirmation.poll_interval_ms", "must be greater than 0"));
    }
    if config.confirmation.max_attempts == 0 {
        errors.push(ValidationError::new("confirmation.max_attempts", "must be greater than 0"));
    }
    if config.provider.request_timeout_secs == 0 {
        errors.push(ValidationError::new("provider.request_timeout_secs", "must be greater than 0"));
    }

    let espace = config.spaces.chain_info(Space::ESpace);
    let core = config.spaces.chain_info(Space::Core);
    for (space, chain) in [(Space::ESpace, &espace), (Space::Core, &core)] {
        if chain.id.0 == 0 {
            errors.push(ValidationError::new(format!("spaces.{space}.id"), "must be non-zero"));
        }
        if chain.decimals > MAX_DECIMALS {
            errors.push(ValidationError::new(
                format!("spaces.{space}.decimals"),
                format!("must be at most {MAX_DECIMALS}"),
            ));
        }
        if chain.name.trim().is_empty() {
            errors.push(ValidationError::new(format!("spaces.{space}.name"), "must not be empty"));
        }
    }
    if espace.id == core.id {
        errors.push(ValidationError::new(
            "spaces",
            format!("espace and core share chain id {}", espace.id),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    let simulator = &config.simulator;
    for (i, account) in simulator.accounts.iter().enumerate() {
        if Address::from_str(account).is_err() {
            errors.push(ValidationError::new(
                format!("simulator.accounts[{i}]"),
                format!("'{account}' is not a 20-byte hex address"),
            ));
        }
    }
    if Amount::parse(&simulator.balance, espace.decimals).is_err() {
        errors.push(ValidationError::new(
            "simulator.balance",
            format!("'{}' is not a non-negative decimal amount", simulator.balance),
        ));
    }
    if !matches!(simulator.ethereum_flavor.as_str(), "metamask" | "fluent") {
        errors.push(ValidationError::new(
            "simulator.ethereum_flavor",
            "must be \"metamask\" or \"fluent\"",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(validate_config(&SessionConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = SessionConfig::default();
        config.confirmation.poll_interval_ms = 0;
        config.confirmation.max_attempts = 0;
        config.provider.request_timeout_secs = 0;
        config.simulator.balance = "-3".to_string();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "confirmation.poll_interval_ms",
                "confirmation.max_attempts",
                "provider.request_timeout_secs",
                "simulator.balance",
            ]
        );
    }

    #[test]
    fn test_chain_id_collision() {
        let mut config = SessionConfig::default();
        config.spaces.core.id = Some(1030);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "spaces");
    }

    #[test]
    fn test_metrics_address_checked_when_enabled() {
        let mut config = SessionConfig::default();
        config.observability.metrics_address = "not-an-address".to_string();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "observability.metrics_address");
    }

    #[test]
    fn test_simulator_accounts() {
        let mut config = SessionConfig::default();
        config.simulator.accounts = vec!["0x1234".to_string()];
        config.simulator.ethereum_flavor = "brave".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].to_string(), "simulator.accounts[0]: '0x1234' is not a 20-byte hex address");
    }
}
