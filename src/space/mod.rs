//! Spaces and the providers valid in each.
//!
//! # Data Flow
//! ```text
//! "espace" / "core"  → Space::from_str
//!     → SpaceRegistry::list_providers(space)
//!     → ProviderDescriptor (name, space, injection slot, required flag)
//!     → adapter::instantiate
//! ```
//!
//! # Design Decisions
//! - The registry is immutable after construction
//! - Descriptors are only constructible for supported (provider, space) pairs

pub mod registry;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WalletError;

pub use registry::{ProviderDescriptor, ProviderKind, SpaceRegistry, SpaceRegistryBuilder};

/// A chain family with its own address and amount encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Space {
    /// EVM-compatible space.
    ESpace,
    /// Conflux Core space.
    Core,
}

impl Space {
    pub const ALL: [Space; 2] = [Space::ESpace, Space::Core];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ESpace => "espace",
            Self::Core => "core",
        }
    }
}

impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Space {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "espace" => Ok(Self::ESpace),
            "core" => Ok(Self::Core),
            _ => Err(WalletError::InvalidSpace(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_space_from_str() {
        assert_eq!("espace".parse::<Space>().unwrap(), Space::ESpace);
        assert_eq!("Core".parse::<Space>().unwrap(), Space::Core);
        assert!(matches!(
            "tron".parse::<Space>(),
            Err(WalletError::InvalidSpace(name)) if name == "tron"
        ));
    }

    #[test]
    fn test_space_display_round_trip() {
        for space in Space::ALL {
            assert_eq!(space.to_string().parse::<Space>().unwrap(), space);
        }
    }
}
