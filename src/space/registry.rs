//! Static mapping of spaces to the provider descriptors valid in each.

use std::fmt;

use serde::Serialize;

use crate::error::{WalletError, WalletResult};
use crate::provider::{InjectionSlot, ProviderFlag};
use crate::space::Space;

/// Concrete wallet integrations known to the session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProviderKind {
    MetaMask,
    Fluent,
}

impl ProviderKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MetaMask => "MetaMask",
            Self::Fluent => "Fluent",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable (provider, space) pair identifying one adapter kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ProviderDescriptor {
    kind: ProviderKind,
    space: Space,
    #[serde(skip)]
    slot: InjectionSlot,
    #[serde(skip)]
    flag: ProviderFlag,
}

impl ProviderDescriptor {
    /// Build the descriptor for `kind` in `space`.
    ///
    /// MetaMask has no Core integration, so that pair is rejected.
    pub fn new(kind: ProviderKind, space: Space) -> WalletResult<Self> {
        let (slot, flag) = match (kind, space) {
            (ProviderKind::MetaMask, Space::ESpace) => {
                (InjectionSlot::Ethereum, ProviderFlag::MetaMask)
            }
            (ProviderKind::Fluent, Space::ESpace) => (InjectionSlot::Ethereum, ProviderFlag::Fluent),
            (ProviderKind::Fluent, Space::Core) => (InjectionSlot::Conflux, ProviderFlag::Fluent),
            (ProviderKind::MetaMask, Space::Core) => {
                return Err(WalletError::InvalidProvider {
                    space: space.to_string(),
                    name: kind.name().to_string(),
                })
            }
        };

        Ok(Self {
            kind,
            space,
            slot,
            flag,
        })
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub fn space(&self) -> Space {
        self.space
    }

    /// Host global the provider is discovered under.
    pub fn slot(&self) -> InjectionSlot {
        self.slot
    }

    /// Capability flag the discovered object must advertise.
    pub fn flag(&self) -> ProviderFlag {
        self.flag
    }
}

impl fmt::Display for ProviderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.kind, self.space)
    }
}

/// Ordered space → providers table.
#[derive(Debug, Clone)]
pub struct SpaceRegistry {
    entries: Vec<(Space, Vec<ProviderDescriptor>)>,
}

impl SpaceRegistry {
    /// eSpace: MetaMask, Fluent. Core: Fluent.
    pub fn standard() -> Self {
        Self::builder()
            .provider(ProviderKind::MetaMask, Space::ESpace)
            .provider(ProviderKind::Fluent, Space::ESpace)
            .provider(ProviderKind::Fluent, Space::Core)
            .build()
    }

    pub fn builder() -> SpaceRegistryBuilder {
        SpaceRegistryBuilder::default()
    }

    /// Registered spaces in registration order.
    pub fn list_spaces(&self) -> Vec<Space> {
        self.entries.iter().map(|(space, _)| *space).collect()
    }

    /// Providers valid in `space`, in registration order.
    pub fn list_providers(&self, space: Space) -> WalletResult<&[ProviderDescriptor]> {
        self.entries
            .iter()
            .find(|(s, _)| *s == space)
            .map(|(_, providers)| providers.as_slice())
            .ok_or_else(|| WalletError::UnknownSpace(space.to_string()))
    }

    /// Resolve a space name, requiring it to be registered.
    pub fn resolve_space(&self, name: &str) -> WalletResult<Space> {
        let space: Space = name.parse()?;
        if self.entries.iter().any(|(s, _)| *s == space) {
            Ok(space)
        } else {
            Err(WalletError::InvalidSpace(name.to_string()))
        }
    }

    /// Find a provider by name (ASCII case-insensitive) within `space`.
    pub fn find_provider(&self, space: Space, name: &str) -> WalletResult<ProviderDescriptor> {
        self.list_providers(space)?
            .iter()
            .find(|d| d.name().eq_ignore_ascii_case(name.trim()))
            .copied()
            .ok_or_else(|| WalletError::InvalidProvider {
                space: space.to_string(),
                name: name.to_string(),
            })
    }
}

impl Default for SpaceRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Builder for custom registries.
#[derive(Debug, Default)]
pub struct SpaceRegistryBuilder {
    entries: Vec<(Space, Vec<ProviderDescriptor>)>,
}

impl SpaceRegistryBuilder {
    /// Register `space` with no providers yet.
    pub fn space(mut self, space: Space) -> Self {
        if !self.entries.iter().any(|(s, _)| *s == space) {
            self.entries.push((space, Vec::new()));
        }
        self
    }

    /// Register `kind` under `space`. Unsupported pairs are skipped with a warning.
    pub fn provider(mut self, kind: ProviderKind, space: Space) -> Self {
        let descriptor = match ProviderDescriptor::new(kind, space) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(provider = %kind, space = %space, error = %e, "Skipping provider");
                return self;
            }
        };

        self = self.space(space);
        if let Some((_, providers)) = self.entries.iter_mut().find(|(s, _)| *s == space) {
            if !providers.contains(&descriptor) {
                providers.push(descriptor);
            }
        }
        self
    }

    pub fn build(self) -> SpaceRegistry {
        SpaceRegistry {
            entries: self.entries,
        }
    }
}
