//! Provider adapters: the capability contract the session manager drives.
//!
//! # Data Flow
//! ```text
//! ProviderDescriptor + ProviderDiscovery
//!     → instantiate() (runtime variant selection by space)
//!     → InjectedAdapter<EvmRules> | InjectedAdapter<CoreRules>
//!     → RpcTransport → InjectedProvider
//! ```
//!
//! # Design Decisions
//! - One generic adapter; per-space RPC dialect lives in `SpaceRules`
//! - Provider listeners forward raw events into a channel owned by the session
//! - Absent providers still yield an adapter whose operations fail with `ProviderUnavailable`

pub mod injected;
pub mod rules;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::chain::{Account, Amount, ChainId, ChainInfo, TransactionReceipt, TxHash};
use crate::error::{WalletError, WalletResult};
use crate::provider::{ProviderDiscovery, ProviderEvent};
use crate::space::{ProviderDescriptor, Space};

pub use injected::InjectedAdapter;
pub use rules::{CoreRules, EvmRules, SpaceRules};

/// Channel end receiving raw provider change events.
pub type AdapterEventSink = mpsc::UnboundedSender<ProviderEvent>;

/// Result of a successful handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub account: Account,
    pub chain_id: ChainId,
}

/// Effect of a provider-reported account list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountChange {
    /// First account of the new list.
    Switched(Account),
    /// Empty list: the provider revoked access.
    Disconnected,
}

/// Capability set every wallet adapter implements.
#[async_trait]
pub trait WalletAdapter: Send + Sync {
    fn descriptor(&self) -> ProviderDescriptor;

    /// Whether the provider object was found in the host environment.
    fn is_installed(&self) -> bool;

    fn is_connected(&self) -> bool;

    fn get_account(&self) -> Option<Account>;

    fn get_chain_id(&self) -> Option<ChainId>;

    /// Chain this adapter requires the provider to be on.
    fn get_chain_info(&self) -> &ChainInfo;

    fn parse_account(&self, input: &str) -> WalletResult<Account> {
        Account::parse(self.descriptor().space(), input)
    }

    fn parse_amount(&self, input: &str) -> WalletResult<Amount> {
        Amount::parse(input, self.get_chain_info().decimals)
    }

    /// Request account access, align the chain, and install change listeners.
    async fn connect(&self, sink: AdapterEventSink) -> WalletResult<Connection>;

    /// Ask the connected provider to move onto the required chain, adding the
    /// chain first if the provider does not know it. Returns the chain id read
    /// back afterwards.
    async fn switch_network(&self) -> WalletResult<ChainId>;

    /// Register the account and chain listeners, replacing any previous pair.
    fn watch_account_and_chain(&self, sink: AdapterEventSink) -> WalletResult<()>;

    /// Clear local state and remove listeners. Never fails.
    fn disconnect_wallet(&self);

    async fn get_balance(&self) -> WalletResult<Amount>;

    async fn get_block_number(&self) -> WalletResult<u64>;

    async fn send_transaction(&self, to: &Account, amount: &Amount) -> WalletResult<TxHash>;

    /// `Ok(None)` while the transaction is pending.
    async fn get_transaction_receipt(&self, hash: &TxHash) -> WalletResult<Option<TransactionReceipt>>;

    /// Apply a provider-reported account list.
    fn on_accounts_changed(&self, accounts: &[String]) -> WalletResult<AccountChange>;

    /// Apply a provider-reported chain id, trying to switch back if it is not
    /// the required chain. Returns the reported id whatever the switch outcome.
    async fn on_chain_changed(&self, raw: &str) -> WalletResult<ChainId>;
}

/// Build the adapter for `descriptor` under `space`.
pub fn instantiate(
    descriptor: ProviderDescriptor,
    space: Space,
    discovery: &dyn ProviderDiscovery,
    chain: ChainInfo,
    request_timeout: Duration,
) -> WalletResult<Arc<dyn WalletAdapter>> {
    if descriptor.space() != space {
        return Err(WalletError::InvalidProvider {
            space: space.to_string(),
            name: descriptor.name().to_string(),
        });
    }

    let provider = discovery
        .discover(descriptor.slot())
        .filter(|p| p.flags().has(descriptor.flag()));

    if provider.is_none() {
        tracing::warn!(
            provider = descriptor.name(),
            space = %space,
            slot = %descriptor.slot(),
            "Provider not detected"
        );
    }

    let adapter: Arc<dyn WalletAdapter> = match space {
        Space::ESpace => Arc::new(InjectedAdapter::<EvmRules>::new(
            descriptor,
            provider,
            chain,
            request_timeout,
        )),
        Space::Core => Arc::new(InjectedAdapter::<CoreRules>::new(
            descriptor,
            provider,
            chain,
            request_timeout,
        )),
    };

    Ok(adapter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{InjectionSlot, SimFlavor, SimWallet, StaticDiscovery};
    use crate::space::ProviderKind;

    fn metamask_discovery() -> StaticDiscovery {
        let wallet = SimWallet::builder(SimFlavor::Evm).metamask().build();
        StaticDiscovery::empty().inject(InjectionSlot::Ethereum, Arc::new(wallet))
    }

    #[test]
    fn test_instantiate_rejects_cross_space() {
        let descriptor = ProviderDescriptor::new(ProviderKind::Fluent, Space::Core).unwrap();
        let result = instantiate(
            descriptor,
            Space::ESpace,
            &StaticDiscovery::empty(),
            ChainInfo::espace_mainnet(),
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(WalletError::InvalidProvider { .. })));
    }

    #[test]
    fn test_instantiate_matches_flag() {
        let discovery = metamask_discovery();

        let metamask = ProviderDescriptor::new(ProviderKind::MetaMask, Space::ESpace).unwrap();
        let adapter = instantiate(
            metamask,
            Space::ESpace,
            &discovery,
            ChainInfo::espace_mainnet(),
            Duration::from_secs(1),
        )
        .unwrap();
        assert!(adapter.is_installed());

        // Fluent on eSpace shares the slot but requires the isFluent flag.
        let fluent = ProviderDescriptor::new(ProviderKind::Fluent, Space::ESpace).unwrap();
        let adapter = instantiate(
            fluent,
            Space::ESpace,
            &discovery,
            ChainInfo::espace_mainnet(),
            Duration::from_secs(1),
        )
        .unwrap();
        assert!(!adapter.is_installed());
    }

    #[tokio::test]
    async fn test_uninstalled_adapter_fails() {
        let descriptor = ProviderDescriptor::new(ProviderKind::Fluent, Space::Core).unwrap();
        let adapter = instantiate(
            descriptor,
            Space::Core,
            &StaticDiscovery::empty(),
            ChainInfo::core_mainnet(),
            Duration::from_secs(1),
        )
        .unwrap();

        let (sink, _rx) = mpsc::unbounded_channel();
        assert!(matches!(
            adapter.connect(sink).await,
            Err(WalletError::ProviderUnavailable(_))
        ));
        assert!(matches!(
            adapter.get_balance().await,
            Err(WalletError::ProviderUnavailable(_))
        ));
    }
}
