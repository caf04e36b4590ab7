//! Session manager: owns the active adapter and drives the state machine.

use std::fmt;
use std::sync::{Arc, Weak};

use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::{mpsc, Mutex};

use crate::adapter::{self, AccountChange, WalletAdapter};
use crate::chain::{Account, Amount, ChainId, ChainInfo, TxHash};
use crate::config::{validate_config, SessionConfig};
use crate::error::{WalletError, WalletResult};
use crate::notifier::{ChangeEvent, ChangeNotifier, SubscriptionHandle};
use crate::observability::metrics;
use crate::provider::{ProviderDiscovery, ProviderEvent, StaticDiscovery};
use crate::session::confirmation::{wait_for_receipt, ConfirmationPolicy, TransactionRecord};
use crate::session::state::{Session, SessionSnapshot, SessionState};
use crate::session::teardown::Teardown;
use crate::space::{ProviderDescriptor, Space, SpaceRegistry};

struct Inner {
    config: SessionConfig,
    registry: SpaceRegistry,
    discovery: Arc<dyn ProviderDiscovery>,
    notifier: ChangeNotifier,
    session: Mutex<Session>,
    /// Held for the duration of `connect`, `switch_network` and `send_transaction`.
    op_gate: Mutex<()>,
    teardown: Teardown,
}

impl Inner {
    fn publish(&self, events: Vec<ChangeEvent>) {
        for event in events {
            self.notifier.publish(event);
        }
    }

    /// Announce a provider-interaction failure.
    fn report(&self, error: &WalletError) {
        if !error.is_selection_error() {
            self.notifier.publish(ChangeEvent::from(error));
        }
    }

    /// Tear down the current connection as part of a reselection.
    fn release_adapter(&self, session: &mut Session, events: &mut Vec<ChangeEvent>, reason: &'static str) {
        let (torn_down, was_connected) = session.clear_connection();
        if let Some(adapter) = &session.adapter {
            adapter.disconnect_wallet();
        }
        self.teardown.trigger(torn_down);

        if was_connected {
            metrics::record_disconnect(reason);
            events.push(ChangeEvent::ConnectionLost);
        }
    }

    /// Explicit or provider-driven disconnect. Always announces `ConnectionLost`.
    fn disconnect_locked(&self, session: &mut Session, events: &mut Vec<ChangeEvent>, reason: &'static str) {
        let (torn_down, _) = session.clear_connection();
        if let Some(adapter) = &session.adapter {
            adapter.disconnect_wallet();
        }
        self.teardown.trigger(torn_down);

        metrics::record_disconnect(reason);
        events.push(ChangeEvent::ConnectionLost);
    }

    /// Apply one provider callback. Returns false once the connection it
    /// belongs to is gone.
    async fn reconcile(&self, generation: u64, adapter: &Arc<dyn WalletAdapter>, event: ProviderEvent) -> bool {
        let kind = match &event {
            ProviderEvent::AccountsChanged(_) => "accounts_changed",
            ProviderEvent::ChainChanged(_) => "chain_changed",
        };
        metrics::record_provider_event(kind);

        let mut events = Vec::new();
        let live = match event {
            ProviderEvent::AccountsChanged(accounts) => {
                let mut session = self.session.lock().await;
                if !is_current(&session, generation) {
                    return false;
                }

                match adapter.on_accounts_changed(&accounts) {
                    Ok(AccountChange::Switched(account)) => {
                        tracing::info!(account = %account, "Account changed");
                        session.account = Some(account);
                        events.push(ChangeEvent::AccountChanged { account });
                        true
                    }
                    Ok(AccountChange::Disconnected) => {
                        self.disconnect_locked(&mut session, &mut events, "provider_revoked");
                        false
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Ignoring unreadable account change");
                        events.push(ChangeEvent::from(&e));
                        true
                    }
                }
            }
            ProviderEvent::ChainChanged(raw) => {
                if !is_current(&*self.session.lock().await, generation) {
                    return false;
                }

                // May issue a switch request; the state lock is not held across it.
                let reported = adapter.on_chain_changed(&raw).await;

                let mut session = self.session.lock().await;
                if !is_current(&session, generation) {
                    return false;
                }
                match reported {
                    Ok(chain_id) => {
                        tracing::info!(chain_id = %chain_id, "Chain changed");
                        session.chain_id = Some(chain_id);
                        events.push(ChangeEvent::ChainChanged { chain_id });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Ignoring unreadable chain change");
                        events.push(ChangeEvent::from(&e));
                    }
                }
                true
            }
        };

        self.publish(events);
        live
    }
}

fn is_current(session: &Session, generation: u64) -> bool {
    session.generation == generation && session.is_connected()
}

/// Orchestrates a single wallet session. Cloning shares the session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    /// Manager with the standard registry and a private notifier.
    pub fn new(config: SessionConfig, discovery: Arc<dyn ProviderDiscovery>) -> Self {
        Self::builder()
            .config(config)
            .shared_discovery(discovery)
            .build()
    }

    pub fn builder() -> SessionManagerBuilder {
        SessionManagerBuilder::default()
    }

    pub fn registry(&self) -> &SpaceRegistry {
        &self.inner.registry
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.inner.notifier
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Register `handler` for every change event.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionHandle
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.inner.notifier.subscribe(handler)
    }

    /// Select the active space, tearing down any current adapter.
    pub async fn select_space(&self, name: &str) -> WalletResult<()> {
        let space = self.inner.registry.resolve_space(name)?;

        let mut events = Vec::new();
        {
            let mut session = self.inner.session.lock().await;
            self.inner.release_adapter(&mut session, &mut events, "space_selected");
            session.space = Some(space);
            session.provider = None;
            session.adapter = None;
        }

        tracing::info!(space = %space, "Space selected");
        self.inner.publish(events);
        Ok(())
    }

    /// Select a provider valid in the current space.
    pub async fn select_provider(&self, name: &str) -> WalletResult<()> {
        let mut events = Vec::new();
        let descriptor = {
            let mut session = self.inner.session.lock().await;
            let space = session.space.ok_or(WalletError::NoSpaceSelected)?;
            let descriptor = self.inner.registry.find_provider(space, name)?;
            let adapter = adapter::instantiate(
                descriptor,
                space,
                self.inner.discovery.as_ref(),
                self.inner.config.spaces.chain_info(space),
                self.inner.config.provider.request_timeout(),
            )?;

            self.inner.release_adapter(&mut session, &mut events, "provider_selected");
            session.provider = Some(descriptor);
            session.adapter = Some(adapter);
            descriptor
        };

        tracing::info!(provider = descriptor.name(), space = %descriptor.space(), "Provider selected");
        self.inner.publish(events);
        Ok(())
    }

    /// Run the provider handshake. Re-running it while connected re-confirms the account.
    pub async fn connect(&self) -> WalletResult<Account> {
        let _gate = self
            .inner
            .op_gate
            .try_lock()
            .map_err(|_| WalletError::OperationInFlight)?;

        let (adapter, generation, was_connected) = {
            let mut session = self.inner.session.lock().await;
            let adapter = session.adapter.clone().ok_or(WalletError::NoProviderSelected)?;
            let was_connected = session.is_connected();
            // Callbacks from a previous handshake become stale, and the adapter
            // drops its connection before the new handshake.
            session.generation += 1;
            session.account = None;
            session.chain_id = None;
            (adapter, session.generation, was_connected)
        };
        let provider = adapter.descriptor().name();

        let (sink, rx) = mpsc::unbounded_channel();
        let result = adapter.connect(sink).await;

        let mut events = Vec::new();
        let outcome = {
            let mut session = self.inner.session.lock().await;
            if session.generation != generation {
                // Disconnected or reselected while the handshake was in flight.
                adapter.disconnect_wallet();
                metrics::record_connect(provider, "cancelled");
                return Err(WalletError::Cancelled);
            }

            match result {
                Ok(connection) => {
                    session.account = Some(connection.account);
                    session.chain_id = Some(connection.chain_id);
                    self.spawn_reconciler(generation, adapter.clone(), rx);

                    metrics::record_connect(provider, "connected");
                    tracing::info!(
                        provider,
                        account = %connection.account,
                        chain_id = %connection.chain_id,
                        "Session connected"
                    );
                    events.push(ChangeEvent::ConnectionEstablished {
                        account: connection.account,
                        chain_id: connection.chain_id,
                    });
                    Ok(connection.account)
                }
                Err(e) => {
                    adapter.disconnect_wallet();
                    session.account = None;
                    session.chain_id = None;

                    metrics::record_connect(provider, "failed");
                    tracing::warn!(provider, error = %e, "Connect failed");
                    if was_connected {
                        events.push(ChangeEvent::ConnectionLost);
                    }
                    events.push(ChangeEvent::from(&e));
                    Err(e)
                }
            }
        };

        self.inner.publish(events);
        outcome
    }

    /// Drop the connection. Always succeeds and announces `ConnectionLost` once.
    pub async fn disconnect(&self) {
        let mut events = Vec::new();
        {
            let mut session = self.inner.session.lock().await;
            self.inner.disconnect_locked(&mut session, &mut events, "requested");
        }

        tracing::info!("Session disconnected");
        self.inner.publish(events);
    }

    /// Send `amount` of the native currency to `to` and wait for it to be mined.
    pub async fn send_transaction(&self, to: &str, amount: &str) -> WalletResult<TxHash> {
        let _gate = self
            .inner
            .op_gate
            .try_lock()
            .map_err(|_| WalletError::OperationInFlight)?;

        let (adapter, mut teardown) = {
            let session = self.inner.session.lock().await;
            let adapter = session.connected_adapter().ok_or(WalletError::NotConnected)?;
            // Subscribed under the lock so no teardown can slip past.
            (adapter, self.inner.teardown.subscribe())
        };

        let to = adapter.parse_account(to)?;
        let amount = adapter.parse_amount(amount)?;

        let hash = match adapter.send_transaction(&to, &amount).await {
            Ok(hash) => hash,
            Err(e) => {
                metrics::record_transaction("rejected");
                tracing::warn!(to = %to, amount = %amount, error = %e, "Transaction not submitted");
                self.inner.report(&e);
                return Err(e);
            }
        };

        // A teardown that landed while the provider answered wins over the hash.
        if !matches!(teardown.try_recv(), Err(TryRecvError::Empty)) {
            metrics::record_transaction("cancelled");
            tracing::info!(tx_hash = %hash, "Transaction submitted after teardown; not tracked");
            return Err(WalletError::Cancelled);
        }

        tracing::info!(tx_hash = %hash, to = %to, amount = %amount, "Transaction submitted");
        self.inner.notifier.publish(ChangeEvent::TransactionSent { hash });

        let record = TransactionRecord::new(hash);
        let policy = ConfirmationPolicy::from(&self.inner.config.confirmation);
        match wait_for_receipt(adapter.as_ref(), &record, &policy, &mut teardown).await {
            Ok(receipt) => {
                metrics::record_transaction("confirmed");
                self.inner.notifier.publish(ChangeEvent::TransactionConfirmed {
                    hash,
                    block_number: receipt.block_number,
                });
                Ok(hash)
            }
            Err(WalletError::Cancelled) => {
                metrics::record_transaction("cancelled");
                Err(WalletError::Cancelled)
            }
            Err(e) => {
                metrics::record_transaction("failed");
                self.inner.report(&e);
                Err(e)
            }
        }
    }

    /// Move the provider back onto the adapter's required chain.
    pub async fn switch_network(&self) -> WalletResult<ChainId> {
        let _gate = self
            .inner
            .op_gate
            .try_lock()
            .map_err(|_| WalletError::OperationInFlight)?;

        let (adapter, generation) = {
            let session = self.inner.session.lock().await;
            let adapter = session.connected_adapter().ok_or(WalletError::NotConnected)?;
            (adapter, session.generation)
        };

        let result = adapter.switch_network().await;

        let mut session = self.inner.session.lock().await;
        if !is_current(&session, generation) {
            return Err(WalletError::Cancelled);
        }
        match result {
            Ok(chain_id) => {
                session.chain_id = Some(chain_id);
                drop(session);
                tracing::info!(chain_id = %chain_id, "Network switched");
                self.inner.notifier.publish(ChangeEvent::NetworkSwitched { chain_id });
                Ok(chain_id)
            }
            Err(e) => {
                drop(session);
                tracing::warn!(error = %e, "Network switch failed");
                self.inner.report(&e);
                Err(e)
            }
        }
    }

    /// Native balance of the connected account. Announces `BalanceUpdated`.
    pub async fn get_balance(&self) -> WalletResult<Amount> {
        let adapter = self.connected_adapter().await?;
        match adapter.get_balance().await {
            Ok(amount) => {
                tracing::debug!(amount = %amount, "Balance fetched");
                self.inner.notifier.publish(ChangeEvent::BalanceUpdated { amount });
                Ok(amount)
            }
            Err(e) => {
                self.inner.report(&e);
                Err(e)
            }
        }
    }

    /// Current block (eSpace) or epoch (Core) number. Announces `BlockNumberUpdated`.
    pub async fn get_block_number(&self) -> WalletResult<u64> {
        let adapter = self.connected_adapter().await?;
        match adapter.get_block_number().await {
            Ok(block_number) => {
                self.inner
                    .notifier
                    .publish(ChangeEvent::BlockNumberUpdated { block_number });
                Ok(block_number)
            }
            Err(e) => {
                self.inner.report(&e);
                Err(e)
            }
        }
    }

    pub async fn is_wallet_installed(&self) -> bool {
        let session = self.inner.session.lock().await;
        session.adapter.as_ref().is_some_and(|a| a.is_installed())
    }

    pub async fn get_account(&self) -> Option<Account> {
        self.inner.session.lock().await.account
    }

    pub async fn get_chain_id(&self) -> Option<ChainId> {
        self.inner.session.lock().await.chain_id
    }

    /// Required chain of the connected adapter.
    pub async fn get_chain_info(&self) -> Option<ChainInfo> {
        let session = self.inner.session.lock().await;
        session.connected_adapter().map(|a| a.get_chain_info().clone())
    }

    pub async fn space(&self) -> Option<Space> {
        self.inner.session.lock().await.space
    }

    pub async fn provider(&self) -> Option<ProviderDescriptor> {
        self.inner.session.lock().await.provider
    }

    pub async fn state(&self) -> SessionState {
        self.inner.session.lock().await.state()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.inner.session.lock().await.snapshot()
    }

    async fn connected_adapter(&self) -> WalletResult<Arc<dyn WalletAdapter>> {
        self.inner
            .session
            .lock()
            .await
            .connected_adapter()
            .ok_or(WalletError::NotConnected)
    }

    /// Drain provider callbacks for `generation` until its listeners are removed.
    fn spawn_reconciler(
        &self,
        generation: u64,
        adapter: Arc<dyn WalletAdapter>,
        mut rx: mpsc::UnboundedReceiver<ProviderEvent>,
    ) {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                if !inner.reconcile(generation, &adapter, event).await {
                    break;
                }
            }
            tracing::debug!(generation, "Provider event stream closed");
        });
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("registry", &self.inner.registry)
            .field("notifier", &self.inner.notifier)
            .finish_non_exhaustive()
    }
}

/// Builder for [`SessionManager`].
pub struct SessionManagerBuilder {
    config: SessionConfig,
    registry: SpaceRegistry,
    discovery: Arc<dyn ProviderDiscovery>,
    notifier: Option<ChangeNotifier>,
}

impl Default for SessionManagerBuilder {
    fn default() -> Self {
        Self {
            config: SessionConfig::default(),
            registry: SpaceRegistry::standard(),
            discovery: Arc::new(StaticDiscovery::empty()),
            notifier: None,
        }
    }
}

impl SessionManagerBuilder {
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(mut self, registry: SpaceRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn discovery<D: ProviderDiscovery + 'static>(mut self, discovery: D) -> Self {
        self.discovery = Arc::new(discovery);
        self
    }

    pub fn shared_discovery(mut self, discovery: Arc<dyn ProviderDiscovery>) -> Self {
        self.discovery = discovery;
        self
    }

    /// Publish on `notifier` instead of a private bus, e.g. [`ChangeNotifier::global`].
    pub fn notifier(mut self, notifier: ChangeNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Build the manager. Invalid settings are logged; zero durations and
    /// bounds fall back to their defaults.
    pub fn build(self) -> SessionManager {
        if let Err(errors) = validate_config(&self.config) {
            for error in &errors {
                tracing::warn!(field = %error.field, message = %error.message, "Invalid session config");
            }
        }
        SessionManager {
            inner: Arc::new(Inner {
                config: self.config,
                registry: self.registry,
                discovery: self.discovery,
                notifier: self.notifier.unwrap_or_default(),
                session: Mutex::new(Session::default()),
                op_gate: Mutex::new(()),
                teardown: Teardown::new(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{InjectionSlot, SimFlavor, SimWallet};

    fn manager_with(wallet: &SimWallet) -> SessionManager {
        SessionManager::builder()
            .discovery(StaticDiscovery::empty().inject(InjectionSlot::Ethereum, Arc::new(wallet.clone())))
            .build()
    }

    #[tokio::test]
    async fn test_initial_state() {
        let manager = SessionManager::builder().build();
        assert_eq!(manager.state().await, SessionState::Idle);
        assert!(!manager.is_wallet_installed().await);
        assert!(manager.get_account().await.is_none());
    }

    #[tokio::test]
    async fn test_selection_errors() {
        let manager = SessionManager::builder().build();

        assert_eq!(
            manager.select_provider("MetaMask").await,
            Err(WalletError::NoSpaceSelected)
        );
        assert!(matches!(
            manager.select_space("bitcoin").await,
            Err(WalletError::InvalidSpace(_))
        ));
        assert_eq!(manager.connect().await, Err(WalletError::NoProviderSelected));
        assert_eq!(manager.state().await, SessionState::Idle);
    }

    #[tokio::test]
    async fn test_connect_and_disconnect() {
        let wallet = SimWallet::builder(SimFlavor::Evm).metamask().build();
        let manager = manager_with(&wallet);

        manager.select_space("espace").await.unwrap();
        manager.select_provider("MetaMask").await.unwrap();
        assert!(manager.is_wallet_installed().await);

        let account = manager.connect().await.unwrap();
        assert_eq!(manager.state().await, SessionState::Connected);
        assert_eq!(manager.get_account().await, Some(account));
        assert_eq!(manager.get_chain_id().await, Some(ChainId(1030)));
        assert_eq!(manager.get_chain_info().await.unwrap().id, ChainId(1030));

        manager.disconnect().await;
        assert_eq!(manager.state().await, SessionState::ProviderSelected);
        assert!(manager.get_chain_info().await.is_none());
        assert_eq!(wallet.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_connect_is_rejected() {
        let wallet = SimWallet::builder(SimFlavor::Evm)
            .metamask()
            .latency(std::time::Duration::from_millis(50))
            .build();
        let manager = manager_with(&wallet);
        manager.select_space("espace").await.unwrap();
        manager.select_provider("MetaMask").await.unwrap();

        let first = tokio::spawn({
            let manager = manager.clone();
            async move { manager.connect().await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert_eq!(manager.connect().await, Err(WalletError::OperationInFlight));
        assert!(first.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_disconnect_during_connect_cancels() {
        let wallet = SimWallet::builder(SimFlavor::Evm)
            .metamask()
            .latency(std::time::Duration::from_millis(50))
            .build();
        let manager = manager_with(&wallet);
        manager.select_space("espace").await.unwrap();
        manager.select_provider("MetaMask").await.unwrap();

        let pending = tokio::spawn({
            let manager = manager.clone();
            async move { manager.connect().await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        manager.disconnect().await;

        assert_eq!(pending.await.unwrap(), Err(WalletError::Cancelled));
        assert_eq!(manager.state().await, SessionState::ProviderSelected);
        assert_eq!(wallet.listener_count(), 0);
    }
}
