//! Adapter over an injected provider, parameterized by space rules.
//!
//! # Responsibilities
//! - Run the connect handshake (accounts, chain id, chain switch)
//! - Own the provider listeners for the current connection
//! - Map provider failures onto the wallet error taxonomy

use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::adapter::{AccountChange, AdapterEventSink, Connection, SpaceRules, WalletAdapter};
use crate::chain::{parse_quantity, Account, Amount, ChainId, ChainInfo, TransactionReceipt, TxHash};
use crate::error::{WalletError, WalletResult};
use crate::provider::{
    InjectedProvider, ListenerId, ProviderEvent, ProviderEventKind, ProviderRpcError, RpcTransport,
    TransportError,
};
use crate::space::ProviderDescriptor;

#[derive(Debug, Default)]
struct AdapterState {
    account: Option<Account>,
    chain_id: Option<ChainId>,
    listeners: Vec<ListenerId>,
}

/// Wallet adapter bound to one injected provider object.
pub struct InjectedAdapter<R: SpaceRules> {
    descriptor: ProviderDescriptor,
    provider: Option<Arc<dyn InjectedProvider>>,
    chain: ChainInfo,
    request_timeout: Duration,
    state: Mutex<AdapterState>,
    _rules: PhantomData<fn() -> R>,
}

impl<R: SpaceRules> InjectedAdapter<R> {
    pub fn new(
        descriptor: ProviderDescriptor,
        provider: Option<Arc<dyn InjectedProvider>>,
        chain: ChainInfo,
        request_timeout: Duration,
    ) -> Self {
        Self {
            descriptor,
            provider,
            chain,
            request_timeout,
            state: Mutex::new(AdapterState::default()),
            _rules: PhantomData,
        }
    }

    fn state(&self) -> MutexGuard<'_, AdapterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transport(&self) -> WalletResult<RpcTransport> {
        self.provider
            .as_ref()
            .map(|p| RpcTransport::new(p.clone(), self.request_timeout))
            .ok_or_else(|| WalletError::ProviderUnavailable(self.descriptor.name().to_string()))
    }

    /// Transport plus the connected account.
    fn connected(&self) -> WalletResult<(RpcTransport, Account)> {
        let transport = self.transport()?;
        let account = self.state().account.ok_or(WalletError::NotConnected)?;
        Ok((transport, account))
    }

    fn remove_listeners(&self) {
        let ids = std::mem::take(&mut self.state().listeners);
        if let Some(provider) = &self.provider {
            for id in ids {
                provider.remove_listener(id);
            }
        }
    }

    async fn read_chain_id(&self, transport: &RpcTransport) -> WalletResult<ChainId> {
        let raw: String = transport
            .call(R::CHAIN_ID, json!([]))
            .await
            .map_err(connect_error)?;
        ChainId::parse(&raw).ok_or_else(|| WalletError::ConnectionRejected(format!("unreadable chain id {raw}")))
    }

    /// Ask the provider to move to the required chain, registering it first
    /// if the provider reports it as unknown.
    async fn switch_chain(&self, transport: &RpcTransport) -> WalletResult<()> {
        let target = self.chain.id;
        let params = json!([{ "chainId": target.to_quantity() }]);

        match transport.call_raw(R::SWITCH_CHAIN, params.clone()).await {
            Ok(_) => Ok(()),
            Err(TransportError::Rpc(e)) if e.code == ProviderRpcError::UNRECOGNIZED_CHAIN => {
                tracing::info!(chain_id = %target, "Provider does not know chain, adding it");
                transport
                    .call_raw(R::ADD_CHAIN, R::add_chain_params(&self.chain))
                    .await
                    .map_err(|e| switch_error(target, e))?;
                transport
                    .call_raw(R::SWITCH_CHAIN, params)
                    .await
                    .map(|_| ())
                    .map_err(|e| switch_error(target, e))
            }
            Err(e) => Err(switch_error(target, e)),
        }
    }
}

#[async_trait]
impl<R: SpaceRules> WalletAdapter for InjectedAdapter<R> {
    fn descriptor(&self) -> ProviderDescriptor {
        self.descriptor
    }

    fn is_installed(&self) -> bool {
        self.provider.is_some()
    }

    fn is_connected(&self) -> bool {
        self.provider.is_some() && self.state().account.is_some()
    }

    fn get_account(&self) -> Option<Account> {
        self.state().account
    }

    fn get_chain_id(&self) -> Option<ChainId> {
        self.state().chain_id
    }

    fn get_chain_info(&self) -> &ChainInfo {
        &self.chain
    }

    async fn connect(&self, sink: AdapterEventSink) -> WalletResult<Connection> {
        let transport = self.transport()?;
        self.disconnect_wallet();

        let accounts: Vec<String> = transport
            .call(R::REQUEST_ACCOUNTS, json!([]))
            .await
            .map_err(connect_error)?;
        let first = accounts.first().ok_or(WalletError::NoAccounts)?;
        let account = Account::parse(R::SPACE, first)?;

        let mut chain_id = self.read_chain_id(&transport).await?;
        if chain_id != self.chain.id {
            tracing::info!(
                provider = self.descriptor.name(),
                current = %chain_id,
                required = %self.chain.id,
                "Switching provider to required chain"
            );
            self.switch_chain(&transport).await?;
            chain_id = self.read_chain_id(&transport).await?;
        }

        {
            let mut state = self.state();
            state.account = Some(account);
            state.chain_id = Some(chain_id);
        }
        self.watch_account_and_chain(sink)?;

        tracing::info!(
            provider = self.descriptor.name(),
            account = %account,
            chain_id = %chain_id,
            "Provider connected"
        );

        Ok(Connection { account, chain_id })
    }

    async fn switch_network(&self) -> WalletResult<ChainId> {
        let (transport, _) = self.connected()?;
        let target = self.chain.id;
        self.switch_chain(&transport).await?;

        let chain_id = self.read_chain_id(&transport).await.map_err(|e| match e {
            WalletError::ConnectionRejected(reason) => WalletError::ChainSwitchFailed { target, reason },
            e => e,
        })?;
        self.state().chain_id = Some(chain_id);
        Ok(chain_id)
    }

    fn watch_account_and_chain(&self, sink: AdapterEventSink) -> WalletResult<()> {
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| WalletError::ProviderUnavailable(self.descriptor.name().to_string()))?;
        self.remove_listeners();

        let mut ids = Vec::with_capacity(2);
        for kind in [ProviderEventKind::AccountsChanged, ProviderEventKind::ChainChanged] {
            let sink = sink.clone();
            ids.push(provider.on(
                kind,
                Arc::new(move |event: &ProviderEvent| {
                    // Receiver gone means the session moved on.
                    let _ = sink.send(event.clone());
                }),
            ));
        }

        self.state().listeners = ids;
        Ok(())
    }

    fn disconnect_wallet(&self) {
        self.remove_listeners();
        let mut state = self.state();
        state.account = None;
        state.chain_id = None;
    }

    async fn get_balance(&self) -> WalletResult<Amount> {
        let (transport, account) = self.connected()?;
        let raw: String = transport
            .call(R::GET_BALANCE, R::balance_params(&account))
            .await
            .map_err(|e| read_error(R::GET_BALANCE, e))?;

        Amount::from_quantity(&raw, self.chain.decimals).ok_or_else(|| WalletError::RequestFailed {
            method: R::GET_BALANCE.to_string(),
            reason: format!("unreadable balance {raw}"),
        })
    }

    async fn get_block_number(&self) -> WalletResult<u64> {
        let (transport, _) = self.connected()?;
        let raw: String = transport
            .call(R::BLOCK_NUMBER, R::block_number_params())
            .await
            .map_err(|e| read_error(R::BLOCK_NUMBER, e))?;

        parse_quantity(&raw).ok_or_else(|| WalletError::RequestFailed {
            method: R::BLOCK_NUMBER.to_string(),
            reason: format!("unreadable height {raw}"),
        })
    }

    async fn send_transaction(&self, to: &Account, amount: &Amount) -> WalletResult<TxHash> {
        let (transport, account) = self.connected()?;
        if to.space() != R::SPACE {
            return Err(WalletError::InvalidAddress {
                space: R::SPACE.to_string(),
                input: to.to_string(),
            });
        }

        let params = json!([{
            "from": account.to_string(),
            "to": to.to_string(),
            "value": amount.to_quantity(),
        }]);

        let raw: String = transport
            .call(R::SEND_TRANSACTION, params)
            .await
            .map_err(|e| match e {
                e if e.is_user_rejection() => WalletError::TransactionRejected(e.to_string()),
                TransportError::Timeout { method, after } => WalletError::Timeout { method, after },
                e => WalletError::TransactionFailed(e.to_string()),
            })?;

        raw.parse::<TxHash>()
            .map_err(|_| WalletError::TransactionFailed(format!("provider returned invalid hash {raw}")))
    }

    async fn get_transaction_receipt(&self, hash: &TxHash) -> WalletResult<Option<TransactionReceipt>> {
        let (transport, _) = self.connected()?;
        let raw = transport
            .call_raw(R::GET_RECEIPT, json!([hash.to_string()]))
            .await
            .map_err(|e| read_error(R::GET_RECEIPT, e))?;

        R::parse_receipt(*hash, &raw).map_err(|reason| WalletError::RequestFailed {
            method: R::GET_RECEIPT.to_string(),
            reason,
        })
    }

    fn on_accounts_changed(&self, accounts: &[String]) -> WalletResult<AccountChange> {
        let Some(first) = accounts.first() else {
            tracing::info!(provider = self.descriptor.name(), "Provider revoked account access");
            self.disconnect_wallet();
            return Ok(AccountChange::Disconnected);
        };

        let account = Account::parse(R::SPACE, first)?;
        self.state().account = Some(account);
        Ok(AccountChange::Switched(account))
    }

    async fn on_chain_changed(&self, raw: &str) -> WalletResult<ChainId> {
        let chain_id = ChainId::parse(raw).ok_or_else(|| WalletError::RequestFailed {
            method: "chainChanged".to_string(),
            reason: format!("unreadable chain id {raw}"),
        })?;
        self.state().chain_id = Some(chain_id);

        if chain_id != self.chain.id {
            let switched = match self.transport() {
                Ok(transport) => self.switch_chain(&transport).await,
                Err(e) => Err(e),
            };
            if let Err(e) = switched {
                tracing::warn!(
                    provider = self.descriptor.name(),
                    reported = %chain_id,
                    required = %self.chain.id,
                    error = %e,
                    "Could not switch provider back to required chain"
                );
            }
        }

        Ok(chain_id)
    }
}

fn connect_error(e: TransportError) -> WalletError {
    match e {
        TransportError::Timeout { method, after } => WalletError::Timeout { method, after },
        e => WalletError::ConnectionRejected(e.to_string()),
    }
}

fn switch_error(target: ChainId, e: TransportError) -> WalletError {
    WalletError::ChainSwitchFailed {
        target,
        reason: e.to_string(),
    }
}

fn read_error(method: &str, e: TransportError) -> WalletError {
    match e {
        TransportError::Timeout { method, after } => WalletError::Timeout { method, after },
        e => WalletError::RequestFailed {
            method: method.to_string(),
            reason: e.to_string(),
        },
    }
}
