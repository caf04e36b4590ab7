//! In-process simulated wallet.
//!
//! Speaks both the `eth_*` and `cfx_*` RPC namespaces, keeps a small
//! deterministic ledger of sent transactions, and fires account/chain change
//! events to registered listeners. Used by the CLI driver and by tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use alloy::primitives::{keccak256, Address, B256, U256};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::chain::{Account, ChainId, TxHash};
use crate::provider::{
    InjectedProvider, ListenerId, ProviderEvent, ProviderEventKind, ProviderFlags, ProviderListener,
    ProviderRpcError,
};

/// Which RPC dialect the simulated wallet answers in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimFlavor {
    /// eSpace: hex accounts, `status` receipts, block numbers.
    Evm,
    /// Core: base32 accounts, `outcomeStatus` receipts, epoch numbers.
    Conflux,
}

/// A transaction accepted by the simulated wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentTransaction {
    pub hash: TxHash,
    pub from: String,
    pub to: String,
    pub value: U256,
}

#[derive(Debug)]
struct PendingReceipt {
    polls: u32,
}

#[derive(Debug)]
struct SimState {
    accounts: Vec<Address>,
    authorized: bool,
    chain_id: u64,
    balance: U256,
    block_number: u64,
    reject_connect: bool,
    reject_switch: bool,
    reject_send: bool,
    fail_send: bool,
    /// Number of receipt polls that answer `null` before the receipt appears.
    receipt_after: Option<u32>,
    revert: bool,
    /// Chains the wallet has been told about. `None` means every chain is known.
    known_chains: Option<Vec<u64>>,
    pending: HashMap<TxHash, PendingReceipt>,
    sent: Vec<SentTransaction>,
    requests: Vec<String>,
    nonce: u64,
}

impl SimState {
    fn knows(&self, chain_id: u64) -> bool {
        self.known_chains
            .as_ref()
            .map_or(true, |known| known.contains(&chain_id))
    }
}

struct SimInner {
    flavor: SimFlavor,
    flags: ProviderFlags,
    latency: Duration,
    state: Mutex<SimState>,
    listeners: Mutex<Vec<(ListenerId, ProviderEventKind, ProviderListener)>>,
    next_listener: AtomicU64,
}

/// Simulated injected provider. Cloning shares the same wallet.
#[derive(Clone)]
pub struct SimWallet {
    inner: Arc<SimInner>,
}

impl SimWallet {
    pub fn builder(flavor: SimFlavor) -> SimWalletBuilder {
        SimWalletBuilder::new(flavor)
    }

    pub fn flavor(&self) -> SimFlavor {
        self.inner.flavor
    }

    pub fn chain_id(&self) -> ChainId {
        ChainId(self.state().chain_id)
    }

    /// Replace the account list and notify listeners, like a user switching accounts.
    pub fn set_accounts(&self, accounts: Vec<Address>) {
        let rendered = {
            let mut state = self.state();
            state.accounts = accounts;
            self.render_accounts(&state)
        };
        self.emit(ProviderEvent::AccountsChanged(rendered));
    }

    /// Move the wallet to another chain and notify listeners if it changed.
    pub fn set_chain(&self, chain_id: u64) {
        let changed = {
            let mut state = self.state();
            let changed = state.chain_id != chain_id;
            state.chain_id = chain_id;
            changed
        };
        if changed {
            self.emit(ProviderEvent::ChainChanged(ChainId(chain_id).to_quantity()));
        }
    }

    pub fn set_balance(&self, balance: U256) {
        self.state().balance = balance;
    }

    pub fn set_block_number(&self, block_number: u64) {
        self.state().block_number = block_number;
    }

    pub fn set_reject_switch(&self, reject: bool) {
        self.state().reject_switch = reject;
    }

    pub fn set_receipt_after(&self, polls: Option<u32>) {
        self.state().receipt_after = polls;
    }

    pub fn listener_count(&self) -> usize {
        self.listeners().len()
    }

    pub fn sent_transactions(&self) -> Vec<SentTransaction> {
        self.state().sent.clone()
    }

    /// Receipt polls observed for `hash`.
    pub fn receipt_polls(&self, hash: &TxHash) -> u32 {
        self.state().pending.get(hash).map(|p| p.polls).unwrap_or(0)
    }

    /// Number of requests issued for `method`.
    pub fn request_count(&self, method: &str) -> usize {
        self.state().requests.iter().filter(|m| *m == method).count()
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn listeners(
        &self,
    ) -> MutexGuard<'_, Vec<(ListenerId, ProviderEventKind, ProviderListener)>> {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn render_account(&self, address: Address, chain_id: u64) -> String {
        match self.inner.flavor {
            SimFlavor::Evm => Account::Hex(address).to_string(),
            SimFlavor::Conflux => Account::core(address, chain_id).to_string(),
        }
    }

    fn render_accounts(&self, state: &SimState) -> Vec<String> {
        state
            .accounts
            .iter()
            .map(|a| self.render_account(*a, state.chain_id))
            .collect()
    }

    fn emit(&self, event: ProviderEvent) {
        let kind = event.kind();
        let matching: Vec<ProviderListener> = self
            .listeners()
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, l)| l.clone())
            .collect();

        for listener in matching {
            listener(&event);
        }
    }

    fn handle(&self, method: &str, params: &Value) -> (Result<Value, ProviderRpcError>, Option<ProviderEvent>) {
        let op = method.split_once('_').map(|(_, op)| op).unwrap_or(method);
        let mut state = self.state();
        state.requests.push(method.to_string());

        let result = match op {
            "requestAccounts" => {
                if state.reject_connect {
                    Err(ProviderRpcError::user_rejected())
                } else {
                    state.authorized = true;
                    Ok(json!(self.render_accounts(&state)))
                }
            }
            "accounts" => {
                if state.authorized {
                    Ok(json!(self.render_accounts(&state)))
                } else {
                    Ok(json!([]))
                }
            }
            "chainId" => Ok(json!(ChainId(state.chain_id).to_quantity())),
            "switchEthereumChain" | "switchConfluxChain" => {
                if state.reject_switch {
                    return (Err(ProviderRpcError::user_rejected()), None);
                }
                let target = params
                    .get(0)
                    .and_then(|p| p.get("chainId"))
                    .and_then(Value::as_str)
                    .and_then(ChainId::parse);
                match target {
                    Some(target) if !state.knows(target.0) => Err(ProviderRpcError::new(
                        ProviderRpcError::UNRECOGNIZED_CHAIN,
                        format!("unrecognized chain {target}"),
                    )),
                    Some(target) if target.0 != state.chain_id => {
                        state.chain_id = target.0;
                        return (
                            Ok(Value::Null),
                            Some(ProviderEvent::ChainChanged(target.to_quantity())),
                        );
                    }
                    Some(_) => Ok(Value::Null),
                    None => Err(ProviderRpcError::new(-32602, "missing chainId")),
                }
            }
            "addEthereumChain" | "addConfluxChain" => {
                let added = params
                    .get(0)
                    .and_then(|p| p.get("chainId"))
                    .and_then(Value::as_str)
                    .and_then(ChainId::parse);
                match added {
                    Some(id) => {
                        if let Some(known) = state.known_chains.as_mut() {
                            known.push(id.0);
                        }
                        Ok(Value::Null)
                    }
                    None => Err(ProviderRpcError::new(-32602, "missing chainId")),
                }
            }
            "getBalance" => Ok(json!(format!("0x{:x}", state.balance))),
            "blockNumber" | "epochNumber" => Ok(json!(format!("0x{:x}", state.block_number))),
            "sendTransaction" => self.send(&mut state, params),
            "getTransactionReceipt" => Ok(self.receipt(&mut state, params)),
            _ => Err(ProviderRpcError::new(
                ProviderRpcError::UNSUPPORTED_METHOD,
                format!("method {method} not supported"),
            )),
        };

        (result, None)
    }

    fn send(&self, state: &mut SimState, params: &Value) -> Result<Value, ProviderRpcError> {
        if state.reject_send {
            return Err(ProviderRpcError::user_rejected());
        }
        if state.fail_send {
            return Err(ProviderRpcError::new(ProviderRpcError::INTERNAL, "insufficient funds"));
        }

        let tx = params.get(0).ok_or_else(|| ProviderRpcError::new(-32602, "missing transaction"))?;
        let field = |name: &str| tx.get(name).and_then(Value::as_str).unwrap_or_default().to_string();
        let from = field("from");
        let to = field("to");
        let value = field("value");
        let value = value
            .strip_prefix("0x")
            .and_then(|hex| U256::from_str_radix(hex, 16).ok())
            .ok_or_else(|| ProviderRpcError::new(-32602, "invalid value"))?;

        state.nonce += 1;
        let hash: B256 = keccak256(format!("{from}|{to}|{value}|{}", state.nonce).as_bytes());
        state.pending.insert(hash, PendingReceipt { polls: 0 });
        state.sent.push(SentTransaction {
            hash,
            from,
            to,
            value,
        });

        Ok(json!(hash.to_string()))
    }

    fn receipt(&self, state: &mut SimState, params: &Value) -> Value {
        let Some(hash) = params
            .get(0)
            .and_then(Value::as_str)
            .and_then(|h| h.parse::<B256>().ok())
        else {
            return Value::Null;
        };

        let receipt_after = state.receipt_after;
        let revert = state.revert;
        let block = state.block_number;
        let Some(pending) = state.pending.get_mut(&hash) else {
            return Value::Null;
        };
        pending.polls += 1;

        match receipt_after {
            Some(after) if pending.polls > after => match self.inner.flavor {
                SimFlavor::Evm => json!({
                    "transactionHash": hash.to_string(),
                    "status": if revert { "0x0" } else { "0x1" },
                    "blockNumber": format!("0x{block:x}"),
                }),
                SimFlavor::Conflux => json!({
                    "transactionHash": hash.to_string(),
                    "outcomeStatus": if revert { "0x1" } else { "0x0" },
                    "epochNumber": format!("0x{block:x}"),
                }),
            },
            _ => Value::Null,
        }
    }
}

#[async_trait]
impl InjectedProvider for SimWallet {
    fn flags(&self) -> ProviderFlags {
        self.inner.flags
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError> {
        if !self.inner.latency.is_zero() {
            tokio::time::sleep(self.inner.latency).await;
        }

        let (result, event) = self.handle(method, &params);
        if let Some(event) = event {
            self.emit(event);
        }
        result
    }

    fn on(&self, kind: ProviderEventKind, listener: ProviderListener) -> ListenerId {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners().push((id, kind, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners();
        let before = listeners.len();
        listeners.retain(|(lid, _, _)| *lid != id);
        listeners.len() != before
    }
}

/// Builder for [`SimWallet`].
pub struct SimWalletBuilder {
    flavor: SimFlavor,
    flags: ProviderFlags,
    latency: Duration,
    state: SimState,
}

impl SimWalletBuilder {
    fn new(flavor: SimFlavor) -> Self {
        let chain_id = match flavor {
            SimFlavor::Evm => 1030,
            SimFlavor::Conflux => 1029,
        };

        Self {
            flavor,
            flags: ProviderFlags {
                is_metamask: false,
                is_fluent: flavor == SimFlavor::Conflux,
            },
            latency: Duration::ZERO,
            state: SimState {
                accounts: vec![Address::with_last_byte(1)],
                authorized: false,
                chain_id,
                balance: U256::ZERO,
                block_number: 1,
                reject_connect: false,
                reject_switch: false,
                reject_send: false,
                fail_send: false,
                receipt_after: Some(0),
                revert: false,
                known_chains: None,
                pending: HashMap::new(),
                sent: Vec::new(),
                requests: Vec::new(),
                nonce: 0,
            },
        }
    }

    /// Advertise `isMetaMask`.
    pub fn metamask(mut self) -> Self {
        self.flags = ProviderFlags {
            is_metamask: true,
            is_fluent: false,
        };
        self
    }

    /// Advertise `isFluent`.
    pub fn fluent(mut self) -> Self {
        self.flags = ProviderFlags {
            is_metamask: false,
            is_fluent: true,
        };
        self
    }

    pub fn chain_id(mut self, chain_id: u64) -> Self {
        self.state.chain_id = chain_id;
        self
    }

    pub fn accounts(mut self, accounts: Vec<Address>) -> Self {
        self.state.accounts = accounts;
        self
    }

    pub fn balance(mut self, balance: U256) -> Self {
        self.state.balance = balance;
        self
    }

    pub fn block_number(mut self, block_number: u64) -> Self {
        self.state.block_number = block_number;
        self
    }

    pub fn reject_connect(mut self) -> Self {
        self.state.reject_connect = true;
        self
    }

    pub fn reject_switch(mut self) -> Self {
        self.state.reject_switch = true;
        self
    }

    pub fn reject_send(mut self) -> Self {
        self.state.reject_send = true;
        self
    }

    pub fn fail_send(mut self) -> Self {
        self.state.fail_send = true;
        self
    }

    /// Answer `null` for the first `polls` receipt requests.
    pub fn receipt_after(mut self, polls: u32) -> Self {
        self.state.receipt_after = Some(polls);
        self
    }

    /// Never produce a receipt.
    pub fn never_mined(mut self) -> Self {
        self.state.receipt_after = None;
        self
    }

    /// Mine transactions with a failed status.
    pub fn revert_transactions(mut self) -> Self {
        self.state.revert = true;
        self
    }

    /// Only know the chain the wallet starts on; switching elsewhere answers 4902
    /// until the chain is added.
    pub fn unknown_chains(mut self) -> Self {
        self.state.known_chains = Some(Vec::new());
        self
    }

    /// Delay every request by `latency`.
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn build(mut self) -> SimWallet {
        let current = self.state.chain_id;
        if let Some(known) = self.state.known_chains.as_mut() {
            known.push(current);
        }
        SimWallet {
            inner: Arc::new(SimInner {
                flavor: self.flavor,
                flags: self.flags,
                latency: self.latency,
                state: Mutex::new(self.state),
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(1),
            }),
        }
    }
}
