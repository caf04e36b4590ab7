//! Per-space RPC dialects.

use serde_json::{json, Value};

use crate::chain::{parse_quantity, Account, ChainInfo, ReceiptStatus, TransactionReceipt, TxHash};
use crate::space::Space;

/// Method names and payload shapes for one space.
pub trait SpaceRules: Send + Sync + 'static {
    const SPACE: Space;
    const REQUEST_ACCOUNTS: &'static str;
    const CHAIN_ID: &'static str;
    const SWITCH_CHAIN: &'static str;
    const ADD_CHAIN: &'static str;
    const GET_BALANCE: &'static str;
    const SEND_TRANSACTION: &'static str;
    const BLOCK_NUMBER: &'static str;
    const GET_RECEIPT: &'static str;

    fn balance_params(account: &Account) -> Value;

    fn block_number_params() -> Value;

    /// Decode a receipt payload. `Ok(None)` for a pending (null) receipt.
    fn parse_receipt(hash: TxHash, raw: &Value) -> Result<Option<TransactionReceipt>, String>;

    /// Parameters announcing `chain` to a provider that does not know it.
    fn add_chain_params(chain: &ChainInfo) -> Value {
        json!([{
            "chainId": chain.id.to_quantity(),
            "chainName": chain.name,
            "nativeCurrency": {
                "name": chain.currency_symbol,
                "symbol": chain.currency_symbol,
                "decimals": chain.decimals,
            },
            "rpcUrls": chain.rpc_url.iter().collect::<Vec<_>>(),
            "blockExplorerUrls": chain.explorer_url.iter().collect::<Vec<_>>(),
        }])
    }
}

/// eSpace: the standard Ethereum namespace.
#[derive(Debug, Clone, Copy)]
pub struct EvmRules;

impl SpaceRules for EvmRules {
    const SPACE: Space = Space::ESpace;
    const REQUEST_ACCOUNTS: &'static str = "eth_requestAccounts";
    const CHAIN_ID: &'static str = "eth_chainId";
    const SWITCH_CHAIN: &'static str = "wallet_switchEthereumChain";
    const ADD_CHAIN: &'static str = "wallet_addEthereumChain";
    const GET_BALANCE: &'static str = "eth_getBalance";
    const SEND_TRANSACTION: &'static str = "eth_sendTransaction";
    const BLOCK_NUMBER: &'static str = "eth_blockNumber";
    const GET_RECEIPT: &'static str = "eth_getTransactionReceipt";

    fn balance_params(account: &Account) -> Value {
        json!([account.to_string(), "latest"])
    }

    fn block_number_params() -> Value {
        json!([])
    }

    fn parse_receipt(hash: TxHash, raw: &Value) -> Result<Option<TransactionReceipt>, String> {
        if raw.is_null() {
            return Ok(None);
        }

        let status = quantity_field(raw, "status").ok_or("receipt has no status")?;
        Ok(Some(TransactionReceipt {
            hash,
            status: if status == 1 {
                ReceiptStatus::Success
            } else {
                ReceiptStatus::Failed
            },
            block_number: quantity_field(raw, "blockNumber"),
        }))
    }
}

/// Core: the Conflux `cfx` namespace. Heights are epoch numbers.
#[derive(Debug, Clone, Copy)]
pub struct CoreRules;

impl SpaceRules for CoreRules {
    const SPACE: Space = Space::Core;
    const REQUEST_ACCOUNTS: &'static str = "cfx_requestAccounts";
    const CHAIN_ID: &'static str = "cfx_chainId";
    const SWITCH_CHAIN: &'static str = "wallet_switchConfluxChain";
    const ADD_CHAIN: &'static str = "wallet_addConfluxChain";
    const GET_BALANCE: &'static str = "cfx_getBalance";
    const SEND_TRANSACTION: &'static str = "cfx_sendTransaction";
    const BLOCK_NUMBER: &'static str = "cfx_epochNumber";
    const GET_RECEIPT: &'static str = "cfx_getTransactionReceipt";

    fn balance_params(account: &Account) -> Value {
        json!([account.to_string(), "latest_state"])
    }

    fn block_number_params() -> Value {
        json!(["latest_mined"])
    }

    fn parse_receipt(hash: TxHash, raw: &Value) -> Result<Option<TransactionReceipt>, String> {
        if raw.is_null() {
            return Ok(None);
        }

        // outcomeStatus 0 is success; 1 failed; 2 skipped.
        let outcome = quantity_field(raw, "outcomeStatus").ok_or("receipt has no outcomeStatus")?;
        Ok(Some(TransactionReceipt {
            hash,
            status: if outcome == 0 {
                ReceiptStatus::Success
            } else {
                ReceiptStatus::Failed
            },
            block_number: quantity_field(raw, "epochNumber"),
        }))
    }
}

fn quantity_field(raw: &Value, name: &str) -> Option<u64> {
    match raw.get(name)? {
        Value::String(s) => parse_quantity(s),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evm_receipt() {
        let hash = TxHash::with_last_byte(7);
        let raw = json!({ "status": "0x1", "blockNumber": "0x10" });
        let receipt = EvmRules::parse_receipt(hash, &raw).unwrap().unwrap();
        assert!(receipt.succeeded());
        assert_eq!(receipt.block_number, Some(16));

        let reverted = json!({ "status": "0x0" });
        let receipt = EvmRules::parse_receipt(hash, &reverted).unwrap().unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Failed);

        assert_eq!(EvmRules::parse_receipt(hash, &Value::Null).unwrap(), None);
        assert!(EvmRules::parse_receipt(hash, &json!({})).is_err());
    }

    #[test]
    fn test_core_receipt() {
        let hash = TxHash::with_last_byte(9);
        let ok = json!({ "outcomeStatus": "0x0", "epochNumber": "0x2a" });
        let receipt = CoreRules::parse_receipt(hash, &ok).unwrap().unwrap();
        assert!(receipt.succeeded());
        assert_eq!(receipt.block_number, Some(42));

        let failed = json!({ "outcomeStatus": 1 });
        let receipt = CoreRules::parse_receipt(hash, &failed).unwrap().unwrap();
        assert!(!receipt.succeeded());
    }

    #[test]
    fn test_add_chain_params() {
        let params = EvmRules::add_chain_params(&ChainInfo::espace_mainnet());
        assert_eq!(params[0]["chainId"], "0x406");
        assert_eq!(params[0]["nativeCurrency"]["decimals"], 18);
        assert_eq!(params[0]["rpcUrls"][0], "https://evm.confluxrpc.com");
    }
}
