//! Chain primitives shared by adapters and the session manager.

use std::fmt;

use alloy::primitives::utils::{format_units, parse_units, ParseUnits};
use alloy::primitives::{B256, U256};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{WalletError, WalletResult};

/// Transaction hash as returned by providers.
pub type TxHash = B256;

/// Chain ID type for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub u64);

impl ChainId {
    /// Parse a provider-reported chain id (`0x`-prefixed hex or decimal).
    pub fn parse(raw: &str) -> Option<Self> {
        parse_quantity(raw).map(Self)
    }

    /// Hex quantity form used in RPC payloads.
    pub fn to_quantity(self) -> String {
        format!("0x{:x}", self.0)
    }
}

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Description of the chain an adapter requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainInfo {
    pub id: ChainId,
    pub name: String,
    pub currency_symbol: String,
    pub decimals: u8,
    pub rpc_url: Option<String>,
    pub explorer_url: Option<String>,
}

impl ChainInfo {
    pub fn espace_mainnet() -> Self {
        Self {
            id: ChainId(1030),
            name: "Conflux eSpace".to_string(),
            currency_symbol: "CFX".to_string(),
            decimals: Amount::NATIVE_DECIMALS,
            rpc_url: Some("https://evm.confluxrpc.com".to_string()),
            explorer_url: Some("https://evm.confluxscan.io".to_string()),
        }
    }

    pub fn core_mainnet() -> Self {
        Self {
            id: ChainId(1029),
            name: "Conflux Core".to_string(),
            currency_symbol: "CFX".to_string(),
            decimals: Amount::NATIVE_DECIMALS,
            rpc_url: Some("https://main.confluxrpc.com".to_string()),
            explorer_url: Some("https://confluxscan.io".to_string()),
        }
    }
}

/// Native-currency amount with a fixed number of decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Amount {
    raw: U256,
    decimals: u8,
}

impl Amount {
    /// CFX is denominated in 18 decimals on both spaces.
    pub const NATIVE_DECIMALS: u8 = 18;

    pub fn from_raw(raw: U256, decimals: u8) -> Self {
        Self { raw, decimals }
    }

    /// Parse a human-readable decimal string such as `"1.5"`.
    ///
    /// Negative, empty, or over-precise inputs are rejected.
    pub fn parse(input: &str, decimals: u8) -> WalletResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed.starts_with('-') {
            return Err(WalletError::InvalidAmount(input.to_string()));
        }

        let raw = match parse_units(trimmed, decimals) {
            Ok(ParseUnits::U256(value)) => value,
            Ok(ParseUnits::I256(_)) => return Err(WalletError::InvalidAmount(input.to_string())),
            Err(e) => return Err(WalletError::InvalidAmount(format!("{input}: {e}"))),
        };

        Ok(Self { raw, decimals })
    }

    /// Parse an RPC hex quantity in the smallest unit.
    pub fn from_quantity(raw: &str, decimals: u8) -> Option<Self> {
        let digits = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X"))?;
        let value = U256::from_str_radix(digits, 16).ok()?;
        Some(Self::from_raw(value, decimals))
    }

    pub fn raw(&self) -> U256 {
        self.raw
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn is_zero(&self) -> bool {
        self.raw.is_zero()
    }

    /// Hex quantity form used in RPC payloads.
    pub fn to_quantity(&self) -> String {
        format!("0x{:x}", self.raw)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match format_units(self.raw, self.decimals) {
            Ok(formatted) => {
                let trimmed = if formatted.contains('.') {
                    formatted.trim_end_matches('0').trim_end_matches('.')
                } else {
                    formatted.as_str()
                };
                f.write_str(trimmed)
            }
            Err(_) => write!(f, "{} (raw)", self.raw),
        }
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Outcome recorded in a mined receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Success,
    Failed,
}

/// Terminal receipt for a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionReceipt {
    pub hash: TxHash,
    pub status: ReceiptStatus,
    /// Block number (eSpace) or epoch number (Core) the transaction landed in.
    pub block_number: Option<u64>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status == ReceiptStatus::Success
    }
}

/// Parse an RPC quantity: `0x`-prefixed hex, or plain decimal.
pub fn parse_quantity(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) if !hex.is_empty() => u64::from_str_radix(hex, 16).ok(),
        Some(_) => None,
        None => raw.parse().ok(),
    }
}
