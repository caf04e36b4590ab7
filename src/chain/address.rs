//! Account encodings for each space.
//!
//! eSpace accounts are plain 20-byte hex addresses. Core accounts carry the
//! same 20 bytes in CIP-37 base32 form, prefixed with a network tag
//! (`cfx`, `cfxtest`, or `net<id>`) and protected by a 40-bit checksum.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::Address;
use serde::{Serialize, Serializer};

use crate::error::{WalletError, WalletResult};
use crate::space::Space;

/// An account identifier in the encoding of its space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Account {
    /// eSpace account, displayed with EIP-55 checksum casing.
    Hex(Address),
    /// Core account bound to a network id.
    Base32 { address: Address, network_id: u64 },
}

impl Account {
    /// Parse a provider- or user-supplied account string for `space`.
    pub fn parse(space: Space, input: &str) -> WalletResult<Self> {
        let invalid = || WalletError::InvalidAddress {
            space: space.to_string(),
            input: input.to_string(),
        };

        let trimmed = input.trim();
        match space {
            Space::ESpace => {
                let hex = trimmed
                    .strip_prefix("0x")
                    .or_else(|| trimmed.strip_prefix("0X"))
                    .ok_or_else(invalid)?;
                if hex.len() != 40 {
                    return Err(invalid());
                }
                Address::from_str(hex).map(Self::Hex).map_err(|_| invalid())
            }
            Space::Core => {
                let (address, network_id) = cip37::decode(trimmed).ok_or_else(invalid)?;
                Ok(Self::Base32 {
                    address,
                    network_id,
                })
            }
        }
    }

    /// Core account for the given network.
    pub fn core(address: Address, network_id: u64) -> Self {
        Self::Base32 {
            address,
            network_id,
        }
    }

    /// Raw 20-byte address regardless of encoding.
    pub fn address(&self) -> Address {
        match self {
            Self::Hex(address) => *address,
            Self::Base32 { address, .. } => *address,
        }
    }

    pub fn space(&self) -> Space {
        match self {
            Self::Hex(_) => Space::ESpace,
            Self::Base32 { .. } => Space::Core,
        }
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hex(address) => write!(f, "{address}"),
            Self::Base32 {
                address,
                network_id,
            } => f.write_str(&cip37::encode(address, *network_id)),
        }
    }
}

impl Serialize for Account {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// CIP-37 base32 address codec.
pub mod cip37 {
    use std::iter;

    use alloy::primitives::Address;
    use bech32::primitives::iter::{ByteIterExt, Fe32IterExt};
    use bech32::Fe32;

    const ALPHABET: &[u8; 32] = b"abcdefghjkmnprstuvwxyz0123456789";
    const CHECKSUM_WORDS: usize = 8;
    const VERSION_BYTE: u8 = 0;
    /// Version byte plus a 20-byte address, regrouped into 5-bit words.
    const PAYLOAD_WORDS: usize = 34;

    pub const MAINNET_ID: u64 = 1029;
    pub const TESTNET_ID: u64 = 1;

    /// Network prefix for a network id.
    pub fn prefix(network_id: u64) -> String {
        match network_id {
            MAINNET_ID => "cfx".to_string(),
            TESTNET_ID => "cfxtest".to_string(),
            other => format!("net{other}"),
        }
    }

    fn network_id(prefix: &str) -> Option<u64> {
        match prefix {
            "cfx" => Some(MAINNET_ID),
            "cfxtest" => Some(TESTNET_ID),
            other => {
                let id: u64 = other.strip_prefix("net")?.parse().ok()?;
                // The named networks must use their names.
                (id != MAINNET_ID && id != TESTNET_ID).then_some(id)
            }
        }
    }

    pub fn encode(address: &Address, network_id: u64) -> String {
        let prefix = prefix(network_id);

        let mut words: Vec<u8> = iter::once(VERSION_BYTE)
            .chain(address.as_slice().iter().copied())
            .bytes_to_fes()
            .map(|fe| fe.to_u8())
            .collect();

        let checksum = polymod(&checksum_input(&prefix, &words, &[0; CHECKSUM_WORDS]));
        for i in 0..CHECKSUM_WORDS {
            words.push(((checksum >> (5 * (CHECKSUM_WORDS - 1 - i))) & 0x1f) as u8);
        }

        let body: String = words.iter().map(|&w| ALPHABET[w as usize] as char).collect();
        format!("{prefix}:{body}")
    }

    /// Decode `prefix[:type.xxx]:payload` into the address and network id.
    pub fn decode(input: &str) -> Option<(Address, u64)> {
        let lowered = if input.chars().any(|c| c.is_ascii_lowercase()) {
            if input.chars().any(|c| c.is_ascii_uppercase()) {
                return None;
            }
            input.to_string()
        } else {
            input.to_ascii_lowercase()
        };

        let mut parts = lowered.split(':');
        let prefix = parts.next()?;
        let body = parts.last()?;
        let network_id = network_id(prefix)?;

        let words = body
            .bytes()
            .map(|c| ALPHABET.iter().position(|&a| a == c).map(|p| p as u8))
            .collect::<Option<Vec<u8>>>()?;
        if words.len() <= CHECKSUM_WORDS {
            return None;
        }

        if polymod(&checksum_input(prefix, &words, &[])) != 0 {
            return None;
        }

        let data = &words[..words.len() - CHECKSUM_WORDS];
        // 170 bits carry 168 bits of payload; the two spare bits must be zero.
        if data.len() != PAYLOAD_WORDS || data[PAYLOAD_WORDS - 1] & 0b11 != 0 {
            return None;
        }
        let payload: Vec<u8> = data
            .iter()
            .map(|&w| Fe32::try_from(w).ok())
            .collect::<Option<Vec<Fe32>>>()?
            .into_iter()
            .fes_to_bytes()
            .collect();
        if payload.len() != 21 || payload[0] != VERSION_BYTE {
            return None;
        }

        Some((Address::from_slice(&payload[1..]), network_id))
    }

    fn checksum_input(prefix: &str, words: &[u8], tail: &[u8]) -> Vec<u8> {
        let mut input: Vec<u8> = prefix.bytes().map(|b| b & 0x1f).collect();
        input.push(0);
        input.extend_from_slice(words);
        input.extend_from_slice(tail);
        input
    }

    fn polymod(values: &[u8]) -> u64 {
        const GENERATORS: [u64; 5] = [
            0x98f2bc8e61,
            0x79b76d99e2,
            0xf33e5fb3c4,
            0xae2eabe2a8,
            0x1e4f43e470,
        ];

        let mut c: u64 = 1;
        for &d in values {
            let c0 = (c >> 35) as u8;
            c = ((c & 0x07_ffff_ffff) << 5) ^ u64::from(d);
            for (i, generator) in GENERATORS.iter().enumerate() {
                if c0 & (1 << i) != 0 {
                    c ^= generator;
                }
            }
        }
        c ^ 1
    }
}
