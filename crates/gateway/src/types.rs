//! Domain types shared by the intent builder, signer and chain clients

use std::fmt;

pub use ethabi::{Address, Hash as H256, Uint as U256};

use crate::error::{GatewayError, GatewayResult};

/// Opaque event identifier scoping funds inside the faucet contract.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventId(String);

impl EventId {
    pub fn new(value: impl Into<String>) -> GatewayResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(GatewayError::Validation("event identifier must not be empty".to_string()));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Gateway operations that end in a signed transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    TopUp,
    Drip,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::TopUp => "top_up",
            Operation::Drip => "drip",
        }
    }
}

/// Contract call carried by a faucet transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaucetCall {
    CreateFaucet { event: EventId },
    TopUp { event: EventId },
    Drip { event: EventId, recipient: Address },
}

impl FaucetCall {
    pub fn operation(&self) -> Operation {
        match self {
            FaucetCall::CreateFaucet { .. } => Operation::Create,
            FaucetCall::TopUp { .. } => Operation::TopUp,
            FaucetCall::Drip { .. } => Operation::Drip,
        }
    }
}

/// EIP-1559 fee parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeParams {
    pub gas_limit: u64,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
}

impl FeeParams {
    /// Worst-case fee cost: `gas_limit * max_fee_per_gas`.
    pub fn reserve(&self) -> U256 {
        U256::from(self.gas_limit).saturating_mul(self.max_fee_per_gas)
    }
}

/// Assembled parameters for one on-chain call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionIntent {
    pub call: FaucetCall,
    pub from: Address,
    pub value: U256,
    pub fees: FeeParams,
    pub nonce: u64,
}

/// Typed (0x02) transaction ready for signing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub to: Address,
    pub value: U256,
    pub data: Vec<u8>,
    pub gas_limit: u64,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    pub call: FaucetCall,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub tx: UnsignedTransaction,
    pub from: Address,
    /// EIP-2718 envelope bytes as sent with `eth_sendRawTransaction`
    pub raw: Vec<u8>,
    pub hash: H256,
}

impl SignedTransaction {
    pub fn raw_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: H256,
    pub block_number: u64,
    pub success: bool,
}

/// Outcome of a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionResult {
    pub tx_hash: H256,
    pub receipt: Option<Receipt>,
}

pub fn hex_hash(hash: &H256) -> String {
    format!("0x{}", hex::encode(hash.as_bytes()))
}

pub fn hex_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_bytes()))
}

/// Parse a 20-byte hex address with or without the `0x` prefix.
pub fn parse_address(value: &str) -> Option<Address> {
    let value = value.trim();
    let digits = value.strip_prefix("0x").unwrap_or(value);
    match hex::decode(digits) {
        Ok(bytes) if bytes.len() == 20 => Some(Address::from_slice(&bytes)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_id_rejects_blank() {
        assert!(EventId::new("").is_err());
        assert!(EventId::new("   ").is_err());
        assert_eq!(EventId::new(" Dev Con ").unwrap().as_str(), " Dev Con ");
    }

    #[test]
    fn test_parse_address() {
        let addr = parse_address("0x2c7536E3605D9C16a7a3D7b1898e529396a65c23").unwrap();
        assert_eq!(hex_address(&addr), "0x2c7536e3605d9c16a7a3d7b1898e529396a65c23");
        assert!(parse_address("2c7536E3605D9C16a7a3D7b1898e529396a65c23").is_some());
        assert!(parse_address("0x1234").is_none());
        assert!(parse_address("not-an-address").is_none());
    }

    #[test]
    fn test_fee_reserve() {
        let fees = FeeParams {
            gas_limit: 2_000_000,
            max_fee_per_gas: U256::from(50_000_000_000u64),
            max_priority_fee_per_gas: U256::from(2_000_000_000u64),
        };
        assert_eq!(fees.reserve(), U256::from(100_000_000_000_000_000u64));
    }
}
