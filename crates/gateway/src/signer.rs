//! secp256k1 keys, address derivation and EIP-1559 transaction signing

use crate::error::{GatewayError, GatewayResult};
use crate::types::{Address, SignedTransaction, UnsignedTransaction, H256, U256};
use k256::ecdsa::{SigningKey, VerifyingKey};
use rlp::RlpStream;
use std::fmt;

/// EIP-2718 type byte for dynamic-fee transactions
const TX_TYPE_EIP1559: u8 = 0x02;

/// Private key together with its derived address
#[derive(Clone)]
pub struct Signer {
    key: SigningKey,
    address: Address,
}

impl Signer {
    /// Parse a 32-byte hex private key, with or without `0x`.
    pub fn from_hex(value: &str) -> GatewayResult<Self> {
        let value = value.trim();
        let digits = value.strip_prefix("0x").unwrap_or(value);
        let bytes = hex::decode(digits)
            .map_err(|e| GatewayError::Validation(format!("invalid private key: {}", e)))?;
        if bytes.len() != 32 {
            return Err(GatewayError::Validation(format!(
                "invalid private key: expected 32 bytes, got {}",
                bytes.len()
            )));
        }

        let key = SigningKey::from_slice(&bytes)
            .map_err(|e| GatewayError::Validation(format!("invalid private key: {}", e)))?;
        let address = address_of(key.verifying_key());
        Ok(Self { key, address })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn sign_transaction(&self, tx: UnsignedTransaction) -> GatewayResult<SignedTransaction> {
        let sighash = signing_hash(&tx);
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(sighash.as_bytes())
            .map_err(|e| GatewayError::Internal(format!("signing failed: {}", e)))?;

        let r_array: [u8; 32] = signature.r().to_bytes().into();
        let s_array: [u8; 32] = signature.s().to_bytes().into();
        let y_parity = recovery_id.to_byte() & 1;

        let raw = encode_envelope(&tx, Some((y_parity, &r_array, &s_array)));
        let hash = H256::from(keccak_hash::keccak(&raw).0);

        Ok(SignedTransaction {
            tx,
            from: self.address,
            raw,
            hash,
        })
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer").field("address", &self.address).finish_non_exhaustive()
    }
}

/// Ethereum address: last 20 bytes of keccak256 over the uncompressed public key.
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak_hash::keccak(&point.as_bytes()[1..]); // Skip the 0x04 tag
    Address::from_slice(&hash.0[12..])
}

/// keccak256 over the unsigned envelope
pub fn signing_hash(tx: &UnsignedTransaction) -> H256 {
    H256::from(keccak_hash::keccak(encode_envelope(tx, None)).0)
}

/// Encode `0x02 || rlp([chain_id, nonce, tip, max_fee, gas, to, value, data, access_list, (y, r, s)])`.
fn encode_envelope(tx: &UnsignedTransaction, signature: Option<(u8, &[u8; 32], &[u8; 32])>) -> Vec<u8> {
    let mut stream = RlpStream::new();
    stream.begin_list(if signature.is_some() { 12 } else { 9 });
    stream.append(&tx.chain_id);
    stream.append(&tx.nonce);
    stream.append(&u256_bytes(tx.max_priority_fee_per_gas));
    stream.append(&u256_bytes(tx.max_fee_per_gas));
    stream.append(&tx.gas_limit);
    stream.append(&tx.to.as_bytes().to_vec());
    stream.append(&u256_bytes(tx.value));
    stream.append(&tx.data);
    stream.begin_list(0); // access list

    if let Some((y_parity, r, s)) = signature {
        stream.append(&y_parity);
        stream.append(&trim_leading_zeros(r));
        stream.append(&trim_leading_zeros(s));
    }

    let encoded = stream.out();
    let mut out = Vec::with_capacity(1 + encoded.len());
    out.push(TX_TYPE_EIP1559);
    out.extend_from_slice(&encoded);
    out
}

/// Big-endian integer bytes without leading zeros, as RLP expects.
fn u256_bytes(value: U256) -> Vec<u8> {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    trim_leading_zeros(&buf)
}

fn trim_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[first..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{hex_address, EventId, FaucetCall};
    use k256::ecdsa::{RecoveryId, Signature};
    use rlp::Rlp;

    const WEB3_DOCS_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn sample_tx() -> UnsignedTransaction {
        UnsignedTransaction {
            chain_id: 11155111,
            nonce: 7,
            to: Address::from_low_u64_be(0xfa),
            value: U256::from(900_000_000u64),
            data: vec![0xde, 0xad, 0xbe, 0xef],
            gas_limit: 2_000_000,
            max_fee_per_gas: U256::from(50_000_000_000u64),
            max_priority_fee_per_gas: U256::from(2_000_000_000u64),
            call: FaucetCall::CreateFaucet {
                event: EventId::new("devcon").unwrap(),
            },
        }
    }

    #[test]
    fn test_address_derivation() {
        let signer = Signer::from_hex(WEB3_DOCS_KEY).unwrap();
        assert_eq!(
            hex_address(&signer.address()),
            "0x2c7536e3605d9c16a7a3d7b1898e529396a65c23"
        );

        let one = Signer::from_hex(&format!("{:064x}", 1)).unwrap();
        assert_eq!(
            hex_address(&one.address()),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn test_invalid_keys() {
        assert!(Signer::from_hex("0x1234").is_err());
        assert!(Signer::from_hex("zz").is_err());
        assert!(Signer::from_hex(&"00".repeat(32)).is_err());
    }

    #[test]
    fn test_debug_hides_key() {
        let signer = Signer::from_hex(WEB3_DOCS_KEY).unwrap();
        let printed = format!("{:?}", signer);
        assert!(!printed.contains("4c0883a6"));
    }

    #[test]
    fn test_signed_envelope_recovers_sender() {
        let signer = Signer::from_hex(WEB3_DOCS_KEY).unwrap();
        let tx = sample_tx();
        let sighash = signing_hash(&tx);
        let signed = signer.sign_transaction(tx.clone()).unwrap();

        assert_eq!(signed.raw[0], TX_TYPE_EIP1559);
        assert_eq!(signed.hash, H256::from(keccak_hash::keccak(&signed.raw).0));
        assert_eq!(signed.from, signer.address());

        let rlp = Rlp::new(&signed.raw[1..]);
        assert_eq!(rlp.item_count().unwrap(), 12);
        assert_eq!(rlp.val_at::<u64>(0).unwrap(), 11155111);
        assert_eq!(rlp.val_at::<u64>(1).unwrap(), 7);
        assert_eq!(rlp.val_at::<Vec<u8>>(7).unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);

        let parity: u8 = rlp.val_at(9).unwrap();
        let r: Vec<u8> = rlp.val_at(10).unwrap();
        let s: Vec<u8> = rlp.val_at(11).unwrap();
        let mut rs = [0u8; 64];
        rs[32 - r.len()..32].copy_from_slice(&r);
        rs[64 - s.len()..].copy_from_slice(&s);

        let signature = Signature::from_slice(&rs).unwrap();
        let recovery_id = RecoveryId::from_byte(parity).unwrap();
        let recovered =
            VerifyingKey::recover_from_prehash(sighash.as_bytes(), &signature, recovery_id).unwrap();
        assert_eq!(address_of(&recovered), signer.address());
    }

    #[test]
    fn test_value_encoding() {
        assert_eq!(u256_bytes(U256::zero()), Vec::<u8>::new());
        assert_eq!(u256_bytes(U256::from(0x0102u64)), vec![0x01, 0x02]);
    }
}
