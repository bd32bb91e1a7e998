//! Transaction intent builder
//!
//! Seed and top-up send a fraction of the signer's whole balance. The
//! fraction is taken before fees; the result is then capped at
//! `balance - fee_reserve` so the transaction can always pay for itself.

use crate::error::{GatewayError, GatewayResult};
use crate::network::Network;
use crate::signer::Signer;
use crate::types::{Address, EventId, FaucetCall, TransactionIntent, U256};
use tracing::debug;

pub const BPS_DENOMINATOR: u32 = 10_000;

const INSUFFICIENT_FUNDS: &str = "insufficient funds for gas * price + value";

#[derive(Debug, Clone, Copy)]
pub struct IntentBuilder {
    fraction_bps: u32,
}

impl IntentBuilder {
    pub fn new(fraction_bps: u32) -> Self {
        Self { fraction_bps }
    }

    /// Intent for create/top-up, signed by the caller's key.
    ///
    /// `amount` overrides the fraction rule but is still held to the fee bound.
    pub async fn seed(
        &self,
        network: &Network,
        signer: &Signer,
        call: FaucetCall,
        amount: Option<U256>,
    ) -> GatewayResult<TransactionIntent> {
        let client = network.client();
        let from = signer.address();
        let fees = network.fees();

        let (balance, nonce) = tokio::try_join!(client.balance_of(from), client.transaction_count(from))?;

        let value = match amount {
            Some(amount) => requested_value(amount, balance, fees.reserve())?,
            None => seed_value(balance, self.fraction_bps, fees.reserve())?,
        };

        debug!(
            "Seed intent on {}: balance {} value {} nonce {}",
            network.name(),
            balance,
            value,
            nonce
        );

        Ok(TransactionIntent {
            call,
            from,
            value,
            fees,
            nonce,
        })
    }

    /// Intent for a drip: no value, signed by the administrative key.
    pub async fn drip(
        &self,
        network: &Network,
        admin: &Signer,
        event: EventId,
        recipient: Address,
    ) -> GatewayResult<TransactionIntent> {
        let from = admin.address();
        let nonce = network.client().transaction_count(from).await?;

        Ok(TransactionIntent {
            call: FaucetCall::Drip { event, recipient },
            from,
            value: U256::zero(),
            fees: network.fees(),
            nonce,
        })
    }
}

/// `balance * fraction_bps / 10000`, capped at `balance - fee_reserve`.
pub fn seed_value(balance: U256, fraction_bps: u32, fee_reserve: U256) -> GatewayResult<U256> {
    let spendable = spendable(balance, fee_reserve)?;

    let bps = U256::from(fraction_bps);
    let denominator = U256::from(BPS_DENOMINATOR);
    // Split the product so full-width balances cannot overflow
    let fraction = balance / denominator * bps + balance % denominator * bps / denominator;

    let value = fraction.min(spendable);
    if value.is_zero() {
        return Err(GatewayError::Chain(INSUFFICIENT_FUNDS.to_string()));
    }
    Ok(value)
}

/// Explicit amount: never clamped, rejected when it exceeds `balance - fee_reserve`.
pub fn requested_value(amount: U256, balance: U256, fee_reserve: U256) -> GatewayResult<U256> {
    if amount.is_zero() {
        return Err(GatewayError::Validation("amount must be greater than zero".to_string()));
    }
    if amount > spendable(balance, fee_reserve)? {
        return Err(GatewayError::Chain(INSUFFICIENT_FUNDS.to_string()));
    }
    Ok(amount)
}

fn spendable(balance: U256, fee_reserve: U256) -> GatewayResult<U256> {
    balance
        .checked_sub(fee_reserve)
        .filter(|spendable| !spendable.is_zero())
        .ok_or_else(|| GatewayError::Chain(INSUFFICIENT_FUNDS.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainClient, SimulatedChain};
    use crate::config::FeeConfig;
    use crate::types::FeeParams;
    use std::sync::Arc;

    #[test]
    fn test_fraction_of_balance() {
        let value = seed_value(U256::from(1_000_000_000u64), 9_000, U256::zero()).unwrap();
        assert_eq!(value, U256::from(900_000_000u64));

        let value = seed_value(U256::from(1_000_000_000u64), 9_500, U256::zero()).unwrap();
        assert_eq!(value, U256::from(950_000_000u64));
    }

    #[test]
    fn test_fraction_within_fee_bound() {
        let value = seed_value(U256::from(1_000_000_000u64), 9_000, U256::from(50_000_000u64)).unwrap();
        assert_eq!(value, U256::from(900_000_000u64));
    }

    #[test]
    fn test_value_is_capped_by_fee_reserve() {
        let balance = U256::from(1_000_000_000u64);
        let reserve = U256::from(200_000_000u64);
        let value = seed_value(balance, 9_000, reserve).unwrap();
        assert_eq!(value, U256::from(800_000_000u64));
        assert!(value <= balance - reserve);
    }

    #[test]
    fn test_fee_reserve_exceeds_balance() {
        let err = seed_value(U256::from(100u64), 9_000, U256::from(100u64)).unwrap_err();
        assert!(matches!(err, GatewayError::Chain(_)));
        assert!(seed_value(U256::zero(), 9_000, U256::zero()).is_err());
    }

    #[test]
    fn test_full_width_balance() {
        let value = seed_value(U256::MAX, 10_000, U256::one()).unwrap();
        assert_eq!(value, U256::MAX - U256::one());
    }

    #[test]
    fn test_requested_value() {
        let balance = U256::from(1_000u64);
        let reserve = U256::from(100u64);
        assert_eq!(requested_value(U256::from(900u64), balance, reserve).unwrap(), U256::from(900u64));
        assert!(matches!(
            requested_value(U256::from(901u64), balance, reserve),
            Err(GatewayError::Chain(_))
        ));
        assert!(matches!(
            requested_value(U256::zero(), balance, reserve),
            Err(GatewayError::Validation(_))
        ));
    }

    fn network(chain: Arc<SimulatedChain>, fees: FeeParams) -> Network {
        Network::new("sepolia", fees, chain)
    }

    #[tokio::test]
    async fn test_seed_intent_uses_chain_state() {
        let chain = Arc::new(SimulatedChain::new(
            11155111,
            Address::from_low_u64_be(0xfa),
            U256::from(1_000_000_000u64),
            U256::zero(),
        ));
        let fees = FeeParams {
            gas_limit: 21_000,
            max_fee_per_gas: U256::zero(),
            max_priority_fee_per_gas: U256::zero(),
        };
        let network = network(chain.clone(), fees);
        let signer = Signer::from_hex(&format!("{:064x}", 7)).unwrap();
        let event = EventId::new("devcon").unwrap();

        let intent = IntentBuilder::new(9_000)
            .seed(&network, &signer, FaucetCall::CreateFaucet { event: event.clone() }, None)
            .await
            .unwrap();
        assert_eq!(intent.value, U256::from(900_000_000u64));
        assert_eq!(intent.nonce, 0);
        assert_eq!(intent.from, signer.address());

        let signed = chain
            .sign(chain.build_transaction(intent).unwrap(), &signer)
            .unwrap();
        chain.broadcast(&signed).await.unwrap();

        let intent = IntentBuilder::new(9_000)
            .seed(&network, &signer, FaucetCall::TopUp { event }, None)
            .await
            .unwrap();
        assert_eq!(intent.nonce, 1);
        assert_eq!(intent.value, U256::from(90_000_000u64));
    }

    #[tokio::test]
    async fn test_drip_intent_has_no_value() {
        let chain = Arc::new(SimulatedChain::new(
            17000,
            Address::from_low_u64_be(0xfa),
            U256::zero(),
            U256::zero(),
        ));
        let network = network(chain, FeeConfig::default().params());
        let admin = Signer::from_hex(&format!("{:064x}", 9)).unwrap();
        let recipient = Address::from_low_u64_be(0xbeef);

        let intent = IntentBuilder::new(9_000)
            .drip(&network, &admin, EventId::new("devcon").unwrap(), recipient)
            .await
            .unwrap();
        assert!(intent.value.is_zero());
        assert_eq!(intent.from, admin.address());
        assert!(matches!(intent.call, FaucetCall::Drip { recipient: r, .. } if r == recipient));
    }
}
