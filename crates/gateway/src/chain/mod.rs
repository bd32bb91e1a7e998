//! Chain client abstraction
//!
//! A [`ChainClient`] is bound to exactly one network: its chain id and
//! faucet contract never change after construction. Two implementations
//! exist, selected once at startup: [`RpcChainClient`] talks JSON-RPC to a
//! live node, [`SimulatedChain`] keeps an in-memory chain.

pub mod rpc;
pub mod simulated;

pub use rpc::RpcChainClient;
pub use simulated::SimulatedChain;

use crate::error::{GatewayError, GatewayResult};
use crate::signer::Signer;
use crate::types::{
    Address, EventId, Receipt, SignedTransaction, TransactionIntent, UnsignedTransaction, H256, U256,
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait ChainClient: Send + Sync {
    fn chain_id(&self) -> u64;

    /// Faucet contract deployed on this client's network
    fn contract_address(&self) -> Address;

    async fn connected(&self) -> bool;

    /// Whether the event identifier is still unused
    async fn is_available(&self, event: &EventId) -> GatewayResult<bool>;

    /// Funds held for the event, in wei
    async fn funds_available(&self, event: &EventId) -> GatewayResult<U256>;

    async fn balance_of(&self, address: Address) -> GatewayResult<U256>;

    /// Next nonce for the account, pending transactions included
    async fn transaction_count(&self, address: Address) -> GatewayResult<u64>;

    fn build_transaction(&self, intent: TransactionIntent) -> GatewayResult<UnsignedTransaction>;

    fn sign(&self, tx: UnsignedTransaction, signer: &Signer) -> GatewayResult<SignedTransaction> {
        signer.sign_transaction(tx)
    }

    async fn broadcast(&self, tx: &SignedTransaction) -> GatewayResult<H256>;

    /// Receipt for a mined transaction, `None` while pending
    async fn receipt(&self, hash: H256) -> GatewayResult<Option<Receipt>>;
}

/// Turn an intent into an unsigned transaction addressed to `contract`.
pub(crate) fn assemble(
    chain_id: u64,
    contract: Address,
    intent: TransactionIntent,
    data: Vec<u8>,
) -> UnsignedTransaction {
    UnsignedTransaction {
        chain_id,
        nonce: intent.nonce,
        to: contract,
        value: intent.value,
        data,
        gas_limit: intent.fees.gas_limit,
        max_fee_per_gas: intent.fees.max_fee_per_gas,
        max_priority_fee_per_gas: intent.fees.max_priority_fee_per_gas,
        call: intent.call,
    }
}

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Poll for a receipt until it appears or `timeout` elapses.
pub async fn wait_for_receipt(
    client: &dyn ChainClient,
    hash: H256,
    timeout: Duration,
    poll_interval: Duration,
) -> GatewayResult<Receipt> {
    let poll = async {
        let mut interval = tokio::time::interval(poll_interval.max(MIN_POLL_INTERVAL));
        loop {
            interval.tick().await;
            if let Some(receipt) = client.receipt(hash).await? {
                return Ok(receipt);
            }
            debug!("Receipt for {:?} not available yet", hash);
        }
    };

    match tokio::time::timeout(timeout, poll).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Chain(format!(
            "timed out after {}s waiting for receipt",
            timeout.as_secs()
        ))),
    }
}
