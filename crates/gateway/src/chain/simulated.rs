//! In-memory chain for development and tests
//!
//! Models just enough of a node and the faucet contract: balances,
//! nonces, per-event faucet funds and receipts. Unseen accounts start with
//! a configurable balance. Every transaction is charged its full fee
//! reserve (`gas_limit * max_fee_per_gas`).

use super::{assemble, ChainClient};
use crate::contract::ContractInterface;
use crate::error::{GatewayError, GatewayResult};
use crate::types::{
    Address, EventId, FaucetCall, Receipt, SignedTransaction, TransactionIntent, UnsignedTransaction,
    H256, U256,
};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Transaction accepted by the simulated chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedTransaction {
    pub hash: H256,
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub call: FaucetCall,
    pub block_number: u64,
}

#[derive(Debug, Default)]
struct ChainState {
    balances: HashMap<Address, U256>,
    nonces: HashMap<Address, u64>,
    /// Funds held by the faucet contract per event
    faucets: HashMap<String, U256>,
    receipts: HashMap<H256, Receipt>,
    transactions: Vec<SimulatedTransaction>,
    block_number: u64,
}

pub struct SimulatedChain {
    chain_id: u64,
    contract_address: Address,
    default_balance: U256,
    drip_amount: U256,
    contract: Option<ContractInterface>,
    state: RwLock<ChainState>,
}

impl SimulatedChain {
    pub fn new(chain_id: u64, contract_address: Address, default_balance: U256, drip_amount: U256) -> Self {
        Self {
            chain_id,
            contract_address,
            default_balance,
            drip_amount,
            contract: None,
            state: RwLock::new(ChainState::default()),
        }
    }

    /// Encode calldata with a real ABI instead of leaving it empty.
    pub fn with_contract(mut self, contract: ContractInterface) -> Self {
        self.contract = Some(contract);
        self
    }

    pub async fn set_balance(&self, address: Address, balance: U256) {
        self.state.write().await.balances.insert(address, balance);
    }

    /// Every accepted transaction in order
    pub async fn transactions(&self) -> Vec<SimulatedTransaction> {
        self.state.read().await.transactions.clone()
    }

    fn balance_in(&self, state: &ChainState, address: &Address) -> U256 {
        state
            .balances
            .get(address)
            .copied()
            .unwrap_or(self.default_balance)
    }

    /// Apply the faucet call to contract state, or describe the revert.
    fn execute(&self, state: &mut ChainState, tx: &UnsignedTransaction) -> Result<(), String> {
        match &tx.call {
            FaucetCall::CreateFaucet { event } => {
                if state.faucets.contains_key(event.as_str()) {
                    return Err("faucet already exists".to_string());
                }
                if tx.value.is_zero() {
                    return Err("no value sent".to_string());
                }
                state.faucets.insert(event.as_str().to_string(), tx.value);
            }
            FaucetCall::TopUp { event } => {
                let funds = state
                    .faucets
                    .get_mut(event.as_str())
                    .ok_or_else(|| "faucet does not exist".to_string())?;
                *funds = funds.saturating_add(tx.value);
            }
            FaucetCall::Drip { event, recipient } => {
                if !tx.value.is_zero() {
                    return Err("drip is not payable".to_string());
                }
                let funds = state
                    .faucets
                    .get_mut(event.as_str())
                    .ok_or_else(|| "faucet does not exist".to_string())?;
                if funds.is_zero() {
                    return Err("faucet is empty".to_string());
                }
                let payout = self.drip_amount.min(*funds);
                *funds -= payout;

                let balance = self.balance_in(state, recipient);
                state.balances.insert(*recipient, balance.saturating_add(payout));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ChainClient for SimulatedChain {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn contract_address(&self) -> Address {
        self.contract_address
    }

    async fn connected(&self) -> bool {
        true
    }

    async fn is_available(&self, event: &EventId) -> GatewayResult<bool> {
        Ok(!self.state.read().await.faucets.contains_key(event.as_str()))
    }

    async fn funds_available(&self, event: &EventId) -> GatewayResult<U256> {
        Ok(self
            .state
            .read()
            .await
            .faucets
            .get(event.as_str())
            .copied()
            .unwrap_or_default())
    }

    async fn balance_of(&self, address: Address) -> GatewayResult<U256> {
        let state = self.state.read().await;
        Ok(self.balance_in(&state, &address))
    }

    async fn transaction_count(&self, address: Address) -> GatewayResult<u64> {
        Ok(self
            .state
            .read()
            .await
            .nonces
            .get(&address)
            .copied()
            .unwrap_or(0))
    }

    fn build_transaction(&self, intent: TransactionIntent) -> GatewayResult<UnsignedTransaction> {
        let data = match &self.contract {
            Some(contract) => contract.encode_call(&intent.call)?,
            None => Vec::new(),
        };
        Ok(assemble(self.chain_id, self.contract_address, intent, data))
    }

    async fn broadcast(&self, signed: &SignedTransaction) -> GatewayResult<H256> {
        let tx = &signed.tx;
        if tx.chain_id != self.chain_id {
            return Err(GatewayError::Chain(format!(
                "invalid chain id {}, expected {}",
                tx.chain_id, self.chain_id
            )));
        }
        if tx.to != self.contract_address {
            return Err(GatewayError::Chain(format!(
                "execution reverted: no faucet contract at {:?}",
                tx.to
            )));
        }

        let mut state = self.state.write().await;

        let expected_nonce = state.nonces.get(&signed.from).copied().unwrap_or(0);
        if tx.nonce < expected_nonce {
            return Err(GatewayError::Chain(format!(
                "nonce too low: next nonce {}, tx nonce {}",
                expected_nonce, tx.nonce
            )));
        }
        if tx.nonce > expected_nonce {
            return Err(GatewayError::Chain(format!(
                "nonce too high: next nonce {}, tx nonce {}",
                expected_nonce, tx.nonce
            )));
        }

        let fee = U256::from(tx.gas_limit).saturating_mul(tx.max_fee_per_gas);
        let cost = tx.value.saturating_add(fee);
        let balance = self.balance_in(&state, &signed.from);
        if balance < cost {
            return Err(GatewayError::Chain(format!(
                "insufficient funds for gas * price + value: balance {}, tx cost {}",
                balance, cost
            )));
        }

        self.execute(&mut state, tx)
            .map_err(|reason| GatewayError::Chain(format!("execution reverted: {}", reason)))?;

        state.balances.insert(signed.from, balance - cost);
        state.nonces.insert(signed.from, expected_nonce + 1);
        state.block_number += 1;

        let block_number = state.block_number;
        state.receipts.insert(
            signed.hash,
            Receipt {
                transaction_hash: signed.hash,
                block_number,
                success: true,
            },
        );
        state.transactions.push(SimulatedTransaction {
            hash: signed.hash,
            from: signed.from,
            to: tx.to,
            value: tx.value,
            call: tx.call.clone(),
            block_number,
        });

        debug!("Simulated block {} on chain {}", block_number, self.chain_id);
        info!("Simulated transaction {:?} from {:?}", signed.hash, signed.from);
        Ok(signed.hash)
    }

    async fn receipt(&self, hash: H256) -> GatewayResult<Option<Receipt>> {
        Ok(self.state.read().await.receipts.get(&hash).cloned())
    }
}
