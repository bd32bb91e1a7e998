//! JSON-RPC chain client for live networks

use super::{assemble, ChainClient};
use crate::contract::ContractInterface;
use crate::error::{GatewayError, GatewayResult};
use crate::types::{
    hex_address, hex_hash, Address, EventId, Receipt, SignedTransaction, TransactionIntent,
    UnsignedTransaction, H256, U256,
};
use crate::units::{parse_quantity, parse_u64_quantity};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

pub struct RpcChainClient {
    rpc_url: String,
    client: reqwest::Client,
    chain_id: u64,
    contract_address: Address,
    contract: ContractInterface,
}

impl RpcChainClient {
    pub fn new(
        rpc_url: String,
        chain_id: u64,
        contract_address: Address,
        contract: ContractInterface,
        timeout: Duration,
    ) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            rpc_url,
            client,
            chain_id,
            contract_address,
            contract,
        })
    }

    async fn call(&self, method: &str, params: Value) -> GatewayResult<Value> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });
        debug!("RPC {} -> {}", method, self.rpc_url);

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| GatewayError::Chain(format!("{} request failed: {}", method, e)))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| GatewayError::Chain(format!("{} returned an invalid response: {}", method, e)))?;

        if let Some(error) = body.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(GatewayError::Chain(message));
        }

        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }

    async fn call_str(&self, method: &str, params: Value) -> GatewayResult<String> {
        match self.call(method, params).await? {
            Value::String(s) => Ok(s),
            other => Err(GatewayError::Chain(format!(
                "{} returned a non-string result: {}",
                method, other
            ))),
        }
    }

    /// `eth_call` against the faucet contract
    async fn read_contract(&self, data: Vec<u8>) -> GatewayResult<Vec<u8>> {
        let result = self
            .call_str(
                "eth_call",
                json!([
                    {
                        "to": hex_address(&self.contract_address),
                        "data": format!("0x{}", hex::encode(data)),
                    },
                    "latest"
                ]),
            )
            .await?;

        hex::decode(result.trim_start_matches("0x"))
            .map_err(|e| GatewayError::Chain(format!("eth_call returned invalid hex: {}", e)))
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn contract_address(&self) -> Address {
        self.contract_address
    }

    async fn connected(&self) -> bool {
        match self.call_str("eth_chainId", json!([])).await {
            Ok(id) => match parse_u64_quantity(&id) {
                Ok(id) if id == self.chain_id => true,
                Ok(id) => {
                    warn!(
                        "{} reports chain id {}, expected {}",
                        self.rpc_url, id, self.chain_id
                    );
                    false
                }
                Err(e) => {
                    warn!("{}: {}", self.rpc_url, e);
                    false
                }
            },
            Err(e) => {
                warn!("{} unreachable: {}", self.rpc_url, e);
                false
            }
        }
    }

    async fn is_available(&self, event: &EventId) -> GatewayResult<bool> {
        let output = self.read_contract(self.contract.encode_is_available(event)?).await?;
        self.contract.decode_is_available(&output)
    }

    async fn funds_available(&self, event: &EventId) -> GatewayResult<U256> {
        let output = self.read_contract(self.contract.encode_funds_available(event)?).await?;
        self.contract.decode_funds_available(&output)
    }

    async fn balance_of(&self, address: Address) -> GatewayResult<U256> {
        let balance = self
            .call_str("eth_getBalance", json!([hex_address(&address), "latest"]))
            .await?;
        parse_quantity(&balance).map_err(GatewayError::Chain)
    }

    async fn transaction_count(&self, address: Address) -> GatewayResult<u64> {
        let count = self
            .call_str("eth_getTransactionCount", json!([hex_address(&address), "pending"]))
            .await?;
        parse_u64_quantity(&count).map_err(GatewayError::Chain)
    }

    fn build_transaction(&self, intent: TransactionIntent) -> GatewayResult<UnsignedTransaction> {
        let data = self.contract.encode_call(&intent.call)?;
        Ok(assemble(self.chain_id, self.contract_address, intent, data))
    }

    async fn broadcast(&self, tx: &SignedTransaction) -> GatewayResult<H256> {
        let hash = self
            .call_str("eth_sendRawTransaction", json!([tx.raw_hex()]))
            .await?;
        parse_hash(&hash)
    }

    async fn receipt(&self, hash: H256) -> GatewayResult<Option<Receipt>> {
        let receipt = self
            .call("eth_getTransactionReceipt", json!([hex_hash(&hash)]))
            .await?;
        if receipt.is_null() {
            return Ok(None);
        }

        Ok(Some(Receipt {
            transaction_hash: parse_hash(receipt_field(&receipt, "transactionHash")?)?,
            block_number: parse_u64_quantity(receipt_field(&receipt, "blockNumber")?)
                .map_err(GatewayError::Chain)?,
            success: parse_u64_quantity(receipt_field(&receipt, "status")?)
                .map_err(GatewayError::Chain)?
                == 1,
        }))
    }
}

fn receipt_field<'a>(receipt: &'a Value, name: &str) -> GatewayResult<&'a str> {
    receipt
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::Chain(format!("receipt is missing {}", name)))
}

fn parse_hash(value: &str) -> GatewayResult<H256> {
    let bytes = hex::decode(value.trim_start_matches("0x"))
        .map_err(|e| GatewayError::Chain(format!("invalid transaction hash {}: {}", value, e)))?;
    if bytes.len() != 32 {
        return Err(GatewayError::Chain(format!("invalid transaction hash {}", value)));
    }
    Ok(H256::from_slice(&bytes))
}
