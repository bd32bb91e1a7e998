//! Gateway service: every faucet operation end to end

use crate::builder::IntentBuilder;
use crate::chain::wait_for_receipt;
use crate::config::{GatewayConfig, ReceiptPolicy};
use crate::error::{GatewayError, GatewayResult};
use crate::metrics::GatewayMetrics;
use crate::network::{Network, NetworkTable};
use crate::signer::Signer;
use crate::types::{
    hex_hash, Address, EventId, FaucetCall, TransactionIntent, TransactionResult, U256,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Funding status of one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaucetStatus {
    pub event_exists: bool,
    /// Funds held for the event, in wei
    pub funds: U256,
}

#[derive(Debug, Clone)]
pub struct NetworkSummary {
    pub name: String,
    pub chain_id: u64,
    pub contract_address: Address,
    pub connected: bool,
}

pub struct GatewayService {
    networks: NetworkTable,
    admin: Option<Signer>,
    builder: IntentBuilder,
    receipts: ReceiptPolicy,
    receipt_timeout: Duration,
    receipt_poll_interval: Duration,
    relay_raw_chain_errors: bool,
    metrics: Arc<GatewayMetrics>,
}

impl GatewayService {
    pub fn new(
        config: &GatewayConfig,
        networks: NetworkTable,
        metrics: Arc<GatewayMetrics>,
    ) -> GatewayResult<Self> {
        let admin = config
            .admin_private_key
            .as_deref()
            .map(Signer::from_hex)
            .transpose()
            .map_err(|e| GatewayError::Config(format!("admin_private_key: {}", e)))?;

        match &admin {
            Some(admin) => info!("Drips are signed by {:?}", admin.address()),
            None => warn!("No admin_private_key configured, drips are disabled"),
        }

        Ok(Self {
            networks,
            admin,
            builder: IntentBuilder::new(config.seed_fraction_bps),
            receipts: config.receipts,
            receipt_timeout: config.receipt_timeout(),
            receipt_poll_interval: config.receipt_poll_interval(),
            relay_raw_chain_errors: config.relay_raw_chain_errors,
            metrics,
        })
    }

    pub fn metrics(&self) -> &GatewayMetrics {
        &self.metrics
    }

    /// Whether the event identifier is unused on the selected network
    #[instrument(skip_all, fields(network = %network, event = %event))]
    pub async fn availability(&self, network: &str, event: &EventId) -> GatewayResult<bool> {
        let result: GatewayResult<bool> = async {
            let network = self.networks.resolve(network)?;
            network.client().is_available(event).await
        }
        .await;
        self.shaped(result)
    }

    /// An available (unused) event has no faucet, so its funds are zero.
    #[instrument(skip_all, fields(network = %network, event = %event))]
    pub async fn status(&self, network: &str, event: &EventId) -> GatewayResult<FaucetStatus> {
        let result: GatewayResult<FaucetStatus> = async {
            let network = self.networks.resolve(network)?;
            let client = network.client();

            if client.is_available(event).await? {
                return Ok(FaucetStatus {
                    event_exists: false,
                    funds: U256::zero(),
                });
            }

            Ok(FaucetStatus {
                event_exists: true,
                funds: client.funds_available(event).await?,
            })
        }
        .await;
        self.shaped(result)
    }

    /// Balance of the seeding account
    #[instrument(skip_all, fields(network = %network, seeder = ?seeder.address()))]
    pub async fn seeder_balance(&self, network: &str, seeder: &Signer) -> GatewayResult<U256> {
        let result: GatewayResult<U256> = async {
            let network = self.networks.resolve(network)?;
            network.client().balance_of(seeder.address()).await
        }
        .await;
        self.shaped(result)
    }

    #[instrument(skip_all, fields(network = %network, event = %event, seeder = ?seeder.address()))]
    pub async fn create_faucet(
        &self,
        network: &str,
        seeder: &Signer,
        event: EventId,
        amount: Option<U256>,
    ) -> GatewayResult<TransactionResult> {
        let result: GatewayResult<TransactionResult> = async {
            let network = self.networks.resolve(network)?;
            let intent = self
                .builder
                .seed(&network, seeder, FaucetCall::CreateFaucet { event }, amount)
                .await?;
            self.submit(&network, seeder, intent, self.receipts.create).await
        }
        .await;
        self.shaped(result)
    }

    #[instrument(skip_all, fields(network = %network, event = %event, seeder = ?seeder.address()))]
    pub async fn top_up(
        &self,
        network: &str,
        seeder: &Signer,
        event: EventId,
        amount: Option<U256>,
    ) -> GatewayResult<TransactionResult> {
        let result: GatewayResult<TransactionResult> = async {
            let network = self.networks.resolve(network)?;
            let intent = self
                .builder
                .seed(&network, seeder, FaucetCall::TopUp { event }, amount)
                .await?;
            self.submit(&network, seeder, intent, self.receipts.top_up).await
        }
        .await;
        self.shaped(result)
    }

    /// Pay out to `recipient`. Always signed by the administrative key.
    #[instrument(skip_all, fields(network = %network, event = %event, recipient = ?recipient))]
    pub async fn drip(
        &self,
        network: &str,
        event: EventId,
        recipient: Address,
    ) -> GatewayResult<TransactionResult> {
        let result: GatewayResult<TransactionResult> = async {
            let network = self.networks.resolve(network)?;
            let admin = self.admin.as_ref().ok_or_else(|| {
                GatewayError::Config("admin_private_key is not configured".to_string())
            })?;
            let intent = self.builder.drip(&network, admin, event, recipient).await?;
            self.submit(&network, admin, intent, self.receipts.drip).await
        }
        .await;
        self.shaped(result)
    }

    pub async fn network_summaries(&self) -> Vec<NetworkSummary> {
        let mut summaries = Vec::new();
        for network in self.networks.iter() {
            summaries.push(NetworkSummary {
                name: network.name().to_string(),
                chain_id: network.chain_id(),
                contract_address: network.contract_address(),
                connected: network.client().connected().await,
            });
        }
        summaries
    }

    /// Build, sign and broadcast; optionally block until the receipt.
    async fn submit(
        &self,
        network: &Network,
        signer: &Signer,
        intent: TransactionIntent,
        wait: bool,
    ) -> GatewayResult<TransactionResult> {
        let operation = intent.call.operation();
        let client = network.client();

        let tx = client.build_transaction(intent)?;
        let signed = client.sign(tx, signer)?;
        let tx_hash = client.broadcast(&signed).await?;

        self.metrics.record_transaction(network.name(), operation.as_str());
        info!(
            "{} transaction {} sent on {} (nonce {}, value {})",
            operation.as_str(),
            hex_hash(&tx_hash),
            network.name(),
            signed.tx.nonce,
            signed.tx.value
        );

        if !wait {
            return Ok(TransactionResult {
                tx_hash,
                receipt: None,
            });
        }

        let receipt =
            wait_for_receipt(client, tx_hash, self.receipt_timeout, self.receipt_poll_interval).await?;
        if !receipt.success {
            return Err(GatewayError::Chain(format!(
                "execution reverted: transaction {} failed in block {}",
                hex_hash(&tx_hash),
                receipt.block_number
            )));
        }

        Ok(TransactionResult {
            tx_hash,
            receipt: Some(receipt),
        })
    }

    fn shaped<T>(&self, result: GatewayResult<T>) -> GatewayResult<T> {
        result.map_err(|err| {
            if let GatewayError::Chain(raw) = &err {
                warn!("Chain error: {}", raw);
            }
            err.sanitized(self.relay_raw_chain_errors)
        })
    }
}
