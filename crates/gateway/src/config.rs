//! Gateway configuration

use crate::error::GatewayError;
use crate::logging::LoggingConfig;
use crate::types::{parse_address, FeeParams, U256};
use crate::units::WEI_PER_GWEI;
use anyhow::{Context, Result};
use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix for environment overrides, e.g. `GATEWAY__SERVER_ADDR`
pub const ENV_PREFIX: &str = "GATEWAY";

/// Which chain client backs every configured network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ChainMode {
    /// In-memory chain, nothing leaves the process
    Simulated,
    /// JSON-RPC against each network's endpoint
    Live,
}

/// Gateway service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Server address
    pub server_addr: String,

    pub mode: ChainMode,

    /// Key that signs drip transactions
    pub admin_private_key: Option<String>,

    /// Share of the signer's balance sent by seed and top-up, in basis points
    pub seed_fraction_bps: u32,

    /// Which operations block until their receipt is available
    pub receipts: ReceiptPolicy,

    pub receipt_timeout_secs: u64,

    pub receipt_poll_interval_ms: u64,

    /// Timeout for a single JSON-RPC request
    pub rpc_timeout_secs: u64,

    /// Relay unrecognized chain errors verbatim instead of a generic message
    pub relay_raw_chain_errors: bool,

    /// Enable CORS
    pub cors_enabled: bool,

    pub logging: LoggingConfig,

    pub simulated: SimulatedConfig,

    /// Supported networks keyed by canonical name
    pub networks: BTreeMap<String, NetworkConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server_addr: "0.0.0.0:5000".to_string(),
            mode: ChainMode::Simulated,
            admin_private_key: None,
            seed_fraction_bps: 9_000,
            receipts: ReceiptPolicy::default(),
            receipt_timeout_secs: 120,
            receipt_poll_interval_ms: 1_000,
            rpc_timeout_secs: 30,
            relay_raw_chain_errors: false,
            cors_enabled: true,
            logging: LoggingConfig::default(),
            simulated: SimulatedConfig::default(),
            networks: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiptPolicy {
    pub create: bool,
    pub top_up: bool,
    pub drip: bool,
}

impl Default for ReceiptPolicy {
    fn default() -> Self {
        Self {
            create: true,
            top_up: false,
            drip: false,
        }
    }
}

/// Settings for the in-memory chain
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedConfig {
    /// Balance every unseen account starts with (ether)
    pub default_balance_ether: String,
    /// Amount paid out by one drip (ether)
    pub drip_amount_ether: String,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            default_balance_ether: "100".to_string(),
            drip_amount_ether: "0.1".to_string(),
        }
    }
}

/// One supported network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub rpc_url: String,

    pub chain_id: u64,

    /// Deployed faucet contract
    pub contract_address: String,

    /// ABI file (bare ABI array or an artifact with an `abi` key)
    #[serde(default)]
    pub contract_abi: Option<PathBuf>,

    #[serde(default)]
    pub fees: FeeConfig,

    #[serde(default)]
    pub methods: ContractMethods,
}

/// Fee parameters in wei
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeConfig {
    pub gas_limit: u64,
    pub max_fee_per_gas: u64,
    pub max_priority_fee_per_gas: u64,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            gas_limit: 2_000_000,
            max_fee_per_gas: 50 * WEI_PER_GWEI,
            max_priority_fee_per_gas: 2 * WEI_PER_GWEI,
        }
    }
}

impl FeeConfig {
    pub fn params(&self) -> FeeParams {
        FeeParams {
            gas_limit: self.gas_limit,
            max_fee_per_gas: U256::from(self.max_fee_per_gas),
            max_priority_fee_per_gas: U256::from(self.max_priority_fee_per_gas),
        }
    }
}

/// Contract function names
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractMethods {
    pub is_available: String,
    pub funds_available: String,
    pub create_faucet: String,
    pub top_up: String,
    pub drip: String,
}

impl Default for ContractMethods {
    fn default() -> Self {
        Self {
            is_available: "isAvailable".to_string(),
            funds_available: "fundsAvailable".to_string(),
            create_faucet: "createFaucet".to_string(),
            top_up: "topUpFaucet".to_string(),
            drip: "drip".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Load from an optional file, then `GATEWAY__*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            let path_str = path.to_str().context("Invalid config path")?;
            builder = builder.add_source(File::with_name(path_str));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        settings
            .try_deserialize::<Self>()
            .context("Failed to deserialize configuration")
    }

    /// Reject configurations the gateway cannot serve.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.networks.is_empty() {
            return Err(GatewayError::Config("no networks configured".to_string()));
        }

        if self.seed_fraction_bps == 0 || self.seed_fraction_bps > 10_000 {
            return Err(GatewayError::Config(format!(
                "seed_fraction_bps must be within 1..=10000, got {}",
                self.seed_fraction_bps
            )));
        }

        if self.receipt_timeout_secs == 0 {
            return Err(GatewayError::Config("receipt_timeout_secs must be positive".to_string()));
        }
        if self.receipt_poll_interval_ms == 0 {
            return Err(GatewayError::Config(
                "receipt_poll_interval_ms must be positive".to_string(),
            ));
        }

        for (name, network) in &self.networks {
            if !is_canonical_name(name) {
                return Err(GatewayError::Config(format!(
                    "network name '{}' must be lowercase [a-z0-9-]",
                    name
                )));
            }
            if parse_address(&network.contract_address).is_none() {
                return Err(GatewayError::Config(format!(
                    "network '{}' has an invalid contract address",
                    name
                )));
            }
            if self.mode == ChainMode::Live && network.contract_abi.is_none() {
                return Err(GatewayError::Config(format!(
                    "network '{}' needs contract_abi in live mode",
                    name
                )));
            }
        }

        Ok(())
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }
}

pub fn is_canonical_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}
