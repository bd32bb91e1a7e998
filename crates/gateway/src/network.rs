//! Immutable table of supported networks

use crate::chain::{ChainClient, RpcChainClient, SimulatedChain};
use crate::config::{ChainMode, GatewayConfig};
use crate::contract::ContractInterface;
use crate::error::{GatewayError, GatewayResult};
use crate::types::{parse_address, Address, FeeParams};
use crate::units::parse_ether;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// One supported network. The chain id and contract address come from the
/// client itself, so a network can never pair one chain's endpoint with
/// another chain's contract.
pub struct Network {
    name: String,
    fees: FeeParams,
    client: Arc<dyn ChainClient>,
}

impl Network {
    pub fn new(name: impl Into<String>, fees: FeeParams, client: Arc<dyn ChainClient>) -> Self {
        Self {
            name: name.into(),
            fees,
            client,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn chain_id(&self) -> u64 {
        self.client.chain_id()
    }

    pub fn contract_address(&self) -> Address {
        self.client.contract_address()
    }

    pub fn fees(&self) -> FeeParams {
        self.fees
    }

    pub fn client(&self) -> &dyn ChainClient {
        self.client.as_ref()
    }
}

impl fmt::Debug for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Network")
            .field("name", &self.name)
            .field("chain_id", &self.chain_id())
            .field("contract_address", &self.contract_address())
            .field("fees", &self.fees)
            .finish()
    }
}

/// Mapping from canonical network name to network, built once at startup
#[derive(Debug, Clone)]
pub struct NetworkTable {
    networks: BTreeMap<String, Arc<Network>>,
}

impl NetworkTable {
    pub fn new(networks: Vec<Network>) -> GatewayResult<Self> {
        let mut table = BTreeMap::new();
        for network in networks {
            let key = normalize(network.name());
            if key != network.name() {
                return Err(GatewayError::Config(format!(
                    "network name '{}' is not canonical",
                    network.name()
                )));
            }
            if table.insert(key, Arc::new(network)).is_some() {
                return Err(GatewayError::Config("duplicate network name".to_string()));
            }
        }

        if table.is_empty() {
            return Err(GatewayError::Config("no networks configured".to_string()));
        }
        Ok(Self { networks: table })
    }

    /// Build every configured network with the client selected by `mode`.
    pub fn from_config(config: &GatewayConfig) -> GatewayResult<Self> {
        let default_balance = parse_ether(&config.simulated.default_balance_ether)
            .map_err(|e| GatewayError::Config(format!("simulated.default_balance_ether: {}", e)))?;
        let drip_amount = parse_ether(&config.simulated.drip_amount_ether)
            .map_err(|e| GatewayError::Config(format!("simulated.drip_amount_ether: {}", e)))?;

        let mut networks = Vec::with_capacity(config.networks.len());
        for (name, network) in &config.networks {
            let contract_address = parse_address(&network.contract_address).ok_or_else(|| {
                GatewayError::Config(format!("network '{}' has an invalid contract address", name))
            })?;
            let contract = network
                .contract_abi
                .as_deref()
                .map(|path| ContractInterface::load(path, network.methods.clone()))
                .transpose()?;

            let client: Arc<dyn ChainClient> = match (config.mode, contract) {
                (ChainMode::Live, Some(contract)) => Arc::new(RpcChainClient::new(
                    network.rpc_url.clone(),
                    network.chain_id,
                    contract_address,
                    contract,
                    config.rpc_timeout(),
                )?),
                (ChainMode::Live, None) => {
                    return Err(GatewayError::Config(format!(
                        "network '{}' needs contract_abi in live mode",
                        name
                    )))
                }
                (ChainMode::Simulated, contract) => {
                    let chain = SimulatedChain::new(
                        network.chain_id,
                        contract_address,
                        default_balance,
                        drip_amount,
                    );
                    Arc::new(match contract {
                        Some(contract) => chain.with_contract(contract),
                        None => chain,
                    })
                }
            };

            info!(
                "Network {} (chain {}) -> contract {:?} [{:?}]",
                name, network.chain_id, contract_address, config.mode
            );
            networks.push(Network::new(name.clone(), network.fees.params(), client));
        }

        Self::new(networks)
    }

    /// Resolve a request's network selector. Selectors are trimmed and
    /// lowercased, then matched exactly; there is no default network.
    pub fn resolve(&self, selector: &str) -> GatewayResult<Arc<Network>> {
        self.networks
            .get(&normalize(selector))
            .cloned()
            .ok_or_else(|| GatewayError::UnknownNetwork(selector.trim().to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Network>> {
        self.networks.values()
    }

}

pub fn normalize(selector: &str) -> String {
    selector.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FeeConfig, NetworkConfig};
    use crate::types::U256;

    fn simulated(chain_id: u64, contract: u64) -> Arc<dyn ChainClient> {
        Arc::new(SimulatedChain::new(
            chain_id,
            Address::from_low_u64_be(contract),
            U256::zero(),
            U256::zero(),
        ))
    }

    fn table() -> NetworkTable {
        NetworkTable::new(vec![
            Network::new("sepolia", FeeConfig::default().params(), simulated(11155111, 1)),
            Network::new("holesky", FeeConfig::default().params(), simulated(17000, 2)),
        ])
        .unwrap()
    }

    #[test]
    fn test_resolve_normalizes_selector() {
        let table = table();
        assert_eq!(table.resolve("sepolia").unwrap().chain_id(), 11155111);
        assert_eq!(table.resolve(" Sepolia ").unwrap().chain_id(), 11155111);
        assert_eq!(
            table.resolve("HOLESKY").unwrap().contract_address(),
            Address::from_low_u64_be(2)
        );
        let names: Vec<_> = table.iter().map(|n| n.name()).collect();
        assert_eq!(names, vec!["holesky", "sepolia"]);
    }

    #[test]
    fn test_unknown_network_has_no_fallback() {
        let err = table().resolve("mainnet").unwrap_err();
        assert_eq!(err, GatewayError::UnknownNetwork("mainnet".to_string()));
        assert!(table().resolve("").is_err());
    }

    #[test]
    fn test_rejects_bad_tables() {
        assert!(NetworkTable::new(vec![]).is_err());
        assert!(NetworkTable::new(vec![Network::new(
            "Sepolia",
            FeeConfig::default().params(),
            simulated(1, 1)
        )])
        .is_err());
        assert!(NetworkTable::new(vec![
            Network::new("a", FeeConfig::default().params(), simulated(1, 1)),
            Network::new("a", FeeConfig::default().params(), simulated(2, 2)),
        ])
        .is_err());
    }

    #[test]
    fn test_from_config_simulated() {
        let mut config = GatewayConfig::default();
        let mut fees = FeeConfig::default();
        fees.max_fee_per_gas *= 3;
        config.networks.insert(
            "sepolia".to_string(),
            NetworkConfig {
                rpc_url: "http://localhost:8545".to_string(),
                chain_id: 11155111,
                contract_address: "0x5fbdb2315678afecb367f032d93f642f64180aa3".to_string(),
                contract_abi: None,
                fees,
                methods: Default::default(),
            },
        );

        let table = NetworkTable::from_config(&config).unwrap();
        let sepolia = table.resolve("sepolia").unwrap();
        assert_eq!(sepolia.chain_id(), 11155111);
        assert_eq!(sepolia.fees().max_fee_per_gas, U256::from(150_000_000_000u64));
    }

    #[test]
    fn test_from_config_live_requires_abi() {
        let mut config = GatewayConfig::default();
        config.mode = ChainMode::Live;
        config.networks.insert(
            "sepolia".to_string(),
            NetworkConfig {
                rpc_url: "http://localhost:8545".to_string(),
                chain_id: 11155111,
                contract_address: "0x5fbdb2315678afecb367f032d93f642f64180aa3".to_string(),
                contract_abi: None,
                fees: FeeConfig::default(),
                methods: Default::default(),
            },
        );
        assert!(matches!(
            NetworkTable::from_config(&config),
            Err(GatewayError::Config(_))
        ));
    }
}
