//! Faucet contract interface: ABI loading, call encoding and result decoding
//!
//! The interface descriptor is either a bare ABI array or a compiler
//! artifact carrying the ABI under an `abi` key (Hardhat, Foundry, Truffle).
//! Event identifiers follow the declared parameter type of the target
//! function: `string` parameters get the identifier verbatim, `bytes32`
//! parameters get `keccak256(identifier)`.

use crate::config::ContractMethods;
use crate::error::{GatewayError, GatewayResult};
use crate::types::{EventId, FaucetCall, U256};
use ethabi::{Contract, Function, ParamType, Token};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct ContractInterface {
    abi: Contract,
    methods: ContractMethods,
}

impl ContractInterface {
    pub fn load(path: &Path, methods: ContractMethods) -> GatewayResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            GatewayError::Config(format!("cannot read contract ABI {}: {}", path.display(), e))
        })?;
        Self::from_json(&bytes, methods)
    }

    pub fn from_json(bytes: &[u8], methods: ContractMethods) -> GatewayResult<Self> {
        let value: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| GatewayError::Config(format!("contract ABI is not valid JSON: {}", e)))?;

        let abi = match value {
            serde_json::Value::Object(mut artifact) => artifact
                .remove("abi")
                .ok_or_else(|| GatewayError::Config("contract artifact has no abi".to_string()))?,
            abi => abi,
        };

        let abi = Contract::load(abi.to_string().as_bytes())
            .map_err(|e| GatewayError::Config(format!("invalid contract ABI: {}", e)))?;

        let interface = Self { abi, methods };
        interface.check_methods()?;
        Ok(interface)
    }

    /// Every configured method must exist so failures surface at startup.
    fn check_methods(&self) -> GatewayResult<()> {
        let m = &self.methods;
        for name in [&m.is_available, &m.funds_available, &m.create_faucet, &m.top_up, &m.drip] {
            self.function(name)?;
        }
        Ok(())
    }

    fn function(&self, name: &str) -> GatewayResult<&Function> {
        self.abi
            .function(name)
            .map_err(|_| GatewayError::Config(format!("contract ABI has no function {}", name)))
    }

    pub fn encode_is_available(&self, event: &EventId) -> GatewayResult<Vec<u8>> {
        let function = self.function(&self.methods.is_available)?;
        encode(function, vec![event_token(function, event)?])
    }

    pub fn decode_is_available(&self, output: &[u8]) -> GatewayResult<bool> {
        let function = self.function(&self.methods.is_available)?;
        match decode_first(function, output)? {
            Token::Bool(available) => Ok(available),
            other => Err(unexpected(function, &other)),
        }
    }

    pub fn encode_funds_available(&self, event: &EventId) -> GatewayResult<Vec<u8>> {
        let function = self.function(&self.methods.funds_available)?;
        encode(function, vec![event_token(function, event)?])
    }

    pub fn decode_funds_available(&self, output: &[u8]) -> GatewayResult<U256> {
        let function = self.function(&self.methods.funds_available)?;
        match decode_first(function, output)? {
            Token::Uint(funds) => Ok(funds),
            other => Err(unexpected(function, &other)),
        }
    }

    /// Calldata for a state-changing faucet call
    pub fn encode_call(&self, call: &FaucetCall) -> GatewayResult<Vec<u8>> {
        match call {
            FaucetCall::CreateFaucet { event } => {
                let function = self.function(&self.methods.create_faucet)?;
                encode(function, vec![event_token(function, event)?])
            }
            FaucetCall::TopUp { event } => {
                let function = self.function(&self.methods.top_up)?;
                encode(function, vec![event_token(function, event)?])
            }
            FaucetCall::Drip { event, recipient } => {
                let function = self.function(&self.methods.drip)?;
                encode(
                    function,
                    vec![event_token(function, event)?, Token::Address(*recipient)],
                )
            }
        }
    }
}

fn event_token(function: &Function, event: &EventId) -> GatewayResult<Token> {
    let kind = function.inputs.first().map(|param| &param.kind);
    match kind {
        Some(ParamType::String) => Ok(Token::String(event.as_str().to_string())),
        Some(ParamType::FixedBytes(32)) => {
            Ok(Token::FixedBytes(keccak_hash::keccak(event.as_str().as_bytes()).0.to_vec()))
        }
        other => Err(GatewayError::Config(format!(
            "function {} takes an unsupported event parameter: {:?}",
            function.name, other
        ))),
    }
}

fn encode(function: &Function, tokens: Vec<Token>) -> GatewayResult<Vec<u8>> {
    function
        .encode_input(&tokens)
        .map_err(|e| GatewayError::Internal(format!("cannot encode {}: {}", function.name, e)))
}

fn decode_first(function: &Function, output: &[u8]) -> GatewayResult<Token> {
    function
        .decode_output(output)
        .map_err(|e| GatewayError::Chain(format!("cannot decode {} result: {}", function.name, e)))?
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::Chain(format!("{} returned no value", function.name)))
}

fn unexpected(function: &Function, token: &Token) -> GatewayError {
    GatewayError::Chain(format!("{} returned an unexpected value: {:?}", function.name, token))
}

/// ABI of the reference faucet contract, also used by tests.
pub const FAUCET_ABI: &str = r#"[
  {"type":"function","name":"isAvailable","stateMutability":"view",
   "inputs":[{"name":"eventCode","type":"string"}],
   "outputs":[{"name":"","type":"bool"}]},
  {"type":"function","name":"fundsAvailable","stateMutability":"view",
   "inputs":[{"name":"eventCode","type":"string"}],
   "outputs":[{"name":"","type":"uint256"}]},
  {"type":"function","name":"createFaucet","stateMutability":"payable",
   "inputs":[{"name":"eventCode","type":"string"}],"outputs":[]},
  {"type":"function","name":"topUpFaucet","stateMutability":"payable",
   "inputs":[{"name":"eventCode","type":"string"}],"outputs":[]},
  {"type":"function","name":"drip","stateMutability":"nonpayable",
   "inputs":[{"name":"eventCode","type":"string"},{"name":"recipient","type":"address"}],
   "outputs":[]}
]"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Address;

    fn selector(signature: &str) -> Vec<u8> {
        keccak_hash::keccak(signature.as_bytes()).0[..4].to_vec()
    }

    fn interface() -> ContractInterface {
        ContractInterface::from_json(FAUCET_ABI.as_bytes(), ContractMethods::default()).unwrap()
    }

    #[test]
    fn test_encode_calls() {
        let iface = interface();
        let event = EventId::new("devcon").unwrap();

        let create = iface
            .encode_call(&FaucetCall::CreateFaucet { event: event.clone() })
            .unwrap();
        assert_eq!(&create[..4], selector("createFaucet(string)").as_slice());

        let recipient = Address::from_low_u64_be(0xbeef);
        let drip = iface
            .encode_call(&FaucetCall::Drip { event, recipient })
            .unwrap();
        assert_eq!(&drip[..4], selector("drip(string,address)").as_slice());
        // Second head word is the recipient
        assert_eq!(&drip[4 + 32 + 12..4 + 64], recipient.as_bytes());
    }

    #[test]
    fn test_decode_results() {
        let iface = interface();
        let mut word = [0u8; 32];
        word[31] = 1;
        assert!(iface.decode_is_available(&word).unwrap());

        let funds = ethabi::encode(&[Token::Uint(U256::from(1_500u64))]);
        assert_eq!(iface.decode_funds_available(&funds).unwrap(), U256::from(1_500u64));

        assert!(iface.decode_funds_available(&[]).is_err());
    }

    #[test]
    fn test_artifact_with_bytecode() {
        let artifact = format!(r#"{{"contractName":"Faucet","abi":{},"bytecode":"0x6080"}}"#, FAUCET_ABI);
        assert!(ContractInterface::from_json(artifact.as_bytes(), ContractMethods::default()).is_ok());
        assert!(ContractInterface::from_json(br#"{"bytecode":"0x"}"#, ContractMethods::default()).is_err());
    }

    #[test]
    fn test_missing_method_is_config_error() {
        let methods = ContractMethods {
            drip: "claimFaucet".to_string(),
            ..ContractMethods::default()
        };
        let err = ContractInterface::from_json(FAUCET_ABI.as_bytes(), methods).unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }

    #[test]
    fn test_bytes32_event_is_hashed() {
        let abi = r#"[
          {"type":"function","name":"isAvailable","stateMutability":"view",
           "inputs":[{"name":"code","type":"bytes32"}],"outputs":[{"name":"","type":"bool"}]},
          {"type":"function","name":"fundsAvailable","stateMutability":"view",
           "inputs":[{"name":"code","type":"bytes32"}],"outputs":[{"name":"","type":"uint256"}]},
          {"type":"function","name":"createFaucet","stateMutability":"payable",
           "inputs":[{"name":"code","type":"bytes32"}],"outputs":[]},
          {"type":"function","name":"topUpFaucet","stateMutability":"payable",
           "inputs":[{"name":"code","type":"bytes32"}],"outputs":[]},
          {"type":"function","name":"drip","stateMutability":"nonpayable",
           "inputs":[{"name":"code","type":"bytes32"},{"name":"to","type":"address"}],"outputs":[]}
        ]"#;
        let iface = ContractInterface::from_json(abi.as_bytes(), ContractMethods::default()).unwrap();
        let data = iface.encode_is_available(&EventId::new("devcon").unwrap()).unwrap();

        assert_eq!(&data[..4], selector("isAvailable(bytes32)").as_slice());
        assert_eq!(&data[4..], &keccak_hash::keccak(b"devcon").0[..]);
    }
}
