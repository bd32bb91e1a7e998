//! Error types for the gateway

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Gateway errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Missing or malformed request field
    #[error("{0}")]
    Validation(String),

    /// Network selector that does not resolve to a configured network
    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    /// Any failure reported by a chain client
    #[error("{0}")]
    Chain(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Validation error for a required field that was not supplied
    pub fn missing(field: &str) -> Self {
        GatewayError::Validation(format!("{} is required", field))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_) | GatewayError::UnknownNetwork(_) => StatusCode::BAD_REQUEST,
            GatewayError::Chain(_) | GatewayError::Config(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Replace a raw chain message with its client-facing form.
    pub fn sanitized(self, relay_raw: bool) -> Self {
        match self {
            GatewayError::Chain(raw) => GatewayError::Chain(sanitize_chain_message(&raw, relay_raw)),
            other => other,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

const GENERIC_CHAIN_MESSAGE: &str = "Blockchain request failed";

/// Known node error fragments and the message returned in their place.
const KNOWN_CHAIN_ERRORS: &[(&str, &str)] = &[
    (
        "insufficient funds",
        "Insufficient funds to cover the transaction value and network fees",
    ),
    ("nonce too low", "Transaction nonce already used, retry the request"),
    ("nonce too high", "Transaction nonce is ahead of the account, retry the request"),
    (
        "replacement transaction underpriced",
        "A pending transaction from this account is still being processed",
    ),
    ("execution reverted", "The faucet contract rejected the transaction"),
    ("waiting for receipt", "Timed out waiting for the transaction receipt"),
];

pub fn sanitize_chain_message(raw: &str, relay_raw: bool) -> String {
    let lowered = raw.to_lowercase();
    for (fragment, friendly) in KNOWN_CHAIN_ERRORS {
        if lowered.contains(fragment) {
            return (*friendly).to_string();
        }
    }

    if relay_raw {
        raw.to_string()
    } else {
        GENERIC_CHAIN_MESSAGE.to_string()
    }
}
