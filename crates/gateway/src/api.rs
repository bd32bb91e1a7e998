//! HTTP API for the faucet gateway

use crate::error::{GatewayError, GatewayResult};
use crate::service::GatewayService;
use crate::signer::Signer;
use crate::types::{hex_address, hex_hash, parse_address, EventId, TransactionResult, U256};
use crate::units::{ether_number, parse_ether};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        MatchedPath, Query, Request, State,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub type SharedService = Arc<GatewayService>;

/// Query for `/availability` and `/status`
#[derive(Debug, Default, Deserialize)]
pub struct EventQuery {
    #[serde(alias = "event_code")]
    pub name: Option<String>,
    pub network: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SeederRequest {
    pub pk: Option<String>,
    pub network: Option<String>,
}

/// Body for `/create-faucet` and `/top-up`
#[derive(Debug, Default, Deserialize)]
pub struct SeedRequest {
    #[serde(alias = "name")]
    pub event_code: Option<String>,
    pub network: Option<String>,
    pub pk: Option<String>,
    /// Ether to send instead of the configured share of the balance
    #[serde(alias = "ether_amount")]
    pub amount: Option<EtherAmount>,
}

/// Ether amount given either as a decimal string or a JSON number
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EtherAmount {
    Text(String),
    Number(serde_json::Number),
}

impl EtherAmount {
    fn into_text(self) -> String {
        match self {
            EtherAmount::Text(text) => text,
            EtherAmount::Number(number) => number.to_string(),
        }
    }
}

/// Body for `/claim-faucet` and `/drip`. Any caller key in the body is ignored.
#[derive(Debug, Default, Deserialize)]
pub struct DripRequest {
    #[serde(alias = "event_code")]
    pub name: Option<String>,
    pub network: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub name: String,
    pub is_available: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub event_exists: bool,
    pub available_ether: serde_json::Number,
}

#[derive(Debug, Serialize)]
pub struct SeederResponse {
    /// Balance in ether
    pub balance: serde_json::Number,
    pub funded: bool,
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub tx_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
}

impl From<TransactionResult> for TransactionResponse {
    fn from(result: TransactionResult) -> Self {
        Self {
            tx_hash: hex_hash(&result.tx_hash),
            receipt_hash: result.receipt.as_ref().map(|r| hex_hash(&r.transaction_hash)),
            block_number: result.receipt.map(|r| r.block_number),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NetworkResponse {
    pub name: String,
    pub chain_id: u64,
    pub contract_address: String,
    pub connected: bool,
}

/// Build the gateway router.
pub fn router(service: SharedService, cors_enabled: bool) -> Router {
    let mut app = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/networks", get(networks_handler))
        .route("/availability", get(availability_handler))
        .route("/status", get(status_handler))
        .route("/seeder-funded", post(seeder_funded_handler))
        .route("/create-faucet", post(create_faucet_handler))
        .route("/top-up", post(top_up_handler))
        .route("/top-up-faucet", post(top_up_handler))
        .route("/claim-faucet", post(drip_handler))
        .route("/drip", post(drip_handler))
        .layer(middleware::from_fn_with_state(service.clone(), track_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(service);

    if cors_enabled {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app
}

/// Count every request by matched route and status.
async fn track_requests(State(service): State<SharedService>, request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;
    service
        .metrics()
        .record_request(&route, response.status().as_u16());
    response
}

fn required(value: Option<String>, field: &str) -> GatewayResult<String> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(GatewayError::missing(field)),
    }
}

fn parse_signer(pk: &str) -> GatewayResult<Signer> {
    Signer::from_hex(pk).map_err(|_| GatewayError::Validation("pk is not a valid private key".to_string()))
}

fn parse_amount(amount: Option<EtherAmount>) -> GatewayResult<Option<U256>> {
    amount
        .map(EtherAmount::into_text)
        .filter(|a| !a.trim().is_empty())
        .map(|a| parse_ether(&a))
        .transpose()
}

fn ether_json(wei: U256) -> GatewayResult<serde_json::Number> {
    ether_number(wei)
        .ok_or_else(|| GatewayError::Internal(format!("cannot represent {} wei as a number", wei)))
}

fn query<T>(query: Result<Query<T>, QueryRejection>) -> GatewayResult<T> {
    query
        .map(|Query(q)| q)
        .map_err(|e| GatewayError::Validation(format!("invalid query string: {}", e.body_text())))
}

fn body<T>(body: Result<Json<T>, JsonRejection>) -> GatewayResult<T> {
    body.map(|Json(b)| b)
        .map_err(|e| GatewayError::Validation(format!("invalid JSON body: {}", e.body_text())))
}

fn log_failure(route: &str, err: GatewayError) -> GatewayError {
    error!("{} failed: {}", route, err);
    err
}

/// Availability handler
pub async fn availability_handler(
    State(service): State<SharedService>,
    params: Result<Query<EventQuery>, QueryRejection>,
) -> GatewayResult<Json<AvailabilityResponse>> {
    let params = query(params)?;
    let name = required(params.name, "name")?;
    let network = required(params.network, "network")?;

    let is_available = service
        .availability(&network, &EventId::new(name.clone())?)
        .await
        .map_err(|e| log_failure("availability", e))?;

    Ok(Json(AvailabilityResponse { name, is_available }))
}

/// Status handler
pub async fn status_handler(
    State(service): State<SharedService>,
    params: Result<Query<EventQuery>, QueryRejection>,
) -> GatewayResult<Json<StatusResponse>> {
    let params = query(params)?;
    let name = required(params.name, "name")?;
    let network = required(params.network, "network")?;

    let status = service
        .status(&network, &EventId::new(name)?)
        .await
        .map_err(|e| log_failure("status", e))?;

    Ok(Json(StatusResponse {
        event_exists: status.event_exists,
        available_ether: ether_json(status.funds)?,
    }))
}

pub async fn seeder_funded_handler(
    State(service): State<SharedService>,
    request: Result<Json<SeederRequest>, JsonRejection>,
) -> GatewayResult<Json<SeederResponse>> {
    let request = body(request)?;
    let pk = required(request.pk, "pk")?;
    let network = required(request.network, "network")?;
    let seeder = parse_signer(&pk)?;

    let balance = service
        .seeder_balance(&network, &seeder)
        .await
        .map_err(|e| log_failure("seeder-funded", e))?;

    Ok(Json(SeederResponse {
        balance: ether_json(balance)?,
        funded: !balance.is_zero(),
    }))
}

pub async fn create_faucet_handler(
    State(service): State<SharedService>,
    request: Result<Json<SeedRequest>, JsonRejection>,
) -> GatewayResult<Json<TransactionResponse>> {
    let request = body(request)?;
    let event_code = required(request.event_code, "event_code")?;
    let network = required(request.network, "network")?;
    let pk = required(request.pk, "pk")?;
    let seeder = parse_signer(&pk)?;
    let amount = parse_amount(request.amount)?;

    info!("Create faucet request: event={} network={}", event_code, network);
    let result = service
        .create_faucet(&network, &seeder, EventId::new(event_code)?, amount)
        .await
        .map_err(|e| log_failure("create-faucet", e))?;

    Ok(Json(result.into()))
}

pub async fn top_up_handler(
    State(service): State<SharedService>,
    request: Result<Json<SeedRequest>, JsonRejection>,
) -> GatewayResult<Json<TransactionResponse>> {
    let request = body(request)?;
    let event_code = required(request.event_code, "event_code")?;
    let network = required(request.network, "network")?;
    let pk = required(request.pk, "pk")?;
    let seeder = parse_signer(&pk)?;
    let amount = parse_amount(request.amount)?;

    info!("Top-up request: event={} network={}", event_code, network);
    let result = service
        .top_up(&network, &seeder, EventId::new(event_code)?, amount)
        .await
        .map_err(|e| log_failure("top-up", e))?;

    Ok(Json(result.into()))
}

pub async fn drip_handler(
    State(service): State<SharedService>,
    request: Result<Json<DripRequest>, JsonRejection>,
) -> GatewayResult<Json<TransactionResponse>> {
    let request = body(request)?;
    let name = required(request.name, "name")?;
    let network = required(request.network, "network")?;
    let address = required(request.address, "address")?;
    let recipient = parse_address(&address)
        .ok_or_else(|| GatewayError::Validation(format!("address is not a valid address: {}", address)))?;

    info!("Drip request: event={} network={} recipient={}", name, network, hex_address(&recipient));
    let result = service
        .drip(&network, EventId::new(name)?, recipient)
        .await
        .map_err(|e| log_failure("drip", e))?;

    Ok(Json(result.into()))
}

pub async fn networks_handler(State(service): State<SharedService>) -> Json<Vec<NetworkResponse>> {
    let networks = service
        .network_summaries()
        .await
        .into_iter()
        .map(|n| NetworkResponse {
            name: n.name,
            chain_id: n.chain_id,
            contract_address: hex_address(&n.contract_address),
            connected: n.connected,
        })
        .collect();
    Json(networks)
}

pub async fn metrics_handler(State(service): State<SharedService>) -> Response {
    match service.metrics().gather() {
        Ok(text) => text.into_response(),
        Err(err) => {
            error!("Failed to gather metrics: {}", err);
            GatewayError::Internal("failed to gather metrics".to_string()).into_response()
        }
    }
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Root handler with info
pub async fn root_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "Faucet Gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "GET /availability?name=&network=": "Whether an event identifier is unused",
            "GET /status?name=&network=": "Funding status of an event",
            "POST /seeder-funded": "Balance of a seeding account",
            "POST /create-faucet": "Create and seed a faucet",
            "POST /top-up": "Top up an existing faucet",
            "POST /drip": "Pay out to a recipient",
            "GET /networks": "Configured networks",
            "GET /health": "Health check",
            "GET /metrics": "Prometheus metrics"
        }
    }))
}
