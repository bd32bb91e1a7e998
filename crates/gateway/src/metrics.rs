//! Prometheus metrics for the gateway

use prometheus::{opts, Encoder, IntCounterVec, Registry, TextEncoder};

#[derive(Debug, Clone)]
pub struct GatewayMetrics {
    registry: Registry,

    /// HTTP requests by matched route and status code
    pub http_requests_total: IntCounterVec,

    /// Broadcast transactions by network and operation
    pub transactions_total: IntCounterVec,
}

impl GatewayMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            opts!("gateway_http_requests_total", "HTTP requests handled"),
            &["route", "status"],
        )?;
        let transactions_total = IntCounterVec::new(
            opts!("gateway_transactions_total", "Transactions broadcast"),
            &["network", "operation"],
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(transactions_total.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            transactions_total,
        })
    }

    pub fn record_request(&self, route: &str, status: u16) {
        let status = status.to_string();
        self.http_requests_total
            .with_label_values(&[route, status.as_str()])
            .inc();
    }

    pub fn record_transaction(&self, network: &str, operation: &str) {
        self.transactions_total
            .with_label_values(&[network, operation])
            .inc();
    }

    /// Text exposition of every registered metric
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
