//! Metrics collection and exposition.
//!
//! # Metrics
//! - `wallet_connect_total` (counter): connect attempts by provider, outcome
//! - `wallet_disconnect_total` (counter): teardowns by reason
//! - `wallet_transactions_total` (counter): submitted transactions by outcome
//! - `wallet_confirmation_polls` (histogram): receipt polls per confirmation wait
//! - `wallet_provider_events_total` (counter): provider callbacks by kind
//! - `wallet_notifier_subscribers` (gauge): current subscriber count
//!
//! # Design Decisions
//! - Without an installed recorder every call is a no-op
//! - Label values are static strings to avoid per-call allocation

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and scrape endpoint. Must run inside a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_connect(provider: &'static str, outcome: &'static str) {
    ::metrics::counter!("wallet_connect_total", "provider" => provider, "outcome" => outcome)
        .increment(1);
}

pub fn record_disconnect(reason: &'static str) {
    ::metrics::counter!("wallet_disconnect_total", "reason" => reason).increment(1);
}

pub fn record_transaction(outcome: &'static str) {
    ::metrics::counter!("wallet_transactions_total", "outcome" => outcome).increment(1);
}

pub fn record_confirmation_polls(polls: u32) {
    ::metrics::histogram!("wallet_confirmation_polls").record(f64::from(polls));
}

pub fn record_provider_event(kind: &'static str) {
    ::metrics::counter!("wallet_provider_events_total", "kind" => kind).increment(1);
}

pub fn record_subscribers(count: usize) {
    ::metrics::gauge!("wallet_notifier_subscribers").set(count as f64);
}
