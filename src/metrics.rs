//! Prometheus metrics for the services bot.
//!
//! - `chanserv_command_total{command}` - commands dispatched
//! - `chanserv_command_duration_seconds{command}` - handler latency
//! - `chanserv_auth_total{outcome}` - authentication decisions
//! - `chanserv_tokens_issued_total` - tokens handed out
//! - `chanserv_store_reconnects_total` - relational store reconnects

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

pub static COMMAND_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();

pub static COMMAND_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

pub static AUTH_OUTCOMES: OnceLock<IntCounterVec> = OnceLock::new();

pub static TOKENS_ISSUED: OnceLock<IntCounter> = OnceLock::new();

pub static STORE_RECONNECTS: OnceLock<IntCounter> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Call once at startup. Recording before `init` is a silent no-op.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            match $init {
                Ok(m) => {
                    if let Err(e) = r.register(Box::new(m.clone())) {
                        tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                    }
                    let _ = $metric.set(m);
                }
                Err(e) => {
                    tracing::warn!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                }
            }
        };
    }

    register!(COMMAND_COUNTER, IntCounterVec::new(Opts::new("chanserv_command_total", "Commands dispatched by name"), &["command"]));
    register!(COMMAND_LATENCY, HistogramVec::new(
        HistogramOpts::new("chanserv_command_duration_seconds", "Command handler latency")
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["command"]));
    register!(AUTH_OUTCOMES, IntCounterVec::new(Opts::new("chanserv_auth_total", "Authentication decisions"), &["outcome"]));
    register!(TOKENS_ISSUED, IntCounter::new("chanserv_tokens_issued_total", "Tokens issued"));
    register!(STORE_RECONNECTS, IntCounter::new("chanserv_store_reconnects_total", "Relational store reconnects"));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Record a command execution with latency.
#[inline]
pub fn record_command(command: &str, duration_secs: f64) {
    if let Some(c) = COMMAND_COUNTER.get() {
        c.with_label_values(&[command]).inc();
    }
    if let Some(h) = COMMAND_LATENCY.get() {
        h.with_label_values(&[command]).observe(duration_secs);
    }
}

#[inline]
pub fn record_auth(outcome: &str) {
    if let Some(c) = AUTH_OUTCOMES.get() {
        c.with_label_values(&[outcome]).inc();
    }
}

#[inline]
pub fn record_token_issued() {
    if let Some(c) = TOKENS_ISSUED.get() {
        c.inc();
    }
}

#[inline]
pub fn record_store_reconnect() {
    if let Some(c) = STORE_RECONNECTS.get() {
        c.inc();
    }
}
