//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Login Metrics
    pub static ref LOGINS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("gatehouse_logins_total", "Total number of completed OAuth callbacks"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref LOGOUTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("gatehouse_logouts_total", "Total number of logout requests"),
        &["outcome"]
    ).expect("metric can be created");

    // Identity Provider Metrics
    pub static ref PROVIDER_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("gatehouse_provider_requests_total", "Total number of identity provider requests"),
        &["endpoint", "status"]
    ).expect("metric can be created");
    pub static ref PROVIDER_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "gatehouse_provider_request_duration_seconds",
            "Identity provider request duration in seconds"
        ).buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["endpoint"]
    ).expect("metric can be created");

    // Session Metrics
    pub static ref SESSIONS_ACTIVE: IntGauge = IntGauge::new(
        "gatehouse_sessions_active",
        "Current number of live sessions in the store"
    ).expect("metric can be created");
    pub static ref GATE_DECISIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("gatehouse_gate_decisions_total", "Access control decisions on protected routes"),
        &["decision"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("gatehouse_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; registration happens on the first call.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(LOGINS_TOTAL.clone()))
            .expect("LOGINS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(LOGOUTS_TOTAL.clone()))
            .expect("LOGOUTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(PROVIDER_REQUESTS_TOTAL.clone()))
            .expect("PROVIDER_REQUESTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(PROVIDER_REQUEST_DURATION_SECONDS.clone()))
            .expect("PROVIDER_REQUEST_DURATION_SECONDS can be registered");
        REGISTRY
            .register(Box::new(SESSIONS_ACTIVE.clone()))
            .expect("SESSIONS_ACTIVE can be registered");
        REGISTRY
            .register(Box::new(GATE_DECISIONS_TOTAL.clone()))
            .expect("GATE_DECISIONS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}
