//! API layer
//!
//! HTTP handlers for:
//! - Landing and dashboard pages
//! - User data for the dashboard script
//! - Metrics (Prometheus)

pub mod metrics;
mod pages;

pub use metrics::metrics_router;
pub use pages::{landing_router, protected_router, public_files};
