//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Client components produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stderr (pretty or JSON)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! Every request carries an `X-Request-ID` that also appears in its log lines.

pub mod logging;
pub mod metrics;
