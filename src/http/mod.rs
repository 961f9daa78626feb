//! HTTP request pipeline.
//!
//! # Data Flow
//! ```text
//! cached.rs (stale-while-revalidate over the cache store)
//!     → dedup.rs (one execution per identical in-flight request)
//!     → executor.rs (rate check, spacing, attempts, backoff)
//!     → envelope.rs (uniform ApiResponse, error text)
//! ```

pub mod cached;
pub mod dedup;
pub mod envelope;
pub mod executor;
pub mod request;

pub use cached::{CacheOptions, CachedRequester};
pub use dedup::Deduplicator;
pub use envelope::{build_error_message, ApiResponse, FailureKind};
pub use executor::RequestExecutor;
pub use request::RequestSpec;
