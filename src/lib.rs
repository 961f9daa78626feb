//! Resilient HTTP client for the meal subscription backend.

// Request pipeline
pub mod api;
pub mod http;

// Collaborators
pub mod auth;
pub mod cache;
pub mod rate_limit;
pub mod resilience;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod observability;

pub use api::{ApiClient, ApiClientBuilder};
pub use config::schema::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use http::{ApiResponse, FailureKind};
