//! Authentication token handling.
//!
//! # Data Flow
//! ```text
//! login/signup response
//!     → token.rs (store_token: storage write + memory refresh)
//!
//! every authenticated request
//!     → token.rs (get_stored_token: memory within TTL, else storage)
//!     → jwt.rs (user id for cache keys and rate accounting)
//! ```

pub mod jwt;
pub mod storage;
pub mod token;

pub use jwt::{decode_payload_user_id, user_id_for, ANONYMOUS};
pub use storage::{FileTokenStorage, MemoryTokenStorage, TokenStorage};
pub use token::TokenStore;
