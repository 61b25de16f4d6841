//! Core Service Layer
//!
//! Shared infrastructure for the Ladybug server: configuration, the
//! database pool, authentication and the error type every handler returns.

pub mod auth;
pub mod config;
pub mod ctx;
pub mod db;
pub mod error;
pub mod extract;
pub mod router;

// Re-exports for convenience
pub use config::{AppState, ServerConfig};
pub use ctx::Ctx;
pub use error::{Error, Result};
pub use extract::JsonBody;
pub use router::router;
