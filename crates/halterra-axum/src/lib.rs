#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

#[cfg(test)]
use http_body_util as _;
#[cfg(test)]
use tokio_test as _;
#[cfg(test)]
use tower as _;

pub mod allowlist;
pub mod bootstrap;
pub mod error;
pub mod handlers;
pub mod quota;
pub mod routes;
pub mod sse;
pub mod state;

// Re-export primary types
pub use allowlist::Allowlist;
pub use bootstrap::{AxumContext, ServerConfig, bootstrap, start_server};
pub use error::HttpError;
pub use routes::create_router;
pub use state::AppState;
