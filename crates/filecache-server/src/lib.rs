//! File cache server
//!
//! Binds the resumable transfer handlers to HTTP (`PUT`/`GET`/`DELETE /{token}`),
//! serves the JSON-RPC control channel on `/control`, and reports health on
//! `/health`.

pub mod config;
pub mod control;
pub mod error;
pub mod routes;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use control::ControlService;
pub use error::{ApiError, Result, ServerError};
pub use server::{create_router, start_server};
pub use state::{ServerState, SharedState};
