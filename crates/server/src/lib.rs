//! HTTP API for the embedding worker.
//!
//! # Endpoints
//!
//! - `GET /healthz` - liveness and configured backend
//! - `POST /v1/embed/video` - embed a stored upload (`storage_key`) or uploaded frames
//! - `POST /v1/embed/text` - embed text into the same space
//! - `POST /v1/transcribe/video` - transcribe a stored video's audio track
//! - `POST /v1/transcribe/audio` - transcribe a stored audio file
//!
//! Errors render as `{"error": {"code": "...", "message": "..."}}`.
//!
//! ```rust,no_run
//! use embedding_worker::Settings;
//! use server::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     server::start_server(ServerConfig::load()?, Settings::load()?).await
//! }
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use server::{build_router, start_server};
pub use state::ServerState;
