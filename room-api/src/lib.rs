//! HTTP front end of the room orchestrator.
//!
//! Every engine call is synchronous and runs on tokio's blocking pool.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use routes::create_app;
pub use state::AppState;
