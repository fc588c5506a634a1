//! HTTP transport for the conversation engine.

pub mod http;
pub mod state;

pub use http::create_router;
pub use state::AppState;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("bootstrap error: {0}")]
    Bootstrap(String),
}
