pub mod admin;
pub mod auth;
pub mod error;
pub mod export;
pub mod highlights;
pub mod middleware;
pub mod posts;
pub mod routes;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;
