//! API Layer Module
//!
//! HTTP server, routes, request validation and the SSE deposit feed.

pub mod routes;
pub mod server;
pub mod sse;
pub mod validation;

pub use server::{create_router, start_server, AppState, SharedAppState};
pub use sse::SseBroadcaster;
pub use validation::ApiError;
