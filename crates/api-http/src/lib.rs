//! HTTP/Stream API Layer
//!
//! REST endpoints for the IVR (join/leave) and a server-sent event feed
//! of per-queue caller counts for dashboards.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use handler::AppState;
pub use server::{create_router, HttpServer, HttpServerConfig, ServerHandle};
