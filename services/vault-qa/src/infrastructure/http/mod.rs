//! HTTP surface: axum server, routes, and error mapping.

pub mod handlers;
pub mod server;

pub use handlers::AppState;
pub use server::{HttpServer, ServerConfig};
