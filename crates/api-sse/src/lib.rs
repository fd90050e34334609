//! SSE API Layer
//!
//! Read-only HTTP surface over the job registry plus a server-sent event
//! stream per job.

pub mod error;
pub mod routes;
pub mod server;

pub use routes::{router, SseState};
pub use server::{serve, HttpServerConfig};
