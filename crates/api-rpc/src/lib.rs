//! JSON-RPC API Layer
//!
//! JSON-RPC 2.0 server for the Verba job engine: job methods plus a
//! push subscription carrying delivery events.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use server::{RpcServer, RpcServerConfig};
