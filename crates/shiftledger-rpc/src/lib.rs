//! The JSON-RPC 2.0 surface: thin adapters that authenticate, authorize,
//! call the engines, and render responses.

pub mod api;
pub mod server;
pub mod types;

pub use server::{RpcServer, RpcServerState};
