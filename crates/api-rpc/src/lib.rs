//! JSON-RPC API Layer
//!
//! JSON-RPC 2.0 server for the ingestion queue: enqueue, upload, reindex,
//! job status and operator views.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use server::{RpcServer, RpcServerConfig};
