//! Worker process management and RPC plumbing.
//!
//! Each session owns exactly one worker process. The worker binds a
//! unix-domain socket and serves the `ida.worker.v1` RPC set; the gateway
//! talks to it through [`WorkerClient`]. Worker lifetimes belong to the
//! [`Manager`] - cancelling a client call never kills a worker.

mod client;
mod manager;
pub mod proto;
mod rpc;

pub use client::{AnalysisToolsClient, HealthcheckClient, SessionControlClient, WorkerClient};
pub use manager::{Manager, WorkerController};
pub use rpc::{RpcChannel, RpcError};
