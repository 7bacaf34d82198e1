//! Worker process runtime for utter.
//!
//! Owns the one persistent out-of-process synthesis worker: spawning it with
//! the environment it needs, speaking the newline-delimited JSON-RPC wire
//! protocol over its standard streams, correlating concurrent calls by id,
//! and tearing it down gracefully. The rest of the workspace only sees
//! [`WorkerClient`]'s awaitable operations.

#![deny(unsafe_code)]

pub mod client;
pub mod codec;

pub use client::WorkerClient;
pub use codec::{Inbound, LineDecoder, RequestEnvelope, RpcError};
