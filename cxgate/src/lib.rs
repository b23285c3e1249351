//! The cxgate adapter: HTTP/JSON in front, a gRPC element stream behind.
//!
//! Clients POST CX documents to the root endpoint; the adapter parses
//! them into typed element messages, streams those to the backing service
//! over one bidirectional call per request, and re-encodes the service's
//! response stream into CX inside a `{"data": …, "errors": […]}`
//! envelope. The codec itself lives in `cxgate-core`; this crate wires it
//! to the transport, the HTTP surface, and the process around them.

pub mod config;
pub mod grpc;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod server;
pub mod session;
pub mod transport;

/// The crate version, for the `version` subcommand and startup logs.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
