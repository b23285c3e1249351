//! The seam between the adapter and the backing service's stream.
//!
//! The stream session and orchestrator only ever touch these traits: a
//! client that opens one bidirectional stream per request, split into a
//! send half and a receive half so each direction can be owned by its own
//! task. The gRPC implementation lives in [`crate::grpc`]; tests
//! substitute an in-process service.

use async_trait::async_trait;

use cxgate_core::NetworkElement;

/// Failures at the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// The service address could not be dialed.
    #[error("could not establish connection to service at {address}: {reason}")]
    Connect {
        /// The configured service location.
        address: String,
        /// Why the dial failed.
        reason: String,
    },

    /// The streaming call could not be opened.
    #[error("could not initiate network streaming call: {0}")]
    OpenStream(tonic::Status),

    /// The send half is gone; no more elements can be forwarded.
    #[error("the service stream is no longer accepting elements")]
    SendClosed,

    /// The service failed mid-stream while we were receiving.
    #[error("receive failed: {0}")]
    Recv(tonic::Status),
}

/// The send half of one service stream.
#[async_trait]
pub trait ElementSender: Send {
    /// Forward one element to the service.
    async fn send(&mut self, element: NetworkElement) -> Result<(), UpstreamError>;

    /// Half-close our direction, telling the service no more elements are
    /// coming.
    async fn close_send(&mut self) -> Result<(), UpstreamError>;
}

/// The receive half of one service stream.
#[async_trait]
pub trait ElementReceiver: Send {
    /// The next element from the service, or `None` once it half-closes.
    async fn recv(&mut self) -> Result<Option<NetworkElement>, UpstreamError>;
}

/// A client that can open one bidirectional element stream per request.
#[async_trait]
pub trait ServiceClient: Send + Sync {
    async fn open_stream(
        &self,
    ) -> Result<(Box<dyn ElementSender>, Box<dyn ElementReceiver>), UpstreamError>;
}
