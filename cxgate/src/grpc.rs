//! The gRPC transport to the backing service.
//!
//! One lazy channel is dialed at startup and shared by every request;
//! each request opens its own `StreamNetworks` call on it. The call is
//! issued through `tonic::client::Grpc` directly with a prost codec and
//! a static method path, which is the same shape generated service
//! clients take. The outbound direction is fed through a channel so the
//! send half exposes an imperative `send`/`close_send` seam; dropping the
//! feeder half-closes our side of the call.

use async_trait::async_trait;
use http::uri::PathAndQuery;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::codec::ProstCodec;
use tonic::transport::{Channel, Endpoint};

use cxgate_core::NetworkElement;

use crate::transport::{ElementReceiver, ElementSender, ServiceClient, UpstreamError};

/// Full method path of the bidirectional streaming call.
const STREAM_NETWORKS_PATH: &str = "/cxgate.CxGateService/StreamNetworks";

/// Outbound buffer between the sender seam and the gRPC call. Small: the
/// element-level back-pressure lives in the reply protocol upstream of
/// this.
const OUTBOUND_BUFFER: usize = 1;

/// A persistent connection to the backing service.
pub struct ServiceConn {
    channel: Channel,
    address: String,
}

impl ServiceConn {
    /// Dial the service. The connection is established lazily, so this
    /// succeeds even if the service is still coming up; failures surface
    /// when the first stream is opened.
    pub fn connect(address: &str) -> Result<ServiceConn, UpstreamError> {
        tracing::debug!(address, "dialing service");
        let endpoint =
            Endpoint::from_shared(endpoint_uri(address)).map_err(|e| UpstreamError::Connect {
                address: address.to_string(),
                reason: e.to_string(),
            })?;
        Ok(ServiceConn {
            channel: endpoint.connect_lazy(),
            address: address.to_string(),
        })
    }
}

/// Service locations in the config are bare `host:port`; the transport
/// wants a full URI.
fn endpoint_uri(address: &str) -> String {
    if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{address}")
    }
}

#[async_trait]
impl ServiceClient for ServiceConn {
    async fn open_stream(
        &self,
    ) -> Result<(Box<dyn ElementSender>, Box<dyn ElementReceiver>), UpstreamError> {
        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        grpc.ready().await.map_err(|e| UpstreamError::Connect {
            address: self.address.clone(),
            reason: e.to_string(),
        })?;

        let (outbound_tx, outbound_rx) = mpsc::channel::<NetworkElement>(OUTBOUND_BUFFER);
        let codec: ProstCodec<NetworkElement, NetworkElement> = ProstCodec::default();
        let path = PathAndQuery::from_static(STREAM_NETWORKS_PATH);
        let response = grpc
            .streaming(
                tonic::Request::new(ReceiverStream::new(outbound_rx)),
                path,
                codec,
            )
            .await
            .map_err(UpstreamError::OpenStream)?;
        tracing::debug!(address = %self.address, "service stream initialized");

        Ok((
            Box::new(GrpcSender {
                outbound: Some(outbound_tx),
            }),
            Box::new(GrpcReceiver {
                inbound: response.into_inner(),
            }),
        ))
    }
}

struct GrpcSender {
    /// `None` once the half-close has happened.
    outbound: Option<mpsc::Sender<NetworkElement>>,
}

#[async_trait]
impl ElementSender for GrpcSender {
    async fn send(&mut self, element: NetworkElement) -> Result<(), UpstreamError> {
        match &self.outbound {
            Some(outbound) => outbound
                .send(element)
                .await
                .map_err(|_| UpstreamError::SendClosed),
            None => Err(UpstreamError::SendClosed),
        }
    }

    async fn close_send(&mut self) -> Result<(), UpstreamError> {
        // Dropping the feeder ends the outbound stream, which tonic
        // translates into the half-close.
        self.outbound.take();
        Ok(())
    }
}

struct GrpcReceiver {
    inbound: tonic::Streaming<NetworkElement>,
}

#[async_trait]
impl ElementReceiver for GrpcReceiver {
    async fn recv(&mut self) -> Result<Option<NetworkElement>, UpstreamError> {
        self.inbound.message().await.map_err(UpstreamError::Recv)
    }
}
