//! The per-request orchestration.
//!
//! For one request: open a stream session, mount its pump tasks, then run
//! the input side (parameters, then the parser over the request body) and
//! the output side (element source plus generator writing to the response
//! body) concurrently, and join both. The codec is synchronous stream
//! code, so each side runs on a blocking task; the channels in between
//! connect them to the async session loops.
//!
//! Cancellation is cooperative and flows through channel closes: when the
//! input side finishes or fails it drops its send handle, the sender loop
//! half-closes the call, the service ends its half, and the receive
//! channel close unwinds the output side. Neither side is ever aborted.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use cxgate_core::{CodecError, InboundMessage, OutboundMessage, CHANNEL_CAPACITY};

use crate::config::ServiceConfig;
use crate::metrics::Metrics;
use crate::session::StreamSession;
use crate::transport::ServiceClient;

/// Client-facing message when the stream to the service cannot be opened.
pub const UPSTREAM_UNAVAILABLE: &str = "failed to establish a client connection to the backing \
                                        service. Try again later or contact the service author";

/// The first failure of an exchange, shaped for the response envelope.
#[derive(Debug)]
pub struct Failure {
    pub message: String,
    pub status: u16,
}

impl Failure {
    fn internal(message: impl Into<String>) -> Failure {
        Failure {
            message: message.into(),
            status: 500,
        }
    }
}

/// Run one full exchange against the backing service.
///
/// `writer` receives the generator's output; `wrote` is flipped by the
/// caller's envelope writer when the first byte goes out and feeds the
/// error-precedence rule: a generator failure wins once bytes have been
/// written (the tail is the only place left to report it), otherwise the
/// input side's failure comes first.
///
/// Returns the first failure, or `None` on success. By the time this
/// returns both sides have fully stopped.
pub async fn run_exchange<R, W>(
    service: Arc<ServiceConfig>,
    client: Arc<dyn ServiceClient>,
    metrics: Option<Arc<Metrics>>,
    query: HashMap<String, Vec<String>>,
    reader: R,
    writer: W,
    wrote: Arc<AtomicBool>,
) -> Option<Failure>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    let (sender, receiver) = match client.open_stream().await {
        Ok(halves) => halves,
        Err(error) => {
            tracing::error!(%error, "could not create service stream");
            return Some(Failure {
                message: UPSTREAM_UNAVAILABLE.to_string(),
                status: 424,
            });
        }
    };

    let (send_tx, send_rx) = mpsc::channel::<OutboundMessage>(CHANNEL_CAPACITY);
    let (recv_tx, recv_rx) = mpsc::channel::<InboundMessage>(CHANNEL_CAPACITY);
    let mut session = StreamSession::new(sender, receiver);
    if let Some(metrics) = metrics {
        session = session.with_metrics(metrics);
    }
    session.start(send_rx, recv_tx);

    let input_service = service.clone();
    let input = tokio::task::spawn_blocking(move || -> Result<(), CodecError> {
        let mut reader = reader;
        input_service.parameters.send(&send_tx, &query)?;
        input_service
            .input
            .parse(&mut reader, &send_tx, input_service.singleton_input)?;
        // send_tx drops here, closing the channel and triggering the
        // half-close.
        Ok(())
    });

    let output_service = service.clone();
    let output = tokio::task::spawn_blocking(move || -> Result<(), CodecError> {
        let mut writer = writer;
        output_service
            .output
            .generate(&mut writer, recv_rx, output_service.singleton_output)
    });

    let (input_result, output_result) = tokio::join!(input, output);

    let input_error = match input_result {
        Ok(Ok(())) => None,
        Ok(Err(error)) => {
            tracing::error!(%error, "parser failed");
            Some(Failure::internal(error.to_string()))
        }
        Err(join_error) => Some(Failure::internal(format!("input task failed: {join_error}"))),
    };
    let output_error = match output_result {
        Ok(Ok(())) => None,
        Ok(Err(error)) => {
            tracing::error!(%error, "generator failed");
            Some(Failure::internal(error.to_string()))
        }
        Err(join_error) => Some(Failure::internal(format!(
            "output task failed: {join_error}"
        ))),
    };

    match (input_error, output_error) {
        (None, None) => None,
        (Some(failure), None) => Some(failure),
        (None, Some(failure)) => Some(failure),
        (Some(input_failure), Some(output_failure)) => {
            if wrote.load(Ordering::SeqCst) {
                Some(output_failure)
            } else {
                Some(input_failure)
            }
        }
    }
}
