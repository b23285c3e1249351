//! The per-request stream session.
//!
//! Owns one bidirectional service stream and mounts a task on each half.
//! The sender task drains the send channel, forwards each element, and
//! answers its reply channel; when the channel closes it half-closes our
//! side of the call. The receiver task forwards the service's elements
//! into the receive channel until end-of-stream (closing the channel) or
//! a mid-stream failure (forwarding the error, then closing).
//!
//! Both tasks are fire-and-forget: the orchestrator observes their
//! completion through the reply channels and the receive channel close,
//! never by joining them.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use cxgate_core::{InboundMessage, OutboundMessage, StreamError};

use crate::metrics::Metrics;
use crate::transport::{ElementReceiver, ElementSender};

/// One request's bidirectional stream, split for mounting.
pub struct StreamSession {
    sender: Box<dyn ElementSender>,
    receiver: Box<dyn ElementReceiver>,
    metrics: Option<Arc<Metrics>>,
}

impl StreamSession {
    pub fn new(sender: Box<dyn ElementSender>, receiver: Box<dyn ElementReceiver>) -> Self {
        StreamSession {
            sender,
            receiver,
            metrics: None,
        }
    }

    /// Count streamed elements on these metrics.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Mount both pump tasks and hand back their handles.
    pub fn start(
        self,
        send: mpsc::Receiver<OutboundMessage>,
        recv: mpsc::Sender<InboundMessage>,
    ) -> (JoinHandle<()>, JoinHandle<()>) {
        (
            open_send(self.sender, send, self.metrics.clone()),
            open_receive(self.receiver, recv, self.metrics),
        )
    }
}

/// Drain the send channel into the transport, answering each reply.
fn open_send(
    mut sender: Box<dyn ElementSender>,
    mut chan: mpsc::Receiver<OutboundMessage>,
    metrics: Option<Arc<Metrics>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::debug!("reading from the send channel");
        while let Some(message) = chan.recv().await {
            let verdict = sender
                .send(message.element)
                .await
                .map_err(|e| StreamError::Transport(e.to_string()));
            if verdict.is_ok() {
                if let Some(ref metrics) = metrics {
                    metrics.record_element("send");
                }
            }
            // The producer may have given up waiting; that is its call.
            let _ = message.reply.send(verdict);
        }
        tracing::debug!("send channel closed, half-closing the service stream");
        if let Err(error) = sender.close_send().await {
            tracing::debug!(%error, "half-close failed");
        }
    })
}

/// Forward the service's elements into the receive channel until its
/// half of the stream ends.
fn open_receive(
    mut receiver: Box<dyn ElementReceiver>,
    chan: mpsc::Sender<InboundMessage>,
    metrics: Option<Arc<Metrics>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::debug!("forwarding to the receive channel");
        loop {
            match receiver.recv().await {
                Ok(Some(element)) => {
                    if let Some(ref metrics) = metrics {
                        metrics.record_element("receive");
                    }
                    if chan.send(Ok(element)).await.is_err() {
                        // The consumer is gone; stop pulling.
                        break;
                    }
                }
                Ok(None) => break,
                Err(error) => {
                    let _ = chan
                        .send(Err(StreamError::Transport(error.to_string())))
                        .await;
                    break;
                }
            }
        }
        tracing::debug!("closing the receive channel");
    })
}
