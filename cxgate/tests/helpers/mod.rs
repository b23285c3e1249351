//! An in-process backing service for integration tests.
//!
//! Implements the transport seam directly: each opened stream is a
//! channel the sender half feeds and the receiver half drains, so the
//! default behaviour is a service that echoes every element back. The
//! mock can also refuse to open streams or fail mid-receive, and it
//! captures everything the adapter sends for later assertions.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use cxgate_core::NetworkElement;

use cxgate::transport::{ElementReceiver, ElementSender, ServiceClient, UpstreamError};

/// Per-stream buffer inside the mock. Roomy so tests never depend on the
/// adapter draining concurrently.
const MOCK_BUFFER: usize = 256;

#[derive(Clone, Copy)]
enum Mode {
    /// Echo every element back, in order.
    Echo,
    /// Refuse to open a stream at all.
    FailOpen,
    /// Echo the first n elements, then fail the receive half.
    ErrorAfter(usize),
}

/// A scriptable in-process service.
#[derive(Clone)]
pub struct MockService {
    mode: Mode,
    captured: Arc<Mutex<Vec<NetworkElement>>>,
}

impl MockService {
    pub fn echo() -> MockService {
        MockService {
            mode: Mode::Echo,
            captured: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing_open() -> MockService {
        MockService {
            mode: Mode::FailOpen,
            captured: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn error_after(elements: usize) -> MockService {
        MockService {
            mode: Mode::ErrorAfter(elements),
            captured: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Everything the adapter has sent, across all streams.
    pub fn captured(&self) -> Vec<NetworkElement> {
        self.captured.lock().unwrap().clone()
    }
}

#[async_trait]
impl ServiceClient for MockService {
    async fn open_stream(
        &self,
    ) -> Result<(Box<dyn ElementSender>, Box<dyn ElementReceiver>), UpstreamError> {
        if matches!(self.mode, Mode::FailOpen) {
            return Err(UpstreamError::OpenStream(tonic::Status::unavailable(
                "mock service refuses streams",
            )));
        }
        let (tx, rx) = mpsc::channel::<NetworkElement>(MOCK_BUFFER);
        let budget = match self.mode {
            Mode::ErrorAfter(elements) => Some(elements),
            _ => None,
        };
        Ok((
            Box::new(MockSender {
                echo: Some(tx),
                captured: self.captured.clone(),
            }),
            Box::new(MockReceiver { echo: rx, budget }),
        ))
    }
}

struct MockSender {
    echo: Option<mpsc::Sender<NetworkElement>>,
    captured: Arc<Mutex<Vec<NetworkElement>>>,
}

#[async_trait]
impl ElementSender for MockSender {
    async fn send(&mut self, element: NetworkElement) -> Result<(), UpstreamError> {
        self.captured.lock().unwrap().push(element.clone());
        match &self.echo {
            Some(echo) => echo.send(element).await.map_err(|_| UpstreamError::SendClosed),
            None => Err(UpstreamError::SendClosed),
        }
    }

    async fn close_send(&mut self) -> Result<(), UpstreamError> {
        self.echo.take();
        Ok(())
    }
}

struct MockReceiver {
    echo: mpsc::Receiver<NetworkElement>,
    /// Remaining elements before a scripted mid-stream failure.
    budget: Option<usize>,
}

#[async_trait]
impl ElementReceiver for MockReceiver {
    async fn recv(&mut self) -> Result<Option<NetworkElement>, UpstreamError> {
        if let Some(0) = self.budget {
            return Err(UpstreamError::Recv(tonic::Status::internal(
                "mock service lost the stream",
            )));
        }
        let element = self.echo.recv().await;
        if element.is_some() {
            if let Some(budget) = self.budget.as_mut() {
                *budget -= 1;
            }
        }
        Ok(element)
    }
}
