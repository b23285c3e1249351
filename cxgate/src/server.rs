//! The HTTP surface.
//!
//! One root route accepts the CX POST; everything else about it is the
//! envelope dance. The response body is always
//! `{"data": <cx-stream>, "errors": [...]}` and always parses as JSON,
//! whatever happened to the pipeline:
//!
//! - The `data` prefix is written lazily by [`EnvelopeWriter`] when the
//!   generator produces its first byte; that same moment commits the
//!   response as a 200 stream.
//! - If the pipeline finishes without a single generator byte, nothing
//!   has been committed and the handler sends a complete envelope with
//!   the mapped error status instead.
//! - If bytes were streamed, the pipeline task appends the `errors` tail
//!   (empty on success, one record on failure) after joining both sides.

use std::collections::HashMap;
use std::convert::Infallible;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::Router;
use bytes::Bytes;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::io::{StreamReader, SyncIoBridge};

use crate::config::Config;
use crate::metrics::Metrics;
use crate::pipeline::{self, Failure};
use crate::transport::ServiceClient;

const METHOD_NOT_ALLOWED_MESSAGE: &str = "you must use the POST method with this endpoint";
const UNSUPPORTED_MEDIA_TYPE_MESSAGE: &str =
    "you must set the content type header to application/json";

/// Link embedded in every error record.
const PROJECT_LINK: &str = "https://github.com/cxgate/cxgate";

/// The envelope's opening bytes, up to the data payload.
const DATA_PREFIX: &[u8] = b"{\"data\":";

/// Response body chunks buffered between the generator and the client.
const BODY_BUFFER: usize = 16;

/// One error record in the envelope's `errors` array.
#[derive(Debug, Clone, Serialize)]
pub struct HttpError {
    pub code: String,
    pub message: String,
    pub link: String,
    pub status: u16,
}

impl HttpError {
    pub fn new(message: impl Into<String>, status: u16) -> HttpError {
        HttpError {
            code: format!("cx:cxgate/{status}"),
            message: message.into(),
            link: PROJECT_LINK.to_string(),
            status,
        }
    }
}

/// A complete envelope, used when nothing has been streamed yet.
#[derive(Serialize)]
struct HttpResponse<'a> {
    data: &'a str,
    errors: Vec<HttpError>,
}

/// Everything the handlers share.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    service: Arc<crate::config::ServiceConfig>,
    client: Arc<dyn ServiceClient>,
    metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(config: Config, client: Arc<dyn ServiceClient>, metrics: Arc<Metrics>) -> AppState {
        AppState {
            service: Arc::new(config.service.clone()),
            config: Arc::new(config),
            client,
            metrics,
        }
    }
}

/// Build the adapter's router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", any(handle_root))
        .route("/metrics", get(handle_metrics))
        .with_state(state)
}

/// Bind the configured listener and serve until shutdown.
pub async fn serve(state: AppState) -> io::Result<()> {
    let listener = tokio::net::TcpListener::bind(&state.config.general.location).await?;
    tracing::info!(
        listen = %state.config.general.location,
        service = %state.config.service.location,
        title = %state.config.service.title,
        version = %state.config.service.version,
        "listening"
    );
    axum::serve(listener, router(state)).await
}

async fn handle_root(State(state): State<AppState>, request: Request) -> Response {
    tracing::info!("request received");
    if request.method() != Method::POST {
        tracing::error!(method = %request.method(), "root endpoint requires method POST");
        state.metrics.record_request("rejected");
        return error_response(405, METHOD_NOT_ALLOWED_MESSAGE);
    }
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if content_type != "application/json" {
        tracing::error!(content_type, "root endpoint requires content-type application/json");
        state.metrics.record_request("rejected");
        return error_response(415, UNSUPPORTED_MEDIA_TYPE_MESSAGE);
    }

    let query = parse_query(request.uri().query().unwrap_or(""));

    // Read inactivity deadline on the request body, per chunk.
    let read_timeout = Duration::from_secs(state.config.general.read_timeout.max(1));
    let body_stream = request.into_body().into_data_stream();
    let body_stream = StreamExt::timeout(body_stream, read_timeout).map(|item| match item {
        Ok(Ok(bytes)) => Ok(bytes),
        Ok(Err(error)) => Err(io::Error::other(error)),
        Err(_elapsed) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            "timed out reading the request body",
        )),
    });
    let reader = SyncIoBridge::new(StreamReader::new(Box::pin(body_stream)));

    let (body_tx, body_rx) = mpsc::channel::<Bytes>(BODY_BUFFER);
    let wrote = Arc::new(AtomicBool::new(false));
    let (first_tx, first_rx) = oneshot::channel();
    let writer = EnvelopeWriter::new(
        BodyWriter {
            chan: body_tx.clone(),
        },
        wrote.clone(),
        first_tx,
    );

    let service = state.service.clone();
    let client = state.client.clone();
    let metrics = state.metrics.clone();
    let task_wrote = wrote.clone();
    let exchange = tokio::spawn(async move {
        let failure = pipeline::run_exchange(
            service,
            client,
            Some(metrics.clone()),
            query,
            reader,
            writer,
            task_wrote.clone(),
        )
        .await;
        if task_wrote.load(Ordering::SeqCst) {
            let _ = body_tx.send(Bytes::from(envelope_tail(failure.as_ref()))).await;
        }
        metrics.record_request(if failure.is_some() { "error" } else { "success" });
        failure
    });

    match first_rx.await {
        // The generator produced output: the response is committed as a
        // 200 stream, errors land in the envelope tail.
        Ok(()) => {
            let stream = ReceiverStream::new(body_rx).map(Ok::<_, Infallible>);
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                Body::from_stream(stream),
            )
                .into_response()
        }
        // Not a single byte went out; report the failure with its own
        // status and a complete envelope.
        Err(_) => match exchange.await {
            Ok(Some(failure)) => error_response(failure.status, &failure.message),
            Ok(None) => envelope_response(200, "", Vec::new()),
            Err(join_error) => {
                tracing::error!(%join_error, "request pipeline panicked");
                error_response(500, "the request pipeline failed unexpectedly")
            }
        },
    }
}

async fn handle_metrics(State(state): State<AppState>) -> Response {
    (
        [(
            header::CONTENT_TYPE,
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        state.metrics.render(),
    )
        .into_response()
}

/// Split a raw query string into per-key value lists, preserving value
/// order per key.
fn parse_query(raw: &str) -> HashMap<String, Vec<String>> {
    let mut query: HashMap<String, Vec<String>> = HashMap::new();
    for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        query.entry(key.into_owned()).or_default().push(value.into_owned());
    }
    query
}

/// A complete error envelope with the given status.
fn error_response(status: u16, message: &str) -> Response {
    envelope_response(status, "", vec![HttpError::new(message, status)])
}

/// Render a full, non-streamed envelope.
fn envelope_response(status: u16, data: &str, errors: Vec<HttpError>) -> Response {
    let body = serde_json::to_string(&HttpResponse { data, errors })
        .unwrap_or_else(|_| "{\"data\":\"\",\"errors\":[]}".to_string());
    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response()
}

/// The closing bytes of a streamed envelope.
fn envelope_tail(failure: Option<&Failure>) -> String {
    match failure {
        None => ",\"errors\":[]}".to_string(),
        Some(failure) => {
            let record = serde_json::to_string(&HttpError::new(&failure.message, failure.status))
                .unwrap_or_else(|_| "{}".to_string());
            format!(",\"errors\":[{record}]}}")
        }
    }
}

/// Channel-backed writer feeding the response body stream.
struct BodyWriter {
    chan: mpsc::Sender<Bytes>,
}

impl Write for BodyWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.chan
            .blocking_send(Bytes::copy_from_slice(buf))
            .map_err(|_| {
                io::Error::new(io::ErrorKind::BrokenPipe, "response consumer is gone")
            })?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Tracks whether the generator wrote anything, emits the envelope
/// prefix ahead of the first byte, and signals the handler to commit the
/// streamed response.
struct EnvelopeWriter<W: Write> {
    inner: W,
    wrote: Arc<AtomicBool>,
    first: Option<oneshot::Sender<()>>,
}

impl<W: Write> EnvelopeWriter<W> {
    fn new(inner: W, wrote: Arc<AtomicBool>, first: oneshot::Sender<()>) -> EnvelopeWriter<W> {
        EnvelopeWriter {
            inner,
            wrote,
            first: Some(first),
        }
    }
}

impl<W: Write> Write for EnvelopeWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if !self.wrote.swap(true, Ordering::SeqCst) {
            self.inner.write_all(DATA_PREFIX)?;
            if let Some(first) = self.first.take() {
                let _ = first.send(());
            }
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
