//! Prometheus metrics, exported on `GET /metrics` in OpenMetrics text
//! format.

use std::borrow::Cow;
use std::sync::Mutex;

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

/// Labels for the request counter.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RequestLabels {
    /// "success", "error", or "rejected" (failed the method or
    /// content-type checks).
    pub outcome: Cow<'static, str>,
}

/// Labels for the element counter.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ElementLabels {
    /// "send" (to the service) or "receive" (from it).
    pub direction: Cow<'static, str>,
}

/// The adapter's metric families.
pub struct Metrics {
    registry: Mutex<Registry>,
    requests: Family<RequestLabels, Counter>,
    elements: Family<ElementLabels, Counter>,
}

impl Metrics {
    pub fn new() -> Metrics {
        let mut registry = Registry::default();
        let requests = Family::<RequestLabels, Counter>::default();
        registry.register(
            "cxgate_requests",
            "Requests handled, by outcome",
            requests.clone(),
        );
        let elements = Family::<ElementLabels, Counter>::default();
        registry.register(
            "cxgate_elements",
            "Elements streamed through the adapter, by direction",
            elements.clone(),
        );
        Metrics {
            registry: Mutex::new(registry),
            requests,
            elements,
        }
    }

    pub fn record_request(&self, outcome: &'static str) {
        self.requests
            .get_or_create(&RequestLabels {
                outcome: Cow::Borrowed(outcome),
            })
            .inc();
    }

    pub fn record_element(&self, direction: &'static str) {
        self.elements
            .get_or_create(&ElementLabels {
                direction: Cow::Borrowed(direction),
            })
            .inc();
    }

    /// Render the registry in OpenMetrics text format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Ok(registry) = self.registry.lock() {
            let _ = encode(&mut out, &registry);
        }
        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics::new()
    }
}
