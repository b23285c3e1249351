//! The CX streaming codec engine.
//!
//! Everything needed to translate between a streaming CX JSON document
//! and a sequence of typed network element messages, in a single pass
//! with bounded memory:
//!
//! - [`element`]: the element data model shared by the JSON codec and
//!   the gRPC wire (prost + serde on the same types).
//! - [`message`]: the channel protocol: synchronous per-element sends
//!   with a reply channel, and a receive channel whose close is the
//!   end-of-stream signal.
//! - [`parser`]: CX in; projects required aspects out of a request body
//!   into element messages.
//! - [`generator`]: CX out; groups element messages back into a CX
//!   document written straight to the response.
//! - [`source`]: the one-element look-ahead that drives the generator's
//!   grouping decisions.
//! - [`params`]: query-string parameters encoded as typed elements sent
//!   ahead of the networks.
//! - [`brackets`]: the pending-closer stack behind the generator's
//!   valid-JSON-on-every-exit guarantee.
//! - [`token`]: the streaming JSON tokenizer underneath the parser.

pub mod brackets;
pub mod descriptor;
pub mod element;
pub mod error;
pub mod generator;
pub mod message;
pub mod params;
pub mod parser;
pub mod source;
pub mod token;

pub use descriptor::NetworkDescription;
pub use element::{Element, NetworkElement};
pub use error::{CodecError, StreamError};
pub use generator::GeneratorConfig;
pub use message::{
    receive_element, send_element, InboundMessage, OutboundMessage, ReceiveHandle, SendHandle,
    CHANNEL_CAPACITY,
};
pub use params::{ParameterConfig, ParameterDef};
pub use parser::{ParserConfig, LONG_NUMBER};
pub use source::ElementSource;

pub(crate) use element::json::is_zero_f64;
