//! Error types for the CX codec engine.
//!
//! `StreamError` covers failures that cross the per-request channels: the
//! transport rejecting an element, a channel closing under a producer, or
//! the clean end of the service's half of the stream. `CodecError` covers
//! everything the parser, generator, and parameter encoder can report.

use crate::token::TokenError;

/// Errors that travel through the send/receive channels.
///
/// `EndOfStream` is the sentinel for a cleanly closed receive channel; it
/// is how the generator learns the service has finished its half of the
/// stream. The other variants are genuine failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// The receive channel closed cleanly: the service finished sending.
    #[error("end of service stream")]
    EndOfStream,

    /// A channel closed while a producer still had elements to hand off.
    #[error("stream channel closed before the element could be handed off")]
    ChannelClosed,

    /// The transport reported a failure for a specific element.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Errors reported by the parser, generator, and parameter encoder.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A parser, generator, or parameter descriptor failed validation.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Human-readable description of the invalid descriptor.
        reason: String,
    },

    /// The tokenizer could not produce the token the grammar expects.
    #[error("could not read {description}: {source}")]
    Token {
        /// What the caller was trying to read, e.g. "an aspect identifier".
        description: String,
        /// The underlying tokenizer failure.
        source: TokenError,
    },

    /// A token was read but it is not what the grammar expects.
    #[error("expected {description}, found {found}")]
    UnexpectedToken {
        /// What the grammar expects at this position.
        description: String,
        /// The token actually found, rendered for diagnostics.
        found: String,
    },

    /// A JSON value was read but could not be decoded into the expected shape.
    #[error("expected {description} but could not decode value: {reason}")]
    Decode {
        /// What the caller was trying to decode.
        description: String,
        /// The decoder's failure message.
        reason: String,
    },

    /// A required object key is absent.
    #[error("missing key {key:?} in {context}")]
    MissingKey {
        /// The absent key.
        key: &'static str,
        /// Where the key was expected.
        context: &'static str,
    },

    /// The verification aspect must contain exactly one element.
    #[error("expected one numberVerification element, found {count}")]
    VerificationCount {
        /// How many elements were present.
        count: usize,
    },

    /// The verification aspect carried the wrong long number.
    #[error("expected long number {expected} found {found}")]
    LongNumberMismatch {
        /// The only value a CX v1 stream may carry.
        expected: i64,
        /// The value actually present.
        found: i64,
    },

    /// The pre-metadata does not declare every required aspect.
    #[error("could not find required aspects {missing:?} in the pre-metadata")]
    MissingAspects {
        /// Required aspect names absent from the metadata records.
        missing: Vec<String>,
    },

    /// A required aspect has no element decoder registered.
    #[error("no decoder for required aspect {aspect}")]
    UnknownAspect {
        /// The undecodable aspect name.
        aspect: String,
    },

    /// An element message carried no element variant.
    #[error("network element for {label:?} carries no element variant")]
    EmptyElement {
        /// The network label on the hollow message.
        label: String,
    },

    /// A query or default value could not be converted to the declared type.
    #[error("cannot convert parameter {name} with value {value} to type {kind}")]
    ParameterConversion {
        /// The parameter's declared name.
        name: String,
        /// The raw value that failed conversion.
        value: String,
        /// The declared parameter type.
        kind: String,
    },

    /// The generator asked to push something other than `[` or `{`.
    #[error("{found:?} is not a recognized opening bracket")]
    NotABracket {
        /// The rejected rune.
        found: char,
    },

    /// The generator tried to close a bracket with nothing open.
    #[error("expected closing bracket {expected:?} found empty bracket stack")]
    BracketUnderflow {
        /// The bracket the generator meant to emit.
        expected: char,
    },

    /// The generator's open/close calls got out of step.
    #[error("expected closing bracket {expected:?} found {found:?}")]
    BracketMismatch {
        /// The closer recorded on the stack.
        expected: char,
        /// The closer the generator tried to emit.
        found: char,
    },

    /// A failure inside one network of a multi-network stream, wrapped
    /// with the network's position in the config.
    #[error("error parsing {label} at position {position}: {source}")]
    Network {
        /// The label of the network that failed.
        label: String,
        /// Its position in the config's network order.
        position: usize,
        /// The underlying failure.
        source: Box<CodecError>,
    },

    /// A channel-level failure surfaced into the codec.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// The downstream writer failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CodecError {
    /// Wrap a tokenizer failure with the grammar position it occurred at.
    pub(crate) fn token(description: impl Into<String>, source: TokenError) -> Self {
        CodecError::Token {
            description: description.into(),
            source,
        }
    }

    /// Wrap a serde failure with what the caller was decoding.
    pub(crate) fn decode(description: impl Into<String>, err: serde_json::Error) -> Self {
        CodecError::Decode {
            description: description.into(),
            reason: err.to_string(),
        }
    }
}
