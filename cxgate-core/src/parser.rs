//! The streaming CX parser.
//!
//! Walks a CX document token by token, decoding required-aspect elements
//! into typed messages pushed onto the send channel and structurally
//! skipping everything else. A document is never materialised: memory use
//! is bounded by the largest single element.

use std::collections::HashMap;
use std::io::{BufReader, Read};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::descriptor::{validate_descriptions, NetworkDescription};
use crate::element::{element_from_json, NetworkElement};
use crate::error::CodecError;
use crate::message::{send_element, SendHandle};
use crate::token::{Token, Tokenizer};

/// The long number every CX v1 stream must carry: 2^48 - 1.
pub const LONG_NUMBER: i64 = 281_474_976_710_655;

/// The single record of a `numberVerification` aspect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumberVerification {
    #[serde(rename = "longNumber")]
    pub long_number: i64,
}

/// One record of a `metaData` aspect. Only `name` matters to the
/// adapter; the rest is carried so arbitrary metadata decodes cleanly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(rename = "idCounter", skip_serializing_if = "crate::is_zero_f64")]
    pub id_counter: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Value>,
    #[serde(rename = "elementCount", skip_serializing_if = "crate::is_zero_f64")]
    pub element_count: f64,
    #[serde(rename = "consistencyGroup", skip_serializing_if = "crate::is_zero_f64")]
    pub consistency_group: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub checksum: String,
}

/// Ordered descriptions of the networks a request body must contain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParserConfig(pub Vec<NetworkDescription>);

impl ParserConfig {
    /// Validate labels and aspect lists.
    pub fn validate(&self) -> Result<(), CodecError> {
        validate_descriptions("input", &self.0)
    }

    /// Parse one CX request body, sending required-aspect elements to the
    /// service as they decode.
    ///
    /// In singleton mode the body is a single bare network; otherwise it
    /// is an array of networks matching the config's order.
    ///
    /// # Errors
    ///
    /// Returns the first decoding or stream error. Elements already sent
    /// are not rolled back; the service observes a truncated sequence.
    pub fn parse<R: Read>(
        &self,
        reader: R,
        send: &SendHandle,
        singleton: bool,
    ) -> Result<(), CodecError> {
        let mut parser = Parser::new(reader, send.clone());
        if singleton {
            let network = self.0.first().ok_or_else(|| CodecError::InvalidConfig {
                reason: "must have at least one input network".to_string(),
            })?;
            parser.network(&network.label, &network.aspects)
        } else {
            parser.stream(&self.0)
        }
    }
}

/// What an aspect fragment turned out to be.
enum AspectOutcome {
    /// A regular fragment, parsed or skipped.
    Handled,
    /// A second `metaData` key: nothing further is parsed in this network.
    PostMetadata,
}

struct Parser<R: Read> {
    tokens: Tokenizer<BufReader<R>>,
    send: SendHandle,
    scratch: Vec<u8>,
}

impl<R: Read> Parser<R> {
    fn new(reader: R, send: SendHandle) -> Self {
        Parser {
            tokens: Tokenizer::new(BufReader::new(reader)),
            send,
            scratch: Vec::new(),
        }
    }

    /// Parse a multi-network stream: `[` network (`,` network)* `]`.
    fn stream(&mut self, networks: &[NetworkDescription]) -> Result<(), CodecError> {
        self.bracket('[', "an opening bracket of a CX stream")?;
        for (position, network) in networks.iter().enumerate() {
            self.network(&network.label, &network.aspects)
                .map_err(|source| CodecError::Network {
                    label: network.label.clone(),
                    position,
                    source: Box::new(source),
                })?;
        }
        self.bracket(']', "a closing bracket of a CX stream")?;
        Ok(())
    }

    /// Parse one network, streaming its required aspects to the service.
    fn network(&mut self, label: &str, aspects: &[String]) -> Result<(), CodecError> {
        tracing::debug!(label, ?aspects, "parsing network");
        self.bracket('[', "an opening bracket of a CX encoded network")?;
        self.number_verification()?;
        self.pre_metadata(aspects)?;
        while self.more()? {
            if let AspectOutcome::PostMetadata = self.aspect(label, aspects)? {
                tracing::debug!(label, "post-metadata encountered, skipping remaining aspects");
                self.finish_network()?;
                break;
            }
        }
        self.bracket(']', "a closing bracket of a CX encoded network")?;
        Ok(())
    }

    /// Decode the `numberVerification` aspect and check the long number.
    fn number_verification(&mut self) -> Result<(), CodecError> {
        let aspect: HashMap<String, Vec<NumberVerification>> =
            self.value("the CX numberVerification aspect")?;
        let records = aspect
            .get("numberVerification")
            .ok_or(CodecError::MissingKey {
                key: "numberVerification",
                context: "the numberVerification aspect",
            })?;
        if records.len() != 1 {
            return Err(CodecError::VerificationCount {
                count: records.len(),
            });
        }
        if records[0].long_number != LONG_NUMBER {
            return Err(CodecError::LongNumberMismatch {
                expected: LONG_NUMBER,
                found: records[0].long_number,
            });
        }
        Ok(())
    }

    /// Decode the pre-metadata aspect and check every required aspect is
    /// declared in it.
    fn pre_metadata(&mut self, aspects: &[String]) -> Result<(), CodecError> {
        let aspect: HashMap<String, Vec<Metadata>> = self.value("the CX pre-metadata aspect")?;
        let records = aspect.get("metaData").ok_or(CodecError::MissingKey {
            key: "metaData",
            context: "the pre-metadata aspect",
        })?;
        let missing: Vec<String> = aspects
            .iter()
            .filter(|required| !records.iter().any(|record| &record.name == *required))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(CodecError::MissingAspects { missing });
        }
        Ok(())
    }

    /// Parse one aspect fragment: decode its elements if the aspect is
    /// required, skip them structurally otherwise.
    fn aspect(&mut self, label: &str, aspects: &[String]) -> Result<AspectOutcome, CodecError> {
        self.bracket('{', "an opening bracket of an aspect fragment")?;
        let aspect = self.key("an aspect identifier")?;
        if aspect == "metaData" {
            return Ok(AspectOutcome::PostMetadata);
        }
        let required = aspects.iter().any(|required| *required == aspect);
        tracing::debug!(label, aspect, required, "parsing aspect");
        self.bracket(
            '[',
            &format!("an opening bracket for a list of {aspect} aspect elements"),
        )?;
        while self.more()? {
            if required {
                self.element(label, &aspect)?;
            } else {
                self.opaque(&aspect)?;
            }
        }
        self.bracket(
            ']',
            &format!("a closing bracket of an aspect element list containing {aspect} aspect elements"),
        )?;
        self.bracket(
            '}',
            &format!("a closing bracket of an aspect fragment of type {aspect}"),
        )?;
        Ok(AspectOutcome::Handled)
    }

    /// Consume the rest of a network after post-metadata: the metadata
    /// records, the fragment's closing bracket, and any further aspect
    /// fragments, all discarded.
    fn finish_network(&mut self) -> Result<(), CodecError> {
        self.tokens
            .skip_value()
            .map_err(|e| CodecError::token("the post-metadata records", e))?;
        self.bracket('}', "a closing bracket of the post-metadata aspect")?;
        while self.more()? {
            self.tokens
                .skip_value()
                .map_err(|e| CodecError::token("an aspect fragment after the post-metadata", e))?;
        }
        Ok(())
    }

    /// Decode one required-aspect element and send it synchronously.
    fn element(&mut self, label: &str, aspect: &str) -> Result<(), CodecError> {
        self.scratch.clear();
        self.tokens
            .read_raw_value(&mut self.scratch)
            .map_err(|e| CodecError::token(format!("a {aspect} aspect element"), e))?;
        let element = element_from_json(aspect, &self.scratch)?;
        send_element(&self.send, NetworkElement::new(label, element))?;
        Ok(())
    }

    /// Discard one opaque aspect element of any value form.
    fn opaque(&mut self, aspect: &str) -> Result<(), CodecError> {
        self.tokens
            .skip_value()
            .map_err(|e| CodecError::token(format!("an opaque {aspect} aspect element"), e))
    }

    fn more(&mut self) -> Result<bool, CodecError> {
        self.tokens
            .more()
            .map_err(|e| CodecError::token("the next aspect boundary", e))
    }

    fn bracket(&mut self, expected: char, description: &str) -> Result<(), CodecError> {
        let token = self
            .tokens
            .next_token()
            .map_err(|e| CodecError::token(description, e))?;
        let matched = matches!(
            (expected, &token),
            ('[', Token::ArrayOpen)
                | (']', Token::ArrayClose)
                | ('{', Token::ObjectOpen)
                | ('}', Token::ObjectClose)
        );
        if !matched {
            return Err(CodecError::UnexpectedToken {
                description: format!("bracket {expected:?}, {description}"),
                found: token.describe(),
            });
        }
        Ok(())
    }

    fn key(&mut self, description: &str) -> Result<String, CodecError> {
        let token = self
            .tokens
            .next_token()
            .map_err(|e| CodecError::token(description, e))?;
        match token {
            Token::Str(name) => Ok(name),
            other => Err(CodecError::UnexpectedToken {
                description: description.to_string(),
                found: other.describe(),
            }),
        }
    }

    fn value<T: DeserializeOwned>(&mut self, description: &str) -> Result<T, CodecError> {
        self.scratch.clear();
        self.tokens
            .read_raw_value(&mut self.scratch)
            .map_err(|e| CodecError::token(description, e))?;
        serde_json::from_slice(&self.scratch).map_err(|e| CodecError::decode(description, e))
    }
}
