//! The streaming CX generator.
//!
//! Consumes element messages from the receive channel and writes a CX
//! document straight to the underlying writer, grouping runs of
//! like-aspect, like-label elements into aspect fragments. There is no
//! intermediate buffer. Every opening delimiter is recorded on the
//! bracket stack, and the remaining closers are drained on every exit
//! path so a truncated document still parses as JSON.

use std::io::Write;

use serde::Serialize;

use crate::brackets::BracketStack;
use crate::descriptor::{validate_descriptions, NetworkDescription};
use crate::element::element_to_json;
use crate::error::CodecError;
use crate::message::ReceiveHandle;
use crate::parser::{Metadata, NumberVerification, LONG_NUMBER};
use crate::source::ElementSource;

#[derive(Serialize)]
struct NumberVerificationAspect {
    #[serde(rename = "numberVerification")]
    number_verification: [NumberVerification; 1],
}

#[derive(Serialize)]
struct PreMetadataAspect {
    #[serde(rename = "metaData")]
    meta_data: Vec<Metadata>,
}

/// Ordered descriptions of the networks the response will contain.
#[derive(Debug, Clone, Default, Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct GeneratorConfig(pub Vec<NetworkDescription>);

impl GeneratorConfig {
    /// Validate labels and aspect lists.
    pub fn validate(&self) -> Result<(), CodecError> {
        validate_descriptions("output", &self.0)
    }

    /// Generate one CX response body from the receive channel.
    ///
    /// Blocks until the first element arrives. In singleton mode a single
    /// bare network is written; otherwise the configured networks are
    /// wrapped in an outer array.
    ///
    /// # Errors
    ///
    /// Returns the first stream or write error. The bracket drain has
    /// already run by then, so whatever was written parses as JSON.
    pub fn generate<W: Write>(
        &self,
        writer: &mut W,
        recv: ReceiveHandle,
        singleton: bool,
    ) -> Result<(), CodecError> {
        tracing::debug!("generator initializing");
        let source = ElementSource::new(recv)?;
        let mut generator = Generator {
            writer,
            source,
            brackets: BracketStack::new(),
        };
        let result = if singleton {
            match self.0.first() {
                Some(network) => generator.network(&network.label, &network.aspects),
                None => Err(CodecError::InvalidConfig {
                    reason: "must have at least one output network".to_string(),
                }),
            }
        } else {
            generator.stream(&self.0)
        };
        // A mid-stream receive failure halts the grouping loops without
        // passing through pop(); surface it instead of reporting a clean
        // finish over a truncated document.
        let result = result.and_then(|()| match generator.source.terminal_error() {
            Some(error) if *error != crate::error::StreamError::EndOfStream => {
                Err(error.clone().into())
            }
            _ => Ok(()),
        });
        let drained = generator.close_remaining_brackets();
        result.and(drained)
    }
}

struct Generator<'a, W: Write> {
    writer: &'a mut W,
    source: ElementSource,
    brackets: BracketStack,
}

impl<W: Write> Generator<'_, W> {
    /// Generate a multi-network stream wrapped in an outer array.
    fn stream(&mut self, networks: &[NetworkDescription]) -> Result<(), CodecError> {
        tracing::debug!("generating a stream of networks");
        self.open_brackets("[")?;
        for (position, network) in networks.iter().enumerate() {
            if position >= 1 {
                self.rune(',')?;
            }
            self.network(&network.label, &network.aspects)
                .map_err(|source| CodecError::Network {
                    label: network.label.clone(),
                    position,
                    source: Box::new(source),
                })?;
        }
        self.close_brackets("]")?;
        Ok(())
    }

    /// Generate a single network: verification, pre-metadata, then one
    /// aspect fragment per run of like-aspect elements for this label.
    fn network(&mut self, label: &str, aspects: &[String]) -> Result<(), CodecError> {
        tracing::debug!(label, ?aspects, "generating network");
        self.open_brackets("[")?;
        self.number_verification()?;
        self.rune(',')?;
        self.pre_metadata(aspects)?;
        while self.source.has_next() {
            if self.source.peek_network() != Some(label) {
                break;
            }
            let aspect = match self.source.peek_aspect() {
                Some(aspect) => aspect.to_string(),
                None => break,
            };
            self.rune(',')?;
            self.aspect(label, &aspect)?;
        }
        self.close_brackets("]")?;
        Ok(())
    }

    fn number_verification(&mut self) -> Result<(), CodecError> {
        self.value(&NumberVerificationAspect {
            number_verification: [NumberVerification {
                long_number: LONG_NUMBER,
            }],
        })
    }

    /// Write the pre-metadata fragment declaring this network's aspects.
    fn pre_metadata(&mut self, aspects: &[String]) -> Result<(), CodecError> {
        let records = aspects
            .iter()
            .map(|name| Metadata {
                name: name.clone(),
                ..Default::default()
            })
            .collect();
        self.value(&PreMetadataAspect { meta_data: records })
    }

    /// Write one aspect fragment, draining elements while the source's
    /// next element keeps the same aspect and label.
    fn aspect(&mut self, label: &str, aspect: &str) -> Result<(), CodecError> {
        tracing::debug!(label, aspect, "generating aspect");
        self.open_brackets("{")?;
        self.text(&format!("\"{aspect}\":"))?;
        self.open_brackets("[")?;
        let mut written = 0usize;
        while self.source.has_next() {
            if self.source.peek_aspect() != Some(aspect) || self.source.peek_network() != Some(label)
            {
                break;
            }
            let element = self.source.pop()?;
            if written != 0 {
                self.rune(',')?;
            }
            element_to_json(self.writer, &element)?;
            written += 1;
        }
        self.close_brackets("]}")?;
        Ok(())
    }

    /// Write a JSON-encoded value.
    fn value<T: Serialize>(&mut self, value: &T) -> Result<(), CodecError> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| CodecError::decode("a generated JSON value", e))?;
        self.writer.write_all(&bytes)?;
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), CodecError> {
        self.writer.write_all(text.as_bytes())?;
        Ok(())
    }

    fn rune(&mut self, rune: char) -> Result<(), CodecError> {
        let mut buf = [0u8; 4];
        self.writer.write_all(rune.encode_utf8(&mut buf).as_bytes())?;
        Ok(())
    }

    /// Record and emit each opening delimiter in `brackets`.
    fn open_brackets(&mut self, brackets: &str) -> Result<(), CodecError> {
        for bracket in brackets.chars() {
            self.brackets.push_open(bracket)?;
            self.rune(bracket)?;
        }
        Ok(())
    }

    /// Pop and emit each closing delimiter in `brackets`, verifying it
    /// matches what was recorded.
    fn close_brackets(&mut self, brackets: &str) -> Result<(), CodecError> {
        for bracket in brackets.chars() {
            match self.brackets.pop_close() {
                None => return Err(CodecError::BracketUnderflow { expected: bracket }),
                Some(recorded) if recorded != bracket => {
                    return Err(CodecError::BracketMismatch {
                        expected: recorded,
                        found: bracket,
                    })
                }
                Some(_) => self.rune(bracket)?,
            }
        }
        Ok(())
    }

    /// Drain whatever is still open so the document parses. Runs on every
    /// exit path, success or error.
    fn close_remaining_brackets(&mut self) -> Result<(), CodecError> {
        while let Some(bracket) = self.brackets.pop_close() {
            self.rune(bracket)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Element, NetworkElement, Node};
    use crate::error::StreamError;
    use crate::message::InboundMessage;
    use tokio::sync::mpsc;

    fn node(label: &str, id: i64, name: &str) -> InboundMessage {
        Ok(NetworkElement::new(
            label,
            Element::Node(Node {
                id,
                name: name.to_string(),
                ..Default::default()
            }),
        ))
    }

    fn description(label: &str, aspects: &[&str]) -> NetworkDescription {
        NetworkDescription {
            label: label.to_string(),
            description: String::new(),
            aspects: aspects.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn run_generator(
        config: &GeneratorConfig,
        messages: Vec<InboundMessage>,
        close: bool,
        singleton: bool,
    ) -> (Vec<u8>, Result<(), CodecError>) {
        let (tx, rx) = mpsc::channel(messages.len().max(1));
        for message in messages {
            tx.blocking_send(message).unwrap();
        }
        if close {
            drop(tx);
        } else {
            // Leak the sender so the channel stays open; the generator
            // must stop on its own grouping rules, not on EOF.
            std::mem::forget(tx);
        }
        let mut out = Vec::new();
        let result = config.generate(&mut out, rx, singleton);
        (out, result)
    }

    #[test]
    fn test_singleton_network_output() {
        let config = GeneratorConfig(vec![description("X", &["nodes"])]);
        let (out, result) = run_generator(
            &config,
            vec![node("X", 1, "a"), node("X", 2, "b")],
            true,
            true,
        );
        result.unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            concat!(
                r#"[{"numberVerification":[{"longNumber":281474976710655}]},"#,
                r#"{"metaData":[{"name":"nodes"}]},"#,
                r#"{"nodes":[{"@id":"1","n":"a"},{"@id":"2","n":"b"}]}]"#
            )
        );
    }

    #[test]
    fn test_stream_wraps_networks_in_outer_array() {
        let config = GeneratorConfig(vec![description("X", &["nodes"])]);
        let (out, result) = run_generator(&config, vec![node("X", 1, "a")], true, false);
        result.unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            concat!(
                r#"[[{"numberVerification":[{"longNumber":281474976710655}]},"#,
                r#"{"metaData":[{"name":"nodes"}]},"#,
                r#"{"nodes":[{"@id":"1","n":"a"}]}]]"#
            )
        );
    }

    #[test]
    fn test_multiple_networks_are_comma_separated() {
        let config = GeneratorConfig(vec![
            description("A", &["nodes"]),
            description("B", &["nodes"]),
            description("C", &["nodes"]),
        ]);
        let (out, result) = run_generator(
            &config,
            vec![node("A", 1, "a"), node("B", 2, "b"), node("C", 3, "c")],
            true,
            false,
        );
        result.unwrap();
        let text = String::from_utf8(out).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_aspect_runs_are_grouped_separately() {
        // The same aspect arriving in two runs yields two fragments,
        // which is valid CX.
        let edge = Ok(NetworkElement::new(
            "X",
            Element::Edge(crate::element::Edge {
                id: 9,
                source: 1,
                target: 2,
                ..Default::default()
            }),
        ));
        let config = GeneratorConfig(vec![description("X", &["nodes", "edges"])]);
        let (out, result) = run_generator(
            &config,
            vec![node("X", 1, "a"), edge, node("X", 2, "b")],
            true,
            true,
        );
        result.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(r#"{"nodes":[{"@id":"1","n":"a"}]}"#));
        assert!(text.contains(r#"{"edges":[{"@id":"9","s":"1","t":"2"}]}"#));
        assert!(text.contains(r#"{"nodes":[{"@id":"2","n":"b"}]}"#));
    }

    #[test]
    fn test_network_stops_at_foreign_label() {
        let config = GeneratorConfig(vec![description("X", &["nodes"])]);
        let (out, result) = run_generator(
            &config,
            vec![node("X", 1, "a"), node("Y", 2, "b")],
            false,
            true,
        );
        result.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(r#"{"nodes":[{"@id":"1","n":"a"}]}"#));
        assert!(!text.contains("\"@id\":\"2\""));
    }

    #[test]
    fn test_error_message_still_yields_valid_json() {
        let config = GeneratorConfig(vec![description("X", &["nodes"])]);
        let (out, result) = run_generator(
            &config,
            vec![
                node("X", 1, "a"),
                Err(StreamError::Transport("lost the service".to_string())),
            ],
            true,
            true,
        );
        let err = result.unwrap_err();
        assert!(err.to_string().contains("lost the service"));
        let text = String::from_utf8(out).unwrap();
        serde_json::from_str::<serde_json::Value>(&text)
            .expect("truncated output must still parse");
    }

    #[test]
    fn test_empty_stream_is_an_error_with_no_output() {
        let config = GeneratorConfig(vec![description("X", &["nodes"])]);
        let (out, result) = run_generator(&config, Vec::new(), true, true);
        assert!(result.is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn test_validate_rejects_duplicate_labels() {
        let config = GeneratorConfig(vec![
            description("same", &["nodes"]),
            description("same", &["edges"]),
        ]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_missing_label() {
        let config = GeneratorConfig(vec![description("", &["nodes"])]);
        assert!(config.validate().is_err());
    }
}
