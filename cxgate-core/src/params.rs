//! Query-string parameter encoding.
//!
//! Each declared parameter is converted to a typed parameter element and
//! sent to the service ahead of the network stream: one element per query
//! value when the key is present, one element carrying the default when
//! it is not. Every send awaits the per-element verdict before the next
//! conversion, like the parser does.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::element::{parameter, Element, NetworkElement, Parameter};
use crate::error::CodecError;
use crate::message::{send_element, SendHandle};

/// Declares one parameter the service accepts.
///
/// `kind` names the JSON type of the value (`string`, `integer`,
/// `number`, `boolean`, or empty for string); `format` is a free-form
/// refinement for the service, such as `uint32` or `password`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterDef {
    pub name: String,
    pub default: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub format: String,
}

impl ParameterDef {
    /// Check the descriptor: name, default, and description present, the
    /// type recognised, and the default convertible under it.
    pub fn validate(&self) -> Result<(), CodecError> {
        if self.name.is_empty() {
            return Err(CodecError::InvalidConfig {
                reason: "parameter name is a required field".to_string(),
            });
        }
        if self.default.is_empty() {
            return Err(CodecError::InvalidConfig {
                reason: format!("parameter {}: default is a required field", self.name),
            });
        }
        if self.description.is_empty() {
            return Err(CodecError::InvalidConfig {
                reason: format!("parameter {}: description is a required field", self.name),
            });
        }
        const ACCEPTED: [&str; 4] = ["integer", "number", "boolean", "string"];
        if !self.kind.is_empty() && !ACCEPTED.contains(&self.kind.as_str()) {
            return Err(CodecError::InvalidConfig {
                reason: format!(
                    "parameter {}: expected type to be one of {ACCEPTED:?} found {}",
                    self.name, self.kind
                ),
            });
        }
        self.convert(&self.default).map_err(|e| CodecError::InvalidConfig {
            reason: format!(
                "parameter {}: default value must be convertible to the specified type: {e}",
                self.name
            ),
        })?;
        Ok(())
    }

    /// Convert one raw value under the declared type.
    fn convert(&self, value: &str) -> Result<Parameter, CodecError> {
        let converted = match self.kind.as_str() {
            "number" => value
                .parse::<f64>()
                .ok()
                .map(parameter::Value::NumberValue),
            "boolean" => parse_bool(value).map(parameter::Value::BooleanValue),
            "integer" => value
                .parse::<i64>()
                .ok()
                .map(parameter::Value::IntegerValue),
            _ => Some(parameter::Value::StringValue(value.to_string())),
        };
        match converted {
            Some(payload) => Ok(Parameter {
                name: self.name.clone(),
                format: self.format.clone(),
                value: Some(payload),
            }),
            None => Err(CodecError::ParameterConversion {
                name: self.name.clone(),
                value: value.to_string(),
                kind: self.kind.clone(),
            }),
        }
    }

    /// Convert and send one value, blocking on the per-element verdict.
    fn send(&self, send: &SendHandle, value: &str) -> Result<(), CodecError> {
        let parameter = self.convert(value)?;
        send_element(
            send,
            NetworkElement {
                label: String::new(),
                element: Some(Element::Parameter(parameter)),
            },
        )?;
        Ok(())
    }
}

/// The parameters a service declares, in the order they are sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterConfig(pub Vec<ParameterDef>);

impl ParameterConfig {
    /// Validate every descriptor.
    pub fn validate(&self) -> Result<(), CodecError> {
        for parameter in &self.0 {
            parameter.validate()?;
        }
        Ok(())
    }

    /// Merge the query string into the declared parameters and send the
    /// resulting elements: query values when present, defaults when not.
    pub fn send(
        &self,
        send: &SendHandle,
        query: &HashMap<String, Vec<String>>,
    ) -> Result<(), CodecError> {
        for parameter in &self.0 {
            match query.get(&parameter.name) {
                Some(values) => {
                    for value in values {
                        parameter.send(send, value)?;
                    }
                }
                None => parameter.send(send, &parameter.default)?,
            }
        }
        Ok(())
    }
}

/// The boolean spellings accepted for parameter values.
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}
