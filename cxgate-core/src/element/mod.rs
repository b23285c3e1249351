//! The network element data model.
//!
//! One `NetworkElement` is the unit of flow through the whole adapter: the
//! parser produces them from CX JSON, the gRPC stream carries them in both
//! directions, and the generator serialises them back into CX JSON. The
//! same structs therefore derive both `prost::Message` (wire) and serde
//! (CX JSON, following the proto3 JSON mapping — see [`json`]).
//!
//! Every element variant maps to exactly one aspect name through
//! [`Element::aspect`]; the decoding table in [`element_from_json`] and the
//! encoding table in [`element_to_json`] dispatch on the same mapping.

pub(crate) mod json;

use std::io::Write;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::CodecError;
use json::{int64_value, is_zero_f64, is_zero_i64};

/// A single node of a network.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Node {
    #[prost(int64, tag = "1")]
    #[serde(rename = "@id", with = "int64_value", skip_serializing_if = "is_zero_i64")]
    pub id: i64,
    #[prost(string, tag = "2")]
    #[serde(rename = "n", skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[prost(string, tag = "3")]
    #[serde(rename = "r", skip_serializing_if = "String::is_empty")]
    pub represents: String,
}

/// A directed connection between two nodes.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Edge {
    #[prost(int64, tag = "1")]
    #[serde(rename = "@id", with = "int64_value", skip_serializing_if = "is_zero_i64")]
    pub id: i64,
    #[prost(int64, tag = "2")]
    #[serde(rename = "s", with = "int64_value", skip_serializing_if = "is_zero_i64")]
    pub source: i64,
    #[prost(int64, tag = "3")]
    #[serde(rename = "t", with = "int64_value", skip_serializing_if = "is_zero_i64")]
    pub target: i64,
    #[prost(string, tag = "4")]
    #[serde(rename = "i", skip_serializing_if = "String::is_empty")]
    pub interaction: String,
}

/// A key/value attribute attached to a node.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeAttribute {
    #[prost(int64, tag = "1")]
    #[serde(rename = "po", with = "int64_value", skip_serializing_if = "is_zero_i64")]
    pub property_of: i64,
    #[prost(string, tag = "2")]
    #[serde(rename = "n", skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[prost(string, tag = "3")]
    #[serde(rename = "v", skip_serializing_if = "String::is_empty")]
    pub value: String,
    #[prost(string, tag = "4")]
    #[serde(rename = "d", skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[prost(int64, tag = "5")]
    #[serde(rename = "s", with = "int64_value", skip_serializing_if = "is_zero_i64")]
    pub subnetwork: i64,
}

/// A key/value attribute attached to an edge.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EdgeAttribute {
    #[prost(int64, tag = "1")]
    #[serde(rename = "po", with = "int64_value", skip_serializing_if = "is_zero_i64")]
    pub property_of: i64,
    #[prost(string, tag = "2")]
    #[serde(rename = "n", skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[prost(string, tag = "3")]
    #[serde(rename = "v", skip_serializing_if = "String::is_empty")]
    pub value: String,
    #[prost(string, tag = "4")]
    #[serde(rename = "d", skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[prost(int64, tag = "5")]
    #[serde(rename = "s", with = "int64_value", skip_serializing_if = "is_zero_i64")]
    pub subnetwork: i64,
}

/// A key/value attribute attached to the network itself.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkAttribute {
    #[prost(string, tag = "1")]
    #[serde(rename = "n", skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[prost(string, tag = "2")]
    #[serde(rename = "v", skip_serializing_if = "String::is_empty")]
    pub value: String,
    #[prost(string, tag = "3")]
    #[serde(rename = "d", skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[prost(int64, tag = "4")]
    #[serde(rename = "s", with = "int64_value", skip_serializing_if = "is_zero_i64")]
    pub subnetwork: i64,
}

/// A node's position in a layout.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CartesianCoordinate {
    #[prost(int64, tag = "1")]
    #[serde(rename = "node", with = "int64_value", skip_serializing_if = "is_zero_i64")]
    pub node: i64,
    #[prost(double, tag = "2")]
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub x: f64,
    #[prost(double, tag = "3")]
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub y: f64,
    #[prost(double, tag = "4")]
    #[serde(skip_serializing_if = "is_zero_f64")]
    pub z: f64,
    #[prost(int64, tag = "5")]
    #[serde(rename = "view", with = "int64_value", skip_serializing_if = "is_zero_i64")]
    pub view: i64,
}

/// A typed key/value pair sent to the service ahead of the network stream.
#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
pub struct Parameter {
    #[prost(string, tag = "1")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[prost(string, tag = "2")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub format: String,
    #[prost(oneof = "parameter::Value", tags = "3, 4, 5, 6")]
    #[serde(flatten)]
    pub value: Option<parameter::Value>,
}

pub mod parameter {
    use super::*;

    /// The typed payload of a [`Parameter`].
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Value {
        #[prost(string, tag = "3")]
        StringValue(String),
        #[prost(double, tag = "4")]
        NumberValue(f64),
        #[prost(bool, tag = "5")]
        BooleanValue(bool),
        #[prost(int64, tag = "6")]
        IntegerValue(i64),
    }

    // Emitted with the oneof field's JSON name as the key, the way the
    // proto3 JSON mapping renders a set oneof; int64 payloads become
    // strings like every other 64-bit integer.
    impl Serialize for Value {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            let mut map = serializer.serialize_map(Some(1))?;
            match self {
                Value::StringValue(v) => map.serialize_entry("stringValue", v)?,
                Value::NumberValue(v) => map.serialize_entry("numberValue", v)?,
                Value::BooleanValue(v) => map.serialize_entry("booleanValue", v)?,
                Value::IntegerValue(v) => map.serialize_entry("integerValue", &v.to_string())?,
            }
            map.end()
        }
    }
}

/// An error record a service may stream back in place of results.
#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
pub struct Error {
    #[prost(int64, tag = "1")]
    #[serde(with = "int64_value", skip_serializing_if = "is_zero_i64")]
    pub status: i64,
    #[prost(string, tag = "2")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub code: String,
    #[prost(string, tag = "3")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[prost(string, tag = "4")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub link: String,
}

/// One element tagged with the logical network it belongs to.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NetworkElement {
    /// Which network in a multi-network stream this element belongs to.
    #[prost(string, tag = "1")]
    pub label: String,
    #[prost(oneof = "Element", tags = "2, 3, 4, 5, 6, 7, 8, 9")]
    pub element: Option<Element>,
}

/// The tagged union of element variants.
#[derive(Clone, PartialEq, ::prost::Oneof)]
pub enum Element {
    #[prost(message, tag = "2")]
    Node(Node),
    #[prost(message, tag = "3")]
    Edge(Edge),
    #[prost(message, tag = "4")]
    NodeAttribute(NodeAttribute),
    #[prost(message, tag = "5")]
    EdgeAttribute(EdgeAttribute),
    #[prost(message, tag = "6")]
    NetworkAttribute(NetworkAttribute),
    #[prost(message, tag = "7")]
    CartesianCoordinate(CartesianCoordinate),
    #[prost(message, tag = "8")]
    Parameter(Parameter),
    #[prost(message, tag = "9")]
    Error(Error),
}

impl Element {
    /// The aspect name this element variant belongs to.
    pub fn aspect(&self) -> &'static str {
        match self {
            Element::Node(_) => "nodes",
            Element::Edge(_) => "edges",
            Element::NodeAttribute(_) => "nodeAttributes",
            Element::EdgeAttribute(_) => "edgeAttributes",
            Element::NetworkAttribute(_) => "networkAttributes",
            Element::CartesianCoordinate(_) => "cartesianLayout",
            Element::Parameter(_) => "parameters",
            Element::Error(_) => "error",
        }
    }
}

impl NetworkElement {
    /// Build an element tagged with its network label.
    pub fn new(label: impl Into<String>, element: Element) -> Self {
        NetworkElement {
            label: label.into(),
            element: Some(element),
        }
    }

    /// The aspect name of the carried element, or `"unknown"` for a
    /// message without a variant.
    pub fn aspect(&self) -> &'static str {
        match &self.element {
            Some(element) => element.aspect(),
            None => "unknown",
        }
    }
}

/// Decode one aspect element from its CX JSON representation.
///
/// The dispatch table covers every aspect the parser can be asked to
/// decode; asking for any other aspect is a configuration-level mistake
/// and yields [`CodecError::UnknownAspect`].
pub fn element_from_json(aspect: &str, raw: &[u8]) -> Result<Element, CodecError> {
    let element = match aspect {
        "nodes" => Element::Node(decode(aspect, raw)?),
        "edges" => Element::Edge(decode(aspect, raw)?),
        "nodeAttributes" => Element::NodeAttribute(decode(aspect, raw)?),
        "edgeAttributes" => Element::EdgeAttribute(decode(aspect, raw)?),
        "networkAttributes" => Element::NetworkAttribute(decode(aspect, raw)?),
        "cartesianLayout" => Element::CartesianCoordinate(decode(aspect, raw)?),
        _ => {
            return Err(CodecError::UnknownAspect {
                aspect: aspect.to_string(),
            })
        }
    };
    Ok(element)
}

fn decode<'de, T: Deserialize<'de>>(aspect: &str, raw: &'de [u8]) -> Result<T, CodecError> {
    serde_json::from_slice(raw)
        .map_err(|e| CodecError::decode(format!("a {aspect} aspect element"), e))
}

/// Serialise one element into its CX JSON representation.
pub fn element_to_json<W: Write>(
    writer: &mut W,
    element: &NetworkElement,
) -> Result<(), CodecError> {
    let encoded = match &element.element {
        Some(Element::Node(e)) => serde_json::to_vec(e),
        Some(Element::Edge(e)) => serde_json::to_vec(e),
        Some(Element::NodeAttribute(e)) => serde_json::to_vec(e),
        Some(Element::EdgeAttribute(e)) => serde_json::to_vec(e),
        Some(Element::NetworkAttribute(e)) => serde_json::to_vec(e),
        Some(Element::CartesianCoordinate(e)) => serde_json::to_vec(e),
        Some(Element::Parameter(e)) => serde_json::to_vec(e),
        Some(Element::Error(e)) => serde_json::to_vec(e),
        None => {
            return Err(CodecError::EmptyElement {
                label: element.label.clone(),
            })
        }
    };
    let bytes =
        encoded.map_err(|e| CodecError::decode(format!("a {} element", element.aspect()), e))?;
    writer.write_all(&bytes)?;
    Ok(())
}
