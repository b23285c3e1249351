//! Property-based round-trip tests for the CX codec.
//!
//! Parsing a document and regenerating it from the resulting message
//! sequence must yield a document that parses back into the same
//! sequence. Aspect coverage is fixed to nodes and edges; everything
//! else the strategies generate is element content.

use proptest::prelude::*;
use tokio::sync::mpsc;

use cxgate_core::element::{element_to_json, Edge, Element, Node};
use cxgate_core::message::OutboundMessage;
use cxgate_core::{
    GeneratorConfig, NetworkDescription, NetworkElement, ParserConfig, LONG_NUMBER,
};

fn description(label: &str) -> NetworkDescription {
    NetworkDescription {
        label: label.to_string(),
        description: String::new(),
        aspects: vec!["nodes".to_string(), "edges".to_string()],
    }
}

/// Render one network document from typed elements.
fn render_network(nodes: &[Node], edges: &[Edge]) -> String {
    let mut doc = format!(
        "[{{\"numberVerification\":[{{\"longNumber\":{LONG_NUMBER}}}]}},\
         {{\"metaData\":[{{\"name\":\"nodes\"}},{{\"name\":\"edges\"}}]}}"
    );
    doc.push_str(",{\"nodes\":[");
    for (i, node) in nodes.iter().enumerate() {
        if i != 0 {
            doc.push(',');
        }
        let mut buf = Vec::new();
        element_to_json(&mut buf, &NetworkElement::new("X", Element::Node(node.clone())))
            .unwrap();
        doc.push_str(std::str::from_utf8(&buf).unwrap());
    }
    doc.push_str("]}");
    doc.push_str(",{\"edges\":[");
    for (i, edge) in edges.iter().enumerate() {
        if i != 0 {
            doc.push(',');
        }
        let mut buf = Vec::new();
        element_to_json(&mut buf, &NetworkElement::new("X", Element::Edge(edge.clone())))
            .unwrap();
        doc.push_str(std::str::from_utf8(&buf).unwrap());
    }
    doc.push_str("]}]");
    doc
}

/// Parse a singleton document and collect the emitted messages.
fn parse_to_messages(doc: &str) -> Vec<NetworkElement> {
    let config = ParserConfig(vec![description("X")]);
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(64);
    let sink = std::thread::spawn(move || {
        let mut seen = Vec::new();
        while let Some(message) = rx.blocking_recv() {
            seen.push(message.element);
            let _ = message.reply.send(Ok(()));
        }
        seen
    });
    config
        .parse(doc.as_bytes(), &tx, true)
        .expect("document must parse");
    drop(tx);
    sink.join().unwrap()
}

/// Regenerate a singleton document from a message sequence.
fn generate_from_messages(messages: Vec<NetworkElement>) -> String {
    let config = GeneratorConfig(vec![description("X")]);
    let (tx, rx) = mpsc::channel(messages.len().max(1));
    for message in messages {
        tx.blocking_send(Ok(message)).unwrap();
    }
    drop(tx);
    let mut out = Vec::new();
    config
        .generate(&mut out, rx, true)
        .expect("messages must generate");
    String::from_utf8(out).unwrap()
}

fn arb_node() -> impl Strategy<Value = Node> {
    (1i64..1000, "[a-z]{1,8}", "[a-z]{0,8}").prop_map(|(id, name, represents)| Node {
        id,
        name,
        represents,
    })
}

fn arb_edge() -> impl Strategy<Value = Edge> {
    (1i64..1000, 1i64..50, 1i64..50, "[a-z]{0,8}").prop_map(|(id, source, target, interaction)| {
        Edge {
            id,
            source,
            target,
            interaction,
        }
    })
}

proptest! {
    /// parse → generate → parse is the identity on message sequences.
    #[test]
    fn round_trip_preserves_message_sequence(
        nodes in prop::collection::vec(arb_node(), 1..8),
        edges in prop::collection::vec(arb_edge(), 0..8),
    ) {
        let document = render_network(&nodes, &edges);
        let first_pass = parse_to_messages(&document);
        prop_assert_eq!(first_pass.len(), nodes.len() + edges.len());

        let regenerated = generate_from_messages(first_pass.clone());
        let second_pass = parse_to_messages(&regenerated);
        prop_assert_eq!(first_pass, second_pass);
    }

    /// Generator output parses as JSON even when the stream dies mid-way.
    #[test]
    fn truncated_generation_is_valid_json(
        nodes in prop::collection::vec(arb_node(), 1..5),
    ) {
        let config = GeneratorConfig(vec![description("X")]);
        let (tx, rx) = mpsc::channel(nodes.len() + 1);
        for node in &nodes {
            tx.blocking_send(Ok(NetworkElement::new("X", Element::Node(node.clone()))))
                .unwrap();
        }
        tx.blocking_send(Err(cxgate_core::StreamError::Transport(
            "interrupted".to_string(),
        )))
        .unwrap();
        drop(tx);
        let mut out = Vec::new();
        let result = config.generate(&mut out, rx, true);
        prop_assert!(result.is_err());
        let text = String::from_utf8(out).unwrap();
        serde_json::from_str::<serde_json::Value>(&text).expect("output must parse");
    }
}
