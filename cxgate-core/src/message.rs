//! The element message protocol on the per-request channels.
//!
//! Two channels exist per request. The send channel carries elements from
//! the codec side to the transport sender together with a single-use reply
//! channel; producers block on the reply before producing the next
//! element, which gives synchronous back-pressure and surfaces transport
//! failures at the exact element that failed. The receive channel carries
//! elements (or one terminal error) from the transport receiver to the
//! generator; closing it signals the clean end of the service's stream.
//!
//! The producer/consumer helpers here are blocking on purpose: the parser
//! and generator are synchronous stream code driven on blocking tasks,
//! while the transport loops on the other end of the channels are async.

use tokio::sync::{mpsc, oneshot};

use crate::element::NetworkElement;
use crate::error::StreamError;

/// An element on its way to the service, with the reply channel the
/// transport sender answers through.
#[derive(Debug)]
pub struct OutboundMessage {
    pub element: NetworkElement,
    /// Answered with the transport's verdict for this element. Dropping
    /// the sender without answering counts as success, mirroring a reply
    /// channel that is closed without carrying an error.
    pub reply: oneshot::Sender<Result<(), StreamError>>,
}

/// An element arriving from the service, or the terminal error of the
/// receive direction.
pub type InboundMessage = Result<NetworkElement, StreamError>;

/// The producer handle for the send channel.
pub type SendHandle = mpsc::Sender<OutboundMessage>;

/// The consumer handle for the receive channel.
pub type ReceiveHandle = mpsc::Receiver<InboundMessage>;

/// Capacity of the per-request channels. One slot keeps the hand-off as
/// close to a rendezvous as a bounded channel allows; the reply protocol
/// provides the actual element-level synchronisation.
pub const CHANNEL_CAPACITY: usize = 1;

/// Hand one element to the transport sender and block until its verdict
/// arrives.
///
/// # Errors
///
/// Returns [`StreamError::ChannelClosed`] if the sender loop is gone, or
/// the transport's error for this element.
pub fn send_element(chan: &SendHandle, element: NetworkElement) -> Result<(), StreamError> {
    let (reply, verdict) = oneshot::channel();
    chan.blocking_send(OutboundMessage { element, reply })
        .map_err(|_| StreamError::ChannelClosed)?;
    match verdict.blocking_recv() {
        Ok(Ok(())) | Err(_) => Ok(()),
        Ok(Err(error)) => Err(error),
    }
}

/// Block until the next element arrives from the service.
///
/// # Errors
///
/// Returns [`StreamError::EndOfStream`] once the receive channel closes,
/// or the terminal error the transport receiver forwarded.
pub fn receive_element(chan: &mut ReceiveHandle) -> Result<NetworkElement, StreamError> {
    match chan.blocking_recv() {
        Some(Ok(element)) => Ok(element),
        Some(Err(error)) => Err(error),
        None => Err(StreamError::EndOfStream),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Element, Node};

    fn node(label: &str, id: i64) -> NetworkElement {
        NetworkElement::new(
            label,
            Element::Node(Node {
                id,
                ..Default::default()
            }),
        )
    }

    #[test]
    fn test_send_element_success_on_reply() {
        let (tx, mut rx) = mpsc::channel::<OutboundMessage>(1);
        let consumer = std::thread::spawn(move || {
            let message = rx.blocking_recv().unwrap();
            message.reply.send(Ok(())).unwrap();
        });
        assert!(send_element(&tx, node("net", 1)).is_ok());
        consumer.join().unwrap();
    }

    #[test]
    fn test_send_element_success_on_dropped_reply() {
        let (tx, mut rx) = mpsc::channel::<OutboundMessage>(1);
        let consumer = std::thread::spawn(move || {
            let message = rx.blocking_recv().unwrap();
            drop(message.reply);
        });
        assert!(send_element(&tx, node("net", 1)).is_ok());
        consumer.join().unwrap();
    }

    #[test]
    fn test_send_element_surfaces_transport_error() {
        let (tx, mut rx) = mpsc::channel::<OutboundMessage>(1);
        let consumer = std::thread::spawn(move || {
            let message = rx.blocking_recv().unwrap();
            message
                .reply
                .send(Err(StreamError::Transport("boom".to_string())))
                .unwrap();
        });
        let err = send_element(&tx, node("net", 1)).unwrap_err();
        assert_eq!(err, StreamError::Transport("boom".to_string()));
        consumer.join().unwrap();
    }

    #[test]
    fn test_send_element_on_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let err = send_element(&tx, node("net", 1)).unwrap_err();
        assert_eq!(err, StreamError::ChannelClosed);
    }

    #[test]
    fn test_receive_element_order_and_eof() {
        let (tx, mut rx) = mpsc::channel(2);
        tx.blocking_send(Ok(node("net", 1))).unwrap();
        tx.blocking_send(Ok(node("net", 2))).unwrap();
        drop(tx);
        assert_eq!(receive_element(&mut rx).unwrap().label, "net");
        assert_eq!(receive_element(&mut rx).unwrap().label, "net");
        assert_eq!(
            receive_element(&mut rx).unwrap_err(),
            StreamError::EndOfStream
        );
    }

    #[test]
    fn test_receive_element_terminal_error() {
        let (tx, mut rx) = mpsc::channel(1);
        tx.blocking_send(Err(StreamError::Transport("gone".to_string())))
            .unwrap();
        drop(tx);
        assert_eq!(
            receive_element(&mut rx).unwrap_err(),
            StreamError::Transport("gone".to_string())
        );
    }
}
