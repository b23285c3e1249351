//! A one-element look-ahead over the receive channel.
//!
//! The generator needs to see the next element's aspect and network label
//! before deciding whether to keep extending the current aspect group,
//! start a new one, or close the current network. The source prefetches a
//! single element so both identifiers can be peeked without consuming it.

use crate::element::NetworkElement;
use crate::error::StreamError;
use crate::message::{receive_element, ReceiveHandle};

/// Look-ahead queue over the receive channel.
///
/// While no terminal error has been observed the prefetched element and
/// its cached aspect/label are available through the peek methods. Once
/// an error (including clean end-of-stream) arrives, peeks return `None`
/// and [`ElementSource::pop`] returns the stored error.
#[derive(Debug)]
pub struct ElementSource {
    recv: ReceiveHandle,
    current: Option<NetworkElement>,
    aspect: String,
    network: String,
    error: Option<StreamError>,
}

impl ElementSource {
    /// Create a source, blocking until the first element arrives.
    ///
    /// # Errors
    ///
    /// Returns the receive error if the first fetch fails, including
    /// [`StreamError::EndOfStream`] when the service sends nothing at all.
    pub fn new(recv: ReceiveHandle) -> Result<Self, StreamError> {
        let mut source = ElementSource {
            recv,
            current: None,
            aspect: String::new(),
            network: String::new(),
            error: None,
        };
        source.advance();
        match source.error {
            Some(ref error) => Err(error.clone()),
            None => Ok(source),
        }
    }

    /// True while a live element is available.
    pub fn has_next(&self) -> bool {
        self.error.is_none()
    }

    /// The prefetched element's aspect name, if one is available.
    pub fn peek_aspect(&self) -> Option<&str> {
        if self.error.is_some() {
            return None;
        }
        Some(&self.aspect)
    }

    /// The prefetched element's network label, if one is available.
    pub fn peek_network(&self) -> Option<&str> {
        if self.error.is_some() {
            return None;
        }
        Some(&self.network)
    }

    /// Take the prefetched element and fetch the next one.
    ///
    /// # Errors
    ///
    /// Returns the stored error once the source has gone terminal.
    pub fn pop(&mut self) -> Result<NetworkElement, StreamError> {
        let element = match self.current.take() {
            Some(element) => element,
            None => {
                return Err(self
                    .error
                    .clone()
                    .unwrap_or(StreamError::EndOfStream))
            }
        };
        self.advance();
        Ok(element)
    }

    /// The terminal error observed by the look-ahead, if any. This is
    /// visible before a pop has tripped over it.
    pub(crate) fn terminal_error(&self) -> Option<&StreamError> {
        self.error.as_ref()
    }

    fn advance(&mut self) {
        match receive_element(&mut self.recv) {
            Ok(element) => {
                self.aspect = element.aspect().to_string();
                self.network = element.label.clone();
                self.current = Some(element);
            }
            Err(error) => {
                self.current = None;
                self.error = Some(error);
            }
        }
    }
}
