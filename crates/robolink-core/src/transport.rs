//! Transport abstraction
//!
//! The connection manager drives exactly one transport through this trait.
//! Implementations must be non-blocking: every method returns promptly and
//! progress (handshake, reads) happens inside `poll_event`, which the manager
//! pumps on every tick.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::errors::TransportError;

// ----------------------------------------------------------------------------
// Transport Events
// ----------------------------------------------------------------------------

/// Events a transport delivers to its owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is established and frames may flow
    Opened,
    /// The connection is gone (peer close, local close, or post-error)
    Closed,
    /// Something failed; a `Closed` follows if the connection died
    Error(String),
    /// One inbound text frame
    Text(Vec<u8>),
}

// ----------------------------------------------------------------------------
// Transport Trait
// ----------------------------------------------------------------------------

/// A single bidirectional text-frame connection.
pub trait Transport {
    /// Begin connecting. Completion is signaled by a later `Opened` event.
    fn open(&mut self, host: &str, port: u16) -> Result<(), TransportError>;

    /// Tear the connection down and drop any undelivered events.
    fn close(&mut self);

    /// Queue one text frame for transmission.
    ///
    /// The transport buffers at most one frame; `TransportError::Busy` means
    /// the frame was dropped, not queued.
    fn send_text(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// Next pending event, if any. Never blocks.
    fn poll_event(&mut self) -> Option<TransportEvent>;

    /// True while the connection is established
    fn is_open(&self) -> bool;
}

/// Shared-handle adapter: a harness can keep inspecting a transport it has
/// already handed to the connection manager. Single-threaded only.
impl<T: Transport> Transport for Rc<RefCell<T>> {
    fn open(&mut self, host: &str, port: u16) -> Result<(), TransportError> {
        self.borrow_mut().open(host, port)
    }

    fn close(&mut self) {
        self.borrow_mut().close();
    }

    fn send_text(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        self.borrow_mut().send_text(frame)
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        self.borrow_mut().poll_event()
    }

    fn is_open(&self) -> bool {
        self.borrow().is_open()
    }
}

// ----------------------------------------------------------------------------
// Mock Transport (for testing)
// ----------------------------------------------------------------------------

/// Scriptable transport double.
///
/// Tests script inbound events with [`MockTransport::script_event`], capture
/// outbound frames from [`MockTransport::sent_frames`], and inject open
/// failures or busy sends to exercise the error paths.
#[derive(Debug, Default)]
pub struct MockTransport {
    open: bool,
    open_calls: u32,
    fail_next_open: Option<String>,
    busy_sends: u32,
    sent: Vec<Vec<u8>>,
    events: VecDeque<TransportEvent>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event for the next `poll_event` calls
    pub fn script_event(&mut self, event: TransportEvent) {
        self.events.push_back(event);
    }

    /// Queue an inbound text frame
    pub fn script_text(&mut self, frame: impl Into<Vec<u8>>) {
        self.events.push_back(TransportEvent::Text(frame.into()));
    }

    /// Make the next `open` call fail with the given reason
    pub fn fail_next_open(&mut self, reason: impl Into<String>) {
        self.fail_next_open = Some(reason.into());
    }

    /// Make the next `n` sends report `Busy`
    pub fn set_busy_sends(&mut self, n: u32) {
        self.busy_sends = n;
    }

    /// Frames accepted for transmission, oldest first
    pub fn sent_frames(&self) -> &[Vec<u8>] {
        &self.sent
    }

    /// Drop captured frames (keeps assertions local to a test phase)
    pub fn clear_sent(&mut self) {
        self.sent.clear();
    }

    /// Number of times `open` was called
    pub fn open_calls(&self) -> u32 {
        self.open_calls
    }
}

impl Transport for MockTransport {
    fn open(&mut self, host: &str, port: u16) -> Result<(), TransportError> {
        self.open_calls += 1;
        if let Some(reason) = self.fail_next_open.take() {
            return Err(TransportError::OpenFailed {
                host: host.to_string(),
                port,
                reason,
            });
        }
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
        self.events.clear();
    }

    fn send_text(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        if self.busy_sends > 0 {
            self.busy_sends -= 1;
            return Err(TransportError::Busy);
        }
        self.sent.push(frame.to_vec());
        Ok(())
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        self.events.pop_front()
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
