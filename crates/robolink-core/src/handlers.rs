//! Callback storage, deferred sends, and dispatch bookkeeping
//!
//! Callbacks are boxed `FnMut` values owned by the connection manager for
//! its lifetime; registering a callback swaps the stored box. Callbacks that
//! may need to reply get a [`LinkContext`], which queues outbound work. The
//! queue is flushed once after the callback returns, so reply nesting is
//! structurally capped at one level and a callback can never re-enter the
//! send path mid-dispatch.

use hashbrown::HashMap;
use serde::Serialize;
use serde_json::Value;

use crate::envelope::{Envelope, MessageKind};
use crate::errors::LinkError;

// ----------------------------------------------------------------------------
// Callback Types
// ----------------------------------------------------------------------------

pub type ConnectCallback = Box<dyn FnMut(&mut LinkContext<'_>)>;
pub type DisconnectCallback = Box<dyn FnMut()>;
pub type MessageCallback = Box<dyn FnMut(&mut LinkContext<'_>, &Envelope)>;
pub type ErrorCallback = Box<dyn FnMut(&LinkError)>;
pub type ActuatorCallback = Box<dyn FnMut(&mut LinkContext<'_>, &Envelope)>;

/// The callbacks a host can register
#[derive(Default)]
pub struct Callbacks {
    pub(crate) on_connect: Option<ConnectCallback>,
    pub(crate) on_disconnect: Option<DisconnectCallback>,
    pub(crate) on_message: Option<MessageCallback>,
    pub(crate) on_error: Option<ErrorCallback>,
    pub(crate) on_actuator_command: Option<ActuatorCallback>,
    pub(crate) on_ai_response: Option<MessageCallback>,
}

// ----------------------------------------------------------------------------
// Deferred Sends
// ----------------------------------------------------------------------------

/// Outbound work queued from inside a callback
#[derive(Debug, Clone)]
pub(crate) enum OutboundRequest {
    Envelope {
        kind: MessageKind,
        payload: Value,
        target: Option<String>,
    },
    Ack {
        ref_id: String,
    },
    Error {
        message: String,
    },
    SensorData {
        sensor_type: String,
        value: f64,
        unit: String,
    },
}

/// Handed to callbacks during dispatch.
///
/// Nothing here touches the transport directly; requests are applied by the
/// connection manager after the callback returns, against the state the link
/// is in at that moment.
pub struct LinkContext<'a> {
    pub(crate) outbox: &'a mut Vec<OutboundRequest>,
}

impl LinkContext<'_> {
    /// Queue an arbitrary envelope
    pub fn send(&mut self, kind: MessageKind, payload: Value, target: Option<String>) {
        self.outbox.push(OutboundRequest::Envelope {
            kind,
            payload,
            target,
        });
    }

    /// Queue an acknowledgment for a received message id
    pub fn send_ack(&mut self, ref_id: impl Into<String>) {
        self.outbox.push(OutboundRequest::Ack {
            ref_id: ref_id.into(),
        });
    }

    /// Queue an error report to the server
    pub fn send_error(&mut self, message: impl Into<String>) {
        self.outbox.push(OutboundRequest::Error {
            message: message.into(),
        });
    }

    /// Queue a sensor reading; it is classified when it is sent
    pub fn send_sensor_data(
        &mut self,
        sensor_type: impl Into<String>,
        value: f64,
        unit: impl Into<String>,
    ) {
        self.outbox.push(OutboundRequest::SensorData {
            sensor_type: sensor_type.into(),
            value,
            unit: unit.into(),
        });
    }
}

// ----------------------------------------------------------------------------
// Link Statistics
// ----------------------------------------------------------------------------

/// Rolling counters for link observability.
///
/// Purely informational; nothing in the protocol reads them back.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LinkStats {
    /// Frames accepted by the transport
    pub frames_sent: u64,
    /// Frames decoded successfully
    pub frames_received: u64,
    /// Inbound frames rejected by the codec
    pub decode_errors: u64,
    /// Outbound frames dropped (busy transport or send failure)
    pub dropped_sends: u64,
    /// Decoded frames with no handler for their kind in the current state
    pub ignored_messages: u64,
    /// Heartbeats emitted
    pub heartbeats_sent: u64,
    received_by_kind: HashMap<MessageKind, u64>,
}

impl LinkStats {
    /// How many frames of `kind` have been received
    pub fn received_of(&self, kind: MessageKind) -> u64 {
        self.received_by_kind.get(&kind).copied().unwrap_or(0)
    }

    pub(crate) fn record_received(&mut self, kind: MessageKind) {
        self.frames_received += 1;
        *self.received_by_kind.entry(kind).or_insert(0) += 1;
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
