//! The RoboLink connection manager
//!
//! [`RobotLink`] owns the transport and the clock, drives the connection
//! state machine, keeps the heartbeat and reconnect timers, and routes
//! inbound envelopes to registered callbacks. Everything happens inside
//! [`RobotLink::poll`], called cooperatively from the device main loop.

use std::panic::{catch_unwind, AssertUnwindSafe};

use serde_json::{json, Value};

use crate::alert::{classify, AlertLevel};
use crate::config::LinkConfig;
use crate::envelope::{
    decode_envelope, encode_envelope, AckPayload, ClientKind, ConnectionInit, Envelope,
    ErrorReport, MessageKind, SensorReport,
};
use crate::errors::{ConfigError, LinkError, StateError, TransportError};
use crate::handlers::{Callbacks, LinkContext, LinkStats, OutboundRequest};
use crate::state::{Effect, LinkEvent, LinkState};
use crate::transport::{Transport, TransportEvent};
use crate::types::{ConnectionId, RobotId, TimeSource, Timestamp};

// ----------------------------------------------------------------------------
// Connection Manager
// ----------------------------------------------------------------------------

/// The device side of the telemetry and command channel.
///
/// Exactly one transport instance exists for the lifetime of a `RobotLink`;
/// the manager owns it exclusively and never overlaps sockets.
pub struct RobotLink {
    config: LinkConfig,
    robot_id: RobotId,
    transport: Box<dyn Transport>,
    clock: Box<dyn TimeSource>,
    state: LinkState,
    callbacks: Callbacks,
    stats: LinkStats,
    last_heartbeat_sent: Timestamp,
    last_reconnect_attempt: Timestamp,
    last_server_heartbeat: Option<Timestamp>,
    outbox: Vec<OutboundRequest>,
    dispatching: bool,
}

impl RobotLink {
    /// Build a link from validated configuration, a transport, and a clock.
    pub fn new(
        config: LinkConfig,
        transport: Box<dyn Transport>,
        clock: Box<dyn TimeSource>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let robot_id = RobotId::new(config.robot_id.clone())?;
        let now = clock.now();
        Ok(Self {
            config,
            robot_id,
            transport,
            clock,
            state: LinkState::Disconnected,
            callbacks: Callbacks::default(),
            stats: LinkStats::default(),
            last_heartbeat_sent: now,
            last_reconnect_attempt: now,
            last_server_heartbeat: None,
            outbox: Vec::new(),
            dispatching: false,
        })
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// True once the server has acknowledged the session
    pub fn is_connected(&self) -> bool {
        self.state.is_registered()
    }

    /// Current state name, for logging and diagnostics
    pub fn state_name(&self) -> &'static str {
        self.state.name()
    }

    /// Server-assigned connection id; `None` until registered
    pub fn connection_id(&self) -> Option<&str> {
        self.state.connection_id().map(ConnectionId::as_str)
    }

    /// The device identifier this link announces
    pub fn robot_id(&self) -> &str {
        self.robot_id.as_str()
    }

    /// Link counters
    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// When the server last pinged us, if it ever has
    pub fn last_server_heartbeat(&self) -> Option<Timestamp> {
        self.last_server_heartbeat
    }

    // ------------------------------------------------------------------
    // Callback Registration
    // ------------------------------------------------------------------

    pub fn set_on_connect(&mut self, callback: impl FnMut(&mut LinkContext<'_>) + 'static) {
        self.callbacks.on_connect = Some(Box::new(callback));
    }

    pub fn set_on_disconnect(&mut self, callback: impl FnMut() + 'static) {
        self.callbacks.on_disconnect = Some(Box::new(callback));
    }

    /// Generic handler invoked for every successfully decoded envelope
    pub fn set_on_message(
        &mut self,
        callback: impl FnMut(&mut LinkContext<'_>, &Envelope) + 'static,
    ) {
        self.callbacks.on_message = Some(Box::new(callback));
    }

    pub fn set_on_error(&mut self, callback: impl FnMut(&LinkError) + 'static) {
        self.callbacks.on_error = Some(Box::new(callback));
    }

    /// Handler for server-originated actuator commands
    pub fn set_on_actuator_command(
        &mut self,
        callback: impl FnMut(&mut LinkContext<'_>, &Envelope) + 'static,
    ) {
        self.callbacks.on_actuator_command = Some(Box::new(callback));
    }

    /// Dedicated AI-response handler; without one, AI responses only reach
    /// the generic message handler
    pub fn set_on_ai_response(
        &mut self,
        callback: impl FnMut(&mut LinkContext<'_>, &Envelope) + 'static,
    ) {
        self.callbacks.on_ai_response = Some(Box::new(callback));
    }

    // ------------------------------------------------------------------
    // Configuration Setters
    // ------------------------------------------------------------------

    pub fn set_heartbeat_interval_ms(&mut self, millis: u64) -> Result<(), ConfigError> {
        if millis == 0 {
            return Err(ConfigError::NonPositiveInterval {
                name: "heartbeat_interval_ms",
            });
        }
        self.config.heartbeat_interval_ms = millis;
        Ok(())
    }

    pub fn set_reconnect_interval_ms(&mut self, millis: u64) -> Result<(), ConfigError> {
        if millis == 0 {
            return Err(ConfigError::NonPositiveInterval {
                name: "reconnect_interval_ms",
            });
        }
        self.config.reconnect_interval_ms = millis;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Start connecting. Failures surface through the error callback and the
    /// reconnect loop; the link keeps trying until [`RobotLink::disconnect`].
    pub fn connect(&mut self) {
        self.apply(LinkEvent::ConnectRequested);
    }

    /// Tear the link down. Idempotent; closes the socket even mid-handshake.
    /// No callbacks fire after this until the next `connect`.
    pub fn disconnect(&mut self) {
        self.apply(LinkEvent::DisconnectRequested);
    }

    /// One cooperative tick: pump the transport, run the timers, emit at
    /// most one heartbeat. Call at 10 Hz or faster.
    pub fn poll(&mut self) {
        while let Some(event) = self.transport.poll_event() {
            self.handle_transport_event(event);
        }

        let now = self.clock.now();

        // A connection attempt gets twice the backoff window to reach an
        // open transport before it is abandoned.
        if let LinkState::Connecting { started } = self.state {
            if now - started >= self.config.reconnect_interval_ms.saturating_mul(2) {
                log::warn!("connection attempt timed out");
                self.apply(LinkEvent::HandshakeTimedOut);
            }
        }

        // The backoff counts from the moment the wait began, so a link that
        // dies long after its last connect still waits out the full window.
        if let LinkState::ReconnectWait { since } = self.state {
            if now - since >= self.config.reconnect_interval_ms {
                self.apply(LinkEvent::RetryElapsed);
            }
        }

        // Application frames queued by callbacks go out before any heartbeat
        // due in the same tick.
        self.flush_outbox();

        if self.state.is_registered()
            && now - self.last_heartbeat_sent >= self.config.heartbeat_interval_ms
        {
            let _ = self.send_heartbeat();
        }
    }

    // ------------------------------------------------------------------
    // Send Paths
    // ------------------------------------------------------------------

    /// Send an envelope of `kind`. Only permitted while registered.
    pub fn send(
        &mut self,
        kind: MessageKind,
        payload: Value,
        target: Option<String>,
    ) -> crate::Result<()> {
        if !self.state.is_registered() {
            return Err(StateError::NotRegistered {
                state: self.state.name(),
            }
            .into());
        }
        self.transmit(kind, payload, target)
    }

    /// Classify and send one sensor reading; alerts become SENSOR_ALERT.
    pub fn send_sensor_data(
        &mut self,
        sensor_type: &str,
        value: f64,
        unit: &str,
    ) -> crate::Result<()> {
        let alert_level = classify(sensor_type, value);
        let kind = if alert_level == AlertLevel::Normal {
            MessageKind::SensorData
        } else {
            MessageKind::SensorAlert
        };
        let report = SensorReport {
            sensor_type: sensor_type.to_string(),
            value,
            unit: unit.to_string(),
            alert_level,
        };
        let payload = serde_json::to_value(report).map_err(|e| StateError::Encode {
            reason: e.to_string(),
        })?;
        self.send(kind, payload, None)
    }

    /// Emit one heartbeat and reset the cadence timer.
    pub fn send_heartbeat(&mut self) -> crate::Result<()> {
        let result = self.send(MessageKind::Heartbeat, json!({}), None);
        if result.is_ok() {
            self.last_heartbeat_sent = self.clock.now();
            self.stats.heartbeats_sent += 1;
        }
        result
    }

    /// Acknowledge a received message by id.
    pub fn send_ack(&mut self, ref_id: &str) -> crate::Result<()> {
        let payload = AckPayload {
            connection_id: self.connection_id().unwrap_or_default().to_string(),
            ref_id: Some(ref_id.to_string()),
        };
        let payload = serde_json::to_value(payload).map_err(|e| StateError::Encode {
            reason: e.to_string(),
        })?;
        self.send(MessageKind::Ack, payload, None)
    }

    /// Report a device-side error to the server.
    pub fn send_error(&mut self, message: &str) -> crate::Result<()> {
        let payload = ErrorReport {
            message: message.to_string(),
            code: None,
        };
        let payload = serde_json::to_value(payload).map_err(|e| StateError::Encode {
            reason: e.to_string(),
        })?;
        self.send(MessageKind::ErrorMsg, payload, None)
    }

    /// Encode and hand a frame to the transport, bypassing the registration
    /// check (the init frame is sent before registration).
    fn transmit(
        &mut self,
        kind: MessageKind,
        payload: Value,
        target: Option<String>,
    ) -> crate::Result<()> {
        let source = match self.state.connection_id() {
            Some(id) => id.as_str().to_string(),
            None => self.robot_id.as_str().to_string(),
        };
        let envelope = Envelope::new(kind, source, payload, target, self.clock.now());
        let bytes = encode_envelope(&envelope, self.config.max_frame_bytes)?;

        match self.transport.send_text(&bytes) {
            Ok(()) => {
                self.stats.frames_sent += 1;
                Ok(())
            }
            Err(TransportError::Busy) => {
                self.stats.dropped_sends += 1;
                self.report_error(LinkError::Transport(TransportError::Busy));
                Err(LinkError::Transport(TransportError::Busy))
            }
            Err(err) => {
                self.stats.dropped_sends += 1;
                let reason = err.to_string();
                self.report_error(LinkError::Transport(err));
                self.apply(LinkEvent::TransportFailed);
                Err(LinkError::transport_failed(reason))
            }
        }
    }

    // ------------------------------------------------------------------
    // State Machine Driver
    // ------------------------------------------------------------------

    fn apply(&mut self, event: LinkEvent) {
        let now = self.clock.now();
        let state = std::mem::replace(&mut self.state, LinkState::Disconnected);
        let (next, effects) = state.transition(event, now);
        self.state = next;
        for effect in effects {
            self.run_effect(effect, now);
        }
    }

    fn run_effect(&mut self, effect: Effect, now: Timestamp) {
        match effect {
            Effect::OpenTransport => {
                self.last_reconnect_attempt = now;
                let host = self.config.server_host.clone();
                let port = self.config.server_port;
                if let Err(err) = self.transport.open(&host, port) {
                    self.report_error(LinkError::Transport(err));
                    self.apply(LinkEvent::TransportFailed);
                }
            }
            Effect::CloseTransport => {
                self.transport.close();
            }
            Effect::SendInit => {
                let init = ConnectionInit {
                    robot_id: self.robot_id.as_str().to_string(),
                    client_type: ClientKind::Esp32Type,
                };
                match serde_json::to_value(init) {
                    Ok(payload) => {
                        let _ = self.transmit(MessageKind::ConnectionInit, payload, None);
                    }
                    Err(e) => {
                        self.report_error(LinkError::State(StateError::Encode {
                            reason: e.to_string(),
                        }));
                    }
                }
            }
            Effect::NotifyConnected => {
                // Heartbeat cadence starts from the moment of registration.
                self.last_heartbeat_sent = now;
                self.fire_connect();
            }
            Effect::NotifyDisconnected => {
                self.fire_disconnect();
            }
        }
    }

    // ------------------------------------------------------------------
    // Inbound Path
    // ------------------------------------------------------------------

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => self.apply(LinkEvent::TransportOpened),
            TransportEvent::Closed => self.apply(LinkEvent::TransportClosed),
            TransportEvent::Error(reason) => {
                self.report_error(LinkError::transport_failed(reason));
                self.apply(LinkEvent::TransportFailed);
            }
            TransportEvent::Text(bytes) => self.handle_frame(&bytes),
        }
    }

    fn handle_frame(&mut self, bytes: &[u8]) {
        match decode_envelope(bytes, self.config.max_frame_bytes) {
            Ok(envelope) => {
                self.stats.record_received(envelope.kind);
                self.dispatch(envelope);
            }
            Err(err) => {
                self.stats.decode_errors += 1;
                self.report_error(LinkError::Decode(err));
            }
        }
    }

    /// Route one decoded envelope. The generic message handler sees every
    /// envelope first, then the type-specific routing runs.
    fn dispatch(&mut self, envelope: Envelope) {
        if self.dispatching {
            log::warn!("nested dispatch suppressed for {:?}", envelope.kind);
            return;
        }
        self.dispatching = true;

        self.fire_message(&envelope);

        match envelope.kind {
            MessageKind::Ack => self.handle_connection_ack(&envelope),
            MessageKind::ActuatorCommand => {
                if self.callbacks.on_actuator_command.is_some() {
                    self.fire_actuator_command(&envelope);
                } else {
                    self.stats.ignored_messages += 1;
                }
            }
            MessageKind::AiResponse => {
                // Default behavior is the generic handler above; a dedicated
                // handler sees the envelope as well when registered.
                self.fire_ai_response(&envelope);
            }
            MessageKind::Heartbeat => {
                self.last_server_heartbeat = Some(self.clock.now());
            }
            MessageKind::ErrorMsg => match ErrorReport::from_value(&envelope.payload) {
                Ok(report) => self.report_error(LinkError::Remote {
                    message: report.message,
                    code: report.code,
                }),
                Err(err) => self.report_error(LinkError::Decode(err)),
            },
            _ => {
                self.stats.ignored_messages += 1;
            }
        }

        self.dispatching = false;
        self.flush_outbox();
    }

    fn handle_connection_ack(&mut self, envelope: &Envelope) {
        if !matches!(self.state, LinkState::ConnectedUnregistered { .. }) {
            // Delivery acks and the like; nothing to do at this layer.
            self.stats.ignored_messages += 1;
            return;
        }
        match AckPayload::from_value(&envelope.payload) {
            Ok(ack) => {
                log::info!("registered with connection id {}", ack.connection_id);
                self.apply(LinkEvent::AckReceived {
                    connection_id: ConnectionId::new(ack.connection_id),
                });
            }
            Err(err) => self.report_error(LinkError::Decode(err)),
        }
    }

    // ------------------------------------------------------------------
    // Deferred Sends
    // ------------------------------------------------------------------

    /// Apply sends queued by callbacks. Requests that fail a state check are
    /// reported through the error callback (their callers are long gone);
    /// transport-level drops were already reported by `transmit`.
    fn flush_outbox(&mut self) {
        if self.outbox.is_empty() {
            return;
        }
        let pending: Vec<OutboundRequest> = self.outbox.drain(..).collect();
        for request in pending {
            let result = match request {
                OutboundRequest::Envelope {
                    kind,
                    payload,
                    target,
                } => self.send(kind, payload, target),
                OutboundRequest::Ack { ref_id } => self.send_ack(&ref_id),
                OutboundRequest::Error { message } => self.send_error(&message),
                OutboundRequest::SensorData {
                    sensor_type,
                    value,
                    unit,
                } => self.send_sensor_data(&sensor_type, value, &unit),
            };
            if let Err(err @ LinkError::State(_)) = result {
                self.report_error(err);
            }
        }
    }

    // ------------------------------------------------------------------
    // Callback Invocation
    // ------------------------------------------------------------------
    //
    // Callbacks are taken out of their slot for the duration of the call so
    // the borrow checker allows them a context over the outbox, and panics
    // are contained at this boundary: a faulty callback reports through
    // `on_error` and the state machine is untouched.

    fn fire_connect(&mut self) {
        if let Some(mut callback) = self.callbacks.on_connect.take() {
            let outbox = &mut self.outbox;
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                let mut ctx = LinkContext { outbox };
                callback(&mut ctx);
            }));
            self.callbacks.on_connect = Some(callback);
            if outcome.is_err() {
                self.report_error(LinkError::Callback {
                    context: "on_connect",
                });
            }
        }
    }

    fn fire_disconnect(&mut self) {
        if let Some(mut callback) = self.callbacks.on_disconnect.take() {
            let outcome = catch_unwind(AssertUnwindSafe(|| callback()));
            self.callbacks.on_disconnect = Some(callback);
            if outcome.is_err() {
                self.report_error(LinkError::Callback {
                    context: "on_disconnect",
                });
            }
        }
    }

    fn fire_message(&mut self, envelope: &Envelope) {
        if let Some(mut callback) = self.callbacks.on_message.take() {
            let outbox = &mut self.outbox;
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                let mut ctx = LinkContext { outbox };
                callback(&mut ctx, envelope);
            }));
            self.callbacks.on_message = Some(callback);
            if outcome.is_err() {
                self.report_error(LinkError::Callback {
                    context: "on_message",
                });
            }
        }
    }

    fn fire_actuator_command(&mut self, envelope: &Envelope) {
        if let Some(mut callback) = self.callbacks.on_actuator_command.take() {
            let outbox = &mut self.outbox;
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                let mut ctx = LinkContext { outbox };
                callback(&mut ctx, envelope);
            }));
            self.callbacks.on_actuator_command = Some(callback);
            if outcome.is_err() {
                self.report_error(LinkError::Callback {
                    context: "on_actuator_command",
                });
            }
        }
    }

    fn fire_ai_response(&mut self, envelope: &Envelope) {
        if let Some(mut callback) = self.callbacks.on_ai_response.take() {
            let outbox = &mut self.outbox;
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                let mut ctx = LinkContext { outbox };
                callback(&mut ctx, envelope);
            }));
            self.callbacks.on_ai_response = Some(callback);
            if outcome.is_err() {
                self.report_error(LinkError::Callback {
                    context: "on_ai_response",
                });
            }
        }
    }

    fn report_error(&mut self, err: LinkError) {
        log::warn!("{err}");
        if let Some(mut callback) = self.callbacks.on_error.take() {
            if catch_unwind(AssertUnwindSafe(|| callback(&err))).is_err() {
                log::error!("error callback panicked");
            }
            self.callbacks.on_error = Some(callback);
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use crate::types::ManualClock;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn new_link() -> (RobotLink, Rc<RefCell<MockTransport>>, Rc<ManualClock>) {
        let transport = Rc::new(RefCell::new(MockTransport::new()));
        let clock = Rc::new(ManualClock::new(0));
        let link = RobotLink::new(
            LinkConfig::testing(),
            Box::new(Rc::clone(&transport)),
            Box::new(Rc::clone(&clock)),
        )
        .unwrap();
        (link, transport, clock)
    }

    #[test]
    fn rejects_invalid_config() {
        let transport = Box::new(MockTransport::new());
        let clock = Box::new(ManualClock::new(0));
        let config = LinkConfig::testing().with_heartbeat_interval_ms(0);
        assert!(RobotLink::new(config, transport, clock).is_err());
    }

    #[test]
    fn starts_disconnected() {
        let (link, _, _) = new_link();
        assert!(!link.is_connected());
        assert_eq!(link.state_name(), "Disconnected");
        assert_eq!(link.connection_id(), None);
    }

    #[test]
    fn connect_opens_the_transport() {
        let (mut link, transport, _) = new_link();
        link.connect();
        assert_eq!(transport.borrow().open_calls(), 1);
        assert_eq!(link.state_name(), "Connecting");
    }

    #[test]
    fn open_failure_enters_backoff() {
        let (mut link, transport, _) = new_link();
        transport.borrow_mut().fail_next_open("refused");
        link.connect();
        assert_eq!(link.state_name(), "ReconnectWait");
    }

    #[test]
    fn send_requires_registration() {
        let (mut link, _, _) = new_link();
        let err = link
            .send(MessageKind::StatusUpdate, json!({}), None)
            .unwrap_err();
        assert!(matches!(
            err,
            LinkError::State(StateError::NotRegistered { .. })
        ));
    }

    #[test]
    fn interval_setters_reject_zero() {
        let (mut link, _, _) = new_link();
        assert!(link.set_heartbeat_interval_ms(0).is_err());
        assert!(link.set_reconnect_interval_ms(0).is_err());
        assert!(link.set_heartbeat_interval_ms(15_000).is_ok());
        assert!(link.set_reconnect_interval_ms(2_000).is_ok());
    }
}
