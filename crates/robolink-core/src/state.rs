//! Connection lifecycle state machine
//!
//! A linear state machine: transitions consume the current state and return
//! the next one plus the effects the connection manager must run. The
//! function is total: an event that means nothing in the current state is a
//! logged no-op, because a flaky link must never be able to wedge the device.

use smallvec::SmallVec;

use crate::types::{ConnectionId, Timestamp};

// ----------------------------------------------------------------------------
// States
// ----------------------------------------------------------------------------

/// Connection lifecycle states
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    /// No socket, no pending retry
    Disconnected,
    /// Socket opening / WebSocket handshake in flight
    Connecting { started: Timestamp },
    /// Transport open, identity announced, waiting for the server's ack
    ConnectedUnregistered { since: Timestamp },
    /// Server issued a connection id; telemetry may flow
    Registered { connection_id: ConnectionId },
    /// Backing off before the next connection attempt
    ReconnectWait { since: Timestamp },
}

impl LinkState {
    /// State name for logging
    pub fn name(&self) -> &'static str {
        match self {
            LinkState::Disconnected => "Disconnected",
            LinkState::Connecting { .. } => "Connecting",
            LinkState::ConnectedUnregistered { .. } => "ConnectedUnregistered",
            LinkState::Registered { .. } => "Registered",
            LinkState::ReconnectWait { .. } => "ReconnectWait",
        }
    }

    /// True once the server has acknowledged the session
    pub fn is_registered(&self) -> bool {
        matches!(self, LinkState::Registered { .. })
    }

    /// The server-assigned connection id, present iff registered
    pub fn connection_id(&self) -> Option<&ConnectionId> {
        match self {
            LinkState::Registered { connection_id } => Some(connection_id),
            _ => None,
        }
    }
}

// ----------------------------------------------------------------------------
// Events
// ----------------------------------------------------------------------------

/// Triggers for state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Host asked for a connection
    ConnectRequested,
    /// Transport finished its handshake
    TransportOpened,
    /// Transport closed (peer close or local teardown)
    TransportClosed,
    /// Transport reported a failure
    TransportFailed,
    /// Server acknowledged registration
    AckReceived { connection_id: ConnectionId },
    /// Handshake exceeded its deadline
    HandshakeTimedOut,
    /// Reconnect backoff window elapsed
    RetryElapsed,
    /// Host asked to tear the link down
    DisconnectRequested,
}

// ----------------------------------------------------------------------------
// Effects
// ----------------------------------------------------------------------------

/// Work the connection manager performs as a result of a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    OpenTransport,
    CloseTransport,
    SendInit,
    NotifyConnected,
    NotifyDisconnected,
}

pub type Effects = SmallVec<[Effect; 4]>;

// ----------------------------------------------------------------------------
// Transitions
// ----------------------------------------------------------------------------

impl LinkState {
    /// Apply an event, consuming the current state.
    ///
    /// `now` stamps the states that track elapsed time; the caller owns the
    /// clock so transitions stay pure.
    pub fn transition(self, event: LinkEvent, now: Timestamp) -> (LinkState, Effects) {
        use Effect::*;
        use LinkEvent::*;

        let from = self.name();
        let (next, effects): (LinkState, Effects) = match (self, event) {
            // Host-driven teardown wins from every state.
            (LinkState::Disconnected, DisconnectRequested) => {
                (LinkState::Disconnected, Effects::new())
            }
            (_, DisconnectRequested) => {
                (LinkState::Disconnected, SmallVec::from_slice(&[CloseTransport]))
            }

            (LinkState::Disconnected, ConnectRequested) => (
                LinkState::Connecting { started: now },
                SmallVec::from_slice(&[OpenTransport]),
            ),
            // A connect request while waiting out the backoff forces the retry.
            (LinkState::ReconnectWait { .. }, ConnectRequested) => (
                LinkState::Connecting { started: now },
                SmallVec::from_slice(&[OpenTransport]),
            ),

            (LinkState::Connecting { .. }, TransportOpened) => (
                LinkState::ConnectedUnregistered { since: now },
                SmallVec::from_slice(&[SendInit]),
            ),
            (
                LinkState::Connecting { .. },
                TransportFailed | TransportClosed | HandshakeTimedOut,
            ) => (
                LinkState::ReconnectWait { since: now },
                SmallVec::from_slice(&[CloseTransport]),
            ),

            (LinkState::ConnectedUnregistered { .. }, AckReceived { connection_id }) => (
                LinkState::Registered { connection_id },
                SmallVec::from_slice(&[NotifyConnected]),
            ),
            (LinkState::ConnectedUnregistered { .. }, TransportClosed | TransportFailed) => (
                LinkState::ReconnectWait { since: now },
                SmallVec::from_slice(&[CloseTransport]),
            ),

            (LinkState::Registered { .. }, TransportClosed | TransportFailed) => (
                LinkState::ReconnectWait { since: now },
                SmallVec::from_slice(&[CloseTransport, NotifyDisconnected]),
            ),

            (LinkState::ReconnectWait { .. }, RetryElapsed) => (
                LinkState::Connecting { started: now },
                SmallVec::from_slice(&[OpenTransport]),
            ),

            // Everything else is meaningless in this state; stay put.
            (state, event) => {
                log::debug!(
                    "ignoring {:?} in state {}",
                    event,
                    state.name()
                );
                (state, Effects::new())
            }
        };

        if from != next.name() {
            log::debug!("link state {} -> {}", from, next.name());
        }
        (next, effects)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn at(millis: u64) -> Timestamp {
        Timestamp::new(millis)
    }

    fn ack(id: &str) -> LinkEvent {
        LinkEvent::AckReceived {
            connection_id: ConnectionId::new(id),
        }
    }

    #[test]
    fn happy_path_reaches_registered() {
        let state = LinkState::Disconnected;
        let (state, effects) = state.transition(LinkEvent::ConnectRequested, at(0));
        assert_eq!(state.name(), "Connecting");
        assert_eq!(effects.as_slice(), &[Effect::OpenTransport]);

        let (state, effects) = state.transition(LinkEvent::TransportOpened, at(10));
        assert_eq!(state.name(), "ConnectedUnregistered");
        assert_eq!(effects.as_slice(), &[Effect::SendInit]);

        let (state, effects) = state.transition(ack("c-42"), at(20));
        assert!(state.is_registered());
        assert_eq!(state.connection_id().unwrap().as_str(), "c-42");
        assert_eq!(effects.as_slice(), &[Effect::NotifyConnected]);
    }

    #[test]
    fn registered_close_enters_backoff_and_notifies() {
        let state = LinkState::Registered {
            connection_id: ConnectionId::new("c-1"),
        };
        let (state, effects) = state.transition(LinkEvent::TransportClosed, at(500));
        assert_eq!(state, LinkState::ReconnectWait { since: at(500) });
        assert_eq!(
            effects.as_slice(),
            &[Effect::CloseTransport, Effect::NotifyDisconnected]
        );
        assert_eq!(state.connection_id(), None);
    }

    #[test]
    fn connecting_failures_enter_backoff() {
        for event in [
            LinkEvent::TransportFailed,
            LinkEvent::TransportClosed,
            LinkEvent::HandshakeTimedOut,
        ] {
            let state = LinkState::Connecting { started: at(0) };
            let (state, effects) = state.transition(event, at(100));
            assert_eq!(state, LinkState::ReconnectWait { since: at(100) });
            assert_eq!(effects.as_slice(), &[Effect::CloseTransport]);
        }
    }

    #[test]
    fn retry_reopens_the_transport() {
        let state = LinkState::ReconnectWait { since: at(0) };
        let (state, effects) = state.transition(LinkEvent::RetryElapsed, at(5_000));
        assert_eq!(state, LinkState::Connecting { started: at(5_000) });
        assert_eq!(effects.as_slice(), &[Effect::OpenTransport]);
    }

    #[test]
    fn disconnect_is_universal_and_idempotent() {
        let states = [
            LinkState::Disconnected,
            LinkState::Connecting { started: at(0) },
            LinkState::ConnectedUnregistered { since: at(0) },
            LinkState::Registered {
                connection_id: ConnectionId::new("c-1"),
            },
            LinkState::ReconnectWait { since: at(0) },
        ];
        for state in states {
            let was_disconnected = state == LinkState::Disconnected;
            let (state, effects) = state.transition(LinkEvent::DisconnectRequested, at(9));
            assert_eq!(state, LinkState::Disconnected);
            if was_disconnected {
                assert!(effects.is_empty());
            } else {
                assert_eq!(effects.as_slice(), &[Effect::CloseTransport]);
            }
        }
    }

    #[test]
    fn meaningless_events_are_no_ops() {
        let state = LinkState::Disconnected;
        let (state, effects) = state.transition(LinkEvent::TransportOpened, at(1));
        assert_eq!(state, LinkState::Disconnected);
        assert!(effects.is_empty());

        let state = LinkState::Registered {
            connection_id: ConnectionId::new("c-1"),
        };
        let (state, effects) = state.transition(LinkEvent::ConnectRequested, at(1));
        assert!(state.is_registered());
        assert!(effects.is_empty());

        let state = LinkState::Disconnected;
        let (state, effects) = state.transition(ack("c-9"), at(1));
        assert_eq!(state, LinkState::Disconnected);
        assert!(effects.is_empty());
    }

    #[test]
    fn connect_during_backoff_forces_retry() {
        let state = LinkState::ReconnectWait { since: at(0) };
        let (state, effects) = state.transition(LinkEvent::ConnectRequested, at(50));
        assert_eq!(state, LinkState::Connecting { started: at(50) });
        assert_eq!(effects.as_slice(), &[Effect::OpenTransport]);
    }
}
