//! RoboLink core protocol implementation
//!
//! This crate provides the on-device half of the companion robot's telemetry
//! and command channel: the JSON message envelope, the alert-level classifier
//! for sensor readings, and the connection manager that keeps one long-lived
//! WebSocket session alive over a flaky wireless link.
//!
//! The runtime model is single-threaded and cooperative. Nothing here blocks,
//! spawns, or awaits; the host calls [`RobotLink::poll`] from its main loop
//! and every timer, reconnect attempt, and inbound dispatch happens inside
//! that call. The actual socket lives behind the [`Transport`] trait so the
//! protocol logic stays testable without any network.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod alert;
pub mod client;
pub mod config;
pub mod envelope;
pub mod errors;
pub mod handlers;
pub mod state;
pub mod transport;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use alert::{classify, AlertLevel};
pub use client::RobotLink;
pub use config::LinkConfig;
pub use envelope::{ClientKind, Envelope, MessageKind};
pub use errors::{ConfigError, DecodeError, LinkError, StateError, TransportError};
pub use handlers::{LinkContext, LinkStats};
pub use state::{Effect, LinkEvent, LinkState};
pub use transport::{MockTransport, Transport, TransportEvent};
pub use types::{
    new_uuid, ConnectionId, ManualClock, MonotonicClock, RobotId, TimeSource, Timestamp,
};

// ----------------------------------------------------------------------------
// Result Alias
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, LinkError>;
