//! Core types for the RoboLink protocol
//!
//! Newtype wrappers for the identifiers that cross the wire, plus the
//! monotonic clock abstraction everything else is driven by.

use core::fmt;
use core::ops::{Add, Sub};
use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

// ----------------------------------------------------------------------------
// Timestamp
// ----------------------------------------------------------------------------

/// Milliseconds since device boot. Monotonically non-decreasing, not wall time.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a timestamp from raw milliseconds
    pub fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// Get the raw milliseconds
    pub fn as_millis(&self) -> u64 {
        self.0
    }
}

impl Add<u64> for Timestamp {
    type Output = Timestamp;

    fn add(self, millis: u64) -> Timestamp {
        Timestamp(self.0.saturating_add(millis))
    }
}

impl Sub for Timestamp {
    type Output = u64;

    fn sub(self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

// ----------------------------------------------------------------------------
// Time Source Trait
// ----------------------------------------------------------------------------

/// Provider of the device's monotonic clock.
///
/// The connection manager never reads time directly; it asks its injected
/// `TimeSource` so heartbeat and reconnect cadence are deterministic under
/// test.
pub trait TimeSource {
    /// Current monotonic time
    fn now(&self) -> Timestamp;
}

impl<C: TimeSource + ?Sized> TimeSource for Rc<C> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

/// Production time source: milliseconds since construction, backed by
/// [`std::time::Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    boot: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            boot: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicClock {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.boot.elapsed().as_millis() as u64)
    }
}

/// Hand-cranked time source for deterministic tests.
///
/// Share it through an `Rc` so the test harness keeps a handle to the clock
/// it handed to the link.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: Cell<u64>,
}

impl ManualClock {
    pub fn new(start_millis: u64) -> Self {
        Self {
            millis: Cell::new(start_millis),
        }
    }

    /// Advance the clock by `millis`
    pub fn advance(&self, millis: u64) {
        self.millis.set(self.millis.get().saturating_add(millis));
    }

    /// Jump the clock to an absolute value (must not go backwards)
    pub fn set(&self, millis: u64) {
        debug_assert!(millis >= self.millis.get());
        self.millis.set(millis);
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.millis.get())
    }
}

// ----------------------------------------------------------------------------
// Identifiers
// ----------------------------------------------------------------------------

/// Stable device identifier, injected at construction and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RobotId(String);

impl RobotId {
    /// Create a robot id; rejects the empty string
    pub fn new(id: impl Into<String>) -> Result<Self, ConfigError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ConfigError::EmptyRobotId);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RobotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-assigned connection identifier, delivered in the registration ack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ----------------------------------------------------------------------------
// Message Identifiers
// ----------------------------------------------------------------------------

/// Fresh random per-message id: a canonical 36-character hyphenated UUID.
pub fn new_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
