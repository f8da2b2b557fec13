//! Link configuration
//!
//! Everything is passed at construction; there are no config files and no
//! persisted state. `validate` runs in the [`crate::RobotLink`] constructor
//! so nothing invalid is ever latent.

use serde::{Deserialize, Serialize};

use crate::envelope::DEFAULT_MAX_FRAME_BYTES;
use crate::errors::ConfigError;

/// Default heartbeat cadence while registered
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 30_000;
/// Default fixed reconnect backoff
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 5_000;

// ----------------------------------------------------------------------------
// Link Configuration
// ----------------------------------------------------------------------------

/// Configuration for one [`crate::RobotLink`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// WebSocket server host
    pub server_host: String,
    /// WebSocket server port
    pub server_port: u16,
    /// Stable device identifier announced in the init frame
    pub robot_id: String,
    /// Heartbeat cadence while registered, in milliseconds
    pub heartbeat_interval_ms: u64,
    /// Fixed reconnect backoff, in milliseconds. A connection attempt that
    /// has not opened within twice this window is aborted.
    pub reconnect_interval_ms: u64,
    /// Ceiling for a single frame in either direction, in bytes
    pub max_frame_bytes: usize,
}

impl LinkConfig {
    /// Create a configuration with default cadences
    pub fn new(
        server_host: impl Into<String>,
        server_port: u16,
        robot_id: impl Into<String>,
    ) -> Self {
        Self {
            server_host: server_host.into(),
            server_port,
            robot_id: robot_id.into(),
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            reconnect_interval_ms: DEFAULT_RECONNECT_INTERVAL_MS,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }

    /// Configuration with short cadences for tests
    pub fn testing() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 9001,
            robot_id: "robot-under-test".to_string(),
            heartbeat_interval_ms: 1_000,
            reconnect_interval_ms: 100,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }

    /// Override the heartbeat cadence
    pub fn with_heartbeat_interval_ms(mut self, millis: u64) -> Self {
        self.heartbeat_interval_ms = millis;
        self
    }

    /// Override the reconnect backoff
    pub fn with_reconnect_interval_ms(mut self, millis: u64) -> Self {
        self.reconnect_interval_ms = millis;
        self
    }

    /// Override the frame ceiling
    pub fn with_max_frame_bytes(mut self, bytes: usize) -> Self {
        self.max_frame_bytes = bytes;
        self
    }

    /// Check the configuration for feasibility
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_host.is_empty() {
            return Err(ConfigError::EmptyServerHost);
        }
        if self.robot_id.is_empty() {
            return Err(ConfigError::EmptyRobotId);
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::NonPositiveInterval {
                name: "heartbeat_interval_ms",
            });
        }
        if self.reconnect_interval_ms == 0 {
            return Err(ConfigError::NonPositiveInterval {
                name: "reconnect_interval_ms",
            });
        }
        if self.max_frame_bytes == 0 {
            return Err(ConfigError::ZeroFrameCeiling);
        }
        Ok(())
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self::new("127.0.0.1", 8080, "robot-001")
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(LinkConfig::default().validate().is_ok());
        assert!(LinkConfig::testing().validate().is_ok());
    }

    #[test]
    fn empty_identifiers_are_rejected() {
        let config = LinkConfig::new("", 8080, "robot-001");
        assert_eq!(config.validate(), Err(ConfigError::EmptyServerHost));

        let config = LinkConfig::new("example", 8080, "");
        assert_eq!(config.validate(), Err(ConfigError::EmptyRobotId));
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let config = LinkConfig::default().with_heartbeat_interval_ms(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositiveInterval {
                name: "heartbeat_interval_ms"
            })
        ));

        let config = LinkConfig::default().with_reconnect_interval_ms(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositiveInterval {
                name: "reconnect_interval_ms"
            })
        ));

        let config = LinkConfig::default().with_max_frame_bytes(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroFrameCeiling));
    }
}
