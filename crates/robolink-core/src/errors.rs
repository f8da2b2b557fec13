//! Error types for the RoboLink protocol
//!
//! Every failure mode is locally recovered; the device never halts on a link
//! error. These types exist so each recovery path is observable through the
//! error callback and distinguishable in tests.

use thiserror::Error;

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Socket open/send/close failures
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect to {host}:{port} failed: {reason}")]
    OpenFailed {
        host: String,
        port: u16,
        reason: String,
    },
    #[error("transport is not open")]
    NotOpen,
    #[error("transport busy, outbound frame dropped")]
    Busy,
    #[error("send failed: {reason}")]
    SendFailed { reason: String },
    #[error("transport failure: {reason}")]
    Failed { reason: String },
    #[error("network i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Inbound frame rejection
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame of {size} bytes exceeds the {max} byte ceiling")]
    Oversize { size: usize, max: usize },
    #[error("frame is not valid UTF-8")]
    NotUtf8,
    #[error("malformed JSON: {reason}")]
    Json { reason: String },
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("unknown message type token `{0}`")]
    UnknownType(String),
    #[error("unexpected payload shape: {reason}")]
    BadPayload { reason: String },
}

/// Send attempted that the current connection state cannot satisfy
#[derive(Debug, Error)]
pub enum StateError {
    #[error("not registered with the server (state {state})")]
    NotRegistered { state: &'static str },
    #[error("encoded frame of {size} bytes exceeds the {max} byte ceiling")]
    Oversize { size: usize, max: usize },
    #[error("could not encode outbound frame: {reason}")]
    Encode { reason: String },
}

/// Invalid construction-time or setter configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("robot id must not be empty")]
    EmptyRobotId,
    #[error("server host must not be empty")]
    EmptyServerHost,
    #[error("{name} must be a positive number of milliseconds")]
    NonPositiveInterval { name: &'static str },
    #[error("maximum frame size must be positive")]
    ZeroFrameCeiling,
}

// ----------------------------------------------------------------------------
// Core Error Type
// ----------------------------------------------------------------------------

/// Core error type for the RoboLink protocol
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A user callback panicked; caught at the dispatch boundary
    #[error("callback panicked during {context}")]
    Callback { context: &'static str },

    /// An ERROR_MSG envelope arrived from the server
    #[error("server error: {message}")]
    Remote { message: String, code: Option<i64> },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl LinkError {
    /// Create a transport failure from any printable reason
    pub fn transport_failed<R: Into<String>>(reason: R) -> Self {
        LinkError::Transport(TransportError::Failed {
            reason: reason.into(),
        })
    }

    /// Create a bad-payload decode error
    pub fn bad_payload<R: Into<String>>(reason: R) -> Self {
        LinkError::Decode(DecodeError::BadPayload {
            reason: reason.into(),
        })
    }

    /// True when this error came from the remote end
    pub fn is_remote(&self) -> bool {
        matches!(self, LinkError::Remote { .. })
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_failure() {
        let err = LinkError::from(DecodeError::UnknownType("BOGUS".to_string()));
        assert!(err.to_string().contains("BOGUS"));

        let err = LinkError::from(StateError::NotRegistered {
            state: "Disconnected",
        });
        assert!(err.to_string().contains("Disconnected"));
    }

    #[test]
    fn remote_errors_are_distinguishable() {
        let err = LinkError::Remote {
            message: "overload".to_string(),
            code: Some(503),
        };
        assert!(err.is_remote());
        assert!(!LinkError::transport_failed("x").is_remote());
    }
}
