//! Wire envelope and message-type token tables
//!
//! Every WebSocket text frame carries exactly one JSON envelope. The token
//! tables are closed and bijective in both directions for the known set;
//! unknown inbound tokens become a typed [`DecodeError`] and the frame is
//! dropped, never a panic.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::alert::AlertLevel;
use crate::errors::DecodeError;
use crate::types::{new_uuid, Timestamp};

/// Default ceiling for a single text frame, in bytes.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 8 * 1024;

// ----------------------------------------------------------------------------
// Message Kinds
// ----------------------------------------------------------------------------

/// Message types carried in the envelope `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    ConnectionInit,
    SensorData,
    SensorAlert,
    VoiceCommand,
    VoiceTranscription,
    AiResponse,
    ActuatorCommand,
    BehaviorUpdate,
    EmotionUpdate,
    Heartbeat,
    StatusUpdate,
    ErrorMsg,
    Ack,
}

impl MessageKind {
    /// Wire token for this kind
    pub fn as_token(&self) -> &'static str {
        match self {
            MessageKind::ConnectionInit => "CONNECTION_INIT",
            MessageKind::SensorData => "SENSOR_DATA",
            MessageKind::SensorAlert => "SENSOR_ALERT",
            MessageKind::VoiceCommand => "VOICE_COMMAND",
            MessageKind::VoiceTranscription => "VOICE_TRANSCRIPTION",
            MessageKind::AiResponse => "AI_RESPONSE",
            MessageKind::ActuatorCommand => "ACTUATOR_COMMAND",
            MessageKind::BehaviorUpdate => "BEHAVIOR_UPDATE",
            MessageKind::EmotionUpdate => "EMOTION_UPDATE",
            MessageKind::Heartbeat => "HEARTBEAT",
            MessageKind::StatusUpdate => "STATUS_UPDATE",
            MessageKind::ErrorMsg => "ERROR_MSG",
            MessageKind::Ack => "ACK",
        }
    }

    /// Parse a wire token, returning `None` for unknown tokens
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "CONNECTION_INIT" => Some(MessageKind::ConnectionInit),
            "SENSOR_DATA" => Some(MessageKind::SensorData),
            "SENSOR_ALERT" => Some(MessageKind::SensorAlert),
            "VOICE_COMMAND" => Some(MessageKind::VoiceCommand),
            "VOICE_TRANSCRIPTION" => Some(MessageKind::VoiceTranscription),
            "AI_RESPONSE" => Some(MessageKind::AiResponse),
            "ACTUATOR_COMMAND" => Some(MessageKind::ActuatorCommand),
            "BEHAVIOR_UPDATE" => Some(MessageKind::BehaviorUpdate),
            "EMOTION_UPDATE" => Some(MessageKind::EmotionUpdate),
            "HEARTBEAT" => Some(MessageKind::Heartbeat),
            "STATUS_UPDATE" => Some(MessageKind::StatusUpdate),
            "ERROR_MSG" => Some(MessageKind::ErrorMsg),
            "ACK" => Some(MessageKind::Ack),
            _ => None,
        }
    }

    pub const ALL: [MessageKind; 13] = [
        MessageKind::ConnectionInit,
        MessageKind::SensorData,
        MessageKind::SensorAlert,
        MessageKind::VoiceCommand,
        MessageKind::VoiceTranscription,
        MessageKind::AiResponse,
        MessageKind::ActuatorCommand,
        MessageKind::BehaviorUpdate,
        MessageKind::EmotionUpdate,
        MessageKind::Heartbeat,
        MessageKind::StatusUpdate,
        MessageKind::ErrorMsg,
        MessageKind::Ack,
    ];
}

// ----------------------------------------------------------------------------
// Client Kinds
// ----------------------------------------------------------------------------

/// Client types known to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientKind {
    Esp32Type,
    AiEngine,
    WebClient,
    Mobile,
}

impl ClientKind {
    pub fn as_token(&self) -> &'static str {
        match self {
            ClientKind::Esp32Type => "ESP32_TYPE",
            ClientKind::AiEngine => "AI_ENGINE",
            ClientKind::WebClient => "WEB_CLIENT",
            ClientKind::Mobile => "MOBILE",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "ESP32_TYPE" => Some(ClientKind::Esp32Type),
            "AI_ENGINE" => Some(ClientKind::AiEngine),
            "WEB_CLIENT" => Some(ClientKind::WebClient),
            "MOBILE" => Some(ClientKind::Mobile),
            _ => None,
        }
    }
}

// ----------------------------------------------------------------------------
// Envelope
// ----------------------------------------------------------------------------

/// One message on the wire.
///
/// `target: None` serializes as `null` and means broadcast / server-routed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub source: String,
    pub target: Option<String>,
    pub timestamp: Timestamp,
    pub payload: Value,
}

impl Envelope {
    /// Build an outbound envelope with a fresh id
    pub fn new(
        kind: MessageKind,
        source: impl Into<String>,
        payload: Value,
        target: Option<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: new_uuid(),
            kind,
            source: source.into(),
            target,
            timestamp: now,
            payload,
        }
    }
}

/// Raw deserialization target; field presence is validated by hand so each
/// omission maps to a precise error.
#[derive(Deserialize)]
struct WireEnvelope {
    id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    source: Option<String>,
    #[serde(default)]
    target: Option<String>,
    timestamp: Option<u64>,
    payload: Option<Value>,
}

// ----------------------------------------------------------------------------
// Codec
// ----------------------------------------------------------------------------

/// Serialize an envelope into a single UTF-8 text frame.
///
/// Returns the encoded size alongside the ceiling when the frame is too big
/// to transmit.
pub fn encode_envelope(
    envelope: &Envelope,
    max_frame_bytes: usize,
) -> Result<Vec<u8>, crate::errors::StateError> {
    let bytes = serde_json::to_vec(envelope).map_err(|e| crate::errors::StateError::Encode {
        reason: e.to_string(),
    })?;
    if bytes.len() > max_frame_bytes {
        return Err(crate::errors::StateError::Oversize {
            size: bytes.len(),
            max: max_frame_bytes,
        });
    }
    Ok(bytes)
}

/// Parse one inbound text frame.
///
/// The length ceiling is checked before any parsing so an oversize frame
/// never costs unbounded allocation.
pub fn decode_envelope(bytes: &[u8], max_frame_bytes: usize) -> Result<Envelope, DecodeError> {
    if bytes.len() > max_frame_bytes {
        return Err(DecodeError::Oversize {
            size: bytes.len(),
            max: max_frame_bytes,
        });
    }
    let text = core::str::from_utf8(bytes).map_err(|_| DecodeError::NotUtf8)?;
    let wire: WireEnvelope = serde_json::from_str(text).map_err(|e| DecodeError::Json {
        reason: e.to_string(),
    })?;

    let id = wire.id.ok_or(DecodeError::MissingField("id"))?;
    let token = wire.kind.ok_or(DecodeError::MissingField("type"))?;
    let source = wire.source.ok_or(DecodeError::MissingField("source"))?;
    let timestamp = wire.timestamp.ok_or(DecodeError::MissingField("timestamp"))?;
    let payload = wire.payload.ok_or(DecodeError::MissingField("payload"))?;
    let kind = MessageKind::from_token(&token).ok_or(DecodeError::UnknownType(token))?;

    Ok(Envelope {
        id,
        kind,
        source,
        target: wire.target,
        timestamp: Timestamp::new(timestamp),
        payload,
    })
}

// ----------------------------------------------------------------------------
// Typed Payloads
// ----------------------------------------------------------------------------

/// Payload of the identity envelope sent right after the transport opens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionInit {
    pub robot_id: String,
    pub client_type: ClientKind,
}

/// Payload of SENSOR_DATA / SENSOR_ALERT telemetry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorReport {
    pub sensor_type: String,
    pub value: f64,
    pub unit: String,
    pub alert_level: AlertLevel,
}

/// Payload of ACK frames in both directions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckPayload {
    pub connection_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
}

impl AckPayload {
    pub fn from_value(value: &Value) -> Result<Self, DecodeError> {
        serde_json::from_value(value.clone()).map_err(|e| DecodeError::BadPayload {
            reason: e.to_string(),
        })
    }
}

/// Payload of ERROR_MSG frames
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
}

impl ErrorReport {
    pub fn from_value(value: &Value) -> Result<Self, DecodeError> {
        serde_json::from_value(value.clone()).map_err(|e| DecodeError::BadPayload {
            reason: e.to_string(),
        })
    }
}

/// Action tag of an actuator-command payload, when present.
///
/// Actuator payloads stay schemaless (`{ "action": ..., ... }` with
/// action-specific fields); the host composition interprets them.
pub fn actuator_action(payload: &Value) -> Option<&str> {
    payload.get("action").and_then(Value::as_str)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_envelope(kind: MessageKind) -> Envelope {
        Envelope::new(
            kind,
            "robot-001",
            json!({"k": 1}),
            None,
            Timestamp::new(1_234),
        )
    }

    #[test]
    fn kind_token_table_is_bijective() {
        for kind in MessageKind::ALL {
            assert_eq!(MessageKind::from_token(kind.as_token()), Some(kind));
        }
        assert_eq!(MessageKind::from_token("NOT_A_KIND"), None);
    }

    #[test]
    fn serde_kind_tokens_match_the_table() {
        for kind in MessageKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_token()));
        }
    }

    #[test]
    fn client_token_table_is_bijective() {
        for kind in [
            ClientKind::Esp32Type,
            ClientKind::AiEngine,
            ClientKind::WebClient,
            ClientKind::Mobile,
        ] {
            assert_eq!(ClientKind::from_token(kind.as_token()), Some(kind));
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_token()));
        }
    }

    #[test]
    fn round_trip_preserves_every_field() {
        let mut envelope = sample_envelope(MessageKind::SensorData);
        envelope.target = Some("server-7".to_string());
        let bytes = encode_envelope(&envelope, DEFAULT_MAX_FRAME_BYTES).unwrap();
        let decoded = decode_envelope(&bytes, DEFAULT_MAX_FRAME_BYTES).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn broadcast_target_serializes_as_null() {
        let envelope = sample_envelope(MessageKind::Heartbeat);
        let bytes = encode_envelope(&envelope, DEFAULT_MAX_FRAME_BYTES).unwrap();
        let raw: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(raw["target"], Value::Null);
        assert_eq!(raw["type"], "HEARTBEAT");
    }

    #[test]
    fn decode_rejects_malformed_json() {
        let err = decode_envelope(b"{not json", DEFAULT_MAX_FRAME_BYTES).unwrap_err();
        assert!(matches!(err, DecodeError::Json { .. }));
    }

    #[test]
    fn decode_rejects_missing_fields() {
        let err = decode_envelope(br#"{"type":"ACK"}"#, DEFAULT_MAX_FRAME_BYTES).unwrap_err();
        assert!(matches!(err, DecodeError::MissingField("id")));
    }

    #[test]
    fn decode_rejects_unknown_type_token() {
        let frame = serde_json::to_vec(&json!({
            "id": "x", "type": "TELEPORT", "source": "s",
            "timestamp": 1, "payload": {}
        }))
        .unwrap();
        let err = decode_envelope(&frame, DEFAULT_MAX_FRAME_BYTES).unwrap_err();
        assert_eq!(err.to_string(), "unknown message type token `TELEPORT`");
    }

    #[test]
    fn decode_rejects_oversize_before_parsing() {
        let frame = vec![b'{'; 9000];
        let err = decode_envelope(&frame, DEFAULT_MAX_FRAME_BYTES).unwrap_err();
        assert!(matches!(err, DecodeError::Oversize { size: 9000, .. }));
    }

    #[test]
    fn decode_rejects_invalid_utf8() {
        let err = decode_envelope(&[0xff, 0xfe, 0xfd], DEFAULT_MAX_FRAME_BYTES).unwrap_err();
        assert!(matches!(err, DecodeError::NotUtf8));
    }

    #[test]
    fn encode_rejects_oversize() {
        let mut envelope = sample_envelope(MessageKind::SensorData);
        envelope.payload = json!({ "blob": "x".repeat(9000) });
        let err = encode_envelope(&envelope, DEFAULT_MAX_FRAME_BYTES).unwrap_err();
        assert!(matches!(err, crate::errors::StateError::Oversize { .. }));
    }

    #[test]
    fn ack_payload_parses_with_and_without_ref() {
        let ack = AckPayload::from_value(&json!({"connection_id": "c-42"})).unwrap();
        assert_eq!(ack.connection_id, "c-42");
        assert_eq!(ack.ref_id, None);

        let ack =
            AckPayload::from_value(&json!({"connection_id": "c-42", "ref_id": "m-1"})).unwrap();
        assert_eq!(ack.ref_id.as_deref(), Some("m-1"));

        assert!(AckPayload::from_value(&json!({"ref_id": "m-1"})).is_err());
    }

    #[test]
    fn actuator_action_is_extracted() {
        let payload = json!({"action": "play_sound", "url": "http://x/y", "volume": 5});
        assert_eq!(actuator_action(&payload), Some("play_sound"));
        assert_eq!(actuator_action(&json!({"volume": 5})), None);
    }
}
