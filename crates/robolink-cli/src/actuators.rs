//! Actuator stubs driven by server commands
//!
//! The real robot drives an I2S speaker and a small display; here both just
//! log what they would do, which is enough to exercise command dispatch end
//! to end.

use serde::Deserialize;
use serde_json::Value;

use robolink_core::envelope::actuator_action;

// ----------------------------------------------------------------------------
// Command Payloads
// ----------------------------------------------------------------------------

/// `play_sound` command fields
#[derive(Debug, Clone, Deserialize)]
pub struct PlaySound {
    pub url: String,
    #[serde(default = "default_volume")]
    pub volume: i64,
}

fn default_volume() -> i64 {
    5
}

impl PlaySound {
    /// Volume clamped into the speaker's 0..=10 range
    pub fn clamped_volume(&self) -> u8 {
        self.volume.clamp(0, 10) as u8
    }
}

/// `show` command fields for the display
#[derive(Debug, Clone, Deserialize)]
pub struct Show {
    pub content: String,
}

// ----------------------------------------------------------------------------
// Actuator Stubs
// ----------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Speaker;

impl Speaker {
    pub fn play(&mut self, url: &str, volume: u8) {
        tracing::info!(url, volume, "speaker: playing stream");
    }
}

#[derive(Debug, Default)]
pub struct Display;

impl Display {
    pub fn show(&mut self, content: &str) {
        tracing::info!(content, "display: showing");
    }
}

// ----------------------------------------------------------------------------
// Command Routing
// ----------------------------------------------------------------------------

/// The local output devices, routed to by action tag
#[derive(Debug, Default)]
pub struct ActuatorBank {
    pub speaker: Speaker,
    pub display: Display,
}

impl ActuatorBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute one actuator-command payload.
    ///
    /// Unknown actions and malformed payloads are reported, not fatal: the
    /// server may know about hardware this build does not have.
    pub fn handle(&mut self, payload: &Value) -> Result<(), String> {
        match actuator_action(payload) {
            Some("play_sound") => {
                let cmd: PlaySound = serde_json::from_value(payload.clone())
                    .map_err(|e| format!("bad play_sound payload: {e}"))?;
                self.speaker.play(&cmd.url, cmd.clamped_volume());
                Ok(())
            }
            Some("show") => {
                let cmd: Show = serde_json::from_value(payload.clone())
                    .map_err(|e| format!("bad show payload: {e}"))?;
                self.display.show(&cmd.content);
                Ok(())
            }
            Some(other) => Err(format!("unsupported action `{other}`")),
            None => Err("actuator command without an action".to_string()),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
