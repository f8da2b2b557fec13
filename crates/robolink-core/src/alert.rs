//! Alert-level classification for sensor readings
//!
//! The threshold table here is the single source of truth for how raw sensor
//! values map to alert severities. Sensor drivers report numbers and never
//! classify; unknown sensor types classify as [`AlertLevel::Normal`].

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Alert Levels
// ----------------------------------------------------------------------------

/// Ordinal severity attached to sensor telemetry
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertLevel {
    #[default]
    Normal,
    Warning,
    Danger,
    Critical,
}

impl AlertLevel {
    /// Wire token for this level
    pub fn as_token(&self) -> &'static str {
        match self {
            AlertLevel::Normal => "NORMAL",
            AlertLevel::Warning => "WARNING",
            AlertLevel::Danger => "DANGER",
            AlertLevel::Critical => "CRITICAL",
        }
    }

    /// Parse a wire token, returning `None` for unknown tokens
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "NORMAL" => Some(AlertLevel::Normal),
            "WARNING" => Some(AlertLevel::Warning),
            "DANGER" => Some(AlertLevel::Danger),
            "CRITICAL" => Some(AlertLevel::Critical),
            _ => None,
        }
    }
}

// ----------------------------------------------------------------------------
// Sensor Kinds
// ----------------------------------------------------------------------------

/// The sensor types the classifier knows thresholds for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Gas,
    Flame,
    Distance,
    Temperature,
    Humidity,
    Motion,
}

impl SensorKind {
    /// Recognize a canonical sensor-type tag (case-insensitive)
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "gas" => Some(SensorKind::Gas),
            "flame" => Some(SensorKind::Flame),
            "distance" | "ultrasonic" => Some(SensorKind::Distance),
            "temperature" => Some(SensorKind::Temperature),
            "humidity" => Some(SensorKind::Humidity),
            "motion" => Some(SensorKind::Motion),
            _ => None,
        }
    }

    pub const ALL: [SensorKind; 6] = [
        SensorKind::Gas,
        SensorKind::Flame,
        SensorKind::Distance,
        SensorKind::Temperature,
        SensorKind::Humidity,
        SensorKind::Motion,
    ];
}

// ----------------------------------------------------------------------------
// Threshold Table
// ----------------------------------------------------------------------------

/// Whether severity grows with the value (gas, heat) or against it
/// (proximity: a smaller distance is worse).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    HighIsBad,
    LowIsBad,
}

/// One row of the table: cut points in severity order
/// (warning, danger, critical). Comparison is inclusive at every cut, so a
/// value sitting exactly on a boundary takes the higher level.
#[derive(Debug, Clone, Copy)]
struct Thresholds {
    direction: Direction,
    warning: f64,
    danger: f64,
    critical: f64,
}

fn thresholds(kind: SensorKind) -> Thresholds {
    match kind {
        // ppm from the MQ-2 gas sensor
        SensorKind::Gas => Thresholds {
            direction: Direction::HighIsBad,
            warning: 500.0,
            danger: 1000.0,
            critical: 2000.0,
        },
        // raw ADC intensity, 0..1023
        SensorKind::Flame => Thresholds {
            direction: Direction::HighIsBad,
            warning: 200.0,
            danger: 500.0,
            critical: 800.0,
        },
        // centimeters to the nearest obstacle
        SensorKind::Distance => Thresholds {
            direction: Direction::LowIsBad,
            warning: 50.0,
            danger: 25.0,
            critical: 10.0,
        },
        // degrees Celsius
        SensorKind::Temperature => Thresholds {
            direction: Direction::HighIsBad,
            warning: 35.0,
            danger: 45.0,
            critical: 60.0,
        },
        // percent relative humidity
        SensorKind::Humidity => Thresholds {
            direction: Direction::HighIsBad,
            warning: 70.0,
            danger: 85.0,
            critical: 95.0,
        },
        // PIR event count per reading; 1 means presence detected
        SensorKind::Motion => Thresholds {
            direction: Direction::HighIsBad,
            warning: 1.0,
            danger: 2.0,
            critical: 3.0,
        },
    }
}

// ----------------------------------------------------------------------------
// Classification
// ----------------------------------------------------------------------------

/// Classify a reading into an alert level.
///
/// Pure: same inputs, same answer. Unknown sensor tags are `Normal`.
pub fn classify(sensor_type: &str, value: f64) -> AlertLevel {
    let Some(kind) = SensorKind::from_tag(sensor_type) else {
        return AlertLevel::Normal;
    };
    let t = thresholds(kind);
    match t.direction {
        Direction::HighIsBad => {
            if value >= t.critical {
                AlertLevel::Critical
            } else if value >= t.danger {
                AlertLevel::Danger
            } else if value >= t.warning {
                AlertLevel::Warning
            } else {
                AlertLevel::Normal
            }
        }
        Direction::LowIsBad => {
            if value <= t.critical {
                AlertLevel::Critical
            } else if value <= t.danger {
                AlertLevel::Danger
            } else if value <= t.warning {
                AlertLevel::Warning
            } else {
                AlertLevel::Normal
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
