//! Simulated sensor drivers
//!
//! Stand-ins for the hardware suite (ultrasonic, MQ-2 gas, DHT, PIR, flame).
//! Each produces plausible jittered readings; with `misbehave` enabled they
//! occasionally wander past the alert thresholds so the alert path gets
//! exercised end to end.

use rand::Rng;

// ----------------------------------------------------------------------------
// Samples and the Sensor Trait
// ----------------------------------------------------------------------------

/// One reading: a canonical sensor-type tag, a value, and its unit
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSample {
    pub sensor_type: &'static str,
    pub value: f64,
    pub unit: &'static str,
}

/// A sensor driver as the link sees it: initialize once, then read raw
/// values on demand. Classification happens in the link, never here.
pub trait Sensor {
    fn begin(&mut self) {}

    /// Read the sensor. A multi-value device (DHT) returns several samples.
    fn read(&mut self) -> Vec<SensorSample>;
}

fn excursion(misbehave: bool) -> bool {
    misbehave && rand::thread_rng().gen_bool(0.15)
}

// ----------------------------------------------------------------------------
// Drivers
// ----------------------------------------------------------------------------

/// HC-SR04 style distance sensor
pub struct UltrasonicSensor {
    misbehave: bool,
}

impl UltrasonicSensor {
    pub fn new(misbehave: bool) -> Self {
        Self { misbehave }
    }
}

impl Sensor for UltrasonicSensor {
    fn read(&mut self) -> Vec<SensorSample> {
        let mut rng = rand::thread_rng();
        let value = if excursion(self.misbehave) {
            rng.gen_range(3.0..20.0)
        } else {
            rng.gen_range(80.0..250.0)
        };
        vec![SensorSample {
            sensor_type: "distance",
            value,
            unit: "cm",
        }]
    }
}

/// MQ-2 combustible gas sensor
pub struct GasSensor {
    misbehave: bool,
}

impl GasSensor {
    pub fn new(misbehave: bool) -> Self {
        Self { misbehave }
    }
}

impl Sensor for GasSensor {
    fn read(&mut self) -> Vec<SensorSample> {
        let mut rng = rand::thread_rng();
        let value = if excursion(self.misbehave) {
            rng.gen_range(600.0..2500.0)
        } else {
            rng.gen_range(80.0..250.0)
        };
        vec![SensorSample {
            sensor_type: "gas",
            value,
            unit: "ppm",
        }]
    }
}

/// DHT11 combined temperature and humidity sensor
pub struct DhtSensor {
    misbehave: bool,
}

impl DhtSensor {
    pub fn new(misbehave: bool) -> Self {
        Self { misbehave }
    }
}

impl Sensor for DhtSensor {
    fn read(&mut self) -> Vec<SensorSample> {
        let mut rng = rand::thread_rng();
        let temperature = if excursion(self.misbehave) {
            rng.gen_range(40.0..70.0)
        } else {
            rng.gen_range(18.0..28.0)
        };
        let humidity = rng.gen_range(35.0..65.0);
        vec![
            SensorSample {
                sensor_type: "temperature",
                value: (temperature * 10.0_f64).round() / 10.0,
                unit: "C",
            },
            SensorSample {
                sensor_type: "humidity",
                value: (humidity * 10.0_f64).round() / 10.0,
                unit: "%",
            },
        ]
    }
}

/// PIR motion sensor: 1 when presence is detected. The quiet simulation sits
/// in an empty room; only the misbehaving one sees visitors.
pub struct MotionSensor {
    misbehave: bool,
}

impl MotionSensor {
    pub fn new(misbehave: bool) -> Self {
        Self { misbehave }
    }
}

impl Sensor for MotionSensor {
    fn read(&mut self) -> Vec<SensorSample> {
        let detected = self.misbehave && rand::thread_rng().gen_bool(0.3);
        vec![SensorSample {
            sensor_type: "motion",
            value: if detected { 1.0 } else { 0.0 },
            unit: "count",
        }]
    }
}

/// Infrared flame sensor, raw ADC intensity
pub struct FlameSensor {
    misbehave: bool,
}

impl FlameSensor {
    pub fn new(misbehave: bool) -> Self {
        Self { misbehave }
    }
}

impl Sensor for FlameSensor {
    fn read(&mut self) -> Vec<SensorSample> {
        let mut rng = rand::thread_rng();
        let value: f64 = if excursion(self.misbehave) {
            rng.gen_range(250.0..1000.0)
        } else {
            rng.gen_range(0.0..80.0)
        };
        vec![SensorSample {
            sensor_type: "flame",
            value: value.round(),
            unit: "adc",
        }]
    }
}

/// The full simulated suite in the order the firmware polls its hardware
pub fn standard_suite(misbehave: bool) -> Vec<Box<dyn Sensor>> {
    vec![
        Box::new(UltrasonicSensor::new(misbehave)),
        Box::new(GasSensor::new(misbehave)),
        Box::new(DhtSensor::new(misbehave)),
        Box::new(MotionSensor::new(misbehave)),
        Box::new(FlameSensor::new(misbehave)),
    ]
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use robolink_core::{classify, AlertLevel};

    #[test]
    fn quiet_sensors_stay_in_the_normal_band() {
        let mut suite = standard_suite(false);
        for _ in 0..50 {
            for sensor in &mut suite {
                for sample in sensor.read() {
                    assert_eq!(
                        classify(sample.sensor_type, sample.value),
                        AlertLevel::Normal,
                        "{} reading {} should be normal",
                        sample.sensor_type,
                        sample.value
                    );
                }
            }
        }
    }

    #[test]
    fn dht_reports_both_temperature_and_humidity() {
        let samples = DhtSensor::new(false).read();
        let tags: Vec<&str> = samples.iter().map(|s| s.sensor_type).collect();
        assert_eq!(tags, vec!["temperature", "humidity"]);
    }

    #[test]
    fn misbehaving_suite_eventually_alerts() {
        let mut suite = standard_suite(true);
        let mut alerted = false;
        for _ in 0..500 {
            for sensor in &mut suite {
                for sample in sensor.read() {
                    if classify(sample.sensor_type, sample.value) > AlertLevel::Normal {
                        alerted = true;
                    }
                }
            }
        }
        assert!(alerted, "500 misbehaving sweeps never crossed a threshold");
    }

    #[test]
    fn sample_tags_are_known_to_the_classifier() {
        use robolink_core::alert::SensorKind;
        let mut suite = standard_suite(false);
        for sensor in &mut suite {
            for sample in sensor.read() {
                assert!(SensorKind::from_tag(sample.sensor_type).is_some());
            }
        }
    }
}
