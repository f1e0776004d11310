use core::f64::consts::PI;
use core::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use crate::motion_hal::Attitude;

/// Tilt below this angle (radians) is treated as noise and reads as zero.
pub const DEAD_ZONE: f64 = PI / 20.0;

/// Tilt above this angle (radians) reads as full deflection.
pub const SATURATION: f64 = PI / 2.0;

/// Maps a raw attitude angle in radians (expected within `[-pi, pi]`) to a
/// control value in `[-1, 1]`.
///
/// Angles inside `(-DEAD_ZONE, DEAD_ZONE)` read as zero and angles beyond
/// `SATURATION` in either direction read as `+-1`. In between the value is
/// interpolated linearly. The boundaries themselves land on the interpolated
/// branch, which yields `0` at `+-DEAD_ZONE` and `+-1` at `+-SATURATION`.
pub fn normalize(value: f64) -> f64 {
    if value > 0.0 {
        if value < DEAD_ZONE {
            return 0.0;
        }

        if value > SATURATION {
            return 1.0;
        }

        (value - DEAD_ZONE) / (SATURATION - DEAD_ZONE)
    } else if value < 0.0 {
        if value > -DEAD_ZONE {
            return 0.0;
        }

        if value < -SATURATION {
            return -1.0;
        }

        (value + DEAD_ZONE) / (SATURATION - DEAD_ZONE)
    } else {
        // Zero, and NaN which is neither side of it
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum ControlAxis {
    Throttle,
    Steering,
}

/// How one axis is driven for the duration of a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum ControlSelection {
    #[default]
    UserControlled,
    Automatic,
    Constant(f64),
}

impl ControlSelection {
    /// Resolves the selection from the automatic / constant switch pair of the
    /// settings form. Both switches on is not a valid combination and falls
    /// back to user control, like both switches off.
    pub fn from_switches(automatic: bool, constant: bool, value: f64) -> Self {
        match (automatic, constant) {
            (true, false) => ControlSelection::Automatic,
            (false, true) => ControlSelection::Constant(value),
            (true, true) | (false, false) => ControlSelection::UserControlled,
        }
    }

    /// Percentage readout of a constant selection, e.g. `"45%"`.
    pub fn label(&self) -> Option<String> {
        match self {
            ControlSelection::Constant(value) => Some(format!("{}%", (value * 100.0) as i32)),
            _ => None,
        }
    }

    pub fn resolve(&self, raw: f64) -> ControlValue {
        match self {
            ControlSelection::UserControlled => ControlValue::Normalized(normalize(raw)),
            ControlSelection::Automatic => ControlValue::Automatic,
            ControlSelection::Constant(value) => ControlValue::Constant(*value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct SessionSettings {
    pub throttle: ControlSelection,
    pub steering: ControlSelection,
}

impl SessionSettings {
    pub fn selection(&self, axis: ControlAxis) -> ControlSelection {
        match axis {
            ControlAxis::Throttle => self.throttle,
            ControlAxis::Steering => self.steering,
        }
    }
}

/// Raw angles of one motion sample. Throttle follows the roll of the device
/// and steering follows its pitch.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlSample {
    pub throttle_raw: f64,
    pub steering_raw: f64,
}

impl ControlSample {
    pub fn from_attitude(attitude: Option<Attitude>) -> Self {
        let attitude = attitude.unwrap_or_default();

        Self {
            throttle_raw: attitude.roll,
            steering_raw: attitude.pitch,
        }
    }

    pub fn raw(&self, axis: ControlAxis) -> f64 {
        match axis {
            ControlAxis::Throttle => self.throttle_raw,
            ControlAxis::Steering => self.steering_raw,
        }
    }

}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlValue {
    Normalized(f64),
    Automatic,
    Constant(f64),
}

/// Renders the value part of a control message. Numbers use the shortest
/// round-trip form of `f64` with a fractional part kept, so `1` is `"1.0"`.
/// Very small or large magnitudes switch to exponent notation without
/// zero padding, e.g. `"7e-7"` rather than `"7e-07"`.
impl fmt::Display for ControlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlValue::Normalized(value) | ControlValue::Constant(value) => {
                write!(f, "{:?}", value)
            }
            ControlValue::Automatic => write!(f, "auto"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlCommand {
    pub throttle: ControlValue,
    pub steering: ControlValue,
}

impl ControlCommand {
    pub fn from_sample(sample: ControlSample, settings: &SessionSettings) -> Self {
        Self {
            throttle: settings
                .selection(ControlAxis::Throttle)
                .resolve(sample.raw(ControlAxis::Throttle)),
            steering: settings
                .selection(ControlAxis::Steering)
                .resolve(sample.raw(ControlAxis::Steering)),
        }
    }

    pub fn value(&self, axis: ControlAxis) -> ControlValue {
        match axis {
            ControlAxis::Throttle => self.throttle,
            ControlAxis::Steering => self.steering,
        }
    }

    pub fn payload(&self, axis: ControlAxis) -> String {
        format!("{}:{}", axis, self.value(axis))
    }

    /// Message bodies in publishing order: throttle first, then steering.
    pub fn payloads(&self) -> [String; 2] {
        [
            self.payload(ControlAxis::Throttle),
            self.payload(ControlAxis::Steering),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    const EPSILON: f64 = 1e-12;

    #[test]
    fn test_normalize_zero() {
        assert_eq!(normalize(0.0), 0.0);
        assert_eq!(normalize(-0.0), 0.0);
    }

    #[test]
    fn test_normalize_dead_zone() {
        for value in [1e-9, 0.01, 0.1, DEAD_ZONE - 1e-9] {
            assert_eq!(normalize(value), 0.0, "value {}", value);
            assert_eq!(normalize(-value), 0.0, "value {}", -value);
        }
    }

    #[test]
    fn test_normalize_saturation() {
        for value in [SATURATION + 1e-9, 2.0, 3.0, PI] {
            assert_eq!(normalize(value), 1.0, "value {}", value);
            assert_eq!(normalize(-value), -1.0, "value {}", -value);
        }
    }

    #[test]
    fn test_normalize_boundaries_interpolate() {
        assert_eq!(normalize(DEAD_ZONE), 0.0);
        assert_eq!(normalize(-DEAD_ZONE), 0.0);
        assert_eq!(normalize(SATURATION), 1.0);
        assert_eq!(normalize(-SATURATION), -1.0);
    }

    #[test]
    fn test_normalize_active_zone() {
        let expected = (0.3 - PI / 20.0) / (PI / 2.0 - PI / 20.0);
        assert!((normalize(0.3) - expected).abs() < EPSILON);
        assert!((normalize(0.3) - 0.1012).abs() < 1e-3);

        let midpoint = (DEAD_ZONE + SATURATION) / 2.0;
        assert!((normalize(midpoint) - 0.5).abs() < EPSILON);
    }

    #[test]
    fn test_normalize_odd_symmetry() {
        let mut value = -PI;
        while value <= PI {
            assert!(
                (normalize(value) + normalize(-value)).abs() < EPSILON,
                "value {}",
                value
            );
            value += 0.01;
        }
    }

    #[test]
    fn test_normalize_monotonic_in_active_zone() {
        let steps = 200;
        let width = SATURATION - DEAD_ZONE;
        let mut previous = normalize(DEAD_ZONE + width / (steps as f64 + 1.0));

        for step in 2..=steps {
            let value = DEAD_ZONE + width * (step as f64) / (steps as f64 + 1.0);
            let current = normalize(value);
            assert!(current > previous, "value {}", value);
            assert!(current > 0.0 && current < 1.0);
            previous = current;
        }
    }

    #[test]
    fn test_normalize_nan() {
        assert_eq!(normalize(f64::NAN), 0.0);
    }

    #[test]
    fn test_selection_from_switches() {
        assert_eq!(
            ControlSelection::from_switches(false, false, 0.4),
            ControlSelection::UserControlled
        );
        assert_eq!(
            ControlSelection::from_switches(true, true, 0.4),
            ControlSelection::UserControlled
        );
        assert_eq!(
            ControlSelection::from_switches(true, false, 0.4),
            ControlSelection::Automatic
        );
        assert_eq!(
            ControlSelection::from_switches(false, true, 0.4),
            ControlSelection::Constant(0.4)
        );
    }

    #[test]
    fn test_selection_label() {
        assert_eq!(ControlSelection::Constant(0.456).label().as_deref(), Some("45%"));
        assert_eq!(ControlSelection::Constant(1.0).label().as_deref(), Some("100%"));
        assert_eq!(ControlSelection::Automatic.label(), None);
        assert_eq!(ControlSelection::UserControlled.label(), None);
    }

    #[test]
    fn test_sample_from_attitude() {
        let sample = ControlSample::from_attitude(Some(Attitude {
            roll: 0.3,
            pitch: -2.0,
        }));
        assert_eq!(sample.raw(ControlAxis::Throttle), 0.3);
        assert_eq!(sample.raw(ControlAxis::Steering), -2.0);

        assert_eq!(ControlSample::from_attitude(None), ControlSample::default());
    }

    #[test]
    fn test_user_controlled_payloads() {
        let sample = ControlSample {
            throttle_raw: 2.0,
            steering_raw: 0.05,
        };
        let command = ControlCommand::from_sample(sample, &SessionSettings::default());

        assert_eq!(command.payloads(), ["throttle:1.0", "steering:0.0"]);
    }

    #[test]
    fn test_override_payloads() {
        let settings = SessionSettings {
            throttle: ControlSelection::Constant(0.25),
            steering: ControlSelection::Automatic,
        };
        let sample = ControlSample {
            throttle_raw: -3.0,
            steering_raw: 1.0,
        };
        let command = ControlCommand::from_sample(sample, &settings);

        assert_eq!(command.payloads(), ["throttle:0.25", "steering:auto"]);
    }

    #[test]
    fn test_value_rendering() {
        assert_eq!(ControlValue::Normalized(1.0).to_string(), "1.0");
        assert_eq!(ControlValue::Normalized(-0.25).to_string(), "-0.25");
        assert_eq!(ControlValue::Constant(7e-7).to_string(), "7e-7");
        assert_eq!(ControlValue::Automatic.to_string(), "auto");
    }

    #[test]
    fn test_axis_order_and_names() {
        let names: Vec<String> = ControlAxis::iter().map(|axis| axis.to_string()).collect();
        assert_eq!(names, vec!["throttle", "steering"]);
    }

    #[test]
    fn test_settings_serialization() {
        let settings = SessionSettings {
            throttle: ControlSelection::Constant(0.5),
            steering: ControlSelection::UserControlled,
        };
        let serialized = serde_json::to_string(&settings).unwrap();
        assert_eq!(
            serialized,
            "{\"throttle\":{\"mode\":\"constant\",\"value\":0.5},\"steering\":{\"mode\":\"user_controlled\"}}"
        );
    }
}
