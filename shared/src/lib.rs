#![forbid(unsafe_code)]

pub mod connection;
pub mod control;
pub mod motion_hal;
pub mod motion_mock;

pub use connection::{Connection, ConnectionError};
pub use control::{normalize, ControlCommand, ControlSample, ControlSelection, SessionSettings};
pub use motion_hal::{Attitude, MotionCallback, MotionSensor, SubscriptionHandle};

/// Cadence the control loop samples the motion sensor at, in milliseconds.
pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 500;

/// Default port of an MQTT broker without TLS.
pub const DEFAULT_BROKER_PORT: u16 = 1883;
