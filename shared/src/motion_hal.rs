use core::time::Duration;

use serde::{Deserialize, Serialize};

/// Orientation of the handheld device, in radians.
///
/// `roll` is width-ways rotation where tilting to the right is positive,
/// `pitch` is length-ways rotation where tilting towards the user is positive.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Attitude {
    pub roll: f64,
    pub pitch: f64,
}

/// Invoked once per sample. `None` when the sensor has not produced an
/// attitude yet.
pub type MotionCallback = Box<dyn FnMut(Option<Attitude>) + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(pub u32);

pub trait MotionSensor {
    fn is_available(&self) -> bool;

    fn subscribe(&mut self, interval: Duration, callback: MotionCallback) -> SubscriptionHandle;
    fn cancel(&mut self, handle: SubscriptionHandle);
}
