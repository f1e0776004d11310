use core::time::Duration;

use crate::motion_hal::{Attitude, MotionCallback, MotionSensor, SubscriptionHandle};

struct MockSubscription {
    handle: SubscriptionHandle,
    interval: Duration,
    callback: MotionCallback,
}

/// Sensor that only produces samples when told to via [`MotionSensorMock::emit`].
pub struct MotionSensorMock {
    available: bool,
    next_handle: u32,
    subscriptions: Vec<MockSubscription>,
}

impl MotionSensor for MotionSensorMock {
    fn is_available(&self) -> bool {
        self.available
    }

    fn subscribe(&mut self, interval: Duration, callback: MotionCallback) -> SubscriptionHandle {
        let handle = SubscriptionHandle(self.next_handle);
        self.next_handle += 1;

        self.subscriptions.push(MockSubscription {
            handle,
            interval,
            callback,
        });

        handle
    }

    fn cancel(&mut self, handle: SubscriptionHandle) {
        self.subscriptions
            .retain(|subscription| subscription.handle != handle);
    }
}

impl MotionSensorMock {
    pub fn new() -> Self {
        Self {
            available: true,
            next_handle: 0,
            subscriptions: Vec::new(),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    /// Delivers one sample to every live subscription.
    pub fn emit(&mut self, attitude: Option<Attitude>) {
        for subscription in self.subscriptions.iter_mut() {
            (subscription.callback)(attitude);
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn interval(&self, handle: SubscriptionHandle) -> Option<Duration> {
        self.subscriptions
            .iter()
            .find(|subscription| subscription.handle == handle)
            .map(|subscription| subscription.interval)
    }
}

impl Default for MotionSensorMock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn test_emit_reaches_subscribers() {
        let mut sensor = MotionSensorMock::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let received_ref = received.clone();
        let handle = sensor.subscribe(
            Duration::from_millis(500),
            Box::new(move |attitude| received_ref.lock().unwrap().push(attitude)),
        );

        assert_eq!(sensor.interval(handle), Some(Duration::from_millis(500)));

        let attitude = Attitude {
            roll: 0.5,
            pitch: -0.5,
        };
        sensor.emit(Some(attitude));
        sensor.emit(None);

        assert_eq!(*received.lock().unwrap(), vec![Some(attitude), None]);
    }

    #[test]
    fn test_cancel() {
        let mut sensor = MotionSensorMock::new();
        let counter = Arc::new(Mutex::new(0));

        let counter_ref = counter.clone();
        let handle = sensor.subscribe(
            Duration::from_millis(10),
            Box::new(move |_| *counter_ref.lock().unwrap() += 1),
        );

        sensor.emit(None);
        sensor.cancel(handle);
        sensor.emit(None);

        // Unknown handles are ignored
        sensor.cancel(SubscriptionHandle(42));

        assert_eq!(*counter.lock().unwrap(), 1);
        assert_eq!(sensor.subscription_count(), 0);
    }

    #[test]
    fn test_availability() {
        let mut sensor = MotionSensorMock::unavailable();
        assert!(!sensor.is_available());
        sensor.set_available(true);
        assert!(sensor.is_available());
    }
}
