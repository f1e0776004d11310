use std::{
    sync::{Arc, Mutex, PoisonError},
    thread,
    time::Duration,
};

use shared::{
    Attitude, Connection, ControlCommand, ControlSample, MotionSensor, SubscriptionHandle,
};
use thiserror::Error;

use crate::{
    process_is_running,
    publisher::{PublishError, Publisher, PublisherFactory},
    session::SessionHandler,
};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

type SharedPublisher = Arc<Mutex<Box<dyn Publisher>>>;

#[derive(Debug, Error)]
pub enum DriveError {
    #[error("Motion is not available on this device: remote control requires both an accelerometer and a gyroscope")]
    MotionUnavailable,
    #[error("Failed to connect to {hostname}: {source}")]
    Publisher {
        hostname: String,
        source: PublishError,
    },
}

/// Turns motion samples into control messages for one session.
pub struct ControlLoop {
    session: Arc<SessionHandler>,
    topic: String,
    publisher: SharedPublisher,
}

impl ControlLoop {
    pub fn on_sample(&self, attitude: Option<Attitude>) {
        let settings = self.session.settings();
        let command = ControlCommand::from_sample(ControlSample::from_attitude(attitude), &settings);

        self.session.record_command(command);

        if self.session.is_paused() {
            return;
        }

        let mut publisher = self
            .publisher
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        for payload in command.payloads() {
            if let Err(err) = publisher.publish(&self.topic, &payload) {
                log::warn!("drive_thread: Failed to publish '{}': {}", payload, err);
            }
        }
    }
}

struct ActiveSession {
    generation: u64,
    subscription: SubscriptionHandle,
    publisher: SharedPublisher,
}

struct DriveThread<S> {
    session: Arc<SessionHandler>,
    sensor: S,
    publisher_factory: PublisherFactory,
    interval: Duration,
    active: Option<ActiveSession>,
}

impl<S> DriveThread<S>
where
    S: MotionSensor,
{
    fn new(
        session: Arc<SessionHandler>,
        sensor: S,
        publisher_factory: PublisherFactory,
        interval: Duration,
    ) -> Self {
        Self {
            session,
            sensor,
            publisher_factory,
            interval,
            active: None,
        }
    }

    fn run(&mut self) {
        while process_is_running() {
            self.update();
            thread::sleep(POLL_INTERVAL);
        }

        self.end();
    }

    fn update(&mut self) {
        if let Some(active) = &self.active {
            if !self.session.is_current(active.generation) {
                self.end();
            }
        }

        if self.active.is_some() {
            return;
        }

        if let Some((generation, connection)) = self.session.pending() {
            match self.begin(generation, connection) {
                Ok(active) => {
                    self.session.set_driving(generation);
                    self.active = Some(active);
                }
                Err(err) => self.session.fail(generation, err.to_string()),
            }
        }
    }

    fn begin(&mut self, generation: u64, connection: Connection) -> Result<ActiveSession, DriveError> {
        if !self.sensor.is_available() {
            return Err(DriveError::MotionUnavailable);
        }

        let publisher = (self.publisher_factory)(&connection).map_err(|err| DriveError::Publisher {
            hostname: connection.hostname.clone(),
            source: err,
        })?;
        let publisher: SharedPublisher = Arc::new(Mutex::new(publisher));

        let control_loop = ControlLoop {
            session: self.session.clone(),
            topic: connection.topic.clone(),
            publisher: publisher.clone(),
        };

        let subscription = self.sensor.subscribe(
            self.interval,
            Box::new(move |attitude| control_loop.on_sample(attitude)),
        );

        log::info!(
            "drive_thread: Driving {} on '{}' every {:?}",
            connection.hostname,
            connection.topic,
            self.interval
        );

        Ok(ActiveSession {
            generation,
            subscription,
            publisher,
        })
    }

    fn end(&mut self) {
        if let Some(active) = self.active.take() {
            self.sensor.cancel(active.subscription);

            active
                .publisher
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .disconnect();

            log::info!("drive_thread: Session ended");
        }
    }
}

pub fn drive_thread<S>(
    session: Arc<SessionHandler>,
    sensor: S,
    publisher_factory: PublisherFactory,
    interval: Duration,
) where
    S: MotionSensor,
{
    DriveThread::new(session, sensor, publisher_factory, interval).run();
}
