use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use rumqttc::{Client, Connection as MqttConnection, Event, MqttOptions, Packet, QoS};
use shared::Connection;
use thiserror::Error;

use crate::process_is_running;

/// Requests that can be queued before `try_publish` starts rejecting them.
const REQUEST_CAPACITY: usize = 16;

/// Pause between reconnect attempts after the event loop reports an error.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to queue message on '{topic}': {reason}")]
    Queue { topic: String, reason: String },
    #[error("publisher is disconnected")]
    Disconnected,
    #[error("failed to start the MQTT event loop: {0}")]
    EventLoop(#[source] std::io::Error),
}

/// Opens a publisher for the vehicle behind a connection.
pub type PublisherFactory =
    Box<dyn FnMut(&Connection) -> Result<Box<dyn Publisher>, PublishError> + Send>;

/// Fire-and-forget message sink. Messages are requested with at-least-once
/// delivery but no acknowledgement is surfaced to the caller.
pub trait Publisher: Send {
    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), PublishError>;
    fn disconnect(&mut self);
}

#[derive(Debug, Clone, PartialEq)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub keep_alive: Duration,
    pub client_id: String,
}

impl MqttConfig {
    /// Broker settings for driving `connection`, with a random client id so
    /// several controllers can share one broker.
    pub fn for_connection(connection: &Connection, broker_port: u16, keep_alive: Duration) -> Self {
        Self {
            broker_host: connection.hostname.clone(),
            broker_port,
            keep_alive,
            client_id: format!("remote-ctrl-{:04x}", rand::random::<u16>()),
        }
    }
}

pub struct MqttPublisher {
    client: Client,
    running: Arc<AtomicBool>,
}

impl MqttPublisher {
    pub fn connect(config: MqttConfig) -> Result<Self, PublishError> {
        log::info!(
            "mqtt: Connecting to broker at {}:{} as {}",
            config.broker_host,
            config.broker_port,
            config.client_id
        );

        let mut options = MqttOptions::new(config.client_id, config.broker_host, config.broker_port);
        options.set_keep_alive(config.keep_alive);

        let (client, connection) = Client::new(options, REQUEST_CAPACITY);
        let running = Arc::new(AtomicBool::new(true));

        let running_ref = running.clone();
        thread::Builder::new()
            .name(String::from("mqtt_event_loop"))
            .spawn(move || event_loop_thread(connection, running_ref))
            .map_err(PublishError::EventLoop)?;

        Ok(Self { client, running })
    }
}

impl Publisher for MqttPublisher {
    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), PublishError> {
        if !self.running.load(Ordering::Relaxed) {
            return Err(PublishError::Disconnected);
        }

        self.client
            .try_publish(topic, QoS::AtLeastOnce, false, payload.as_bytes())
            .map_err(|err| PublishError::Queue {
                topic: String::from(topic),
                reason: err.to_string(),
            })
    }

    fn disconnect(&mut self) {
        if self.running.swap(false, Ordering::Relaxed) {
            if let Err(err) = self.client.try_disconnect() {
                log::warn!("mqtt: Failed to request disconnect: {}", err);
            }
        }
    }
}

/// Factory connecting an [`MqttPublisher`] to the broker at each connection's
/// hostname.
pub fn mqtt_publisher_factory(broker_port: u16, keep_alive: Duration) -> PublisherFactory {
    Box::new(
        move |connection: &Connection| -> Result<Box<dyn Publisher>, PublishError> {
            let config = MqttConfig::for_connection(connection, broker_port, keep_alive);
            Ok(Box::new(MqttPublisher::connect(config)?))
        },
    )
}

impl Drop for MqttPublisher {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Drives the MQTT connection. Ends once the publisher disconnects, its
/// client is dropped, or the process is shutting down.
fn event_loop_thread(mut connection: MqttConnection, running: Arc<AtomicBool>) {
    for notification in connection.iter() {
        match notification {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                log::info!("mqtt: Connected to broker ({:?})", ack.code);
            }
            Ok(event) => {
                log::trace!("mqtt: {:?}", event);
            }
            Err(err) => {
                if !running.load(Ordering::Relaxed) {
                    break;
                }

                log::warn!("mqtt: Connection error: {}", err);
                thread::sleep(RECONNECT_DELAY);
            }
        }

        if !process_is_running() {
            break;
        }
    }

    log::debug!("mqtt: Event loop stopped");
}
