use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A controllable vehicle: the broker it listens on and the topic it reads
/// control messages from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    pub hostname: String,
    pub topic: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("Unable to create session: Please input enough information to connect to your car (hostname is empty)")]
    MissingHostname,
    #[error("Unable to create session: Please input enough information to connect to your car (topic is empty)")]
    MissingTopic,
}

impl Connection {
    pub fn new(
        hostname: impl Into<String>,
        topic: impl Into<String>,
    ) -> Result<Self, ConnectionError> {
        let hostname = hostname.into();
        let topic = topic.into();

        if hostname.is_empty() {
            return Err(ConnectionError::MissingHostname);
        }

        if topic.is_empty() {
            return Err(ConnectionError::MissingTopic);
        }

        Ok(Self { hostname, topic })
    }
}
