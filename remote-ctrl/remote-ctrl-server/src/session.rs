use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rocket::serde::Serialize;
use shared::{control::ControlCommand, Connection, SessionSettings};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(crate = "rocket::serde", tag = "state", content = "message", rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Connecting,
    Driving,
    Failed(String),
}

/// Snapshot of the session for the command API.
#[derive(Debug, Clone, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct SessionStatus {
    pub connection: Option<Connection>,
    pub state: SessionState,
    pub paused: bool,
    pub settings: SessionSettings,
    pub throttle: Option<String>,
    pub steering: Option<String>,
    pub throttle_label: Option<String>,
    pub steering_label: Option<String>,
}

struct SessionData {
    connection: Option<Connection>,
    state: SessionState,
    settings: SessionSettings,
    paused: bool,
    last_command: Option<ControlCommand>,
    generation: u64,
}

/// State shared between the command API and the drive thread.
///
/// Every start or stop bumps the generation, which is how the drive thread
/// notices that the session it is running has been replaced.
pub struct SessionHandler {
    data: RwLock<SessionData>,
}

impl SessionHandler {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(SessionData {
                connection: None,
                state: SessionState::Idle,
                settings: SessionSettings::default(),
                paused: false,
                last_command: None,
                generation: 0,
            }),
        }
    }

    pub fn start(&self, connection: Connection) -> u64 {
        let mut data = self.write();

        log::info!(
            "session: Starting session for {} on '{}'",
            connection.hostname,
            connection.topic
        );

        data.connection = Some(connection);
        data.state = SessionState::Connecting;
        data.settings = SessionSettings::default();
        data.paused = false;
        data.last_command = None;
        data.generation += 1;
        data.generation
    }

    pub fn stop(&self) {
        let mut data = self.write();

        if data.connection.is_some() {
            log::info!("session: Stopping session");
        }

        data.connection = None;
        data.state = SessionState::Idle;
        data.generation += 1;
    }

    /// Connection of a session that was started but not picked up yet.
    pub fn pending(&self) -> Option<(u64, Connection)> {
        let data = self.read();

        match (&data.state, &data.connection) {
            (SessionState::Connecting, Some(connection)) => {
                Some((data.generation, connection.clone()))
            }
            _ => None,
        }
    }

    pub fn is_current(&self, generation: u64) -> bool {
        let data = self.read();
        data.generation == generation && data.connection.is_some()
    }

    pub fn set_driving(&self, generation: u64) {
        let mut data = self.write();

        if data.generation == generation {
            data.state = SessionState::Driving;
        }
    }

    /// Ends the session with a message for the user. Stale generations are
    /// ignored so a late failure can't clobber a newer session.
    pub fn fail(&self, generation: u64, message: impl Into<String>) {
        let mut data = self.write();

        if data.generation == generation {
            let message = message.into();
            log::error!("session: {}", message);

            data.connection = None;
            data.state = SessionState::Failed(message);
        }
    }

    pub fn pause(&self) {
        self.write().paused = true;
    }

    pub fn resume(&self) {
        self.write().paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.read().paused
    }

    pub fn settings(&self) -> SessionSettings {
        self.read().settings
    }

    /// Applies new settings and resumes publishing.
    pub fn update_settings(&self, settings: SessionSettings) {
        let mut data = self.write();
        data.settings = settings;
        data.paused = false;
    }

    pub fn record_command(&self, command: ControlCommand) {
        self.write().last_command = Some(command);
    }

    pub fn status(&self) -> SessionStatus {
        let data = self.read();

        SessionStatus {
            connection: data.connection.clone(),
            state: data.state.clone(),
            paused: data.paused,
            settings: data.settings,
            throttle: data
                .last_command
                .map(|command| format!("Throttle: {}", command.throttle)),
            steering: data
                .last_command
                .map(|command| format!("Steering: {}", command.steering)),
            throttle_label: data.settings.throttle.label(),
            steering_label: data.settings.steering.label(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionData> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SessionHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use shared::control::{ControlSample, ControlSelection};

    use super::*;

    fn connection() -> Connection {
        Connection::new("10.0.0.5", "car/1").unwrap()
    }

    #[test]
    fn test_start_and_pick_up() {
        let session = SessionHandler::new();
        assert!(session.pending().is_none());

        let generation = session.start(connection());
        assert_eq!(session.pending(), Some((generation, connection())));
        assert!(session.is_current(generation));

        session.set_driving(generation);
        assert!(session.pending().is_none());
        assert_eq!(session.status().state, SessionState::Driving);
    }

    #[test]
    fn test_restart_replaces_session() {
        let session = SessionHandler::new();

        let first = session.start(connection());
        let second = session.start(Connection::new("10.0.0.6", "car/2").unwrap());

        assert!(!session.is_current(first));
        assert!(session.is_current(second));

        // A late failure of the replaced session is ignored
        session.fail(first, "old session failed");
        assert_eq!(session.status().state, SessionState::Connecting);
    }

    #[test]
    fn test_stop() {
        let session = SessionHandler::new();
        let generation = session.start(connection());

        session.stop();

        assert!(!session.is_current(generation));
        assert!(session.pending().is_none());
        assert_eq!(session.status().state, SessionState::Idle);
        assert_eq!(session.status().connection, None);
    }

    #[test]
    fn test_fail() {
        let session = SessionHandler::new();
        let generation = session.start(connection());

        session.fail(generation, "Motion is not available on this device");

        let status = session.status();
        assert_eq!(
            status.state,
            SessionState::Failed(String::from("Motion is not available on this device"))
        );
        assert_eq!(status.connection, None);
        assert!(!session.is_current(generation));
    }

    #[test]
    fn test_settings_resume_publishing() {
        let session = SessionHandler::new();
        session.start(connection());

        session.pause();
        assert!(session.is_paused());

        let settings = SessionSettings {
            throttle: ControlSelection::Constant(0.3),
            steering: ControlSelection::Automatic,
        };
        session.update_settings(settings);

        assert!(!session.is_paused());
        assert_eq!(session.settings(), settings);
        assert_eq!(session.status().throttle_label.as_deref(), Some("30%"));
        assert_eq!(session.status().steering_label, None);
    }

    #[test]
    fn test_new_session_starts_user_controlled() {
        let session = SessionHandler::new();
        session.start(connection());

        session.update_settings(SessionSettings {
            throttle: ControlSelection::Constant(1.0),
            steering: ControlSelection::Automatic,
        });
        session.stop();

        session.start(Connection::new("10.0.0.6", "car/2").unwrap());

        assert_eq!(session.settings(), SessionSettings::default());
        assert_eq!(session.status().throttle_label, None);
    }

    #[test]
    fn test_status_readouts() {
        let session = SessionHandler::new();
        assert_eq!(session.status().throttle, None);

        let sample = ControlSample {
            throttle_raw: 2.0,
            steering_raw: 0.0,
        };
        session.record_command(ControlCommand::from_sample(sample, &SessionSettings::default()));

        let status = session.status();
        assert_eq!(status.throttle.as_deref(), Some("Throttle: 1.0"));
        assert_eq!(status.steering.as_deref(), Some("Steering: 0.0"));
    }

    #[test]
    fn test_state_serialization() {
        let serialized = serde_json::to_string(&SessionState::Failed(String::from("oops"))).unwrap();
        assert_eq!(serialized, "{\"state\":\"failed\",\"message\":\"oops\"}");

        let serialized = serde_json::to_string(&SessionState::Idle).unwrap();
        assert_eq!(serialized, "{\"state\":\"idle\"}");
    }
}
