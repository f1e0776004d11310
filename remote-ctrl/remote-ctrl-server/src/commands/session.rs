use std::sync::Arc;

use connection_store::ConnectionStore;
use rocket::{
    serde::{json::Json, Deserialize},
    State,
};
use shared::{ControlSelection, SessionSettings};

use crate::{
    commands::{format_response, CommandResponse},
    session::{SessionHandler, SessionStatus},
};

/// Switch pairs and constant values of the session settings form.
#[derive(Debug, Default, Deserialize)]
#[serde(crate = "rocket::serde", default)]
pub struct SettingsForm {
    throttle_automatic: bool,
    throttle_constant: bool,
    throttle_value: f64,
    steering_automatic: bool,
    steering_constant: bool,
    steering_value: f64,
}

impl SettingsForm {
    fn to_settings(&self) -> SessionSettings {
        SessionSettings {
            throttle: ControlSelection::from_switches(
                self.throttle_automatic,
                self.throttle_constant,
                self.throttle_value.clamp(-1.0, 1.0),
            ),
            steering: ControlSelection::from_switches(
                self.steering_automatic,
                self.steering_constant,
                self.steering_value.clamp(-1.0, 1.0),
            ),
        }
    }
}

#[post("/session/start/<index>")]
pub fn start_session(
    store: &State<Arc<ConnectionStore>>,
    session: &State<Arc<SessionHandler>>,
    index: usize,
) -> Json<CommandResponse> {
    match store.list().into_iter().nth(index) {
        Some(connection) => {
            let text_response = format!(
                "Starting remote control of {} on '{}'",
                connection.hostname, connection.topic
            );
            session.start(connection);
            format_response(text_response, true)
        }
        None => format_response("Remote control was not provided a 'Connection' to attempt.", false),
    }
}

#[post("/session/stop")]
pub fn stop_session(session: &State<Arc<SessionHandler>>) -> Json<CommandResponse> {
    session.stop();
    format_response("Stopped remote control", true)
}

#[post("/session/pause")]
pub fn pause_session(session: &State<Arc<SessionHandler>>) -> Json<CommandResponse> {
    session.pause();
    format_response("Paused remote control", true)
}

#[post("/session/resume")]
pub fn resume_session(session: &State<Arc<SessionHandler>>) -> Json<CommandResponse> {
    session.resume();
    format_response("Resumed remote control", true)
}

#[post("/session/settings", data = "<form>")]
pub fn update_settings(
    session: &State<Arc<SessionHandler>>,
    form: Json<SettingsForm>,
) -> Json<CommandResponse> {
    let settings = form.to_settings();
    log::info!("commands: Applying session settings {:?}", settings);

    session.update_settings(settings);
    format_response("Updated session settings", true)
}

#[get("/session")]
pub fn session_status(session: &State<Arc<SessionHandler>>) -> Json<SessionStatus> {
    Json(session.status())
}
