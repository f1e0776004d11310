mod connections;
mod session;

use rocket::{
    serde::{json::Json, Deserialize, Serialize},
    Route,
};

#[derive(Debug, Serialize, Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct CommandResponse {
    pub text_response: String,
    pub success: bool,
}

pub fn format_response(text_response: impl Into<String>, success: bool) -> Json<CommandResponse> {
    Json(CommandResponse {
        text_response: text_response.into(),
        success,
    })
}

pub fn get_routes() -> Vec<Route> {
    routes![
        connections::list_connections,
        connections::add_connection,
        connections::delete_connection,
        session::start_session,
        session::stop_session,
        session::pause_session,
        session::resume_session,
        session::update_settings,
        session::session_status,
    ]
}
