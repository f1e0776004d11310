use std::sync::Arc;

use connection_store::ConnectionStore;
use rocket::{
    serde::{json::Json, Deserialize},
    State,
};
use shared::Connection;

use crate::commands::{format_response, CommandResponse};

/// Fields of the "add connection" form. Blank fields are rejected by
/// [`Connection::new`] rather than by deserialization.
#[derive(Debug, Default, Deserialize)]
#[serde(crate = "rocket::serde", default)]
pub struct ConnectionForm {
    hostname: String,
    topic: String,
}

#[get("/connections")]
pub fn list_connections(store: &State<Arc<ConnectionStore>>) -> Json<Vec<Connection>> {
    Json(store.list())
}

#[post("/connections", data = "<form>")]
pub fn add_connection(
    store: &State<Arc<ConnectionStore>>,
    form: Json<ConnectionForm>,
) -> Json<CommandResponse> {
    let form = form.into_inner();

    let connection = match Connection::new(form.hostname, form.topic) {
        Ok(connection) => connection,
        Err(err) => return format_response(err.to_string(), false),
    };

    let text_response = format!("Saved connection to {} on '{}'", connection.hostname, connection.topic);

    match store.save(connection) {
        Ok(()) => format_response(text_response, true),
        Err(err) => {
            log::error!("commands: Failed to save connection: {}", err);
            format_response(format!("Failed to save connection: {}", err), false)
        }
    }
}

#[post("/connections/delete", data = "<connection>")]
pub fn delete_connection(
    store: &State<Arc<ConnectionStore>>,
    connection: Json<Connection>,
) -> Json<CommandResponse> {
    match store.delete(&connection) {
        Ok(true) => format_response(
            format!("Deleted connection to {} on '{}'", connection.hostname, connection.topic),
            true,
        ),
        Ok(false) => format_response(
            format!("No saved connection to {} on '{}'", connection.hostname, connection.topic),
            true,
        ),
        Err(err) => {
            log::error!("commands: Failed to delete connection: {}", err);
            format_response(format!("Failed to delete connection: {}", err), false)
        }
    }
}
