mod commands;
mod config;
mod drive;
mod input;
mod logging;
mod motion;
mod publisher;
mod session;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::Context;
use connection_store::ConnectionStore;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::{Build, Request, Response, Rocket};

use crate::config::ServerConfig;
use crate::drive::drive_thread;
use crate::input::input_thread;
use crate::logging::init_logging;
use crate::motion::UdpMotionSensor;
use crate::publisher::mqtt_publisher_factory;
use crate::session::SessionHandler;

#[macro_use]
extern crate rocket;

static PROCESS_RUNNING: AtomicBool = AtomicBool::new(true);

fn build_rocket(session: Arc<SessionHandler>, store: Arc<ConnectionStore>) -> Rocket<Build> {
    rocket::build()
        .attach(CORS)
        .manage(session)
        .manage(store)
        .mount("/", routes![all_options])
        .mount("/commands", commands::get_routes())
}

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = ServerConfig::load()?;
    let store = Arc::new(ConnectionStore::new(config.store_path()));
    log::info!("Saved connections live at {}", store.path().display());

    let session = Arc::new(SessionHandler::new());

    let rocket = build_rocket(session.clone(), store)
        .ignite()
        .await
        .map_err(|err| anyhow::anyhow!("Failed to start command server: {}", err))?;
    let shutdown_handle = rocket.shutdown();
    let server = tokio::spawn(rocket.launch());

    let sensor = UdpMotionSensor::bind(config.motion_port);
    let publisher_factory = mqtt_publisher_factory(config.broker_port, config.keep_alive());
    let interval = config.update_interval();

    let session_ref = session.clone();
    let drive_join_handle = thread::Builder::new()
        .name(String::from("drive_thread"))
        .spawn(move || drive_thread(session_ref, sensor, publisher_factory, interval))
        .context("Failed to spawn drive thread")?;

    // Blocks on stdin, so it's left detached when shutdown comes from Ctrl-C
    let shutdown_handle_ref = shutdown_handle.clone();
    thread::Builder::new()
        .name(String::from("input_thread"))
        .spawn(move || input_thread(shutdown_handle_ref))
        .context("Failed to spawn input thread")?;

    // Wait for the server to shut down before exiting
    shutdown_handle.await;
    stop_process();

    if drive_join_handle.join().is_err() {
        log::error!("Drive thread panicked");
    }

    match server.await {
        Ok(Ok(_)) => {}
        Ok(Err(err)) => log::error!("Command server stopped with an error: {}", err),
        Err(err) => log::error!("Error joining command server: {}", err),
    }

    log::info!("Shut down gracefully!");

    Ok(())
}

pub struct CORS;

/// Catches all OPTION requests in order to get the CORS related Fairing triggered.
#[options("/<_..>")]
fn all_options() {
    /* Intentionally left empty */
}

#[rocket::async_trait]
impl Fairing for CORS {
    fn info(&self) -> Info {
        Info {
            name: "Add CORS headers to responses",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
        response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "POST, GET, OPTIONS",
        ));
        response.set_header(Header::new("Access-Control-Allow-Headers", "*"));
        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

pub(crate) fn process_is_running() -> bool {
    PROCESS_RUNNING.load(Ordering::Relaxed)
}

pub(crate) fn stop_process() {
    PROCESS_RUNNING.store(false, Ordering::Relaxed)
}
