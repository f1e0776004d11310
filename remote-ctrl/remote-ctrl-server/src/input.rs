use std::io;

use rocket::Shutdown;

use crate::stop_process;

pub fn input_thread(shutdown_handle: Shutdown) {
    let mut buffer = String::new();
    let stdin = io::stdin();

    log::info!("Press enter to exit");

    match stdin.read_line(&mut buffer) {
        // Detached from a terminal, only Ctrl-C can stop the server
        Ok(0) => return,
        Ok(_) => {}
        Err(err) => {
            log::warn!("input_thread: Failed to read stdin: {}", err);
            return;
        }
    }

    log::info!("Shutting down...");

    stop_process();

    shutdown_handle.notify();
}
