use std::{
    collections::HashMap,
    io,
    net::{SocketAddr, UdpSocket},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use shared::{Attitude, MotionCallback, MotionSensor, SubscriptionHandle};

use crate::process_is_running;

const DATAGRAM_SIZE: usize = 512;

struct SamplingThread {
    running: Arc<AtomicBool>,
    join_handle: JoinHandle<()>,
}

/// Motion sensor fed by a handheld device that streams its attitude as JSON
/// datagrams, e.g. `{"roll": 0.42, "pitch": -0.1}`.
///
/// Subscriptions share the socket, so with more than one subscriber each
/// datagram reaches only one of them.
pub struct UdpMotionSensor {
    socket: Option<UdpSocket>,
    next_handle: u32,
    subscriptions: HashMap<SubscriptionHandle, SamplingThread>,
}

impl UdpMotionSensor {
    /// Binds the sensor socket. A failed bind leaves the sensor unavailable
    /// rather than failing the server.
    pub fn bind(port: u16) -> Self {
        let socket = UdpSocket::bind(("0.0.0.0", port)).and_then(|socket| {
            socket.set_nonblocking(true)?;
            Ok(socket)
        });

        let socket = match socket {
            Ok(socket) => Some(socket),
            Err(err) => {
                log::error!("motion: Failed to bind port {}: {}", port, err);
                None
            }
        };

        let sensor = Self {
            socket,
            next_handle: 0,
            subscriptions: HashMap::new(),
        };

        if let Some(address) = sensor.local_addr() {
            log::info!("motion: Listening for attitude datagrams on {}", address);
        }

        sensor
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket
            .as_ref()
            .and_then(|socket| socket.local_addr().ok())
    }
}

impl MotionSensor for UdpMotionSensor {
    fn is_available(&self) -> bool {
        self.socket.is_some()
    }

    fn subscribe(&mut self, interval: Duration, callback: MotionCallback) -> SubscriptionHandle {
        let handle = SubscriptionHandle(self.next_handle);
        self.next_handle += 1;

        let socket = match self.socket.as_ref().map(UdpSocket::try_clone) {
            Some(Ok(socket)) => Some(socket),
            Some(Err(err)) => {
                log::error!("motion: Failed to share socket with subscriber: {}", err);
                None
            }
            None => None,
        };

        let running = Arc::new(AtomicBool::new(true));
        let running_ref = running.clone();

        let spawned = thread::Builder::new()
            .name(String::from("motion_sampling"))
            .spawn(move || sampling_thread(socket, interval, callback, running_ref));

        match spawned {
            Ok(join_handle) => {
                self.subscriptions.insert(
                    handle,
                    SamplingThread {
                        running,
                        join_handle,
                    },
                );
            }
            Err(err) => {
                log::error!("motion: Failed to start sampling thread: {}", err);
            }
        }

        handle
    }

    fn cancel(&mut self, handle: SubscriptionHandle) {
        if let Some(subscription) = self.subscriptions.remove(&handle) {
            subscription.running.store(false, Ordering::Relaxed);
            subscription.join_handle.thread().unpark();

            if subscription.join_handle.join().is_err() {
                log::error!("motion: Sampling thread panicked");
            }
        }
    }
}

impl Drop for UdpMotionSensor {
    fn drop(&mut self) {
        let handles: Vec<SubscriptionHandle> = self.subscriptions.keys().copied().collect();

        for handle in handles {
            self.cancel(handle);
        }
    }
}

fn sampling_thread(
    socket: Option<UdpSocket>,
    interval: Duration,
    mut callback: MotionCallback,
    running: Arc<AtomicBool>,
) {
    let mut latest = None;

    loop {
        let deadline = Instant::now() + interval;

        loop {
            let is_running = running.load(Ordering::Relaxed) && process_is_running();
            let now = Instant::now();

            if !is_running || now >= deadline {
                break;
            }

            thread::park_timeout(deadline - now);
        }

        if !running.load(Ordering::Relaxed) || !process_is_running() {
            break;
        }

        if let Some(socket) = &socket {
            drain_datagrams(socket, &mut latest);
        }

        callback(latest);
    }
}

/// Reads every pending datagram, keeping the most recent valid attitude.
fn drain_datagrams(socket: &UdpSocket, latest: &mut Option<Attitude>) {
    let mut buffer = [0_u8; DATAGRAM_SIZE];

    loop {
        match socket.recv_from(&mut buffer) {
            Ok((size, remote)) => match serde_json::from_slice::<Attitude>(&buffer[..size]) {
                Ok(attitude) => *latest = Some(attitude),
                Err(err) => {
                    log::warn!("motion: Ignoring invalid datagram from {}: {}", remote, err);
                }
            },
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
            Err(err) => {
                log::warn!("motion: Failed to receive datagram: {}", err);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    fn wait_for_attitude(rx: &mpsc::Receiver<Option<Attitude>>) -> Option<Attitude> {
        let deadline = Instant::now() + Duration::from_secs(5);

        while Instant::now() < deadline {
            if let Ok(Some(attitude)) = rx.recv_timeout(Duration::from_millis(50)) {
                return Some(attitude);
            }
        }

        None
    }

    #[test]
    fn test_delivers_latest_attitude() {
        let mut sensor = UdpMotionSensor::bind(0);
        assert!(sensor.is_available());
        let port = sensor.local_addr().unwrap().port();

        let (tx, rx) = mpsc::channel();
        let handle = sensor.subscribe(
            Duration::from_millis(10),
            Box::new(move |attitude| {
                let _ = tx.send(attitude);
            }),
        );

        // Nothing received yet
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), None);

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(b"not an attitude", ("127.0.0.1", port)).unwrap();
        sender
            .send_to(b"{\"roll\":0.5,\"pitch\":-0.25}", ("127.0.0.1", port))
            .unwrap();

        assert_eq!(
            wait_for_attitude(&rx),
            Some(Attitude {
                roll: 0.5,
                pitch: -0.25
            })
        );

        sensor.cancel(handle);
    }

    #[test]
    fn test_cancel_stops_callbacks() {
        let mut sensor = UdpMotionSensor::bind(0);

        let (tx, rx) = mpsc::channel();
        let handle = sensor.subscribe(
            Duration::from_millis(5),
            Box::new(move |attitude| {
                let _ = tx.send(attitude);
            }),
        );

        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());

        sensor.cancel(handle);
        while rx.try_recv().is_ok() {}

        // The sender was dropped along with the joined thread
        assert_eq!(
            rx.recv_timeout(Duration::from_millis(50)),
            Err(mpsc::RecvTimeoutError::Disconnected)
        );
    }

    #[test]
    fn test_port_in_use_is_unavailable() {
        let sensor = UdpMotionSensor::bind(0);
        let port = sensor.local_addr().unwrap().port();

        let second = UdpMotionSensor::bind(port);
        assert!(!second.is_available());
        assert_eq!(second.local_addr(), None);
    }
}
