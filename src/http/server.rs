use anyhow::{Context, Result};
use std::io::{BufReader, ErrorKind};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::{handle, read_request, HttpError, Response};
use crate::controller::Controller;

const READ_TIMEOUT: Duration = Duration::from_secs(30);
const STATS_INTERVAL_SECS: u64 = 5;

/// HTTP front end for the controller
pub struct HttpServer {
    listener: TcpListener,
    controller: Arc<Controller>,
    requests: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
}

impl HttpServer {
    /// Bind the listening socket. Connections are accepted once `run` is called.
    pub fn bind(addr: &str, controller: Arc<Controller>) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .context(format!("Failed to bind to {}", addr))?;

        // Set nonblocking so accept() can check running flag periodically
        listener.set_nonblocking(true)?;

        Ok(HttpServer {
            listener,
            controller,
            requests: Arc::new(AtomicU64::new(0)),
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Get a clone of the running flag for signal handlers
    pub fn get_running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Accept connections until the running flag is cleared. Each connection
    /// gets its own thread so a blocked animation submission holds up nobody else.
    pub fn run(&self) -> Result<()> {
        log::info!("Listening on http://{}", self.local_addr()?);

        if log::log_enabled!(log::Level::Debug) {
            self.spawn_stats_thread();
        }

        while self.running.load(Ordering::Relaxed) {
            match self.listener.accept() {
                Ok((stream, peer_addr)) => {
                    let controller = Arc::clone(&self.controller);
                    let requests = Arc::clone(&self.requests);
                    thread::spawn(move || {
                        if let Err(e) = handle_connection(stream, &controller) {
                            log::debug!("Connection from {} failed: {}", peer_addr, e);
                        }
                        requests.fetch_add(1, Ordering::Relaxed);
                    });
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                    // No connection ready, sleep briefly to avoid busy-waiting
                    thread::sleep(Duration::from_millis(100));
                }
                Err(e) => {
                    log::warn!("Error accepting connection: {}", e);
                    thread::sleep(Duration::from_millis(100));
                }
            }
        }

        log::info!("HTTP server stopped");
        Ok(())
    }

    /// Log request and device rates every few seconds
    fn spawn_stats_thread(&self) {
        let requests = Arc::clone(&self.requests);
        let running = Arc::clone(&self.running);
        let controller = Arc::clone(&self.controller);
        let device = controller.stats();

        thread::spawn(move || {
            let mut last_requests = 0u64;
            let mut last_frames = 0u64;
            let secs = STATS_INTERVAL_SECS as f64;

            while running.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_secs(STATS_INTERVAL_SECS));

                let current_requests = requests.load(Ordering::Relaxed);
                let current_frames = device.frames_sent.load(Ordering::Relaxed);

                log::debug!("[Stats] requests: {:.1}/s, frames sent: {:.1} fps, {} bytes sent, {} bytes received{}",
                            (current_requests - last_requests) as f64 / secs,
                            (current_frames - last_frames) as f64 / secs,
                            device.bytes_sent.load(Ordering::Relaxed),
                            device.bytes_received.load(Ordering::Relaxed),
                            if controller.is_playing() { ", animation playing" } else { "" });

                last_requests = current_requests;
                last_frames = current_frames;
            }
        });
    }
}

/// Serve exactly one request on `stream`
fn handle_connection(stream: TcpStream, controller: &Controller) -> Result<(), HttpError> {
    // Accepted sockets may inherit the listener's nonblocking mode
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(READ_TIMEOUT))?;

    let mut reader = BufReader::new(&stream);
    let mut writer = &stream;
    let response = match read_request(&mut reader, &mut writer) {
        Ok(request) => {
            log::debug!("{:?} {} ({} bytes)", request.method, request.path, request.body.len());
            handle(controller, &request)
        }
        Err(e) => match e.status() {
            Some(status) => {
                log::warn!("Bad request: {}", e);
                Response::error(status, &e.to_string())
            }
            None => return Err(e),
        },
    };

    response.write_to(&mut writer)?;
    Ok(())
}
