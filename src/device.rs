use anyhow::{Context, Result};
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::color_store::ColorBuffer;
use crate::config::StripConfig;
use crate::error::{DeviceError, Halt};
use crate::protocol::FrameEncoder;
use crate::ready::Ready;

/// Buffers that may wait for the writer before producers block
pub const WRITE_QUEUE_DEPTH: usize = 16;

const READ_BUFFER_SIZE: usize = 128;

/// Both halves of the serial connection to the strip controller
pub struct DeviceLink {
    pub name: String,
    pub reader: Box<dyn Read + Send>,
    pub writer: Box<dyn Write + Send>,
}

impl DeviceLink {
    /// Open the serial port named in the config (8N1, no flow control)
    pub fn open(config: &StripConfig) -> Result<Self> {
        let mut port = serialport::new(&config.port, config.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(Duration::from_millis(1000))
            .open()
            .context(format!("Failed to open serial port {}", config.port))?;

        if let Err(e) = port.write_data_terminal_ready(true) {
            log::warn!("Failed to set DTR on {}: {}", config.port, e);
        }

        let reader = port
            .try_clone()
            .context(format!("Failed to clone serial port {} for reading", config.port))?;

        // Allow device to initialize
        thread::sleep(Duration::from_millis(100));

        log::info!("Opened {} @ {} baud ({} LEDs, {:?}, {:?})",
                   config.port, config.baud_rate, config.led_count,
                   config.protocol, config.pixel_format);

        Ok(DeviceLink {
            name: config.port.clone(),
            reader: Box::new(reader),
            writer: Box::new(port),
        })
    }

    #[cfg(test)]
    pub fn from_parts(
        name: impl Into<String>,
        reader: impl Read + Send + 'static,
        writer: impl Write + Send + 'static,
    ) -> Self {
        DeviceLink {
            name: name.into(),
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }
}

/// Traffic counters shared with the statistics thread
#[derive(Debug, Default)]
pub struct DeviceStats {
    pub frames_sent: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub bytes_received: AtomicU64,
}

/// Spawn the only thread that writes to the device. Buffers go out in the
/// order they were queued; the thread ends when every sender is dropped or on
/// the first write error, which is reported as a halt.
pub fn spawn_writer(
    name: String,
    mut port: Box<dyn Write + Send>,
    queue: Receiver<ColorBuffer>,
    encoder: FrameEncoder,
    stats: Arc<DeviceStats>,
    halt: Sender<Halt>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for colors in queue {
            let frame = encoder.encode(&colors);

            if log::log_enabled!(log::Level::Trace) {
                let hex: String = frame.iter()
                    .map(|b| format!("{:02x}", b)).collect::<Vec<_>>().join(" ");
                log::trace!("[{}] frame: {}", name, hex);
            }

            if let Err(e) = port.write_all(&frame).and_then(|_| port.flush()) {
                log::error!("Serial write on {} failed: {}", name, e);
                let _ = halt.send(Halt::Device(DeviceError::Write(e)));
                return;
            }

            stats.frames_sent.fetch_add(1, Ordering::Relaxed);
            stats.bytes_sent.fetch_add(frame.len() as u64, Ordering::Relaxed);
            log::debug!("Sent {} bytes to {}", frame.len(), name);
        }

        log::debug!("Writer for {} stopped", name);
    })
}

/// Spawn the thread that drains and logs whatever the device sends. The first
/// byte received marks the device as ready.
pub fn spawn_reader(
    name: String,
    mut port: Box<dyn Read + Send>,
    ready: Ready,
    stats: Arc<DeviceStats>,
    halt: Sender<Halt>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut buf = [0u8; READ_BUFFER_SIZE];

        loop {
            match port.read(&mut buf) {
                Ok(0) => {
                    log::error!("{} closed the link", name);
                    let _ = halt.send(Halt::Device(DeviceError::Closed));
                    return;
                }
                Ok(n) => {
                    stats.bytes_received.fetch_add(n as u64, Ordering::Relaxed);
                    log::info!("Received {} bytes from {}: [{}]",
                               n, name, String::from_utf8_lossy(&buf[..n]).trim_end());
                    if !ready.is_ready() {
                        log::info!("{} is talking, marking ready", name);
                        ready.mark();
                    }
                }
                // Serial timeouts only mean the device had nothing to say
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                    continue;
                }
                Err(e) => {
                    log::error!("Serial read on {} failed: {}", name, e);
                    let _ = halt.send(Halt::Device(DeviceError::Read(e)));
                    return;
                }
            }
        }
    })
}
