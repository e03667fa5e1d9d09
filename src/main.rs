use anyhow::{Context, Result};
use clap::Parser;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

mod animation;
mod color_store;
mod config;
mod controller;
mod device;
mod error;
mod http;
mod pixel_format;
mod player;
mod protocol;
mod ready;

use config::Config;
use controller::Controller;
use device::DeviceLink;
use error::Halt;
use http::HttpServer;

#[derive(Parser)]
#[command(name = "neopixel_server")]
#[command(about = "Drive a serial LED strip over HTTP\n\nPOST /color takes a JSON array of bytes, POST /anim plays an animation.", long_about = None)]
struct Cli {
    /// Path to configuration file (JSON)
    config: Option<String>,

    /// Serial port of the strip controller
    #[arg(long)]
    serial_port: Option<String>,

    /// Serial baud rate
    #[arg(long)]
    baud_rate: Option<u32>,

    /// Number of LEDs on the strip
    #[arg(long)]
    led_count: Option<usize>,

    /// Address to serve HTTP on (host:port)
    #[arg(long)]
    listen: Option<String>,

    /// Enable debug output (every write, statistics)
    #[arg(long)]
    debug: bool,

    /// Enable detailed debug (hex dumps every frame)
    #[arg(long)]
    ddebug: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(port) = &self.serial_port {
            config.strip.port = port.clone();
        }
        if let Some(baud) = self.baud_rate {
            config.strip.baud_rate = baud;
        }
        if let Some(leds) = self.led_count {
            config.strip.led_count = leds;
        }
        if let Some(listen) = &self.listen {
            let (host, port) = listen
                .rsplit_once(':')
                .context(format!("--listen must be host:port, got {}", listen))?;
            config.http.host = host.to_string();
            config.http.port = port
                .parse()
                .context(format!("Invalid port in --listen: {}", port))?;
        }
        Ok(())
    }
}

fn init_logging(cli: &Cli) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.ddebug {
        builder.filter_level(log::LevelFilter::Trace);
    } else if cli.debug {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    cli.apply(&mut config)?;
    config.validate()?;

    let (halt_tx, halt_rx) = mpsc::channel();

    // A strip we cannot open is a startup failure
    let link = DeviceLink::open(&config.strip)?;
    log::info!("Serving {} LEDs ({} bytes per color buffer)",
               config.strip.led_count, config.strip.buffer_len());
    let controller = Arc::new(Controller::start(link, &config.strip, halt_tx.clone()));

    let startup = Duration::from_millis(config.strip.startup_timeout_ms);
    if controller.ready().wait_timeout(startup) {
        log::info!("Device on {} is ready", config.strip.port);
    } else {
        log::warn!("No word from {} after {:?}, starting anyway", config.strip.port, startup);
        controller.ready().mark();
    }

    let server = HttpServer::bind(&config.listen_addr(), Arc::clone(&controller))?;
    let running = server.get_running_flag();

    let result = ctrlc::set_handler(move || {
        let _ = halt_tx.send(Halt::Interrupted);
    });
    if let Err(e) = result {
        log::warn!("Could not set Ctrl-C handler: {}", e);
    }

    let server_thread = thread::spawn(move || server.run());

    // Block until Ctrl-C or the device link fails
    let halt = halt_rx.recv().context("All halt senders dropped")?;
    running.store(false, Ordering::Relaxed);

    match halt {
        Halt::Interrupted => {
            log::info!("Shutting down...");
            if config.strip.blank_on_exit {
                log::info!("Turning off LEDs...");
                if let Err(e) = controller.blackout() {
                    log::warn!("Could not turn off LEDs: {}", e);
                }
                // Give the writer time to get the black frame out
                thread::sleep(Duration::from_millis(100));
            }
            match server_thread.join() {
                Ok(result) => result?,
                Err(_) => anyhow::bail!("HTTP server thread panicked"),
            }
            log::info!("Server stopped");
            Ok(())
        }
        Halt::Device(e) => {
            // In-memory colors and the strip may now disagree, stop serving
            Err(e).context(format!("Lost serial device {}", config.strip.port))
        }
    }
}
