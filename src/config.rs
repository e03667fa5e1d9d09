use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::pixel_format::PixelOrder;
use crate::protocol::WireProtocol;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub strip: StripConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StripConfig {
    pub port: String,
    pub baud_rate: u32,
    pub led_count: usize,
    pub protocol: WireProtocol,
    pub pixel_format: PixelOrder,
    /// How long to wait for the controller to say something before accepting
    /// requests anyway.
    pub startup_timeout_ms: u64,
    /// Send an all-black buffer when shutting down on Ctrl-C.
    pub blank_on_exit: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for StripConfig {
    fn default() -> Self {
        StripConfig {
            port: default_serial_port().to_string(),
            baud_rate: 115200,
            led_count: 16,
            protocol: WireProtocol::default(),
            pixel_format: PixelOrder::default(),
            startup_timeout_ms: 1000,
            blank_on_exit: true,
        }
    }
}

impl StripConfig {
    /// Number of bytes in one color buffer (three channels per LED)
    pub fn buffer_len(&self) -> usize {
        self.led_count * 3
    }
}

impl Config {
    /// Load configuration from a JSON file; missing fields take their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .context(format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&data)
            .context(format!("Failed to parse config file {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.strip.led_count == 0 {
            anyhow::bail!("strip.led_count must be greater than zero");
        }
        if self.strip.baud_rate == 0 {
            anyhow::bail!("strip.baud_rate must be greater than zero");
        }
        if self.strip.port.is_empty() {
            anyhow::bail!("strip.port must name a serial device");
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.http.host, self.http.port)
    }
}

fn default_serial_port() -> &'static str {
    if cfg!(windows) {
        "COM7"
    } else {
        "/dev/ttyUSB0"
    }
}
