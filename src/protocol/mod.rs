//! Serial framing of color buffers.

mod adalight;
mod awa;

use serde::{Deserialize, Serialize};

use crate::pixel_format::PixelOrder;

pub use adalight::adalight_frame;
pub use awa::awa_frame;

/// How a color buffer is framed on the serial line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WireProtocol {
    /// Buffer bytes only, no header
    #[default]
    Raw,
    Adalight,
    /// HyperSerialPico / HyperSerialESP32
    Awa,
}

/// Turns color buffers into the exact bytes written to the device
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameEncoder {
    pub protocol: WireProtocol,
    pub order: PixelOrder,
}

impl FrameEncoder {
    pub fn new(protocol: WireProtocol, order: PixelOrder) -> Self {
        FrameEncoder { protocol, order }
    }

    pub fn encode(&self, colors: &[u8]) -> Vec<u8> {
        let pixels = self.order.apply(colors);
        let led_count = pixels.len() / self.order.stride();

        match self.protocol {
            WireProtocol::Raw => pixels,
            WireProtocol::Adalight => adalight_frame(&pixels, led_count),
            WireProtocol::Awa => awa_frame(&pixels, led_count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_rgb_writes_buffer_unchanged() {
        let colors: Vec<u8> = (0..48).collect();
        assert_eq!(FrameEncoder::default().encode(&colors), colors);
    }

    #[test]
    fn order_is_applied_before_framing() {
        let encoder = FrameEncoder::new(WireProtocol::Adalight, PixelOrder::Grb);
        let frame = encoder.encode(&[255, 0, 0]);
        assert_eq!(&frame[6..], &[0, 255, 0]);
    }

    #[test]
    fn rgbw_counts_leds_by_wire_stride() {
        let encoder = FrameEncoder::new(WireProtocol::Adalight, PixelOrder::Rgbw);
        let frame = encoder.encode(&[1u8; 6]);
        // two LEDs, four bytes each
        assert_eq!(frame[4], 2);
        assert_eq!(frame.len(), 6 + 8);
    }
}
