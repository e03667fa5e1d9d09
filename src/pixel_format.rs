use serde::{Deserialize, Serialize};

/// Channel order expected by the strip hardware
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum PixelOrder {
    #[default]
    #[serde(rename = "RGB")]
    Rgb,
    #[serde(rename = "GRB")]
    Grb,
    #[serde(rename = "BGR")]
    Bgr,
    #[serde(rename = "RGBW")]
    Rgbw,
    #[serde(rename = "GRBW")]
    Grbw,
}

impl PixelOrder {
    /// Bytes per LED on the wire
    pub fn stride(self) -> usize {
        match self {
            PixelOrder::Rgbw | PixelOrder::Grbw => 4,
            _ => 3,
        }
    }

    /// Reorder an RGB color buffer into this channel order
    pub fn apply(self, rgb: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(rgb.len() / 3 * self.stride());

        for px in rgb.chunks_exact(3) {
            let (r, g, b) = (px[0], px[1], px[2]);
            match self {
                PixelOrder::Rgb => out.extend_from_slice(&[r, g, b]),
                PixelOrder::Grb => out.extend_from_slice(&[g, r, b]),
                PixelOrder::Bgr => out.extend_from_slice(&[b, g, r]),
                PixelOrder::Rgbw => {
                    // White is the common part of all three channels
                    let w = r.min(g).min(b);
                    out.extend_from_slice(&[r - w, g - w, b - w, w]);
                }
                PixelOrder::Grbw => {
                    let w = r.min(g).min(b);
                    out.extend_from_slice(&[g - w, r - w, b - w, w]);
                }
            }
        }

        out
    }
}
