/// Adalight frame: `Ada`, LED count (big-endian u16), checksum, pixel bytes
pub fn adalight_frame(pixels: &[u8], led_count: usize) -> Vec<u8> {
    let [hi, lo] = (led_count as u16).to_be_bytes();

    let mut frame = Vec::with_capacity(6 + pixels.len());
    frame.extend_from_slice(b"Ada");
    frame.extend_from_slice(&[hi, lo, hi ^ lo ^ 0x55]);
    frame.extend_from_slice(pixels);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_carries_count_and_checksum() {
        let frame = adalight_frame(&[0u8; 48], 16);
        assert_eq!(&frame[..6], &[b'A', b'd', b'a', 0x00, 0x10, 0x45]);
        assert_eq!(frame.len(), 54);
    }

    #[test]
    fn count_above_255_uses_high_byte() {
        let frame = adalight_frame(&[], 300);
        assert_eq!(frame[3], 0x01);
        assert_eq!(frame[4], 0x2c);
        assert_eq!(frame[5], 0x01 ^ 0x2c ^ 0x55);
    }
}
