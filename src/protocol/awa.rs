/// AWA frame as understood by HyperSerial firmware: `Awa`, LED count minus
/// one (big-endian u16), header CRC, pixel bytes, then three Fletcher bytes.
pub fn awa_frame(pixels: &[u8], led_count: usize) -> Vec<u8> {
    let [hi, lo] = (led_count.saturating_sub(1) as u16).to_be_bytes();

    let mut frame = Vec::with_capacity(6 + pixels.len() + 3);
    frame.extend_from_slice(b"Awa");
    frame.extend_from_slice(&[hi, lo, hi ^ lo ^ 0x55]);
    frame.extend_from_slice(pixels);
    frame.extend_from_slice(&fletcher(pixels));
    frame
}

fn fletcher(pixels: &[u8]) -> [u8; 3] {
    let (mut f1, mut f2, mut ext) = (0u32, 0u32, 0u32);

    for (position, &byte) in pixels.iter().enumerate() {
        f1 = (f1 + byte as u32) % 255;
        f2 = (f2 + f1) % 255;
        ext = (ext + (byte as u32 ^ (position as u32 & 0xffff))) % 255;
    }

    // 'A' would look like the start of a new header
    if ext == 0x41 {
        ext = 0xaa;
    }

    [f1 as u8, f2 as u8, ext as u8]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_counts_from_zero() {
        let frame = awa_frame(&[0u8; 48], 16);
        assert_eq!(&frame[..6], &[b'A', b'w', b'a', 0x00, 0x0f, 0x0f ^ 0x55]);
        assert_eq!(frame.len(), 6 + 48 + 3);
    }

    #[test]
    fn black_frame_checksums() {
        // ext sums the positions 0..48 since every byte is zero
        let expected_ext = ((0..48u16).sum::<u16>() % 255) as u8;
        let frame = awa_frame(&[0u8; 48], 16);
        assert_eq!(&frame[54..], &[0, 0, expected_ext]);
    }

    #[test]
    fn fletcher_ext_never_emits_header_byte() {
        // single byte 0x41 at position 0 gives ext == 0x41
        assert_eq!(fletcher(&[0x41]), [0x41, 0x41, 0xaa]);
    }
}
