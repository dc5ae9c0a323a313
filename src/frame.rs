//! Binary frame codec
//!
//! A frame is 112 bytes sent as hex: 7 contiguous 16-byte night records,
//! multi-byte fields little-endian.
//!
//! ```text
//! offset  0..4   onset       u32
//!         4..8   offset      u32
//!         8..10  duration    u16
//!        10      efficiency  u8
//!        11..13  waso        u16
//!        13      awakenings  u8
//!        14      light       u8
//!        15      valid       u8
//! ```

use crate::error::FeskError;
use crate::types::{Night, FRAME_BYTES, NIGHTS_PER_FRAME, NIGHT_BYTES};

/// Number of significant hex digits in a frame
pub const FRAME_HEX_LEN: usize = FRAME_BYTES * 2;

/// Decode a hex transport string into the 7 nights it carries.
///
/// Every character outside `[0-9A-Fa-f]` is dropped first, so whitespace and
/// separators are tolerated. Field ranges are not checked here.
pub fn decode(raw: &str) -> Result<[Night; NIGHTS_PER_FRAME], FeskError> {
    let bytes = hex_to_bytes(raw)?;
    let nights = parse_nights(&bytes);
    tracing::debug!(
        with_data = nights.iter().filter(|n| n.has_data()).count(),
        "decoded frame"
    );
    Ok(nights)
}

/// Strip separators and convert the remaining hex digits to a frame buffer
pub fn hex_to_bytes(raw: &str) -> Result<[u8; FRAME_BYTES], FeskError> {
    let clean: String = raw.chars().filter(char::is_ascii_hexdigit).collect();
    if clean.len() != FRAME_HEX_LEN {
        tracing::warn!(length = clean.len(), "rejecting malformed frame");
        return Err(FeskError::MalformedFrame {
            length: clean.len(),
        });
    }

    let mut bytes = [0u8; FRAME_BYTES];
    hex::decode_to_slice(&clean, &mut bytes).map_err(|_| FeskError::MalformedFrame {
        length: clean.len(),
    })?;
    Ok(bytes)
}

/// Split text holding several frames into one raw string per frame.
///
/// A line with a full frame's worth of hex digits is a frame on its own.
/// Shorter lines are joined until they add up to a frame, so hex wrapped at a
/// fixed width (as `xxd -p` prints it) is reassembled. Blank lines end the
/// frame being assembled.
pub fn split_frames(text: &str) -> Vec<String> {
    let mut frames = Vec::new();
    let mut pending = String::new();
    let mut pending_digits = 0;

    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            flush(&mut frames, &mut pending, &mut pending_digits);
            continue;
        }

        let digits = hex_digit_count(line);
        if digits >= FRAME_HEX_LEN {
            flush(&mut frames, &mut pending, &mut pending_digits);
            frames.push(line.to_string());
            continue;
        }

        pending.push_str(line);
        pending_digits += digits;
        if pending_digits >= FRAME_HEX_LEN {
            flush(&mut frames, &mut pending, &mut pending_digits);
        }
    }
    flush(&mut frames, &mut pending, &mut pending_digits);
    frames
}

fn flush(frames: &mut Vec<String>, pending: &mut String, pending_digits: &mut usize) {
    if !pending.is_empty() {
        frames.push(std::mem::take(pending));
    }
    *pending_digits = 0;
}

fn hex_digit_count(s: &str) -> usize {
    s.chars().filter(char::is_ascii_hexdigit).count()
}

/// Split a frame buffer into its night records
pub fn parse_nights(bytes: &[u8; FRAME_BYTES]) -> [Night; NIGHTS_PER_FRAME] {
    let mut nights = [Night::default(); NIGHTS_PER_FRAME];
    for (night, block) in nights.iter_mut().zip(bytes.chunks_exact(NIGHT_BYTES)) {
        *night = parse_night(block);
    }
    nights
}

fn parse_night(b: &[u8]) -> Night {
    Night {
        onset: u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
        offset: u32::from_le_bytes([b[4], b[5], b[6], b[7]]),
        duration: u16::from_le_bytes([b[8], b[9]]),
        efficiency: b[10],
        waso: u16::from_le_bytes([b[11], b[12]]),
        awakenings: b[13],
        light: b[14],
        valid: b[15],
    }
}

/// Pack nights into a frame buffer, the inverse of [`parse_nights`]
pub fn encode(nights: &[Night; NIGHTS_PER_FRAME]) -> [u8; FRAME_BYTES] {
    let mut bytes = [0u8; FRAME_BYTES];
    for (night, block) in nights.iter().zip(bytes.chunks_exact_mut(NIGHT_BYTES)) {
        write_night(night, block);
    }
    bytes
}

fn write_night(night: &Night, block: &mut [u8]) {
    block[0..4].copy_from_slice(&night.onset.to_le_bytes());
    block[4..8].copy_from_slice(&night.offset.to_le_bytes());
    block[8..10].copy_from_slice(&night.duration.to_le_bytes());
    block[10] = night.efficiency;
    block[11..13].copy_from_slice(&night.waso.to_le_bytes());
    block[13] = night.awakenings;
    block[14] = night.light;
    block[15] = night.valid;
}

/// Encode nights as a lowercase 224-digit hex frame
pub fn to_hex(nights: &[Night; NIGHTS_PER_FRAME]) -> String {
    hex::encode(encode(nights))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_night() -> Night {
        Night {
            onset: 1_705_361_400,
            offset: 1_705_390_200,
            duration: 480,
            efficiency: 90,
            waso: 20,
            awakenings: 1,
            light: 200,
            valid: 1,
        }
    }

    #[test]
    fn test_decode_single_night_layout() {
        let mut block = String::new();
        block.push_str("f8bfa565"); // onset 0x65a5bff8
        block.push_str("7830a665"); // offset 0x65a63078
        block.push_str("e001"); // duration 480
        block.push_str("5a"); // efficiency 90
        block.push_str("1400"); // waso 20
        block.push_str("01"); // awakenings
        block.push_str("c8"); // light 200
        block.push_str("01"); // valid
        let frame = block + &"00".repeat(96);

        let nights = decode(&frame).unwrap();
        assert_eq!(nights[0], sample_night());
        for night in &nights[1..] {
            assert_eq!(*night, Night::default());
        }
    }

    #[test]
    fn test_decode_tolerates_separators() {
        let nights = [sample_night(); NIGHTS_PER_FRAME];
        let hex = to_hex(&nights);
        let spaced: String = hex
            .as_bytes()
            .chunks(2)
            .map(|pair| std::str::from_utf8(pair).unwrap().to_uppercase())
            .collect::<Vec<_>>()
            .join(" ");
        let wrapped = format!("{}\n{}", &spaced[..100], &spaced[100..]);

        assert_eq!(decode(&wrapped).unwrap(), nights);
    }

    #[test]
    fn test_split_reassembles_wrapped_frame() {
        let nights = [sample_night(); NIGHTS_PER_FRAME];
        let hex = to_hex(&nights);
        // 60/60/60/44 columns
        let wrapped = format!(
            "{}\n{}\n{}\n{}\n",
            &hex[..60],
            &hex[60..120],
            &hex[120..180],
            &hex[180..]
        );

        let frames = split_frames(&wrapped);
        assert_eq!(frames.len(), 1);
        assert_eq!(decode(&frames[0]).unwrap(), nights);
    }

    #[test]
    fn test_split_one_frame_per_line() {
        let first = to_hex(&[sample_night(); NIGHTS_PER_FRAME]);
        let second = to_hex(&[Night::default(); NIGHTS_PER_FRAME]);
        let text = format!("{first}\n\n{second}\n");

        assert_eq!(split_frames(&text), vec![first, second]);
    }

    #[test]
    fn test_split_keeps_short_fragment_apart_from_full_line() {
        let full = to_hex(&[sample_night(); NIGHTS_PER_FRAME]);
        let text = format!("deadbeef\n{full}\n{}\n\n{}", &full[..100], &full[100..]);

        let frames = split_frames(&text);
        assert_eq!(frames.len(), 4);
        assert!(matches!(
            decode(&frames[0]),
            Err(FeskError::MalformedFrame { length: 8 })
        ));
        assert!(decode(&frames[1]).is_ok());
        // a blank line ends the partial frame
        assert!(matches!(
            decode(&frames[2]),
            Err(FeskError::MalformedFrame { length: 100 })
        ));
        assert!(matches!(
            decode(&frames[3]),
            Err(FeskError::MalformedFrame { length: 124 })
        ));
    }

    #[test]
    fn test_split_empty_input() {
        assert!(split_frames("\n  \n").is_empty());
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let short = "00".repeat(111);
        match decode(&short) {
            Err(FeskError::MalformedFrame { length }) => assert_eq!(length, 222),
            other => panic!("expected MalformedFrame, got {other:?}"),
        }

        let long = "00".repeat(112) + "0";
        assert!(matches!(
            decode(&long),
            Err(FeskError::MalformedFrame { length: 225 })
        ));

        assert!(matches!(
            decode(""),
            Err(FeskError::MalformedFrame { length: 0 })
        ));
    }

    #[test]
    fn test_non_hex_characters_do_not_count() {
        // 'x' and 'g' are stripped, leaving the leading '0' plus 222 digits
        let frame = "0x".to_string() + &"00".repeat(111) + "gg";
        assert!(matches!(
            decode(&frame),
            Err(FeskError::MalformedFrame { length: 223 })
        ));
    }

    #[test]
    fn test_out_of_range_fields_are_accepted() {
        let mut night = sample_night();
        night.efficiency = 200;
        night.valid = 7;
        let nights = [night; NIGHTS_PER_FRAME];

        let decoded = decode(&to_hex(&nights)).unwrap();
        assert_eq!(decoded[3].efficiency, 200);
        assert_eq!(decoded[3].valid, 7);
    }

    #[test]
    fn test_byte_level_round_trip() {
        let bytes: Vec<u8> = (0..FRAME_BYTES as u32).map(|i| (i * 37 % 256) as u8).collect();
        let hex = hex::encode(&bytes);

        let nights = decode(&hex).unwrap();
        assert_eq!(encode(&nights).to_vec(), bytes);
    }

    #[test]
    fn test_blocks_follow_input_order() {
        let mut nights = [Night::default(); NIGHTS_PER_FRAME];
        for (i, night) in nights.iter_mut().enumerate() {
            night.onset = 1000 + i as u32;
            night.valid = 1;
        }
        let bytes = encode(&nights);
        assert_eq!(&bytes[16..20], &1001u32.to_le_bytes());
        assert_eq!(&bytes[96..100], &1006u32.to_le_bytes());

        let decoded = parse_nights(&bytes);
        assert_eq!(decoded[6].onset, 1006);
    }
}
