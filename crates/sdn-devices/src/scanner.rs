/*!
 * Frame scanner.
 *
 * Finds the first decodable frame in an accumulating receive buffer. The
 * buffer is only inspected here; the caller advances it by the returned
 * byte count.
 */
use crate::address::Address;
use crate::codec::{checksum, invert};
use crate::error::DeviceError;
use crate::message::{MasterControl, Message, NodeType, MAX_FRAME_LENGTH, MIN_FRAME_LENGTH};

/// Outcome of one scan over the buffer
#[derive(Debug)]
pub enum Scan {
    /// A frame was decoded; drop `consumed` bytes from the buffer
    Frame {
        /// The decoded message
        message: Message,
        /// Bytes up to and including the frame
        consumed: usize,
    },
    /// No complete frame yet; keep the buffer and read more
    Incomplete,
    /// A frame passed its checksum but its parameters did not decode.
    /// Drop `skip` bytes and scan again.
    Malformed {
        /// Why decoding failed
        error: DeviceError,
        /// Bytes to drop to resume scanning one byte past the frame start
        skip: usize,
    },
}

/// Scan `data` for the first valid frame
pub fn scan(data: &[u8]) -> Scan {
    for offset in 0..data.len() {
        let window = &data[offset..];

        if let Some(control) = MasterControl::parse(window) {
            let message = Message::from_parts(
                NodeType::Unspecified,
                false,
                Address::NONE,
                Address::BROADCAST,
                control,
            );
            return Scan::Frame {
                message,
                consumed: offset + MasterControl::FRAME_LENGTH,
            };
        }

        // A short tail can still hold a master control frame further on
        if window.len() < MIN_FRAME_LENGTH {
            continue;
        }

        let length = usize::from(invert(window[1]) & 0x7f);
        if !(MIN_FRAME_LENGTH..=MAX_FRAME_LENGTH).contains(&length) || length > window.len() {
            continue;
        }

        let frame = &window[..length];
        let (body, sum) = frame.split_at(length - 2);
        if checksum(body) != sum {
            continue;
        }

        return match Message::decode_frame(frame) {
            Ok(message) => Scan::Frame {
                message,
                consumed: offset + length,
            },
            Err(error) => Scan::Malformed {
                error,
                skip: offset + 1,
            },
        };
    }
    Scan::Incomplete
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{GetMotorPosition, Kind, PostMotorPosition};

    fn frame() -> Vec<u8> {
        vec![0xf3, 0xf4, 0xff, 0xfe, 0xff, 0xff, 0xfc, 0xfd, 0xfe, 0x08, 0xd9]
    }

    #[test]
    fn test_clean_frame() {
        match scan(&frame()) {
            Scan::Frame { message, consumed } => {
                assert_eq!(consumed, 11);
                assert_eq!(message.kind(), Kind::GetMotorPosition);
                assert_eq!(message.dest, Address::new([1, 2, 3]));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_leading_garbage_is_skipped() {
        let mut data = vec![0x00, 0x13, 0x37];
        data.extend(frame());
        match scan(&data) {
            Scan::Frame { consumed, .. } => assert_eq!(consumed, 14),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_partial_frame_needs_more_data() {
        let data = frame();
        assert!(matches!(scan(&data[..7]), Scan::Incomplete));
        assert!(matches!(scan(&data[..10]), Scan::Incomplete));
        assert!(matches!(scan(&[]), Scan::Incomplete));
    }

    #[test]
    fn test_corrupted_byte_only_costs_the_bad_frame() -> crate::error::Result<()> {
        let report = Message::new(Address::new([1, 2, 3]), PostMotorPosition::default()).encode()?;
        for index in 0..frame().len() {
            let mut bad = frame();
            bad[index] ^= 0x10;
            let bad_len = bad.len();
            bad.extend(&report);
            match scan(&bad) {
                Scan::Frame { message, consumed } => {
                    assert_eq!(message.kind(), Kind::PostMotorPosition, "flip at {}", index);
                    assert_eq!(consumed, bad_len + report.len());
                }
                other => panic!("flip at {}: unexpected {:?}", index, other),
            }
        }
        Ok(())
    }

    #[test]
    fn test_bad_parameters_skip_one_byte() -> crate::error::Result<()> {
        let mut data = Message::new(Address::new([1, 2, 3]), GetMotorPosition).encode()?;
        // Claim 12 bytes so the Get carries a stray parameter, then fix the checksum
        data.truncate(9);
        data[1] = invert(12);
        data.push(0xff);
        let sum = checksum(&data);
        data.extend_from_slice(&sum);

        match scan(&data) {
            Scan::Malformed { error, skip } => {
                assert!(matches!(error, DeviceError::Malformed(_)));
                assert_eq!(skip, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_master_control_prefix() {
        let mut data = vec![0x42];
        data.extend(MasterControl::Down.encode());
        match scan(&data) {
            Scan::Frame { message, consumed } => {
                assert_eq!(consumed, 6);
                assert_eq!(message.kind(), Kind::MasterControl);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
