//! # Raster Row Compression
//!
//! Run-length scheme for raster row payloads, enabled by a `compression`
//! instruction with payload `0x02`.
//!
//! Each group starts with a control byte `n`, read as a signed 8-bit value:
//!
//! | Control | Meaning | Group size |
//! |---------|---------|------------|
//! | `n < 0` | repeat the next byte `1 - n` times | 2 bytes |
//! | `n >= 0` | copy the next `n + 1` bytes verbatim | `n + 2` bytes |
//!
//! There is no end marker. Decoding stops exactly when the payload is used
//! up; a group that runs past the end is a malformed row.
//!
//! ```text
//! FD AA          -> AA AA AA AA
//! 02 01 02 03    -> 01 02 03
//! ```

use crate::error::{QlError, Result};

/// Longest run or literal group a single control byte can describe.
pub const MAX_GROUP: usize = 128;

/// Decode one compressed row.
pub fn decode_row(payload: &[u8]) -> Result<Vec<u8>> {
    let mut row = Vec::with_capacity(payload.len() * 2);
    let mut index = 0;

    while index < payload.len() {
        let n = payload[index] as i8;
        if n < 0 {
            let value = *payload
                .get(index + 1)
                .ok_or(QlError::MalformedRow { offset: index })?;
            let count = (1 - n as isize) as usize;
            row.resize(row.len() + count, value);
            index += 2;
        } else {
            let count = n as usize + 1;
            let literal = payload
                .get(index + 1..index + 1 + count)
                .ok_or(QlError::MalformedRow { offset: index })?;
            row.extend_from_slice(literal);
            index += 1 + count;
        }
    }

    Ok(row)
}

/// Encode one row with the same scheme.
///
/// Runs of two or more identical bytes become repeat groups, everything else
/// is packed into literal groups of at most [`MAX_GROUP`] bytes.
pub fn encode_row(row: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(row.len() + row.len() / MAX_GROUP + 1);
    let mut literals: Vec<u8> = Vec::with_capacity(MAX_GROUP);
    let mut i = 0;

    while i < row.len() {
        let mut run = 1;
        while i + run < row.len() && row[i + run] == row[i] && run < MAX_GROUP {
            run += 1;
        }

        if run >= 2 {
            flush_literals(&mut out, &mut literals);
            out.push((1 - run as i16) as i8 as u8);
            out.push(row[i]);
            i += run;
        } else {
            literals.push(row[i]);
            if literals.len() == MAX_GROUP {
                flush_literals(&mut out, &mut literals);
            }
            i += 1;
        }
    }
    flush_literals(&mut out, &mut literals);

    out
}

fn flush_literals(out: &mut Vec<u8>, literals: &mut Vec<u8>) {
    if literals.is_empty() {
        return;
    }
    out.push((literals.len() - 1) as u8);
    out.append(literals);
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_decode_repeat() {
        assert_eq!(decode_row(&[0xFD, 0xAA]).unwrap(), vec![0xAA; 4]);
    }

    #[test]
    fn test_decode_literal() {
        assert_eq!(decode_row(&[0x02, 1, 2, 3]).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_decode_mixed() {
        let payload = [0x00, 0x11, 0xFF, 0x22, 0x01, 0x33, 0x44];
        assert_eq!(
            decode_row(&payload).unwrap(),
            vec![0x11, 0x22, 0x22, 0x33, 0x44]
        );
    }

    #[test]
    fn test_decode_max_run() {
        // 0x81 = -127 -> 128 repetitions
        assert_eq!(decode_row(&[0x81, 0x00]).unwrap(), vec![0x00; 128]);
        // 0x7F = 127 -> 128 literal bytes
        let mut payload = vec![0x7F];
        payload.extend(0..128u8);
        assert_eq!(decode_row(&payload).unwrap(), (0..128u8).collect::<Vec<_>>());
    }

    #[test]
    fn test_decode_empty() {
        assert!(decode_row(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_decode_truncated_repeat() {
        let err = decode_row(&[0x00, 0x11, 0xFE]).unwrap_err();
        assert!(matches!(err, QlError::MalformedRow { offset: 2 }));
    }

    #[test]
    fn test_decode_truncated_literal() {
        let err = decode_row(&[0x03, 1, 2]).unwrap_err();
        assert!(matches!(err, QlError::MalformedRow { offset: 0 }));
    }

    #[test]
    fn test_encode_all_repeat() {
        assert_eq!(encode_row(&[0x00; 90]), vec![(1 - 90i16) as u8, 0x00]);
    }

    #[test]
    fn test_encode_splits_long_runs() {
        let encoded = encode_row(&[0xFF; 300]);
        assert_eq!(encoded, vec![0x81, 0xFF, 0x81, 0xFF, 0xD5, 0xFF]);
        assert_eq!(decode_row(&encoded).unwrap(), vec![0xFF; 300]);
    }

    #[test]
    fn test_encode_all_literal() {
        let row: Vec<u8> = (0..200).map(|i| (i % 2) as u8).collect();
        let encoded = encode_row(&row);
        assert_eq!(encoded[0], 0x7F);
        assert_eq!(encoded[129], 200 - 128 - 1);
        assert_eq!(encoded.len(), 200 + 2);
    }

    proptest! {
        #[test]
        fn prop_round_trip(row in proptest::collection::vec(any::<u8>(), 0..400)) {
            prop_assert_eq!(decode_row(&encode_row(&row)).unwrap(), row);
        }

        #[test]
        fn prop_round_trip_runs(
            runs in proptest::collection::vec((any::<u8>(), 1usize..200), 0..12)
        ) {
            let row: Vec<u8> = runs
                .iter()
                .flat_map(|&(b, n)| std::iter::repeat_n(b, n))
                .collect();
            prop_assert_eq!(decode_row(&encode_row(&row)).unwrap(), row);
        }
    }
}
