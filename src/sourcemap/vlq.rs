//! Base64 variable-length quantities as used by source map `mappings`.
//!
//! Each value is split into 5-bit groups, least significant first, with
//! bit 6 as the continuation flag and the sign stored in the lowest bit.

use crate::{Error, Result};

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

pub fn encode_into(out: &mut String, value: i64) {
    let mut vlq = if value < 0 {
        (value.unsigned_abs() << 1) | 1
    } else {
        (value as u64) << 1
    };
    loop {
        let mut digit = (vlq & 31) as usize;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 32;
        }
        out.push(ALPHABET[digit] as char);
        if vlq == 0 {
            break;
        }
    }
}

pub fn encode(values: &[i64]) -> String {
    let mut out = String::new();
    for &value in values {
        encode_into(&mut out, value);
    }
    out
}

pub fn decode(segment: &str) -> Result<Vec<i64>> {
    let mut values = Vec::new();
    let mut shift = 0u32;
    let mut value = 0u64;

    for byte in segment.bytes() {
        let digit = ALPHABET
            .iter()
            .position(|&c| c == byte)
            .ok_or_else(|| Error::SourceMap(format!("Invalid character ({})", byte as char)))?
            as u64;
        if shift > 60 {
            return Err(Error::SourceMap(format!("VLQ value too large in '{segment}'")));
        }
        value += (digit & 31) << shift;

        if digit & 32 != 0 {
            shift += 5;
            continue;
        }

        let magnitude = (value >> 1) as i64;
        values.push(if value & 1 == 1 { -magnitude } else { magnitude });
        value = 0;
        shift = 0;
    }

    if shift != 0 {
        return Err(Error::SourceMap(format!("Truncated VLQ segment '{segment}'")));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_encodings() {
        assert_eq!(encode(&[0]), "A");
        assert_eq!(encode(&[1]), "C");
        assert_eq!(encode(&[-1]), "D");
        assert_eq!(encode(&[16]), "gB");
        assert_eq!(encode(&[0, 0, 16, 1]), "AAgBC");
    }

    #[test]
    fn test_decode_large_and_negative() {
        assert_eq!(decode("2HwcqxB").unwrap(), vec![123, 456, 789]);
        assert_eq!(decode("D").unwrap(), vec![-1]);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode("A!").is_err());
        assert!(decode("g").is_err());
    }
}
