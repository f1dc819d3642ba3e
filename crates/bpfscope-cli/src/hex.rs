//! Hex codecs for keys and values given on, or printed to, the terminal.
//!
//! Keys are typed as separate byte tokens (`key 0a 0b 0c 0d`), so the
//! parser splits on whitespace and decodes each token on its own.

use bpfscope_core::InspectError;

/// Parses whitespace-separated hex byte tokens such as `"0a b 0C"`.
///
/// Every token is one or two hex digits, optionally prefixed with `0x`.
/// Empty input yields an empty vector.
pub fn parse_hex_bytes(input: &str) -> Result<Vec<u8>, InspectError> {
    input
        .split_whitespace()
        .map(|token| {
            let digits = token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token);
            let mut byte = [0u8; 1];
            let decoded = match digits.len() {
                1 => ::hex::decode_to_slice(format!("0{}", digits), &mut byte),
                2 => ::hex::decode_to_slice(digits, &mut byte),
                _ => return Err(invalid_token(token)),
            };
            decoded.map_err(|_| invalid_token(token))?;
            Ok(byte[0])
        })
        .collect()
}

/// Formats bytes as lowercase two-digit tokens joined by single spaces.
pub fn format_hex_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| ::hex::encode([*b]))
        .collect::<Vec<_>>()
        .join(" ")
}

fn invalid_token(token: &str) -> InspectError {
    InspectError::invalid_input(format!("invalid hex byte '{}'", token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_tokens() {
        assert_eq!(parse_hex_bytes("0a b 0C").unwrap(), vec![0x0a, 0x0b, 0x0c]);
        assert_eq!(parse_hex_bytes("0xff  0X1\t2").unwrap(), vec![0xff, 0x01, 0x02]);
        assert_eq!(parse_hex_bytes("").unwrap(), Vec::<u8>::new());
        assert_eq!(parse_hex_bytes("   ").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn errors_name_the_token() {
        assert_eq!(
            parse_hex_bytes("01 abc").unwrap_err(),
            InspectError::invalid_input("invalid hex byte 'abc'")
        );
        assert!(parse_hex_bytes("zz").is_err());
        assert!(parse_hex_bytes("0x").is_err());
        assert!(parse_hex_bytes("+1").is_err());
    }

    #[test]
    fn formats_lowercase_pairs() {
        assert_eq!(format_hex_bytes(&[0, 0x1f, 0xab]), "00 1f ab");
        assert_eq!(format_hex_bytes(&[]), "");
    }

    proptest::proptest! {
        #[test]
        fn formatted_bytes_parse_back(bytes in proptest::collection::vec(proptest::num::u8::ANY, 0..64)) {
            proptest::prop_assert_eq!(parse_hex_bytes(&format_hex_bytes(&bytes)).unwrap(), bytes);
        }
    }
}
