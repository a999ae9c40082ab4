use crate::error::CodecError;

use nom::{bytes::complete::take, combinator::map_opt, IResult};
use serde_json::Value;

pub struct Utils;

impl Utils {
    // {{{ hex helpers

    /// Parses whitespace separated groups of hex digit pairs, eg. `"FF 03 02 00 02"` or
    /// `"FE03020001"`. Every group must hold an even number of digits.
    pub fn bytes_from_hex(input: &str) -> Result<Vec<u8>, CodecError> {
        let mut r = Vec::with_capacity(input.len() / 2);

        for word in input.split_whitespace() {
            if word.len() % 2 != 0 {
                return Err(CodecError::Format {
                    input: input.to_string(),
                    reason: "odd number of hex digits",
                });
            }

            let digits = word.as_bytes();
            for pair in digits.chunks(2) {
                let hi = Self::hex_digit(pair[0]);
                let lo = Self::hex_digit(pair[1]);
                match (hi, lo) {
                    (Some(hi), Some(lo)) => r.push(hi << 4 | lo),
                    _ => {
                        return Err(CodecError::Format {
                            input: input.to_string(),
                            reason: "non-hex digit",
                        })
                    }
                }
            }
        }

        Ok(r)
    }

    fn hex_digit(c: u8) -> Option<u8> {
        (c as char).to_digit(16).map(|d| d as u8)
    }

    /// Renders bytes as uppercase two-digit groups separated by spaces.
    pub fn hex_from_bytes(data: &[u8]) -> String {
        data.iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Renders a single integer as bare uppercase hex, without zero padding.
    pub fn hex_from_int(value: u64) -> String {
        format!("{:X}", value)
    }

    /// Renders a dynamically shaped value: integers as bare hex, strings as their
    /// bytes, arrays element by element joined with spaces.
    pub fn hex_from_value(value: &Value) -> Result<String, CodecError> {
        match value {
            Value::Number(n) => n
                .as_u64()
                .map(Self::hex_from_int)
                .ok_or(CodecError::UnsupportedType(if n.is_f64() {
                    "float"
                } else {
                    "negative integer"
                })),
            Value::String(s) => Ok(Self::hex_from_bytes(s.as_bytes())),
            Value::Array(items) => Ok(items
                .iter()
                .map(Self::hex_from_value)
                .collect::<Result<Vec<_>, _>>()?
                .join(" ")),
            Value::Null => Err(CodecError::UnsupportedType("null")),
            Value::Bool(_) => Err(CodecError::UnsupportedType("bool")),
            Value::Object(_) => Err(CodecError::UnsupportedType("object")),
        }
    }
    // }}}

    /// Little-endian unsigned integer: the first byte is the least significant.
    /// Any length is accepted; `None` when the value does not fit in a `u64`.
    pub fn le_bytes_to_int(data: &[u8]) -> Option<u64> {
        data.iter().rev().try_fold(0u64, |acc, &b| {
            if acc >> 56 != 0 {
                return None;
            }
            Some(acc << 8 | u64::from(b))
        })
    }

    /// Big-endian u16 from two bytes at `offset`, the Modbus register byte order.
    pub fn be_u16(data: &[u8], offset: usize) -> u16 {
        u16::from_be_bytes([data[offset], data[offset + 1]])
    }

    pub fn round(value: f64, decimals: i32) -> f64 {
        let m = 10f64.powi(decimals);
        (value * m).round() / m
    }

    // {{{ nom field parsers

    fn le_scaled(input: &[u8], len: usize, f: impl Fn(f64) -> f64) -> IResult<&[u8], f64> {
        map_opt(take(len), |b: &[u8]| Self::le_bytes_to_int(b).map(|v| f(v as f64)))(input)
    }

    pub fn le_u8_div1(input: &[u8]) -> IResult<&[u8], f64> {
        Self::le_scaled(input, 1, |v| v)
    }

    pub fn le_u8_mul5(input: &[u8]) -> IResult<&[u8], f64> {
        Self::le_scaled(input, 1, |v| v * 5.0)
    }

    pub fn le_u8_div100(input: &[u8]) -> IResult<&[u8], f64> {
        Self::le_scaled(input, 1, |v| v / 100.0)
    }

    pub fn le_u16_div1(input: &[u8]) -> IResult<&[u8], f64> {
        Self::le_scaled(input, 2, |v| v)
    }

    pub fn le_u16_div10(input: &[u8]) -> IResult<&[u8], f64> {
        Self::le_scaled(input, 2, |v| v / 10.0)
    }

    pub fn le_u16_div100(input: &[u8]) -> IResult<&[u8], f64> {
        Self::le_scaled(input, 2, |v| v / 100.0)
    }

    pub fn le_u24_div60(input: &[u8]) -> IResult<&[u8], f64> {
        Self::le_scaled(input, 3, |v| v / 60.0)
    }

    pub fn le_u24_div100(input: &[u8]) -> IResult<&[u8], f64> {
        Self::le_scaled(input, 3, |v| v / 100.0)
    }
    // }}}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bytes_from_hex() {
        assert_eq!(Utils::bytes_from_hex("41").unwrap(), vec![0x41]);
        assert_eq!(
            Utils::bytes_from_hex("FF 03 02 00 02").unwrap(),
            vec![0xFF, 0x03, 0x02, 0x00, 0x02]
        );
        assert_eq!(
            Utils::bytes_from_hex("FE03020001").unwrap(),
            vec![0xFE, 0x03, 0x02, 0x00, 0x01]
        );
        assert_eq!(Utils::bytes_from_hex(" 4135\n").unwrap(), vec![0x41, 0x35]);
        assert_eq!(Utils::bytes_from_hex("c1 f3").unwrap(), vec![0xC1, 0xF3]);
        assert_eq!(Utils::bytes_from_hex("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn bytes_from_hex_rejects_odd_length() {
        assert!(matches!(
            Utils::bytes_from_hex("513"),
            Err(CodecError::Format { reason: "odd number of hex digits", .. })
        ));
        assert!(Utils::bytes_from_hex("11 0").is_err());
    }

    #[test]
    fn bytes_from_hex_rejects_non_hex() {
        assert!(matches!(
            Utils::bytes_from_hex("0G"),
            Err(CodecError::Format { reason: "non-hex digit", .. })
        ));
    }

    #[test]
    fn hex_from_bytes() {
        assert_eq!(Utils::hex_from_bytes(&[0x51, 0xD8]), "51 D8");
        assert_eq!(Utils::hex_from_bytes(&[0x00, 0x0a]), "00 0A");
        assert_eq!(Utils::hex_from_bytes(&[]), "");
    }

    #[test]
    fn hex_from_int() {
        assert_eq!(Utils::hex_from_int(5), "5");
        assert_eq!(Utils::hex_from_int(10), "A");
        assert_eq!(Utils::hex_from_int(0x1BCDB), "1BCDB");
    }

    #[test]
    fn hex_from_value() {
        assert_eq!(Utils::hex_from_value(&json!(10)).unwrap(), "A");
        assert_eq!(Utils::hex_from_value(&json!("A5")).unwrap(), "41 35");
        assert_eq!(Utils::hex_from_value(&json!(["A", "5"])).unwrap(), "41 35");
        assert_eq!(Utils::hex_from_value(&json!([17, 0])).unwrap(), "11 0");
    }

    #[test]
    fn hex_from_value_rejects_unsupported() {
        assert_eq!(
            Utils::hex_from_value(&json!(1.5)),
            Err(CodecError::UnsupportedType("float"))
        );
        assert_eq!(
            Utils::hex_from_value(&json!(true)),
            Err(CodecError::UnsupportedType("bool"))
        );
        assert_eq!(
            Utils::hex_from_value(&json!(["A", null])),
            Err(CodecError::UnsupportedType("null"))
        );
        assert_eq!(
            Utils::hex_from_value(&json!({"a": 1})),
            Err(CodecError::UnsupportedType("object"))
        );
    }

    #[test]
    fn le_bytes_to_int() {
        assert_eq!(Utils::le_bytes_to_int(&[0x0A]), Some(10));
        assert_eq!(Utils::le_bytes_to_int(&[0xFF]), Some(255));
        assert_eq!(Utils::le_bytes_to_int(&[0x12, 0x34]), Some(0x3412));
        assert_eq!(Utils::le_bytes_to_int(&[0x12, 0x34]), Some(13330));
        assert_eq!(Utils::le_bytes_to_int(&[0xAA, 0xAA]), Some(43690));
        assert_eq!(Utils::le_bytes_to_int(&[0xDB, 0xBC, 0x01]), Some(113883));
        assert_eq!(Utils::le_bytes_to_int(&[0x01, 0x02, 0x03, 0x04]), Some(0x04030201));
        assert_eq!(Utils::le_bytes_to_int(&[]), Some(0));
    }

    #[test]
    fn le_bytes_to_int_wide_input() {
        assert_eq!(Utils::le_bytes_to_int(&[0xFF; 8]), Some(u64::MAX));

        // high zero bytes do not count against the width
        let mut padded = vec![0x34, 0x12];
        padded.extend_from_slice(&[0x00; 14]);
        assert_eq!(Utils::le_bytes_to_int(&padded), Some(0x1234));

        let mut wide = vec![0x00; 8];
        wide.push(0x01);
        assert_eq!(Utils::le_bytes_to_int(&wide), None);
    }

    #[test]
    fn round() {
        assert_eq!(Utils::round(1898.05000001, 2), 1898.05);
        assert_eq!(Utils::round(3.0, 1), 3.0);
        assert_eq!(Utils::round(0.15, 0), 0.0);
    }

    #[test]
    fn nom_field_parsers() {
        let input = [0x04, 0x03, 0x8A, 0x13, 0x90, 0x0B, 0x00];

        let (rest, v) = Utils::le_u16_div10(&input).unwrap();
        assert_eq!(v, 77.2);
        let (rest, f) = Utils::le_u16_div100(rest).unwrap();
        assert_eq!(f, 50.02);
        let (rest, e) = Utils::le_u24_div100(rest).unwrap();
        assert_eq!(e, 29.6);
        assert!(rest.is_empty());

        assert!(Utils::le_u16_div1(&[0x01]).is_err());
    }
}
