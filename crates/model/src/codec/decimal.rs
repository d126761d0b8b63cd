use crate::codec::error::ParseError;
use bigdecimal::{BigDecimal, RoundingMode};
use lazy_static::lazy_static;
use num_bigint::{BigInt, Sign};
use std::str::FromStr;

/// Largest scale accepted by the destination for NUMERIC columns.
pub const NUMERIC_SCALE: i64 = 9;
pub const BIG_NUMERIC_SCALE: i64 = 38;

/// Integer digits beyond anything the fixed-width encodings can hold.
const MAX_INTEGER_DIGITS: i128 = 80;

const NUMERIC_BYTES: usize = 16;
const BIG_NUMERIC_BYTES: usize = 32;

lazy_static! {
    // NUMERIC is DECIMAL(38, 9).
    static ref NUMERIC_MAX_UNSCALED: BigInt = BigInt::from(10u8).pow(38) - 1;
}

/// Parses an arbitrary-precision decimal and rescales it to exactly 9
/// fractional digits, rounding half to even.
///
/// Magnitudes are bounded before rescaling: values too large for any fixed
/// width encoding are rejected and values far below one unit at scale 9
/// become zero, so `1e100000000` never materializes its digits.
pub fn parse_decimal(text: &str) -> Result<BigDecimal, ParseError> {
    let value = BigDecimal::from_str(text)
        .map_err(|e| ParseError::invalid("NUMERIC", text, e.to_string()))?;

    let (unscaled, scale) = value.as_bigint_and_exponent();
    // log10(2) rounded up, so this never undercounts the digits.
    let digits = (unscaled.bits() as i128) * 30103 / 100_000 + 1;
    let magnitude = digits - scale as i128;
    if magnitude > MAX_INTEGER_DIGITS {
        return Err(ParseError::OutOfRange {
            target: "NUMERIC",
            raw: text.to_string(),
        });
    }
    if magnitude <= -(NUMERIC_SCALE as i128 + 1) {
        return Ok(BigDecimal::new(BigInt::from(0), NUMERIC_SCALE));
    }

    Ok(value.with_scale_round(NUMERIC_SCALE, RoundingMode::HalfEven))
}

/// Fixed-point wire encoding of a NUMERIC value: the value scaled by 10^9,
/// as a 16-byte little-endian two's complement integer.
pub fn encode_numeric(value: &BigDecimal) -> Result<Vec<u8>, ParseError> {
    let unscaled = unscaled(value, NUMERIC_SCALE);
    if unscaled.magnitude() > NUMERIC_MAX_UNSCALED.magnitude() {
        return Err(ParseError::OutOfRange {
            target: "NUMERIC",
            raw: value.to_string(),
        });
    }
    to_fixed_width(&unscaled, NUMERIC_BYTES, "NUMERIC", value)
}

/// Fixed-point wire encoding of a BIGNUMERIC value: scale 38, 32 bytes.
pub fn encode_big_numeric(value: &BigDecimal) -> Result<Vec<u8>, ParseError> {
    let unscaled = unscaled(value, BIG_NUMERIC_SCALE);
    to_fixed_width(&unscaled, BIG_NUMERIC_BYTES, "BIGNUMERIC", value)
}

pub fn decode_numeric(bytes: &[u8]) -> Result<BigDecimal, ParseError> {
    decode(bytes, NUMERIC_BYTES, NUMERIC_SCALE, "NUMERIC")
}

pub fn decode_big_numeric(bytes: &[u8]) -> Result<BigDecimal, ParseError> {
    decode(bytes, BIG_NUMERIC_BYTES, BIG_NUMERIC_SCALE, "BIGNUMERIC")
}

fn unscaled(value: &BigDecimal, scale: i64) -> BigInt {
    let (unscaled, _) = value
        .with_scale_round(scale, RoundingMode::HalfEven)
        .as_bigint_and_exponent();
    unscaled
}

fn to_fixed_width(
    unscaled: &BigInt,
    width: usize,
    target: &'static str,
    value: &BigDecimal,
) -> Result<Vec<u8>, ParseError> {
    let mut bytes = unscaled.to_signed_bytes_le();
    if bytes.len() > width {
        return Err(ParseError::OutOfRange {
            target,
            raw: value.to_string(),
        });
    }

    let fill = if unscaled.sign() == Sign::Minus { 0xFF } else { 0x00 };
    bytes.resize(width, fill);
    Ok(bytes)
}

fn decode(
    bytes: &[u8],
    width: usize,
    scale: i64,
    expected: &'static str,
) -> Result<BigDecimal, ParseError> {
    if bytes.len() != width {
        return Err(ParseError::InvalidValue {
            expected,
            raw: format!("{bytes:02x?}"),
            reason: format!("expected {width} bytes, found {}", bytes.len()),
        });
    }
    Ok(BigDecimal::new(BigInt::from_signed_bytes_le(bytes), scale))
}
