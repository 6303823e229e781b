//! Byte utilities. Fast integer/float scanners over byte ranges, the
//! quoted/unquoted string decoder, and the backslash escape-sequence
//! grammar shared by the header parser and the parse worker.
//!
//! The string decoder takes a Cow fast path when a token needs no escape
//! decoding and only falls onto the allocating slow path once it hits a
//! backslash.

use crate::error::{Error, Result};
use std::sync::OnceLock;

/// Parses a signed integer from `bytes`, skipping leading whitespace and
/// honoring one optional leading `-`. No overflow check: the caller
/// guarantees the token fits once the widening ladder has picked a type for
/// it, so this uses wrapping arithmetic rather than paying for a checked
/// path.
pub fn fast_atoi(bytes: &[u8]) -> i64 {
    let mut i = 0;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if i >= bytes.len() {
        return 0;
    }
    let negative = bytes[i] == b'-';
    if negative || bytes[i] == b'+' {
        i += 1;
    }
    let mut value: i64 = 0;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        value = value.wrapping_mul(10).wrapping_add((bytes[i] - b'0') as i64);
        i += 1;
    }
    if negative {
        value.wrapping_neg()
    } else {
        value
    }
}

fn pow10_table() -> &'static [f64; 10] {
    static TABLE: OnceLock<[f64; 10]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0.0f64; 10];
        table[0] = 10.0;
        for i in 1..10 {
            table[i] = table[i - 1] * table[i - 1];
        }
        table
    })
}

/// 10^exp via binary decomposition of a 10^(2^i) doubling table. Saturates
/// to infinity/zero at the extremes of the f64 range, which is the natural
/// behavior of the multiply/divide chain.
fn pow10(exp: i32) -> f64 {
    let table = pow10_table();
    let mut scale = 1.0f64;
    let mut e = exp.unsigned_abs();
    let mut idx = 0;
    while e > 0 && idx < table.len() {
        if e & 1 == 1 {
            scale *= table[idx];
        }
        e >>= 1;
        idx += 1;
    }
    if exp >= 0 {
        scale
    } else {
        1.0 / scale
    }
}

/// A byte-range double-precision parser.
///
/// Sentinels: empty input, or a leading `n`/`N`/`?`, yields `NaN`. Handles an
/// optional sign, up to 18 significant mantissa digits, an optional `.`, and
/// an optional exponent introduced by `E e d D s S f F l L`.
pub fn parse_float(bytes: &[u8]) -> f64 {
    let mut i = 0;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if i >= bytes.len() {
        return f64::NAN;
    }
    match bytes[i] {
        b'n' | b'N' | b'?' => return f64::NAN,
        _ => {}
    }

    let negative = bytes[i] == b'-';
    if negative || bytes[i] == b'+' {
        i += 1;
    }

    let mantissa_start = i;
    let mut mantissa: u64 = 0;
    let mut significant_digits = 0u32;
    let mut frac_digits: i32 = 0;
    let mut seen_dot = false;
    let mut any_digit = false;

    while i < bytes.len() {
        let b = bytes[i];
        if b.is_ascii_digit() {
            any_digit = true;
            if significant_digits < 18 {
                mantissa = mantissa * 10 + (b - b'0') as u64;
                significant_digits += 1;
                if seen_dot {
                    frac_digits += 1;
                }
            } else if seen_dot {
                // Extra fractional digits beyond the 18-digit cap don't
                // change the scale; extra integer digits do, handled below.
            } else {
                frac_digits -= 1;
            }
            i += 1;
        } else if b == b'.' && !seen_dot {
            seen_dot = true;
            i += 1;
        } else {
            break;
        }
    }

    if !any_digit {
        return f64::NAN;
    }
    let _ = mantissa_start;

    let mut exponent = 0i32;
    if i < bytes.len() && matches!(bytes[i], b'E' | b'e' | b'd' | b'D' | b's' | b'S' | b'f' | b'F' | b'l' | b'L') {
        let mut j = i + 1;
        let exp_negative = j < bytes.len() && bytes[j] == b'-';
        if j < bytes.len() && (bytes[j] == b'-' || bytes[j] == b'+') {
            j += 1;
        }
        let exp_digits_start = j;
        let mut exp_value: i32 = 0;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            exp_value = exp_value.saturating_mul(10).saturating_add((bytes[j] - b'0') as i32);
            j += 1;
        }
        if j > exp_digits_start {
            exponent = if exp_negative { -exp_value } else { exp_value };
            i = j;
        }
    }
    let _ = i;

    let signed_mantissa = if negative {
        -(mantissa as f64)
    } else {
        mantissa as f64
    };
    signed_mantissa * pow10(exponent - frac_digits)
}

/// Decode a backslash-escaped byte token into a UTF-8 string. Shared by
/// `parse_quoted_string` and `parse_unquoted_string`; the quote character
/// matters only for documentation purposes since the scanner that produced
/// `bytes` has already stripped the delimiting quotes.
fn decode_escapes(bytes: &[u8], convert_null_to_space: bool) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        if i + 1 >= bytes.len() {
            return Err(Error::BadEscape { offset: i });
        }
        match bytes[i + 1] {
            b'n' => {
                out.push(b'\n');
                i += 2;
            }
            b't' => {
                out.push(b'\t');
                i += 2;
            }
            b'r' => {
                out.push(b'\r');
                i += 2;
            }
            b'b' => {
                out.push(0x08);
                i += 2;
            }
            b'f' => {
                out.push(0x0C);
                i += 2;
            }
            b'v' => {
                out.push(0x0B);
                i += 2;
            }
            b'\\' => {
                out.push(b'\\');
                i += 2;
            }
            b'"' => {
                out.push(b'"');
                i += 2;
            }
            b'\'' => {
                out.push(b'\'');
                i += 2;
            }
            b'0' => {
                out.push(if convert_null_to_space { b' ' } else { 0u8 });
                i += 2;
            }
            b'x' => {
                let hex = read_hex(bytes, i + 2, 2).ok_or(Error::BadEscape { offset: i })?;
                out.push(hex as u8);
                i += 4;
            }
            b'u' => {
                let cp = read_hex(bytes, i + 2, 4).ok_or(Error::BadEscape { offset: i })?;
                push_utf8(&mut out, cp)?;
                i += 6;
            }
            b'U' => {
                let cp = read_hex(bytes, i + 2, 8).ok_or(Error::BadEscape { offset: i })?;
                push_utf8(&mut out, cp)?;
                i += 10;
            }
            _ => return Err(Error::BadEscape { offset: i }),
        }
    }
    Ok(out)
}

fn read_hex(bytes: &[u8], start: usize, digits: usize) -> Option<u32> {
    if start + digits > bytes.len() {
        return None;
    }
    let slice = &bytes[start..start + digits];
    if !slice.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    std::str::from_utf8(slice)
        .ok()
        .and_then(|s| u32::from_str_radix(s, 16).ok())
}

fn push_utf8(out: &mut Vec<u8>, code_point: u32) -> Result<()> {
    match char::from_u32(code_point) {
        Some(c) => {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            Ok(())
        }
        None => Err(Error::BadEscape { offset: 0 }),
    }
}

/// Decode a quoted field's already-unquoted inner bytes.
pub fn parse_quoted_string(bytes: &[u8], _quote_char: u8, convert_null_to_space: bool) -> Result<String> {
    let decoded = decode_escapes(bytes, convert_null_to_space)?;
    Ok(String::from_utf8_lossy(&decoded).into_owned())
}

/// Decode an unquoted field's bytes (bareword, still subject to escapes).
pub fn parse_unquoted_string(bytes: &[u8], convert_null_to_space: bool) -> Result<String> {
    let decoded = decode_escapes(bytes, convert_null_to_space)?;
    Ok(String::from_utf8_lossy(&decoded).into_owned())
}

/// True when `token` is a 3-byte case-insensitive `nan`, or a bare `?`.
pub fn is_nan_sentinel(token: &[u8]) -> bool {
    if token == b"?" {
        return true;
    }
    if token.len() != 3 {
        return false;
    }
    (token[0] == b'n' || token[0] == b'N')
        && (token[1] == b'a' || token[1] == b'A')
        && (token[2] == b'n' || token[2] == b'N')
}
