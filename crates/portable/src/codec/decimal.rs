// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Arbitrary-precision signed decimal (sign, scale, big-endian magnitude).

use crate::error::{PortableError, Result};
use std::fmt;
use std::str::FromStr;

/// Decimal number `(-1)^negative * magnitude * 10^-scale`.
///
/// Equality is structural: `1.0` (scale 1) and `1` (scale 0) differ, the
/// same way they encode to different bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Decimal {
    negative: bool,
    scale: i32,
    /// Big-endian, kept exactly as given so decoded values re-encode to the
    /// same bytes.
    magnitude: Vec<u8>,
}

/// Zero padding beyond which `Display` switches to exponent notation.
const MAX_DISPLAY_PADDING: usize = 64;

impl Decimal {
    /// Build from wire parts, as is. Padding bytes and a negative zero are
    /// preserved; see [`canonical`](Self::canonical).
    pub fn new(negative: bool, scale: i32, magnitude: Vec<u8>) -> Self {
        Self {
            negative,
            scale,
            magnitude,
        }
    }

    /// Build from parts without leading zero bytes, never negative zero.
    pub fn canonical(negative: bool, scale: i32, mut magnitude: Vec<u8>) -> Self {
        strip_leading_zeros(&mut magnitude);
        Self {
            negative: negative && !magnitude.is_empty(),
            scale,
            magnitude,
        }
    }

    /// `unscaled * 10^-scale`.
    pub fn from_i128(unscaled: i128, scale: i32) -> Self {
        let magnitude = unscaled.unsigned_abs().to_be_bytes().to_vec();
        Self::canonical(unscaled < 0, scale, magnitude)
    }

    pub fn zero() -> Self {
        Self::canonical(false, 0, Vec::new())
    }

    pub fn one() -> Self {
        Self::from_i128(1, 0)
    }

    pub fn minus_one() -> Self {
        Self::from_i128(-1, 0)
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn is_zero(&self) -> bool {
        self.magnitude.iter().all(|b| *b == 0)
    }

    pub fn scale(&self) -> i32 {
        self.scale
    }

    pub fn magnitude(&self) -> &[u8] {
        &self.magnitude
    }

    /// Unscaled value, if it fits in an i128.
    pub fn unscaled_i128(&self) -> Option<i128> {
        let leading = self.magnitude.iter().take_while(|b| **b == 0).count();
        let significant = &self.magnitude[leading..];
        if significant.len() > 16 {
            return None;
        }
        let mut abs: u128 = 0;
        for byte in significant {
            abs = (abs << 8) | u128::from(*byte);
        }
        if self.negative {
            if abs == i128::MIN.unsigned_abs() {
                Some(i128::MIN)
            } else {
                i128::try_from(abs).ok().map(|v| -v)
            }
        } else {
            i128::try_from(abs).ok()
        }
    }

    fn digits(&self) -> String {
        if self.is_zero() {
            return "0".to_string();
        }
        let mut work = self.magnitude.clone();
        strip_leading_zeros(&mut work);
        let mut digits = Vec::new();
        while !work.is_empty() {
            digits.push(b'0' + div_rem_small(&mut work, 10));
        }
        digits.reverse();
        String::from_utf8(digits).unwrap_or_default()
    }
}

impl Default for Decimal {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<i64> for Decimal {
    fn from(v: i64) -> Self {
        Self::from_i128(i128::from(v), 0)
    }
}

impl From<i32> for Decimal {
    fn from(v: i32) -> Self {
        Self::from_i128(i128::from(v), 0)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.digits();
        if self.negative && !self.is_zero() {
            f.write_str("-")?;
        }
        let padding = if self.scale <= 0 {
            self.scale.unsigned_abs() as usize
        } else {
            (self.scale as usize).saturating_sub(digits.len())
        };
        if padding > MAX_DISPLAY_PADDING {
            return write!(f, "{}E{}", digits, -i64::from(self.scale));
        }
        if self.scale <= 0 {
            f.write_str(&digits)?;
            for _ in 0..self.scale.unsigned_abs() {
                f.write_str("0")?;
            }
            return Ok(());
        }
        let scale = self.scale as usize;
        if digits.len() > scale {
            let (int_part, frac_part) = digits.split_at(digits.len() - scale);
            write!(f, "{}.{}", int_part, frac_part)
        } else {
            write!(f, "0.{}{}", "0".repeat(scale - digits.len()), digits)
        }
    }
}

impl FromStr for Decimal {
    type Err = PortableError;

    /// Parse `[-+]digits[.digits][E[-+]digits]`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || PortableError::invalid(format!("invalid decimal literal '{}'", s));
        let (negative, body) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };
        let (body, exponent) = match body.split_once(|c: char| c == 'e' || c == 'E') {
            Some((b, e)) => (b, e.parse::<i64>().map_err(|_| invalid())?),
            None => (body, 0),
        };
        let (int_part, frac_part) = match body.split_once('.') {
            Some((i, f)) => (i, f),
            None => (body, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        let mut magnitude = Vec::new();
        for ch in int_part.chars().chain(frac_part.chars()) {
            let digit = ch.to_digit(10).ok_or_else(invalid)?;
            mul_add_small(&mut magnitude, 10, digit as u8);
        }
        let scale = i64::try_from(frac_part.len())
            .ok()
            .and_then(|len| len.checked_sub(exponent))
            .and_then(|scale| i32::try_from(scale).ok())
            .ok_or_else(invalid)?;
        Ok(Self::canonical(negative, scale, magnitude))
    }
}

fn strip_leading_zeros(bytes: &mut Vec<u8>) {
    let leading = bytes.iter().take_while(|b| **b == 0).count();
    bytes.drain(..leading);
}

/// Divide a big-endian magnitude in place, returning the remainder.
fn div_rem_small(magnitude: &mut Vec<u8>, divisor: u8) -> u8 {
    let divisor = u16::from(divisor);
    let mut rem: u16 = 0;
    for byte in magnitude.iter_mut() {
        let cur = (rem << 8) | u16::from(*byte);
        *byte = (cur / divisor) as u8;
        rem = cur % divisor;
    }
    strip_leading_zeros(magnitude);
    rem as u8
}

/// `magnitude = magnitude * mul + add` on a big-endian magnitude.
fn mul_add_small(magnitude: &mut Vec<u8>, mul: u8, add: u8) {
    let mut carry = u16::from(add);
    for byte in magnitude.iter_mut().rev() {
        let cur = u16::from(*byte) * u16::from(mul) + carry;
        *byte = (cur & 0xFF) as u8;
        carry = cur >> 8;
    }
    if carry > 0 {
        magnitude.insert(0, carry as u8);
    }
    strip_leading_zeros(magnitude);
}
