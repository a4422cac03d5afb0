//! Fixed-point normalization for on-chain integers.
//!
//! Converts raw integer strings (ray = 1e27, bps = 1e4, token base units)
//! into decimal strings by shifting the decimal point. No floating point is
//! used at any stage, so the result carries the full precision of the input.
//!
//! Output form:
//! - no leading zeros in the integer part (`"0.05"`, never `".05"`)
//! - no trailing zeros in the fractional part (`"0.8"`, never `"0.8000"`)
//! - zero is always `"0"` (never `"-0"`)
//!
//! Unparseable input is an error, so callers can tell zero from garbage.

use std::fmt;

pub const RAY_DECIMALS: u32 = 27;
pub const BPS_DECIMALS: u32 = 4;

/// `10^4`, the bps value of 100%.
const BPS_ONE: i128 = 10_000;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// Input was empty or whitespace.
    Empty,
    /// Input is not an optionally signed run of ASCII digits.
    InvalidInteger { raw: String },
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeError::Empty => write!(f, "raw integer is empty"),
            NormalizeError::InvalidInteger { raw } => {
                write!(f, "raw value is not an integer: '{raw}'")
            }
        }
    }
}

impl std::error::Error for NormalizeError {}

// ---------------------------------------------------------------------------
// Core
// ---------------------------------------------------------------------------

/// Split an optionally signed integer string into `(negative, digits)` with
/// leading zeros removed. `"000"` yields `(false, "")`.
fn parse_integer(raw: &str) -> Result<(bool, &str), NormalizeError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(NormalizeError::Empty);
    }

    let (negative, digits) = if let Some(rest) = s.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = s.strip_prefix('+') {
        (false, rest)
    } else {
        (false, s)
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(NormalizeError::InvalidInteger { raw: s.to_string() });
    }

    let digits = digits.trim_start_matches('0');
    Ok((negative && !digits.is_empty(), digits))
}

/// `raw / 10^decimals` as a decimal string.
///
/// ```
/// use zb_md::normalizer::normalize;
/// assert_eq!(normalize("1000000000000000000000000000", 27).unwrap(), "1");
/// assert_eq!(normalize("8050", 4).unwrap(), "0.805");
/// ```
pub fn normalize(raw: &str, decimals: u32) -> Result<String, NormalizeError> {
    let (negative, digits) = parse_integer(raw)?;
    if digits.is_empty() {
        return Ok("0".to_string());
    }

    let scale = decimals as usize;
    let (int_part, frac_part) = if digits.len() > scale {
        digits.split_at(digits.len() - scale)
    } else {
        ("", digits)
    };

    let mut out = String::with_capacity(digits.len() + scale + 2);
    if negative {
        out.push('-');
    }
    if int_part.is_empty() {
        out.push('0');
    } else {
        out.push_str(int_part);
    }

    let frac_trimmed = frac_part.trim_end_matches('0');
    if !frac_trimmed.is_empty() {
        out.push('.');
        for _ in 0..scale.saturating_sub(frac_part.len()) {
            out.push('0');
        }
        out.push_str(frac_trimmed);
    }

    Ok(out)
}

/// Ray (1e27) rate-model parameter to a decimal ratio.
pub fn normalize_ray(raw: &str) -> Result<String, NormalizeError> {
    normalize(raw, RAY_DECIMALS)
}

/// Basis points to a decimal ratio in `[0, 1]` (`"7500"` -> `"0.75"`).
pub fn normalize_bps(raw: &str) -> Result<String, NormalizeError> {
    normalize(raw, BPS_DECIMALS)
}

/// Liquidation bonus in bps, which on chain includes the 100% base
/// (`"10500"` = 5% bonus), to the bonus ratio (`"0.05"`).
///
/// A zero bonus means the asset cannot be liquidated against and stays `"0"`.
pub fn normalize_liquidation_bonus(raw: &str) -> Result<String, NormalizeError> {
    let (negative, digits) = parse_integer(raw)?;
    if digits.is_empty() {
        return Ok("0".to_string());
    }
    let bps: i128 = digits
        .parse::<i128>()
        .map_err(|_| NormalizeError::InvalidInteger {
            raw: raw.trim().to_string(),
        })?;
    let bps = if negative { -bps } else { bps };
    normalize(&(bps - BPS_ONE).to_string(), BPS_DECIMALS)
}

/// Lenient variant for view-model assembly: unparseable input becomes `"0"`.
pub(crate) fn normalize_or_zero(raw: &str, decimals: u32) -> String {
    normalize(raw, decimals).unwrap_or_else(|_| "0".to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ray_one() {
        assert_eq!(
            normalize_ray("1000000000000000000000000000").unwrap(),
            "1"
        );
    }

    #[test]
    fn ray_fraction_keeps_full_precision() {
        // 0.045 + 1e-27
        assert_eq!(
            normalize_ray("45000000000000000000000001").unwrap(),
            "0.045000000000000000000000001"
        );
    }

    #[test]
    fn ray_small_value_is_zero_padded() {
        assert_eq!(normalize_ray("1").unwrap(), "0.000000000000000000000000001");
    }

    #[test]
    fn larger_than_scale() {
        assert_eq!(normalize("123456", 2).unwrap(), "1234.56");
        assert_eq!(normalize("123400", 2).unwrap(), "1234");
    }

    #[test]
    fn zero_decimals_is_identity() {
        assert_eq!(normalize("42", 0).unwrap(), "42");
        assert_eq!(normalize("0042", 0).unwrap(), "42");
    }

    #[test]
    fn zero_variants() {
        assert_eq!(normalize("0", 27).unwrap(), "0");
        assert_eq!(normalize("0000", 4).unwrap(), "0");
        assert_eq!(normalize("-0", 4).unwrap(), "0");
    }

    #[test]
    fn negative_values() {
        assert_eq!(normalize("-5", 2).unwrap(), "-0.05");
        assert_eq!(normalize("-1500", 3).unwrap(), "-1.5");
    }

    #[test]
    fn bps_values() {
        assert_eq!(normalize_bps("7500").unwrap(), "0.75");
        assert_eq!(normalize_bps("10000").unwrap(), "1");
        assert_eq!(normalize_bps("5").unwrap(), "0.0005");
    }

    #[test]
    fn liquidation_bonus_strips_base() {
        assert_eq!(normalize_liquidation_bonus("10500").unwrap(), "0.05");
        assert_eq!(normalize_liquidation_bonus("10000").unwrap(), "0");
        assert_eq!(normalize_liquidation_bonus("0").unwrap(), "0");
        assert_eq!(normalize_liquidation_bonus("11000").unwrap(), "0.1");
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(normalize("", 4), Err(NormalizeError::Empty));
        assert_eq!(normalize("   ", 4), Err(NormalizeError::Empty));
    }

    #[test]
    fn rejects_non_integers() {
        for raw in ["abc", "NaN", "1.5", "1e27", "-", "+", "0x10", "1 000"] {
            assert!(
                matches!(normalize(raw, 4), Err(NormalizeError::InvalidInteger { .. })),
                "expected InvalidInteger for {raw:?}"
            );
        }
    }

    #[test]
    fn zero_is_distinguishable_from_garbage() {
        assert_eq!(normalize("0", 27).unwrap(), "0");
        assert!(normalize("garbage", 27).is_err());
        assert_eq!(normalize_or_zero("garbage", 27), "0");
    }
}
