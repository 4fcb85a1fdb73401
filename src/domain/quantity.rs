//! CPU quantity parsing
//!
//! Converts Kubernetes CPU resource quantities (`100m`, `0.5`, `2`) into
//! millicores and renders them back as decimal core counts for use as rule
//! thresholds.

use crate::domain::Threshold;
use crate::error::DomainError;
use std::fmt;
use std::str::FromStr;

/// CPU amount in millicores
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CpuQuantity(u64);

impl CpuQuantity {
    /// Create a quantity from millicores
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Get the quantity in millicores
    #[inline]
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Decimal core count without trailing zeros (`100m` -> `0.1`)
    pub fn to_cores_string(&self) -> String {
        let whole = self.0 / 1000;
        let frac = self.0 % 1000;
        if frac == 0 {
            return whole.to_string();
        }
        let frac = format!("{:03}", frac);
        format!("{}.{}", whole, frac.trim_end_matches('0'))
    }

    /// Threshold for a rule expression, `None` for a zero quantity
    pub fn to_threshold(&self) -> Option<Threshold> {
        if self.is_zero() {
            return None;
        }
        Threshold::new(self.to_cores_string()).ok()
    }
}

impl fmt::Display for CpuQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.0)
    }
}

impl FromStr for CpuQuantity {
    type Err = DomainError;

    /// Parse a decimal quantity with an optional `m`, `k`, `M` or `G` suffix.
    ///
    /// Precision below one millicore is rounded up, as the API server does.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::InvalidQuantity(s.to_string());
        let s = s.trim();

        let (number, scale) = match s.as_bytes().last() {
            Some(b'm') => (&s[..s.len() - 1], 1u64),
            Some(b'k') => (&s[..s.len() - 1], 1_000_000),
            Some(b'M') => (&s[..s.len() - 1], 1_000_000_000),
            Some(b'G') => (&s[..s.len() - 1], 1_000_000_000_000),
            _ => (s, 1000),
        };

        let (int, frac) = number.split_once('.').unwrap_or((number, ""));
        if int.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if !int.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let int: u64 = if int.is_empty() {
            0
        } else {
            int.parse().map_err(|_| invalid())?
        };
        let mut millis = int.checked_mul(scale).ok_or_else(invalid)?;

        // Fractional digits scaled into millicores, rounding up any remainder
        let mut unit = scale;
        let mut remainder = false;
        for digit in frac.bytes().map(|b| u64::from(b - b'0')) {
            if unit >= 10 {
                unit /= 10;
                millis = millis.checked_add(digit * unit).ok_or_else(invalid)?;
            } else if digit != 0 {
                remainder = true;
            }
        }
        if remainder {
            millis = millis.checked_add(1).ok_or_else(invalid)?;
        }

        Ok(Self(millis))
    }
}
