//! Resource quantity conversion
//!
//! Normalizes raw CPU and memory quantities into floating-point display
//! units and computes utilization percentages against a baseline.

use crate::error::RetrievalError;

const BINARY_SUFFIXES: [(&str, f64); 6] = [
    ("Ei", 1_152_921_504_606_846_976.0),
    ("Pi", 1_125_899_906_842_624.0),
    ("Ti", 1_099_511_627_776.0),
    ("Gi", 1_073_741_824.0),
    ("Mi", 1_048_576.0),
    ("Ki", 1_024.0),
];

// Number of suffixed units in one milli-unit.
const MILLI_SUFFIXES: [(&str, u64); 3] = [("m", 1), ("u", 1_000), ("n", 1_000_000)];

const DECIMAL_SUFFIXES: [(&str, f64); 6] = [
    ("E", 1_000_000_000_000_000_000.0),
    ("P", 1_000_000_000_000_000.0),
    ("T", 1_000_000_000_000.0),
    ("G", 1_000_000_000.0),
    ("M", 1_000_000.0),
    ("k", 1_000.0),
];

/// An integer-scaled quantity, either in thousandths or in base units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawQuantity {
    Milli(u64),
    Base(u64),
}

impl Default for RawQuantity {
    fn default() -> Self {
        RawQuantity::Base(0)
    }
}

impl RawQuantity {
    /// Value in thousandths of the base unit
    pub fn milli_value(&self) -> u64 {
        match *self {
            RawQuantity::Milli(v) => v,
            RawQuantity::Base(v) => v.saturating_mul(1000),
        }
    }

    /// Value in base units, rounded up
    pub fn value(&self) -> u64 {
        match *self {
            RawQuantity::Milli(v) => v.div_ceil(1000),
            RawQuantity::Base(v) => v,
        }
    }

    /// Sum of two quantities, keeping base scale when both sides have it
    pub fn add(self, other: RawQuantity) -> RawQuantity {
        match (self, other) {
            (RawQuantity::Base(a), RawQuantity::Base(b)) => RawQuantity::Base(a.saturating_add(b)),
            (a, b) => RawQuantity::Milli(a.milli_value().saturating_add(b.milli_value())),
        }
    }

    /// Parse a Kubernetes quantity string such as `250m`, `2`, `512Mi` or `1G`
    pub fn parse(input: &str) -> Result<Self, RetrievalError> {
        let raw = input.trim();
        if raw.is_empty() {
            return Err(RetrievalError::Quantity(input.to_string()));
        }

        for (suffix, multiplier) in BINARY_SUFFIXES {
            if let Some(number) = raw.strip_suffix(suffix) {
                return scaled(number, multiplier, input);
            }
        }

        for (suffix, divisor) in MILLI_SUFFIXES {
            if let Some(number) = raw.strip_suffix(suffix) {
                return milli(number, divisor, input).map(RawQuantity::Milli);
            }
        }

        for (suffix, multiplier) in DECIMAL_SUFFIXES {
            if let Some(number) = raw.strip_suffix(suffix) {
                return scaled(number, multiplier, input);
            }
        }

        scaled(raw, 1.0, input)
    }
}

fn scaled(number: &str, multiplier: f64, input: &str) -> Result<RawQuantity, RetrievalError> {
    let base = parse_number(number, input)? * multiplier;
    if base.fract() == 0.0 {
        checked_u64(base, input).map(RawQuantity::Base)
    } else {
        checked_u64(ceil_milli(base * 1000.0), input).map(RawQuantity::Milli)
    }
}

/// Thousandths of the base unit, rounded up
fn milli(number: &str, divisor: u64, input: &str) -> Result<u64, RetrievalError> {
    if let Ok(whole) = number.trim().parse::<u64>() {
        return Ok(whole.div_ceil(divisor));
    }
    let value = parse_number(number, input)? / divisor as f64;
    checked_u64(ceil_milli(value), input)
}

// Float noise such as 1.1 * 1000 = 1100.0000000000002 must not round up
fn ceil_milli(milli: f64) -> f64 {
    ((milli * 1e6).round() / 1e6).ceil()
}

fn parse_number(number: &str, input: &str) -> Result<f64, RetrievalError> {
    let numeric = number
        .trim()
        .parse::<f64>()
        .map_err(|_| RetrievalError::Quantity(input.to_string()))?;
    if !numeric.is_finite() || numeric < 0.0 {
        return Err(RetrievalError::Quantity(input.to_string()));
    }
    Ok(numeric)
}

fn checked_u64(value: f64, input: &str) -> Result<u64, RetrievalError> {
    if !value.is_finite() || value < 0.0 || value >= u64::MAX as f64 {
        return Err(RetrievalError::Quantity(input.to_string()));
    }
    Ok(value as u64)
}

/// Binary memory display unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryUnit {
    MiB,
    GiB,
}

impl MemoryUnit {
    fn exponent(self) -> i32 {
        match self {
            MemoryUnit::MiB => 2,
            MemoryUnit::GiB => 3,
        }
    }
}

/// CPU quantity in cores
pub fn cpu_cores(quantity: RawQuantity) -> f64 {
    quantity.milli_value() as f64 / 1000.0
}

/// Memory quantity (bytes) in the requested binary unit
pub fn memory_in(quantity: RawQuantity, unit: MemoryUnit) -> f64 {
    quantity.value() as f64 / 1024f64.powi(unit.exponent())
}

/// Percentage of `current` against `limit`; 0 when there is no baseline.
///
/// The result is not clamped, so over-commit shows as more than 100.
pub fn calculate_percentage(current: f64, limit: f64) -> f64 {
    if limit == 0.0 {
        return 0.0;
    }
    (current / limit) * 100.0
}
