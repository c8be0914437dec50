// Gear ratio to conversion factor math
//
// A ratio "A:B" means A input turns produce B output turns; the conversion factor is B/A.

use std::f64::consts::TAU;
use std::fmt;
use std::str::FromStr;

/// Error types for gear ratio construction
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RatioError {
    #[error("Invalid gear ratio {0:?}: input must be in the format \"#:#\"")]
    InvalidFormat(String),

    #[error("Gear ratio turns must be positive and finite (got {input}:{output})")]
    NonPositive { input: f64, output: f64 },
}

/// Conversion factor built from one or more gear stages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GearRatio {
    conversion_factor: f64,
}

impl GearRatio {
    /// Create a ratio from input and output turns (input:output)
    pub fn new(input: f64, output: f64) -> Result<Self, RatioError> {
        Ok(Self {
            conversion_factor: stage_factor(input, output)?,
        })
    }

    /// Parse a ratio written as "input:output", e.g. "12:1" or "1.5 : 3"
    pub fn parse(ratio: &str) -> Result<Self, RatioError> {
        let (input, output) = parse_turns(ratio)?;
        Self::new(input, output)
    }

    /// Chain another stage after this one
    pub fn append(mut self, other: GearRatio) -> Self {
        self.conversion_factor *= other.conversion_factor;
        self
    }

    /// Chain a stage given as input and output turns
    pub fn append_turns(self, input: f64, output: f64) -> Result<Self, RatioError> {
        Ok(self.append(Self::new(input, output)?))
    }

    /// Chain a stage given as "input:output" text
    pub fn append_str(self, ratio: &str) -> Result<Self, RatioError> {
        Ok(self.append(Self::parse(ratio)?))
    }

    /// Re-express a factor in rotations as a factor in degrees
    pub fn in_degrees(mut self) -> Self {
        self.conversion_factor /= 360.0;
        self
    }

    /// Re-express a factor in rotations as a factor in radians
    pub fn in_radians(mut self) -> Self {
        self.conversion_factor /= TAU;
        self
    }

    pub fn invert(mut self) -> Self {
        self.conversion_factor = 1.0 / self.conversion_factor;
        self
    }

    pub fn conversion_factor(&self) -> f64 {
        self.conversion_factor
    }

    /// Apply the ratio to a value. Inverse of [`GearRatio::remove_from`].
    pub fn apply_to(&self, input: f64) -> f64 {
        input * self.conversion_factor
    }

    /// Remove the ratio from a value. Inverse of [`GearRatio::apply_to`].
    pub fn remove_from(&self, input: f64) -> f64 {
        input / self.conversion_factor
    }
}

impl FromStr for GearRatio {
    type Err = RatioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for GearRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "1:{}", self.conversion_factor)
    }
}

fn stage_factor(input: f64, output: f64) -> Result<f64, RatioError> {
    let valid = |v: f64| v.is_finite() && v > 0.0;
    if !valid(input) || !valid(output) {
        return Err(RatioError::NonPositive { input, output });
    }
    Ok(output / input)
}

/// Split "A:B" into its two numbers. Each side is digits with at most one decimal point.
fn parse_turns(ratio: &str) -> Result<(f64, f64), RatioError> {
    let invalid = || RatioError::InvalidFormat(ratio.to_string());

    let (input, output) = ratio.split_once(':').ok_or_else(invalid)?;
    let input = parse_number(input.trim()).ok_or_else(invalid)?;
    let output = parse_number(output.trim()).ok_or_else(invalid)?;
    Ok((input, output))
}

fn parse_number(text: &str) -> Option<f64> {
    let mut parts = text.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next();

    let digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    let well_formed = match fraction {
        None => !whole.is_empty() && digits(whole),
        Some(frac) => !frac.is_empty() && digits(whole) && digits(frac),
    };

    if well_formed { text.parse().ok() } else { None }
}
