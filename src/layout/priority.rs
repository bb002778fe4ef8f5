//! Constraint priorities
//!
//! A [`Priority`] is the strength the solver uses to decide which constraint
//! gives way when a system is over-constrained. `REQUIRED` can never be
//! broken; every other tier sits strictly below it.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

use kasuari::Strength;
use serde::Deserialize;
use thiserror::Error;

const MIN_VALUE: f64 = 1.0;
const REQUIRED_VALUE: f64 = 1000.0;
const HIGHEST_OPTIONAL: f64 = REQUIRED_VALUE - 1.0;

/// Numeric strength of a constraint in the range `1..=1000`
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(try_from = "PriorityRepr")]
pub struct Priority(f64);

impl Priority {
    /// Unbreakable
    pub const REQUIRED: Priority = Priority(REQUIRED_VALUE);
    pub const HIGH: Priority = Priority(750.0);
    pub const MEDIUM: Priority = Priority(500.0);
    pub const LOW: Priority = Priority(250.0);
    /// The tier used to hug a view's own content
    pub const FITTING: Priority = Priority(50.0);

    /// Create a priority, clamping the value into `1..=1000`
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self(MIN_VALUE);
        }
        Self(value.clamp(MIN_VALUE, REQUIRED_VALUE))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn is_required(self) -> bool {
        self.0 >= REQUIRED_VALUE
    }

    /// Map onto the solver's strength scale.
    ///
    /// Optional priorities land linearly below `Strength::STRONG`, so their
    /// relative order survives the conversion.
    pub fn to_strength(self) -> Strength {
        if self.is_required() {
            Strength::REQUIRED
        } else {
            Strength::new(self.0 * 1000.0)
        }
    }

    /// Name of the preset tier this priority equals, if any
    pub fn name(self) -> Option<&'static str> {
        match self.0 {
            v if v == REQUIRED_VALUE => Some("required"),
            v if v == Self::HIGH.0 => Some("high"),
            v if v == Self::MEDIUM.0 => Some("medium"),
            v if v == Self::LOW.0 => Some("low"),
            v if v == Self::FITTING.0 => Some("fitting"),
            _ => None,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::REQUIRED
    }
}

impl PartialEq for Priority {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Priority {}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Nudge a priority up. Optional priorities saturate just below required.
impl Add<f64> for Priority {
    type Output = Priority;

    fn add(self, rhs: f64) -> Priority {
        if self.is_required() {
            return self;
        }
        Priority((self.0 + rhs).clamp(MIN_VALUE, HIGHEST_OPTIONAL))
    }
}

/// Nudge a priority down. Only a positive offset takes a priority off
/// required; optional priorities never reach it.
impl Sub<f64> for Priority {
    type Output = Priority;

    fn sub(self, rhs: f64) -> Priority {
        if self.is_required() && rhs <= 0.0 {
            return self;
        }
        Priority((self.0 - rhs).clamp(MIN_VALUE, HIGHEST_OPTIONAL))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Error parsing a priority name or number
#[derive(Debug, Error, PartialEq)]
#[error("invalid priority '{0}' (expected required, high, medium, low, fitting or a number)")]
pub struct ParsePriorityError(pub String);

impl FromStr for Priority {
    type Err = ParsePriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "required" => Ok(Self::REQUIRED),
            "high" => Ok(Self::HIGH),
            "medium" => Ok(Self::MEDIUM),
            "low" => Ok(Self::LOW),
            "fitting" => Ok(Self::FITTING),
            other => other
                .parse::<f64>()
                .map(Self::new)
                .map_err(|_| ParsePriorityError(s.to_string())),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PriorityRepr {
    Value(f64),
    Name(String),
}

impl TryFrom<PriorityRepr> for Priority {
    type Error = ParsePriorityError;

    fn try_from(repr: PriorityRepr) -> Result<Self, Self::Error> {
        match repr {
            PriorityRepr::Value(v) => Ok(Priority::new(v)),
            PriorityRepr::Name(name) => name.parse(),
        }
    }
}
