//! Minute-granular durations parsed from `HH:MM`.
//!
//! All budget arithmetic happens in whole minutes; clock strings exist only
//! at the serialization boundary. Summing pre-formatted strings is exactly
//! the bug this type is here to prevent.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

use crate::types::ValidationError;

/// A non-negative duration in whole minutes.
///
/// Serializes as a zero-padded `HH:MM` string (`"06:00"`, `"01:30"`).
/// The decimal-hours arithmetic of the billing rules (`hh + mm/60`) is
/// represented exactly as `hh * 60 + mm`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Minutes(u32);

impl Minutes {
    pub const ZERO: Self = Self(0);

    /// Creates a duration from a raw minute count.
    #[must_use]
    pub const fn new(minutes: u32) -> Self {
        Self(minutes)
    }

    /// Creates a duration from whole hours.
    #[must_use]
    pub const fn from_hours(hours: u32) -> Self {
        Self(hours * 60)
    }

    /// Parses a `HH:MM` clock string.
    ///
    /// Rejects anything that does not split into exactly two numeric parts
    /// on a colon, and minute values of 60 or more. Hours may exceed two
    /// digits for multi-day totals.
    pub fn parse_clock(input: &str) -> Result<Self, ValidationError> {
        let bad = || ValidationError::BadClock {
            input: input.to_string(),
        };
        let (hours, minutes) = input.trim().split_once(':').ok_or_else(bad)?;
        let hours: u32 = hours.parse().map_err(|_| bad())?;
        let minutes: u32 = minutes.parse().map_err(|_| bad())?;
        if minutes >= 60 {
            return Err(bad());
        }
        hours
            .checked_mul(60)
            .and_then(|h| h.checked_add(minutes))
            .map(Self)
            .ok_or_else(bad)
    }

    /// Returns the raw minute count.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Subtraction clamped at zero.
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Halves the duration, flooring to the minute.
    #[must_use]
    pub const fn halved(self) -> Self {
        Self(self.0 / 2)
    }
}

impl Add for Minutes {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Minutes {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sum for Minutes {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Self(iter.map(|m| m.0).sum())
    }
}

impl fmt::Display for Minutes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl TryFrom<String> for Minutes {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_clock(&value)
    }
}

impl From<Minutes> for String {
    fn from(minutes: Minutes) -> Self {
        minutes.to_string()
    }
}
