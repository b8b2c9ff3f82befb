//! Time-duration literals such as `250ms` or `1.5h`.
//!
//! Unlike byte sizes, a duration is constructed with whatever alphabetic
//! suffix it was written with. The unit is only checked when the value is
//! read (`unit`, `to_nanos`, `to_millis`, ...), which reports
//! [`TokenError::IllegalArgument`] for anything outside ns/us/ms/s/m/h/d.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

use super::byte_size::split_number;
use crate::error::TokenError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimeUnit {
    Nanos,
    Micros,
    Millis,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Case-insensitive unit lookup.
    pub fn from_suffix(s: &str) -> Option<TimeUnit> {
        match s.to_ascii_lowercase().as_str() {
            "ns" => Some(TimeUnit::Nanos),
            "us" => Some(TimeUnit::Micros),
            "ms" => Some(TimeUnit::Millis),
            "s" => Some(TimeUnit::Seconds),
            "m" => Some(TimeUnit::Minutes),
            "h" => Some(TimeUnit::Hours),
            "d" => Some(TimeUnit::Days),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeUnit::Nanos => "ns",
            TimeUnit::Micros => "us",
            TimeUnit::Millis => "ms",
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "m",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "d",
        }
    }

    /// Nanoseconds in one of this unit.
    pub fn nanos(self) -> i64 {
        match self {
            TimeUnit::Nanos => 1,
            TimeUnit::Micros => 1_000,
            TimeUnit::Millis => 1_000_000,
            TimeUnit::Seconds => 1_000_000_000,
            TimeUnit::Minutes => 60_000_000_000,
            TimeUnit::Hours => 3_600_000_000_000,
            TimeUnit::Days => 86_400_000_000_000,
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct TimeDuration {
    magnitude: Decimal,
    unit: String,
    original: String,
}

impl TimeDuration {
    pub fn new(magnitude: Decimal, unit: TimeUnit) -> Self {
        TimeDuration {
            magnitude,
            unit: unit.as_str().to_owned(),
            original: format!("{}{}", magnitude.normalize(), unit),
        }
    }

    /// A duration of `millis` milliseconds, written in `ms`.
    pub fn from_millis(millis: Decimal) -> Self {
        TimeDuration::new(millis, TimeUnit::Millis)
    }

    /// Parse `<decimal><suffix>`. The suffix is kept as written and
    /// validated lazily.
    pub fn parse(text: &str) -> Result<Self, TokenError> {
        let trimmed = text.trim();
        let (number, suffix) = split_number(trimmed).ok_or_else(|| {
            TokenError::IllegalArgument(format!("invalid time duration '{}'", text))
        })?;
        let magnitude = Decimal::from_str(number).map_err(|_| {
            TokenError::IllegalArgument(format!("invalid time duration '{}'", text))
        })?;
        Ok(TimeDuration {
            magnitude,
            unit: suffix.to_owned(),
            original: trimmed.to_owned(),
        })
    }

    pub fn magnitude(&self) -> Decimal {
        self.magnitude
    }

    /// The suffix exactly as written, valid or not.
    pub fn raw_unit(&self) -> &str {
        &self.unit
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn unit(&self) -> Result<TimeUnit, TokenError> {
        TimeUnit::from_suffix(&self.unit).ok_or_else(|| {
            TokenError::IllegalArgument(format!(
                "unsupported time unit '{}' in '{}'",
                self.unit, self.original
            ))
        })
    }

    /// Exact duration in nanoseconds, fractions of a nanosecond kept.
    pub fn nanos_exact(&self) -> Result<Decimal, TokenError> {
        self.magnitude
            .checked_mul(Decimal::from(self.unit()?.nanos()))
            .ok_or_else(|| TokenError::Overflow(self.original.clone()))
    }

    pub fn to_nanos(&self) -> Result<i64, TokenError> {
        self.scaled(1)
    }

    pub fn to_micros(&self) -> Result<i64, TokenError> {
        self.scaled(TimeUnit::Micros.nanos())
    }

    pub fn to_millis(&self) -> Result<i64, TokenError> {
        self.scaled(TimeUnit::Millis.nanos())
    }

    pub fn seconds(&self) -> Result<Decimal, TokenError> {
        Ok(self.nanos_exact()? / Decimal::from(TimeUnit::Seconds.nanos()))
    }

    pub fn minutes(&self) -> Result<Decimal, TokenError> {
        Ok(self.nanos_exact()? / Decimal::from(TimeUnit::Minutes.nanos()))
    }

    pub fn hours(&self) -> Result<Decimal, TokenError> {
        Ok(self.nanos_exact()? / Decimal::from(TimeUnit::Hours.nanos()))
    }

    fn scaled(&self, divisor: i64) -> Result<i64, TokenError> {
        (self.nanos_exact()? / Decimal::from(divisor))
            .trunc()
            .to_i64()
            .ok_or_else(|| TokenError::Overflow(self.original.clone()))
    }
}

impl PartialEq for TimeDuration {
    fn eq(&self, other: &Self) -> bool {
        self.magnitude == other.magnitude && self.unit.eq_ignore_ascii_case(&other.unit)
    }
}

impl fmt::Display for TimeDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nanos(text: &str) -> i64 {
        TimeDuration::parse(text).unwrap().to_nanos().unwrap()
    }

    #[test]
    fn exact_nanosecond_scaling() {
        assert_eq!(nanos("5ns"), 5);
        assert_eq!(nanos("3us"), 3_000);
        assert_eq!(nanos("250ms"), 250_000_000);
        assert_eq!(nanos("1.5s"), 1_500_000_000);
        assert_eq!(nanos("2m"), 120_000_000_000);
        assert_eq!(nanos("1.5h"), 5_400_000_000_000);
        assert_eq!(nanos("2d"), 172_800_000_000_000);
    }

    #[test]
    fn derived_accessors() {
        let d = TimeDuration::parse("90s").unwrap();
        assert_eq!(d.to_millis().unwrap(), 90_000);
        assert_eq!(d.to_micros().unwrap(), 90_000_000);
        assert_eq!(d.minutes().unwrap(), Decimal::from_str("1.5").unwrap());
        assert_eq!(d.hours().unwrap(), Decimal::from_str("0.025").unwrap());
    }

    #[test]
    fn unknown_unit_fails_on_access_not_construction() {
        let d = TimeDuration::parse("5x").unwrap();
        assert_eq!(d.raw_unit(), "x");
        assert!(matches!(d.unit(), Err(TokenError::IllegalArgument(_))));
        assert!(matches!(d.to_nanos(), Err(TokenError::IllegalArgument(_))));
    }

    #[test]
    fn rejects_malformed_number() {
        assert!(TimeDuration::parse("ms").is_err());
        assert!(TimeDuration::parse("1..5s").is_err());
    }

    #[test]
    fn equality_compares_magnitude_and_unit() {
        assert_eq!(
            TimeDuration::parse("1500ms").unwrap(),
            TimeDuration::from_millis(Decimal::from(1500))
        );
        assert_ne!(
            TimeDuration::parse("1s").unwrap(),
            TimeDuration::parse("1000ms").unwrap()
        );
    }
}
