//! Byte-size literals such as `512KB` or `1.5GB`.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

use crate::error::TokenError;

/// Binary byte units; each step is a factor of 1024.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ByteUnit {
    B,
    KB,
    MB,
    GB,
    TB,
    PB,
}

impl ByteUnit {
    /// Case-insensitive unit lookup. Returns `None` for anything else (`ZB`).
    pub fn from_suffix(s: &str) -> Option<ByteUnit> {
        match s.to_ascii_uppercase().as_str() {
            "B" => Some(ByteUnit::B),
            "KB" => Some(ByteUnit::KB),
            "MB" => Some(ByteUnit::MB),
            "GB" => Some(ByteUnit::GB),
            "TB" => Some(ByteUnit::TB),
            "PB" => Some(ByteUnit::PB),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ByteUnit::B => "B",
            ByteUnit::KB => "KB",
            ByteUnit::MB => "MB",
            ByteUnit::GB => "GB",
            ByteUnit::TB => "TB",
            ByteUnit::PB => "PB",
        }
    }

    /// 1024^n for this unit.
    pub fn multiplier(self) -> i64 {
        1i64 << (10 * self.power())
    }

    fn power(self) -> u32 {
        match self {
            ByteUnit::B => 0,
            ByteUnit::KB => 1,
            ByteUnit::MB => 2,
            ByteUnit::GB => 3,
            ByteUnit::TB => 4,
            ByteUnit::PB => 5,
        }
    }
}

impl fmt::Display for ByteUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A magnitude with a byte unit, keeping the text it was written as.
#[derive(Debug, Clone)]
pub struct ByteSize {
    magnitude: Decimal,
    unit: ByteUnit,
    original: String,
}

impl ByteSize {
    pub fn new(magnitude: Decimal, unit: ByteUnit) -> Self {
        ByteSize {
            magnitude,
            unit,
            original: format!("{}{}", magnitude.normalize(), unit),
        }
    }

    /// A size of exactly `bytes` bytes, written in `B`.
    pub fn from_bytes(bytes: i64) -> Self {
        ByteSize::new(Decimal::from(bytes), ByteUnit::B)
    }

    /// Parse `<decimal><unit>`. Unknown units are rejected.
    pub fn parse(text: &str) -> Result<Self, TokenError> {
        let trimmed = text.trim();
        let (number, suffix) = split_number(trimmed).ok_or_else(|| {
            TokenError::IllegalArgument(format!("invalid byte size '{}'", text))
        })?;
        let unit = ByteUnit::from_suffix(suffix).ok_or_else(|| {
            TokenError::IllegalArgument(format!(
                "invalid byte size '{}': unknown unit '{}'",
                text, suffix
            ))
        })?;
        let magnitude = Decimal::from_str(number).map_err(|_| {
            TokenError::IllegalArgument(format!("invalid byte size '{}'", text))
        })?;
        Ok(ByteSize {
            magnitude,
            unit,
            original: trimmed.to_owned(),
        })
    }

    pub fn magnitude(&self) -> Decimal {
        self.magnitude
    }

    pub fn unit(&self) -> ByteUnit {
        self.unit
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    /// Exact size in bytes as a decimal (fractional bytes are kept).
    pub fn bytes_exact(&self) -> Result<Decimal, TokenError> {
        self.magnitude
            .checked_mul(Decimal::from(self.unit.multiplier()))
            .ok_or_else(|| TokenError::Overflow(self.original.clone()))
    }

    /// Size in whole bytes; fractional bytes are truncated.
    pub fn to_bytes(&self) -> Result<i64, TokenError> {
        self.bytes_exact()?
            .trunc()
            .to_i64()
            .ok_or_else(|| TokenError::Overflow(self.original.clone()))
    }

    pub fn kilobytes(&self) -> Result<Decimal, TokenError> {
        Ok(self.bytes_exact()? / Decimal::from(ByteUnit::KB.multiplier()))
    }

    pub fn megabytes(&self) -> Result<Decimal, TokenError> {
        Ok(self.bytes_exact()? / Decimal::from(ByteUnit::MB.multiplier()))
    }

    pub fn gigabytes(&self) -> Result<Decimal, TokenError> {
        Ok(self.bytes_exact()? / Decimal::from(ByteUnit::GB.multiplier()))
    }
}

impl PartialEq for ByteSize {
    fn eq(&self, other: &Self) -> bool {
        self.magnitude == other.magnitude && self.unit == other.unit
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

/// Split `1.5KB` into (`1.5`, `KB`). The suffix must be non-empty and
/// alphabetic; the number may carry a leading `-` and a fraction.
pub(crate) fn split_number(text: &str) -> Option<(&str, &str)> {
    let split = text
        .char_indices()
        .find(|(_, c)| c.is_ascii_alphabetic())
        .map(|(i, _)| i)?;
    let (number, suffix) = text.split_at(split);
    let digits = number.strip_prefix('-').unwrap_or(number);
    let valid_number = !digits.is_empty()
        && digits.starts_with(|c: char| c.is_ascii_digit())
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.matches('.').count() <= 1
        && !digits.ends_with('.');
    let valid_suffix = suffix.chars().all(|c| c.is_ascii_alphabetic());
    if valid_number && valid_suffix {
        Some((number, suffix))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(text: &str) -> i64 {
        ByteSize::parse(text).unwrap().to_bytes().unwrap()
    }

    #[test]
    fn converts_every_unit() {
        assert_eq!(bytes("1B"), 1);
        assert_eq!(bytes("1.5KB"), 1536);
        assert_eq!(bytes("2.5MB"), 2_621_440);
        assert_eq!(bytes("1.5GB"), 1_610_612_736);
        assert_eq!(bytes("2TB"), 2_199_023_255_552);
        assert_eq!(bytes("1PB"), 1_125_899_906_842_624);
    }

    #[test]
    fn unit_case_is_ignored() {
        assert_eq!(bytes("1kb"), 1024);
        assert_eq!(bytes("1Kb"), 1024);
        assert_eq!(bytes("1KB"), 1024);
        assert_eq!(ByteSize::parse("1kb").unwrap().unit(), ByteUnit::KB);
    }

    #[test]
    fn rejects_unknown_unit() {
        assert!(matches!(
            ByteSize::parse("1ZB"),
            Err(TokenError::IllegalArgument(_))
        ));
        assert!(ByteSize::parse("KB").is_err());
        assert!(ByteSize::parse("1.KB").is_err());
    }

    #[test]
    fn derived_accessors() {
        let size = ByteSize::parse("1.5MB").unwrap();
        assert_eq!(size.kilobytes().unwrap(), Decimal::from(1536));
        assert_eq!(size.megabytes().unwrap(), Decimal::from_str("1.5").unwrap());
        assert_eq!(size.original(), "1.5MB");
    }

    #[test]
    fn fractional_bytes_are_exact_but_truncate_to_whole() {
        let half = ByteSize::parse("0.5B").unwrap();
        assert_eq!(half.bytes_exact().unwrap(), Decimal::from_str("0.5").unwrap());
        assert_eq!(half.to_bytes().unwrap(), 0);
    }

    #[test]
    fn oversized_magnitude_overflows_instead_of_panicking() {
        let huge = ByteSize::parse("79228162514264337593543950335PB").unwrap();
        assert!(matches!(huge.bytes_exact(), Err(TokenError::Overflow(_))));
    }

    #[test]
    fn equality_ignores_original_text() {
        assert_eq!(ByteSize::parse("1kb").unwrap(), ByteSize::parse("1KB").unwrap());
        assert_ne!(ByteSize::parse("1KB").unwrap(), ByteSize::parse("1024B").unwrap());
    }
}
