//! Value Objects for the cart

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Parse a display price such as `"₹1,299.00"` into a number.
///
/// Everything that is not an ASCII digit or `.` is stripped, then the longest
/// leading numeric run (digits with at most one `.`) is parsed. Anything that
/// yields no digits, or does not fit a `Decimal`, is `0`.
pub fn parse_price(raw: &str) -> Decimal {
    let cleaned: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();

    let mut seen_dot = false;
    let end = cleaned
        .char_indices()
        .find(|(_, c)| {
            if *c != '.' { return false; }
            if seen_dot { return true; }
            seen_dot = true;
            false
        })
        .map(|(i, _)| i)
        .unwrap_or(cleaned.len());

    let numeric = cleaned[..end].trim_end_matches('.');
    if !numeric.bytes().any(|b| b.is_ascii_digit()) { return Decimal::ZERO; }

    let numeric = if numeric.starts_with('.') { format!("0{numeric}") } else { numeric.to_string() };
    Decimal::from_str(&numeric).unwrap_or(Decimal::ZERO)
}

/// [`parse_price`] for fields that may be missing entirely.
pub fn parse_optional_price(raw: Option<&str>) -> Decimal {
    raw.map(parse_price).unwrap_or(Decimal::ZERO)
}

/// Tax rate applied to one line, picked from the line's category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate(Decimal);

impl TaxRate {
    /// 5% for anything in a hair category.
    pub fn reduced() -> Self { Self(Decimal::new(5, 2)) }
    /// 18% for everything else, including uncategorised products.
    pub fn standard() -> Self { Self(Decimal::new(18, 2)) }

    /// Categories are free text, so this is a case-insensitive substring match.
    pub fn for_category(category: Option<&str>) -> Self {
        match category {
            Some(c) if c.to_lowercase().contains("hair") => Self::reduced(),
            _ => Self::standard(),
        }
    }

    pub fn value(&self) -> Decimal { self.0 }
    /// `None` when the tax does not fit a `Decimal`.
    pub fn apply(&self, amount: Decimal) -> Option<Decimal> { amount.checked_mul(self.0) }
}

impl fmt::Display for TaxRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}%", (self.0 * Decimal::ONE_HUNDRED).normalize()) }
}

/// Quantity value object. Zero is never stored on a line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Option<Self> { (value > 0).then_some(Self(value)) }
    /// Signed input from callers; anything below one means "remove".
    pub fn from_signed(value: i64) -> Option<Self> {
        if value < 1 { return None; }
        Some(Self(u32::try_from(value).unwrap_or(u32::MAX)))
    }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: Quantity) -> Self { Self(self.0.saturating_add(other.0)) }
}
