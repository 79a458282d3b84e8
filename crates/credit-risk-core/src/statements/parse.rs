//! Label normalization and amount parsing for loosely formatted statements.
//!
//! Amounts arrive as native numbers or as text in several locale styles:
//! `1,234.50`, `1.234,50`, `(1,234.50)` for negatives, grouping with
//! non-breaking spaces. Parsing never fails loudly; callers get `None` and
//! decide how to degrade.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::statements::table::CellValue;

/// Lowercase, trim and strip a leading ordinal marker such as `1.` or `12. `.
pub fn normalize_label(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    strip_ordinal(&lowered).to_string()
}

fn strip_ordinal(text: &str) -> &str {
    let digits = text.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return text;
    }
    // ASCII digits are one byte each
    match text[digits..].strip_prefix('.') {
        Some(rest) => rest.trim_start(),
        None => text,
    }
}

/// Parse a cell into an amount. `None` means empty or unparseable.
pub fn parse_amount(cell: &CellValue) -> Option<Decimal> {
    match cell {
        CellValue::Number(v) => Decimal::from_f64(*v),
        CellValue::Text(s) => parse_text_amount(s),
        CellValue::Empty => None,
    }
}

/// Parse a textual amount following the separator rules in the module docs.
pub fn parse_text_amount(raw: &str) -> Option<Decimal> {
    let mut text = raw.trim();
    let mut negative = false;

    if text.len() >= 2 && text.starts_with('(') && text.ends_with(')') {
        negative = true;
        text = text[1..text.len() - 1].trim();
    }
    if let Some(rest) = text.strip_prefix('-') {
        negative = true;
        text = rest;
    }

    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .collect();

    let normalized = match (compact.rfind(','), compact.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => compact.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => compact.replace(',', ""),
        (Some(_), None) if is_decimal_comma(&compact) => compact.replace(',', "."),
        (Some(_), None) => compact.replace(',', ""),
        _ => compact,
    };

    let value = Decimal::from_str(&normalized)
        .or_else(|_| Decimal::from_scientific(&normalized))
        .ok()?;
    Some(if negative { -value } else { value })
}

/// A lone comma is a decimal mark only when exactly one or two digits follow it.
fn is_decimal_comma(text: &str) -> bool {
    let mut parts = text.split(',');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(fraction), None) => {
            (1..=2).contains(&fraction.len()) && fraction.chars().all(|c| c.is_ascii_digit())
        }
        _ => false,
    }
}
