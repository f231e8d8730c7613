//! Typed value extraction from noisy free-text numeric fields.
//!
//! Listing text mixes ASCII and Arabic-Indic digits, currency suffixes and
//! thousands separators ("1,500,000 EGP", "٣ غرف", "120م"). Extraction strips
//! everything that cannot be part of the number and parses what remains, so a
//! separated number is parsed whole — not truncated at the first comma group.

use bigdecimal::BigDecimal;
use std::str::FromStr;

/// Map Arabic-Indic (U+0660..U+0669) and Eastern Arabic-Indic (U+06F0..U+06F9)
/// digits onto their ASCII equivalents; other chars pass through.
fn ascii_digit(ch: char) -> char {
    match ch {
        '\u{0660}'..='\u{0669}' => {
            char::from(b'0' + (ch as u32 - 0x0660) as u8)
        }
        '\u{06F0}'..='\u{06F9}' => {
            char::from(b'0' + (ch as u32 - 0x06F0) as u8)
        }
        _ => ch,
    }
}

/// Strip all non-digit characters and parse the rest; empty result is None.
/// Values too large for i64 are treated as noise, not numbers.
pub fn extract_integer(raw: &str) -> Option<i64> {
    let digits: String = raw
        .chars()
        .map(ascii_digit)
        .filter(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<i64>().ok()
}

/// `extract_integer` narrowed to the INTEGER columns (area, bedrooms, ...).
pub fn extract_i32(raw: &str) -> Option<i32> {
    extract_integer(raw).and_then(|v| i32::try_from(v).ok())
}

/// Keep digits, '.', and a leading '-'; everything else (currency names,
/// thousands separators, stray words) is dropped before parsing. A value that
/// still fails to parse (e.g. "1.500.000") is None rather than a guess.
pub fn extract_decimal(raw: &str) -> Option<BigDecimal> {
    let mut cleaned = String::with_capacity(raw.len());
    for ch in raw.chars().map(ascii_digit) {
        match ch {
            '0'..='9' | '.' => cleaned.push(ch),
            '-' if cleaned.is_empty() => cleaned.push(ch),
            _ => {}
        }
    }
    if cleaned.is_empty() || cleaned == "-" {
        return None;
    }
    BigDecimal::from_str(&cleaned).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_extraction_strips_noise() {
        assert_eq!(extract_integer("3 غرف"), Some(3));
        assert_eq!(extract_integer("مساحة 120م"), Some(120));
        assert_eq!(extract_integer("٣"), Some(3));
        assert_eq!(extract_integer("غير محدد"), None);
        assert_eq!(extract_integer(""), None);
    }

    #[test]
    fn decimal_extraction_parses_separated_numbers_whole() {
        // the legacy regex captured only the first comma group ("1,500,000" -> 1);
        // that truncation is a bug and the fixed behavior is pinned here
        assert_eq!(
            extract_decimal("1,500,000 EGP"),
            Some(BigDecimal::from(1_500_000))
        );
        assert_eq!(extract_decimal("2.5 مليون"), BigDecimal::from_str("2.5").ok());
        assert_eq!(extract_decimal("٧٥٠٠٠٠ جنيه"), Some(BigDecimal::from(750_000)));
        assert_eq!(extract_decimal("قابل للتفاوض"), None);
        // double-dotted junk stays None instead of a silent partial parse
        assert_eq!(extract_decimal("1.500.000"), None);
    }

    #[test]
    fn extraction_is_idempotent_over_its_own_output() {
        let once = extract_integer("about 120 sqm").unwrap();
        assert_eq!(extract_integer(&once.to_string()), Some(once));

        let once = extract_decimal("1,500,000 EGP").unwrap();
        assert_eq!(extract_decimal(&once.to_string()), Some(once));
    }

    #[test]
    fn oversized_digit_runs_are_rejected() {
        assert_eq!(extract_integer("01234567890123456789012345"), None);
    }
}
