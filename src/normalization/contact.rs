//! Contact extraction from message bodies. WhatsApp-sourced listings bury the
//! agent's number inside the text; the structured phone column is often empty.

use regex::Regex;
use std::sync::OnceLock;

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Egyptian mobile numbers: 01 + carrier digit + 8 digits, with optional
    // +20/0020 country prefix and common in-text separators.
    RE.get_or_init(|| {
        Regex::new(r"(?:\+?20|0020)?\s*0?1[0125]\d{8}").expect("static phone pattern")
    })
}

/// First phone-shaped token in `text`, digits only, normalized to local 01x form.
pub fn extract_phone(text: &str) -> Option<String> {
    let m = phone_regex().find(text)?;
    let digits: String = m.as_str().chars().filter(|c| c.is_ascii_digit()).collect();
    // strip country prefix down to the local 11-digit form
    let local = if let Some(rest) = digits.strip_prefix("0020") {
        format!("0{rest}")
    } else if let Some(rest) = digits.strip_prefix("20") {
        format!("0{rest}")
    } else {
        digits
    };
    if local.len() == 11 && local.starts_with("01") {
        Some(local)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_local_numbers_inside_arabic_text() {
        assert_eq!(
            extract_phone("للتواصل 01012345678 بعد العصر"),
            Some("01012345678".to_string())
        );
    }

    #[test]
    fn normalizes_country_prefix() {
        assert_eq!(
            extract_phone("call +20 1112345678"),
            Some("01112345678".to_string())
        );
    }

    #[test]
    fn ignores_non_phone_digit_runs() {
        assert_eq!(extract_phone("مساحة 150 متر بسعر 2000000"), None);
    }
}
