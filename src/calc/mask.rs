use crate::calc::amount::{format_money, parse_price};
use regex::Regex;
use std::sync::OnceLock;

/// Maximum length of the client name and line descriptions.
pub const TEXT_MAX_LEN: usize = 32;
/// Maximum length of the count and price fields.
pub const NUMBER_MAX_LEN: usize = 8;

fn space_run() -> &'static Regex {
    static SPACE_RUN: OnceLock<Regex> = OnceLock::new();
    SPACE_RUN.get_or_init(|| Regex::new(r" {2,}").unwrap())
}

fn non_digit() -> &'static Regex {
    static NON_DIGIT: OnceLock<Regex> = OnceLock::new();
    NON_DIGIT.get_or_init(|| Regex::new(r"[^0-9]").unwrap())
}

fn non_price_char() -> &'static Regex {
    static NON_PRICE_CHAR: OnceLock<Regex> = OnceLock::new();
    NON_PRICE_CHAR.get_or_init(|| Regex::new(r"[^0-9.]").unwrap())
}

fn leading_zeros() -> &'static Regex {
    static LEADING_ZEROS: OnceLock<Regex> = OnceLock::new();
    LEADING_ZEROS.get_or_init(|| Regex::new(r"^0+").unwrap())
}

fn dot_run() -> &'static Regex {
    static DOT_RUN: OnceLock<Regex> = OnceLock::new();
    DOT_RUN.get_or_init(|| Regex::new(r"\.{2,}").unwrap())
}

/// Cuts `raw` to at most `max` characters, the way an input with a length cap
/// refuses extra characters.
pub fn clamp_len(raw: &str, max: usize) -> String {
    raw.chars().take(max).collect()
}

// ── Free text (client name, line description) ─────────────────────────────────

/// Applied on every edit: no leading whitespace, and the first run of two or
/// more spaces becomes a single space.
pub fn mask_text(raw: &str) -> String {
    space_run().replacen(raw.trim_start(), 1, " ").into_owned()
}

/// Applied on blur. Returns `Some` only when trailing whitespace was removed.
pub fn blur_text(current: &str) -> Option<String> {
    let trimmed = current.trim_end();
    (trimmed.len() != current.len()).then(|| trimmed.to_string())
}

// ── Count ─────────────────────────────────────────────────────────────────────

/// Applied on every edit: trim, drop leading zeros, then drop the first
/// non-digit character.
pub fn mask_count(raw: &str) -> String {
    let without_zeros = leading_zeros().replace(raw.trim(), "");
    non_digit().replacen(&without_zeros, 1, "").into_owned()
}

/// Applied on blur: an emptied count falls back to "1".
pub fn blur_count(current: &str) -> Option<String> {
    current.is_empty().then(|| "1".to_string())
}

// ── Price ─────────────────────────────────────────────────────────────────────

/// Applied on every edit. Keeps the value a prefix of a decimal with at most
/// one dot and two fraction digits. Only the first offending character is
/// removed per edit.
pub fn mask_price(raw: &str) -> String {
    let price = non_price_char().replacen(raw.trim(), 1, "").into_owned();

    // A bare "0" is a valid place to start typing "0.xx".
    if price.is_empty() || price == "0" {
        return price;
    }

    let price = leading_zeros().replacen(&price, 1, "0").into_owned();
    let zero_before_digit = matches!(price.as_bytes(), [b'0', next, ..] if next.is_ascii_digit());
    let price = if zero_before_digit {
        price[1..].to_string()
    } else {
        price
    };
    let price = price.trim_start_matches('.');
    let mut price = dot_run().replacen(price, 1, ".").into_owned();

    // "53.445.00" -> "53445.00": earlier dots are treated as separators.
    if price.matches('.').count() > 1 {
        if let Some(last_dot) = price.rfind('.') {
            price = price
                .char_indices()
                .filter(|&(i, c)| c != '.' || i == last_dot)
                .map(|(_, c)| c)
                .collect();
        }
    }

    // Only ASCII digits and dots remain, so byte offsets are char offsets.
    if let Some(dot) = price.find('.') {
        price.truncate((dot + 3).min(price.len()));
    }

    price
}

/// Applied on blur: empty or "0" becomes "0.00", anything else is padded to two
/// fraction digits unless that would overflow the field.
pub fn blur_price(current: &str) -> Option<String> {
    if current.is_empty() || current == "0" {
        return Some("0.00".to_string());
    }
    let formatted = format_money(parse_price(current)?);
    (formatted.len() <= NUMBER_MAX_LEN && formatted != current).then_some(formatted)
}
