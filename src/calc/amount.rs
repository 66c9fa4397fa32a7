use crate::data::LineItem;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Parses a count field from its leading run of ASCII digits, so a value
/// left as "1b" by the mask still counts as 1.
pub fn parse_count(raw: &str) -> Option<Decimal> {
    let end = raw
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(raw.len());
    if end == 0 {
        return None;
    }
    raw[..end].parse::<u64>().ok().map(Decimal::from)
}

/// Parses a price field. A trailing dot ("5.") is accepted while typing.
pub fn parse_price(raw: &str) -> Option<Decimal> {
    let digits = raw.strip_suffix('.').unwrap_or(raw);
    if digits.is_empty()
        || digits.starts_with('.')
        || digits.matches('.').count() > 1
        || !digits.bytes().all(|b| b.is_ascii_digit() || b == b'.')
    {
        return None;
    }
    Decimal::from_str(digits).ok()
}

/// Rounds half away from zero to two decimals and renders with exactly two
/// fraction digits.
pub fn format_money(value: Decimal) -> String {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}

/// `count x price` for one line, or `None` while either field does not parse.
pub fn line_amount(item: &LineItem) -> Option<Decimal> {
    let count = parse_count(&item.count)?;
    let price = parse_price(&item.price)?;
    count.checked_mul(price)
}

/// Sum of all parseable line amounts. Unparseable lines contribute nothing.
pub fn invoice_total<'a>(items: impl IntoIterator<Item = &'a LineItem>) -> Decimal {
    items
        .into_iter()
        .filter_map(line_amount)
        .fold(Decimal::ZERO, |acc, amount| acc.saturating_add(amount))
}
