use crate::calc::amount::line_amount;
use crate::calc::format_money;
use crate::calc::validation::{validate_description, FieldError};
use serde::Serialize;
use std::fmt;

/// Identifier of a line within one invoice. Allocated from a counter and never
/// reused after the line is removed.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One invoice row. Fields hold the raw masked text exactly as displayed.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct LineItem {
    pub description: String,
    /// Set on first focus or on a failed save; never cleared.
    #[serde(skip)]
    pub description_touched: bool,
    pub count: String,
    pub price: String,
}

impl Default for LineItem {
    fn default() -> Self {
        LineItem {
            description: String::new(),
            description_touched: false,
            count: "1".to_string(),
            price: "0.00".to_string(),
        }
    }
}

impl LineItem {
    /// Amount text for display, or "..." while count or price is not a number.
    pub fn amount_label(&self) -> String {
        line_amount(self).map(format_money).unwrap_or_else(|| "...".to_string())
    }

    pub fn description_validity(&self) -> Result<(), FieldError> {
        validate_description(&self.description)
    }
}
