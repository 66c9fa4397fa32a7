pub mod amount;
pub mod mask;
pub mod validation;

pub use amount::{format_money, invoice_total, line_amount};
pub use validation::{visible_error, FieldError};
