pub mod app_settings;
pub mod invoice;
pub mod line_item;
pub mod persistence;

pub use app_settings::AppSettings;
pub use invoice::{Action, Invoice, InvoiceError};
pub use line_item::{ItemId, LineItem};
