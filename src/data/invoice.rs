use crate::calc::mask::{
    blur_count, blur_price, blur_text, clamp_len, mask_count, mask_price, mask_text,
    NUMBER_MAX_LEN, TEXT_MAX_LEN,
};
use crate::calc::validation::{validate_client, FieldError};
use crate::calc::{format_money, invoice_total};
use crate::data::{AppSettings, ItemId, LineItem};
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormState {
    #[default]
    Editing,
    /// Terminal: no further edits are accepted.
    Saved,
}

/// One user event against the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    ClientEdited(String),
    ClientFocused,
    ClientBlurred,
    DateChanged(NaiveDate),
    DueDateChanged(NaiveDate),
    AddLine,
    RemoveLine(ItemId),
    DescriptionEdited(ItemId, String),
    DescriptionFocused(ItemId),
    DescriptionBlurred(ItemId),
    CountEdited(ItemId, String),
    CountBlurred(ItemId),
    PriceEdited(ItemId, String),
    PriceBlurred(ItemId),
    Save,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvoiceError {
    #[error("invoice is already saved")]
    Locked,
    #[error("no invoice line {0}")]
    UnknownLine(ItemId),
    #[error("cannot save an invoice without lines")]
    NoLines,
    #[error("{} line(s) have no description", .0.len())]
    EmptyDescriptions(Vec<ItemId>),
    #[error("client name is empty")]
    EmptyClient,
}

/// The whole form: invoice-level fields plus the line collection.
#[derive(Debug, Clone)]
pub struct Invoice {
    client: String,
    client_touched: bool,
    date: NaiveDate,
    due_date: NaiveDate,
    due_offset_days: i64,
    lines: BTreeMap<ItemId, LineItem>,
    next_id: u64,
    lines_error: Option<FieldError>,
    state: FormState,
}

impl Invoice {
    pub fn new(today: NaiveDate, due_offset_days: i64) -> Self {
        Invoice {
            client: String::new(),
            client_touched: false,
            date: today,
            due_date: offset_date(today, due_offset_days),
            due_offset_days,
            lines: BTreeMap::new(),
            next_id: 0,
            lines_error: None,
            state: FormState::Editing,
        }
    }

    /// Builds an empty form from settings, pre-filled with `initial_lines` blank lines.
    pub fn from_settings(today: NaiveDate, settings: &AppSettings) -> Self {
        let mut invoice = Self::new(today, settings.due_offset_days);
        for _ in 0..settings.initial_lines {
            invoice.push_line();
        }
        invoice
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn client(&self) -> &str {
        &self.client
    }

    pub fn client_touched(&self) -> bool {
        self.client_touched
    }

    pub fn client_validity(&self) -> Result<(), FieldError> {
        validate_client(&self.client)
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn due_date(&self) -> NaiveDate {
        self.due_date
    }

    pub fn lines(&self) -> impl Iterator<Item = (ItemId, &LineItem)> {
        self.lines.iter().map(|(id, line)| (*id, line))
    }

    pub fn line(&self, id: ItemId) -> Option<&LineItem> {
        self.lines.get(&id)
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn lines_error(&self) -> Option<FieldError> {
        self.lines_error
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    pub fn is_saved(&self) -> bool {
        self.state() == FormState::Saved
    }

    pub fn total(&self) -> Decimal {
        invoice_total(self.lines.values())
    }

    pub fn total_label(&self) -> String {
        format_money(self.total())
    }

    // ── Actions ───────────────────────────────────────────────────────────────

    /// Applies one event. Every event is rejected once the invoice is saved.
    pub fn apply(&mut self, action: Action) -> Result<(), InvoiceError> {
        if self.is_saved() {
            return Err(InvoiceError::Locked);
        }
        debug!(?action, "applying form action");
        match action {
            Action::ClientEdited(raw) => self.edit_client(&raw),
            Action::ClientFocused => self.client_touched = true,
            Action::ClientBlurred => {
                if let Some(trimmed) = blur_text(&self.client) {
                    self.client = trimmed;
                }
            }
            Action::DateChanged(date) => self.set_date(date),
            Action::DueDateChanged(date) => self.due_date = date,
            Action::AddLine => self.push_line(),
            Action::RemoveLine(id) => self.remove_line(id)?,
            Action::DescriptionEdited(id, raw) => {
                self.line_mut(id)?.description = mask_text(&clamp_len(&raw, TEXT_MAX_LEN));
            }
            Action::DescriptionFocused(id) => self.line_mut(id)?.description_touched = true,
            Action::DescriptionBlurred(id) => {
                let line = self.line_mut(id)?;
                if let Some(trimmed) = blur_text(&line.description) {
                    line.description = trimmed;
                }
            }
            Action::CountEdited(id, raw) => {
                self.line_mut(id)?.count = mask_count(&clamp_len(&raw, NUMBER_MAX_LEN));
            }
            Action::CountBlurred(id) => {
                let line = self.line_mut(id)?;
                if let Some(count) = blur_count(&line.count) {
                    line.count = count;
                }
            }
            Action::PriceEdited(id, raw) => {
                self.line_mut(id)?.price = mask_price(&clamp_len(&raw, NUMBER_MAX_LEN));
            }
            Action::PriceBlurred(id) => {
                let line = self.line_mut(id)?;
                if let Some(price) = blur_price(&line.price) {
                    line.price = price;
                }
            }
            Action::Save => self.save()?,
        }
        Ok(())
    }

    fn edit_client(&mut self, raw: &str) {
        self.client = mask_text(&clamp_len(raw, TEXT_MAX_LEN));
    }

    /// Moving the invoice date drags the due date along with it.
    fn set_date(&mut self, date: NaiveDate) {
        self.date = date;
        self.due_date = offset_date(date, self.due_offset_days);
    }

    /// Appends a blank line. Only reachable through `apply` or construction,
    /// so a saved invoice never grows.
    fn push_line(&mut self) {
        let id = ItemId(self.next_id);
        self.next_id += 1;
        self.lines.insert(id, LineItem::default());
        self.lines_error = None;
    }

    fn remove_line(&mut self, id: ItemId) -> Result<(), InvoiceError> {
        self.lines
            .remove(&id)
            .map(|_| ())
            .ok_or(InvoiceError::UnknownLine(id))
    }

    fn line_mut(&mut self, id: ItemId) -> Result<&mut LineItem, InvoiceError> {
        self.lines.get_mut(&id).ok_or(InvoiceError::UnknownLine(id))
    }

    /// The save gate. On failure the offending fields are marked touched so
    /// their errors become visible, and the form stays editable.
    fn save(&mut self) -> Result<(), InvoiceError> {
        self.client_touched = true;

        if self.lines.is_empty() {
            self.lines_error = Some(FieldError::NoLines);
            warn!("save rejected: invoice has no lines");
            return Err(InvoiceError::NoLines);
        }

        let empty: Vec<ItemId> = self
            .lines
            .iter_mut()
            .filter(|(_, line)| line.description_validity().is_err())
            .map(|(id, line)| {
                line.description_touched = true;
                *id
            })
            .collect();
        if !empty.is_empty() {
            warn!(lines = empty.len(), "save rejected: lines without description");
            return Err(InvoiceError::EmptyDescriptions(empty));
        }

        if self.client_validity().is_err() {
            warn!("save rejected: client name is empty");
            return Err(InvoiceError::EmptyClient);
        }

        self.state = FormState::Saved;
        info!(
            client = %self.client,
            lines = self.lines.len(),
            total = %self.total_label(),
            "invoice saved"
        );
        Ok(())
    }
}

fn offset_date(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_add_signed(Duration::days(days)).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn invoice() -> Invoice {
        Invoice::new(d(2025, 3, 10), 7)
    }

    /// Adds a line through the action path and returns the new id.
    fn add_line(inv: &mut Invoice) -> ItemId {
        inv.apply(Action::AddLine).unwrap();
        inv.lines().last().map(|(id, _)| id).unwrap()
    }

    /// A saveable invoice with one described line.
    fn ready_invoice() -> (Invoice, ItemId) {
        let mut inv = invoice();
        inv.apply(Action::ClientEdited("Acme Corp".to_string())).unwrap();
        let id = add_line(&mut inv);
        inv.apply(Action::DescriptionEdited(id, "Hosting".to_string()))
            .unwrap();
        (inv, id)
    }

    #[test]
    fn test_new_invoice_defaults() {
        let inv = invoice();
        assert_eq!(inv.client(), "");
        assert!(!inv.client_touched());
        assert_eq!(inv.date(), d(2025, 3, 10));
        assert_eq!(inv.due_date(), d(2025, 3, 17));
        assert_eq!(inv.line_count(), 0);
        assert_eq!(inv.total_label(), "0.00");
        assert_eq!(inv.state(), FormState::Editing);
    }

    #[test]
    fn test_from_settings_prefills_lines() {
        let settings = AppSettings {
            due_offset_days: 14,
            initial_lines: 2,
        };
        let inv = Invoice::from_settings(d(2025, 3, 10), &settings);
        assert_eq!(inv.line_count(), 2);
        assert_eq!(inv.due_date(), d(2025, 3, 24));
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut inv = invoice();
        let a = add_line(&mut inv);
        let b = add_line(&mut inv);
        inv.apply(Action::RemoveLine(b)).unwrap();
        let c = add_line(&mut inv);
        assert_eq!(a, ItemId(0));
        assert_eq!(b, ItemId(1));
        assert_eq!(c, ItemId(2));
    }

    #[test]
    fn test_lines_iterate_in_insertion_order() {
        let mut inv = invoice();
        let ids: Vec<ItemId> = (0..3).map(|_| add_line(&mut inv)).collect();
        inv.apply(Action::RemoveLine(ids[1])).unwrap();
        let seen: Vec<ItemId> = inv.lines().map(|(id, _)| id).collect();
        assert_eq!(seen, vec![ids[0], ids[2]]);
    }

    #[test]
    fn test_unknown_line_is_rejected() {
        let mut inv = invoice();
        let err = inv.apply(Action::RemoveLine(ItemId(9))).unwrap_err();
        assert_eq!(err, InvoiceError::UnknownLine(ItemId(9)));
        let err = inv
            .apply(Action::CountEdited(ItemId(9), "2".to_string()))
            .unwrap_err();
        assert_eq!(err, InvoiceError::UnknownLine(ItemId(9)));
    }

    #[test]
    fn test_client_edit_is_masked_and_capped() {
        let mut inv = invoice();
        inv.apply(Action::ClientEdited("  Acme   Corp".to_string()))
            .unwrap();
        assert_eq!(inv.client(), "Acme Corp");
        inv.apply(Action::ClientEdited("x".repeat(40))).unwrap();
        assert_eq!(inv.client().len(), TEXT_MAX_LEN);
    }

    #[test]
    fn test_client_blur_trims_end() {
        let mut inv = invoice();
        inv.apply(Action::ClientEdited("Acme ".to_string())).unwrap();
        inv.apply(Action::ClientBlurred).unwrap();
        assert_eq!(inv.client(), "Acme");
    }

    #[test]
    fn test_client_focus_marks_touched() {
        let mut inv = invoice();
        inv.apply(Action::ClientFocused).unwrap();
        assert!(inv.client_touched());
    }

    #[test]
    fn test_date_change_moves_due_date() {
        let mut inv = invoice();
        inv.apply(Action::DateChanged(d(2025, 12, 28))).unwrap();
        assert_eq!(inv.date(), d(2025, 12, 28));
        assert_eq!(inv.due_date(), d(2026, 1, 4));
    }

    #[test]
    fn test_due_date_editable_independently() {
        let mut inv = invoice();
        inv.apply(Action::DueDateChanged(d(2025, 4, 1))).unwrap();
        assert_eq!(inv.date(), d(2025, 3, 10));
        assert_eq!(inv.due_date(), d(2025, 4, 1));
    }

    #[test]
    fn test_line_field_edits_and_blurs() {
        let mut inv = invoice();
        let id = add_line(&mut inv);
        inv.apply(Action::CountEdited(id, "007".to_string())).unwrap();
        inv.apply(Action::PriceEdited(id, "1..5".to_string())).unwrap();
        assert_eq!(inv.line(id).unwrap().count, "7");
        assert_eq!(inv.line(id).unwrap().price, "1.5");
        inv.apply(Action::PriceBlurred(id)).unwrap();
        assert_eq!(inv.line(id).unwrap().price, "1.50");
        assert_eq!(inv.total_label(), "10.50");
    }

    #[test]
    fn test_count_with_trailing_junk_uses_leading_digits() {
        let mut inv = invoice();
        let id = add_line(&mut inv);
        inv.apply(Action::PriceEdited(id, "2.50".to_string())).unwrap();
        inv.apply(Action::CountEdited(id, "1ab".to_string())).unwrap();
        let line = inv.line(id).unwrap();
        assert_eq!(line.count, "1b");
        assert_eq!(line.amount_label(), "2.50");
        assert_eq!(inv.total_label(), "2.50");
    }

    #[test]
    fn test_count_blur_restores_one() {
        let mut inv = invoice();
        let id = add_line(&mut inv);
        inv.apply(Action::CountEdited(id, String::new())).unwrap();
        assert_eq!(inv.line(id).unwrap().amount_label(), "...");
        inv.apply(Action::CountBlurred(id)).unwrap();
        assert_eq!(inv.line(id).unwrap().count, "1");
    }

    #[test]
    fn test_price_edit_respects_length_cap() {
        let mut inv = invoice();
        let id = add_line(&mut inv);
        inv.apply(Action::PriceEdited(id, "123456789".to_string()))
            .unwrap();
        assert_eq!(inv.line(id).unwrap().price, "12345678");
    }

    #[test]
    fn test_description_focus_and_blur() {
        let mut inv = invoice();
        let id = add_line(&mut inv);
        inv.apply(Action::DescriptionFocused(id)).unwrap();
        inv.apply(Action::DescriptionEdited(id, " Design ".to_string()))
            .unwrap();
        inv.apply(Action::DescriptionBlurred(id)).unwrap();
        let line = inv.line(id).unwrap();
        assert!(line.description_touched);
        assert_eq!(line.description, "Design");
    }

    #[test]
    fn test_save_without_lines_fails() {
        let mut inv = invoice();
        inv.apply(Action::ClientEdited("Acme".to_string())).unwrap();
        assert_eq!(inv.apply(Action::Save), Err(InvoiceError::NoLines));
        assert_eq!(inv.state(), FormState::Editing);
        assert_eq!(inv.lines_error(), Some(FieldError::NoLines));
        assert!(inv.client_touched());
    }

    #[test]
    fn test_add_line_clears_no_lines_error() {
        let mut inv = invoice();
        let _ = inv.apply(Action::Save);
        inv.apply(Action::AddLine).unwrap();
        assert_eq!(inv.lines_error(), None);
    }

    #[test]
    fn test_save_with_empty_description_touches_line() {
        let mut inv = invoice();
        inv.apply(Action::ClientEdited("Acme".to_string())).unwrap();
        let blank = add_line(&mut inv);
        let filled = add_line(&mut inv);
        inv.apply(Action::DescriptionEdited(filled, "Support".to_string()))
            .unwrap();
        inv.apply(Action::CountEdited(blank, "3".to_string())).unwrap();

        let err = inv.apply(Action::Save).unwrap_err();
        assert_eq!(err, InvoiceError::EmptyDescriptions(vec![blank]));
        assert_eq!(inv.state(), FormState::Editing);
        assert!(inv.line(blank).unwrap().description_touched);
        assert!(!inv.line(filled).unwrap().description_touched);
        assert_eq!(inv.line(blank).unwrap().count, "3");
    }

    #[test]
    fn test_save_with_empty_client_stays_editing() {
        let mut inv = invoice();
        let id = add_line(&mut inv);
        inv.apply(Action::DescriptionEdited(id, "Hosting".to_string()))
            .unwrap();
        assert_eq!(inv.apply(Action::Save), Err(InvoiceError::EmptyClient));
        assert_eq!(inv.state(), FormState::Editing);
        assert!(inv.client_touched());
    }

    #[test]
    fn test_save_success_is_terminal() {
        let (mut inv, id) = ready_invoice();
        inv.apply(Action::Save).unwrap();
        assert!(inv.is_saved());
        assert_eq!(
            inv.apply(Action::DescriptionEdited(id, "Changed".to_string())),
            Err(InvoiceError::Locked)
        );
        assert_eq!(inv.apply(Action::AddLine), Err(InvoiceError::Locked));
        assert_eq!(inv.apply(Action::Save), Err(InvoiceError::Locked));
        assert_eq!(inv.line(id).unwrap().description, "Hosting");
        assert_eq!(inv.line_count(), 1);
    }

    #[test]
    fn test_saved_invoice_line_count_is_frozen() {
        let (mut inv, id) = ready_invoice();
        inv.apply(Action::Save).unwrap();
        assert_eq!(inv.apply(Action::AddLine), Err(InvoiceError::Locked));
        assert_eq!(inv.apply(Action::RemoveLine(id)), Err(InvoiceError::Locked));
        assert_eq!(
            inv.apply(Action::RemoveLine(ItemId(9))),
            Err(InvoiceError::Locked)
        );
        assert_eq!(inv.line_count(), 1);
        assert_eq!(inv.lines_error(), None);
        assert!(inv.is_saved());
        let ids: Vec<ItemId> = inv.lines().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![id]);
    }

    #[test]
    fn test_total_drops_to_zero_after_removal() {
        let (mut inv, id) = ready_invoice();
        inv.apply(Action::PriceEdited(id, "9.99".to_string())).unwrap();
        let other = add_line(&mut inv);
        assert_eq!(inv.total_label(), "9.99");
        inv.apply(Action::RemoveLine(id)).unwrap();
        assert_eq!(inv.total_label(), "0.00");
        assert!(inv.line(other).is_some());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            InvoiceError::EmptyDescriptions(vec![ItemId(0), ItemId(2)]).to_string(),
            "2 line(s) have no description"
        );
        assert_eq!(InvoiceError::UnknownLine(ItemId(3)).to_string(), "no invoice line #3");
    }
}
