use crate::calc::visible_error;
use crate::calc::FieldError;
use crate::data::{Action, Invoice, InvoiceError, ItemId};
use anyhow::Result;
use chrono::NaiveDate;
use crossterm::event::{self, Event as CEvent, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use std::io::Stdout;
use std::time::Duration as StdDuration;
use tracing::debug;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_LEN: usize = 10;
const LABEL_WIDTH: usize = 14;

/// Every widget that can hold the keyboard focus, in tab order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Focus {
    Client,
    Date,
    DueDate,
    Description(ItemId),
    Count(ItemId),
    Price(ItemId),
    Remove(ItemId),
    AddLine,
    Save,
}

impl Focus {
    fn line(self) -> Option<ItemId> {
        match self {
            Focus::Description(id) | Focus::Count(id) | Focus::Price(id) | Focus::Remove(id) => {
                Some(id)
            }
            _ => None,
        }
    }
}

pub struct App {
    invoice: Invoice,
    focus: Focus,
    /// Text of the focused date field while it is being typed. Committed on blur.
    date_buffer: String,
    /// Result of the last save attempt or date commit (message, color). Cleared on next keypress.
    status: Option<(String, Color)>,
}

impl App {
    pub fn new(invoice: Invoice) -> Self {
        let mut app = App {
            invoice,
            focus: Focus::Client,
            date_buffer: String::new(),
            status: None,
        };
        app.dispatch(Action::ClientFocused);
        app
    }

    pub fn into_invoice(self) -> Invoice {
        self.invoice
    }

    /// Applies an action, logging rejections. Returns true if it was applied.
    fn dispatch(&mut self, action: Action) -> bool {
        match self.invoice.apply(action) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "form action rejected");
                false
            }
        }
    }

    // ── Focus ─────────────────────────────────────────────────────────────────

    fn focus_order(&self) -> Vec<Focus> {
        let mut order = vec![Focus::Client, Focus::Date, Focus::DueDate];
        for (id, _) in self.invoice.lines() {
            order.extend([
                Focus::Description(id),
                Focus::Count(id),
                Focus::Price(id),
                Focus::Remove(id),
            ]);
        }
        order.extend([Focus::AddLine, Focus::Save]);
        order
    }

    fn move_focus(&mut self, delta: isize) {
        let order = self.focus_order();
        let pos = order.iter().position(|f| *f == self.focus).unwrap_or(0);
        let next = (pos as isize + delta).rem_euclid(order.len() as isize) as usize;
        self.set_focus(order[next]);
    }

    /// Blurs the current widget, then focuses `target`.
    fn set_focus(&mut self, target: Focus) {
        if target == self.focus {
            return;
        }
        self.blur();
        self.focus = target;
        match target {
            Focus::Client => {
                self.dispatch(Action::ClientFocused);
            }
            Focus::Description(id) => {
                self.dispatch(Action::DescriptionFocused(id));
            }
            Focus::Date => self.date_buffer = self.invoice.date().format(DATE_FORMAT).to_string(),
            Focus::DueDate => {
                self.date_buffer = self.invoice.due_date().format(DATE_FORMAT).to_string()
            }
            _ => {}
        }
    }

    fn blur(&mut self) {
        let action = match self.focus {
            Focus::Client => Action::ClientBlurred,
            Focus::Description(id) => Action::DescriptionBlurred(id),
            Focus::Count(id) => Action::CountBlurred(id),
            Focus::Price(id) => Action::PriceBlurred(id),
            Focus::Date | Focus::DueDate => {
                self.commit_date();
                return;
            }
            Focus::Remove(_) | Focus::AddLine | Focus::Save => return,
        };
        self.dispatch(action);
    }

    fn commit_date(&mut self) {
        let (current, is_due) = match self.focus {
            Focus::Date => (self.invoice.date(), false),
            Focus::DueDate => (self.invoice.due_date(), true),
            _ => return,
        };
        match NaiveDate::parse_from_str(&self.date_buffer, DATE_FORMAT) {
            Ok(date) if date != current => {
                let action = if is_due {
                    Action::DueDateChanged(date)
                } else {
                    Action::DateChanged(date)
                };
                self.dispatch(action);
            }
            Ok(_) => {}
            Err(_) => {
                self.status = Some((
                    format!(
                        "'{}' is not a YYYY-MM-DD date, kept {}",
                        self.date_buffer,
                        current.format(DATE_FORMAT)
                    ),
                    Color::Yellow,
                ));
            }
        }
        self.date_buffer.clear();
    }

    // ── Editing ───────────────────────────────────────────────────────────────

    /// Current text of the focused masked field, if the focus is on one.
    fn field_text(&self) -> Option<String> {
        match self.focus {
            Focus::Client => Some(self.invoice.client().to_string()),
            Focus::Description(id) => self.invoice.line(id).map(|l| l.description.clone()),
            Focus::Count(id) => self.invoice.line(id).map(|l| l.count.clone()),
            Focus::Price(id) => self.invoice.line(id).map(|l| l.price.clone()),
            _ => None,
        }
    }

    fn edit_action(&self, raw: String) -> Option<Action> {
        match self.focus {
            Focus::Client => Some(Action::ClientEdited(raw)),
            Focus::Description(id) => Some(Action::DescriptionEdited(id, raw)),
            Focus::Count(id) => Some(Action::CountEdited(id, raw)),
            Focus::Price(id) => Some(Action::PriceEdited(id, raw)),
            _ => None,
        }
    }

    fn type_char(&mut self, c: char) {
        match self.focus {
            Focus::Date | Focus::DueDate => {
                if (c.is_ascii_digit() || c == '-') && self.date_buffer.len() < DATE_LEN {
                    self.date_buffer.push(c);
                }
            }
            Focus::Remove(_) | Focus::AddLine | Focus::Save => {
                if c == ' ' {
                    self.activate();
                }
            }
            _ => {
                if let Some(mut raw) = self.field_text() {
                    raw.push(c);
                    if let Some(action) = self.edit_action(raw) {
                        self.dispatch(action);
                    }
                }
            }
        }
    }

    fn backspace(&mut self) {
        if matches!(self.focus, Focus::Date | Focus::DueDate) {
            self.date_buffer.pop();
            return;
        }
        if let Some(mut raw) = self.field_text() {
            raw.pop();
            if let Some(action) = self.edit_action(raw) {
                self.dispatch(action);
            }
        }
    }

    fn activate(&mut self) {
        match self.focus {
            Focus::AddLine => self.add_line(),
            Focus::Remove(id) => self.remove_line(id),
            Focus::Save => self.save(),
            _ => self.move_focus(1),
        }
    }

    fn add_line(&mut self) {
        if !self.dispatch(Action::AddLine) {
            return;
        }
        // Identifiers only grow, so the newest line is the last one.
        if let Some((id, _)) = self.invoice.lines().last() {
            self.set_focus(Focus::Description(id));
        }
    }

    fn remove_line(&mut self, id: ItemId) {
        let order = self.focus_order();
        let next = order
            .iter()
            .position(|f| *f == Focus::Remove(id))
            .and_then(|i| order.get(i + 1))
            .copied()
            .unwrap_or(Focus::AddLine);
        if self.dispatch(Action::RemoveLine(id)) {
            // The removed line's widgets are gone; nothing left to blur.
            self.focus = Focus::AddLine;
            self.set_focus(next);
        }
    }

    fn save(&mut self) {
        self.set_focus(Focus::Save);
        let message = match self.invoice.apply(Action::Save) {
            Ok(()) => return,
            Err(InvoiceError::NoLines) => "Add at least one line before saving".to_string(),
            Err(InvoiceError::EmptyDescriptions(ids)) => {
                format!("{} line(s) need a description", ids.len())
            }
            Err(InvoiceError::EmptyClient) => "Enter the client name before saving".to_string(),
            Err(e) => e.to_string(),
        };
        self.status = Some((message, Color::Red));
    }

    /// Feeds one terminal event to the form. Only key presses count.
    pub fn handle_event(&mut self, event: CEvent) -> bool {
        match event {
            CEvent::Key(key) if key.kind == KeyEventKind::Press => {
                self.handle_key(key.code, key.modifiers)
            }
            _ => false,
        }
    }

    /// Returns true if the app should quit.
    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
        // The confirmation screen only waits for a key to exit.
        if self.invoice.is_saved() {
            return true;
        }

        self.status = None;

        if modifiers.contains(KeyModifiers::CONTROL) {
            match code {
                KeyCode::Char('c') => return true,
                KeyCode::Char('n') => self.add_line(),
                KeyCode::Char('d') => {
                    if let Some(id) = self.focus.line() {
                        self.remove_line(id);
                    }
                }
                KeyCode::Char('s') => self.save(),
                _ => {}
            }
            return false;
        }

        match code {
            KeyCode::Esc => return true,
            KeyCode::Tab | KeyCode::Down => self.move_focus(1),
            KeyCode::BackTab | KeyCode::Up => self.move_focus(-1),
            KeyCode::Enter => self.activate(),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Char(c) => self.type_char(c),
            _ => {}
        }
        false
    }

    // ── Rendering ─────────────────────────────────────────────────────────────

    pub fn render(&mut self, f: &mut Frame) {
        let area = f.area();
        if self.invoice.is_saved() {
            self.render_saved(f, area);
            return;
        }

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(5),    // form
                Constraint::Length(4), // total + status
                Constraint::Length(1), // hints
            ])
            .split(area);

        self.render_form(f, chunks[0]);
        self.render_footer(f, chunks[1]);
        self.render_hints(f, chunks[2]);
    }

    fn render_form(&self, f: &mut Frame, area: Rect) {
        let mut rows = FormRows::default();

        let client_error = visible_error(
            self.invoice.client_validity(),
            self.invoice.client_touched(),
            self.focus == Focus::Client,
        );
        rows.field(
            self.focus == Focus::Client,
            "Client name",
            self.invoice.client(),
            "Acme Corp",
        );
        rows.error(client_error);
        rows.field(
            self.focus == Focus::Date,
            "Date",
            &self.date_text(Focus::Date),
            "YYYY-MM-DD",
        );
        rows.field(
            self.focus == Focus::DueDate,
            "Due date",
            &self.date_text(Focus::DueDate),
            "YYYY-MM-DD",
        );
        rows.blank();

        if let Some(err) = self.invoice.lines_error() {
            rows.push(Line::from(Span::styled(
                format!("  {}", err),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )));
        }

        for (n, (id, item)) in self.invoice.lines().enumerate() {
            rows.push(Line::from(Span::styled(
                format!("Line {}", n + 1),
                Style::default().add_modifier(Modifier::BOLD),
            )));
            let description_focused = self.focus == Focus::Description(id);
            rows.field(
                description_focused,
                "Description",
                &item.description,
                "Description...",
            );
            rows.error(visible_error(
                item.description_validity(),
                item.description_touched,
                description_focused,
            ));
            rows.field(self.focus == Focus::Count(id), "Quantity", &item.count, "");
            rows.field(self.focus == Focus::Price(id), "Price", &item.price, "");
            rows.push(Line::from(vec![
                Span::raw(format!("  {:<width$}", "Amount", width = LABEL_WIDTH)),
                Span::styled(item.amount_label(), Style::default().fg(Color::Cyan)),
            ]));
            rows.button(self.focus == Focus::Remove(id), "[ Delete line ]");
            rows.blank();
        }

        rows.button(self.focus == Focus::AddLine, "[ + Add line ]");
        rows.button(self.focus == Focus::Save, "[ Save ]");

        // Keep the focused row (plus one row of context) inside the block.
        let inner_height = area.height.saturating_sub(2) as usize;
        let scroll = (rows.focus_row + 2).saturating_sub(inner_height) as u16;

        let form = Paragraph::new(rows.lines)
            .block(Block::default().borders(Borders::ALL).title(" Invoice "))
            .scroll((scroll, 0));
        f.render_widget(form, area);
    }

    fn date_text(&self, field: Focus) -> String {
        if self.focus == field {
            return self.date_buffer.clone();
        }
        let date = match field {
            Focus::DueDate => self.invoice.due_date(),
            _ => self.invoice.date(),
        };
        date.format(DATE_FORMAT).to_string()
    }

    fn render_footer(&self, f: &mut Frame, area: Rect) {
        let mut lines = vec![Line::from(vec![
            Span::raw("Total: "),
            Span::styled(
                self.invoice.total_label(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
        ])];
        if let Some((msg, color)) = &self.status {
            lines.push(Line::from(Span::styled(
                msg.clone(),
                Style::default().fg(*color),
            )));
        }
        let footer = Paragraph::new(lines).block(Block::default().borders(Borders::ALL));
        f.render_widget(footer, area);
    }

    fn render_hints(&self, f: &mut Frame, area: Rect) {
        let hints = Paragraph::new(Line::from(Span::styled(
            "Tab/↓=next  Shift+Tab/↑=prev  Enter=activate  ^N=add line  ^D=delete line  ^S=save  Esc=quit",
            Style::default().fg(Color::DarkGray),
        )));
        f.render_widget(hints, area);
    }

    fn render_saved(&self, f: &mut Frame, area: Rect) {
        let text = vec![
            Line::from(""),
            Line::from(Span::styled(
                "Invoice saved",
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(format!(
                "{}  ·  {} line(s)  ·  total {}",
                self.invoice.client(),
                self.invoice.line_count(),
                self.invoice.total_label()
            )),
            Line::from(""),
            Line::from(Span::styled(
                "Press any key to exit",
                Style::default().fg(Color::DarkGray),
            )),
        ];
        let saved = Paragraph::new(text)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title(" Invoice "));
        f.render_widget(saved, area);
    }
}

// ── Form row construction ─────────────────────────────────────────────────────

/// Accumulates the form's text rows and remembers where the focused one is.
#[derive(Default)]
struct FormRows {
    lines: Vec<Line<'static>>,
    focus_row: usize,
}

impl FormRows {
    fn push(&mut self, line: Line<'static>) {
        self.lines.push(line);
    }

    fn blank(&mut self) {
        self.lines.push(Line::from(""));
    }

    fn mark_focus(&mut self, focused: bool) {
        if focused {
            self.focus_row = self.lines.len();
        }
    }

    /// A labelled input. The focused one shows a trailing cursor, an empty
    /// unfocused one shows its placeholder.
    fn field(&mut self, focused: bool, label: &str, value: &str, placeholder: &str) {
        self.mark_focus(focused);
        let value = if focused {
            Span::styled(
                format!("{}_", value),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        } else if value.is_empty() {
            Span::styled(placeholder.to_string(), Style::default().fg(Color::DarkGray))
        } else {
            Span::raw(value.to_string())
        };
        self.lines.push(Line::from(vec![
            Span::raw(format!("  {:<width$}", label, width = LABEL_WIDTH)),
            value,
        ]));
    }

    fn error(&mut self, error: Option<FieldError>) {
        if let Some(err) = error {
            self.lines.push(Line::from(Span::styled(
                format!("  {:<width$}{}", "", err, width = LABEL_WIDTH),
                Style::default().fg(Color::Red),
            )));
        }
    }

    fn button(&mut self, focused: bool, text: &str) {
        self.mark_focus(focused);
        let style = if focused {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Cyan)
        };
        self.lines.push(Line::from(vec![
            Span::raw("  "),
            Span::styled(text.to_string(), style),
        ]));
    }
}

// ── App event loop ────────────────────────────────────────────────────────────

pub fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| app.render(f))?;
        if event::poll(StdDuration::from_millis(16))? {
            if app.handle_event(event::read()?) {
                break;
            }
        }
    }
    Ok(())
}
