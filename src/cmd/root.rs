use crate::calc::{format_money, line_amount};
use crate::data::{AppSettings, Invoice, LineItem};
use crate::ui::invoice_view::{run_app, App};
use crate::ui::{restore_terminal, setup_terminal};
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::io::Write;
use tracing::info;

pub fn run(json: bool) -> Result<()> {
    let settings = AppSettings::load()?;

    // Install panic hook to restore terminal on panic
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = crossterm::terminal::disable_raw_mode();
        let _ = crossterm::execute!(
            std::io::stdout(),
            crossterm::terminal::LeaveAlternateScreen
        );
        original_hook(info);
    }));

    let mut terminal = setup_terminal()?;

    let today = Local::now().date_naive();
    let mut app = App::new(Invoice::from_settings(today, &settings));

    let result = run_app(&mut terminal, &mut app);

    restore_terminal(&mut terminal)?;
    result?;

    let invoice = app.into_invoice();
    if !invoice.is_saved() {
        info!("form closed without saving");
        return Ok(());
    }

    let mut out = std::io::stdout();
    if json {
        write_json(&invoice, &mut out)
    } else {
        write_summary(&invoice, &mut out)
    }
}

#[derive(Serialize)]
struct SavedInvoice<'a> {
    client: &'a str,
    date: NaiveDate,
    due_date: NaiveDate,
    lines: Vec<SavedLine<'a>>,
    total: String,
}

#[derive(Serialize)]
struct SavedLine<'a> {
    #[serde(flatten)]
    item: &'a LineItem,
    amount: Option<String>,
}

fn saved_invoice(invoice: &Invoice) -> SavedInvoice<'_> {
    SavedInvoice {
        client: invoice.client(),
        date: invoice.date(),
        due_date: invoice.due_date(),
        lines: invoice
            .lines()
            .map(|(_, item)| SavedLine {
                item,
                amount: line_amount(item).map(format_money),
            })
            .collect(),
        total: invoice.total_label(),
    }
}

pub(crate) fn write_json<W: Write>(invoice: &Invoice, out: &mut W) -> Result<()> {
    let json = serde_json::to_string_pretty(&saved_invoice(invoice))
        .context("failed to serialize invoice")?;
    writeln!(out, "{}", json)?;
    Ok(())
}

pub(crate) fn write_summary<W: Write>(invoice: &Invoice, out: &mut W) -> Result<()> {
    writeln!(out, "Invoice saved")?;
    writeln!(out, "{:<12} {}", "Client:", invoice.client())?;
    writeln!(out, "{:<12} {}", "Date:", invoice.date().format("%Y-%m-%d"))?;
    writeln!(out, "{:<12} {}", "Due date:", invoice.due_date().format("%Y-%m-%d"))?;
    writeln!(out, "---")?;
    writeln!(
        out,
        "{:<32} {:>8} {:>8} {:>12}",
        "Description", "Qty", "Price", "Amount"
    )?;
    for (_, item) in invoice.lines() {
        writeln!(
            out,
            "{:<32} {:>8} {:>8} {:>12}",
            item.description,
            item.count,
            item.price,
            item.amount_label()
        )?;
    }
    writeln!(out, "---")?;
    writeln!(out, "{:<12} {}", "Total:", invoice.total_label())?;
    Ok(())
}
