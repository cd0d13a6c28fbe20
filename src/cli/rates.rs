use super::ui;
use crate::core::exchange::CacheStatus;
use crate::core::rates::normalize_code;
use crate::plugin::ExchangeRateApi;
use anyhow::Result;
use chrono::{Local, TimeZone};
use comfy_table::{Cell, CellAlignment};

/// Renders the full rate table for `source`, sorted by currency code.
pub async fn rates_table(api: &dyn ExchangeRateApi, source: &str) -> Result<String> {
    let source = normalize_code(source);
    let rates = api.rates(&source).await?;

    let mut rows: Vec<(&String, &f64)> = rates.iter().collect();
    rows.sort_by(|a, b| a.0.cmp(b.0));

    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Currency"), ui::header_cell("Rate")]);
    for (code, rate) in rows {
        table.add_row(vec![Cell::new(code), ui::rate_cell(*rate)]);
    }

    Ok(format!(
        "Rates for 1 {}\n\n{}",
        ui::style_text(&source, ui::StyleType::Title),
        table
    ))
}

/// Renders what is currently held in the cache.
pub fn cached_table(entries: &[CacheStatus]) -> String {
    if entries.is_empty() {
        return ui::style_text("No cached exchange rates", ui::StyleType::Subtle);
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Base"),
        ui::header_cell("Last Updated"),
        ui::header_cell("Currencies"),
        ui::header_cell("Status"),
    ]);
    for entry in entries {
        table.add_row(vec![
            Cell::new(&entry.base),
            Cell::new(format_timestamp(entry.snapshot.last_updated)),
            Cell::new(entry.snapshot.rates.len()).set_alignment(CellAlignment::Right),
            ui::freshness_cell(entry.stale),
        ]);
    }
    table.to_string()
}

fn format_timestamp(ts: i64) -> String {
    Local
        .timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
