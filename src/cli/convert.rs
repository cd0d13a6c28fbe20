use super::ui;
use crate::core::rates::normalize_code;
use crate::plugin::ExchangeRateApi;
use anyhow::Result;
use comfy_table::Cell;
use futures::future::join_all;

/// Converts a single amount and renders it as one line.
pub async fn transform(
    api: &dyn ExchangeRateApi,
    source: &str,
    target: &str,
    amount: f64,
) -> Result<String> {
    let converted = api.transform(source, target, amount).await?;
    Ok(format!(
        "{} {} = {} {}",
        amount,
        normalize_code(source),
        ui::style_text(&format!("{converted:.6}"), ui::StyleType::Value),
        normalize_code(target)
    ))
}

/// Looks up `source` against every target and renders one row per pair.
/// Fails only when no target could be resolved.
pub async fn rate_table(
    api: &dyn ExchangeRateApi,
    source: &str,
    targets: &[String],
) -> Result<String> {
    let source = normalize_code(source);
    let results = join_all(targets.iter().map(|target| api.rate(&source, target))).await;

    if let Some(Err(first)) = results.first() {
        if results.iter().all(|r| r.is_err()) {
            return Err(first.clone().into());
        }
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Pair"), ui::header_cell("Rate")]);
    for (target, result) in targets.iter().zip(results) {
        let pair = Cell::new(format!("{source}/{}", normalize_code(target)));
        let rate = match result {
            Ok(rate) => ui::rate_cell(rate),
            Err(e) => ui::error_cell(&e.to_string()),
        };
        table.add_row(vec![pair, rate]);
    }

    Ok(table.to_string())
}
