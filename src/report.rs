use std::collections::BTreeSet;
use std::fmt::Write;
use std::sync::Arc;

use crate::data::distribution::Distribution;
use crate::data::model::Value;
use crate::error::DistributionError;

type DistributionResult = Result<Arc<Distribution>, DistributionError>;

/// Side-by-side percentages of `target` before and after filtering.
///
/// Values present on only one side show `-` on the other. A side that could
/// not be computed shows `n/a` and its error is listed below the table.
pub fn comparison_table(target: &str, raw: &DistributionResult, filtered: &DistributionResult) -> String {
    let mut values: BTreeSet<&Value> = BTreeSet::new();
    for dist in [raw, filtered].into_iter().flatten() {
        values.extend(dist.shares().iter().map(|s| &s.value));
    }

    let labels: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    let width = labels
        .iter()
        .map(String::len)
        .chain([target.len()])
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    let _ = writeln!(out, "{target:<width$}  {:>10}  {:>10}", "original", "filtered");
    for (value, label) in values.iter().zip(&labels) {
        let _ = writeln!(
            out,
            "{label:<width$}  {:>10}  {:>10}",
            cell(raw, value),
            cell(filtered, value)
        );
    }
    if let Err(e) = raw {
        let _ = writeln!(out, "original: {e}");
    }
    if let Err(e) = filtered {
        let _ = writeln!(out, "Filter error: {e}");
    }
    out
}

fn cell(dist: &DistributionResult, value: &Value) -> String {
    match dist {
        Ok(d) => d
            .percentage_of(value)
            .map(|p| format!("{p:.2}%"))
            .unwrap_or_else(|| "-".to_string()),
        Err(_) => "n/a".to_string(),
    }
}
