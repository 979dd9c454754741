//! Plain and two-group KPI aggregation.

use crate::diagnostics::{Diagnostic, Outcome};
use crate::models::{Value, WidgetConfig};
use serde::{Deserialize, Serialize};

/// How two group aggregates are combined into one number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    /// `group1 / group2`
    Ratio,
    /// `group1 / group2 * 100`
    Share,
}

impl Comparison {
    /// Interpret the raw `comparison` setting.
    ///
    /// Falsy values and `"none"` select plain mode. A truthy value other than
    /// `"ratio"`/`"share"` also selects plain mode, with a warning.
    pub fn from_setting(raw: &Value) -> Outcome<Option<Comparison>> {
        match raw {
            Value::Text(s) if s == "ratio" => Outcome::clean(Some(Comparison::Ratio)),
            Value::Text(s) if s == "share" => Outcome::clean(Some(Comparison::Share)),
            Value::Text(s) if s == "none" => Outcome::clean(None),
            v if !v.is_truthy() => Outcome::clean(None),
            v => Outcome::with(
                None,
                vec![Diagnostic::warning(format!(
                    "unknown comparison mode {v}; showing the plain KPI"
                ))],
            ),
        }
    }

    /// Combine group aggregates. A zero denominator yields 0.
    pub fn combine(self, agg1: f64, agg2: f64) -> f64 {
        if agg2 == 0.0 {
            return 0.0;
        }
        match self {
            Comparison::Ratio => agg1 / agg2,
            Comparison::Share => agg1 / agg2 * 100.0,
        }
    }
}

/// Rows of `data` whose mask flag is set.
///
/// When the lengths differ only the common prefix is considered and a warning
/// is attached.
pub fn partition(data: &[Value], mask: &[bool], label: &str) -> Outcome<Vec<Value>> {
    let mut diags = Vec::new();
    if data.len() != mask.len() {
        diags.push(Diagnostic::warning(format!(
            "{label} mask has {} entries but data has {}; using the first {}",
            mask.len(),
            data.len(),
            data.len().min(mask.len())
        )));
    }
    let rows = data
        .iter()
        .zip(mask)
        .filter(|(_, keep)| **keep)
        .map(|(v, _)| v.clone())
        .collect();
    Outcome::with(rows, diags)
}

/// Compute the displayed number for one set of rows.
///
/// Masks are only consulted in comparison mode.
pub fn aggregate(
    data: &[Value],
    group1: &[bool],
    group2: &[bool],
    config: &WidgetConfig,
) -> Outcome<f64> {
    let kpi = config.kpi;
    let Some(comparison) = config.comparison else {
        return Outcome::clean(kpi.apply(data));
    };
    let mut diags = Vec::new();
    let rows1 = partition(data, group1, "group1").drain_into(&mut diags);
    let rows2 = partition(data, group2, "group2").drain_into(&mut diags);
    let agg1 = kpi.apply(&rows1);
    let agg2 = kpi.apply(&rows2);
    log::debug!("{kpi} {comparison:?}: group1={agg1} group2={agg2}");
    Outcome::with(comparison.combine(agg1, agg2), diags)
}
