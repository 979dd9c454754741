//! KPI registry: named reductions from a column of raw values to one number.
//!
//! | name            | result                                        |
//! |-----------------|-----------------------------------------------|
//! | `sum`           | sum of coerced values                         |
//! | `mean`          | sum / count, `0` when empty                   |
//! | `count`         | number of elements                            |
//! | `distinctCount` | number of unique raw values                   |
//! | `duplicates`    | number of spellings occurring more than once  |
//! | `min` / `max`   | extreme coerced value, `0` when empty         |
//!
//! Unknown names resolve to `count` with a warning diagnostic.

use crate::diagnostics::{Diagnostic, Outcome};
use crate::models::Value;
use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Signature shared by every reduction.
pub type ReduceFn = fn(&[Value]) -> f64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Kpi {
    Sum,
    Mean,
    Count,
    DistinctCount,
    Duplicates,
    Min,
    Max,
}

impl Kpi {
    pub const ALL: [Kpi; 7] = [
        Kpi::Sum,
        Kpi::Mean,
        Kpi::Count,
        Kpi::DistinctCount,
        Kpi::Duplicates,
        Kpi::Min,
        Kpi::Max,
    ];

    /// Wire name, e.g. `"distinctCount"`.
    pub fn name(self) -> &'static str {
        match self {
            Kpi::Sum => "sum",
            Kpi::Mean => "mean",
            Kpi::Count => "count",
            Kpi::DistinctCount => "distinctCount",
            Kpi::Duplicates => "duplicates",
            Kpi::Min => "min",
            Kpi::Max => "max",
        }
    }

    pub fn reducer(self) -> ReduceFn {
        match self {
            Kpi::Sum => sum,
            Kpi::Mean => mean,
            Kpi::Count => count,
            Kpi::DistinctCount => distinct_count,
            Kpi::Duplicates => duplicates,
            Kpi::Min => min,
            Kpi::Max => max,
        }
    }

    pub fn apply(self, values: &[Value]) -> f64 {
        (self.reducer())(values)
    }
}

impl fmt::Display for Kpi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Kpi {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Kpi::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| format!("unknown KPI type: {s}"))
    }
}

/// Look up a KPI by wire name. Never fails: unknown names fall back to `count`.
pub fn resolve(name: &str) -> Outcome<Kpi> {
    match name.parse::<Kpi>() {
        Ok(kpi) => Outcome::clean(kpi),
        Err(msg) => Outcome::with(
            Kpi::Count,
            vec![Diagnostic::warning(format!("{msg}; falling back to count"))],
        ),
    }
}

fn sum(values: &[Value]) -> f64 {
    values.iter().map(Value::coerce).sum()
}

fn mean(values: &[Value]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        sum(values) / values.len() as f64
    }
}

fn count(values: &[Value]) -> f64 {
    values.len() as f64
}

fn distinct_count(values: &[Value]) -> f64 {
    values.iter().collect::<AHashSet<_>>().len() as f64
}

// Counted by string spelling, so `1` and `"1"` are the same key here.
fn duplicates(values: &[Value]) -> f64 {
    let mut counts: AHashMap<String, usize> = AHashMap::new();
    for v in values {
        *counts.entry(v.js_string()).or_default() += 1;
    }
    counts.values().filter(|&&c| c > 1).count() as f64
}

fn min(values: &[Value]) -> f64 {
    values.iter().map(Value::coerce).reduce(f64::min).unwrap_or(0.0)
}

fn max(values: &[Value]) -> f64 {
    values.iter().map(Value::coerce).reduce(f64::max).unwrap_or(0.0)
}
