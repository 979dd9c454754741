//! Selection-aware KPI state: a baseline captured at render time, and the
//! currently active subset derived from filter events.
//!
//! ```text
//!   initialize(payload) ──► FULL ◄──── clear event ────┐
//!                            │                          │
//!                            └── non-empty event ──► FILTERED ──┐
//!                                                       ▲       │
//!                                                       └───────┘
//! ```
//!
//! Every transition re-aggregates, formats, and pushes the result to a
//! [`RenderSink`]. Events are handled one at a time to completion.

use crate::aggregate::aggregate;
use crate::diagnostics::Diagnostic;
use crate::format::format_number;
use crate::models::{DataSeries, GroupMask, Payload, SelectionEvent, Value, WidgetConfig};
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionState {
    /// No external selection; the whole baseline is active.
    Full,
    /// An explicit list of rows is active.
    Filtered,
}

/// Receives every newly formatted display string.
pub trait RenderSink {
    fn render(&mut self, display: &str);
}

impl RenderSink for Vec<String> {
    fn render(&mut self, display: &str) {
        self.push(display.to_string());
    }
}

/// Writes one line per render. Write failures are logged, not propagated.
pub struct WriterSink<W: Write> {
    writer: W,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RenderSink for WriterSink<W> {
    fn render(&mut self, display: &str) {
        if let Err(e) = writeln!(self.writer, "{display}").and_then(|_| self.writer.flush()) {
            log::error!("render sink write failed: {e}");
        }
    }
}

/// Data columns aligned by row position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rows {
    pub data: DataSeries,
    pub group1: GroupMask,
    pub group2: GroupMask,
}

impl Rows {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Gather rows by 1-based id, in the order given. Duplicate ids yield
    /// duplicate rows; ids that are not numeric or fall outside `1..=len` are
    /// skipped with one warning.
    pub fn gather(&self, ids: &[Value]) -> (Rows, Vec<Diagnostic>) {
        let mut out = Rows::default();
        let mut skipped = Vec::new();
        for id in ids {
            let idx = id
                .as_row_id()
                .and_then(|n| n.checked_sub(1))
                .and_then(|n| usize::try_from(n).ok())
                .filter(|&i| i < self.data.len());
            let Some(i) = idx else {
                skipped.push(id.to_string());
                continue;
            };
            out.data.push(self.data[i].clone());
            out.group1.push(self.group1.get(i).copied().unwrap_or(false));
            out.group2.push(self.group2.get(i).copied().unwrap_or(false));
        }
        let mut diags = Vec::new();
        if !skipped.is_empty() {
            let shown: Vec<_> = skipped.iter().take(5).map(String::as_str).collect();
            diags.push(Diagnostic::warning(format!(
                "ignored {} selection id(s) outside 1..={}: {}{}",
                skipped.len(),
                self.data.len(),
                shown.join(", "),
                if skipped.len() > shown.len() { ", ..." } else { "" }
            )));
        }
        (out, diags)
    }
}

/// What one recomputation produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Render {
    pub value: f64,
    pub text: String,
    pub state: SelectionState,
    pub rows: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Owns the baseline for one widget instance and keeps its display in sync
/// with selection events.
pub struct SelectionController<S: RenderSink> {
    sink: S,
    baseline: Rows,
    keys: Vec<Value>,
    config: WidgetConfig,
    state: SelectionState,
    display: String,
    last_diagnostics: Vec<Diagnostic>,
}

impl<S: RenderSink> SelectionController<S> {
    /// An empty controller; nothing is rendered until [`initialize`](Self::initialize).
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            baseline: Rows::default(),
            keys: Vec::new(),
            config: WidgetConfig::default(),
            state: SelectionState::Full,
            display: String::new(),
            last_diagnostics: Vec::new(),
        }
    }

    /// Replace the baseline wholesale and render over all rows.
    pub fn initialize(&mut self, payload: Payload) -> Render {
        let mut diags = Vec::new();
        let input = payload.decode().drain_into(&mut diags);
        let mut data = input.data;

        if input.config.comparison.is_some() && data.is_empty() {
            diags.push(Diagnostic::warning(
                "no data provided for comparison mode; defaulting to counts",
            ));
            if !input.group1.is_empty() {
                data = vec![Value::Number(1.0); input.group1.len()];
            }
        }
        if !input.keys.is_empty() && input.keys.len() != data.len() {
            diags.push(Diagnostic::warning(format!(
                "key has {} entries but data has {}",
                input.keys.len(),
                data.len()
            )));
        }

        self.baseline = Rows { data, group1: input.group1, group2: input.group2 };
        self.keys = input.keys;
        self.config = input.config;
        self.state = SelectionState::Full;
        log::debug!(
            "initialized: {} rows, kpi={}, comparison={:?}",
            self.baseline.len(),
            self.config.kpi,
            self.config.comparison
        );

        let rows = &self.baseline;
        let value =
            aggregate(&rows.data, &rows.group1, &rows.group2, &self.config).drain_into(&mut diags);
        let n = rows.len();
        self.publish(value, n, diags)
    }

    /// Apply one selection event. Returns `None` when the event belongs to a
    /// different filter group and was ignored.
    pub fn on_selection_event(&mut self, event: &SelectionEvent) -> Option<Render> {
        if let (Some(ours), Some(theirs)) = (&self.config.filter_group, &event.group)
            && ours != theirs
        {
            log::debug!("ignoring selection event for group {theirs:?}");
            self.last_diagnostics =
                vec![Diagnostic::info(format!("ignored event for filter group {theirs}"))];
            return None;
        }

        let mut diags = Vec::new();
        let render = match event.value.as_deref() {
            Some(ids) if !ids.is_empty() => {
                let (subset, skipped) = self.baseline.gather(ids);
                diags.extend(skipped);
                self.state = SelectionState::Filtered;
                let value = aggregate(&subset.data, &subset.group1, &subset.group2, &self.config)
                    .drain_into(&mut diags);
                self.publish(value, subset.len(), diags)
            }
            _ => {
                self.state = SelectionState::Full;
                let rows = &self.baseline;
                let value = aggregate(&rows.data, &rows.group1, &rows.group2, &self.config)
                    .drain_into(&mut diags);
                let n = rows.len();
                self.publish(value, n, diags)
            }
        };
        Some(render)
    }

    fn publish(&mut self, value: f64, rows: usize, diagnostics: Vec<Diagnostic>) -> Render {
        let text = format_number(value, &self.config.format);
        for d in &diagnostics {
            d.emit();
        }
        log::debug!("{:?} over {rows} rows: {value} -> {text:?}", self.state);
        self.sink.render(&text);
        self.display.clone_from(&text);
        self.last_diagnostics.clone_from(&diagnostics);
        Render { value, text, state: self.state, rows, diagnostics }
    }

    /// The last formatted string pushed to the sink.
    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    pub fn baseline(&self) -> &Rows {
        &self.baseline
    }

    /// Row identifiers from the payload `key` field, if any.
    pub fn keys(&self) -> &[Value] {
        &self.keys
    }

    /// Name of the selection channel this widget listens on.
    pub fn filter_group(&self) -> Option<&str> {
        self.config.filter_group.as_deref()
    }

    pub fn last_diagnostics(&self) -> &[Diagnostic] {
        &self.last_diagnostics
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Rows {
        Rows {
            data: vec![10.into(), 20.into(), 30.into()],
            group1: vec![true, false, true],
            group2: vec![true, true],
        }
    }

    #[test]
    fn gather_follows_id_order_and_keeps_duplicates() {
        let (sub, diags) = rows().gather(&[3.into(), "1".into(), 3.into()]);
        assert!(diags.is_empty());
        assert_eq!(sub.data, vec![Value::from(30), Value::from(10), Value::from(30)]);
        assert_eq!(sub.group1, vec![true, true, true]);
        // row 3 is past the end of the short group2 mask
        assert_eq!(sub.group2, vec![false, true, false]);
    }

    #[test]
    fn gather_skips_bad_ids_with_one_warning() {
        let (sub, diags) = rows().gather(&[0.into(), 2.into(), 4.into(), "x".into(), Value::Null]);
        assert_eq!(sub.data, vec![Value::from(20)]);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.starts_with("ignored 4 selection id(s) outside 1..=3"));
    }

    #[test]
    fn writer_sink_writes_lines() {
        let mut sink = WriterSink::new(Vec::new());
        sink.render("1 000");
        sink.render("");
        assert_eq!(String::from_utf8(sink.into_inner()).unwrap(), "1 000\n\n");
    }
}
