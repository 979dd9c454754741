//! kpiwidget
//!
//! Compute a single key-performance indicator from a data column, optionally
//! compare two row groups as a ratio or share, format the result for display,
//! and keep it in sync with an external row selection. Pairs with the `kpi` CLI.
//!
//! ### Pipeline
//! - [`models`]: decode the host payload into typed columns and settings
//! - [`kpi`]: named reductions (`sum`, `mean`, `count`, `distinctCount`, …)
//! - [`aggregate`]: plain or two-group aggregation
//! - [`format`]: fixed decimals, digit grouping, prefix/suffix
//! - [`controller`]: baseline + selection events → rendered string
//!
//! ### Example
//! ```
//! use kpiwidget::{Payload, SelectionController, SelectionEvent};
//!
//! let payload = Payload::from_json(
//!     r#"{"data":[10,20,30],"settings":{"kpi":"sum","big_mark":","}}"#,
//! )?;
//! let mut widget = SelectionController::new(Vec::<String>::new());
//! widget.initialize(payload);
//! assert_eq!(widget.display(), "60");
//!
//! widget.on_selection_event(&SelectionEvent::select([2, 3]));
//! assert_eq!(widget.display(), "50");
//!
//! widget.on_selection_event(&SelectionEvent::clear());
//! assert_eq!(widget.sink(), &["60", "50", "60"]);
//! # Ok::<(), kpiwidget::KpiError>(())
//! ```

pub mod aggregate;
pub mod controller;
pub mod diagnostics;
pub mod error;
pub mod format;
pub mod kpi;
pub mod models;

pub use aggregate::{Comparison, aggregate};
pub use controller::{Render, RenderSink, SelectionController, SelectionState, WriterSink};
pub use diagnostics::{Diagnostic, Outcome, Severity};
pub use error::KpiError;
pub use format::{FormatOptions, format_number};
pub use kpi::Kpi;
pub use models::{Payload, SelectionEvent, Settings, Value, WidgetConfig};
