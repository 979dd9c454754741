use crate::aggregate::Comparison;
use crate::diagnostics::{Diagnostic, Outcome};
use crate::error::{KpiError, Result};
use crate::format::FormatOptions;
use crate::kpi::{self, Kpi};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::hash::{Hash, Hasher};

/// One raw cell as delivered by the host: a number, a string, a boolean, or null.
///
/// Equality and hashing are on the raw value (number `1` and text `"1"` differ),
/// with `0.0 == -0.0` and all NaNs equal so the type can key a hash map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Value {
    /// Numeric view used by sum/mean/min/max. Unparsable input is 0.
    pub fn coerce(&self) -> f64 {
        match self {
            Value::Number(n) if n.is_nan() => 0.0,
            Value::Number(n) => *n,
            Value::Text(s) => parse_leading_float(s),
            Value::Bool(_) | Value::Null => 0.0,
        }
    }

    /// JavaScript-style truthiness; used for group masks and the comparison setting.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Text(s) => !s.is_empty(),
        }
    }

    /// The value as JavaScript's `String(v)` spells it: `null`, `true`, `1`,
    /// `1.5`, `1e+21`, `NaN`. Values that print alike compare alike here even
    /// when their raw types differ.
    pub fn js_string(&self) -> String {
        match self {
            Value::Null => "null".into(),
            Value::Bool(b) => b.to_string(),
            Value::Text(s) => s.clone(),
            Value::Number(n) => js_number_string(*n),
        }
    }

    /// Interpret as an external row identifier (integer prefix, base 10).
    pub fn as_row_id(&self) -> Option<i64> {
        match self {
            Value::Number(n) if n.is_finite() => Some(n.trunc() as i64),
            Value::Text(s) => parse_leading_int(s),
            _ => None,
        }
    }
}

fn js_number_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".into();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.into();
    }
    if n == 0.0 {
        return "0".into();
    }
    let abs = n.abs();
    if (1e-6..1e21).contains(&abs) {
        return n.to_string();
    }
    // Exponent form carries an explicit sign: 1e+21, 1e-7.
    let exp = format!("{n:e}");
    match exp.split_once('e') {
        Some((mantissa, e)) if !e.starts_with('-') => format!("{mantissa}e+{e}"),
        _ => exp,
    }
}

// Canonical bit pattern: folds -0.0 into 0.0 and every NaN into one value.
fn canonical_bits(n: f64) -> u64 {
    if n == 0.0 {
        0.0f64.to_bits()
    } else if n.is_nan() {
        f64::NAN.to_bits()
    } else {
        n.to_bits()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => canonical_bits(*a) == canonical_bits(*b),
            (Value::Text(a), Value::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Number(n) => canonical_bits(*n).hash(state),
            Value::Text(s) => s.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<&JsonValue> for Value {
    /// Arrays and objects have no cell meaning; they become their JSON text.
    fn from(raw: &JsonValue) -> Self {
        match raw {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => n.as_f64().map_or(Value::Null, Value::Number),
            JsonValue::String(s) => Value::Text(s.clone()),
            other => Value::Text(other.to_string()),
        }
    }
}

/// Longest numeric prefix after leading whitespace, `0.0` if there is none.
/// `"12kg"` → 12, `" -3.5e2x"` → -350, `"abc"` → 0.
fn parse_leading_float(s: &str) -> f64 {
    let t = s.trim_start();
    let b = t.as_bytes();
    let mut end = 0;
    if matches!(b.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    if t[end..].starts_with("Infinity") {
        return if b[0] == b'-' { f64::NEG_INFINITY } else { f64::INFINITY };
    }
    let int_start = end;
    while end < b.len() && b[end].is_ascii_digit() {
        end += 1;
    }
    let mut mantissa = end - int_start;
    if end < b.len() && b[end] == b'.' {
        let mut e = end + 1;
        while e < b.len() && b[e].is_ascii_digit() {
            e += 1;
        }
        mantissa += e - end - 1;
        end = e;
    }
    if mantissa == 0 {
        return 0.0;
    }
    if end < b.len() && matches!(b[end], b'e' | b'E') {
        let mut e = end + 1;
        if e < b.len() && matches!(b[e], b'+' | b'-') {
            e += 1;
        }
        let digits = e;
        while e < b.len() && b[e].is_ascii_digit() {
            e += 1;
        }
        if e > digits {
            end = e;
        }
    }
    t[..end].parse::<f64>().unwrap_or(0.0)
}

fn parse_leading_int(s: &str) -> Option<i64> {
    let t = s.trim_start();
    let b = t.as_bytes();
    let mut end = usize::from(matches!(b.first(), Some(b'+' | b'-')));
    let start = end;
    while end < b.len() && b[end].is_ascii_digit() {
        end += 1;
    }
    if end == start {
        return None;
    }
    t[..end].parse::<i64>().ok()
}

/// Ordered column of raw values; position is the join key with group masks.
pub type DataSeries = Vec<Value>;

/// Row membership flags for one comparison group.
pub type GroupMask = Vec<bool>;

/// A payload column as it may arrive from the host: a JSON array, a JSON
/// document encoded inside a string, or an unboxed length-1 scalar. Any
/// other shape is kept as `Other` and reported during decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Column {
    Values(Vec<Value>),
    Encoded(String),
    Scalar(Value),
    Other(JsonValue),
}

impl Column {
    /// Normalise to a plain series. A string that does not parse as JSON is
    /// kept as a one-element text series, with an error diagnostic.
    pub fn decode(self, field: &str) -> Outcome<Vec<Value>> {
        match self {
            Column::Values(v) => Outcome::clean(v),
            Column::Scalar(v) => Outcome::clean(vec![v]),
            Column::Encoded(s) => {
                if let Ok(v) = serde_json::from_str::<Vec<Value>>(&s) {
                    return Outcome::clean(v);
                }
                match serde_json::from_str::<Value>(&s) {
                    Ok(Value::Null) => Outcome::clean(Vec::new()),
                    Ok(v) => Outcome::clean(vec![v]),
                    Err(e) => Outcome::with(
                        vec![Value::Text(s)],
                        vec![Diagnostic::error(format!("error parsing {field}: {e}"))],
                    ),
                }
            }
            Column::Other(raw) => Outcome::with(
                Vec::new(),
                vec![Diagnostic::error(format!("unsupported shape for {field}: {raw}"))],
            ),
        }
    }
}

fn decode_column(col: Option<Column>, field: &str, diags: &mut Vec<Diagnostic>) -> Vec<Value> {
    col.map(|c| c.decode(field).drain_into(diags)).unwrap_or_default()
}

/// Widget settings exactly as delivered. Fields stay untyped JSON so that a
/// wrong-typed value degrades to its default with a warning instead of
/// rejecting the payload; [`Settings::resolve`] does the typing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub kpi: JsonValue,
    /// `false`/absent/`"none"` disable comparison; `"ratio"` and `"share"` enable it.
    #[serde(default)]
    pub comparison: JsonValue,
    #[serde(default)]
    pub prefix: JsonValue,
    #[serde(default)]
    pub suffix: JsonValue,
    #[serde(default)]
    pub big_mark: JsonValue,
    /// Integer, float, or numeric string; rounded and clamped when resolved.
    #[serde(default)]
    pub decimals: JsonValue,
    #[serde(default)]
    pub crosstalk_group: JsonValue,
    /// Locale tag such as `"de"` selecting grouping/decimal marks.
    #[serde(default)]
    pub locale: JsonValue,
    /// Why the `settings` value itself was unusable, if it was.
    #[serde(skip)]
    pub malformed: Option<String>,
}

impl Settings {
    /// Resolve names and defaults into a typed configuration.
    pub fn resolve(&self) -> Outcome<WidgetConfig> {
        let mut diags = Vec::new();
        if let Some(why) = &self.malformed {
            diags.push(Diagnostic::warning(format!("ignoring settings: {why}")));
        }
        let kpi_name = text_setting(&self.kpi, "kpi", &mut diags);
        let kpi = kpi::resolve(kpi_name.as_deref().unwrap_or("")).drain_into(&mut diags);
        let comparison =
            Comparison::from_setting(&Value::from(&self.comparison)).drain_into(&mut diags);
        let format = FormatOptions::from_settings(self).drain_into(&mut diags);
        let filter_group = text_setting(&self.crosstalk_group, "crosstalk_group", &mut diags)
            .filter(|g| !g.is_empty());
        Outcome::with(WidgetConfig { kpi, comparison, format, filter_group }, diags)
    }
}

/// A string setting; `null` means unset, any other type is reported and unset.
pub(crate) fn text_setting(
    raw: &JsonValue,
    name: &str,
    diags: &mut Vec<Diagnostic>,
) -> Option<String> {
    match raw {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        other => {
            diags.push(Diagnostic::warning(format!(
                "setting {name} should be a string, got {other}; using the default"
            )));
            None
        }
    }
}

/// Decimal places from a JSON integer, float, or numeric string.
/// Negative values clamp to 0, fractional values are rounded.
pub(crate) fn decimals_setting(raw: &JsonValue, diags: &mut Vec<Diagnostic>) -> Option<u32> {
    let parsed = match raw {
        JsonValue::Null => return None,
        JsonValue::String(s) if s.trim().is_empty() => return None,
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        JsonValue::Number(n) => n.as_f64(),
        _ => None,
    };
    match parsed.filter(|v| v.is_finite()) {
        Some(v) => Some(v.round().clamp(0.0, u32::MAX as f64) as u32),
        None => {
            diags.push(Diagnostic::warning(format!(
                "setting decimals should be a number, got {raw}; using the default"
            )));
            None
        }
    }
}

/// Serde helper: never fails on the `settings` member; a non-object is
/// recorded in [`Settings::malformed`].
fn de_settings<'de, D>(deserializer: D) -> std::result::Result<Settings, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = JsonValue::deserialize(deserializer)?;
    if raw.is_null() {
        return Ok(Settings::default());
    }
    if !raw.is_object() {
        return Ok(Settings {
            malformed: Some(format!("expected an object, got {raw}")),
            ..Settings::default()
        });
    }
    Ok(serde_json::from_value(raw).unwrap_or_else(|e| Settings {
        malformed: Some(e.to_string()),
        ..Settings::default()
    }))
}

/// The inbound render payload, delivered once per widget render.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(default)]
    pub data: Option<Column>,
    #[serde(default)]
    pub group1_filter: Option<Column>,
    #[serde(default)]
    pub group2_filter: Option<Column>,
    #[serde(default)]
    pub key: Option<Column>,
    #[serde(default, deserialize_with = "de_settings")]
    pub settings: Settings,
}

impl Payload {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|source| KpiError::Decode { what: "payload", source })
    }

    /// Turn loosely-shaped host input into typed columns and a resolved config.
    pub fn decode(self) -> Outcome<WidgetInput> {
        let mut diags = Vec::new();
        let config = self.settings.resolve().drain_into(&mut diags);
        let data = decode_column(self.data, "data", &mut diags);
        let group1 = decode_column(self.group1_filter, "group1_filter", &mut diags)
            .iter()
            .map(Value::is_truthy)
            .collect();
        let group2 = decode_column(self.group2_filter, "group2_filter", &mut diags)
            .iter()
            .map(Value::is_truthy)
            .collect();
        let keys = decode_column(self.key, "key", &mut diags);
        Outcome::with(WidgetInput { data, group1, group2, keys, config }, diags)
    }
}

/// Typed settings after name resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetConfig {
    pub kpi: Kpi,
    /// `None` means plain (non-comparison) mode.
    pub comparison: Option<Comparison>,
    pub format: FormatOptions,
    pub filter_group: Option<String>,
}

impl WidgetConfig {
    pub fn new(kpi: Kpi, comparison: Option<Comparison>) -> Self {
        Self { kpi, comparison, format: FormatOptions::default(), filter_group: None }
    }
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self::new(Kpi::Count, None)
    }
}

/// Decoded payload ready to become a controller baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetInput {
    pub data: DataSeries,
    pub group1: GroupMask,
    pub group2: GroupMask,
    pub keys: Vec<Value>,
    pub config: WidgetConfig,
}

/// A filter-change notification from the selection channel.
///
/// `value` holds 1-based row identifiers; `None` or an empty list clears the filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionEvent {
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub value: Option<Vec<Value>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EventWire {
    Ids(Vec<Value>),
    Event(SelectionEvent),
    Clear(()),
}

impl SelectionEvent {
    pub fn select<I, V>(ids: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self { group: None, value: Some(ids.into_iter().map(Into::into).collect()) }
    }

    pub fn clear() -> Self {
        Self::default()
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Accepts `{"group":..,"value":[..]}`, a bare id array, or `null`.
    pub fn from_json(text: &str) -> Result<Self> {
        let wire: EventWire = serde_json::from_str(text)
            .map_err(|source| KpiError::Decode { what: "selection event", source })?;
        Ok(match wire {
            EventWire::Ids(ids) => Self { group: None, value: Some(ids) },
            EventWire::Event(ev) => ev,
            EventWire::Clear(()) => Self::clear(),
        })
    }

    /// Present and non-empty.
    pub fn is_filter(&self) -> bool {
        self.value.as_ref().is_some_and(|v| !v.is_empty())
    }
}
