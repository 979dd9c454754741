//! Display formatting for KPI values: fixed decimals, digit grouping, prefix/suffix.

use crate::diagnostics::{Diagnostic, Outcome};
use crate::models::{Settings, decimals_setting, text_setting};
use num_format::{CustomFormat, Grouping, Locale, ToFormattedString};
use serde::{Deserialize, Serialize};

/// Upper bound on fractional digits, the same range `Number.prototype.toFixed` accepts.
pub const MAX_DECIMALS: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatOptions {
    pub prefix: String,
    pub suffix: String,
    /// Inserted between groups of three integer digits.
    pub big_mark: String,
    pub decimal_mark: String,
    pub decimals: u32,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            suffix: String::new(),
            big_mark: " ".into(),
            decimal_mark: ".".into(),
            decimals: 0,
        }
    }
}

impl FormatOptions {
    /// Build from payload settings. An explicit non-empty `big_mark` wins over
    /// the locale's separator; an unknown locale tag is reported and ignored.
    pub fn from_settings(settings: &Settings) -> Outcome<Self> {
        let mut diags = Vec::new();
        let tag = text_setting(&settings.locale, "locale", &mut diags);
        let locale = tag.as_deref().and_then(|tag| {
            let found = map_locale(tag);
            if found.is_none() {
                diags.push(Diagnostic::warning(format!("unknown locale tag: {tag}")));
            }
            found
        });
        let mut opts = Self::default();
        if let Some(loc) = locale {
            opts.big_mark = loc.separator().to_string();
            opts.decimal_mark = loc.decimal().to_string();
        }
        if let Some(mark) =
            text_setting(&settings.big_mark, "big_mark", &mut diags).filter(|m| !m.is_empty())
        {
            opts.big_mark = mark;
        }
        opts.prefix = text_setting(&settings.prefix, "prefix", &mut diags).unwrap_or_default();
        opts.suffix = text_setting(&settings.suffix, "suffix", &mut diags).unwrap_or_default();
        if let Some(d) = decimals_setting(&settings.decimals, &mut diags) {
            if d > MAX_DECIMALS {
                diags.push(Diagnostic::warning(format!(
                    "decimals {d} exceeds {MAX_DECIMALS}; clamped"
                )));
            }
            opts.decimals = d.min(MAX_DECIMALS);
        }
        Outcome::with(opts, diags)
    }
}

/// Map a user-provided locale tag to a `num_format::Locale`.
///
/// Supported tags (case-insensitive): `en`, `us`, `en_US`, `de`, `de_DE`, `german`,
/// `fr`, `es`, `it`, `pt`, `nl`.
pub fn map_locale(tag: &str) -> Option<&'static Locale> {
    match tag.to_lowercase().replace('-', "_").as_str() {
        "en" | "us" | "en_us" | "english" => Some(&Locale::en),
        "de" | "de_de" | "german" => Some(&Locale::de),
        "fr" | "fr_fr" => Some(&Locale::fr),
        "es" | "es_es" => Some(&Locale::es),
        "it" | "it_it" => Some(&Locale::it),
        "pt" | "pt_pt" | "pt_br" => Some(&Locale::pt),
        "nl" | "nl_nl" => Some(&Locale::nl),
        _ => None,
    }
}

/// Render `value` for display. Non-finite values render as an empty string.
pub fn format_number(value: f64, opts: &FormatOptions) -> String {
    if !value.is_finite() {
        return String::new();
    }
    let fixed = to_fixed(value, opts.decimals.min(MAX_DECIMALS) as usize);
    let (sign, digits) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed.as_str()),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };

    let mut out = String::with_capacity(fixed.len() * 2 + opts.prefix.len() + opts.suffix.len());
    out.push_str(&opts.prefix);
    out.push_str(sign);
    out.push_str(&group_digits(int_part, &opts.big_mark));
    if let Some(frac) = frac_part {
        out.push_str(&opts.decimal_mark);
        out.push_str(frac);
    }
    out.push_str(&opts.suffix);
    out
}

// Round the exact binary value to `decimals` places like `toFixed`: exact
// ties go away from zero, everything else follows the true decimal expansion.
// Never yields "-0".
fn to_fixed(value: f64, decimals: usize) -> String {
    let abs = value.abs();
    let digits = if is_decimal_tie(abs, decimals) {
        // One more place is exact here and ends in the tie digit 5.
        let exact = format!("{abs:.prec$}", prec = decimals + 1);
        let kept = exact[..exact.len() - 1].trim_end_matches('.');
        increment_last_digit(kept)
    } else {
        format!("{abs:.decimals$}")
    };
    if value.is_sign_negative() && digits.bytes().any(|b| matches!(b, b'1'..=b'9')) {
        format!("-{digits}")
    } else {
        digits
    }
}

// True when `abs` has exactly `decimals + 1` fractional decimal digits, the
// last of which is then necessarily 5. A finite f64 `m * 2^-p` with odd `m`
// has exactly `p` fractional decimal digits.
fn is_decimal_tie(abs: f64, decimals: usize) -> bool {
    if abs == 0.0 || !abs.is_finite() {
        return false;
    }
    let bits = abs.to_bits();
    let biased = ((bits >> 52) & 0x7ff) as i64;
    let fraction = bits & ((1u64 << 52) - 1);
    let (mantissa, exp) = if biased == 0 {
        (fraction, -1074)
    } else {
        (fraction | (1u64 << 52), biased - 1075)
    };
    let exp = exp + i64::from(mantissa.trailing_zeros());
    exp < 0 && exp.unsigned_abs() == decimals as u64 + 1
}

// Add one unit in the last place of a plain decimal string, carrying left.
fn increment_last_digit(digits: &str) -> String {
    let mut bytes = digits.as_bytes().to_vec();
    for b in bytes.iter_mut().rev() {
        match *b {
            b'.' => continue,
            b'9' => *b = b'0',
            _ => {
                *b += 1;
                return String::from_utf8_lossy(&bytes).into_owned();
            }
        }
    }
    format!("1{}", String::from_utf8_lossy(&bytes))
}

/// Insert `mark` between groups of three digits, counting from the right.
fn group_digits(int_part: &str, mark: &str) -> String {
    let custom = CustomFormat::builder()
        .grouping(Grouping::Standard)
        .separator(mark)
        .build();
    match (int_part.parse::<u128>(), custom) {
        (Ok(n), Ok(fmt)) => n.to_formatted_string(&fmt),
        // Wider than u128, or a separator num-format rejects (over 8 bytes).
        _ => {
            let len = int_part.len();
            let mut out = String::with_capacity(len + mark.len() * (len / 3));
            for (i, ch) in int_part.chars().enumerate() {
                if i > 0 && (len - i) % 3 == 0 {
                    out.push_str(mark);
                }
                out.push(ch);
            }
            out
        }
    }
}
