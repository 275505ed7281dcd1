//! Column type tags, per-value type inference, and reconciliation.
//!
//! [`SqlType`] is ordered from least to most specific; reconciling two
//! observations of the same column keeps whichever ranks higher, so a
//! column's final type is the maximum over every non-empty value sampled.

use std::{fmt, str::FromStr, sync::LazyLock};

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Width of the `VARCHAR` emitted for short-text columns and lookup values.
pub const SHORT_TEXT_WIDTH: usize = 255;

/// The declaration order is the specificity order used by [`reconcile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SqlType {
    Null,
    Int,
    Decimal,
    Date,
    DateTime,
    ShortText,
    LongText,
}

impl SqlType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlType::Null => "null",
            SqlType::Int => "int",
            SqlType::Decimal => "decimal",
            SqlType::Date => "date",
            SqlType::DateTime => "datetime",
            SqlType::ShortText => "short-text",
            SqlType::LongText => "long-text",
        }
    }

    /// Column type as written in a `CREATE TABLE` statement.
    pub fn sql_declaration(&self) -> String {
        match self {
            SqlType::Int => "INT".to_string(),
            SqlType::Decimal => "DECIMAL(18,6)".to_string(),
            SqlType::Date => "DATE".to_string(),
            SqlType::DateTime => "DATETIME".to_string(),
            SqlType::ShortText => format!("VARCHAR({SHORT_TEXT_WIDTH})"),
            SqlType::Null | SqlType::LongText => "TEXT".to_string(),
        }
    }

    /// Whether literal values of this type are wrapped in single quotes.
    pub fn is_quoted(&self) -> bool {
        matches!(
            self,
            SqlType::Date | SqlType::DateTime | SqlType::ShortText | SqlType::LongText
        )
    }

    pub fn variants() -> &'static [&'static str] {
        &[
            "null",
            "int",
            "decimal",
            "date",
            "datetime",
            "short-text",
            "long-text",
        ]
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SqlType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "null" => Ok(SqlType::Null),
            "int" | "integer" => Ok(SqlType::Int),
            "decimal" => Ok(SqlType::Decimal),
            "date" => Ok(SqlType::Date),
            "datetime" => Ok(SqlType::DateTime),
            "short-text" | "varchar" => Ok(SqlType::ShortText),
            "long-text" | "text" => Ok(SqlType::LongText),
            other => Err(anyhow!(
                "Unknown column type '{other}'. Supported types: {}",
                SqlType::variants().join(", ")
            )),
        }
    }
}

static NUMERIC_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-+]?(\d+\.?\d*|\.\d+)$").expect("valid numeric pattern"));

static DATE_PREFIX_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}").expect("valid date pattern"));

/// Naive layouts accepted as datetimes. Parsing is strict: the whole value
/// must be consumed.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.3f",
    "%d-%m-%Y %H:%M:%S%.3f",
    "%Y-%m-%d %H:%M:%SZ",
    "%Y/%m/%d %H:%M:%S%.3f",
    "%m/%d/%y %H:%M",
];

/// Offset-bearing layouts (`YYYY-MM-DD HH:mm:ss+hh:mm`).
const ZONED_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%z"];

/// Layout used by the encoder to normalize short US-style datetimes.
pub const SHORT_US_DATETIME_FORMAT: &str = "%m/%d/%y %H:%M";
pub const CANONICAL_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Treats whitespace-only values the same as empty ones.
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Classifies a single raw field value.
///
/// The checks form a priority cascade: numeric, then datetime, then a bare
/// `YYYY-MM-DD` prefix, and finally long text.
pub fn infer_type(value: &str) -> SqlType {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return SqlType::Null;
    }
    if let Some(numeric) = classify_numeric(trimmed) {
        return numeric;
    }
    if is_datetime(trimmed) {
        return SqlType::DateTime;
    }
    if DATE_PREFIX_PATTERN.is_match(trimmed) {
        return SqlType::Date;
    }
    SqlType::LongText
}

fn classify_numeric(value: &str) -> Option<SqlType> {
    if !NUMERIC_PATTERN.is_match(value) {
        return None;
    }
    // "0.0" is a sentinel for decimal columns, not integer zero.
    if value == "0.0" {
        return Some(SqlType::Decimal);
    }
    let negative = value.starts_with('-');
    let unsigned = value.trim_start_matches(['+', '-']);
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if fraction.bytes().any(|digit| digit != b'0') {
        return Some(SqlType::Decimal);
    }
    // Integral from here on; anything outside 32-bit INT is kept as text.
    let whole = whole.trim_start_matches('0');
    let magnitude = if whole.is_empty() { Some(0) } else { whole.parse::<i64>().ok() };
    let fits = magnitude
        .map(|magnitude| if negative { -magnitude } else { magnitude })
        .is_some_and(|number| i32::try_from(number).is_ok());
    Some(if fits { SqlType::Int } else { SqlType::ShortText })
}

pub fn is_datetime(value: &str) -> bool {
    NAIVE_DATETIME_FORMATS
        .iter()
        .any(|fmt| NaiveDateTime::parse_from_str(value, fmt).is_ok())
        || ZONED_DATETIME_FORMATS
            .iter()
            .any(|fmt| DateTime::parse_from_str(value, fmt).is_ok())
}

/// Merges a new observation into a column's current type, keeping the more
/// specific of the two. Callers must not pass observations of empty values.
pub fn reconcile(current: SqlType, observed: SqlType) -> SqlType {
    current.max(observed)
}

/// Rewrites `M/D/YY H:mm` values as `YYYY-MM-DD HH:mm:ss`; anything else is
/// returned unchanged.
pub fn reformat_datetime(value: &str) -> Option<String> {
    NaiveDateTime::parse_from_str(value.trim(), SHORT_US_DATETIME_FORMAT)
        .ok()
        .map(|parsed| parsed.format(CANONICAL_DATETIME_FORMAT).to_string())
}
