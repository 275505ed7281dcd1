//! Column schema model, the sampling pass that infers it, and persistence.
//!
//! A [`Schema`] lists the source file's columns in header order followed by
//! any columns the run appends (auto-increment id, foreign key, blank
//! columns). Source columns always form a prefix, so the position of a
//! source column in the schema is also its field index in every row.
//!
//! ## Responsibilities
//!
//! - Header name normalization (case folding)
//! - Sampling a bounded prefix of rows through [`infer_type`] and [`reconcile`]
//! - Forced-text and lookup overrides, null defaulting, appended columns
//! - YAML/JSON loading and saving

use std::{collections::HashSet, fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use heck::ToSnakeCase;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    io_utils,
    types::{SqlType, infer_type, reconcile},
};

pub const DEFAULT_SAMPLE_ROWS: usize = 2000;
pub const AUTO_ID_COLUMN: &str = "id";
pub const FOREIGN_KEY_SUFFIX: &str = "_fk";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColumnRole {
    /// Read from the source file.
    #[default]
    Source,
    /// Generated `id` counter.
    AutoIncrement,
    /// Surrogate id resolved against the foreign-key file.
    ForeignKey,
    /// Declared in the table but never populated.
    Blank,
}

impl ColumnRole {
    fn is_source(&self) -> bool {
        matches!(self, ColumnRole::Source)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    pub datatype: SqlType,
    #[serde(default, skip_serializing_if = "ColumnRole::is_source")]
    pub role: ColumnRole,
}

impl ColumnMeta {
    pub fn source(name: impl Into<String>, datatype: SqlType) -> Self {
        Self {
            name: name.into(),
            datatype,
            role: ColumnRole::Source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<ColumnMeta>,
}

/// Options that pin or extend the inferred column types.
#[derive(Debug, Clone, Default)]
pub struct SchemaOverrides {
    pub text_columns: Vec<String>,
    pub lookup_column: Option<String>,
    pub add_id: bool,
    /// Join column whose `_fk` column is appended. A conversion run derives
    /// this from its foreign-key source.
    pub foreign_key_column: Option<String>,
    pub blank_columns: Vec<String>,
}

impl Schema {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let normalized = normalize_column_name(name);
        self.columns
            .iter()
            .position(|column| column.name == normalized)
    }

    pub fn source_columns(&self) -> impl Iterator<Item = &ColumnMeta> {
        self.columns
            .iter()
            .filter(|column| column.role == ColumnRole::Source)
    }

    pub fn source_column_count(&self) -> usize {
        self.source_columns().count()
    }

    pub fn has_role(&self, role: ColumnRole) -> bool {
        self.columns.iter().any(|column| column.role == role)
    }

    /// Columns that receive a value in every INSERT tuple, in tuple order.
    pub fn insert_columns(&self) -> impl Iterator<Item = &ColumnMeta> {
        self.columns
            .iter()
            .filter(|column| column.role != ColumnRole::Blank)
    }

    /// Drops previously appended columns and re-appends them from `overrides`,
    /// re-applying forced-text and lookup pins to the source columns.
    pub fn apply_overrides(mut self, overrides: &SchemaOverrides) -> Self {
        self.columns.retain(|column| column.role.is_source());
        let pinned = PinnedColumns::new(overrides);
        for column in &mut self.columns {
            if let Some(datatype) = pinned.type_for(&column.name) {
                column.datatype = datatype;
            }
        }
        self.append_generated_columns(overrides);
        self
    }

    fn append_generated_columns(&mut self, overrides: &SchemaOverrides) {
        if overrides.add_id {
            self.columns.push(ColumnMeta {
                name: AUTO_ID_COLUMN.to_string(),
                datatype: SqlType::Int,
                role: ColumnRole::AutoIncrement,
            });
        }
        if let Some(column) = overrides.foreign_key_column.as_deref() {
            self.columns.push(ColumnMeta {
                name: foreign_key_column_name(column),
                datatype: SqlType::Int,
                role: ColumnRole::ForeignKey,
            });
        }
        for blank in &overrides.blank_columns {
            self.columns.push(ColumnMeta {
                name: normalize_column_name(blank),
                datatype: SqlType::ShortText,
                role: ColumnRole::Blank,
            });
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating schema file {path:?}"))?;
        if is_json_path(path) {
            serde_json::to_writer_pretty(file, self).context("Writing schema JSON")
        } else {
            serde_yaml::to_writer(file, self).context("Writing schema YAML")
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening schema file {path:?}"))?;
        let reader = BufReader::new(file);
        let mut schema: Schema = if is_json_path(path) {
            serde_json::from_reader(reader).context("Parsing schema JSON")?
        } else {
            serde_yaml::from_reader(reader).context("Parsing schema YAML")?
        };
        for column in &mut schema.columns {
            column.name = normalize_column_name(&column.name);
        }
        Ok(schema)
    }
}

fn is_json_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Column names are matched case-insensitively and emitted lower-case.
pub fn normalize_column_name(name: &str) -> String {
    name.trim().to_lowercase()
}

pub fn foreign_key_column_name(column: &str) -> String {
    format!("{}{FOREIGN_KEY_SUFFIX}", normalize_column_name(column))
}

/// Derives a table name from a file stem, e.g. `Sales Report 2024` becomes
/// `sales_report_2024`.
pub fn table_name_from_stem(stem: &str) -> String {
    let name = stem.to_snake_case();
    if name.is_empty() {
        "data".to_string()
    } else {
        name
    }
}

struct PinnedColumns {
    text: HashSet<String>,
    lookup: Option<String>,
}

impl PinnedColumns {
    fn new(overrides: &SchemaOverrides) -> Self {
        Self {
            text: overrides
                .text_columns
                .iter()
                .map(|name| normalize_column_name(name))
                .filter(|name| !name.is_empty())
                .collect(),
            lookup: overrides
                .lookup_column
                .as_deref()
                .map(normalize_column_name),
        }
    }

    fn type_for(&self, column: &str) -> Option<SqlType> {
        if self.lookup.as_deref() == Some(column) {
            Some(SqlType::Int)
        } else if self.text.contains(column) {
            Some(SqlType::ShortText)
        } else {
            None
        }
    }
}

/// Accumulates per-column type observations over the sampled rows.
pub struct SchemaBuilder {
    names: Vec<String>,
    types: Vec<SqlType>,
    pinned: Vec<bool>,
    sample_rows: usize,
    rows_seen: usize,
}

impl SchemaBuilder {
    pub fn new(headers: &[String], overrides: &SchemaOverrides, sample_rows: usize) -> Self {
        let pins = PinnedColumns::new(overrides);
        let names: Vec<String> = headers.iter().map(|h| normalize_column_name(h)).collect();
        let mut types = Vec::with_capacity(names.len());
        let mut pinned = Vec::with_capacity(names.len());
        for name in &names {
            match pins.type_for(name) {
                Some(datatype) => {
                    types.push(datatype);
                    pinned.push(true);
                }
                None => {
                    types.push(SqlType::Null);
                    pinned.push(false);
                }
            }
        }
        for requested in pins.text.iter().chain(pins.lookup.iter()) {
            if !names.contains(requested) {
                debug!("Override column '{requested}' does not match any header; ignoring");
            }
        }
        Self {
            names,
            types,
            pinned,
            sample_rows,
            rows_seen: 0,
        }
    }

    /// Returns `false` once the sample cap has been reached; the caller should
    /// stop reading at that point.
    pub fn wants_more(&self) -> bool {
        self.sample_rows == 0 || self.rows_seen < self.sample_rows
    }

    pub fn observe<S: AsRef<str>>(&mut self, row: &[S]) {
        if !self.wants_more() {
            return;
        }
        for (idx, field) in row.iter().take(self.names.len()).enumerate() {
            let value = field.as_ref();
            if self.pinned[idx] || value.trim().is_empty() {
                continue;
            }
            self.types[idx] = reconcile(self.types[idx], infer_type(value));
        }
        self.rows_seen += 1;
    }

    pub fn rows_seen(&self) -> usize {
        self.rows_seen
    }

    pub fn finish(self, overrides: &SchemaOverrides) -> Schema {
        let columns = self
            .names
            .into_iter()
            .zip(self.types)
            .map(|(name, datatype)| {
                let datatype = match datatype {
                    SqlType::Null => SqlType::LongText,
                    other => other,
                };
                ColumnMeta::source(name, datatype)
            })
            .collect();
        let mut schema = Schema { columns };
        schema.append_generated_columns(overrides);
        schema
    }
}

/// Runs the analysis pass over at most `sample_rows` data rows of `path`
/// (`0` scans the whole file). The reader is dropped as soon as the cap is hit.
pub fn infer_schema(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
    sample_rows: usize,
    overrides: &SchemaOverrides,
) -> Result<Schema> {
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
    let headers = io_utils::reader_headers(&mut reader, encoding)?;
    let mut builder = SchemaBuilder::new(&headers, overrides, sample_rows);

    let mut record = csv::ByteRecord::new();
    while builder.wants_more() && reader.read_byte_record(&mut record)? {
        let decoded = io_utils::decode_record(&record, encoding)
            .with_context(|| format!("Decoding row {} of {path:?}", builder.rows_seen() + 2))?;
        builder.observe(&decoded);
    }
    drop(reader);
    debug!(
        "Sampled {} row(s) across {} column(s) of {path:?}",
        builder.rows_seen(),
        headers.len()
    );
    Ok(builder.finish(overrides))
}
