use std::{collections::HashMap, path::Path};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::{info, warn};

use crate::{error::ConfigError, io_utils, schema::normalize_column_name};

/// Join-column values of the foreign-key file mapped to the 1-based row
/// number they were last seen on.
#[derive(Debug, Clone, Default)]
pub struct ForeignKeyMap {
    ids: HashMap<String, u64>,
    rows: u64,
    duplicates: usize,
}

impl ForeignKeyMap {
    /// Records the next row's join value. A repeated value takes the newer
    /// row number and is reported as a duplicate.
    pub fn insert(&mut self, value: &str) {
        self.rows += 1;
        if self.ids.insert(value.to_string(), self.rows).is_some() {
            self.duplicates += 1;
            warn!(
                "Duplicate foreign key value '{value}' at row {}; keeping the later row",
                self.rows
            );
        }
    }

    pub fn get(&self, value: &str) -> Option<u64> {
        self.ids.get(value).copied()
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for ForeignKeyMap {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut map = ForeignKeyMap::default();
        for value in iter {
            map.insert(value.as_ref());
        }
        map
    }
}

/// Scans `path` once and maps every value of `join_column` to its row number.
pub fn resolve(
    path: &Path,
    join_column: &str,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<ForeignKeyMap> {
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
    let headers = io_utils::reader_headers(&mut reader, encoding)?;
    let wanted = normalize_column_name(join_column);
    let column_index = headers
        .iter()
        .position(|header| normalize_column_name(header) == wanted)
        .ok_or_else(|| ConfigError::JoinColumnNotFound {
            column: join_column.to_string(),
            path: path.to_path_buf(),
        })?;

    let mut map = ForeignKeyMap::default();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {} of {path:?}", row_idx + 2))?;
        let raw = record.get(column_index).unwrap_or_default();
        let value = io_utils::decode_bytes(raw, encoding)
            .with_context(|| format!("Decoding row {} of {path:?}", row_idx + 2))?;
        map.insert(&value);
    }
    info!(
        "Resolved {} foreign key value(s) from {} row(s) of {path:?} ({} duplicate(s))",
        map.len(),
        map.rows(),
        map.duplicates()
    );
    Ok(map)
}
