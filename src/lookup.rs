use std::collections::HashMap;

use crate::encoder::escape_text;

/// Distinct values of the lookup column, each mapped to a dense surrogate id
/// in first-seen order starting at 1.
#[derive(Debug, Clone)]
pub struct LookupTable {
    table_name: String,
    ids: HashMap<String, u64>,
    values: Vec<String>,
}

impl LookupTable {
    pub fn new(table: &str, column: &str) -> Self {
        Self {
            table_name: lookup_table_name(table, column),
            ids: HashMap::new(),
            values: Vec::new(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Returns the id for `value`, allocating the next one on first sight.
    /// Values are trimmed and quote-escaped before they are keyed.
    pub fn assign(&mut self, value: &str) -> u64 {
        let key = escape_text(value.trim());
        if let Some(id) = self.ids.get(&key) {
            return *id;
        }
        self.values.push(key.clone());
        let id = self.values.len() as u64;
        self.ids.insert(key, id);
        id
    }

    pub fn get(&self, value: &str) -> Option<u64> {
        self.ids.get(&escape_text(value.trim())).copied()
    }

    /// Escaped values in id order; the value at index `i` has id `i + 1`.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// `<table>_<column>_lookup`.
pub fn lookup_table_name(table: &str, column: &str) -> String {
    format!("{table}_{column}_lookup")
}
