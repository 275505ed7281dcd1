use std::borrow::Cow;

use itertools::Itertools;

use crate::{
    foreign_key::ForeignKeyMap,
    lookup::LookupTable,
    schema::{ColumnRole, Schema},
    types::{SqlType, is_blank, reformat_datetime},
};

pub const NULL_LITERAL: &str = "null";
/// Written for rows whose join value is absent from the foreign-key map.
pub const MISSING_FOREIGN_KEY: &str = "NULL";

/// Doubles every embedded single quote.
pub fn escape_text(value: &str) -> String {
    value.replace('\'', "''")
}

pub fn quote_text(value: &str) -> String {
    format!("'{}'", escape_text(value))
}

/// Renders one field as a SQL literal for a column of type `datatype`.
pub fn render_value(value: &str, datatype: SqlType) -> String {
    if is_blank(value) {
        NULL_LITERAL.to_string()
    } else if datatype.is_quoted() {
        quote_text(value)
    } else {
        value.trim().to_string()
    }
}

struct ForeignKeyJoin<'a> {
    column: usize,
    map: &'a ForeignKeyMap,
}

/// Turns source rows into SQL value tuples for a finalized schema. Holds the
/// per-run counters: the lookup table being built and the auto-increment id.
pub struct RowEncoder<'a> {
    schema: &'a Schema,
    source_width: usize,
    lookup: Option<(usize, LookupTable)>,
    foreign_key: Option<ForeignKeyJoin<'a>>,
    add_id: bool,
    next_id: u64,
}

impl<'a> RowEncoder<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            source_width: schema.source_column_count(),
            lookup: None,
            foreign_key: None,
            add_id: schema.has_role(ColumnRole::AutoIncrement),
            next_id: 0,
        }
    }

    /// Substitutes values of the source column at `column` with lookup ids.
    pub fn with_lookup(mut self, column: usize, table: LookupTable) -> Self {
        self.lookup = Some((column, table));
        self
    }

    /// Appends the foreign-key id resolved from the source column at `column`.
    pub fn with_foreign_key(mut self, column: usize, map: &'a ForeignKeyMap) -> Self {
        self.foreign_key = Some(ForeignKeyJoin { column, map });
        self
    }

    pub fn encode<S: AsRef<str>>(&mut self, row: &[S]) -> String {
        let schema = self.schema;
        let mut parts = Vec::with_capacity(self.source_width + 2);
        for (idx, column) in schema.source_columns().enumerate() {
            let raw = row.get(idx).map(|field| field.as_ref()).unwrap_or("");
            let rendered = match self.lookup.as_mut() {
                Some((lookup_idx, table)) if *lookup_idx == idx => {
                    if is_blank(raw) {
                        NULL_LITERAL.to_string()
                    } else {
                        table.assign(raw).to_string()
                    }
                }
                _ => {
                    let value = if column.datatype == SqlType::DateTime {
                        reformat_datetime(raw).map_or(Cow::Borrowed(raw), Cow::Owned)
                    } else {
                        Cow::Borrowed(raw)
                    };
                    render_value(&value, column.datatype)
                }
            };
            parts.push(rendered);
        }
        if self.add_id {
            self.next_id += 1;
            parts.push(self.next_id.to_string());
        }
        if let Some(join) = &self.foreign_key {
            let raw = row.get(join.column).map(|field| field.as_ref()).unwrap_or("");
            parts.push(
                join.map
                    .get(raw)
                    .map_or_else(|| MISSING_FOREIGN_KEY.to_string(), |id| id.to_string()),
            );
        }
        format!("({})", parts.iter().join(", "))
    }

    /// Hands back the lookup table once every row has been encoded.
    pub fn into_lookup(self) -> Option<LookupTable> {
        self.lookup.map(|(_, table)| table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnMeta, SchemaBuilder, SchemaOverrides};

    fn schema(columns: &[(&str, SqlType)]) -> Schema {
        Schema {
            columns: columns
                .iter()
                .map(|(name, ty)| ColumnMeta::source(*name, *ty))
                .collect(),
        }
    }

    #[test]
    fn escape_doubles_single_quotes_only() {
        assert_eq!(escape_text("it's"), "it''s");
        assert_eq!(quote_text("''"), "''''''");
        assert_eq!(quote_text("plain \"text\""), "'plain \"text\"'");
    }

    #[test]
    fn render_value_quotes_by_type() {
        assert_eq!(render_value("", SqlType::Int), "null");
        assert_eq!(render_value("  ", SqlType::LongText), "null");
        assert_eq!(render_value("42", SqlType::Int), "42");
        assert_eq!(render_value("4.2", SqlType::Decimal), "4.2");
        assert_eq!(render_value("2021-01-01", SqlType::Date), "'2021-01-01'");
        assert_eq!(render_value("O'Neil", SqlType::ShortText), "'O''Neil'");
    }

    #[test]
    fn encodes_plain_rows() {
        let schema = schema(&[("a", SqlType::Int), ("b", SqlType::DateTime)]);
        let mut encoder = RowEncoder::new(&schema);
        assert_eq!(
            encoder.encode(&["1", "2021-01-01 10:00:00"]),
            "(1, '2021-01-01 10:00:00')"
        );
        assert_eq!(encoder.encode(&["200", ""]), "(200, null)");
    }

    #[test]
    fn short_rows_render_missing_fields_as_null() {
        let schema = schema(&[("a", SqlType::Int), ("b", SqlType::LongText)]);
        let mut encoder = RowEncoder::new(&schema);
        assert_eq!(encoder.encode(&["7"]), "(7, null)");
    }

    #[test]
    fn datetime_columns_normalize_short_us_layout() {
        let schema = schema(&[("at", SqlType::DateTime)]);
        let mut encoder = RowEncoder::new(&schema);
        assert_eq!(encoder.encode(&["3/7/21 9:05"]), "('2021-03-07 09:05:00')");
        assert_eq!(encoder.encode(&["not a date"]), "('not a date')");
    }

    #[test]
    fn lookup_column_is_replaced_by_ids() {
        let schema = schema(&[("category", SqlType::Int), ("qty", SqlType::Int)]);
        let mut encoder =
            RowEncoder::new(&schema).with_lookup(0, LookupTable::new("items", "category"));
        let rows: Vec<String> = [["red", "1"], ["blue", "2"], ["red", "3"], ["", "4"]]
            .iter()
            .map(|row| encoder.encode(row))
            .collect();
        assert_eq!(rows, vec!["(1, 1)", "(2, 2)", "(1, 3)", "(null, 4)"]);
        let table = encoder.into_lookup().expect("lookup table");
        assert_eq!(table.values(), ["red", "blue"]);
    }

    #[test]
    fn generated_id_and_foreign_key_follow_fields() {
        let overrides = SchemaOverrides {
            add_id: true,
            foreign_key_column: Some("dept".into()),
            blank_columns: vec!["notes".into()],
            ..SchemaOverrides::default()
        };
        let headers = vec!["name".to_string(), "dept".to_string()];
        let mut builder = SchemaBuilder::new(&headers, &overrides, 0);
        builder.observe(&["ann", "ops"]);
        let schema = builder.finish(&overrides);

        let map: ForeignKeyMap = ["sales", "ops"].into_iter().collect();
        let mut encoder = RowEncoder::new(&schema).with_foreign_key(1, &map);
        assert_eq!(encoder.encode(&["ann", "ops"]), "('ann', 'ops', 1, 2)");
        assert_eq!(encoder.encode(&["bob", "legal"]), "('bob', 'legal', 2, NULL)");
    }
}
