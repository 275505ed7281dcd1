//! Text of the generated script: DROP/CREATE statements and batched INSERTs.
//!
//! Identifiers are backtick-quoted with embedded backticks doubled.

use itertools::Itertools;

use crate::{
    lookup::LookupTable,
    schema::{AUTO_ID_COLUMN, ColumnMeta, ColumnRole, Schema, normalize_column_name},
    types::SqlType,
};

pub const LOOKUP_VALUE_COLUMN: &str = "value";

/// Everything needed to render the final script for one run.
#[derive(Debug, Clone, Copy)]
pub struct ScriptPlan<'a> {
    pub table: &'a str,
    pub schema: &'a Schema,
    pub rows: &'a [String],
    pub lookup: Option<&'a LookupTable>,
    pub primary_key: Option<&'a str>,
    pub drop_table: bool,
    pub batch_size: usize,
}

pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

pub fn drop_table(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {};", quote_identifier(table))
}

/// `primary_key` names a source column to mark inline; it is ignored when it
/// names the auto-increment id or no column at all.
pub fn create_table(table: &str, schema: &Schema, primary_key: Option<&str>) -> String {
    let primary_key = primary_key
        .map(normalize_column_name)
        .filter(|name| name != AUTO_ID_COLUMN || !schema.has_role(ColumnRole::AutoIncrement));
    let explicit_key = primary_key.as_deref().and_then(|key| {
        schema
            .columns
            .iter()
            .find(|column| column.name == key && column.role != ColumnRole::AutoIncrement)
    });
    let definitions = schema
        .columns
        .iter()
        .map(|column| {
            let is_key = explicit_key.is_some_and(|key| std::ptr::eq(key, column));
            format!("  {}", column_definition(column, is_key, explicit_key.is_some()))
        })
        .join(",\n");
    format!(
        "CREATE TABLE {} (\n{definitions}\n);",
        quote_identifier(table)
    )
}

fn column_definition(column: &ColumnMeta, is_key: bool, has_explicit_key: bool) -> String {
    let name = quote_identifier(&column.name);
    match column.role {
        ColumnRole::AutoIncrement if has_explicit_key => {
            format!("{name} INT NOT NULL AUTO_INCREMENT UNIQUE")
        }
        ColumnRole::AutoIncrement => format!("{name} INT NOT NULL AUTO_INCREMENT PRIMARY KEY"),
        _ if is_key => format!("{name} {} PRIMARY KEY", column.datatype.sql_declaration()),
        _ => format!("{name} {}", column.datatype.sql_declaration()),
    }
}

pub fn create_lookup_table(table: &str) -> String {
    format!(
        "CREATE TABLE {} (\n  {} INT NOT NULL AUTO_INCREMENT PRIMARY KEY,\n  {} {}\n);",
        quote_identifier(table),
        quote_identifier(AUTO_ID_COLUMN),
        quote_identifier(LOOKUP_VALUE_COLUMN),
        SqlType::ShortText.sql_declaration()
    )
}

/// Splits `rows` into multi-row INSERTs of at most `batch_size` tuples each.
pub fn insert_statements<'c, I>(
    table: &str,
    columns: I,
    rows: &[String],
    batch_size: usize,
) -> Vec<String>
where
    I: IntoIterator<Item = &'c str>,
{
    let column_list = columns.into_iter().map(quote_identifier).join(", ");
    rows.chunks(batch_size.max(1))
        .map(|batch| {
            format!(
                "INSERT INTO {} ({column_list}) VALUES\n{};",
                quote_identifier(table),
                batch.join(",\n")
            )
        })
        .collect()
}

/// One INSERT per distinct lookup value, carrying its id explicitly.
pub fn lookup_inserts(lookup: &LookupTable) -> Vec<String> {
    let table = quote_identifier(lookup.table_name());
    let columns = format!(
        "{}, {}",
        quote_identifier(AUTO_ID_COLUMN),
        quote_identifier(LOOKUP_VALUE_COLUMN)
    );
    lookup
        .values()
        .iter()
        .enumerate()
        .map(|(idx, value)| {
            // Lookup values are stored already escaped.
            format!("INSERT INTO {table} ({columns}) VALUES ({}, '{value}');", idx + 1)
        })
        .collect()
}

/// Lookup DDL, main DDL, main INSERTs, then lookup INSERTs.
pub fn assemble(plan: &ScriptPlan<'_>) -> String {
    let mut statements = Vec::new();
    if let Some(lookup) = plan.lookup {
        if plan.drop_table {
            statements.push(drop_table(lookup.table_name()));
        }
        statements.push(create_lookup_table(lookup.table_name()));
    }
    if plan.drop_table {
        statements.push(drop_table(plan.table));
    }
    statements.push(create_table(plan.table, plan.schema, plan.primary_key));
    statements.extend(insert_statements(
        plan.table,
        plan.schema.insert_columns().map(|column| column.name.as_str()),
        plan.rows,
        plan.batch_size,
    ));
    if let Some(lookup) = plan.lookup {
        statements.extend(lookup_inserts(lookup));
    }
    let mut script = statements.join("\n\n");
    script.push('\n');
    script
}
