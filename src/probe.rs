use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::{ProbeArgs, clean_column_list},
    io_utils,
    schema::{self, Schema, SchemaOverrides},
    table,
};

pub fn execute(args: &ProbeArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    info!(
        "Probing '{}' with delimiter '{}'",
        args.input.display(),
        crate::printable_delimiter(delimiter)
    );
    let overrides = SchemaOverrides {
        text_columns: clean_column_list(&args.text_columns),
        lookup_column: args.lookup_column.clone(),
        ..SchemaOverrides::default()
    };
    let schema =
        schema::infer_schema(&args.input, delimiter, encoding, args.sample_rows, &overrides)
            .with_context(|| format!("Inferring schema from {:?}", args.input))?;

    match &args.output {
        Some(path) => {
            schema
                .save(path)
                .with_context(|| format!("Writing schema to {path:?}"))?;
            info!(
                "Inferred schema for {} column(s) written to {path:?}",
                schema.columns.len()
            );
        }
        None => print!("{}", render_schema(&schema)),
    }
    Ok(())
}

pub fn render_schema(schema: &Schema) -> String {
    let rows: Vec<Vec<String>> = schema
        .columns
        .iter()
        .map(|column| {
            vec![
                column.name.clone(),
                column.datatype.to_string(),
                column.datatype.sql_declaration(),
            ]
        })
        .collect();
    table::render_table(&["column", "type", "sql"], &rows)
}
