use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::{debug, info};

use crate::{
    cli::{ConvertArgs, clean_column_list},
    encoder::RowEncoder,
    error::ConfigError,
    foreign_key::{self, ForeignKeyMap},
    io_utils,
    lookup::LookupTable,
    schema::{self, AUTO_ID_COLUMN, ColumnRole, Schema, SchemaOverrides, normalize_column_name},
    statement::{ScriptPlan, assemble},
};

/// Second file providing surrogate ids for the join column.
#[derive(Debug, Clone)]
pub struct ForeignKeySource {
    pub path: PathBuf,
    pub column: String,
    pub delimiter: u8,
}

/// Validated settings for one conversion run.
#[derive(Debug, Clone)]
pub struct ConversionOptions {
    pub input: PathBuf,
    pub table: String,
    pub delimiter: u8,
    pub encoding: &'static Encoding,
    pub sample_rows: usize,
    pub batch_size: usize,
    pub primary_key: Option<String>,
    pub foreign_key: Option<ForeignKeySource>,
    pub overrides: SchemaOverrides,
    pub drop_table: bool,
    pub schema: Option<PathBuf>,
}

impl ConversionOptions {
    /// Builds run options with defaults for everything but the input path.
    pub fn new(input: impl Into<PathBuf>) -> Self {
        let input = input.into();
        Self {
            table: default_table_name(&input),
            delimiter: io_utils::resolve_input_delimiter(&input, None),
            input,
            encoding: encoding_rs::UTF_8,
            sample_rows: schema::DEFAULT_SAMPLE_ROWS,
            batch_size: 1000,
            primary_key: None,
            foreign_key: None,
            overrides: SchemaOverrides::default(),
            drop_table: false,
            schema: None,
        }
    }

    /// Checks option combinations; every failure here is a [`ConfigError`].
    pub fn from_args(args: &ConvertArgs) -> Result<Self> {
        let foreign_key = match (&args.fk_file, &args.fk_column) {
            (Some(path), Some(column)) => Some(ForeignKeySource {
                path: path.clone(),
                column: column.trim().to_string(),
                delimiter: io_utils::resolve_input_delimiter(path, args.fk_delimiter),
            }),
            (Some(path), None) => return Err(ConfigError::MissingJoinColumn(path.clone()).into()),
            (None, Some(column)) => return Err(ConfigError::MissingJoinFile(column.clone()).into()),
            (None, None) => None,
        };
        if args.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize.into());
        }
        if io_utils::is_dash(&args.input) {
            return Err(ConfigError::StdinInput.into());
        }

        let mut options = ConversionOptions::new(&args.input);
        if let Some(table) = args.table.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            options.table = table.to_string();
        }
        options.delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
        options.encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
        options.sample_rows = args.sample_rows;
        options.batch_size = args.batch_size;
        options.primary_key = args.primary_key.clone();
        options.overrides = SchemaOverrides {
            text_columns: clean_column_list(&args.text_columns),
            lookup_column: args.lookup_column.clone(),
            add_id: args.add_id,
            foreign_key_column: None,
            blank_columns: clean_column_list(&args.blank_columns),
        };
        options.foreign_key = foreign_key;
        options.drop_table = args.drop_table;
        options.schema = args.schema.clone();
        Ok(options)
    }

    /// Overrides handed to the schema stage. The foreign-key column always
    /// follows [`ConversionOptions::foreign_key`] so the appended `_fk`
    /// column and the encoded tuples agree.
    pub fn schema_overrides(&self) -> SchemaOverrides {
        SchemaOverrides {
            foreign_key_column: self.foreign_key.as_ref().map(|fk| fk.column.clone()),
            ..self.overrides.clone()
        }
    }

    fn generated_column_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if self.overrides.add_id {
            names.push(AUTO_ID_COLUMN.to_string());
        }
        if let Some(fk) = &self.foreign_key {
            names.push(schema::foreign_key_column_name(&fk.column));
        }
        names.extend(self.overrides.blank_columns.iter().map(|name| normalize_column_name(name)));
        names
    }
}

fn default_table_name(input: &Path) -> String {
    let stem = input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default();
    schema::table_name_from_stem(stem)
}

/// Result of a run: the finalized schema and the script text.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub schema: Schema,
    pub script: String,
    pub rows: usize,
    pub lookup_values: usize,
    pub duplicate_foreign_keys: usize,
}

/// Runs the pipeline: foreign-key pre-scan, schema analysis, row encoding,
/// and assembly. Each stage completes before the next starts.
pub fn convert(options: &ConversionOptions) -> Result<Conversion> {
    check_header(options)?;
    let foreign_keys = options
        .foreign_key
        .as_ref()
        .map(|fk| {
            foreign_key::resolve(&fk.path, &fk.column, fk.delimiter, options.encoding)
                .with_context(|| format!("Resolving foreign keys from {:?}", fk.path))
        })
        .transpose()?;

    let schema = analyze(options)?;
    let (rows, lookup) = encode_rows(options, &schema, foreign_keys.as_ref())?;

    let script = assemble(&ScriptPlan {
        table: &options.table,
        schema: &schema,
        rows: &rows,
        lookup: lookup.as_ref(),
        primary_key: options.primary_key.as_deref(),
        drop_table: options.drop_table,
        batch_size: options.batch_size,
    });
    Ok(Conversion {
        rows: rows.len(),
        lookup_values: lookup.as_ref().map_or(0, LookupTable::len),
        duplicate_foreign_keys: foreign_keys.as_ref().map_or(0, ForeignKeyMap::duplicates),
        schema,
        script,
    })
}

/// Validates the main file's header against the run options. Reads only the
/// header, so configuration errors surface before either file's rows are read.
fn check_header(options: &ConversionOptions) -> Result<()> {
    let mut reader = io_utils::open_csv_reader_from_path(&options.input, options.delimiter)?;
    let headers: HashSet<String> = io_utils::reader_headers(&mut reader, options.encoding)?
        .iter()
        .map(|name| normalize_column_name(name))
        .collect();

    let missing_join = options
        .foreign_key
        .as_ref()
        .filter(|fk| !headers.contains(&normalize_column_name(&fk.column)));
    if let Some(fk) = missing_join {
        return Err(ConfigError::JoinColumnNotFound {
            column: fk.column.clone(),
            path: options.input.clone(),
        }
        .into());
    }

    let mut generated = HashSet::new();
    for name in options.generated_column_names() {
        if headers.contains(&name) || !generated.insert(name.clone()) {
            return Err(ConfigError::DuplicateColumn(name).into());
        }
    }
    Ok(())
}

fn analyze(options: &ConversionOptions) -> Result<Schema> {
    let overrides = options.schema_overrides();
    let schema = match &options.schema {
        Some(path) => {
            let loaded = Schema::load(path)
                .with_context(|| format!("Loading schema from {path:?}"))?
                .apply_overrides(&overrides);
            let mut reader = io_utils::open_csv_reader_from_path(&options.input, options.delimiter)?;
            let headers = io_utils::reader_headers(&mut reader, options.encoding)?;
            let expected = loaded.source_column_count();
            if expected != headers.len() {
                return Err(ConfigError::SchemaMismatch {
                    expected,
                    actual: headers.len(),
                }
                .into());
            }
            loaded
        }
        None => schema::infer_schema(
            &options.input,
            options.delimiter,
            options.encoding,
            options.sample_rows,
            &overrides,
        )
        .with_context(|| format!("Inferring schema from {:?}", options.input))?,
    };
    debug!(
        "Schema for '{}': {}",
        options.table,
        schema
            .columns
            .iter()
            .map(|column| format!("{}:{}", column.name, column.datatype))
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(schema)
}

fn source_index(schema: &Schema, name: &str) -> Option<usize> {
    schema
        .column_index(name)
        .filter(|idx| schema.columns[*idx].role == ColumnRole::Source)
}

fn encode_rows(
    options: &ConversionOptions,
    schema: &Schema,
    foreign_keys: Option<&ForeignKeyMap>,
) -> Result<(Vec<String>, Option<LookupTable>)> {
    let mut encoder = RowEncoder::new(schema);
    if let Some(column) = options.overrides.lookup_column.as_deref() {
        match source_index(schema, column) {
            Some(idx) => {
                let name = &schema.columns[idx].name;
                encoder = encoder.with_lookup(idx, LookupTable::new(&options.table, name));
            }
            None => debug!("Lookup column '{column}' does not match any header; ignoring"),
        }
    }
    if let (Some(fk), Some(map)) = (&options.foreign_key, foreign_keys) {
        let idx = source_index(schema, &fk.column).ok_or_else(|| ConfigError::JoinColumnNotFound {
            column: fk.column.clone(),
            path: options.input.clone(),
        })?;
        encoder = encoder.with_foreign_key(idx, map);
    }

    let mut reader = io_utils::open_csv_reader_from_path(&options.input, options.delimiter)?;
    let _headers = io_utils::reader_headers(&mut reader, options.encoding)?;
    let width = schema.source_column_count();
    let mut rows = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", row_idx + 2))?;
        let decoded = io_utils::decode_record(&record, options.encoding)
            .with_context(|| format!("Decoding row {}", row_idx + 2))?;
        rows.push(encoder.encode(&io_utils::fit_row(decoded, width)));
    }
    debug!("Encoded {} row(s) from {:?}", rows.len(), options.input);
    Ok((rows, encoder.into_lookup()))
}

pub fn execute(args: &ConvertArgs) -> Result<()> {
    let options = ConversionOptions::from_args(args)?;
    let output_encoding = io_utils::resolve_encoding(args.output_encoding.as_deref())?;
    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| io_utils::derive_output_path(&args.input));
    info!(
        "Converting '{}' into table '{}' (delimiter '{}')",
        options.input.display(),
        options.table,
        crate::printable_delimiter(options.delimiter)
    );

    let conversion = convert(&options)?;
    io_utils::write_text(Some(output_path.as_path()), &conversion.script, output_encoding)
        .with_context(|| format!("Writing SQL to {output_path:?}"))?;
    info!(
        "Wrote {} row(s) across {} column(s) to {}",
        conversion.rows,
        conversion.schema.columns.len(),
        if io_utils::is_dash(&output_path) {
            "stdout".to_string()
        } else {
            format!("{output_path:?}")
        }
    );
    if conversion.lookup_values > 0 {
        info!("Lookup table holds {} distinct value(s)", conversion.lookup_values);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    use crate::cli::{Cli, Commands};

    fn convert_args(extra: &[&str]) -> ConvertArgs {
        let mut argv = vec!["csv-sqlgen", "convert", "-i", "data/Sales Data.csv"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Convert(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn defaults_derive_table_name_from_input() {
        let options = ConversionOptions::from_args(&convert_args(&[])).expect("options");
        assert_eq!(options.table, "sales_data");
        assert_eq!(options.delimiter, b',');
        assert!(options.foreign_key.is_none());
    }

    #[test]
    fn foreign_key_options_must_be_paired() {
        let err = ConversionOptions::from_args(&convert_args(&["--fk-file", "dept.csv"]))
            .expect_err("missing column");
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::MissingJoinColumn(PathBuf::from("dept.csv")))
        );

        let err = ConversionOptions::from_args(&convert_args(&["--fk-column", "dept"]))
            .expect_err("missing file");
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::MissingJoinFile("dept".into()))
        );
    }

    #[test]
    fn paired_foreign_key_options_extend_the_schema() {
        let options = ConversionOptions::from_args(&convert_args(&[
            "--fk-file",
            "dept.tsv",
            "--fk-column",
            "Dept",
        ]))
        .expect("options");
        assert_eq!(
            options.schema_overrides().foreign_key_column.as_deref(),
            Some("Dept")
        );
        let fk = options.foreign_key.expect("foreign key source");
        assert_eq!(fk.delimiter, b'\t');
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let err = ConversionOptions::from_args(&convert_args(&["--batch-size", "0"]))
            .expect_err("zero batch");
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::InvalidBatchSize)
        ));
    }
}
