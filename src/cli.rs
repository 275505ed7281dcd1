use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::schema::DEFAULT_SAMPLE_ROWS;

#[derive(Debug, Parser)]
#[command(author, version, about = "Generate SQL table scripts from CSV files", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Convert a CSV file into DROP/CREATE/INSERT statements
    Convert(ConvertArgs),
    /// Infer column types without generating statements
    Probe(ProbeArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ConvertArgs {
    /// Input CSV file to convert
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Output SQL file (defaults to the input path with a .sql extension, '-' for stdout)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Table name (defaults to the snake_cased input file name)
    #[arg(short = 't', long = "table")]
    pub table: Option<String>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Character encoding of the generated script (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
    /// Number of rows to sample when inferring types (0 means full scan)
    #[arg(long, default_value_t = DEFAULT_SAMPLE_ROWS)]
    pub sample_rows: usize,
    /// Maximum number of rows per INSERT statement
    #[arg(long = "batch-size", default_value_t = 1000)]
    pub batch_size: usize,
    /// Append an auto-increment `id` primary key column
    #[arg(long = "add-id")]
    pub add_id: bool,
    /// Column to declare as the table's primary key
    #[arg(long = "primary-key")]
    pub primary_key: Option<String>,
    /// Second CSV file whose rows provide foreign key ids
    #[arg(long = "fk-file")]
    pub fk_file: Option<PathBuf>,
    /// Column joining the input to the foreign key file
    #[arg(long = "fk-column")]
    pub fk_column: Option<String>,
    /// Delimiter of the foreign key file (defaults by file extension)
    #[arg(long = "fk-delimiter", value_parser = parse_delimiter)]
    pub fk_delimiter: Option<u8>,
    /// Comma-separated names of empty text columns to add to the table
    #[arg(long = "blank-columns", value_delimiter = ',')]
    pub blank_columns: Vec<String>,
    /// Comma-separated names of columns to force to text
    #[arg(long = "text-columns", value_delimiter = ',')]
    pub text_columns: Vec<String>,
    /// Column whose distinct values move into a separate lookup table
    #[arg(long = "lookup-column")]
    pub lookup_column: Option<String>,
    /// Emit DROP TABLE IF EXISTS before each CREATE TABLE
    #[arg(long = "drop-table")]
    pub drop_table: bool,
    /// Previously saved schema to use instead of inferring one
    #[arg(long = "schema")]
    pub schema: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct ProbeArgs {
    /// Input CSV file to inspect
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Save the inferred schema (.json for JSON, YAML otherwise) instead of printing it
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Number of rows to sample when inferring types (0 means full scan)
    #[arg(long, default_value_t = DEFAULT_SAMPLE_ROWS)]
    pub sample_rows: usize,
    /// Comma-separated names of columns to force to text
    #[arg(long = "text-columns", value_delimiter = ',')]
    pub text_columns: Vec<String>,
    /// Column whose values will be replaced by lookup ids
    #[arg(long = "lookup-column")]
    pub lookup_column: Option<String>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" | "\\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

/// Trims entries and drops empty ones from a comma-separated option.
pub fn clean_column_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_delimiter_accepts_names_and_characters() {
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter("pipe"), Ok(b'|'));
        assert_eq!(parse_delimiter(":"), Ok(b':'));
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter("ab").is_err());
        assert!(parse_delimiter("\u{e9}").is_err());
    }

    #[test]
    fn column_lists_are_split_and_cleaned() {
        let cli = Cli::parse_from([
            "csv-sqlgen",
            "convert",
            "-i",
            "in.csv",
            "--text-columns",
            "zip, phone,,",
            "--blank-columns",
            "notes",
        ]);
        let Commands::Convert(args) = cli.command else {
            panic!("expected convert command");
        };
        assert_eq!(clean_column_list(&args.text_columns), vec!["zip", "phone"]);
        assert_eq!(clean_column_list(&args.blank_columns), vec!["notes"]);
        assert_eq!(args.batch_size, 1000);
        assert_eq!(args.sample_rows, DEFAULT_SAMPLE_ROWS);
    }
}
