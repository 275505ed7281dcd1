//! I/O helpers for reading delimited input and writing the generated script.
//!
//! - **Delimiter resolution**: extension-based defaults (`.tsv` → tab,
//!   anything else → comma) with manual override support.
//! - **Encoding**: input decoding and output encoding via `encoding_rs`,
//!   defaulting to UTF-8.
//! - **Paths**: the `.sql` output path is derived from the input path unless
//!   given explicitly; `-` routes output to stdout.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';
pub const SQL_EXTENSION: &str = "sql";

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

/// `data/orders.csv` → `data/orders.sql`.
pub fn derive_output_path(input: &Path) -> PathBuf {
    input.with_extension(SQL_EXTENSION)
}

/// Rows may be shorter or longer than the header; callers pad or truncate.
pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(path: &Path, delimiter: u8) -> Result<csv::Reader<Box<dyn Read>>> {
    let reader: Box<dyn Read> = if is_dash(path) {
        Box::new(io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        ))
    };
    Ok(open_csv_reader(reader, delimiter))
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

pub fn reader_headers<R>(
    reader: &mut csv::Reader<R>,
    encoding: &'static Encoding,
) -> Result<Vec<String>>
where
    R: Read,
{
    let headers = reader.byte_headers()?.clone();
    decode_record(&headers, encoding)
}

/// Pads `row` with empty fields, or truncates it, to exactly `width` fields.
pub fn fit_row(mut row: Vec<String>, width: usize) -> Vec<String> {
    row.resize(width, String::new());
    row
}

/// Writes `text` to `path` (stdout for `None` or `-`), transcoding from UTF-8
/// when a different output encoding was requested.
pub fn write_text(path: Option<&Path>, text: &str, encoding: &'static Encoding) -> Result<()> {
    let mut writer: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(io::stdout().lock()),
    };
    if encoding == UTF_8 {
        writer.write_all(text.as_bytes())?;
    } else {
        let (encoded, _, had_errors) = encoding.encode(text);
        if had_errors {
            return Err(anyhow!(
                "Failed to encode output using {}",
                encoding.name()
            ));
        }
        writer.write_all(encoded.as_ref())?;
    }
    writer.flush().context("Flushing output")
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1252;

    #[test]
    fn delimiter_defaults_follow_extension() {
        assert_eq!(resolve_input_delimiter(Path::new("a.tsv"), None), b'\t');
        assert_eq!(resolve_input_delimiter(Path::new("a.TSV"), None), b'\t');
        assert_eq!(resolve_input_delimiter(Path::new("a.csv"), None), b',');
        assert_eq!(resolve_input_delimiter(Path::new("a.tsv"), Some(b'|')), b'|');
    }

    #[test]
    fn output_path_swaps_extension() {
        assert_eq!(
            derive_output_path(Path::new("data/orders.csv")),
            PathBuf::from("data/orders.sql")
        );
        assert_eq!(
            derive_output_path(Path::new("orders")),
            PathBuf::from("orders.sql")
        );
    }

    #[test]
    fn fit_row_pads_and_truncates() {
        let short = fit_row(vec!["a".into()], 3);
        assert_eq!(short, vec!["a", "", ""]);
        let long = fit_row(vec!["a".into(), "b".into(), "c".into()], 2);
        assert_eq!(long, vec!["a", "b"]);
    }

    #[test]
    fn resolve_encoding_accepts_labels() {
        assert_eq!(resolve_encoding(None).unwrap(), UTF_8);
        assert_eq!(resolve_encoding(Some("windows-1252")).unwrap(), WINDOWS_1252);
        assert!(resolve_encoding(Some("klingon")).is_err());
    }

    #[test]
    fn decode_bytes_reports_invalid_input() {
        assert_eq!(decode_bytes("caf\u{e9}".as_bytes(), UTF_8).unwrap(), "caf\u{e9}");
        assert!(decode_bytes(&[0x63, 0xff, 0xfe], UTF_8).is_err());
        assert_eq!(decode_bytes(&[0x63, 0xe9], WINDOWS_1252).unwrap(), "c\u{e9}");
    }
}
