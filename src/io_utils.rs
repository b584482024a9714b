//! Fixture file locations and CSV reading/writing.
//!
//! - **Path resolution**: `{dir}/{file}.{csv|yml}` via [`fixture_path`].
//! - **Directories**: [`ensure_dir`] creates output directories recursively
//!   and is a no-op when they already exist.
//! - **CSV**: readers and writers built on the `csv` crate with standard
//!   quoting; null values are written as empty fields.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use csv::QuoteStyle;

use crate::{
    data::Value,
    error::{FixtureError, Result},
    filter::Record,
    registry::Format,
};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';

pub fn fixture_path(dir: &Path, file: &str, format: Format) -> PathBuf {
    dir.join(format!("{file}.{}", format.extension()))
}

pub fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() || dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|err| FixtureError::io(dir, err))
}

pub fn open_csv_reader<R>(reader: R, has_headers: bool) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(has_headers)
        .delimiter(DEFAULT_CSV_DELIMITER)
        .double_quote(true)
        .flexible(false);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(path: &Path) -> Result<csv::Reader<BufReader<File>>> {
    let file = File::open(path).map_err(|err| FixtureError::io(path, err))?;
    Ok(open_csv_reader(BufReader::new(file), true))
}

pub fn open_csv_writer(path: &Path) -> Result<csv::Writer<BufWriter<File>>> {
    let file = File::create(path).map_err(|err| FixtureError::io(path, err))?;
    Ok(csv_writer(BufWriter::new(file)))
}

pub fn csv_writer<W: Write>(writer: W) -> csv::Writer<W> {
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(DEFAULT_CSV_DELIMITER)
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true);
    builder.from_writer(writer)
}

pub fn reader_headers<R>(reader: &mut csv::Reader<R>) -> Result<Vec<String>>
where
    R: Read,
{
    Ok(reader.headers()?.iter().map(str::to_string).collect())
}

/// Reads a CSV fixture into its header and one raw record per line. Every
/// field is kept as a string; typing happens in the load filter.
pub fn read_csv_fixture(path: &Path) -> Result<(Vec<String>, Vec<Record>)> {
    let mut reader = open_csv_reader_from_path(path)?;
    let headers = reader_headers(&mut reader)?;
    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        records.push(
            headers
                .iter()
                .cloned()
                .zip(record.iter().map(Value::from))
                .collect(),
        );
    }
    Ok((headers, records))
}

pub fn csv_field(value: &Value) -> String {
    value.as_display()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn fixture_path_joins_dir_file_and_extension() {
        let path = fixture_path(Path::new("seeds"), "users", Format::Yaml);
        assert_eq!(path, PathBuf::from("seeds/users.yml"));
    }

    #[test]
    fn ensure_dir_is_recursive_and_idempotent() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        ensure_dir(&nested).unwrap();
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn csv_writer_quotes_only_when_needed() {
        let mut writer = csv_writer(Vec::new());
        writer.write_record(["1", "", "a,b", "x\ny"]).unwrap();
        let bytes = writer.into_inner().unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "1,,\"a,b\",\"x\ny\"\n");
    }
}
