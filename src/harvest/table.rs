//! Persisted record table.
//!
//! The table is a UTF-8 comma-separated file accumulating one row per
//! processed listing. It is read once per run to collect the already-seen
//! URLs and written once to append the new batch. Rows written are
//! permanently considered "seen" by later runs. No locking; concurrent runs
//! are not supported.

use std::collections::{BTreeSet, HashSet};
use std::fs::OpenOptions;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

use crate::model::{keys, VacancyRecord};

/// Errors that can occur while reading or writing the record table.
#[derive(Error, Debug)]
pub enum TableError {
    /// Generic I/O failure on the table file.
    #[error("I/O error on record table: {0}")]
    Io(#[from] std::io::Error),

    /// The table could not be parsed or serialized as CSV.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Handle to the on-disk table.
pub struct RecordTable {
    path: PathBuf,
}

impl RecordTable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the set of values in the `URL` column.
    ///
    /// A missing file, an empty file and a header-only file all yield an
    /// empty set. A file whose header lacks a `URL` column contributes no
    /// seen URLs.
    ///
    /// # Errors
    ///
    /// Returns [`TableError`] if the file exists but cannot be read or
    /// parsed; this is fatal for the run.
    pub fn existing_urls(&self) -> Result<HashSet<String>, TableError> {
        let Some(header) = self.read_header()? else {
            return Ok(HashSet::new());
        };

        let mut urls = HashSet::new();
        let Some(url_column) = header.iter().position(|name| name == keys::URL) else {
            debug!(path = %self.path.display(), "Table has no URL column");
            return Ok(urls);
        };

        let mut reader = self.reader()?;
        for row in reader.records() {
            let row = row?;
            if let Some(value) = row.get(url_column) {
                if !value.is_empty() {
                    urls.insert(value.to_string());
                }
            }
        }

        Ok(urls)
    }

    /// Appends one batch of records.
    ///
    /// The batch's column set is the union of all records' keys, in sorted
    /// order. A fresh table gets a header row first. When the table already
    /// has a header that covers the batch, rows are appended aligned to that
    /// header. When the batch introduces new columns, the whole file is
    /// rewritten with the grown header and historical rows are backfilled
    /// with blanks.
    ///
    /// An empty batch is a no-op. No transactional guarantee: a crash
    /// mid-write can leave a partial batch.
    ///
    /// # Errors
    ///
    /// Returns [`TableError`] on any read, parse or write failure.
    pub fn append(&self, records: &[VacancyRecord]) -> Result<(), TableError> {
        if records.is_empty() {
            debug!(path = %self.path.display(), "No records to append");
            return Ok(());
        }

        let batch_columns: BTreeSet<&str> = records.iter().flat_map(VacancyRecord::keys).collect();

        match self.read_header()? {
            None => self.write_fresh(records, &batch_columns),
            Some(header) => {
                let new_columns: Vec<&str> = batch_columns
                    .iter()
                    .copied()
                    .filter(|c| !header.iter().any(|h| h == c))
                    .collect();

                if new_columns.is_empty() {
                    self.append_aligned(records, &header)
                } else {
                    self.rewrite_with_grown_header(records, &header, &new_columns)
                }
            }
        }
    }

    /// First-ever write: header row (union of the batch's keys) followed by
    /// the batch.
    fn write_fresh(
        &self,
        records: &[VacancyRecord],
        columns: &BTreeSet<&str>,
    ) -> Result<(), TableError> {
        let header: Vec<&str> = columns.iter().copied().collect();
        let mut writer = csv::Writer::from_path(&self.path)?;

        writer.write_record(&header)?;
        for record in records {
            writer.write_record(row_cells(record, &header))?;
        }
        writer.flush()?;

        info!(path = %self.path.display(), rows = records.len(), "Created record table");
        Ok(())
    }

    /// Appends rows aligned to the existing header. No header row is
    /// written; keys absent from a record render as empty cells.
    fn append_aligned(&self, records: &[VacancyRecord], header: &[String]) -> Result<(), TableError> {
        let columns: Vec<&str> = header.iter().map(String::as_str).collect();
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = csv::Writer::from_writer(file);

        for record in records {
            writer.write_record(row_cells(record, &columns))?;
        }
        writer.flush()?;

        info!(path = %self.path.display(), rows = records.len(), "Appended to record table");
        Ok(())
    }

    /// The batch introduced columns the existing header lacks: rewrite the
    /// file with the grown header (existing order first, new columns after)
    /// and backfill historical rows with blanks.
    fn rewrite_with_grown_header(
        &self,
        records: &[VacancyRecord],
        header: &[String],
        new_columns: &[&str],
    ) -> Result<(), TableError> {
        let mut existing_rows = Vec::new();
        {
            let mut reader = self.reader()?;
            for row in reader.records() {
                existing_rows.push(row?);
            }
        }

        let mut grown: Vec<&str> = header.iter().map(String::as_str).collect();
        grown.extend_from_slice(new_columns);

        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record(&grown)?;

        for row in &existing_rows {
            let mut cells: Vec<&str> = row.iter().collect();
            cells.resize(grown.len(), "");
            writer.write_record(&cells)?;
        }
        for record in records {
            writer.write_record(row_cells(record, &grown))?;
        }
        writer.flush()?;

        info!(
            path = %self.path.display(),
            rows = records.len(),
            new_columns = new_columns.len(),
            "Rewrote record table with grown header"
        );
        Ok(())
    }

    /// Reads the header row, or `None` when the file is missing or empty.
    fn read_header(&self) -> Result<Option<Vec<String>>, TableError> {
        if !self.path.exists() {
            return Ok(None);
        }
        if std::fs::metadata(&self.path)?.len() == 0 {
            return Ok(None);
        }

        let mut reader = self.reader()?;
        let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if header.is_empty() {
            return Ok(None);
        }
        Ok(Some(header))
    }

    /// Lenient reader: historical files may carry rows of varying width.
    fn reader(&self) -> Result<csv::Reader<std::fs::File>, TableError> {
        Ok(csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)?)
    }
}

/// Cells for one record in the given column order; absent keys are blank.
fn row_cells<'a>(record: &'a VacancyRecord, columns: &[&str]) -> Vec<&'a str> {
    columns
        .iter()
        .map(|column| record.get(column).unwrap_or(""))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_table(label: &str) -> (RecordTable, PathBuf) {
        let path = std::env::temp_dir().join(format!(
            "record_table_{}_{}_{}.csv",
            label,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .subsec_nanos()
        ));
        (RecordTable::new(&path), path)
    }

    fn record(pairs: &[(&str, &str)]) -> VacancyRecord {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_missing_file_yields_empty_set() {
        let (table, path) = temp_table("missing");
        assert!(table.existing_urls().unwrap().is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn test_header_only_file_yields_empty_set() {
        let (table, path) = temp_table("header_only");
        std::fs::write(&path, "Functienaam,URL\n").unwrap();

        assert!(table.existing_urls().unwrap().is_empty());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_fresh_write_has_union_header_and_input_order() {
        let (table, path) = temp_table("fresh");
        let records = vec![
            record(&[("URL", "https://example.test/1"), ("Functienaam", "Leerkracht")]),
            record(&[("URL", "https://example.test/2"), ("Plaatsnaam", "Utrecht")]),
        ];

        table.append(&records).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "Functienaam,Plaatsnaam,URL");
        assert_eq!(lines[1], "Leerkracht,,https://example.test/1");
        assert_eq!(lines[2], ",Utrecht,https://example.test/2");
        assert_eq!(lines.len(), 3);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_roundtrip_urls_are_seen() {
        let (table, path) = temp_table("roundtrip");
        table
            .append(&[record(&[("URL", "https://example.test/1")])])
            .unwrap();

        let urls = table.existing_urls().unwrap();
        assert_eq!(urls.len(), 1);
        assert!(urls.contains("https://example.test/1"));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_append_aligned_writes_no_second_header() {
        let (table, path) = temp_table("aligned");
        table
            .append(&[record(&[("URL", "https://example.test/1"), ("Functienaam", "A")])])
            .unwrap();
        table
            .append(&[record(&[("URL", "https://example.test/2")])])
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Functienaam,URL");
        assert_eq!(lines[2], ",https://example.test/2");

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_schema_growth_backfills_old_rows() {
        let (table, path) = temp_table("growth");
        table
            .append(&[record(&[("URL", "https://example.test/1")])])
            .unwrap();
        table
            .append(&[record(&[
                ("URL", "https://example.test/2"),
                ("Postcode", "1234 AB"),
            ])])
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "URL,Postcode");
        assert_eq!(lines[1], "https://example.test/1,");
        assert_eq!(lines[2], "https://example.test/2,1234 AB");

        let urls = table.existing_urls().unwrap();
        assert!(urls.contains("https://example.test/1"));
        assert!(urls.contains("https://example.test/2"));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_empty_batch_is_a_noop() {
        let (table, path) = temp_table("noop");
        table.append(&[]).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_table_without_url_column_yields_empty_set() {
        let (table, path) = temp_table("no_url_column");
        std::fs::write(&path, "Functienaam\nLeerkracht\n").unwrap();

        assert!(table.existing_urls().unwrap().is_empty());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_fields_needing_quotes_roundtrip() {
        let (table, path) = temp_table("quotes");
        table
            .append(&[record(&[
                ("URL", "https://example.test/1"),
                ("Functienaam", "Leerkracht, groep 5"),
            ])])
            .unwrap();

        let urls = table.existing_urls().unwrap();
        assert!(urls.contains("https://example.test/1"));

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"Leerkracht, groep 5\""));

        std::fs::remove_file(&path).ok();
    }
}
