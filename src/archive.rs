use csv::{ReaderBuilder, StringRecord};
use fs_err::File;
use serde::de::DeserializeOwned;
use std::path::Path;
use zip::ZipArchive;

use super::error::PipelineError;

/// A GTFS zip archive opened for the length of a run. Tables are read straight
/// out of the zip without extracting them.
pub struct GtfsArchive {
    zip: ZipArchive<File>,
    table_names: Vec<String>,
}

impl GtfsArchive {
    pub fn open(path: &Path) -> Result<Self, PipelineError> {
        let file = File::open(path)?;
        let zip = ZipArchive::new(file)?;
        let mut table_names: Vec<String> = zip.file_names().map(str::to_string).collect();
        table_names.sort();
        Ok(GtfsArchive { zip, table_names })
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.table_names.iter().any(|name| name == table)
    }

    /// First table (in name order) whose name contains `needle`.
    pub fn find_table_containing(&self, needle: &str) -> Option<&str> {
        self.table_names
            .iter()
            .find(|name| name.contains(needle))
            .map(String::as_str)
    }

    pub fn log_contents(&self) {
        log::debug!("Archive contents ({} files):", self.table_names.len());
        for name in self.table_names.iter() {
            log::debug!("  {name}");
        }
    }

    /// Streams the rows of `table` as typed records.
    ///
    /// The header row is normalised first (surrounding whitespace trimmed, a leading
    /// byte order mark stripped from the first column) and checked for every column
    /// in `required`, so a malformed table fails before the first row is read.
    pub fn rows<T: DeserializeOwned>(
        &mut self,
        table: &str,
        required: &[&str],
    ) -> Result<impl Iterator<Item = Result<T, PipelineError>>, PipelineError> {
        if !self.has_table(table) {
            return Err(PipelineError::MissingTable {
                table: table.to_string(),
            });
        }
        let file = self.zip.by_name(table)?;
        let mut reader = ReaderBuilder::new().flexible(true).from_reader(file);
        let raw_headers = reader
            .headers()
            .map_err(|e| PipelineError::csv(table, e))?;
        let headers = normalize_header(raw_headers);
        log::debug!("Cleaned header for {table}: {:?}", headers.iter().collect::<Vec<_>>());
        check_columns(table, &headers, required)?;
        reader.set_headers(headers);

        let table_name = table.to_string();
        Ok(reader
            .into_deserialize::<T>()
            .map(move |row| row.map_err(|e| PipelineError::csv(&table_name, e))))
    }

    pub fn read_table<T: DeserializeOwned>(
        &mut self,
        table: &str,
        required: &[&str],
    ) -> Result<Vec<T>, PipelineError> {
        self.rows(table, required)?.collect()
    }
}

pub fn normalize_header(header: &StringRecord) -> StringRecord {
    header
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let name = name.trim();
            if index == 0 {
                name.trim_start_matches('\u{feff}').trim()
            } else {
                name
            }
        })
        .collect()
}

fn check_columns(
    table: &str,
    headers: &StringRecord,
    required: &[&str],
) -> Result<(), PipelineError> {
    for column in required {
        if !headers.iter().any(|header| header == *column) {
            return Err(PipelineError::MissingColumn {
                table: table.to_string(),
                column: column.to_string(),
            });
        }
    }
    Ok(())
}
