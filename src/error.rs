use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Table {table:?} is not in the archive")]
    MissingTable { table: String },

    #[error("Column {column:?} is missing from the header of {table:?}")]
    MissingColumn { table: String, column: String },

    #[error("No active service ids on {date}, check the calendar table and date format")]
    EmptyActiveServices { date: NaiveDate },

    #[error("No trips of the target lines run on {date} through the target stops")]
    NoQualifyingTrips { date: NaiveDate },

    #[error("No schedule data was generated for any day from {start} over {days} days")]
    EmptyWindow { start: NaiveDate, days: u32 },

    #[error("Schedule line {line_number} does not split into the expected fields: {line:?}")]
    MalformedLine { line_number: usize, line: String },

    #[error("Failed to read archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Failed to parse {table:?}: {source}")]
    Csv {
        table: String,
        #[source]
        source: csv::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Errors that only mean "nothing runs that day". The weekly composer skips the
    /// day instead of aborting.
    pub fn skips_day(&self) -> bool {
        matches!(
            self,
            PipelineError::EmptyActiveServices { .. } | PipelineError::NoQualifyingTrips { .. }
        )
    }

    pub fn csv(table: &str, source: csv::Error) -> Self {
        PipelineError::Csv {
            table: table.to_string(),
            source,
        }
    }
}
