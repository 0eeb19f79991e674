use thiserror::Error;

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("Required property \"{column}\" not found in the file.")]
    SchemaViolation { column: String },

    #[error("polling unit not found: {unit_id}")]
    PollingUnitNotFound { unit_id: String },

    #[error("insufficient registered voters: requested {requested}, available {available}")]
    InsufficientRecords { requested: usize, available: usize },

    #[error("source and destination polling units must differ")]
    SameUnit,

    #[error("unsupported file format: {file_name}")]
    UnsupportedFormat { file_name: String },

    #[error("no valid files in upload")]
    NoValidFiles,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::XlsxError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RosterError {
    pub fn code(&self) -> &'static str {
        match self {
            RosterError::SchemaViolation { .. } => "schema_violation",
            RosterError::PollingUnitNotFound { .. } => "not_found",
            RosterError::InsufficientRecords { .. } => "insufficient_records",
            RosterError::SameUnit => "bad_params",
            RosterError::UnsupportedFormat { .. } => "unsupported_format",
            RosterError::NoValidFiles => "no_valid_files",
            RosterError::Database(_) => "db_query_failed",
            RosterError::Io(_) => "io_failed",
            RosterError::Spreadsheet(_) | RosterError::Csv(_) => "parse_failed",
            RosterError::Other(_) => "internal",
        }
    }
}

pub type RosterResult<T> = Result<T, RosterError>;
