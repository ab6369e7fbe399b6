use std::fmt;

/// Reasons an upload could not be turned into a [`Table`](crate::record::Table)
///
/// None of these reach the user directly. Every variant is collapsed into the
/// "Error" dashboard state; the detail only shows up in the logs.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestError {
    /// File name does not end in `.csv` or `.xlsx`
    UnsupportedFormat(String),

    /// Data URI envelope, base64 body, CSV text or workbook bytes are broken
    MalformedPayload(String),

    /// An expected column is absent from the header row
    MissingColumn(String),

    /// A required cell is empty or cannot be converted to its field type
    InvalidValue {
        /// 1-based data row (the header is row 0)
        row: usize,
        column: String,
        value: String,
    },
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::UnsupportedFormat(name) => write!(f, "Unsupported file format: {}", name),
            IngestError::MalformedPayload(msg) => write!(f, "Malformed payload: {}", msg),
            IngestError::MissingColumn(col) => write!(f, "Missing column: {}", col),
            IngestError::InvalidValue { row, column, value } => write!(
                f,
                "Invalid value {:?} in column {} at row {}",
                value, column, row
            ),
        }
    }
}

impl std::error::Error for IngestError {}

impl From<base64::DecodeError> for IngestError {
    fn from(err: base64::DecodeError) -> Self {
        IngestError::MalformedPayload(format!("base64 decode error: {}", err))
    }
}

impl From<csv::Error> for IngestError {
    fn from(err: csv::Error) -> Self {
        IngestError::MalformedPayload(format!("CSV error: {}", err))
    }
}

impl From<calamine::XlsxError> for IngestError {
    fn from(err: calamine::XlsxError) -> Self {
        IngestError::MalformedPayload(format!("workbook error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
