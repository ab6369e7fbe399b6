use crate::error::{IngestError, Result};
use crate::record::{CellValue, Table};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

lazy_static! {
    static ref DATA_URI_REGEX: Regex =
        Regex::new(r"(?s)^data:([^,;]*)((?:;[^,;]+)*);base64,(.*)$").unwrap();
}

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A file as the browser hands it over
///
/// `contents` is the data URL produced by `FileReader.readAsDataURL`, e.g.
/// `data:text/csv;base64,UGFjaWVudGUg...`. The file name only picks the parser.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UploadedFile {
    pub contents: String,
    pub filename: String,
}

/// Parser selected from the file name
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Workbook,
    Unsupported,
}

impl FileFormat {
    /// Detects the format from the file suffix (`.csv` or `.xlsx`, any case)
    ///
    /// # Examples
    /// ```
    /// use clinic_dashboard::loader::FileFormat;
    ///
    /// assert_eq!(FileFormat::from_filename("visits.CSV"), FileFormat::Csv);
    /// assert_eq!(FileFormat::from_filename("visits.xlsx"), FileFormat::Workbook);
    /// assert_eq!(FileFormat::from_filename("data.txt"), FileFormat::Unsupported);
    /// ```
    pub fn from_filename(filename: &str) -> Self {
        let extension = std::path::Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());

        match extension.as_deref() {
            Some("csv") => FileFormat::Csv,
            Some("xlsx") => FileFormat::Workbook,
            _ => FileFormat::Unsupported,
        }
    }
}

/// Extracts the raw bytes from a base64 data URI
///
/// # Errors
/// * `MalformedPayload` when the `data:...;base64,` envelope is missing or
///   the body is not valid base64
pub fn decode_data_uri(contents: &str) -> Result<Vec<u8>> {
    let caps = DATA_URI_REGEX
        .captures(contents.trim())
        .ok_or_else(|| IngestError::MalformedPayload("expected a base64 data URI".to_string()))?;

    let body: String = caps[3].chars().filter(|c| !c.is_ascii_whitespace()).collect();
    Ok(STANDARD.decode(body)?)
}

/// Decodes and parses an upload into a table
///
/// The format is checked before anything is decoded, so an unsupported file
/// is reported as such even if its payload is garbage.
pub fn parse_contents(upload: &UploadedFile) -> Result<Table> {
    let format = FileFormat::from_filename(&upload.filename);
    if format == FileFormat::Unsupported {
        return Err(IngestError::UnsupportedFormat(upload.filename.clone()));
    }

    let bytes = decode_data_uri(&upload.contents)?;
    log::debug!("Decoded {} bytes from {}", bytes.len(), upload.filename);
    parse_bytes(format, &bytes)
}

/// Parses raw file bytes with the parser for `format`
pub fn parse_bytes(format: FileFormat, bytes: &[u8]) -> Result<Table> {
    match format {
        FileFormat::Csv => parse_csv(bytes),
        FileFormat::Workbook => parse_workbook(bytes),
        FileFormat::Unsupported => Err(IngestError::UnsupportedFormat("unknown".to_string())),
    }
}

/// Same as [`parse_bytes`] but picks the format from `filename`
pub fn parse_file(filename: &str, bytes: &[u8]) -> Result<Table> {
    match FileFormat::from_filename(filename) {
        FileFormat::Unsupported => Err(IngestError::UnsupportedFormat(filename.to_string())),
        format => parse_bytes(format, bytes),
    }
}

/// Parses comma-separated text whose first record is the header
pub fn parse_csv(bytes: &[u8]) -> Result<Table> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        CellValue::Empty
                    } else {
                        CellValue::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }

    log::debug!("CSV: {} columns, {} rows", headers.len(), rows.len());
    Table::from_rows(&headers, rows)
}

/// Parses the first worksheet of an `.xlsx` workbook whose first row is the header
pub fn parse_workbook(bytes: &[u8]) -> Result<Table> {
    use calamine::{Reader, Xlsx};

    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| IngestError::MalformedPayload("workbook has no worksheets".to_string()))??;

    let mut sheet_rows = range.rows();
    let headers: Vec<String> = match sheet_rows.next() {
        Some(row) => row.iter().map(|cell| cell.to_string()).collect(),
        None => return Err(IngestError::MalformedPayload("worksheet is empty".to_string())),
    };

    let rows: Vec<Vec<CellValue>> = sheet_rows
        .map(|row| row.iter().map(workbook_cell).collect::<Vec<_>>())
        .filter(|row| row.iter().any(|cell| *cell != CellValue::Empty))
        .collect();

    log::debug!("Workbook: {} columns, {} rows", headers.len(), rows.len());
    Table::from_rows(&headers, rows)
}

fn workbook_cell(cell: &calamine::Data) -> CellValue {
    use calamine::{Data, DataType};

    match cell {
        Data::Empty => CellValue::Empty,
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) | Data::DateTimeIso(s) => {
            if s.trim().is_empty() {
                CellValue::Empty
            } else {
                CellValue::Text(s.clone())
            }
        }
        Data::DateTime(_) => match cell.as_datetime() {
            Some(dt) => CellValue::DateTime(dt),
            None => CellValue::Text(cell.to_string()),
        },
        Data::Error(_) => CellValue::Empty,
        other => CellValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "Paciente ID,Doctor,Especialidad,Edad,Fecha,Consultas\n\
                       P1,Dr A,Cardio,40,2024-01-01,3\n\
                       P2,Dr A,Cardio,55,2024-01-02,5\n";

    fn data_uri(mime: &str, bytes: &[u8]) -> String {
        format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
    }

    #[test]
    fn decodes_data_uri_with_parameters() {
        let uri = format!("data:text/csv;charset=utf-8;base64,{}", STANDARD.encode("a,b"));
        assert_eq!(decode_data_uri(&uri).unwrap(), b"a,b");
    }

    #[test]
    fn decodes_data_uri_without_mime() {
        let uri = format!("data:;base64,{}", STANDARD.encode("hello"));
        assert_eq!(decode_data_uri(&uri).unwrap(), b"hello");
    }

    #[test]
    fn rejects_missing_envelope() {
        let err = decode_data_uri(&STANDARD.encode("a,b")).unwrap_err();
        assert!(matches!(err, IngestError::MalformedPayload(_)));
    }

    #[test]
    fn rejects_bad_base64() {
        let err = decode_data_uri("data:text/csv;base64,@@not base64@@").unwrap_err();
        assert!(matches!(err, IngestError::MalformedPayload(_)));
    }

    #[test]
    fn unsupported_suffix_wins_over_bad_payload() {
        let upload = UploadedFile {
            contents: "garbage".to_string(),
            filename: "data.txt".to_string(),
        };
        assert_eq!(
            parse_contents(&upload).unwrap_err(),
            IngestError::UnsupportedFormat("data.txt".to_string())
        );
    }

    #[test]
    fn parses_csv_upload() {
        let upload = UploadedFile {
            contents: data_uri("text/csv", CSV.as_bytes()),
            filename: "visits.csv".to_string(),
        };
        let table = parse_contents(&upload).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.records()[1].age, 55.0);
    }

    #[test]
    fn csv_with_bom_and_blank_lines() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(CSV.as_bytes());
        bytes.extend_from_slice(b",,,,,\n\n");
        let table = parse_csv(&bytes).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.records()[0].patient_id, "P1");
    }

    #[test]
    fn csv_missing_column() {
        let err = parse_csv(b"Paciente ID,Doctor\nP1,Dr A\n").unwrap_err();
        assert!(matches!(err, IngestError::MissingColumn(_)));
    }

    #[test]
    fn header_only_csv_is_an_empty_table() {
        let table = parse_csv(b"Paciente ID,Doctor,Especialidad,Edad,Fecha,Consultas\n").unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn invalid_workbook_bytes_are_malformed() {
        let err = parse_workbook(b"definitely not a zip archive").unwrap_err();
        assert!(matches!(err, IngestError::MalformedPayload(_)));
    }

    #[test]
    fn parse_file_dispatches_on_name() {
        assert!(parse_file("visits.csv", CSV.as_bytes()).is_ok());
        assert!(matches!(
            parse_file("visits.json", CSV.as_bytes()),
            Err(IngestError::UnsupportedFormat(_))
        ));
    }
}
