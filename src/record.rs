use crate::error::{IngestError, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A raw cell as produced by the CSV or workbook parser, before typing
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    DateTime(NaiveDateTime),
}

impl CellValue {
    fn describe(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => format_number(*n),
            CellValue::DateTime(dt) => dt.to_string(),
        }
    }
}

/// One clinic visit, the typed form of a spreadsheet row
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct VisitRecord {
    pub patient_id: String,
    pub doctor: String,
    pub specialty: String,
    pub age: f64,
    pub date: NaiveDate,
    pub consultations: f64,
}

/// The six columns every upload has to carry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Patient,
    Doctor,
    Specialty,
    Age,
    Date,
    Consultations,
}

impl Field {
    /// Every field, in the order the clinic export lists them
    pub const ALL: [Field; 6] = [
        Field::Patient,
        Field::Doctor,
        Field::Specialty,
        Field::Age,
        Field::Date,
        Field::Consultations,
    ];

    /// Header name used by the clinic export, also used in error messages
    pub fn name(&self) -> &'static str {
        match self {
            Field::Patient => "Paciente ID",
            Field::Doctor => "Doctor",
            Field::Specialty => "Especialidad",
            Field::Age => "Edad",
            Field::Date => "Fecha",
            Field::Consultations => "Consultas",
        }
    }

    fn position(&self) -> usize {
        match self {
            Field::Patient => 0,
            Field::Doctor => 1,
            Field::Specialty => 2,
            Field::Age => 3,
            Field::Date => 4,
            Field::Consultations => 5,
        }
    }
}

/// Header names accepted for each field
///
/// Matching ignores case and surrounding whitespace. The defaults cover the
/// Spanish headers the clinic export uses plus plain English aliases.
#[derive(Clone, Debug)]
pub struct ColumnMap {
    aliases: [Vec<String>; 6],
}

impl Default for ColumnMap {
    fn default() -> Self {
        let to_vec = |names: &[&str]| names.iter().map(|n| n.to_string()).collect::<Vec<_>>();
        Self {
            aliases: [
                to_vec(&["Paciente ID", "Patient ID", "patient", "patient_id"]),
                to_vec(&["Doctor"]),
                to_vec(&["Especialidad", "Specialty"]),
                to_vec(&["Edad", "Age"]),
                to_vec(&["Fecha", "Date"]),
                to_vec(&["Consultas", "Consultations"]),
            ],
        }
    }
}

impl ColumnMap {
    /// Finds the index of every field in the header row
    ///
    /// # Arguments
    /// * `headers` - The header row as read from the file
    ///
    /// # Returns
    /// * `Ok(ColumnIndex)` - Position of each of the six fields
    /// * `Err(IngestError::MissingColumn)` - Naming the first field with no matching header
    pub fn resolve(&self, headers: &[String]) -> Result<ColumnIndex> {
        let mut positions = [0usize; 6];
        for field in Field::ALL {
            let aliases = &self.aliases[field.position()];
            positions[field.position()] = headers
                .iter()
                .position(|h| {
                    let h = h.trim();
                    aliases.iter().any(|a| a.eq_ignore_ascii_case(h))
                })
                .ok_or_else(|| IngestError::MissingColumn(field.name().to_string()))?;
        }
        Ok(ColumnIndex { positions })
    }
}

/// Resolved header positions for one upload
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnIndex {
    positions: [usize; 6],
}

impl ColumnIndex {
    /// Column position of `field` within a row
    pub fn get(&self, field: Field) -> usize {
        self.positions[field.position()]
    }
}

/// Visit records in source row order
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    records: Vec<VisitRecord>,
}

impl Table {
    /// Wraps records that are already typed, keeping their order
    pub fn from_records(records: Vec<VisitRecord>) -> Self {
        Table { records }
    }

    /// Types raw parser output
    ///
    /// Headers are matched against the default [`ColumnMap`]. Fails on the
    /// first row that does not supply all six fields, so nothing downstream
    /// ever sees a partial record.
    ///
    /// # Arguments
    /// * `headers` - The header row
    /// * `rows` - Data rows in file order, blank rows already removed
    ///
    /// # Returns
    /// * `Ok(Table)` - One record per row
    /// * `Err(IngestError)` - `MissingColumn` or `InvalidValue` with a 1-based row number
    pub fn from_rows(headers: &[String], rows: Vec<Vec<CellValue>>) -> Result<Self> {
        let index = ColumnMap::default().resolve(headers)?;
        let mut records = Vec::with_capacity(rows.len());

        for (i, row) in rows.iter().enumerate() {
            records.push(convert_row(i + 1, row, &index)?);
        }

        Ok(Table { records })
    }

    /// Records in source row order
    pub fn records(&self) -> &[VisitRecord] {
        &self.records
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

static EMPTY_CELL: CellValue = CellValue::Empty;

fn convert_row(row_no: usize, row: &[CellValue], index: &ColumnIndex) -> Result<VisitRecord> {
    let cell = |field: Field| row.get(index.get(field)).unwrap_or(&EMPTY_CELL);
    let invalid = |field: Field| IngestError::InvalidValue {
        row: row_no,
        column: field.name().to_string(),
        value: cell(field).describe(),
    };

    Ok(VisitRecord {
        patient_id: text_value(cell(Field::Patient)).ok_or_else(|| invalid(Field::Patient))?,
        doctor: text_value(cell(Field::Doctor)).ok_or_else(|| invalid(Field::Doctor))?,
        specialty: text_value(cell(Field::Specialty)).ok_or_else(|| invalid(Field::Specialty))?,
        age: number_value(cell(Field::Age)).ok_or_else(|| invalid(Field::Age))?,
        date: date_value(cell(Field::Date)).ok_or_else(|| invalid(Field::Date))?,
        consultations: number_value(cell(Field::Consultations))
            .ok_or_else(|| invalid(Field::Consultations))?,
    })
}

fn text_value(value: &CellValue) -> Option<String> {
    match value {
        CellValue::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        CellValue::Number(n) if n.is_finite() => Some(format_number(*n)),
        CellValue::DateTime(dt) => Some(dt.to_string()),
        _ => None,
    }
}

fn number_value(value: &CellValue) -> Option<f64> {
    let n = match value {
        CellValue::Number(n) => *n,
        CellValue::Text(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

fn date_value(value: &CellValue) -> Option<NaiveDate> {
    match value {
        CellValue::DateTime(dt) => Some(dt.date()),
        CellValue::Number(n) => excel_serial_to_date(*n),
        CellValue::Text(s) => {
            let s = s.trim();
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .or_else(|| {
                    DATETIME_FORMATS
                        .iter()
                        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                        .map(|dt| dt.date())
                })
        }
        CellValue::Empty => None,
    }
}

// Largest serial Excel accepts (9999-12-31)
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

// Excel's 1900-02-29, a day that never existed
const PHANTOM_LEAP_DAY: i64 = 60;

/// Converts an Excel serial day count to a date (1900 date system)
///
/// Serial 1 is 1900-01-01. Serial 60 is the 1900-02-29 Excel inherited
/// from Lotus 1-2-3 and has no real date, so it gives `None`. The time of
/// day carried in the fraction is dropped.
///
/// # Examples
/// ```
/// use chrono::NaiveDate;
/// use clinic_dashboard::record::excel_serial_to_date;
///
/// assert_eq!(excel_serial_to_date(1.0), NaiveDate::from_ymd_opt(1900, 1, 1));
/// assert_eq!(excel_serial_to_date(45292.0), NaiveDate::from_ymd_opt(2024, 1, 1));
/// ```
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(1.0..=MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }
    let days = serial.floor() as i64;
    let epoch = match days.cmp(&PHANTOM_LEAP_DAY) {
        std::cmp::Ordering::Less => NaiveDate::from_ymd_opt(1899, 12, 31)?,
        std::cmp::Ordering::Equal => return None,
        std::cmp::Ordering::Greater => NaiveDate::from_ymd_opt(1899, 12, 30)?,
    };
    epoch.checked_add_signed(Duration::days(days))
}

/// Formats a number the way a spreadsheet shows it: `101` rather than `101.0`
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
