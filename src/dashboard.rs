use crate::chart::{ChartSpec, SeriesPoint};
use crate::error::IngestError;
use crate::loader::{self, UploadedFile};
use crate::record::Table;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;

pub const PATIENTS_BY_SPECIALTY: &str = "Patients by Specialty";
pub const CONSULTATIONS_BY_DOCTOR: &str = "Consultations by Doctor";
pub const SPECIALTY_DISTRIBUTION: &str = "Specialty Distribution";
pub const AGE_DISTRIBUTION: &str = "Age Distribution";
pub const CONSULTATIONS_OVER_TIME: &str = "Consultations over Time";

/// A summary panel value
///
/// Serializes as the literal text `"N/A"` or `"Error"`, or as a JSON number.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Summary {
    NotAvailable,
    Error,
    Count(usize),
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Summary::NotAvailable => write!(f, "N/A"),
            Summary::Error => write!(f, "Error"),
            Summary::Count(n) => write!(f, "{}", n),
        }
    }
}

impl Serialize for Summary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Summary::Count(n) => serializer.serialize_u64(*n as u64),
            other => serializer.serialize_str(&other.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for Summary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Count(usize),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Count(n) => Ok(Summary::Count(n)),
            Raw::Text(s) if s == "N/A" => Ok(Summary::NotAvailable),
            Raw::Text(s) if s == "Error" => Ok(Summary::Error),
            Raw::Text(s) => Err(serde::de::Error::custom(format!("unknown summary value {:?}", s))),
        }
    }
}

/// Everything the page shows at once: two summary panels and five charts
///
/// All seven values always come from the same table, or are all placeholders.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DashboardState {
    pub patients: Summary,
    pub doctors: Summary,
    pub patients_by_specialty: ChartSpec,
    pub consultations_by_doctor: ChartSpec,
    pub specialty_distribution: ChartSpec,
    pub age_distribution: ChartSpec,
    pub consultations_over_time: ChartSpec,
}

impl DashboardState {
    fn placeholder(value: Summary) -> Self {
        DashboardState {
            patients: value,
            doctors: value,
            patients_by_specialty: ChartSpec::empty(),
            consultations_by_doctor: ChartSpec::empty(),
            specialty_distribution: ChartSpec::empty(),
            age_distribution: ChartSpec::empty(),
            consultations_over_time: ChartSpec::empty(),
        }
    }

    /// Nothing uploaded yet
    pub fn empty() -> Self {
        Self::placeholder(Summary::NotAvailable)
    }

    /// The upload could not be used
    pub fn error() -> Self {
        Self::placeholder(Summary::Error)
    }

    pub fn from_table(table: &Table) -> Self {
        let records = table.records();

        let patients: HashSet<&str> = records.iter().map(|r| r.patient_id.as_str()).collect();
        let doctors: HashSet<&str> = records.iter().map(|r| r.doctor.as_str()).collect();
        let ages: Vec<f64> = records.iter().map(|r| r.age).collect();

        DashboardState {
            patients: Summary::Count(patients.len()),
            doctors: Summary::Count(doctors.len()),
            patients_by_specialty: ChartSpec::bar(
                PATIENTS_BY_SPECIALTY,
                "Specialty",
                records.iter().map(|r| r.specialty.as_str()),
            ),
            consultations_by_doctor: ChartSpec::histogram(
                CONSULTATIONS_BY_DOCTOR,
                "Doctor",
                records.iter().map(|r| r.doctor.as_str()),
            ),
            specialty_distribution: ChartSpec::pie(
                SPECIALTY_DISTRIBUTION,
                records.iter().map(|r| r.specialty.as_str()),
            ),
            age_distribution: ChartSpec::box_plot(AGE_DISTRIBUTION, "Age", &ages),
            consultations_over_time: ChartSpec::line(
                CONSULTATIONS_OVER_TIME,
                "Date",
                "Consultations",
                records
                    .iter()
                    .map(|r| SeriesPoint {
                        x: r.date,
                        y: r.consultations,
                    })
                    .collect(),
            ),
        }
    }

    /// Maps an ingestion outcome to what the page shows
    ///
    /// Failures are logged and otherwise collapse to the "Error" state.
    pub fn from_ingestion(result: Result<Table, IngestError>) -> Self {
        match result {
            Ok(table) => {
                log::info!("Dashboard built from {} rows", table.len());
                Self::from_table(&table)
            }
            Err(e) => {
                log::warn!("Upload rejected: {}", e);
                Self::error()
            }
        }
    }

    /// The five charts in page order
    pub fn charts(&self) -> [(&'static str, &ChartSpec); 5] {
        [
            ("patients_by_specialty", &self.patients_by_specialty),
            ("consultations_by_doctor", &self.consultations_by_doctor),
            ("specialty_distribution", &self.specialty_distribution),
            ("age_distribution", &self.age_distribution),
            ("consultations_over_time", &self.consultations_over_time),
        ]
    }
}

/// Computes the dashboard for the current upload, if any
///
/// # Examples
/// ```
/// use clinic_dashboard::dashboard::{render, Summary};
///
/// let state = render(None);
/// assert_eq!(state.patients, Summary::NotAvailable);
/// assert!(state.charts().iter().all(|(_, c)| c.is_empty()));
/// ```
pub fn render(upload: Option<&UploadedFile>) -> DashboardState {
    match upload {
        None => DashboardState::empty(),
        Some(upload) => DashboardState::from_ingestion(loader::parse_contents(upload)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{CategoryCount, ChartData, ChartKind};
    use crate::record::VisitRecord;
    use chrono::NaiveDate;

    fn visit(patient: &str, doctor: &str, specialty: &str, age: f64, day: u32, consultations: f64) -> VisitRecord {
        VisitRecord {
            patient_id: patient.to_string(),
            doctor: doctor.to_string(),
            specialty: specialty.to_string(),
            age,
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            consultations,
        }
    }

    fn sample() -> Table {
        Table::from_records(vec![
            visit("P1", "Dr A", "Cardio", 40.0, 1, 3.0),
            visit("P2", "Dr A", "Cardio", 55.0, 2, 5.0),
            visit("P1", "Dr B", "Neuro", 40.0, 3, 2.0),
        ])
    }

    #[test]
    fn counts_distinct_patients_and_doctors() {
        let state = DashboardState::from_table(&sample());
        assert_eq!(state.patients, Summary::Count(2));
        assert_eq!(state.doctors, Summary::Count(2));
    }

    #[test]
    fn specialty_bar_chart() {
        let state = DashboardState::from_table(&sample());
        assert_eq!(state.patients_by_specialty.kind, ChartKind::Bar);
        assert_eq!(
            state.patients_by_specialty.data,
            ChartData::Categories(vec![
                CategoryCount { label: "Cardio".to_string(), count: 2 },
                CategoryCount { label: "Neuro".to_string(), count: 1 },
            ])
        );
    }

    #[test]
    fn line_chart_keeps_row_order() {
        let mut records = sample().records().to_vec();
        records.reverse();
        let state = DashboardState::from_table(&Table::from_records(records));

        let ChartData::Series(points) = &state.consultations_over_time.data else {
            panic!("expected a series");
        };
        let ys: Vec<f64> = points.iter().map(|p| p.y).collect();
        assert_eq!(ys, vec![2.0, 5.0, 3.0]);
    }

    #[test]
    fn counts_ignore_row_order() {
        let mut records = sample().records().to_vec();
        records.rotate_left(1);
        let state = DashboardState::from_table(&Table::from_records(records));
        assert_eq!(state.patients, Summary::Count(2));
        assert_eq!(state.doctors, Summary::Count(2));
    }

    #[test]
    fn all_charts_populated_from_same_table() {
        let state = DashboardState::from_table(&sample());
        assert!(state.charts().iter().all(|(_, c)| !c.is_empty()));
        assert_eq!(state.age_distribution.kind, ChartKind::Box);
        assert_eq!(state.specialty_distribution.kind, ChartKind::Pie);
        assert_eq!(state.consultations_by_doctor.kind, ChartKind::Histogram);
    }

    #[test]
    fn axis_labels_are_english() {
        let state = DashboardState::from_table(&sample());
        let labels: Vec<(&str, &str)> = state
            .charts()
            .iter()
            .map(|(_, c)| (c.x_label.as_str(), c.y_label.as_str()))
            .collect();
        assert_eq!(
            labels,
            vec![
                ("Specialty", "Count"),
                ("Doctor", "Count"),
                ("", ""),
                ("Age", ""),
                ("Date", "Consultations"),
            ]
        );
    }

    #[test]
    fn placeholder_states() {
        let empty = DashboardState::empty();
        assert_eq!((empty.patients, empty.doctors), (Summary::NotAvailable, Summary::NotAvailable));
        assert!(empty.charts().iter().all(|(_, c)| c.is_empty()));

        let error = DashboardState::error();
        assert_eq!((error.patients, error.doctors), (Summary::Error, Summary::Error));
        assert!(error.charts().iter().all(|(_, c)| c.is_empty()));
    }

    #[test]
    fn ingestion_failure_becomes_error_state() {
        let state = DashboardState::from_ingestion(Err(IngestError::MissingColumn("Edad".to_string())));
        assert_eq!(state, DashboardState::error());
    }

    #[test]
    fn summary_serialization() {
        assert_eq!(serde_json::to_string(&Summary::NotAvailable).unwrap(), "\"N/A\"");
        assert_eq!(serde_json::to_string(&Summary::Error).unwrap(), "\"Error\"");
        assert_eq!(serde_json::to_string(&Summary::Count(7)).unwrap(), "7");
        assert_eq!(serde_json::from_str::<Summary>("\"Error\"").unwrap(), Summary::Error);
        assert_eq!(serde_json::from_str::<Summary>("3").unwrap(), Summary::Count(3));
        assert!(serde_json::from_str::<Summary>("\"nope\"").is_err());
    }

    #[test]
    fn unsupported_upload_renders_error() {
        let upload = UploadedFile {
            contents: "data:text/plain;base64,aGVsbG8=".to_string(),
            filename: "data.txt".to_string(),
        };
        assert_eq!(render(Some(&upload)), DashboardState::error());
    }
}
