use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of chart a specification asks the renderer to draw
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    /// Blank axes, used for the placeholder states
    Scatter,

    /// One bar per category
    Bar,

    /// Row counts per category, drawn as adjacent bins
    Histogram,

    /// Share of rows per category
    Pie,

    /// Box-and-whisker summary of a numeric column
    Box,

    /// Connected points in row order
    Line,
}

/// Number of rows carrying one category label
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CategoryCount {
    pub label: String,
    pub count: usize,
}

/// One pie slice
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Slice {
    pub label: String,
    /// Rows carrying `label`
    pub count: usize,
    /// Share of all rows, in `0.0..=1.0`
    pub fraction: f64,
}

/// Five-number summary plus whiskers and outliers
///
/// Quartiles are linearly interpolated between order statistics. Whiskers
/// reach the furthest values within 1.5 IQR of the box; anything beyond is
/// listed in `outliers`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BoxSummary {
    pub count: usize,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub lower_whisker: f64,
    pub upper_whisker: f64,
    pub outliers: Vec<f64>,
}

impl BoxSummary {
    /// Returns `None` for an empty or non-finite sample
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() || values.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let q1 = quantile(&sorted, 0.25);
        let median = quantile(&sorted, 0.5);
        let q3 = quantile(&sorted, 0.75);
        let iqr = q3 - q1;
        let (lo_fence, hi_fence) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);

        let inside = || sorted.iter().copied().filter(|v| *v >= lo_fence && *v <= hi_fence);
        let lower_whisker = inside().next().unwrap_or(q1);
        let upper_whisker = inside().last().unwrap_or(q3);

        Some(BoxSummary {
            count: sorted.len(),
            min: sorted[0],
            q1,
            median,
            q3,
            max: sorted[sorted.len() - 1],
            lower_whisker,
            upper_whisker,
            outliers: sorted
                .iter()
                .copied()
                .filter(|v| *v < lo_fence || *v > hi_fence)
                .collect(),
        })
    }
}

// `sorted` must be non-empty and ascending
fn quantile(sorted: &[f64], p: f64) -> f64 {
    let pos = p * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// A point on the line chart: the visit date and its consultation count
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SeriesPoint {
    pub x: NaiveDate,
    pub y: f64,
}

/// The data a chart is drawn from
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "values", rename_all = "snake_case")]
pub enum ChartData {
    Empty,
    Categories(Vec<CategoryCount>),
    Slices(Vec<Slice>),
    Distribution(BoxSummary),
    Series(Vec<SeriesPoint>),
}

/// A declarative chart: what to draw, not the drawing
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub data: ChartData,
}

impl ChartSpec {
    /// Untitled blank chart shown before an upload and after a failed one
    pub fn empty() -> Self {
        ChartSpec {
            kind: ChartKind::Scatter,
            title: String::new(),
            x_label: String::new(),
            y_label: String::new(),
            data: ChartData::Empty,
        }
    }

    /// True for the placeholder chart
    pub fn is_empty(&self) -> bool {
        self.data == ChartData::Empty
    }

    /// Bar chart of how many times each label occurs
    ///
    /// # Arguments
    /// * `title` - Caption drawn above the chart
    /// * `x_label` - Description of the category axis
    /// * `labels` - One label per row; repeats are counted
    ///
    /// # Examples
    /// ```
    /// use clinic_dashboard::chart::{CategoryCount, ChartData, ChartSpec};
    ///
    /// let spec = ChartSpec::bar("Visits", "Specialty", ["Cardio", "Neuro", "Cardio"]);
    /// assert_eq!(
    ///     spec.data,
    ///     ChartData::Categories(vec![
    ///         CategoryCount { label: "Cardio".to_string(), count: 2 },
    ///         CategoryCount { label: "Neuro".to_string(), count: 1 },
    ///     ])
    /// );
    /// ```
    pub fn bar<'a>(title: &str, x_label: &str, labels: impl IntoIterator<Item = &'a str>) -> Self {
        ChartSpec {
            kind: ChartKind::Bar,
            title: title.to_string(),
            x_label: x_label.to_string(),
            y_label: "Count".to_string(),
            data: ChartData::Categories(count_by(labels)),
        }
    }

    /// Histogram of a categorical column: one bin per distinct label
    pub fn histogram<'a>(title: &str, x_label: &str, labels: impl IntoIterator<Item = &'a str>) -> Self {
        ChartSpec {
            kind: ChartKind::Histogram,
            y_label: "Count".to_string(),
            ..ChartSpec::bar(title, x_label, labels)
        }
    }

    /// Pie chart of each label's share of the rows
    ///
    /// Slices follow first appearance. With no labels at all the slice list
    /// is empty rather than a chart of zero fractions.
    pub fn pie<'a>(title: &str, labels: impl IntoIterator<Item = &'a str>) -> Self {
        let counts = count_by(labels);
        let total: usize = counts.iter().map(|c| c.count).sum();
        let slices = counts
            .into_iter()
            .map(|c| Slice {
                fraction: if total == 0 { 0.0 } else { c.count as f64 / total as f64 },
                label: c.label,
                count: c.count,
            })
            .collect();

        ChartSpec {
            kind: ChartKind::Pie,
            title: title.to_string(),
            x_label: String::new(),
            y_label: String::new(),
            data: ChartData::Slices(slices),
        }
    }

    /// Box plot of `values`; an empty sample gives an empty distribution
    pub fn box_plot(title: &str, x_label: &str, values: &[f64]) -> Self {
        ChartSpec {
            kind: ChartKind::Box,
            title: title.to_string(),
            x_label: x_label.to_string(),
            y_label: String::new(),
            data: BoxSummary::from_values(values)
                .map(ChartData::Distribution)
                .unwrap_or(ChartData::Empty),
        }
    }

    /// Line chart; points keep the order they are given in
    pub fn line(title: &str, x_label: &str, y_label: &str, points: Vec<SeriesPoint>) -> Self {
        ChartSpec {
            kind: ChartKind::Line,
            title: title.to_string(),
            x_label: x_label.to_string(),
            y_label: y_label.to_string(),
            data: ChartData::Series(points),
        }
    }
}

/// Counts occurrences, listing labels in order of first appearance
pub fn count_by<'a>(labels: impl IntoIterator<Item = &'a str>) -> Vec<CategoryCount> {
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    let mut counts: Vec<CategoryCount> = Vec::new();

    for label in labels {
        match index.get(label) {
            Some(&i) => counts[i].count += 1,
            None => {
                index.insert(label, counts.len());
                counts.push(CategoryCount {
                    label: label.to_string(),
                    count: 1,
                });
            }
        }
    }

    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_by_keeps_first_appearance_order() {
        let counts = count_by(["Neuro", "Cardio", "Neuro", "Derma", "Cardio", "Neuro"]);
        let flat: Vec<(&str, usize)> = counts.iter().map(|c| (c.label.as_str(), c.count)).collect();
        assert_eq!(flat, vec![("Neuro", 3), ("Cardio", 2), ("Derma", 1)]);
    }

    #[test]
    fn pie_fractions_sum_to_one() {
        let spec = ChartSpec::pie("Share", ["a", "b", "a", "c"]);
        let ChartData::Slices(slices) = &spec.data else {
            panic!("expected slices");
        };
        let total: f64 = slices.iter().map(|s| s.fraction).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert_eq!(slices[0].count, 2);
        assert_eq!(slices[0].fraction, 0.5);
    }

    #[test]
    fn box_summary_interpolates_quartiles() {
        let b = BoxSummary::from_values(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(b.q1, 1.75);
        assert_eq!(b.median, 2.5);
        assert_eq!(b.q3, 3.25);
        assert_eq!((b.min, b.max), (1.0, 4.0));
        assert!(b.outliers.is_empty());
    }

    #[test]
    fn box_summary_separates_outliers() {
        let b = BoxSummary::from_values(&[10.0, 11.0, 12.0, 13.0, 14.0, 90.0]).unwrap();
        assert_eq!(b.outliers, vec![90.0]);
        assert_eq!(b.upper_whisker, 14.0);
        assert_eq!(b.lower_whisker, 10.0);
        assert_eq!(b.max, 90.0);
    }

    #[test]
    fn box_summary_of_single_value() {
        let b = BoxSummary::from_values(&[40.0]).unwrap();
        assert_eq!((b.q1, b.median, b.q3), (40.0, 40.0, 40.0));
        assert_eq!((b.lower_whisker, b.upper_whisker), (40.0, 40.0));
    }

    #[test]
    fn empty_sample_gives_empty_box() {
        assert!(ChartSpec::box_plot("Ages", "age", &[]).is_empty());
    }

    #[test]
    fn histogram_reuses_category_counts() {
        let spec = ChartSpec::histogram("By doctor", "doctor", ["Dr A", "Dr B", "Dr A"]);
        assert_eq!(spec.kind, ChartKind::Histogram);
        assert_eq!(
            spec.data,
            ChartData::Categories(vec![
                CategoryCount { label: "Dr A".to_string(), count: 2 },
                CategoryCount { label: "Dr B".to_string(), count: 1 },
            ])
        );
    }

    #[test]
    fn serializes_with_tagged_data() {
        let json = serde_json::to_value(ChartSpec::empty()).unwrap();
        assert_eq!(json["kind"], "scatter");
        assert_eq!(json["data"]["type"], "empty");

        let spec = ChartSpec::line(
            "Over time",
            "date",
            "consultations",
            vec![SeriesPoint { x: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), y: 5.0 }],
        );
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["data"]["type"], "series");
        assert_eq!(json["data"]["values"][0]["x"], "2024-01-02");
        let back: ChartSpec = serde_json::from_value(json).unwrap();
        assert_eq!(back, spec);
    }
}
