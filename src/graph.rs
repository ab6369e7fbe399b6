#![cfg(feature = "web")]
use crate::chart::{BoxSummary, CategoryCount, ChartData, ChartKind, ChartSpec, SeriesPoint, Slice};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::error::Error;
use std::f64::consts::PI;
use std::io::Cursor;

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

/// Size of the rendered image
#[derive(Clone, Debug)]
pub struct GraphOptions {
    /// Width of the graph in pixels
    pub width: u32,

    /// Height of the graph in pixels
    pub height: u32,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}

// Anything smaller leaves no room for the caption and label areas
const MIN_SIDE: u32 = 120;
const MAX_SIDE: u32 = 4000;

/// Renders a chart specification to PNG bytes
///
/// Drawing happens in an in-memory RGB buffer; nothing touches the disk.
/// A spec without data and without a title comes out as a blank white image.
///
/// # Examples
/// ```
/// use clinic_dashboard::chart::ChartSpec;
/// use clinic_dashboard::graph::{GraphOptions, render_png};
///
/// let png = render_png(&ChartSpec::empty(), &GraphOptions::default()).unwrap();
/// assert_eq!(&png[..4], b"\x89PNG");
/// ```
pub fn render_png(spec: &ChartSpec, options: &GraphOptions) -> Result<Vec<u8>, Box<dyn Error>> {
    let width = options.width.clamp(MIN_SIDE, MAX_SIDE);
    let height = options.height.clamp(MIN_SIDE, MAX_SIDE);
    let mut buffer = vec![0u8; (width * height * 3) as usize];

    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        root.fill(&WHITE)?;

        match &spec.data {
            ChartData::Categories(cats) if !cats.is_empty() => draw_categories(&root, spec, cats)?,
            ChartData::Slices(slices) if !slices.is_empty() => draw_pie(&root, spec, slices)?,
            ChartData::Distribution(summary) => draw_box(&root, spec, summary)?,
            ChartData::Series(points) if !points.is_empty() => draw_line(&root, spec, points)?,
            _ => draw_empty(&root, spec)?,
        }

        root.present()?;
    }

    encode_png(buffer, width, height)
}

fn encode_png(buffer: Vec<u8>, width: u32, height: u32) -> Result<Vec<u8>, Box<dyn Error>> {
    let img = image::RgbImage::from_raw(width, height, buffer)
        .ok_or("pixel buffer does not match image size")?;

    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img).write_to(&mut out, image::ImageOutputFormat::Png)?;
    Ok(out.into_inner())
}

fn caption_font() -> FontDesc<'static> {
    ("sans-serif", 30).into_font()
}

fn draw_empty(root: &Area, spec: &ChartSpec) -> Result<(), Box<dyn Error>> {
    if spec.title.is_empty() {
        return Ok(());
    }

    let mut chart = ChartBuilder::on(root)
        .caption(&spec.title, caption_font())
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(0f64..1f64, 0f64..1f64)?;

    chart.configure_mesh().x_desc(&spec.x_label).y_desc(&spec.y_label).draw()?;
    Ok(())
}

/// Bar charts and categorical histograms: one segment per label
fn draw_categories(root: &Area, spec: &ChartSpec, cats: &[CategoryCount]) -> Result<(), Box<dyn Error>> {
    let max_count = cats.iter().map(|c| c.count).max().unwrap_or(0);
    let labels: Vec<&str> = cats.iter().map(|c| c.label.as_str()).collect();

    let mut chart = ChartBuilder::on(root)
        .caption(&spec.title, caption_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(40)
        .build_cartesian_2d((0usize..cats.len()).into_segmented(), 0usize..max_count + 1)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(cats.len())
        .x_label_formatter(&|v| match v {
            SegmentValue::CenterOf(i) | SegmentValue::Exact(i) => {
                labels.get(*i).map(|s| s.to_string()).unwrap_or_default()
            }
            SegmentValue::Last => String::new(),
        })
        .x_desc(&spec.x_label)
        .y_desc(&spec.y_label)
        .draw()?;

    // Histogram bins touch, bars keep a gap
    let margin = if spec.kind == ChartKind::Histogram { 1 } else { 15 };

    chart.draw_series(
        Histogram::vertical(&chart)
            .style(BLUE.mix(0.7).filled())
            .margin(margin)
            .data(cats.iter().enumerate().map(|(i, c)| (i, c.count))),
    )?;

    Ok(())
}

fn draw_pie(root: &Area, spec: &ChartSpec, slices: &[Slice]) -> Result<(), Box<dyn Error>> {
    let area = if spec.title.is_empty() {
        root.clone()
    } else {
        root.titled(&spec.title, caption_font())?
    };

    let (w, h) = area.dim_in_pixel();
    let (cx, cy) = ((w / 2) as i32, (h / 2) as i32);
    let radius = w.min(h) as f64 * 0.35;
    let label_font = ("sans-serif", 15).into_font();

    // Start at twelve o'clock and go clockwise
    let mut start = -PI / 2.0;
    for (i, slice) in slices.iter().enumerate() {
        let sweep = slice.fraction * 2.0 * PI;
        if sweep <= 0.0 {
            continue;
        }

        let steps = ((sweep / (2.0 * PI)) * 180.0).ceil().max(2.0) as usize;
        let mut points = Vec::with_capacity(steps + 2);
        points.push((cx, cy));
        for k in 0..=steps {
            let a = start + sweep * k as f64 / steps as f64;
            points.push((cx + (radius * a.cos()) as i32, cy + (radius * a.sin()) as i32));
        }
        area.draw(&Polygon::new(points, Palette99::pick(i).filled()))?;

        let mid = start + sweep / 2.0;
        let anchor = (
            cx + (radius * 1.12 * mid.cos()) as i32,
            cy + (radius * 1.12 * mid.sin()) as i32,
        );
        area.draw(&Text::new(
            format!("{} ({:.1}%)", slice.label, slice.fraction * 100.0),
            anchor,
            label_font.clone(),
        ))?;

        start += sweep;
    }

    Ok(())
}

/// Horizontal box-and-whisker plot
fn draw_box(root: &Area, spec: &ChartSpec, summary: &BoxSummary) -> Result<(), Box<dyn Error>> {
    let pad = ((summary.max - summary.min) * 0.05).max(1.0);

    let mut chart = ChartBuilder::on(root)
        .caption(&spec.title, caption_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(20)
        .build_cartesian_2d((summary.min - pad)..(summary.max + pad), 0f64..1f64)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_label_formatter(&|_| String::new())
        .x_desc(&spec.x_label)
        .draw()?;

    let (lo, hi, mid) = (0.3, 0.7, 0.5);

    chart.draw_series(std::iter::once(Rectangle::new(
        [(summary.q1, lo), (summary.q3, hi)],
        BLUE.mix(0.3).filled(),
    )))?;
    chart.draw_series(std::iter::once(Rectangle::new(
        [(summary.q1, lo), (summary.q3, hi)],
        BLUE.stroke_width(2),
    )))?;

    chart.draw_series([
        PathElement::new(vec![(summary.median, lo), (summary.median, hi)], BLUE.stroke_width(3)),
        PathElement::new(vec![(summary.lower_whisker, mid), (summary.q1, mid)], BLUE.stroke_width(1)),
        PathElement::new(vec![(summary.q3, mid), (summary.upper_whisker, mid)], BLUE.stroke_width(1)),
        PathElement::new(
            vec![(summary.lower_whisker, 0.4), (summary.lower_whisker, 0.6)],
            BLUE.stroke_width(1),
        ),
        PathElement::new(
            vec![(summary.upper_whisker, 0.4), (summary.upper_whisker, 0.6)],
            BLUE.stroke_width(1),
        ),
    ])?;

    chart.draw_series(
        summary
            .outliers
            .iter()
            .map(|&v| Circle::new((v, mid), 4, RED.filled())),
    )?;

    Ok(())
}

/// Line through the points in the order given; x positions are row indices
/// labelled with each point's date
fn draw_line(root: &Area, spec: &ChartSpec, points: &[SeriesPoint]) -> Result<(), Box<dyn Error>> {
    let n = points.len();
    let mut y_min = points.iter().map(|p| p.y).fold(f64::INFINITY, f64::min).min(0.0);
    let mut y_max = points.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
    if y_max <= y_min {
        y_min -= 1.0;
        y_max += 1.0;
    }
    let x_max = n.saturating_sub(1).max(1) as f64;

    let mut chart = ChartBuilder::on(root)
        .caption(&spec.title, caption_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(40)
        .build_cartesian_2d(0f64..x_max, y_min..y_max + (y_max - y_min) * 0.05)?;

    chart
        .configure_mesh()
        .x_labels(n.min(10))
        .x_label_formatter(&|x| {
            let i = x.round();
            if (x - i).abs() > 1e-6 || i < 0.0 {
                return String::new();
            }
            points
                .get(i as usize)
                .map(|p| p.x.format("%Y-%m-%d").to_string())
                .unwrap_or_default()
        })
        .x_desc(&spec.x_label)
        .y_desc(&spec.y_label)
        .draw()?;

    chart.draw_series(LineSeries::new(
        points.iter().enumerate().map(|(i, p)| (i as f64, p.y)),
        &BLUE,
    ))?;
    chart.draw_series(
        points
            .iter()
            .enumerate()
            .map(|(i, p)| Circle::new((i as f64, p.y), 3, BLUE.filled())),
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::DashboardState;
    use crate::record::{Table, VisitRecord};
    use chrono::NaiveDate;

    #[test]
    fn empty_chart_is_a_blank_png_of_the_requested_size() {
        let options = GraphOptions {
            width: 320,
            height: 200,
        };
        let png = render_png(&ChartSpec::empty(), &options).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let img = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (320, 200));
        assert!(img.pixels().all(|p| p.0 == [255, 255, 255]));
    }

    #[test]
    fn dimensions_are_clamped() {
        let options = GraphOptions { width: 1, height: 1 };
        let png = render_png(&ChartSpec::empty(), &options).unwrap();
        let img = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (MIN_SIDE, MIN_SIDE));
    }

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

    fn assert_png(spec: &ChartSpec, width: u32, height: u32) {
        let png = render_png(spec, &GraphOptions { width, height })
            .unwrap_or_else(|e| panic!("{} failed to render: {}", spec.title, e));
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n", "{}", spec.title);
        let img = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (width, height), "{}", spec.title);
    }

    #[test]
    fn renders_every_chart_of_a_populated_dashboard() {
        let table = Table::from_records(vec![
            visit("P1", "Dr A", "Cardio", 40.0, 1, 3.0),
            visit("P2", "Dr A", "Cardio", 55.0, 2, 5.0),
            visit("P1", "Dr B", "Neuro", 40.0, 3, 2.0),
            visit("P3", "Dr C", "Derma", 90.0, 4, 1.0),
        ]);
        let state = DashboardState::from_table(&table);

        for (name, spec) in state.charts() {
            assert!(!spec.is_empty(), "{}", name);
            assert_png(spec, 600, 400);
        }
    }

    #[test]
    fn renders_charts_of_a_header_only_table() {
        let state = DashboardState::from_table(&Table::default());
        for (_, spec) in state.charts() {
            assert_png(spec, 400, 300);
        }
    }

    #[test]
    fn renders_single_point_line_and_single_value_box() {
        let line = ChartSpec::line(
            "One day",
            "Date",
            "Consultations",
            vec![SeriesPoint { x: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), y: 4.0 }],
        );
        assert_png(&line, 500, 300);

        let single = ChartSpec::box_plot("One age", "Age", &[40.0]);
        assert!(!single.is_empty());
        assert_png(&single, 500, 300);
    }

    #[test]
    fn negative_and_flat_series_render() {
        let points = [-3.0, -3.0, -1.0]
            .iter()
            .zip(1..)
            .map(|(&y, day)| SeriesPoint { x: NaiveDate::from_ymd_opt(2024, 2, day).unwrap(), y })
            .collect();
        assert_png(&ChartSpec::line("Drift", "Date", "Delta", points), 500, 300);
    }

    #[test]
    fn encode_rejects_mismatched_buffer() {
        assert!(encode_png(vec![0u8; 10], 10, 10).is_err());
    }
}
