//! SVG chart rendering.
//!
//! Each public function draws one chart into `path` and maps any backend
//! failure to [`TrackerError::Render`]. The drawing itself lives in private
//! helpers returning `Box<dyn Error>` so plotters' generic error types can be
//! propagated with `?`.

use crate::error::{Result, TrackerError};
use crate::forecast::Forecast;
use crate::pipeline::{Bin, CrossTab};
use chrono::{Datelike, NaiveDate};
use log::info;
use plotters::prelude::*;
use plotters::series::DashedLineSeries;
use std::error::Error;
use std::path::Path;

type DrawResult = std::result::Result<(), Box<dyn Error>>;

const FONT: &str = "sans-serif";
const SKY_BLUE: RGBColor = RGBColor(135, 206, 235);
const LIGHT_GREEN: RGBColor = RGBColor(144, 238, 144);
const LIGHT_CORAL: RGBColor = RGBColor(240, 128, 128);
const ORANGE: RGBColor = RGBColor(255, 165, 0);

/// Fill colors for bar charts, named after the palette the reports use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    SkyBlue,
    LightGreen,
    LightCoral,
    Orange,
    Blue,
    Green,
}

impl Fill {
    fn rgb(self) -> RGBColor {
        match self {
            Fill::SkyBlue => SKY_BLUE,
            Fill::LightGreen => LIGHT_GREEN,
            Fill::LightCoral => LIGHT_CORAL,
            Fill::Orange => ORANGE,
            Fill::Blue => BLUE,
            Fill::Green => GREEN,
        }
    }
}

/// Title and axis captions shared by every cartesian chart.
#[derive(Debug, Clone, Copy)]
pub struct Captions<'a> {
    pub title: &'a str,
    pub x: &'a str,
    pub y: &'a str,
}

/// One forecast drawn on a line chart.
pub struct ForecastLine<'a> {
    pub label: &'a str,
    pub forecast: &'a Forecast,
    pub color: Fill,
}

fn finish(path: &Path, result: DrawResult) -> Result<()> {
    match result {
        Ok(()) => {
            info!("Wrote chart {}", path.display());
            Ok(())
        }
        Err(e) => Err(TrackerError::Render {
            path: path.to_path_buf(),
            message: e.to_string(),
        }),
    }
}

fn headroom<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let max = values.into_iter().fold(0.0f64, f64::max);
    if max <= 0.0 {
        1.0
    } else {
        max * 1.1
    }
}

fn segment_label(labels: &[String], v: &SegmentValue<usize>) -> String {
    match v {
        SegmentValue::CenterOf(i) | SegmentValue::Exact(i) => labels.get(*i).cloned().unwrap_or_default(),
        SegmentValue::Last => String::new(),
    }
}

pub fn bar_chart(path: &Path, captions: Captions<'_>, bars: &[(String, f64)], fill: Fill) -> Result<()> {
    finish(path, draw_bars(path, captions, bars, fill))
}

fn draw_bars(path: &Path, captions: Captions<'_>, bars: &[(String, f64)], fill: Fill) -> DrawResult {
    let root = SVGBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let n = bars.len().max(1);
    let labels: Vec<String> = bars.iter().map(|(l, _)| l.clone()).collect();
    let mut chart = ChartBuilder::on(&root)
        .caption(captions.title, (FONT, 24.0))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(70)
        .build_cartesian_2d((0..n).into_segmented(), 0f64..headroom(bars.iter().map(|(_, v)| *v)))?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n)
        .x_desc(captions.x)
        .y_desc(captions.y)
        .x_label_style((FONT, 11.0))
        .x_label_formatter(&|v| segment_label(&labels, v))
        .draw()?;
    let color = fill.rgb();
    chart.draw_series(bars.iter().enumerate().map(|(i, (_, v))| {
        Rectangle::new(
            [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), *v)],
            color.filled(),
        )
    }))?;
    root.present()?;
    Ok(())
}

/// Stacked bars: one bar per cross tab row, one stacked segment per column.
pub fn stacked_bar_chart(path: &Path, captions: Captions<'_>, table: &CrossTab) -> Result<()> {
    finish(path, draw_stacked(path, captions, table))
}

fn draw_stacked(path: &Path, captions: Captions<'_>, table: &CrossTab) -> DrawResult {
    let root = SVGBackend::new(path, (1500, 800)).into_drawing_area();
    root.fill(&WHITE)?;
    let n = table.rows.len().max(1);
    let totals: Vec<f64> = table.values.iter().map(|r| r.iter().sum()).collect();
    let mut chart = ChartBuilder::on(&root)
        .caption(captions.title, (FONT, 24.0))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(70)
        .build_cartesian_2d((0..n).into_segmented(), 0f64..headroom(totals.iter().copied()))?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n)
        .x_desc(captions.x)
        .y_desc(captions.y)
        .x_label_style((FONT, 11.0))
        .x_label_formatter(&|v| segment_label(&table.rows, v))
        .draw()?;

    let mut base = vec![0.0; table.rows.len()];
    for (c, name) in table.columns.iter().enumerate() {
        let color = Palette99::pick(c).to_rgba();
        let mut rects = Vec::with_capacity(table.rows.len());
        for (i, row) in table.values.iter().enumerate() {
            let lo = base[i];
            let hi = lo + row[c];
            base[i] = hi;
            rects.push(Rectangle::new(
                [(SegmentValue::Exact(i), lo), (SegmentValue::Exact(i + 1), hi)],
                color.filled(),
            ));
        }
        chart
            .draw_series(rects)?
            .label(name.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }
    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

/// Pie chart with percentage annotations, starting at twelve o'clock and
/// running counter-clockwise.
pub fn pie_chart(path: &Path, title: &str, slices: &[(String, f64)]) -> Result<()> {
    finish(path, draw_pie(path, title, slices))
}

fn draw_pie(path: &Path, title: &str, slices: &[(String, f64)]) -> DrawResult {
    let root = SVGBackend::new(path, (900, 700)).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled(title, (FONT, 24.0))?;
    let (w, h) = root.dim_in_pixel();
    let (cx, cy) = (w as f64 / 2.0, h as f64 / 2.0);
    let radius = w.min(h) as f64 * 0.35;
    let total: f64 = slices.iter().map(|(_, v)| v.max(0.0)).sum();
    if total <= 0.0 {
        root.present()?;
        return Ok(());
    }

    let at = |angle: f64, r: f64| ((cx + r * angle.cos()) as i32, (cy - r * angle.sin()) as i32);
    let mut start = 90f64.to_radians();
    for (i, (label, value)) in slices.iter().enumerate() {
        let share = value.max(0.0) / total;
        if share == 0.0 {
            continue;
        }
        let sweep = share * std::f64::consts::TAU;
        let steps = ((sweep.to_degrees() / 2.0).ceil() as usize).max(1);
        let mut points = vec![(cx as i32, cy as i32)];
        for s in 0..=steps {
            points.push(at(start + sweep * s as f64 / steps as f64, radius));
        }
        let color = Palette99::pick(i).to_rgba();
        root.draw(&Polygon::new(points, color.filled()))?;

        let mid = start + sweep / 2.0;
        root.draw(&Text::new(format!("{:.1}%", share * 100.0), at(mid, radius * 0.6), (FONT, 13.0)))?;
        root.draw(&Text::new(label.clone(), at(mid, radius * 1.1), (FONT, 14.0)))?;
        start += sweep;
    }
    root.present()?;
    Ok(())
}

fn day_number(d: NaiveDate) -> i32 {
    d.num_days_from_ce()
}

/// Historical series with solid lines and markers, forecasts dashed, and a
/// vertical marker where each forecast starts.
pub fn forecast_chart(path: &Path, captions: Captions<'_>, lines: &[ForecastLine<'_>], x_start: Option<NaiveDate>) -> Result<()> {
    finish(path, draw_forecast(path, captions, lines, x_start))
}

fn draw_forecast(path: &Path, captions: Captions<'_>, lines: &[ForecastLine<'_>], x_start: Option<NaiveDate>) -> DrawResult {
    let root = SVGBackend::new(path, (1200, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let dates = lines.iter().flat_map(|l| {
        l.forecast
            .history
            .points
            .iter()
            .chain(&l.forecast.predicted)
            .map(|p| p.period)
    });
    let (mut lo, mut hi) = (i32::MAX, i32::MIN);
    for d in dates {
        lo = lo.min(day_number(d));
        hi = hi.max(day_number(d));
    }
    if lo > hi {
        root.present()?;
        return Ok(());
    }
    if let Some(start) = x_start {
        lo = lo.max(day_number(start)).min(hi);
    }
    let hi = hi.max(lo + 1);
    let y_max = headroom(lines.iter().flat_map(|l| {
        l.forecast
            .history
            .points
            .iter()
            .chain(&l.forecast.predicted)
            .map(|p| p.value)
    }));

    let mut chart = ChartBuilder::on(&root)
        .caption(captions.title, (FONT, 22.0))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(lo..hi, 0f64..y_max)?;
    chart
        .configure_mesh()
        .x_desc(captions.x)
        .y_desc(captions.y)
        .x_label_formatter(&|x| {
            NaiveDate::from_num_days_from_ce_opt(*x)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default()
        })
        .draw()?;

    for line in lines {
        let color = line.color.rgb();
        let history: Vec<(i32, f64)> = line
            .forecast
            .history
            .points
            .iter()
            .map(|p| (day_number(p.period), p.value))
            .filter(|(x, _)| *x >= lo)
            .collect();
        chart
            .draw_series(LineSeries::new(history.clone(), color.stroke_width(2)))?
            .label(format!("{} (historical)", line.label))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        chart.draw_series(history.iter().map(|p| Circle::new(*p, 3, color.filled())))?;

        let Some(first) = line.forecast.predicted.first() else {
            continue;
        };
        let mut projected: Vec<(i32, f64)> = history.last().copied().into_iter().collect();
        projected.extend(line.forecast.predicted.iter().map(|p| (day_number(p.period), p.value)));
        chart
            .draw_series(DashedLineSeries::new(projected, 6, 4, color.mix(0.6).stroke_width(2)))?
            .label(format!("{} (forecast)", line.label))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.mix(0.6).stroke_width(2)));
        let x = day_number(first.period);
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(x, 0.0), (x, y_max)],
            color.mix(0.4).stroke_width(1),
        )))?;
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

pub fn histogram_chart(path: &Path, captions: Captions<'_>, bins: &[Bin], fill: Fill) -> Result<()> {
    finish(path, draw_histogram(path, captions, bins, fill))
}

fn draw_histogram(path: &Path, captions: Captions<'_>, bins: &[Bin], fill: Fill) -> DrawResult {
    let root = SVGBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let (lo, hi) = match (bins.first(), bins.last()) {
        (Some(f), Some(l)) => (f.lower, l.upper),
        _ => (0.0, 1.0),
    };
    let mut chart = ChartBuilder::on(&root)
        .caption(captions.title, (FONT, 22.0))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(lo..hi, 0f64..headroom(bins.iter().map(|b| b.count as f64)))?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc(captions.x)
        .y_desc(captions.y)
        .draw()?;
    let color = fill.rgb();
    chart.draw_series(
        bins.iter()
            .map(|b| Rectangle::new([(b.lower, 0.0), (b.upper, b.count as f64)], color.filled())),
    )?;
    chart.draw_series(
        bins.iter()
            .map(|b| Rectangle::new([(b.lower, 0.0), (b.upper, b.count as f64)], BLACK.stroke_width(1))),
    )?;
    root.present()?;
    Ok(())
}

/// Annotated heat map of a cross tab; darker cells hold larger totals.
pub fn heatmap(path: &Path, captions: Captions<'_>, table: &CrossTab, column_labels: &[String]) -> Result<()> {
    finish(path, draw_heatmap(path, captions, table, column_labels))
}

fn shade(value: f64, max: f64) -> RGBColor {
    let t = if max > 0.0 { (value / max).clamp(0.0, 1.0) } else { 0.0 };
    let mix = |from: f64, to: f64| (from + (to - from) * t).round() as u8;
    RGBColor(mix(247.0, 8.0), mix(251.0, 48.0), mix(255.0, 107.0))
}

fn draw_heatmap(path: &Path, captions: Captions<'_>, table: &CrossTab, column_labels: &[String]) -> DrawResult {
    let root = SVGBackend::new(path, (1200, 800)).into_drawing_area();
    root.fill(&WHITE)?;
    let cols = table.columns.len().max(1);
    let rows = table.rows.len().max(1);
    let max = table.values.iter().flatten().copied().fold(0.0f64, f64::max);
    let mut chart = ChartBuilder::on(&root)
        .caption(captions.title, (FONT, 22.0))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(200)
        .build_cartesian_2d((0..cols).into_segmented(), (0..rows).into_segmented())?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(cols)
        .y_labels(rows)
        .x_desc(captions.x)
        .y_desc(captions.y)
        .x_label_style((FONT, 11.0))
        .y_label_style((FONT, 11.0))
        .x_label_formatter(&|v| segment_label(column_labels, v))
        .y_label_formatter(&|v| segment_label(&table.rows, v))
        .draw()?;

    for (r, row) in table.values.iter().enumerate() {
        chart.draw_series(row.iter().enumerate().map(|(c, v)| {
            Rectangle::new(
                [
                    (SegmentValue::Exact(c), SegmentValue::Exact(r)),
                    (SegmentValue::Exact(c + 1), SegmentValue::Exact(r + 1)),
                ],
                shade(*v, max).filled(),
            )
        }))?;
        chart.draw_series(row.iter().enumerate().map(|(c, v)| {
            let style = if max > 0.0 && *v / max > 0.5 { WHITE } else { BLACK };
            Text::new(
                crate::util::format_total(*v),
                (SegmentValue::CenterOf(c), SegmentValue::CenterOf(r)),
                (FONT, 11.0).into_font().color(&style),
            )
        }))?;
    }
    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::{forecast, ForecastStrategy};
    use crate::pipeline::{histogram, Observation, Period, TimeSeries};

    #[test]
    fn shade_runs_light_to_dark() {
        assert_eq!(shade(0.0, 10.0), RGBColor(247, 251, 255));
        assert_eq!(shade(10.0, 10.0), RGBColor(8, 48, 107));
        assert_eq!(shade(5.0, 0.0), RGBColor(247, 251, 255));
    }

    #[test]
    fn headroom_never_collapses() {
        assert_eq!(headroom(Vec::new()), 1.0);
        assert!((headroom(vec![10.0, 20.0]) - 22.0).abs() < 1e-9);
    }

    #[test]
    fn renders_svg_files() {
        let dir = tempfile::tempdir().unwrap();
        let captions = Captions { title: "Counts", x: "Key", y: "Count" };

        let bars = vec![("a".to_string(), 3.0), ("b".to_string(), 5.0)];
        let bar_path = dir.path().join("bar.svg");
        bar_chart(&bar_path, captions, &bars, Fill::SkyBlue).unwrap();

        let pie_path = dir.path().join("pie.svg");
        pie_chart(&pie_path, "Share", &bars).unwrap();

        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let history = TimeSeries::new(
            Period::Month,
            vec![
                Observation { period: start, value: 4.0 },
                Observation { period: Period::Month.next(start), value: 6.0 },
            ],
        );
        let f = forecast(&history, ForecastStrategy::MovingAverage { window: 4 }, 4).unwrap();
        let line_path = dir.path().join("line.svg");
        forecast_chart(
            &line_path,
            captions,
            &[ForecastLine { label: "Outbound", forecast: &f, color: Fill::Blue }],
            Some(start),
        )
        .unwrap();

        let hist_path = dir.path().join("hist.svg");
        histogram_chart(&hist_path, captions, &histogram(&[1.0, 2.0, 2.0, 9.0], 30), Fill::LightCoral).unwrap();

        let table = CrossTab {
            rows: vec!["x".into(), "y".into()],
            columns: vec!["2024-01-01".into()],
            values: vec![vec![1.0], vec![4.0]],
        };
        let heat_path = dir.path().join("heat.svg");
        heatmap(&heat_path, captions, &table, &["Jan 01".to_string()]).unwrap();

        for p in [bar_path, pie_path, line_path, hist_path, heat_path] {
            let body = std::fs::read_to_string(&p).unwrap();
            assert!(body.contains("<svg"), "{} is not an SVG", p.display());
        }
    }
}
