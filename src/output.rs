//! Rendering of a `MetricsTable` as JSON, wide CSV or a PNG chart.

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, NaiveDate};
use csv::Writer;
use plotters::prelude::*;

use crate::collector::MetricsTable;
use crate::error::{MetricsError, Result};

/// Pretty-printed JSON, dates in sampling order
pub fn write_json<W: Write>(table: &MetricsTable, mut out: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut out, table)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

/// Wide CSV: `date,<lang>_lines,<lang>_complexity,...` with one row per date.
///
/// Languages are sorted by name, rows by date; absent values are blank.
pub fn write_csv<W: Write>(table: &MetricsTable, out: W) -> Result<()> {
    let languages = table.languages();
    let mut wtr = Writer::from_writer(out);

    let mut header = vec!["date".to_string()];
    for lang in &languages {
        header.push(format!("{}_lines", lang));
        header.push(format!("{}_complexity", lang));
    }
    wtr.write_record(&header)?;

    for (date, per_lang) in table.sorted() {
        let mut row = vec![date.clone()];
        for lang in &languages {
            let metric = per_lang.get(*lang).copied().unwrap_or_default();
            row.push(metric.lines.map(|n| n.to_string()).unwrap_or_default());
            row.push(metric.complexity.map(|n| n.to_string()).unwrap_or_default());
        }
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Format a line count in short form
fn format_count(count: u64) -> String {
    const K: u64 = 1_000;
    const M: u64 = 1_000_000;
    const G: u64 = 1_000_000_000;

    if count >= G {
        format!("{:.2}G", count as f64 / G as f64)
    } else if count >= M {
        format!("{:.2}M", count as f64 / M as f64)
    } else if count >= K {
        format!("{:.2}k", count as f64 / K as f64)
    } else {
        format!("{}", count)
    }
}

/// Lines of code per language over time, one series per language
fn plot_series(table: &MetricsTable) -> Vec<(String, Vec<(i64, u64)>)> {
    table
        .languages()
        .into_iter()
        .map(|lang| {
            let points = table
                .sorted()
                .into_iter()
                .filter_map(|(date, per_lang)| {
                    let lines = per_lang.get(lang)?.lines?;
                    let ts = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                        .ok()?
                        .and_hms_opt(0, 0, 0)?
                        .and_utc()
                        .timestamp();
                    Some((ts, lines))
                })
                .collect::<Vec<_>>();
            (lang.to_string(), points)
        })
        .filter(|(_, points)| !points.is_empty())
        .collect()
}

/// Generate a line chart of lines per language
pub fn generate_plot(table: &MetricsTable, output_path: &Path) -> Result<()> {
    let series = plot_series(table);
    if series.is_empty() {
        return Ok(());
    }

    let all_points = || series.iter().flat_map(|(_, points)| points.iter());
    let min_ts = all_points().map(|(t, _)| *t).min().unwrap_or(0);
    let max_ts = all_points().map(|(t, _)| *t).max().unwrap_or(0);
    let max_lines = all_points().map(|(_, l)| *l).max().unwrap_or(0);

    // Add margins
    let time_margin = ((max_ts - min_ts) / 20).max(86400 * 30);
    let lines_margin = (max_lines / 10).max(10);

    let root = BitMapBackend::new(output_path, (1200, 600)).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| MetricsError::Plot(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            "Lines of Code per Language",
            ("sans-serif", 30).into_font(),
        )
        .margin(5)
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(
            (min_ts - time_margin)..(max_ts + time_margin),
            0u64..(max_lines + lines_margin),
        )
        .map_err(|e| MetricsError::Plot(e.to_string()))?;

    chart
        .configure_mesh()
        .light_line_style(TRANSPARENT)
        .bold_line_style(BLACK.mix(0.3))
        .x_labels(10)
        .y_labels(10)
        .x_label_formatter(&|v| {
            DateTime::from_timestamp(*v, 0)
                .map(|dt| dt.format("%Y-%m").to_string())
                .unwrap_or_default()
        })
        .y_label_formatter(&|v| format_count(*v))
        .draw()
        .map_err(|e| MetricsError::Plot(e.to_string()))?;

    for (idx, (lang, points)) in series.iter().enumerate() {
        let color = Palette99::pick(idx).to_rgba();
        chart
            .draw_series(LineSeries::new(points.iter().copied(), color))
            .map_err(|e| MetricsError::Plot(e.to_string()))?
            .label(lang.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(|e| MetricsError::Plot(e.to_string()))?;

    root.present()
        .map_err(|e| MetricsError::Plot(e.to_string()))?;

    Ok(())
}
