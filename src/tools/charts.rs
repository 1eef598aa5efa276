//! Fermentation chart generation
//!
//! Renders a batch's fermentation curve as a PNG: the selected metric
//! (specific gravity or Brix) on the left axis, temperature on the right.

use std::path::Path;

use image::{DynamicImage, ImageFormat, RgbImage};
use serde::Serialize;

use crate::db::Database;
use crate::models::{Batch, LogEntry};

/// Metric plotted on the primary axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartMetric {
    Sg,
    Brix,
}

impl ChartMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartMetric::Sg => "sg",
            ChartMetric::Brix => "brix",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sg" | "densidad" => Some(ChartMetric::Sg),
            "brix" | "bx" => Some(ChartMetric::Brix),
            _ => None,
        }
    }

    /// Series label, matching the axis toggle on the capture form
    pub fn axis_label(&self) -> &'static str {
        match self {
            ChartMetric::Sg => "SG",
            ChartMetric::Brix => "BRIX",
        }
    }

    fn value_of(&self, entry: &LogEntry) -> Option<f64> {
        match self {
            ChartMetric::Sg => entry.sg,
            ChartMetric::Brix => entry.brix,
        }
    }
}

/// Response for generate_fermentation_chart
#[derive(Debug, Serialize)]
pub struct ChartResponse {
    pub batch_id: i64,
    pub batch_name: String,
    pub metric: String,
    pub points: usize,
    pub path: String,
    pub width: u32,
    pub height: u32,
}

/// Pad an axis range so lines do not sit on the border
fn padded_range(values: &[f64]) -> (f64, f64) {
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    let pad = if span > 0.0 { span * 0.1 } else { 0.5 };
    (min - pad, max + pad)
}

/// Render the fermentation curve as PNG bytes
pub fn render_fermentation_chart(
    entries: &[LogEntry],
    metric: ChartMetric,
    width: u32,
    height: u32,
) -> Result<Vec<u8>, String> {
    use plotters::prelude::*;

    let primary_points: Vec<(i32, f64)> = entries
        .iter()
        .enumerate()
        .filter_map(|(i, e)| metric.value_of(e).map(|v| (i as i32, v)))
        .collect();

    if primary_points.len() < 2 {
        return Err(format!(
            "Need at least 2 {} readings to chart",
            metric.axis_label()
        ));
    }

    let temp_points: Vec<(i32, f64)> = entries
        .iter()
        .enumerate()
        .filter_map(|(i, e)| e.temp_c.map(|v| (i as i32, v)))
        .collect();

    let primary_values: Vec<f64> = primary_points.iter().map(|(_, v)| *v).collect();
    let (y_min, y_max) = padded_range(&primary_values);

    let temp_values: Vec<f64> = temp_points.iter().map(|(_, v)| *v).collect();
    let (t_min, t_max) = if temp_values.is_empty() {
        (0.0, 1.0)
    } else {
        padded_range(&temp_values)
    };

    // recharts palette from the original tracker UI
    let primary_color = RGBColor(136, 132, 216);
    let temp_color = RGBColor(130, 202, 157);

    let mut buffer = vec![0u8; (width * height * 3) as usize];

    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height))
            .into_drawing_area();
        root.fill(&WHITE).map_err(|e| e.to_string())?;

        let x_range = 0..(entries.len() as i32);

        let mut chart = ChartBuilder::on(&root)
            .margin(20)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .right_y_label_area_size(50)
            .build_cartesian_2d(x_range.clone(), y_min..y_max)
            .map_err(|e| e.to_string())?
            .set_secondary_coord(x_range, t_min..t_max);

        chart
            .configure_mesh()
            .x_labels(entries.len().min(10))
            .x_label_formatter(&|x| {
                if *x >= 0 && (*x as usize) < entries.len() {
                    let date = &entries[*x as usize].date;
                    date.split('-').skip(1).collect::<Vec<_>>().join("/")
                } else {
                    String::new()
                }
            })
            .y_desc(metric.axis_label())
            .draw()
            .map_err(|e| e.to_string())?;

        chart
            .configure_secondary_axes()
            .y_desc("Temp (°C)")
            .draw()
            .map_err(|e| e.to_string())?;

        chart
            .draw_series(LineSeries::new(
                primary_points.clone(),
                primary_color.stroke_width(2),
            ))
            .map_err(|e| e.to_string())?
            .label(metric.axis_label())
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], primary_color.stroke_width(2))
            });

        if !temp_points.is_empty() {
            chart
                .draw_secondary_series(LineSeries::new(
                    temp_points.clone(),
                    temp_color.stroke_width(2),
                ))
                .map_err(|e| e.to_string())?
                .label("Temp (°C)")
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], temp_color.stroke_width(2))
                });
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(|e| e.to_string())?;

        root.present().map_err(|e| e.to_string())?;
    }

    // Convert RGB buffer to PNG
    let img = RgbImage::from_raw(width, height, buffer)
        .ok_or("Failed to create image from buffer")?;

    let mut png_bytes = Vec::new();
    let dyn_img = DynamicImage::ImageRgb8(img);
    dyn_img
        .write_to(&mut std::io::Cursor::new(&mut png_bytes), ImageFormat::Png)
        .map_err(|e| e.to_string())?;

    Ok(png_bytes)
}

/// Generate a fermentation chart for a batch and write it to disk
pub fn generate_fermentation_chart(
    db: &Database,
    batch_id: i64,
    metric: &str,
    width: u32,
    height: u32,
    output_path: &str,
) -> Result<ChartResponse, String> {
    let metric = ChartMetric::from_str(metric)
        .ok_or_else(|| format!("Invalid metric: {}. Valid values: sg, brix", metric))?;

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let batch = Batch::get_by_id(&conn, batch_id)
        .map_err(|e| format!("Failed to get batch: {}", e))?
        .ok_or_else(|| format!("Batch not found with id: {}", batch_id))?;

    let entries = LogEntry::list_for_batch(&conn, batch_id)
        .map_err(|e| format!("Failed to get fermentation log: {}", e))?;

    let png_bytes = render_fermentation_chart(&entries, metric, width, height)?;
    let points = entries
        .iter()
        .filter(|e| metric.value_of(e).is_some())
        .count();

    let path = Path::new(output_path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    std::fs::write(path, &png_bytes).map_err(|e| format!("Failed to write chart: {}", e))?;

    Ok(ChartResponse {
        batch_id,
        batch_name: batch.name,
        metric: metric.as_str().to_string(),
        points,
        path: output_path.to_string(),
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(date: &str, sg: Option<f64>, brix: Option<f64>, temp_c: Option<f64>) -> LogEntry {
        LogEntry {
            id: 0,
            batch_id: 1,
            date: date.to_string(),
            sg,
            brix,
            temp_c,
            notes: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_render_produces_png() {
        let entries = vec![
            entry("2025-07-01", Some(1.090), Some(21.8), Some(22.0)),
            entry("2025-07-05", Some(1.050), Some(12.8), Some(25.0)),
            entry("2025-07-15", Some(0.998), Some(-0.5), Some(20.0)),
        ];

        let png = render_fermentation_chart(&entries, ChartMetric::Sg, 640, 480).unwrap();
        assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    }

    #[test]
    fn test_too_few_readings_is_an_error() {
        let entries = vec![entry("2025-07-01", Some(1.090), None, None)];
        let err = render_fermentation_chart(&entries, ChartMetric::Sg, 640, 480).unwrap_err();
        assert!(err.contains("at least 2"));

        // Entries without the charted metric do not count as readings
        let sparse = vec![
            entry("2025-07-01", Some(1.090), None, None),
            entry("2025-07-02", None, None, Some(21.0)),
        ];
        assert!(render_fermentation_chart(&sparse, ChartMetric::Sg, 640, 480).is_err());
    }

    #[test]
    fn test_brix_axis_and_missing_temps() {
        let entries = vec![
            entry("2025-07-01", None, Some(21.8), None),
            entry("2025-07-05", None, Some(12.8), None),
        ];
        assert!(render_fermentation_chart(&entries, ChartMetric::Brix, 640, 480).is_ok());
    }

    #[test]
    fn test_metric_parsing() {
        assert_eq!(ChartMetric::from_str("SG"), Some(ChartMetric::Sg));
        assert_eq!(ChartMetric::from_str("brix"), Some(ChartMetric::Brix));
        assert_eq!(ChartMetric::from_str("temp"), None);
    }
}
