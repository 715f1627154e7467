//! Report formatting for text, JSON, and CSV output.

use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use fieldlink_store::{DetectionAnalytics, DetectionPoint};
use serde::Serialize;
use time::format_description::well_known::Rfc3339;

/// Format analytics rows as an aligned table.
pub fn format_summary_text(rows: &[DetectionAnalytics], days: u32) -> String {
    if rows.is_empty() {
        return format!("No detections in the last {} days.\n", days);
    }

    let mut output = format!("Detections over the last {} days:\n\n", days);
    output.push_str(&format!(
        "{:<10}  {:<16}  {:<20}  {:>6}  {:>8}\n",
        "DATE", "TYPE", "DEVICE", "COUNT", "AVG CONF"
    ));
    for row in rows {
        output.push_str(&format!(
            "{:<10}  {:<16}  {:<20}  {:>6}  {:>8}\n",
            row.date.as_deref().unwrap_or("-"),
            row.detection_type.as_deref().unwrap_or("-"),
            row.device_id.as_deref().unwrap_or("-"),
            row.detection_count,
            row.avg_confidence
                .map(|c| format!("{:.2}", c))
                .unwrap_or_else(|| "-".to_string()),
        ));
    }

    let total: u64 = rows.iter().map(|r| r.detection_count).sum();
    output.push_str(&format!("\nTotal: {} detections\n", total));
    output
}

/// Format detection points as an aligned table.
pub fn format_points_text(points: &[DetectionPoint]) -> String {
    if points.is_empty() {
        return "No detections with a location.\n".to_string();
    }

    let mut output = format!(
        "{:<24}  {:<16}  {:<16}  {:>10}  {:>11}  {:>5}\n",
        "TIME", "TYPE", "DEVICE", "LATITUDE", "LONGITUDE", "CONF"
    );
    for point in points {
        output.push_str(&format!(
            "{:<24}  {:<16}  {:<16}  {:>10.5}  {:>11.5}  {:>5}\n",
            point
                .timestamp
                .and_then(|t| t.format(&Rfc3339).ok())
                .unwrap_or_else(|| "-".to_string()),
            point.detection_type.as_deref().unwrap_or("-"),
            point.device_id.as_deref().unwrap_or("-"),
            point.latitude,
            point.longitude,
            point
                .confidence
                .map(|c| format!("{:.2}", c))
                .unwrap_or_else(|| "-".to_string()),
        ));
    }
    output
}

/// Pretty-printed JSON with a trailing newline.
pub fn format_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    Ok(json)
}

/// One CSV record per row, with a header derived from the field names.
pub fn format_csv<T: Serialize>(rows: &[T]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row).context("Failed to write CSV row")?;
    }
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

/// Write output to file or stdout
pub fn write_output(output: Option<&Path>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write to {}", path.display()))?;
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}
