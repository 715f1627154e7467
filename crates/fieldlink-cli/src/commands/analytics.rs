//! Analytics command - report stored detections.

use anyhow::{Context, Result};
use fieldlink_store::Store;
use tracing::info;

use crate::cli::{AnalyticsArgs, OutputFormat};
use crate::format::{
    format_csv, format_json, format_points_text, format_summary_text, write_output,
};

/// Execute the analytics command.
pub fn cmd_analytics(store: &Store, args: &AnalyticsArgs) -> Result<()> {
    let content = if args.points {
        let points = store
            .detection_points(args.limit)
            .context("Failed to query detection points")?;
        info!("{} detection points", points.len());
        match args.format {
            OutputFormat::Text => format_points_text(&points),
            OutputFormat::Json => format_json(&points)?,
            OutputFormat::Csv => format_csv(&points)?,
        }
    } else {
        let rows = store
            .recent_detection_analytics(args.days)
            .context("Failed to query detection analytics")?;
        if rows.is_empty() {
            info!("No detection analytics available.");
        }
        match args.format {
            OutputFormat::Text => format_summary_text(&rows, args.days),
            OutputFormat::Json => format_json(&rows)?,
            OutputFormat::Csv => format_csv(&rows)?,
        }
    };

    write_output(args.output.as_deref(), &content)?;
    if let Some(path) = &args.output {
        info!("Wrote {}", path.display());
    }
    Ok(())
}
