//! Output formatting utilities

use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::Colorize;
use ktop_lib::collector::RankedView;
use ktop_lib::view::RowFormatter;
use ktop_lib::{EntityMetric, Frame, TopConfig};
use serde::Serialize;
use tabled::{builder::Builder, settings::Style};

/// Output format for one-shot snapshots
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

#[derive(Serialize)]
struct SnapshotJson<'a> {
    mode: String,
    metric: String,
    collected: usize,
    rows: &'a [EntityMetric],
}

/// Render a frame as a rounded table with the header row first
pub fn frame_table(frame: &Frame) -> String {
    let mut builder = Builder::default();
    builder.push_record(frame.header.iter().cloned());
    for row in &frame.rows {
        builder.push_record(std::iter::once(row.label.clone()).chain(row.cells.iter().cloned()));
    }
    builder.build().with(Style::rounded()).to_string()
}

/// Title line shown above the table
pub fn frame_title(frame: &Frame) -> String {
    format!(
        "{}  {} collected  updated {}",
        frame.title.bold(),
        frame.collected,
        frame.updated_at.format("%H:%M:%S")
    )
}

/// Print a ranked snapshot
pub fn print_view(view: &RankedView, config: &TopConfig, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            if view.rows.is_empty() {
                print_info("No entities reported metrics");
                return Ok(());
            }
            let frame = RowFormatter::new(config).frame(view);
            println!("{}", frame_title(&frame));
            println!("{}", frame_table(&frame));
        }
        OutputFormat::Json => {
            let snapshot = SnapshotJson {
                mode: config.display_mode.to_string(),
                metric: config.metric_key.to_string(),
                collected: view.collected,
                rows: &view.rows,
            };
            let json =
                serde_json::to_string_pretty(&snapshot).context("Failed to serialize snapshot")?;
            println!("{}", json);
        }
    }
    Ok(())
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}
