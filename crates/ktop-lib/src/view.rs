//! Table frames handed to the render sink

use crate::bar::render_bar;
use crate::collector::RankedView;
use crate::config::TopConfig;
use crate::error::RenderError;
use crate::models::{DisplayMode, EntityMetric, MetricKey};
use crate::quantity::calculate_percentage;
use chrono::{DateTime, Local};

/// One table row: the entity label followed by its cells
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub label: String,
    pub cells: Vec<String>,
}

/// A complete table to draw on one refresh tick
#[derive(Debug, Clone)]
pub struct Frame {
    pub title: String,
    /// Column names, label column first
    pub header: Vec<String>,
    pub rows: Vec<TableRow>,
    /// Entities collected so far in the current poll cycle
    pub collected: usize,
    pub generation: u64,
    pub updated_at: DateTime<Local>,
}

/// Destination for rendered frames.
///
/// Only the refresh loop calls `render`, so implementations may assume a
/// single writer.
pub trait RenderSink: Send {
    fn render(&mut self, frame: &Frame) -> Result<(), RenderError>;
}

/// Turns ranked views into frames for the configured display mode
#[derive(Debug, Clone)]
pub struct RowFormatter {
    mode: DisplayMode,
    metric_key: MetricKey,
    top_k: usize,
    bar_width: usize,
    pod_cpu_ceiling_cores: f64,
    pod_memory_ceiling_mib: f64,
}

impl RowFormatter {
    pub fn new(config: &TopConfig) -> Self {
        Self {
            mode: config.display_mode,
            metric_key: config.metric_key,
            top_k: config.top_k,
            bar_width: config.bar_width,
            pod_cpu_ceiling_cores: config.pod_cpu_ceiling_cores,
            pod_memory_ceiling_mib: config.pod_memory_ceiling_mib,
        }
    }

    pub fn header(&self) -> Vec<String> {
        let columns: &[&str] = match self.mode {
            DisplayMode::Nodes => &["Node", "CPU Usage (Cores)", "Memory Usage (GiB)"],
            DisplayMode::Pods => &[
                "Pod",
                "Namespace",
                "CPU Usage (Cores)",
                "Memory Usage (MiB)",
            ],
        };
        columns.iter().map(|c| c.to_string()).collect()
    }

    pub fn row(&self, metric: &EntityMetric) -> TableRow {
        match self.mode {
            DisplayMode::Nodes => self.node_row(metric),
            DisplayMode::Pods => self.pod_row(metric),
        }
    }

    pub fn frame(&self, view: &RankedView) -> Frame {
        let title = match self.mode {
            DisplayMode::Nodes => "Nodes",
            DisplayMode::Pods => "Pods",
        };

        Frame {
            title: format!("{} by {} (top {})", title, self.metric_key, self.top_k),
            header: self.header(),
            rows: view.rows.iter().map(|m| self.row(m)).collect(),
            collected: view.collected,
            generation: view.generation,
            updated_at: Local::now(),
        }
    }

    fn node_row(&self, metric: &EntityMetric) -> TableRow {
        let cpu_capacity = metric.capacity_cpu_cores.unwrap_or(0.0);
        let memory_capacity = metric.capacity_memory_gib.unwrap_or(0.0);
        let memory_gib = metric.memory_gib();

        let cpu_bar = render_bar(
            calculate_percentage(metric.cpu_cores, cpu_capacity),
            self.bar_width,
        );
        let memory_bar = render_bar(
            calculate_percentage(memory_gib, memory_capacity),
            self.bar_width,
        );

        let cpu_cell = match metric.capacity_cpu_cores {
            Some(total) => format!("{} {:.3}/{:.0}", cpu_bar, metric.cpu_cores, total),
            None => format!("{} {:.3}", cpu_bar, metric.cpu_cores),
        };
        let memory_cell = match metric.capacity_memory_gib {
            Some(total) => format!("{} {:.3}/{:.3}", memory_bar, memory_gib, total),
            None => format!("{} {:.3}", memory_bar, memory_gib),
        };

        TableRow {
            label: metric.name.clone(),
            cells: vec![cpu_cell, memory_cell],
        }
    }

    fn pod_row(&self, metric: &EntityMetric) -> TableRow {
        let cpu_bar = render_bar(
            calculate_percentage(metric.cpu_cores, self.pod_cpu_ceiling_cores),
            self.bar_width,
        );
        let memory_bar = render_bar(
            calculate_percentage(metric.memory_mib, self.pod_memory_ceiling_mib),
            self.bar_width,
        );

        TableRow {
            label: metric.name.clone(),
            cells: vec![
                metric.namespace.clone().unwrap_or_else(|| "-".to_string()),
                format!("{:.2} {}", metric.cpu_cores, cpu_bar),
                format!("{:.2} {}", metric.memory_mib, memory_bar),
            ],
        }
    }
}
