//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::sync::Arc;

use deskprobe_driver::executor::SharedProgress;
use deskprobe_driver::poller::Progress;
use deskprobe_driver::StatusReport;

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

/// Desktop status as shown to the user
#[derive(Debug, Serialize)]
pub struct StatusDisplay {
    pub site: String,
    pub state: String,
    pub description: String,
    pub desktop_type: Option<String>,
}

impl StatusDisplay {
    pub fn new(site: &str, report: &StatusReport) -> Self {
        Self {
            site: site.to_string(),
            state: serde_json::to_value(report.state)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
            description: report.state.description().to_string(),
            desktop_type: report.desktop_type.as_ref().map(|d| d.to_string()),
        }
    }
}

impl TableDisplay for StatusDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Site", "State", "Description", "Desktop Type"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.site.clone(),
            self.state.clone(),
            self.description.clone(),
            self.desktop_type.clone().unwrap_or_else(|| "-".to_string()),
        ]
    }
}

/// Print a single item
pub fn print_item<T: Serialize + TableDisplay>(item: &T, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(T::headers());
            table.add_row(item.row());

            println!("{table}");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(item).unwrap_or_default());
        }
        OutputFormat::Plain => {
            let row = item.row();
            for (header, value) in T::headers().iter().zip(row.iter()) {
                println!("{}: {}", header, value);
            }
        }
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("{} {}", "✅".green(), message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "❌".red(), message.red());
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("{}  {}", "⚠️".yellow(), message.yellow());
}

/// Print info message
pub fn print_info(message: &str) {
    println!("{}  {}", "ℹ️".blue(), message);
}

/// Progress bar fed by the completion poller.
///
/// One bar is reused across waits; it restarts from zero whenever the
/// service reports a lower percentage than the last one seen.
pub fn progress_bar() -> SharedProgress {
    let bar = ProgressBar::new(100);
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
    {
        bar.set_style(style.progress_chars("=> "));
    }

    Arc::new(move |progress: &Progress| {
        let percent = parse_percent(&progress.percent);
        if percent < bar.position() {
            bar.reset();
        }
        bar.set_position(percent);
        bar.set_message(progress.message.clone());
    })
}

/// Percentages are published as strings, sometimes with a fraction.
fn parse_percent(value: &str) -> u64 {
    value
        .trim()
        .trim_end_matches('%')
        .parse::<f64>()
        .map(|p| p.clamp(0.0, 100.0) as u64)
        .unwrap_or(0)
}
