//! Output formatting for the CLI

use anyhow::Result;
use console::{style, Style};
use serde::Serialize;
use std::fmt::Display;
use tabled::{settings::Style as TableStyle, Table, Tabled};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Format and print rows in the specified format
pub fn print_output<T: Serialize + Tabled>(data: &[T], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            if data.is_empty() {
                println!("{}", style("No results found").dim());
            } else {
                let table = Table::new(data).with(TableStyle::rounded()).to_string();
                println!("{}", table);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(data)?),
    }
    Ok(())
}

/// Print a single item as JSON
pub fn print_json<T: Serialize + ?Sized>(data: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

/// Success message
pub fn success(msg: impl Display) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Warning message
pub fn warning(msg: impl Display) {
    eprintln!("{} {}", style("⚠").yellow().bold(), msg);
}

/// Error message
pub fn error(msg: impl Display) {
    eprintln!("{} {}", style("error:").red().bold(), msg);
}

/// Print a key-value pair
pub fn print_kv(key: &str, value: impl Display) {
    let key_style = Style::new().cyan().bold();
    println!("{}: {}", key_style.apply_to(key), value);
}

/// Print a section header
pub fn print_header(title: &str) {
    println!();
    println!("{}", style(title).bold().underlined());
    println!();
}

/// Status indicator with color
pub fn status_indicator(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "running" => format!("{}", style(status).green()),
        "paused" | "suspended" => format!("{}", style(status).yellow()),
        "stopped" | "unknown" => format!("{}", style(status).red()),
        _ => status.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_indicator_keeps_text() {
        console::set_colors_enabled(false);
        assert_eq!(status_indicator("running"), "running");
        assert_eq!(status_indicator("migrating"), "migrating");
    }
}
