//! Common utility functions shared across CLI commands.

use std::path::Path;

use anyhow::{Context, Result};
use birdtag_core::{FileType, TagMap};
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;

use crate::OutputFormat;

/// `--media` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MediaArg {
    Image,
    Video,
    Audio,
}

impl From<MediaArg> for FileType {
    fn from(media: MediaArg) -> Self {
        match media {
            MediaArg::Image => FileType::Image,
            MediaArg::Video => FileType::Video,
            MediaArg::Audio => FileType::Audio,
        }
    }
}

/// Parse `label=count` or a bare `label` (count 1).
pub fn parse_tag_arg(arg: &str) -> Result<(String, u32), String> {
    let (label, count) = match arg.split_once('=') {
        Some((label, count)) => {
            let count = count
                .trim()
                .parse::<u32>()
                .map_err(|_| format!("invalid count in '{arg}', expected a non-negative integer"))?;
            (label, count)
        }
        None => (arg, 1),
    };
    let label = label.trim();
    if label.is_empty() {
        return Err(format!("missing species label in '{arg}'"));
    }
    Ok((label.to_lowercase(), count))
}

/// Read an input file.
pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))
}

/// Where and how command results are printed
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl Output {
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Print a value as pretty JSON. Printed even in quiet mode.
    pub fn json<T: Serialize>(&self, value: &T) -> Result<()> {
        let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
        println!("{text}");
        Ok(())
    }

    /// Print a line of human-readable text unless quiet.
    pub fn line(&self, text: impl AsRef<str>) {
        if !self.quiet {
            println!("{}", text.as_ref());
        }
    }
}

/// `crow x2, pigeon x1`
pub fn format_tags(tags: &TagMap) -> String {
    if tags.is_empty() {
        return "(none)".dimmed().to_string();
    }
    tags.iter()
        .map(|(label, count)| format!("{label} x{count}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Print query or search results as text.
pub fn print_results(output: &Output, results: &[Value]) {
    if results.is_empty() {
        output.line("No matching files.".yellow().to_string());
        return;
    }
    output.line(format!("{} matching file(s):", results.len()).green().bold().to_string());
    for result in results {
        let tags: TagMap = serde_json::from_value(result["tags"].clone()).unwrap_or_default();
        output.line(format!(
            "   {} {} [{}] {}",
            "-".dimmed(),
            result["file_name"].as_str().unwrap_or("?"),
            result["file_type"].as_str().unwrap_or("?"),
            format_tags(&tags)
        ));
        if let Some(url) = result["display_url"].as_str() {
            output.line(format!("     {} {}", "url:".dimmed(), url));
        }
    }
}
