//! # Output Formatting
//!
//! Rendering of command results for humans (text) and scripts (JSON).
//!
//! The JSON change report is the model's change set as-is:
//!
//! ```json
//! {"pages": {"added": [{"type": "doc", "url": "/url1", "title": "foo bar"}], "modified": []}}
//! ```

use std::io::Write;

use anyhow::Result;
use colored::Colorize;
use docsync_core::{Changes, PageMeta, RepositoryRef};

/// Output format options supported by the CLI
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text (default on a terminal)
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Write the change report of a sync run.
pub fn write_changes<W: Write>(mut writer: W, changes: &Changes, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, changes)?;
            writeln!(writer)?;
        },
        OutputFormat::Text => {
            if changes.pages.is_empty() {
                writeln!(writer, "{} No pages changed", "ℹ".blue())?;
                return Ok(());
            }
            write_section(&mut writer, "Added", "+".green().to_string(), &changes.pages.added)?;
            write_section(
                &mut writer,
                "Modified",
                "~".yellow().to_string(),
                &changes.pages.modified,
            )?;
        },
    }
    Ok(())
}

fn write_section<W: Write>(
    writer: &mut W,
    heading: &str,
    marker: String,
    pages: &[PageMeta],
) -> Result<()> {
    if pages.is_empty() {
        return Ok(());
    }
    writeln!(writer, "{} ({}):", heading.bold(), pages.len())?;
    for page in pages {
        match &page.title {
            Some(title) => writeln!(writer, "  {marker} {}  {}", page.url, title.dimmed())?,
            None => writeln!(writer, "  {marker} {}", page.url)?,
        }
    }
    Ok(())
}

/// Write a parsed repository reference.
pub fn write_reference<W: Write>(
    mut writer: W,
    reference: &RepositoryRef,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, reference)?;
            writeln!(writer)?;
        },
        OutputFormat::Text => {
            writeln!(writer, "host:  {}", reference.host)?;
            writeln!(writer, "owner: {}", reference.owner)?;
            writeln!(writer, "repo:  {}", reference.repo)?;
            writeln!(writer, "ref:   {}", reference.git_ref)?;
            writeln!(writer, "path:  {}", reference.path)?;
        },
    }
    Ok(())
}
