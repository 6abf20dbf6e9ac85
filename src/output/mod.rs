use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use crate::cli::OutputFormat;
use crate::pipeline::TranscriptResult;

pub mod formatters;

pub use formatters::*;

pub fn render(result: &TranscriptResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(format_as_text(result)),
        OutputFormat::Json => format_as_json(result),
        OutputFormat::Srt => format_as_srt(result),
    }
}

/// Save transcript to file
pub async fn save_to_file(result: &TranscriptResult, path: &Path, format: OutputFormat) -> Result<()> {
    let content = render(result, format)?;
    fs_err::write(path, content)?;
    Ok(())
}

/// Print transcript to console
pub fn print_to_console(result: &TranscriptResult, format: OutputFormat) -> Result<()> {
    println!("{}", render(result, format)?);
    Ok(())
}

/// Pretty JSON to a file, or stdout when no path is given
pub fn write_json<T: Serialize>(value: &T, path: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match path {
        Some(path) => fs_err::write(path, json)?,
        None => println!("{}", json),
    }
    Ok(())
}
