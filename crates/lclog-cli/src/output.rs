//! Console renderers and the artifact sink that collects matched entries.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::anyhow;
use chrono::{Datelike, Timelike};
use clap::ValueEnum;
use lclog_api_models::LogEntry;
use serde_json::Value;

use crate::client::{CliError, CliResult};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl OutputFormat {
    /// Status lines share stdout with tables; JSON keeps stdout for the array.
    pub(crate) const fn notices_on_stdout(self) -> bool {
        matches!(self, Self::Table)
    }
}

/// Print a status line on the stream `format` leaves free for humans.
pub(crate) fn notice(format: OutputFormat, message: &str) {
    if format.notices_on_stdout() {
        println!("{message}");
    } else {
        eprintln!("{message}");
    }
}

/// `- Data collection timestamp: M-D-YYYY  H:M:S`, unpadded local time.
pub(crate) fn collection_timestamp<T: Datelike + Timelike>(now: &T) -> String {
    format!(
        "- Data collection timestamp: {}-{}-{}  {}:{}:{}",
        now.month(),
        now.day(),
        now.year(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

/// Render one field value: strings verbatim, everything else as compact JSON.
#[must_use]
pub(crate) fn format_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// `name: value` lines for every top-level field, in server order.
#[must_use]
pub(crate) fn entry_lines(entry: &LogEntry) -> Vec<String> {
    entry
        .fields()
        .map(|(name, value)| format!("{name}: {}", format_value(value)))
        .collect()
}

fn print_entry(entry: &LogEntry) {
    for line in entry_lines(entry) {
        println!("{line}");
    }
    println!();
}

/// Print collected entries as one JSON array so stdout stays machine-readable.
pub(crate) fn render_entries_json(entries: &[LogEntry]) -> CliResult<()> {
    let text = serde_json::to_string_pretty(entries)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    println!("{text}");
    Ok(())
}

/// How the sink ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SinkOutcome {
    /// Entries were written to the artifact at `path`.
    Written { path: PathBuf, count: usize },
    /// Nothing matched and the artifact was removed.
    Removed { path: PathBuf },
    /// No artifact for this mode; entries went to the console only.
    ConsoleOnly { count: usize },
}

struct Artifact {
    path: PathBuf,
    writer: BufWriter<File>,
    keep_empty: bool,
}

/// Accumulates matched entries and mirrors them into an optional text
/// artifact. Table output is echoed live; JSON output is printed on finalize.
pub(crate) struct Sink {
    format: OutputFormat,
    artifact: Option<Artifact>,
    matches: Vec<LogEntry>,
}

impl Sink {
    pub(crate) const fn console(format: OutputFormat) -> Self {
        Self {
            format,
            artifact: None,
            matches: Vec::new(),
        }
    }

    /// Create (or truncate) `path` and write the collection header.
    pub(crate) fn with_artifact(
        path: &Path,
        format: OutputFormat,
        keep_empty: bool,
        header: &str,
    ) -> CliResult<Self> {
        let file = File::create(path).map_err(|err| {
            CliError::failure(anyhow!("failed to create '{}': {err}", path.display()))
        })?;
        let mut writer = BufWriter::new(file);
        write!(writer, "{header}\n\n\n").map_err(|err| write_error(path, &err))?;

        Ok(Self {
            format,
            artifact: Some(Artifact {
                path: path.to_path_buf(),
                writer,
                keep_empty,
            }),
            matches: Vec::new(),
        })
    }

    pub(crate) fn record(&mut self, entry: LogEntry) -> CliResult<()> {
        if self.format == OutputFormat::Table {
            print_entry(&entry);
        }
        if let Some(artifact) = self.artifact.as_mut() {
            for line in entry_lines(&entry) {
                writeln!(artifact.writer, "{line}")
                    .map_err(|err| write_error(&artifact.path, &err))?;
            }
            writeln!(artifact.writer).map_err(|err| write_error(&artifact.path, &err))?;
        }
        self.matches.push(entry);
        Ok(())
    }

    pub(crate) fn count(&self) -> usize {
        self.matches.len()
    }

    #[cfg(test)]
    pub(crate) fn matches(&self) -> &[LogEntry] {
        &self.matches
    }

    /// Flush and close the artifact, removing it when nothing matched.
    pub(crate) fn finalize(self) -> CliResult<SinkOutcome> {
        let count = self.matches.len();
        if self.format == OutputFormat::Json {
            render_entries_json(&self.matches)?;
        }
        let Some(Artifact {
            path,
            mut writer,
            keep_empty,
        }) = self.artifact
        else {
            return Ok(SinkOutcome::ConsoleOnly { count });
        };

        writer.flush().map_err(|err| write_error(&path, &err))?;
        drop(writer);

        if count == 0 && !keep_empty {
            fs::remove_file(&path).map_err(|err| {
                CliError::failure(anyhow!("failed to remove '{}': {err}", path.display()))
            })?;
            return Ok(SinkOutcome::Removed { path });
        }
        Ok(SinkOutcome::Written { path, count })
    }
}

fn write_error(path: &Path, err: &std::io::Error) -> CliError {
    CliError::failure(anyhow!("failed to write '{}': {err}", path.display()))
}
