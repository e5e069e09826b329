//! JSONL telemetry log with size-bounded rotation

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::TelemetryConfig;
use crate::error::Result;
use crate::wire::telemetry::TelemetryRecord;

const FILE_PREFIX: &str = "telemetry_";
const FILE_EXTENSION: &str = "jsonl";

/// One line of the log
#[derive(Debug, Serialize)]
struct LogLine<'a> {
    timestamp: String,
    unit: u8,
    telemetry: &'a TelemetryRecord,
}

/// Appends telemetry records to rotating JSONL files
#[derive(Debug)]
pub struct TelemetryLogger {
    dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    writer: Option<BufWriter<File>>,
    current_path: Option<PathBuf>,
    records_in_file: usize,
    sequence: u32,
}

impl TelemetryLogger {
    /// Create the log directory if needed. No file is opened until the first
    /// record arrives.
    pub fn new<P: AsRef<Path>>(dir: P, max_records_per_file: usize, max_files_to_keep: usize) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        Ok(Self {
            dir,
            max_records_per_file: max_records_per_file.max(1),
            max_files_to_keep: max_files_to_keep.max(1),
            writer: None,
            current_path: None,
            records_in_file: 0,
            sequence: 0,
        })
    }

    pub fn from_config(config: &TelemetryConfig) -> Result<Self> {
        Self::new(&config.log_dir, config.max_records_per_file, config.max_files_to_keep)
    }

    /// Append one record, rotating first if the current file is full
    pub fn log(&mut self, unit: u8, record: &TelemetryRecord) -> Result<()> {
        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }

        let line = LogLine {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            unit,
            telemetry: record,
        };

        if let Some(writer) = self.writer.as_mut() {
            serde_json::to_writer(&mut *writer, &line).map_err(io::Error::from)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }

        self.records_in_file += 1;
        Ok(())
    }

    /// File currently written to
    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    fn rotate(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }

        self.sequence = self.sequence.wrapping_add(1);
        let name = format!(
            "{}{}_{:04}.{}",
            FILE_PREFIX,
            Utc::now().format("%Y%m%d_%H%M%S"),
            self.sequence,
            FILE_EXTENSION
        );
        let path = self.dir.join(name);

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!("Telemetry log: {}", path.display());

        self.writer = Some(BufWriter::new(file));
        self.current_path = Some(path);
        self.records_in_file = 0;

        self.prune()
    }

    /// Delete the oldest log files beyond the retention limit
    fn prune(&self) -> Result<()> {
        let mut logs = self.log_files()?;
        if logs.len() <= self.max_files_to_keep {
            return Ok(());
        }

        logs.sort();
        let excess = logs.len() - self.max_files_to_keep;
        for old in logs.into_iter().take(excess) {
            match fs::remove_file(&old) {
                Ok(()) => debug!("Removed old telemetry log {}", old.display()),
                Err(e) => warn!("Failed to remove {}: {}", old.display(), e),
            }
        }
        Ok(())
    }

    fn log_files(&self) -> Result<Vec<PathBuf>> {
        let mut logs = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_log = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(FILE_PREFIX))
                && path.extension().is_some_and(|ext| ext == FILE_EXTENSION);
            if is_log {
                logs.push(path);
            }
        }
        Ok(logs)
    }
}

impl Drop for TelemetryLogger {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            let _ = writer.flush();
        }
    }
}
