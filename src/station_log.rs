//! Durable station arrival log.
//!
//! One line per arrival, appended and synced to disk immediately so the log
//! survives a crash or power loss at the ground station.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use link_core::StationArrival;

/// Default log file name, relative to the working directory.
pub const DEFAULT_STATION_LOG: &str = "station_log.txt";

/// Render one log line, without the trailing newline.
#[must_use]
pub fn format_entry<Tz: TimeZone>(station_index: u8, timestamp: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "[{}] 抵达站点: 第{}站 | 执行停靠程序",
        timestamp.format("%H:%M:%S"),
        station_index
    )
}

/// Append-only station log file.
#[derive(Debug)]
pub struct StationLog {
    path: PathBuf,
    file: File,
}

impl StationLog {
    /// Open (or create) the log for appending.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one arrival and force it to disk.
    pub fn record(&mut self, arrival: &StationArrival) -> io::Result<()> {
        let line = format_entry(arrival.station_index, &arrival.timestamp);
        writeln!(self.file, "{}", line)?;
        self.file.flush()?;
        self.file.sync_all()
    }
}
