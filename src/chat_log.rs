//! Append-only audit log of handled exchange commands.
//!
//! Line format: `YYYY-MM-DD HH:MM:SS - <raw command text>`. The file is opened
//! in append mode for every entry and each entry goes out in a single write,
//! so concurrent connections may interleave lines but never split one.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::error::Result;

pub const DEFAULT_LOG_FILE: &str = "chat_log.txt";

pub struct ChatLog {
    path: PathBuf,
}

impl ChatLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one timestamped line for `command`, creating the file if needed.
    pub async fn append(&self, command: &str) -> Result<()> {
        let line = format_entry(Local::now().naive_local(), command);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Render one log line, newline-terminated. Line breaks inside `command`
/// become spaces so an entry is always exactly one line.
#[must_use]
pub fn format_entry(at: NaiveDateTime, command: &str) -> String {
    let flat: String = command
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    format!("{} - {flat}\n", at.format("%Y-%m-%d %H:%M:%S"))
}
