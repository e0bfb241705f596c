//! Flat "now playing" history export.
//!
//! ## Schema (tab-separated, one title per line)
//!
//!   timestamp  station  artist  song
//!
//! `timestamp` is RFC 3339 local time; `artist` may be empty.

use std::path::Path;

use chrono::{DateTime, Local};
use tokio::io::AsyncWriteExt;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Local>,
    pub station: String,
    pub artist: String,
    pub song: String,
}

impl HistoryEntry {
    pub fn to_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\n",
            self.timestamp.to_rfc3339(),
            clean_field(&self.station),
            clean_field(&self.artist),
            clean_field(&self.song),
        )
    }
}

/// Tabs and line breaks would break the row format.
fn clean_field(s: &str) -> String {
    s.chars()
        .map(|c| if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c })
        .collect()
}

pub async fn append_entry(path: &Path, entry: &HistoryEntry) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(entry.to_line().as_bytes()).await?;
    file.flush().await?;
    debug!("history: appended {:?} to {}", entry.song, path.display());
    Ok(())
}
