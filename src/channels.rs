use std::path::Path;

use anyhow::{Context, Result};

/// Static metadata for a channel, carried through to the playlist unchanged.
///
/// Comes from a `name|group|logo|epg_id` line in the channel list; trailing
/// fields are optional and default to empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub name: String,
    pub group: String,
    pub logo: String,
    pub epg_id: String,
}

/// One record of the channel list, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRecord {
    /// Metadata line for the channel URL that follows it
    Info(ChannelInfo),
    /// A channel page URL whose stream needs resolving
    Url(String),
}

/// Parses channel list text into ordered records.
///
/// Blank lines and `~~` comment lines are skipped. Lines starting with
/// `https:` are channel URLs; everything else is a `|`-separated metadata
/// record. No line shape is rejected - a metadata line with missing fields
/// just gets blanks.
#[must_use]
pub fn parse_channel_list(input: &str) -> Vec<ChannelRecord> {
    let mut records = Vec::new();

    for line in input.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("~~") {
            continue;
        }

        if line.starts_with("https:") {
            records.push(ChannelRecord::Url(line.to_string()));
            continue;
        }

        let mut fields = line.split('|');
        let field = |f: Option<&str>| f.unwrap_or_default().trim().to_string();
        records.push(ChannelRecord::Info(ChannelInfo {
            name: field(fields.next()),
            group: field(fields.next()),
            logo: field(fields.next()),
            epg_id: field(fields.next()),
        }));
    }

    records
}

/// Reads and parses a channel list file
///
/// # Errors
/// Errors when the file cannot be read. Individual records never fail.
pub async fn read_channel_list(path: &Path) -> Result<Vec<ChannelRecord>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Reading channel list {}", path.display()))?;

    Ok(parse_channel_list(&raw))
}
