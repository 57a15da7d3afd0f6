//! Re-register dropped tables whose metadata is still on disk after a restart.
//!
//! When a table is dropped its metadata file is moved into the
//! `metadata_dropped` directory as `<database>.<table>.<uuid>.sql`, with
//! database and table names percent-escaped. The file's modification time
//! is taken as the drop time, so the original grace deadline is kept.
//!
//! The metadata file becomes the entry's metadata path. The table's data is
//! found from its uuid by [`FsDeleter`](crate::delete::FsDeleter) when it
//! reclaims the entry.

use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::entry::TableIdentity;
use crate::error::RegistryError;
use crate::registry::DroppedTablesRegistry;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub recovered: usize,
    /// Files whose name could not be parsed
    pub skipped: usize,
    /// Tables that were already tracked
    pub duplicates: usize,
}

/// Scan `dir` and mark every dropped-table metadata file as dropped.
///
/// A missing directory is treated as empty.
pub async fn scan_metadata_dropped(
    dir: &Path,
    registry: &DroppedTablesRegistry,
    grace_period: Duration,
) -> Result<RecoveryReport> {
    let mut report = RecoveryReport::default();

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(dir = %dir.display(), "No metadata_dropped directory, nothing to recover");
            return Ok(report);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", dir.display()));
        }
    };

    while let Some(dir_entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("Failed to list {}", dir.display()))?
    {
        let path = dir_entry.path();
        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            report.skipped += 1;
            continue;
        };
        let Some(mut identity) = parse_file_name(file_name) else {
            warn!(path = %path.display(), "Unrecognized file in metadata_dropped, skipping");
            report.skipped += 1;
            continue;
        };

        let metadata = dir_entry
            .metadata()
            .await
            .with_context(|| format!("Failed to stat {}", path.display()))?;
        let dropped_at: DateTime<Utc> = metadata
            .modified()
            .map(DateTime::from)
            .unwrap_or_else(|_| Utc::now());

        // The engine is cosmetic; an unreadable file still gets reclaimed
        if let Ok(contents) = tokio::fs::read_to_string(&path).await {
            if let Some(engine) = parse_engine(&contents) {
                identity.engine = engine.to_string();
            }
        }

        let uuid = identity.uuid;
        match registry.mark_dropped(
            identity,
            path.to_string_lossy(),
            dropped_at,
            grace_period,
        ) {
            Ok(_) => report.recovered += 1,
            Err(RegistryError::AlreadyExists(_)) => {
                warn!(uuid = %uuid, path = %path.display(), "Dropped table already tracked");
                report.duplicates += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(
        dir = %dir.display(),
        recovered = report.recovered,
        skipped = report.skipped,
        duplicates = report.duplicates,
        "Recovered dropped tables"
    );

    Ok(report)
}

/// Parse `<database>.<table>.<uuid>.sql`.
fn parse_file_name(file_name: &str) -> Option<TableIdentity> {
    let stem = file_name.strip_suffix(".sql")?;
    let (names, uuid) = stem.rsplit_once('.')?;
    let uuid = Uuid::parse_str(uuid).ok()?;
    let (database, table) = names.split_once('.')?;
    if database.is_empty() || table.is_empty() {
        return None;
    }
    Some(TableIdentity::new(
        unescape_file_name(database)?,
        unescape_file_name(table)?,
        uuid,
    ))
}

/// Undo `%XX` escaping of a name component.
fn unescape_file_name(escaped: &str) -> Option<String> {
    let bytes = escaped.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = escaped.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

/// Extract the engine name from an `ENGINE = Name(...)` clause.
fn parse_engine(statement: &str) -> Option<&str> {
    let start = statement.find("ENGINE")? + "ENGINE".len();
    let rest = statement[start..].trim_start().strip_prefix('=')?.trim_start();
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    (end > 0).then(|| &rest[..end])
}
