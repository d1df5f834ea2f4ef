// Exam response sync. Responses already on disk are never fetched twice:
// every run scans the output folder, asks the server for the full id list
// and downloads only the difference in a single batch request.

use crate::api::json_text;
use crate::error::ApiError;
use crate::resource::ExamResources;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const SYNC_FILE_PREFIX: &str = "crowdaq_assignment_sync_";
pub const SYNC_FILE_SUFFIX: &str = ".json";

/// Where responses come from. Implemented by exam accessors; tests plug in
/// an in-memory source.
pub trait ResponseSource {
    fn list_responses(&self, exam: &str) -> Result<Option<Value>, ApiError>;
    fn get_responses(&self, exam: &str, ids: &[String]) -> Result<Option<Value>, ApiError>;
}

impl ResponseSource for ExamResources<'_, '_> {
    fn list_responses(&self, exam: &str) -> Result<Option<Value>, ApiError> {
        ExamResources::list_responses(self, exam)
    }

    fn get_responses(&self, exam: &str, ids: &[String]) -> Result<Option<Value>, ApiError> {
        ExamResources::get_responses(self, exam, ids)
    }
}

/// Response ids found in earlier sync files.
#[derive(Debug, Default)]
pub struct LocalResponses {
    pub ids: BTreeSet<String>,
    /// Sync files that could not be read or parsed.
    pub skipped: Vec<PathBuf>,
}

#[derive(Debug)]
pub struct SyncOutcome {
    pub local: usize,
    pub server: usize,
    pub fetched: usize,
    pub written: Option<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

fn is_sync_file(name: &str) -> bool {
    name.starts_with(SYNC_FILE_PREFIX) && name.ends_with(SYNC_FILE_SUFFIX)
}

fn read_records(path: &Path) -> Result<Vec<Value>> {
    let data = fs::read_to_string(path)?;
    let records: Vec<Value> = serde_json::from_str(&data)?;
    Ok(records)
}

/// Collect the `pid` of every record in the sync files under `dir`.
/// A broken file is logged and skipped; it does not abort the scan.
pub fn scan_downloaded(dir: &Path) -> Result<LocalResponses> {
    let mut local = LocalResponses::default();
    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?;
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        if !is_sync_file(&name.to_string_lossy()) {
            continue;
        }
        let path = entry.path();
        match read_records(&path) {
            Ok(records) => {
                local
                    .ids
                    .extend(records.iter().filter_map(|r| r.get("pid")).map(json_text));
            }
            Err(e) => {
                warn!("File {} cannot be loaded: {}", path.display(), e);
                local.skipped.push(path);
            }
        }
    }
    Ok(local)
}

/// Ids listed under `results` in a `list_responses` body.
pub fn server_ids(listing: &Value) -> BTreeSet<String> {
    listing
        .get("results")
        .and_then(Value::as_array)
        .map(|ids| ids.iter().map(json_text).collect())
        .unwrap_or_default()
}

pub fn pending_ids(server: &BTreeSet<String>, local: &BTreeSet<String>) -> Vec<String> {
    server.difference(local).cloned().collect()
}

pub fn sync_file_name(now: &DateTime<Local>) -> String {
    format!(
        "{}{}{}",
        SYNC_FILE_PREFIX,
        now.format("%Y-%m-%d-%H-%M-%S"),
        SYNC_FILE_SUFFIX
    )
}

/// Create a new sync file in `dir`. If a file for the same second already
/// exists, a `-1`, `-2`, ... suffix is added; existing files are never
/// truncated.
fn create_sync_file(dir: &Path, now: &DateTime<Local>) -> Result<(PathBuf, File)> {
    let name = sync_file_name(now);
    let stem = name.trim_end_matches(SYNC_FILE_SUFFIX);
    let mut attempt = 0u32;
    loop {
        let path = if attempt == 0 {
            dir.join(&name)
        } else {
            dir.join(format!("{}-{}{}", stem, attempt, SYNC_FILE_SUFFIX))
        };
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to create {}", path.display()))
            }
        }
    }
}

/// Bring `dir` up to date with the responses of `exam`.
pub fn sync_responses<S: ResponseSource + ?Sized>(
    source: &S,
    exam: &str,
    dir: &Path,
    now: DateTime<Local>,
) -> Result<SyncOutcome> {
    let local = scan_downloaded(dir)?;
    info!("Found {} records downloaded.", local.ids.len());

    let listing = match source.list_responses(exam)? {
        Some(v) => v,
        None => bail!("Exam {} not found", exam),
    };
    let server = server_ids(&listing);
    info!("Server has total {} responses.", server.len());

    let pending = pending_ids(&server, &local.ids);
    info!("{} records will be downloaded now.", pending.len());

    let mut outcome = SyncOutcome {
        local: local.ids.len(),
        server: server.len(),
        fetched: pending.len(),
        written: None,
        skipped: local.skipped,
    };
    if pending.is_empty() {
        return Ok(outcome);
    }

    let all = match source.get_responses(exam, &pending)? {
        Some(v) => v,
        None => bail!("Responses of exam {} not found", exam),
    };
    let results = all
        .get("results")
        .cloned()
        .unwrap_or_else(|| Value::Array(Vec::new()));

    let (path, mut file) = create_sync_file(dir, &now)?;
    file.write_all(serde_json::to_string_pretty(&results)?.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    outcome.written = Some(path);
    Ok(outcome)
}
