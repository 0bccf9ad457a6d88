use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::cancel::{self, CancellationToken};
use crate::config::LibraryConfig;
use crate::descriptor::MetadataDescriptor;
use crate::error::{LibraryError, Result};
use crate::media_type::MediaType;
use crate::paths;
use crate::record::MediaRecord;
use crate::scan;
use crate::sidecar;

/// One indexed item: a record, or the sidecar document as written (plus `id`)
/// when full metadata was asked for.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum IndexEntry {
    Record(MediaRecord),
    Full(Map<String, Value>),
}

impl IndexEntry {
    pub fn id(&self) -> Option<&str> {
        match self {
            IndexEntry::Record(record) => Some(&record.id),
            IndexEntry::Full(document) => document.get("id").and_then(Value::as_str),
        }
    }
}

/// A media file left out of the index because its sidecar could not be used.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of an index build
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexOutcome {
    pub entries: Vec<IndexEntry>,
    pub skipped: Vec<SkippedFile>,
}

impl IndexOutcome {
    /// Records only; empty in full-metadata mode.
    pub fn records(&self) -> impl Iterator<Item = &MediaRecord> {
        self.entries.iter().filter_map(|e| match e {
            IndexEntry::Record(record) => Some(record),
            IndexEntry::Full(_) => None,
        })
    }
}

enum FileOutcome {
    Entry(IndexEntry),
    Missing,
    Skipped(SkippedFile),
}

/// Build the index of every `media_type` file under `root` that has a sidecar.
///
/// Files without a sidecar are ignored. Malformed sidecars and files that
/// yield no valid record land in [`IndexOutcome::skipped`]. I/O failures and
/// cancellation abort the build.
/// Entries follow scan order.
pub fn build_index(
    root: &Path,
    media_type: MediaType,
    full_metadata: bool,
    cancel: Option<&CancellationToken>,
) -> Result<IndexOutcome> {
    if !root.exists() {
        return Ok(IndexOutcome::default());
    }

    let files = scan::find_by_extension(root, media_type.extension(), cancel)?;
    let outcomes: Vec<Result<FileOutcome>> = files
        .par_iter()
        .map(|file| {
            cancel::checkpoint(cancel)?;
            index_file(root, file, media_type, full_metadata)
        })
        .collect();

    let mut result = IndexOutcome::default();
    let mut missing = 0usize;
    for outcome in outcomes {
        match outcome? {
            FileOutcome::Entry(entry) => result.entries.push(entry),
            FileOutcome::Missing => missing += 1,
            FileOutcome::Skipped(skipped) => result.skipped.push(skipped),
        }
    }

    info!(
        "Indexed {} {} item(s) under {} ({} without metadata, {} skipped)",
        result.entries.len(),
        media_type,
        root.display(),
        missing,
        result.skipped.len()
    );
    Ok(result)
}

fn index_file(
    root: &Path,
    file: &Path,
    media_type: MediaType,
    full_metadata: bool,
) -> Result<FileOutcome> {
    match build_entry(root, file, media_type, full_metadata) {
        Err(err) if err.is_per_file() => {
            warn!("Skipping {}: {}", file.display(), err);
            Ok(FileOutcome::Skipped(SkippedFile {
                path: file.to_path_buf(),
                reason: err.to_string(),
            }))
        }
        other => other,
    }
}

fn build_entry(
    root: &Path,
    file: &Path,
    media_type: MediaType,
    full_metadata: bool,
) -> Result<FileOutcome> {
    let id = paths::relative_id(root, file);

    if full_metadata {
        let Some(mut document) =
            sidecar::resolve_metadata_as::<Map<String, Value>>(&id, media_type, root)?
        else {
            debug!("No metadata for {}, skipping", file.display());
            return Ok(FileOutcome::Missing);
        };
        document.insert("id".to_string(), Value::String(id));
        return Ok(FileOutcome::Entry(IndexEntry::Full(document)));
    }

    let Some(descriptor) = sidecar::resolve_metadata(&id, media_type, root)? else {
        debug!("No metadata for {}, skipping", file.display());
        return Ok(FileOutcome::Missing);
    };

    let size = match fs::metadata(file) {
        Ok(meta) => meta.len(),
        // Removed after the scan listed it
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(FileOutcome::Missing),
        Err(e) => return Err(LibraryError::io(file, e)),
    };
    let thumbnail = sidecar::resolve_thumbnail(&id, media_type, root);
    let record = MediaRecord::from_descriptor(
        id,
        file.to_path_buf(),
        size,
        media_type,
        &descriptor,
        thumbnail,
    )?;
    Ok(FileOutcome::Entry(IndexEntry::Record(record)))
}

/// Index builder bound to a [`LibraryConfig`].
#[derive(Debug, Clone)]
pub struct MediaIndexer {
    config: LibraryConfig,
}

impl MediaIndexer {
    pub fn new(config: LibraryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    /// Index `root`, or the configured folder for `media_type` when `root` is `None`.
    pub fn build_index(
        &self,
        root: Option<&Path>,
        media_type: MediaType,
        full_metadata: bool,
        cancel: Option<&CancellationToken>,
    ) -> Result<IndexOutcome> {
        build_index(
            self.config.resolve_root(media_type, root),
            media_type,
            full_metadata,
            cancel,
        )
    }

    pub fn resolve_metadata(
        &self,
        id: &str,
        media_type: MediaType,
        root: Option<&Path>,
    ) -> Result<Option<MetadataDescriptor>> {
        sidecar::resolve_metadata(id, media_type, self.config.resolve_root(media_type, root))
    }

    pub fn resolve_thumbnail(
        &self,
        id: &str,
        media_type: MediaType,
        root: Option<&Path>,
    ) -> Option<PathBuf> {
        sidecar::resolve_thumbnail(id, media_type, self.config.resolve_root(media_type, root))
    }
}
