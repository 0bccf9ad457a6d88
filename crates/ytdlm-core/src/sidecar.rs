use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use log::debug;
use serde::de::DeserializeOwned;

use crate::descriptor::MetadataDescriptor;
use crate::error::{LibraryError, Result};
use crate::media_type::MediaType;

/// Metadata sidecar naming conventions, tried in order. `{ext}` is the media extension.
pub const METADATA_SUFFIXES: &[&str] = &[".info.json", ".{ext}.info.json"];

/// Thumbnail naming conventions, tried in order.
pub const THUMBNAIL_SUFFIXES: &[&str] = &[".jpg", ".webp", ".png"];

fn expand(id: &str, suffix: &str, media_type: MediaType, root: &Path) -> PathBuf {
    let suffix = suffix.replace("{ext}", media_type.extension());
    root.join(format!("{}{}", id, suffix))
}

/// Candidate paths for `templates`, in lookup order.
pub fn candidates(
    id: &str,
    media_type: MediaType,
    root: &Path,
    templates: &[&str],
) -> Vec<PathBuf> {
    templates
        .iter()
        .map(|suffix| expand(id, suffix, media_type, root))
        .collect()
}

/// Every metadata sidecar path the item may have, primary convention first.
pub fn metadata_candidates(id: &str, media_type: MediaType, root: &Path) -> Vec<PathBuf> {
    candidates(id, media_type, root, METADATA_SUFFIXES)
}

/// Find and parse the sidecar for `id`. The primary convention wins when both exist.
///
/// `Ok(None)` means no sidecar: the download is not finished, skip the file.
pub fn resolve_metadata(
    id: &str,
    media_type: MediaType,
    root: &Path,
) -> Result<Option<MetadataDescriptor>> {
    resolve_metadata_as(id, media_type, root)
}

/// [`resolve_metadata`] into any JSON shape, e.g. a raw `serde_json::Map`.
pub fn resolve_metadata_as<T: DeserializeOwned>(
    id: &str,
    media_type: MediaType,
    root: &Path,
) -> Result<Option<T>> {
    for path in metadata_candidates(id, media_type, root) {
        // A sidecar deleted mid-scan reads as absent
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(LibraryError::io(&path, e)),
        };
        debug!("Using sidecar {}", path.display());
        return parse_descriptor(file, &path).map(Some);
    }
    Ok(None)
}

/// Read one sidecar file.
pub fn read_descriptor(path: &Path) -> Result<MetadataDescriptor> {
    let file = File::open(path).map_err(|e| LibraryError::io(path, e))?;
    parse_descriptor(file, path)
}

fn parse_descriptor<T: DeserializeOwned>(file: File, path: &Path) -> Result<T> {
    serde_json::from_reader(BufReader::new(file)).map_err(|source| {
        if source.is_io() {
            LibraryError::io(path, source.into())
        } else {
            LibraryError::Parse {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

/// First existing thumbnail for `id`, probing `.jpg`, `.webp`, `.png` in order.
pub fn resolve_thumbnail(id: &str, media_type: MediaType, root: &Path) -> Option<PathBuf> {
    candidates(id, media_type, root, THUMBNAIL_SUFFIXES)
        .into_iter()
        .find(|path| path.is_file())
}
