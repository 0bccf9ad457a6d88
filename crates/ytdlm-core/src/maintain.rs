use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use crate::config::LibraryConfig;
use crate::error::{LibraryError, Result};
use crate::media_type::MediaType;
use crate::sidecar;

/// Mode applied to sidecars and thumbnails: owner read/write, everyone else read.
pub const METADATA_FILE_MODE: u32 = 0o644;

/// Thumbnail conventions whose permissions get normalized.
const PERMISSION_THUMBNAIL_SUFFIXES: &[&str] = &[".webp", ".jpg"];

fn permission_targets(id: &str, media_type: MediaType, root: &Path) -> Vec<PathBuf> {
    let mut targets = sidecar::metadata_candidates(id, media_type, root);
    targets.extend(sidecar::candidates(
        id,
        media_type,
        root,
        PERMISSION_THUMBNAIL_SUFFIXES,
    ));
    targets
}

/// Set sidecar and thumbnail files of `id` to [`METADATA_FILE_MODE`].
/// Missing files are skipped. Does nothing on platforms without Unix permissions.
#[cfg(unix)]
pub fn normalize_permissions(id: &str, media_type: MediaType, root: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    for path in permission_targets(id, media_type, root) {
        match fs::set_permissions(&path, fs::Permissions::from_mode(METADATA_FILE_MODE)) {
            Ok(()) => debug!("Set mode {:o} on {}", METADATA_FILE_MODE, path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(LibraryError::io(&path, e)),
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn normalize_permissions(id: &str, media_type: MediaType, root: &Path) -> Result<()> {
    debug!(
        "No owner/group permission model here, leaving {} files of '{}' untouched",
        permission_targets(id, media_type, root).len(),
        id
    );
    Ok(())
}

/// Delete both sidecar variants of `id`. Deleting what is not there is not an error.
pub fn delete_metadata(id: &str, media_type: MediaType, root: &Path) -> Result<()> {
    for path in sidecar::metadata_candidates(id, media_type, root) {
        match fs::remove_file(&path) {
            Ok(()) => debug!("Deleted {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(LibraryError::io(&path, e)),
        }
    }
    Ok(())
}

/// Metadata housekeeping bound to a [`LibraryConfig`].
#[derive(Debug, Clone)]
pub struct MetadataMaintainer {
    config: LibraryConfig,
}

impl MetadataMaintainer {
    pub fn new(config: LibraryConfig) -> Self {
        Self { config }
    }

    pub fn normalize_permissions(
        &self,
        id: &str,
        media_type: MediaType,
        root: Option<&Path>,
    ) -> Result<()> {
        normalize_permissions(id, media_type, self.config.resolve_root(media_type, root))
    }

    pub fn delete_metadata(&self, id: &str, media_type: MediaType, root: Option<&Path>) -> Result<()> {
        delete_metadata(id, media_type, self.config.resolve_root(media_type, root))
    }
}
