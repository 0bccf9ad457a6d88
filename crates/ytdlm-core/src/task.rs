//! Async entry points for hosts running on tokio.
//!
//! Each call runs on the blocking pool, so a slow scan never stalls the
//! reactor. Dropping the returned future cancels the work through its token.

use std::path::PathBuf;

use crate::archive;
use crate::cancel::CancellationToken;
use crate::descriptor::MetadataDescriptor;
use crate::error::{LibraryError, Result};
use crate::index::{self, IndexOutcome};
use crate::maintain;
use crate::media_type::MediaType;
use crate::sidecar;

async fn run_blocking<T, F>(cancel: CancellationToken, work: F) -> Result<T>
where
    F: FnOnce(CancellationToken) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let guard = cancel.drop_guard();
    let joined = tokio::task::spawn_blocking(move || work(cancel)).await;
    guard.disarm();
    joined.map_err(|e| LibraryError::TaskJoin(e.to_string()))?
}

/// [`index::build_index`] on the blocking pool.
pub async fn index_task(
    root: PathBuf,
    media_type: MediaType,
    full_metadata: bool,
    cancel: CancellationToken,
) -> Result<IndexOutcome> {
    run_blocking(cancel, move |token| {
        index::build_index(&root, media_type, full_metadata, Some(&token))
    })
    .await
}

/// [`archive::build_archive`] on the blocking pool.
pub async fn archive_task(
    destination: PathBuf,
    files: Vec<PathBuf>,
    cancel: CancellationToken,
) -> Result<PathBuf> {
    run_blocking(cancel, move |token| {
        archive::build_archive(&destination, &files, Some(&token))
    })
    .await
}

/// [`sidecar::resolve_metadata`] on the blocking pool.
pub async fn resolve_metadata_task(
    id: String,
    media_type: MediaType,
    root: PathBuf,
) -> Result<Option<MetadataDescriptor>> {
    run_blocking(CancellationToken::new(), move |_| {
        sidecar::resolve_metadata(&id, media_type, &root)
    })
    .await
}

/// [`sidecar::resolve_thumbnail`] on the blocking pool.
pub async fn resolve_thumbnail_task(
    id: String,
    media_type: MediaType,
    root: PathBuf,
) -> Result<Option<PathBuf>> {
    run_blocking(CancellationToken::new(), move |_| {
        Ok(sidecar::resolve_thumbnail(&id, media_type, &root))
    })
    .await
}

/// [`maintain::normalize_permissions`] on the blocking pool.
pub async fn normalize_permissions_task(
    id: String,
    media_type: MediaType,
    root: PathBuf,
) -> Result<()> {
    run_blocking(CancellationToken::new(), move |_| {
        maintain::normalize_permissions(&id, media_type, &root)
    })
    .await
}

/// [`maintain::delete_metadata`] on the blocking pool.
pub async fn delete_metadata_task(id: String, media_type: MediaType, root: PathBuf) -> Result<()> {
    run_blocking(CancellationToken::new(), move |_| {
        maintain::delete_metadata(&id, media_type, &root)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_index_task() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.mp4"), b"a").unwrap();
        fs::write(dir.path().join("a.info.json"), r#"{"title": "A"}"#).unwrap();

        let token = CancellationToken::new();
        let outcome = index_task(dir.path().to_path_buf(), MediaType::Video, false, token.clone())
            .await
            .unwrap();
        assert_eq!(outcome.entries.len(), 1);
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn test_archive_task_cancelled() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.mp4"), b"a").unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let result = archive_task(
            dir.path().join("out.zip"),
            vec![dir.path().join("a.mp4")],
            token,
        )
        .await;
        assert!(matches!(result, Err(LibraryError::Cancelled)));
    }

    #[tokio::test]
    async fn test_resolve_tasks() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.info.json"), r#"{"title": "A"}"#).unwrap();
        fs::write(dir.path().join("a.webp"), b"w").unwrap();

        let descriptor = resolve_metadata_task("a".to_string(), MediaType::Video, dir.path().to_path_buf())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(descriptor.title.as_deref(), Some("A"));

        let thumbnail = resolve_thumbnail_task("a".to_string(), MediaType::Video, dir.path().to_path_buf())
            .await
            .unwrap();
        assert_eq!(thumbnail, Some(dir.path().join("a.webp")));

        let missing = resolve_metadata_task("b".to_string(), MediaType::Video, dir.path().to_path_buf())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_normalize_permissions_task() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let sidecar = dir.path().join("a.info.json");
        fs::write(&sidecar, "{}").unwrap();
        fs::set_permissions(&sidecar, fs::Permissions::from_mode(0o600)).unwrap();

        normalize_permissions_task("a".to_string(), MediaType::Video, dir.path().to_path_buf())
            .await
            .unwrap();
        let mode = fs::metadata(&sidecar).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[tokio::test]
    async fn test_delete_metadata_task() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.info.json"), "{}").unwrap();
        delete_metadata_task("a".to_string(), MediaType::Video, dir.path().to_path_buf())
            .await
            .unwrap();
        assert!(!dir.path().join("a.info.json").exists());
    }
}
