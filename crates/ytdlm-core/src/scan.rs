use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::cancel::{self, CancellationToken};
use crate::error::{LibraryError, Result};

/// Recursively collect every file under `root` whose name ends with `.<ext>`
/// (case-sensitive).
///
/// A missing root yields an empty list. An unreadable directory aborts the scan:
/// partial results would misrepresent the library.
///
/// Symbolic links are not descended into, so link cycles cannot occur. A link
/// to a regular file counts as that file. Dangling links and links to
/// directories are ignored.
/// Order follows directory-entry order and is not sorted.
pub fn find_by_extension(
    root: &Path,
    ext: &str,
    cancel: Option<&CancellationToken>,
) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        debug!("Scan root {} does not exist", root.display());
        return Ok(Vec::new());
    }

    let suffix = format!(".{}", ext);
    let mut found = Vec::new();
    find_recursive(root, &suffix, cancel, &mut found)?;
    info!("Found {} '{}' file(s) under {}", found.len(), suffix, root.display());
    Ok(found)
}

fn find_recursive(
    dir: &Path,
    suffix: &str,
    cancel: Option<&CancellationToken>,
    found: &mut Vec<PathBuf>,
) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| LibraryError::io(dir, e))?;
    for entry in entries {
        cancel::checkpoint(cancel)?;
        let entry = entry.map_err(|e| LibraryError::io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| LibraryError::io(&path, e))?;
        if file_type.is_dir() {
            find_recursive(&path, suffix, cancel, found)?;
            continue;
        }
        if !entry.file_name().to_string_lossy().ends_with(suffix) {
            continue;
        }
        if file_type.is_symlink() && !fs::metadata(&path).is_ok_and(|m| m.is_file()) {
            debug!("Ignoring link {} (dangling or not a file)", path.display());
            continue;
        }
        found.push(path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_root_is_empty() {
        let dir = tempdir().unwrap();
        let found = find_by_extension(&dir.path().join("nope"), "mp4", None).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_finds_only_matching_extension() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("a/b")).unwrap();
        for name in ["one.mp4", "a/two.mp4", "a/b/three.mp4"] {
            fs::write(root.join(name), b"v").unwrap();
        }
        for name in ["one.info.json", "a/two.jpg", "a/b/clip.MP4", "a/b/mp4", "x.mp3"] {
            fs::write(root.join(name), b"x").unwrap();
        }

        let mut found = find_by_extension(root, "mp4", None).unwrap();
        found.sort();
        assert_eq!(found.len(), 3);
        assert!(found.iter().all(|p| p.to_string_lossy().ends_with(".mp4")));
        assert_eq!(
            found,
            vec![root.join("a/b/three.mp4"), root.join("a/two.mp4"), root.join("one.mp4")]
        );
    }

    #[test]
    fn test_cancelled_scan() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("one.mp3"), b"a").unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let result = find_by_extension(dir.path(), "mp3", Some(&token));
        assert!(matches!(result, Err(LibraryError::Cancelled)));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_do_not_abort_scan() {
        use std::os::unix::fs::symlink;

        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub/real.mp4"), b"v").unwrap();
        symlink(root.join("sub/real.mp4"), root.join("linked.mp4")).unwrap();
        symlink(root.join("gone.mp4"), root.join("dangling.mp4")).unwrap();
        // Cycle back to the root
        symlink(root, root.join("sub/loop")).unwrap();

        let mut found = find_by_extension(root, "mp4", None).unwrap();
        found.sort();
        assert_eq!(found, vec![root.join("linked.mp4"), root.join("sub/real.mp4")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_subtree_aborts() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("hidden.mp4"), b"v").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Root bypasses permission bits; only assert when the lock is effective
        let effective = fs::read_dir(&locked).is_err();
        let result = find_by_extension(dir.path(), "mp4", None);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        if effective {
            assert!(matches!(result, Err(LibraryError::Io { .. })));
        }
    }
}
