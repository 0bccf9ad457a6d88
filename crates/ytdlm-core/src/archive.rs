use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};

use chrono::{Datelike, Local, Timelike};
use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::cancel::{self, CancellationToken};
use crate::error::{LibraryError, Result};
use crate::record::MediaRecord;

/// Entries at or above this size need zip64 headers.
const LARGE_FILE_THRESHOLD: u64 = 0xFFFF_FFFF;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

enum Placement {
    Write(String),
    /// Same bytes already stored under this entry name
    Duplicate(String),
}

/// Entry names handed out so far. Colliding base names get `stem(n).ext`,
/// unless the content matches an entry already stored for that base name.
#[derive(Default)]
struct EntryNames {
    used: HashSet<String>,
    by_base: HashMap<String, Vec<(String, PathBuf)>>,
    digests: HashMap<PathBuf, String>,
}

impl EntryNames {
    fn place(&mut self, source: &Path, base: &str) -> Result<Placement> {
        let stored = self.by_base.get(base).cloned().unwrap_or_default();
        if !stored.is_empty() {
            let digest = self.digest(source)?;
            for (name, other) in &stored {
                if self.digest(other)? == digest {
                    return Ok(Placement::Duplicate(name.clone()));
                }
            }
        }

        let name = if stored.is_empty() && !self.used.contains(base) {
            base.to_string()
        } else {
            self.suffixed(base)
        };
        self.used.insert(name.clone());
        self.by_base
            .entry(base.to_string())
            .or_default()
            .push((name.clone(), source.to_path_buf()));
        Ok(Placement::Write(name))
    }

    fn suffixed(&self, base: &str) -> String {
        let stem = Path::new(base)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("file");
        let ext = Path::new(base)
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("");

        let mut counter = 1u32;
        loop {
            let candidate = if ext.is_empty() {
                format!("{}({})", stem, counter)
            } else {
                format!("{}({}).{}", stem, counter, ext)
            };
            if !self.used.contains(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }

    fn digest(&mut self, path: &Path) -> Result<String> {
        if let Some(digest) = self.digests.get(path) {
            return Ok(digest.clone());
        }
        let mut file = File::open(path).map_err(|e| LibraryError::io(path, e))?;
        let mut hasher = Sha256::new();
        io::copy(&mut file, &mut hasher).map_err(|e| LibraryError::io(path, e))?;
        let digest = hex::encode(hasher.finalize());
        self.digests.insert(path.to_path_buf(), digest.clone());
        Ok(digest)
    }
}

fn entry_options(meta: &fs::Metadata) -> SimpleFileOptions {
    let mut options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9))
        .large_file(meta.len() >= LARGE_FILE_THRESHOLD);

    if let Ok(modified) = meta.modified() {
        let local: chrono::DateTime<Local> = modified.into();
        let stamp = zip::DateTime::from_date_and_time(
            local.year().clamp(1980, 2107) as u16,
            local.month() as u8,
            local.day() as u8,
            local.hour() as u8,
            local.minute() as u8,
            local.second() as u8,
        );
        if let Ok(stamp) = stamp {
            options = options.last_modified_time(stamp);
        }
    }
    options
}

fn base_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            LibraryError::io(
                path,
                io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
            )
        })
}

/// Stream `files` into a deflate zip at `destination`, each stored under its base name.
///
/// Returns once the archive is finished and flushed to disk. On error or
/// cancellation the partial file is removed, so an archive found at
/// `destination` is always complete.
pub fn build_archive<P: AsRef<Path>>(
    destination: &Path,
    files: &[P],
    cancel: Option<&CancellationToken>,
) -> Result<PathBuf> {
    let output = File::create(destination).map_err(|e| LibraryError::io(destination, e))?;
    let mut zip = ZipWriter::new(output);

    let written = match write_entries(&mut zip, destination, files, cancel) {
        Ok(written) => finalize(zip, destination).map(|()| written),
        Err(err) => {
            // Dropping the writer still emits a central directory
            drop(zip);
            Err(err)
        }
    };
    let (entries, bytes) = match written {
        Ok(written) => written,
        Err(err) => {
            discard(destination);
            return Err(err);
        }
    };

    info!(
        "Wrote {} entr{} ({} bytes uncompressed) to {}",
        entries,
        if entries == 1 { "y" } else { "ies" },
        bytes,
        destination.display()
    );
    Ok(destination.to_path_buf())
}

/// Returns the number of entries written and their uncompressed byte total.
fn write_entries<W: Write + Seek, P: AsRef<Path>>(
    zip: &mut ZipWriter<W>,
    destination: &Path,
    files: &[P],
    cancel: Option<&CancellationToken>,
) -> Result<(usize, u64)> {
    let mut names = EntryNames::default();
    let mut entries = 0usize;
    let mut bytes = 0u64;

    for source in files {
        cancel::checkpoint(cancel)?;
        let source = source.as_ref();
        let base = base_name(source)?;

        let name = match names.place(source, &base)? {
            Placement::Duplicate(existing) => {
                warn!(
                    "{} has the same content as entry '{}', adding it once",
                    source.display(),
                    existing
                );
                continue;
            }
            Placement::Write(name) => {
                if name != base {
                    warn!("Entry '{}' already taken, storing {} as '{}'", base, source.display(), name);
                }
                name
            }
        };

        let mut input = File::open(source).map_err(|e| LibraryError::io(source, e))?;
        let meta = input.metadata().map_err(|e| LibraryError::io(source, e))?;
        zip.start_file(name.as_str(), entry_options(&meta))
            .map_err(|e| LibraryError::archive(destination, e))?;
        bytes += copy_entry(&mut input, source, zip, destination)?;
        entries += 1;
    }
    Ok((entries, bytes))
}

/// Copy one input into the open entry. Read failures name the input,
/// write failures name the archive.
fn copy_entry<W: Write + Seek>(
    input: &mut File,
    source: &Path,
    zip: &mut ZipWriter<W>,
    destination: &Path,
) -> Result<u64> {
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let n = match input.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(LibraryError::io(source, e)),
        };
        zip.write_all(&buf[..n])
            .map_err(|e| LibraryError::archive(destination, ZipError::Io(e)))?;
        total += n as u64;
    }
}

fn finalize(zip: ZipWriter<File>, destination: &Path) -> Result<()> {
    let output = zip
        .finish()
        .map_err(|e| LibraryError::archive(destination, e))?;
    output
        .sync_all()
        .map_err(|e| LibraryError::io(destination, e))
}

/// Remove a partially written archive. The writer must already be dropped.
fn discard(destination: &Path) {
    match fs::remove_file(destination) {
        Ok(()) => debug!("Removed partial archive {}", destination.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove partial archive {}: {}", destination.display(), e),
    }
}

/// Bundle a container's (playlist, subscription) records as `<appdata_dir>/<name>.zip`.
pub fn build_container_archive(
    container_name: &str,
    records: &[MediaRecord],
    appdata_dir: &Path,
    cancel: Option<&CancellationToken>,
) -> Result<PathBuf> {
    fs::create_dir_all(appdata_dir).map_err(|e| LibraryError::io(appdata_dir, e))?;
    let destination = appdata_dir.join(format!("{}.zip", container_name));
    let paths: Vec<&Path> = records.iter().map(|r| r.path.as_path()).collect();
    build_archive(&destination, &paths, cancel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;
    use zip::ZipArchive;

    fn read_entries(path: &Path) -> Vec<(String, Vec<u8>)> {
        let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut entries = Vec::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).unwrap();
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes).unwrap();
            entries.push((entry.name().to_string(), bytes));
        }
        entries.sort();
        entries
    }

    #[test]
    fn test_archive_by_base_name() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("lib");
        fs::create_dir_all(src.join("sub")).unwrap();
        fs::write(src.join("a.mp4"), b"alpha").unwrap();
        fs::write(src.join("sub/b.mp4"), b"bravo").unwrap();

        let dest = dir.path().join("bundle.zip");
        let out = build_archive(&dest, &[src.join("a.mp4"), src.join("sub/b.mp4")], None).unwrap();
        assert_eq!(out, dest);
        assert_eq!(
            read_entries(&dest),
            vec![
                ("a.mp4".to_string(), b"alpha".to_vec()),
                ("b.mp4".to_string(), b"bravo".to_vec()),
            ]
        );
    }

    #[test]
    fn test_colliding_names_get_suffix() {
        let dir = tempdir().unwrap();
        for (sub, body) in [("x", "one"), ("y", "two"), ("z", "one")] {
            fs::create_dir(dir.path().join(sub)).unwrap();
            fs::write(dir.path().join(sub).join("clip.mp4"), body).unwrap();
        }
        let files: Vec<PathBuf> = ["x", "y", "z"]
            .iter()
            .map(|sub| dir.path().join(sub).join("clip.mp4"))
            .collect();

        let dest = dir.path().join("out.zip");
        build_archive(&dest, &files, None).unwrap();
        assert_eq!(
            read_entries(&dest),
            vec![
                ("clip(1).mp4".to_string(), b"two".to_vec()),
                ("clip.mp4".to_string(), b"one".to_vec()),
            ]
        );
    }

    #[test]
    fn test_missing_input_fails() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("out.zip");
        let result = build_archive(&dest, &[dir.path().join("ghost.mp4")], None);
        assert!(matches!(result, Err(LibraryError::Io { .. })));
    }

    #[test]
    fn test_failed_build_leaves_no_archive() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.mp4");
        fs::write(&a, b"alpha").unwrap();
        let ghost = dir.path().join("ghost.mp4");
        let dest = dir.path().join("out.zip");

        let result = build_archive(&dest, &[a, ghost.clone()], None);
        match result {
            Err(LibraryError::Io { path, .. }) => assert_eq!(path, ghost),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!dest.exists());
    }

    /// Accepts writes up to `limit` bytes, then fails like a full disk.
    struct FullDisk {
        inner: Cursor<Vec<u8>>,
        limit: u64,
    }

    impl Write for FullDisk {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.inner.position() + buf.len() as u64 > self.limit {
                return Err(io::Error::other("no space left on device"));
            }
            self.inner.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Seek for FullDisk {
        fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    #[test]
    fn test_write_failure_names_archive() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("noise.mp4");
        // Incompressible so deflate output outgrows the limit
        let mut state = 0x2545_F491_4F6C_DD1Du64;
        let noise: Vec<u8> = (0..1 << 20)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                state as u8
            })
            .collect();
        fs::write(&source, &noise).unwrap();

        let dest = dir.path().join("out.zip");
        let mut zip = ZipWriter::new(FullDisk {
            inner: Cursor::new(Vec::new()),
            limit: 4096,
        });
        let result = write_entries(&mut zip, &dest, &[&source], None);
        match result {
            Err(LibraryError::Archive { path, .. }) => assert_eq!(path, dest),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_unwritable_destination_fails() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("no/such/dir/out.zip");
        let result = build_archive::<PathBuf>(&dest, &[], None);
        assert!(matches!(result, Err(LibraryError::Io { .. })));
    }

    #[test]
    fn test_cancelled_archive() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.mp4"), b"a").unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let dest = dir.path().join("out.zip");
        let result = build_archive(&dest, &[dir.path().join("a.mp4")], Some(&token));
        assert!(matches!(result, Err(LibraryError::Cancelled)));
        assert!(!dest.exists());
    }

    #[test]
    fn test_container_archive() {
        let dir = tempdir().unwrap();
        let media = dir.path().join("song.mp3");
        fs::write(&media, b"la").unwrap();
        let record = MediaRecord::builder()
            .with_id("song")
            .with_path(&media)
            .with_size(2)
            .build()
            .unwrap();

        let appdata = dir.path().join("appdata");
        let out = build_container_archive("My Playlist", &[record], &appdata, None).unwrap();
        assert_eq!(out, appdata.join("My Playlist.zip"));
        assert_eq!(read_entries(&out), vec![("song.mp3".to_string(), b"la".to_vec())]);
    }
}
