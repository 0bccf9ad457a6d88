use std::path::{Component, Path};

use crate::media_type::MediaType;

/// Byte offset of the dot that starts the extension of the final path component.
fn extension_dot(path: &str) -> Option<usize> {
    let name_start = path
        .rfind(|c: char| c == '/' || c == '\\')
        .map_or(0, |i| i + 1);
    path[name_start..].rfind('.').map(|i| name_start + i)
}

/// Rewrite the trailing extension to the canonical one for `media_type`
/// (`.mp3` for audio, `.mp4` otherwise). Paths already carrying it are returned unchanged.
pub fn normalize_extension(path: &str, media_type: MediaType) -> String {
    let ext = media_type.extension();
    match extension_dot(path) {
        Some(dot) if &path[dot + 1..] == ext => path.to_string(),
        Some(dot) => format!("{}.{}", &path[..dot], ext),
        None => format!("{}.{}", path, ext),
    }
}

/// Remove the last dot-delimited segment of the file name.
/// Names without a dot come back unchanged, so this is no validation.
pub fn strip_extension(filename: &str) -> &str {
    match extension_dot(filename) {
        Some(dot) => &filename[..dot],
        None => filename,
    }
}

/// Identifier of `full_path` relative to `base_path`: components joined with `/`
/// whatever the host separator is, extension stripped.
pub fn relative_id(base_path: &Path, full_path: &Path) -> String {
    let relative =
        pathdiff::diff_paths(full_path, base_path).unwrap_or_else(|| full_path.to_path_buf());
    let parts: Vec<_> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            Component::ParentDir => Some("..".into()),
            _ => None,
        })
        .collect();
    strip_extension(&parts.join("/")).to_string()
}
