use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::media_type::MediaType;

/// Library folders, handed to the indexer and maintainer at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryConfig {
    pub audio_folder_path: PathBuf,
    pub video_folder_path: PathBuf,
}

impl LibraryConfig {
    pub fn new(audio_folder_path: impl Into<PathBuf>, video_folder_path: impl Into<PathBuf>) -> Self {
        Self {
            audio_folder_path: audio_folder_path.into(),
            video_folder_path: video_folder_path.into(),
        }
    }

    /// Configured root for `media_type`.
    pub fn folder_for(&self, media_type: MediaType) -> &Path {
        match media_type {
            MediaType::Audio => &self.audio_folder_path,
            MediaType::Video => &self.video_folder_path,
        }
    }

    /// `root` when given, otherwise the configured folder for `media_type`.
    pub fn resolve_root<'a>(&'a self, media_type: MediaType, root: Option<&'a Path>) -> &'a Path {
        root.unwrap_or_else(|| self.folder_for(media_type))
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self::new("audio", "video")
    }
}
