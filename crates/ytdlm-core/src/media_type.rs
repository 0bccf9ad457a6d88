use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LibraryError;

/// Kind of library a file belongs to. Decides the canonical extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Audio,
    Video,
}

impl MediaType {
    /// Canonical file extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            MediaType::Audio => "mp3",
            MediaType::Video => "mp4",
        }
    }

    pub fn is_audio(self) -> bool {
        self == MediaType::Audio
    }
}

impl FromStr for MediaType {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "audio" => Ok(MediaType::Audio),
            "video" => Ok(MediaType::Video),
            _ => Err(LibraryError::UnknownMediaType(s.to_string())),
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaType::Audio => write!(f, "audio"),
            MediaType::Video => write!(f, "video"),
        }
    }
}
