use std::path::PathBuf;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::descriptor::MetadataDescriptor;
use crate::error::{LibraryError, Result};
use crate::media_type::MediaType;

static UPLOAD_DATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{8}$").unwrap());

/// One downloaded media file paired with its sidecar metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    /// Root-relative path without extension
    pub id: String,
    pub title: Option<String>,
    /// Remote thumbnail URL, or the local thumbnail path when the sidecar has none
    #[serde(rename = "thumbnailURL")]
    pub thumbnail: Option<String>,
    #[serde(rename = "isAudio")]
    pub is_audio: bool,
    pub duration: Option<f64>,
    pub url: Option<String>,
    pub uploader: Option<String>,
    /// Size on disk in bytes
    pub size: u64,
    pub path: PathBuf,
    pub upload_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub view_count: Option<u64>,
    pub height: Option<u64>,
    pub abr: Option<f64>,
}

impl MediaRecord {
    pub fn builder() -> MediaRecordBuilder {
        MediaRecordBuilder::default()
    }

    /// Build a record from a parsed sidecar. `size` comes from the filesystem and
    /// overrides anything the sidecar declares.
    pub fn from_descriptor(
        id: String,
        path: PathBuf,
        size: u64,
        media_type: MediaType,
        descriptor: &MetadataDescriptor,
        local_thumbnail: Option<PathBuf>,
    ) -> Result<Self> {
        let thumbnail = descriptor.thumbnail.clone().or_else(|| {
            local_thumbnail.map(|p| p.to_string_lossy().into_owned())
        });
        MediaRecordBuilder::default()
            .with_id(id)
            .with_path(path)
            .with_size(size)
            .with_media_type(media_type)
            .with_title(descriptor.title.clone())
            .with_thumbnail(thumbnail)
            .with_duration(descriptor.duration)
            .with_url(descriptor.webpage_url.clone())
            .with_uploader(descriptor.uploader.clone())
            .with_upload_date(
                descriptor
                    .upload_date
                    .as_deref()
                    .and_then(normalize_upload_date),
            )
            .with_description(descriptor.description.clone())
            .with_view_count(descriptor.view_count)
            .with_height(descriptor.height)
            .with_abr(descriptor.abr)
            .build()
    }
}

/// Parse a downloader `YYYYMMDD` date. Anything else is treated as absent.
pub fn normalize_upload_date(raw: &str) -> Option<NaiveDate> {
    if !UPLOAD_DATE_RE.is_match(raw) {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y%m%d").ok()
}

/// Builder for [`MediaRecord`]; `id`, `path` and `size` are required.
#[derive(Debug, Clone, Default)]
pub struct MediaRecordBuilder {
    id: Option<String>,
    path: Option<PathBuf>,
    size: Option<u64>,
    is_audio: bool,
    title: Option<String>,
    thumbnail: Option<String>,
    duration: Option<f64>,
    url: Option<String>,
    uploader: Option<String>,
    upload_date: Option<NaiveDate>,
    description: Option<String>,
    view_count: Option<u64>,
    height: Option<u64>,
    abr: Option<f64>,
}

impl MediaRecordBuilder {
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_media_type(mut self, media_type: MediaType) -> Self {
        self.is_audio = media_type.is_audio();
        self
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: Option<String>) -> Self {
        self.thumbnail = thumbnail;
        self
    }

    pub fn with_duration(mut self, duration: Option<f64>) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url = url;
        self
    }

    pub fn with_uploader(mut self, uploader: Option<String>) -> Self {
        self.uploader = uploader;
        self
    }

    pub fn with_upload_date(mut self, upload_date: Option<NaiveDate>) -> Self {
        self.upload_date = upload_date;
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_view_count(mut self, view_count: Option<u64>) -> Self {
        self.view_count = view_count;
        self
    }

    pub fn with_height(mut self, height: Option<u64>) -> Self {
        self.height = height;
        self
    }

    pub fn with_abr(mut self, abr: Option<f64>) -> Self {
        self.abr = abr;
        self
    }

    pub fn build(self) -> Result<MediaRecord> {
        let id = self
            .id
            .filter(|id| !id.is_empty())
            .ok_or(LibraryError::InvalidRecord("id must not be empty"))?;
        let path = self
            .path
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(LibraryError::InvalidRecord("path must not be empty"))?;
        let size = self
            .size
            .ok_or(LibraryError::InvalidRecord("size must be set"))?;

        Ok(MediaRecord {
            id,
            title: self.title,
            thumbnail: self.thumbnail,
            is_audio: self.is_audio,
            duration: self.duration,
            url: self.url,
            uploader: self.uploader,
            size,
            path,
            upload_date: self.upload_date,
            description: self.description,
            view_count: self.view_count,
            height: self.height,
            abr: self.abr,
        })
    }
}
