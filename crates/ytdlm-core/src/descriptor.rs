use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Parsed `.info.json` sidecar written by the downloader.
///
/// Only the fields the library reads are typed; everything else is kept in
/// `extra`. Full-metadata index output reads the sidecar as a raw JSON map
/// instead, so it is not subject to the numeric coercion below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webpage_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploader: Option<String>,
    /// Raw `YYYYMMDD` string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_u64")]
    pub view_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_u64")]
    pub height: Option<u64>,
    /// Average audio bitrate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abr: Option<f64>,
    /// Declared total size. When present it wins over per-format sizes.
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_u64")]
    pub filesize: Option<u64>,
    /// Single format id or a composite like `137+140`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formats: Option<Vec<FormatEntry>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One encoded stream listed under `formats`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_u64")]
    pub filesize: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MetadataDescriptor {
    /// Formats listed by the descriptor, empty when the key is absent.
    pub fn formats(&self) -> &[FormatEntry] {
        self.formats.as_deref().unwrap_or_default()
    }
}

/// Accepts integers, floats (truncated) and null. Downloaders emit all three for sizes.
/// Re-serializing a descriptor therefore writes `12.5` back as `12`.
fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        _ => None,
    })
}
