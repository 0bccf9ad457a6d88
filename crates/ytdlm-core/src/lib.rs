//! Indexing core for a downloaded-media library.
//!
//! Walks audio/video folders, pairs each file with its `.info.json` sidecar and
//! thumbnail, estimates download sizes from sidecars, and bundles files into zip
//! archives. Everything is re-read from disk on each call; nothing is cached.

pub mod archive;
pub mod cancel;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod index;
pub mod maintain;
pub mod media_type;
pub mod paths;
pub mod record;
pub mod scan;
pub mod sidecar;
pub mod size;
pub mod task;

pub use archive::{build_archive, build_container_archive};
pub use cancel::CancellationToken;
pub use config::LibraryConfig;
pub use descriptor::{FormatEntry, MetadataDescriptor};
pub use error::{LibraryError, Result};
pub use index::{build_index, IndexEntry, IndexOutcome, MediaIndexer, SkippedFile};
pub use maintain::MetadataMaintainer;
pub use media_type::MediaType;
pub use record::{MediaRecord, MediaRecordBuilder};
pub use size::estimate_size;
