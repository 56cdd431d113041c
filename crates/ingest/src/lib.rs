//! # Simrec Ingest
//!
//! Turns a source descriptor into a decoded artifact.
//!
//! ```text
//! SourceSpec (local path | http url | cloud-drive id)
//!     │
//!     ├──> Fetcher ──> RawArtifact (bytes)
//!     │                   └─> drive downloads cached under cache_dir
//!     │
//!     └──> Codec ──> gzip envelope? (auto-detected via 1f 8b)
//!                        └─> serde_json payload ──> T
//! ```

mod codec;
mod drive;
mod error;
mod fetcher;
mod source;

use serde::de::DeserializeOwned;
use std::fmt;

pub use codec::{
    decode, encode, is_gzip, unwrap_envelope, Compression, DEFAULT_MAX_DECODED_BYTES, GZIP_MAGIC,
};
pub use drive::{cache_path as drive_cache_path, DEFAULT_DRIVE_DOWNLOAD_URL};
pub use error::{DecodeError, FetchError, IngestError, Result};
pub use fetcher::{FetchConfig, Fetcher, RawArtifact, DEFAULT_FETCH_TIMEOUT};
pub use source::SourceSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Catalog,
    Similarity,
}

impl ArtifactKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Catalog => "catalog",
            Self::Similarity => "similarity",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fetches `source` and decodes it as `T`.
pub async fn load_artifact<T: DeserializeOwned>(
    fetcher: &Fetcher,
    source: &SourceSpec,
    artifact: ArtifactKind,
    compression: Compression,
    max_decoded_bytes: usize,
) -> Result<T> {
    let raw = fetcher
        .fetch(source)
        .await
        .map_err(|error| IngestError::Fetch { artifact, error })?;
    let gzip = is_gzip(raw.as_bytes());
    log::debug!(
        "Decoding {artifact} from {} ({} bytes, gzip={gzip}, mode={compression})",
        raw.location(),
        raw.len()
    );
    decode(raw.into_bytes(), compression, max_decoded_bytes)
        .map_err(|error| IngestError::Decode { artifact, error })
}
