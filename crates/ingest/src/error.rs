use crate::ArtifactKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Source unreachable: {location}: {reason}")]
    SourceUnreachable { location: String, reason: String },

    #[error("Source is empty: {location}")]
    SourceEmpty { location: String },

    #[error("Source exceeds {limit} bytes: {location}")]
    TooLarge { location: String, limit: usize },

    #[error("Invalid source descriptor: {0}")]
    InvalidSource(String),

    #[error("HTTP client error: {0}")]
    Client(String),
}

impl FetchError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::SourceUnreachable { .. } | Self::Client(_) => "source_unreachable",
            Self::SourceEmpty { .. } => "source_empty",
            Self::TooLarge { .. } => "source_too_large",
            Self::InvalidSource(_) => "invalid_source",
        }
    }

    pub(crate) fn too_large(location: &str, limit: usize) -> Self {
        Self::TooLarge {
            location: location.to_string(),
            limit,
        }
    }

    pub(crate) fn unreachable(location: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnreachable {
            location: location.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Payload is not gzip-compressed (missing 1f 8b header)")]
    NotGzip,

    #[error("Gzip envelope is corrupt: {0}")]
    CorruptGzip(#[source] std::io::Error),

    #[error("Decoded payload exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("Payload does not have the expected shape: {reason}")]
    BadPayloadShape { reason: String },
}

impl DecodeError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotGzip => "not_gzip",
            Self::CorruptGzip(_) => "corrupt_gzip",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::BadPayloadShape { .. } => "bad_payload_shape",
        }
    }

    pub(crate) fn shape(reason: impl ToString) -> Self {
        Self::BadPayloadShape {
            reason: reason.to_string(),
        }
    }
}

/// Fetch or decode failure tagged with the artifact it happened on.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to fetch {artifact} artifact: {error}")]
    Fetch {
        artifact: ArtifactKind,
        #[source]
        error: FetchError,
    },

    #[error("Failed to decode {artifact} artifact: {error}")]
    Decode {
        artifact: ArtifactKind,
        #[source]
        error: DecodeError,
    },
}

impl IngestError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Fetch { error, .. } => error.code(),
            Self::Decode { .. } => "decode_error",
        }
    }

    #[must_use]
    pub const fn artifact(&self) -> ArtifactKind {
        match self {
            Self::Fetch { artifact, .. } | Self::Decode { artifact, .. } => *artifact,
        }
    }
}
