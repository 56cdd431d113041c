use crate::error::DecodeError;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Default ceiling for a decoded artifact (1 GiB).
pub const DEFAULT_MAX_DECODED_BYTES: usize = 1 << 30;

/// Whether the payload is expected to sit inside a gzip envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    Yes,
    No,
    #[default]
    Auto,
}

impl Compression {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "gzip",
            Self::No => "none",
            Self::Auto => "auto",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Compression {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "yes" | "gzip" | "gz" => Ok(Self::Yes),
            "no" | "none" | "raw" => Ok(Self::No),
            "auto" => Ok(Self::Auto),
            other => Err(format!(
                "unknown compression mode '{other}' (expected auto|gzip|none)"
            )),
        }
    }
}

#[must_use]
pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.starts_with(&GZIP_MAGIC)
}

/// Strips the gzip envelope if there is one (or if one is required) and returns the payload.
pub fn unwrap_envelope(
    bytes: Vec<u8>,
    mode: Compression,
    max_len: usize,
) -> Result<Vec<u8>, DecodeError> {
    let compressed = match mode {
        Compression::Yes if !is_gzip(&bytes) => return Err(DecodeError::NotGzip),
        Compression::Yes => true,
        Compression::No => false,
        Compression::Auto => is_gzip(&bytes),
    };

    if !compressed {
        if bytes.len() > max_len {
            return Err(DecodeError::PayloadTooLarge { limit: max_len });
        }
        return Ok(bytes);
    }

    log::debug!("Decompressing gzip payload ({} bytes)", bytes.len());
    let decoder = GzDecoder::new(bytes.as_slice());
    let mut out = Vec::new();
    decoder
        .take(max_len.saturating_add(1) as u64)
        .read_to_end(&mut out)
        .map_err(DecodeError::CorruptGzip)?;
    if out.len() > max_len {
        return Err(DecodeError::PayloadTooLarge { limit: max_len });
    }
    Ok(out)
}

/// Decodes raw artifact bytes into `T`, unwrapping gzip according to `mode`.
pub fn decode<T: DeserializeOwned>(
    bytes: Vec<u8>,
    mode: Compression,
    max_len: usize,
) -> Result<T, DecodeError> {
    let payload = unwrap_envelope(bytes, mode, max_len)?;
    if payload.iter().all(u8::is_ascii_whitespace) {
        return Err(DecodeError::shape("payload is empty"));
    }
    serde_json::from_slice(&payload).map_err(DecodeError::shape)
}

/// Serializes `value`, gzip-wrapping it when `mode` is [`Compression::Yes`].
pub fn encode<T: Serialize>(value: &T, mode: Compression) -> Result<Vec<u8>, DecodeError> {
    let payload = serde_json::to_vec(value).map_err(DecodeError::shape)?;
    if mode != Compression::Yes {
        return Ok(payload);
    }
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder
        .write_all(&payload)
        .map_err(DecodeError::CorruptGzip)?;
    encoder.finish().map_err(DecodeError::CorruptGzip)
}
