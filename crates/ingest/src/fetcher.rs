use crate::codec::DEFAULT_MAX_DECODED_BYTES;
use crate::drive::{self, ConfirmToken, DEFAULT_DRIVE_DOWNLOAD_URL};
use crate::error::FetchError;
use crate::source::SourceSpec;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, Url};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Upper bound for a single remote request, body included.
    pub timeout: Duration,
    /// Where resolved cloud-drive downloads are cached.
    pub cache_dir: PathBuf,
    pub drive_download_url: String,
    /// Largest body accepted from a remote source, checked while streaming.
    pub max_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_FETCH_TIMEOUT,
            cache_dir: std::env::temp_dir().join("simrec-cache"),
            drive_download_url: DEFAULT_DRIVE_DOWNLOAD_URL.to_string(),
            max_bytes: DEFAULT_MAX_DECODED_BYTES,
        }
    }
}

/// Bytes of one artifact, as fetched. Consumed by the codec.
#[derive(Debug)]
pub struct RawArtifact {
    location: String,
    bytes: Vec<u8>,
}

impl RawArtifact {
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Obtains artifact bytes from any [`SourceSpec`]. Never retries.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| FetchError::Client(err.to_string()))?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub const fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub async fn fetch(&self, source: &SourceSpec) -> Result<RawArtifact, FetchError> {
        log::info!("Fetching {} source {source}", source.kind());
        let bytes = match source {
            SourceSpec::Local(path) => fetch_local(path).await?,
            SourceSpec::Http(url) => self.fetch_http(url).await?,
            SourceSpec::Drive { file_id } => self.fetch_drive(file_id).await?,
        };

        let location = source.to_string();
        if bytes.is_empty() {
            return Err(FetchError::SourceEmpty { location });
        }
        log::debug!("Fetched {} bytes from {location}", bytes.len());
        Ok(RawArtifact { location, bytes })
    }

    /// Drops the cached download for a cloud-drive file. Returns whether anything was removed.
    pub async fn purge_cache(&self, file_id: &str) -> std::io::Result<bool> {
        let path = drive::cache_path(&self.config.cache_dir, file_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn fetch_http(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let location = url.as_str();
        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(Response::error_for_status)
            .map_err(|err| FetchError::unreachable(location, err))?;
        let mut body = BodyBuffer::new(&response, location, self.config.max_bytes)?;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|err| FetchError::unreachable(location, err))?
        {
            body.push(&chunk)?;
        }
        Ok(body.into_bytes())
    }

    async fn fetch_drive(&self, file_id: &str) -> Result<Vec<u8>, FetchError> {
        let location = format!("gdrive:{file_id}");
        let cached = drive::cache_path(&self.config.cache_dir, file_id);
        if let Ok(bytes) = tokio::fs::read(&cached).await {
            if !bytes.is_empty() {
                log::debug!("Reusing cached download {}", cached.display());
                return Ok(bytes);
            }
        }

        let mut response = self.drive_request(file_id, None, &location).await?;
        if is_html(&response) {
            let html = response
                .text()
                .await
                .map_err(|err| FetchError::unreachable(&location, err))?;
            let token = drive::parse_confirm_token(&html).ok_or_else(|| {
                FetchError::unreachable(
                    &location,
                    "cloud drive answered with an HTML page and no download token (is the file shared publicly?)",
                )
            })?;
            log::debug!("Confirming large-file download for {location}");
            response = self.drive_request(file_id, Some(&token), &location).await?;
            if is_html(&response) {
                return Err(FetchError::unreachable(
                    &location,
                    "cloud drive kept answering with HTML after confirmation",
                ));
            }
        }

        self.download_to_cache(response, file_id, &location).await
    }

    async fn drive_request(
        &self,
        file_id: &str,
        token: Option<&ConfirmToken>,
        location: &str,
    ) -> Result<Response, FetchError> {
        self.client
            .get(&self.config.drive_download_url)
            .query(&drive::download_query(file_id, token))
            .send()
            .await
            .and_then(Response::error_for_status)
            .map_err(|err| FetchError::unreachable(location, err))
    }

    async fn download_to_cache(
        &self,
        mut response: Response,
        file_id: &str,
        location: &str,
    ) -> Result<Vec<u8>, FetchError> {
        let dir = &self.config.cache_dir;
        tokio::fs::create_dir_all(dir).await.map_err(|err| {
            FetchError::unreachable(location, format!("create {}: {err}", dir.display()))
        })?;
        let part = drive::partial_path(dir, file_id);
        let dest = drive::cache_path(dir, file_id);

        let limit = self.config.max_bytes;
        let bytes = match stream_into(&mut response, &part, location, limit).await {
            Ok(bytes) => bytes,
            Err(err) => {
                let _ = tokio::fs::remove_file(&part).await;
                return Err(err);
            }
        };
        if bytes.is_empty() {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(FetchError::SourceEmpty {
                location: location.to_string(),
            });
        }

        tokio::fs::rename(&part, &dest).await.map_err(|err| {
            FetchError::unreachable(location, format!("move {}: {err}", part.display()))
        })?;
        log::info!("Cached {} bytes at {}", bytes.len(), dest.display());
        Ok(bytes)
    }
}

async fn fetch_local(path: &Path) -> Result<Vec<u8>, FetchError> {
    tokio::fs::read(path)
        .await
        .map_err(|err| FetchError::unreachable(path.display().to_string(), err))
}

fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.to_ascii_lowercase().starts_with("text/html"))
}

/// Accumulates a response body, failing as soon as it outgrows `limit`.
struct BodyBuffer<'a> {
    bytes: Vec<u8>,
    location: &'a str,
    limit: usize,
}

impl<'a> BodyBuffer<'a> {
    fn new(response: &Response, location: &'a str, limit: usize) -> Result<Self, FetchError> {
        let declared = response.content_length().unwrap_or(0);
        if declared > limit as u64 {
            return Err(FetchError::too_large(location, limit));
        }
        Ok(Self {
            bytes: Vec::with_capacity(declared as usize),
            location,
            limit,
        })
    }

    fn push(&mut self, chunk: &[u8]) -> Result<(), FetchError> {
        if self.bytes.len().saturating_add(chunk.len()) > self.limit {
            return Err(FetchError::too_large(self.location, self.limit));
        }
        self.bytes.extend_from_slice(chunk);
        Ok(())
    }

    fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

async fn stream_into(
    response: &mut Response,
    path: &Path,
    location: &str,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let mut body = BodyBuffer::new(response, location, limit)?;
    let mut file = tokio::fs::File::create(path).await.map_err(|err| {
        FetchError::unreachable(location, format!("create {}: {err}", path.display()))
    })?;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|err| FetchError::unreachable(location, format!("reading body: {err}")))?
    {
        body.push(&chunk)?;
        file.write_all(&chunk).await.map_err(|err| {
            FetchError::unreachable(location, format!("write {}: {err}", path.display()))
        })?;
    }
    file.flush().await.map_err(|err| {
        FetchError::unreachable(location, format!("flush {}: {err}", path.display()))
    })?;
    Ok(body.into_bytes())
}
