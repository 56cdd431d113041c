use anyhow::{Context as AnyhowContext, Result};
use serde::Deserialize;
use simrec_engine::DEFAULT_TOP_K;
use simrec_ingest::{Compression, FetchConfig, SourceSpec, DEFAULT_MAX_DECODED_BYTES};
use simrec_store::LoadConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub(crate) const CONFIG_ENV: &str = "SIMREC_CONFIG";
pub(crate) const DEFAULT_CONFIG_FILE: &str = "simrec.toml";

pub(crate) const DEFAULT_CATALOG: &str = "movie_list.json";
pub(crate) const DEFAULT_SIMILARITY: &str = "similarity.json.gz";
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// `simrec.toml` contents. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct FileConfig {
    pub catalog: Option<String>,
    pub similarity: Option<String>,
    pub compression: Option<String>,
    pub top_k: Option<usize>,
    pub fetch_timeout_secs: Option<u64>,
    pub cache_dir: Option<PathBuf>,
    pub max_artifact_bytes: Option<usize>,
}

impl FileConfig {
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Invalid config {}", path.display()))
    }
}

/// Values given on the command line; they win over everything else.
#[derive(Debug, Default, Clone)]
pub(crate) struct Overrides {
    pub config: Option<PathBuf>,
    pub catalog: Option<String>,
    pub similarity: Option<String>,
    pub compression: Option<Compression>,
    pub top_k: Option<usize>,
    pub fetch_timeout_secs: Option<u64>,
    pub cache_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub load: LoadConfig,
    pub fetch: FetchConfig,
    pub top_k: usize,
}

/// Resolves flag > env > config file > default. `env` is injected so tests stay hermetic.
pub(crate) fn resolve(
    overrides: &Overrides,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Settings> {
    let file = match overrides
        .config
        .clone()
        .or_else(|| env(CONFIG_ENV).map(PathBuf::from))
    {
        Some(path) => FileConfig::load(&path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
            FileConfig::load(Path::new(DEFAULT_CONFIG_FILE))?
        }
        None => FileConfig::default(),
    };

    let catalog = overrides
        .catalog
        .clone()
        .or_else(|| env("SIMREC_CATALOG"))
        .or(file.catalog)
        .unwrap_or_else(|| DEFAULT_CATALOG.to_string());
    let similarity = overrides
        .similarity
        .clone()
        .or_else(|| env("SIMREC_SIMILARITY"))
        .or(file.similarity)
        .unwrap_or_else(|| DEFAULT_SIMILARITY.to_string());

    let compression = match overrides.compression {
        Some(mode) => mode,
        None => match env("SIMREC_COMPRESSION").or(file.compression) {
            Some(raw) => raw.parse::<Compression>().map_err(anyhow::Error::msg)?,
            None => Compression::Auto,
        },
    };

    let top_k = match overrides.top_k {
        Some(k) => k,
        None => parse_env_number("SIMREC_TOP_K", &env)?
            .or(file.top_k)
            .unwrap_or(DEFAULT_TOP_K),
    };
    let timeout_secs = match overrides.fetch_timeout_secs {
        Some(secs) => secs,
        None => parse_env_number("SIMREC_FETCH_TIMEOUT_SECS", &env)?
            .or(file.fetch_timeout_secs)
            .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS),
    };
    let max_decoded_bytes = parse_env_number("SIMREC_MAX_ARTIFACT_BYTES", &env)?
        .or(file.max_artifact_bytes)
        .unwrap_or(DEFAULT_MAX_DECODED_BYTES);

    let mut fetch = FetchConfig {
        timeout: Duration::from_secs(timeout_secs),
        max_bytes: max_decoded_bytes,
        ..FetchConfig::default()
    };
    if let Some(dir) = overrides
        .cache_dir
        .clone()
        .or_else(|| env("SIMREC_CACHE_DIR").map(PathBuf::from))
        .or(file.cache_dir)
    {
        fetch.cache_dir = dir;
    }

    let catalog: SourceSpec = catalog
        .parse()
        .with_context(|| format!("Invalid catalog source '{catalog}'"))?;
    let similarity: SourceSpec = similarity
        .parse()
        .with_context(|| format!("Invalid similarity source '{similarity}'"))?;

    Ok(Settings {
        load: LoadConfig {
            catalog,
            similarity,
            compression,
            max_decoded_bytes,
        },
        fetch,
        top_k,
    })
}

fn parse_env_number<T: std::str::FromStr>(
    var: &str,
    env: &impl Fn(&str) -> Option<String>,
) -> Result<Option<T>> {
    match env(var) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{var} must be a non-negative integer, got '{raw}'")),
        None => Ok(None),
    }
}
