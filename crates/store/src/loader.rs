use crate::catalog::Catalog;
use crate::error::LoadError;
use crate::similarity::SimilarityTable;
use crate::store::Store;
use simrec_ingest::{
    load_artifact, ArtifactKind, Compression, Fetcher, SourceSpec, DEFAULT_MAX_DECODED_BYTES,
};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub catalog: SourceSpec,
    pub similarity: SourceSpec,
    pub compression: Compression,
    pub max_decoded_bytes: usize,
}

impl LoadConfig {
    #[must_use]
    pub fn new(catalog: SourceSpec, similarity: SourceSpec) -> Self {
        Self {
            catalog,
            similarity,
            compression: Compression::Auto,
            max_decoded_bytes: DEFAULT_MAX_DECODED_BYTES,
        }
    }
}

/// Fetches and decodes both artifacts, then validates them into a [`Store`].
///
/// Nothing partial is returned: any failure aborts the whole load.
pub async fn load_store(fetcher: &Fetcher, config: &LoadConfig) -> Result<Store, LoadError> {
    let started = Instant::now();
    let (catalog, similarity) = tokio::try_join!(
        load_artifact::<Catalog>(
            fetcher,
            &config.catalog,
            ArtifactKind::Catalog,
            config.compression,
            config.max_decoded_bytes,
        ),
        load_artifact::<SimilarityTable>(
            fetcher,
            &config.similarity,
            ArtifactKind::Similarity,
            config.compression,
            config.max_decoded_bytes,
        ),
    )?;
    let store = Store::build(catalog, similarity)?;
    log::info!("Loaded store in {} ms", started.elapsed().as_millis());
    Ok(store)
}

/// [`load_store`] after dropping cached cloud-drive downloads, so every drive
/// source is fetched again. A cache that cannot be removed is logged and reused.
pub async fn reload_store(fetcher: &Fetcher, config: &LoadConfig) -> Result<Store, LoadError> {
    for source in [&config.catalog, &config.similarity] {
        let SourceSpec::Drive { file_id } = source else {
            continue;
        };
        match fetcher.purge_cache(file_id).await {
            Ok(true) => log::debug!("Dropped cached download for {source}"),
            Ok(false) => {}
            Err(err) => log::warn!("Could not drop cached download for {source}: {err}"),
        }
    }
    load_store(fetcher, config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use simrec_ingest::{encode, FetchConfig, IngestError};
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, bytes: Vec<u8>) -> SourceSpec {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        SourceSpec::Local(path)
    }

    fn fetcher() -> Fetcher {
        Fetcher::new(FetchConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn loads_plain_catalog_and_gzipped_table() {
        let dir = TempDir::new().unwrap();
        let catalog = Catalog::from_entries([("A", "a"), ("B", "b")]);
        let table = SimilarityTable::Dense(vec![vec![1.0, 0.5], vec![0.5, 1.0]]);
        let config = LoadConfig::new(
            write(&dir, "movie_list.json", encode(&catalog, Compression::No).unwrap()),
            write(&dir, "similarity.json.gz", encode(&table, Compression::Yes).unwrap()),
        );

        let store = load_store(&fetcher(), &config).await.unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.similarity(), &table);
    }

    #[tokio::test]
    async fn size_mismatch_fails_the_whole_load() {
        let dir = TempDir::new().unwrap();
        let catalog = Catalog::from_entries([("A", "a"), ("B", "b"), ("C", "c")]);
        let table = SimilarityTable::Dense(vec![vec![1.0, 0.5], vec![0.5, 1.0]]);
        let config = LoadConfig::new(
            write(&dir, "c.json", encode(&catalog, Compression::Yes).unwrap()),
            write(&dir, "s.json", encode(&table, Compression::No).unwrap()),
        );

        let err = load_store(&fetcher(), &config).await.unwrap_err();
        assert_eq!(err.code(), "inconsistent_store");
    }

    #[tokio::test]
    async fn missing_artifact_is_reported_as_fetch_failure() {
        let dir = TempDir::new().unwrap();
        let catalog = Catalog::from_entries([("A", "a")]);
        let config = LoadConfig::new(
            write(&dir, "c.json", encode(&catalog, Compression::No).unwrap()),
            SourceSpec::Local(dir.path().join("absent.json.gz")),
        );

        let err = load_store(&fetcher(), &config).await.unwrap_err();
        assert!(matches!(
            err,
            LoadError::Ingest(IngestError::Fetch {
                artifact: ArtifactKind::Similarity,
                ..
            })
        ));
        assert_eq!(err.code(), "source_unreachable");
    }

    #[tokio::test]
    async fn forced_gzip_on_plain_payload_is_a_decode_error() {
        let dir = TempDir::new().unwrap();
        let catalog = Catalog::from_entries([("A", "a")]);
        let table = SimilarityTable::Dense(vec![vec![1.0]]);
        let mut config = LoadConfig::new(
            write(&dir, "c.json", encode(&catalog, Compression::Yes).unwrap()),
            write(&dir, "s.json", encode(&table, Compression::No).unwrap()),
        );
        config.compression = Compression::Yes;

        let err = load_store(&fetcher(), &config).await.unwrap_err();
        assert_eq!(err.code(), "decode_error");
    }
}
