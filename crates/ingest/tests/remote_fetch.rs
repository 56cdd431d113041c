use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use simrec_ingest::{
    drive_cache_path, encode, load_artifact, ArtifactKind, Compression, FetchConfig, FetchError,
    Fetcher, IngestError, SourceSpec, DEFAULT_MAX_DECODED_BYTES,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[derive(Default)]
struct Hits {
    drive: AtomicUsize,
}

fn table() -> Vec<Vec<f32>> {
    vec![vec![1.0, 0.5], vec![0.5, 1.0]]
}

async fn drive_handler(
    State(hits): State<Arc<Hits>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    hits.drive.fetch_add(1, Ordering::SeqCst);
    match (query.get("id").map(String::as_str), query.get("confirm")) {
        (Some("big"), Some(token)) if token == "t0k" => {
            encode(&table(), Compression::Yes).unwrap().into_response()
        }
        (Some("big"), _) => Html(
            r#"<form><input type="hidden" name="confirm" value="t0k"><input type="hidden" name="uuid" value="u-1"></form>"#,
        )
        .into_response(),
        (Some("small"), _) => encode(&table(), Compression::No).unwrap().into_response(),
        (Some("private"), _) => Html("<html>Sign in</html>").into_response(),
        (Some("hollow"), _) => Vec::<u8>::new().into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn spawn_server() -> (String, Arc<Hits>) {
    let hits = Arc::new(Hits::default());
    let app = Router::new()
        .route(
            "/similarity.json.gz",
            get(|| async { encode(&table(), Compression::Yes).unwrap() }),
        )
        .route("/empty", get(|| async { Vec::<u8>::new() }))
        .route("/uc", get(drive_handler))
        .with_state(hits.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), hits)
}

fn fetcher(base: &str, cache: &TempDir) -> Fetcher {
    capped_fetcher(base, cache, DEFAULT_MAX_DECODED_BYTES)
}

fn capped_fetcher(base: &str, cache: &TempDir, max_bytes: usize) -> Fetcher {
    Fetcher::new(FetchConfig {
        timeout: Duration::from_secs(5),
        cache_dir: cache.path().to_path_buf(),
        drive_download_url: format!("{base}/uc"),
        max_bytes,
    })
    .unwrap()
}

#[tokio::test]
async fn http_source_is_fetched_and_gzip_detected() {
    let (base, _) = spawn_server().await;
    let cache = TempDir::new().unwrap();
    let source: SourceSpec = format!("{base}/similarity.json.gz").parse().unwrap();

    let decoded: Vec<Vec<f32>> = load_artifact(
        &fetcher(&base, &cache),
        &source,
        ArtifactKind::Similarity,
        Compression::Auto,
        DEFAULT_MAX_DECODED_BYTES,
    )
    .await
    .unwrap();
    assert_eq!(decoded, table());
}

#[tokio::test]
async fn http_errors_and_empty_bodies_are_distinct() {
    let (base, _) = spawn_server().await;
    let cache = TempDir::new().unwrap();
    let fetcher = fetcher(&base, &cache);

    let missing: SourceSpec = format!("{base}/nope").parse().unwrap();
    let err = fetcher.fetch(&missing).await.unwrap_err();
    assert!(matches!(err, FetchError::SourceUnreachable { .. }), "{err:?}");

    let empty: SourceSpec = format!("{base}/empty").parse().unwrap();
    let err = fetcher.fetch(&empty).await.unwrap_err();
    assert!(matches!(err, FetchError::SourceEmpty { .. }), "{err:?}");
}

#[tokio::test]
async fn oversized_bodies_stop_at_the_byte_cap() {
    let (base, _) = spawn_server().await;
    let cache = TempDir::new().unwrap();
    let body_len = encode(&table(), Compression::Yes).unwrap().len();

    let exact = capped_fetcher(&base, &cache, body_len);
    let source: SourceSpec = format!("{base}/similarity.json.gz").parse().unwrap();
    assert_eq!(exact.fetch(&source).await.unwrap().len(), body_len);

    let tight = capped_fetcher(&base, &cache, body_len - 1);
    let err = tight.fetch(&source).await.unwrap_err();
    assert!(matches!(err, FetchError::TooLarge { limit, .. } if limit == body_len - 1), "{err:?}");
    assert_eq!(err.code(), "source_too_large");

    let drive = SourceSpec::Drive {
        file_id: "big".to_string(),
    };
    let err = tight.fetch(&drive).await.unwrap_err();
    assert_eq!(err.code(), "source_too_large");
    let leftovers: Vec<_> = std::fs::read_dir(cache.path())
        .map(|entries| entries.flatten().collect())
        .unwrap_or_default();
    assert!(leftovers.is_empty(), "{leftovers:?}");
}

#[tokio::test]
async fn drive_source_follows_confirmation_and_reuses_cache() {
    let (base, hits) = spawn_server().await;
    let cache = TempDir::new().unwrap();
    let fetcher = fetcher(&base, &cache);
    let source = SourceSpec::Drive {
        file_id: "big".to_string(),
    };

    let first = fetcher.fetch(&source).await.unwrap();
    assert!(simrec_ingest::is_gzip(first.as_bytes()));
    assert_eq!(hits.drive.load(Ordering::SeqCst), 2);
    assert!(drive_cache_path(cache.path(), "big").exists());

    let second = fetcher.fetch(&source).await.unwrap();
    assert_eq!(second.as_bytes(), first.as_bytes());
    assert_eq!(hits.drive.load(Ordering::SeqCst), 2, "cache should be reused");

    assert!(fetcher.purge_cache("big").await.unwrap());
    fetcher.fetch(&source).await.unwrap();
    assert_eq!(hits.drive.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn drive_source_without_interstitial_downloads_directly() {
    let (base, hits) = spawn_server().await;
    let cache = TempDir::new().unwrap();
    let source: SourceSpec = "https://drive.google.com/file/d/small/view".parse().unwrap();

    let decoded: Vec<Vec<f32>> = load_artifact(
        &fetcher(&base, &cache),
        &source,
        ArtifactKind::Similarity,
        Compression::Auto,
        DEFAULT_MAX_DECODED_BYTES,
    )
    .await
    .unwrap();
    assert_eq!(decoded, table());
    assert_eq!(hits.drive.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn drive_failures_leave_no_cache_behind() {
    let (base, _) = spawn_server().await;
    let cache = TempDir::new().unwrap();
    let fetcher = fetcher(&base, &cache);

    let private = SourceSpec::Drive {
        file_id: "private".to_string(),
    };
    let err = fetcher.fetch(&private).await.unwrap_err();
    assert_eq!(err.code(), "source_unreachable");

    let hollow = SourceSpec::Drive {
        file_id: "hollow".to_string(),
    };
    let err = fetcher.fetch(&hollow).await.unwrap_err();
    assert!(matches!(err, FetchError::SourceEmpty { .. }), "{err:?}");

    let leftovers: Vec<_> = std::fs::read_dir(cache.path())
        .map(|entries| entries.flatten().collect())
        .unwrap_or_default();
    assert!(leftovers.is_empty(), "{leftovers:?}");
}

#[tokio::test]
async fn decode_failures_name_the_artifact() {
    let (base, _) = spawn_server().await;
    let cache = TempDir::new().unwrap();
    let source: SourceSpec = format!("{base}/similarity.json.gz").parse().unwrap();

    let err = load_artifact::<Vec<String>>(
        &fetcher(&base, &cache),
        &source,
        ArtifactKind::Catalog,
        Compression::Auto,
        DEFAULT_MAX_DECODED_BYTES,
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        IngestError::Decode {
            artifact: ArtifactKind::Catalog,
            ..
        }
    ));
    assert_eq!(err.code(), "decode_error");
}
