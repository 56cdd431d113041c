use serde_json::json;
use simrec_engine::{MissingRowReason, RecommendError, Recommendations, SkippedCandidate};
use simrec_ingest::IngestError;
use simrec_protocol::{
    ErrorEnvelope, ErrorPhase, Recommendation, RecommendResponse, ResponseStatus, StoreSummary,
};
use simrec_store::{LoadError, Store, StoreError};

pub(crate) fn recommend_response(
    title: &str,
    k: usize,
    recs: &Recommendations,
) -> RecommendResponse {
    let items = recs
        .items
        .iter()
        .map(|item| Recommendation {
            rank: item.rank,
            index: item.index,
            title: item.title.clone(),
            media_ref: item.media_ref.clone(),
            score: item.score,
        })
        .collect();
    let skipped = recs
        .skipped
        .iter()
        .map(|skip| simrec_protocol::SkippedCandidate {
            candidate: skip.candidate,
            code: SkippedCandidate::CODE.to_string(),
            reason: format!(
                "candidate index {} is outside the catalog (size {})",
                skip.candidate, skip.catalog_len
            ),
        })
        .collect();
    RecommendResponse::ok(title.to_string(), k, items, skipped)
}

pub(crate) fn request_error(err: &RecommendError) -> ErrorEnvelope {
    let (details, hint) = match err {
        RecommendError::ItemNotFound { title } => (
            json!({ "title": title }),
            "Pick a title from `simrec titles` (matching is exact and case-sensitive).",
        ),
        RecommendError::MissingSimilarityRow { index, reason } => {
            let skipped = match reason {
                MissingRowReason::Absent => 0,
                MissingRowReason::AllCandidatesCorrupt { skipped } => *skipped,
            };
            (
                json!({ "index": index, "skipped_candidates": skipped }),
                "The catalog and similarity artifacts look mismatched or stale; regenerate them together.",
            )
        }
    };
    ErrorEnvelope {
        code: err.code().to_string(),
        message: err.to_string(),
        phase: ErrorPhase::Request,
        details: Some(details),
        hint: Some(hint.to_string()),
    }
}

pub(crate) fn load_error(err: &LoadError) -> ErrorEnvelope {
    let (details, hint) = match err {
        LoadError::Ingest(IngestError::Fetch { artifact, error }) => (
            json!({ "artifact": artifact.as_str(), "reason": error.code() }),
            "Check the artifact source (path, URL or drive id) and that it is reachable.",
        ),
        LoadError::Ingest(IngestError::Decode { artifact, error }) => (
            json!({ "artifact": artifact.as_str(), "reason": error.code() }),
            "The artifact was fetched but is not a valid payload; check --compression and the file format.",
        ),
        LoadError::Store(StoreError::InconsistentStore { index, .. }) => (
            json!({ "index": index }),
            "Catalog and similarity table disagree on size; they must come from the same build.",
        ),
    };
    ErrorEnvelope {
        code: err.code().to_string(),
        message: err.to_string(),
        phase: ErrorPhase::Load,
        details: Some(details),
        hint: Some(hint.to_string()),
    }
}

pub(crate) fn store_summary(store: &Store) -> StoreSummary {
    StoreSummary {
        catalog_len: store.len(),
        similarity_layout: store.layout().to_string(),
        similarity_rows: store.similarity().row_count(),
        duplicate_titles: store.catalog().duplicate_titles(),
    }
}

pub(crate) fn render_recommendations(response: &RecommendResponse) -> String {
    let mut out = String::new();
    if response.status == ResponseStatus::Error {
        if let Some(error) = &response.error {
            out.push_str(&format!("error [{}]: {}", error.code, error.message));
            if let Some(hint) = &error.hint {
                out.push_str(&format!("\nhint: {hint}"));
            }
        }
        return out;
    }

    out.push_str(&format!(
        "Recommendations for '{}' (top {}):",
        response.selected, response.k
    ));
    if response.items.is_empty() {
        out.push_str("\n  (no other items)");
    }
    for item in &response.items {
        out.push_str(&format!(
            "\n{:>3}. {}  [{:.3}]  {}",
            item.rank, item.title, item.score, item.media_ref
        ));
    }
    for skip in &response.skipped {
        out.push_str(&format!("\n  skipped: {}", skip.reason));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use simrec_engine::recommend;
    use simrec_ingest::{ArtifactKind, FetchError};
    use simrec_store::{Catalog, SimilarityTable};

    fn store() -> Store {
        let catalog = Catalog::from_entries([("A", "a.jpg"), ("B", "b.jpg"), ("C", "c.jpg")]);
        Store::build(
            catalog,
            SimilarityTable::Dense(vec![vec![1.0, 0.5, 0.25]; 3]),
        )
        .unwrap()
    }

    #[test]
    fn renders_ranked_items() {
        let store = store();
        let recs = recommend(&store, "A", 2).unwrap();
        let text = render_recommendations(&recommend_response("A", 2, &recs));
        assert!(text.starts_with("Recommendations for 'A' (top 2):"));
        assert!(text.contains("  1. B  [0.500]  b.jpg"));
        assert!(text.contains("  2. C  [0.250]  c.jpg"));
    }

    #[test]
    fn request_errors_carry_diagnostics() {
        let err = recommend(&store(), "Z", 2).unwrap_err();
        let envelope = request_error(&err);
        assert_eq!(envelope.code, "item_not_found");
        assert_eq!(envelope.phase, ErrorPhase::Request);
        assert_eq!(envelope.details.unwrap()["title"], "Z");
    }

    #[test]
    fn load_errors_name_the_artifact() {
        let err = LoadError::Ingest(IngestError::Fetch {
            artifact: ArtifactKind::Similarity,
            error: FetchError::SourceEmpty {
                location: "s.json".to_string(),
            },
        });
        let envelope = load_error(&err);
        assert_eq!(envelope.code, "source_empty");
        assert_eq!(envelope.phase, ErrorPhase::Load);
        assert_eq!(envelope.details.unwrap()["artifact"], "similarity");
    }

    #[test]
    fn summary_reports_layout() {
        let summary = store_summary(&store());
        assert_eq!(summary.catalog_len, 3);
        assert_eq!(summary.similarity_layout, "dense");
        assert_eq!(summary.similarity_rows, 3);
    }
}
