use crate::error::{MissingRowReason, RecommendError, Result};
use simrec_store::Store;
use std::cmp::Ordering;
use std::collections::HashSet;

pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct RecommendedItem {
    /// 1-based position in the result.
    pub rank: usize,
    pub index: usize,
    pub title: String,
    pub media_ref: String,
    pub score: f32,
}

/// A ranked candidate whose index is outside the catalog. Skipped, not fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkippedCandidate {
    pub candidate: usize,
    pub catalog_len: usize,
}

impl SkippedCandidate {
    pub const CODE: &'static str = "corrupt_candidate_index";
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recommendations {
    pub selected_index: usize,
    pub items: Vec<RecommendedItem>,
    pub skipped: Vec<SkippedCandidate>,
}

/// Top-`k` items most similar to `title`, never including `title` itself.
///
/// Scores rank descending; equal scores rank by ascending catalog index; NaN ranks last.
/// Returns fewer than `k` items when the catalog is small.
pub fn recommend(store: &Store, title: &str, k: usize) -> Result<Recommendations> {
    let index = store
        .resolve_index(title)
        .ok_or_else(|| RecommendError::ItemNotFound {
            title: title.to_string(),
        })?;
    let row = store
        .row_for(index)
        .ok_or(RecommendError::MissingSimilarityRow {
            index,
            reason: MissingRowReason::Absent,
        })?;

    let mut ranked: Vec<(usize, f32)> = row
        .iter()
        .filter(|&(candidate, _)| candidate != index)
        .collect();
    ranked.sort_by(rank_order);

    let catalog_len = store.len();
    let mut items = Vec::with_capacity(k.min(ranked.len()));
    let mut skipped = Vec::new();
    let mut seen = HashSet::new();
    for (candidate, score) in ranked {
        if items.len() >= k {
            break;
        }
        if !seen.insert(candidate) {
            continue;
        }
        let Some(item) = store.item(candidate) else {
            log::warn!(
                "Skipping corrupt candidate {candidate} for item {index} (catalog has {catalog_len} items)"
            );
            skipped.push(SkippedCandidate {
                candidate,
                catalog_len,
            });
            continue;
        };
        items.push(RecommendedItem {
            rank: items.len() + 1,
            index: candidate,
            title: item.title.clone(),
            media_ref: item.media_ref.clone(),
            score,
        });
    }

    if items.is_empty() && !skipped.is_empty() {
        return Err(RecommendError::MissingSimilarityRow {
            index,
            reason: MissingRowReason::AllCandidatesCorrupt {
                skipped: skipped.len(),
            },
        });
    }

    log::debug!(
        "Recommended {} items for '{title}' (index {index}, k={k}, skipped={})",
        items.len(),
        skipped.len()
    );
    Ok(Recommendations {
        selected_index: index,
        items,
        skipped,
    })
}

fn rank_order(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    let by_score = match (a.1.is_nan(), b.1.is_nan()) {
        (false, false) => fold_zero(b.1).total_cmp(&fold_zero(a.1)),
        (a_nan, b_nan) => a_nan.cmp(&b_nan),
    };
    by_score.then_with(|| a.0.cmp(&b.0))
}

// -0.0 and 0.0 tie.
fn fold_zero(score: f32) -> f32 {
    if score == 0.0 {
        0.0
    } else {
        score
    }
}
