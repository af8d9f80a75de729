// Deduplication and relevance filtering of candidate tenders

use crate::config::DedupConfig;
use crate::db::repositories::TenderStore;
use crate::errors::DatabaseError;
use crate::models::{Candidate, StoredTender};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument, warn};

/// How one candidate fared against the filter
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Accepted,
    ExactDuplicate,
    NearDuplicate { similarity: f64 },
    Irrelevant,
}

/// Result of ingesting one batch of candidates
#[derive(Debug, Default)]
pub struct IngestSummary {
    pub accepted: Vec<StoredTender>,
    pub exact_duplicates: usize,
    pub near_duplicates: usize,
    pub irrelevant: usize,
    pub warnings: Vec<String>,
}

/// Lowercase, strip punctuation, collapse whitespace
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Stable identity of a candidate: the source-scoped tender id when present,
/// otherwise a fingerprint of the normalized title
pub fn dedup_key(candidate: &Candidate) -> String {
    match candidate
        .tender_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
    {
        Some(id) => format!("{}:{}", candidate.source, id),
        None => {
            let digest = Sha256::digest(normalize_title(&candidate.title).as_bytes());
            format!("{}:{}", candidate.source, hex::encode(digest))
        }
    }
}

/// Normalized longest-common-subsequence ratio in [0, 1]
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    // Two-row LCS table
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    let lcs = prev[b.len()];
    (2.0 * lcs as f64) / (a.len() + b.len()) as f64
}

/// Weighted similarity between a candidate and a stored tender: title 0.5,
/// description 0.3, location 0.2; weights renormalized over present fields
pub fn weighted_similarity(candidate: &Candidate, stored: &StoredTender) -> f64 {
    let mut score = 0.0;
    let mut weight = 0.0;

    score += 0.5
        * similarity_ratio(
            &normalize_title(&candidate.title),
            &normalize_title(&stored.title),
        );
    weight += 0.5;

    if !candidate.description.is_empty() && !stored.description.is_empty() {
        score += 0.3
            * similarity_ratio(
                &candidate.description.to_lowercase(),
                &stored.description.to_lowercase(),
            );
        weight += 0.3;
    }

    if let (Some(a), Some(b)) = (&candidate.location, &stored.location) {
        if !a.is_empty() && !b.is_empty() {
            score += 0.2 * similarity_ratio(&a.to_lowercase(), &b.to_lowercase());
            weight += 0.2;
        }
    }

    score / weight
}

/// Dedup and relevance filter over a batch of candidates
pub struct DedupFilter {
    config: DedupConfig,
}

impl DedupFilter {
    pub fn new(config: DedupConfig) -> Self {
        Self { config }
    }

    /// Classify one candidate against known keys and the recent same-source
    /// window. Pure: no storage access.
    pub fn classify(
        &self,
        candidate: &Candidate,
        seen_keys: &HashSet<String>,
        recent: &[StoredTender],
    ) -> Classification {
        if seen_keys.contains(&dedup_key(candidate)) {
            return Classification::ExactDuplicate;
        }

        // Duplicate checks run before the relevance floor so a near match of
        // a stored tender is counted as a duplicate, not as irrelevant
        for stored in recent {
            let similarity = weighted_similarity(candidate, stored);
            if similarity >= self.config.similarity_threshold {
                return Classification::NearDuplicate { similarity };
            }
        }

        if candidate.relevance_score < self.config.min_relevance_score {
            return Classification::Irrelevant;
        }

        Classification::Accepted
    }

    /// Filter a batch and persist accepted candidates. The recent window and
    /// key set are snapshotted before any insert, so classification depends
    /// only on pre-run state plus batch order.
    #[instrument(skip(self, candidates, store), fields(candidates = candidates.len()))]
    pub async fn ingest(
        &self,
        candidates: &[Candidate],
        store: &dyn TenderStore,
    ) -> Result<IngestSummary, DatabaseError> {
        let mut summary = IngestSummary::default();

        let mut recent_by_source: HashMap<String, Vec<StoredTender>> = HashMap::new();
        for candidate in candidates {
            if !recent_by_source.contains_key(&candidate.source) {
                let recent = store
                    .recent_by_source(&candidate.source, self.config.recent_window as i64)
                    .await?;
                recent_by_source.insert(candidate.source.clone(), recent);
            }
        }

        let mut seen_keys: HashSet<String> = HashSet::new();
        for candidate in candidates {
            let key = dedup_key(candidate);
            if !seen_keys.contains(&key) && store.exists_by_dedup_key(&key).await? {
                seen_keys.insert(key.clone());
            }

            let recent = recent_by_source
                .get(&candidate.source)
                .map(Vec::as_slice)
                .unwrap_or(&[]);

            match self.classify(candidate, &seen_keys, recent) {
                Classification::ExactDuplicate => {
                    debug!(dedup_key = %key, "Exact duplicate discarded");
                    summary.exact_duplicates += 1;
                }
                Classification::NearDuplicate { similarity } => {
                    debug!(
                        dedup_key = %key,
                        similarity = similarity,
                        "Near duplicate discarded"
                    );
                    summary.near_duplicates += 1;
                }
                Classification::Irrelevant => {
                    debug!(
                        dedup_key = %key,
                        relevance = candidate.relevance_score,
                        "Irrelevant candidate discarded"
                    );
                    summary.irrelevant += 1;
                }
                Classification::Accepted => {
                    let tender = StoredTender::from_candidate(candidate, key.clone());
                    match store.insert(&tender).await {
                        Ok(()) => {
                            seen_keys.insert(key);
                            summary.accepted.push(tender);
                        }
                        Err(DatabaseError::DuplicateKey(_)) => {
                            // Raced with a concurrent writer
                            seen_keys.insert(key);
                            summary.exact_duplicates += 1;
                        }
                        Err(e) => {
                            warn!(dedup_key = %key, error = %e, "Failed to persist tender");
                            summary
                                .warnings
                                .push(format!("failed to persist '{}': {}", candidate.title, e));
                        }
                    }
                }
            }
        }

        Ok(summary)
    }
}
