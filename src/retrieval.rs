//! Diversity-aware semantic retrieval.
//!
//! Retrieval embeds the query, pulls a relevance-ordered candidate pool from
//! Qdrant, then re-ranks with maximal marginal relevance so the final
//! selection trades pure relevance against redundancy among near-duplicate
//! passages. Both translation and commentary documents are eligible.

use async_trait::async_trait;

use crate::error::RetrievalError;
use crate::models::VerseDocument;
use crate::ollama::OllamaClient;
use crate::qdrant_store::{QdrantStore, VectorHit};

/// Final number of passages handed to the generation stage.
pub const RETRIEVE_K: usize = 25;
/// Relevance-ordered candidate pool drawn before re-ranking.
pub const CANDIDATE_POOL_K: usize = 60;
/// MMR trade-off weight: 1.0 is pure relevance, 0.0 pure diversity.
pub const MMR_LAMBDA: f32 = 0.5;

#[async_trait]
pub trait SemanticRetriever: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<VerseDocument>, RetrievalError>;
}

#[derive(Clone)]
pub struct MmrRetriever {
    ollama: OllamaClient,
    qdrant: QdrantStore,
    embedding_model: String,
}

impl MmrRetriever {
    pub fn new(
        ollama: OllamaClient,
        qdrant: QdrantStore,
        embedding_model: impl Into<String>,
    ) -> Self {
        Self {
            ollama,
            qdrant,
            embedding_model: embedding_model.into(),
        }
    }

    /// Startup probe: runs a fixed query end to end and demands a handful of
    /// hits. Fails when the embedding backend is down or the collection has
    /// not been indexed yet.
    pub async fn sanity_check(&self) -> Result<(), RetrievalError> {
        const PROBE_QUERY: &str = "sabır ve şükür";
        const MIN_HITS: usize = 5;

        let hits = self.search(PROBE_QUERY).await?;
        if hits.len() < MIN_HITS {
            return Err(RetrievalError::Unavailable(format!(
                "probe query returned {} documents (expected at least {MIN_HITS}); \
                 has the index binary been run against this collection?",
                hits.len()
            )));
        }

        tracing::info!(hits = hits.len(), "retrieval sanity check passed");
        Ok(())
    }
}

#[async_trait]
impl SemanticRetriever for MmrRetriever {
    async fn search(&self, query: &str) -> Result<Vec<VerseDocument>, RetrievalError> {
        let embedding = self
            .ollama
            .embed(&self.embedding_model, query)
            .await
            .map_err(|err| RetrievalError::Unavailable(err.to_string()))?;

        let pool = self
            .qdrant
            .search(&embedding, CANDIDATE_POOL_K)
            .await
            .map_err(|err| RetrievalError::Unavailable(err.to_string()))?;

        Ok(mmr_select(pool, RETRIEVE_K, MMR_LAMBDA))
    }
}

/// Greedy MMR over a relevance-ordered pool: each round picks the candidate
/// maximizing `lambda * relevance - (1 - lambda) * max_similarity_to_chosen`.
pub fn mmr_select(pool: Vec<VectorHit>, k: usize, lambda: f32) -> Vec<VerseDocument> {
    if pool.is_empty() || k == 0 {
        return vec![];
    }

    let mut remaining: Vec<VectorHit> = pool;
    let mut chosen: Vec<VectorHit> = Vec::with_capacity(k.min(remaining.len()));

    while chosen.len() < k && !remaining.is_empty() {
        let mut best_idx = 0;
        let mut best_score = f32::MIN;

        for (idx, candidate) in remaining.iter().enumerate() {
            let redundancy = chosen
                .iter()
                .map(|picked| cosine_similarity(&candidate.vector, &picked.vector))
                .fold(0.0f32, f32::max);

            let mmr = lambda * candidate.score - (1.0 - lambda) * redundancy;
            if mmr > best_score {
                best_score = mmr;
                best_idx = idx;
            }
        }

        chosen.push(remaining.swap_remove(best_idx));
    }

    chosen.into_iter().map(|hit| hit.document).collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceKind;

    fn hit(id: u32, score: f32, vector: Vec<f32>) -> VectorHit {
        VectorHit {
            document: VerseDocument {
                content: format!("pasaj {id}"),
                sura_name: "bakara".to_string(),
                ayah_number: id,
                kind: SourceKind::Translation,
            },
            score,
            vector,
        }
    }

    #[test]
    fn picks_most_relevant_first() {
        let pool = vec![
            hit(1, 0.4, vec![1.0, 0.0]),
            hit(2, 0.9, vec![0.0, 1.0]),
            hit(3, 0.6, vec![0.5, 0.5]),
        ];

        let selected = mmr_select(pool, 1, MMR_LAMBDA);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].ayah_number, 2);
    }

    #[test]
    fn penalizes_near_duplicates() {
        // Two near-identical high scorers and one distinct mid scorer: the
        // second pick must be the distinct passage, not the duplicate.
        let pool = vec![
            hit(1, 0.90, vec![1.0, 0.0]),
            hit(2, 0.89, vec![0.999, 0.01]),
            hit(3, 0.60, vec![0.0, 1.0]),
        ];

        let selected = mmr_select(pool, 2, 0.5);
        let ayahs: Vec<u32> = selected.iter().map(|d| d.ayah_number).collect();
        assert_eq!(ayahs, vec![1, 3]);
    }

    #[test]
    fn bounded_by_pool_size() {
        let pool = vec![hit(1, 0.5, vec![1.0]), hit(2, 0.4, vec![0.0])];
        assert_eq!(mmr_select(pool, 10, 0.5).len(), 2);
        assert!(mmr_select(vec![], 5, 0.5).is_empty());
    }

    #[test]
    fn cosine_handles_degenerate_vectors() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }
}
