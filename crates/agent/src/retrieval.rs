use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use parkwise_db::{ChunkRepository, RepositoryError};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub text: String,
    pub product_name: String,
    pub score: f32,
}

#[async_trait]
pub trait Retriever: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>, RepositoryError>;
}

/// Term-overlap search over the stored product chunks.
///
/// Score is the fraction of distinct query terms found in the chunk. Chunks
/// without any shared term are never returned.
pub struct LexicalRetriever {
    chunks: Arc<dyn ChunkRepository>,
}

impl LexicalRetriever {
    pub fn new(chunks: Arc<dyn ChunkRepository>) -> Self {
        Self { chunks }
    }
}

#[async_trait]
impl Retriever for LexicalRetriever {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>, RepositoryError> {
        let query_terms = terms(query);
        if query_terms.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<RetrievedChunk> = self
            .chunks
            .fetch_all()
            .await?
            .into_iter()
            .filter_map(|chunk| {
                let chunk_terms = terms(&chunk.content);
                let shared = query_terms.intersection(&chunk_terms).count();
                (shared > 0).then(|| RetrievedChunk {
                    score: shared as f32 / query_terms.len() as f32,
                    product_name: chunk.product_name,
                    text: chunk.content,
                })
            })
            .collect();

        scored.sort_by(|left, right| right.score.total_cmp(&left.score));
        scored.truncate(k);
        Ok(scored)
    }
}

fn terms(text: &str) -> BTreeSet<String> {
    text.split(|character: char| !character.is_alphanumeric())
        .filter(|term| term.chars().count() > 1)
        .map(str::to_lowercase)
        .collect()
}
