//! Per-request retrieval: chunk → embed → index → query → top-K passages.
//!
//! Nothing is cached between calls. Every [`Retriever::retrieve`] builds a
//! fresh [`VectorIndex`] for the given text and drops it before returning.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::chunk::Chunker;
use crate::embedding::{check_embeddings, EmbeddingProvider};
use crate::index::VectorIndex;
use crate::models::RankedPassage;

/// Default number of passages returned per query.
pub const DEFAULT_TOP_K: usize = 3;

/// Outcome of one retrieval.
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    /// Up to `k` passages, most relevant first.
    pub passages: Vec<RankedPassage>,
    /// How many passages the document produced in total.
    pub total_passages: usize,
    /// Sentence segmentation fell back to a single passage.
    pub degraded: bool,
}

impl Retrieval {
    /// Whether the document produced no passages at all.
    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Passage texts in ranked order.
    pub fn texts(&self) -> Vec<&str> {
        self.passages.iter().map(|p| p.passage.text.as_str()).collect()
    }
}

/// Ranks a document's passages against a prompt.
pub struct Retriever {
    provider: Arc<dyn EmbeddingProvider>,
    chunker: Chunker,
    top_k: usize,
}

impl Retriever {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, top_k: usize) -> Self {
        Self {
            provider,
            chunker: Chunker::new(),
            top_k,
        }
    }

    pub fn with_chunker(mut self, chunker: Chunker) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn provider(&self) -> &dyn EmbeddingProvider {
        self.provider.as_ref()
    }

    /// Retrieve the `top_k` passages of `text` most relevant to `prompt`.
    pub async fn retrieve(&self, prompt: &str, text: &str) -> Result<Retrieval> {
        self.retrieve_k(prompt, text, self.top_k).await
    }

    /// Like [`retrieve`](Self::retrieve) with an explicit `k`.
    pub async fn retrieve_k(&self, prompt: &str, text: &str, k: usize) -> Result<Retrieval> {
        let chunked = self.chunker.chunk(text);
        if chunked.passages.is_empty() {
            return Ok(Retrieval {
                degraded: chunked.degraded,
                ..Retrieval::default()
            });
        }

        let texts: Vec<String> = chunked.passages.iter().map(|p| p.text.clone()).collect();
        let dims = self.provider.dims();
        let vectors = self
            .provider
            .embed_texts(&texts)
            .await
            .with_context(|| format!("embedding {} passages failed", texts.len()))?;
        check_embeddings(&vectors, texts.len(), dims)?;

        let index = VectorIndex::build(vectors)?;

        let query = self
            .provider
            .embed_query(prompt)
            .await
            .context("embedding query failed")?;
        check_embeddings(std::slice::from_ref(&query), 1, dims)?;

        let hits = index.search(&query, k)?;
        debug!(
            passages = chunked.passages.len(),
            hits = hits.len(),
            model = self.provider.model_name(),
            "retrieval complete"
        );

        let total_passages = chunked.passages.len();
        let passages = hits
            .into_iter()
            .map(|hit| RankedPassage {
                passage: chunked.passages[hit.position].clone(),
                distance: hit.distance,
            })
            .collect();

        Ok(Retrieval {
            passages,
            total_passages,
            degraded: chunked.degraded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingProvider;
    use async_trait::async_trait;

    fn retriever(k: usize) -> Retriever {
        Retriever::new(Arc::new(HashingProvider::new(384)), k)
    }

    /// Returns vectors one dimension short of what it declares.
    struct WrongDims;

    #[async_trait]
    impl EmbeddingProvider for WrongDims {
        fn model_name(&self) -> &str {
            "wrong"
        }
        fn dims(&self) -> usize {
            4
        }
        async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.0; 3]).collect())
        }
    }

    #[tokio::test]
    async fn sky_question_ranks_sky_sentence_first() {
        let r = retriever(3)
            .retrieve("What color is the sky?", "The sky is blue. Grass is green.")
            .await
            .unwrap();
        assert_eq!(r.texts(), vec!["The sky is blue.", "Grass is green."]);
        assert_eq!(r.total_passages, 2);
        assert!(r.passages[0].distance <= r.passages[1].distance);
    }

    #[tokio::test]
    async fn results_are_bounded_by_k() {
        let text = (0..10)
            .map(|i| format!("Fact number {} about rivers.", i))
            .collect::<Vec<_>>()
            .join(" ");
        let r = retriever(3).retrieve("rivers", &text).await.unwrap();
        assert_eq!(r.passages.len(), 3);
        assert_eq!(r.total_passages, 10);
        for w in r.passages.windows(2) {
            assert!(w[0].distance <= w[1].distance);
        }
    }

    #[tokio::test]
    async fn empty_text_yields_empty_retrieval() {
        let r = retriever(3).retrieve("anything", "   \n ").await.unwrap();
        assert!(r.is_empty());
        assert_eq!(r.total_passages, 0);
    }

    #[tokio::test]
    async fn explicit_k_overrides_default() {
        let r = retriever(3)
            .retrieve_k("blue", "One. Two. Three blue.", 1)
            .await
            .unwrap();
        assert_eq!(r.texts(), vec!["Three blue."]);
    }

    #[tokio::test]
    async fn provider_dimension_mismatch_is_an_error() {
        let r = Retriever::new(Arc::new(WrongDims), 3);
        assert!(r.retrieve("q", "Some text.").await.is_err());
    }
}
