use std::sync::Arc;

use mcqgen_core::traits::Embedder;
use mcqgen_core::types::SearchHit;
use mcqgen_core::Result;
use mcqgen_vector::IndexHandle;

/// Phrase appended to the retrieval query for a difficulty level.
/// Unknown levels pass through verbatim.
pub fn difficulty_phrase(difficulty: &str) -> &str {
    match difficulty.trim().to_ascii_lowercase().as_str() {
        "easy" => "simple, beginner-friendly terms",
        "medium" => "moderately detailed explanation",
        "hard" => "advanced, in-depth explanation with technical details",
        _ => difficulty,
    }
}

pub fn build_query(topic: &str, difficulty: &str, description: &str) -> String {
    format!("Topic: {topic}. {description}. {}.", difficulty_phrase(difficulty))
}

/// Topic-aware context retrieval over the shared vector index.
pub struct Retriever {
    handle: Arc<IndexHandle>,
    embedder: Arc<dyn Embedder>,
}

impl Retriever {
    pub fn new(handle: Arc<IndexHandle>, embedder: Arc<dyn Embedder>) -> Self {
        Self { handle, embedder }
    }

    pub fn handle(&self) -> &IndexHandle {
        &self.handle
    }

    /// Nearest chunks for a free-form query, best first, with their text.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<(SearchHit, String)>> {
        let index = self.handle.current()?;
        if k == 0 {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed_one(query)?;
        let hits = index.search(&vector, k)?;
        Ok(hits
            .into_iter()
            .filter_map(|hit| index.chunk(hit.id).map(|c| (hit, c.text.clone())))
            .collect())
    }

    pub fn retrieve_hits(
        &self,
        topic: &str,
        difficulty: &str,
        description: &str,
        k: usize,
    ) -> Result<Vec<(SearchHit, String)>> {
        let query = build_query(topic, difficulty, description);
        tracing::debug!(topic, k, %query, "retrieving context");
        self.search(&query, k)
    }

    /// Context text for the prompt: passages in rank order, each headed by
    /// `### TEXT EXTRACT i`, separated by a blank line. No hits gives "".
    pub fn retrieve(
        &self,
        topic: &str,
        difficulty: &str,
        description: &str,
        k: usize,
    ) -> Result<String> {
        let passages = self.retrieve_hits(topic, difficulty, description, k)?;
        Ok(passages
            .iter()
            .enumerate()
            .map(|(i, (_, text))| format!("### TEXT EXTRACT {}\n{}", i + 1, text))
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}
