use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mcqgen_core::chunker::Chunker;
use mcqgen_core::config::{AppConfig, ChunkingConfig, Metric};
use mcqgen_core::traits::{Embedder, WhitespaceTokenizer};
use mcqgen_core::types::{Difficulty, GenerationRequest, Topic};
use mcqgen_core::{Error, Result};
use mcqgen_embed::FakeEmbedder;
use mcqgen_generate::{LanguageModel, Orchestrator, Retriever, TopicStatus};
use mcqgen_vector::{IndexHandle, Ingestor, VectorIndex, METADATA_FILE};
use tempfile::TempDir;

const DIM: usize = 64;

const CORPUS: &str = "Photosynthesis converts light into chemical energy in plants. Chlorophyll \
in the leaves absorbs red and blue light. The Calvin cycle fixes carbon dioxide into sugar. \
Glaciers carve deep valleys as they move. Moraines are ridges of rock left behind by glaciers. \
Volcanoes release magma from deep inside the earth.";

fn build_store() -> TempDir {
    let corpus = TempDir::new().unwrap();
    std::fs::write(corpus.path().join("science.txt"), CORPUS).unwrap();
    let store = TempDir::new().unwrap();
    let config = ChunkingConfig { max_tokens: 12, overlap_sentences: 0 };
    let chunker = Chunker::new(Arc::new(WhitespaceTokenizer), config).unwrap();
    let mut index = VectorIndex::new(DIM, Metric::Cosine);
    Ingestor::new(chunker, Arc::new(FakeEmbedder::new(DIM)), 4)
        .build(corpus.path(), &mut index, store.path())
        .unwrap();
    store
}

fn orchestrator(store: &TempDir, model: Arc<dyn LanguageModel>, config: AppConfig) -> Orchestrator {
    let embedder: Arc<dyn Embedder> = Arc::new(FakeEmbedder::new(DIM));
    let handle = Arc::new(IndexHandle::new(store.path(), DIM, Metric::Cosine));
    Orchestrator::new(Arc::new(Retriever::new(handle, embedder)), model, config)
}

fn request(topics: &[&str], difficulty: Difficulty, num_questions: usize) -> GenerationRequest {
    let topics = topics.iter().map(|t| Topic::new(*t)).collect();
    GenerationRequest { topics, difficulty, num_questions }
}

/// Topic named in the prompt's topic list.
fn prompt_topic(prompt: &str) -> String {
    let line =
        prompt.split("### Topic List\n").nth(1).and_then(|rest| rest.lines().next()).unwrap();
    serde_json::from_str::<Vec<String>>(line).unwrap().remove(0)
}

fn questions_json(topic: &str, n: usize) -> String {
    let items: Vec<String> = (0..n)
        .map(|i| {
            format!(
                r#"{{"question": "{topic} question {i}?",
                    "options": {{"A": "w", "B": "x", "C": "y", "D": "z"}},
                    "correct_answer": "B", "topics": ["{topic}"],
                    "explanation": "B matches the extract."}}"#
            )
        })
        .collect();
    format!("Here are your questions:\n[{}]\nGood luck!", items.join(","))
}

/// Answers every prompt with `per_call` questions, except topics listed in
/// `garbage`, which always get prose.
#[derive(Default)]
struct StubModel {
    per_call: usize,
    garbage: Vec<String>,
    calls: Mutex<HashMap<String, usize>>,
    prompts: Mutex<Vec<String>>,
}

impl StubModel {
    fn new(per_call: usize) -> Self {
        Self { per_call, ..Self::default() }
    }

    fn refusing(per_call: usize, topic: &str) -> Self {
        Self { per_call, garbage: vec![topic.to_string()], ..Self::default() }
    }

    fn calls_for(&self, topic: &str) -> usize {
        self.calls.lock().unwrap().get(topic).copied().unwrap_or(0)
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl LanguageModel for StubModel {
    async fn generate(&self, prompt: &str, _system: &str) -> Result<String> {
        let topic = prompt_topic(prompt);
        *self.calls.lock().unwrap().entry(topic.clone()).or_default() += 1;
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.garbage.contains(&topic) {
            return Ok("Sorry, I would rather write a poem about glaciers.".to_string());
        }
        Ok(questions_json(&topic, self.per_call))
    }
}

/// Fails the first `failures` calls as if the server were down.
struct FlakyModel {
    failures: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl LanguageModel for FlakyModel {
    async fn generate(&self, prompt: &str, _system: &str) -> Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            return Err(Error::ModelUnreachable("connection refused".into()));
        }
        Ok(questions_json(&prompt_topic(prompt), 2))
    }
}

#[tokio::test]
async fn photosynthesis_end_to_end() {
    let store = build_store();
    let model = Arc::new(StubModel::new(3));
    let orch = orchestrator(&store, model.clone(), AppConfig::default());

    let report = orch.generate(&request(&["Photosynthesis"], Difficulty::Easy, 3)).await.unwrap();
    assert!(report.questions.len() <= 3);
    assert!(!report.questions.is_empty());
    assert!(report.questions.iter().all(|q| q.answer_is_an_option()));
    assert_eq!(report.topics[0].status, TopicStatus::Succeeded);
    assert_eq!(report.topics[0].tries_used, 1);

    let prompts = model.prompts.lock().unwrap();
    assert!(prompts[0].contains("### TEXT EXTRACT 1\n"));
    assert!(prompts[0].contains("ADAPTER TOOTHPASTE MEDICINE"));
}

#[tokio::test]
async fn non_json_topic_exhausts_after_max_tries_while_others_succeed() {
    let store = build_store();
    let model = Arc::new(StubModel::refusing(5, "Glaciers"));
    let orch = orchestrator(&store, model.clone(), AppConfig::default());

    let req = request(&["Photosynthesis", "Glaciers"], Difficulty::Medium, 4);
    let report = orch.generate(&req).await.unwrap();
    assert_eq!(model.calls_for("Glaciers"), 3);
    assert_eq!(model.calls_for("Photosynthesis"), 1);
    assert_eq!(report.exhausted_topics(), ["Glaciers"]);
    assert_eq!(report.topics[1].tries_used, 3);
    // Surplus questions are cut to the allocation of 2.
    assert_eq!(report.questions.len(), 2);
    assert!(report.questions.iter().all(|q| q.topics == ["Photosynthesis"]));
}

#[tokio::test]
async fn empty_arrays_are_retried_until_exhausted() {
    let store = build_store();
    let model = Arc::new(StubModel::new(0));
    let orch = orchestrator(&store, model.clone(), AppConfig::default());

    let report = orch.generate(&request(&["Photosynthesis"], Difficulty::Easy, 3)).await.unwrap();
    assert_eq!(model.calls_for("Photosynthesis"), 3);
    assert_eq!(report.topics[0].status, TopicStatus::Exhausted);
    assert_eq!(report.topics[0].tries_used, 3);
    assert_eq!(report.exhausted_topics(), ["Photosynthesis"]);
    assert!(report.questions.is_empty());
}

#[tokio::test]
async fn every_topic_exhausted_yields_an_empty_report() {
    let store = build_store();
    let model = Arc::new(StubModel::refusing(1, "Glaciers"));
    let mut config = AppConfig::default();
    config.llm.max_tries = 2;
    let orch = orchestrator(&store, model.clone(), config);

    let report = orch.generate(&request(&["Glaciers"], Difficulty::Hard, 2)).await.unwrap();
    assert!(report.questions.is_empty());
    assert_eq!(report.topics[0].status, TopicStatus::Exhausted);
    assert_eq!(model.total_calls(), 2);
}

#[tokio::test]
async fn unreachable_model_consumes_an_attempt_then_recovers() {
    let store = build_store();
    let model = Arc::new(FlakyModel { failures: 1, calls: AtomicUsize::new(0) });
    let orch = orchestrator(&store, model.clone(), AppConfig::default());

    let report = orch.generate(&request(&["Volcanoes"], Difficulty::Easy, 2)).await.unwrap();
    assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    assert_eq!(report.topics[0].tries_used, 2);
    assert_eq!(report.topics[0].status, TopicStatus::Succeeded);
    assert_eq!(report.questions.len(), 2);
}

#[tokio::test]
async fn fixed_seed_gives_identical_order_regardless_of_concurrency() {
    let store = build_store();
    let topics = ["Photosynthesis", "Glaciers", "Volcanoes"];

    let mut ordered = Vec::new();
    for workers in [1, 3] {
        let mut config = AppConfig::default();
        config.generation.shuffle_seed = Some(7);
        config.llm.max_concurrency = workers;
        let orch = orchestrator(&store, Arc::new(StubModel::new(3)), config);
        let report = orch.generate(&request(&topics, Difficulty::Easy, 9)).await.unwrap();
        assert_eq!(report.questions.len(), 9);
        ordered.push(report.questions.into_iter().map(|q| q.question).collect::<Vec<_>>());
    }
    assert_eq!(ordered[0], ordered[1]);
}

#[tokio::test]
async fn topics_with_zero_allocation_are_skipped() {
    let store = build_store();
    let model = Arc::new(StubModel::new(1));
    let orch = orchestrator(&store, model.clone(), AppConfig::default());

    let req = request(&["Photosynthesis", "Glaciers", "Volcanoes"], Difficulty::Easy, 2);
    let report = orch.generate(&req).await.unwrap();
    let statuses: Vec<_> = report.topics.iter().map(|t| t.status).collect();
    assert_eq!(statuses, [TopicStatus::Succeeded, TopicStatus::Succeeded, TopicStatus::Skipped]);
    assert_eq!(model.calls_for("Volcanoes"), 0);
    assert_eq!(report.questions.len(), 2);
}

#[tokio::test]
async fn retrieval_is_capped_by_top_k_per_topic() {
    let store = build_store();
    let model = Arc::new(StubModel::new(1));
    let mut config = AppConfig::default();
    config.retrieval.top_k_per_topic = Some(1);
    let orch = orchestrator(&store, model.clone(), config);

    orch.generate(&request(&["Glaciers"], Difficulty::Hard, 1)).await.unwrap();
    let prompts = model.prompts.lock().unwrap();
    assert!(prompts[0].contains("### TEXT EXTRACT 1\n"));
    assert!(!prompts[0].contains("### TEXT EXTRACT 2\n"));
}

#[tokio::test]
async fn bad_requests_and_missing_index_fail_before_any_model_call() {
    let store = build_store();
    let model = Arc::new(StubModel::new(1));
    let orch = orchestrator(&store, model.clone(), AppConfig::default());
    let err = orch.generate(&request(&["Photosynthesis"], Difficulty::Easy, 0)).await.unwrap_err();
    assert!(matches!(err, Error::AllocationViolation(_)));
    let err = orch.generate(&request(&[], Difficulty::Easy, 3)).await.unwrap_err();
    assert!(matches!(err, Error::AllocationViolation(_)));

    let empty = TempDir::new().unwrap();
    let orch = orchestrator(&empty, model.clone(), AppConfig::default());
    let err = orch.generate(&request(&["Photosynthesis"], Difficulty::Easy, 3)).await.unwrap_err();
    assert!(matches!(err, Error::RetrievalUnavailable(_)));

    let broken = build_store();
    std::fs::write(broken.path().join(METADATA_FILE), "not json at all").unwrap();
    let orch = orchestrator(&broken, model.clone(), AppConfig::default());
    let err = orch.generate(&request(&["Photosynthesis"], Difficulty::Easy, 3)).await.unwrap_err();
    assert!(matches!(err, Error::RetrievalUnavailable(_)));

    assert_eq!(model.total_calls(), 0);
}

/// Embeds like `FakeEmbedder` but fails on queries mentioning `poison`.
struct PoisonedEmbedder {
    inner: FakeEmbedder,
    poison: &'static str,
}

impl Embedder for PoisonedEmbedder {
    fn dim(&self) -> usize {
        self.inner.dim()
    }

    fn max_len(&self) -> usize {
        self.inner.max_len()
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.iter().any(|t| t.contains(self.poison)) {
            return Err(Error::Embedding("encoder crashed".into()));
        }
        self.inner.embed_batch(texts)
    }
}

/// Never answers within a test's lifetime.
struct HangingModel;

#[async_trait]
impl LanguageModel for HangingModel {
    async fn generate(&self, _prompt: &str, _system: &str) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(String::new())
    }
}

#[tokio::test]
async fn fatal_retrieval_error_does_not_wait_for_other_topics() {
    let store = build_store();
    let embedder: Arc<dyn Embedder> =
        Arc::new(PoisonedEmbedder { inner: FakeEmbedder::new(DIM), poison: "Volcanoes" });
    let handle = Arc::new(IndexHandle::new(store.path(), DIM, Metric::Cosine));
    let mut config = AppConfig::default();
    config.llm.max_concurrency = 2;
    let retriever = Arc::new(Retriever::new(handle, embedder));
    let orch = Orchestrator::new(retriever, Arc::new(HangingModel), config);

    let req = request(&["Photosynthesis", "Volcanoes"], Difficulty::Easy, 2);
    let generation = orch.generate(&req);
    let result = tokio::time::timeout(Duration::from_secs(30), generation).await;
    let err = result.expect("generation should stop early").unwrap_err();
    assert!(matches!(err, Error::Embedding(_)));
}
