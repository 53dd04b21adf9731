//! Per-topic generation with bounded retries, run on a small worker pool.
//!
//! Each topic with a non-zero allocation goes through
//! retrieve → prompt → (model → extract → validate)* and ends either
//! `Succeeded` or `Exhausted`. Only configuration and retrieval failures
//! abort the whole request.

use std::fmt;
use std::sync::Arc;

use mcqgen_core::config::AppConfig;
use mcqgen_core::quota::allocate;
use mcqgen_core::types::{GenerationRequest, Question, Topic};
use mcqgen_core::validator;
use mcqgen_core::{Error, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};

use crate::extract::extract_json_array;
use crate::llm::LanguageModel;
use crate::prompt::{build_prompt, SYSTEM_PROMPT};
use crate::retriever::Retriever;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryReason {
    ModelUnreachable(String),
    NoJsonArray,
    EmptyBatch,
    InvalidJson(String),
    SchemaViolation(String),
}

impl fmt::Display for RetryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryReason::ModelUnreachable(detail) => write!(f, "model unreachable: {detail}"),
            RetryReason::NoJsonArray => write!(f, "no JSON array in response"),
            RetryReason::EmptyBatch => write!(f, "empty question array"),
            RetryReason::InvalidJson(detail) => write!(f, "invalid JSON: {detail}"),
            RetryReason::SchemaViolation(detail) => write!(f, "schema violation: {detail}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success(Vec<Question>),
    Retry(RetryReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicStatus {
    Pending,
    Succeeded,
    Exhausted,
    Skipped,
}

/// Progress of one topic through the retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationAttempt {
    pub topic: String,
    pub tries_used: usize,
    pub status: TopicStatus,
}

impl GenerationAttempt {
    fn new(topic: &str) -> Self {
        Self { topic: topic.to_string(), tries_used: 0, status: TopicStatus::Pending }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicReport {
    pub topic: String,
    pub allocated: usize,
    pub tries_used: usize,
    pub status: TopicStatus,
    pub questions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationReport {
    pub questions: Vec<Question>,
    pub topics: Vec<TopicReport>,
}

impl GenerationReport {
    pub fn exhausted_topics(&self) -> Vec<&str> {
        self.topics
            .iter()
            .filter(|t| t.status == TopicStatus::Exhausted)
            .map(|t| t.topic.as_str())
            .collect()
    }
}

/// Turn one raw model response into a tagged outcome.
pub fn evaluate_response(raw: &str) -> AttemptOutcome {
    let Some(array) = extract_json_array(raw) else {
        return AttemptOutcome::Retry(RetryReason::NoJsonArray);
    };
    let value: serde_json::Value = match serde_json::from_str(array) {
        Ok(v) => v,
        Err(e) => return AttemptOutcome::Retry(RetryReason::InvalidJson(e.to_string())),
    };
    if value.as_array().is_some_and(Vec::is_empty) {
        return AttemptOutcome::Retry(RetryReason::EmptyBatch);
    }
    if let Err(violation) = validator::check(&value) {
        return AttemptOutcome::Retry(RetryReason::SchemaViolation(violation.to_string()));
    }
    match serde_json::from_value::<Vec<Question>>(value) {
        Ok(questions) => AttemptOutcome::Success(questions),
        Err(e) => AttemptOutcome::Retry(RetryReason::SchemaViolation(e.to_string())),
    }
}

struct TopicJob {
    position: usize,
    topic: Topic,
    allocated: usize,
}

struct TopicResult {
    position: usize,
    report: TopicReport,
    questions: Vec<Question>,
}

pub struct Orchestrator {
    retriever: Arc<Retriever>,
    model: Arc<dyn LanguageModel>,
    config: Arc<AppConfig>,
}

impl Orchestrator {
    pub fn new(
        retriever: Arc<Retriever>,
        model: Arc<dyn LanguageModel>,
        config: AppConfig,
    ) -> Self {
        Self { retriever, model, config: Arc::new(config) }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Generate questions for every topic in `request` and shuffle them.
    ///
    /// Exhausted topics contribute no questions; if every topic is
    /// exhausted the report holds an empty question list.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationReport> {
        request.validate()?;
        let allocations = allocate(request.num_questions, request.topics.len())?;
        // Fail before any model call if there is nothing to retrieve from.
        self.retriever.handle().current()?;

        tracing::info!(
            topics = request.topics.len(),
            questions = request.num_questions,
            difficulty = %request.difficulty,
            "starting generation"
        );

        let mut slots: Vec<Option<TopicResult>> = (0..request.topics.len()).map(|_| None).collect();
        let semaphore = Arc::new(Semaphore::new(self.config.llm.max_concurrency.max(1)));
        let (tx, mut rx) = mpsc::channel::<Result<TopicResult>>(request.topics.len());
        let mut workers = Vec::new();

        for (position, (topic, &allocated)) in request.topics.iter().zip(&allocations).enumerate() {
            if allocated == 0 {
                tracing::info!(topic = %topic.name, "no questions allocated, skipping");
                slots[position] = Some(TopicResult {
                    position,
                    report: TopicReport {
                        topic: topic.name.clone(),
                        allocated,
                        tries_used: 0,
                        status: TopicStatus::Skipped,
                        questions: 0,
                    },
                    questions: Vec::new(),
                });
                continue;
            }

            let job = TopicJob { position, topic: topic.clone(), allocated };
            let semaphore = Arc::clone(&semaphore);
            let tx = tx.clone();
            let retriever = Arc::clone(&self.retriever);
            let model = Arc::clone(&self.model);
            let config = Arc::clone(&self.config);
            let difficulty = request.difficulty;
            workers.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else { return };
                let result = run_topic(job, difficulty, retriever, model, config).await;
                let _ = tx.send(result).await;
            }));
        }
        drop(tx);

        while let Some(result) = rx.recv().await {
            match result {
                Ok(done) => {
                    let position = done.position;
                    slots[position] = Some(done);
                }
                Err(e) => {
                    // The request is lost; stop the other topics' model calls.
                    for worker in &workers {
                        worker.abort();
                    }
                    tracing::error!(error = %e, "aborting generation");
                    return Err(e);
                }
            }
        }
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "topic worker failed");
            }
        }

        let mut topics = Vec::with_capacity(slots.len());
        let mut questions = Vec::new();
        for (position, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(result) => {
                    topics.push(result.report);
                    questions.extend(result.questions);
                }
                None => topics.push(TopicReport {
                    topic: request.topics[position].name.clone(),
                    allocated: allocations[position],
                    tries_used: 0,
                    status: TopicStatus::Exhausted,
                    questions: 0,
                }),
            }
        }

        let mut rng = match self.config.generation.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        questions.shuffle(&mut rng);

        let report = GenerationReport { questions, topics };
        tracing::info!(
            questions = report.questions.len(),
            exhausted = report.exhausted_topics().len(),
            "generation finished"
        );
        Ok(report)
    }
}

async fn run_topic(
    job: TopicJob,
    difficulty: mcqgen_core::types::Difficulty,
    retriever: Arc<Retriever>,
    model: Arc<dyn LanguageModel>,
    config: Arc<AppConfig>,
) -> Result<TopicResult> {
    let TopicJob { position, topic, allocated } = job;
    let mut attempt = GenerationAttempt::new(&topic.name);

    let mut k = config.retrieval.chunks_per_difficulty.for_difficulty(difficulty) * allocated;
    if let Some(cap) = config.retrieval.top_k_per_topic {
        k = k.min(cap);
    }
    let description = topic
        .description
        .clone()
        .unwrap_or_else(|| format!("Content in given text related to {}", topic.name));
    tracing::info!(topic = %topic.name, allocated, chunks = k, "retrieving context");

    let name = topic.name.clone();
    let context = tokio::task::spawn_blocking(move || {
        retriever.retrieve(&name, difficulty.as_str(), &description, k)
    })
    .await
    .map_err(|e| Error::RetrievalUnavailable(format!("retrieval task failed: {e}")))??;

    let prompt = build_prompt(&context, std::slice::from_ref(&topic.name), difficulty, allocated);

    let max_tries = config.llm.max_tries;
    let mut accepted = Vec::new();
    while attempt.tries_used < max_tries {
        attempt.tries_used += 1;
        let outcome = match model.generate(&prompt, SYSTEM_PROMPT).await {
            Ok(raw) => evaluate_response(&raw),
            Err(e) => AttemptOutcome::Retry(RetryReason::ModelUnreachable(e.to_string())),
        };
        match outcome {
            AttemptOutcome::Success(mut questions) => {
                if questions.len() > allocated {
                    tracing::debug!(
                        topic = %topic.name,
                        got = questions.len(),
                        allocated,
                        "truncating surplus questions"
                    );
                    questions.truncate(allocated);
                }
                attempt.status = TopicStatus::Succeeded;
                accepted = questions;
                break;
            }
            AttemptOutcome::Retry(reason) => {
                tracing::warn!(
                    topic = %topic.name,
                    attempt = attempt.tries_used,
                    max_tries,
                    %reason,
                    "attempt failed"
                );
            }
        }
    }
    if attempt.status != TopicStatus::Succeeded {
        attempt.status = TopicStatus::Exhausted;
        tracing::error!(
            topic = %topic.name,
            tries = attempt.tries_used,
            "topic exhausted, no questions produced"
        );
    } else {
        tracing::info!(
            topic = %topic.name,
            questions = accepted.len(),
            tries = attempt.tries_used,
            "topic done"
        );
    }

    Ok(TopicResult {
        position,
        report: TopicReport {
            topic: attempt.topic,
            allocated,
            tries_used: attempt.tries_used,
            status: attempt.status,
            questions: accepted.len(),
        },
        questions: accepted,
    })
}
