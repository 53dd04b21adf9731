//! Domain types shared by ingestion, retrieval and generation.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

pub type ChunkId = u64;

/// A bounded, sentence-aligned span of source text used as a retrieval unit.
///
/// - `id`: assigned by the vector index, sequential from 0, never reused
/// - `text`: the chunk payload
/// - `token_length`: length under the embedding model's tokenizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    pub token_length: usize,
}

/// Chunker output before an id has been allocated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkText {
    pub text: String,
    pub token_length: usize,
}

/// One similarity search result. `score` semantics depend on the index metric:
/// cosine similarity (higher is better) or squared L2 distance (lower is better).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: ChunkId,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(Error::InvalidRequest(format!("unknown difficulty '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Topic {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), description: None }
    }

    pub fn with_description(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self { name: name.into(), description: Some(description.into()) }
    }

    /// Parse a caller-supplied topic list.
    ///
    /// Accepts a JSON array of strings, a JSON array of `{name, description}`
    /// objects, or falls back to a comma-separated list. Blank names are dropped.
    pub fn parse_list(input: &str) -> Vec<Topic> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Entry {
            Name(String),
            Full(Topic),
        }

        let topics: Vec<Topic> = match serde_json::from_str::<Vec<Entry>>(input) {
            Ok(entries) => entries
                .into_iter()
                .map(|e| match e {
                    Entry::Name(name) => Topic::new(name),
                    Entry::Full(topic) => topic,
                })
                .collect(),
            Err(_) => input.split(',').map(|s| Topic::new(s.trim())).collect(),
        };
        topics
            .into_iter()
            .map(|mut t| {
                t.name = t.name.trim().to_string();
                t
            })
            .filter(|t| !t.name.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub topics: Vec<Topic>,
    pub difficulty: Difficulty,
    pub num_questions: usize,
}

impl GenerationRequest {
    /// Reject requests that cannot be allocated, before any retrieval happens.
    pub fn validate(&self) -> crate::Result<()> {
        if self.num_questions < 1 {
            return Err(Error::AllocationViolation("num_questions must be at least 1".into()));
        }
        if self.topics.is_empty() {
            return Err(Error::AllocationViolation("at least one topic is required".into()));
        }
        Ok(())
    }
}

/// A validated multiple-choice question, exactly as emitted to downstream consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    pub options: BTreeMap<String, String>,
    pub correct_answer: String,
    #[serde(deserialize_with = "one_or_many")]
    pub topics: Vec<String>,
    pub explanation: String,
}

impl Question {
    pub fn answer_is_an_option(&self) -> bool {
        self.options.contains_key(&self.correct_answer)
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}
