//! Schema check for a candidate MCQ batch returned by the language model.
//!
//! Validation is all-or-nothing: one malformed element fails the batch.

use serde_json::Value;
use std::fmt;

pub const REQUIRED_FIELDS: [&str; 5] =
    ["question", "options", "correct_answer", "topics", "explanation"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaViolation {
    NotAList,
    NotAnObject { index: usize },
    MissingField { index: usize, field: &'static str },
    OptionsNotAMapping { index: usize },
    AnswerNotAnOption { index: usize, answer: String },
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaViolation::NotAList => write!(f, "response is not a list of questions"),
            SchemaViolation::NotAnObject { index } => {
                write!(f, "question {index} is not an object")
            }
            SchemaViolation::MissingField { index, field } => {
                write!(f, "question {index} is missing '{field}'")
            }
            SchemaViolation::OptionsNotAMapping { index } => {
                write!(f, "'options' is not a mapping in question {index}")
            }
            SchemaViolation::AnswerNotAnOption { index, answer } => {
                write!(f, "correct_answer '{answer}' is not an option key in question {index}")
            }
        }
    }
}

impl std::error::Error for SchemaViolation {}

/// Return the first violation found in `candidate`, if any.
pub fn check(candidate: &Value) -> Result<(), SchemaViolation> {
    let items = candidate.as_array().ok_or(SchemaViolation::NotAList)?;
    for (index, item) in items.iter().enumerate() {
        let obj = item.as_object().ok_or(SchemaViolation::NotAnObject { index })?;
        if let Some(field) = REQUIRED_FIELDS.iter().copied().find(|f| !obj.contains_key(*f)) {
            return Err(SchemaViolation::MissingField { index, field });
        }
        let options =
            obj["options"].as_object().ok_or(SchemaViolation::OptionsNotAMapping { index })?;
        let answer = &obj["correct_answer"];
        let in_options = answer.as_str().is_some_and(|key| options.contains_key(key));
        if !in_options {
            let answer = answer.as_str().map_or_else(|| answer.to_string(), str::to_string);
            return Err(SchemaViolation::AnswerNotAnOption { index, answer });
        }
    }
    Ok(())
}

pub fn validate(candidate: &Value) -> bool {
    check(candidate).is_ok()
}
