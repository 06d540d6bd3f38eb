use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::text::sanitize_text;

use super::json_file::{read_json, write_json, PersistError};

pub const ANSWERS_FILE: &str = "answers.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnsweredQuestion {
    pub question: String,
    pub answer: String,
}

/// Previously generated answers to free-text questions.
pub struct AnswerCache {
    path: PathBuf,
    answers: Vec<AnsweredQuestion>,
}

impl AnswerCache {
    pub fn load(path: PathBuf) -> Result<Self, PersistError> {
        let answers = read_json(&path)?;
        Ok(AnswerCache { path, answers })
    }

    pub fn lookup(&self, question: &str) -> Option<&str> {
        let question = sanitize_text(question);
        self.answers
            .iter()
            .find(|answered| sanitize_text(&answered.question) == question)
            .map(|answered| answered.answer.as_str())
    }

    pub fn insert(&mut self, question: &str, answer: &str) -> Result<(), PersistError> {
        self.answers.push(AnsweredQuestion {
            question: question.to_string(),
            answer: answer.to_string(),
        });
        write_json(&self.path, &self.answers)
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}
