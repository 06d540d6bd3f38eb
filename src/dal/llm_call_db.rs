use std::{collections::BTreeMap, path::PathBuf};

use serde::{Deserialize, Serialize};

use super::json_file::{read_json, write_json, PersistError};

pub const LLM_CALLS_FILE: &str = "llm_api_calls.json";
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmCallRecord {
    pub model: String,
    pub time: String,
    /// `prompt_1`, `prompt_2`, ... in message order
    pub prompts: BTreeMap<String, String>,
    pub replies: String,
    pub total_tokens: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_cost: f64,
}

pub fn numbered_prompts<'a>(prompts: impl IntoIterator<Item = &'a str>) -> BTreeMap<String, String> {
    prompts
        .into_iter()
        .enumerate()
        .map(|(i, prompt)| (format!("prompt_{}", i + 1), prompt.to_string()))
        .collect()
}

/// Append-only audit log of every answered LLM call.
pub struct LlmCallLog {
    path: PathBuf,
    records: Vec<LlmCallRecord>,
}

impl LlmCallLog {
    pub fn load(path: PathBuf) -> Result<Self, PersistError> {
        let records = read_json(&path)?;
        Ok(LlmCallLog { path, records })
    }

    pub fn append(&mut self, record: LlmCallRecord) -> Result<(), PersistError> {
        self.records.push(record);
        write_json(&self.path, &self.records)
    }

    pub fn records(&self) -> &[LlmCallRecord] {
        &self.records
    }

    pub fn total_cost(&self) -> f64 {
        self.records.iter().map(|r| r.total_cost).sum()
    }
}
