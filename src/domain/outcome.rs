use serde::{Deserialize, Serialize};

/// What happened to a single vacancy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Success,
    Skip(String),
    Error(String),
}

impl ApplyOutcome {
    pub fn reason(&self) -> &str {
        match self {
            ApplyOutcome::Success => "",
            ApplyOutcome::Skip(reason) | ApplyOutcome::Error(reason) => reason,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ApplyOutcome::Success)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub reason: String,
}
