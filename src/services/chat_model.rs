use std::time::Duration;

use chrono::Local;
use tokio::sync::Mutex;

use crate::{
    configuration::LlmSettings,
    dal::llm_call_db::{numbered_prompts, LlmCallLog, LlmCallRecord, TIME_FORMAT},
};

use super::{LlmBackend, LlmError, LlmReply};

/// Backend wrapper that waits out rate limits and records every answered call.
pub struct ChatModel {
    backend: Box<dyn LlmBackend>,
    settings: LlmSettings,
    call_log: Option<Mutex<LlmCallLog>>,
}

impl ChatModel {
    pub fn new(backend: Box<dyn LlmBackend>, settings: LlmSettings) -> Self {
        ChatModel {
            backend,
            settings,
            call_log: None,
        }
    }

    pub fn with_call_log(mut self, call_log: LlmCallLog) -> Self {
        self.call_log = Some(Mutex::new(call_log));
        self
    }

    /// Retries 429s forever; any other failure is returned to the caller.
    pub async fn invoke(&self, prompt: &str) -> Result<String, LlmError> {
        loop {
            match self.backend.invoke(prompt).await {
                Ok(reply) => {
                    self.log_call(prompt, &reply).await;
                    return Ok(reply.content);
                }
                Err(LlmError::RateLimited { retry_after }) => {
                    let wait = retry_after
                        .unwrap_or_else(|| Duration::from_secs(self.settings.rate_limit_backoff_secs));
                    log::warn!(
                        "LLM rate limit hit, retrying in {:.1}s{}",
                        wait.as_secs_f64(),
                        if retry_after.is_some() { "" } else { " (default)" }
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(e) => {
                    log::error!("LLM call failed: {}", e);
                    return Err(e);
                }
            }
        }
    }

    async fn log_call(&self, prompt: &str, reply: &LlmReply) {
        let Some(call_log) = &self.call_log else {
            return;
        };

        let record = LlmCallRecord {
            model: reply.model.clone(),
            time: Local::now().format(TIME_FORMAT).to_string(),
            prompts: numbered_prompts([prompt]),
            replies: reply.content.clone(),
            total_tokens: reply.input_tokens + reply.output_tokens,
            input_tokens: reply.input_tokens,
            output_tokens: reply.output_tokens,
            total_cost: self
                .settings
                .price(&reply.model)
                .cost(reply.input_tokens, reply.output_tokens),
        };
        log::debug!(
            "LLM call: {} tokens, cost {:.6}",
            record.total_tokens,
            record.total_cost
        );

        if let Err(e) = call_log.lock().await.append(record) {
            log::error!("Failed to write LLM call log: {}", e);
        }
    }
}
