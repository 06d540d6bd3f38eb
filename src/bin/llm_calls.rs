use std::path::PathBuf;

use anyhow::Context;
use applier::{
    configuration::DataFolder,
    dal::llm_call_db::{LlmCallLog, LlmCallRecord, LLM_CALLS_FILE},
    services::prompts::extract_job_description,
};
use clap::Parser;
use env_logger::Env;

#[derive(Parser, Debug)]
#[command(version, about = "Prints job descriptions and the LLM verdicts or cover letters written for them", long_about = None)]
struct Cli {
    #[arg(long, default_value = "data_folder")]
    data_folder: PathBuf,
}

fn describe(record: &LlmCallRecord) -> Option<String> {
    let description = record
        .prompts
        .values()
        .find_map(|prompt| extract_job_description(prompt))?;

    let (label, reply) = if record.replies.contains("Score:") {
        ("Verdict", record.replies.trim())
    } else {
        ("Cover letter", record.replies.trim())
    };
    Some(format!(
        "[{}] {}\n--- Job description ---\n{}\n--- {} ---\n{}\n",
        record.time, record.model, description, label, reply
    ))
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let path = DataFolder::new(cli.data_folder).output_dir().join(LLM_CALLS_FILE);
    let calls = LlmCallLog::load(path.clone())
        .with_context(|| format!("Failed to read {}", path.display()))?;
    log::info!("{} LLM calls recorded in {}", calls.records().len(), path.display());

    for record in calls.records() {
        if let Some(text) = describe(record) {
            println!("{}", text);
        }
    }
    log::info!("Total cost: {:.4}", calls.total_cost());

    Ok(())
}

#[cfg(test)]
mod tests {
    use applier::{
        dal::llm_call_db::{numbered_prompts, LlmCallRecord},
        services::prompts::{cover_letter, summarize_job_description},
    };

    use super::describe;

    fn record(prompt: &str, reply: &str) -> LlmCallRecord {
        LlmCallRecord {
            model: "gpt-4o-mini".to_string(),
            time: "2024-10-01 12:00:00".to_string(),
            prompts: numbered_prompts([prompt]),
            replies: reply.to_string(),
            total_tokens: 0,
            input_tokens: 0,
            output_tokens: 0,
            total_cost: 0.0,
        }
    }

    #[test]
    fn cover_letter_calls_are_printed() {
        let text = describe(&record(&cover_letter("Rust backend", "resume", "male"), "Dear team")).unwrap();

        assert!(text.contains("Rust backend\n--- Cover letter ---\nDear team"));
    }

    #[test]
    fn score_replies_are_verdicts() {
        let prompt = cover_letter("Rust backend", "resume", "male");
        let text = describe(&record(&prompt, "Score: 8\nReasoning: fits")).unwrap();

        assert!(text.contains("--- Verdict ---\nScore: 8"));
    }

    #[test]
    fn calls_without_description_are_ignored() {
        assert!(describe(&record(&summarize_job_description("Rust"), "summary")).is_none());
    }
}
