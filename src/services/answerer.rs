use std::sync::Arc;

use regex::Regex;
use thiserror::Error;

use crate::domain::{
    resume::{render, Resume, ResumeSection},
    text::{find_best_match, split_choices},
    vacancy::Vacancy,
};

use super::{prompts, ChatModel, LlmError};

#[derive(Debug, Error)]
pub enum AnswerError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("could not determine the topic of question '{question}' from reply '{reply}'")]
    UnknownSection { question: String, reply: String },

    #[error("no option matches reply '{0}'")]
    NoOption(String),
}

/// Verdict on whether a vacancy is worth applying to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobInterest {
    Interesting { score: u32 },
    NotInteresting { score: Option<u32>, reasoning: String },
    /// The LLM could not be asked.
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextAnswer {
    Answer(String),
    /// The question does not belong to any resume section.
    UnknownTopic,
}

pub struct Answerer {
    chat: Arc<ChatModel>,
    resume: Arc<Resume>,
    interest_threshold: u32,
    fixed_cover_letter: Option<String>,
    score_re: Regex,
    reasoning_re: Regex,
    section_re: Regex,
}

impl Answerer {
    pub fn new(
        chat: Arc<ChatModel>,
        resume: Arc<Resume>,
        interest_threshold: u32,
        fixed_cover_letter: Option<String>,
    ) -> Self {
        let labels = ResumeSection::ALL
            .iter()
            .map(|section| regex::escape(section.label()))
            .chain(["Other".to_string()])
            .collect::<Vec<_>>()
            .join("|");

        Answerer {
            chat,
            resume,
            interest_threshold,
            fixed_cover_letter,
            score_re: Regex::new(r"Score:\s*(\d+)").expect("score pattern is valid"),
            reasoning_re: Regex::new(r"(?s)Reasoning:\s*(.+)").expect("reasoning pattern is valid"),
            section_re: Regex::new(&format!("(?i)({})", labels)).expect("section pattern is valid"),
        }
    }

    pub async fn job_is_interesting(&self, vacancy: &Vacancy) -> JobInterest {
        let prompt = prompts::job_is_interesting(
            &vacancy.to_prompt_text(),
            &self.resume.to_prompt_text(),
            &self.resume.skills.join(", "),
            &render(&serde_json::Value::from(self.resume.interests.clone())),
        );

        let reply = match self.chat.invoke(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                log::error!("Could not score vacancy '{}': {}", vacancy.title, e);
                return JobInterest::Unknown(e.to_string());
            }
        };
        log::debug!("Interest reply: {}", reply);

        self.parse_interest(&reply)
    }

    fn parse_interest(&self, reply: &str) -> JobInterest {
        let score = self
            .score_re
            .captures(reply)
            .and_then(|c| c[1].parse::<u32>().ok());
        let reasoning = self
            .reasoning_re
            .captures(reply)
            .map(|c| c[1].trim().to_string());

        let (Some(score), Some(reasoning)) = (score, reasoning) else {
            log::error!("LLM returned a malformed score: '{}'", reply);
            return JobInterest::NotInteresting {
                score: None,
                reasoning: "Malformed LLM reply".to_string(),
            };
        };

        log::info!("Vacancy score: {}", score);
        if score >= self.interest_threshold {
            JobInterest::Interesting { score }
        } else {
            log::debug!("Vacancy is not interesting: {}", reasoning);
            JobInterest::NotInteresting {
                score: Some(score),
                reasoning,
            }
        }
    }

    /// Routes the question to a resume section and answers from it.
    pub async fn answer_textual(&self, question: &str) -> Result<TextAnswer, AnswerError> {
        log::debug!("Answering text question: '{}'", question);
        let reply = self
            .chat
            .invoke(&prompts::section_classification(question))
            .await?;

        let label = self
            .section_re
            .captures(&reply)
            .map(|c| c[1].to_string())
            .ok_or_else(|| AnswerError::UnknownSection {
                question: question.to_string(),
                reply: reply.clone(),
            })?;

        let Some(section) = ResumeSection::from_label(&label) else {
            log::warn!("Question '{}' matches no resume section", question);
            return Ok(TextAnswer::UnknownTopic);
        };
        log::debug!("Question section: {}", section.label());

        let prompt = prompts::section_answer(
            section,
            &self.resume.section_text(section),
            question,
            self.resume.sex(),
        );
        let answer = self.chat.invoke(&prompt).await?;
        log::debug!("Answer: {}", answer);

        Ok(TextAnswer::Answer(answer.trim().to_string()))
    }

    pub async fn select_one(&self, question: &str, options: &[String]) -> Result<String, AnswerError> {
        log::debug!("Choosing one option for: {}", question);
        let prompt = prompts::select_one(&self.resume.to_prompt_text(), question, options);
        let reply = self.chat.invoke(&prompt).await?;

        let best = find_best_match(&reply, options).ok_or_else(|| AnswerError::NoOption(reply.clone()))?;
        log::debug!("Best option for reply '{}': {}", reply, best);
        Ok(best.clone())
    }

    pub async fn select_many(
        &self,
        question: &str,
        options: &[String],
    ) -> Result<Vec<String>, AnswerError> {
        log::debug!("Choosing options for: {}", question);
        let prompt = prompts::select_many(&self.resume.to_prompt_text(), question, options);
        let reply = self.chat.invoke(&prompt).await?;

        let mut chosen: Vec<String> = vec![];
        for choice in split_choices(&reply) {
            if let Some(best) = find_best_match(&choice, options) {
                if !chosen.contains(best) {
                    chosen.push(best.clone());
                }
            }
        }
        if chosen.is_empty() {
            return Err(AnswerError::NoOption(reply));
        }
        log::debug!("Best options: {:?}", chosen);
        Ok(chosen)
    }

    pub async fn write_cover_letter(&self, vacancy: &Vacancy) -> Result<String, AnswerError> {
        if let Some(letter) = &self.fixed_cover_letter {
            log::debug!("Using the fixed cover letter");
            return Ok(letter.clone());
        }

        let prompt = prompts::cover_letter(
            &vacancy.to_prompt_text(),
            &self.resume.to_prompt_text(),
            self.resume.sex(),
        );
        let letter = self.chat.invoke(&prompt).await?;
        log::debug!("Cover letter: '{}'", letter);
        Ok(letter.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{atomic::Ordering, Arc};

    use pretty_assertions::assert_eq;

    use super::{Answerer, JobInterest, TextAnswer};
    use crate::{
        domain::{resume::tests::resume, vacancy::tests::vacancy},
        services::{
            chat_model::tests::{chat_model, ScriptedBackend},
            LlmError,
        },
    };

    fn answerer(backend: ScriptedBackend) -> Answerer {
        Answerer::new(Arc::new(chat_model(backend)), Arc::new(resume()), 7, None)
    }

    fn replying(reply: &'static str) -> ScriptedBackend {
        ScriptedBackend::new(move |_| Ok(reply.to_string()))
    }

    fn options(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn score_at_threshold_is_interesting() {
        let answerer = answerer(replying("Score: 7\nReasoning: matches"));

        assert_eq!(
            answerer.job_is_interesting(&vacancy("Acme", "Rust")).await,
            JobInterest::Interesting { score: 7 }
        );
    }

    #[tokio::test]
    async fn score_below_threshold_is_not_interesting() {
        let answerer = answerer(replying("Score: 3\nReasoning: needs Java\nand Spring"));

        assert_eq!(
            answerer.job_is_interesting(&vacancy("Acme", "Java")).await,
            JobInterest::NotInteresting {
                score: Some(3),
                reasoning: "needs Java\nand Spring".to_string()
            }
        );
    }

    #[tokio::test]
    async fn malformed_score_is_not_interesting() {
        let answerer = answerer(replying("I think it fits"));

        assert!(matches!(
            answerer.job_is_interesting(&vacancy("Acme", "Rust")).await,
            JobInterest::NotInteresting { score: None, .. }
        ));
    }

    #[tokio::test]
    async fn llm_failure_is_unknown() {
        let answerer = answerer(ScriptedBackend::new(|_| {
            Err(LlmError::Api {
                status: 500,
                message: "down".to_string(),
            })
        }));

        assert!(matches!(
            answerer.job_is_interesting(&vacancy("Acme", "Rust")).await,
            JobInterest::Unknown(_)
        ));
    }

    #[tokio::test]
    async fn textual_question_uses_matching_section() {
        let backend = ScriptedBackend::new(|_| Ok("2 weeks".to_string()))
            .queued(vec![Ok("availability".to_string())]);
        let prompts = backend.prompts.clone();
        let answerer = answerer(backend);

        let answer = answerer.answer_textual("When can you start?").await.unwrap();

        assert_eq!(answer, TextAnswer::Answer("2 weeks".to_string()));
        let prompts = prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains("notice_period"));
    }

    #[tokio::test]
    async fn other_topic_is_not_answered() {
        let backend = replying("Other");
        let calls = backend.calls.clone();
        let answerer = answerer(backend);

        assert_eq!(
            answerer.answer_textual("Fill in our survey").await.unwrap(),
            TextAnswer::UnknownTopic
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unrecognised_topic_is_an_error() {
        let answerer = answerer(replying("No idea"));

        assert!(answerer.answer_textual("Anything?").await.is_err());
    }

    #[tokio::test]
    async fn select_one_picks_closest_option() {
        let answerer = answerer(replying("3-5 years"));

        let chosen = answerer
            .select_one("Years with Rust?", &options(&["1-2", "3-5", "6-10"]))
            .await
            .unwrap();
        assert_eq!(chosen, "3-5");
    }

    #[tokio::test]
    async fn select_many_matches_each_choice() {
        let answerer = answerer(replying("['Rust'; 'Go']"));

        let chosen = answerer
            .select_many("Languages?", &options(&["Rust", "Java", "Go"]))
            .await
            .unwrap();
        assert_eq!(chosen, options(&["Rust", "Go"]));
    }

    #[tokio::test]
    async fn fixed_cover_letter_skips_the_llm() {
        let backend = replying("generated");
        let calls = backend.calls.clone();
        let answerer = Answerer::new(
            Arc::new(chat_model(backend)),
            Arc::new(resume()),
            7,
            Some("Hello!".to_string()),
        );

        assert_eq!(
            answerer.write_cover_letter(&vacancy("Acme", "Rust")).await.unwrap(),
            "Hello!"
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
