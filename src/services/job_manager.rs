use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use thiserror::Error;

use crate::{
    configuration::{BotSettings, DataFolder},
    dal::{answer_db::AnswerCache, ledger_db::Ledgers, PersistError},
    domain::{
        outcome::ApplyOutcome,
        question::{Question, QuestionAnswer, QuestionKind},
        search_params::SearchParameters,
        vacancy::Vacancy,
    },
};

use super::{
    pause::interruptible_sleep,
    resume_generator::{save_pdf, ResumeError},
    AnswerError, Answerer, ApplicationStart, JobInterest, JobSite, ResumeGenerator, SiteError,
    TextAnswer,
};

const SETTINGS_REVIEW_TIME: Duration = Duration::from_secs(120);
const UNKNOWN_COMPANY: &str = "<unknown>";

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error(transparent)]
    Site(#[from] SiteError),

    #[error(transparent)]
    Answer(#[from] AnswerError),

    #[error(transparent)]
    Resume(#[from] ResumeError),

    #[error("failed to update the ledgers: {0}")]
    Persist(#[from] PersistError),

    /// A question the bot cannot answer; the vacancy is skipped.
    #[error("{0}")]
    Unanswerable(String),
}

#[derive(Debug, Clone)]
pub struct ApplySettings {
    pub monkey_mode: bool,
    pub debug_mode: bool,
    pub resume_mode: bool,
    pub apply_once_at_company: bool,
    pub minimum_wait: Duration,
    pub max_applies_num: u32,
    pub generated_cv_dir: PathBuf,
}

impl ApplySettings {
    pub fn new(bot: &BotSettings, data_folder: &DataFolder) -> Self {
        ApplySettings {
            monkey_mode: bot.monkey_mode,
            debug_mode: bot.debug_mode,
            resume_mode: bot.resume_mode,
            apply_once_at_company: bot.apply_once_at_company,
            minimum_wait: Duration::from_secs(bot.minimum_wait_time_sec),
            max_applies_num: bot.max_applies_num,
            generated_cv_dir: data_folder.generated_cv_dir(),
        }
    }
}

impl Default for ApplySettings {
    fn default() -> Self {
        ApplySettings::new(&BotSettings::default(), &DataFolder::new("data_folder"))
    }
}

/// Walks the search results and applies to every vacancy that passes the checks.
pub struct JobManager<S: JobSite> {
    site: Arc<S>,
    answerer: Answerer,
    resume_generator: ResumeGenerator,
    ledgers: Ledgers,
    answers: AnswerCache,
    search: SearchParameters,
    settings: ApplySettings,
    review_time: Duration,
}

impl<S: JobSite> JobManager<S> {
    pub fn new(
        site: Arc<S>,
        answerer: Answerer,
        resume_generator: ResumeGenerator,
        ledgers: Ledgers,
        answers: AnswerCache,
        search: SearchParameters,
        settings: ApplySettings,
    ) -> Self {
        JobManager {
            site,
            answerer,
            resume_generator,
            ledgers,
            answers,
            search,
            settings,
            review_time: SETTINGS_REVIEW_TIME,
        }
    }

    /// How long the user gets to check the search form before the search starts.
    pub fn with_review_time(mut self, review_time: Duration) -> Self {
        self.review_time = review_time;
        self
    }

    pub fn ledgers(&self) -> &Ledgers {
        &self.ledgers
    }

    pub async fn set_search_parameters(&self) -> Result<(), SiteError> {
        log::info!("Setting search parameters for '{}'", self.search.job_title);
        self.site.open_advanced_search(&self.search.job_title).await?;
        self.site.apply_search_parameters(&self.search).await?;

        log::info!("Check the search settings in the browser");
        interruptible_sleep(self.review_time).await;

        self.site.start_search().await
    }

    /// Applies until `max_applies_num` successes or the results run out.
    /// Returns the number of successful applications.
    pub async fn start_applying(&mut self) -> Result<u32, ApplyError> {
        let mut applied = 0;
        let mut page = 1;

        'pages: while applied < self.settings.max_applies_num {
            match self.site.go_to_page(page).await {
                Ok(true) => {}
                Ok(false) => {
                    log::info!("No more result pages");
                    break;
                }
                Err(e) => {
                    log::error!("Could not open result page {}: {}", page, e);
                    break;
                }
            }
            let count = match self.site.vacancy_count().await {
                Ok(count) => count,
                Err(e) => {
                    log::error!("Could not count vacancies on page {}: {}", page, e);
                    break;
                }
            };
            log::info!("Page {}: {} vacancies", page, count);

            for index in 0..count {
                if applied >= self.settings.max_applies_num {
                    break 'pages;
                }
                let started = Instant::now();

                match self.process_vacancy(index).await {
                    Ok(outcome) => {
                        if outcome.is_success() {
                            applied += 1;
                        }
                    }
                    Err(e @ ApplyError::Persist(_)) => return Err(e),
                    Err(e) => {
                        log::error!("Vacancy #{} on page {} failed: {}", index + 1, page, e);
                        if let Err(e) = self.site.close_vacancy().await {
                            log::error!("Could not close the vacancy: {}", e);
                        }
                    }
                }

                let elapsed = started.elapsed();
                if elapsed < self.settings.minimum_wait {
                    interruptible_sleep(self.settings.minimum_wait - elapsed).await;
                }
            }
            page += 1;
        }

        log::info!("Finished applying: {} successful applications", applied);
        Ok(applied)
    }

    async fn process_vacancy(&mut self, index: usize) -> Result<ApplyOutcome, ApplyError> {
        let opened = match self.site.open_vacancy(index).await {
            Ok(()) => self.site.scrape_vacancy().await,
            Err(e) => Err(e),
        };
        let vacancy = match opened {
            Ok(vacancy) => vacancy,
            Err(e) => {
                log::error!("Could not read vacancy #{}: {}", index + 1, e);
                let outcome = ApplyOutcome::Error(e.to_string());
                self.ledgers
                    .record(UNKNOWN_COMPANY, UNKNOWN_COMPANY, "", &outcome)?;
                self.site.close_vacancy().await?;
                return Ok(outcome);
            }
        };
        log::info!("Vacancy '{}' at '{}'", vacancy.title, vacancy.company_name);

        let outcome = match self.evaluate_and_apply(&vacancy).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("Applying to '{}' failed: {}", vacancy.title, e);
                ApplyOutcome::Error(e.to_string())
            }
        };
        match &outcome {
            ApplyOutcome::Success => log::info!("Applied to '{}'", vacancy.title),
            ApplyOutcome::Skip(reason) => log::warn!("Skipped '{}': {}", vacancy.title, reason),
            ApplyOutcome::Error(_) => {}
        }

        self.ledgers.record(
            &vacancy.company_name,
            &vacancy.title,
            &vacancy.link,
            &outcome,
        )?;
        self.site.close_vacancy().await?;
        Ok(outcome)
    }

    async fn evaluate_and_apply(&mut self, vacancy: &Vacancy) -> Result<ApplyOutcome, ApplyError> {
        if self.search.is_blacklisted(&vacancy.company_name) {
            return Ok(ApplyOutcome::Skip("Company is blacklisted".to_string()));
        }
        if let Some(reason) = self.ledgers.already_applied(
            &vacancy.company_name,
            &vacancy.title,
            self.settings.apply_once_at_company,
        ) {
            return Ok(ApplyOutcome::Skip(reason));
        }

        if self.settings.monkey_mode {
            log::debug!("Monkey mode, not scoring the vacancy");
        } else {
            match self.answerer.job_is_interesting(vacancy).await {
                JobInterest::Interesting { .. } => {}
                JobInterest::NotInteresting { score, reasoning } => {
                    let score = score.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string());
                    return Ok(ApplyOutcome::Skip(format!(
                        "Not interesting (score {}): {}",
                        score, reasoning
                    )));
                }
                JobInterest::Unknown(e) => {
                    return Ok(ApplyOutcome::Error(format!("LLM error: {}", e)));
                }
            }
        }

        self.apply(vacancy).await
    }

    async fn apply(&mut self, vacancy: &Vacancy) -> Result<ApplyOutcome, ApplyError> {
        if !self.site.has_response_button().await? {
            return Ok(ApplyOutcome::Skip(
                "Already responded or responses are closed".to_string(),
            ));
        }

        let letter = self.answerer.write_cover_letter(vacancy).await?;

        if self.settings.debug_mode {
            log::info!("Debug mode, not submitting. Cover letter:\n{}", letter);
            return Ok(ApplyOutcome::Success);
        }
        if self.settings.resume_mode {
            self.generate_resume(vacancy).await?;
            return Ok(ApplyOutcome::Success);
        }

        let resume_title = self.search.job_title.clone();
        if self.site.start_application(&resume_title).await? == ApplicationStart::RelocationWarning {
            return Ok(ApplyOutcome::Skip("Vacancy requires relocation".to_string()));
        }

        let questions = self.site.questions().await?;
        for (index, question) in questions.iter().enumerate() {
            let answer = match self.answer_question(question).await {
                Ok(answer) => answer,
                Err(ApplyError::Unanswerable(reason)) => return Ok(ApplyOutcome::Skip(reason)),
                Err(e) => return Err(e),
            };
            if !self.site.answer_question(index, &answer).await? {
                return Ok(ApplyOutcome::Skip(format!(
                    "Could not enter the answer to '{}'",
                    question.text
                )));
            }
        }
        if !questions.is_empty() {
            self.site.finish_questions(&resume_title).await?;
        }

        self.site.send_cover_letter(&letter).await?;
        Ok(ApplyOutcome::Success)
    }

    async fn answer_question(&mut self, question: &Question) -> Result<QuestionAnswer, ApplyError> {
        let answer = match &question.kind {
            QuestionKind::SingleChoice(options) => self
                .answerer
                .select_one(&question.text, options)
                .await
                .map(QuestionAnswer::Choose),
            QuestionKind::MultipleChoice(options) => self
                .answerer
                .select_many(&question.text, options)
                .await
                .map(QuestionAnswer::ChooseMany),
            QuestionKind::Text => return self.answer_text_question(&question.text).await,
            QuestionKind::Unsupported => {
                return Err(ApplyError::Unanswerable(format!(
                    "Unsupported question '{}'",
                    question.text
                )))
            }
        };

        match answer {
            Ok(answer) => Ok(answer),
            Err(AnswerError::NoOption(reply)) => Err(ApplyError::Unanswerable(format!(
                "No option of '{}' matches '{}'",
                question.text, reply
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn answer_text_question(&mut self, question: &str) -> Result<QuestionAnswer, ApplyError> {
        if let Some(cached) = self.answers.lookup(question) {
            log::debug!("Reusing the stored answer to '{}'", question);
            return Ok(QuestionAnswer::Text(cached.to_string()));
        }

        match self.answerer.answer_textual(question).await? {
            TextAnswer::Answer(answer) => {
                self.answers.insert(question, &answer)?;
                Ok(QuestionAnswer::Text(answer))
            }
            TextAnswer::UnknownTopic => Err(ApplyError::Unanswerable(format!(
                "Question '{}' is not covered by the resume",
                question
            ))),
        }
    }

    async fn generate_resume(&self, vacancy: &Vacancy) -> Result<(), ApplyError> {
        log::info!("Generating a resume for '{}'", vacancy.title);
        let html = self
            .resume_generator
            .generate_html(&vacancy.to_prompt_text())
            .await?;
        let pdf = self.site.render_pdf(&html).await?;
        save_pdf(&self.settings.generated_cv_dir, &pdf)?;
        Ok(())
    }
}
