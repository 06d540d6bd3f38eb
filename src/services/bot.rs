use std::{path::Path, sync::Arc, time::Duration};

use thiserror::Error;

use crate::{
    dal::{
        answer_db::{AnswerCache, ANSWERS_FILE},
        ledger_db::Ledgers,
        PersistError,
    },
    domain::{resume::Resume, search_params::SearchParameters},
};

use super::{
    Answerer, ApplyError, ApplySettings, Authenticator, ChatModel, JobManager, JobSite,
    ResumeGenerator, SiteError,
};

#[derive(Debug, Error)]
pub enum BotError {
    #[error("cannot {step} before the {missing} is set")]
    NotReady {
        step: &'static str,
        missing: &'static str,
    },

    #[error(transparent)]
    Site(#[from] SiteError),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BotState {
    pub parameters_set: bool,
    pub resume_set: bool,
    pub answerer_set: bool,
    pub logged_in: bool,
    pub search_parameters_set: bool,
}

impl BotState {
    fn require(&self, step: &'static str, needs: &[(bool, &'static str)]) -> Result<(), BotError> {
        match needs.iter().find(|(done, _)| !done) {
            Some((_, missing)) => Err(BotError::NotReady { step, missing }),
            None => Ok(()),
        }
    }
}

struct Parameters {
    search: SearchParameters,
    settings: ApplySettings,
    ledgers: Ledgers,
    answers: AnswerCache,
}

/// Drives one run: parameters, resume and answerer first, then login,
/// search form and the apply loop, in that order.
pub struct Bot<S: JobSite> {
    site: Arc<S>,
    authenticator: Authenticator<S>,
    state: BotState,
    login: String,
    parameters: Option<Parameters>,
    resume: Option<Arc<Resume>>,
    answerer: Option<(Answerer, ResumeGenerator)>,
    job_manager: Option<JobManager<S>>,
    review_time: Option<Duration>,
}

impl<S: JobSite> Bot<S> {
    pub fn new(site: Arc<S>) -> Self {
        Bot {
            authenticator: Authenticator::new(site.clone()),
            site,
            state: BotState::default(),
            login: String::new(),
            parameters: None,
            resume: None,
            answerer: None,
            job_manager: None,
            review_time: None,
        }
    }

    pub fn with_review_time(mut self, review_time: Duration) -> Self {
        self.review_time = Some(review_time);
        self
    }

    pub fn state(&self) -> BotState {
        self.state
    }

    /// Opens the ledgers and the answer cache under `output_dir` for this login and title.
    pub fn set_parameters(
        &mut self,
        search: SearchParameters,
        settings: ApplySettings,
        output_dir: &Path,
    ) -> Result<(), BotError> {
        let ledgers = Ledgers::open(output_dir, &search.login, &search.job_title)?;
        let answers = AnswerCache::load(output_dir.join(ANSWERS_FILE))?;
        log::debug!("{} stored answers loaded", answers.len());

        self.login = search.login.clone();
        self.parameters = Some(Parameters {
            search,
            settings,
            ledgers,
            answers,
        });
        self.state.parameters_set = true;
        Ok(())
    }

    pub fn set_resume(&mut self, resume: Arc<Resume>) {
        self.resume = Some(resume);
        self.state.resume_set = true;
    }

    pub fn set_answerer(
        &mut self,
        chat: Arc<ChatModel>,
        interest_threshold: u32,
        fixed_cover_letter: Option<String>,
        resume_style: Option<&Path>,
    ) -> Result<(), BotError> {
        let Some(resume) = self.resume.clone() else {
            return Err(BotError::NotReady {
                step: "set the answerer",
                missing: "resume",
            });
        };

        let answerer = Answerer::new(chat.clone(), resume.clone(), interest_threshold, fixed_cover_letter);
        let generator = ResumeGenerator::new(chat, resume, resume_style.map(Path::to_path_buf));
        self.answerer = Some((answerer, generator));
        self.state.answerer_set = true;
        Ok(())
    }

    pub async fn start_login(&mut self) -> Result<(), BotError> {
        self.state.require(
            "log in",
            &[
                (self.state.parameters_set, "search configuration"),
                (self.state.resume_set, "resume"),
                (self.state.answerer_set, "answerer"),
            ],
        )?;

        self.authenticator.login(&self.login).await?;
        self.state.logged_in = true;
        Ok(())
    }

    pub async fn set_search_parameters(&mut self) -> Result<(), BotError> {
        const STEP: &str = "set search parameters";
        self.state.require(
            STEP,
            &[
                (self.state.logged_in, "login"),
                (self.state.parameters_set, "search configuration"),
                (self.state.answerer_set, "answerer"),
            ],
        )?;

        if self.job_manager.is_none() {
            let not_ready = |missing| BotError::NotReady { step: STEP, missing };
            let parameters = self.parameters.take().ok_or_else(|| not_ready("search configuration"))?;
            let (answerer, generator) = self.answerer.take().ok_or_else(|| not_ready("answerer"))?;

            let mut manager = JobManager::new(
                self.site.clone(),
                answerer,
                generator,
                parameters.ledgers,
                parameters.answers,
                parameters.search,
                parameters.settings,
            );
            if let Some(review_time) = self.review_time {
                manager = manager.with_review_time(review_time);
            }
            self.job_manager = Some(manager);
        }

        if let Some(manager) = &self.job_manager {
            manager.set_search_parameters().await?;
        }
        self.state.search_parameters_set = true;
        Ok(())
    }

    /// Returns the number of successful applications.
    pub async fn start_applying(&mut self) -> Result<u32, BotError> {
        const STEP: &str = "start applying";
        self.state.require(
            STEP,
            &[
                (self.state.logged_in, "login"),
                (self.state.parameters_set, "search configuration"),
                (self.state.search_parameters_set, "search form"),
            ],
        )?;

        let manager = self.job_manager.as_mut().ok_or(BotError::NotReady {
            step: STEP,
            missing: "search form",
        })?;
        Ok(manager.start_applying().await?)
    }
}
