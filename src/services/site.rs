use async_trait::async_trait;
use thirtyfour::error::WebDriverError;
use thiserror::Error;

use crate::domain::{
    question::{Question, QuestionAnswer},
    search_params::SearchParameters,
    vacancy::{Vacancy, VacancyParseError},
};

#[derive(Debug, Error)]
pub enum SiteError {
    #[error("webdriver error: {0}")]
    WebDriver(#[from] WebDriverError),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("no resume titled '{0}' among your resumes")]
    ResumeNotFound(String),

    #[error(transparent)]
    Parse(#[from] VacancyParseError),

    #[error("failed to render PDF: {0}")]
    Pdf(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// What the site showed after pressing the respond button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationStart {
    Opened,
    /// The employer is in another country and the resume does not allow relocation.
    RelocationWarning,
}

/// Everything the bot needs from the job site. Implemented over a live browser
/// in `hh_site`, and in memory for tests.
#[async_trait]
pub trait JobSite: Send + Sync {
    async fn is_logged_in(&self) -> Result<bool, SiteError>;
    /// Opens the login form and submits the login; the user finishes the rest.
    async fn submit_login(&self, login: &str) -> Result<(), SiteError>;
    async fn login_completed(&self) -> Result<bool, SiteError>;

    /// Goes from the resume titled `resume_title` to the advanced search form.
    async fn open_advanced_search(&self, resume_title: &str) -> Result<(), SiteError>;
    async fn apply_search_parameters(&self, params: &SearchParameters) -> Result<(), SiteError>;
    async fn start_search(&self) -> Result<(), SiteError>;

    /// Moves to result page `page` (1-based). `false` when there is no such page.
    async fn go_to_page(&self, page: u32) -> Result<bool, SiteError>;
    async fn vacancy_count(&self) -> Result<usize, SiteError>;
    async fn open_vacancy(&self, index: usize) -> Result<(), SiteError>;
    async fn scrape_vacancy(&self) -> Result<Vacancy, SiteError>;
    async fn close_vacancy(&self) -> Result<(), SiteError>;

    async fn has_response_button(&self) -> Result<bool, SiteError>;
    async fn start_application(&self, resume_title: &str) -> Result<ApplicationStart, SiteError>;
    async fn questions(&self) -> Result<Vec<Question>, SiteError>;
    /// `false` when none of the answer's options could be selected.
    async fn answer_question(&self, index: usize, answer: &QuestionAnswer) -> Result<bool, SiteError>;
    /// Re-selects the resume if the questions form asks for it again.
    async fn finish_questions(&self, resume_title: &str) -> Result<(), SiteError>;
    async fn send_cover_letter(&self, letter: &str) -> Result<(), SiteError>;

    async fn render_pdf(&self, html: &str) -> Result<Vec<u8>, SiteError>;
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        collections::VecDeque,
        sync::Mutex,
    };

    use async_trait::async_trait;

    use super::{ApplicationStart, JobSite, SiteError};
    use crate::domain::{
        question::{Question, QuestionAnswer},
        search_params::SearchParameters,
        vacancy::Vacancy,
    };

    /// In-memory site: result pages of vacancies, each with its own questions.
    #[derive(Default)]
    pub(crate) struct FakeSite {
        pub(crate) pages: Vec<Vec<FakeVacancy>>,
        /// Pages whose navigation fails with a driver error.
        pub(crate) broken_pages: Vec<u32>,
        pub(crate) logged_in: Mutex<bool>,
        pub(crate) login_polls_needed: Mutex<u32>,
        pub(crate) state: Mutex<FakeState>,
    }

    #[derive(Clone, Default)]
    pub(crate) struct FakeVacancy {
        pub(crate) vacancy: Option<Vacancy>,
        pub(crate) has_response_button: bool,
        pub(crate) relocation_warning: bool,
        pub(crate) fails_to_open: bool,
        pub(crate) questions: Vec<Question>,
    }

    #[derive(Default)]
    pub(crate) struct FakeState {
        pub(crate) page: u32,
        pub(crate) open: Option<usize>,
        pub(crate) submitted_logins: Vec<String>,
        pub(crate) search_started: bool,
        pub(crate) applications: Vec<String>,
        pub(crate) answers: Vec<(String, QuestionAnswer)>,
        pub(crate) letters: Vec<String>,
        pub(crate) pdfs: usize,
        pub(crate) closed: usize,
        pub(crate) events: VecDeque<&'static str>,
    }

    impl FakeVacancy {
        pub(crate) fn new(vacancy: Vacancy) -> Self {
            FakeVacancy {
                vacancy: Some(vacancy),
                has_response_button: true,
                ..Default::default()
            }
        }

        pub(crate) fn with_questions(mut self, questions: Vec<Question>) -> Self {
            self.questions = questions;
            self
        }
    }

    impl FakeSite {
        pub(crate) fn with_pages(pages: Vec<Vec<FakeVacancy>>) -> Self {
            FakeSite {
                pages,
                ..Default::default()
            }
        }

        fn current(&self) -> Result<FakeVacancy, SiteError> {
            let state = self.state.lock().unwrap();
            let page = state.page.max(1) as usize - 1;
            let index = state
                .open
                .ok_or_else(|| SiteError::ElementNotFound("open vacancy".to_string()))?;
            Ok(self.pages[page][index].clone())
        }
    }

    #[async_trait]
    impl JobSite for FakeSite {
        async fn is_logged_in(&self) -> Result<bool, SiteError> {
            Ok(*self.logged_in.lock().unwrap())
        }

        async fn submit_login(&self, login: &str) -> Result<(), SiteError> {
            self.state
                .lock()
                .unwrap()
                .submitted_logins
                .push(login.to_string());
            Ok(())
        }

        async fn login_completed(&self) -> Result<bool, SiteError> {
            let mut polls = self.login_polls_needed.lock().unwrap();
            if *polls == 0 {
                *self.logged_in.lock().unwrap() = true;
                return Ok(true);
            }
            *polls -= 1;
            Ok(false)
        }

        async fn open_advanced_search(&self, _resume_title: &str) -> Result<(), SiteError> {
            self.state.lock().unwrap().events.push_back("advanced_search");
            Ok(())
        }

        async fn apply_search_parameters(&self, _params: &SearchParameters) -> Result<(), SiteError> {
            self.state.lock().unwrap().events.push_back("parameters");
            Ok(())
        }

        async fn start_search(&self) -> Result<(), SiteError> {
            let mut state = self.state.lock().unwrap();
            state.search_started = true;
            state.events.push_back("search");
            Ok(())
        }

        async fn go_to_page(&self, page: u32) -> Result<bool, SiteError> {
            if self.broken_pages.contains(&page) {
                return Err(SiteError::ElementNotFound(format!("page {}", page)));
            }
            if page as usize > self.pages.len() {
                return Ok(false);
            }
            self.state.lock().unwrap().page = page;
            Ok(true)
        }

        async fn vacancy_count(&self) -> Result<usize, SiteError> {
            let page = self.state.lock().unwrap().page.max(1) as usize - 1;
            Ok(self.pages.get(page).map(Vec::len).unwrap_or(0))
        }

        async fn open_vacancy(&self, index: usize) -> Result<(), SiteError> {
            let page = self.state.lock().unwrap().page.max(1) as usize - 1;
            if self.pages[page][index].fails_to_open {
                return Err(SiteError::ElementNotFound("serp-item__title".to_string()));
            }
            self.state.lock().unwrap().open = Some(index);
            Ok(())
        }

        async fn scrape_vacancy(&self) -> Result<Vacancy, SiteError> {
            self.current()?
                .vacancy
                .ok_or_else(|| SiteError::ElementNotFound("vacancy-title".to_string()))
        }

        async fn close_vacancy(&self) -> Result<(), SiteError> {
            let mut state = self.state.lock().unwrap();
            state.open = None;
            state.closed += 1;
            Ok(())
        }

        async fn has_response_button(&self) -> Result<bool, SiteError> {
            Ok(self.current()?.has_response_button)
        }

        async fn start_application(&self, _resume_title: &str) -> Result<ApplicationStart, SiteError> {
            let current = self.current()?;
            if current.relocation_warning {
                return Ok(ApplicationStart::RelocationWarning);
            }
            let title = current.vacancy.map(|v| v.title).unwrap_or_default();
            self.state.lock().unwrap().applications.push(title);
            Ok(ApplicationStart::Opened)
        }

        async fn questions(&self) -> Result<Vec<Question>, SiteError> {
            Ok(self.current()?.questions)
        }

        async fn answer_question(&self, index: usize, answer: &QuestionAnswer) -> Result<bool, SiteError> {
            let question = self.current()?.questions[index].text.clone();
            self.state
                .lock()
                .unwrap()
                .answers
                .push((question, answer.clone()));
            Ok(true)
        }

        async fn finish_questions(&self, _resume_title: &str) -> Result<(), SiteError> {
            Ok(())
        }

        async fn send_cover_letter(&self, letter: &str) -> Result<(), SiteError> {
            self.state.lock().unwrap().letters.push(letter.to_string());
            Ok(())
        }

        async fn render_pdf(&self, html: &str) -> Result<Vec<u8>, SiteError> {
            self.state.lock().unwrap().pdfs += 1;
            Ok(format!("%PDF-{}", html.len()).into_bytes())
        }
    }
}
