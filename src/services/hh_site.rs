use std::{sync::Mutex, time::Duration};

use async_trait::async_trait;
use thirtyfour::{prelude::*, WindowHandle};

use crate::{
    configuration::BrowserSettings,
    domain::{
        question::{Question, QuestionAnswer, QuestionKind},
        search_params::{Control, SearchParameters, SEARCH_ONLY},
        vacancy::Vacancy,
    },
};

use super::{
    pause::pause,
    site::{ApplicationStart, JobSite, SiteError},
    Droid,
};

const HH_URL: &str = "https://hh.ru";
const RESUMES_URL: &str = "https://hh.ru/applicant/resumes";
const WAIT_TIMEOUT: Duration = Duration::from_secs(4);
const RESUME_LIST_CLASS: &str = "vacancy-response-popup-resume-list";

fn data_qa_prefix(prefix: &str) -> By {
    By::XPath(format!("//*[starts-with(@data-qa, '{}')]", prefix))
}

/// `JobSite` over a live hh.ru session.
pub struct HhSite {
    droid: Droid,
    browser: BrowserSettings,
    results_window: Mutex<Option<WindowHandle>>,
}

impl HhSite {
    pub fn new(droid: Droid, browser: BrowserSettings) -> Self {
        HhSite {
            droid,
            browser,
            results_window: Mutex::new(None),
        }
    }

    pub fn into_droid(self) -> Droid {
        self.droid
    }

    fn driver(&self) -> &WebDriver {
        &self.droid.driver
    }

    async fn exists(&self, by: By) -> Result<bool, SiteError> {
        Ok(!self.driver().find_all(by).await?.is_empty())
    }

    async fn click_control(&self, control: Control) -> Result<(), SiteError> {
        match control {
            Control::DataQa(data_qa) => self.droid.click_by_data_qa(data_qa).await,
            Control::Text(text) => {
                if self.droid.click_by_text(text).await.is_ok() {
                    return Ok(());
                }
                // some labels carry more text than the option name
                let labels = self
                    .driver()
                    .find_all(By::XPath(format!(
                        "//*[contains(@class, 'bloko-checkbox__text') and contains(., '{}')]",
                        text
                    )))
                    .await?;
                let label = labels
                    .into_iter()
                    .next()
                    .ok_or_else(|| SiteError::ElementNotFound(text.to_string()))?;
                self.droid.scroll_slow(&label).await?;
                label.click().await?;
                Ok(())
            }
        }
    }

    /// Picks `value` in one of the tree-selector popups (specialization, industry).
    async fn pick_from_tree(&self, switcher: &str, value: &str) -> Result<(), SiteError> {
        self.droid.click_by_data_qa(switcher).await?;
        let search = self
            .droid
            .wait_for_data_qa("bloko-tree-selector-popup-search", WAIT_TIMEOUT)
            .await?;
        self.droid.enter_text(&search, value).await?;
        pause(1.0, 2.0).await;

        let mut items = self
            .driver()
            .find_all(By::XPath(format!("//*[text()=\"{}\"]", value)))
            .await?;
        if items.is_empty() {
            items = self
                .driver()
                .find_all(data_qa_prefix(
                    "bloko-tree-selector-item-text bloko-tree-selector-item-text",
                ))
                .await?;
        }

        match items.first() {
            Some(item) => {
                item.click().await?;
                pause(1.0, 2.0).await;
                self.droid
                    .find_by_data_qa("bloko-tree-selector-popup-submit")
                    .await?
                    .click()
                    .await?;
            }
            None => {
                log::warn!("Nothing matches '{}' in {}", value, switcher);
                self.droid
                    .find_by_data_qa("bloko-modal-close")
                    .await?
                    .click()
                    .await?;
            }
        }
        Ok(())
    }

    async fn enter_list(&self, data_qa: &str, values: &[String], required: bool) -> Result<(), SiteError> {
        if values.is_empty() {
            return Ok(());
        }
        match self.droid.find_by_data_qa(data_qa).await {
            Ok(input) => self.droid.enter_each(&input, values).await,
            Err(_) if !required => {
                log::debug!("No '{}' input on the form", data_qa);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn choose_resume_in_popup(&self, resume_title: &str, scroll: bool) -> Result<(), SiteError> {
        if !self
            .exists(By::ClassName(RESUME_LIST_CLASS))
            .await?
        {
            return Ok(());
        }
        log::debug!("Choosing resume '{}' in the response popup", resume_title);

        for button in self.droid.find_all_by_data_qa("resume-title").await? {
            if button.text().await? != resume_title {
                continue;
            }
            if scroll {
                self.droid.scroll_slow(&button).await?;
            }
            button.click().await?;
            if !scroll {
                self.droid
                    .click_by_data_qa("vacancy-response-submit-popup")
                    .await?;
            }
        }
        Ok(())
    }

    async fn question_elements(&self) -> Result<Vec<WebElement>, SiteError> {
        self.droid.find_all_by_data_qa("task-body").await
    }

    async fn submit_letter(&self, field: &WebElement, letter: &str, submit: &str) -> Result<(), SiteError> {
        self.droid.scroll_slow(field).await?;
        self.droid.enter_text(field, letter).await?;
        pause(1.0, 2.0).await;
        let button = self.droid.find_by_data_qa(submit).await?;
        self.droid.scroll_slow(&button).await?;
        button.click().await?;
        log::debug!("Cover letter sent");
        Ok(())
    }

    async fn send_letter_to_chat(&self, letter: &str) -> Result<(), SiteError> {
        log::debug!("Looking for the employer chat");
        let chat_button = self
            .droid
            .find_by_data_qa("vacancy-response-link-view-topic")
            .await?;
        self.droid.scroll_slow(&chat_button).await?;
        chat_button.click().await?;

        for frame in self.driver().find_all(By::Tag("iframe")).await? {
            let class = frame.class_name().await?.unwrap_or_default();
            if class != "chatik-integration-iframe chatik-integration-iframe_loaded" {
                continue;
            }
            frame.enter_frame().await?;
            let sent = async {
                self.droid
                    .click_by_data_qa("chatik-chat-message-applicant-action-text")
                    .await?;
                let field = self.droid.find_by_data_qa("chatik-new-message-text").await?;
                self.droid.enter_text(&field, letter).await?;
                pause(1.0, 2.0).await;
                field.send_keys(Key::Enter + "").await?;
                Ok::<_, SiteError>(())
            }
            .await;
            self.driver().enter_default_frame().await?;
            if sent.is_ok() {
                log::debug!("Cover letter sent to the chat");
            }
            return sent;
        }

        self.driver().enter_default_frame().await?;
        Err(SiteError::ElementNotFound("employer chat".to_string()))
    }
}

#[async_trait]
impl JobSite for HhSite {
    async fn is_logged_in(&self) -> Result<bool, SiteError> {
        self.driver().goto(HH_URL).await?;
        log::debug!("Checking whether the user is logged in");

        self.driver()
            .query(By::ClassName("supernova-logo-wrapper"))
            .wait(Duration::from_secs(3), Duration::from_millis(500))
            .first()
            .await
            .map_err(|_| SiteError::ElementNotFound("site logo, is the site reachable?".to_string()))?;

        for menu in ["mainmenu_myResumes", "mainmenu_applicantProfile"] {
            if !self.droid.find_all_by_data_qa(menu).await?.is_empty() {
                log::debug!("Found '{}', the user is logged in", menu);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn submit_login(&self, login: &str) -> Result<(), SiteError> {
        self.driver().goto(HH_URL).await?;
        self.droid.click_by_data_qa("login").await?;

        let field = self
            .driver()
            .query(By::Name("login"))
            .wait(Duration::from_secs(3), Duration::from_millis(500))
            .first()
            .await
            .map_err(|_| SiteError::ElementNotFound("login form".to_string()))?;
        field.send_keys(login).await?;
        self.droid
            .click_by_data_qa("account-signup-submit")
            .await
    }

    async fn login_completed(&self) -> Result<bool, SiteError> {
        Ok(!self
            .droid
            .find_all_by_data_qa("mainmenu_vacancyResponses")
            .await?
            .is_empty())
    }

    async fn open_advanced_search(&self, resume_title: &str) -> Result<(), SiteError> {
        log::debug!("Opening resume '{}'", resume_title);
        self.driver().goto(RESUMES_URL).await?;

        let titles = match self
            .driver()
            .query(data_qa_prefix("resume-title-link"))
            .wait(WAIT_TIMEOUT, Duration::from_secs(1))
            .all_from_selector_required()
            .await
        {
            Ok(titles) => titles,
            Err(_) => self.driver().find_all(data_qa_prefix("resume-title")).await?,
        };

        let mut position = None;
        for (i, title) in titles.iter().enumerate() {
            if title.text().await? == resume_title {
                position = Some(i);
                break;
            }
        }
        let position = position.ok_or_else(|| SiteError::ResumeNotFound(resume_title.to_string()))?;

        let recommendation = self
            .driver()
            .find_all(data_qa_prefix("resume-recommendations__button"))
            .await?
            .into_iter()
            .nth(position)
            .ok_or_else(|| SiteError::ElementNotFound("resume-recommendations__button".to_string()))?;
        self.droid.scroll_slow(&recommendation).await?;
        self.droid.follow_href(&recommendation).await?;

        log::debug!("Looking for the advanced search button");
        for _ in 0..10 {
            let Ok(button) = self
                .droid
                .wait_for_data_qa("advanced-search", Duration::from_secs(2))
                .await
            else {
                continue;
            };
            if button.is_clickable().await.unwrap_or(false) {
                self.droid.follow_href(&button).await?;
                break;
            }
        }

        self.droid
            .wait_for_data_qa("vacancysearch__keywords-input", WAIT_TIMEOUT)
            .await?;
        Ok(())
    }

    async fn apply_search_parameters(&self, params: &SearchParameters) -> Result<(), SiteError> {
        log::debug!("Filling in the advanced search form");

        if !params.keywords.is_empty() {
            let keywords = self
                .droid
                .find_by_data_qa("vacancysearch__keywords-input")
                .await?;
            self.droid
                .enter_text(&keywords, &params.keywords.join(", "))
                .await?;
            pause(1.0, 2.0).await;
            keywords.send_keys(Key::Tab + "").await?;
        }

        for control in params.selected_controls(&SEARCH_ONLY, &params.search_only) {
            self.click_control(control).await?;
        }

        if !params.words_to_exclude.is_empty() {
            let exclude = self
                .droid
                .find_by_data_qa("vacancysearch__keywords-excluded-input")
                .await?;
            self.droid.scroll_slow(&exclude).await?;
            self.droid
                .enter_text(&exclude, &params.words_to_exclude.join(", "))
                .await?;
        }

        if let Some(specialization) = params.specialization.as_deref().filter(|s| !s.is_empty()) {
            self.pick_from_tree("resumesearch__profroles-switcher", specialization)
                .await?;
        }
        if let Some(industry) = params.industry.as_deref().filter(|s| !s.is_empty()) {
            self.pick_from_tree("industry-addFromList", industry).await?;
        }

        self.enter_list("advanced-search-region-add", &params.regions, true)
            .await?;
        self.enter_list("searchform__district-input", &params.districts, false)
            .await?;
        self.enter_list("searchform__subway-input", &params.subway, false)
            .await?;

        if params.income > 0 {
            let income = self.droid.find_by_data_qa("advanced-search-salary").await?;
            self.droid
                .enter_text(&income, &params.income.to_string())
                .await?;
        }

        for (group, toggles) in params.toggle_groups() {
            if group.key == SEARCH_ONLY.key {
                continue;
            }
            for control in params.selected_controls(group, toggles) {
                if let Err(e) = self.click_control(control).await {
                    log::error!("Could not set '{}': {}", group.key, e);
                }
            }
        }

        Ok(())
    }

    async fn start_search(&self) -> Result<(), SiteError> {
        self.droid
            .click_by_data_qa("advanced-search-submit-button")
            .await?;
        log::debug!("Search started");
        Ok(())
    }

    async fn go_to_page(&self, page: u32) -> Result<bool, SiteError> {
        if page > 1 {
            let links = self
                .driver()
                .find_all(data_qa_prefix(&format!("number-pages-{}", page)))
                .await?;
            let Some(link) = links.first() else {
                return Ok(false);
            };
            self.droid.scroll_slow(link).await?;
            self.droid.follow_href(link).await?;
            log::debug!("Moved to page {}, pausing", page);
            pause(5.0, 10.0).await;
        }

        let window = self.driver().window().await?;
        *self.results_window.lock().unwrap_or_else(|e| e.into_inner()) = Some(window);
        Ok(true)
    }

    async fn vacancy_count(&self) -> Result<usize, SiteError> {
        Ok(self
            .driver()
            .find_all(data_qa_prefix("serp-item__title-text"))
            .await?
            .len())
    }

    async fn open_vacancy(&self, index: usize) -> Result<(), SiteError> {
        let title = self
            .driver()
            .find_all(data_qa_prefix("serp-item__title-text"))
            .await?
            .into_iter()
            .nth(index)
            .ok_or_else(|| SiteError::ElementNotFound(format!("vacancy #{}", index)))?;
        self.droid.scroll_slow(&title).await?;
        title.click().await?;
        pause(1.0, 2.0).await;

        let windows = self.driver().windows().await?;
        if let Some(tab) = windows.last() {
            self.driver().switch_to_window(tab.clone()).await?;
        }
        Ok(())
    }

    async fn scrape_vacancy(&self) -> Result<Vacancy, SiteError> {
        self.droid
            .wait_for_data_qa("vacancy-title", WAIT_TIMEOUT)
            .await?;
        let html = self.driver().source().await?;
        let link = self.driver().current_url().await?;

        let vacancy = Vacancy::from_page_source(&html, link.as_str())?;
        log::debug!("Scraped vacancy '{}'", vacancy.title);
        Ok(vacancy)
    }

    async fn close_vacancy(&self) -> Result<(), SiteError> {
        let results = self
            .results_window
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let Some(results) = results else {
            return Ok(());
        };
        if self.driver().window().await? != results {
            self.driver().close_window().await?;
        }
        pause(1.0, 2.0).await;
        self.driver().switch_to_window(results).await?;
        Ok(())
    }

    async fn has_response_button(&self) -> Result<bool, SiteError> {
        Ok(!self
            .droid
            .find_all_by_data_qa("vacancy-response-link-top")
            .await?
            .is_empty())
    }

    async fn start_application(&self, resume_title: &str) -> Result<ApplicationStart, SiteError> {
        let url_before = self.driver().current_url().await?;
        log::debug!("Pressing the respond button");
        self.droid
            .find_by_data_qa("vacancy-response-link-top")
            .await?
            .click()
            .await?;
        pause(1.0, 2.0).await;

        if !self
            .droid
            .find_all_by_data_qa("relocation-warning-confirm")
            .await?
            .is_empty()
        {
            return Ok(ApplicationStart::RelocationWarning);
        }

        if self.driver().current_url().await? == url_before {
            self.choose_resume_in_popup(resume_title, false).await?;
        }
        Ok(ApplicationStart::Opened)
    }

    async fn questions(&self) -> Result<Vec<Question>, SiteError> {
        if self
            .droid
            .wait_for_data_qa("task-body", WAIT_TIMEOUT)
            .await
            .is_err()
        {
            log::debug!("No questions found");
            return Ok(vec![]);
        }

        let mut questions = vec![];
        for element in self.question_elements().await? {
            let text = element.text().await?;

            let radios = element.find_all(By::ClassName("bloko-radio")).await?;
            let checkboxes = element.find_all(By::ClassName("bloko-checkbox")).await?;
            let textareas = element
                .find_all(By::XPath(
                    "./*[@class='bloko-form-item-baseline']/*[starts-with(@class, 'bloko-textarea')]",
                ))
                .await?;

            let kind = if !radios.is_empty() {
                QuestionKind::SingleChoice(texts(&radios).await?)
            } else if !checkboxes.is_empty() {
                QuestionKind::MultipleChoice(texts(&checkboxes).await?)
            } else if !textareas.is_empty() {
                QuestionKind::Text
            } else {
                QuestionKind::Unsupported
            };
            questions.push(Question { text, kind });
        }
        log::debug!("Found {} question(s)", questions.len());
        Ok(questions)
    }

    async fn answer_question(&self, index: usize, answer: &QuestionAnswer) -> Result<bool, SiteError> {
        let question = self
            .question_elements()
            .await?
            .into_iter()
            .nth(index)
            .ok_or_else(|| SiteError::ElementNotFound(format!("question #{}", index)))?;
        self.droid.scroll_slow(&question).await?;

        match answer {
            QuestionAnswer::Choose(option) => {
                for radio in question.find_all(By::ClassName("bloko-radio")).await? {
                    if radio.text().await? == *option {
                        radio.click().await?;
                        pause(1.0, 2.0).await;
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            QuestionAnswer::ChooseMany(options) => {
                let mut clicked = false;
                for checkbox in question.find_all(By::ClassName("bloko-checkbox")).await? {
                    if options.contains(&checkbox.text().await?) {
                        checkbox.click().await?;
                        clicked = true;
                        pause(1.0, 2.0).await;
                    }
                }
                Ok(clicked)
            }
            QuestionAnswer::Text(text) => {
                let mut fields = question.find_all(By::Tag("textarea")).await?;
                if fields.is_empty() {
                    fields = question
                        .find_all(By::XPath(".//*[starts-with(@class, 'bloko-textarea')]"))
                        .await?;
                }
                let Some(field) = fields.first() else {
                    return Ok(false);
                };
                tokio::time::sleep(Duration::from_secs(1)).await;
                self.droid.enter_text(field, text).await?;
                Ok(true)
            }
        }
    }

    async fn finish_questions(&self, resume_title: &str) -> Result<(), SiteError> {
        if self
            .exists(By::ClassName(RESUME_LIST_CLASS))
            .await?
        {
            pause(1.0, 2.0).await;
            self.choose_resume_in_popup(resume_title, true).await?;
        }
        Ok(())
    }

    async fn send_cover_letter(&self, letter: &str) -> Result<(), SiteError> {
        const LETTER_INPUT: &str = "vacancy-response-popup-form-letter-input";
        const POPUP_SUBMIT: &str = "vacancy-response-submit-popup";

        if let Ok(field) = self.droid.find_by_data_qa(LETTER_INPUT).await {
            log::debug!("Found the cover letter form");
            return self.submit_letter(&field, letter, POPUP_SUBMIT).await;
        }

        let Ok(toggle) = self.droid.find_by_data_qa("vacancy-response-letter-toggle").await else {
            return self.send_letter_to_chat(letter).await;
        };
        log::debug!("Opening the cover letter form");
        toggle.click().await?;
        pause(1.0, 2.0).await;

        if let Ok(field) = self.droid.find_by_data_qa(LETTER_INPUT).await {
            return self.submit_letter(&field, letter, POPUP_SUBMIT).await;
        }

        let informer = self
            .droid
            .find_by_data_qa("vacancy-response-letter-informer")
            .await?;
        let field = informer.find(By::Tag("textarea")).await?;
        self.submit_letter(&field, letter, "vacancy-response-letter-submit")
            .await
    }

    async fn render_pdf(&self, html: &str) -> Result<Vec<u8>, SiteError> {
        let printer = Droid::printer(&self.browser).await?;
        let printed = printer.print_to_pdf(html).await;
        if let Err(e) = printer.quit().await {
            log::warn!("Failed to close the print session: {}", e);
        }
        printed
    }
}

async fn texts(elements: &[WebElement]) -> Result<Vec<String>, SiteError> {
    let mut texts = Vec::with_capacity(elements.len());
    for element in elements {
        texts.push(element.text().await?);
    }
    Ok(texts)
}
