use std::{io::Write, time::Duration};

use base64::Engine;
use serde_json::json;
use thirtyfour::{extensions::cdp::ChromeDevTools, prelude::*, ChromiumLikeCapabilities};

use crate::configuration::BrowserSettings;

use super::{pause::pause, SiteError};

const SCROLL_STEP_SLEEP: Duration = Duration::from_millis(10);

const SCROLL_DURATION_SECS: f64 = 1.5;
const SCROLL_TOLERANCE: f64 = 30.0;

/// Intermediate scroll offsets from `current` to `target`, spread over about 1.5 s.
/// Moves in one direction only and never past `target`.
pub fn scroll_positions(current: f64, target: f64, step_sleep: Duration) -> Vec<f64> {
    let steps = (SCROLL_DURATION_SECS / step_sleep.as_secs_f64()).floor() + 1.0;
    let step = ((current - target).abs() / steps).floor() + 1.0;

    let mut positions = Vec::new();
    let mut position = current;
    while position < target - SCROLL_TOLERANCE {
        position = (position + step).min(target);
        positions.push(position);
    }
    while position > target + SCROLL_TOLERANCE {
        position = (position - step).max(target);
        positions.push(position);
    }
    positions
}

/// What a browser session is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// The logged-in session that walks hh.ru. Images and stylesheets are blocked.
    Search,
    /// A throwaway headless session for printing resumes, with styles intact.
    Print,
}

impl SessionKind {
    fn content_prefs(self) -> Option<serde_json::Value> {
        match self {
            SessionKind::Search => Some(json!({
                "profile.default_content_setting_values.images": 2,
                "profile.managed_default_content_settings.stylesheets": 2,
            })),
            SessionKind::Print => None,
        }
    }

    fn uses_profile(self) -> bool {
        self == SessionKind::Search
    }

    fn headless(self, settings: &BrowserSettings) -> bool {
        self == SessionKind::Print || settings.headless
    }
}

/// One Chrome session driven over WebDriver.
pub struct Droid {
    pub driver: WebDriver,
}

impl Droid {
    pub async fn new(settings: &BrowserSettings) -> Result<Self, SiteError> {
        Droid::start(settings, SessionKind::Search).await
    }

    /// Headless session with stylesheets enabled, for `print_to_pdf`.
    pub async fn printer(settings: &BrowserSettings) -> Result<Self, SiteError> {
        Droid::start(settings, SessionKind::Print).await
    }

    async fn start(settings: &BrowserSettings, kind: SessionKind) -> Result<Self, SiteError> {
        let mut caps = DesiredCapabilities::chrome();
        for arg in [
            "--no-sandbox",
            "--disable-dev-shm-usage",
            "--ignore-certificate-errors",
            "--disable-extensions",
            "--disable-gpu",
            "--window-size=1200,800",
            "--disable-translate",
            "--disable-popup-blocking",
            "--no-first-run",
            "--no-default-browser-check",
            "--disable-autofill",
            "--disable-animations",
        ] {
            caps.add_arg(arg)?;
        }
        caps.add_experimental_option("excludeSwitches", vec!["enable-automation", "enable-logging"])?;
        if let Some(prefs) = kind.content_prefs() {
            caps.add_experimental_option("prefs", prefs)?;
        }

        let profile = &settings.profile_dir;
        if kind.uses_profile() {
            std::fs::create_dir_all(profile)?;
            if let (Some(parent), Some(name)) = (profile.parent(), profile.file_name()) {
                caps.add_arg(&format!("--user-data-dir={}", parent.display()))?;
                caps.add_arg(&format!("--profile-directory={}", name.to_string_lossy()))?;
                log::debug!("Using Chrome profile {}", profile.display());
            }
        }
        if kind.headless(settings) {
            caps.set_headless()?;
        }

        let driver = WebDriver::new(&settings.webdriver_url, caps).await?;
        log::info!("{:?} browser session started at {}", kind, settings.webdriver_url);

        Ok(Droid { driver })
    }

    pub async fn quit(self) -> Result<(), SiteError> {
        self.driver.quit().await?;
        Ok(())
    }

    /// Scrolls to `element` in small steps over about 1.5 s.
    pub async fn scroll_slow(&self, element: &WebElement) -> Result<(), SiteError> {
        let current = self
            .driver
            .execute("return window.pageYOffset;", vec![])
            .await?
            .json()
            .as_f64()
            .unwrap_or(0.0);
        let target = element.rect().await?.y;

        for position in scroll_positions(current, target, SCROLL_STEP_SLEEP) {
            self.driver
                .execute(&format!("window.scrollTo(0, {});", position), vec![])
                .await?;
            tokio::time::sleep(SCROLL_STEP_SLEEP).await;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(())
    }

    pub async fn find_all_by_data_qa(&self, data_qa: &str) -> Result<Vec<WebElement>, SiteError> {
        Ok(self
            .driver
            .find_all(By::XPath(format!("//*[@data-qa='{}']", data_qa)))
            .await?)
    }

    pub async fn find_by_data_qa(&self, data_qa: &str) -> Result<WebElement, SiteError> {
        self.find_all_by_data_qa(data_qa)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SiteError::ElementNotFound(data_qa.to_string()))
    }

    /// Waits up to `timeout` for an element with `data_qa` to appear.
    pub async fn wait_for_data_qa(&self, data_qa: &str, timeout: Duration) -> Result<WebElement, SiteError> {
        self.driver
            .query(By::XPath(format!("//*[@data-qa='{}']", data_qa)))
            .wait(timeout, Duration::from_secs(1))
            .first()
            .await
            .map_err(|_| SiteError::ElementNotFound(data_qa.to_string()))
    }

    pub async fn click_by_data_qa(&self, data_qa: &str) -> Result<(), SiteError> {
        let element = self.find_by_data_qa(data_qa).await?;
        self.scroll_slow(&element).await?;
        element.click().await?;
        Ok(())
    }

    pub async fn click_by_text(&self, text: &str) -> Result<(), SiteError> {
        let element = self
            .driver
            .find(By::XPath(format!("//*[text()=\"{}\"]", text)))
            .await
            .map_err(|_| SiteError::ElementNotFound(text.to_string()))?;
        self.scroll_slow(&element).await?;
        element.click().await?;
        Ok(())
    }

    /// Opens the link behind `element` in the current tab.
    pub async fn follow_href(&self, element: &WebElement) -> Result<(), SiteError> {
        let href = element
            .attr("href")
            .await?
            .ok_or_else(|| SiteError::ElementNotFound("href".to_string()))?;
        self.driver.goto(&href).await?;
        Ok(())
    }

    pub async fn enter_text(&self, element: &WebElement, text: &str) -> Result<(), SiteError> {
        log::debug!("Entering text: {}", text);
        element.clear().await?;
        element.send_keys(text).await?;
        Ok(())
    }

    /// Enters each value and confirms it with Tab, as the autocomplete inputs expect.
    pub async fn enter_each(&self, element: &WebElement, values: &[String]) -> Result<(), SiteError> {
        for value in values {
            self.enter_text(element, value).await?;
            pause(1.0, 2.0).await;
            element.send_keys(Key::Tab + "").await?;
            pause(1.0, 2.0).await;
        }
        Ok(())
    }

    /// Renders `html` in a scratch tab and prints it to PDF through the DevTools protocol.
    pub async fn print_to_pdf(&self, html: &str) -> Result<Vec<u8>, SiteError> {
        let mut file = tempfile::Builder::new().suffix(".html").tempfile()?;
        file.write_all(html.as_bytes())?;
        file.flush()?;
        let url = url::Url::from_file_path(file.path())
            .map_err(|_| SiteError::Pdf(format!("bad path {}", file.path().display())))?;

        let original = self.driver.window().await?;
        let scratch = self.driver.new_tab().await?;
        self.driver.switch_to_window(scratch).await?;

        let printed = self.print_current(url.as_str()).await;

        self.driver.close_window().await?;
        self.driver.switch_to_window(original).await?;
        printed
    }

    async fn print_current(&self, url: &str) -> Result<Vec<u8>, SiteError> {
        self.driver.goto(url).await?;
        let devtools = ChromeDevTools::new(self.driver.handle.clone());
        let reply = devtools
            .execute_cdp_with_params(
                "Page.printToPDF",
                json!({
                    "printBackground": true,
                    "landscape": false,
                    "paperWidth": 8.27,
                    "paperHeight": 11.69,
                    "marginTop": 0.8,
                    "marginBottom": 0.8,
                    "marginLeft": 0.5,
                    "marginRight": 0.5,
                    "displayHeaderFooter": false,
                    "preferCSSPageSize": true,
                    "generateDocumentOutline": false,
                    "generateTaggedPDF": false,
                    "transferMode": "ReturnAsBase64",
                }),
            )
            .await?;

        let data = reply["data"]
            .as_str()
            .ok_or_else(|| SiteError::Pdf("no data in printToPDF reply".to_string()))?;
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| SiteError::Pdf(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{scroll_positions, SessionKind};
    use crate::configuration::BrowserSettings;

    const SLEEP: Duration = Duration::from_millis(10);

    #[test]
    fn long_scroll_down_stops_at_target() {
        let positions = scroll_positions(0.0, 12045.0, SLEEP);

        assert!(positions.len() <= 151);
        assert!(positions.windows(2).all(|w| w[1] > w[0]));
        let last = *positions.last().unwrap();
        assert!(last <= 12045.0 && 12045.0 - last <= 30.0, "{}", last);
    }

    #[test]
    fn long_scroll_up_stops_at_target() {
        let positions = scroll_positions(20000.0, 3000.0, SLEEP);

        assert!(positions.len() <= 151);
        assert!(positions.windows(2).all(|w| w[1] < w[0]));
        let last = *positions.last().unwrap();
        assert!(last >= 3000.0 && last - 3000.0 <= 30.0, "{}", last);
    }

    #[test]
    fn nearby_target_needs_no_scroll() {
        assert!(scroll_positions(100.0, 120.0, SLEEP).is_empty());
        assert!(scroll_positions(120.0, 100.0, SLEEP).is_empty());
    }

    #[test]
    fn print_session_keeps_styles_and_runs_headless() {
        let visible = BrowserSettings::default();

        assert!(SessionKind::Print.content_prefs().is_none());
        assert!(!SessionKind::Print.uses_profile());
        assert!(SessionKind::Print.headless(&visible));

        let prefs = SessionKind::Search.content_prefs().unwrap();
        assert_eq!(prefs["profile.managed_default_content_settings.stylesheets"], 2);
        assert!(SessionKind::Search.uses_profile());
        assert!(!SessionKind::Search.headless(&visible));
    }
}
