use std::{sync::Arc, time::Duration};

use super::{JobSite, SiteError};

const LOGIN_POLL_INTERVAL: Duration = Duration::from_secs(20);

pub struct Authenticator<S: JobSite> {
    site: Arc<S>,
    poll_interval: Duration,
}

impl<S: JobSite> Authenticator<S> {
    pub fn new(site: Arc<S>) -> Self {
        Authenticator {
            site,
            poll_interval: LOGIN_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Logs in unless the browser profile already holds a session.
    /// The user types the one-time code in the browser; this only waits for it.
    pub async fn login(&self, login: &str) -> Result<(), SiteError> {
        log::info!("Starting login");
        if self.site.is_logged_in().await? {
            log::info!("Already logged in, skipping login");
            return Ok(());
        }

        log::debug!("Submitting login {}", login);
        self.site.submit_login(login).await?;

        log::info!("Finish the login in the browser, waiting for it");
        while !self.site.login_completed().await? {
            log::debug!("Login not finished yet, checking again in {:?}", self.poll_interval);
            tokio::time::sleep(self.poll_interval).await;
        }

        log::info!("Login successful");
        Ok(())
    }
}
