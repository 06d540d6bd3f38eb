use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use crate::domain::{
    outcome::{ApplyOutcome, JobRecord},
    text::sanitize_text,
};

use super::json_file::{read_json, write_json, PersistError};

pub const SUCCESS_FILE: &str = "success.json";
pub const SKIPPED_FILE: &str = "skipped.json";
pub const FAILED_FILE: &str = "failed.json";

/// company -> jobs recorded for it
pub type CompanyJobs = BTreeMap<String, Vec<JobRecord>>;
/// login -> search job title -> company -> jobs
pub type LedgerData = BTreeMap<String, BTreeMap<String, CompanyJobs>>;

/// One outcome ledger file, scoped to the current login and search title.
pub struct Ledger {
    path: PathBuf,
    login: String,
    job_title: String,
    data: LedgerData,
}

impl Ledger {
    pub fn load(path: PathBuf, login: &str, job_title: &str) -> Result<Self, PersistError> {
        let mut data: LedgerData = read_json(&path)?;
        data.entry(login.to_string())
            .or_default()
            .entry(job_title.to_string())
            .or_default();

        Ok(Ledger {
            path,
            login: login.to_string(),
            job_title: job_title.to_string(),
            data,
        })
    }

    pub fn companies(&self) -> Option<&CompanyJobs> {
        self.data
            .get(&self.login)
            .and_then(|titles| titles.get(&self.job_title))
    }

    pub fn record(&mut self, company: &str, record: JobRecord) -> Result<(), PersistError> {
        self.data
            .entry(self.login.clone())
            .or_default()
            .entry(self.job_title.clone())
            .or_default()
            .entry(company.to_string())
            .or_default()
            .push(record);

        write_json(&self.path, &self.data)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The applied, skipped and failed ledgers of one run.
pub struct Ledgers {
    pub applied: Ledger,
    pub skipped: Ledger,
    pub failed: Ledger,
}

impl Ledgers {
    pub fn open(output_dir: &Path, login: &str, job_title: &str) -> Result<Self, PersistError> {
        Ok(Ledgers {
            applied: Ledger::load(output_dir.join(SUCCESS_FILE), login, job_title)?,
            skipped: Ledger::load(output_dir.join(SKIPPED_FILE), login, job_title)?,
            failed: Ledger::load(output_dir.join(FAILED_FILE), login, job_title)?,
        })
    }

    /// Files the vacancy under the ledger matching its outcome.
    pub fn record(
        &mut self,
        company: &str,
        job_title: &str,
        link: &str,
        outcome: &ApplyOutcome,
    ) -> Result<(), PersistError> {
        let ledger = match outcome {
            ApplyOutcome::Success => &mut self.applied,
            ApplyOutcome::Skip(_) => &mut self.skipped,
            ApplyOutcome::Error(_) => &mut self.failed,
        };
        log::debug!(
            "Recording '{}' at '{}' in {}",
            job_title,
            company,
            ledger.path().display()
        );

        ledger.record(
            company,
            JobRecord {
                job_title: job_title.to_string(),
                link: link.to_string(),
                reason: outcome.reason().to_string(),
            },
        )
    }

    /// Skip reason when the company (or the exact job there) was already applied to.
    pub fn already_applied(
        &self,
        company: &str,
        job_title: &str,
        apply_once_at_company: bool,
    ) -> Option<String> {
        let company = sanitize_text(company);
        let job_title = sanitize_text(job_title);

        let companies = self.applied.companies()?;
        for (recorded_company, jobs) in companies {
            if sanitize_text(recorded_company) != company {
                continue;
            }
            if apply_once_at_company {
                return Some("Already applied at this company".to_string());
            }
            if jobs
                .iter()
                .any(|job| sanitize_text(&job.job_title) == job_title)
            {
                return Some("Already applied to this vacancy".to_string());
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::{Ledgers, FAILED_FILE, SKIPPED_FILE, SUCCESS_FILE};
    use crate::domain::outcome::ApplyOutcome;

    const LOGIN: &str = "user@example.com";
    const TITLE: &str = "Rust developer";

    #[test]
    fn already_applied_matches_sanitized_company_and_title() {
        let dir = TempDir::new().unwrap();
        let mut ledgers = Ledgers::open(dir.path(), LOGIN, TITLE).unwrap();
        ledgers
            .record("Company A", "Job 1", "https://hh.ru/vacancy/1", &ApplyOutcome::Success)
            .unwrap();
        ledgers
            .record("Company A", "Job 2", "", &ApplyOutcome::Success)
            .unwrap();

        assert!(ledgers.already_applied("company a", "job 1", false).is_some());
        assert!(ledgers.already_applied(" \"COMPANY A\",", "Job 2\n", false).is_some());
        assert!(ledgers.already_applied("company a", "job 3", false).is_none());
        assert!(ledgers.already_applied("company b", "job 1", false).is_none());
    }

    #[test]
    fn apply_once_at_company_skips_any_title() {
        let dir = TempDir::new().unwrap();
        let mut ledgers = Ledgers::open(dir.path(), LOGIN, TITLE).unwrap();
        ledgers
            .record("Company A", "Job 1", "", &ApplyOutcome::Success)
            .unwrap();

        assert_eq!(
            ledgers.already_applied("company a", "another job", true),
            Some("Already applied at this company".to_string())
        );
    }

    #[test]
    fn skipped_and_failed_do_not_block_reapplying() {
        let dir = TempDir::new().unwrap();
        let mut ledgers = Ledgers::open(dir.path(), LOGIN, TITLE).unwrap();
        ledgers
            .record("Acme", "Job", "", &ApplyOutcome::Skip("not interesting".into()))
            .unwrap();
        ledgers
            .record("Acme", "Job", "", &ApplyOutcome::Error("timeout".into()))
            .unwrap();

        assert!(ledgers.already_applied("acme", "job", true).is_none());
        assert!(dir.path().join(SKIPPED_FILE).exists());
        assert!(dir.path().join(FAILED_FILE).exists());
        assert!(!dir.path().join(SUCCESS_FILE).exists());
    }

    #[test]
    fn records_survive_a_restart() {
        let dir = TempDir::new().unwrap();
        {
            let mut ledgers = Ledgers::open(dir.path(), LOGIN, TITLE).unwrap();
            ledgers
                .record("Acme", "Job", "https://hh.ru/vacancy/7", &ApplyOutcome::Success)
                .unwrap();
        }

        let ledgers = Ledgers::open(dir.path(), LOGIN, TITLE).unwrap();
        assert!(ledgers.already_applied("ACME", "job", false).is_some());

        let other_search = Ledgers::open(dir.path(), LOGIN, "Go developer").unwrap();
        assert!(other_search.already_applied("acme", "job", false).is_none());
    }

    #[test]
    fn ledger_file_layout() {
        let dir = TempDir::new().unwrap();
        let mut ledgers = Ledgers::open(dir.path(), LOGIN, TITLE).unwrap();
        ledgers
            .record("Acme", "Job", "link", &ApplyOutcome::Skip("blacklisted".into()))
            .unwrap();

        let content = std::fs::read_to_string(dir.path().join(SKIPPED_FILE)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                LOGIN: {
                    TITLE: {
                        "Acme": [{"job_title": "Job", "link": "link", "reason": "blacklisted"}]
                    }
                }
            })
        );
    }
}
