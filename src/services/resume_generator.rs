use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use thiserror::Error;
use tokio::task::JoinSet;

use crate::domain::resume::{render, Resume};

use super::{prompts, ChatModel, LlmError};

pub const MAX_PDF_SIZE: usize = 2 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ResumeError {
    #[error("failed to summarize the job description: {0}")]
    Summary(#[from] LlmError),

    #[error("resume PDF is {0} bytes, the limit is 2 MB")]
    TooLarge(usize),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Sections of the tailored resume, in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResumePart {
    Header,
    Education,
    WorkExperience,
    SideProjects,
    Achievements,
    Certifications,
    AdditionalSkills,
}

impl ResumePart {
    pub const ALL: [ResumePart; 7] = [
        ResumePart::Header,
        ResumePart::Education,
        ResumePart::WorkExperience,
        ResumePart::SideProjects,
        ResumePart::Achievements,
        ResumePart::Certifications,
        ResumePart::AdditionalSkills,
    ];

    /// Whether the resume has anything to put into this part.
    pub fn applies_to(&self, resume: &Resume) -> bool {
        match self {
            ResumePart::Header => true,
            ResumePart::Education => !resume.education_details.is_empty(),
            ResumePart::WorkExperience => !resume.experience_details.is_empty(),
            ResumePart::SideProjects => !resume.projects.is_empty(),
            ResumePart::Achievements => !resume.achievements.is_empty(),
            ResumePart::Certifications => !resume.certifications.is_empty(),
            ResumePart::AdditionalSkills => {
                !resume.experience_details.is_empty()
                    || !resume.education_details.is_empty()
                    || !resume.languages.is_empty()
                    || !resume.interests.is_empty()
            }
        }
    }

    fn prompt(&self, resume: &Resume, job_description: &str) -> String {
        let list = |items: &[serde_json::Value]| render(&serde_json::Value::from(items.to_vec()));
        let sex = resume.sex();

        match self {
            ResumePart::Header => prompts::resume_header(
                &render(&serde_json::to_value(&resume.personal_information).unwrap_or_default()),
                sex,
            ),
            ResumePart::Education => {
                prompts::resume_education(&list(&resume.education_details), job_description, sex)
            }
            ResumePart::WorkExperience => {
                prompts::resume_work_experience(&list(&resume.experience_details), job_description, sex)
            }
            ResumePart::SideProjects => {
                prompts::resume_side_projects(&list(&resume.projects), job_description, sex)
            }
            ResumePart::Achievements => {
                prompts::resume_achievements(&list(&resume.achievements), job_description, sex)
            }
            ResumePart::Certifications => {
                prompts::resume_certifications(&list(&resume.certifications), job_description, sex)
            }
            ResumePart::AdditionalSkills => prompts::resume_additional_skills(
                &list(&resume.languages),
                &list(&resume.interests),
                &resume.skills.join(", "),
                job_description,
                sex,
            ),
        }
    }
}

pub struct ResumeGenerator {
    chat: Arc<ChatModel>,
    resume: Arc<Resume>,
    style_path: Option<PathBuf>,
}

impl ResumeGenerator {
    pub fn new(chat: Arc<ChatModel>, resume: Arc<Resume>, style_path: Option<PathBuf>) -> Self {
        ResumeGenerator {
            chat,
            resume,
            style_path,
        }
    }

    /// Full HTML document of a resume tailored to `job_description`.
    pub async fn generate_html(&self, job_description: &str) -> Result<String, ResumeError> {
        log::debug!("Summarizing the job description");
        let summary = self
            .chat
            .invoke(&prompts::summarize_job_description(job_description))
            .await?;

        let parts = self.generate_parts(&summary).await;
        Ok(wrap_html(&assemble(&parts), self.style_path.as_deref()))
    }

    /// Generates every applicable part concurrently. Failed parts are left out.
    pub async fn generate_parts(&self, job_description: &str) -> HashMap<ResumePart, String> {
        let mut tasks = JoinSet::new();
        for part in ResumePart::ALL {
            if !part.applies_to(&self.resume) {
                log::debug!("Resume has no data for {:?}", part);
                continue;
            }
            let chat = self.chat.clone();
            let prompt = part.prompt(&self.resume, job_description);
            tasks.spawn(async move { (part, chat.invoke(&prompt).await) });
        }

        let mut parts = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((part, Ok(html))) => {
                    log::debug!("Resume part {:?} generated", part);
                    parts.insert(part, strip_code_fence(&html));
                }
                Ok((part, Err(e))) => log::error!("Resume part {:?} failed: {}", part, e),
                Err(e) => log::error!("Resume part task panicked: {}", e),
            }
        }
        parts
    }
}

fn strip_code_fence(html: &str) -> String {
    let trimmed = html.trim();
    trimmed
        .strip_prefix("```html")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

/// Lays the generated parts out in document order.
pub fn assemble(parts: &HashMap<ResumePart, String>) -> String {
    let part = |p: ResumePart| parts.get(&p).map(String::as_str).unwrap_or("");

    let mut body = String::from("<body>\n");
    body.push_str(&format!("  {}\n", part(ResumePart::Header)));
    body.push_str("  <main>\n");
    for p in &ResumePart::ALL[1..] {
        body.push_str(&format!("    {}\n", part(*p)));
    }
    body.push_str("  </main>\n");
    body.push_str("</body>");
    body
}

pub fn wrap_html(body: &str, style_path: Option<&Path>) -> String {
    let style = style_path
        .map(|path| {
            format!(
                "\n    <link rel=\"stylesheet\" href=\"{}\">",
                url::Url::from_file_path(path)
                    .map(|url| url.to_string())
                    .unwrap_or_else(|_| path.display().to_string())
            )
        })
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Resume</title>
    <link href="https://fonts.googleapis.com/css2?family=Barlow:wght@400;600&display=swap" rel="stylesheet" />
    <link rel="stylesheet" href="https://cdnjs.cloudflare.com/ajax/libs/font-awesome/5.15.3/css/all.min.css" />{style}
  </head>
{body}
</html>"#
    )
}

/// Writes the PDF as `CV_<unix timestamp>.pdf` under `dir`, refusing files over 2 MB.
pub fn save_pdf(dir: &Path, pdf: &[u8]) -> Result<PathBuf, ResumeError> {
    if pdf.len() > MAX_PDF_SIZE {
        log::error!("Resume PDF exceeds 2 MB: {} bytes", pdf.len());
        return Err(ResumeError::TooLarge(pdf.len()));
    }

    fs::create_dir_all(dir).map_err(|source| ResumeError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut timestamp = chrono::Utc::now().timestamp();
    loop {
        let path = dir.join(format!("CV_{}.pdf", timestamp));
        match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(pdf)
                    .map_err(|source| ResumeError::Io { path: path.clone(), source })?;
                log::info!("Resume saved to {}", path.display());
                return Ok(path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => timestamp += 1,
            Err(source) => return Err(ResumeError::Io { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Arc};

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::{assemble, save_pdf, strip_code_fence, ResumeError, ResumeGenerator, ResumePart, MAX_PDF_SIZE};
    use crate::{
        domain::resume::tests::resume,
        services::{
            chat_model::tests::{chat_model, ScriptedBackend},
            LlmError,
        },
    };

    #[test]
    fn parts_follow_resume_content() {
        let resume = resume();

        assert!(ResumePart::Header.applies_to(&resume));
        assert!(ResumePart::Education.applies_to(&resume));
        assert!(!ResumePart::SideProjects.applies_to(&resume));
        assert!(!ResumePart::Achievements.applies_to(&resume));
        assert!(ResumePart::AdditionalSkills.applies_to(&resume));
    }

    #[test]
    fn assemble_keeps_document_order() {
        let parts = HashMap::from([
            (ResumePart::AdditionalSkills, "<section>skills</section>".to_string()),
            (ResumePart::Header, "<header>Ivan</header>".to_string()),
            (ResumePart::Education, "<section>edu</section>".to_string()),
        ]);

        let body = assemble(&parts);

        let header = body.find("Ivan").unwrap();
        let education = body.find("edu").unwrap();
        let skills = body.find("skills").unwrap();
        assert!(header < body.find("<main>").unwrap());
        assert!(education < skills);
        assert!(body.starts_with("<body>\n  <header>"));
        assert!(body.ends_with("  </main>\n</body>"));
    }

    #[test]
    fn code_fences_are_removed() {
        assert_eq!(strip_code_fence("```html\n<p>x</p>\n```"), "<p>x</p>");
        assert_eq!(strip_code_fence(" <p>x</p> "), "<p>x</p>");
    }

    #[tokio::test]
    async fn failed_parts_are_left_empty() {
        let backend = ScriptedBackend::new(|prompt| {
            if prompt.contains("Education") {
                Err(LlmError::EmptyContent)
            } else {
                Ok("<section>ok</section>".to_string())
            }
        });
        let generator = ResumeGenerator::new(Arc::new(chat_model(backend)), Arc::new(resume()), None);

        let parts = generator.generate_parts("Rust backend").await;

        assert!(!parts.contains_key(&ResumePart::Education));
        assert!(!parts.contains_key(&ResumePart::SideProjects));
        assert!(parts.contains_key(&ResumePart::Header));
        assert!(parts.contains_key(&ResumePart::WorkExperience));
    }

    #[tokio::test]
    async fn html_document_links_the_stylesheet() {
        let backend = ScriptedBackend::new(|_| Ok("<section>ok</section>".to_string()));
        let generator = ResumeGenerator::new(
            Arc::new(chat_model(backend)),
            Arc::new(resume()),
            Some("/styles/cloyola.css".into()),
        );

        let html = generator.generate_html("Rust backend").await.unwrap();

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("href=\"file:///styles/cloyola.css\""));
        assert!(html.contains("<main>"));
    }

    #[test]
    fn pdf_is_saved_with_unique_name() {
        let dir = TempDir::new().unwrap();

        let first = save_pdf(dir.path(), b"%PDF-1").unwrap();
        let second = save_pdf(dir.path(), b"%PDF-2").unwrap();

        assert_ne!(first, second);
        assert!(first.file_name().unwrap().to_string_lossy().starts_with("CV_"));
        assert_eq!(std::fs::read(second).unwrap(), b"%PDF-2");
    }

    #[test]
    fn oversized_pdf_is_rejected() {
        let dir = TempDir::new().unwrap();
        let pdf = vec![0u8; MAX_PDF_SIZE + 1];

        assert!(matches!(save_pdf(dir.path(), &pdf), Err(ResumeError::TooLarge(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
