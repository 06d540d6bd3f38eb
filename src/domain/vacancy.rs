use itertools::Itertools;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Vacancy {
    pub title: String,
    pub salary: Option<String>,
    pub experience: Option<String>,
    pub job_type: Option<String>,
    pub company_name: String,
    pub company_address: Option<String>,
    pub description: Option<String>,
    pub skills: Vec<String>,
    pub link: String,
}

#[derive(Debug, PartialEq, Error)]
pub enum VacancyParseError {
    #[error("vacancy page has no '{0}' element")]
    MissingField(&'static str),
}

impl Vacancy {
    /// Extracts a vacancy from the rendered page source of a vacancy page.
    pub fn from_page_source(html: &str, link: &str) -> Result<Self, VacancyParseError> {
        let document = Html::parse_document(html);

        let title = first_text(&document, &["vacancy-title"])
            .ok_or(VacancyParseError::MissingField("vacancy-title"))?;
        let company_name = first_text(&document, &["vacancy-company-name"])
            .ok_or(VacancyParseError::MissingField("vacancy-company-name"))?;

        Ok(Vacancy {
            title,
            salary: first_text(&document, &["vacancy-salary-compensation-type-net"]),
            experience: first_text(&document, &["vacancy-experience"]),
            job_type: first_text(&document, &["vacancy-view-employment-mode"]),
            company_name,
            company_address: first_text(
                &document,
                &["vacancy-view-raw-address", "vacancy-view-location"],
            ),
            description: first_text(&document, &["vacancy-branded", "vacancy-description"]),
            skills: all_texts(&document, "skills-element"),
            link: link.to_string(),
        })
    }

    /// Plain text rendering handed to the LLM.
    pub fn to_prompt_text(&self) -> String {
        let mut lines = vec![format!("Title: {}", self.title)];
        lines.push(format!("Company: {}", self.company_name));

        let optional = [
            ("Salary", &self.salary),
            ("Experience", &self.experience),
            ("Employment", &self.job_type),
            ("Address", &self.company_address),
        ];
        for (label, value) in optional {
            if let Some(value) = value {
                lines.push(format!("{}: {}", label, value));
            }
        }
        if !self.skills.is_empty() {
            lines.push(format!("Skills: {}", self.skills.join(", ")));
        }
        if let Some(description) = &self.description {
            lines.push(format!("Description:\n{}", description));
        }

        lines.join("\n")
    }
}

fn data_qa_selector(data_qa: &str) -> Option<Selector> {
    Selector::parse(&format!("[data-qa='{}']", data_qa)).ok()
}

fn element_text(element: ElementRef) -> String {
    element
        .text()
        .flat_map(|fragment| fragment.split_whitespace())
        .join(" ")
}

/// Text of the first non-empty element matching any of `data_qas`, tried in order.
fn first_text(document: &Html, data_qas: &[&str]) -> Option<String> {
    data_qas.iter().find_map(|data_qa| {
        let selector = data_qa_selector(data_qa)?;
        document
            .select(&selector)
            .map(element_text)
            .find(|text| !text.is_empty())
    })
}

fn all_texts(document: &Html, data_qa: &str) -> Vec<String> {
    let Some(selector) = data_qa_selector(data_qa) else {
        return vec![];
    };
    document
        .select(&selector)
        .map(element_text)
        .filter(|text| !text.is_empty())
        .collect()
}
