use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PersonalInformation {
    pub name: String,
    pub surname: String,
    pub sex: String,
    #[serde(default)]
    pub phone: Option<Value>,
    #[serde(default)]
    pub email: Option<Value>,
    #[serde(default)]
    pub telegram: Option<Value>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl PersonalInformation {
    pub fn has_contact(&self) -> bool {
        [&self.phone, &self.email, &self.telegram]
            .into_iter()
            .any(|value| contact_text(value).is_some())
    }
}

fn contact_text(value: &Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// The user's resume as loaded from `structured_resume.yaml`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Resume {
    pub personal_information: PersonalInformation,
    pub legal_authorization: Map<String, Value>,
    pub work_preferences: Map<String, Value>,
    pub education_details: Vec<Value>,
    pub experience_details: Vec<Value>,
    pub projects: Vec<Value>,
    pub availability: Map<String, Value>,
    pub salary_expectations: Map<String, Value>,
    pub certifications: Vec<Value>,
    pub languages: Vec<Value>,
    pub interests: Vec<Value>,
    pub achievements: Vec<Value>,
    pub previous_job_details: Map<String, Value>,
    pub general_knowledge_questions: String,
    pub skills: Vec<String>,
}

/// Resume topics a free-text application question can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResumeSection {
    PersonalInformation,
    LegalAuthorization,
    WorkPreferences,
    EducationDetails,
    ExperienceDetails,
    Projects,
    Availability,
    SalaryExpectations,
    Certifications,
    Languages,
    Interests,
    PreviousJobDetails,
    GeneralKnowledgeQuestions,
}

impl ResumeSection {
    pub const ALL: [ResumeSection; 13] = [
        ResumeSection::PersonalInformation,
        ResumeSection::LegalAuthorization,
        ResumeSection::WorkPreferences,
        ResumeSection::EducationDetails,
        ResumeSection::ExperienceDetails,
        ResumeSection::Projects,
        ResumeSection::Availability,
        ResumeSection::SalaryExpectations,
        ResumeSection::Certifications,
        ResumeSection::Languages,
        ResumeSection::Interests,
        ResumeSection::PreviousJobDetails,
        ResumeSection::GeneralKnowledgeQuestions,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ResumeSection::PersonalInformation => "Personal information",
            ResumeSection::LegalAuthorization => "Legal Authorization",
            ResumeSection::WorkPreferences => "Work Preferences",
            ResumeSection::EducationDetails => "Education Details",
            ResumeSection::ExperienceDetails => "Experience Details",
            ResumeSection::Projects => "Projects",
            ResumeSection::Availability => "Availability",
            ResumeSection::SalaryExpectations => "Salary Expectations",
            ResumeSection::Certifications => "Certifications",
            ResumeSection::Languages => "Languages",
            ResumeSection::Interests => "Interests",
            ResumeSection::PreviousJobDetails => "Previous Job Details",
            ResumeSection::GeneralKnowledgeQuestions => "General Knowledge Questions",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|section| section.label().eq_ignore_ascii_case(label.trim()))
    }
}

impl Resume {
    pub fn validate(&self) -> Result<(), String> {
        let info = &self.personal_information;
        for (key, value) in [
            ("name", &info.name),
            ("surname", &info.surname),
            ("sex", &info.sex),
        ] {
            if value.trim().is_empty() {
                return Err(format!("'personal_information.{}' must not be empty", key));
            }
        }
        if !info.has_contact() {
            return Err(
                "'personal_information' needs at least one of 'phone', 'email' or 'telegram'"
                    .to_string(),
            );
        }

        let required = [
            ("legal_authorization", &self.legal_authorization, "countries"),
            ("work_preferences", &self.work_preferences, "position"),
            ("availability", &self.availability, "notice_period"),
            ("salary_expectations", &self.salary_expectations, "salary_range"),
        ];
        for (section, map, key) in required {
            if is_blank(map.get(key)) {
                return Err(format!("'{}.{}' must not be empty", section, key));
            }
        }

        if self.skills.is_empty() {
            return Err("'skills' must not be empty".to_string());
        }

        Ok(())
    }

    pub fn sex(&self) -> &str {
        &self.personal_information.sex
    }

    pub fn section_value(&self, section: ResumeSection) -> Value {
        let value = match section {
            ResumeSection::PersonalInformation => serde_json::to_value(&self.personal_information),
            ResumeSection::LegalAuthorization => serde_json::to_value(&self.legal_authorization),
            ResumeSection::WorkPreferences => serde_json::to_value(&self.work_preferences),
            ResumeSection::EducationDetails => serde_json::to_value(&self.education_details),
            ResumeSection::ExperienceDetails => serde_json::to_value(&self.experience_details),
            ResumeSection::Projects => serde_json::to_value(&self.projects),
            ResumeSection::Availability => serde_json::to_value(&self.availability),
            ResumeSection::SalaryExpectations => serde_json::to_value(&self.salary_expectations),
            ResumeSection::Certifications => serde_json::to_value(&self.certifications),
            ResumeSection::Languages => serde_json::to_value(&self.languages),
            ResumeSection::Interests => serde_json::to_value(&self.interests),
            ResumeSection::PreviousJobDetails => serde_json::to_value(&self.previous_job_details),
            ResumeSection::GeneralKnowledgeQuestions => {
                Ok(Value::String(self.general_knowledge_questions.clone()))
            }
        };
        value.unwrap_or(Value::Null)
    }

    /// Pretty JSON of one section, used as prompt context.
    pub fn section_text(&self, section: ResumeSection) -> String {
        render(&self.section_value(section))
    }

    pub fn to_prompt_text(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

pub fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_default(),
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use serde_json::json;

    use super::{Resume, ResumeSection};

    pub(crate) fn resume() -> Resume {
        serde_json::from_value(json!({
            "personal_information": {
                "name": "Ivan",
                "surname": "Petrov",
                "sex": "male",
                "telegram": "@ivan",
                "city": "Moscow"
            },
            "legal_authorization": {"countries": ["Russia"]},
            "work_preferences": {"position": "Rust developer", "remote_work": true},
            "education_details": [{"university": "MSU", "degree": "BSc"}],
            "experience_details": [{"company": "Acme", "position": "Backend developer"}],
            "projects": [],
            "availability": {"notice_period": "2 weeks"},
            "salary_expectations": {"salary_range": "300000-400000"},
            "certifications": [],
            "languages": [{"language": "English", "level": "B2"}],
            "interests": ["distributed systems"],
            "achievements": [],
            "previous_job_details": {"reason_for_leaving": "growth"},
            "general_knowledge_questions": "Knows HTTP, REST and SQL",
            "skills": ["Rust", "tokio"]
        }))
        .unwrap()
    }

    #[test]
    fn validate_accepts_complete_resume() {
        assert!(resume().validate().is_ok());
    }

    #[test]
    fn validate_requires_a_contact() {
        let mut resume = resume();
        resume.personal_information.telegram = None;
        resume.personal_information.phone = Some(json!(""));

        assert!(resume.validate().unwrap_err().contains("phone"));

        resume.personal_information.phone = Some(json!(79001234567_u64));
        assert!(resume.validate().is_ok());
    }

    #[test]
    fn validate_requires_nested_fields() {
        let mut resume = resume();
        resume.availability.remove("notice_period");

        assert_eq!(
            resume.validate().unwrap_err(),
            "'availability.notice_period' must not be empty"
        );
    }

    #[test]
    fn section_labels_round_trip() {
        for section in ResumeSection::ALL {
            assert_eq!(ResumeSection::from_label(section.label()), Some(section));
        }
        assert_eq!(
            ResumeSection::from_label("salary expectations"),
            Some(ResumeSection::SalaryExpectations)
        );
        assert_eq!(ResumeSection::from_label("Other"), None);
    }

    #[test]
    fn section_text_keeps_extra_personal_fields() {
        let text = resume().section_text(ResumeSection::PersonalInformation);

        assert!(text.contains("\"city\": \"Moscow\""));
        assert_eq!(
            resume().section_text(ResumeSection::GeneralKnowledgeQuestions),
            "Knows HTTP, REST and SQL"
        );
    }
}
