use crate::domain::resume::ResumeSection;

/// Markers around the vacancy text in prompts that carry one.
pub const JOB_DESCRIPTION_START: &str = "## Job description:\n```\n";
pub const JOB_DESCRIPTION_END: &str = "\n```\n## Resume:";

/// The vacancy text of a recorded prompt, if it carries one.
pub fn extract_job_description(prompt: &str) -> Option<&str> {
    let start = prompt.find(JOB_DESCRIPTION_START)? + JOB_DESCRIPTION_START.len();
    let end = start + prompt[start..].find(JOB_DESCRIPTION_END)?;
    Some(&prompt[start..end])
}

const LANGUAGE_RULE: &str = "If the question is written in Russian, answer in Russian \
and keep in mind that the candidate's sex is";

const PLACEHOLDER_OPTIONS: &str = "'Select an option', 'None', 'Choose from the options below', \
'My option', 'Your own option', 'Your own answer', 'Свой вариант', 'Свой ответ'";

pub fn section_classification(question: &str) -> String {
    let sections = ResumeSection::ALL
        .iter()
        .map(|section| format!("- {}", section.label()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You help a bot that fills in job applications. It receives questions from employers and must decide which part of the candidate's resume answers each of them.

Question: '{question}'

Respond with exactly one of these sections:
{sections}
- Other

Guidelines:
- Personal information: contact details and online profiles (email, phone, GitHub, website).
- Legal Authorization: the right to work in a country, visas, sponsorship.
- Work Preferences: remote or office work, relocation, willingness to pass assessments.
- Education Details: degrees, universities, fields of study, courses.
- Experience Details: previous positions, responsibilities, achievements and technologies used at work.
- Projects: particular projects, their descriptions and repositories.
- Availability: notice period, how soon the candidate can start.
- Salary Expectations: desired salary or compensation.
- Certifications: certificates and licenses.
- Languages: spoken languages and proficiency.
- Interests: hobbies and professional interests.
- Previous Job Details: attitude to the previous job, reasons for leaving, the team and management there.
- General Knowledge Questions: technical knowledge needed for the job, e.g. "What is REST?", "Which HTTP methods do you know?".
- Other: anything else, e.g. a request to fill in a survey on a third-party site.

Provide only the exact section name with no additional text."#
    )
}

const INFER: &str = "If the experience is likely even though not stated explicitly, answer as if the candidate has it.";
const UNSURE: &str = "If unsure, answer \"I have no experience with that, but I learn fast\".";
const SHORT: &str = "Keep the answer under 140 characters.";
const PERIODS: &str = "Use periods only if the answer has several sentences.";

/// Extra rules and a worked example for each section.
fn section_rules(section: ResumeSection) -> (Vec<&'static str>, &'static str) {
    match section {
        ResumeSection::PersonalInformation => (
            vec![],
            "My resume: John Doe, living in Milan, Italy.\nQuestion: What is your city?\nMilan",
        ),
        ResumeSection::LegalAuthorization => (
            vec![],
            "My resume: Authorized to work in the EU.\nQuestion: Are you legally allowed to work in the EU?\nYes",
        ),
        ResumeSection::WorkPreferences => (
            vec![],
            "My resume: Open to remote work, willing to relocate.\nQuestion: Are you open to remote work?\nYes",
        ),
        ResumeSection::EducationDetails => (
            vec![INFER, UNSURE, SHORT],
            "My resume: Bachelor's degree in Computer Science.\nQuestion: Do you have a technical degree?\nYes, a BSc in Computer Science.",
        ),
        ResumeSection::ExperienceDetails => (
            vec![INFER, UNSURE, SHORT],
            "My resume: 3 years as a software developer leading a team.\nQuestion: Do you have leadership experience?\nYes, 3 years of team leadership.",
        ),
        ResumeSection::Certifications => (
            vec![INFER, UNSURE, SHORT],
            "My resume: Certified Project Management Professional.\nQuestion: Do you have PMP certification?\nYes, I am PMP certified.",
        ),
        ResumeSection::Projects => (
            vec![INFER, SHORT],
            "My resume: Led the development of a mobile app.\nQuestion: Have you led any projects?\nYes, the development of a mobile app.",
        ),
        ResumeSection::Availability => (
            vec![SHORT, PERIODS],
            "My resume: Available to start immediately.\nQuestion: When can you start?\nI can start immediately.",
        ),
        ResumeSection::SalaryExpectations => (
            vec![SHORT, PERIODS],
            "My resume: Looking for 50k-60k USD.\nQuestion: What are your salary expectations?\nFrom 50000 to 60000",
        ),
        ResumeSection::Interests => (
            vec![SHORT, PERIODS],
            "My resume: Interested in AI and data science.\nQuestion: What are your interests?\nAI and data science",
        ),
        ResumeSection::Languages => (
            vec![INFER, SHORT, "Never mention languages the resume does not list."],
            "My resume: Fluent in Italian and English.\nQuestion: What languages do you speak?\nFluent in Italian and English.",
        ),
        ResumeSection::PreviousJobDetails => (
            vec![SHORT],
            "My resume: Left the previous job due to lack of career prospects.\nQuestion: Why did you leave your previous job?\nDue to lack of career prospects",
        ),
        ResumeSection::GeneralKnowledgeQuestions => (
            vec!["Answer briefly, ideally under 140 characters."],
            "Question: What is the difference between linear and logistic regression?\nLinear regression predicts continuous values, logistic regression predicts class probabilities.",
        ),
    }
}

pub fn section_answer(section: ResumeSection, resume_section: &str, question: &str, sex: &str) -> String {
    let (rules, example) = section_rules(section);
    let rules: String = rules.iter().map(|rule| format!("- {}\n", rule)).collect();
    format!(
        r#"Answer the following question based on the candidate's {label}.

## Rules
- Answer the question directly.
- {LANGUAGE_RULE} {sex}. Otherwise answer in English.
{rules}
## Example
{example}

{label}: {resume_section}
Question: {question}
"#,
        label = section.label(),
    )
}

pub fn select_one(resume: &str, question: &str, options: &[String]) -> String {
    format!(
        r#"Below are a resume and a question about it. The answer is exactly one of the options.

## Rules
- Never choose a default or placeholder option such as {PLACEHOLDER_OPTIONS}.
- The answer must contain only one of the options, verbatim.

## Example
My resume: Software engineer with 10 years of experience in Swift, Python, C and C++.
Question: How many years of experience do you have with Python?
Options: [1-2, 3-5, 6-10, 10+]
10+

-----

## My resume:
```
{resume}
```

## Question:
{question}

## Options:
[{options}]

## Answer:"#,
        options = options.join(", "),
    )
}

pub fn select_many(resume: &str, question: &str, options: &[String]) -> String {
    format!(
        r#"Below are a resume and a question about it. The answer is one or more of the options.

## Rules
- Never choose a default or placeholder option such as {PLACEHOLDER_OPTIONS}.
- Return the chosen options as a semicolon separated string.

## Example
My resume: Software engineer with 10 years of experience in Swift, Python, C and C++.
Question: Which programming languages do you know?
Options: [python, C, rust, swift, ruby, C++, C#, go]
python; C; swift; C++

-----

## My resume:
```
{resume}
```

## Question:
{question}

## Options:
[{options}]

## Answer:"#,
        options = options.join(", "),
    )
}

pub fn job_is_interesting(job_description: &str, resume: &str, skills: &str, interests: &str) -> String {
    format!(
        r#"Evaluate whether the resume below meets the requirements of the job description and whether the candidate suits the job.

{JOB_DESCRIPTION_START}{job_description}{JOB_DESCRIPTION_END}
```
{resume}
```
## Your skills:
```
{skills}
```
## Your interests:
```
{interests}
```

Instructions:
1. Extract the hard requirements (must-haves) and soft requirements (nice-to-haves) from the job description.
2. Find the matching qualifications in the resume and the skill list.
3. Compare them, making sure every hard requirement is met. A one-year gap in required experience is acceptable.
4. Give a suitability score from 1 (no requirement met) to 10 (all requirements met).
5. If the job matches one of the candidate's interests, add 1 point.
6. Give a brief reasoning naming the requirements that are met and those that are not.
7. If the job description is written in Russian, answer in Russian. Otherwise answer in English.

Output format (follow it strictly):
Score: [numerical score]
Reasoning: [brief explanation]
Output nothing except the score and the reasoning.
"#
    )
}

pub fn cover_letter(job_description: &str, resume: &str, sex: &str) -> String {
    format!(
        r#"Write a short, expressive cover letter based on the job description and the resume below. At most five paragraphs, no placeholders, natural wording.

Greet the reader and name the vacancy, introduce the candidate briefly and connect their goals with the role. Point out the skills and experience from the resume that match the key requirements, with concrete examples. Finish by thanking the reader and offering to discuss the experience at an interview.

{JOB_DESCRIPTION_START}{job_description}{JOB_DESCRIPTION_END}
```
{resume}
```

## Rules
- Output only the text of the letter, formatted in paragraphs.
- Professional but conversational tone; confident, without claiming to be the perfect fit.
- If the job description is written in Russian, write the letter in Russian and keep in mind that the author's sex is {sex}. Otherwise write it in English.
- Do not name the company; say "your company", "your organization" or "your bank" as appropriate.
- If the job description asks questions, answer them after the main text using the resume.
- If the job description asks to include specific words in the letter, add them after the main text, but only if such a request really exists.
- Do not include any links.
- End with the candidate's Telegram if the resume has one, otherwise the phone, otherwise the email.
"#
    )
}

pub fn summarize_job_description(text: &str) -> String {
    format!(
        r#"As a seasoned HR expert, outline the key skills and requirements for the position described below. Remove boilerplate and keep only what helps to match the job against a resume.

Cover these sections:
Technical Skills: specific technical skills the responsibilities require.
Soft Skills: communication, problem solving, time management and similar.
Educational Qualifications and Certifications: what is essential.
Professional Experience: required or preferred experience.
Role Evolution: how the role may change with industry trends.

# Job Description:
```
{text}
```

---

# Job Description Summary"#
    )
}

const RESUME_WRITER: &str = "Act as an HR expert and resume writer specializing in ATS-friendly resumes.";

const RESUME_LANGUAGE_RULE: &str = "If the candidate's information is written in Russian, write in Russian \
and keep in mind that the candidate's sex is";

const HTML_RULE: &str = "Return only the HTML fragment, without markdown code fences or any other text.";

pub fn resume_header(personal_information: &str, sex: &str) -> String {
    format!(
        r#"{RESUME_WRITER} Create the resume header with the full name, city and country, phone number, email and online profiles, presented clearly.

- Omit any contact field that is not provided.
- {RESUME_LANGUAGE_RULE} {sex}. Otherwise write in English.

- **My information:**
  {personal_information}

Use this structure:
<header>
  <h1>[Name Surname]</h1>
  <div class="contact-info">
    <p class="fas fa-map-marker-alt"><span>[City, Country]</span></p>
    <p class="fas fa-phone"><span>[Phone]</span></p>
    <p class="fas fa-envelope"><span>[Email]</span></p>
    <p class="fab fa-telegram"><span>[Telegram]</span></p>
  </div>
</header>

{HTML_RULE}"#
    )
}

fn resume_section_prompt(task: &str, information: &str, job_description: &str, sex: &str, structure: &str) -> String {
    format!(
        r#"{RESUME_WRITER} {task}

- Omit any detail that is not provided.
- {RESUME_LANGUAGE_RULE} {sex}. Otherwise write in English.

- **My information:**
  {information}

- **Job Description:**
  {job_description}

Use this structure:
{structure}

{HTML_RULE}"#
    )
}

pub fn resume_education(education: &str, job_description: &str, sex: &str) -> String {
    resume_section_prompt(
        "Describe the educational background aligned with the job description: institution and location, degree and field of study, a strong grade, and relevant coursework if any.",
        education,
        job_description,
        sex,
        r#"<section id="education">
  <h2>Education</h2>
  <div class="entry">
    <div class="entry-header"><span class="entry-name">[University]</span><span class="entry-location">[Location]</span></div>
    <div class="entry-details"><span class="entry-title">[Degree] in [Field]</span><span class="entry-year">[Years]</span></div>
  </div>
</section>"#,
    )
}

pub fn resume_work_experience(experience: &str, job_description: &str, sex: &str) -> String {
    resume_section_prompt(
        "Detail the work experience aligned with the job description: company and location, job title, dates of employment, responsibilities and achievements with measurable results.",
        experience,
        job_description,
        sex,
        r#"<section id="work-experience">
  <h2>Work Experience</h2>
  <div class="entry">
    <div class="entry-header"><span class="entry-name">[Company]</span><span class="entry-location">[Location]</span></div>
    <div class="entry-details"><span class="entry-title">[Position]</span><span class="entry-year">[Dates]</span></div>
    <ul class="compact-list"><li>[Responsibility or achievement]</li></ul>
  </div>
</section>"#,
    )
}

pub fn resume_side_projects(projects: &str, job_description: &str, sex: &str) -> String {
    resume_section_prompt(
        "Highlight the side projects relevant to the job description: name and link, notable recognition, technical contributions and technologies.",
        projects,
        job_description,
        sex,
        r#"<section id="side-projects">
  <h2>Side Projects</h2>
  <ul class="compact-list">
    <li><i class="fab fa-github"></i> <a href="[Link]">[Project]</a>: [Description]</li>
  </ul>
</section>"#,
    )
}

pub fn resume_achievements(achievements: &str, job_description: &str, sex: &str) -> String {
    resume_section_prompt(
        "List the significant achievements: the award or recognition and a brief description of its relevance.",
        achievements,
        job_description,
        sex,
        r#"<section id="achievements">
  <h2>Achievements</h2>
  <ul class="compact-list"><li><strong>[Award]:</strong> [Description]</li></ul>
</section>"#,
    )
}

pub fn resume_certifications(certifications: &str, job_description: &str, sex: &str) -> String {
    resume_section_prompt(
        "List the certifications: the certification name and a brief description of its relevance.",
        certifications,
        job_description,
        sex,
        r#"<section id="certifications">
  <h2>Certifications</h2>
  <ul class="compact-list"><li><strong>[Certification]:</strong> [Description]</li></ul>
</section>"#,
    )
}

pub fn resume_additional_skills(
    languages: &str,
    interests: &str,
    skills: &str,
    job_description: &str,
    sex: &str,
) -> String {
    let information = format!("{}\n  {}\n  {}", languages, interests, skills);
    resume_section_prompt(
        "List additional skills relevant to the job grouped by category, with proficiency. Use only the languages, interests and skills provided, never details from the job description.",
        &information,
        job_description,
        sex,
        r#"<section id="skills-languages">
  <h2>Additional Skills</h2>
  <div class="two-column">
    <ul class="compact-list"><li>[Skill]</li></ul>
    <ul class="compact-list"><li><strong>Languages:</strong> [Language (level)]</li></ul>
  </div>
</section>"#,
    )
}

#[cfg(test)]
mod tests {
    use crate::domain::resume::ResumeSection;

    use super::{
        cover_letter, extract_job_description, job_is_interesting, section_answer,
        section_classification, select_one,
    };

    #[test]
    fn classification_lists_every_section() {
        let prompt = section_classification("Когда готовы выйти?");

        for section in ResumeSection::ALL {
            assert!(prompt.contains(&format!("- {}\n", section.label())));
        }
        assert!(prompt.contains("- Other"));
        assert!(prompt.contains("'Когда готовы выйти?'"));
    }

    #[test]
    fn section_answer_carries_context() {
        let prompt = section_answer(ResumeSection::Availability, "2 weeks", "When can you start?", "female");

        assert!(prompt.contains("Availability: 2 weeks"));
        assert!(prompt.contains("Question: When can you start?"));
        assert!(prompt.contains("sex is female"));
    }

    #[test]
    fn options_are_listed_in_brackets() {
        let options = vec!["1-2".to_string(), "3-5".to_string()];

        assert!(select_one("resume", "Years?", &options).contains("[1-2, 3-5]"));
    }

    #[test]
    fn job_description_is_delimited() {
        let prompt = job_is_interesting("Rust backend", "resume", "Rust", "music");
        assert_eq!(extract_job_description(&prompt), Some("Rust backend"));

        let letter = cover_letter("Tokio\nAxum", "resume", "male");
        assert_eq!(extract_job_description(&letter), Some("Tokio\nAxum"));

        assert_eq!(extract_job_description("Summarize this"), None);
    }
}
