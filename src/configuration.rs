use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::{resume::Resume, search_params::SearchParameters};

const SECRETS_FILE: &str = "secrets.yaml";
const SEARCH_CONFIG_FILE: &str = "search_config.yaml";
const RESUME_FILE: &str = "structured_resume.yaml";
const APP_CONFIG_FILE: &str = "app_config.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("data folder not found: {0}")]
    DataFolderMissing(PathBuf),
    #[error("required file not found: {0}")]
    FileMissing(PathBuf),
    #[error("failed to read {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: config::ConfigError,
    },
    #[error("invalid {path}: {message}")]
    Invalid { path: PathBuf, message: String },
    #[error("failed to create {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmModelType {
    OpenAi,
    Claude,
    Ollama,
    Gemini,
    HuggingFace,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ModelPrice {
    pub price_per_input_token: f64,
    pub price_per_output_token: f64,
}

impl Default for ModelPrice {
    fn default() -> Self {
        ModelPrice {
            price_per_input_token: 1.5e-7,
            price_per_output_token: 6e-7,
        }
    }
}

impl ModelPrice {
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        input_tokens as f64 * self.price_per_input_token
            + output_tokens as f64 * self.price_per_output_token
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub model_type: LlmModelType,
    pub model: String,
    pub api_url: Option<String>,
    pub temperature: f32,
    pub rate_limit_backoff_secs: u64,
    pub request_timeout_secs: u64,
    pub prices: HashMap<String, ModelPrice>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        LlmSettings {
            model_type: LlmModelType::OpenAi,
            model: "gpt-4o-mini".to_string(),
            api_url: None,
            temperature: 0.4,
            rate_limit_backoff_secs: 30,
            request_timeout_secs: 120,
            prices: HashMap::new(),
        }
    }
}

impl LlmSettings {
    pub fn price(&self, model: &str) -> ModelPrice {
        self.prices
            .get(model)
            .or_else(|| self.prices.get(&self.model))
            .copied()
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotSettings {
    /// Treat every vacancy as interesting without asking the LLM.
    pub monkey_mode: bool,
    /// Write cover letters but never submit.
    pub debug_mode: bool,
    /// Generate a tailored resume PDF instead of submitting.
    pub resume_mode: bool,
    pub apply_once_at_company: bool,
    pub minimum_wait_time_sec: u64,
    pub max_applies_num: u32,
    pub job_is_interesting_thresh: u32,
    pub fixed_cover_letter: Option<String>,
    pub resume_style: Option<PathBuf>,
}

impl Default for BotSettings {
    fn default() -> Self {
        BotSettings {
            monkey_mode: false,
            debug_mode: false,
            resume_mode: false,
            apply_once_at_company: false,
            minimum_wait_time_sec: 0,
            max_applies_num: 200,
            job_is_interesting_thresh: 7,
            fixed_cover_letter: None,
            resume_style: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub webdriver_url: String,
    pub profile_dir: PathBuf,
    pub headless: bool,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        BrowserSettings {
            webdriver_url: "http://localhost:9515".to_string(),
            profile_dir: PathBuf::from("chrome_profile").join("hh_profile"),
            headless: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log_level: String,
    pub llm: LlmSettings,
    pub bot: BotSettings,
    pub browser: BrowserSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            log_level: "info".to_string(),
            llm: LlmSettings::default(),
            bot: BotSettings::default(),
            browser: BrowserSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Secrets {
    pub llm_api_key: String,
}

/// Layout of the user's data folder.
#[derive(Debug, Clone)]
pub struct DataFolder {
    root: PathBuf,
}

impl DataFolder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DataFolder { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join("output")
    }

    pub fn generated_cv_dir(&self) -> PathBuf {
        self.root.join("generated_cv")
    }

    fn required_file(&self, name: &str) -> Result<PathBuf, ConfigError> {
        let path = self.root.join(name);
        if !path.is_file() {
            return Err(ConfigError::FileMissing(path));
        }
        Ok(path)
    }
}

pub struct Configuration {
    pub settings: Settings,
    pub secrets: Secrets,
    pub search: SearchParameters,
    pub resume: Resume,
    pub data_folder: DataFolder,
}

/// Validates the data folder and loads everything a run needs.
pub fn get_configuration(data_folder: &Path) -> Result<Configuration, ConfigError> {
    if !data_folder.is_dir() {
        return Err(ConfigError::DataFolderMissing(data_folder.to_path_buf()));
    }
    let data_folder = DataFolder::new(data_folder);

    let secrets_path = data_folder.required_file(SECRETS_FILE)?;
    let search_path = data_folder.required_file(SEARCH_CONFIG_FILE)?;
    let resume_path = data_folder.required_file(RESUME_FILE)?;

    let output_dir = data_folder.output_dir();
    fs::create_dir_all(&output_dir).map_err(|source| ConfigError::Io {
        path: output_dir,
        source,
    })?;

    Ok(Configuration {
        settings: load_settings(&data_folder.root().join(APP_CONFIG_FILE))?,
        secrets: load_secrets(&secrets_path)?,
        search: load_search_parameters(&search_path)?,
        resume: load_resume(&resume_path)?,
        data_folder,
    })
}

/// Optional `app_config.yaml`, overridable with `APP__SECTION__KEY` variables.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    config::Config::builder()
        .add_source(
            config::File::from(path)
                .format(config::FileFormat::Yaml)
                .required(false),
        )
        .add_source(config::Environment::with_prefix("APP").separator("__"))
        .build()
        .and_then(|c| c.try_deserialize::<Settings>())
        .map_err(|source| ConfigError::Load {
            path: path.to_path_buf(),
            source,
        })
}

pub fn load_secrets(path: &Path) -> Result<Secrets, ConfigError> {
    let value = load_yaml(path)?;
    check_keys(path, &value, &[("llm_api_key", Kind::Str)], &[])?;
    let secrets: Secrets = from_value(path, value)?;

    if secrets.llm_api_key.trim().is_empty() {
        return Err(invalid(path, "'llm_api_key' must not be empty"));
    }
    Ok(secrets)
}

pub fn load_search_parameters(path: &Path) -> Result<SearchParameters, ConfigError> {
    let value = load_yaml(path)?;
    check_keys(
        path,
        &value,
        &[
            ("job_title", Kind::Str),
            ("login", Kind::Str),
            ("experience", Kind::Map),
            ("sort_by", Kind::Map),
            ("output_period", Kind::Map),
            ("output_size", Kind::Map),
        ],
        &[
            ("keywords", Kind::List),
            ("search_only", Kind::Map),
            ("words_to_exclude", Kind::List),
            ("specialization", Kind::Str),
            ("industry", Kind::Str),
            ("regions", Kind::List),
            ("districts", Kind::List),
            ("subway", Kind::List),
            ("income", Kind::Int),
            ("education", Kind::Map),
            ("job_type", Kind::Map),
            ("work_schedule", Kind::Map),
            ("side_job", Kind::Map),
            ("other_params", Kind::Map),
            ("job_blacklist", Kind::List),
        ],
    )?;

    let params: SearchParameters = from_value(path, value)?;
    params.validate().map_err(|message| invalid(path, &message))?;
    Ok(params)
}

pub fn load_resume(path: &Path) -> Result<Resume, ConfigError> {
    let value = load_yaml(path)?;
    check_keys(
        path,
        &value,
        &[
            ("personal_information", Kind::Map),
            ("legal_authorization", Kind::Map),
            ("work_preferences", Kind::Map),
            ("education_details", Kind::List),
            ("experience_details", Kind::List),
            ("projects", Kind::List),
            ("availability", Kind::Map),
            ("salary_expectations", Kind::Map),
            ("certifications", Kind::List),
            ("languages", Kind::List),
            ("interests", Kind::List),
            ("achievements", Kind::List),
            ("previous_job_details", Kind::Map),
            ("general_knowledge_questions", Kind::Str),
            ("skills", Kind::List),
        ],
        &[],
    )?;

    let resume: Resume = from_value(path, value)?;
    resume.validate().map_err(|message| invalid(path, &message))?;
    Ok(resume)
}

fn load_yaml(path: &Path) -> Result<Value, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::FileMissing(path.to_path_buf()));
    }
    config::Config::builder()
        .add_source(config::File::from(path).format(config::FileFormat::Yaml))
        .build()
        .and_then(|c| c.try_deserialize::<Value>())
        .map_err(|source| ConfigError::Load {
            path: path.to_path_buf(),
            source,
        })
}

fn from_value<T: DeserializeOwned>(path: &Path, value: Value) -> Result<T, ConfigError> {
    serde_json::from_value(value).map_err(|e| invalid(path, &e.to_string()))
}

fn invalid(path: &Path, message: &str) -> ConfigError {
    ConfigError::Invalid {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Str,
    Map,
    List,
    Int,
}

impl Kind {
    fn matches(&self, value: &Value) -> bool {
        match self {
            Kind::Str => value.is_string(),
            Kind::Map => value.is_object(),
            Kind::List => value.is_array(),
            Kind::Int => value.is_i64() || value.is_u64(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Kind::Str => "a string",
            Kind::Map => "a mapping",
            Kind::List => "a list",
            Kind::Int => "an integer",
        }
    }
}

fn check_keys(
    path: &Path,
    value: &Value,
    required: &[(&str, Kind)],
    optional: &[(&str, Kind)],
) -> Result<(), ConfigError> {
    let Some(map) = value.as_object() else {
        return Err(invalid(path, "top level must be a mapping"));
    };

    for (key, kind) in required {
        match map.get(*key) {
            None | Some(Value::Null) => {
                return Err(invalid(path, &format!("missing key '{}'", key)))
            }
            Some(v) if !kind.matches(v) => {
                return Err(invalid(
                    path,
                    &format!("key '{}' must be {}", key, kind.name()),
                ))
            }
            _ => {}
        }
    }

    for (key, kind) in optional {
        match map.get(*key) {
            Some(v) if !v.is_null() && !kind.matches(v) => {
                return Err(invalid(
                    path,
                    &format!("key '{}' must be {}", key, kind.name()),
                ))
            }
            _ => {}
        }
    }

    Ok(())
}
