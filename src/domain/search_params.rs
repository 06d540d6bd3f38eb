use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;

use super::text::sanitize_text;

pub type Toggles = BTreeMap<String, bool>;

/// How the advanced search form exposes a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    DataQa(&'static str),
    Text(&'static str),
}

pub struct ToggleGroup {
    pub key: &'static str,
    /// At most one option may be switched on.
    pub exclusive: bool,
    pub options: &'static [(&'static str, Control)],
}

impl ToggleGroup {
    fn control(&self, option: &str) -> Option<Control> {
        self.options
            .iter()
            .find(|(key, _)| *key == option)
            .map(|(_, control)| *control)
    }
}

pub static EXPERIENCE: ToggleGroup = ToggleGroup {
    key: "experience",
    exclusive: true,
    options: &[
        (
            "doesnt_matter",
            Control::DataQa("advanced-search__experience-item-label_doesNotMatter"),
        ),
        (
            "no_experience",
            Control::DataQa("advanced-search__experience-item-label_noExperience"),
        ),
        (
            "between_1_and_3",
            Control::DataQa("advanced-search__experience-item-label_between1And3"),
        ),
        (
            "between_3_and_6",
            Control::DataQa("advanced-search__experience-item-label_between3And6"),
        ),
        (
            "6_and_more",
            Control::DataQa("advanced-search__experience-item-label_moreThan6"),
        ),
    ],
};

pub static SORT_BY: ToggleGroup = ToggleGroup {
    key: "sort_by",
    exclusive: true,
    options: &[
        (
            "relevance",
            Control::DataQa("advanced-search__order_by-item-label_relevance"),
        ),
        (
            "publication_time",
            Control::DataQa("advanced-search__order_by-item-label_publication_time"),
        ),
        (
            "salary_desc",
            Control::DataQa("advanced-search__order_by-item-label_salary_desc"),
        ),
        (
            "salary_asc",
            Control::DataQa("advanced-search__order_by-item-label_salary_asc"),
        ),
    ],
};

pub static OUTPUT_PERIOD: ToggleGroup = ToggleGroup {
    key: "output_period",
    exclusive: true,
    options: &[
        (
            "all_time",
            Control::DataQa("advanced-search__search_period-item-label_0"),
        ),
        (
            "month",
            Control::DataQa("advanced-search__search_period-item-label_30"),
        ),
        (
            "week",
            Control::DataQa("advanced-search__search_period-item-label_7"),
        ),
        (
            "three_days",
            Control::DataQa("advanced-search__search_period-item-label_3"),
        ),
        (
            "one_day",
            Control::DataQa("advanced-search__search_period-item-label_1"),
        ),
    ],
};

pub static OUTPUT_SIZE: ToggleGroup = ToggleGroup {
    key: "output_size",
    exclusive: true,
    options: &[
        (
            "show_20",
            Control::DataQa("advanced-search__items_on_page-item-label_20"),
        ),
        (
            "show_50",
            Control::DataQa("advanced-search__items_on_page-item-label_50"),
        ),
        (
            "show_100",
            Control::DataQa("advanced-search__items_on_page-item-label_100"),
        ),
    ],
};

pub static SEARCH_ONLY: ToggleGroup = ToggleGroup {
    key: "search_only",
    exclusive: false,
    options: &[
        ("vacancy_name", Control::Text("в названии вакансии")),
        ("company_name", Control::Text("в названии компании")),
        ("vacancy_description", Control::Text("в описании вакансии")),
    ],
};

pub static EDUCATION: ToggleGroup = ToggleGroup {
    key: "education",
    exclusive: false,
    options: &[
        (
            "not_needed",
            Control::DataQa("advanced-search__education-item-label_not_required_or_not_specified"),
        ),
        (
            "middle",
            Control::DataQa("advanced-search__education-item-label_special_secondary"),
        ),
        (
            "higher",
            Control::DataQa("advanced-search__education-item-label_higher"),
        ),
    ],
};

pub static JOB_TYPE: ToggleGroup = ToggleGroup {
    key: "job_type",
    exclusive: false,
    options: &[
        (
            "full_time",
            Control::DataQa("advanced-search__employment-item-label_full"),
        ),
        (
            "part_time",
            Control::DataQa("advanced-search__employment-item-label_part"),
        ),
        (
            "project",
            Control::DataQa("advanced-search__employment-item-label_project"),
        ),
        (
            "volunteer",
            Control::DataQa("advanced-search__employment-item-label_volunteer"),
        ),
        (
            "probation",
            Control::DataQa("advanced-search__employment-item-label_probation"),
        ),
        ("civil_law_contract", Control::Text("ГПХ")),
    ],
};

pub static WORK_SCHEDULE: ToggleGroup = ToggleGroup {
    key: "work_schedule",
    exclusive: false,
    options: &[
        (
            "full_day",
            Control::DataQa("advanced-search__schedule-item-label_fullDay"),
        ),
        (
            "shift",
            Control::DataQa("advanced-search__schedule-item-label_shift"),
        ),
        (
            "flexible",
            Control::DataQa("advanced-search__schedule-item-label_flexible"),
        ),
        (
            "remote",
            Control::DataQa("advanced-search__schedule-item-label_remote"),
        ),
        (
            "fly_in_fly_out",
            Control::DataQa("advanced-search__schedule-item-label_flyInFlyOut"),
        ),
    ],
};

pub static SIDE_JOB: ToggleGroup = ToggleGroup {
    key: "side_job",
    exclusive: false,
    options: &[
        (
            "project",
            Control::DataQa("advanced-search__part_time-item-label_employment_project"),
        ),
        (
            "part",
            Control::DataQa("advanced-search__part_time-item-label_employment_part"),
        ),
        (
            "from_4_hours_per_day",
            Control::DataQa("advanced-search__part_time-item-label_from_four_to_six_hours_in_a_day"),
        ),
        (
            "weekend",
            Control::DataQa("advanced-search__part_time-item-label_only_saturday_and_sunday"),
        ),
        (
            "evenings",
            Control::DataQa("advanced-search__part_time-item-label_start_after_sixteen"),
        ),
    ],
};

pub static OTHER_PARAMS: ToggleGroup = ToggleGroup {
    key: "other_params",
    exclusive: false,
    options: &[
        (
            "with_address",
            Control::DataQa("advanced-search__label-item-label_with_address"),
        ),
        (
            "accept_handicapped",
            Control::DataQa("advanced-search__label-item-label_accept_handicapped"),
        ),
        (
            "not_from_agency",
            Control::DataQa("advanced-search__label-item-label_not_from_agency"),
        ),
        (
            "accept_kids",
            Control::DataQa("advanced-search__label-item-label_accept_kids"),
        ),
        (
            "accredited_it",
            Control::DataQa("advanced-search__label-item-label_accredited_it"),
        ),
        (
            "low_performance",
            Control::DataQa("advanced-search__label-item-label_low_performance"),
        ),
    ],
};

#[derive(Debug, Clone, Deserialize)]
pub struct SearchParameters {
    pub job_title: String,
    pub login: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub experience: Toggles,
    pub sort_by: Toggles,
    pub output_period: Toggles,
    pub output_size: Toggles,
    #[serde(default)]
    pub search_only: Toggles,
    #[serde(default)]
    pub words_to_exclude: Vec<String>,
    #[serde(default)]
    pub specialization: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub districts: Vec<String>,
    #[serde(default)]
    pub subway: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_number_from_string")]
    pub income: u64,
    #[serde(default)]
    pub education: Toggles,
    #[serde(default)]
    pub job_type: Toggles,
    #[serde(default)]
    pub work_schedule: Toggles,
    #[serde(default)]
    pub side_job: Toggles,
    #[serde(default)]
    pub other_params: Toggles,
    #[serde(default)]
    pub job_blacklist: Vec<String>,
}

impl SearchParameters {
    /// Every toggle group paired with its configured values, in form order.
    pub fn toggle_groups(&self) -> [(&'static ToggleGroup, &Toggles); 10] {
        [
            (&SEARCH_ONLY, &self.search_only),
            (&EDUCATION, &self.education),
            (&EXPERIENCE, &self.experience),
            (&JOB_TYPE, &self.job_type),
            (&WORK_SCHEDULE, &self.work_schedule),
            (&SIDE_JOB, &self.side_job),
            (&OTHER_PARAMS, &self.other_params),
            (&SORT_BY, &self.sort_by),
            (&OUTPUT_PERIOD, &self.output_period),
            (&OUTPUT_SIZE, &self.output_size),
        ]
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.job_title.trim().is_empty() {
            return Err("'job_title' must not be empty".to_string());
        }
        if self.login.trim().is_empty() {
            return Err("'login' must not be empty".to_string());
        }

        for (group, toggles) in self.toggle_groups() {
            if let Some(unknown) = toggles.keys().find(|k| group.control(k).is_none()) {
                return Err(format!("unknown option '{}' in '{}'", unknown, group.key));
            }
            // required groups, and optional groups once present, list every option
            if group.exclusive || !toggles.is_empty() {
                if let Some((missing, _)) = group
                    .options
                    .iter()
                    .find(|(key, _)| !toggles.contains_key(*key))
                {
                    return Err(format!("'{} -> {}' must be a boolean", group.key, missing));
                }
            }
            let enabled = toggles.values().filter(|on| **on).count();
            if group.exclusive && enabled > 1 {
                return Err(format!(
                    "at most one option of '{}' may be true, found {}",
                    group.key, enabled
                ));
            }
        }

        Ok(())
    }

    /// Controls to switch on for a group, in the group's declared order.
    pub fn selected_controls(&self, group: &ToggleGroup, toggles: &Toggles) -> Vec<Control> {
        group
            .options
            .iter()
            .filter(|(key, _)| toggles.get(*key).copied().unwrap_or(false))
            .map(|(_, control)| *control)
            .collect()
    }

    pub fn sanitized_blacklist(&self) -> HashSet<String> {
        self.job_blacklist.iter().map(|c| sanitize_text(c)).collect()
    }

    pub fn is_blacklisted(&self, company: &str) -> bool {
        self.sanitized_blacklist().contains(&sanitize_text(company))
    }
}
