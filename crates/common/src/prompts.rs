//! Prompt builders for the upstream models

use serde::Deserialize;
use validator::Validate;

/// Number of candidates requested per recommendation.
pub const CANDIDATE_COUNT: usize = 7;

const UNKNOWN: &str = "(unknown)";
const NONE: &str = "(none)";

/// Identifying details of a person to research.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PersonQuery {
    #[validate(length(min = 1, max = 200))]
    pub name: String,

    #[serde(default)]
    #[validate(length(max = 200))]
    pub university: Option<String>,

    /// Birth date, free-form
    #[serde(default, alias = "birthDate")]
    #[validate(length(max = 50))]
    pub dob: Option<String>,

    #[serde(default, alias = "additionalInfo")]
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
}

fn or_placeholder<'a>(value: &'a Option<String>, placeholder: &'a str) -> &'a str {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(placeholder)
}

/// Ask for candidates matching a job description, as a bare JSON array.
pub fn recommend_prompt(job_description: &str) -> String {
    format!(
        r#"Based on the job requirements below, find {count} suitable candidates using information on the web (especially social media and researchmap).
For each candidate include:
- Name and age
- Current affiliation and position
- Areas of expertise and skills
- Main achievements (papers, projects, development experience)
- Match score for this position (0-100) and the reason
- Reference URLs (researchmap, Twitter, GitHub, personal site, etc.)

Job requirements:
{job}

Answer ONLY with JSON in exactly this format. No explanation or preamble:
[
  {{
    "name": "Candidate name",
    "currentPosition": "Current affiliation and position",
    "profileSummary": "Profile summary",
    "relevanceScore": 85,
    "matchingReason": "Why this candidate matches",
    "skills": ["Skill 1", "Skill 2"],
    "achievements": ["Achievement 1", "Achievement 2"],
    "referenceLinks": ["URL1", "URL2"]
  }}
]"#,
        count = CANDIDATE_COUNT,
        job = job_description.trim(),
    )
}

/// Ask for a detailed, recruiting-oriented profile of one person.
pub fn research_prompt(person: &PersonQuery) -> String {
    format!(
        "Research the following person in detail for recruiting purposes and describe your findings thoroughly.\n\
         Name: {}\n\
         University: {}\n\
         Date of birth: {}\n\
         Additional information: {}",
        person.name.trim(),
        or_placeholder(&person.university, UNKNOWN),
        or_placeholder(&person.dob, UNKNOWN),
        or_placeholder(&person.notes, NONE),
    )
}

/// System prompt for the risk analyst model.
pub const RISK_ANALYST_SYSTEM_PROMPT: &str = "You are a risk analyst. Using only the summary you are given as evidence, \
produce an objective risk assessment covering: 1) basic reliability of the background, \
2) potential risk factors, 3) points requiring caution, 4) overall assessment. \
Point out where information is insufficient. Keep it concise and use bullet points.";
