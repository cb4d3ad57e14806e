use serde::{Deserialize, Serialize};
use validator::{Validate, ValidateUrl, ValidationError};

use super::profile::ProfileSummary;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub github_url: String,
    pub bolt_url: Option<String>,
    pub author_id: String,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub likes_count: i64,
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Optional link fields accept an empty string as "no link"
fn blank_or_url(value: &str) -> Result<(), ValidationError> {
    if is_blank(value) || value.validate_url() {
        Ok(())
    } else {
        Err(ValidationError::new("url"))
    }
}

impl Project {
    /// Case-insensitive match on title or description; `term` must already be lowercase
    pub fn matches_text(&self, term: &str) -> bool {
        self.title.to_lowercase().contains(term) || self.description.to_lowercase().contains(term)
    }
}

/// Tags as sent by clients: either a list or the comma-separated form field
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TagInput {
    List(Vec<String>),
    Text(String),
}

impl Default for TagInput {
    fn default() -> Self {
        TagInput::List(Vec::new())
    }
}

impl TagInput {
    pub fn into_names(self) -> Vec<String> {
        match self {
            TagInput::List(names) => names
                .into_iter()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect(),
            TagInput::Text(raw) => crate::services::tag::parse_tag_list(&raw),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProjectForm {
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(length(min = 1, max = 5000))]
    pub description: String,

    #[validate(url)]
    pub image_url: String,

    #[validate(url)]
    pub github_url: String,

    #[validate(custom(function = "blank_or_url"))]
    pub bolt_url: Option<String>,

    #[serde(default)]
    pub tags: TagInput,
}

impl ProjectForm {
    /// The bolt link to store; a blank field means none
    pub fn bolt_url(&self) -> Option<&str> {
        self.bolt_url.as_deref().filter(|url| !is_blank(url))
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProjectUpdateForm {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,

    #[validate(length(min = 1, max = 5000))]
    pub description: Option<String>,

    #[validate(url)]
    pub image_url: Option<String>,

    #[validate(url)]
    pub github_url: Option<String>,

    /// `Some("")` clears the stored link
    #[validate(custom(function = "blank_or_url"))]
    pub bolt_url: Option<String>,
}

impl ProjectUpdateForm {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.image_url.is_none()
            && self.github_url.is_none()
            && self.bolt_url.is_none()
    }
}

/// Directory entry: a project with its author, tags and like state
#[derive(Debug, Clone, Serialize)]
pub struct ProjectResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub github_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bolt_url: Option<String>,
    pub author_id: String,
    pub featured: bool,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profiles: Option<ProfileSummary>,
    pub tags: Vec<String>,
    pub likes_count: i64,
    pub user_has_liked: bool,
}

impl ProjectResponse {
    pub fn from_parts(
        project: Project,
        profile: Option<ProfileSummary>,
        tags: Vec<String>,
        likes_count: i64,
        user_has_liked: bool,
    ) -> Self {
        ProjectResponse {
            id: project.id,
            title: project.title,
            description: project.description,
            image_url: project.image_url,
            github_url: project.github_url,
            bolt_url: project.bolt_url,
            author_id: project.author_id,
            featured: project.featured,
            created_at: project.created_at,
            updated_at: project.updated_at,
            profiles: profile,
            tags,
            likes_count,
            user_has_liked,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProjectListResponse {
    pub user_projects: Vec<ProjectResponse>,
    pub projects: Vec<ProjectResponse>,
}
