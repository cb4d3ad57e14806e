use serde::{Deserialize, Serialize};

/// Canonical tag record; `name` is unique and case-sensitive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectTag {
    pub project_id: String,
    pub tag_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AttachTagsForm {
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TagResponse {
    pub id: String,
    pub name: String,
    pub created_at: i64,
}

impl From<Tag> for TagResponse {
    fn from(tag: Tag) -> Self {
        TagResponse {
            id: tag.id,
            name: tag.name,
            created_at: tag.created_at,
        }
    }
}
