use serde::{Deserialize, Serialize};
use validator::Validate;

pub(crate) use crate::core::time::format_primitive;
use crate::repositories::subjects::SubjectWithCount;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SubjectCreate {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) description: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SubjectUpdate {
    #[serde(default)]
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) description: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubjectResponse {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) questions_count: i64,
    pub(crate) created_at: String,
}

impl SubjectResponse {
    pub(crate) fn from_db(subject: SubjectWithCount) -> Self {
        Self {
            id: subject.id,
            name: subject.name,
            description: subject.description,
            questions_count: subject.questions_count,
            created_at: format_primitive(subject.created_at),
        }
    }
}
