use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use time::{
    format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime,
    PrimitiveDateTime,
};
use validator::Validate;

pub(crate) use crate::core::time::format_primitive;
use crate::db::models::Exam;
use crate::schemas::question::TakeQuestionResponse;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamCreate {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) description: String,
    #[serde(alias = "durationMinutes")]
    #[validate(range(min = 1, max = 600, message = "duration_minutes must be between 1 and 600"))]
    pub(crate) duration_minutes: i32,
    #[serde(default = "default_pass_percentage")]
    #[serde(alias = "passPercentage")]
    #[validate(range(min = 0, max = 100, message = "pass_percentage must be between 0 and 100"))]
    pub(crate) pass_percentage: i32,
    #[serde(alias = "startTime", deserialize_with = "deserialize_offset_datetime_flexible")]
    pub(crate) start_time: OffsetDateTime,
    #[serde(alias = "endTime", deserialize_with = "deserialize_offset_datetime_flexible")]
    pub(crate) end_time: OffsetDateTime,
    #[serde(default)]
    #[serde(alias = "questionIds")]
    pub(crate) question_ids: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamUpdate {
    #[serde(default)]
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub(crate) title: Option<String>,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default)]
    #[serde(alias = "durationMinutes")]
    #[validate(range(min = 1, max = 600, message = "duration_minutes must be between 1 and 600"))]
    pub(crate) duration_minutes: Option<i32>,
    #[serde(default)]
    #[serde(alias = "passPercentage")]
    #[validate(range(min = 0, max = 100, message = "pass_percentage must be between 0 and 100"))]
    pub(crate) pass_percentage: Option<i32>,
    #[serde(
        default,
        alias = "startTime",
        deserialize_with = "deserialize_option_offset_datetime_flexible"
    )]
    pub(crate) start_time: Option<OffsetDateTime>,
    #[serde(
        default,
        alias = "endTime",
        deserialize_with = "deserialize_option_offset_datetime_flexible"
    )]
    pub(crate) end_time: Option<OffsetDateTime>,
    #[serde(default)]
    #[serde(alias = "questionIds")]
    pub(crate) question_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExamQuestionsUpdate {
    #[serde(alias = "questionIds")]
    pub(crate) question_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) duration_minutes: i32,
    pub(crate) total_marks: i32,
    pub(crate) pass_percentage: i32,
    pub(crate) start_time: String,
    pub(crate) end_time: String,
    pub(crate) is_published: bool,
    pub(crate) created_by: String,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl ExamResponse {
    pub(crate) fn from_db(exam: Exam) -> Self {
        Self {
            id: exam.id,
            title: exam.title,
            description: exam.description,
            duration_minutes: exam.duration_minutes,
            total_marks: exam.total_marks,
            pass_percentage: exam.pass_percentage,
            start_time: format_primitive(exam.start_time),
            end_time: format_primitive(exam.end_time),
            is_published: exam.is_published,
            created_by: exam.created_by,
            created_at: format_primitive(exam.created_at),
            updated_at: format_primitive(exam.updated_at),
        }
    }
}

/// Exam payload handed to a student at take time; questions carry options
/// with correctness stripped.
#[derive(Debug, Serialize)]
pub(crate) struct TakeExamResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) duration_minutes: i32,
    pub(crate) total_marks: i32,
    pub(crate) pass_percentage: i32,
    pub(crate) start_time: String,
    pub(crate) end_time: String,
    pub(crate) questions: Vec<TakeQuestionResponse>,
}

fn default_pass_percentage() -> i32 {
    50
}

fn parse_offset_datetime_flexible(raw: &str) -> Option<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(value);
    }

    // Frontend's datetime-local often sends without timezone.
    if raw.len() == 16 && raw.as_bytes().get(10) == Some(&b'T') {
        let candidate = format!("{raw}:00Z");
        if let Ok(value) = OffsetDateTime::parse(&candidate, &Rfc3339) {
            return Some(value);
        }
    }

    if raw.len() == 19 && raw.as_bytes().get(10) == Some(&b'T') {
        let candidate = format!("{raw}Z");
        if let Ok(value) = OffsetDateTime::parse(&candidate, &Rfc3339) {
            return Some(value);
        }
    }

    if let Ok(value) =
        PrimitiveDateTime::parse(raw, &format_description!("[year]-[month]-[day]T[hour]:[minute]"))
    {
        return Some(value.assume_utc());
    }
    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Some(value.assume_utc());
    }

    None
}

fn deserialize_offset_datetime_flexible<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_offset_datetime_flexible(&raw)
        .ok_or_else(|| D::Error::custom(format!("invalid datetime: {raw}")))
}

fn deserialize_option_offset_datetime_flexible<'de, D>(
    deserializer: D,
) -> Result<Option<OffsetDateTime>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        Some(value) => parse_offset_datetime_flexible(&value)
            .ok_or_else(|| D::Error::custom(format!("invalid datetime: {value}")))
            .map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339_and_naive_forms() {
        assert!(parse_offset_datetime_flexible("2025-06-01T10:00:00Z").is_some());
        assert!(parse_offset_datetime_flexible("2025-06-01T10:00").is_some());
        assert!(parse_offset_datetime_flexible("2025-06-01T10:00:00").is_some());
        assert!(parse_offset_datetime_flexible("yesterday").is_none());
    }

    #[test]
    fn naive_form_is_assumed_utc() {
        let parsed = parse_offset_datetime_flexible("2025-06-01T10:00").unwrap();
        assert_eq!(parsed.offset(), time::UtcOffset::UTC);
        assert_eq!(parsed.hour(), 10);
    }
}
