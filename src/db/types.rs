use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "userrole", rename_all = "lowercase")]
pub(crate) enum UserRole {
    Admin,
    Teacher,
    Student,
}

/// Question kinds. The hyphenated wire/storage labels match the original
/// API contract, so both serde and sqlx rename per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "questiontype")]
pub(crate) enum QuestionType {
    #[serde(rename = "single-choice")]
    #[sqlx(rename = "single-choice")]
    SingleChoice,
    #[serde(rename = "multiple-choice")]
    #[sqlx(rename = "multiple-choice")]
    MultipleChoice,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_type_uses_hyphenated_labels() {
        let single = serde_json::to_string(&QuestionType::SingleChoice).unwrap();
        assert_eq!(single, "\"single-choice\"");
        let parsed: QuestionType = serde_json::from_str("\"multiple-choice\"").unwrap();
        assert_eq!(parsed, QuestionType::MultipleChoice);
    }

    #[test]
    fn user_role_is_lowercase() {
        assert_eq!(serde_json::to_string(&UserRole::Teacher).unwrap(), "\"teacher\"");
    }
}
