use serde::{Deserialize, Serialize};
use validator::Validate;

pub(crate) use crate::core::time::format_primitive;
use crate::db::models::{Question, QuestionOption};
use crate::db::types::QuestionType;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct OptionCreate {
    #[validate(length(min = 1, message = "option text must not be empty"))]
    pub(crate) text: String,
    #[serde(default)]
    #[serde(alias = "isCorrect")]
    pub(crate) is_correct: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionCreate {
    #[validate(length(min = 1, message = "text must not be empty"))]
    pub(crate) text: String,
    #[serde(alias = "subjectId")]
    pub(crate) subject_id: String,
    #[serde(alias = "questionType")]
    pub(crate) question_type: QuestionType,
    #[serde(default = "default_points")]
    #[validate(range(min = 1, message = "points must be positive"))]
    pub(crate) points: i32,
    #[validate(nested)]
    pub(crate) options: Vec<OptionCreate>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionUpdate {
    #[serde(default)]
    #[validate(length(min = 1, message = "text must not be empty"))]
    pub(crate) text: Option<String>,
    #[serde(default)]
    #[serde(alias = "subjectId")]
    pub(crate) subject_id: Option<String>,
    #[serde(default)]
    #[serde(alias = "questionType")]
    pub(crate) question_type: Option<QuestionType>,
    #[serde(default)]
    #[validate(range(min = 1, message = "points must be positive"))]
    pub(crate) points: Option<i32>,
    #[serde(default)]
    #[validate(nested)]
    pub(crate) options: Option<Vec<OptionCreate>>,
}

/// Cross-field option rules that the derive cannot express: every question
/// carries at least two options, at least one marked correct, and a
/// single-choice question has exactly one correct option.
pub(crate) fn validate_options(
    question_type: QuestionType,
    options: &[OptionCreate],
) -> Result<(), &'static str> {
    if options.len() < 2 {
        return Err("A question must have at least 2 options");
    }

    let correct = options.iter().filter(|option| option.is_correct).count();
    if correct == 0 {
        return Err("A question must have at least one correct option");
    }
    if question_type == QuestionType::SingleChoice && correct != 1 {
        return Err("A single-choice question must have exactly one correct option");
    }

    Ok(())
}

#[derive(Debug, Serialize)]
pub(crate) struct OptionResponse {
    pub(crate) id: String,
    pub(crate) text: String,
    pub(crate) is_correct: bool,
    pub(crate) order_index: i32,
}

impl OptionResponse {
    pub(crate) fn from_db(option: QuestionOption) -> Self {
        Self {
            id: option.id,
            text: option.text,
            is_correct: option.is_correct,
            order_index: option.order_index,
        }
    }
}

/// Option as shown to a student taking an exam; never reveals correctness.
#[derive(Debug, Serialize)]
pub(crate) struct TakeOptionResponse {
    pub(crate) id: String,
    pub(crate) text: String,
}

impl TakeOptionResponse {
    pub(crate) fn from_db(option: QuestionOption) -> Self {
        Self { id: option.id, text: option.text }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    pub(crate) id: String,
    pub(crate) text: String,
    pub(crate) subject_id: String,
    pub(crate) question_type: QuestionType,
    pub(crate) points: i32,
    pub(crate) author_id: String,
    pub(crate) options: Vec<OptionResponse>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl QuestionResponse {
    pub(crate) fn from_db(question: Question, options: Vec<QuestionOption>) -> Self {
        Self {
            id: question.id,
            text: question.text,
            subject_id: question.subject_id,
            question_type: question.question_type,
            points: question.points,
            author_id: question.author_id,
            options: options.into_iter().map(OptionResponse::from_db).collect(),
            created_at: format_primitive(question.created_at),
            updated_at: format_primitive(question.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct TakeQuestionResponse {
    pub(crate) id: String,
    pub(crate) text: String,
    pub(crate) question_type: QuestionType,
    pub(crate) points: i32,
    pub(crate) options: Vec<TakeOptionResponse>,
}

fn default_points() -> i32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(text: &str, is_correct: bool) -> OptionCreate {
        OptionCreate { text: text.to_string(), is_correct }
    }

    #[test]
    fn rejects_fewer_than_two_options() {
        let options = vec![option("only", true)];
        assert!(validate_options(QuestionType::SingleChoice, &options).is_err());
    }

    #[test]
    fn rejects_no_correct_option() {
        let options = vec![option("a", false), option("b", false)];
        assert!(validate_options(QuestionType::MultipleChoice, &options).is_err());
    }

    #[test]
    fn single_choice_requires_exactly_one_correct() {
        let options = vec![option("a", true), option("b", true)];
        assert!(validate_options(QuestionType::SingleChoice, &options).is_err());
        assert!(validate_options(QuestionType::MultipleChoice, &options).is_ok());
    }

    #[test]
    fn accepts_well_formed_single_choice() {
        let options = vec![option("a", true), option("b", false)];
        assert!(validate_options(QuestionType::SingleChoice, &options).is_ok());
    }
}
