use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub(crate) use crate::core::time::format_primitive;
use crate::db::models::StudentAnswer;
use crate::repositories::submissions::SubmissionDetails;

/// Answers are keyed by question id; each value is the list of selected
/// option texts. Entries that do not resolve to a question on the exam are
/// skipped during grading rather than rejected.
#[derive(Debug, Deserialize)]
pub(crate) struct SubmitExamRequest {
    #[serde(alias = "examId")]
    pub(crate) exam_id: String,
    #[serde(default)]
    pub(crate) answers: HashMap<String, Vec<String>>,
    #[serde(default)]
    #[serde(alias = "tabSwitches")]
    pub(crate) tab_switches: i32,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionResponse {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) exam_title: String,
    pub(crate) student_id: String,
    pub(crate) student_name: String,
    pub(crate) student_email: String,
    pub(crate) start_time: String,
    pub(crate) submit_time: String,
    pub(crate) score: i32,
    pub(crate) total_marks: i32,
    pub(crate) percentage: f64,
    pub(crate) is_passed: bool,
    pub(crate) tab_switches: i32,
}

impl SubmissionResponse {
    pub(crate) fn from_db(details: SubmissionDetails) -> Self {
        Self {
            id: details.id,
            exam_id: details.exam_id,
            exam_title: details.exam_title,
            student_id: details.student_id,
            student_name: details.student_name,
            student_email: details.student_email,
            start_time: format_primitive(details.start_time),
            submit_time: format_primitive(details.submit_time),
            score: details.score,
            total_marks: details.total_marks,
            percentage: details.percentage,
            is_passed: details.is_passed,
            tab_switches: details.tab_switches,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerResponse {
    pub(crate) question_id: String,
    pub(crate) selected_options: Vec<String>,
    pub(crate) is_correct: bool,
    pub(crate) points_earned: i32,
}

impl AnswerResponse {
    pub(crate) fn from_db(answer: StudentAnswer) -> Self {
        Self {
            question_id: answer.question_id,
            selected_options: answer.selected_options.0,
            is_correct: answer.is_correct,
            points_earned: answer.points_earned,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionDetailResponse {
    #[serde(flatten)]
    pub(crate) submission: SubmissionResponse,
    pub(crate) answers: Vec<AnswerResponse>,
}

/// Returned immediately after grading so the student sees their result.
#[derive(Debug, Serialize)]
pub(crate) struct SubmitExamResponse {
    pub(crate) submission_id: String,
    pub(crate) score: i32,
    pub(crate) total_marks: i32,
    pub(crate) percentage: f64,
    pub(crate) is_passed: bool,
    pub(crate) message: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_request_parses_answer_map() {
        let raw = r#"{
            "exam_id": "exam-1",
            "answers": {"q-1": ["4"], "q-2": ["H2O", "CO2"]},
            "tab_switches": 3
        }"#;
        let parsed: SubmitExamRequest = serde_json::from_str(raw).unwrap();

        assert_eq!(parsed.exam_id, "exam-1");
        assert_eq!(parsed.answers["q-1"], vec!["4".to_string()]);
        assert_eq!(parsed.answers["q-2"].len(), 2);
        assert_eq!(parsed.tab_switches, 3);
    }

    #[test]
    fn submit_request_defaults_missing_fields() {
        let parsed: SubmitExamRequest =
            serde_json::from_str(r#"{"examId": "exam-1"}"#).unwrap();

        assert_eq!(parsed.exam_id, "exam-1");
        assert!(parsed.answers.is_empty());
        assert_eq!(parsed.tab_switches, 0);
    }
}
