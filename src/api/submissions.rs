use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::{can_read_submission, require_student, CurrentUser};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::schemas::submission::{
    AnswerResponse, SubmissionDetailResponse, SubmissionResponse, SubmitExamRequest,
    SubmitExamResponse,
};
use crate::services::grading;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_submissions))
        .route("/submit", post(submit_exam))
        .route("/my-results", get(my_submissions))
        .route("/result/:submission_id", get(get_submission))
}

/// Grades and stores a student's answer sheet in one transaction.
///
/// Answer entries that do not resolve to a question on the exam are skipped,
/// and the denominator for the percentage is the sum of points over the
/// answers that were graded.
async fn submit_exam(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<SubmitExamRequest>,
) -> Result<(StatusCode, Json<SubmitExamResponse>), ApiError> {
    require_student(&user)?;

    let exam = repositories::exams::find_published_by_id(state.db(), &payload.exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))?;

    let existing = repositories::submissions::exists_for_exam_and_student(
        state.db(),
        &exam.id,
        &user.id,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to check existing submission"))?;
    if existing.is_some() {
        return Err(ApiError::BadRequest("You have already submitted this exam".to_string()));
    }

    let now = primitive_now_utc();
    if !grading::is_within_window(exam.start_time, exam.end_time, now) {
        return Err(ApiError::BadRequest("Exam is no longer available".to_string()));
    }

    let questions = repositories::exams::list_questions(state.db(), &exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load exam questions"))?;
    let question_ids: Vec<String> = questions.iter().map(|question| question.id.clone()).collect();
    let options = repositories::questions::list_options_for_questions(state.db(), &question_ids)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load question options"))?;

    let mut correct_texts: HashMap<&str, Vec<String>> = HashMap::new();
    for option in &options {
        if option.is_correct {
            correct_texts.entry(option.question_id.as_str()).or_default().push(option.text.clone());
        }
    }
    let questions_by_id: HashMap<&str, &crate::db::models::Question> =
        questions.iter().map(|question| (question.id.as_str(), question)).collect();

    let submission_id = Uuid::new_v4().to_string();
    // The actual take start is not tracked; approximate it from the exam
    // duration, never before the exam opened.
    let start_time =
        (now - time::Duration::minutes(exam.duration_minutes as i64)).max(exam.start_time);

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    if let Err(err) = repositories::submissions::create(
        &mut *tx,
        repositories::submissions::CreateSubmission {
            id: &submission_id,
            exam_id: &exam.id,
            student_id: &user.id,
            start_time,
            submit_time: now,
            tab_switches: payload.tab_switches.max(0),
        },
    )
    .await
    {
        // Race loser on the (exam, student) unique constraint.
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return Err(ApiError::BadRequest(
                    "You have already submitted this exam".to_string(),
                ));
            }
        }
        return Err(ApiError::internal(err, "Failed to create submission"));
    }

    let mut graded = Vec::new();
    for (question_id, selected) in &payload.answers {
        // Unknown ids and questions not on this exam are silently skipped.
        let Some(question) = questions_by_id.get(question_id.as_str()) else {
            tracing::debug!(question_id = %question_id, "Skipping answer for unknown question");
            continue;
        };

        let empty = Vec::new();
        let correct = correct_texts.get(question_id.as_str()).unwrap_or(&empty);
        let answer = grading::grade_answer(question.question_type, question.points, correct, selected);

        repositories::submissions::insert_answer(
            &mut *tx,
            repositories::submissions::InsertAnswer {
                id: &Uuid::new_v4().to_string(),
                submission_id: &submission_id,
                question_id,
                selected_options: selected.clone(),
                is_correct: answer.is_correct,
                points_earned: answer.points_earned,
            },
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to store answer"))?;

        graded.push((question.points, answer));
    }

    let summary = grading::aggregate(&graded, exam.pass_percentage);

    repositories::submissions::update_score(
        &mut *tx,
        &submission_id,
        summary.score,
        summary.total_marks,
        summary.percentage,
        summary.is_passed,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to store submission score"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit submission"))?;

    tracing::info!(
        submission_id = %submission_id,
        exam_id = %exam.id,
        student_id = %user.id,
        score = summary.score,
        is_passed = summary.is_passed,
        "Exam submission graded"
    );
    metrics::counter!("exam_submissions_total").increment(1);

    Ok((
        StatusCode::CREATED,
        Json(SubmitExamResponse {
            submission_id,
            score: summary.score,
            total_marks: summary.total_marks,
            percentage: summary.percentage,
            is_passed: summary.is_passed,
            message: "Exam submitted successfully",
        }),
    ))
}

#[derive(Debug, Deserialize)]
struct SubmissionListParams {
    #[serde(default)]
    exam: Option<String>,
    #[serde(default)]
    student: Option<String>,
    #[serde(default)]
    is_passed: Option<bool>,
}

async fn list_submissions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<SubmissionListParams>,
) -> Result<Json<Vec<SubmissionResponse>>, ApiError> {
    if user.is_student() {
        return Err(ApiError::Forbidden("Teacher access required"));
    }

    let filter = repositories::submissions::SubmissionFilter {
        exam_id: params.exam,
        student_id: params.student,
        is_passed: params.is_passed,
        exam_created_by: user.is_teacher().then(|| user.id.clone()),
    };

    let submissions = repositories::submissions::list_filtered(state.db(), filter)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list submissions"))?;

    Ok(Json(submissions.into_iter().map(SubmissionResponse::from_db).collect()))
}

async fn my_submissions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<SubmissionResponse>>, ApiError> {
    require_student(&user)?;

    let submissions = repositories::submissions::list_by_student(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list submissions"))?;

    Ok(Json(submissions.into_iter().map(SubmissionResponse::from_db).collect()))
}

async fn get_submission(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(submission_id): Path<String>,
) -> Result<Json<SubmissionDetailResponse>, ApiError> {
    let details = repositories::submissions::find_details(state.db(), &submission_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load submission"))?
        .ok_or_else(|| ApiError::NotFound("Submission not found".to_string()))?;

    if !can_read_submission(&user, &details.student_id, &details.exam_created_by) {
        return Err(ApiError::Forbidden("Not allowed to view this submission"));
    }

    let answers = repositories::submissions::list_answers(state.db(), &submission_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load submission answers"))?;

    Ok(Json(SubmissionDetailResponse {
        submission: SubmissionResponse::from_db(details),
        answers: answers.into_iter().map(AnswerResponse::from_db).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::db::types::{QuestionType, UserRole};
    use crate::test_support;

    #[tokio::test]
    async fn submit_grades_and_persists_answer_sheet() {
        let ctx = test_support::setup_test_context().await;

        let teacher = test_support::insert_user(
            ctx.state.db(),
            "teacher@example.com",
            "Teacher User",
            UserRole::Teacher,
            "teacher-pass",
        )
        .await;
        let student = test_support::insert_user(
            ctx.state.db(),
            "student@example.com",
            "Student User",
            UserRole::Student,
            "student-pass",
        )
        .await;

        let subject = test_support::insert_subject(ctx.state.db(), "Mathematics").await;
        let addition = test_support::insert_question(
            ctx.state.db(),
            "What is 2 + 2?",
            &subject.id,
            &teacher.id,
            QuestionType::SingleChoice,
            1,
            &[("3", false), ("4", true)],
        )
        .await;
        let division = test_support::insert_question(
            ctx.state.db(),
            "What is 10 / 2?",
            &subject.id,
            &teacher.id,
            QuestionType::SingleChoice,
            1,
            &[("5", true), ("4", false)],
        )
        .await;

        let exam = test_support::insert_published_exam(
            ctx.state.db(),
            "Midterm",
            60,
            &teacher.id,
            &[addition.id.clone(), division.id.clone()],
        )
        .await;

        let mut answers = serde_json::Map::new();
        answers.insert(addition.id.clone(), json!(["4"]));
        answers.insert(division.id.clone(), json!(["4"]));

        let token = test_support::bearer_token(&student.id, ctx.state.settings());
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/v1/submissions/submit",
                Some(&token),
                Some(json!({
                    "exam_id": exam.id,
                    "answers": answers,
                    "tab_switches": 1,
                })),
            ))
            .await
            .expect("submit exam");
        let status = response.status();
        let body = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::CREATED, "response: {body}");
        assert_eq!(body["score"], 1);
        assert_eq!(body["total_marks"], 2);
        assert_eq!(body["percentage"], 50.0);
        assert_eq!(body["is_passed"], false);
        assert_eq!(body["message"], "Exam submitted successfully");

        let submission_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM exam_submissions")
            .fetch_one(ctx.state.db())
            .await
            .expect("count submissions");
        assert_eq!(submission_count, 1);
        let answer_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM student_answers")
            .fetch_one(ctx.state.db())
            .await
            .expect("count answers");
        assert_eq!(answer_count, 2);

        let submission_id = body["submission_id"].as_str().expect("submission id").to_string();
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                &format!("/api/v1/submissions/result/{submission_id}"),
                Some(&token),
                None,
            ))
            .await
            .expect("fetch result");
        let status = response.status();
        let body = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::OK, "response: {body}");
        assert_eq!(body["score"], 1);
        assert_eq!(body["total_marks"], 2);
        assert_eq!(body["is_passed"], false);

        // Answers come back ordered by question id.
        let mut expected = vec![addition.id.clone(), division.id.clone()];
        expected.sort();
        let returned: Vec<String> = body["answers"]
            .as_array()
            .expect("answers array")
            .iter()
            .map(|answer| answer["question_id"].as_str().expect("question id").to_string())
            .collect();
        assert_eq!(returned, expected);
    }

    #[tokio::test]
    async fn repeat_submit_is_rejected_without_new_rows() {
        let ctx = test_support::setup_test_context().await;

        let teacher = test_support::insert_user(
            ctx.state.db(),
            "teacher@example.com",
            "Teacher User",
            UserRole::Teacher,
            "teacher-pass",
        )
        .await;
        let student = test_support::insert_user(
            ctx.state.db(),
            "student@example.com",
            "Student User",
            UserRole::Student,
            "student-pass",
        )
        .await;

        let subject = test_support::insert_subject(ctx.state.db(), "Chemistry").await;
        let question = test_support::insert_question(
            ctx.state.db(),
            "Chemical formula of water?",
            &subject.id,
            &teacher.id,
            QuestionType::SingleChoice,
            1,
            &[("H2O", true), ("CO2", false)],
        )
        .await;
        let exam = test_support::insert_published_exam(
            ctx.state.db(),
            "Quiz",
            60,
            &teacher.id,
            &[question.id.clone()],
        )
        .await;

        let mut answers = serde_json::Map::new();
        answers.insert(question.id.clone(), json!(["H2O"]));

        let token = test_support::bearer_token(&student.id, ctx.state.settings());
        let submit_request = || {
            test_support::json_request(
                Method::POST,
                "/api/v1/submissions/submit",
                Some(&token),
                Some(json!({"exam_id": exam.id, "answers": answers})),
            )
        };

        let response =
            ctx.app.clone().oneshot(submit_request()).await.expect("submit exam");
        let status = response.status();
        let body = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::CREATED, "response: {body}");
        assert_eq!(body["is_passed"], true);

        let response =
            ctx.app.clone().oneshot(submit_request()).await.expect("repeat submit");
        let status = response.status();
        let body = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
        assert_eq!(body["error"], "You have already submitted this exam");

        let submission_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM exam_submissions")
            .fetch_one(ctx.state.db())
            .await
            .expect("count submissions");
        assert_eq!(submission_count, 1);
        let answer_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM student_answers")
            .fetch_one(ctx.state.db())
            .await
            .expect("count answers");
        assert_eq!(answer_count, 1);
    }
}
