use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{can_manage_exam, require_student, require_teacher_or_admin, CurrentUser};
use crate::core::state::AppState;
use crate::core::time::{primitive_now_utc, to_primitive_utc};
use crate::db::models::{Exam, User};
use crate::repositories;
use crate::schemas::exam::{
    format_primitive, ExamCreate, ExamQuestionsUpdate, ExamResponse, ExamUpdate, TakeExamResponse,
};
use crate::schemas::question::{QuestionResponse, TakeOptionResponse, TakeQuestionResponse};
use crate::services::grading;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_exams).post(create_exam))
        .route("/available", get(available_exams))
        .route("/:exam_id", get(get_exam).put(update_exam).delete(delete_exam))
        .route("/:exam_id/publish", post(publish_exam))
        .route("/:exam_id/unpublish", post(unpublish_exam))
        .route("/:exam_id/questions", put(set_exam_questions).get(list_exam_questions))
        .route("/take/:exam_id", get(take_exam))
}

async fn list_exams(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<ExamResponse>>, ApiError> {
    let exams = if user.is_admin() {
        repositories::exams::list_all(state.db()).await
    } else if user.is_teacher() {
        repositories::exams::list_by_creator(state.db(), &user.id).await
    } else {
        repositories::exams::list_published(state.db()).await
    }
    .map_err(|e| ApiError::internal(e, "Failed to list exams"))?;

    Ok(Json(exams.into_iter().map(ExamResponse::from_db).collect()))
}

async fn available_exams(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<ExamResponse>>, ApiError> {
    require_student(&user)?;

    let exams = repositories::exams::list_published(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list exams"))?;

    Ok(Json(exams.into_iter().map(ExamResponse::from_db).collect()))
}

async fn create_exam(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<ExamCreate>,
) -> Result<(StatusCode, Json<ExamResponse>), ApiError> {
    require_teacher_or_admin(&user)?;
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let start_time = to_primitive_utc(payload.start_time);
    let end_time = to_primitive_utc(payload.end_time);
    if end_time <= start_time {
        return Err(ApiError::BadRequest("end_time must be after start_time".to_string()));
    }

    if !payload.question_ids.is_empty() {
        ensure_questions_exist(&state, &payload.question_ids).await?;
    }

    let now = primitive_now_utc();
    let exam_id = Uuid::new_v4().to_string();

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    repositories::exams::create(
        &mut *tx,
        repositories::exams::CreateExam {
            id: &exam_id,
            title: &payload.title,
            description: &payload.description,
            duration_minutes: payload.duration_minutes,
            pass_percentage: payload.pass_percentage,
            start_time,
            end_time,
            created_by: &user.id,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create exam"))?;

    if !payload.question_ids.is_empty() {
        let question_ids = dedupe(&payload.question_ids);
        repositories::exams::replace_questions(&mut tx, &exam_id, &question_ids, now)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to attach exam questions"))?;
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit exam"))?;

    let exam = repositories::exams::fetch_one_by_id(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to reload exam"))?;

    tracing::info!(exam_id = %exam.id, created_by = %user.id, "Exam created");

    Ok((StatusCode::CREATED, Json(ExamResponse::from_db(exam))))
}

async fn get_exam(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(exam_id): Path<String>,
) -> Result<Json<ExamResponse>, ApiError> {
    let exam = load_exam(&state, &exam_id).await?;

    // Students only ever see published exams.
    if user.is_student() && !exam.is_published {
        return Err(ApiError::NotFound("Exam not found".to_string()));
    }
    if user.is_teacher() && !can_manage_exam(&user, &exam) {
        return Err(ApiError::Forbidden("Not the creator of this exam"));
    }

    Ok(Json(ExamResponse::from_db(exam)))
}

async fn update_exam(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(exam_id): Path<String>,
    Json(payload): Json<ExamUpdate>,
) -> Result<Json<ExamResponse>, ApiError> {
    require_teacher_or_admin(&user)?;
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let exam = load_exam(&state, &exam_id).await?;
    if !can_manage_exam(&user, &exam) {
        return Err(ApiError::Forbidden("Not the creator of this exam"));
    }

    let start_time = payload.start_time.map(to_primitive_utc).unwrap_or(exam.start_time);
    let end_time = payload.end_time.map(to_primitive_utc).unwrap_or(exam.end_time);
    if end_time <= start_time {
        return Err(ApiError::BadRequest("end_time must be after start_time".to_string()));
    }

    let now = primitive_now_utc();

    repositories::exams::update(
        state.db(),
        &exam_id,
        repositories::exams::UpdateExam {
            title: payload.title,
            description: payload.description,
            duration_minutes: payload.duration_minutes,
            pass_percentage: payload.pass_percentage,
            start_time: payload.start_time.map(to_primitive_utc),
            end_time: payload.end_time.map(to_primitive_utc),
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update exam"))?;

    // The question set is replaced wholesale when supplied.
    if let Some(question_ids) = &payload.question_ids {
        let question_ids = dedupe(question_ids);
        if !question_ids.is_empty() {
            ensure_questions_exist(&state, &question_ids).await?;
        }

        let mut tx = state
            .db()
            .begin()
            .await
            .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;
        repositories::exams::replace_questions(&mut tx, &exam_id, &question_ids, now)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to replace exam questions"))?;
        tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit exam questions"))?;
    }

    let updated = repositories::exams::fetch_one_by_id(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to reload exam"))?;

    Ok(Json(ExamResponse::from_db(updated)))
}

async fn delete_exam(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(exam_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    require_teacher_or_admin(&user)?;

    let exam = load_exam(&state, &exam_id).await?;
    if !can_manage_exam(&user, &exam) {
        return Err(ApiError::Forbidden("Not the creator of this exam"));
    }

    repositories::exams::delete(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete exam"))?;

    Ok(StatusCode::NO_CONTENT)
}

async fn publish_exam(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(exam_id): Path<String>,
) -> Result<Json<ExamResponse>, ApiError> {
    set_publish_state(state, user, exam_id, true).await
}

async fn unpublish_exam(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(exam_id): Path<String>,
) -> Result<Json<ExamResponse>, ApiError> {
    set_publish_state(state, user, exam_id, false).await
}

async fn set_publish_state(
    state: AppState,
    user: User,
    exam_id: String,
    is_published: bool,
) -> Result<Json<ExamResponse>, ApiError> {
    require_teacher_or_admin(&user)?;

    let exam = load_exam(&state, &exam_id).await?;
    if !can_manage_exam(&user, &exam) {
        return Err(ApiError::Forbidden("Not the creator of this exam"));
    }

    repositories::exams::set_published(state.db(), &exam_id, is_published, primitive_now_utc())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to change exam publication"))?;

    let updated = repositories::exams::fetch_one_by_id(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to reload exam"))?;

    tracing::info!(exam_id = %exam_id, is_published, "Exam publication changed");

    Ok(Json(ExamResponse::from_db(updated)))
}

async fn set_exam_questions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(exam_id): Path<String>,
    Json(payload): Json<ExamQuestionsUpdate>,
) -> Result<Json<ExamResponse>, ApiError> {
    require_teacher_or_admin(&user)?;

    let exam = load_exam(&state, &exam_id).await?;
    if !can_manage_exam(&user, &exam) {
        return Err(ApiError::Forbidden("Not the creator of this exam"));
    }

    let question_ids = dedupe(&payload.question_ids);
    if !question_ids.is_empty() {
        ensure_questions_exist(&state, &question_ids).await?;
    }

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    repositories::exams::replace_questions(&mut tx, &exam_id, &question_ids, primitive_now_utc())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to replace exam questions"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit exam questions"))?;

    let updated = repositories::exams::fetch_one_by_id(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to reload exam"))?;

    Ok(Json(ExamResponse::from_db(updated)))
}

async fn list_exam_questions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(exam_id): Path<String>,
) -> Result<Json<Vec<QuestionResponse>>, ApiError> {
    require_teacher_or_admin(&user)?;

    let exam = load_exam(&state, &exam_id).await?;
    if !can_manage_exam(&user, &exam) {
        return Err(ApiError::Forbidden("Not the creator of this exam"));
    }

    let questions = repositories::exams::list_questions(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load exam questions"))?;

    let question_ids: Vec<String> = questions.iter().map(|question| question.id.clone()).collect();
    let mut options =
        repositories::questions::list_options_for_questions(state.db(), &question_ids)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load question options"))?;

    let mut responses = Vec::with_capacity(questions.len());
    for question in questions {
        let (own, rest): (Vec<_>, Vec<_>) =
            options.into_iter().partition(|option| option.question_id == question.id);
        options = rest;
        responses.push(QuestionResponse::from_db(question, own));
    }

    Ok(Json(responses))
}

async fn take_exam(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(exam_id): Path<String>,
) -> Result<Json<TakeExamResponse>, ApiError> {
    require_student(&user)?;

    let exam = repositories::exams::find_published_by_id(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))?;

    let already = repositories::submissions::exists_for_exam_and_student(
        state.db(),
        &exam_id,
        &user.id,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to check existing submission"))?;
    if already.is_some() {
        return Err(ApiError::BadRequest("You have already submitted this exam".to_string()));
    }

    if !grading::is_within_window(exam.start_time, exam.end_time, primitive_now_utc()) {
        return Err(ApiError::BadRequest("Exam is no longer available".to_string()));
    }

    let questions = repositories::exams::list_questions(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load exam questions"))?;

    let question_ids: Vec<String> = questions.iter().map(|question| question.id.clone()).collect();
    let mut options =
        repositories::questions::list_options_for_questions(state.db(), &question_ids)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load question options"))?;

    let mut take_questions = Vec::with_capacity(questions.len());
    for question in questions {
        let (own, rest): (Vec<_>, Vec<_>) =
            options.into_iter().partition(|option| option.question_id == question.id);
        options = rest;
        take_questions.push(TakeQuestionResponse {
            id: question.id,
            text: question.text,
            question_type: question.question_type,
            points: question.points,
            options: own.into_iter().map(TakeOptionResponse::from_db).collect(),
        });
    }

    Ok(Json(TakeExamResponse {
        id: exam.id,
        title: exam.title,
        description: exam.description,
        duration_minutes: exam.duration_minutes,
        total_marks: exam.total_marks,
        pass_percentage: exam.pass_percentage,
        start_time: format_primitive(exam.start_time),
        end_time: format_primitive(exam.end_time),
        questions: take_questions,
    }))
}

async fn load_exam(state: &AppState, exam_id: &str) -> Result<Exam, ApiError> {
    repositories::exams::find_by_id(state.db(), exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))
}

async fn ensure_questions_exist(state: &AppState, question_ids: &[String]) -> Result<(), ApiError> {
    let question_ids = dedupe(question_ids);
    let missing = repositories::exams::count_missing_questions(state.db(), &question_ids)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check exam questions"))?;
    if missing > 0 {
        return Err(ApiError::BadRequest("One or more questions do not exist".to_string()));
    }
    Ok(())
}

fn dedupe(question_ids: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    question_ids.iter().filter(|id| seen.insert(id.as_str())).cloned().collect()
}
