use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{require_teacher_or_admin, CurrentUser};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::User;
use crate::db::types::QuestionType;
use crate::repositories;
use crate::schemas::question::{
    validate_options, OptionCreate, QuestionCreate, QuestionResponse, QuestionUpdate,
};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .nest("/subjects", crate::api::subjects::router())
        .route("/", get(list_questions).post(create_question))
        .route("/:question_id", get(get_question).put(update_question).delete(delete_question))
}

#[derive(Debug, Deserialize)]
struct QuestionListParams {
    #[serde(default)]
    subject: Option<String>,
    #[serde(default, rename = "type")]
    question_type: Option<QuestionType>,
    #[serde(default)]
    author: Option<String>,
}

fn can_manage_question(user: &User, author_id: &str) -> bool {
    user.is_admin() || user.id == author_id
}

async fn list_questions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<QuestionListParams>,
) -> Result<Json<Vec<QuestionResponse>>, ApiError> {
    require_teacher_or_admin(&user)?;

    let filter = repositories::questions::QuestionFilter {
        subject_id: params.subject,
        question_type: params.question_type,
        author_id: params.author,
    };
    let questions = repositories::questions::list(state.db(), filter)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list questions"))?;

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

async fn create_question(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<QuestionCreate>,
) -> Result<(StatusCode, Json<QuestionResponse>), ApiError> {
    require_teacher_or_admin(&user)?;
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    validate_options(payload.question_type, &payload.options)
        .map_err(|message| ApiError::BadRequest(message.to_string()))?;

    let subject = repositories::subjects::find_by_id(state.db(), &payload.subject_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load subject"))?;
    if subject.is_none() {
        return Err(ApiError::BadRequest("Subject not found".to_string()));
    }

    let now = primitive_now_utc();
    let question_id = Uuid::new_v4().to_string();

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let question = repositories::questions::create(
        &mut *tx,
        repositories::questions::CreateQuestion {
            id: &question_id,
            text: &payload.text,
            subject_id: &payload.subject_id,
            question_type: payload.question_type,
            points: payload.points,
            author_id: &user.id,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create question"))?;

    insert_options(&mut tx, &question_id, &payload.options).await?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit question"))?;

    let options = repositories::questions::list_options(state.db(), &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load question options"))?;

    Ok((StatusCode::CREATED, Json(QuestionResponse::from_db(question, options))))
}

async fn get_question(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(question_id): Path<String>,
) -> Result<Json<QuestionResponse>, ApiError> {
    require_teacher_or_admin(&user)?;

    let question = repositories::questions::find_by_id(state.db(), &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load question"))?
        .ok_or_else(|| ApiError::NotFound("Question not found".to_string()))?;

    let options = repositories::questions::list_options(state.db(), &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load question options"))?;

    Ok(Json(QuestionResponse::from_db(question, options)))
}

async fn update_question(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(question_id): Path<String>,
    Json(payload): Json<QuestionUpdate>,
) -> Result<Json<QuestionResponse>, ApiError> {
    require_teacher_or_admin(&user)?;
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let question = repositories::questions::find_by_id(state.db(), &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load question"))?
        .ok_or_else(|| ApiError::NotFound("Question not found".to_string()))?;

    if !can_manage_question(&user, &question.author_id) {
        return Err(ApiError::Forbidden("Not the author of this question"));
    }

    let question_type = payload.question_type.unwrap_or(question.question_type);
    if let Some(options) = &payload.options {
        validate_options(question_type, options)
            .map_err(|message| ApiError::BadRequest(message.to_string()))?;
    }

    if let Some(subject_id) = &payload.subject_id {
        let subject = repositories::subjects::find_by_id(state.db(), subject_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load subject"))?;
        if subject.is_none() {
            return Err(ApiError::BadRequest("Subject not found".to_string()));
        }
    }

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    repositories::questions::update(
        &mut *tx,
        &question_id,
        repositories::questions::UpdateQuestion {
            text: payload.text,
            subject_id: payload.subject_id,
            question_type: payload.question_type,
            points: payload.points,
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update question"))?;

    // Options are replaced wholesale when supplied.
    if let Some(options) = &payload.options {
        repositories::questions::delete_options(&mut *tx, &question_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to clear question options"))?;
        insert_options(&mut tx, &question_id, options).await?;
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit question"))?;

    let updated = repositories::questions::fetch_one_by_id(state.db(), &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to reload question"))?;
    let options = repositories::questions::list_options(state.db(), &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load question options"))?;

    Ok(Json(QuestionResponse::from_db(updated, options)))
}

async fn delete_question(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(question_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    require_teacher_or_admin(&user)?;

    let question = repositories::questions::find_by_id(state.db(), &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load question"))?
        .ok_or_else(|| ApiError::NotFound("Question not found".to_string()))?;

    if !can_manage_question(&user, &question.author_id) {
        return Err(ApiError::Forbidden("Not the author of this question"));
    }

    repositories::questions::delete(state.db(), &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete question"))?;

    Ok(StatusCode::NO_CONTENT)
}

async fn insert_options(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    question_id: &str,
    options: &[OptionCreate],
) -> Result<(), ApiError> {
    for (index, option) in options.iter().enumerate() {
        repositories::questions::insert_option(
            &mut **tx,
            repositories::questions::InsertOption {
                id: &Uuid::new_v4().to_string(),
                question_id,
                text: &option.text,
                is_correct: option.is_correct,
                order_index: index as i32,
            },
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to insert question option"))?;
    }
    Ok(())
}
