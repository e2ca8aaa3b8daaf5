use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{require_teacher_or_admin, CurrentUser};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::schemas::subject::{SubjectCreate, SubjectResponse, SubjectUpdate};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_subjects).post(create_subject))
        .route("/:subject_id", get(get_subject).put(update_subject).delete(delete_subject))
}

async fn list_subjects(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
) -> Result<Json<Vec<SubjectResponse>>, ApiError> {
    let subjects = repositories::subjects::list_all(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list subjects"))?;

    Ok(Json(subjects.into_iter().map(SubjectResponse::from_db).collect()))
}

async fn create_subject(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<SubjectCreate>,
) -> Result<(StatusCode, Json<SubjectResponse>), ApiError> {
    require_teacher_or_admin(&user)?;
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let existing = repositories::subjects::exists_by_name(state.db(), &payload.name)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check existing subject"))?;
    if existing.is_some() {
        return Err(ApiError::Conflict("A subject with this name already exists".to_string()));
    }

    let subject = repositories::subjects::create(
        state.db(),
        &Uuid::new_v4().to_string(),
        &payload.name,
        &payload.description,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create subject"))?;

    Ok((
        StatusCode::CREATED,
        Json(SubjectResponse {
            id: subject.id,
            name: subject.name,
            description: subject.description,
            questions_count: 0,
            created_at: crate::core::time::format_primitive(subject.created_at),
        }),
    ))
}

async fn get_subject(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(subject_id): Path<String>,
) -> Result<Json<SubjectResponse>, ApiError> {
    let subject = repositories::subjects::find_with_count(state.db(), &subject_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load subject"))?
        .ok_or_else(|| ApiError::NotFound("Subject not found".to_string()))?;

    Ok(Json(SubjectResponse::from_db(subject)))
}

async fn update_subject(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(subject_id): Path<String>,
    Json(payload): Json<SubjectUpdate>,
) -> Result<StatusCode, ApiError> {
    require_teacher_or_admin(&user)?;
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let existing = repositories::subjects::find_by_id(state.db(), &subject_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load subject"))?;
    if existing.is_none() {
        return Err(ApiError::NotFound("Subject not found".to_string()));
    }

    if let Some(name) = &payload.name {
        let taken = repositories::subjects::exists_by_name(state.db(), name)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to check existing subject"))?;
        if taken.is_some_and(|id| id != subject_id) {
            return Err(ApiError::Conflict(
                "A subject with this name already exists".to_string(),
            ));
        }
    }

    repositories::subjects::update(state.db(), &subject_id, payload.name, payload.description)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to update subject"))?;

    Ok(StatusCode::NO_CONTENT)
}

async fn delete_subject(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(subject_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    require_teacher_or_admin(&user)?;

    let deleted = repositories::subjects::delete(state.db(), &subject_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete subject"))?;
    if deleted == 0 {
        return Err(ApiError::NotFound("Subject not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
