use async_trait::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::{header, request::Parts};

use crate::api::errors::ApiError;
use crate::core::{security, state::AppState};
use crate::db::models::{Exam, User};
use crate::repositories;

pub(crate) struct CurrentUser(pub(crate) User);
pub(crate) struct CurrentAdmin(pub(crate) User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let State(app_state) = State::<AppState>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to access application state"))?;

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let claims = security::verify_token(token, app_state.settings())
            .map_err(|_| ApiError::Unauthorized("Invalid authentication credentials"))?;

        let user = repositories::users::find_by_id(app_state.db(), &claims.sub)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load user"))?;

        let Some(user) = user else {
            return Err(ApiError::Unauthorized("User not found"));
        };

        if !user.is_active {
            return Err(ApiError::Unauthorized("Invalid authentication credentials"));
        }

        Ok(CurrentUser(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;

        if user.is_admin() {
            Ok(CurrentAdmin(user))
        } else {
            Err(ApiError::Forbidden("Admin access required"))
        }
    }
}

pub(crate) fn require_teacher_or_admin(user: &User) -> Result<(), ApiError> {
    if user.is_teacher() || user.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Teacher access required"))
    }
}

pub(crate) fn require_student(user: &User) -> Result<(), ApiError> {
    if user.is_student() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Student access required"))
    }
}

/// Admins manage any exam; teachers only the ones they created.
pub(crate) fn can_manage_exam(user: &User, exam: &Exam) -> bool {
    user.is_admin() || exam.created_by == user.id
}

/// A submission is readable by its student, by the teacher who created the
/// exam, and by any admin.
pub(crate) fn can_read_submission(user: &User, student_id: &str, exam_created_by: &str) -> bool {
    user.is_admin() || user.id == student_id || (user.is_teacher() && user.id == exam_created_by)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::types::UserRole;
    use crate::test_support;

    fn user(id: &str, role: UserRole) -> User {
        test_support::user_fixture(id, role)
    }

    #[test]
    fn admin_reads_any_submission() {
        let admin = user("admin-1", UserRole::Admin);
        assert!(can_read_submission(&admin, "student-1", "teacher-1"));
    }

    #[test]
    fn student_reads_only_own_submission() {
        let student = user("student-1", UserRole::Student);
        assert!(can_read_submission(&student, "student-1", "teacher-1"));
        assert!(!can_read_submission(&student, "student-2", "teacher-1"));
    }

    #[test]
    fn teacher_reads_submissions_for_own_exams_only() {
        let teacher = user("teacher-1", UserRole::Teacher);
        assert!(can_read_submission(&teacher, "student-1", "teacher-1"));
        assert!(!can_read_submission(&teacher, "student-1", "teacher-2"));
    }

    #[test]
    fn role_gates_reject_students() {
        let student = user("student-1", UserRole::Student);
        assert!(require_teacher_or_admin(&student).is_err());
        assert!(require_student(&student).is_ok());
    }
}
