use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::StudentAnswer;

const ANSWER_COLUMNS: &str = "\
    id, submission_id, question_id, selected_options, is_correct, points_earned";

/// Submission joined with the exam and student rows it refers to.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SubmissionDetails {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) student_id: String,
    pub(crate) start_time: PrimitiveDateTime,
    pub(crate) submit_time: PrimitiveDateTime,
    pub(crate) score: i32,
    pub(crate) total_marks: i32,
    pub(crate) percentage: f64,
    pub(crate) is_passed: bool,
    pub(crate) tab_switches: i32,
    pub(crate) exam_title: String,
    pub(crate) exam_created_by: String,
    pub(crate) student_name: String,
    pub(crate) student_email: String,
}

const DETAIL_QUERY: &str = "\
    SELECT s.id, s.exam_id, s.student_id, s.start_time, s.submit_time,
           s.score, s.total_marks, s.percentage, s.is_passed, s.tab_switches,
           e.title AS exam_title,
           e.created_by AS exam_created_by,
           u.full_name AS student_name,
           u.email AS student_email
    FROM exam_submissions s
    JOIN exams e ON e.id = s.exam_id
    JOIN users u ON u.id = s.student_id";

pub(crate) async fn find_details(
    pool: &PgPool,
    id: &str,
) -> Result<Option<SubmissionDetails>, sqlx::Error> {
    sqlx::query_as::<_, SubmissionDetails>(&format!("{DETAIL_QUERY} WHERE s.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn exists_for_exam_and_student(
    pool: &PgPool,
    exam_id: &str,
    student_id: &str,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT id FROM exam_submissions WHERE exam_id = $1 AND student_id = $2",
    )
    .bind(exam_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_by_student(
    pool: &PgPool,
    student_id: &str,
) -> Result<Vec<SubmissionDetails>, sqlx::Error> {
    sqlx::query_as::<_, SubmissionDetails>(&format!(
        "{DETAIL_QUERY} WHERE s.student_id = $1 ORDER BY s.submit_time DESC"
    ))
    .bind(student_id)
    .fetch_all(pool)
    .await
}

#[derive(Debug, Default)]
pub(crate) struct SubmissionFilter {
    pub exam_id: Option<String>,
    pub student_id: Option<String>,
    pub is_passed: Option<bool>,
    /// Restricts results to exams created by this user. Teachers only see
    /// submissions for their own exams; admins leave it unset.
    pub exam_created_by: Option<String>,
}

pub(crate) async fn list_filtered(
    pool: &PgPool,
    filter: SubmissionFilter,
) -> Result<Vec<SubmissionDetails>, sqlx::Error> {
    let mut builder = sqlx::QueryBuilder::<sqlx::Postgres>::new(DETAIL_QUERY);
    builder.push(" WHERE 1 = 1");

    if let Some(exam_id) = filter.exam_id {
        builder.push(" AND s.exam_id = ").push_bind(exam_id);
    }
    if let Some(student_id) = filter.student_id {
        builder.push(" AND s.student_id = ").push_bind(student_id);
    }
    if let Some(is_passed) = filter.is_passed {
        builder.push(" AND s.is_passed = ").push_bind(is_passed);
    }
    if let Some(created_by) = filter.exam_created_by {
        builder.push(" AND e.created_by = ").push_bind(created_by);
    }

    builder.push(" ORDER BY s.submit_time DESC");
    builder.build_query_as::<SubmissionDetails>().fetch_all(pool).await
}

pub(crate) struct CreateSubmission<'a> {
    pub id: &'a str,
    pub exam_id: &'a str,
    pub student_id: &'a str,
    pub start_time: PrimitiveDateTime,
    pub submit_time: PrimitiveDateTime,
    pub tab_switches: i32,
}

/// Plain insert; a unique violation on (exam_id, student_id) means another
/// request for the same student won the race, and the caller reports the
/// duplicate-submission error.
pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateSubmission<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO exam_submissions (
            id, exam_id, student_id, start_time, submit_time,
            score, total_marks, percentage, is_passed, tab_switches
        ) VALUES ($1,$2,$3,$4,$5,0,0,0,FALSE,$6)",
    )
    .bind(params.id)
    .bind(params.exam_id)
    .bind(params.student_id)
    .bind(params.start_time)
    .bind(params.submit_time)
    .bind(params.tab_switches)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) struct InsertAnswer<'a> {
    pub id: &'a str,
    pub submission_id: &'a str,
    pub question_id: &'a str,
    pub selected_options: Vec<String>,
    pub is_correct: bool,
    pub points_earned: i32,
}

pub(crate) async fn insert_answer(
    executor: impl sqlx::PgExecutor<'_>,
    params: InsertAnswer<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO student_answers (
            id, submission_id, question_id, selected_options, is_correct, points_earned
        ) VALUES ($1,$2,$3,$4,$5,$6)",
    )
    .bind(params.id)
    .bind(params.submission_id)
    .bind(params.question_id)
    .bind(Json(params.selected_options))
    .bind(params.is_correct)
    .bind(params.points_earned)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn update_score(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    score: i32,
    total_marks: i32,
    percentage: f64,
    is_passed: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE exam_submissions
         SET score = $1, total_marks = $2, percentage = $3, is_passed = $4
         WHERE id = $5",
    )
    .bind(score)
    .bind(total_marks)
    .bind(percentage)
    .bind(is_passed)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn list_answers(
    pool: &PgPool,
    submission_id: &str,
) -> Result<Vec<StudentAnswer>, sqlx::Error> {
    sqlx::query_as::<_, StudentAnswer>(&format!(
        "SELECT {ANSWER_COLUMNS} FROM student_answers WHERE submission_id = $1 ORDER BY question_id"
    ))
    .bind(submission_id)
    .fetch_all(pool)
    .await
}
