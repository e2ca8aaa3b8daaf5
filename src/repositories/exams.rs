use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::{Exam, Question};

const COLUMNS: &str = "\
    id, title, description, duration_minutes, total_marks, pass_percentage, \
    start_time, end_time, is_published, created_by, created_at, updated_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {COLUMNS} FROM exams WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_published_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "SELECT {COLUMNS} FROM exams WHERE id = $1 AND is_published = TRUE"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_all(pool: &PgPool) -> Result<Vec<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {COLUMNS} FROM exams ORDER BY created_at DESC"))
        .fetch_all(pool)
        .await
}

pub(crate) async fn list_by_creator(
    pool: &PgPool,
    created_by: &str,
) -> Result<Vec<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "SELECT {COLUMNS} FROM exams WHERE created_by = $1 ORDER BY created_at DESC"
    ))
    .bind(created_by)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_published(pool: &PgPool) -> Result<Vec<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "SELECT {COLUMNS} FROM exams WHERE is_published = TRUE ORDER BY start_time"
    ))
    .fetch_all(pool)
    .await
}

pub(crate) struct CreateExam<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub duration_minutes: i32,
    pub pass_percentage: i32,
    pub start_time: PrimitiveDateTime,
    pub end_time: PrimitiveDateTime,
    pub created_by: &'a str,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateExam<'_>,
) -> Result<Exam, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "INSERT INTO exams (
            id, title, description, duration_minutes, total_marks, pass_percentage,
            start_time, end_time, is_published, created_by, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,0,$5,$6,$7,FALSE,$8,$9,$10)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.title)
    .bind(params.description)
    .bind(params.duration_minutes)
    .bind(params.pass_percentage)
    .bind(params.start_time)
    .bind(params.end_time)
    .bind(params.created_by)
    .bind(params.created_at)
    .bind(params.updated_at)
    .fetch_one(executor)
    .await
}

pub(crate) struct UpdateExam {
    pub title: Option<String>,
    pub description: Option<String>,
    pub duration_minutes: Option<i32>,
    pub pass_percentage: Option<i32>,
    pub start_time: Option<PrimitiveDateTime>,
    pub end_time: Option<PrimitiveDateTime>,
    pub updated_at: PrimitiveDateTime,
}

pub(crate) async fn update(pool: &PgPool, id: &str, params: UpdateExam) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE exams SET
            title = COALESCE($1, title),
            description = COALESCE($2, description),
            duration_minutes = COALESCE($3, duration_minutes),
            pass_percentage = COALESCE($4, pass_percentage),
            start_time = COALESCE($5, start_time),
            end_time = COALESCE($6, end_time),
            updated_at = $7
         WHERE id = $8",
    )
    .bind(params.title)
    .bind(params.description)
    .bind(params.duration_minutes)
    .bind(params.pass_percentage)
    .bind(params.start_time)
    .bind(params.end_time)
    .bind(params.updated_at)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn fetch_one_by_id(pool: &PgPool, id: &str) -> Result<Exam, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {COLUMNS} FROM exams WHERE id = $1"))
        .bind(id)
        .fetch_one(pool)
        .await
}

pub(crate) async fn delete(pool: &PgPool, id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM exams WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected())
}

pub(crate) async fn set_published(
    pool: &PgPool,
    id: &str,
    is_published: bool,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE exams SET is_published = $1, updated_at = $2 WHERE id = $3")
        .bind(is_published)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub(crate) async fn replace_questions(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    exam_id: &str,
    question_ids: &[String],
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM exam_questions WHERE exam_id = $1")
        .bind(exam_id)
        .execute(&mut **tx)
        .await?;

    for (index, question_id) in question_ids.iter().enumerate() {
        sqlx::query(
            "INSERT INTO exam_questions (id, exam_id, question_id, order_index)
             VALUES ($1,$2,$3,$4)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(exam_id)
        .bind(question_id)
        .bind(index as i32)
        .execute(&mut **tx)
        .await?;
    }

    // The exam's static total is the sum over its linked questions.
    sqlx::query(
        "UPDATE exams SET
            total_marks = (
                SELECT COALESCE(SUM(q.points), 0)
                FROM exam_questions eq
                JOIN questions q ON q.id = eq.question_id
                WHERE eq.exam_id = $1
            ),
            updated_at = $2
         WHERE id = $1",
    )
    .bind(exam_id)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub(crate) async fn list_questions(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(
        "SELECT q.id, q.text, q.subject_id, q.question_type, q.points, q.author_id,
                q.created_at, q.updated_at
         FROM exam_questions eq
         JOIN questions q ON q.id = eq.question_id
         WHERE eq.exam_id = $1
         ORDER BY eq.order_index, eq.id",
    )
    .bind(exam_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn count_missing_questions(
    pool: &PgPool,
    question_ids: &[String],
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT CARDINALITY($1::text[]) - COUNT(*)
         FROM questions WHERE id = ANY($1)",
    )
    .bind(question_ids)
    .fetch_one(pool)
    .await
}
