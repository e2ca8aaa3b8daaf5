use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::{Question, QuestionOption};
use crate::db::types::QuestionType;

const COLUMNS: &str = "\
    id, text, subject_id, question_type, points, author_id, created_at, updated_at";

const OPTION_COLUMNS: &str = "id, question_id, text, is_correct, order_index";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!("SELECT {COLUMNS} FROM questions WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

#[derive(Debug, Default)]
pub(crate) struct QuestionFilter {
    pub subject_id: Option<String>,
    pub question_type: Option<QuestionType>,
    pub author_id: Option<String>,
}

pub(crate) async fn list(
    pool: &PgPool,
    filter: QuestionFilter,
) -> Result<Vec<Question>, sqlx::Error> {
    let mut builder =
        sqlx::QueryBuilder::<sqlx::Postgres>::new(format!("SELECT {COLUMNS} FROM questions"));
    builder.push(" WHERE 1 = 1");

    if let Some(subject_id) = filter.subject_id {
        builder.push(" AND subject_id = ").push_bind(subject_id);
    }
    if let Some(question_type) = filter.question_type {
        builder.push(" AND question_type = ").push_bind(question_type);
    }
    if let Some(author_id) = filter.author_id {
        builder.push(" AND author_id = ").push_bind(author_id);
    }

    builder.push(" ORDER BY created_at DESC");
    builder.build_query_as::<Question>().fetch_all(pool).await
}

pub(crate) struct CreateQuestion<'a> {
    pub id: &'a str,
    pub text: &'a str,
    pub subject_id: &'a str,
    pub question_type: QuestionType,
    pub points: i32,
    pub author_id: &'a str,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateQuestion<'_>,
) -> Result<Question, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "INSERT INTO questions (
            id, text, subject_id, question_type, points, author_id, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.text)
    .bind(params.subject_id)
    .bind(params.question_type)
    .bind(params.points)
    .bind(params.author_id)
    .bind(params.created_at)
    .bind(params.updated_at)
    .fetch_one(executor)
    .await
}

pub(crate) struct UpdateQuestion {
    pub text: Option<String>,
    pub subject_id: Option<String>,
    pub question_type: Option<QuestionType>,
    pub points: Option<i32>,
    pub updated_at: PrimitiveDateTime,
}

pub(crate) async fn update(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    params: UpdateQuestion,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE questions SET
            text = COALESCE($1, text),
            subject_id = COALESCE($2, subject_id),
            question_type = COALESCE($3, question_type),
            points = COALESCE($4, points),
            updated_at = $5
         WHERE id = $6",
    )
    .bind(params.text)
    .bind(params.subject_id)
    .bind(params.question_type)
    .bind(params.points)
    .bind(params.updated_at)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn fetch_one_by_id(pool: &PgPool, id: &str) -> Result<Question, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!("SELECT {COLUMNS} FROM questions WHERE id = $1"))
        .bind(id)
        .fetch_one(pool)
        .await
}

pub(crate) async fn delete(pool: &PgPool, id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM questions WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected())
}

pub(crate) struct InsertOption<'a> {
    pub id: &'a str,
    pub question_id: &'a str,
    pub text: &'a str,
    pub is_correct: bool,
    pub order_index: i32,
}

pub(crate) async fn insert_option(
    executor: impl sqlx::PgExecutor<'_>,
    params: InsertOption<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO question_options (id, question_id, text, is_correct, order_index)
         VALUES ($1,$2,$3,$4,$5)",
    )
    .bind(params.id)
    .bind(params.question_id)
    .bind(params.text)
    .bind(params.is_correct)
    .bind(params.order_index)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn delete_options(
    executor: impl sqlx::PgExecutor<'_>,
    question_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM question_options WHERE question_id = $1")
        .bind(question_id)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn list_options(
    pool: &PgPool,
    question_id: &str,
) -> Result<Vec<QuestionOption>, sqlx::Error> {
    sqlx::query_as::<_, QuestionOption>(&format!(
        "SELECT {OPTION_COLUMNS} FROM question_options
         WHERE question_id = $1 ORDER BY order_index, id"
    ))
    .bind(question_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_options_for_questions(
    executor: impl sqlx::PgExecutor<'_>,
    question_ids: &[String],
) -> Result<Vec<QuestionOption>, sqlx::Error> {
    if question_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, QuestionOption>(&format!(
        "SELECT {OPTION_COLUMNS} FROM question_options
         WHERE question_id = ANY($1) ORDER BY question_id, order_index, id"
    ))
    .bind(question_ids)
    .fetch_all(executor)
    .await
}
