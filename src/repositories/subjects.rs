use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Subject;

const COLUMNS: &str = "id, name, description, created_at";

/// Subject row with a live count of the questions filed under it.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SubjectWithCount {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) questions_count: i64,
}

pub(crate) async fn list_all(pool: &PgPool) -> Result<Vec<SubjectWithCount>, sqlx::Error> {
    sqlx::query_as::<_, SubjectWithCount>(
        "SELECT s.id, s.name, s.description, s.created_at,
                (SELECT COUNT(*) FROM questions q WHERE q.subject_id = s.id) AS questions_count
         FROM subjects s
         ORDER BY s.name",
    )
    .fetch_all(pool)
    .await
}

pub(crate) async fn find_with_count(
    pool: &PgPool,
    id: &str,
) -> Result<Option<SubjectWithCount>, sqlx::Error> {
    sqlx::query_as::<_, SubjectWithCount>(
        "SELECT s.id, s.name, s.description, s.created_at,
                (SELECT COUNT(*) FROM questions q WHERE q.subject_id = s.id) AS questions_count
         FROM subjects s
         WHERE s.id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Subject>, sqlx::Error> {
    sqlx::query_as::<_, Subject>(&format!("SELECT {COLUMNS} FROM subjects WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn exists_by_name(
    pool: &PgPool,
    name: &str,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT id FROM subjects WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn create(
    pool: &PgPool,
    id: &str,
    name: &str,
    description: &str,
    created_at: PrimitiveDateTime,
) -> Result<Subject, sqlx::Error> {
    sqlx::query_as::<_, Subject>(&format!(
        "INSERT INTO subjects (id, name, description, created_at)
         VALUES ($1,$2,$3,$4)
         RETURNING {COLUMNS}",
    ))
    .bind(id)
    .bind(name)
    .bind(description)
    .bind(created_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn update(
    pool: &PgPool,
    id: &str,
    name: Option<String>,
    description: Option<String>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE subjects SET
            name = COALESCE($1, name),
            description = COALESCE($2, description)
         WHERE id = $3",
    )
    .bind(name)
    .bind(description)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn delete(pool: &PgPool, id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM subjects WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected())
}
