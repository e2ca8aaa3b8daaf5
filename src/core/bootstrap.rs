use uuid::Uuid;

use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::UserRole;
use crate::repositories;

/// Creates or repairs the default admin account from `FIRST_SUPERUSER_*` env.
pub(crate) async fn ensure_superuser(state: &AppState) -> anyhow::Result<()> {
    let admin = state.settings().admin();
    if admin.first_superuser_password.is_empty() {
        tracing::warn!("FIRST_SUPERUSER_PASSWORD not configured; skipping admin bootstrap");
        return Ok(());
    }

    let email = &admin.first_superuser_email;
    let user = repositories::users::find_by_email(state.db(), email).await?;
    let now = primitive_now_utc();

    if let Some(user) = user {
        let verified =
            security::verify_password(&admin.first_superuser_password, &user.hashed_password)
                .unwrap_or(false);

        let needs_update = !verified || user.role != UserRole::Admin || !user.is_active;
        if !needs_update {
            tracing::info!("Default admin already up to date");
            return Ok(());
        }

        let hashed_password = if verified {
            user.hashed_password.clone()
        } else {
            security::hash_password(&admin.first_superuser_password)?
        };

        sqlx::query(
            "UPDATE users
             SET hashed_password = $1, role = $2, is_active = TRUE, updated_at = $3
             WHERE id = $4",
        )
        .bind(hashed_password)
        .bind(UserRole::Admin)
        .bind(now)
        .bind(&user.id)
        .execute(state.db())
        .await?;

        tracing::info!("Updated default admin {email}");
        return Ok(());
    }

    let hashed_password = security::hash_password(&admin.first_superuser_password)?;

    sqlx::query(
        "INSERT INTO users (id, email, hashed_password, full_name, role, is_active, created_at, updated_at)
         VALUES ($1,$2,$3,$4,$5,$6,$7,$8)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(email)
    .bind(hashed_password)
    .bind("Administrator")
    .bind(UserRole::Admin)
    .bind(true)
    .bind(now)
    .bind(now)
    .execute(state.db())
    .await?;

    tracing::info!("Created default admin {email}");
    Ok(())
}
