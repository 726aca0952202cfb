use uuid::Uuid;

use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;

/// Creates or repairs the default admin profile on startup so a fresh
/// deployment always has a grader account.
pub(crate) async fn ensure_admin(state: &AppState) -> anyhow::Result<()> {
    let admin = state.settings().admin();
    if admin.first_admin_password.is_empty() {
        tracing::warn!("FIRST_ADMIN_PASSWORD not configured; skipping admin creation");
        return Ok(());
    }

    let email = &admin.first_admin_email;
    let profile = repositories::profiles::find_by_email(state.db(), email).await?;
    let now = primitive_now_utc();

    if let Some(profile) = profile {
        let verified = security::verify_password(&admin.first_admin_password, &profile.hashed_password)
            .unwrap_or(false);

        let needs_update = !verified || !profile.is_admin || !profile.is_active;
        if needs_update {
            let hashed_password = if verified {
                profile.hashed_password.clone()
            } else {
                security::hash_password(&admin.first_admin_password)?
            };

            sqlx::query(
                "UPDATE profiles
                 SET hashed_password = $1, is_admin = TRUE, is_active = TRUE, updated_at = $2
                 WHERE id = $3",
            )
            .bind(hashed_password)
            .bind(now)
            .bind(&profile.id)
            .execute(state.db())
            .await?;

            tracing::info!("Updated default admin {email}");
        } else {
            tracing::info!("Default admin already up to date");
        }

        return Ok(());
    }

    let hashed_password = security::hash_password(&admin.first_admin_password)?;

    repositories::profiles::create(
        state.db(),
        repositories::profiles::CreateProfile {
            id: &Uuid::new_v4().to_string(),
            email,
            full_name: "Platform Admin",
            hashed_password: &hashed_password,
            is_admin: true,
            is_active: true,
            created_at: now,
            updated_at: now,
        },
    )
    .await?;

    tracing::info!("Created default admin {email}");
    Ok(())
}
