//! Report activity log

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

/// Append one activity entry for a report
pub async fn log_activity(
    pool: &PgPool,
    report_id: Uuid,
    user_id: Uuid,
    action: &str,
    description: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO activity_logs (id, report_id, user_id, action, description, created_at)
        VALUES ($1, $2, $3, $4, $5, NOW())
        "#
    )
    .bind(Uuid::new_v4())
    .bind(report_id)
    .bind(user_id)
    .bind(action)
    .bind(description)
    .execute(pool)
    .await?;

    Ok(())
}
