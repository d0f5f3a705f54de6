//! Feedback database queries

use anyhow::Result;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::feedback::{
    CreateFeedbackRequest, Feedback, FeedbackStats, FeedbackType, UpdateFeedbackRequest,
    DEFAULT_FEEDBACK_STATUS,
};

/// Create feedback. `user_id` is the staff member who entered or imported it.
pub async fn create_feedback(
    pool: &PgPool,
    user_id: Option<Uuid>,
    req: &CreateFeedbackRequest,
) -> Result<Feedback> {
    let feedback = sqlx::query_as::<_, Feedback>(
        r#"
        INSERT INTO feedback (
            id, feedback_type, subject, message, rating, nama, email, photo_url,
            status, user_id, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW(), NOW())
        RETURNING
            id, feedback_type, subject, message, rating, nama, email, photo_url,
            status, response, user_id, created_at, updated_at
        "#
    )
    .bind(Uuid::new_v4())
    .bind(req.feedback_type)
    .bind(&req.subject)
    .bind(&req.message)
    .bind(req.rating)
    .bind(&req.nama)
    .bind(&req.email)
    .bind(&req.photo_url)
    .bind(req.status.as_deref().unwrap_or(DEFAULT_FEEDBACK_STATUS))
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(feedback)
}

/// Get feedback by ID
pub async fn get_feedback(pool: &PgPool, feedback_id: Uuid) -> Result<Option<Feedback>> {
    let feedback = sqlx::query_as::<_, Feedback>(
        r#"
        SELECT
            id, feedback_type, subject, message, rating, nama, email, photo_url,
            status, response, user_id, created_at, updated_at
        FROM feedback
        WHERE id = $1
        "#
    )
    .bind(feedback_id)
    .fetch_optional(pool)
    .await?;

    Ok(feedback)
}

/// List feedback, newest first
pub async fn list_feedback(
    pool: &PgPool,
    feedback_type: Option<FeedbackType>,
    search: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Feedback>> {
    let feedback = sqlx::query_as::<_, Feedback>(
        r#"
        SELECT
            id, feedback_type, subject, message, rating, nama, email, photo_url,
            status, response, user_id, created_at, updated_at
        FROM feedback
        WHERE ($1::feedback_type IS NULL OR feedback_type = $1)
          AND ($2::text IS NULL
               OR subject ILIKE '%' || $2 || '%'
               OR message ILIKE '%' || $2 || '%'
               OR nama ILIKE '%' || $2 || '%')
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#
    )
    .bind(feedback_type)
    .bind(search)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(feedback)
}

pub async fn count_feedback(
    pool: &PgPool,
    feedback_type: Option<FeedbackType>,
    search: Option<&str>,
) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM feedback
        WHERE ($1::feedback_type IS NULL OR feedback_type = $1)
          AND ($2::text IS NULL
               OR subject ILIKE '%' || $2 || '%'
               OR message ILIKE '%' || $2 || '%'
               OR nama ILIKE '%' || $2 || '%')
        "#
    )
    .bind(feedback_type)
    .bind(search)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Triage feedback: set status and/or the staff response
pub async fn update_feedback(pool: &PgPool, req: &UpdateFeedbackRequest) -> Result<Option<Feedback>> {
    let feedback = sqlx::query_as::<_, Feedback>(
        r#"
        UPDATE feedback SET
            status = COALESCE($2, status),
            response = COALESCE($3, response),
            updated_at = NOW()
        WHERE id = $1
        RETURNING
            id, feedback_type, subject, message, rating, nama, email, photo_url,
            status, response, user_id, created_at, updated_at
        "#
    )
    .bind(req.id)
    .bind(&req.status)
    .bind(&req.response)
    .fetch_optional(pool)
    .await?;

    Ok(feedback)
}

/// Delete feedback
pub async fn delete_feedback(pool: &PgPool, feedback_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM feedback WHERE id = $1")
        .bind(feedback_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Feedback statistics
pub async fn get_feedback_stats(pool: &PgPool) -> Result<FeedbackStats> {
    let today = Utc::now().date_naive();

    let (total, today_count, average_rating): (i64, i64, Option<f64>) = sqlx::query_as(
        r#"
        SELECT
            COUNT(*),
            COUNT(*) FILTER (WHERE created_at::date = $1),
            AVG(rating)::float8
        FROM feedback
        "#
    )
    .bind(today)
    .fetch_one(pool)
    .await?;

    let type_rows: Vec<(FeedbackType, i64)> = sqlx::query_as(
        "SELECT feedback_type, COUNT(*) FROM feedback GROUP BY feedback_type"
    )
    .fetch_all(pool)
    .await?;

    Ok(FeedbackStats {
        total,
        today: today_count,
        average_rating: average_rating.unwrap_or(0.0),
        by_type: type_rows
            .into_iter()
            .map(|(t, count)| (t.as_str().to_string(), count))
            .collect(),
    })
}
