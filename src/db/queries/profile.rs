//! Staff profile queries

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::profile::{CreateProfileRequest, Profile, ProfileStats, StaffRole, UpdateProfileRequest};

/// Create a profile for an identity-provider user
pub async fn create_profile(pool: &PgPool, req: &CreateProfileRequest) -> Result<Profile> {
    let profile = sqlx::query_as::<_, Profile>(
        r#"
        INSERT INTO profiles (id, email, nama, nomor_telepon, role, unit_kerja, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
        RETURNING id, email, nama, nomor_telepon, role, unit_kerja, created_at, updated_at
        "#
    )
    .bind(req.id.unwrap_or_else(Uuid::new_v4))
    .bind(req.email.trim())
    .bind(req.nama.trim())
    .bind(&req.nomor_telepon)
    .bind(req.role.unwrap_or_default())
    .bind(&req.unit_kerja)
    .fetch_one(pool)
    .await?;

    Ok(profile)
}

/// Get profile by ID
pub async fn get_profile(pool: &PgPool, profile_id: Uuid) -> Result<Option<Profile>> {
    let profile = sqlx::query_as::<_, Profile>(
        r#"
        SELECT id, email, nama, nomor_telepon, role, unit_kerja, created_at, updated_at
        FROM profiles
        WHERE id = $1
        "#
    )
    .bind(profile_id)
    .fetch_optional(pool)
    .await?;

    Ok(profile)
}

/// The given user id, if a profile row exists for it.
///
/// Token users are not guaranteed to have a profile, and the `user_id`
/// columns referencing `profiles` must then stay NULL.
pub async fn existing_profile_id(pool: &PgPool, user_id: Option<Uuid>) -> Result<Option<Uuid>> {
    let Some(user_id) = user_id else {
        return Ok(None);
    };

    let found: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM profiles WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(found.map(|(id,)| id))
}

/// List profiles by name
pub async fn list_profiles(
    pool: &PgPool,
    role: Option<StaffRole>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Profile>> {
    let profiles = sqlx::query_as::<_, Profile>(
        r#"
        SELECT id, email, nama, nomor_telepon, role, unit_kerja, created_at, updated_at
        FROM profiles
        WHERE ($1::user_role IS NULL OR role = $1)
        ORDER BY nama ASC
        LIMIT $2 OFFSET $3
        "#
    )
    .bind(role)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(profiles)
}

pub async fn count_profiles(pool: &PgPool, role: Option<StaffRole>) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM profiles WHERE ($1::user_role IS NULL OR role = $1)"
    )
    .bind(role)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Update profile fields; absent fields keep their value
pub async fn update_profile(pool: &PgPool, req: &UpdateProfileRequest) -> Result<Option<Profile>> {
    let profile = sqlx::query_as::<_, Profile>(
        r#"
        UPDATE profiles SET
            nama = COALESCE($2, nama),
            nomor_telepon = COALESCE($3, nomor_telepon),
            role = COALESCE($4, role),
            unit_kerja = COALESCE($5, unit_kerja),
            updated_at = NOW()
        WHERE id = $1
        RETURNING id, email, nama, nomor_telepon, role, unit_kerja, created_at, updated_at
        "#
    )
    .bind(req.id)
    .bind(&req.nama)
    .bind(&req.nomor_telepon)
    .bind(req.role)
    .bind(&req.unit_kerja)
    .fetch_optional(pool)
    .await?;

    Ok(profile)
}

/// Delete a profile; rows referencing it keep their data with a NULL user
pub async fn delete_profile(pool: &PgPool, profile_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM profiles WHERE id = $1")
        .bind(profile_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Staff counts per role
pub async fn get_profile_stats(pool: &PgPool) -> Result<ProfileStats> {
    let rows: Vec<(StaffRole, i64)> = sqlx::query_as(
        "SELECT role, COUNT(*) FROM profiles GROUP BY role"
    )
    .fetch_all(pool)
    .await?;

    Ok(ProfileStats {
        total: rows.iter().map(|(_, count)| count).sum(),
        by_role: rows
            .into_iter()
            .map(|(role, count)| (role.as_str().to_string(), count))
            .collect(),
    })
}
