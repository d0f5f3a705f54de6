//! Report database queries

use std::collections::HashMap;

use anyhow::Result;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::report::{
    CreateReportRequest, Report, ReportExportRow, ReportFilter, ReportStats, ReportStatus,
    UpdateReportRequest,
};

/// Create a new report. The report number is assigned by the insert trigger.
pub async fn create_report(pool: &PgPool, req: &CreateReportRequest) -> Result<Report> {
    let (lat, lng) = match req.coordinates() {
        Some((lat, lng)) => (Some(lat), Some(lng)),
        None => (None, None),
    };

    let report = sqlx::query_as::<_, Report>(
        r#"
        INSERT INTO reports (
            id, nomor_laporan, jenis, judul, kategori, deskripsi, prioritas, status, lokasi,
            pelapor_nama, pelapor_telepon, pelapor_email,
            koordinat_lat, koordinat_lng,
            petugas_nama, petugas_polres, petugas_hp,
            tanggal_laporan, created_at, updated_at
        )
        VALUES (
            $1, '', $2, $3, $4, $5, $6, 'menunggu', $7,
            $8, $9, $10,
            $11, $12,
            $13, $14, $15,
            NOW(), NOW(), NOW()
        )
        RETURNING
            id, nomor_laporan, jenis, judul, kategori, deskripsi, prioritas, status, lokasi,
            pelapor_nama, pelapor_telepon, pelapor_email, koordinat_lat, koordinat_lng,
            petugas_id, petugas_nama, petugas_polres, petugas_hp, catatan_petugas,
            tanggal_laporan, tanggal_selesai, created_at, updated_at
        "#
    )
    .bind(Uuid::new_v4())
    .bind(req.jenis)
    .bind(req.title())
    .bind(&req.kategori)
    .bind(req.deskripsi.as_deref().unwrap_or(""))
    .bind(req.prioritas.unwrap_or_default())
    .bind(&req.lokasi)
    .bind(&req.pelapor)
    .bind(&req.telepon)
    .bind(&req.email)
    .bind(lat)
    .bind(lng)
    .bind(&req.petugas_nama)
    .bind(&req.petugas_polres)
    .bind(&req.petugas_hp)
    .fetch_one(pool)
    .await?;

    Ok(report)
}

/// Get report by ID
pub async fn get_report(pool: &PgPool, report_id: Uuid) -> Result<Option<Report>> {
    let report = sqlx::query_as::<_, Report>(
        r#"
        SELECT
            id, nomor_laporan, jenis, judul, kategori, deskripsi, prioritas, status, lokasi,
            pelapor_nama, pelapor_telepon, pelapor_email, koordinat_lat, koordinat_lng,
            petugas_id, petugas_nama, petugas_polres, petugas_hp, catatan_petugas,
            tanggal_laporan, tanggal_selesai, created_at, updated_at
        FROM reports
        WHERE id = $1
        "#
    )
    .bind(report_id)
    .fetch_optional(pool)
    .await?;

    Ok(report)
}

/// Get report by its number (LP001)
pub async fn get_report_by_number(pool: &PgPool, nomor_laporan: &str) -> Result<Option<Report>> {
    let report = sqlx::query_as::<_, Report>(
        r#"
        SELECT
            id, nomor_laporan, jenis, judul, kategori, deskripsi, prioritas, status, lokasi,
            pelapor_nama, pelapor_telepon, pelapor_email, koordinat_lat, koordinat_lng,
            petugas_id, petugas_nama, petugas_polres, petugas_hp, catatan_petugas,
            tanggal_laporan, tanggal_selesai, created_at, updated_at
        FROM reports
        WHERE nomor_laporan = $1
        "#
    )
    .bind(nomor_laporan)
    .fetch_optional(pool)
    .await?;

    Ok(report)
}

/// Look a report up by number first, then by id
pub async fn find_report(pool: &PgPool, reference: &str) -> Result<Option<Report>> {
    let reference = reference.trim();
    if let Some(report) = get_report_by_number(pool, reference).await? {
        return Ok(Some(report));
    }
    match Uuid::parse_str(reference) {
        Ok(id) => get_report(pool, id).await,
        Err(_) => Ok(None),
    }
}

/// List reports, newest first
pub async fn list_reports(
    pool: &PgPool,
    filter: &ReportFilter,
    search: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Report>> {
    let reports = sqlx::query_as::<_, Report>(
        r#"
        SELECT
            id, nomor_laporan, jenis, judul, kategori, deskripsi, prioritas, status, lokasi,
            pelapor_nama, pelapor_telepon, pelapor_email, koordinat_lat, koordinat_lng,
            petugas_id, petugas_nama, petugas_polres, petugas_hp, catatan_petugas,
            tanggal_laporan, tanggal_selesai, created_at, updated_at
        FROM reports
        WHERE ($1::date IS NULL OR created_at >= $1::date)
          AND ($2::date IS NULL OR created_at < $2::date + 1)
          AND ($3::report_status IS NULL OR status = $3)
          AND ($4::text IS NULL OR kategori = $4)
          AND ($5::report_priority IS NULL OR prioritas = $5)
          AND ($6::text IS NULL
               OR nomor_laporan ILIKE '%' || $6 || '%'
               OR judul ILIKE '%' || $6 || '%'
               OR pelapor_nama ILIKE '%' || $6 || '%')
        ORDER BY created_at DESC
        LIMIT $7 OFFSET $8
        "#
    )
    .bind(filter.date_from)
    .bind(filter.date_to)
    .bind(filter.status)
    .bind(&filter.kategori)
    .bind(filter.prioritas)
    .bind(search)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(reports)
}

/// Count reports matching a filter
pub async fn count_reports(pool: &PgPool, filter: &ReportFilter, search: Option<&str>) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM reports
        WHERE ($1::date IS NULL OR created_at >= $1::date)
          AND ($2::date IS NULL OR created_at < $2::date + 1)
          AND ($3::report_status IS NULL OR status = $3)
          AND ($4::text IS NULL OR kategori = $4)
          AND ($5::report_priority IS NULL OR prioritas = $5)
          AND ($6::text IS NULL
               OR nomor_laporan ILIKE '%' || $6 || '%'
               OR judul ILIKE '%' || $6 || '%'
               OR pelapor_nama ILIKE '%' || $6 || '%')
        "#
    )
    .bind(filter.date_from)
    .bind(filter.date_to)
    .bind(filter.status)
    .bind(&filter.kategori)
    .bind(filter.prioritas)
    .bind(search)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Reports for the download page, with the assigned officer's profile name
pub async fn list_reports_for_export(pool: &PgPool, filter: &ReportFilter) -> Result<Vec<ReportExportRow>> {
    let rows = sqlx::query_as::<_, ReportExportRow>(
        r#"
        SELECT
            r.id, r.nomor_laporan, r.jenis, r.judul, r.kategori, r.deskripsi, r.prioritas,
            r.status, r.lokasi, r.pelapor_nama, r.pelapor_telepon, r.pelapor_email,
            r.koordinat_lat, r.koordinat_lng, r.petugas_id, r.petugas_nama, r.petugas_polres,
            r.petugas_hp, r.catatan_petugas, r.tanggal_laporan, r.tanggal_selesai,
            r.created_at, r.updated_at,
            p.nama AS petugas_profil
        FROM reports r
        LEFT JOIN profiles p ON p.id = r.petugas_id
        WHERE ($1::date IS NULL OR r.created_at >= $1::date)
          AND ($2::date IS NULL OR r.created_at < $2::date + 1)
          AND ($3::report_status IS NULL OR r.status = $3)
          AND ($4::text IS NULL OR r.kategori = $4)
          AND ($5::report_priority IS NULL OR r.prioritas = $5)
        ORDER BY r.created_at DESC
        "#
    )
    .bind(filter.date_from)
    .bind(filter.date_to)
    .bind(filter.status)
    .bind(&filter.kategori)
    .bind(filter.prioritas)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Update report fields; absent fields keep their value
pub async fn update_report(pool: &PgPool, req: &UpdateReportRequest) -> Result<Option<Report>> {
    let report = sqlx::query_as::<_, Report>(
        r#"
        UPDATE reports SET
            kategori = COALESCE($2, kategori),
            deskripsi = COALESCE($3, deskripsi),
            prioritas = COALESCE($4, prioritas),
            lokasi = COALESCE($5, lokasi),
            pelapor_nama = COALESCE($6, pelapor_nama),
            pelapor_telepon = COALESCE($7, pelapor_telepon),
            pelapor_email = COALESCE($8, pelapor_email),
            petugas_id = COALESCE($9, petugas_id),
            petugas_nama = COALESCE($10, petugas_nama),
            petugas_polres = COALESCE($11, petugas_polres),
            petugas_hp = COALESCE($12, petugas_hp),
            catatan_petugas = COALESCE($13, catatan_petugas),
            updated_at = NOW()
        WHERE id = $1
        RETURNING
            id, nomor_laporan, jenis, judul, kategori, deskripsi, prioritas, status, lokasi,
            pelapor_nama, pelapor_telepon, pelapor_email, koordinat_lat, koordinat_lng,
            petugas_id, petugas_nama, petugas_polres, petugas_hp, catatan_petugas,
            tanggal_laporan, tanggal_selesai, created_at, updated_at
        "#
    )
    .bind(req.id)
    .bind(&req.kategori)
    .bind(&req.deskripsi)
    .bind(req.prioritas)
    .bind(&req.lokasi)
    .bind(&req.pelapor_nama)
    .bind(&req.pelapor_telepon)
    .bind(&req.pelapor_email)
    .bind(req.petugas_id)
    .bind(&req.petugas_nama)
    .bind(&req.petugas_polres)
    .bind(&req.petugas_hp)
    .bind(&req.catatan_petugas)
    .fetch_optional(pool)
    .await?;

    Ok(report)
}

/// Change the workflow status. Entering `selesai` stamps the completion time.
pub async fn update_report_status(
    pool: &PgPool,
    report_id: Uuid,
    status: ReportStatus,
) -> Result<Option<Report>> {
    let report = sqlx::query_as::<_, Report>(
        r#"
        UPDATE reports SET
            tanggal_selesai = CASE
                WHEN $2::report_status = 'selesai' AND status <> 'selesai' THEN NOW()
                ELSE tanggal_selesai
            END,
            status = $2,
            updated_at = NOW()
        WHERE id = $1
        RETURNING
            id, nomor_laporan, jenis, judul, kategori, deskripsi, prioritas, status, lokasi,
            pelapor_nama, pelapor_telepon, pelapor_email, koordinat_lat, koordinat_lng,
            petugas_id, petugas_nama, petugas_polres, petugas_hp, catatan_petugas,
            tanggal_laporan, tanggal_selesai, created_at, updated_at
        "#
    )
    .bind(report_id)
    .bind(status)
    .fetch_optional(pool)
    .await?;

    Ok(report)
}

/// Delete report
pub async fn delete_report(pool: &PgPool, report_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM reports WHERE id = $1")
        .bind(report_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Dashboard statistics
pub async fn get_report_stats(pool: &PgPool) -> Result<ReportStats> {
    let today = Utc::now().date_naive();

    let (total, today_count, emergency): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COUNT(*),
            COUNT(*) FILTER (WHERE created_at::date = $1),
            COUNT(*) FILTER (WHERE prioritas = 'darurat')
        FROM reports
        "#
    )
    .bind(today)
    .fetch_one(pool)
    .await?;

    let status_rows: Vec<(ReportStatus, i64)> = sqlx::query_as(
        "SELECT status, COUNT(*) FROM reports GROUP BY status"
    )
    .fetch_all(pool)
    .await?;

    // Every status is listed, including those with no reports
    let mut by_status: HashMap<String, i64> = ReportStatus::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
    for (status, count) in status_rows {
        by_status.insert(status.as_str().to_string(), count);
    }

    let category_rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT kategori, COUNT(*) FROM reports GROUP BY kategori"
    )
    .fetch_all(pool)
    .await?;

    Ok(ReportStats {
        total,
        today: today_count,
        by_status,
        by_category: category_rows.into_iter().collect(),
        emergency,
    })
}
