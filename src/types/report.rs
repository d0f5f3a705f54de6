//! Report types

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

use super::ImportedReport;

/// Report kind ("jenis")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "report_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Pengaduan,
    Informasi,
    Prank,
    Permintaan,
}

impl ReportKind {
    pub const ALL: [ReportKind; 4] = [
        ReportKind::Pengaduan,
        ReportKind::Informasi,
        ReportKind::Prank,
        ReportKind::Permintaan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Pengaduan => "pengaduan",
            ReportKind::Informasi => "informasi",
            ReportKind::Prank => "prank",
            ReportKind::Permintaan => "permintaan",
        }
    }

    /// Parse an already trimmed, lowercased value
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Report priority ("prioritas")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Type)]
#[sqlx(type_name = "report_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReportPriority {
    Rendah,
    #[default]
    Sedang,
    Tinggi,
    Darurat,
}

impl ReportPriority {
    pub const ALL: [ReportPriority; 4] = [
        ReportPriority::Rendah,
        ReportPriority::Sedang,
        ReportPriority::Tinggi,
        ReportPriority::Darurat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportPriority::Rendah => "rendah",
            ReportPriority::Sedang => "sedang",
            ReportPriority::Tinggi => "tinggi",
            ReportPriority::Darurat => "darurat",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }
}

impl fmt::Display for ReportPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Report workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Type)]
#[sqlx(type_name = "report_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    #[default]
    Menunggu,
    Diproses,
    Selesai,
    Ditolak,
}

impl ReportStatus {
    pub const ALL: [ReportStatus; 4] = [
        ReportStatus::Menunggu,
        ReportStatus::Diproses,
        ReportStatus::Selesai,
        ReportStatus::Ditolak,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Menunggu => "menunggu",
            ReportStatus::Diproses => "diproses",
            ReportStatus::Selesai => "selesai",
            ReportStatus::Ditolak => "ditolak",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Report entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: Uuid,
    pub nomor_laporan: String,
    pub jenis: ReportKind,
    pub judul: String,
    pub kategori: String,
    pub deskripsi: Option<String>,
    pub prioritas: ReportPriority,
    pub status: ReportStatus,
    pub lokasi: String,

    // Reporter
    pub pelapor_nama: String,
    pub pelapor_telepon: Option<String>,
    pub pelapor_email: Option<String>,

    pub koordinat_lat: Option<f64>,
    pub koordinat_lng: Option<f64>,

    // Assigned officer
    pub petugas_id: Option<Uuid>,
    pub petugas_nama: Option<String>,
    pub petugas_polres: Option<String>,
    pub petugas_hp: Option<String>,
    pub catatan_petugas: Option<String>,

    pub tanggal_laporan: DateTime<Utc>,
    pub tanggal_selesai: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Report joined with the assigned officer's profile name, for exports
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ReportExportRow {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub report: Report,
    pub petugas_profil: Option<String>,
}

impl ReportExportRow {
    /// Officer shown in exports: the linked profile, else the free-text name
    pub fn officer(&self) -> Option<&str> {
        self.petugas_profil
            .as_deref()
            .or(self.report.petugas_nama.as_deref())
    }
}

/// Request to create a report (manual form and import share this shape)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReportRequest {
    pub jenis: ReportKind,
    pub kategori: String,
    pub lokasi: String,
    #[serde(default)]
    pub deskripsi: Option<String>,
    pub pelapor: String,
    #[serde(default)]
    pub telepon: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub prioritas: Option<ReportPriority>,
    /// "lat,lng" as typed into the form
    #[serde(default)]
    pub koordinat: Option<String>,
    #[serde(default)]
    pub petugas_nama: Option<String>,
    #[serde(default)]
    pub petugas_polres: Option<String>,
    #[serde(default)]
    pub petugas_hp: Option<String>,
}

impl CreateReportRequest {
    /// Report title shown in lists: "<jenis> - <lokasi>"
    pub fn title(&self) -> String {
        format!("{} - {}", self.jenis, self.lokasi)
    }

    /// Parse the "lat,lng" coordinate string
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let raw = self.koordinat.as_deref()?;
        let (lat, lng) = raw.split_once(',')?;
        let lat = lat.trim().parse::<f64>().ok()?;
        let lng = lng.trim().parse::<f64>().ok()?;
        Some((lat, lng))
    }
}

/// Empty strings from forms and sheets are stored as NULL
pub fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl From<ImportedReport> for CreateReportRequest {
    fn from(row: ImportedReport) -> Self {
        Self {
            jenis: row.jenis,
            kategori: row.kategori,
            lokasi: row.lokasi,
            deskripsi: Some(row.deskripsi),
            pelapor: row.pelapor,
            telepon: non_empty(&row.telepon),
            email: non_empty(&row.email),
            prioritas: Some(row.prioritas),
            koordinat: None,
            petugas_nama: non_empty(&row.petugas_nama),
            petugas_polres: non_empty(&row.petugas_polres),
            petugas_hp: non_empty(&row.petugas_hp),
        }
    }
}

/// Request to update a report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReportRequest {
    pub id: Uuid,
    pub kategori: Option<String>,
    pub deskripsi: Option<String>,
    pub prioritas: Option<ReportPriority>,
    pub lokasi: Option<String>,
    pub pelapor_nama: Option<String>,
    pub pelapor_telepon: Option<String>,
    pub pelapor_email: Option<String>,
    pub petugas_id: Option<Uuid>,
    pub petugas_nama: Option<String>,
    pub petugas_polres: Option<String>,
    pub petugas_hp: Option<String>,
    pub catatan_petugas: Option<String>,
}

/// Quick status change from the reports table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReportStatusRequest {
    pub id: Uuid,
    pub status: ReportStatus,
}

/// Look a report up by its number ("LP001") or its id
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetReportRequest {
    pub reference: String,
}

/// Filters shared by the report list and the export
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportFilter {
    #[serde(default)]
    pub date_from: Option<NaiveDate>,
    #[serde(default)]
    pub date_to: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<ReportStatus>,
    #[serde(default)]
    pub kategori: Option<String>,
    #[serde(default)]
    pub prioritas: Option<ReportPriority>,
}

/// Dashboard statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportStats {
    pub total: i64,
    pub today: i64,
    pub by_status: HashMap<String, i64>,
    pub by_category: HashMap<String, i64>,
    pub emergency: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(koordinat: Option<&str>) -> CreateReportRequest {
        CreateReportRequest {
            jenis: ReportKind::Pengaduan,
            kategori: "kecelakaan".to_string(),
            lokasi: "Jl. Malioboro, Yogyakarta".to_string(),
            deskripsi: None,
            pelapor: "John Doe".to_string(),
            telepon: None,
            email: None,
            prioritas: None,
            koordinat: koordinat.map(str::to_string),
            petugas_nama: None,
            petugas_polres: None,
            petugas_hp: None,
        }
    }

    #[test]
    fn test_title_concatenates_kind_and_location() {
        assert_eq!(request(None).title(), "pengaduan - Jl. Malioboro, Yogyakarta");
    }

    #[test]
    fn test_coordinates_parse_lat_lng_pair() {
        assert_eq!(request(Some("-7.79, 110.36")).coordinates(), Some((-7.79, 110.36)));
        assert_eq!(request(Some("not a point")).coordinates(), None);
        assert_eq!(request(None).coordinates(), None);
    }

    #[test]
    fn test_enum_parse_requires_exact_lowercase() {
        assert_eq!(ReportKind::parse("prank"), Some(ReportKind::Prank));
        assert_eq!(ReportKind::parse("Prank"), None);
        assert_eq!(ReportPriority::parse("darurat"), Some(ReportPriority::Darurat));
        assert_eq!(ReportPriority::default(), ReportPriority::Sedang);
    }

    #[test]
    fn test_imported_report_blank_optionals_become_none() {
        let imported = ImportedReport {
            jenis: ReportKind::Informasi,
            kategori: "lalu lintas".to_string(),
            deskripsi: String::new(),
            prioritas: ReportPriority::Sedang,
            lokasi: "Sleman".to_string(),
            pelapor: "Budi".to_string(),
            telepon: "  ".to_string(),
            email: "budi@email.com".to_string(),
            petugas_nama: String::new(),
            petugas_polres: String::new(),
            petugas_hp: String::new(),
        };
        let req = CreateReportRequest::from(imported);
        assert_eq!(req.telepon, None);
        assert_eq!(req.email.as_deref(), Some("budi@email.com"));
        assert_eq!(req.prioritas, Some(ReportPriority::Sedang));
        assert_eq!(req.title(), "informasi - Sleman");
    }
}
