//! Row normalization into canonical import records

use super::row::{display_row_number, CellValue, FieldSpec, RawRow};
use super::validator::{check_enum, check_rating, require_fields, RowError};
use crate::types::{FeedbackType, ImportedFeedback, ImportedReport, ReportKind, ReportPriority};

// =============================================================================
// REPORT COLUMNS
// =============================================================================

pub mod report_fields {
    use super::FieldSpec;

    pub const JENIS: FieldSpec = FieldSpec::new("jenis", &["Jenis", "JENIS", "jenis_laporan"]);
    pub const KATEGORI: FieldSpec = FieldSpec::new("kategori", &["Kategori", "sub_kategori"]);
    pub const DESKRIPSI: FieldSpec = FieldSpec::new("deskripsi", &["Deskripsi", "description"]);
    pub const PRIORITAS: FieldSpec = FieldSpec::new("prioritas", &["Prioritas", "priority"]);
    pub const LOKASI: FieldSpec = FieldSpec::new("lokasi", &["Lokasi", "location"]);
    pub const PELAPOR: FieldSpec = FieldSpec::new("pelapor", &["Pelapor", "pelapor_nama", "nama_pelapor"]);
    pub const TELEPON: FieldSpec = FieldSpec::new("telepon", &["Telepon", "pelapor_telepon", "no_hp"]);
    pub const EMAIL: FieldSpec = FieldSpec::new("email", &["Email", "pelapor_email", "E-mail"]);
    pub const PETUGAS_NAMA: FieldSpec = FieldSpec::new("petugasNama", &["petugas_nama", "Petugas Nama", "Nama Petugas"]);
    pub const PETUGAS_POLRES: FieldSpec = FieldSpec::new("petugasPolres", &["petugas_polres", "Petugas Polres", "Polres"]);
    pub const PETUGAS_HP: FieldSpec = FieldSpec::new("petugasHp", &["petugas_hp", "Petugas HP", "HP Petugas"]);

    pub const REQUIRED: [FieldSpec; 4] = [JENIS, KATEGORI, LOKASI, PELAPOR];

    /// Template column order
    pub const ALL: [FieldSpec; 11] = [
        JENIS, KATEGORI, DESKRIPSI, PRIORITAS, LOKASI, PELAPOR,
        TELEPON, EMAIL, PETUGAS_NAMA, PETUGAS_POLRES, PETUGAS_HP,
    ];
}

// =============================================================================
// FEEDBACK COLUMNS
// =============================================================================

pub mod feedback_fields {
    use super::FieldSpec;

    pub const FEEDBACK_TYPE: FieldSpec =
        FieldSpec::new("feedback_type", &["Feedback Type", "feedback type", "jenis_feedback"]);
    pub const SUBJECT: FieldSpec = FieldSpec::new("subject", &["Subject", "subjek", "judul"]);
    pub const MESSAGE: FieldSpec = FieldSpec::new("message", &["Message", "pesan", "isi"]);
    pub const RATING: FieldSpec = FieldSpec::new("rating", &["Rating", "nilai", "penilaian"]);
    pub const EMAIL: FieldSpec = FieldSpec::new("email", &["Email", "E-mail"]);
    pub const NAMA: FieldSpec = FieldSpec::new("nama", &["Nama", "name", "Name"]);

    pub const REQUIRED: [FieldSpec; 5] = [FEEDBACK_TYPE, SUBJECT, MESSAGE, RATING, NAMA];

    /// Template column order
    pub const ALL: [FieldSpec; 6] = [FEEDBACK_TYPE, SUBJECT, MESSAGE, RATING, EMAIL, NAMA];
}

const REPORT_KINDS: [&str; 4] = ["pengaduan", "informasi", "prank", "permintaan"];
const REPORT_PRIORITIES: [&str; 4] = ["rendah", "sedang", "tinggi", "darurat"];
const FEEDBACK_TYPES: [&str; 5] = ["saran", "keluhan", "pujian", "bug_report", "fitur_request"];

/// Normalize and validate one report row. `index` is the 0-based data row index.
pub fn normalize_report(row: &RawRow, index: usize) -> Result<ImportedReport, RowError> {
    use report_fields::*;

    let row_number = display_row_number(index);
    require_fields(row, row_number, &REQUIRED)?;

    let jenis_cell = row.resolve(&JENIS).unwrap_or(&CellValue::Empty);
    let jenis = check_enum(jenis_cell, row_number, "Jenis", &REPORT_KINDS, ReportKind::parse)?;

    // Absent priority defaults; a provided but unknown one is rejected
    let prioritas = match row.resolve(&PRIORITAS) {
        Some(raw) => check_enum(raw, row_number, "Prioritas", &REPORT_PRIORITIES, ReportPriority::parse)?,
        None => ReportPriority::default(),
    };

    Ok(ImportedReport {
        jenis,
        kategori: row.text(&KATEGORI),
        deskripsi: row.text(&DESKRIPSI),
        prioritas,
        lokasi: row.text(&LOKASI),
        pelapor: row.text(&PELAPOR),
        telepon: row.text(&TELEPON),
        email: row.text(&EMAIL),
        petugas_nama: row.text(&PETUGAS_NAMA),
        petugas_polres: row.text(&PETUGAS_POLRES),
        petugas_hp: row.text(&PETUGAS_HP),
    })
}

/// Normalize and validate one feedback row. `index` is the 0-based data row index.
pub fn normalize_feedback(row: &RawRow, index: usize) -> Result<ImportedFeedback, RowError> {
    use feedback_fields::*;

    let row_number = display_row_number(index);
    require_fields(row, row_number, &REQUIRED)?;

    let type_cell = row.resolve(&FEEDBACK_TYPE).unwrap_or(&CellValue::Empty);
    let rating_cell = row.resolve(&RATING).unwrap_or(&CellValue::Empty);

    let feedback_type = check_enum(type_cell, row_number, "Jenis feedback", &FEEDBACK_TYPES, FeedbackType::parse)?;
    let rating = check_rating(rating_cell, row_number)?;

    let email = row.resolve(&EMAIL).map(|cell| cell.trimmed());

    Ok(ImportedFeedback {
        feedback_type,
        subject: row.text(&SUBJECT),
        message: row.text(&MESSAGE),
        rating,
        email,
        nama: row.text(&NAMA),
    })
}
