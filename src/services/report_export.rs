//! Report export for the download page
//!
//! Filtered reports are rendered to xlsx (Title-case headers, sheet
//! `Laporan`) or csv (snake_case headers) and handed back as base64.

use anyhow::{Context, Result};
use base64::Engine;
use chrono::{DateTime, NaiveDate, Utc};
use rust_xlsxwriter::{Format, Workbook};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::db::queries;
use crate::types::{FileDownloadResponse, ReportExportRow, ReportFilter, XLSX_CONTENT_TYPE};

pub const NO_MATCHING_REPORTS: &str = "Tidak ada laporan yang sesuai dengan filter";

const XLSX_HEADERS: [&str; 14] = [
    "Nomor Laporan", "Judul", "Deskripsi", "Kategori", "Status", "Prioritas", "Lokasi",
    "Pelapor", "Telepon Pelapor", "Email Pelapor", "Tanggal Laporan", "Petugas",
    "Catatan Petugas", "Tanggal Selesai",
];

const CSV_HEADERS: [&str; 14] = [
    "nomor_laporan", "judul", "deskripsi", "kategori", "status", "prioritas", "lokasi",
    "pelapor_nama", "pelapor_telepon", "pelapor_email", "tanggal_laporan", "petugas",
    "catatan_petugas", "tanggal_selesai",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Xlsx,
    Csv,
}

impl ExportFormat {
    fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
        }
    }

    fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => XLSX_CONTENT_TYPE,
            ExportFormat::Csv => "text/csv",
        }
    }
}

/// Payload of `simola.report.export`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportExportRequest {
    #[serde(default)]
    pub format: ExportFormat,
    #[serde(flatten)]
    pub filter: ReportFilter,
}

/// Load the matching reports and render them
pub async fn export_reports(pool: &PgPool, request: &ReportExportRequest) -> Result<FileDownloadResponse> {
    let rows = queries::report::list_reports_for_export(pool, &request.filter).await?;
    render_export(&rows, request.format, Utc::now().date_naive())
}

/// Render rows into a download; an empty selection is an error
pub fn render_export(rows: &[ReportExportRow], format: ExportFormat, today: NaiveDate) -> Result<FileDownloadResponse> {
    if rows.is_empty() {
        anyhow::bail!(NO_MATCHING_REPORTS);
    }

    let bytes = match format {
        ExportFormat::Xlsx => render_xlsx(rows)?,
        ExportFormat::Csv => render_csv(rows)?,
    };

    Ok(FileDownloadResponse {
        filename: format!("laporan_{}.{}", today.format("%Y-%m-%d"), format.extension()),
        content_type: format.content_type().to_string(),
        size_bytes: bytes.len() as u64,
        file_base64: base64::engine::general_purpose::STANDARD.encode(&bytes),
    })
}

/// Dates as the dashboard shows them (d/m/yyyy)
fn display_date(value: &DateTime<Utc>) -> String {
    value.format("%-d/%-m/%Y").to_string()
}

/// One export line; `missing` fills absent officer/notes/completion cells
fn export_cells(row: &ReportExportRow, missing: &str) -> [String; 14] {
    let report = &row.report;
    [
        report.nomor_laporan.clone(),
        report.judul.clone(),
        report.deskripsi.clone().unwrap_or_default(),
        report.kategori.clone(),
        report.status.to_string(),
        report.prioritas.to_string(),
        report.lokasi.clone(),
        report.pelapor_nama.clone(),
        report.pelapor_telepon.clone().unwrap_or_default(),
        report.pelapor_email.clone().unwrap_or_default(),
        display_date(&report.created_at),
        row.officer().unwrap_or(missing).to_string(),
        report.catatan_petugas.clone().unwrap_or_else(|| missing.to_string()),
        report
            .tanggal_selesai
            .as_ref()
            .map(display_date)
            .unwrap_or_else(|| missing.to_string()),
    ]
}

fn render_xlsx(rows: &[ReportExportRow]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let sheet = workbook.add_worksheet().set_name("Laporan")?;

    for (col, header) in XLSX_HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, &header_format)?;
    }
    for (r, row) in rows.iter().enumerate() {
        for (col, cell) in export_cells(row, "-").iter().enumerate() {
            sheet.write_string(r as u32 + 1, col as u16, cell)?;
        }
    }

    workbook.save_to_buffer().context("Gagal membuat file Excel")
}

fn render_csv(rows: &[ReportExportRow]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADERS)?;
    for row in rows {
        writer.write_record(export_cells(row, ""))?;
    }
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Gagal membuat file CSV: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::import::workbook::read_first_sheet;
    use crate::services::import::CellValue;
    use crate::types::{Report, ReportKind, ReportPriority, ReportStatus};
    use chrono::TimeZone;
    use uuid::Uuid;

    fn row(nomor: &str, selesai: bool, petugas_profil: Option<&str>) -> ReportExportRow {
        let created = Utc.with_ymd_and_hms(2025, 3, 7, 8, 30, 0).unwrap();
        ReportExportRow {
            report: Report {
                id: Uuid::new_v4(),
                nomor_laporan: nomor.to_string(),
                jenis: ReportKind::Pengaduan,
                judul: "pengaduan - Jl. Malioboro".to_string(),
                kategori: "kecelakaan".to_string(),
                deskripsi: Some("Tabrakan motor".to_string()),
                prioritas: ReportPriority::Tinggi,
                status: if selesai { ReportStatus::Selesai } else { ReportStatus::Menunggu },
                lokasi: "Jl. Malioboro".to_string(),
                pelapor_nama: "John Doe".to_string(),
                pelapor_telepon: Some("081234567890".to_string()),
                pelapor_email: None,
                koordinat_lat: None,
                koordinat_lng: None,
                petugas_id: None,
                petugas_nama: Some("Bripka Ahmad".to_string()),
                petugas_polres: None,
                petugas_hp: None,
                catatan_petugas: None,
                tanggal_laporan: created,
                tanggal_selesai: selesai.then(|| Utc.with_ymd_and_hms(2025, 3, 8, 10, 0, 0).unwrap()),
                created_at: created,
                updated_at: created,
            },
            petugas_profil: petugas_profil.map(str::to_string),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 9).unwrap()
    }

    #[test]
    fn test_empty_selection_is_an_error() {
        let err = render_export(&[], ExportFormat::Xlsx, today()).unwrap_err();
        assert_eq!(err.to_string(), NO_MATCHING_REPORTS);
    }

    #[test]
    fn test_csv_export_uses_snake_case_headers_and_blank_fill() {
        let file = render_export(&[row("LP001", false, None)], ExportFormat::Csv, today()).unwrap();
        assert_eq!(file.filename, "laporan_2025-03-09.csv");
        assert_eq!(file.content_type, "text/csv");

        let bytes = base64::engine::general_purpose::STANDARD.decode(&file.file_base64).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("nomor_laporan,judul,deskripsi"));
        let data = lines.next().unwrap();
        assert!(data.starts_with("LP001,"));
        assert!(data.contains("7/3/2025"));
        assert!(data.ends_with("Bripka Ahmad,,"));
    }

    #[test]
    fn test_xlsx_export_reads_back() {
        let rows = vec![row("LP001", true, Some("Aipda Sari")), row("LP002", false, None)];
        let file = render_export(&rows, ExportFormat::Xlsx, today()).unwrap();
        assert_eq!(file.filename, "laporan_2025-03-09.xlsx");

        let bytes = base64::engine::general_purpose::STANDARD.decode(&file.file_base64).unwrap();
        assert_eq!(file.size_bytes, bytes.len() as u64);

        let sheet = read_first_sheet(bytes).unwrap();
        assert_eq!(sheet.len(), 2);
        assert_eq!(sheet[0].get("Nomor Laporan"), Some(&CellValue::Text("LP001".into())));
        assert_eq!(sheet[0].get("Petugas"), Some(&CellValue::Text("Aipda Sari".into())));
        assert_eq!(sheet[0].get("Tanggal Selesai"), Some(&CellValue::Text("8/3/2025".into())));
        assert_eq!(sheet[1].get("Tanggal Selesai"), Some(&CellValue::Text("-".into())));
        assert_eq!(sheet[1].get("Catatan Petugas"), Some(&CellValue::Text("-".into())));
    }

    #[test]
    fn test_export_request_flattens_filter() {
        let json = r#"{"format":"csv","status":"diproses","dateFrom":"2025-01-01"}"#;
        let req: ReportExportRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.format, ExportFormat::Csv);
        assert_eq!(req.filter.status, Some(ReportStatus::Diproses));
        assert_eq!(req.filter.date_from, NaiveDate::from_ymd_opt(2025, 1, 1));
    }
}
