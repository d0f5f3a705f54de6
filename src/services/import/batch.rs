//! Sequential batch import
//!
//! Rows are folded one at a time: normalize, validate, await the create
//! call, record the outcome. A row failure is recorded and the fold moves
//! on; only the caller's parse step can fail a whole batch.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use super::row::{display_row_number, RawRow};
use super::validator::RowError;
use crate::types::{ImportBatchResult, MAX_DISPLAYED_ERRORS};

/// Progress is reported every N rows (and on the last row)
pub const PROGRESS_INTERVAL: usize = 10;

/// Message used when a create failure carries no message of its own
pub const UNKNOWN_ERROR: &str = "Error tidak diketahui";

/// Identity of a persisted record
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedRecord {
    pub id: Uuid,
    /// Server-assigned reference (report number), if any
    pub reference: Option<String>,
}

/// Rejection from the create collaborator
#[derive(Debug, Clone, Default, PartialEq, Error)]
#[error("{}", .message.as_deref().unwrap_or(UNKNOWN_ERROR))]
pub struct CreateError {
    pub message: Option<String>,
    pub code: Option<String>,
}

impl CreateError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Persists one normalized record
#[async_trait]
pub trait RecordCreator<R: Sync>: Send + Sync {
    async fn create(&self, record: &R) -> Result<CreatedRecord, CreateError>;
}

/// Snapshot of a running batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    pub processed: u32,
    pub total: u32,
    pub succeeded: u32,
    pub failed: u32,
}

/// Receives progress snapshots while a batch runs
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, progress: BatchProgress);
}

/// Running tally; only the first `MAX_DISPLAYED_ERRORS` messages are kept
#[derive(Debug, Default)]
struct Tally {
    result: ImportBatchResult,
}

impl Tally {
    fn succeed(&mut self) {
        self.result.success += 1;
    }

    fn fail(&mut self, message: String) {
        self.result.failed += 1;
        if self.result.errors.len() < MAX_DISPLAYED_ERRORS {
            self.result.errors.push(message);
        }
    }

    fn progress(&self, processed: usize, total: usize) -> BatchProgress {
        BatchProgress {
            processed: saturating_u32(processed),
            total: saturating_u32(total),
            succeeded: self.result.success,
            failed: self.result.failed,
        }
    }
}

fn saturating_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Message recorded for a rejected create: the collaborator's own message
/// as received, or the row-numbered fallback when it has none
fn rejection_message(err: CreateError, index: usize) -> String {
    match err.message {
        Some(message) => message,
        None => format!("Baris {}: {}", display_row_number(index), UNKNOWN_ERROR),
    }
}

/// Run every row through `normalize` and `creator`, in order.
///
/// Each create call completes before the next row starts. Counts are
/// exact; `errors` holds at most `MAX_DISPLAYED_ERRORS` messages.
pub async fn run_batch<R, N, C>(
    rows: &[RawRow],
    normalize: N,
    creator: &C,
    progress: Option<&dyn ProgressSink>,
) -> ImportBatchResult
where
    R: Sync,
    N: Fn(&RawRow, usize) -> Result<R, RowError>,
    C: RecordCreator<R> + ?Sized,
{
    let total = rows.len();
    let mut tally = Tally::default();

    for (index, row) in rows.iter().enumerate() {
        match normalize(row, index) {
            Ok(record) => match creator.create(&record).await {
                Ok(_) => tally.succeed(),
                Err(err) => tally.fail(rejection_message(err, index)),
            },
            Err(err) => tally.fail(err.to_string()),
        }

        let processed = index + 1;
        if let Some(sink) = progress {
            if processed % PROGRESS_INTERVAL == 0 || processed == total {
                sink.report(tally.progress(processed, total)).await;
            }
        }
    }

    tally.result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::import::normalizer::{normalize_feedback, normalize_report};
    use crate::types::{ImportedFeedback, ImportedReport};
    use parking_lot::Mutex;
    use std::collections::HashSet;

    /// Creator that remembers what it received and rejects chosen calls
    #[derive(Default)]
    struct FakeCreator {
        created: Mutex<Vec<String>>,
        reject_calls: HashSet<usize>,
        reject_without_message: bool,
        in_flight: Mutex<u32>,
    }

    impl FakeCreator {
        fn rejecting(calls: &[usize]) -> Self {
            Self {
                reject_calls: calls.iter().copied().collect(),
                ..Default::default()
            }
        }

        async fn record(&self, key: String) -> Result<CreatedRecord, CreateError> {
            {
                let mut in_flight = self.in_flight.lock();
                *in_flight += 1;
                assert_eq!(*in_flight, 1, "create calls must not overlap");
            }
            tokio::task::yield_now().await;

            let call = {
                let mut created = self.created.lock();
                created.push(key);
                created.len()
            };
            *self.in_flight.lock() -= 1;

            if self.reject_calls.contains(&call) {
                if self.reject_without_message {
                    return Err(CreateError::default());
                }
                return Err(CreateError::new("duplicate key value").with_code("23505"));
            }
            Ok(CreatedRecord {
                id: Uuid::new_v4(),
                reference: Some(format!("LP{:03}", call)),
            })
        }
    }

    #[async_trait]
    impl RecordCreator<ImportedReport> for FakeCreator {
        async fn create(&self, record: &ImportedReport) -> Result<CreatedRecord, CreateError> {
            self.record(record.lokasi.clone()).await
        }
    }

    #[async_trait]
    impl RecordCreator<ImportedFeedback> for FakeCreator {
        async fn create(&self, record: &ImportedFeedback) -> Result<CreatedRecord, CreateError> {
            self.record(record.subject.clone()).await
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        snapshots: Mutex<Vec<BatchProgress>>,
    }

    #[async_trait]
    impl ProgressSink for RecordingSink {
        async fn report(&self, progress: BatchProgress) {
            self.snapshots.lock().push(progress);
        }
    }

    fn report_row(i: usize) -> RawRow {
        RawRow::new()
            .with("jenis", "pengaduan")
            .with("kategori", "kecelakaan")
            .with("lokasi", format!("Lokasi {}", i).as_str())
            .with("pelapor", "Budi")
    }

    fn report_row_without_location() -> RawRow {
        RawRow::new()
            .with("jenis", "pengaduan")
            .with("kategori", "kecelakaan")
            .with("pelapor", "Budi")
    }

    #[tokio::test]
    async fn test_malformed_rows_are_counted_and_skipped() {
        let rows: Vec<RawRow> = (0..12)
            .map(|i| if i == 3 || i == 7 { report_row_without_location() } else { report_row(i) })
            .collect();
        let creator = FakeCreator::default();

        let result = run_batch(&rows, normalize_report, &creator, None).await;

        assert_eq!(result.success, 10);
        assert_eq!(result.failed, 2);
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[0].starts_with("Baris 5:"));
        assert!(result.errors[1].starts_with("Baris 9:"));
        assert_eq!(creator.created.lock().len(), 10);
    }

    #[tokio::test]
    async fn test_error_list_is_capped_but_counts_are_exact() {
        let rows: Vec<RawRow> = (0..20)
            .map(|i| if i < 15 { report_row_without_location() } else { report_row(i) })
            .collect();

        let result = run_batch(&rows, normalize_report, &FakeCreator::default(), None).await;

        assert_eq!(result.failed, 15);
        assert_eq!(result.success, 5);
        assert_eq!(result.errors.len(), MAX_DISPLAYED_ERRORS);
        assert!(result.errors[0].starts_with("Baris 2:"));
        assert!(result.errors[9].starts_with("Baris 11:"));
    }

    #[tokio::test]
    async fn test_create_rejection_does_not_abort_batch() {
        let rows: Vec<RawRow> = (0..8).map(report_row).collect();
        let creator = FakeCreator::rejecting(&[5]);

        let result = run_batch(&rows, normalize_report, &creator, None).await;

        assert_eq!(result.success, 7);
        assert_eq!(result.failed, 1);
        // The collaborator's message is kept exactly as received
        assert_eq!(result.errors, vec!["duplicate key value".to_string()]);
        // Rows after the rejection were still attempted, in order
        let created = creator.created.lock();
        assert_eq!(created.len(), 8);
        assert_eq!(created[7], "Lokasi 7");
    }

    #[tokio::test]
    async fn test_rejection_without_message_uses_fallback() {
        let rows: Vec<RawRow> = (0..3).map(report_row).collect();
        let creator = FakeCreator {
            reject_without_message: true,
            ..FakeCreator::rejecting(&[2])
        };

        let result = run_batch(&rows, normalize_report, &creator, None).await;

        assert_eq!(result.errors, vec![format!("Baris 3: {}", UNKNOWN_ERROR)]);
    }

    #[tokio::test]
    async fn test_success_plus_failed_equals_row_count() {
        for n in [0usize, 1, 9, 10, 23] {
            let rows: Vec<RawRow> = (0..n)
                .map(|i| if i % 4 == 0 { report_row_without_location() } else { report_row(i) })
                .collect();
            let creator = FakeCreator::rejecting(&[2, 3]);
            let result = run_batch(&rows, normalize_report, &creator, None).await;
            assert_eq!(result.total() as usize, n);
        }
    }

    #[tokio::test]
    async fn test_progress_reported_every_interval_and_at_end() {
        let rows: Vec<RawRow> = (0..23).map(report_row).collect();
        let sink = RecordingSink::default();

        run_batch(&rows, normalize_report, &FakeCreator::default(), Some(&sink)).await;

        let snapshots = sink.snapshots.lock();
        let processed: Vec<u32> = snapshots.iter().map(|p| p.processed).collect();
        assert_eq!(processed, vec![10, 20, 23]);
        assert!(snapshots.iter().all(|p| p.total == 23));
        assert_eq!(snapshots[2].succeeded, 23);
    }

    #[tokio::test]
    async fn test_feedback_batch_with_invalid_rating() {
        let row = |rating: &str| {
            RawRow::new()
                .with("feedback_type", "pujian")
                .with("subject", "Respon cepat")
                .with("message", "Terima kasih")
                .with("rating", rating)
                .with("nama", "Sari")
        };
        let rows = vec![row("5"), row("7"), row("4.5")];

        let result = run_batch(&rows, normalize_feedback, &FakeCreator::default(), None).await;

        assert_eq!(result.success, 2);
        assert_eq!(result.failed, 1);
        assert!(result.errors[0].starts_with("Baris 3: Rating"));
    }

    #[test]
    fn test_empty_sheet_creates_nothing() {
        let creator = FakeCreator::default();
        let sink = RecordingSink::default();

        let result = tokio_test::block_on(run_batch(&[], normalize_report, &creator, Some(&sink)));

        assert_eq!(result.total(), 0);
        assert!(result.errors.is_empty());
        assert!(creator.created.lock().is_empty());
    }

    #[test]
    fn test_counts_saturate_instead_of_wrapping() {
        assert_eq!(saturating_u32(42), 42);
        #[cfg(target_pointer_width = "64")]
        assert_eq!(saturating_u32(u32::MAX as usize + 5), u32::MAX);
    }

    #[test]
    fn test_create_error_display() {
        assert_eq!(CreateError::default().to_string(), UNKNOWN_ERROR);
        assert_eq!(CreateError::new("timeout").to_string(), "timeout");
    }
}
