//! Persists engine progress as a completion percentage.

use async_trait::async_trait;
use tracing::{trace, warn};

use crate::engine::{ProgressSink, ProgressUpdate};
use crate::queue::QueueStore;

/// Converts byte counts into a percentage in `[0, 100]` with two decimals.
///
/// Returns `None` when the total is unknown or zero; nothing should be written
/// in that case.
///
/// Exact ties round half away from zero (`f64::round`), not half to even, so
/// 1 of 32 bytes is `3.13`. The two rules only disagree in the last digit.
#[must_use]
pub fn compute_percent(downloaded: u64, total: Option<u64>) -> Option<f64> {
    let total = total.filter(|&total| total > 0)?;

    #[allow(clippy::cast_precision_loss)]
    let ratio = downloaded as f64 / total as f64;
    let percent = (ratio * 10_000.0).round() / 100.0;
    Some(percent.clamp(0.0, 100.0))
}

/// Writes `percent_done` for one job on every progress notification.
///
/// Updates are not throttled or reordered; the last write wins.
#[derive(Debug)]
pub struct ProgressReporter<'a, S: ?Sized> {
    store: &'a S,
    job_id: i64,
}

impl<'a, S: QueueStore + ?Sized> ProgressReporter<'a, S> {
    #[must_use]
    pub fn new(store: &'a S, job_id: i64) -> Self {
        Self { store, job_id }
    }

    /// Persists the percentage for `downloaded` of `total` bytes.
    ///
    /// Skips the write when the total is unknown. A failed write is logged and
    /// otherwise ignored.
    pub async fn report(&self, downloaded: u64, total: Option<u64>) {
        let Some(percent) = compute_percent(downloaded, total) else {
            trace!(job_id = self.job_id, downloaded, "total size unknown, skipping update");
            return;
        };

        if let Err(error) = self.store.set_percent(self.job_id, percent).await {
            warn!(job_id = self.job_id, percent, error = %error, "progress update failed");
        }
    }
}

#[async_trait]
impl<S: QueueStore + ?Sized> ProgressSink for ProgressReporter<'_, S> {
    async fn on_progress(&self, update: ProgressUpdate) {
        self.report(update.downloaded_bytes, update.total_bytes).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::engine::TransferPhase;
    use crate::worker::testing::{FailingStore, MemoryStore};

    #[test]
    fn test_compute_percent_rounds_to_two_decimals() {
        assert_eq!(compute_percent(400, Some(1000)), Some(40.0));
        assert_eq!(compute_percent(1, Some(3)), Some(33.33));
        assert_eq!(compute_percent(2, Some(3)), Some(66.67));
        assert_eq!(compute_percent(1000, Some(1000)), Some(100.0));
        assert_eq!(compute_percent(0, Some(1000)), Some(0.0));
    }

    #[test]
    fn test_compute_percent_ties_round_away_from_zero() {
        // 1/32 and 5/32 land exactly on x.5 hundredths.
        assert_eq!(compute_percent(1, Some(32)), Some(3.13));
        assert_eq!(compute_percent(5, Some(32)), Some(15.63));
    }

    #[test]
    fn test_compute_percent_unknown_or_zero_total() {
        assert_eq!(compute_percent(500, None), None);
        assert_eq!(compute_percent(500, Some(0)), None);
    }

    #[test]
    fn test_compute_percent_stays_in_range() {
        assert_eq!(compute_percent(5000, Some(1000)), Some(100.0));
        for downloaded in [0, 1, 7, 499, 999, 1000, u64::MAX] {
            let percent = compute_percent(downloaded, Some(1000)).unwrap();
            assert!((0.0..=100.0).contains(&percent), "{percent} out of range");
        }
    }

    #[tokio::test]
    async fn test_reporter_writes_percent() {
        let store = MemoryStore::with_jobs(&[4]);
        let reporter = ProgressReporter::new(&store, 4);

        reporter
            .on_progress(ProgressUpdate {
                downloaded_bytes: 250,
                total_bytes: Some(1000),
                phase: TransferPhase::Downloading,
            })
            .await;

        assert_eq!(store.row(4).percent_done, Some(25.0));
    }

    #[tokio::test]
    async fn test_reporter_unknown_total_keeps_prior_value() {
        let store = MemoryStore::with_jobs(&[4]);
        let reporter = ProgressReporter::new(&store, 4);

        reporter.report(100, Some(200)).await;
        reporter.report(150, None).await;
        reporter.report(175, Some(0)).await;

        assert_eq!(store.row(4).percent_done, Some(50.0));
    }

    #[tokio::test]
    async fn test_reporter_accepts_out_of_order_updates() {
        let store = MemoryStore::with_jobs(&[4]);
        let reporter = ProgressReporter::new(&store, 4);

        reporter.report(800, Some(1000)).await;
        reporter.report(300, Some(1000)).await;

        assert_eq!(store.row(4).percent_done, Some(30.0));
    }

    #[tokio::test]
    async fn test_reporter_swallows_store_failure() {
        let store = FailingStore::default();
        ProgressReporter::new(&store, 1).report(1, Some(2)).await;
        assert_eq!(store.calls(), 1);
    }
}
