use std::time::{Duration, Instant};

use crate::progress::percent;

/// Ephemeral state of one transfer invocation.
///
/// Tracks confirmed bytes and the index of the next range to send. Nothing
/// here is persisted: a new invocation always starts from zero.
#[derive(Debug)]
pub struct TransferAttempt {
    id: String,
    total_bytes: u64,
    bytes_sent: u64,
    range_index: usize,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
}

impl TransferAttempt {
    /// Creates an attempt for an object of `total_bytes`.
    pub fn new(total_bytes: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            total_bytes,
            bytes_sent: 0,
            range_index: 0,
            started_at: None,
            finished_at: None,
        }
    }

    /// Starts the clock.
    pub fn start(&mut self) {
        self.started_at = Some(Instant::now());
    }

    /// Records an acknowledged range of `bytes` and advances to the next one.
    pub fn confirm_range(&mut self, bytes: u64) {
        self.bytes_sent = self.bytes_sent.saturating_add(bytes);
        self.range_index += 1;
    }

    /// Stops the clock, whether the attempt succeeded or not.
    pub fn finish(&mut self) {
        self.finished_at.get_or_insert_with(Instant::now);
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Index of the next range to send.
    pub fn range_index(&self) -> usize {
        self.range_index
    }

    /// Confirmed progress in percent (100.0 for an empty object).
    pub fn percent(&self) -> f64 {
        percent(self.bytes_sent, self.total_bytes)
    }

    /// Time since [`start`](Self::start), frozen once the attempt ends.
    pub fn elapsed(&self) -> Duration {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => end.duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_attempt_starts_from_zero() {
        let attempt = TransferAttempt::new(3072);
        assert_eq!(attempt.bytes_sent(), 0);
        assert_eq!(attempt.range_index(), 0);
        assert_eq!(attempt.id().len(), 32);
    }

    #[test]
    fn attempts_have_distinct_ids() {
        assert_ne!(TransferAttempt::new(1).id(), TransferAttempt::new(1).id());
    }

    #[test]
    fn confirm_range_advances() {
        let mut attempt = TransferAttempt::new(300);
        attempt.start();
        attempt.confirm_range(100);
        assert_eq!(attempt.bytes_sent(), 100);
        assert_eq!(attempt.range_index(), 1);
        attempt.confirm_range(100);
        attempt.confirm_range(100);
        assert_eq!(attempt.bytes_sent(), 300);
        assert_eq!(attempt.range_index(), 3);
        assert!((attempt.percent() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn finish_freezes_elapsed() {
        let mut attempt = TransferAttempt::new(10);
        attempt.start();
        attempt.confirm_range(4);
        attempt.finish();
        assert_eq!(attempt.bytes_sent(), 4);
        let frozen = attempt.elapsed();
        std::thread::sleep(Duration::from_millis(5));
        attempt.finish();
        assert_eq!(attempt.elapsed(), frozen);
    }

    #[test]
    fn elapsed_is_zero_before_start() {
        assert_eq!(TransferAttempt::new(10).elapsed(), Duration::ZERO);
    }

    #[test]
    fn empty_object_reports_full_progress() {
        let attempt = TransferAttempt::new(0);
        assert!((attempt.percent() - 100.0).abs() < f64::EPSILON);
    }
}
