use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Progress of `sent` out of `total` bytes, in percent.
///
/// An empty transfer is reported as complete.
pub fn percent(sent: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (sent as f64 / total as f64) * 100.0
}

/// Formats a byte count with binary prefixes (`1.50 GiB`, `12.00 MiB`, `512 B`).
///
/// A prefix is used once the value reaches 90 % of the unit.
pub fn format_bytes(num: u64) -> String {
    const UNITS: [(&str, u64); 3] = [("Gi", 1 << 30), ("Mi", 1 << 20), ("ki", 1 << 10)];
    for (prefix, value) in UNITS {
        if num as f64 >= value as f64 * 0.9 {
            return format!("{:.2} {prefix}B", num as f64 / value as f64);
        }
    }
    format!("{num} B")
}

/// Time left to send `remaining` bytes at `bytes_per_second`, if the rate
/// is known.
pub fn eta(remaining: u64, bytes_per_second: f64) -> Option<Duration> {
    (bytes_per_second > 0.0).then(|| Duration::from_secs_f64(remaining as f64 / bytes_per_second))
}

/// Upload rate over a sliding window of acknowledged ranges.
///
/// The first sample marks the start of the window; its bytes are not
/// counted.
#[derive(Debug)]
pub struct SpeedCalculator {
    samples: VecDeque<(Instant, u64)>,
    window: Duration,
    max_samples: usize,
}

impl Default for SpeedCalculator {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), 100)
    }
}

impl SpeedCalculator {
    pub fn new(window: Duration, max_samples: usize) -> Self {
        Self {
            samples: VecDeque::new(),
            window,
            max_samples: max_samples.max(2),
        }
    }

    /// Records `bytes` acknowledged now.
    pub fn record(&mut self, bytes: u64) {
        self.record_at(Instant::now(), bytes);
    }

    fn record_at(&mut self, at: Instant, bytes: u64) {
        self.samples.push_back((at, bytes));
        while self.samples.len() > self.max_samples {
            self.samples.pop_front();
        }
        while let Some(&(oldest, _)) = self.samples.front() {
            if self.samples.len() > 2 && at.duration_since(oldest) > self.window {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Average rate in bytes/second, 0.0 until two samples span some time.
    pub fn bytes_per_second(&self) -> f64 {
        let (Some(&(first, _)), Some(&(last, _))) = (self.samples.front(), self.samples.back())
        else {
            return 0.0;
        };
        let elapsed = last.duration_since(first);
        if elapsed.is_zero() {
            return 0.0;
        }
        let bytes: u64 = self.samples.iter().skip(1).map(|&(_, b)| b).sum();
        bytes as f64 / elapsed.as_secs_f64()
    }
}
