use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Online throughput estimator driving dynamic stash/chunk sizing.
///
/// Callers pass in the current `Instant` explicitly rather than the sampler
/// reaching for `Instant::now()` itself, the same way
/// `turntable_core::playback::wait_for_next` and the `condow` downloader's
/// `DownloadersWatcher` thread an explicit `Instant` through instead of
/// hiding the clock — it keeps the arithmetic here exercisable with
/// synthetic timestamps in tests.
pub struct SpeedSampler {
    inner: Mutex<Inner>,
}

struct Inner {
    first_checkpoint: Option<Instant>,
    last_checkpoint: Option<Instant>,
    interval_bytes: u64,
    total_bytes: u64,
    last_second_bytes: u64,
}

impl Default for SpeedSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeedSampler {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                first_checkpoint: None,
                last_checkpoint: None,
                interval_bytes: 0,
                total_bytes: 0,
                last_second_bytes: 0,
            }),
        }
    }

    /// Records `n` newly-arrived bytes at time `now`.
    pub fn add_bytes(&self, n: usize, now: Instant) {
        let mut inner = self.inner.lock();
        let n = n as u64;

        match inner.last_checkpoint {
            None => {
                inner.first_checkpoint = Some(now);
                inner.last_checkpoint = Some(now);
                inner.interval_bytes += n;
                inner.total_bytes += n;
            }
            Some(last) if now.saturating_duration_since(last) < Duration::from_millis(1000) => {
                inner.interval_bytes += n;
                inner.total_bytes += n;
            }
            Some(_) => {
                inner.last_second_bytes = inner.interval_bytes;
                inner.interval_bytes = n;
                inner.total_bytes += n;
                inner.last_checkpoint = Some(now);
            }
        }
    }

    /// Instantaneous throughput in KiB/s for the bytes seen since the last
    /// checkpoint rotation.
    pub fn current_kbps(&self, now: Instant) -> f64 {
        let inner = self.inner.lock();
        Self::current_kbps_locked(&inner, now)
    }

    fn current_kbps_locked(inner: &Inner, now: Instant) -> f64 {
        let Some(last) = inner.last_checkpoint else {
            return 0.0;
        };

        let elapsed_ms = now
            .saturating_duration_since(last)
            .as_millis()
            .max(1) as f64;

        inner.interval_bytes as f64 / elapsed_ms * 1000.0 / 1024.0
    }

    /// Throughput over the last full second, in KiB/s. Implicitly rotates
    /// the sampling window the same way a real `add_bytes(0)` call would.
    pub fn last_second_kbps(&self, now: Instant) -> f64 {
        self.add_bytes(0, now);
        let inner = self.inner.lock();

        if inner.last_second_bytes > 0 {
            return inner.last_second_bytes as f64 / 1024.0;
        }

        let Some(last) = inner.last_checkpoint else {
            return 0.0;
        };

        if now.saturating_duration_since(last) >= Duration::from_millis(500) {
            Self::current_kbps_locked(&inner, now)
        } else {
            0.0
        }
    }

    /// Average throughput across the whole session, in KiB/s.
    pub fn average_kbps(&self, now: Instant) -> f64 {
        let inner = self.inner.lock();
        let Some(first) = inner.first_checkpoint else {
            return 0.0;
        };

        let elapsed_ms = now.saturating_duration_since(first).as_millis().max(1) as f64;
        inner.total_bytes as f64 / elapsed_ms * 1000.0 / 1024.0
    }

    /// Resets the sampler to its initial, never-sampled state.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.first_checkpoint = None;
        inner.last_checkpoint = None;
        inner.interval_bytes = 0;
        inner.total_bytes = 0;
        inner.last_second_bytes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_bytes_accumulates_within_window() {
        let sampler = SpeedSampler::new();
        let t0 = Instant::now();

        sampler.add_bytes(1024, t0);
        sampler.add_bytes(1024, t0 + Duration::from_millis(500));

        // Still within the first 1000ms window.
        assert_eq!(sampler.last_second_kbps(t0 + Duration::from_millis(600)), 0.0);
    }

    #[test]
    fn test_last_second_kbps_after_rotation() {
        let sampler = SpeedSampler::new();
        let t0 = Instant::now();

        sampler.add_bytes(2048 * 1024, t0);
        // Past the 1000ms boundary: rotates interval_bytes into last_second_bytes.
        sampler.add_bytes(0, t0 + Duration::from_millis(1001));

        assert_eq!(sampler.last_second_kbps(t0 + Duration::from_millis(1001)), 2048.0);
    }

    #[test]
    fn test_average_kbps() {
        let sampler = SpeedSampler::new();
        let t0 = Instant::now();

        sampler.add_bytes(1024 * 1024, t0);
        let avg = sampler.average_kbps(t0 + Duration::from_millis(2000));

        assert!((avg - 512.0).abs() < 1.0, "avg was {avg}");
    }

    #[test]
    fn test_reset_clears_state() {
        let sampler = SpeedSampler::new();
        let t0 = Instant::now();

        sampler.add_bytes(4096, t0);
        sampler.reset();

        assert_eq!(sampler.average_kbps(t0), 0.0);
        assert_eq!(sampler.last_second_kbps(t0), 0.0);
    }
}
