//! Worker liveness cell.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

/// Last-written worker heartbeat, shared between the worker loop (writer)
/// and the health endpoint (reader). Zero means the worker has not beaten
/// yet.
#[derive(Debug, Default)]
pub struct Heartbeat {
    epoch_millis: AtomicI64,
}

impl Heartbeat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp the current instant. Called once per worker loop iteration.
    pub fn beat(&self) {
        self.epoch_millis
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn last(&self) -> Option<DateTime<Utc>> {
        let millis = self.epoch_millis.load(Ordering::Relaxed);
        if millis == 0 {
            return None;
        }
        Utc.timestamp_millis_opt(millis).single()
    }

    /// Alive iff the last beat is younger than `threshold`.
    pub fn is_alive(&self, threshold: Duration) -> bool {
        match self.last() {
            Some(last) => {
                let age = Utc::now().signed_duration_since(last);
                age.num_milliseconds() >= 0 && (age.num_milliseconds() as u128) < threshold.as_millis()
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_dead() {
        let heartbeat = Heartbeat::new();
        assert!(heartbeat.last().is_none());
        assert!(!heartbeat.is_alive(Duration::from_secs(10)));
    }

    #[test]
    fn beat_makes_it_alive() {
        let heartbeat = Heartbeat::new();
        heartbeat.beat();
        assert!(heartbeat.last().is_some());
        assert!(heartbeat.is_alive(Duration::from_secs(10)));
    }

    #[test]
    fn stale_beat_reads_dead() {
        let heartbeat = Heartbeat::new();
        heartbeat.beat();
        std::thread::sleep(Duration::from_millis(30));
        assert!(!heartbeat.is_alive(Duration::from_millis(10)));
    }
}
