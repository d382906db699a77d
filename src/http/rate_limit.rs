use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum interval between consecutive requests
///
/// One limiter is shared by every clone of a connector's client, so
/// concurrent callers queue behind the lock instead of bursting.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_request_time: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request_time: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits until a request may be issued and records it
    pub async fn acquire(&self) {
        let mut last = self.last_request_time.lock().await;
        if let Some(wait) = time_until_next_request(*last, self.min_interval, Instant::now()) {
            tokio::time::sleep(wait).await;
        }
        *last = Some(Instant::now());
    }
}

/// Calculates the time until the next request can be made
///
/// Returns None if a request can be made now, or the duration to wait otherwise.
pub fn time_until_next_request(
    last: Option<Instant>,
    min_interval: Duration,
    now: Instant,
) -> Option<Duration> {
    let last = last?;
    let elapsed = now.saturating_duration_since(last);
    if elapsed < min_interval {
        Some(min_interval - elapsed)
    } else {
        None
    }
}
