use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use tokio::time::Instant;

/// Source of time for timers, sessions and the beeper. Timers measure with [Clock::instant], which
/// follows tokio's clock, so tests can pause and advance it.
#[async_trait]
pub trait Clock: Sync + Send + 'static {
    /// Wall clock time, used for timestamps.
    fn time(&self) -> DateTime<Utc>;

    /// Monotonic time, used for measuring.
    fn instant(&self) -> Instant;

    fn local_time(&self) -> DateTime<Local> {
        self.time().with_timezone(&Local)
    }

    async fn sleep(&self, duration: Duration);

    async fn sleep_until(&self, instant: Instant);
}

pub struct DefaultClock;

#[async_trait]
impl Clock for DefaultClock {
    fn time(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn sleep_until(&self, instant: Instant) {
        tokio::time::sleep_until(instant).await;
    }
}
