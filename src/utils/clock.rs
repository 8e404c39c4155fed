use async_trait::async_trait;
use chrono::{DateTime, Local};
use tokio::time::Instant;

/// Represents an entity responsible for providing dates and ticks across application. This
/// allows the session driver to be tested with a fixed start date and paused tokio time.
#[async_trait]
pub trait Clock: Sync + Send + 'static {
    /// Wall clock time. Session records use the local calendar date of this value.
    fn time(&self) -> DateTime<Local>;

    fn instant(&self) -> Instant;

    async fn sleep_until(&self, instant: Instant);
}

pub struct DefaultClock;

#[async_trait]
impl Clock for DefaultClock {
    fn time(&self) -> DateTime<Local> {
        Local::now()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, instant: Instant) {
        tokio::time::sleep_until(instant).await;
    }
}
