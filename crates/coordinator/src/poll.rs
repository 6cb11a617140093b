//! How long a session waits between a running response and its next poll.

use std::time::Duration;

/// Wait policy between polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollPolicy {
    /// Always wait the same amount.
    Fixed(Duration),
    /// Poll eagerly at first and back off as the search ages.
    #[default]
    Adaptive,
}

impl PollPolicy {
    /// Delay before the next poll, given how long the session has run.
    pub fn next_delay(&self, elapsed: Duration) -> Duration {
        match self {
            Self::Fixed(d) => *d,
            Self::Adaptive => {
                let ms = match elapsed.as_millis() {
                    0..=1_499 => 300,
                    1_500..=4_999 => 1_000,
                    5_000..=19_999 => 2_500,
                    _ => 5_000,
                };
                Duration::from_millis(ms)
            }
        }
    }
}

impl From<Option<Duration>> for PollPolicy {
    fn from(interval: Option<Duration>) -> Self {
        interval.map_or(Self::Adaptive, Self::Fixed)
    }
}
