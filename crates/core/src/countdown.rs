use crate::phase::Phase;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};

const ONE_SECOND: Duration = Duration::from_secs(1);

/// One second of a countdown elapsed. `remaining == 0` means the countdown expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub epoch: u64,
    pub phase: Phase,
    pub remaining: u64,
}

/// A per-phase countdown running on its own task.
///
/// Dropping the countdown aborts the task, so a countdown can never outlive
/// the owner that replaced or cleared it.
#[derive(Debug)]
pub struct Countdown {
    phase: Phase,
    epoch: u64,
    handle: JoinHandle<()>,
}

impl Countdown {
    pub fn start<E>(phase: Phase, epoch: u64, duration: Duration, tx: UnboundedSender<E>) -> Self
    where
        E: From<Tick> + Send + 'static,
    {
        let total = duration.as_secs();
        let handle = tokio::spawn(async move {
            if total == 0 {
                let _ = tx.send(E::from(Tick {
                    epoch,
                    phase,
                    remaining: 0,
                }));
                return;
            }

            let mut ticker = interval_at(Instant::now() + ONE_SECOND, ONE_SECOND);
            for remaining in (0..total).rev() {
                ticker.tick().await;
                let tick = Tick {
                    epoch,
                    phase,
                    remaining,
                };
                if tx.send(E::from(tick)).is_err() {
                    break;
                }
            }
        });
        tracing::debug!(?phase, epoch, seconds = total, "countdown started");

        Self {
            phase,
            epoch,
            handle,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn cancel(self) {
        tracing::debug!(phase = ?self.phase, epoch = self.epoch, "countdown cleared");
        // Drop aborts the task.
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn counts_down_to_zero_once_per_second() {
        let (tx, mut rx) = mpsc::unbounded_channel::<Tick>();
        let started = Instant::now();
        let _countdown = Countdown::start(Phase::QaDelay, 4, Duration::from_secs(3), tx);

        let mut seen = Vec::new();
        while let Some(tick) = rx.recv().await {
            assert_eq!(tick.epoch, 4);
            assert_eq!(tick.phase, Phase::QaDelay);
            seen.push(tick.remaining);
        }

        assert_eq!(seen, vec![2, 1, 0]);
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_countdown_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel::<Tick>();
        let countdown = Countdown::start(Phase::Planning, 1, Duration::from_secs(5), tx);
        countdown.cancel();

        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_duration_expires_immediately() {
        let (tx, mut rx) = mpsc::unbounded_channel::<Tick>();
        let _countdown = Countdown::start(Phase::QaDelay, 2, Duration::ZERO, tx);

        let tick = rx.recv().await.unwrap();
        assert_eq!(tick.remaining, 0);
        assert!(rx.recv().await.is_none());
    }
}
