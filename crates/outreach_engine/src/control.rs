use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};

/// Flags the controller sets and the worker polls between units of work.
#[derive(Debug, Default)]
pub struct ControlFlags {
    confirmed: AtomicBool,
    paused: AtomicBool,
    stop: AtomicBool,
}

impl ControlFlags {
    pub fn confirm(&self) {
        self.confirmed.store(true, Ordering::SeqCst);
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Worker-side view of the flags with a fixed polling interval.
#[derive(Debug, Clone)]
pub struct Control {
    flags: Arc<ControlFlags>,
    poll: Duration,
}

impl Control {
    pub fn new(flags: Arc<ControlFlags>, poll: Duration) -> Self {
        Self { flags, poll }
    }

    pub fn flags(&self) -> &ControlFlags {
        &self.flags
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll
    }

    /// Called before each unit of work: honours stop, then blocks while paused.
    pub async fn checkpoint(&self) -> Flow {
        loop {
            if self.flags.stop_requested() {
                return Flow::Stop;
            }
            if !self.flags.is_paused() {
                return Flow::Continue;
            }
            sleep(self.poll).await;
        }
    }

    /// Sleeps for `delay` in poll-sized slices so a stop cuts the wait short.
    /// A pause requested during the wait holds the caller after it elapses.
    pub async fn pace(&self, delay: Duration) -> Flow {
        let deadline = Instant::now() + delay;
        loop {
            if self.flags.stop_requested() {
                return Flow::Stop;
            }
            let now = Instant::now();
            if now >= deadline {
                return self.checkpoint().await;
            }
            sleep(self.poll.min(deadline - now)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pause_blocks_until_resumed() {
        let flags = Arc::new(ControlFlags::default());
        let control = Control::new(Arc::clone(&flags), Duration::from_millis(5));
        flags.set_paused(true);

        let resumer = {
            let flags = Arc::clone(&flags);
            tokio::spawn(async move {
                sleep(Duration::from_millis(30)).await;
                flags.set_paused(false);
            })
        };
        let started = Instant::now();
        assert_eq!(control.checkpoint().await, Flow::Continue);
        assert!(started.elapsed() >= Duration::from_millis(25));
        resumer.await.unwrap();
    }

    #[tokio::test]
    async fn stop_wins_over_pause_and_pacing() {
        let flags = Arc::new(ControlFlags::default());
        let control = Control::new(Arc::clone(&flags), Duration::from_millis(5));
        flags.set_paused(true);
        flags.request_stop();
        assert_eq!(control.checkpoint().await, Flow::Stop);

        let started = Instant::now();
        assert_eq!(control.pace(Duration::from_secs(30)).await, Flow::Stop);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn pause_during_pacing_holds_until_resumed() {
        let flags = Arc::new(ControlFlags::default());
        let control = Control::new(Arc::clone(&flags), Duration::from_millis(5));

        let toggler = {
            let flags = Arc::clone(&flags);
            tokio::spawn(async move {
                sleep(Duration::from_millis(10)).await;
                flags.set_paused(true);
                sleep(Duration::from_millis(80)).await;
                flags.set_paused(false);
            })
        };
        let started = Instant::now();
        assert_eq!(control.pace(Duration::from_millis(20)).await, Flow::Continue);
        assert!(started.elapsed() >= Duration::from_millis(80));
        toggler.await.unwrap();
    }
}
