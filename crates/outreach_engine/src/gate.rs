use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::control::Control;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Confirmed,
    /// A stop arrived before confirmation.
    Abandoned,
    TimedOut,
}

/// Holds the worker until a human confirms the manual step in the browser.
pub struct CheckpointGate<'a> {
    control: &'a Control,
    timeout: Option<Duration>,
}

impl<'a> CheckpointGate<'a> {
    pub fn new(control: &'a Control, timeout: Option<Duration>) -> Self {
        Self { control, timeout }
    }

    pub async fn wait(&self) -> GateOutcome {
        let started = Instant::now();
        loop {
            let flags = self.control.flags();
            if flags.stop_requested() {
                return GateOutcome::Abandoned;
            }
            if flags.is_confirmed() {
                return GateOutcome::Confirmed;
            }
            if let Some(limit) = self.timeout {
                if started.elapsed() >= limit {
                    return GateOutcome::TimedOut;
                }
            }
            sleep(self.control.poll_interval()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::control::ControlFlags;

    fn control(flags: &Arc<ControlFlags>) -> Control {
        Control::new(Arc::clone(flags), Duration::from_millis(5))
    }

    #[tokio::test]
    async fn confirmation_releases_the_gate() {
        let flags = Arc::new(ControlFlags::default());
        let control = control(&flags);
        let confirmer = {
            let flags = Arc::clone(&flags);
            tokio::spawn(async move {
                sleep(Duration::from_millis(20)).await;
                flags.confirm();
            })
        };
        let outcome = CheckpointGate::new(&control, None).wait().await;
        assert_eq!(outcome, GateOutcome::Confirmed);
        confirmer.await.unwrap();
    }

    #[tokio::test]
    async fn stop_abandons_and_timeout_expires() {
        let flags = Arc::new(ControlFlags::default());
        let control = control(&flags);
        let outcome = CheckpointGate::new(&control, Some(Duration::from_millis(20)))
            .wait()
            .await;
        assert_eq!(outcome, GateOutcome::TimedOut);

        flags.request_stop();
        let outcome = CheckpointGate::new(&control, None).wait().await;
        assert_eq!(outcome, GateOutcome::Abandoned);
    }
}
