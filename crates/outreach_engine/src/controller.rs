use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chrono::Utc;
use outreach_core::{update, Effect, FailureKind, Job, JobId, JobState, JobStatus, LoopOutcome, Msg};

use crate::control::ControlFlags;
use crate::reporter::{Reporter, ReporterHandle};
use crate::session::SessionFactory;
use crate::settings::EngineSettings;
use crate::strategy::WorkUnitStrategy;
use crate::types::ProgressKind;
use crate::worker::{spawn_worker, JobContext};

/// State shared between a controller and its worker thread.
pub(crate) struct JobShared {
    job: Mutex<Job>,
    flags: Arc<ControlFlags>,
    reporter: Reporter,
}

impl JobShared {
    fn new(job: Job, reporter: Reporter) -> Self {
        Self {
            job: Mutex::new(job),
            flags: Arc::new(ControlFlags::default()),
            reporter,
        }
    }

    /// Runs one message through the state machine and carries out the
    /// effects that only touch flags and the event stream.
    pub(crate) fn apply(&self, msg: Msg) -> Vec<Effect> {
        let effects = {
            let mut job = self.job.lock().unwrap_or_else(PoisonError::into_inner);
            let (next, effects) = update(job.clone(), msg);
            *job = next;
            effects
        };

        for effect in &effects {
            match effect {
                Effect::ReleaseCheckpoint => self.flags.confirm(),
                Effect::SetPaused(paused) => {
                    self.flags.set_paused(*paused);
                    let verb = if *paused { "paused" } else { "resumed" };
                    self.reporter.info(format!("job {verb}"));
                }
                Effect::SignalStop => {
                    self.flags.request_stop();
                    self.reporter
                        .info("stop requested, finishing the current item");
                }
                Effect::StateChanged { from, to } => {
                    self.reporter
                        .progress(ProgressKind::StateChanged { from: *from, to: *to });
                }
                Effect::Ignored { command, state } => {
                    self.reporter
                        .warn(format!("{command} ignored while {state}"));
                }
                Effect::LaunchWorker => {}
            }
        }
        effects
    }

    pub(crate) fn snapshot(&self) -> Job {
        self.job.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub(crate) fn flags(&self) -> Arc<ControlFlags> {
        Arc::clone(&self.flags)
    }

    pub(crate) fn reporter(&self) -> &Reporter {
        &self.reporter
    }
}

struct Launch {
    strategy: Box<dyn WorkUnitStrategy>,
    factory: Arc<dyn SessionFactory>,
    settings: EngineSettings,
}

/// Caller-facing handle for one job. All commands return immediately.
pub struct JobController {
    shared: Arc<JobShared>,
    log_tail: usize,
    launch: Mutex<Option<Launch>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl JobController {
    pub fn new(
        job: Job,
        strategy: Box<dyn WorkUnitStrategy>,
        factory: Arc<dyn SessionFactory>,
        settings: EngineSettings,
        reporter: Reporter,
    ) -> Self {
        Self {
            shared: Arc::new(JobShared::new(job, reporter)),
            log_tail: settings.log_tail,
            launch: Mutex::new(Some(Launch {
                strategy,
                factory,
                settings,
            })),
            worker: Mutex::new(None),
        }
    }

    pub fn id(&self) -> JobId {
        self.shared.snapshot().id()
    }

    pub fn start(&self) {
        let effects = self.shared.apply(Msg::StartRequested);
        if effects.contains(&Effect::LaunchWorker) {
            self.launch_worker();
        }
    }

    pub fn confirm_checkpoint(&self) {
        self.shared.apply(Msg::CheckpointConfirmed);
    }

    pub fn pause(&self) {
        self.shared.apply(Msg::PauseRequested);
    }

    pub fn resume(&self) {
        self.shared.apply(Msg::ResumeRequested);
    }

    pub fn stop(&self) {
        self.shared.apply(Msg::StopRequested { at: Utc::now() });
    }

    pub fn state(&self) -> JobState {
        self.shared.snapshot().state()
    }

    pub fn status(&self) -> JobStatus {
        let recent = self.shared.reporter().handle().recent_lines(self.log_tail);
        self.shared.snapshot().view(recent)
    }

    /// Location of the result file once at least one row has been written.
    pub fn result(&self) -> Option<PathBuf> {
        let job = self.shared.snapshot();
        (job.items_processed() > 0).then(|| job.result_location().to_path_buf())
    }

    pub fn events(&self) -> ReporterHandle {
        self.shared.reporter().handle()
    }

    /// Blocks until the job is terminal or `timeout` elapses.
    pub fn wait_until_terminal(&self, timeout: Duration) -> Option<JobStatus> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.state().is_terminal() {
                self.join_worker();
                return Some(self.status());
            }
            if Instant::now() >= deadline {
                return None;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    fn join_worker(&self) {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    fn launch_worker(&self) {
        let launch = self
            .launch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(Launch {
            strategy,
            factory,
            settings,
        }) = launch
        else {
            return;
        };

        let context = JobContext {
            shared: Arc::clone(&self.shared),
            strategy,
            factory,
            settings,
        };
        match spawn_worker(context) {
            Ok(handle) => {
                *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
            }
            Err(err) => {
                self.shared.reporter().error(format!("cannot spawn worker: {err}"));
                self.shared.apply(Msg::Finished {
                    outcome: LoopOutcome::Failed {
                        kind: FailureKind::SessionFailure,
                        reason: format!("cannot spawn worker: {err}"),
                    },
                    at: Utc::now(),
                });
            }
        }
    }
}
