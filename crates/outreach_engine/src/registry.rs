use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use engine_logging::engine_info;
use outreach_core::{Job, JobId, JobState, JobStatus};
use thiserror::Error;

use crate::collection::{CollectionProfile, CollectionStrategy, ProfileError};
use crate::contacts::ContactsError;
use crate::controller::JobController;
use crate::messaging::{MessagingProfile, MessagingStrategy};
use crate::reporter::{ProgressSink, Reporter};
use crate::session::SessionFactory;
use crate::settings::EngineSettings;
use crate::strategy::WorkUnitStrategy;
use crate::types::{LogEntry, ProgressEvent};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown job {0}")]
    UnknownJob(JobId),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Contacts(#[from] ContactsError),
}

pub enum JobParams {
    Collection(CollectionProfile),
    Messaging(MessagingProfile),
}

/// Owns every job started in this process and routes commands by id.
pub struct JobRegistry {
    settings: EngineSettings,
    factory: Arc<dyn SessionFactory>,
    sinks: Vec<Arc<dyn ProgressSink>>,
    next_id: AtomicU64,
    jobs: Mutex<BTreeMap<JobId, Arc<JobController>>>,
}

impl JobRegistry {
    pub fn new(settings: EngineSettings, factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            settings,
            factory,
            sinks: Vec::new(),
            next_id: AtomicU64::new(1),
            jobs: Mutex::new(BTreeMap::new()),
        }
    }

    /// Every job started afterwards also pushes its events to `sink`.
    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Validates the parameters, creates the job and starts it.
    pub fn start(&self, params: JobParams) -> Result<JobId, RegistryError> {
        match params {
            JobParams::Collection(profile) => {
                let output_name = profile.output_name.clone();
                let strategy = CollectionStrategy::new(profile)?;
                Ok(self.start_with_strategy(Box::new(strategy), output_name.as_deref()))
            }
            JobParams::Messaging(profile) => {
                let output_name = profile.output_name.clone();
                let strategy = MessagingStrategy::from_profile(profile)?;
                Ok(self.start_with_strategy(Box::new(strategy), output_name.as_deref()))
            }
        }
    }

    /// Starts a job driven by any strategy. The result file is
    /// `<output_dir>/<output_name>.csv`, defaulting to `<kind>-<id>`.
    pub fn start_with_strategy(
        &self,
        strategy: Box<dyn WorkUnitStrategy>,
        output_name: Option<&str>,
    ) -> JobId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let kind = strategy.kind();
        let stem = output_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| name.trim_end_matches(".csv").to_string())
            .unwrap_or_else(|| format!("{kind}-{id}"));
        let result_location = self.settings.output_dir.join(format!("{stem}.csv"));

        let reporter = self
            .sinks
            .iter()
            .fold(Reporter::new(id), |reporter, sink| reporter.with_sink(Arc::clone(sink)));
        let job = Job::new(id, kind, Utc::now(), result_location);
        let controller = Arc::new(JobController::new(
            job,
            strategy,
            Arc::clone(&self.factory),
            self.settings.clone(),
            reporter,
        ));
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::clone(&controller));

        engine_info!("job {} created ({})", id, kind);
        controller.start();
        id
    }

    pub fn controller(&self, id: JobId) -> Result<Arc<JobController>, RegistryError> {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or(RegistryError::UnknownJob(id))
    }

    pub fn confirm_checkpoint(&self, id: JobId) -> Result<(), RegistryError> {
        self.controller(id)?.confirm_checkpoint();
        Ok(())
    }

    pub fn pause(&self, id: JobId) -> Result<(), RegistryError> {
        self.controller(id)?.pause();
        Ok(())
    }

    pub fn resume(&self, id: JobId) -> Result<(), RegistryError> {
        self.controller(id)?.resume();
        Ok(())
    }

    pub fn stop(&self, id: JobId) -> Result<(), RegistryError> {
        self.controller(id)?.stop();
        Ok(())
    }

    pub fn status(&self, id: JobId) -> Result<JobStatus, RegistryError> {
        Ok(self.controller(id)?.status())
    }

    pub fn result(&self, id: JobId) -> Result<Option<PathBuf>, RegistryError> {
        Ok(self.controller(id)?.result())
    }

    pub fn events_since(&self, id: JobId, cursor: u64) -> Result<Vec<ProgressEvent>, RegistryError> {
        Ok(self.controller(id)?.events().events_since(cursor))
    }

    pub fn logs_since(&self, id: JobId, cursor: u64) -> Result<Vec<LogEntry>, RegistryError> {
        Ok(self.controller(id)?.events().logs_since(cursor))
    }

    /// Every known job with its current state, by id.
    pub fn jobs(&self) -> Vec<(JobId, JobState)> {
        let controllers: Vec<_> = self
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        controllers
            .iter()
            .map(|controller| (controller.id(), controller.state()))
            .collect()
    }
}
