use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chrono::Utc;
use outreach_core::{Deduplicator, FailureKind, LoopOutcome, Msg};

use crate::control::{Control, Flow};
use crate::controller::JobShared;
use crate::gate::{CheckpointGate, GateOutcome};
use crate::reporter::Reporter;
use crate::session::{BrowserSession, SessionError, SessionFactory, SessionSlot};
use crate::settings::EngineSettings;
use crate::sink::ResultSink;
use crate::strategy::WorkUnitStrategy;
use crate::summary::write_job_summary;
use crate::types::{ItemOutcome, LogLevel, PageItems, ProgressKind};

/// Everything a worker thread owns for the lifetime of one job.
pub(crate) struct JobContext {
    pub(crate) shared: Arc<JobShared>,
    pub(crate) strategy: Box<dyn WorkUnitStrategy>,
    pub(crate) factory: Arc<dyn SessionFactory>,
    pub(crate) settings: EngineSettings,
}

pub(crate) fn spawn_worker(context: JobContext) -> io::Result<JoinHandle<()>> {
    let name = format!("job-{}", context.shared.snapshot().id());
    thread::Builder::new().name(name).spawn(move || run(context))
}

fn run(mut context: JobContext) {
    let outcome = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime.block_on(drive(&mut context)),
        Err(err) => failed(
            FailureKind::SessionFailure,
            format!("cannot start worker runtime: {err}"),
        ),
    };
    finish(&context, outcome);
}

fn failed(kind: FailureKind, reason: impl Into<String>) -> LoopOutcome {
    LoopOutcome::Failed {
        kind,
        reason: reason.into(),
    }
}

fn finish(context: &JobContext, outcome: LoopOutcome) {
    let reporter = context.shared.reporter();
    match &outcome {
        LoopOutcome::Exhausted => reporter.info("all work items processed"),
        LoopOutcome::Stopped => reporter.info("stopped on request"),
        LoopOutcome::Failed { kind, reason } => reporter.error(format!("{kind}: {reason}")),
    }
    context.shared.apply(Msg::Finished {
        outcome,
        at: Utc::now(),
    });

    if context.settings.write_summary {
        let job = context.shared.snapshot();
        let warnings = reporter.handle().count_at(LogLevel::Warn);
        match write_job_summary(&job, warnings) {
            Ok(path) => reporter.info(format!("job summary written to {}", path.display())),
            Err(err) => reporter.warn(format!("cannot write job summary: {err}")),
        }
    }
}

/// Acquires the session, runs the job and always releases the session
/// before the job is allowed to reach a terminal state.
async fn drive(context: &mut JobContext) -> LoopOutcome {
    let reporter = context.shared.reporter().clone();
    reporter.info(format!(
        "opening browser session for {} job",
        context.strategy.kind()
    ));
    let session = match context.factory.open().await {
        Ok(session) => session,
        Err(err) => return failed(FailureKind::SessionFailure, err.to_string()),
    };

    let mut slot = SessionSlot::new(session);
    let outcome = match slot.get() {
        Ok(session) => run_session(context, session, &reporter).await,
        Err(err) => failed(FailureKind::SessionFailure, err.to_string()),
    };
    match slot.release().await {
        Ok(true) => reporter.info("browser session closed"),
        Ok(false) => {}
        Err(err) => reporter.warn(format!("closing browser session failed: {err}")),
    }
    outcome
}

async fn run_session(
    context: &mut JobContext,
    session: &mut dyn BrowserSession,
    reporter: &Reporter,
) -> LoopOutcome {
    let control = Control::new(context.shared.flags(), context.settings.control_poll);

    let entry = context.strategy.entry_url().to_string();
    if let Err(err) = session.navigate(&entry).await {
        return failed(
            FailureKind::SessionFailure,
            format!("cannot open {entry}: {err}"),
        );
    }
    context.shared.apply(Msg::SessionAcquired);
    reporter.info("awaiting checkpoint: finish the manual step in the browser, then confirm");

    let timeout = context.settings.checkpoint_timeout;
    match CheckpointGate::new(&control, timeout).wait().await {
        GateOutcome::Confirmed => reporter.info("checkpoint confirmed"),
        GateOutcome::Abandoned => return LoopOutcome::Stopped,
        GateOutcome::TimedOut => {
            return failed(
                FailureKind::CheckpointTimeout,
                format!("no confirmation within {:?}", timeout.unwrap_or_default()),
            )
        }
    }

    let result_path = context.shared.snapshot().result_location().to_path_buf();
    let mut sink = match ResultSink::create(&result_path, context.strategy.schema()) {
        Ok(sink) => sink,
        Err(err) => return failed(FailureKind::SinkFailure, err.to_string()),
    };
    reporter.info(format!("writing results to {}", sink.path().display()));

    work_loop(context, session, &control, &mut sink, reporter).await
}

type Attempt<'a, T> = Pin<Box<dyn Future<Output = Result<T, SessionError>> + Send + 'a>>;

/// Runs one strategy step, retrying non-fatal session errors within the
/// discovery budget. The backoff observes stop and pause.
async fn with_retries<T, F>(
    context: &mut JobContext,
    session: &mut dyn BrowserSession,
    control: &Control,
    reporter: &Reporter,
    label: &str,
    mut step: F,
) -> Result<T, LoopOutcome>
where
    F: for<'a> FnMut(&'a mut dyn WorkUnitStrategy, &'a mut dyn BrowserSession) -> Attempt<'a, T>,
{
    let attempts = context.settings.discovery_attempts.max(1);
    let mut attempt = 1;
    loop {
        match step(context.strategy.as_mut(), &mut *session).await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_fatal() && attempt < attempts => {
                reporter.warn(format!("{label} attempt {attempt}/{attempts} failed: {err}"));
                attempt += 1;
                if control.pace(context.settings.retry_backoff).await == Flow::Stop {
                    return Err(LoopOutcome::Stopped);
                }
            }
            Err(err) => {
                return Err(failed(
                    FailureKind::SessionFailure,
                    format!("{label} failed: {err}"),
                ))
            }
        }
    }
}

async fn work_loop(
    context: &mut JobContext,
    session: &mut dyn BrowserSession,
    control: &Control,
    sink: &mut ResultSink,
    reporter: &Reporter,
) -> LoopOutcome {
    let prepared = with_retries(
        context,
        session,
        control,
        reporter,
        "discovery",
        |strategy, session| strategy.prepare(session),
    )
    .await;
    let preparation = match prepared {
        Ok(preparation) => preparation,
        Err(outcome) => return outcome,
    };
    context.shared.apply(Msg::Discovered {
        pages_total: preparation.pages_total,
        items_total: preparation.items_total,
    });
    let discovered = context.shared.snapshot();
    let pages_total = discovered.pages_total();
    reporter.progress(ProgressKind::Discovered {
        pages_total,
        items_total: discovered.items_total(),
    });
    match discovered.items_total() {
        Some(items) => reporter.info(format!("{pages_total} page(s), {items} item(s) expected")),
        None => reporter.info(format!("{pages_total} page(s) to process")),
    }

    let mut dedup = Deduplicator::new();
    let mut attempted_any = false;
    for page in 1..=pages_total {
        if control.checkpoint().await == Flow::Stop {
            return LoopOutcome::Stopped;
        }
        reporter.progress(ProgressKind::PageStarted { page });
        reporter.info(format!("processing page {page}/{pages_total}"));

        let label = format!("page {page} discovery");
        let found = with_retries(
            context,
            session,
            control,
            reporter,
            &label,
            |strategy, session| strategy.discover_items(session, page),
        )
        .await;
        let items = match found {
            Ok(PageItems::Items(items)) => items,
            Ok(PageItems::Exhausted) => {
                reporter.info(format!("no items beyond page {}", page - 1));
                return LoopOutcome::Exhausted;
            }
            Err(outcome) => return outcome,
        };

        for item in items {
            if control.checkpoint().await == Flow::Stop {
                return LoopOutcome::Stopped;
            }
            if item.key.trim().is_empty() {
                reporter.progress(ProgressKind::ItemSkipped {
                    key: String::new(),
                    reason: "missing identity key".to_string(),
                });
                reporter.warn(format!("rejected an item without identity key on page {page}"));
                continue;
            }
            if !dedup.first_sighting(&item.key) {
                continue;
            }

            if attempted_any {
                if let Some(delay) = context.strategy.pacing() {
                    if control.pace(delay).await == Flow::Stop {
                        return LoopOutcome::Stopped;
                    }
                }
            }
            attempted_any = true;

            match context.strategy.process_item(session, &item).await {
                Ok(ItemOutcome::Accept(record)) => {
                    if let Err(err) = sink.append_row(&record) {
                        return failed(FailureKind::SinkFailure, err.to_string());
                    }
                    context.shared.apply(Msg::ItemAccepted);
                    let items_processed = context.shared.snapshot().items_processed();
                    reporter.progress(ProgressKind::ItemAccepted {
                        key: item.key.clone(),
                        items_processed,
                    });
                    reporter.info(format!("accepted {}", item.key));
                }
                Ok(ItemOutcome::Reject(reason)) => {
                    reporter.warn(format!("skipped {}: {reason}", item.key));
                    reporter.progress(ProgressKind::ItemSkipped {
                        key: item.key.clone(),
                        reason,
                    });
                }
                Ok(ItemOutcome::RecoverableFailure(failure)) => {
                    reporter.warn(format!("{failure} ({})", item.key));
                    reporter.progress(ProgressKind::ItemSkipped {
                        key: item.key.clone(),
                        reason: failure.to_string(),
                    });
                }
                Err(err) if err.is_fatal() => {
                    return failed(FailureKind::SessionFailure, err.to_string());
                }
                Err(err) => {
                    reporter.warn(format!("extraction failure ({}): {err}", item.key));
                    reporter.progress(ProgressKind::ItemSkipped {
                        key: item.key.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        context.shared.apply(Msg::PageFinished { page });
        reporter.progress(ProgressKind::PageFinished { page });
    }
    LoopOutcome::Exhausted
}
