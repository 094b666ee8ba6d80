use std::path::PathBuf;
use std::sync::Once;

use chrono::{TimeZone, Utc};
use outreach_core::{
    update, Command, Effect, FailureKind, Job, JobKind, JobState, LoopOutcome, Msg,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

fn new_job() -> Job {
    Job::new(
        1,
        JobKind::Collection,
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        PathBuf::from("out/collection-1.csv"),
    )
}

fn apply(job: Job, msgs: Vec<Msg>) -> (Job, Vec<Effect>) {
    msgs.into_iter().fold((job, Vec::new()), |(job, _), msg| update(job, msg))
}

fn at() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap()
}

fn running_job() -> Job {
    apply(
        new_job(),
        vec![
            Msg::StartRequested,
            Msg::SessionAcquired,
            Msg::CheckpointConfirmed,
        ],
    )
    .0
}

#[test]
fn start_launches_worker_once() {
    init_logging();
    let (job, effects) = update(new_job(), Msg::StartRequested);
    assert_eq!(job.state(), JobState::AwaitingSession);
    assert_eq!(
        effects,
        vec![
            Effect::StateChanged {
                from: JobState::Created,
                to: JobState::AwaitingSession,
            },
            Effect::LaunchWorker,
        ]
    );

    let (job, effects) = update(job, Msg::StartRequested);
    assert_eq!(job.state(), JobState::AwaitingSession);
    assert_eq!(
        effects,
        vec![Effect::Ignored {
            command: Command::Start,
            state: JobState::AwaitingSession,
        }]
    );
}

#[test]
fn checkpoint_confirmation_only_counts_while_waiting() {
    init_logging();
    let (job, _) = update(new_job(), Msg::StartRequested);
    let (job, effects) = update(job, Msg::CheckpointConfirmed);
    assert_eq!(job.state(), JobState::AwaitingSession);
    assert_eq!(
        effects,
        vec![Effect::Ignored {
            command: Command::ConfirmCheckpoint,
            state: JobState::AwaitingSession,
        }]
    );

    let (job, _) = update(job, Msg::SessionAcquired);
    assert_eq!(job.state(), JobState::AwaitingCheckpoint);
    let (job, effects) = update(job, Msg::CheckpointConfirmed);
    assert_eq!(job.state(), JobState::Running);
    assert!(effects.contains(&Effect::ReleaseCheckpoint));
}

#[test]
fn pause_and_resume_toggle_running() {
    init_logging();
    let (job, effects) = update(running_job(), Msg::PauseRequested);
    assert_eq!(job.state(), JobState::Paused);
    assert!(effects.contains(&Effect::SetPaused(true)));

    let (job, effects) = update(job, Msg::PauseRequested);
    assert_eq!(job.state(), JobState::Paused);
    assert_eq!(
        effects,
        vec![Effect::Ignored {
            command: Command::Pause,
            state: JobState::Paused,
        }]
    );

    let (job, effects) = update(job, Msg::ResumeRequested);
    assert_eq!(job.state(), JobState::Running);
    assert!(effects.contains(&Effect::SetPaused(false)));
}

#[test]
fn stop_before_start_ends_immediately() {
    init_logging();
    let (job, effects) = update(new_job(), Msg::StopRequested { at: at() });
    assert_eq!(job.state(), JobState::Stopped);
    assert_eq!(job.completed_at(), Some(at()));
    assert!(!effects.contains(&Effect::SignalStop));
}

#[test]
fn stop_while_running_winds_down_through_stopping() {
    init_logging();
    let (job, effects) = update(running_job(), Msg::StopRequested { at: at() });
    assert_eq!(job.state(), JobState::Stopping);
    assert!(effects.contains(&Effect::SignalStop));
    assert_eq!(job.completed_at(), None);

    let (job, effects) = update(job, Msg::StopRequested { at: at() });
    assert_eq!(
        effects,
        vec![Effect::Ignored {
            command: Command::Stop,
            state: JobState::Stopping,
        }]
    );

    let (job, _) = update(
        job,
        Msg::Finished {
            outcome: LoopOutcome::Stopped,
            at: at(),
        },
    );
    assert_eq!(job.state(), JobState::Stopped);
    assert_eq!(job.completed_at(), Some(at()));
    assert_eq!(job.failure_reason(), None);
}

#[test]
fn stop_at_checkpoint_is_not_a_failure() {
    init_logging();
    let (job, _) = apply(
        new_job(),
        vec![
            Msg::StartRequested,
            Msg::SessionAcquired,
            Msg::StopRequested { at: at() },
            Msg::Finished {
                outcome: LoopOutcome::Stopped,
                at: at(),
            },
        ],
    );
    assert_eq!(job.state(), JobState::Stopped);
    assert_eq!(job.failure_reason(), None);
}

#[test]
fn stopped_outcome_without_a_stop_request_is_dropped() {
    init_logging();
    let stopped = Msg::Finished {
        outcome: LoopOutcome::Stopped,
        at: at(),
    };
    let (job, _) = update(new_job(), Msg::StartRequested);
    let before = job.clone();
    let (job, effects) = update(job, stopped.clone());
    assert_eq!(job, before);
    assert!(effects.is_empty());

    let (job, effects) = update(running_job(), stopped);
    assert_eq!(job.state(), JobState::Running);
    assert!(effects.is_empty());
}

#[test]
fn exhausted_loop_completes_unless_stop_was_requested() {
    init_logging();
    let finished = Msg::Finished {
        outcome: LoopOutcome::Exhausted,
        at: at(),
    };
    let (job, _) = update(running_job(), finished.clone());
    assert_eq!(job.state(), JobState::Completed);

    let (job, _) = update(running_job(), Msg::StopRequested { at: at() });
    let (job, _) = update(job, finished);
    assert_eq!(job.state(), JobState::Stopped);
}

#[test]
fn session_failure_records_reason() {
    init_logging();
    let (job, _) = apply(
        new_job(),
        vec![
            Msg::StartRequested,
            Msg::Finished {
                outcome: LoopOutcome::Failed {
                    kind: FailureKind::SessionFailure,
                    reason: "webdriver unreachable".to_string(),
                },
                at: at(),
            },
        ],
    );
    assert_eq!(job.state(), JobState::Failed);
    assert_eq!(
        job.failure_reason(),
        Some("session failure: webdriver unreachable")
    );
}

#[test]
fn terminal_jobs_ignore_everything() {
    init_logging();
    let (job, _) = update(
        running_job(),
        Msg::Finished {
            outcome: LoopOutcome::Exhausted,
            at: at(),
        },
    );
    let before = job.clone();
    let (job, effects) = apply(
        job,
        vec![
            Msg::ItemAccepted,
            Msg::PageFinished { page: 3 },
            Msg::Discovered {
                pages_total: 9,
                items_total: Some(9),
            },
            Msg::Finished {
                outcome: LoopOutcome::Stopped,
                at: at(),
            },
        ],
    );
    assert_eq!(job, before);
    assert!(effects.is_empty());
}

#[test]
fn progress_never_exceeds_known_total() {
    init_logging();
    let (job, _) = apply(
        running_job(),
        vec![
            Msg::Discovered {
                pages_total: 2,
                items_total: Some(1),
            },
            Msg::ItemAccepted,
            Msg::ItemAccepted,
            Msg::PageFinished { page: 1 },
            Msg::PageFinished { page: 7 },
        ],
    );
    assert_eq!(job.items_processed(), 2);
    assert_eq!(job.items_total(), Some(2));
    assert_eq!(job.pages_done(), 2);

    let status = job.view(vec!["line".to_string()]);
    assert_eq!(status.summary_line(), "RUNNING pages 2/2 items 2/2");
    assert_eq!(status.recent_log_lines, vec!["line".to_string()]);
}

#[test]
fn undeterminable_page_count_defaults_to_one() {
    init_logging();
    let (job, _) = update(
        running_job(),
        Msg::Discovered {
            pages_total: 0,
            items_total: None,
        },
    );
    assert_eq!(job.pages_total(), 1);
    assert_eq!(job.items_total(), None);
}
