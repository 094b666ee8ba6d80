use crate::{Command, Effect, Job, JobState, LoopOutcome, Msg};

/// Pure update function: applies a message to a job and returns any effects.
///
/// Caller commands that are not valid in the current state leave the job
/// unchanged and yield a single `Effect::Ignored`. Worker messages arriving
/// after the job reached a terminal state are dropped silently.
pub fn update(mut job: Job, msg: Msg) -> (Job, Vec<Effect>) {
    let mut effects = Vec::new();
    let state = job.state();

    match msg {
        Msg::StartRequested => {
            if job.transition(JobState::AwaitingSession, &mut effects) {
                effects.push(Effect::LaunchWorker);
            } else {
                effects.push(ignored(Command::Start, state));
            }
        }
        Msg::CheckpointConfirmed => {
            if state == JobState::AwaitingCheckpoint
                && job.transition(JobState::Running, &mut effects)
            {
                effects.push(Effect::ReleaseCheckpoint);
            } else {
                effects.push(ignored(Command::ConfirmCheckpoint, state));
            }
        }
        Msg::PauseRequested => {
            if state == JobState::Running && job.transition(JobState::Paused, &mut effects) {
                effects.push(Effect::SetPaused(true));
            } else {
                effects.push(ignored(Command::Pause, state));
            }
        }
        Msg::ResumeRequested => {
            if state == JobState::Paused && job.transition(JobState::Running, &mut effects) {
                effects.push(Effect::SetPaused(false));
            } else {
                effects.push(ignored(Command::Resume, state));
            }
        }
        Msg::StopRequested { at } => match state {
            // Nothing has been acquired yet, so there is nothing to wind down.
            JobState::Created => {
                job.finish(JobState::Stopped, at, &mut effects);
            }
            JobState::AwaitingSession
            | JobState::AwaitingCheckpoint
            | JobState::Running
            | JobState::Paused => {
                job.transition(JobState::Stopping, &mut effects);
                effects.push(Effect::SignalStop);
            }
            JobState::Stopping
            | JobState::Completed
            | JobState::Failed
            | JobState::Stopped => {
                effects.push(ignored(Command::Stop, state));
            }
        },
        Msg::SessionAcquired => {
            if state == JobState::AwaitingSession {
                job.transition(JobState::AwaitingCheckpoint, &mut effects);
            }
        }
        Msg::Discovered {
            pages_total,
            items_total,
        } => {
            if !state.is_terminal() {
                job.set_discovery(pages_total, items_total);
            }
        }
        Msg::PageFinished { page } => {
            if !state.is_terminal() {
                job.mark_page_done(page);
            }
        }
        Msg::ItemAccepted => {
            if !state.is_terminal() {
                job.mark_item_processed();
            }
        }
        Msg::Finished { outcome, at } => match outcome {
            LoopOutcome::Exhausted => {
                // A stop that raced with the last unit still ends as STOPPED.
                let next = if state == JobState::Stopping {
                    JobState::Stopped
                } else {
                    JobState::Completed
                };
                job.finish(next, at, &mut effects);
            }
            // Only a requested stop ends as STOPPED; anything else is stale.
            LoopOutcome::Stopped => {
                if state == JobState::Stopping {
                    job.finish(JobState::Stopped, at, &mut effects);
                }
            }
            LoopOutcome::Failed { kind, reason } => {
                job.fail(kind, &reason, at, &mut effects);
            }
        },
    }

    (job, effects)
}

fn ignored(command: Command, state: JobState) -> Effect {
    Effect::Ignored { command, state }
}
