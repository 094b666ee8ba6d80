use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use outreach_core::{update, Effect, FailureKind, Job, JobKind, JobState, LoopOutcome, Msg};
use proptest::prelude::*;

fn msg_strategy() -> impl Strategy<Value = Msg> {
    let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    prop_oneof![
        Just(Msg::StartRequested),
        Just(Msg::CheckpointConfirmed),
        Just(Msg::PauseRequested),
        Just(Msg::ResumeRequested),
        Just(Msg::StopRequested { at }),
        Just(Msg::SessionAcquired),
        (0u32..5, proptest::option::of(0u64..6)).prop_map(|(pages_total, items_total)| {
            Msg::Discovered {
                pages_total,
                items_total,
            }
        }),
        (0u32..6).prop_map(|page| Msg::PageFinished { page }),
        Just(Msg::ItemAccepted),
        Just(Msg::Finished {
            outcome: LoopOutcome::Exhausted,
            at,
        }),
        Just(Msg::Finished {
            outcome: LoopOutcome::Stopped,
            at,
        }),
        Just(Msg::Finished {
            outcome: LoopOutcome::Failed {
                kind: FailureKind::SessionFailure,
                reason: "lost".to_string(),
            },
            at,
        }),
    ]
}

proptest! {
    #[test]
    fn every_transition_follows_the_graph(msgs in proptest::collection::vec(msg_strategy(), 0..40)) {
        let mut job = Job::new(
            7,
            JobKind::Messaging,
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            PathBuf::from("out.csv"),
        );
        let mut last_processed = 0;
        let mut was_terminal = false;

        for msg in msgs {
            let before = job.state();
            let (next, effects) = update(job, msg);
            job = next;

            prop_assert!(JobState::ALL.contains(&job.state()));
            if before != job.state() {
                prop_assert!(before.can_transition_to(job.state()));
            }
            for effect in &effects {
                if let Effect::StateChanged { from, to } = effect {
                    prop_assert!(from.can_transition_to(*to));
                }
            }
            if was_terminal {
                prop_assert_eq!(before, job.state());
            }
            was_terminal = job.state().is_terminal();

            prop_assert!(job.items_processed() >= last_processed);
            last_processed = job.items_processed();
            if let Some(total) = job.items_total() {
                prop_assert!(job.items_processed() <= total);
            }
            prop_assert!(job.pages_done() <= job.pages_total());
        }
    }
}
