//! Line commands typed at the terminal while a job runs.

use outreach_core::{JobState, JobStatus};

pub const HELP: &str = "\
commands:
  confirm (c)  continue after logging in / passing the checkpoint
  pause        pause between items
  resume       continue a paused job
  stop         finish the current item and stop
  status       show progress and the latest log lines
  help         show this list";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Confirm,
    Pause,
    Resume,
    Stop,
    Status,
    Help,
    Unknown(String),
}

/// `None` for a blank line.
pub fn parse_command(line: &str) -> Option<ConsoleCommand> {
    let word = line.trim().to_lowercase();
    let command = match word.as_str() {
        "" => return None,
        "confirm" | "c" | "ok" => ConsoleCommand::Confirm,
        "pause" | "p" => ConsoleCommand::Pause,
        "resume" | "r" => ConsoleCommand::Resume,
        "stop" | "quit" | "q" => ConsoleCommand::Stop,
        "status" | "s" => ConsoleCommand::Status,
        "help" | "h" | "?" => ConsoleCommand::Help,
        _ => ConsoleCommand::Unknown(line.trim().to_string()),
    };
    Some(command)
}

pub fn checkpoint_prompt(kind: &str) -> String {
    format!(
        "The browser is open for the {kind} job. Log in or pass any verification, \
         then type `confirm` to start."
    )
}

pub fn render_status(status: &JobStatus) -> String {
    let mut out = format!("job {} ({}): {}", status.job_id, status.kind, status.summary_line());
    out.push_str(&format!("\nresult: {}", status.result_location.display()));
    for line in &status.recent_log_lines {
        out.push_str("\n  ");
        out.push_str(line);
    }
    out
}

pub fn render_final(status: &JobStatus) -> String {
    let verdict = match status.state {
        JobState::Completed => "finished",
        JobState::Stopped => "stopped",
        JobState::Failed => "failed",
        _ => "ended",
    };
    format!(
        "job {} {verdict}: {} item(s) written to {}",
        status.job_id,
        status.items_processed,
        status.result_location.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use outreach_core::JobKind;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    #[test]
    fn parses_commands_and_aliases() {
        assert_eq!(parse_command("  C \n"), Some(ConsoleCommand::Confirm));
        assert_eq!(parse_command("Pause"), Some(ConsoleCommand::Pause));
        assert_eq!(parse_command("stop"), Some(ConsoleCommand::Stop));
        assert_eq!(parse_command("   "), None);
        assert_eq!(
            parse_command("launch"),
            Some(ConsoleCommand::Unknown("launch".to_string()))
        );
    }

    #[test]
    fn status_lists_recent_log_lines() {
        let status = JobStatus {
            job_id: 3,
            kind: JobKind::Messaging,
            state: JobState::Failed,
            pages_done: 1,
            pages_total: 1,
            items_processed: 4,
            items_total: Some(9),
            result_location: PathBuf::from("out/messaging-3.csv"),
            failure_reason: Some("session failure".to_string()),
            recent_log_lines: vec!["12:00:01 INFO accepted 905551112233".to_string()],
        };
        let rendered = render_status(&status);
        assert!(rendered.starts_with("job 3 (messaging): FAILED pages 1/1 items 4/9"));
        assert!(rendered.ends_with("\n  12:00:01 INFO accepted 905551112233"));
        assert_eq!(
            render_final(&status),
            format!(
                "job 3 failed: 4 item(s) written to {}",
                PathBuf::from("out/messaging-3.csv").display()
            )
        );
    }
}
