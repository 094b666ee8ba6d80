use std::io::{self, BufRead};
use std::process::ExitCode;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use engine_logging::{engine_error, engine_info};
use outreach_core::{JobId, JobState};
use outreach_engine::{
    ChannelProgressSink, EngineEvent, JobParams, JobRegistry, ProgressKind, SessionFactory,
    WebDriverSessionFactory,
};

use super::config::{load_config, AppConfig};
use super::console::{self, ConsoleCommand};
use super::logging;
use crate::cli::{Cli, JobCommand};

const TICK: Duration = Duration::from_millis(250);
const JOIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs one job from the command line until it reaches a terminal state.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = load_config(&cli.config)?;
    let kind = cli.command.kind_label();
    let echo_logs = !config.log_to_terminal.unwrap_or(false);
    if let Some(path) = logging::initialize(&config.log_dir(), kind, !echo_logs) {
        println!("logging to {}", path.display());
    }
    engine_info!("outreach {} starting (config {:?})", kind, cli.config);

    let params = job_params(&config, cli.command)?;
    let settings = config.engine_settings(cli.output_dir);
    let factory: Arc<dyn SessionFactory> = Arc::new(WebDriverSessionFactory::new(
        config.webdriver_settings(cli.webdriver, cli.headless),
    ));

    let (event_tx, event_rx) = mpsc::channel::<EngineEvent>();
    let registry = JobRegistry::new(settings, factory)
        .with_progress_sink(Arc::new(ChannelProgressSink::new(event_tx)));
    let job_id = registry.start(params)?;
    println!("{}", console::HELP);

    let input_rx = spawn_input_reader()?;
    let app = ConsoleApp {
        registry,
        job_id,
        kind,
        echo_logs,
    };
    app.run(&event_rx, &input_rx)
}

fn job_params(config: &AppConfig, command: JobCommand) -> anyhow::Result<JobParams> {
    Ok(match command {
        JobCommand::Collect {
            listing_url,
            output_name,
        } => JobParams::Collection(config.collection_profile(listing_url, output_name)?),
        JobCommand::Message {
            contacts,
            test_recipient,
            output_name,
        } => JobParams::Messaging(config.messaging_profile(contacts, test_recipient, output_name)?),
    })
}

fn spawn_input_reader() -> anyhow::Result<mpsc::Receiver<ConsoleCommand>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("console-input".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if let Some(command) = console::parse_command(&line) {
                    if tx.send(command).is_err() {
                        break;
                    }
                }
            }
        })
        .context("starting the console reader")?;
    Ok(rx)
}

struct ConsoleApp {
    registry: JobRegistry,
    job_id: JobId,
    kind: &'static str,
    echo_logs: bool,
}

impl ConsoleApp {
    fn run(
        &self,
        events: &mpsc::Receiver<EngineEvent>,
        input: &mpsc::Receiver<ConsoleCommand>,
    ) -> anyhow::Result<ExitCode> {
        loop {
            match events.recv_timeout(TICK) {
                Ok(event) => self.on_event(event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            while let Ok(command) = input.try_recv() {
                self.dispatch(command)?;
            }
            if self.registry.status(self.job_id)?.state.is_terminal() {
                break;
            }
        }

        let controller = self.registry.controller(self.job_id)?;
        let status = match controller.wait_until_terminal(JOIN_TIMEOUT) {
            Some(status) => status,
            None => controller.status(),
        };
        while let Ok(event) = events.try_recv() {
            self.on_event(event);
        }
        println!("{}", console::render_final(&status));
        if let Some(reason) = &status.failure_reason {
            engine_error!("job {} failed: {}", status.job_id, reason);
        }

        Ok(if status.state == JobState::Failed {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        })
    }

    fn on_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::Progress(event) => match event.kind {
                ProgressKind::StateChanged {
                    to: JobState::AwaitingCheckpoint,
                    ..
                } => println!("{}", console::checkpoint_prompt(self.kind)),
                ProgressKind::StateChanged { from, to } => println!("[{from} -> {to}]"),
                ProgressKind::Discovered {
                    pages_total,
                    items_total,
                } => match items_total {
                    Some(items) => println!("{pages_total} page(s), about {items} item(s)"),
                    None => println!("{pages_total} page(s)"),
                },
                _ => {}
            },
            EngineEvent::Log { entry, .. } if self.echo_logs => println!("{}", entry.line()),
            EngineEvent::Log { .. } => {}
        }
    }

    fn dispatch(&self, command: ConsoleCommand) -> anyhow::Result<()> {
        let id = self.job_id;
        match command {
            ConsoleCommand::Confirm => self.registry.confirm_checkpoint(id)?,
            ConsoleCommand::Pause => self.registry.pause(id)?,
            ConsoleCommand::Resume => self.registry.resume(id)?,
            ConsoleCommand::Stop => self.registry.stop(id)?,
            ConsoleCommand::Status => {
                println!("{}", console::render_status(&self.registry.status(id)?))
            }
            ConsoleCommand::Help => println!("{}", console::HELP),
            ConsoleCommand::Unknown(word) => println!("unknown command `{word}`; type `help`"),
        }
        Ok(())
    }
}
