use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Browser-driven listing collection and contact messaging
#[derive(Parser, Debug)]
#[command(name = "outreach", version)]
pub struct Cli {
    /// RON configuration file; built-in defaults are used when it is missing
    #[arg(long, short, default_value = "outreach.ron")]
    pub config: PathBuf,

    /// Directory for result files and job summaries
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// WebDriver endpoint, e.g. http://localhost:9515
    #[arg(long)]
    pub webdriver: Option<String>,

    /// Run the browser without a window
    #[arg(long)]
    pub headless: bool,

    #[command(subcommand)]
    pub command: JobCommand,
}

#[derive(Subcommand, Debug)]
pub enum JobCommand {
    /// Walk the listing pages and collect one row per new listing
    Collect {
        /// Overrides the listing url from the config
        #[arg(long)]
        listing_url: Option<String>,

        /// Result file name without extension
        #[arg(long)]
        output_name: Option<String>,
    },
    /// Send one templated message per distinct phone number in a contacts file
    Message {
        /// Contacts CSV; overrides the config
        #[arg(long)]
        contacts: Option<PathBuf>,

        /// Deliver every message to this number instead of the contact's
        #[arg(long)]
        test_recipient: Option<String>,

        /// Result file name without extension
        #[arg(long)]
        output_name: Option<String>,
    },
}

impl JobCommand {
    pub fn kind_label(&self) -> &'static str {
        match self {
            JobCommand::Collect { .. } => "collection",
            JobCommand::Message { .. } => "messaging",
        }
    }
}
