use std::num::NonZeroU32;
use std::sync::Arc;

use clap::{ArgGroup, Parser};
use inquire::Confirm;

use crate::config::Settings;
use crate::service::generator_service::OllamaService;
use crate::service::resolver::{DirectParams, PromptDerivedParams, Resolver};

#[derive(Parser, Debug)]
#[command(name = "rotation", about = "Create team rotation events in a shared calendar")]
#[command(group(
    ArgGroup::new("source")
        .required(true)
        .args(["prompt", "team_members"])
))]
pub struct Cli {
    /// Comma-separated list of team members
    #[arg(
        short = 't',
        long,
        value_delimiter = ',',
        requires = "start_date",
        requires = "duration",
        requires = "event_name"
    )]
    pub team_members: Option<Vec<String>>,

    /// Start date for the rotation (YYYY-MM-DD)
    #[arg(short = 's', long, requires = "team_members")]
    pub start_date: Option<String>,

    /// Weeks each member serves, e.g. 3
    #[arg(short = 'd', long, allow_negative_numbers = true, requires = "team_members")]
    pub duration: Option<i64>,

    /// Name of the event, e.g. SRE-ROLE
    #[arg(short = 'n', long, requires = "team_members")]
    pub event_name: Option<String>,

    /// Free-text description of the rotation, turned into flags by a local model
    #[arg(short = 'p', long)]
    pub prompt: Option<String>,

    /// Calendar display name, overrides CALENDAR_NAME
    #[arg(long)]
    pub calendar: Option<String>,

    /// End each member's series after this many turns
    #[arg(long)]
    pub cycles: Option<NonZeroU32>,

    /// Print the schedule without creating anything
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation asked before creating prompt-derived events
    #[arg(short = 'y', long)]
    pub yes: bool,
}

impl Cli {
    pub fn is_prompt(&self) -> bool {
        self.prompt.is_some()
    }

    /// Picks the resolver matching the flags clap let through.
    pub fn resolver(&self, settings: &Settings) -> Box<dyn Resolver> {
        match &self.prompt {
            Some(prompt) => Box::new(PromptDerivedParams::new(
                prompt.clone(),
                Arc::new(OllamaService::new(
                    settings.ollama_bin.clone(),
                    settings.ollama_model.clone(),
                )),
            )),
            None => Box::new(self.direct_params()),
        }
    }

    pub fn direct_params(&self) -> DirectParams {
        DirectParams {
            members: self.team_members.clone().unwrap_or_default(),
            start_date: self.start_date.clone().unwrap_or_default(),
            duration: self.duration.unwrap_or_default(),
            title: self.event_name.clone().unwrap_or_default(),
        }
    }
}

pub fn confirm_schedule() -> Result<bool, inquire::InquireError> {
    Confirm::new("Create these events?").with_default(false).prompt()
}
