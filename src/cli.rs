//! Command-line arguments and the interactive prompt grammar.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use newtab_weather::TemperatureUnit;

#[derive(Parser, Debug)]
#[command(name = "newtab")]
#[command(about = "Daily climate fact and a small weather dashboard", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to config.toml (defaults to the user config directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Keep preferences in memory only for this run
    #[arg(long)]
    pub ephemeral: bool,

    /// Run one command and exit. Without one, start the interactive prompt.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Show weather for the last location
    Show,

    /// Look up a city and show its weather
    Search {
        #[arg(required = true, num_args = 1..)]
        city: Vec<String>,
    },

    /// Show weather for the configured position
    Locate,

    /// Switch the temperature unit (C, F or K)
    Unit { unit: TemperatureUnit },

    /// Collapse or expand the weather panel
    Toggle,

    /// Print the climate fact for a day
    Fact {
        /// Day to show, as YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

/// A line typed at the prompt, parsed with the same verbs as the CLI.
#[derive(Parser, Debug)]
#[command(name = "newtab", no_binary_name = true)]
struct PromptLine {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, PartialEq)]
pub enum PromptInput {
    Blank,
    Quit,
    Command(Command),
    /// Help text or a parse error to show the user
    Message(String),
}

pub fn parse_prompt_line(line: &str) -> PromptInput {
    let words: Vec<&str> = line.split_whitespace().collect();

    match words.as_slice() {
        [] => PromptInput::Blank,
        ["quit"] | ["exit"] => PromptInput::Quit,
        _ => match PromptLine::try_parse_from(words) {
            Ok(parsed) => PromptInput::Command(parsed.command),
            Err(e) => PromptInput::Message(e.to_string()),
        },
    }
}
