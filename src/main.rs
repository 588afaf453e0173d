mod cli;
mod facts;
mod view;

use std::future::Future;
use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use newtab_core::{AppError, Config};
use newtab_weather::{
    ConfiguredGeolocator, Dashboard, Geolocator, JsonFileBackend, KeyValueBackend, MemoryBackend,
    OpenMeteoClient, PreferenceStore, WeatherApi,
};

use crate::cli::{parse_prompt_line, Cli, Command, PromptInput};
use crate::view::TerminalView;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    newtab_core::init()?;

    if let Err(e) = run(cli).await {
        tracing::error!("{}", e);
        eprintln!("{}", e.user_message());
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let today = Local::now().date_naive();

    // A fact lookup never touches the dashboard
    if let Some(Command::Fact { date }) = &cli.command {
        println!("{}", facts::fact_for(date.unwrap_or(today)));
        return Ok(());
    }

    let (config, _) = Config::load_validated(cli.config.as_deref())?;

    println!("{}", facts::fact_for(today));
    println!();

    let backend: Arc<dyn KeyValueBackend> = if cli.ephemeral {
        tracing::info!("Preferences kept in memory for this run");
        Arc::new(MemoryBackend::new())
    } else {
        let file = JsonFileBackend::new(config.preferences_path());
        tracing::debug!("Preferences stored at {}", file.path().display());
        Arc::new(file)
    };

    let dashboard = Dashboard::new(
        OpenMeteoClient::new(&config.weather)?,
        ConfiguredGeolocator::new(&config.geolocation),
        TerminalView::new(),
        PreferenceStore::new(backend),
        config.geolocation.timeout(),
    );

    tracing::info!("newtab started");
    dashboard.restore().await;

    let outcome = flushing(dashboard.preferences(), async {
        match cli.command {
            Some(command) => execute(&dashboard, command).await,
            None => prompt(&dashboard).await,
        }
    })
    .await;

    outcome.map_err(AppError::from)
}

/// Run `work`, then wait for pending preference writes whatever it returned.
async fn flushing<T>(prefs: &PreferenceStore, work: impl Future<Output = T>) -> T {
    let outcome = work.await;
    prefs.flush().await;
    outcome
}

async fn execute<A, G>(dashboard: &Dashboard<A, G, TerminalView>, command: Command) -> io::Result<()>
where
    A: WeatherApi,
    G: Geolocator,
{
    match command {
        Command::Show => {}
        Command::Search { city } => dashboard.search_city(&city.join(" ")).await,
        Command::Locate => dashboard.use_my_location().await,
        Command::Unit { unit } => dashboard.set_unit(unit),
        Command::Toggle => {
            dashboard.toggle_collapsed();
        }
        Command::Fact { date } => {
            let day = date.unwrap_or_else(|| Local::now().date_naive());
            println!("{}", facts::fact_for(day));
            return Ok(());
        }
    }

    dashboard.view().render(&mut io::stdout())
}

async fn prompt<A, G>(dashboard: &Dashboard<A, G, TerminalView>) -> io::Result<()>
where
    A: WeatherApi,
    G: Geolocator,
{
    dashboard.view().render(&mut io::stdout())?;
    println!("Type 'help' for commands, 'quit' to exit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_prompt_line(&line) {
            PromptInput::Blank => continue,
            PromptInput::Quit => break,
            PromptInput::Message(text) => println!("{}", text.trim_end()),
            PromptInput::Command(command) => execute(dashboard, command).await?,
        }
    }

    Ok(())
}
