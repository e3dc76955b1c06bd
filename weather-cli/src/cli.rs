use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{ArgAction, Parser, Subcommand};
use inquire::{InquireError, Password, PasswordDisplayMode, Select, Text};
use tracing::debug;
use weather_core::{
    Config, DefaultWeatherRepository, QueryStateController, QueryStatus, Units, WeatherClient,
};

use crate::render::{error_message, render_snapshot, render_status};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Current weather for a city")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure the API key, units and default city.
    Configure,

    /// Show current weather for a city.
    Show {
        /// City name; defaults to the configured default city.
        city: Option<String>,

        /// Measurement units: metric, imperial or standard.
        #[arg(long, value_parser = parse_units)]
        units: Option<Units>,

        /// Print the decoded response as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Look up cities one after another until cancelled.
    Interactive {
        /// Measurement units: metric, imperial or standard.
        #[arg(long, value_parser = parse_units)]
        units: Option<Units>,
    },
}

fn parse_units(value: &str) -> anyhow::Result<Units> {
    value.parse()
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { city, units, json } => show(city, units, json).await,
            Command::Interactive { units } => interactive(units).await,
        }
    }
}

fn load_config(units: Option<Units>) -> anyhow::Result<Config> {
    let mut config = Config::load()?;
    if let Some(units) = units {
        config.units = units;
    }
    Ok(config)
}

fn start_controller(config: &Config, city: &str) -> anyhow::Result<QueryStateController> {
    let client = WeatherClient::from_config(config)?;
    let repository = Arc::new(DefaultWeatherRepository::new(client));
    Ok(QueryStateController::with_initial_query(repository, city))
}

fn configure() -> anyhow::Result<()> {
    // Read the file only, so env overrides are not persisted.
    let mut config = Config::load_from(&Config::config_file_path()?)?;

    let api_key = Password::new("OpenWeather API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()?;
    let api_key = api_key.trim();
    if api_key.is_empty() {
        bail!("API key must not be empty.");
    }

    let units = Units::all().to_vec();
    let cursor = units.iter().position(|u| *u == config.units).unwrap_or(0);
    let units = Select::new("Units:", units)
        .with_starting_cursor(cursor)
        .prompt()?;

    let city = Text::new("Default city:")
        .with_default(&config.default_city)
        .prompt()?;

    config.set_api_key(api_key.to_string());
    config.units = units;
    if !city.trim().is_empty() {
        config.default_city = city.trim().to_string();
    }

    let path = config.save()?;
    println!("Saved configuration to {}", path.display());
    Ok(())
}

async fn show(city: Option<String>, units: Option<Units>, json: bool) -> anyhow::Result<()> {
    let config = load_config(units)?;
    let city = city.unwrap_or_else(|| config.default_city.clone());
    if city.trim().is_empty() {
        bail!("City name must not be empty.");
    }

    let controller = start_controller(&config, city.trim())?;

    match controller.settled().await {
        QueryStatus::Success(snapshot) if json => {
            let out = serde_json::to_string_pretty(&snapshot)
                .context("Failed to encode weather as JSON")?;
            println!("{out}");
        }
        QueryStatus::Success(snapshot) => println!("{}", render_snapshot(&snapshot, config.units)),
        QueryStatus::Failure(err) => {
            debug!(category = %err.category, status = ?err.raw_status_code, message = %err.message, "Lookup failed");
            bail!("{}", error_message(err.category));
        }
        QueryStatus::Loading => bail!("Weather lookup did not complete."),
    }

    Ok(())
}

async fn interactive(units: Option<Units>) -> anyhow::Result<()> {
    let config = load_config(units)?;
    let controller = start_controller(&config, &config.default_city)?;

    loop {
        println!("{}\n", render_status(&QueryStatus::Loading, config.units));
        let status = controller.settled().await;
        println!("{}\n", render_status(&status, config.units));

        match prompt_city(controller.query()).await? {
            Some(city) => {
                controller.submit_query(city);
            }
            None => return Ok(()),
        }
    }
}

/// Prompt until a non-empty city is entered. `None` when the user cancels.
async fn prompt_city(current: String) -> anyhow::Result<Option<String>> {
    loop {
        let default = current.clone();
        let answer = tokio::task::spawn_blocking(move || {
            Text::new("City:")
                .with_default(&default)
                .with_help_message("Enter to search, Esc to quit")
                .prompt()
        })
        .await
        .context("Prompt task failed")?;

        match answer {
            Ok(city) if city.trim().is_empty() => eprintln!("Please enter a city name."),
            Ok(city) => return Ok(Some(city.trim().to_string())),
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_parses_city_units_and_json() {
        let cli = Cli::try_parse_from(["weather", "-v", "show", "Oslo", "--units", "imperial", "--json"])
            .unwrap();

        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Show { city, units, json } => {
                assert_eq!(city.as_deref(), Some("Oslo"));
                assert_eq!(units, Some(Units::Imperial));
                assert!(json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn show_city_is_optional() {
        let cli = Cli::try_parse_from(["weather", "show"]).unwrap();
        assert!(matches!(cli.command, Command::Show { city: None, units: None, json: false }));
    }

    #[test]
    fn unknown_units_are_rejected() {
        assert!(Cli::try_parse_from(["weather", "show", "--units", "furlongs"]).is_err());
    }
}
