use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use time::{Date, macros::format_description};

/// Command-line arguments for the guesssenpai binary.
#[derive(Debug, Parser)]
#[command(name = "guesssenpai", version, about = "Daily anime puzzle assembly")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "GUESSSENPAI_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the catalog snapshot file.
    #[arg(long = "catalog", value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub catalog: Option<PathBuf>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Assemble (or read from cache) the puzzle set for a day and print it as JSON.
    Daily(DailyArgs),
    /// Render a degraded poster variant.
    Poster(PosterArgs),
}

#[derive(Debug, Args, Clone, Default)]
pub struct DailyArgs {
    /// Puzzle day as YYYY-MM-DD; defaults to today in UTC.
    #[arg(long, value_name = "DATE", value_parser = parse_day)]
    pub date: Option<Date>,

    /// Assemble for a signed-in user instead of the anonymous audience.
    #[arg(long = "user-id", value_name = "ID", requires = "access_token")]
    pub user_id: Option<i64>,

    /// Catalog access token of the user.
    #[arg(long = "access-token", value_name = "TOKEN", requires = "user_id")]
    pub access_token: Option<String>,

    /// Include the guess-the-opening game.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub opening: bool,
}

#[derive(Debug, Args, Clone)]
pub struct PosterArgs {
    /// Media whose poster is rendered.
    #[arg(long = "media-id", value_name = "ID")]
    pub media_id: i64,

    /// Hints already used; clamped into the available rounds.
    #[arg(long, value_name = "COUNT", default_value_t = 0, allow_hyphen_values = true)]
    pub hints: i64,

    /// Write the image here instead of stdout.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}

fn parse_day(value: &str) -> Result<Date, String> {
    Date::parse(value, format_description!("[year]-[month]-[day]"))
        .map_err(|err| format!("expected YYYY-MM-DD: {err}"))
}
