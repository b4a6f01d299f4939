pub mod commands;
pub mod telemetry;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use parkwise_core::config::{AppConfig, ConfigOverrides, LlmProvider, LoadOptions};

use crate::commands::filter::ConditionArgs;
use crate::commands::recommend::RecommendArgs;

#[derive(Debug, Parser)]
#[command(
    name = "parkwise",
    about = "Parkwise savings account recommender",
    long_about = "Filter the savings catalog, run the recommendation pipeline, and manage the local catalog database.",
    after_help = "Examples:\n  parkwise seed\n  parkwise filter --amount 10000000 --months 12 --min-rate 2.5\n  parkwise recommend --amount 10000000 --special bank_app --answer yes\n  parkwise config"
)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct GlobalArgs {
    #[arg(long, global = true, help = "Config file path (default: parkwise.toml)")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override database.url")]
    database_url: Option<String>,
    #[arg(long, global = true, help = "Override logging.level")]
    log_level: Option<String>,
    #[arg(long, global = true, help = "Override llm.provider (openai|ollama)")]
    llm_provider: Option<LlmProvider>,
    #[arg(long, global = true, help = "Override llm.model")]
    llm_model: Option<String>,
}

impl GlobalArgs {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            require_file: self.config.is_some(),
            config_path: self.config.clone(),
            overrides: ConfigOverrides {
                database_url: self.database_url.clone(),
                log_level: self.log_level.clone(),
                llm_provider: self.llm_provider,
                llm_model: self.llm_model.clone(),
                interactive: None,
            },
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run the eligibility filter alone and print the matched products as JSON")]
    Filter(ConditionArgs),
    #[command(about = "Run the full recommendation pipeline and print the scenarios as JSON")]
    Recommend(RecommendArgs),
    #[command(about = "Load the demo product catalog into the configured database")]
    Seed,
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.global.load_options();

    // Config errors are reported by the command itself.
    if let Ok(config) = AppConfig::load(options.clone()) {
        telemetry::init(&config.logging);
    }

    let result = match &cli.command {
        Command::Filter(args) => commands::filter::run(options, args),
        Command::Recommend(args) => commands::recommend::run(options, args),
        Command::Seed => commands::seed::run(options),
        Command::Migrate => commands::migrate::run(options),
        Command::Config => commands::config::run(options),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
