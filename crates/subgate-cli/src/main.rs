use anyhow::Result;
use clap::Parser;

use subgate_cli::cli::{Cli, Commands, ConfigCommands, SessionsCommands, TokenCommands};
use subgate_cli::config::loader::load_config;
use subgate_cli::output::{print_error, print_success};
use subgate_cli::{commands, observability, output};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        // A missing .env file is normal
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            output::print_warning(&format!("failed to load .env: {e}"));
        }
    }

    let cli = Cli::parse();
    let format = cli.format.unwrap_or_default();
    let cfg = load_config(cli.config.as_deref()).map_err(anyhow::Error::msg)?;
    observability::init_tracing_with_level(&cfg.logging.level);

    match &cli.command {
        Commands::Token(args) => match &args.command {
            TokenCommands::Mint(mint) => commands::token::mint(&cfg.auth, mint, format)?,
            TokenCommands::Inspect(inspect) => {
                commands::token::inspect(&cfg.auth, inspect, format)?
            }
        },
        Commands::Sessions(args) => {
            let records = commands::sessions::connect(&cfg).await?;
            match &args.command {
                SessionsCommands::List { user_id } => {
                    commands::sessions::list(&records, *user_id, format).await?
                }
                SessionsCommands::RevokeUser { user_id } => {
                    commands::sessions::revoke_user(&records, *user_id).await?
                }
                SessionsCommands::RevokeFamily { family_id } => {
                    commands::sessions::revoke_family(&records, family_id).await?
                }
            }
        }
        Commands::Config(args) => match &args.command {
            ConfigCommands::Show => {
                println!("{}", toml::to_string_pretty(&cfg.redacted())?);
            }
            ConfigCommands::Check => print_success("Configuration is valid"),
        },
    }

    Ok(())
}
