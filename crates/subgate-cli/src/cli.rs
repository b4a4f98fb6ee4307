use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "subgate")]
#[command(about = "Subgate CLI: mint, inspect and revoke session tokens")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the TOML config file (defaults to ./subgate.toml if present)
    #[arg(short, long, global = true, env = "SUBGATE_CONFIG")]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Mint and inspect access tokens
    Token(TokenArgs),
    /// List and revoke refresh token sessions
    Sessions(SessionsArgs),
    /// Show or check the effective configuration
    Config(ConfigArgs),
}

#[derive(clap::Args)]
pub struct TokenArgs {
    #[command(subcommand)]
    pub command: TokenCommands,
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Mint an access token for an identity (testing and support use)
    Mint(MintArgs),
    /// Validate an access token and print its claims
    Inspect(InspectArgs),
}

#[derive(clap::Args)]
pub struct MintArgs {
    /// Identity id
    #[arg(long)]
    pub user_id: i64,
    /// Identity email
    #[arg(long)]
    pub email: String,
    /// Role (admin or user)
    #[arg(long, default_value = "user")]
    pub role: String,
    /// Token version to embed
    #[arg(long, default_value_t = 0)]
    pub token_version: i64,
}

#[derive(clap::Args)]
pub struct InspectArgs {
    /// The access token (reads from stdin if omitted)
    pub token: Option<String>,
}

#[derive(clap::Args)]
pub struct SessionsArgs {
    #[command(subcommand)]
    pub command: SessionsCommands,
}

#[derive(Subcommand)]
pub enum SessionsCommands {
    /// List live refresh token sessions of an identity
    List {
        /// Identity id
        user_id: i64,
    },
    /// Revoke the indexed refresh tokens of an identity.
    ///
    /// Does not bump the token version: access tokens stay valid until they
    /// expire. Not a substitute for the password-change flow.
    RevokeUser {
        /// Identity id
        user_id: i64,
    },
    /// Revoke every refresh token in one family
    RevokeFamily {
        /// Family id
        family_id: String,
    },
}

#[derive(clap::Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the merged configuration with secrets masked
    Show,
    /// Load and validate the configuration
    Check,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_commands() {
        let cli = Cli::try_parse_from([
            "subgate",
            "--format",
            "json",
            "token",
            "mint",
            "--user-id",
            "7",
            "--email",
            "a@example.com",
        ])
        .unwrap();
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        match cli.command {
            Commands::Token(TokenArgs {
                command: TokenCommands::Mint(args),
            }) => {
                assert_eq!(args.user_id, 7);
                assert_eq!(args.role, "user");
                assert_eq!(args.token_version, 0);
            }
            _ => panic!("expected token mint"),
        }
    }

    #[test]
    fn revoke_user_help_states_token_version_is_kept() {
        use clap::CommandFactory;

        let cli = Cli::command();
        let revoke_user = cli
            .find_subcommand("sessions")
            .and_then(|sessions| sessions.find_subcommand("revoke-user"))
            .unwrap();
        let help = revoke_user.get_long_about().unwrap().to_string();
        assert!(help.contains("token version"), "{help}");
    }

    #[test]
    fn parses_sessions_revoke_family() {
        let cli = Cli::try_parse_from(["subgate", "sessions", "revoke-family", "abc123"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Sessions(SessionsArgs {
                command: SessionsCommands::RevokeFamily { ref family_id },
            }) if family_id == "abc123"
        ));
    }
}
