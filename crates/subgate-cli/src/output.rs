use colored::Colorize;
use serde::Serialize;
use subgate_auth::SessionInfo;
use tabled::builder::Builder;
use tabled::settings::Style;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::cli::OutputFormat;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_warning(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_sessions(sessions: &[SessionInfo], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(&sessions),
        OutputFormat::Table => {
            if sessions.is_empty() {
                println!("No live sessions.");
                return Ok(());
            }
            println!("{}", sessions_table(sessions));
            println!("Total: {}", sessions.len());
            Ok(())
        }
    }
}

pub fn sessions_table(sessions: &[SessionInfo]) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Family", "Created", "Expires"]);
    for session in sessions {
        builder.push_record([
            session.family_id.clone(),
            timestamp(session.created_at),
            timestamp(session.expires_at),
        ]);
    }
    builder.build().with(Style::rounded()).to_string()
}

fn timestamp(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_else(|_| "-".to_string())
}
