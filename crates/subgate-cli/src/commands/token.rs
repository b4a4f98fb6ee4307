use std::io::Read;

use anyhow::{Context, Result, anyhow};
use colored::Colorize;
use serde::Serialize;
use subgate_auth::{AccessClaims, AccessTokenCodec, AuthConfig, Identity, Role, Validated};

use crate::cli::{InspectArgs, MintArgs, OutputFormat};
use crate::output::print_json;

#[derive(Serialize)]
struct MintOutput<'a> {
    access_token: &'a str,
    expires_in: u64,
}

#[derive(Serialize)]
struct InspectOutput<'a> {
    status: &'static str,
    claims: &'a AccessClaims,
}

pub fn mint(config: &AuthConfig, args: &MintArgs, format: OutputFormat) -> Result<()> {
    let role: Role = args.role.parse().map_err(|e| anyhow!("{e}"))?;
    let identity = Identity::new(args.user_id, args.email.clone())
        .with_role(role)
        .with_token_version(args.token_version);

    let codec = AccessTokenCodec::new(config);
    let token = codec
        .mint(&identity)
        .map_err(|e| anyhow!("{e} ({})", e.code()))?;
    tracing::info!(user_id = identity.id, "minted access token from CLI");

    match format {
        OutputFormat::Json => print_json(&MintOutput {
            access_token: token.as_str(),
            expires_in: config.access_token_expires_in(),
        }),
        OutputFormat::Table => {
            println!("{}", token.as_str());
            Ok(())
        }
    }
}

pub fn inspect(config: &AuthConfig, args: &InspectArgs, format: OutputFormat) -> Result<()> {
    let token = match &args.token {
        Some(token) => token.clone(),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading token from stdin")?;
            buf
        }
    };

    let codec = AccessTokenCodec::new(config);
    let validated = codec
        .validate(token.trim())
        .map_err(|e| anyhow!("{e} ({})", e.code()))?;
    let status = if validated.is_expired() {
        "expired"
    } else {
        "valid"
    };

    match format {
        OutputFormat::Json => print_json(&InspectOutput {
            status,
            claims: validated.claims(),
        }),
        OutputFormat::Table => {
            print_claims(&validated);
            Ok(())
        }
    }
}

fn print_claims(validated: &Validated) {
    let claims = validated.claims();
    let status = match validated {
        Validated::Valid(_) => "valid".green(),
        Validated::Expired(_) => "expired".yellow(),
    };
    println!("{}: {}", "Status".cyan(), status);
    println!("{}: {}", "User".cyan(), claims.user_id);
    println!("{}: {}", "Email".cyan(), claims.email);
    println!("{}: {}", "Role".cyan(), claims.role);
    println!("{}: {}", "Token version".cyan(), claims.token_version);
    println!("{}: {}", "Issued at".cyan(), claims.iat);
    println!("{}: {}", "Expires at".cyan(), claims.exp);
}
