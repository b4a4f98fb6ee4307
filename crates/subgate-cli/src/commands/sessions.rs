use std::sync::Arc;

use anyhow::{Result, anyhow};
use subgate_auth::{RefreshRecords, SessionInfo};
use subgate_auth_redis::RedisCredentialStore;

use crate::cli::OutputFormat;
use crate::config::CliConfig;
use crate::output::{print_sessions, print_success, print_warning};

pub async fn connect(config: &CliConfig) -> Result<RefreshRecords> {
    let store = RedisCredentialStore::connect(&config.redis).await?;
    Ok(
        RefreshRecords::new(Arc::new(store), config.auth.sessions.store_timeout)
            .with_retention(config.auth.sessions.expired_retention),
    )
}

pub async fn list(records: &RefreshRecords, user_id: i64, format: OutputFormat) -> Result<()> {
    let sessions = records
        .list_user(user_id)
        .await
        .map_err(|e| anyhow!("listing sessions: {e}"))?;
    let sessions: Vec<SessionInfo> = sessions.iter().map(SessionInfo::from).collect();
    print_sessions(&sessions, format)
}

/// Deletes the indexed refresh tokens of `user_id`. The token version is not
/// bumped, so this does not stand in for a password change.
pub async fn revoke_user(records: &RefreshRecords, user_id: i64) -> Result<()> {
    let revoked = records
        .revoke_user(user_id)
        .await
        .map_err(|e| anyhow!("revoking sessions: {e}"))?;
    tracing::info!(user_id, revoked, "revoked refresh tokens from CLI");
    print_success(&format!("Revoked {revoked} refresh token(s) of user {user_id}"));
    print_warning(
        "The token version is unchanged: issued access tokens stay valid until they expire, \
         and refresh tokens missing from the user index are not touched",
    );
    Ok(())
}

pub async fn revoke_family(records: &RefreshRecords, family_id: &str) -> Result<()> {
    let revoked = records
        .destroy_family(family_id)
        .await
        .map_err(|e| anyhow!("revoking family: {e}"))?;
    tracing::info!(family_id, revoked, "revoked token family from CLI");
    if revoked == 0 {
        print_warning(&format!("No live refresh tokens in family {family_id}"));
    } else {
        print_success(&format!("Revoked {revoked} refresh token(s) in family {family_id}"));
    }
    Ok(())
}
