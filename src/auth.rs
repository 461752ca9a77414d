use crate::config::AppConfig;
use crate::error::AppError;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

const MANAGEMENT_RESOURCE: &str = "https://management.azure.com/";

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    #[serde(rename = "expires_on", default)]
    expires_on_epoch: Option<i64>,
}

fn parse_cli_token(raw: &[u8]) -> Result<AccessToken, AppError> {
    let parsed: CliToken = serde_json::from_slice(raw)?;
    if parsed.access_token.is_empty() {
        return Err(AppError::Auth("az returned an empty access token".into()));
    }
    Ok(AccessToken {
        token: parsed.access_token,
        expires_on: parsed
            .expires_on_epoch
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
    })
}

/// Bearer token for the management API: `AUTOPILOT_ACCESS_TOKEN` (or the
/// `access_token` config key) when set, otherwise the Azure CLI's cached login.
pub async fn access_token(cfg: &AppConfig) -> Result<AccessToken, AppError> {
    if let Some(token) = cfg.access_token.as_deref().filter(|t| !t.trim().is_empty()) {
        debug!("using configured access token");
        return Ok(AccessToken {
            token: token.trim().to_string(),
            expires_on: None,
        });
    }

    let output = Command::new("az")
        .args([
            "account",
            "get-access-token",
            "--resource",
            MANAGEMENT_RESOURCE,
            "--output",
            "json",
        ])
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| AppError::Auth(format!("could not run the Azure CLI (az): {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AppError::Auth(format!(
            "{} (run `autopilot login` first)",
            stderr.trim()
        )));
    }

    let token = parse_cli_token(&output.stdout)?;
    if let Some(expiry) = token.expires_on {
        debug!(%expiry, "obtained access token from az");
    }
    Ok(token)
}

/// Runs the interactive browser login unless a token is already configured.
pub async fn interactive_login(cfg: &AppConfig) -> Result<(), AppError> {
    if cfg.access_token.as_deref().is_some_and(|t| !t.trim().is_empty()) {
        info!("access token configured; skipping interactive login");
        return Ok(());
    }

    let status = Command::new("az")
        .args(["login", "--output", "none"])
        .status()
        .await
        .map_err(|e| AppError::Auth(format!("could not run the Azure CLI (az): {e}")))?;
    if !status.success() {
        return Err(AppError::Auth(format!("az login exited with {status}")));
    }
    Ok(())
}
