//! HTTP client for the Rivalwatch API.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use shared::commands::{BotCommand, CommandReply};
use shared::models::BotStatusView;

/// Actor recorded in the command log for CLI invocations.
const CLI_ACTOR: &str = "cli";

/// Subset of the health response the CLI prints.
#[derive(Debug, Deserialize)]
pub struct Health {
    pub status: String,
    pub service: String,
    pub version: String,
    #[serde(default)]
    pub processes: Vec<BotStatusView>,
}

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    command: String,
    actor_id: &'a str,
}

/// Thin wrapper around `reqwest` bound to one API base URL.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Fetches `/health`.
    pub async fn health(&self) -> Result<Health> {
        let url = self.url("/health");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to reach {url}"))?;

        if !response.status().is_success() {
            bail!("Health check failed with status {}", response.status());
        }
        response
            .json::<Health>()
            .await
            .context("Invalid health response")
    }

    /// Runs a bot command on the server.
    ///
    /// Unsuccessful replies come back with a 400 status but still carry the
    /// rendered text, so both are returned as `Ok`.
    pub async fn execute(&self, command: BotCommand) -> Result<CommandReply> {
        let url = self.url("/api/v1/commands/execute");
        let request = ExecuteRequest {
            command: command.to_string(),
            actor_id: CLI_ACTOR,
        };
        tracing::debug!(%url, command = %request.command, "Executing command");

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to reach {url}"))?;

        let status = response.status();
        if status.is_server_error() {
            bail!("Server error {status} while running '{command}'");
        }
        response
            .json::<CommandReply>()
            .await
            .with_context(|| format!("Invalid reply to '{command}' (status {status})"))
    }
}
