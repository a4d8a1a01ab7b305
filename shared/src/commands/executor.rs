//! Command execution against the monitor context.
//!
//! Each execution is audited: the attempt is written to the command log as
//! soon as the command is dispatched, a failure adds a second unsuccessful
//! entry carrying the error text, and a success adds a `command_executed`
//! system log entry.

use super::ast::{BotCommand, CompareMetric};
use super::parser::parse_command;
use crate::models::{CommandLogEntry, SourceId, SystemLogEntry, SystemLogKind};
use crate::pipeline::MonitorContext;
use crate::query::{
    Comparison, HistorySummary, QueryError, SourceActivity, SourceHistory, Standing, Timeframe,
};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use thiserror::Error;
use tracing::{info, warn};

/// A parsed command could not be answered.
#[derive(Debug, Error)]
pub enum CommandError {
    /// One or both sources have no data yet.
    #[error(
        "No activity data available yet for {}. Please wait for data collection to begin.",
        join_ids(.missing)
    )]
    NotReady {
        /// Sources without data.
        missing: Vec<SourceId>,
    },

    /// Neither source has data in the timeframe.
    #[error("No historical data available for {0}.")]
    NoHistory(Timeframe),

    /// A store failed while answering.
    #[error("Failed to answer command: {0}")]
    Query(QueryError),
}

fn join_ids(ids: &[SourceId]) -> String {
    ids.iter()
        .map(SourceId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<QueryError> for CommandError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::NotReady { missing } => Self::NotReady { missing },
            other => Self::Query(other),
        }
    }
}

/// Answer to one command execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandReply {
    /// Canonical command text, or the raw input if it did not parse.
    pub command: String,
    /// Whether the command was answered.
    pub success: bool,
    /// Human-readable reply.
    pub text: String,
    /// Structured payload behind the reply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Executes bot commands and audits every execution.
pub struct CommandExecutor<'a> {
    ctx: &'a MonitorContext,
}

impl<'a> CommandExecutor<'a> {
    /// Creates an executor bound to `ctx`.
    #[must_use]
    pub fn new(ctx: &'a MonitorContext) -> Self {
        Self { ctx }
    }

    /// Parses and answers `input` on behalf of `actor_id`.
    ///
    /// Never fails: errors are rendered into an unsuccessful reply.
    pub fn execute(&self, input: &str, actor_id: &str) -> CommandReply {
        let command = match parse_command(input) {
            Ok(command) => command,
            Err(e) => {
                let raw = input.trim();
                self.log_command(
                    CommandLogEntry::new(raw, actor_id, false).with_response(e.to_string()),
                );
                return CommandReply {
                    command: raw.to_string(),
                    success: false,
                    text: e.to_string(),
                    data: None,
                };
            }
        };

        let canonical = command.to_string();
        self.log_command(CommandLogEntry::new(canonical.clone(), actor_id, true));

        match self.answer(command) {
            Ok((text, data)) => {
                info!(command = %canonical, actor_id, "Command executed");
                let entry = SystemLogEntry::new(
                    SystemLogKind::CommandExecuted,
                    format!("/{canonical} command used by {actor_id}"),
                )
                .with_timestamp(self.ctx.now());
                if let Err(e) = self.ctx.audit().log_system(entry) {
                    warn!(error = %e, "Failed to record command execution");
                }
                CommandReply {
                    command: canonical,
                    success: true,
                    text,
                    data: Some(data),
                }
            }
            Err(e) => {
                warn!(command = %canonical, actor_id, error = %e, "Command failed");
                self.log_command(
                    CommandLogEntry::new(canonical.clone(), actor_id, false)
                        .with_response(e.to_string()),
                );
                CommandReply {
                    command: canonical,
                    success: false,
                    text: e.to_string(),
                    data: None,
                }
            }
        }
    }

    fn log_command(&self, entry: CommandLogEntry) {
        if let Err(e) = self
            .ctx
            .audit()
            .log_command(entry.with_timestamp(self.ctx.now()))
        {
            warn!(error = %e, "Failed to record command log entry");
        }
    }

    /// Answers a parsed command.
    ///
    /// # Errors
    ///
    /// Returns an error if the data needed for the answer is missing or a store fails.
    pub fn answer(
        &self,
        command: BotCommand,
    ) -> Result<(String, serde_json::Value), CommandError> {
        let unit = self.ctx.pipeline().window.unit_label();
        let queries = self.ctx.queries();
        match command {
            BotCommand::Activity => {
                let comparison = queries.comparison()?;
                Ok((render_activity(&comparison, unit), to_json(&comparison)))
            }
            BotCommand::History { timeframe } => {
                let summary = queries.history(timeframe, self.ctx.now())?;
                if summary.is_empty() {
                    return Err(CommandError::NoHistory(timeframe));
                }
                Ok((render_history(&summary, unit), to_json(&summary)))
            }
            BotCommand::Compare { metric } => {
                let comparison = queries.comparison()?;
                Ok((render_compare(&comparison, metric, unit), to_json(&comparison)))
            }
            BotCommand::Status => {
                let statuses = queries.bot_statuses(self.ctx.now())?;
                let mut text = String::from("System Status");
                if statuses.is_empty() {
                    text.push_str("\nNo processes have reported yet.");
                }
                for view in statuses.values() {
                    let _ = write!(
                        text,
                        "\n{} ({}): {}, last seen {}",
                        view.status.name,
                        view.status.id,
                        view.status.status,
                        view.status.last_seen.format("%Y-%m-%d %H:%M:%S UTC")
                    );
                    if view.suspect {
                        text.push_str(" [stale]");
                    }
                }
                Ok((text, to_json(&statuses)))
            }
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

fn side_line(side: &SourceActivity, unit: &str) -> String {
    format!(
        "{}: {:.1} {unit}, {} active users, {} members",
        side.source.display_name,
        side.metric.rate,
        side.metric.active_user_count,
        side.source.member_count
    )
}

fn render_activity(comparison: &Comparison, unit: &str) -> String {
    let a = &comparison.source_a;
    let verdict = match comparison.standing {
        Standing::FirstLeads => format!(
            "{} is {}% more active per capita",
            a.source.display_name, comparison.advantage_percent
        ),
        Standing::SecondLeads => format!(
            "{} is {}% less active per capita",
            a.source.display_name, comparison.advantage_percent
        ),
        Standing::Tied => "Both sources are equally active per capita".to_string(),
    };
    format!(
        "Server Activity Comparison\n{}\n{}\n{:.2}x activity multiplier: {verdict}",
        side_line(a, unit),
        side_line(&comparison.source_b, unit),
        comparison.ratio,
    )
}

fn history_line(side: &SourceHistory, unit: &str) -> String {
    format!(
        "{}: {:.1} avg {unit}, {:.1} peak {unit}, {} data points",
        side.display_name, side.average_rate, side.peak_rate, side.data_points
    )
}

fn render_history(summary: &HistorySummary, unit: &str) -> String {
    format!(
        "Activity History ({})\n{}\n{}",
        summary.timeframe,
        history_line(&summary.source_a, unit),
        history_line(&summary.source_b, unit)
    )
}

fn render_compare(comparison: &Comparison, metric: CompareMetric, unit: &str) -> String {
    let (a, b) = (&comparison.source_a, &comparison.source_b);
    let (name_a, name_b) = (&a.source.display_name, &b.source.display_name);
    match metric {
        CompareMetric::Messages => format!(
            "Messages Comparison\n{name_a}: {:.1} {unit}\n{name_b}: {:.1} {unit}\nDifference: {:.1} {unit}",
            a.metric.rate,
            b.metric.rate,
            a.metric.rate - b.metric.rate
        ),
        CompareMetric::Users => {
            let (users_a, users_b) = (a.metric.active_user_count, b.metric.active_user_count);
            let difference = i128::from(users_a) - i128::from(users_b);
            format!(
                "Active Users Comparison\n{name_a}: {users_a} users\n{name_b}: {users_b} users\nDifference: {difference} users"
            )
        }
        CompareMetric::PerCapita => format!(
            "Per Capita Activity Comparison\n{name_a}: {:.4} {unit}/member\n{name_b}: {:.4} {unit}/member\nRatio: {:.2}x",
            a.per_capita, b.per_capita, comparison.ratio
        ),
    }
}
