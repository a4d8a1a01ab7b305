//! Bot command surface.
//!
//! Commands are parsed with nom into a closed [`BotCommand`] enum and answered
//! by the [`CommandExecutor`], which audits every execution.
//!
//! # Example
//!
//! ```
//! use shared::commands::{parse_command, BotCommand, CompareMetric};
//!
//! let command = parse_command("/compare percapita").unwrap();
//! assert_eq!(command, BotCommand::Compare { metric: CompareMetric::PerCapita });
//! ```

mod ast;
mod executor;
mod parser;

pub use ast::{BotCommand, CompareMetric};
pub use executor::{CommandError, CommandExecutor, CommandReply};
pub use parser::{parse_command, ParseError};
