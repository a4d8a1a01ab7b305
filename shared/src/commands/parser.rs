//! Bot command parser using nom.
//!
//! Accepts an optional leading slash, a case-insensitive command name, and
//! whitespace-separated arguments:
//! - `/activity`
//! - `history 6h`
//! - `/compare percapita`
//! - `status`

use super::ast::{BotCommand, CompareMetric};
use crate::query::Timeframe;
use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{all_consuming, eof, opt, value},
    multi::many0,
    sequence::{preceded, terminated},
    IResult, Parser,
};
use thiserror::Error;

/// Errors that can occur during command parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The input was blank.
    #[error("Empty command")]
    EmptyCommand,

    /// The command name is not recognized.
    #[error("Unknown command: '{0}'. Expected 'activity', 'history', 'compare', or 'status'")]
    UnknownCommand(String),

    /// A required argument was not supplied.
    #[error("Missing argument for '{command}': expected {expected}")]
    MissingArgument {
        /// Command name.
        command: &'static str,
        /// Accepted values.
        expected: &'static str,
    },

    /// An argument was not one of the accepted values.
    #[error("Invalid argument '{argument}' for '{command}': expected {expected}")]
    InvalidArgument {
        /// Command name.
        command: &'static str,
        /// Rejected argument.
        argument: String,
        /// Accepted values.
        expected: &'static str,
    },

    /// More arguments than the command accepts.
    #[error("Unexpected argument '{argument}' for '{command}'")]
    UnexpectedArgument {
        /// Command name.
        command: &'static str,
        /// First extra argument.
        argument: String,
    },

    /// The input is not a command at all.
    #[error("Invalid command syntax: {0}")]
    SyntaxError(String),
}

const TIMEFRAMES: &str = "'1h', '6h', '24h', or '7d'";
const METRICS: &str = "'messages', 'users', or 'percapita'";

/// Parses a command line into a [`BotCommand`].
///
/// # Errors
///
/// Returns a `ParseError` if the input is blank, names an unknown command,
/// or carries missing, invalid, or extra arguments.
///
/// # Examples
///
/// ```
/// use shared::commands::{parse_command, BotCommand};
/// use shared::query::Timeframe;
///
/// let command = parse_command("/history 6h").unwrap();
/// assert_eq!(command, BotCommand::History { timeframe: Timeframe::SixHours });
///
/// assert!(parse_command("/dance").is_err());
/// ```
pub fn parse_command(input: &str) -> Result<BotCommand, ParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ParseError::EmptyCommand);
    }

    let (_, (name, args)) = command_line(input)
        .map_err(|e| ParseError::SyntaxError(format!("{e}")))?;

    match name.to_ascii_lowercase().as_str() {
        "activity" => no_arguments("activity", &args).map(|()| BotCommand::Activity),
        "status" => no_arguments("status", &args).map(|()| BotCommand::Status),
        "history" => {
            let timeframe = match args.as_slice() {
                [] => Timeframe::default(),
                [arg] => argument("history", arg, timeframe, TIMEFRAMES)?,
                [_, extra, ..] => return Err(unexpected("history", extra)),
            };
            Ok(BotCommand::History { timeframe })
        }
        "compare" => {
            let metric = match args.as_slice() {
                [] => {
                    return Err(ParseError::MissingArgument {
                        command: "compare",
                        expected: METRICS,
                    })
                }
                [arg] => argument("compare", arg, compare_metric, METRICS)?,
                [_, extra, ..] => return Err(unexpected("compare", extra)),
            };
            Ok(BotCommand::Compare { metric })
        }
        _ => Err(ParseError::UnknownCommand(name.to_string())),
    }
}

fn no_arguments(command: &'static str, args: &[&str]) -> Result<(), ParseError> {
    match args.first() {
        None => Ok(()),
        Some(extra) => Err(unexpected(command, extra)),
    }
}

fn unexpected(command: &'static str, argument: &str) -> ParseError {
    ParseError::UnexpectedArgument {
        command,
        argument: argument.to_string(),
    }
}

fn argument<T>(
    command: &'static str,
    arg: &str,
    parser: fn(&str) -> IResult<&str, T>,
    expected: &'static str,
) -> Result<T, ParseError> {
    all_consuming(parser)
        .parse(arg)
        .map(|(_, parsed)| parsed)
        .map_err(|_| ParseError::InvalidArgument {
            command,
            argument: arg.to_string(),
            expected,
        })
}

fn command_line(input: &str) -> IResult<&str, (&str, Vec<&str>)> {
    terminated(
        (preceded(opt(char('/')), word), many0(preceded(multispace1, word))),
        (multispace0, eof),
    )
    .parse(input)
}

fn word(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace()).parse(input)
}

fn timeframe(input: &str) -> IResult<&str, Timeframe> {
    alt((
        value(Timeframe::OneHour, tag_no_case("1h")),
        value(Timeframe::SixHours, tag_no_case("6h")),
        value(Timeframe::OneDay, tag_no_case("24h")),
        value(Timeframe::SevenDays, tag_no_case("7d")),
    ))
    .parse(input)
}

fn compare_metric(input: &str) -> IResult<&str, CompareMetric> {
    alt((
        value(CompareMetric::Messages, tag_no_case("messages")),
        value(CompareMetric::Users, tag_no_case("users")),
        value(CompareMetric::PerCapita, tag_no_case("percapita")),
        value(CompareMetric::PerCapita, tag_no_case("per_capita")),
    ))
    .parse(input)
}
