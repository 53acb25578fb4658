//! Command-line interface for chatlink.
//!
//! Uses lexopt for minimal binary size overhead.

use std::ffi::OsString;
use std::path::PathBuf;

use crate::channel::DeliveryMode;

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Conversation endpoint base url.
    pub endpoint: Option<String>,
    /// Channel secret (overrides config file).
    pub secret: Option<String>,
    /// Local user id.
    pub user_id: Option<String>,
    /// Delivery mode.
    pub mode: Option<DeliveryMode>,
    /// Disable automatic reconnect of the push channel.
    pub no_reconnect: bool,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('e') | Long("endpoint") => {
                result.endpoint = Some(parser.value()?.parse()?);
            }
            Short('s') | Long("secret") => {
                result.secret = Some(parser.value()?.parse()?);
            }
            Short('u') | Long("user") => {
                result.user_id = Some(parser.value()?.parse()?);
            }
            Short('m') | Long("mode") => {
                let value: String = parser.value()?.parse()?;
                result.mode = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("mode", value))?,
                );
            }
            Long("no-reconnect") => {
                result.no_reconnect = true;
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"chatlink {version}
Console client for bot conversation channels

USAGE:
    chatlink [OPTIONS]

OPTIONS:
    -c, --config <FILE>     Path to configuration file (JSON)
    -e, --endpoint <URL>    Conversation endpoint base url
    -s, --secret <SECRET>   Channel secret
    -u, --user <ID>         Local user id [default: user]
    -m, --mode <MODE>       Delivery mode: push or pull [default: push]
        --no-reconnect      Do not reconnect a dropped push channel
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
    -h, --help              Print help
    -V, --version           Print version

ENVIRONMENT VARIABLES:
    CHATLINK_ENDPOINT       Endpoint url (overrides config)
    CHATLINK_SECRET         Channel secret (overrides config)
    CHATLINK_USER_ID        Local user id (overrides config)
    CHATLINK_MODE           Delivery mode (overrides config)
    CHATLINK_LOG_LEVEL      Log level (overrides config)
    RUST_LOG                Alternative log level setting

Type a line to send it as a message. /quit ends the conversation.
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("chatlink {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
