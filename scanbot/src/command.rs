use scanbot_ta::Interval;
use smol_str::{SmolStr, StrExt};
use std::str::FromStr;
use thiserror::Error;

/// Reply sent when a `/signal` command is missing its symbol.
pub const USAGE: &str = "Usage: /signal BTC 4h (or /signal BTC)";

/// Parsed chat command.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Command {
    /// `/signal <SYMBOL> [interval]`: analyse one market now.
    Analyse {
        symbol: SmolStr,
        interval: Option<Interval>,
    },
    /// `/signals`: summarise the most recent scheduled scan.
    LatestSignals,
}

/// Failures parsing a chat [`Command`].
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum CommandError {
    #[error("text is not a command")]
    NotACommand,

    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("missing symbol")]
    MissingSymbol,

    #[error("invalid interval: {0}")]
    InvalidInterval(String),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut tokens = text.split_whitespace();

        let Some(head) = tokens.next().filter(|head| head.starts_with('/')) else {
            return Err(CommandError::NotACommand);
        };

        // Strip any "@botname" suffix appended by group chats
        let name = head.split('@').next().unwrap_or(head).to_lowercase();

        match name.as_str() {
            "/signal" => {
                let symbol = tokens
                    .next()
                    .map(|symbol| symbol.to_uppercase_smolstr())
                    .ok_or(CommandError::MissingSymbol)?;

                let interval = tokens
                    .next()
                    .map(|interval| {
                        Interval::from_str(interval)
                            .map_err(|_| CommandError::InvalidInterval(interval.to_string()))
                    })
                    .transpose()?;

                Ok(Command::Analyse { symbol, interval })
            }
            "/signals" => Ok(Command::LatestSignals),
            _ => Err(CommandError::Unknown(name)),
        }
    }
}
