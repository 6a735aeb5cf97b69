//! Parsing of the lines typed at the client and server prompts.

use std::str::FromStr;

use peril_protocol::UnitRank;

use crate::GameError;

/// Help text for the client prompt.
pub const CLIENT_HELP: &str = "\
Possible commands:
* spawn <location> <rank>
    example: spawn europe infantry
* move <location> <unitID> <unitID> ...
    example: move asia 1 2
* status
* spam <n>
    example: spam 100
* help
* quit";

/// Help text for the server prompt.
pub const SERVER_HELP: &str = "\
Possible commands:
* pause
* resume
* help
* quit";

/// A command typed at the client prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Spawn { location: String, rank: UnitRank },
    Move { location: String, unit_ids: Vec<u32> },
    Status,
    /// Publish this many nonsense game logs.
    Spam(usize),
    Help,
    Quit,
}

impl FromStr for ClientCommand {
    type Err = GameError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&command, args)) = words.split_first() else {
            return Err(usage("empty command"));
        };

        match (command.to_ascii_lowercase().as_str(), args) {
            ("spawn", [location, rank]) => Ok(Self::Spawn {
                location: location.to_ascii_lowercase(),
                rank: rank.parse().map_err(|e| usage(format!("{e}")))?,
            }),
            ("spawn", _) => Err(usage("usage: spawn <location> <rank>")),
            ("move", [location, ids @ ..]) if !ids.is_empty() => {
                let unit_ids = ids
                    .iter()
                    .map(|id| {
                        id.parse::<u32>()
                            .map_err(|_| usage(format!("invalid unit id '{id}'")))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::Move {
                    location: location.to_ascii_lowercase(),
                    unit_ids,
                })
            }
            ("move", _) => Err(usage("usage: move <location> <unitID> ...")),
            ("status", []) => Ok(Self::Status),
            ("spam", [count]) => count
                .parse()
                .map(Self::Spam)
                .map_err(|_| usage(format!("invalid count '{count}'"))),
            ("spam", _) => Err(usage("usage: spam <n>")),
            ("help", _) => Ok(Self::Help),
            ("quit", _) => Ok(Self::Quit),
            (other, _) => Err(usage(format!("unknown command '{other}'"))),
        }
    }
}

/// A command typed at the server prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerCommand {
    Pause,
    Resume,
    Help,
    Quit,
}

impl FromStr for ServerCommand {
    type Err = GameError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let command = line
            .split_whitespace()
            .next()
            .ok_or_else(|| usage("empty command"))?;
        match command.to_ascii_lowercase().as_str() {
            "pause" => Ok(Self::Pause),
            "resume" => Ok(Self::Resume),
            "help" => Ok(Self::Help),
            "quit" => Ok(Self::Quit),
            other => Err(usage(format!("unknown command '{other}'"))),
        }
    }
}

fn usage(message: impl Into<String>) -> GameError {
    GameError::Usage(message.into())
}
