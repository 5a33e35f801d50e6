use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

pub const HELP: &str = "\
Commands:
  open <path>   load a PDF document
  play          read the document aloud
  stop          stop reading
  rate <x>      set the speech rate (0.5 to 4.0, in 0.5 steps)
  faster        raise the rate one step
  slower        lower the rate one step
  status        show the reader state
  help          show this message
  quit          leave the reader";

#[derive(Debug, Clone, PartialEq)]
pub enum ScreenCommand {
    Open(PathBuf),
    Play,
    Stop,
    Rate(f32),
    Faster,
    Slower,
    Status,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("no command given")]
    Empty,
    #[error("unknown command '{0}'")]
    Unknown(String),
    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),
    #[error("'{0}' is not a speech rate")]
    InvalidRate(String),
}

impl FromStr for ScreenCommand {
    type Err = CommandParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (keyword, argument) = match line.split_once(char::is_whitespace) {
            Some((keyword, rest)) => (keyword, rest.trim()),
            None => (line, ""),
        };

        match keyword.to_ascii_lowercase().as_str() {
            "" => Err(CommandParseError::Empty),
            "open" | "o" => {
                if argument.is_empty() {
                    return Err(CommandParseError::MissingArgument("open"));
                }
                // paths pasted from a file manager often come quoted
                let path = argument.trim_matches(|c| c == '"' || c == '\'');
                Ok(ScreenCommand::Open(PathBuf::from(path)))
            }
            "play" | "p" => Ok(ScreenCommand::Play),
            "stop" | "s" => Ok(ScreenCommand::Stop),
            "rate" | "r" => {
                if argument.is_empty() {
                    return Err(CommandParseError::MissingArgument("rate"));
                }
                let value = argument
                    .trim_end_matches(['x', 'X'])
                    .parse::<f32>()
                    .ok()
                    .filter(|value| value.is_finite())
                    .ok_or_else(|| CommandParseError::InvalidRate(argument.to_string()))?;
                Ok(ScreenCommand::Rate(value))
            }
            "faster" | "+" => Ok(ScreenCommand::Faster),
            "slower" | "-" => Ok(ScreenCommand::Slower),
            "status" => Ok(ScreenCommand::Status),
            "help" | "?" => Ok(ScreenCommand::Help),
            "quit" | "exit" | "q" => Ok(ScreenCommand::Quit),
            other => Err(CommandParseError::Unknown(other.to_string())),
        }
    }
}
