//! Operator console commands.
//!
//! One command per line on stdin:
//!
//! ```text
//! m              toggle autonomous / manual (re-centers the stick)
//! j <x> <y>      set stick axes, clamped to ±127 (manual mode only)
//! r              release the stick
//! s <pct> <sec>  send cruise speed (0-100 %) and station dwell time
//! c              connect / disconnect
//! h              distance history summary
//! ?              help
//! q              quit
//! ```

use core::fmt;
use core::str::FromStr;

use car_proto::{clamp_axis, Settings, SettingsError};

pub const HELP: &str = "\
commands:
  m              toggle autonomous/manual
  j <x> <y>      set stick axes (-127..127, manual only)
  r              release stick
  s <pct> <sec>  send cruise speed % and dwell seconds
  c              connect/disconnect
  h              distance history
  ?              this help
  q              quit";

/// A parsed console command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ToggleMode,
    Stick { x: i8, y: i8 },
    Release,
    SendSettings(Settings),
    ToggleConnection,
    History,
    Help,
    Quit,
}

/// Console parse error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Blank line.
    Empty,
    /// Unrecognized command word.
    Unknown(String),
    /// Wrong number of arguments.
    Arity { command: char, expected: usize },
    /// An argument was not a number.
    BadNumber(String),
    /// Settings rejected.
    Settings(SettingsError),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("empty command"),
            Self::Unknown(word) => write!(f, "unknown command '{}' (try '?')", word),
            Self::Arity { command, expected } => {
                write!(f, "'{}' takes {} argument(s)", command, expected)
            }
            Self::BadNumber(arg) => write!(f, "not a number: '{}'", arg),
            Self::Settings(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CommandError {}

fn number<T: FromStr>(arg: &str) -> Result<T, CommandError> {
    arg.parse()
        .map_err(|_| CommandError::BadNumber(arg.to_owned()))
}

fn args<'a, const N: usize>(command: char, rest: &[&'a str]) -> Result<[&'a str; N], CommandError> {
    <[&'a str; N]>::try_from(rest).map_err(|_| CommandError::Arity {
        command,
        expected: N,
    })
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&head, rest)) = words.split_first() else {
            return Err(CommandError::Empty);
        };

        match head {
            "m" => args::<0>('m', rest).map(|_| Self::ToggleMode),
            "r" => args::<0>('r', rest).map(|_| Self::Release),
            "c" => args::<0>('c', rest).map(|_| Self::ToggleConnection),
            "h" => args::<0>('h', rest).map(|_| Self::History),
            "?" | "help" => Ok(Self::Help),
            "q" | "quit" => Ok(Self::Quit),
            "j" => {
                let [x, y] = args::<2>('j', rest)?;
                Ok(Self::Stick {
                    x: clamp_axis(number(x)?),
                    y: clamp_axis(number(y)?),
                })
            }
            "s" => {
                let [speed, dwell] = args::<2>('s', rest)?;
                Settings::new(number(speed)?, number(dwell)?)
                    .map(Self::SendSettings)
                    .map_err(CommandError::Settings)
            }
            other => Err(CommandError::Unknown(other.to_owned())),
        }
    }
}
