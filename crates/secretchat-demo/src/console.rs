//! Line-oriented console driver.
//!
//! Reads commands from stdin and redraws the room on stdout whenever it
//! changes. Lines starting with `/` are commands; anything else is sent as a
//! message.

use std::io::{self, Write};

use secretchat_app::{App, Driver, UserCommand};
use secretchat_core::{Environment, MessageId};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::render;

const HELP: &str = "commands: /join <secret>, /leave, /reveal <n>, /help, /quit; other text is sent";

/// Console driver errors.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// Reading stdin or writing stdout failed.
    #[error("console I/O error: {0}")]
    Io(#[from] io::Error),
}

/// What one input line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Forward to the app
    Command(UserCommand),
    /// Reveal the n-th visible message (1-based)
    Reveal(usize),
    /// Show usage
    Help,
    /// Blank line
    Nothing,
    /// Unrecognised command
    Unknown(String),
}

/// Parse one input line.
pub fn parse_line(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Nothing;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Input::Command(UserCommand::Send(line.to_string()));
    };

    let (name, argument) = rest.split_once(' ').unwrap_or((rest, ""));
    let argument = argument.trim();
    match name {
        "join" | "j" => Input::Command(UserCommand::Join(argument.to_string())),
        "leave" => Input::Command(UserCommand::Leave),
        "quit" | "q" => Input::Command(UserCommand::Quit),
        "help" | "h" => Input::Help,
        "reveal" | "r" => match argument.parse() {
            Ok(n) if n > 0 => Input::Reveal(n),
            _ => Input::Unknown(line.to_string()),
        },
        _ => Input::Unknown(line.to_string()),
    }
}

/// Driver over the process's stdin and stdout.
pub struct ConsoleDriver {
    lines: Lines<BufReader<Stdin>>,
    /// Message ids in the order last drawn, for `/reveal <n>`
    visible: Vec<MessageId>,
    last_frame: String,
}

impl ConsoleDriver {
    /// Create a driver reading from stdin.
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            visible: Vec::new(),
            last_frame: String::new(),
        }
    }

    fn say(text: &str) -> Result<(), ConsoleError> {
        let mut out = io::stdout().lock();
        writeln!(out, "{text}")?;
        out.flush()?;
        Ok(())
    }
}

impl Default for ConsoleDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for ConsoleDriver {
    type Error = ConsoleError;

    async fn next_command(&mut self) -> Result<Option<UserCommand>, Self::Error> {
        loop {
            let Some(line) = self.lines.next_line().await? else {
                return Ok(None);
            };
            match parse_line(&line) {
                Input::Command(command) => return Ok(Some(command)),
                Input::Reveal(n) => match self.visible.get(n - 1) {
                    Some(id) => return Ok(Some(UserCommand::Reveal(id.clone()))),
                    None => Self::say(&format!("no message #{n}"))?,
                },
                Input::Help => Self::say(HELP)?,
                Input::Nothing => {},
                Input::Unknown(text) => Self::say(&format!("unknown command {text:?}; {HELP}"))?,
            }
        }
    }

    fn render<E: Environment>(&mut self, app: &App<E>) -> Result<(), Self::Error> {
        self.visible = app.messages().into_iter().map(|view| view.id).collect();
        let frame = render::frame(app);
        if frame != self.last_frame {
            Self::say(&frame)?;
            Self::say("")?;
            self.last_frame = frame;
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.visible.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_sent() {
        let sent = Input::Command(UserCommand::Send("hello there".into()));
        assert_eq!(parse_line("  hello there "), sent);
        assert_eq!(parse_line("   "), Input::Nothing);
    }

    #[test]
    fn slash_commands_parse() {
        assert_eq!(parse_line("/join orchid"), Input::Command(UserCommand::Join("orchid".into())));
        assert_eq!(parse_line("/j  lotus "), Input::Command(UserCommand::Join("lotus".into())));
        assert_eq!(parse_line("/leave"), Input::Command(UserCommand::Leave));
        assert_eq!(parse_line("/q"), Input::Command(UserCommand::Quit));
        assert_eq!(parse_line("/reveal 3"), Input::Reveal(3));
        assert_eq!(parse_line("/help"), Input::Help);
    }

    #[test]
    fn bad_reveal_numbers_are_unknown() {
        assert!(matches!(parse_line("/reveal 0"), Input::Unknown(_)));
        assert!(matches!(parse_line("/reveal two"), Input::Unknown(_)));
        assert!(matches!(parse_line("/shout hi"), Input::Unknown(_)));
    }

    #[test]
    fn join_without_secret_is_forwarded() {
        // The app reports the empty key.
        assert_eq!(parse_line("/join"), Input::Command(UserCommand::Join(String::new())));
    }
}
