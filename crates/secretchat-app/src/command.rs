//! User commands.

use secretchat_core::MessageId;

/// Commands issued by the user through a [`crate::Driver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    /// Join the room identified by a secret key (raw input, untrimmed).
    Join(String),
    /// Leave the current room.
    Leave,
    /// Send a plaintext message to the current room.
    Send(String),
    /// Reveal one message.
    Reveal(MessageId),
    /// Leave and exit.
    Quit,
}
