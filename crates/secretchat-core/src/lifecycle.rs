//! Per-message reveal lifecycle.
//!
//! # State Machine
//!
//! ```text
//! ┌────────┐  request   ┌───────────┐  final frame   ┌──────────┐
//! │ Hidden │───────────>│ Revealing │───────────────>│ Revealed │
//! └────────┘            └───────────┘                └──────────┘
//!     │  ▲                    │
//!     │  └────── cancel ──────┘
//!     │ malformed ciphertext
//!     ↓
//! ┌────────┐
//! │ Failed │
//! └────────┘
//! ```
//!
//! `Revealed` and `Failed` are terminal. Requests in any state other than
//! `Hidden` are ignored.

use std::time::Duration;

use secretchat_crypto::DECRYPTION_FAILED_TEXT;

use crate::{
    Message,
    reveal::{DEFAULT_REVEAL_DURATION, DEFAULT_REVEAL_STEPS, RevealFrame},
};

/// Ciphertext characters shown while a message is hidden.
pub const DEFAULT_PREVIEW_LEN: usize = 40;

/// Reveal presentation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealConfig {
    /// Total animation time
    pub duration: Duration,
    /// Intermediate steps (frames emitted = steps + 1)
    pub steps: u32,
    /// Ciphertext characters shown while hidden
    pub preview_len: usize,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            duration: DEFAULT_REVEAL_DURATION,
            steps: DEFAULT_REVEAL_STEPS,
            preview_len: DEFAULT_PREVIEW_LEN,
        }
    }
}

/// Lifecycle status of one displayed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RevealStatus {
    /// Ciphertext preview visible
    Hidden,
    /// Animation in progress
    Revealing,
    /// Plaintext visible
    Revealed,
    /// Ciphertext could not be decoded
    Failed,
}

impl RevealStatus {
    /// Returns true for states no request can leave.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Revealed | Self::Failed)
    }
}

/// Observable per-message display state.
#[derive(Debug, Clone, PartialEq)]
pub struct RevealState {
    /// Lifecycle status
    pub status: RevealStatus,
    /// Fraction revealed, in `[0, 1]`
    pub progress: f64,
    /// Text to render right now
    pub rendered_text: String,
}

impl RevealState {
    /// Progress as a whole percentage, for "Decrypting: N%" readouts.
    pub fn percent(&self) -> u8 {
        (self.progress.clamp(0.0, 1.0) * 100.0).round() as u8
    }
}

/// Lifecycle of one message on one client. Never shared or persisted.
#[derive(Debug, Clone)]
pub struct MessageLifecycle {
    ciphertext: String,
    preview: String,
    state: RevealState,
}

impl MessageLifecycle {
    /// Start a message in `Hidden`, rendering its truncated ciphertext.
    pub fn hidden(message: &Message, preview_len: usize) -> Self {
        let preview = message.preview(preview_len);
        Self {
            ciphertext: message.content.clone(),
            state: RevealState {
                status: RevealStatus::Hidden,
                progress: 0.0,
                rendered_text: preview.clone(),
            },
            preview,
        }
    }

    /// Current status.
    pub fn status(&self) -> RevealStatus {
        self.state.status
    }

    /// Observable state.
    pub fn state(&self) -> &RevealState {
        &self.state
    }

    /// Ciphertext this lifecycle reveals.
    pub fn ciphertext(&self) -> &str {
        &self.ciphertext
    }

    /// Plaintext, once revealed.
    pub fn plaintext(&self) -> Option<&str> {
        (self.state.status == RevealStatus::Revealed).then_some(self.state.rendered_text.as_str())
    }

    /// `Hidden -> Revealing`. Returns false from any other state.
    pub fn begin(&mut self) -> bool {
        if self.state.status != RevealStatus::Hidden {
            return false;
        }
        self.state.status = RevealStatus::Revealing;
        self.state.progress = 0.0;
        true
    }

    /// Apply a simulator frame while revealing.
    ///
    /// The final frame moves to `Revealed` and caches the plaintext. Returns
    /// false (ignoring the frame) outside `Revealing`.
    pub fn advance(&mut self, frame: RevealFrame) -> bool {
        if self.state.status != RevealStatus::Revealing {
            return false;
        }

        debug_assert!((0.0..=1.0).contains(&frame.progress));
        self.state.progress = frame.progress;
        self.state.rendered_text = frame.text;
        if frame.progress >= 1.0 {
            self.state.status = RevealStatus::Revealed;
        }
        true
    }

    /// Move to `Failed`, showing the fixed failure text. Terminal states are
    /// left alone.
    pub fn fail(&mut self) -> bool {
        if self.state.status.is_terminal() {
            return false;
        }
        self.state = RevealState {
            status: RevealStatus::Failed,
            progress: 0.0,
            rendered_text: DECRYPTION_FAILED_TEXT.to_string(),
        };
        true
    }

    /// Abandon an in-progress reveal, returning to the preview.
    pub fn reset(&mut self) -> bool {
        if self.state.status != RevealStatus::Revealing {
            return false;
        }
        self.state = RevealState {
            status: RevealStatus::Hidden,
            progress: 0.0,
            rendered_text: self.preview.clone(),
        };
        true
    }
}

#[cfg(test)]
mod tests {
    use secretchat_crypto::RoomKey;

    use super::*;
    use crate::{MessageId, Timestamp};

    fn lifecycle() -> MessageLifecycle {
        let key = RoomKey::parse("abc").unwrap();
        let message = Message {
            id: MessageId::new("m"),
            sender: "Nexus_9".into(),
            content: key.seal("hi"),
            created_at: Timestamp::from_millis(1),
            room_key: key,
        };
        MessageLifecycle::hidden(&message, DEFAULT_PREVIEW_LEN)
    }

    fn frame(progress: f64, text: &str) -> RevealFrame {
        RevealFrame { step: 0, progress, text: text.into(), offset: Duration::ZERO }
    }

    #[test]
    fn hidden_renders_preview() {
        let lc = lifecycle();

        assert_eq!(lc.status(), RevealStatus::Hidden);
        assert_eq!(lc.state().rendered_text, "CQs=");
        assert_eq!(lc.plaintext(), None);
    }

    #[test]
    fn full_reveal_path() {
        let mut lc = lifecycle();

        assert!(lc.begin());
        assert!(!lc.begin());
        assert!(lc.advance(frame(0.5, "h#")));
        assert_eq!(lc.state().percent(), 50);
        assert_eq!(lc.status(), RevealStatus::Revealing);

        assert!(lc.advance(frame(1.0, "hi")));
        assert_eq!(lc.status(), RevealStatus::Revealed);
        assert_eq!(lc.plaintext(), Some("hi"));

        assert!(!lc.advance(frame(0.3, "??")));
        assert!(!lc.fail());
        assert_eq!(lc.plaintext(), Some("hi"));
    }

    #[test]
    fn frames_ignored_while_hidden() {
        let mut lc = lifecycle();

        assert!(!lc.advance(frame(1.0, "hi")));
        assert_eq!(lc.status(), RevealStatus::Hidden);
    }

    #[test]
    fn failure_is_terminal() {
        let mut lc = lifecycle();

        assert!(lc.fail());
        assert_eq!(lc.state().rendered_text, DECRYPTION_FAILED_TEXT);
        assert!(!lc.begin());
        assert!(!lc.reset());
    }

    #[test]
    fn reset_returns_to_preview() {
        let mut lc = lifecycle();
        lc.begin();
        lc.advance(frame(0.2, "x!"));

        assert!(lc.reset());
        assert_eq!(lc.status(), RevealStatus::Hidden);
        assert_eq!(lc.state().rendered_text, "CQs=");
        assert!(lc.begin());
    }
}
