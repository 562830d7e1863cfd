//! Reveal simulator.
//!
//! Produces the "decryption" animation for one message: a finite, lazy
//! sequence of frames that converges on the plaintext. Each frame re-rolls
//! every hidden character independently (no memory of earlier frames), which
//! gives the flicker effect. The last frame is always the exact plaintext.
//!
//! A [`Reveal`] is single use. Starting the animation again means building a
//! new one.

use std::{iter::FusedIterator, time::Duration};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Characters substituted for not-yet-revealed positions.
pub const DECORATIVE_ALPHABET: &[u8] =
    b"!@#$%^&*()_+-=[]{}|;:,.<>?/ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Number of intermediate steps in a reveal.
pub const DEFAULT_REVEAL_STEPS: u32 = 10;

/// Step counts above this are clamped.
pub const MAX_REVEAL_STEPS: u32 = 10_000;

/// Total duration of a reveal animation.
pub const DEFAULT_REVEAL_DURATION: Duration = Duration::from_millis(6000);

/// One rendered state of a reveal.
#[derive(Debug, Clone, PartialEq)]
pub struct RevealFrame {
    /// Step index, `0..=steps`
    pub step: u32,
    /// Fraction revealed, in `[0, 1]`
    pub progress: f64,
    /// Text to display at this step
    pub text: String,
    /// Delay from the start of the reveal at which this frame is due
    pub offset: Duration,
}

impl RevealFrame {
    /// Returns true for the terminal frame (progress 1).
    pub fn is_final(&self) -> bool {
        self.progress >= 1.0
    }
}

/// Lazy reveal sequence for one message.
///
/// Emits `steps + 1` frames at offsets `0, d/steps, 2d/steps, ..., d`.
/// With `steps == 0` the only frame is the final one.
#[derive(Debug, Clone)]
pub struct Reveal {
    target: Vec<char>,
    steps: u32,
    interval: Duration,
    next_step: u32,
    rng: ChaCha8Rng,
}

impl Reveal {
    /// Build a reveal of `final_text` spread over `duration`.
    ///
    /// `seed` drives the substitutions, so equal seeds replay identical
    /// animations. `steps` is clamped to [`MAX_REVEAL_STEPS`].
    pub fn new(final_text: &str, duration: Duration, steps: u32, seed: u64) -> Self {
        let steps = steps.min(MAX_REVEAL_STEPS);
        Self {
            target: final_text.chars().collect(),
            steps,
            interval: duration / steps.max(1),
            next_step: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Reveal with the default duration and step count.
    pub fn with_defaults(final_text: &str, seed: u64) -> Self {
        Self::new(final_text, DEFAULT_REVEAL_DURATION, DEFAULT_REVEAL_STEPS, seed)
    }

    /// Frames not yet emitted.
    pub fn remaining(&self) -> u32 {
        (self.steps + 1).saturating_sub(self.next_step)
    }

    /// Offset of the next frame from the start of the reveal. `None` once
    /// exhausted.
    pub fn next_offset(&self) -> Option<Duration> {
        (self.next_step <= self.steps).then(|| self.interval * self.next_step)
    }

    /// Plaintext the reveal converges on.
    pub fn final_text(&self) -> String {
        self.target.iter().collect()
    }

    fn progress_at(&self, step: u32) -> f64 {
        if step >= self.steps { 1.0 } else { f64::from(step) / f64::from(self.steps) }
    }

    fn render(&mut self, progress: f64) -> String {
        if progress >= 1.0 {
            return self.final_text();
        }

        let mut text = String::with_capacity(self.target.len());
        for &ch in &self.target {
            if self.rng.gen_bool(progress) {
                text.push(ch);
            } else {
                let idx = self.rng.gen_range(0..DECORATIVE_ALPHABET.len());
                text.push(char::from(DECORATIVE_ALPHABET[idx]));
            }
        }
        text
    }
}

impl Iterator for Reveal {
    type Item = RevealFrame;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_step > self.steps {
            return None;
        }

        let step = self.next_step;
        self.next_step += 1;

        let progress = self.progress_at(step);
        let text = self.render(progress);
        Some(RevealFrame { step, progress, text, offset: self.interval * step })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining() as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Reveal {}

impl FusedIterator for Reveal {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_steps_plus_one_frames() {
        let frames: Vec<_> = Reveal::new("hello", Duration::from_millis(1000), 10, 7).collect();

        assert_eq!(frames.len(), 11);
        assert_eq!(frames[0].progress, 0.0);
        assert_eq!(frames[5].progress, 0.5);
        assert_eq!(frames[10].offset, Duration::from_millis(1000));
        assert_eq!(frames[3].offset, Duration::from_millis(300));
    }

    #[test]
    fn final_frame_is_exact() {
        let last = Reveal::with_defaults("the eagle has landed", 99).last().unwrap();

        assert!(last.is_final());
        assert_eq!(last.text, "the eagle has landed");
        assert_eq!(last.offset, DEFAULT_REVEAL_DURATION);
    }

    #[test]
    fn first_frame_is_fully_decorative() {
        let first = Reveal::new("abc", Duration::from_secs(1), 4, 1).next().unwrap();

        assert_eq!(first.text.chars().count(), 3);
        assert!(first.text.bytes().all(|b| DECORATIVE_ALPHABET.contains(&b)));
    }

    #[test]
    fn huge_step_counts_are_clamped() {
        let reveal = Reveal::new("ok", Duration::from_secs(1), u32::MAX, 3);

        assert_eq!(reveal.len(), MAX_REVEAL_STEPS as usize + 1);
        let last = reveal.last().unwrap();
        assert_eq!(last.step, MAX_REVEAL_STEPS);
        assert_eq!(last.text, "ok");
    }

    #[test]
    fn zero_steps_is_single_final_frame() {
        let frames: Vec<_> = Reveal::new("now", Duration::from_secs(1), 0, 3).collect();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].text, "now");
        assert_eq!(frames[0].offset, Duration::ZERO);
    }

    #[test]
    fn exhausted_reveal_stays_exhausted() {
        let mut reveal = Reveal::new("x", Duration::from_millis(10), 1, 0);

        assert_eq!(reveal.len(), 2);
        assert!(reveal.next().is_some());
        assert!(reveal.next().is_some());
        assert!(reveal.next().is_none());
        assert!(reveal.next().is_none());
        assert_eq!(reveal.remaining(), 0);
    }

    #[test]
    fn same_seed_replays_same_animation() {
        let a: Vec<_> = Reveal::with_defaults("replay", 42).map(|f| f.text).collect();
        let b: Vec<_> = Reveal::with_defaults("replay", 42).map(|f| f.text).collect();

        assert_eq!(a, b);
    }

    #[test]
    fn multibyte_text_keeps_character_count() {
        for frame in Reveal::new("héllo wörld", Duration::from_secs(1), 5, 11) {
            assert_eq!(frame.text.chars().count(), 11);
        }
    }
}
