//! Reveal orchestration for every message on screen.
//!
//! [`Revealer`] binds the per-message [`MessageLifecycle`]s to simulator runs.
//! It owns the in-flight [`RevealRegistry`] (one run per message id) and a
//! [`Scheduler`] for step emissions. Like every state machine in this crate it
//! performs no I/O: callers pass the current instant to [`Revealer::request`]
//! and [`Revealer::tick`] and re-render whatever changed.

use std::{collections::HashMap, ops::Add, time::Duration};

use secretchat_crypto::RoomKey;

use crate::{
    ChatError, Message, MessageId,
    lifecycle::{MessageLifecycle, RevealConfig, RevealState, RevealStatus},
    registry::{RevealRegistry, RevealToken},
    reveal::Reveal,
    schedule::{Scheduler, TaskHandle},
};

/// Outcome of a reveal request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealRequest {
    /// A new run was bound to the message
    Started(RevealToken),
    /// Duplicate trigger; the message is already in this state
    Ignored(RevealStatus),
    /// The ciphertext could not be decoded; the message is now `Failed`
    Failed(ChatError),
    /// No such message is displayed
    Unknown,
}

#[derive(Debug)]
struct Run<I> {
    reveal: Reveal,
    started_at: I,
    timer: Option<TaskHandle>,
}

/// Per-client reveal state for all displayed messages.
#[derive(Debug)]
pub struct Revealer<I> {
    config: RevealConfig,
    lifecycles: HashMap<MessageId, MessageLifecycle>,
    registry: RevealRegistry,
    runs: HashMap<RevealToken, Run<I>>,
    timers: Scheduler<I, (MessageId, RevealToken)>,
}

impl<I> Revealer<I>
where
    I: Copy + Ord + Add<Duration, Output = I>,
{
    /// Create a revealer with no messages.
    pub fn new(config: RevealConfig) -> Self {
        Self {
            config,
            lifecycles: HashMap::new(),
            registry: RevealRegistry::new(),
            runs: HashMap::new(),
            timers: Scheduler::new(),
        }
    }

    /// Start displaying `message` in `Hidden`. Returns false if it is
    /// already tracked (its lifecycle is left untouched).
    pub fn track(&mut self, message: &Message) -> bool {
        if self.lifecycles.contains_key(&message.id) {
            return false;
        }
        let lifecycle = MessageLifecycle::hidden(message, self.config.preview_len);
        self.lifecycles.insert(message.id.clone(), lifecycle);
        true
    }

    /// Observable state of `id`. `None` if not displayed.
    pub fn state(&self, id: &MessageId) -> Option<&RevealState> {
        self.lifecycles.get(id).map(MessageLifecycle::state)
    }

    /// Lifecycle status of `id`. `None` if not displayed.
    pub fn status(&self, id: &MessageId) -> Option<RevealStatus> {
        self.lifecycles.get(id).map(MessageLifecycle::status)
    }

    /// Number of in-flight runs bound to `id` (0 or 1).
    pub fn runs_for(&self, id: &MessageId) -> usize {
        self.registry.runs_for(id)
    }

    /// Returns true if a run is animating `id`.
    pub fn in_flight(&self, id: &MessageId) -> bool {
        self.registry.in_flight(id)
    }

    /// Number of in-flight runs across all messages.
    pub fn active_runs(&self) -> usize {
        self.registry.len()
    }

    /// Number of tracked messages.
    pub fn len(&self) -> usize {
        self.lifecycles.len()
    }

    /// Returns true if no message is tracked.
    pub fn is_empty(&self) -> bool {
        self.lifecycles.is_empty()
    }

    /// Earliest pending step emission. `None` if no reveal is animating.
    pub fn next_due(&self) -> Option<I> {
        self.timers.next_due()
    }

    /// Handle a user's request to reveal `id` using the reader's `key`.
    ///
    /// Only `Hidden` messages start a run; the first frame is applied
    /// immediately and the rest are scheduled from `now`. A wrong key is not
    /// detected and animates towards garbage.
    pub fn request(
        &mut self,
        id: &MessageId,
        key: &RoomKey,
        now: I,
        seed: u64,
    ) -> RevealRequest {
        let Some(lifecycle) = self.lifecycles.get_mut(id) else {
            return RevealRequest::Unknown;
        };
        if lifecycle.status() != RevealStatus::Hidden {
            return RevealRequest::Ignored(lifecycle.status());
        }
        let Some(token) = self.registry.begin(id) else {
            return RevealRequest::Ignored(RevealStatus::Revealing);
        };

        let plaintext = match key.open(lifecycle.ciphertext()) {
            Ok(plaintext) => plaintext,
            Err(err) => {
                tracing::warn!(message_id = %id, error = %err, "reveal failed");
                self.registry.finish(id, token);
                lifecycle.fail();
                return RevealRequest::Failed(err.into());
            },
        };

        lifecycle.begin();
        let mut run = Run {
            reveal: Reveal::new(&plaintext, self.config.duration, self.config.steps, seed),
            started_at: now,
            timer: None,
        };
        if let Some(frame) = run.reveal.next() {
            lifecycle.advance(frame);
        }

        if lifecycle.status() == RevealStatus::Revealed {
            self.registry.finish(id, token);
            return RevealRequest::Started(token);
        }

        if let Some(offset) = run.reveal.next_offset() {
            run.timer = Some(self.timers.schedule_at(now + offset, (id.clone(), token)));
        }
        self.runs.insert(token, run);
        tracing::debug!(message_id = %id, "reveal started");
        RevealRequest::Started(token)
    }

    /// Emit every step due at or before `now`.
    ///
    /// Returns the ids whose observable state changed, in emission order (an
    /// id appears once per emitted frame).
    pub fn tick(&mut self, now: I) -> Vec<MessageId> {
        let mut changed = Vec::new();

        loop {
            let due = self.timers.drain_due(now);
            if due.is_empty() {
                break;
            }

            for (_, (id, token)) in due {
                if self.emit_step(&id, token) {
                    changed.push(id);
                }
            }
        }

        changed
    }

    /// Cancel the in-flight run for `id`, discarding its remaining frames.
    ///
    /// The message returns to `Hidden`. Returns false if nothing was in
    /// flight.
    pub fn cancel(&mut self, id: &MessageId) -> bool {
        let Some(token) = self.registry.cancel(id) else {
            return false;
        };
        if let Some(run) = self.runs.remove(&token)
            && let Some(timer) = run.timer
        {
            self.timers.cancel(timer);
        }
        if let Some(lifecycle) = self.lifecycles.get_mut(id) {
            lifecycle.reset();
        }
        true
    }

    /// Stop displaying `id`, cancelling any run. Returns false if it was not
    /// tracked.
    pub fn forget(&mut self, id: &MessageId) -> bool {
        self.cancel(id);
        self.lifecycles.remove(id).is_some()
    }

    /// Keep only messages for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&MessageId) -> bool) {
        let dropped: Vec<MessageId> =
            self.lifecycles.keys().filter(|id| !keep(id)).cloned().collect();
        for id in &dropped {
            self.forget(id);
        }
    }

    /// Tear down every lifecycle and pending emission.
    pub fn clear(&mut self) {
        self.timers.clear();
        self.runs.clear();
        self.registry.clear();
        self.lifecycles.clear();
    }

    fn emit_step(&mut self, id: &MessageId, token: RevealToken) -> bool {
        if !self.registry.is_current(id, token) {
            return false;
        }
        if !self.runs.contains_key(&token) || !self.lifecycles.contains_key(id) {
            self.registry.cancel(id);
            self.runs.remove(&token);
            return false;
        }
        let (Some(run), Some(lifecycle)) = (self.runs.get_mut(&token), self.lifecycles.get_mut(id))
        else {
            return false;
        };

        run.timer = None;
        let Some(frame) = run.reveal.next() else {
            self.registry.finish(id, token);
            self.runs.remove(&token);
            return false;
        };

        lifecycle.advance(frame);
        if lifecycle.status() == RevealStatus::Revealed {
            self.registry.finish(id, token);
            self.runs.remove(&token);
        } else if let Some(offset) = run.reveal.next_offset() {
            run.timer = Some(self.timers.schedule_at(run.started_at + offset, (id.clone(), token)));
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::Timestamp;

    #[allow(clippy::disallowed_methods)]
    fn origin() -> Instant {
        Instant::now()
    }

    fn config() -> RevealConfig {
        RevealConfig { duration: Duration::from_millis(100), steps: 4, preview_len: 40 }
    }

    fn message(id: &str, key: &RoomKey, text: &str) -> Message {
        Message {
            id: MessageId::new(id),
            sender: "Agent_X".into(),
            content: key.seal(text),
            created_at: Timestamp::from_millis(0),
            room_key: key.clone(),
        }
    }

    #[test]
    fn reveal_completes_after_duration() {
        let key = RoomKey::parse("abc").unwrap();
        let msg = message("m1", &key, "hi there");
        let t0 = origin();
        let mut revealer = Revealer::new(config());
        revealer.track(&msg);

        assert!(matches!(revealer.request(&msg.id, &key, t0, 1), RevealRequest::Started(_)));
        assert_eq!(revealer.status(&msg.id), Some(RevealStatus::Revealing));

        revealer.tick(t0 + Duration::from_millis(50));
        assert_eq!(revealer.state(&msg.id).unwrap().progress, 0.5);

        revealer.tick(t0 + Duration::from_millis(100));
        let state = revealer.state(&msg.id).unwrap();
        assert_eq!(state.status, RevealStatus::Revealed);
        assert_eq!(state.rendered_text, "hi there");
        assert_eq!(revealer.runs_for(&msg.id), 0);
        assert!(revealer.next_due().is_none());
    }

    #[test]
    fn duplicate_request_binds_one_run() {
        let key = RoomKey::parse("abc").unwrap();
        let msg = message("m1", &key, "once");
        let t0 = origin();
        let mut revealer = Revealer::new(config());
        revealer.track(&msg);

        revealer.request(&msg.id, &key, t0, 1);
        let second = revealer.request(&msg.id, &key, t0, 2);

        assert_eq!(second, RevealRequest::Ignored(RevealStatus::Revealing));
        assert_eq!(revealer.runs_for(&msg.id), 1);
        assert_eq!(revealer.active_runs(), 1);
    }

    #[test]
    fn late_tick_catches_up_to_final_frame() {
        let key = RoomKey::parse("abc").unwrap();
        let msg = message("m1", &key, "late");
        let t0 = origin();
        let mut revealer = Revealer::new(config());
        revealer.track(&msg);
        revealer.request(&msg.id, &key, t0, 1);

        let changed = revealer.tick(t0 + Duration::from_secs(5));

        assert_eq!(changed.len(), 4);
        assert_eq!(revealer.status(&msg.id), Some(RevealStatus::Revealed));
    }

    #[test]
    fn malformed_ciphertext_fails_without_animation() {
        let key = RoomKey::parse("abc").unwrap();
        let mut msg = message("bad", &key, "x");
        msg.content = "%%% not base64 %%%".into();
        let mut revealer = Revealer::new(config());
        revealer.track(&msg);

        let outcome = revealer.request(&msg.id, &key, origin(), 1);

        assert!(matches!(outcome, RevealRequest::Failed(ChatError::MalformedCiphertext { .. })));
        assert_eq!(revealer.status(&msg.id), Some(RevealStatus::Failed));
        assert_eq!(revealer.active_runs(), 0);
        assert_eq!(
            revealer.request(&msg.id, &key, origin(), 1),
            RevealRequest::Ignored(RevealStatus::Failed)
        );
    }

    #[test]
    fn cancelled_run_emits_nothing() {
        let key = RoomKey::parse("abc").unwrap();
        let msg = message("m1", &key, "secret");
        let t0 = origin();
        let mut revealer = Revealer::new(config());
        revealer.track(&msg);
        revealer.request(&msg.id, &key, t0, 1);

        assert!(revealer.cancel(&msg.id));
        assert!(revealer.tick(t0 + Duration::from_secs(1)).is_empty());
        assert_eq!(revealer.status(&msg.id), Some(RevealStatus::Hidden));
    }

    #[test]
    fn forgotten_message_gets_no_updates() {
        let key = RoomKey::parse("abc").unwrap();
        let msg = message("m1", &key, "secret");
        let t0 = origin();
        let mut revealer = Revealer::new(config());
        revealer.track(&msg);
        revealer.request(&msg.id, &key, t0, 1);

        revealer.retain(|_| false);

        assert!(revealer.tick(t0 + Duration::from_secs(1)).is_empty());
        assert!(revealer.state(&msg.id).is_none());
        assert_eq!(revealer.active_runs(), 0);
    }

    #[test]
    fn unknown_message_is_reported() {
        let key = RoomKey::parse("abc").unwrap();
        let mut revealer: Revealer<Instant> = Revealer::new(config());

        assert_eq!(
            revealer.request(&MessageId::new("nope"), &key, origin(), 0),
            RevealRequest::Unknown
        );
    }

    #[test]
    fn zero_step_reveal_completes_immediately() {
        let key = RoomKey::parse("abc").unwrap();
        let msg = message("m1", &key, "instant");
        let mut revealer =
            Revealer::new(RevealConfig { duration: Duration::ZERO, steps: 0, preview_len: 40 });
        revealer.track(&msg);

        assert!(matches!(revealer.request(&msg.id, &key, origin(), 0), RevealRequest::Started(_)));
        assert_eq!(revealer.status(&msg.id), Some(RevealStatus::Revealed));
        assert_eq!(revealer.active_runs(), 0);
    }
}
