//! Application state machine.
//!
//! This module defines the [`App`] state machine, which manages one client's
//! view of one room completely decoupled from I/O and backend mechanics.
//!
//! This is a pure state machine: user commands and [`crate::AppEvent`] inputs
//! go in, [`crate::AppAction`] instructions come out. Time and randomness are
//! read from the [`Environment`], so a simulated environment replays a
//! session exactly.
//!
//! # Responsibilities
//!
//! - Joins and leaves rooms, tagging every request with a fresh session id.
//! - Merges history and the live feed into the visible message list.
//! - Drives reveal animations and the presence heartbeat/poll timers.
//! - Tracks connectivity and falls back to local-only echoes when degraded.

use std::{
    collections::{HashMap, HashSet},
    ops::Add,
    time::Duration,
};

use secretchat_core::{
    ChatError, Environment, InsertOutcome, Message, MessageId, PresenceEntry, RevealRequest,
    Revealer, RoomKey, RoomStreamMerger, Scheduler, SyncState, Timestamp,
};
use tracing::{debug, info, warn};

use crate::{
    AppAction, AppConfig, AppEvent, Connectivity, Delivery, MessageView, SessionId, UserCommand,
};

/// Recurring per-room timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timer {
    Heartbeat,
    PresencePoll,
}

/// State owned by one join of one room.
struct RoomSession<I> {
    id: SessionId,
    merger: RoomStreamMerger,
    revealer: Revealer<I>,
    /// Sends awaiting confirmation
    pending: HashMap<MessageId, Message>,
    /// Visible messages the backend is not known to hold
    local_only: HashSet<MessageId>,
    subscribed: bool,
    history_in_flight: bool,
}

/// Application state machine.
///
/// Pure state machine that processes commands and events and produces
/// actions. No I/O dependencies - fully testable in simulation.
pub struct App<E: Environment> {
    env: E,
    config: AppConfig,
    username: String,
    next_session: u64,
    room: Option<RoomSession<E::Instant>>,
    timers: Scheduler<E::Instant, Timer>,
    connectivity: Connectivity,
    /// Transient status message. `None` if no message.
    notice: Option<String>,
    /// The notice reports a backend failure and goes away on the next
    /// successful backend call.
    notice_from_backend: bool,
}

impl<E: Environment> App<E> {
    /// Create an app for `username`, not joined to any room.
    pub fn new(env: E, username: impl Into<String>, config: AppConfig) -> Self {
        Self {
            env,
            config,
            username: username.into(),
            next_session: 0,
            room: None,
            timers: Scheduler::new(),
            connectivity: Connectivity::Online,
            notice: None,
            notice_from_backend: false,
        }
    }

    /// Display name used for messages and presence.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Active configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Key of the joined room. `None` if not joined.
    pub fn room_key(&self) -> Option<&RoomKey> {
        self.room.as_ref().map(|room| room.merger.room_key())
    }

    /// Current session. `None` if not joined.
    pub fn session(&self) -> Option<SessionId> {
        self.room.as_ref().map(|room| room.id)
    }

    /// Sync phase of the joined room.
    pub fn sync_state(&self) -> SyncState {
        self.room.as_ref().map_or(SyncState::Detached, |room| room.merger.state())
    }

    /// Backend reachability as last observed.
    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    /// Transient status message.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Visible messages in `(created_at, id)` order.
    pub fn messages(&self) -> Vec<MessageView> {
        let Some(room) = &self.room else {
            return Vec::new();
        };
        room.merger.messages().filter_map(|message| view(room, message)).collect()
    }

    /// View of one visible message.
    pub fn message(&self, id: &MessageId) -> Option<MessageView> {
        let room = self.room.as_ref()?;
        view(room, room.merger.get(id)?)
    }

    /// Active users of the joined room, sorted by name.
    pub fn active_users(&self) -> Vec<String> {
        self.room
            .as_ref()
            .map(|room| room.merger.active_users().iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of reveal animations in flight.
    pub fn active_reveals(&self) -> usize {
        self.room.as_ref().map_or(0, |room| room.revealer.active_runs())
    }

    /// Process a user command and return actions.
    pub fn command(&mut self, command: UserCommand) -> Vec<AppAction> {
        match command {
            UserCommand::Join(secret) => match RoomKey::parse(&secret) {
                Ok(key) => self.join(key),
                Err(err) => {
                    self.set_notice(ChatError::from(err).to_string());
                    vec![AppAction::Render]
                },
            },
            UserCommand::Leave => self.leave(),
            UserCommand::Send(text) => self.send_message(&text),
            UserCommand::Reveal(id) => self.request_reveal(&id),
            UserCommand::Quit => {
                let mut actions = self.leave();
                actions.push(AppAction::Quit);
                actions
            },
        }
    }

    /// Join `key`'s room, leaving the current one first.
    ///
    /// Subscribes before fetching: inserts that race the history fetch are
    /// buffered by the merger and folded in once the snapshot lands.
    pub fn join(&mut self, key: RoomKey) -> Vec<AppAction> {
        let mut actions = self.leave();

        self.next_session += 1;
        let session = SessionId(self.next_session);
        let presence = self.config.presence();
        let mut merger = RoomStreamMerger::new(key.clone(), presence.staleness_window);
        merger.begin_sync();

        let wall = self.env.wall_clock();
        merger.touch_presence(&self.username, wall, wall);
        let active_since = merger.active_since(wall);

        let now = self.env.now();
        self.timers.schedule_every(
            now + presence.heartbeat_interval,
            presence.heartbeat_interval,
            Timer::Heartbeat,
        );
        self.timers.schedule_every(
            now + presence.poll_interval,
            presence.poll_interval,
            Timer::PresencePoll,
        );

        self.room = Some(RoomSession {
            id: session,
            merger,
            revealer: Revealer::new(self.config.reveal()),
            pending: HashMap::new(),
            local_only: HashSet::new(),
            subscribed: false,
            history_in_flight: true,
        });
        self.notice = None;
        self.notice_from_backend = false;
        info!(%session, user = %self.username, "joining room");
        debug!(room = %key, %session, "room key");

        actions.extend([
            AppAction::Subscribe { session, room: key.clone() },
            AppAction::FetchMessages { session, room: key.clone() },
            AppAction::FetchPresence {
                session,
                room: key.clone(),
                active_since,
                requested_at: wall,
            },
            AppAction::UpsertPresence {
                session,
                room: key,
                username: self.username.clone(),
                at: wall,
            },
            AppAction::Render,
        ]);
        actions
    }

    /// Leave the current room.
    ///
    /// Discards pending reveal emissions and timers, closes the feeds, and
    /// requests a best-effort departure notice. Nothing is waited on.
    pub fn leave(&mut self) -> Vec<AppAction> {
        let Some(mut room) = self.room.take() else {
            return Vec::new();
        };

        room.revealer.clear();
        room.merger.detach();
        self.timers.clear();
        self.connectivity = Connectivity::Online;
        self.notice = None;
        self.notice_from_backend = false;

        let key = room.merger.room_key().clone();
        info!(session = %room.id, "left room");
        vec![
            AppAction::Unsubscribe,
            AppAction::SendDeparture { room: key, username: self.username.clone() },
            AppAction::Render,
        ]
    }

    /// Compose and send `text` to the joined room.
    ///
    /// Surrounding whitespace is trimmed and whitespace-only input is
    /// ignored. While connectivity is degraded the message is echoed locally
    /// at once, flagged [`Delivery::LocalOnly`].
    pub fn send_message(&mut self, text: &str) -> Vec<AppAction> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }
        let Some(room) = self.room.as_mut() else {
            self.set_notice("Join a room before sending".to_string());
            return vec![AppAction::Render];
        };

        let message = Message::compose(&self.env, room.merger.room_key(), &self.username, text);
        room.pending.insert(message.id.clone(), message.clone());
        self.notice = None;
        self.notice_from_backend = false;

        let mut actions = Vec::new();
        if self.connectivity.is_degraded() {
            echo_local(room, message.clone());
            actions.push(AppAction::Render);
        }

        debug!(id = %message.id, "sending message");
        actions.insert(0, AppAction::InsertMessage { session: room.id, message });
        actions
    }

    /// Start revealing `id` with the joined room's key.
    ///
    /// Duplicate requests for a message that is already revealing or
    /// revealed produce no actions.
    pub fn request_reveal(&mut self, id: &MessageId) -> Vec<AppAction> {
        let Some(room) = self.room.as_mut() else {
            return Vec::new();
        };

        let now = self.env.now();
        let seed = self.env.random_u64();
        match room.revealer.request(id, room.merger.room_key(), now, seed) {
            RevealRequest::Started(_) | RevealRequest::Failed(_) => vec![AppAction::Render],
            RevealRequest::Ignored(status) => {
                debug!(message_id = %id, ?status, "duplicate reveal request ignored");
                Vec::new()
            },
            RevealRequest::Unknown => Vec::new(),
        }
    }

    /// Process an event and return actions.
    pub fn handle(&mut self, event: AppEvent) -> Vec<AppAction> {
        if let Some(session) = event.session()
            && self.session() != Some(session)
        {
            debug!(%session, "dropping result from stale session");
            return Vec::new();
        }

        match event {
            AppEvent::Tick => self.tick(),
            AppEvent::MessagesFetched { result, .. } => self.on_history(result),
            AppEvent::PresenceFetched { requested_at, result, .. } => {
                self.on_presence(requested_at, result)
            },
            AppEvent::Subscribed { result, .. } => {
                let subscribed = result.is_ok();
                if let Some(room) = self.room.as_mut() {
                    room.subscribed = subscribed;
                }
                self.record(result)
            },
            AppEvent::MessageInserted { id, result, .. } => self.on_inserted(&id, result),
            AppEvent::HeartbeatSent { result, .. } => self.record(result),
            AppEvent::MessageArrived { message, .. } => self.on_arrival(message),
            AppEvent::PresenceChanged { .. } => self.fetch_presence().into_iter().collect(),
            AppEvent::FeedClosed { .. } => {
                if let Some(room) = self.room.as_mut() {
                    room.subscribed = false;
                }
                self.record(Err(ChatError::ConnectivityDegraded {
                    reason: "live feed closed".to_string(),
                }))
            },
        }
    }

    /// Advance reveal animations and fire due timers.
    fn tick(&mut self) -> Vec<AppAction> {
        let Some(room) = self.room.as_mut() else {
            return Vec::new();
        };

        let now = self.env.now();
        let mut render = !room.revealer.tick(now).is_empty();
        let mut actions = Vec::new();

        for (_, timer) in self.timers.drain_due(now) {
            match timer {
                Timer::Heartbeat => {
                    let wall = self.env.wall_clock();
                    render |= room.merger.touch_presence(&self.username, wall, wall);
                    actions.push(AppAction::UpsertPresence {
                        session: room.id,
                        room: room.merger.room_key().clone(),
                        username: self.username.clone(),
                        at: wall,
                    });
                },
                Timer::PresencePoll => {
                    let wall = self.env.wall_clock();
                    render |= room.merger.recompute_active(wall);
                    actions.push(presence_request(room, wall));
                    actions.extend(resync(room));
                },
            }
        }

        if render {
            actions.push(AppAction::Render);
        }
        actions
    }

    fn on_history(&mut self, result: Result<Vec<Message>, ChatError>) -> Vec<AppAction> {
        let Some(room) = self.room.as_mut() else {
            return Vec::new();
        };
        room.history_in_flight = false;

        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(err) => return self.record(Err(err)),
        };

        let report = room.merger.apply_snapshot(snapshot);
        for id in &report.inserted {
            if let Some(message) = room.merger.get(id) {
                room.revealer.track(message);
            }
            settle(room, id);
        }

        let mut actions = self.record(Ok(()));
        actions.push(AppAction::Render);
        actions
    }

    fn on_presence(
        &mut self,
        requested_at: Timestamp,
        result: Result<Vec<PresenceEntry>, ChatError>,
    ) -> Vec<AppAction> {
        let entries = match result {
            Ok(entries) => entries,
            Err(err) => return self.record(Err(err)),
        };
        let now = self.env.wall_clock();
        let changed = self
            .room
            .as_mut()
            .is_some_and(|room| room.merger.apply_presence(&entries, requested_at, now));

        let mut actions = self.record(Ok(()));
        if changed {
            actions.push(AppAction::Render);
        }
        actions
    }

    fn on_inserted(&mut self, id: &MessageId, result: Result<(), ChatError>) -> Vec<AppAction> {
        let Some(room) = self.room.as_mut() else {
            return Vec::new();
        };
        let Some(message) = room.pending.remove(id) else {
            // Already settled through the feed.
            return self.record(result);
        };

        match &result {
            Ok(()) => {
                room.local_only.remove(id);
                if room.merger.merge_local(message.clone()) == InsertOutcome::Inserted {
                    room.revealer.track(&message);
                }
            },
            Err(ChatError::ConnectivityDegraded { .. }) => {
                echo_local(room, message);
            },
            Err(err) => {
                warn!(message_id = %id, error = %err, "message not delivered");
            },
        }

        let mut actions = self.record(result);
        actions.push(AppAction::Render);
        actions
    }

    fn on_arrival(&mut self, message: Message) -> Vec<AppAction> {
        let Some(room) = self.room.as_mut() else {
            return Vec::new();
        };

        let id = message.id.clone();
        let outcome = room.merger.apply_insert(message);
        let mut render = false;
        match outcome {
            InsertOutcome::Inserted => {
                if let Some(message) = room.merger.get(&id) {
                    room.revealer.track(message);
                }
                render = true;
            },
            InsertOutcome::Duplicate => render = room.local_only.contains(&id),
            InsertOutcome::Buffered => {},
            InsertOutcome::ForeignRoom => return Vec::new(),
        }
        settle(room, &id);

        let mut actions = self.record(Ok(()));
        if render {
            actions.push(AppAction::Render);
        }
        actions
    }

    fn fetch_presence(&self) -> Option<AppAction> {
        let room = self.room.as_ref()?;
        Some(presence_request(room, self.env.wall_clock()))
    }

    fn set_notice(&mut self, text: String) {
        self.notice = Some(text);
        self.notice_from_backend = false;
    }

    /// Fold a backend outcome into connectivity and the notice line.
    fn record(&mut self, result: Result<(), ChatError>) -> Vec<AppAction> {
        match result {
            Ok(()) => {
                let mut changed = false;
                if self.notice_from_backend {
                    self.notice = None;
                    self.notice_from_backend = false;
                    changed = true;
                }
                if self.connectivity.is_degraded() {
                    info!("backend reachable again");
                    self.connectivity = Connectivity::Online;
                    changed = true;
                }
                if changed { vec![AppAction::Render] } else { Vec::new() }
            },
            Err(ChatError::ConnectivityDegraded { reason }) => {
                if !self.connectivity.is_degraded() {
                    warn!(%reason, "backend unreachable, echoing sends locally");
                }
                self.connectivity = Connectivity::Degraded { reason };
                vec![AppAction::Render]
            },
            Err(err) => {
                warn!(error = %err, "backend operation failed");
                self.notice = Some(err.to_string());
                self.notice_from_backend = true;
                vec![AppAction::Render]
            },
        }
    }
}

fn view<I>(room: &RoomSession<I>, message: &Message) -> Option<MessageView>
where
    I: Copy + Ord + Add<Duration, Output = I>,
{
    let reveal = room.revealer.state(&message.id)?.clone();
    let delivery = if room.local_only.contains(&message.id) {
        Delivery::LocalOnly
    } else {
        Delivery::Delivered
    };
    Some(MessageView {
        id: message.id.clone(),
        sender: message.sender.clone(),
        created_at: message.created_at,
        delivery,
        reveal,
    })
}

/// Show `message` now even though the backend may never have it.
fn echo_local<I>(room: &mut RoomSession<I>, message: Message)
where
    I: Copy + Ord + Add<Duration, Output = I>,
{
    let id = message.id.clone();
    if room.merger.merge_local(message.clone()) == InsertOutcome::Inserted {
        room.revealer.track(&message);
        room.local_only.insert(id);
    }
}

/// The backend holds `id`: stop waiting for its confirmation and drop any
/// local-only flag.
fn settle<I>(room: &mut RoomSession<I>, id: &MessageId) {
    room.pending.remove(id);
    room.local_only.remove(id);
}

fn presence_request<I>(room: &RoomSession<I>, wall: Timestamp) -> AppAction {
    AppAction::FetchPresence {
        session: room.id,
        room: room.merger.room_key().clone(),
        active_since: room.merger.active_since(wall),
        requested_at: wall,
    }
}

/// Retry whatever initial sync step failed: resubscribe (and re-fetch, since
/// inserts were missed while unsubscribed) or re-fetch history.
fn resync<I>(room: &mut RoomSession<I>) -> Vec<AppAction> {
    let key = room.merger.room_key().clone();
    if !room.subscribed {
        room.merger.begin_sync();
        room.history_in_flight = true;
        return vec![
            AppAction::Subscribe { session: room.id, room: key.clone() },
            AppAction::FetchMessages { session: room.id, room: key },
        ];
    }
    if room.merger.state() == SyncState::Syncing && !room.history_in_flight {
        room.history_in_flight = true;
        return vec![AppAction::FetchMessages { session: room.id, room: key }];
    }
    Vec::new()
}
