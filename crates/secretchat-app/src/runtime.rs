//! Generic runtime for application orchestration.
//!
//! The Runtime drives the application event loop, coordinating between:
//! - [`App`]: Room state machine
//! - [`Backend`]: Persistence and realtime feeds
//! - [`Driver`]: Platform-specific input and rendering
//!
//! Backend requests run concurrently in a [`JoinSet`] and are fed back to the
//! App in whatever order they complete. Feed subscription is the one request
//! awaited inline, so it is always in place before the fetches issued with it.

use std::{collections::VecDeque, future::pending, time::Duration};

use secretchat_backend::{Backend, Subscription};
use secretchat_core::{ChatError, Environment, Message, RoomKey};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::{App, AppAction, AppEvent, Driver, RuntimeConfig, SessionId, UserCommand};

/// What woke the loop up.
enum Wakeup {
    Command(UserCommand),
    Event(AppEvent),
    InsertFeedClosed(SessionId),
    PresenceFeedClosed(SessionId),
    Idle,
}

/// Generic runtime that orchestrates App, Backend, and Driver.
///
/// # Type Parameters
///
/// - `D`: Platform-specific driver
/// - `B`: Backend collaborator
/// - `E`: Environment for time and randomness
pub struct Runtime<D, B, E>
where
    D: Driver,
    B: Backend,
    E: Environment,
{
    driver: D,
    backend: B,
    env: E,
    app: App<E>,
    config: RuntimeConfig,
    inserts: Option<(SessionId, Subscription<Message>)>,
    presence: Option<(SessionId, Subscription<()>)>,
    requests: JoinSet<AppEvent>,
}

impl<D, B, E> Runtime<D, B, E>
where
    D: Driver,
    B: Backend,
    E: Environment,
{
    /// Create a runtime around an existing app.
    pub fn new(driver: D, backend: B, env: E, app: App<E>, config: RuntimeConfig) -> Self {
        Self {
            driver,
            backend,
            env,
            app,
            config,
            inserts: None,
            presence: None,
            requests: JoinSet::new(),
        }
    }

    /// Run the main event loop until the user quits or input ends.
    ///
    /// Each iteration waits for the first of: a user command, a feed item, a
    /// completed backend request, or the next tick. Returns the final app
    /// state.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver encounters an I/O error.
    pub async fn run(mut self) -> Result<App<E>, D::Error> {
        self.driver.render(&self.app)?;
        let mut next_tick = self.env.now() + self.config.tick_interval;

        loop {
            let now = self.env.now();
            let until_tick = if next_tick > now { next_tick - now } else { Duration::ZERO };

            let wakeup = tokio::select! {
                command = self.driver.next_command() => {
                    Wakeup::Command(command?.unwrap_or(UserCommand::Quit))
                },
                (session, item) = next_item(&mut self.inserts) => match item {
                    Some(message) => Wakeup::Event(AppEvent::MessageArrived { session, message }),
                    None => Wakeup::InsertFeedClosed(session),
                },
                (session, item) = next_item(&mut self.presence) => match item {
                    Some(()) => Wakeup::Event(AppEvent::PresenceChanged { session }),
                    None => Wakeup::PresenceFeedClosed(session),
                },
                Some(joined) = self.requests.join_next(), if !self.requests.is_empty() => {
                    match joined {
                        Ok(event) => Wakeup::Event(event),
                        Err(err) => {
                            warn!(error = %err, "backend request task failed");
                            Wakeup::Idle
                        },
                    }
                },
                () = self.env.sleep(until_tick) => {
                    next_tick = self.env.now() + self.config.tick_interval;
                    Wakeup::Event(AppEvent::Tick)
                },
            };

            let actions = match wakeup {
                Wakeup::Command(command) => self.app.command(command),
                Wakeup::Event(event) => self.app.handle(event),
                Wakeup::InsertFeedClosed(session) => {
                    self.inserts = None;
                    self.app.handle(AppEvent::FeedClosed { session })
                },
                Wakeup::PresenceFeedClosed(session) => {
                    self.presence = None;
                    self.app.handle(AppEvent::FeedClosed { session })
                },
                Wakeup::Idle => Vec::new(),
            };

            if self.execute(actions).await? {
                break;
            }
        }

        self.driver.stop();
        Ok(self.app)
    }

    /// Execute actions returned by the App, feeding synchronous results back.
    ///
    /// Returns `true` if the app asked to quit.
    async fn execute(&mut self, actions: Vec<AppAction>) -> Result<bool, D::Error> {
        let mut queue: VecDeque<AppAction> = actions.into();
        let mut dirty = false;

        while let Some(action) = queue.pop_front() {
            match action {
                AppAction::Render => dirty = true,
                AppAction::Quit => {
                    if dirty {
                        self.driver.render(&self.app)?;
                    }
                    return Ok(true);
                },
                AppAction::Subscribe { session, room } => {
                    let result = self.subscribe(session, &room).await;
                    queue.extend(self.app.handle(AppEvent::Subscribed { session, result }));
                },
                AppAction::Unsubscribe => {
                    self.inserts = None;
                    self.presence = None;
                },
                AppAction::FetchMessages { session, room } => {
                    let backend = self.backend.clone();
                    self.requests.spawn(async move {
                        let result = backend.fetch_messages(&room).await.map_err(ChatError::from);
                        AppEvent::MessagesFetched { session, result }
                    });
                },
                AppAction::FetchPresence { session, room, active_since, requested_at } => {
                    let backend = self.backend.clone();
                    self.requests.spawn(async move {
                        let result = backend
                            .fetch_presence(&room, active_since)
                            .await
                            .map_err(ChatError::from);
                        AppEvent::PresenceFetched { session, requested_at, result }
                    });
                },
                AppAction::InsertMessage { session, message } => {
                    let backend = self.backend.clone();
                    let id = message.id.clone();
                    self.requests.spawn(async move {
                        let result = backend.insert_message(message).await.map_err(ChatError::from);
                        AppEvent::MessageInserted { session, id, result }
                    });
                },
                AppAction::UpsertPresence { session, room, username, at } => {
                    let backend = self.backend.clone();
                    self.requests.spawn(async move {
                        let result = backend
                            .upsert_presence(&room, &username, at)
                            .await
                            .map_err(ChatError::from);
                        AppEvent::HeartbeatSent { session, result }
                    });
                },
                AppAction::SendDeparture { room, username } => {
                    let backend = self.backend.clone();
                    tokio::spawn(async move {
                        match backend.remove_presence(&room, &username).await {
                            Ok(()) => debug!(%room, "departure notice delivered"),
                            Err(err) => warn!(error = %err, "departure notice failed"),
                        }
                    });
                },
            }
        }

        if dirty {
            self.driver.render(&self.app)?;
        }
        Ok(false)
    }

    /// Open both room feeds, replacing any previous ones.
    async fn subscribe(&mut self, session: SessionId, room: &RoomKey) -> Result<(), ChatError> {
        self.inserts = None;
        self.presence = None;

        let inserts = self.backend.subscribe_inserts(room).await?;
        let presence = self.backend.subscribe_presence_changes(room).await?;
        self.inserts = Some((session, inserts));
        self.presence = Some((session, presence));
        Ok(())
    }

    /// Get a reference to the App
    pub fn app(&self) -> &App<E> {
        &self.app
    }

    /// Get a mutable reference to the App
    pub fn app_mut(&mut self) -> &mut App<E> {
        &mut self.app
    }
}

/// Next item of an optional feed. Never resolves while there is no feed.
async fn next_item<T>(feed: &mut Option<(SessionId, Subscription<T>)>) -> (SessionId, Option<T>) {
    match feed {
        Some((session, subscription)) => {
            let session = *session;
            (session, subscription.next().await)
        },
        None => pending().await,
    }
}
