//! Step-by-step multi-client simulation.
//!
//! [`SimCluster`] plays the role of several runtimes sharing one backend, but
//! without any concurrency: backend calls execute when their action is
//! issued, and their results wait in a per-client inbox until the test (or
//! [`SimCluster::settle`]) delivers them. Feed items likewise wait in the
//! subscription until pumped. This makes every interleaving of "result
//! arrives" and "notification arrives" reachable from a seed.

use std::{collections::VecDeque, time::Duration};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use secretchat_app::{App, AppAction, AppConfig, AppEvent, SessionId, UserCommand};
use secretchat_backend::{Backend, Subscription};
use secretchat_core::{ChatError, Message, RoomKey};
use tracing::{debug, trace};

use crate::{
    SimEnv,
    invariants::{ClientSnapshot, InvariantRegistry, SystemSnapshot, Violation},
};

/// Upper bound on delivery steps in one [`SimCluster::settle`].
const MAX_SETTLE_STEPS: usize = 100_000;

/// Index of a client within a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(pub usize);

/// Order in which queued backend results are handed to a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOrder {
    /// Issue order
    Fifo,
    /// Seeded random order
    Shuffled,
}

struct SimClient {
    app: App<SimEnv>,
    inserts: Option<(SessionId, Subscription<Message>)>,
    presence: Option<(SessionId, Subscription<()>)>,
    inbox: VecDeque<AppEvent>,
    renders: usize,
}

/// Several clients, one backend, one virtual clock.
pub struct SimCluster<B: Backend> {
    backend: B,
    env: SimEnv,
    clients: Vec<SimClient>,
    rng: ChaCha8Rng,
    order: DeliveryOrder,
    invariants: InvariantRegistry,
}

impl<B: Backend> SimCluster<B> {
    /// Create a cluster over `backend`. `seed` drives both the environment
    /// and the delivery order.
    pub fn new(backend: B, seed: u64, order: DeliveryOrder) -> Self {
        Self {
            backend,
            env: SimEnv::with_seed(seed),
            clients: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(seed ^ 0x5EED),
            order,
            invariants: InvariantRegistry::standard(),
        }
    }

    /// Shared backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Shared environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Add a client that is not joined to any room.
    pub fn add_client(&mut self, username: &str, config: AppConfig) -> ClientId {
        let app = App::new(self.env.clone(), username, config);
        self.clients.push(SimClient {
            app,
            inserts: None,
            presence: None,
            inbox: VecDeque::new(),
            renders: 0,
        });
        ClientId(self.clients.len() - 1)
    }

    /// Observable app state of `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not returned by [`SimCluster::add_client`].
    pub fn app(&self, id: ClientId) -> &App<SimEnv> {
        &self.clients[id.0].app
    }

    /// Renders requested by `id` so far.
    pub fn renders(&self, id: ClientId) -> usize {
        self.clients[id.0].renders
    }

    /// Backend results waiting for `id`.
    pub fn inbox_len(&self, id: ClientId) -> usize {
        self.clients[id.0].inbox.len()
    }

    /// Drop `id`'s feeds without telling its app. Items published afterwards
    /// never reach it; only history fetches catch it up.
    pub fn sever_feeds(&mut self, id: ClientId) {
        let client = &mut self.clients[id.0];
        client.inserts = None;
        client.presence = None;
    }

    /// Issue a user command on `id` and execute the resulting actions.
    pub async fn command(&mut self, id: ClientId, command: UserCommand) -> Result<(), Violation> {
        let actions = self.clients[id.0].app.command(command);
        self.execute(id, actions).await;
        self.check()
    }

    /// Join `id` to the room of `secret`.
    pub async fn join(&mut self, id: ClientId, secret: &str) -> Result<(), Violation> {
        self.command(id, UserCommand::Join(secret.to_string())).await
    }

    /// Send `text` from `id`.
    pub async fn send(&mut self, id: ClientId, text: &str) -> Result<(), Violation> {
        self.command(id, UserCommand::Send(text.to_string())).await
    }

    /// Hand one event to `id` and execute the resulting actions.
    pub async fn handle(&mut self, id: ClientId, event: AppEvent) -> Result<(), Violation> {
        let actions = self.clients[id.0].app.handle(event);
        self.execute(id, actions).await;
        self.check()
    }

    /// Deliver one queued backend result to `id`. Returns false if the inbox
    /// was empty.
    pub async fn deliver_one(&mut self, id: ClientId) -> Result<bool, Violation> {
        let inbox = &mut self.clients[id.0].inbox;
        let next = match self.order {
            DeliveryOrder::Fifo => inbox.pop_front(),
            DeliveryOrder::Shuffled if inbox.is_empty() => None,
            DeliveryOrder::Shuffled => {
                let index = self.rng.gen_range(0..inbox.len());
                inbox.remove(index)
            },
        };
        match next {
            Some(event) => self.handle(id, event).await.map(|()| true),
            None => Ok(false),
        }
    }

    /// Deliver one pending feed item to `id`. Returns false if nothing was
    /// pending.
    pub async fn pump_feed(&mut self, id: ClientId) -> Result<bool, Violation> {
        let Some(event) = self.next_feed_event(id) else {
            return Ok(false);
        };
        self.handle(id, event).await.map(|()| true)
    }

    fn next_feed_event(&mut self, id: ClientId) -> Option<AppEvent> {
        let client = &mut self.clients[id.0];

        if let Some((session, feed)) = client.inserts.as_mut() {
            let session = *session;
            if let Some(message) = feed.try_next() {
                return Some(AppEvent::MessageArrived { session, message });
            }
            if feed.is_finished() {
                client.inserts = None;
                return Some(AppEvent::FeedClosed { session });
            }
        }

        if let Some((session, feed)) = client.presence.as_mut() {
            let session = *session;
            if feed.try_next().is_some() {
                return Some(AppEvent::PresenceChanged { session });
            }
            if feed.is_finished() {
                client.presence = None;
                return Some(AppEvent::FeedClosed { session });
            }
        }
        None
    }

    /// Deliver everything queued for every client until nothing moves.
    ///
    /// Clients take turns one step at a time; a client's turn pumps a feed
    /// item or delivers a backend result, picked by the cluster RNG.
    pub async fn settle(&mut self) -> Result<(), Violation> {
        for _ in 0..MAX_SETTLE_STEPS {
            let mut progressed = false;
            for index in 0..self.clients.len() {
                let id = ClientId(index);
                let feed_first = self.rng.gen_bool(0.5);
                let stepped = if feed_first {
                    self.pump_feed(id).await? || self.deliver_one(id).await?
                } else {
                    self.deliver_one(id).await? || self.pump_feed(id).await?
                };
                progressed |= stepped;
            }
            if !progressed {
                return Ok(());
            }
        }
        Err(Violation {
            invariant: "settles",
            message: format!("still busy after {MAX_SETTLE_STEPS} steps"),
        })
    }

    /// Advance the shared clock in `step`-sized increments up to `total`,
    /// ticking every client and settling after each increment.
    pub async fn advance(&mut self, total: Duration, step: Duration) -> Result<(), Violation> {
        let step = step.max(Duration::from_millis(1));
        let mut elapsed = Duration::ZERO;
        while elapsed < total {
            let increment = step.min(total - elapsed);
            self.env.advance(increment);
            elapsed += increment;
            for index in 0..self.clients.len() {
                self.handle(ClientId(index), AppEvent::Tick).await?;
            }
            self.settle().await?;
        }
        Ok(())
    }

    /// Snapshot of every client.
    pub fn snapshot(&self) -> SystemSnapshot {
        SystemSnapshot::from_clients(
            self.clients.iter().map(|client| ClientSnapshot::from_app(&client.app)).collect(),
        )
    }

    fn check(&self) -> Result<(), Violation> {
        self.invariants.check_all(&self.snapshot())
    }

    /// Execute actions the way the runtime does: subscription inline,
    /// everything else executed now with its result queued.
    async fn execute(&mut self, id: ClientId, actions: Vec<AppAction>) {
        let mut queue: VecDeque<AppAction> = actions.into();

        while let Some(action) = queue.pop_front() {
            trace!(client = id.0, ?action, "executing");
            match action {
                AppAction::Render => self.clients[id.0].renders += 1,
                AppAction::Quit => {},
                AppAction::Subscribe { session, room } => {
                    let result = self.subscribe(id, session, &room).await;
                    let follow_up =
                        self.clients[id.0].app.handle(AppEvent::Subscribed { session, result });
                    queue.extend(follow_up);
                },
                AppAction::Unsubscribe => self.sever_feeds(id),
                AppAction::FetchMessages { session, room } => {
                    let result = self.backend.fetch_messages(&room).await.map_err(ChatError::from);
                    self.queue(id, AppEvent::MessagesFetched { session, result });
                },
                AppAction::FetchPresence { session, room, active_since, requested_at } => {
                    let result = self
                        .backend
                        .fetch_presence(&room, active_since)
                        .await
                        .map_err(ChatError::from);
                    self.queue(id, AppEvent::PresenceFetched { session, requested_at, result });
                },
                AppAction::InsertMessage { session, message } => {
                    let id_of_message = message.id.clone();
                    let result =
                        self.backend.insert_message(message).await.map_err(ChatError::from);
                    self.queue(id, AppEvent::MessageInserted {
                        session,
                        id: id_of_message,
                        result,
                    });
                },
                AppAction::UpsertPresence { session, room, username, at } => {
                    let result = self
                        .backend
                        .upsert_presence(&room, &username, at)
                        .await
                        .map_err(ChatError::from);
                    self.queue(id, AppEvent::HeartbeatSent { session, result });
                },
                AppAction::SendDeparture { room, username } => {
                    if let Err(err) = self.backend.remove_presence(&room, &username).await {
                        debug!(%room, error = %err, "departure notice lost");
                    }
                },
            }
        }
    }

    fn queue(&mut self, id: ClientId, event: AppEvent) {
        self.clients[id.0].inbox.push_back(event);
    }

    async fn subscribe(
        &mut self,
        id: ClientId,
        session: SessionId,
        room: &RoomKey,
    ) -> Result<(), ChatError> {
        self.sever_feeds(id);
        let inserts = self.backend.subscribe_inserts(room).await?;
        let presence = self.backend.subscribe_presence_changes(room).await?;
        let client = &mut self.clients[id.0];
        client.inserts = Some((session, inserts));
        client.presence = Some((session, presence));
        Ok(())
    }
}
