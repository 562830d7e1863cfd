//! Join-time synchronisation races.
//!
//! A client subscribes before it fetches history, so a message can arrive on
//! the live feed before the history snapshot does. These tests drive that
//! interleaving (and stale results from an abandoned join) by hand.

use secretchat_app::{AppConfig, AppEvent, SessionId};
use secretchat_backend::{Backend, MemoryBackend, WELCOME_SENDER};
use secretchat_core::{RoomKey, SyncState};
use secretchat_harness::{DeliveryOrder, SIM_EPOCH, SimCluster};

#[tokio::test]
async fn feed_item_before_history_is_buffered_then_shown_once() {
    let mut cluster = SimCluster::new(MemoryBackend::new(), 1, DeliveryOrder::Fifo);
    let alice = cluster.add_client("alice", AppConfig::default());
    let bob = cluster.add_client("bob", AppConfig::default());

    // Alice's history fetch has run (empty room) but its result is still
    // queued when Bob's message is broadcast.
    cluster.join(alice, "orchid").await.unwrap();
    cluster.join(bob, "orchid").await.unwrap();
    cluster.send(bob, "racing the snapshot").await.unwrap();

    assert!(cluster.pump_feed(alice).await.unwrap());
    assert_eq!(cluster.app(alice).sync_state(), SyncState::Syncing);
    assert!(cluster.app(alice).messages().is_empty());

    // History result: empty snapshot, then the buffered insert is folded
    // in.
    assert!(cluster.deliver_one(alice).await.unwrap());
    assert_eq!(cluster.app(alice).sync_state(), SyncState::Live);
    let messages = cluster.app(alice).messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].sender, "bob");

    cluster.settle().await.unwrap();
    assert_eq!(cluster.app(alice).messages(), cluster.app(bob).messages());
}

#[tokio::test]
async fn message_in_history_and_feed_renders_once() {
    let mut cluster = SimCluster::new(MemoryBackend::new(), 2, DeliveryOrder::Fifo);
    let alice = cluster.add_client("alice", AppConfig::default());
    let bob = cluster.add_client("bob", AppConfig::default());

    cluster.join(alice, "orchid").await.unwrap();
    cluster.send(alice, "seen twice").await.unwrap();
    cluster.settle().await.unwrap();

    // Bob's snapshot already holds the message; a late feed copy of it
    // arrives before the snapshot is applied.
    cluster.join(bob, "orchid").await.unwrap();
    let key = RoomKey::parse("orchid").unwrap();
    let stored = cluster.backend().fetch_messages(&key).await.unwrap();
    let session = cluster.app(bob).session().unwrap();
    let event = AppEvent::MessageArrived { session, message: stored[0].clone() };
    cluster.handle(bob, event).await.unwrap();
    assert!(cluster.app(bob).messages().is_empty());

    cluster.settle().await.unwrap();

    let messages = cluster.app(bob).messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, stored[0].id);
    assert_eq!(cluster.app(alice).messages(), messages);
}

#[tokio::test]
async fn results_from_an_abandoned_join_are_ignored() {
    let backend = MemoryBackend::new();
    let orchid = RoomKey::parse("orchid").unwrap();
    backend.seed_welcome(&orchid, WELCOME_SENDER, SIM_EPOCH).unwrap();

    let mut cluster = SimCluster::new(backend, 3, DeliveryOrder::Shuffled);
    let alice = cluster.add_client("alice", AppConfig::default());

    // Leave the orchid history result queued, then switch rooms.
    cluster.join(alice, "orchid").await.unwrap();
    let first = cluster.app(alice).session();
    cluster.join(alice, "lotus").await.unwrap();

    assert_ne!(cluster.app(alice).session(), first);
    assert!(cluster.inbox_len(alice) > 0);

    cluster.settle().await.unwrap();

    let app = cluster.app(alice);
    assert_eq!(app.room_key(), Some(&RoomKey::parse("lotus").unwrap()));
    assert_eq!(app.sync_state(), SyncState::Live);
    assert!(app.messages().is_empty());
}

#[tokio::test]
async fn explicit_stale_event_changes_nothing() {
    let mut cluster = SimCluster::new(MemoryBackend::new(), 4, DeliveryOrder::Fifo);
    let alice = cluster.add_client("alice", AppConfig::default());
    cluster.join(alice, "orchid").await.unwrap();
    cluster.settle().await.unwrap();

    let stale = SessionId(0);
    let renders = cluster.renders(alice);
    cluster.handle(alice, AppEvent::FeedClosed { session: stale }).await.unwrap();

    assert_eq!(cluster.renders(alice), renders);
    assert!(!cluster.app(alice).connectivity().is_degraded());
}
