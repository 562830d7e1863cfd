//! Presence tracking across clients: heartbeats keep users active, departure
//! notices remove them promptly, and silent users age out.

use std::time::Duration;

use secretchat_app::AppConfig;
use secretchat_backend::{Backend, MemoryBackend};
use secretchat_core::RoomKey;
use secretchat_harness::{DeliveryOrder, SIM_EPOCH, SimCluster};

fn users(names: &[&str]) -> Vec<String> {
    names.iter().map(ToString::to_string).collect()
}

#[tokio::test]
async fn joiners_see_each_other() {
    let mut cluster = SimCluster::new(MemoryBackend::new(), 1, DeliveryOrder::Shuffled);
    let alice = cluster.add_client("alice", AppConfig::default());
    let bob = cluster.add_client("bob", AppConfig::default());

    cluster.join(alice, "orchid").await.unwrap();
    cluster.settle().await.unwrap();
    assert_eq!(cluster.app(alice).active_users(), users(&["alice"]));

    cluster.join(bob, "orchid").await.unwrap();
    cluster.settle().await.unwrap();

    assert_eq!(cluster.app(alice).active_users(), users(&["alice", "bob"]));
    assert_eq!(cluster.app(bob).active_users(), users(&["alice", "bob"]));
}

#[tokio::test]
async fn leaving_removes_user_from_others() {
    let mut cluster = SimCluster::new(MemoryBackend::new(), 2, DeliveryOrder::Fifo);
    let alice = cluster.add_client("alice", AppConfig::default());
    let bob = cluster.add_client("bob", AppConfig::default());

    cluster.join(alice, "orchid").await.unwrap();
    cluster.join(bob, "orchid").await.unwrap();
    cluster.settle().await.unwrap();

    cluster.advance(Duration::from_secs(1), Duration::from_secs(1)).await.unwrap();
    cluster.command(bob, secretchat_app::UserCommand::Leave).await.unwrap();
    cluster.settle().await.unwrap();

    assert_eq!(cluster.app(alice).active_users(), users(&["alice"]));
    assert!(cluster.app(bob).active_users().is_empty());
    assert!(cluster.app(bob).room_key().is_none());
}

#[tokio::test]
async fn heartbeats_keep_users_active_past_the_window() {
    let mut cluster = SimCluster::new(MemoryBackend::new(), 3, DeliveryOrder::Shuffled);
    let alice = cluster.add_client("alice", AppConfig::default());
    let bob = cluster.add_client("bob", AppConfig::default());

    cluster.join(alice, "orchid").await.unwrap();
    cluster.join(bob, "orchid").await.unwrap();
    cluster.advance(Duration::from_secs(11 * 60), Duration::from_secs(5)).await.unwrap();

    assert_eq!(cluster.app(alice).active_users(), users(&["alice", "bob"]));
    assert_eq!(cluster.app(bob).active_users(), users(&["alice", "bob"]));
}

#[tokio::test]
async fn silent_user_ages_out() {
    let backend = MemoryBackend::new();
    let key = RoomKey::parse("orchid").unwrap();
    // Heartbeat from a user with no running client.
    backend.upsert_presence(&key, "ghost", SIM_EPOCH).await.unwrap();

    let mut cluster = SimCluster::new(backend, 4, DeliveryOrder::Fifo);
    let alice = cluster.add_client("alice", AppConfig::default());
    cluster.join(alice, "orchid").await.unwrap();
    cluster.settle().await.unwrap();
    assert_eq!(cluster.app(alice).active_users(), users(&["alice", "ghost"]));

    // Four minutes: still inside the five-minute window.
    cluster.advance(Duration::from_secs(4 * 60), Duration::from_secs(10)).await.unwrap();
    assert_eq!(cluster.app(alice).active_users(), users(&["alice", "ghost"]));

    // Past the window, the next poll prunes the ghost.
    cluster.advance(Duration::from_secs(2 * 60), Duration::from_secs(10)).await.unwrap();
    assert_eq!(cluster.app(alice).active_users(), users(&["alice"]));
}

#[tokio::test]
async fn custom_window_is_honored() {
    let config = AppConfig {
        staleness_window: Duration::from_secs(20),
        presence_poll_interval: Duration::from_secs(5),
        heartbeat_interval: Duration::from_secs(4),
        ..AppConfig::default()
    };
    let backend = MemoryBackend::new();
    let key = RoomKey::parse("orchid").unwrap();
    backend.upsert_presence(&key, "ghost", SIM_EPOCH).await.unwrap();

    let mut cluster = SimCluster::new(backend, 5, DeliveryOrder::Fifo);
    let alice = cluster.add_client("alice", config);
    cluster.join(alice, "orchid").await.unwrap();
    cluster.advance(Duration::from_secs(30), Duration::from_secs(1)).await.unwrap();

    assert_eq!(cluster.app(alice).active_users(), users(&["alice"]));
}
