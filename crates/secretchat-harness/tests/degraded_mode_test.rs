//! Backend failures seen from the client.
//!
//! Unreachable backends put the client into degraded mode, where sends are
//! echoed locally and flagged; a rejected write surfaces as a notice and
//! changes nothing else.

use std::{collections::HashSet, time::Duration};

use proptest::prelude::*;
use secretchat_app::{AppConfig, Delivery};
use secretchat_backend::{Backend, ChaoticBackend, MemoryBackend};
use secretchat_core::{Message, MessageId, RoomKey};
use secretchat_harness::{ClientId, DeliveryOrder, SIM_EPOCH, SimCluster};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().build().unwrap()
}

async fn joined_pair(
    backend: ChaoticBackend<MemoryBackend>,
) -> (SimCluster<ChaoticBackend<MemoryBackend>>, ClientId, ClientId) {
    let mut cluster = SimCluster::new(backend, 9, DeliveryOrder::Fifo);
    let alice = cluster.add_client("alice", AppConfig::default());
    let bob = cluster.add_client("bob", AppConfig::default());
    cluster.join(alice, "orchid").await.unwrap();
    cluster.join(bob, "orchid").await.unwrap();
    cluster.settle().await.unwrap();
    (cluster, alice, bob)
}

#[tokio::test]
async fn unreachable_backend_echoes_locally() {
    let backend = ChaoticBackend::new(MemoryBackend::new(), 0.0);
    let (mut cluster, alice, bob) = joined_pair(backend.clone()).await;

    backend.set_offline(true);
    cluster.send(alice, "into the void").await.unwrap();
    cluster.settle().await.unwrap();

    let app = cluster.app(alice);
    assert!(app.connectivity().is_degraded());
    let messages = app.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].delivery, Delivery::LocalOnly);
    assert!(cluster.app(bob).messages().is_empty());

    // Sends while degraded show up at once.
    cluster.send(alice, "still trying").await.unwrap();
    assert_eq!(cluster.app(alice).messages().len(), 2);
}

#[tokio::test]
async fn local_only_flag_clears_when_insert_lands() {
    let backend = ChaoticBackend::new(MemoryBackend::new(), 0.0);
    let (mut cluster, alice, bob) = joined_pair(backend.clone()).await;

    backend.set_offline(true);
    cluster.send(alice, "lost").await.unwrap();
    cluster.settle().await.unwrap();
    backend.set_offline(false);
    cluster.env().advance(Duration::from_secs(1));

    // Still degraded: the echo is immediate, the insert succeeds behind
    // it.
    cluster.send(alice, "recovered").await.unwrap();
    let recovered = cluster.app(alice).messages().last().cloned().unwrap();
    assert_eq!(recovered.delivery, Delivery::LocalOnly);

    cluster.settle().await.unwrap();

    let app = cluster.app(alice);
    assert!(!app.connectivity().is_degraded());
    assert_eq!(app.message(&recovered.id).unwrap().delivery, Delivery::Delivered);
    let bob_ids: Vec<_> = cluster.app(bob).messages().into_iter().map(|v| v.id).collect();
    assert_eq!(bob_ids, vec![recovered.id]);
}

#[tokio::test]
async fn heartbeat_success_restores_connectivity() {
    let backend = ChaoticBackend::new(MemoryBackend::new(), 0.0);
    let (mut cluster, alice, _bob) = joined_pair(backend.clone()).await;

    backend.set_offline(true);
    cluster.advance(Duration::from_secs(31), Duration::from_secs(1)).await.unwrap();
    assert!(cluster.app(alice).connectivity().is_degraded());

    backend.set_offline(false);
    cluster.advance(Duration::from_secs(30), Duration::from_secs(1)).await.unwrap();
    assert!(!cluster.app(alice).connectivity().is_degraded());
}

#[tokio::test]
async fn rejected_send_sets_notice_only() {
    let backend = ChaoticBackend::new(MemoryBackend::new(), 0.0);
    let (mut cluster, alice, _bob) = joined_pair(backend.clone()).await;

    backend.set_rejecting(true);
    cluster.send(alice, "refused").await.unwrap();
    cluster.settle().await.unwrap();

    let app = cluster.app(alice);
    assert!(app.notice().is_some());
    assert!(app.messages().is_empty());
    assert!(!app.connectivity().is_degraded());

    // The next successful send clears the notice.
    backend.set_rejecting(false);
    cluster.send(alice, "accepted").await.unwrap();
    assert!(cluster.app(alice).notice().is_none());
}

#[tokio::test]
async fn closed_feed_degrades_and_poll_resubscribes() {
    let backend = ChaoticBackend::new(MemoryBackend::new(), 0.0);
    let (mut cluster, alice, bob) = joined_pair(backend.clone()).await;
    let key = RoomKey::parse("orchid").unwrap();

    backend.inner().disconnect_room(&key);
    cluster.settle().await.unwrap();
    assert!(cluster.app(alice).connectivity().is_degraded());

    // Missed while disconnected; the resync fetch brings it back.
    let missed = Message {
        id: MessageId::new("offline-1"),
        sender: "carol".to_string(),
        content: key.seal("sent while you were away"),
        created_at: SIM_EPOCH,
        room_key: key.clone(),
    };
    backend.inner().insert_message(missed).await.unwrap();

    cluster.advance(Duration::from_secs(61), Duration::from_secs(1)).await.unwrap();

    for id in [alice, bob] {
        let app = cluster.app(id);
        assert!(!app.connectivity().is_degraded());
        assert_eq!(app.messages().len(), 1);
    }
    assert_eq!(backend.inner().insert_subscriber_count(&key), 2);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Under random failures, nothing a client shows as delivered is missing
    /// from the backend, and the view invariants hold at every step.
    #[test]
    fn delivered_messages_exist_under_chaos(seed in any::<u64>(), sends in 1usize..12) {
        runtime().block_on(async {
            let backend = ChaoticBackend::with_seed(MemoryBackend::new(), 0.25, seed);
            let mut cluster = SimCluster::new(backend.clone(), seed, DeliveryOrder::Shuffled);
            let alice = cluster.add_client("alice", AppConfig::default());
            let bob = cluster.add_client("bob", AppConfig::default());
            cluster.join(alice, "orchid").await.unwrap();
            cluster.join(bob, "orchid").await.unwrap();

            for n in 0..sends {
                let from = if n % 2 == 0 { alice } else { bob };
                cluster.send(from, &format!("chaos {n}")).await.unwrap();
                cluster.advance(Duration::from_secs(20), Duration::from_secs(5)).await.unwrap();
            }

            let key = RoomKey::parse("orchid").unwrap();
            let stored: HashSet<_> = backend
                .inner()
                .fetch_messages(&key)
                .await
                .unwrap()
                .into_iter()
                .map(|message| message.id)
                .collect();

            for client in cluster.snapshot().clients {
                for id in client.delivered_ids() {
                    assert!(stored.contains(&id), "{} shows unstored {id}", client.username);
                }
            }
        });
    }
}
