//! Behavior of the in-memory backend and its fault-injecting wrapper.

use secretchat_backend::{
    Backend, BackendError, ChaoticBackend, MemoryBackend, WELCOME_MESSAGES, WELCOME_SENDER,
};
use secretchat_core::{Message, MessageId, PresenceEntry, RoomKey, Timestamp};

fn key(secret: &str) -> RoomKey {
    RoomKey::parse(secret).unwrap()
}

fn msg(room: &RoomKey, id: &str, at: u64, text: &str) -> Message {
    Message {
        id: MessageId::new(id),
        sender: "trinity".into(),
        content: room.seal(text),
        created_at: Timestamp::from_millis(at),
        room_key: room.clone(),
    }
}

#[tokio::test]
async fn rooms_are_isolated_by_key() {
    let backend = MemoryBackend::new();
    let nexus = key("nexus");
    let zion = key("zion");

    backend.insert_message(msg(&nexus, "a", 10, "hello")).await.unwrap();

    assert_eq!(backend.fetch_messages(&nexus).await.unwrap().len(), 1);
    assert!(backend.fetch_messages(&zion).await.unwrap().is_empty());
    assert_eq!(backend.room_count(), 2);
}

#[tokio::test]
async fn inserts_fan_out_to_every_subscriber() {
    let backend = MemoryBackend::new();
    let room = key("nexus");
    let mut first = backend.subscribe_inserts(&room).await.unwrap();
    let mut second = backend.clone().subscribe_inserts(&room).await.unwrap();

    let sent = msg(&room, "a", 10, "follow the white rabbit");
    backend.insert_message(sent.clone()).await.unwrap();

    assert_eq!(first.next().await, Some(sent.clone()));
    assert_eq!(second.next().await, Some(sent));
}

#[tokio::test]
async fn stored_rows_round_trip_through_fetch() {
    let backend = MemoryBackend::new();
    let room = key("nexus");
    let sent = msg(&room, "a", 10, "there is no spoon");

    backend.insert_message(sent.clone()).await.unwrap();
    let fetched = backend.fetch_messages(&room).await.unwrap();

    assert_eq!(fetched, vec![sent]);
    assert_eq!(room.open(&fetched[0].content).unwrap(), "there is no spoon");
}

#[tokio::test]
async fn presence_upsert_remove_and_notify() {
    let backend = MemoryBackend::new();
    let room = key("nexus");
    let mut changes = backend.subscribe_presence_changes(&room).await.unwrap();

    backend.upsert_presence(&room, "neo", Timestamp::from_millis(500)).await.unwrap();
    backend.upsert_presence(&room, "smith", Timestamp::from_millis(5)).await.unwrap();

    let active = backend.fetch_presence(&room, Timestamp::from_millis(100)).await.unwrap();
    assert_eq!(active, vec![PresenceEntry::new("neo", Timestamp::from_millis(500))]);

    backend.remove_presence(&room, "neo").await.unwrap();
    assert_eq!(backend.fetch_presence(&room, Timestamp::from_millis(0)).await.unwrap().len(), 1);

    for _ in 0..3 {
        assert_eq!(changes.next().await, Some(()));
    }
}

#[tokio::test]
async fn welcome_messages_are_seeded_before_now() {
    let backend = MemoryBackend::new();
    let room = key("nexus");
    let now = Timestamp::from_millis(10 * 60 * 60 * 1000);

    backend.seed_welcome(&room, WELCOME_SENDER, now).unwrap();
    backend.seed_welcome(&room, WELCOME_SENDER, now).unwrap();

    let messages = backend.fetch_messages(&room).await.unwrap();
    assert_eq!(messages.len(), WELCOME_MESSAGES.len());
    for (message, (text, age)) in messages.iter().zip(WELCOME_MESSAGES) {
        assert_eq!(message.sender, WELCOME_SENDER);
        assert_eq!(message.created_at, now.saturating_sub(age));
        assert_eq!(room.open(&message.content).unwrap(), text);
    }
}

#[tokio::test]
async fn disconnect_ends_feeds() {
    let backend = MemoryBackend::new();
    let room = key("nexus");
    let mut feed = backend.subscribe_inserts(&room).await.unwrap();

    backend.disconnect_room(&room);

    assert_eq!(feed.next().await, None);
}

#[tokio::test]
async fn offline_wrapper_fails_as_unreachable() {
    let chaotic = ChaoticBackend::new(MemoryBackend::new(), 0.0);
    let room = key("nexus");
    chaotic.set_offline(true);

    let err = chaotic.insert_message(msg(&room, "a", 10, "hi")).await.unwrap_err();
    assert!(matches!(err, BackendError::Unreachable(_)));
    assert_eq!(chaotic.inner().message_count(&room), 0);

    chaotic.set_offline(false);
    chaotic.insert_message(msg(&room, "a", 10, "hi")).await.unwrap();
    assert_eq!(chaotic.inner().message_count(&room), 1);
    assert_eq!(chaotic.operation_count(), 2);
    assert_eq!(chaotic.failure_count(), 1);
}

#[tokio::test]
async fn chaos_is_reproducible_per_seed() {
    async fn outcomes(seed: u64) -> Vec<bool> {
        let chaotic = ChaoticBackend::with_seed(MemoryBackend::new(), 0.5, seed);
        let room = RoomKey::parse("nexus").unwrap();
        let mut results = Vec::new();
        for i in 0..32 {
            let ok = chaotic
                .upsert_presence(&room, "neo", Timestamp::from_millis(i))
                .await
                .is_ok();
            results.push(ok);
        }
        results
    }

    let a = outcomes(7).await;
    let b = outcomes(7).await;

    assert_eq!(a, b);
    assert!(a.iter().any(|ok| *ok));
    assert!(a.iter().any(|ok| !*ok));
}
