// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the scheduler, sender, change engine, and command
//! router, driven through mock collaborators.
//!
//! Each test builds an isolated engine over an in-memory store, a capturing
//! chat client, and scripted sources. Tests are independent and
//! order-insensitive.

use std::sync::Arc;
use std::time::Duration;

use fanline_core::{
    Change, ChatId, Command, FanlineError, RawData, Subscription, SubscriptionId,
    SubscriptionStore, NOT_STARTED,
};
use fanline_engine::Engine;
use fanline_test_utils::{MemoryStore, MockChat, PullScript, ScriptSource};

const POLL: Duration = Duration::from_millis(25);
const WAIT: Duration = Duration::from_secs(3);

struct Harness {
    store: Arc<MemoryStore>,
    chat: Arc<MockChat>,
    source: Arc<ScriptSource>,
    engine: Engine,
}

fn harness() -> Harness {
    harness_with_sources(vec![Arc::new(ScriptSource::new("script"))], 0)
}

fn harness_with_sources(sources: Vec<Arc<ScriptSource>>, admin_id: i64) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let chat = Arc::new(MockChat::new());
    let mut builder = Engine::builder(
        Arc::clone(&store) as Arc<dyn SubscriptionStore>,
        Arc::clone(&chat) as Arc<dyn fanline_core::ChatClient>,
    )
    .poll_interval(POLL)
    .admin_id(admin_id);
    for source in &sources {
        builder = builder.source(Arc::clone(source) as Arc<dyn fanline_core::Source>);
    }
    Harness {
        store,
        chat,
        source: Arc::clone(&sources[0]),
        engine: builder.build(),
    }
}

fn make_sub(tag: &str, chat: i64, item: &str) -> Subscription {
    Subscription {
        id: SubscriptionId::new(tag, ChatId(chat), item),
        name: format!("#{item}"),
        raw_data: RawData::new(format!("{{\"item\":\"{item}\"}}").into_bytes()),
        offset: 0,
        error: Some(NOT_STARTED.to_string()),
        updated_at: None,
    }
}

/// Seed an active subscription directly in storage, without engine
/// involvement; used before `engine.init()`.
async fn seed_active(store: &MemoryStore, tag: &str, chat: i64, item: &str) -> SubscriptionId {
    let sub = make_sub(tag, chat, item);
    assert!(store.create(&sub).await.unwrap());
    assert!(store.change(&sub.id, Change::Resume).await.unwrap());
    sub.id
}

async fn wait_until(mut cond: impl FnMut() -> bool, what: &str) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for: {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn wait_for_offset(store: &MemoryStore, id: &SubscriptionId, offset: i64) {
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        let current = store.get(id).await.unwrap().map(|s| s.offset);
        if current == Some(offset) {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "offset never reached {offset}, last seen {current:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn wait_for_suspension(store: &MemoryStore, id: &SubscriptionId) -> String {
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        if let Some(sub) = store.get(id).await.unwrap() {
            if let Some(error) = sub.error {
                return error;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "subscription was never suspended"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn command(user: i64, chat: i64, name: &str, payload: &str) -> Command {
    Command {
        user_id: user,
        chat_id: ChatId(chat),
        name: name.to_string(),
        payload: payload.to_string(),
        callback_id: None,
    }
}

// ---- Scenario: fresh subscription, one update ----

#[tokio::test]
async fn fresh_subscription_delivers_and_commits() {
    let h = harness();
    h.source.push_updates(&[42]);
    let id = seed_active(&h.store, "script", 1, "a").await;
    h.engine.init().await.unwrap();

    wait_for_offset(&h.store, &id, 42).await;

    let sub = h.store.get(&id).await.unwrap().unwrap();
    assert!(sub.is_active());
    assert!(sub.updated_at.is_some());
    let texts = h.chat.texts_for(ChatId(1));
    assert!(
        texts.iter().any(|t| t == "update 42"),
        "delivered texts: {texts:?}"
    );
}

// ---- Scenario: send failure mid-batch ----

#[tokio::test]
async fn send_failure_suspends_and_resume_continues_after_commit() {
    let h = harness();
    h.chat.set_admins(ChatId(1), vec![900]);
    h.chat.fail_once_containing("update 11");
    h.source.push_updates(&[10, 11, 12]);
    let id = seed_active(&h.store, "script", 1, "a").await;
    h.engine.init().await.unwrap();

    let reason = wait_for_suspension(&h.store, &id).await;
    assert!(reason.contains("injected send failure"), "reason: {reason}");

    let sub = h.store.get(&id).await.unwrap().unwrap();
    assert_eq!(sub.offset, 10, "only the delivered update is committed");

    let texts = h.chat.texts_for(ChatId(1));
    assert!(texts.iter().any(|t| t == "update 10"));
    assert!(!texts.iter().any(|t| t == "update 11"));
    assert!(!texts.iter().any(|t| t == "update 12"));

    // The chat's admin is notified about the suspension.
    wait_until(
        || {
            h.chat
                .texts_for(ChatId(900))
                .iter()
                .any(|t| t.contains("suspended"))
        },
        "admin suspension notification",
    )
    .await;

    // On resume the next pull starts strictly after the committed offset.
    h.source.push_updates(&[11, 12]);
    h.engine.change(0, &id, Change::Resume).await.unwrap();
    wait_for_offset(&h.store, &id, 12).await;

    let texts = h.chat.texts_for(ChatId(1));
    assert!(texts.iter().any(|t| t == "update 11"));
    assert!(texts.iter().any(|t| t == "update 12"));
}

// ---- Scenario: concurrent delete during send ----

#[tokio::test]
async fn concurrent_delete_completes_send_without_suspension() {
    let h = harness();
    h.chat.set_send_delay(Duration::from_millis(80));
    h.source.push_updates(&[7]);
    let id = seed_active(&h.store, "script", 1, "a").await;
    h.engine.init().await.unwrap();

    // Wait for the driver to start the pull, then delete while the send
    // is still in flight.
    wait_until(|| h.source.pull_count() >= 1, "first pull").await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    h.engine.change(0, &id, Change::Delete).await.unwrap();

    // At-least-once: the in-flight send still completes.
    wait_until(
        || h.chat.texts_for(ChatId(1)).iter().any(|t| t == "update 7"),
        "in-flight send completion",
    )
    .await;

    // The commit lost its precondition; nothing is recorded and the chat
    // driver winds down once the chat has no subscriptions left.
    assert!(h.store.get(&id).await.unwrap().is_none());
    wait_until(
        || !h.engine.is_chat_active(ChatId(1)),
        "driver termination",
    )
    .await;
    assert!(h.store.is_empty());
}

// ---- Scenario: two chats, slow source ----

#[tokio::test]
async fn slow_source_does_not_stall_other_chats() {
    let slow = Arc::new(ScriptSource::new("slow"));
    let fast = Arc::new(ScriptSource::new("fast"));
    let h = harness_with_sources(vec![Arc::clone(&slow), Arc::clone(&fast)], 0);

    slow.push(PullScript::Block(Duration::from_millis(900)));
    fast.push_updates(&[1]);
    seed_active(&h.store, "slow", 1, "stuck").await;
    let fast_id = seed_active(&h.store, "fast", 2, "quick").await;
    h.engine.init().await.unwrap();

    // Chat 2 delivers within its normal interval while chat 1's pull is
    // still blocked upstream.
    wait_for_offset(&h.store, &fast_id, 1).await;
    assert_eq!(slow.pull_count(), 1, "slow pull still in flight");
    assert!(h.chat.texts_for(ChatId(1)).is_empty());
    assert!(h
        .chat
        .texts_for(ChatId(2))
        .iter()
        .any(|t| t == "update 1"));
}

// ---- Scenario: round-robin fairness ----

#[tokio::test]
async fn rotation_is_fair_across_subscriptions() {
    let h = harness();
    for item in ["s1", "s2", "s3"] {
        seed_active(&h.store, "script", 1, item).await;
    }
    h.engine.init().await.unwrap();

    wait_until(|| h.source.pull_count() >= 9, "nine pull cycles").await;

    let pulled = h.source.pulled_items();
    for item in ["s1", "s2", "s3"] {
        let count = pulled[..9].iter().filter(|p| *p == item).count();
        assert_eq!(count, 3, "rotation over 9 cycles: {pulled:?}");
    }
}

// ---- Scenario: boot recovery ----

#[tokio::test]
async fn boot_starts_drivers_only_for_active_chats() {
    let h = harness();
    seed_active(&h.store, "script", 1, "a").await;
    seed_active(&h.store, "script", 2, "c").await;
    let suspended = seed_active(&h.store, "script", 1, "b").await;
    assert!(h
        .store
        .change(&suspended, Change::Suspend { reason: "dead thread".into() })
        .await
        .unwrap());

    h.engine.init().await.unwrap();
    assert_eq!(h.engine.active_chat_count(), 2);

    wait_until(|| h.source.pull_count() >= 6, "a few cycles").await;
    assert!(
        !h.source.pulled_items().iter().any(|item| item == "b"),
        "suspended subscription must never be scheduled"
    );
}

// ---- Property: idempotent run_feed ----

#[tokio::test]
async fn concurrent_run_feed_starts_one_driver() {
    let h = harness();
    seed_active(&h.store, "script", 1, "a").await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let engine = h.engine.clone();
        handles.push(tokio::spawn(async move { engine.run_feed(ChatId(1)) }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(h.engine.active_chat_count(), 1);

    // A single driver polls once per interval; a duplicate would double
    // the rate.
    tokio::time::sleep(POLL * 6).await;
    assert!(
        h.source.pull_count() <= 8,
        "pull count {} suggests more than one driver",
        h.source.pull_count()
    );
}

// ---- Property: exhausted chats stop and restart on demand ----

#[tokio::test]
async fn driver_stops_when_chat_has_no_active_subscriptions() {
    let h = harness();
    let id = seed_active(&h.store, "script", 1, "a").await;
    h.engine.init().await.unwrap();
    assert!(h.engine.is_chat_active(ChatId(1)));

    h.engine
        .change(
            0,
            &id,
            Change::Suspend {
                reason: "operator pause".into(),
            },
        )
        .await
        .unwrap();

    wait_until(|| !h.engine.is_chat_active(ChatId(1)), "driver stop").await;

    // Resume re-creates the driver through run_feed.
    h.engine.change(0, &id, Change::Resume).await.unwrap();
    assert!(h.engine.is_chat_active(ChatId(1)));
}

// ---- Command router ----

#[tokio::test]
async fn subscribe_command_creates_and_starts_feed() {
    let h = harness();
    h.engine
        .handle_command(&command(42, 42, "/sub", "script:foo"))
        .await
        .unwrap();

    let id = SubscriptionId::new("script", ChatId(42), "foo");
    let sub = h.store.get(&id).await.unwrap().unwrap();
    assert!(sub.is_active(), "first resume activates the subscription");
    assert_eq!(sub.name, "#foo");
    assert!(h.engine.is_chat_active(ChatId(42)));
    assert!(h.chat.texts_for(ChatId(42)).iter().any(|t| t == "OK"));
}

#[tokio::test]
async fn subscribe_command_rejects_duplicates() {
    let h = harness();
    let cmd = command(42, 42, "/sub", "script:foo");
    h.engine.handle_command(&cmd).await.unwrap();
    let err = h.engine.handle_command(&cmd).await.unwrap_err();
    assert!(err.to_string().contains("already exists"));
}

#[tokio::test]
async fn subscribe_command_unrecognized_link_fails_draft() {
    let h = harness();
    let err = h
        .engine
        .handle_command(&command(42, 42, "/sub", "https://example.com/nothing"))
        .await
        .unwrap_err();
    assert!(err.is_draft_failed());
}

#[tokio::test]
async fn suspend_command_enforces_admin_access() {
    let h = harness();
    let id = seed_active(&h.store, "script", -100, "a").await;
    h.chat.set_admins(ChatId(-100), vec![7]);

    let err = h
        .engine
        .handle_command(&command(55, -100, "suspend", &id.to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, FanlineError::Forbidden));
    assert!(h.store.get(&id).await.unwrap().unwrap().is_active());

    h.engine
        .handle_command(&command(7, -100, "suspend", &id.to_string()))
        .await
        .unwrap();
    let sub = h.store.get(&id).await.unwrap().unwrap();
    assert_eq!(sub.error.as_deref(), Some("suspended by user"));
}

#[tokio::test]
async fn callback_commands_answer_the_callback() {
    let h = harness();
    let id = seed_active(&h.store, "script", 42, "a").await;
    let mut cmd = command(42, 42, "suspend", &id.to_string());
    cmd.callback_id = Some("cb-1".into());

    h.engine.handle_command(&cmd).await.unwrap();

    let answers = h.chat.callback_answers();
    assert_eq!(answers, vec![("cb-1".to_string(), "OK".to_string())]);
}

#[tokio::test]
async fn list_command_builds_action_keyboard() {
    let h = harness();
    seed_active(&h.store, "script", 42, "a").await;
    seed_active(&h.store, "script", 42, "b").await;

    h.engine
        .handle_command(&command(42, 42, "/list", ""))
        .await
        .unwrap();

    let sent = h.chat.sent_messages();
    let listing = sent
        .iter()
        .find(|m| m.text.contains("eligible for suspend"))
        .expect("listing message");
    assert!(listing.text.contains("2 subscriptions"));
    let keyboard = listing.keyboard.as_ref().expect("keyboard");
    assert_eq!(keyboard.0.len(), 2);
    assert_eq!(keyboard.0[0].command, "suspend");
}

#[tokio::test]
async fn clear_command_removes_matching_suspended() {
    let h = harness();
    let id = seed_active(&h.store, "script", 42, "a").await;
    h.store
        .change(&id, Change::Suspend { reason: "http 404".into() })
        .await
        .unwrap();

    h.engine
        .handle_command(&command(42, 42, "/clear", ". %404%"))
        .await
        .unwrap();

    assert!(h.store.get(&id).await.unwrap().is_none());
    assert!(h
        .chat
        .texts_for(ChatId(42))
        .iter()
        .any(|t| t == "1 subscriptions cleared"));
}

#[tokio::test]
async fn aliases_resolve_chat_arguments() {
    let store = Arc::new(MemoryStore::new());
    let chat = Arc::new(MockChat::new());
    let source = Arc::new(ScriptSource::new("script"));
    let engine = Engine::builder(
        Arc::clone(&store) as Arc<dyn SubscriptionStore>,
        Arc::clone(&chat) as Arc<dyn fanline_core::ChatClient>,
    )
    .poll_interval(POLL)
    .source(Arc::clone(&source) as Arc<dyn fanline_core::Source>)
    .aliases([("news".to_string(), ChatId(-5))].into_iter().collect())
    .build();
    chat.set_admins(ChatId(-5), vec![42]);

    engine
        .handle_command(&command(42, 42, "/sub", "script:foo news"))
        .await
        .unwrap();

    let id = SubscriptionId::new("script", ChatId(-5), "foo");
    assert!(store.get(&id).await.unwrap().is_some());
}

#[tokio::test]
async fn halt_is_admin_only_and_cancels_shutdown_token() {
    let h = harness_with_sources(vec![Arc::new(ScriptSource::new("script"))], 99);

    let err = h
        .engine
        .handle_command(&command(42, 42, "/halt", ""))
        .await
        .unwrap_err();
    assert!(matches!(err, FanlineError::Forbidden));
    assert!(!h.engine.shutdown_token().is_cancelled());

    h.engine
        .handle_command(&command(99, 99, "/halt", ""))
        .await
        .unwrap();
    assert!(h.engine.shutdown_token().is_cancelled());
}

// ---- Sender ----

#[tokio::test]
async fn failed_media_is_dropped_not_fatal() {
    use fanline_core::{MediaFuture, MediaKind, MediaPayload, MediaRef, Update};

    let h = harness();
    let good = MediaRef {
        kind: MediaKind::Photo,
        payload: MediaPayload::Url("https://example.com/a.jpg".into()),
    };
    let update = Update {
        offset: 5,
        raw_data: RawData::default(),
        text: vec!["page".into()],
        media: vec![
            MediaFuture::ready("https://example.com/a.jpg", good.clone()),
            MediaFuture::failed(
                "https://example.com/b.webm",
                FanlineError::Media("unsupported format: webm".into()),
            ),
        ],
    };

    h.engine.send_update(ChatId(1), update).await.unwrap();

    assert_eq!(h.chat.texts_for(ChatId(1)), vec!["page"]);
    let albums = h.chat.sent_albums();
    assert_eq!(albums.len(), 1);
    assert_eq!(albums[0].media, vec![good]);
}

#[tokio::test]
async fn media_is_grouped_into_platform_sized_albums() {
    use fanline_core::{MediaFuture, MediaKind, MediaPayload, MediaRef, Update};

    let h = harness();
    let media = (0..25)
        .map(|i| {
            MediaFuture::ready(
                format!("https://example.com/{i}.jpg"),
                MediaRef {
                    kind: MediaKind::Photo,
                    payload: MediaPayload::Url(format!("https://example.com/{i}.jpg")),
                },
            )
        })
        .collect();
    let update = Update {
        offset: 1,
        raw_data: RawData::default(),
        text: vec![],
        media,
    };

    h.engine.send_update(ChatId(1), update).await.unwrap();

    let sizes: Vec<usize> = h.chat.sent_albums().iter().map(|a| a.media.len()).collect();
    assert_eq!(sizes, vec![10, 10, 5]);
}

#[tokio::test]
async fn status_reports_driver_count_to_admin_only() {
    let h = harness_with_sources(vec![Arc::new(ScriptSource::new("script"))], 99);
    seed_active(&h.store, "script", 1, "a").await;
    h.engine.init().await.unwrap();

    h.engine
        .handle_command(&command(5, 5, "/status", ""))
        .await
        .unwrap();
    assert!(h.chat.texts_for(ChatId(5)).iter().any(|t| t == "OK"));

    h.engine
        .handle_command(&command(99, 99, "/status", ""))
        .await
        .unwrap();
    assert!(h
        .chat
        .texts_for(ChatId(99))
        .iter()
        .any(|t| t.contains("active chat drivers: 1")));
}
