//! Welcome-message dispatch: join suppression and delayed deletion

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::RecordingMessenger;
use guildgate::clock::{Clock, ManualClock};
use guildgate::notify::{LinkStyle, NotificationDispatcher, NotificationSettings};
use guildgate::store::InMemoryJoinDeduplicator;

struct Fixture {
    dispatcher: NotificationDispatcher,
    messenger: Arc<RecordingMessenger>,
    clock: Arc<ManualClock>,
}

fn fixture(delete_after: Duration) -> Fixture {
    let clock = Arc::new(ManualClock::default());
    let dedup = Arc::new(InMemoryJoinDeduplicator::new(
        clock.clone() as Arc<dyn Clock>,
        chrono::Duration::seconds(60),
    ));
    let messenger = Arc::new(RecordingMessenger::default());
    let dispatcher = NotificationDispatcher::new(
        dedup,
        messenger.clone(),
        NotificationSettings {
            channel_id: "c1".to_string(),
            public_base_url: "https://gate.example.com/".to_string(),
            link_style: LinkStyle::Text,
            delete_after,
        },
    );
    Fixture {
        dispatcher,
        messenger,
        clock,
    }
}

#[tokio::test]
async fn test_verification_link_uses_public_base_url() {
    let f = fixture(Duration::from_secs(300));
    assert_eq!(
        f.dispatcher.verification_link("U1"),
        "https://gate.example.com/verify/U1"
    );
}

#[tokio::test]
async fn test_repeat_joins_within_window_send_one_message() {
    let f = fixture(Duration::from_secs(300));

    let first = f.dispatcher.welcome("U1").await.unwrap();
    f.clock.advance(chrono::Duration::seconds(30));
    let second = f.dispatcher.welcome("U1").await.unwrap();

    assert!(first.is_some());
    assert!(second.is_none());
    assert_eq!(f.messenger.sent_count(), 1);

    let (channel, message) = f.messenger.sent.lock().unwrap()[0].clone();
    assert_eq!(channel, "c1");
    assert!(message.content.contains("<@U1>"));
    assert!(message
        .content
        .contains("https://gate.example.com/verify/U1"));

    if let Some(deletion) = first {
        deletion.cancel();
    }
}

#[tokio::test]
async fn test_join_after_window_sends_again() {
    let f = fixture(Duration::from_secs(300));

    f.dispatcher.welcome("U1").await.unwrap();
    f.clock.advance(chrono::Duration::seconds(61));
    let again = f.dispatcher.welcome("U1").await.unwrap();

    assert!(again.is_some());
    assert_eq!(f.messenger.sent_count(), 2);
}

#[tokio::test]
async fn test_different_members_are_not_suppressed() {
    let f = fixture(Duration::from_secs(300));

    f.dispatcher.welcome("U1").await.unwrap();
    f.dispatcher.welcome("U2").await.unwrap();

    assert_eq!(f.messenger.sent_count(), 2);
}

#[tokio::test]
async fn test_message_is_deleted_after_delay() {
    let f = fixture(Duration::from_millis(10));

    let deletion = f
        .dispatcher
        .on_join("U1", "https://gate.example.com/verify/U1")
        .await
        .unwrap()
        .expect("message sent");
    deletion.wait().await;

    assert_eq!(
        f.messenger.deleted(),
        vec![("c1".to_string(), "m1".to_string())]
    );
}

#[tokio::test]
async fn test_cancelled_deletion_never_runs() {
    let f = fixture(Duration::from_millis(50));

    let deletion = f
        .dispatcher
        .on_join("U1", "https://gate.example.com/verify/U1")
        .await
        .unwrap()
        .expect("message sent");
    deletion.cancel();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(f.messenger.deleted().is_empty());
}
