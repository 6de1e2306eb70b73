//! End-to-end flows through the hub, driven the way a transport would.

use chathub_core::{outbox, Hub, HubConfig, HubError, Outbound, DEFAULT_ROOM};
use chathub_protocol::{ClientEvent, Scope, ServerEvent};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

/// A connected client: its id, display name and outbound queue.
struct Client {
    id: String,
    name: String,
    rx: UnboundedReceiver<Outbound>,
}

impl Client {
    fn connect(hub: &Hub, id: &str) -> Self {
        let (tx, rx) = outbox();
        let session = hub.connect(id, tx).unwrap();
        Self {
            id: session.id,
            name: session.name,
            rx,
        }
    }

    fn events(&mut self) -> Vec<ServerEvent> {
        let mut out = Vec::new();
        while let Ok(Outbound::Event(event)) = self.rx.try_recv() {
            out.push((*event).clone());
        }
        out
    }

    fn chat_bodies(&mut self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ServerEvent::Message(msg) => Some(msg.body),
                _ => None,
            })
            .collect()
    }
}

fn hub() -> Hub {
    Hub::new(HubConfig {
        heartbeat_interval: Duration::ZERO,
        ..HubConfig::default()
    })
}

#[test]
fn test_hello_reaches_room_and_history() {
    let hub = hub();
    let mut a = Client::connect(&hub, "a0000001");
    let mut b = Client::connect(&hub, "b0000002");
    a.events();
    b.events();

    hub.handle(&a.id, ClientEvent::send_message("hello")).unwrap();

    let history = hub.history(DEFAULT_ROOM);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].body, "hello");
    assert_eq!(history[0].sender, a.name);
    assert_eq!(history[0].scope, Scope::Broadcast);

    match b.events().as_slice() {
        [ServerEvent::Message(msg)] => assert_eq!(msg.body, "hello"),
        other => panic!("Expected nhan-tin-nhan, got {:?}", other),
    }
    // The sender is a room member too.
    assert_eq!(a.chat_bodies(), vec!["hello"]);
}

#[test]
fn test_sixth_message_in_burst_is_rate_limited() {
    let hub = hub();
    let mut a = Client::connect(&hub, "a0000001");
    let mut b = Client::connect(&hub, "b0000002");
    a.events();
    b.events();

    for i in 0..5u64 {
        let text = serde_json::json!(format!("m{i}"));
        hub.send_message_at(&a.id, Some(&text), 1_000 + i * 100)
            .unwrap();
    }
    let sixth = serde_json::json!("m5");
    let err = hub
        .send_message_at(&a.id, Some(&sixth), 1_450)
        .unwrap_err();
    assert!(matches!(err, HubError::RateLimited));
    assert!(err.to_string().contains("rate limit"));

    assert_eq!(hub.history(DEFAULT_ROOM).len(), 5);
    assert_eq!(b.chat_bodies(), vec!["m0", "m1", "m2", "m3", "m4"]);

    // After the window the sender may speak again.
    hub.send_message_at(&a.id, Some(&sixth), 2_500).unwrap();
    assert_eq!(b.chat_bodies(), vec!["m5"]);
}

#[test]
fn test_rate_limit_is_reported_as_loi() {
    let hub = hub();
    let mut a = Client::connect(&hub, "a0000001");
    let mut b = Client::connect(&hub, "b0000002");

    for i in 0..6 {
        let _ = hub.handle(&a.id, ClientEvent::send_message(format!("burst {i}")));
    }

    let errors: Vec<_> = a
        .events()
        .into_iter()
        .filter_map(|event| match event {
            ServerEvent::Error(text) => Some(text),
            _ => None,
        })
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("rate limit"));
    let delivered = b.chat_bodies();
    assert_eq!(delivered.len(), 5);
    assert!(!delivered.iter().any(|body| body == "burst 5"));

    let history = hub.history(DEFAULT_ROOM);
    assert_eq!(history.len(), 5);
    assert!(history.iter().all(|msg| msg.body != "burst 5"));
}

#[test]
fn test_direct_to_unknown_recipient() {
    let hub = hub();
    let mut a = Client::connect(&hub, "a0000001");
    let mut b = Client::connect(&hub, "b0000002");
    a.events();
    b.events();

    let result = hub.handle(&a.id, ClientEvent::send_direct("NguoiDung_nobody", "hi"));
    assert!(matches!(result, Err(HubError::RecipientNotFound(_))));

    match a.events().as_slice() {
        [ServerEvent::Error(text)] => assert!(text.contains("recipient not found")),
        other => panic!("Expected loi, got {:?}", other),
    }
    assert!(b.events().is_empty());
}

#[test]
fn test_direct_message_reaches_recipient_and_echoes() {
    let hub = hub();
    let mut a = Client::connect(&hub, "a0000001");
    let mut b = Client::connect(&hub, "b0000002");
    let mut c = Client::connect(&hub, "c0000003");
    hub.join_room(&b.id, "lobby").unwrap();
    a.events();
    b.events();
    c.events();

    hub.handle(&a.id, ClientEvent::send_direct(b.name.clone(), "psst"))
        .unwrap();

    for client in [&mut a, &mut b] {
        match client.events().as_slice() {
            [ServerEvent::Message(msg)] => {
                assert_eq!(msg.body, "psst");
                assert_eq!(msg.scope, Scope::Direct);
            }
            other => panic!("Expected direct message, got {:?}", other),
        }
    }
    assert!(c.events().is_empty());
    assert!(hub.history(DEFAULT_ROOM).is_empty());
    assert!(hub.history("lobby").is_empty());
}

#[test]
fn test_disconnect_notifies_everyone_left() {
    let hub = hub();
    let a = Client::connect(&hub, "a0000001");
    let mut b = Client::connect(&hub, "b0000002");
    let mut c = Client::connect(&hub, "c0000003");
    b.events();
    c.events();

    hub.disconnect(&a.id);

    let remaining = vec![b.name.clone(), c.name.clone()];
    for client in [&mut b, &mut c] {
        let events = client.events();
        assert!(events.contains(&ServerEvent::Notice(format!("{} left the chat", a.name))));
        match events.last() {
            Some(ServerEvent::OnlineList(names)) => {
                assert!(!names.contains(&a.name));
                assert_eq!(names, &remaining);
            }
            other => panic!("Expected danh-sach-online, got {:?}", other),
        }
    }
    assert!(hub.members(DEFAULT_ROOM).iter().all(|id| id != &a.id));

    // A second disconnect for the same id is a no-op.
    assert!(hub.disconnect(&a.id).is_none());
    assert!(b.events().is_empty());
}

#[test]
fn test_broadcast_after_room_switch_reaches_new_room_only() {
    let hub = hub();
    let mut a = Client::connect(&hub, "a0000001");
    let mut old_peer = Client::connect(&hub, "b0000002");
    let mut new_peer = Client::connect(&hub, "c0000003");
    hub.join_room(&new_peer.id, "lobby").unwrap();

    hub.handle(&a.id, ClientEvent::JoinRoom("lobby".into()))
        .unwrap();
    old_peer.events();
    new_peer.events();

    hub.handle(&a.id, ClientEvent::send_message("moved")).unwrap();

    assert_eq!(new_peer.chat_bodies(), vec!["moved"]);
    assert!(old_peer.chat_bodies().is_empty());
    assert_eq!(hub.history("lobby").len(), 1);
    assert!(hub.history(DEFAULT_ROOM).is_empty());
    assert!(a
        .events()
        .contains(&ServerEvent::Notice("You joined room lobby".into())));
}

#[test]
fn test_newcomer_receives_recent_history() {
    let hub = hub();
    let a = Client::connect(&hub, "a0000001");

    for i in 0..60u64 {
        let text = serde_json::json!(format!("m{i}"));
        // Spaced out so the rate limiter never bites.
        hub.send_message_at(&a.id, Some(&text), i * 1_000).unwrap();
    }

    let mut late = Client::connect(&hub, "d0000004");
    match late.events().first() {
        Some(ServerEvent::History(messages)) => {
            assert_eq!(messages.len(), 50);
            assert_eq!(messages[0].body, "m10");
            assert_eq!(messages[49].body, "m59");
        }
        other => panic!("Expected lich-su-tin-nhan first, got {:?}", other),
    }
}

#[test]
fn test_joined_notice_goes_to_others_only() {
    let hub = hub();
    let mut a = Client::connect(&hub, "a0000001");
    a.events();

    let mut b = Client::connect(&hub, "b0000002");

    assert!(a
        .events()
        .contains(&ServerEvent::Notice(format!("{} joined the chat", b.name))));
    assert!(!b
        .events()
        .iter()
        .any(|e| matches!(e, ServerEvent::Notice(_))));
}
