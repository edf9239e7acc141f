//! Integration tests for the controller event loop
//!
//! Each test drives `ChatController::run` with a `FakeTransport` for the
//! realtime channel and a wiremock server for the REST endpoints. A driver
//! future plays the user and the server side: it sends commands, waits for
//! the frames the client emits, and injects server events.

use std::sync::Arc;
use std::time::Duration;

use chatwire::protocol::{ChatId, ChatType, MessageId, OutboundEvent};
use chatwire::reconciler::MessageStatus;
use chatwire::store::LastChatStore;
use chatwire::transport::{FakeTransport, FakeTransportHandle};
use chatwire::{ChatController, ControllerCommand, Effect};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wiremock::MockServer;

mod common;
use common::RecordingView;

type Commands = mpsc::Sender<ControllerCommand>;

struct Harness {
    controller: ChatController<RecordingView>,
    transport: Arc<FakeTransport>,
    handle: FakeTransportHandle,
}

async fn harness(server: &MockServer) -> Harness {
    let (transport, handle) = FakeTransport::new();
    let transport = Arc::new(transport);
    let controller = ChatController::new(
        transport.clone(),
        common::api_for(server),
        LastChatStore::disabled(),
        RecordingView::default(),
        ChatType::General,
    );
    Harness {
        controller,
        transport,
        handle,
    }
}

/// Wait for the next frame the client sends and decode it.
async fn next_sent(handle: &mut FakeTransportHandle) -> OutboundEvent {
    let frame = tokio::time::timeout(Duration::from_secs(5), handle.outbound_rx.recv())
        .await
        .expect("timed out waiting for an outbound frame")
        .expect("outbound channel closed");
    serde_json::from_str(&frame).expect("client sent an undecodable frame")
}

async fn command(tx: &Commands, command: ControllerCommand) {
    tx.send(command).await.expect("controller stopped early");
}

fn chunk(chat_id: u64, message_id: u64, text: &str) -> serde_json::Value {
    json!({
        "event": "response_chunk",
        "data": {"chat_id": chat_id, "message_id": message_id, "chunk": text}
    })
}

fn complete(chat_id: u64, message_id: u64) -> serde_json::Value {
    json!({
        "event": "response_complete",
        "data": {"chat_id": chat_id, "message_id": message_id}
    })
}

#[tokio::test]
async fn test_reply_streams_through_event_loop() {
    let server = MockServer::start().await;
    common::mount_history(&server, "1", json!([])).await;
    let Harness {
        mut controller,
        transport,
        mut handle,
    } = harness(&server).await;
    let (tx, rx) = mpsc::channel(8);

    let driver = async move {
        command(&tx, ControllerCommand::Open(ChatId::new("1"))).await;
        assert_eq!(
            next_sent(&mut handle).await,
            OutboundEvent::JoinChat {
                chat_id: ChatId::new("1")
            }
        );

        command(&tx, ControllerCommand::Send("play something calm".to_string())).await;
        assert_eq!(
            next_sent(&mut handle).await,
            OutboundEvent::SendMessage {
                chat_id: ChatId::new("1"),
                content: "play something calm".to_string(),
                chat_type: ChatType::General,
            }
        );

        transport
            .inject(json!({
                "event": "new_message",
                "data": {
                    "id": 10,
                    "chat_id": 1,
                    "content": "play something calm",
                    "timestamp": "2024-05-01T09:30:00.123456",
                    "is_user": true
                }
            }))
            .unwrap();
        transport.inject(chunk(1, 11, "Here is ")).unwrap();
        transport.inject(chunk(1, 11, "a playlist")).unwrap();
        transport.inject(complete(1, 11)).unwrap();
        drop(tx);
    };

    let (result, ()) = tokio::join!(controller.run(rx, CancellationToken::new()), driver);
    result.unwrap();

    let reconciler = controller.reconciler();
    let messages = reconciler.messages();
    assert_eq!(messages.len(), 2);
    assert!(messages[0].is_user);
    assert_eq!(messages[1].id, MessageId::new("11"));
    assert_eq!(messages[1].content, "Here is a playlist");

    let reply = reconciler.message(&MessageId::new("11")).unwrap();
    assert_eq!(reply.status(), MessageStatus::Complete);
    assert!(!reconciler.session().is_generating);

    let effects = &controller.view().effects;
    assert!(effects.contains(&Effect::GeneratingChanged(true)));
    assert!(effects.contains(&Effect::GeneratingChanged(false)));
    assert!(effects.contains(&Effect::MessageUpdated {
        message_id: MessageId::new("11"),
        text: "Here is a playlist".to_string(),
    }));
}

#[tokio::test]
async fn test_chat_switch_discards_late_events_of_previous_chat() {
    let server = MockServer::start().await;
    common::mount_history(&server, "1", json!([])).await;
    common::mount_history(&server, "2", json!([])).await;
    let Harness {
        mut controller,
        transport,
        mut handle,
    } = harness(&server).await;
    let (tx, rx) = mpsc::channel(8);

    let driver = async move {
        command(&tx, ControllerCommand::Open(ChatId::new("1"))).await;
        next_sent(&mut handle).await;
        command(&tx, ControllerCommand::Send("hello".to_string())).await;
        next_sent(&mut handle).await;

        transport.inject(chunk(1, 11, "partial")).unwrap();
        command(&tx, ControllerCommand::Open(ChatId::new("2"))).await;
        assert_eq!(
            next_sent(&mut handle).await,
            OutboundEvent::LeaveChat {
                chat_id: ChatId::new("1")
            }
        );
        assert_eq!(
            next_sent(&mut handle).await,
            OutboundEvent::JoinChat {
                chat_id: ChatId::new("2")
            }
        );

        transport.inject(chunk(1, 11, " and late")).unwrap();
        transport.inject(complete(1, 11)).unwrap();
        drop(tx);
    };

    let (result, ()) = tokio::join!(controller.run(rx, CancellationToken::new()), driver);
    result.unwrap();

    let reconciler = controller.reconciler();
    assert_eq!(
        reconciler.session().active_chat_id,
        Some(ChatId::new("2"))
    );
    assert!(!reconciler.session().is_generating);
    assert!(reconciler.messages().is_empty());

    let abandoned = reconciler.message(&MessageId::new("11")).unwrap();
    assert_eq!(abandoned.text(), "partial");
    assert_eq!(abandoned.status(), MessageStatus::Streaming);
}

#[tokio::test]
async fn test_stop_seals_reply_and_ignores_late_chunks() {
    let server = MockServer::start().await;
    common::mount_history(&server, "1", json!([])).await;
    let Harness {
        mut controller,
        transport,
        mut handle,
    } = harness(&server).await;
    let (tx, rx) = mpsc::channel(8);

    let driver = async move {
        command(&tx, ControllerCommand::Open(ChatId::new("1"))).await;
        next_sent(&mut handle).await;
        command(&tx, ControllerCommand::Send("hello".to_string())).await;
        next_sent(&mut handle).await;

        transport.inject(chunk(1, 11, "Hel")).unwrap();
        command(&tx, ControllerCommand::Stop).await;
        assert_eq!(
            next_sent(&mut handle).await,
            OutboundEvent::StopGeneration {
                chat_id: ChatId::new("1")
            }
        );

        // A second stop has nothing to stop.
        command(&tx, ControllerCommand::Stop).await;

        transport.inject(chunk(1, 11, "lo")).unwrap();
        transport.inject(complete(1, 11)).unwrap();
        drop(tx);
        handle
    };

    let (result, mut handle) =
        tokio::join!(controller.run(rx, CancellationToken::new()), driver);
    result.unwrap();

    assert!(handle.sent_events().is_empty());
    let reply = controller
        .reconciler()
        .message(&MessageId::new("11"))
        .unwrap();
    assert_eq!(reply.text(), "Hel");
    assert_eq!(reply.status(), MessageStatus::Complete);
    assert_eq!(controller.reconciler().messages()[0].content, "Hel");
}

#[tokio::test]
async fn test_stop_before_first_chunk_keeps_reply_stopped() {
    let server = MockServer::start().await;
    common::mount_history(&server, "1", json!([])).await;
    let Harness {
        mut controller,
        transport,
        mut handle,
    } = harness(&server).await;
    let (tx, rx) = mpsc::channel(8);

    let driver = async move {
        command(&tx, ControllerCommand::Open(ChatId::new("1"))).await;
        next_sent(&mut handle).await;
        command(&tx, ControllerCommand::Send("hello".to_string())).await;
        next_sent(&mut handle).await;

        command(&tx, ControllerCommand::Stop).await;
        assert_eq!(
            next_sent(&mut handle).await,
            OutboundEvent::StopGeneration {
                chat_id: ChatId::new("1")
            }
        );

        transport.inject(chunk(1, 11, "too late")).unwrap();
        transport.inject(complete(1, 11)).unwrap();
        drop(tx);
    };

    let (result, ()) = tokio::join!(controller.run(rx, CancellationToken::new()), driver);
    result.unwrap();

    let reconciler = controller.reconciler();
    assert!(!reconciler.session().is_generating);
    assert!(reconciler.messages().is_empty());
    let reply = reconciler.message(&MessageId::new("11")).unwrap();
    assert_eq!(reply.status(), MessageStatus::Complete);
    assert_eq!(reply.text(), "");
    assert_eq!(
        controller
            .view()
            .effects
            .iter()
            .filter(|e| **e == Effect::GeneratingChanged(true))
            .count(),
        1
    );
}

#[tokio::test]
async fn test_generation_error_is_shown_and_session_recovers() {
    let server = MockServer::start().await;
    common::mount_history(&server, "1", json!([])).await;
    let Harness {
        mut controller,
        transport,
        mut handle,
    } = harness(&server).await;
    let (tx, rx) = mpsc::channel(8);

    let driver = async move {
        command(&tx, ControllerCommand::Open(ChatId::new("1"))).await;
        next_sent(&mut handle).await;
        command(&tx, ControllerCommand::Send("first".to_string())).await;
        next_sent(&mut handle).await;

        transport
            .inject(json!({
                "event": "error",
                "data": {"chat_id": 1, "error": "model overloaded"}
            }))
            .unwrap();

        command(&tx, ControllerCommand::Send("second".to_string())).await;
        assert!(matches!(
            next_sent(&mut handle).await,
            OutboundEvent::SendMessage { content, .. } if content == "second"
        ));
        drop(tx);
    };

    let (result, ()) = tokio::join!(controller.run(rx, CancellationToken::new()), driver);
    result.unwrap();

    let messages = controller.reconciler().messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].is_error);
    assert_eq!(messages[0].content, "Error: model overloaded");
    // The second send is in flight again.
    assert!(controller.reconciler().session().is_generating);
}

#[tokio::test]
async fn test_events_before_any_chat_is_opened_are_ignored() {
    let server = MockServer::start().await;
    let Harness {
        mut controller,
        transport,
        handle: _handle,
    } = harness(&server).await;
    let (tx, rx) = mpsc::channel(8);

    transport.inject(chunk(1, 11, "nobody listening")).unwrap();
    transport
        .inject(json!({"event": "presence", "data": {"user": "x"}}))
        .unwrap();
    drop(tx);

    controller
        .run(rx, CancellationToken::new())
        .await
        .unwrap();

    assert!(controller.view().effects.is_empty());
    assert!(controller.reconciler().message(&MessageId::new("11")).is_none());
}
