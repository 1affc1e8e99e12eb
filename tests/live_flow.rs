//! Integration tests for the live session: handshake, serial dispatch,
//! admission control, image turns, tool calls, and failure draining.

use std::sync::Arc;

use serde_json::json;

use calpal::live::{
    CapturedImage, CompressionQuality, ImageFormat, SendError, SessionState, TransportEvent,
};

mod common;

use common::{settle, test_config, FailingEncoder, Harness};

// ============================================================================
// Handshake
// ============================================================================

#[tokio::test]
async fn test_setup_frame_sent_on_connect() {
    let mut harness = Harness::connect();

    let setup = harness.next_sent().await;
    assert_eq!(
        setup["setup"]["model"],
        "models/gemini-2.0-flash-live-preview-04-09"
    );
    assert_eq!(
        setup["setup"]["generation_config"]["responseModalities"][0],
        "TEXT"
    );
    assert_eq!(setup["setup"]["generation_config"]["temperature"], 1.0);
}

#[tokio::test]
async fn test_session_ready_after_setup_ack() {
    let mut harness = Harness::connect();
    harness.ack_setup().await;
    assert_eq!(*harness.events.state.borrow(), SessionState::Ready);
}

// ============================================================================
// Text Turns
// ============================================================================

#[tokio::test]
async fn test_text_turn_accumulates_fragments() {
    let mut harness = Harness::connect();
    harness.ack_setup().await;

    let client = harness.client.clone();
    let task = tokio::spawn(async move { client.send_text("what did I eat?").await });

    let frame = harness.next_sent().await;
    assert_eq!(
        frame["client_content"]["turns"][0]["parts"][0]["text"],
        "what did I eat?"
    );
    assert_eq!(frame["client_content"]["turn_complete"], true);

    harness.inject_text("Looks like ", false).await;
    harness.inject_text("a salad.", true).await;

    assert_eq!(task.await.unwrap().unwrap(), "Looks like a salad.");
}

#[tokio::test]
async fn test_requests_dispatch_serially_in_order() {
    let mut harness = Harness::connect();

    // Queue three turns before the session is ready; none may dispatch yet.
    let mut tasks = Vec::new();
    for text in ["first", "second", "third"] {
        let client = harness.client.clone();
        tasks.push(tokio::spawn(
            async move { client.send_text(text).await },
        ));
        settle().await;
    }

    harness.ack_setup().await;

    for (i, expected) in ["first", "second", "third"].iter().enumerate() {
        let frame = harness.next_sent().await;
        assert_eq!(
            frame["client_content"]["turns"][0]["parts"][0]["text"],
            *expected
        );

        // Exactly one request in flight: nothing else was sent.
        settle().await;
        assert!(harness.sent.try_recv().is_err());

        harness.inject_text(&format!("reply {i}"), true).await;
    }

    for (i, task) in tasks.into_iter().enumerate() {
        assert_eq!(task.await.unwrap().unwrap(), format!("reply {i}"));
    }
}

// ============================================================================
// Admission Control
// ============================================================================

#[tokio::test]
async fn test_queue_full_rejects_new_requests() {
    let mut harness = Harness::connect();

    // Fill the queue while the handshake is still outstanding.
    for i in 0..5 {
        let client = harness.client.clone();
        tokio::spawn(async move { client.send_text(format!("queued {i}")).await });
        settle().await;
    }

    let err = harness.client.send_text("one too many").await.unwrap_err();
    assert_eq!(err, SendError::QueueFull { max: 5 });

    // The queued requests survive the rejection.
    harness.ack_setup().await;
    let frame = harness.next_sent().await;
    assert_eq!(
        frame["client_content"]["turns"][0]["parts"][0]["text"],
        "queued 0"
    );
}

// ============================================================================
// Image Turns
// ============================================================================

#[tokio::test]
async fn test_image_turn_sends_caption_and_inline_data() {
    let mut harness = Harness::connect();
    harness.ack_setup().await;

    let client = harness.client.clone();
    let task = tokio::spawn(async move {
        client
            .send_image(
                CapturedImage::from_bytes(vec![1, 2, 3]),
                Some("my lunch".to_string()),
                CompressionQuality::High,
                ImageFormat::Jpeg,
            )
            .await
    });

    let frame = harness.next_sent().await;
    let parts = &frame["client_content"]["turns"][0]["parts"];
    assert_eq!(parts[0]["text"], "my lunch");
    assert_eq!(parts[1]["inline_data"]["mime_type"], "image/jpeg");
    assert_eq!(parts[1]["inline_data"]["data"], "AQID");

    harness.inject_text("About 600 calories.", true).await;
    assert_eq!(task.await.unwrap().unwrap(), "About 600 calories.");
}

#[tokio::test]
async fn test_encode_failure_rejects_turn_and_advances_queue() {
    let mut harness = Harness::connect_with(test_config(), Arc::new(FailingEncoder));
    harness.ack_setup().await;

    let client = harness.client.clone();
    let image_task = tokio::spawn(async move {
        client
            .send_image(
                CapturedImage::from_bytes(vec![9, 9, 9]),
                None,
                CompressionQuality::Low,
                ImageFormat::Png,
            )
            .await
    });
    settle().await;

    let client = harness.client.clone();
    let text_task = tokio::spawn(async move { client.send_text("still alive?").await });

    // The image turn fails locally; only the text turn reaches the wire.
    let err = image_task.await.unwrap().unwrap_err();
    assert!(matches!(err, SendError::Encode(_)));

    let frame = harness.next_sent().await;
    assert_eq!(
        frame["client_content"]["turns"][0]["parts"][0]["text"],
        "still alive?"
    );

    harness.inject_text("yes", true).await;
    assert_eq!(text_task.await.unwrap().unwrap(), "yes");
}

// ============================================================================
// Tool Calls
// ============================================================================

#[tokio::test]
async fn test_tool_call_forwarded_and_response_sent() {
    let mut harness = Harness::connect();
    harness.ack_setup().await;

    harness
        .inject(json!({
            "toolCall": {
                "functionCalls": [
                    {"name": "get_calorie_total", "args": {"period": "today"}}
                ]
            }
        }))
        .await;

    let call = harness.events.tool_calls.recv().await.unwrap();
    assert_eq!(call.name, "get_calorie_total");
    assert_eq!(call.arguments["period"], "today");

    harness
        .client
        .send_function_response(call.name, json!({"content": "1450"}))
        .await
        .unwrap();

    let frame = harness.next_sent().await;
    let fr = &frame["tool_response"]["function_responses"][0];
    assert_eq!(fr["name"], "get_calorie_total");
    assert_eq!(fr["response"]["content"], "1450");
}

// ============================================================================
// Realtime Input
// ============================================================================

#[tokio::test]
async fn test_realtime_input_bypasses_queue() {
    let mut harness = Harness::connect();
    harness.ack_setup().await;

    harness
        .client
        .send_realtime_input("AAAA", "audio/pcm")
        .await
        .unwrap();

    let frame = harness.next_sent().await;
    let chunk = &frame["realtime_input"]["media_chunks"][0];
    assert_eq!(chunk["mime_type"], "audio/pcm");
    assert_eq!(chunk["data"], "AAAA");
}

#[tokio::test]
async fn test_realtime_input_refused_before_ready() {
    let mut harness = Harness::connect();
    let _setup = harness.next_sent().await;

    let err = harness
        .client
        .send_realtime_input("AAAA", "audio/pcm")
        .await
        .unwrap_err();
    assert_eq!(err, SendError::NotReady(SessionState::AwaitingSetupAck));

    settle().await;
    assert!(harness.sent.try_recv().is_err());
}

// ============================================================================
// Failure Draining
// ============================================================================

#[tokio::test]
async fn test_connection_failure_drains_pending_and_queued() {
    let mut harness = Harness::connect();
    harness.ack_setup().await;

    // One dispatched turn plus one queued behind it.
    let client = harness.client.clone();
    let in_flight = tokio::spawn(async move { client.send_text("dispatched").await });
    let _frame = harness.next_sent().await;

    let client = harness.client.clone();
    let queued = tokio::spawn(async move { client.send_text("queued").await });
    settle().await;

    harness
        .server
        .send(TransportEvent::Failed {
            reason: "socket reset".to_string(),
        })
        .await
        .unwrap();

    let err = in_flight.await.unwrap().unwrap_err();
    assert!(matches!(err, SendError::Connection(_)));
    let err = queued.await.unwrap().unwrap_err();
    assert!(matches!(err, SendError::Connection(_)));

    harness.wait_for_state(SessionState::Error).await;

    // The failure is sticky: later sends are rejected with the same reason.
    let err = harness.client.send_text("after failure").await.unwrap_err();
    assert!(matches!(err, SendError::Connection(_)));
}

#[tokio::test]
async fn test_close_rejects_outstanding_requests() {
    let mut harness = Harness::connect();
    let _setup = harness.next_sent().await;

    // Queued but never dispatched; the session closes underneath it.
    let client = harness.client.clone();
    let queued = tokio::spawn(async move { client.send_text("never sent").await });
    settle().await;

    harness.client.close().await.unwrap();
    harness.wait_for_state(SessionState::Closed).await;

    let err = queued.await.unwrap().unwrap_err();
    assert!(matches!(err, SendError::Closed(_)));

    let err = harness.client.send_text("after close").await.unwrap_err();
    assert!(matches!(err, SendError::Closed(_)));
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let mut harness = Harness::connect();
    harness.ack_setup().await;

    // A request that resolves before the close must stay resolved.
    let client = harness.client.clone();
    let task = tokio::spawn(async move { client.send_text("ping").await });
    let _frame = harness.next_sent().await;
    harness.inject_text("pong", true).await;
    assert_eq!(task.await.unwrap().unwrap(), "pong");

    harness.client.close().await.unwrap();
    harness.client.close().await.unwrap();
    harness.wait_for_state(SessionState::Closed).await;

    // A third close after the terminal state is still accepted quietly.
    harness.client.close().await.unwrap();
    settle().await;
    assert_eq!(*harness.events.state.borrow(), SessionState::Closed);
}

// ============================================================================
// Robustness
// ============================================================================

#[tokio::test]
async fn test_malformed_server_frame_is_ignored() {
    let mut harness = Harness::connect();
    harness.ack_setup().await;

    harness
        .server
        .send(TransportEvent::Frame("not json at all".to_string()))
        .await
        .unwrap();

    let client = harness.client.clone();
    let task = tokio::spawn(async move { client.send_text("still fine").await });

    let _frame = harness.next_sent().await;
    harness.inject_text("ok", true).await;
    assert_eq!(task.await.unwrap().unwrap(), "ok");
}

#[tokio::test]
async fn test_stray_server_content_without_pending_is_noop() {
    let mut harness = Harness::connect();
    harness.ack_setup().await;

    harness.inject_text("unsolicited", true).await;
    settle().await;

    // Session is still usable afterwards.
    let client = harness.client.clone();
    let task = tokio::spawn(async move { client.send_text("hello").await });
    let _frame = harness.next_sent().await;
    harness.inject_text("world", true).await;
    assert_eq!(task.await.unwrap().unwrap(), "world");
}
