// End-to-end session flows driven through the fake transport.
//
// Covers the event sequences a caller observes for plain fetches,
// redirects, auth challenges, cancellation, and the backpressure and
// idempotence guarantees around chunk acknowledgment.

use netload::fake_transport::{FakeTransportBuilder, FakeTransportController, response_head};
use netload::protocol::{
    AuthDecision, FailureKind, Method, Outcome, RedirectDecision, RequestDescriptor,
    SessionOptions,
};
use netload::session::{Phase, RequestSession, SessionEvent, SessionHandle};
use netload::{Error, FakeTransport};

fn get(url: &str) -> RequestDescriptor {
    RequestDescriptor::new(Method::Get, url)
}

fn start_session(
    descriptor: RequestDescriptor,
    options: SessionOptions,
) -> (SessionHandle, FakeTransportController, FakeTransport) {
    let (transport, controller) = FakeTransportBuilder::new().build();
    let handle = RequestSession::start(&transport, descriptor, options)
        .expect("session should start against the fake transport");
    (handle, controller, transport)
}

#[tokio::test]
async fn scenario_plain_fetch_delivers_head_body_completion() {
    let (mut handle, controller, _transport) =
        start_session(get("https://example.com/data"), SessionOptions::default());

    controller.respond(response_head(200, "https://example.com/data"));
    let resumed = controller.chunk(b"ten bytes!");

    match handle.next_event().await {
        Some(SessionEvent::ResponseStarted { head }) => assert_eq!(head.status, 200),
        other => panic!("expected response head, got {other:?}"),
    }
    match handle.next_event().await {
        Some(SessionEvent::Data { chunk }) => assert_eq!(chunk.len(), 10),
        other => panic!("expected body chunk, got {other:?}"),
    }

    handle.acknowledge_chunk();
    resumed.await.expect("acknowledgment should fire the resume");

    controller.complete(true);
    match handle.next_event().await {
        Some(SessionEvent::Complete { outcome }) => assert!(outcome.is_success()),
        other => panic!("expected completion, got {other:?}"),
    }
    assert_eq!(handle.phase(), Phase::Completed);
    assert!(handle.next_event().await.is_none());
}

#[tokio::test]
async fn scenario_redirect_waits_for_decision_then_finishes() {
    let (mut handle, controller, _transport) =
        start_session(get("https://example.com/old"), SessionOptions::default());

    let decision_rx = controller.redirect("https://example.com/new", 302);

    let responder = match handle.next_event().await {
        Some(SessionEvent::Redirect {
            info, responder, ..
        }) => {
            assert_eq!(info.new_url, "https://example.com/new");
            assert_eq!(info.status, 302);
            responder
        }
        other => panic!("expected redirect, got {other:?}"),
    };
    assert_eq!(handle.phase(), Phase::Redirected);

    responder.respond(RedirectDecision::follow().remove_header("authorization"));
    let decision = decision_rx
        .await
        .expect("transport should receive the redirect decision");
    assert_eq!(decision.removed_headers, vec!["authorization"]);

    controller.respond(response_head(200, "https://example.com/new"));
    controller.complete(true);

    assert!(matches!(
        handle.next_event().await,
        Some(SessionEvent::ResponseStarted { .. })
    ));
    match handle.next_event().await {
        Some(SessionEvent::Complete { outcome }) => assert!(outcome.is_success()),
        other => panic!("expected completion, got {other:?}"),
    }
}

#[tokio::test]
async fn scenario_auth_challenge_resolved_by_id() {
    let (mut handle, controller, _transport) =
        start_session(get("https://example.com/secret"), SessionOptions::default());

    let auth_rx = controller.challenge("https://example.com/secret", false);

    match handle.next_event().await {
        Some(SessionEvent::AuthRequired { challenge }) => {
            assert!(challenge.first_attempt);
            assert!(!challenge.is_proxy);
        }
        other => panic!("expected auth challenge, got {other:?}"),
    }
    assert_eq!(handle.phase(), Phase::AwaitingAuth);

    let decision = AuthDecision::Credentials {
        username: "user".to_string(),
        password: "hunter2".to_string(),
    };
    netload::resolve_auth(handle.id(), decision.clone()).expect("resolution should succeed");
    assert_eq!(auth_rx.await.unwrap(), decision);
    assert_eq!(handle.phase(), Phase::Started);

    controller.respond(response_head(200, "https://example.com/secret"));
    controller.complete(true);

    assert!(matches!(
        handle.next_event().await,
        Some(SessionEvent::ResponseStarted { .. })
    ));
    match handle.next_event().await {
        Some(SessionEvent::Complete { outcome }) => assert!(outcome.is_success()),
        other => panic!("expected completion, got {other:?}"),
    }
}

#[tokio::test]
async fn sequential_challenges_are_resolved_one_at_a_time() -> anyhow::Result<()> {
    let (mut handle, controller, _transport) =
        start_session(get("https://example.com"), SessionOptions::default());

    let proxy_rx = controller.challenge("https://proxy.internal", true);
    assert!(matches!(
        handle.next_event().await,
        Some(SessionEvent::AuthRequired { .. })
    ));
    netload::resolve_auth(handle.id(), AuthDecision::Cancel)?;
    assert_eq!(proxy_rx.await?, AuthDecision::Cancel);

    let origin_rx = controller.challenge("https://example.com", false);
    assert!(matches!(
        handle.next_event().await,
        Some(SessionEvent::AuthRequired { .. })
    ));
    let creds = AuthDecision::Credentials {
        username: "u".to_string(),
        password: "p".to_string(),
    };
    netload::resolve_auth(handle.id(), creds.clone())?;
    assert_eq!(origin_rx.await?, creds);

    controller.respond(response_head(200, "https://example.com"));
    controller.complete(true);
    assert!(matches!(
        handle.next_event().await,
        Some(SessionEvent::ResponseStarted { .. })
    ));
    assert!(matches!(
        handle.next_event().await,
        Some(SessionEvent::Complete { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn scenario_cancel_midstream_discards_pending_resume() {
    let (mut handle, controller, _transport) =
        start_session(get("https://example.com/stream"), SessionOptions::default());

    controller.respond(response_head(200, "https://example.com/stream"));
    let resumed = controller.chunk(b"first");

    assert!(matches!(
        handle.next_event().await,
        Some(SessionEvent::ResponseStarted { .. })
    ));
    assert!(matches!(
        handle.next_event().await,
        Some(SessionEvent::Data { .. })
    ));

    handle.cancel();
    assert!(controller.was_cancelled());
    assert!(
        resumed.await.is_err(),
        "cancellation must drop the resume capability without firing it"
    );

    // Anything the transport sends after the teardown is ignored.
    let late = controller.chunk(b"second");
    controller.complete(true);

    match handle.next_event().await {
        Some(SessionEvent::Complete { outcome }) => assert!(outcome.is_cancelled()),
        other => panic!("expected cancelled completion, got {other:?}"),
    }
    assert!(handle.next_event().await.is_none());
    assert!(late.await.is_err());
    assert_eq!(handle.phase(), Phase::Cancelled);
}

#[tokio::test]
async fn scenario_unknown_session_auth_resolution_fails_cleanly() {
    let err = netload::resolve_auth(u32::MAX, AuthDecision::Cancel).unwrap_err();
    assert!(matches!(err, Error::UnknownSession { .. }));
}

#[tokio::test]
async fn resolve_auth_without_pending_challenge_fails() {
    let (handle, _controller, _transport) =
        start_session(get("https://example.com"), SessionOptions::default());

    let err = handle.resolve_auth(AuthDecision::Cancel).unwrap_err();
    assert!(matches!(err, Error::NotAwaitingAuth { .. }));
    handle.cancel();
}

#[tokio::test]
async fn backpressure_withholds_resume_until_acknowledged() {
    let (mut handle, controller, _transport) =
        start_session(get("https://example.com/big"), SessionOptions::default());

    controller.respond(response_head(200, "https://example.com/big"));
    let mut resumed = controller.chunk(b"chunk-1");

    assert!(matches!(
        handle.next_event().await,
        Some(SessionEvent::ResponseStarted { .. })
    ));
    assert!(matches!(
        handle.next_event().await,
        Some(SessionEvent::Data { .. })
    ));

    // The chunk has been forwarded but not acknowledged; the transport
    // must still be suspended.
    assert!(resumed.try_recv().is_err());

    handle.acknowledge_chunk();
    resumed.await.expect("resume should fire on acknowledgment");

    let second = controller.chunk(b"chunk-2");
    assert!(matches!(
        handle.next_event().await,
        Some(SessionEvent::Data { .. })
    ));
    handle.acknowledge_chunk();
    second.await.expect("second resume should fire");

    controller.complete(true);
    assert!(matches!(
        handle.next_event().await,
        Some(SessionEvent::Complete { .. })
    ));
}

#[tokio::test]
async fn acknowledge_without_pending_chunk_is_a_noop() {
    let (handle, controller, _transport) =
        start_session(get("https://example.com"), SessionOptions::default());

    handle.acknowledge_chunk();
    handle.acknowledge_chunk();
    assert_eq!(handle.phase(), Phase::Started);
    assert!(!controller.was_cancelled());
    handle.cancel();
}

#[tokio::test]
async fn cancel_is_idempotent() {
    let (mut handle, controller, _transport) =
        start_session(get("https://example.com"), SessionOptions::default());

    handle.cancel();
    handle.cancel();
    netload::cancel(handle.id());

    assert!(controller.was_cancelled());
    assert_eq!(handle.phase(), Phase::Cancelled);

    // Exactly one terminal event regardless of how many cancels raced in.
    assert!(matches!(
        handle.next_event().await,
        Some(SessionEvent::Complete { outcome }) if outcome.is_cancelled()
    ));
    assert!(handle.next_event().await.is_none());
}

#[tokio::test]
async fn late_acknowledge_after_cancel_is_a_noop() {
    let (mut handle, controller, _transport) =
        start_session(get("https://example.com"), SessionOptions::default());

    controller.respond(response_head(200, "https://example.com"));
    let resumed = controller.chunk(b"data");
    assert!(matches!(
        handle.next_event().await,
        Some(SessionEvent::ResponseStarted { .. })
    ));
    assert!(matches!(
        handle.next_event().await,
        Some(SessionEvent::Data { .. })
    ));

    handle.cancel();
    handle.acknowledge_chunk();

    assert!(resumed.await.is_err(), "cancelled resume must never fire");
    assert_eq!(handle.phase(), Phase::Cancelled);
}

#[tokio::test]
async fn transport_failure_is_classified() {
    let (mut handle, controller, _transport) =
        start_session(get("https://example.com"), SessionOptions::default());

    controller.fail(FailureKind::Network {
        message: "dns lookup failed".to_string(),
    });

    match handle.next_event().await {
        Some(SessionEvent::Complete { outcome }) => match outcome {
            Outcome::Failure {
                kind: FailureKind::Network { message },
            } => assert_eq!(message, "dns lookup failed"),
            other => panic!("expected network failure, got {other:?}"),
        },
        other => panic!("expected completion, got {other:?}"),
    }
    assert_eq!(handle.phase(), Phase::Failed);
    assert!(RequestSession::from_id(handle.id()).is_none());
}

#[tokio::test]
async fn retries_are_forwarded_while_live() {
    let (handle, controller, _transport) =
        start_session(get("https://example.com"), SessionOptions::default());

    let started = controller.retry();
    started
        .await
        .expect("live session should permit the retry");
    handle.cancel();
}

#[tokio::test]
async fn retries_are_suppressed_after_cancellation() {
    let (handle, controller, _transport) =
        start_session(get("https://example.com"), SessionOptions::default());

    handle.cancel();
    let started = controller.retry();
    assert!(
        started.await.is_err(),
        "cancelled session must drop the retry signal"
    );
}

#[tokio::test]
async fn retries_are_suppressed_by_options() {
    let (handle, controller, _transport) = start_session(
        get("https://example.com"),
        SessionOptions {
            forward_retries: false,
        },
    );

    let started = controller.retry();
    assert!(started.await.is_err());
    handle.cancel();
}

#[tokio::test]
async fn progress_events_are_monotonic() {
    let (mut handle, controller, _transport) =
        start_session(get("https://example.com"), SessionOptions::default());
    let session = RequestSession::from_id(handle.id()).expect("session is live");

    controller.download_progress(5);
    controller.download_progress(3);
    controller.download_progress(9);
    controller.upload_progress(7, 20);
    controller.upload_progress(2, 20);
    controller.complete(true);

    let mut download = Vec::new();
    let mut upload = Vec::new();
    while let Some(event) = handle.next_event().await {
        match event {
            SessionEvent::DownloadProgress { current } => download.push(current),
            SessionEvent::UploadProgress { position, .. } => upload.push(position),
            SessionEvent::Complete { .. } => break,
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(download, vec![5, 9]);
    assert_eq!(upload, vec![7]);
    assert_eq!(session.progress(), (7, 9));
}

#[tokio::test]
async fn data_before_response_head_is_dropped() {
    let (mut handle, controller, _transport) =
        start_session(get("https://example.com"), SessionOptions::default());

    let resumed = controller.chunk(b"premature");
    controller.respond(response_head(200, "https://example.com"));
    controller.complete(true);

    assert!(
        resumed.await.is_err(),
        "out-of-order chunk must not be consumed"
    );
    assert!(matches!(
        handle.next_event().await,
        Some(SessionEvent::ResponseStarted { .. })
    ));
    assert!(matches!(
        handle.next_event().await,
        Some(SessionEvent::Complete { .. })
    ));
}

#[tokio::test]
async fn dropped_handle_leaves_session_running_until_settled() {
    let (handle, controller, _transport) =
        start_session(get("https://example.com"), SessionOptions::default());
    let id = handle.id();
    drop(handle);

    assert!(
        RequestSession::from_id(id).is_some(),
        "pinned session must outlive the caller's handle"
    );

    controller.respond(response_head(200, "https://example.com"));
    controller.complete(true);

    // The dispatch task settles the session without any caller involved.
    for _ in 0..50 {
        if RequestSession::from_id(id).is_none() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("session was not released after completion");
}

#[tokio::test]
async fn completed_session_is_unreachable_by_id() {
    let (mut handle, controller, _transport) =
        start_session(get("https://example.com"), SessionOptions::default());
    let id = handle.id();

    controller.respond(response_head(200, "https://example.com"));
    controller.complete(true);

    assert!(matches!(
        handle.next_event().await,
        Some(SessionEvent::ResponseStarted { .. })
    ));
    assert!(matches!(
        handle.next_event().await,
        Some(SessionEvent::Complete { .. })
    ));

    assert!(RequestSession::from_id(id).is_none());
    netload::cancel(id);
    netload::acknowledge_chunk(id);
    assert!(netload::resolve_auth(id, AuthDecision::Cancel).is_err());
}

#[tokio::test]
async fn sessions_get_distinct_ids_and_independent_streams() {
    let (mut first, first_controller, _t1) =
        start_session(get("https://example.com/a"), SessionOptions::default());
    let (mut second, second_controller, _t2) =
        start_session(get("https://example.com/b"), SessionOptions::default());

    assert_ne!(first.id(), second.id());

    second_controller.respond(response_head(200, "https://example.com/b"));
    second_controller.complete(true);
    first_controller.respond(response_head(200, "https://example.com/a"));
    first_controller.complete(true);

    assert!(matches!(
        first.next_event().await,
        Some(SessionEvent::ResponseStarted { .. })
    ));
    assert!(matches!(
        second.next_event().await,
        Some(SessionEvent::ResponseStarted { .. })
    ));
    assert!(matches!(
        first.next_event().await,
        Some(SessionEvent::Complete { outcome }) if outcome.is_success()
    ));
    assert!(matches!(
        second.next_event().await,
        Some(SessionEvent::Complete { outcome }) if outcome.is_success()
    ));
}
