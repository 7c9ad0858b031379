
use canvas_cloud_client::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use test_helpers::{spawn_session_backend, ScriptedApi, Step};
use tokio::time::Instant;

fn every_second(timeout_secs: u64) -> PollOptions {
    PollOptions::fixed(Duration::from_secs(1), Duration::from_secs(timeout_secs))
}

// --- Terminal statuses ---

#[tokio::test(start_paused = true)]
async fn test_pending_running_succeeded_takes_three_queries() {
    let api = ScriptedApi::new(vec![
        Step::Status(TaskStatus::Pending),
        Step::Status(TaskStatus::Running),
        Step::Succeeded("https://oss.example/out.png"),
    ]);

    let mut seen = Vec::new();
    let task = poll_task(&api, "t-1", &every_second(60), |t| seen.push(t.status))
        .await
        .unwrap();

    assert_eq!(api.queries(), 3);
    assert_eq!(task.status, TaskStatus::Succeeded);
    assert_eq!(task.output_image_url.as_deref(), Some("https://oss.example/out.png"));
    assert_eq!(
        seen,
        vec![TaskStatus::Pending, TaskStatus::Running, TaskStatus::Succeeded]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_task_surfaces_server_error() {
    let api = ScriptedApi::new(vec![
        Step::Status(TaskStatus::Running),
        Step::Failed("InvalidParameter.ImageSize", "image too small"),
    ]);

    let err = poll_task(&api, "t-2", &every_second(60), |_| {})
        .await
        .unwrap_err();

    assert_eq!(api.queries(), 2);
    match err {
        ClientError::TaskFailed {
            task_id,
            code,
            message,
        } => {
            assert_eq!(task_id, "t-2");
            assert_eq!(code.as_deref(), Some("InvalidParameter.ImageSize"));
            assert_eq!(message.as_deref(), Some("image too small"));
        }
        other => panic!("expected TaskFailed, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_suspended_and_unknown_keep_polling() {
    let api = ScriptedApi::new(vec![
        Step::Status(TaskStatus::Suspended),
        Step::Status(TaskStatus::Running),
        Step::Status(TaskStatus::Unknown),
        Step::Succeeded("https://oss.example/b.png"),
    ]);

    let task = poll_task(&api, "t-3", &every_second(60), |_| {})
        .await
        .unwrap();
    assert_eq!(api.queries(), 4);
    assert!(task.is_terminal());
}

// --- Timeout ---

#[tokio::test(start_paused = true)]
async fn test_never_terminal_times_out() {
    let api = ScriptedApi::new(Vec::new()).with_fallback(TaskStatus::Running);

    let err = poll_task(&api, "t-4", &every_second(5), |_| {})
        .await
        .unwrap_err();

    match err {
        ClientError::PollTimeout {
            task_id,
            last_status,
            elapsed,
        } => {
            assert_eq!(task_id, "t-4");
            assert_eq!(last_status, TaskStatus::Running);
            assert!(elapsed >= Duration::from_secs(5));
        }
        other => panic!("expected PollTimeout, got {:?}", other),
    }

    // queries at t = 0, 1, 2, 3, 4, 5
    let issued = api.queries();
    assert_eq!(issued, 6);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(api.queries(), issued);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_query_is_cut_at_the_deadline() {
    let api = ScriptedApi::new(vec![
        Step::Status(TaskStatus::Running),
        Step::Slow(60_000),
    ]);
    let started = Instant::now();

    let err = poll_task(&api, "t-4b", &every_second(3), |_| {})
        .await
        .unwrap_err();

    match err {
        ClientError::PollTimeout {
            last_status,
            elapsed,
            ..
        } => {
            assert_eq!(last_status, TaskStatus::Running);
            assert!(elapsed <= Duration::from_millis(3500));
        }
        other => panic!("expected PollTimeout, got {:?}", other),
    }
    assert!(started.elapsed() <= Duration::from_millis(3500));
    assert_eq!(api.queries(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_not_task_failure() {
    let api = ScriptedApi::new(Vec::new()).with_fallback(TaskStatus::Pending);
    let err = poll_task(&api, "t-5", &every_second(2), |_| {})
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::PollTimeout { .. }));
    assert!(!matches!(err, ClientError::TaskFailed { .. }));
}

// --- Spacing ---

#[tokio::test(start_paused = true)]
async fn test_backoff_spacing() {
    let api = ScriptedApi::new(vec![
        Step::Status(TaskStatus::Pending),
        Step::Status(TaskStatus::Running),
        Step::Status(TaskStatus::Running),
        Step::Status(TaskStatus::Running),
        Step::Succeeded("https://oss.example/c.png"),
    ]);
    let options = PollOptions::default()
        .with_interval(Duration::from_secs(1))
        .with_backoff(2.0)
        .with_max_interval(Duration::from_secs(4))
        .with_timeout(Duration::from_secs(120));

    poll_task(&api, "t-6", &options, |_| {}).await.unwrap();

    let times = api.query_times();
    let gaps: Vec<Duration> = times.windows(2).map(|w| w[1] - w[0]).collect();
    assert_eq!(
        gaps,
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_secs(4),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_huge_backoff_factor_is_capped() {
    let api = ScriptedApi::new(vec![
        Step::Status(TaskStatus::Running),
        Step::Status(TaskStatus::Running),
        Step::Status(TaskStatus::Running),
        Step::Succeeded("https://oss.example/h.png"),
    ]);
    let options = PollOptions::default()
        .with_interval(Duration::from_secs(2))
        .with_max_interval(Duration::from_secs(10))
        .with_backoff(1e20)
        .with_timeout(Duration::from_secs(120));

    poll_task(&api, "t-6b", &options, |_| {}).await.unwrap();

    let times = api.query_times();
    let gaps: Vec<Duration> = times.windows(2).map(|w| w[1] - w[0]).collect();
    assert_eq!(
        gaps,
        vec![
            Duration::from_secs(2),
            Duration::from_secs(10),
            Duration::from_secs(10),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_minimum_spacing_enforced() {
    let api = ScriptedApi::new(vec![
        Step::Status(TaskStatus::Running),
        Step::Succeeded("https://oss.example/d.png"),
    ]);
    let options = PollOptions::fixed(Duration::ZERO, Duration::from_secs(10));

    poll_task(&api, "t-7", &options, |_| {}).await.unwrap();

    let times = api.query_times();
    assert!(times[1] - times[0] >= Duration::from_millis(500));
}

// --- Errors during polling ---

#[tokio::test(start_paused = true)]
async fn test_transient_transport_errors_are_retried() {
    let api = ScriptedApi::new(vec![
        Step::Transport,
        Step::Transport,
        Step::Succeeded("https://oss.example/e.png"),
    ]);
    let options = every_second(60).with_max_transport_retries(3);

    let task = poll_task(&api, "t-8", &options, |_| {}).await.unwrap();
    assert_eq!(api.queries(), 3);
    assert_eq!(task.status, TaskStatus::Succeeded);
}

#[tokio::test(start_paused = true)]
async fn test_retry_counter_resets_after_success() {
    let api = ScriptedApi::new(vec![
        Step::Transport,
        Step::Status(TaskStatus::Running),
        Step::Transport,
        Step::Succeeded("https://oss.example/f.png"),
    ]);
    let options = every_second(60).with_max_transport_retries(1);

    poll_task(&api, "t-9", &options, |_| {}).await.unwrap();
    assert_eq!(api.queries(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_persistent_transport_errors_escalate() {
    let api = ScriptedApi::new(vec![
        Step::Transport,
        Step::Transport,
        Step::Transport,
        Step::Transport,
    ]);
    let options = every_second(60).with_max_transport_retries(2);

    let err = poll_task(&api, "t-10", &options, |_| {}).await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(api.queries(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_domain_error_while_polling_is_not_retried() {
    let api = ScriptedApi::new(vec![
        Step::Domain(40400),
        Step::Succeeded("https://oss.example/never.png"),
    ]);

    let err = poll_task(&api, "t-11", &every_second(60), |_| {})
        .await
        .unwrap_err();
    assert_eq!(err.domain_code(), Some(40400));
    assert_eq!(api.queries(), 1);
}

// --- Cancellation ---

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_within_one_interval() {
    let api = ScriptedApi::new(Vec::new()).with_fallback(TaskStatus::Running);
    let flag = Arc::new(AtomicBool::new(false));
    let options = every_second(60).with_cancellation(flag.clone());

    let cancel = async {
        tokio::time::sleep(Duration::from_millis(2500)).await;
        flag.store(true, Ordering::SeqCst);
        Instant::now()
    };
    let poll = async {
        let result = poll_task(&api, "t-12", &options, |_| {}).await;
        (result, Instant::now())
    };

    let (cancelled_at, (result, returned_at)) = tokio::join!(cancel, poll);

    assert!(matches!(result, Err(ClientError::Cancelled)));
    assert!(returned_at - cancelled_at <= Duration::from_secs(1));
    // queries at t = 0, 1, 2
    assert_eq!(api.queries(), 3);
    assert!(api.query_times().iter().all(|t| *t <= cancelled_at));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_last_query_is_not_a_timeout() {
    // second query starts at t = 1s (the deadline) and answers at 1.3s
    let api = ScriptedApi::new(vec![Step::Status(TaskStatus::Running), Step::Slow(300)]);
    let flag = Arc::new(AtomicBool::new(false));
    let options = every_second(1).with_cancellation(flag.clone());

    let cancel = async {
        tokio::time::sleep(Duration::from_millis(1200)).await;
        flag.store(true, Ordering::SeqCst);
    };
    let (_, result) = tokio::join!(cancel, poll_task(&api, "t-12b", &options, |_| {}));

    assert!(matches!(result, Err(ClientError::Cancelled)));
    assert_eq!(api.queries(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_start_issues_no_query() {
    let api = ScriptedApi::new(Vec::new());
    let flag = Arc::new(AtomicBool::new(true));
    let options = every_second(60).with_cancellation(flag);

    let err = poll_task(&api, "t-13", &options, |_| {}).await.unwrap_err();
    assert!(matches!(err, ClientError::Cancelled));
    assert_eq!(api.queries(), 0);
}

// --- Submission ---

#[tokio::test(start_paused = true)]
async fn test_rejected_submit_never_polls() {
    let api = ScriptedApi::rejecting_submit(40001);

    let err = submit_and_wait(
        &api,
        &ImageParameters::scale(2.0, 2.0),
        "1890000000000000001",
        &every_second(60),
        |_| {},
    )
    .await
    .unwrap_err();

    assert_eq!(err.domain_code(), Some(40001));
    assert_eq!(api.submits(), 1);
    assert_eq!(api.queries(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_submit_and_wait_polls_the_new_task() {
    let api = ScriptedApi::new(vec![
        Step::Status(TaskStatus::Pending),
        Step::Succeeded("https://oss.example/g.png"),
    ]);

    let task = submit_and_wait(
        &api,
        &ImageParameters::scale(1.5, 1.5).output_ratio("16:9"),
        "42",
        &every_second(60),
        |_| {},
    )
    .await
    .unwrap();

    assert_eq!(task.task_id, "task-1");
    assert_eq!(api.queries(), 2);
}

#[tokio::test]
async fn test_submit_twice_creates_two_tasks() {
    let api = ScriptedApi::new(Vec::new());
    let params = ImageParameters::scale(2.0, 1.0);

    let first = api.submit(&params, "42").await.unwrap();
    let second = api.submit(&params, "42").await.unwrap();

    assert_ne!(first, second);
    assert_eq!(api.submits(), 2);
}

// --- Concurrency ---

#[tokio::test(start_paused = true)]
async fn test_independent_loops_do_not_interfere() {
    let fast = ScriptedApi::new(vec![Step::Succeeded("https://oss.example/fast.png")]);
    let slow = ScriptedApi::new(vec![
        Step::Status(TaskStatus::Running),
        Step::Status(TaskStatus::Running),
        Step::Succeeded("https://oss.example/slow.png"),
    ]);
    let options = every_second(60);

    let (a, b) = tokio::join!(
        poll_task(&fast, "fast", &options, |_| {}),
        poll_task(&slow, "slow", &options, |_| {}),
    );

    assert_eq!(a.unwrap().output_image_url.as_deref(), Some("https://oss.example/fast.png"));
    assert_eq!(b.unwrap().output_image_url.as_deref(), Some("https://oss.example/slow.png"));
    assert_eq!(fast.queries(), 1);
    assert_eq!(slow.queries(), 3);
}

// --- HTTP client ---

#[tokio::test]
async fn test_unreachable_backend_is_transport_error() {
    let client = PictureClient::new("http://127.0.0.1:1");
    let err = client.query_task("t-x").await.unwrap_err();
    assert!(err.is_transient());
    assert!(err.domain_code().is_none());
}

#[tokio::test]
async fn test_login_cookie_is_replayed_by_the_session() {
    let anon = PictureClient::new(spawn_session_backend().await);

    let session = anon.login("alice", "12345678").await.unwrap();
    assert!(session.is_authenticated());
    assert!(session.token().is_none());

    let client = anon.clone().with_session(session);
    let me = client.login_user().await.unwrap();
    assert_eq!(me.user_account.as_deref(), Some("alice"));

    // the anonymous client never saw the cookie
    let err = anon.login_user().await.unwrap_err();
    assert_eq!(err.domain_code(), Some(40100));
}

#[test]
fn test_client_uses_config_poll_policy() {
    let config = ClientConfig::builder()
        .with_endpoint("http://localhost:8001")
        .with_poll_interval(Duration::from_secs(3))
        .with_poll_timeout(Duration::from_secs(90))
        .build();
    let client = PictureClient::with_config(config);
    assert_eq!(client.config().poll.interval, Duration::from_secs(3));
    assert_eq!(client.config().poll.timeout, Duration::from_secs(90));
}
