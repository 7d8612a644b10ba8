mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use credkeep::clock::FixedClock;
use credkeep::keystore::MemoryKeystore;
use credkeep::retry::{is_auth_failure, with_retry};
use credkeep::session::{SessionManager, SESSION_TOKEN_DATE_KEY, SESSION_TOKEN_VALUE_KEY};
use credkeep::tool::ToolClient;
use support::{keystore_with_fresh_session, test_now, MockTool, AUTH_ERROR};

fn session(keystore: Arc<MemoryKeystore>, tool: Arc<MockTool>) -> SessionManager {
    SessionManager::new(
        keystore,
        ToolClient::new(tool),
        Arc::new(FixedClock::new(test_now())),
    )
}

#[tokio::test]
async fn auth_failure_clears_session_and_retries_once() {
    let keystore = keystore_with_fresh_session("tok");
    let session = session(keystore.clone(), MockTool::unreachable());
    let attempts = AtomicUsize::new(0);
    let attempts = &attempts;

    let result = with_retry(&session, || async move {
        match attempts.fetch_add(1, Ordering::SeqCst) {
            0 => Err(anyhow::anyhow!("{AUTH_ERROR}")),
            _ => Ok(42),
        }
    })
    .await;

    assert_eq!(result.unwrap(), 42);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);

    // The stale token was blanked before the second attempt.
    assert_eq!(keystore.value(SESSION_TOKEN_VALUE_KEY), Some(String::new()));
    assert_eq!(keystore.value(SESSION_TOKEN_DATE_KEY), Some(String::new()));
}

#[tokio::test]
async fn unrelated_errors_are_not_retried() {
    let keystore = keystore_with_fresh_session("tok");
    let session = session(keystore.clone(), MockTool::unreachable());
    let attempts = AtomicUsize::new(0);
    let attempts = &attempts;

    let result: anyhow::Result<()> = with_retry(&session, || async move {
        attempts.fetch_add(1, Ordering::SeqCst);
        Err(anyhow::anyhow!("connection refused"))
    })
    .await;

    let err = result.unwrap_err();
    assert_eq!(err.to_string(), "connection refused");
    assert_eq!(attempts.load(Ordering::SeqCst), 1);

    // The session was left alone.
    assert_eq!(
        keystore.value(SESSION_TOKEN_VALUE_KEY),
        Some("tok".to_string())
    );
}

#[tokio::test]
async fn second_auth_failure_propagates() {
    let session = session(keystore_with_fresh_session("tok"), MockTool::unreachable());
    let attempts = AtomicUsize::new(0);
    let attempts = &attempts;

    let result: anyhow::Result<()> = with_retry(&session, || async move {
        attempts.fetch_add(1, Ordering::SeqCst);
        Err(anyhow::anyhow!("{AUTH_ERROR}"))
    })
    .await;

    let err = result.unwrap_err();
    assert!(is_auth_failure(&err));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn success_runs_exactly_once() {
    let keystore = keystore_with_fresh_session("tok");
    let session = session(keystore.clone(), MockTool::unreachable());
    let attempts = AtomicUsize::new(0);
    let attempts = &attempts;

    let result = with_retry(&session, || async move {
        attempts.fetch_add(1, Ordering::SeqCst);
        Ok("output")
    })
    .await;

    assert_eq!(result.unwrap(), "output");
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(
        keystore.value(SESSION_TOKEN_VALUE_KEY),
        Some("tok".to_string())
    );
}
