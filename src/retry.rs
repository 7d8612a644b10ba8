//! One-shot session retry.
//!
//! When the external tool rejects the cached session, the helper clears the
//! token and transparently re-runs the operation exactly once. Recognition is
//! textual: the signatures below are matched against the tool's error output.
//! That text belongs to another program and is not guaranteed stable across
//! its versions; the list is kept here, in one place, so a drift is a
//! one-line fix.

use std::future::Future;
use std::sync::OnceLock;

use anyhow::Result;
use regex::Regex;

use crate::error::HelperError;
use crate::session::SessionManager;

/// Known "stale session" error signatures, as emitted by the tool.
const AUTH_SIGNATURES: &[&str] = &[
    r"\[ERROR\] \d{4}/\d{2}/\d{2} \d{2}:\d{2}:\d{2} You are not currently signed in\. Please run `op signin --help` for instructions",
    r"\[ERROR\] \d{4}/\d{2}/\d{2} \d{2}:\d{2}:\d{2} Invalid session token",
];

fn signatures() -> &'static Vec<Regex> {
    static SIGNATURES: OnceLock<Vec<Regex>> = OnceLock::new();
    SIGNATURES.get_or_init(|| {
        AUTH_SIGNATURES
            .iter()
            .map(|pattern| Regex::new(pattern).expect("invalid auth signature pattern"))
            .collect()
    })
}

pub fn matches_auth_signature(text: &str) -> bool {
    signatures().iter().any(|regex| regex.is_match(text))
}

/// Whether an error means the session token was rejected.
pub fn is_auth_failure(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        if matches!(
            cause.downcast_ref::<HelperError>(),
            Some(HelperError::AuthFailure(_))
        ) {
            return true;
        }
        matches_auth_signature(&cause.to_string())
    })
}

/// Run `op`; on an auth failure, clear the session and run it exactly once
/// more. The second attempt re-derives its token and vault through the
/// request context, so a fresh sign-in flows through naturally. Any other
/// error, and any second failure, propagates unmodified.
pub async fn with_retry<T, F, Fut>(session: &SessionManager, op: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match op().await {
        Err(err) if is_auth_failure(&err) => {
            tracing::debug!("session rejected by the secret tool, retrying once");
            session.clear().await;
            op().await
        }
        result => result,
    }
}
