#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use credkeep::clock::FixedClock;
use credkeep::context::RequestContext;
use credkeep::input::ParsedInputs;
use credkeep::keystore::MemoryKeystore;
use credkeep::mode::Mode;
use credkeep::session::{SESSION_TOKEN_DATE_KEY, SESSION_TOKEN_VALUE_KEY};
use credkeep::tool::ToolRunner;

/// Exactly the error shape the real tool prints for a stale session.
pub const AUTH_ERROR: &str = "[ERROR] 2024/01/01 12:00:00 You are not currently signed in. \
     Please run `op signin --help` for instructions";

pub fn item_not_found(key: &str) -> String {
    format!(
        "[ERROR] 2024/01/01 12:00:00 \"{key}\" doesn't seem to be an item in the \"credkeep\" vault"
    )
}

pub fn vault_not_found(name: &str) -> String {
    format!("[ERROR] 2024/01/01 12:00:00 \"{name}\" doesn't seem to be a vault in this account")
}

pub fn item_json(uuid: &str, username: &str, password: &str) -> String {
    serde_json::json!({
        "uuid": uuid,
        "details": {
            "fields": [
                {"designation": "username", "value": username},
                {"designation": "password", "value": password},
            ]
        }
    })
    .to_string()
}

/// Scripted tool runner. The handler decides each call's outcome; every
/// call's args are recorded for assertions.
pub struct MockTool {
    handler: Box<dyn Fn(&str, &[String]) -> Result<String> + Send + Sync>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl MockTool {
    pub fn new(
        handler: impl Fn(&str, &[String]) -> Result<String> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// A runner for tests that must not touch the tool at all.
    pub fn unreachable() -> Arc<Self> {
        Self::new(|_, args| Err(anyhow::anyhow!("unexpected tool call: {args:?}")))
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }

    pub fn count_with_prefix(&self, prefix: &[&str]) -> usize {
        self.calls()
            .iter()
            .filter(|call| {
                call.len() >= prefix.len() && call.iter().zip(prefix).all(|(a, b)| a == b)
            })
            .count()
    }
}

#[async_trait]
impl ToolRunner for MockTool {
    async fn run(&self, stdin: &str, args: &[String]) -> Result<String> {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .push(args.to_vec());
        (self.handler)(stdin, args)
    }
}

/// Borrow args as &str for slice pattern matching in handlers.
pub fn arg_strs(args: &[String]) -> Vec<&str> {
    args.iter().map(String::as_str).collect()
}

pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// A keystore seeded with a session token issued just now.
pub fn keystore_with_fresh_session(token: &str) -> Arc<MemoryKeystore> {
    Arc::new(MemoryKeystore::with_values([
        (SESSION_TOKEN_DATE_KEY, test_now().to_rfc3339().as_str()),
        (SESSION_TOKEN_VALUE_KEY, token),
    ]))
}

pub fn context(
    mode: Mode,
    inputs: ParsedInputs,
    keystore: Arc<MemoryKeystore>,
    tool: Arc<MockTool>,
) -> RequestContext {
    RequestContext::new(
        mode,
        inputs,
        keystore,
        tool,
        Arc::new(FixedClock::new(test_now())),
        None,
    )
}

pub fn inputs(pairs: &[(&str, &str)]) -> ParsedInputs {
    pairs.iter().copied().collect()
}
