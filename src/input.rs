//! Deadline-bounded stdin parsing.
//!
//! Callers like git may never send EOF, so the read runs on a spawned task
//! raced against a timer. The reader task owns the stream, which is dropped
//! (closed) whichever side wins. Parsing is idempotent: the same stdin under
//! the same mode and command always yields the same field map, and the map is
//! produced exactly once per invocation and reused across a retry.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use crate::error::HelperError;
use crate::mode::Mode;

/// Field name the docker protocol uses for its registry URL.
pub const DOCKER_SERVER_URL_KEY: &str = "ServerURL";

/// Which subcommand is consuming stdin. Only `store` carries credential
/// fields; get/erase identify a credential by key alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Store,
    Erase,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::Store => "store",
            Verb::Erase => "erase",
        }
    }
}

/// Flat string-keyed map of raw fields extracted from stdin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedInputs {
    fields: HashMap<String, String>,
}

impl ParsedInputs {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(|s| s.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ParsedInputs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Read stdin under `deadline` and decode it per mode.
///
/// Generic (non-predefined) modes only read stdin for `store`; their get and
/// erase identify the credential by the mode label alone.
pub async fn parse_input<R>(
    mode: &Mode,
    verb: Verb,
    stdin: R,
    deadline: Duration,
) -> Result<ParsedInputs>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let lines = if !mode.is_predefined() && verb != Verb::Store {
        Vec::new()
    } else {
        read_lines_with_deadline(stdin, deadline).await?
    };

    match mode {
        Mode::Docker if verb == Verb::Store => parse_json(&lines),
        Mode::Docker => parse_server_url(&lines),
        _ => Ok(parse_key_value(&lines)),
    }
}

/// Scan lines until a blank line or EOF on a spawned task; fail with
/// `Timeout` if neither arrives within `deadline`.
async fn read_lines_with_deadline<R>(stdin: R, deadline: Duration) -> Result<Vec<String>>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let mut reader = tokio::spawn(async move {
        let mut reader = BufReader::new(stdin);
        let mut lines = Vec::new();
        loop {
            let mut line = String::new();
            let n = reader.read_line(&mut line).await?;
            if n == 0 {
                break;
            }
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                break;
            }
            lines.push(line.to_string());
        }
        Ok::<_, std::io::Error>(lines)
    });

    match tokio::time::timeout(deadline, &mut reader).await {
        Ok(joined) => {
            let lines = joined.context("stdin reader task failed")??;
            Ok(lines)
        }
        Err(_) => {
            // Dropping the task drops the stream with it.
            reader.abort();
            Err(HelperError::Timeout(deadline).into())
        }
    }
}

/// `key=value` lines, split on the first `=`; lines without `=` are ignored.
fn parse_key_value(lines: &[String]) -> ParsedInputs {
    lines
        .iter()
        .filter_map(|line| line.split_once('='))
        .collect()
}

/// One JSON object covering the whole input; top-level values coerced to strings.
fn parse_json(lines: &[String]) -> Result<ParsedInputs> {
    let input = lines.join("\n");
    let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&input)
        .map_err(|err| HelperError::InvalidEncoding(err.to_string()))?;

    Ok(object
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            (key, value)
        })
        .collect())
}

/// Exactly one non-blank line, stored under `ServerURL`.
fn parse_server_url(lines: &[String]) -> Result<ParsedInputs> {
    let non_blank: Vec<&str> = lines
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect();

    match non_blank.as_slice() {
        [] => Err(HelperError::EmptyInput.into()),
        [line] => Ok([(DOCKER_SERVER_URL_KEY, *line)].into_iter().collect()),
        _ => Err(HelperError::MultipleLines.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEADLINE: Duration = Duration::from_secs(1);

    async fn parse_str(mode: &Mode, verb: Verb, input: &str) -> Result<ParsedInputs> {
        parse_input(mode, verb, std::io::Cursor::new(input.to_string()), DEADLINE).await
    }

    #[tokio::test]
    async fn test_git_key_value_lines() {
        let inputs = parse_str(&Mode::Git, Verb::Get, "protocol=https\nhost=github.com\n\n")
            .await
            .unwrap();
        assert_eq!(inputs.get("protocol"), Some("https"));
        assert_eq!(inputs.get("host"), Some("github.com"));
    }

    #[tokio::test]
    async fn test_value_may_contain_equals() {
        let inputs = parse_str(&Mode::Git, Verb::Get, "url=https://h/p?q=1\n")
            .await
            .unwrap();
        assert_eq!(inputs.get("url"), Some("https://h/p?q=1"));
    }

    #[tokio::test]
    async fn test_lines_without_equals_ignored() {
        let inputs = parse_str(&Mode::Git, Verb::Get, "garbage\nhost=github.com\n")
            .await
            .unwrap();
        assert_eq!(inputs.get("host"), Some("github.com"));
        assert_eq!(inputs.get("garbage"), None);
    }

    #[tokio::test]
    async fn test_stops_at_blank_line() {
        let inputs = parse_str(&Mode::Git, Verb::Get, "host=github.com\n\nafter=ignored\n")
            .await
            .unwrap();
        assert_eq!(inputs.get("after"), None);
    }

    #[tokio::test]
    async fn test_docker_store_json() {
        let input = r#"{"ServerURL":"https://index.docker.io/v1/","Username":"u","Secret":"p"}"#;
        let inputs = parse_str(&Mode::Docker, Verb::Store, input).await.unwrap();
        assert_eq!(inputs.get("ServerURL"), Some("https://index.docker.io/v1/"));
        assert_eq!(inputs.get("Username"), Some("u"));
        assert_eq!(inputs.get("Secret"), Some("p"));
    }

    #[tokio::test]
    async fn test_docker_store_coerces_non_strings() {
        let input = r#"{"ServerURL":"https://r","Attempts":3}"#;
        let inputs = parse_str(&Mode::Docker, Verb::Store, input).await.unwrap();
        assert_eq!(inputs.get("Attempts"), Some("3"));
    }

    #[tokio::test]
    async fn test_docker_store_rejects_invalid_json() {
        let err = parse_str(&Mode::Docker, Verb::Store, "not json")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HelperError>(),
            Some(HelperError::InvalidEncoding(_))
        ));
    }

    #[tokio::test]
    async fn test_docker_get_single_line() {
        let inputs = parse_str(&Mode::Docker, Verb::Get, "https://index.docker.io/v1/\n")
            .await
            .unwrap();
        assert_eq!(inputs.get("ServerURL"), Some("https://index.docker.io/v1/"));
    }

    #[tokio::test]
    async fn test_docker_get_zero_lines() {
        let err = parse_str(&Mode::Docker, Verb::Get, "").await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<HelperError>(),
            Some(&HelperError::EmptyInput)
        );
    }

    #[tokio::test]
    async fn test_docker_get_multiple_lines() {
        let err = parse_str(&Mode::Docker, Verb::Get, "https://a\nhttps://b\n")
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<HelperError>(),
            Some(&HelperError::MultipleLines)
        );
    }

    #[tokio::test]
    async fn test_generic_get_skips_stdin() {
        // The reader is never touched; an unreadable stream must not matter.
        let (_writer, reader) = tokio::io::duplex(8);
        let mode = Mode::Generic("aws".to_string());
        let inputs = parse_input(&mode, Verb::Get, reader, Duration::from_millis(50))
            .await
            .unwrap();
        assert!(inputs.is_empty());
    }

    #[tokio::test]
    async fn test_generic_store_reads_key_values() {
        let mode = Mode::Generic("aws".to_string());
        let inputs = parse_str(&mode, Verb::Store, "username=u\npassword=p\n")
            .await
            .unwrap();
        assert_eq!(inputs.get("username"), Some("u"));
        assert_eq!(inputs.get("password"), Some("p"));
    }

    #[tokio::test]
    async fn test_timeout_when_stdin_never_ends() {
        // Keep the write half alive so the reader sees neither data nor EOF.
        let (_writer, reader) = tokio::io::duplex(8);
        let deadline = Duration::from_millis(50);
        let err = parse_input(&Mode::Git, Verb::Get, reader, deadline)
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<HelperError>(),
            Some(&HelperError::Timeout(deadline))
        );
    }

    #[tokio::test]
    async fn test_parse_is_idempotent() {
        let input = "protocol=https\nhost=github.com\npath=a/b\n\n";
        let first = parse_str(&Mode::Git, Verb::Get, input).await.unwrap();
        let second = parse_str(&Mode::Git, Verb::Get, input).await.unwrap();
        assert_eq!(first, second);
    }
}
