//! Per-mode stdout rendering for `get`.
//!
//! Formats are part of each caller's wire protocol and are exact: git and
//! npm speak `key=value` lines in a fixed order with blank fields omitted,
//! docker expects a single JSON line.

use std::fmt::Write;

use anyhow::Result;
use serde::Serialize;
use url::Url;

use crate::input::ParsedInputs;
use crate::mode::Mode;
use crate::request;

#[derive(Serialize)]
struct DockerCredential<'a> {
    #[serde(rename = "ServerURL")]
    server_url: &'a str,
    #[serde(rename = "Username")]
    username: &'a str,
    #[serde(rename = "Secret")]
    secret: &'a str,
}

pub fn render_get(
    mode: &Mode,
    inputs: &ParsedInputs,
    username: &str,
    password: &str,
) -> Result<String> {
    match mode {
        Mode::Git => {
            let url = request::git_url(inputs)?;
            let mut out = String::new();
            push_line(&mut out, "protocol", url.scheme());
            push_line(&mut out, "host", &host_with_port(&url));
            push_line(&mut out, "path", visible_path(&url));
            push_line(&mut out, "username", username);
            push_line(&mut out, "password", password);
            Ok(out)
        }
        Mode::Docker => {
            let server_url = request::derive_mode_key(mode, inputs)?;
            let credential = DockerCredential {
                server_url: &server_url,
                username,
                secret: password,
            };
            let mut line = serde_json::to_string(&credential)?;
            line.push('\n');
            Ok(line)
        }
        Mode::Npm => {
            let registry = request::derive_mode_key(mode, inputs)?;
            let mut out = String::new();
            push_line(&mut out, "registry", &registry);
            push_line(&mut out, "always-auth", "true");
            push_line(&mut out, "email", username);
            push_line(&mut out, "_auth", password);
            Ok(out)
        }
        Mode::Generic(_) => {
            let mut out = String::new();
            push_line(&mut out, "username", username);
            push_line(&mut out, "password", password);
            Ok(out)
        }
    }
}

fn push_line(out: &mut String, key: &str, value: &str) {
    if !value.is_empty() {
        writeln!(out, "{key}={value}").expect("write to string");
    }
}

fn host_with_port(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

/// URL parsing normalizes an absent path to "/"; the git protocol treats
/// that as no path at all.
fn visible_path(url: &Url) -> &str {
    match url.path() {
        "" | "/" => "",
        path => path,
    }
}
