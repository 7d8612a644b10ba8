//! Error taxonomy for the credential-resolution engine.
//!
//! Parsing and derivation errors are deterministic for a given stdin and are
//! never retried. Only `AuthFailure` (classified in [`crate::retry`]) triggers
//! the one-shot session retry; everything else propagates to the process
//! boundary and exits non-zero.

use std::time::Duration;

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum HelperError {
    /// A field the current mode requires was absent from stdin.
    #[error("missing {0} in credential input")]
    MissingField(&'static str),

    /// Malformed JSON or URL in stdin.
    #[error("invalid input encoding: {0}")]
    InvalidEncoding(String),

    /// Docker get/erase received no input line.
    #[error("cannot parse url from zero lines of input")]
    EmptyInput,

    /// Docker get/erase received more than one non-blank input line.
    #[error("cannot parse url from multiple lines of input")]
    MultipleLines,

    /// Stdin produced neither a blank line nor EOF within the deadline.
    #[error("closed stdin after waiting {0:?}")]
    Timeout(Duration),

    #[error("no vault found with name {0:?}")]
    VaultNotFound(String),

    /// The external tool rejected the cached session token.
    #[error("{0}")]
    AuthFailure(String),

    /// Any other external tool failure.
    #[error("secret tool failed: {0}")]
    Tool(String),

    /// Keystore I/O failure.
    #[error("keystore failure: {0}")]
    Store(String),
}
