//! Credential modes.
//!
//! A mode selects which stdin protocol and key-derivation rule apply. The
//! predefined modes (git, docker, npm) each mirror the protocol their caller
//! speaks; any other label is a "generic" mode whose stored key is the label
//! itself.

use std::fmt;
use std::str::FromStr;

/// Base name of this helper, used for service and vault naming.
pub const SERVICE_NAME: &str = "credkeep";

pub const PREDEFINED_MODES: &[&str] = &["git", "docker", "npm"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Git,
    Docker,
    Npm,
    /// Free-form label; validated by [`Mode::from_str`].
    Generic(String),
}

impl Mode {
    pub fn is_predefined(&self) -> bool {
        !matches!(self, Mode::Generic(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Mode::Git => "git",
            Mode::Docker => "docker",
            Mode::Npm => "npm",
            Mode::Generic(label) => label,
        }
    }

    /// Service identity presented to the secret manager, e.g. in the
    /// description of a vault this helper creates.
    pub fn service_name(&self) -> String {
        if self.is_predefined() {
            format!("{}-{SERVICE_NAME}", self.as_str())
        } else {
            SERVICE_NAME.to_string()
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error(
    "invalid mode {value:?}: modes must be non-empty, contain no whitespace, \
     and must not start with a predefined mode name (git, docker, npm)"
)]
pub struct ModeParseError {
    value: String,
}

impl FromStr for Mode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "git" => Ok(Mode::Git),
            "docker" => Ok(Mode::Docker),
            "npm" => Ok(Mode::Npm),
            other if is_valid_generic(other) => Ok(Mode::Generic(other.to_string())),
            other => Err(ModeParseError {
                value: other.to_string(),
            }),
        }
    }
}

/// A generic mode label must be non-empty, contain no space/tab/newline, and
/// must not case-insensitively begin with any predefined mode name (that
/// would make `{mode}:{key}` entries ambiguous in a shared vault).
fn is_valid_generic(mode: &str) -> bool {
    if mode.is_empty() || mode.contains([' ', '\t', '\n', '\r']) {
        return false;
    }
    let lower = mode.to_lowercase();
    !PREDEFINED_MODES
        .iter()
        .any(|predefined| lower.starts_with(predefined))
}
