//! API token discovery.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::{GitloadError, Result};

const TOKEN_PREFIX: &str = "GITHUB_TOKEN=";

/// Bearer token for the remote API. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(GitloadError::MissingToken);
        }
        Ok(Self(value))
    }

    /// `GITHUB_TOKEN` from the environment, then `~/.github-token`.
    pub fn discover() -> Result<Self> {
        Self::discover_from(std::env::var("GITHUB_TOKEN").ok(), home_token_file())
    }

    /// A blank environment value falls through to the token file.
    fn discover_from(env_value: Option<String>, token_file: Option<PathBuf>) -> Result<Self> {
        let value = match env_value.filter(|v| !v.trim().is_empty()) {
            Some(v) => Some(v),
            None => token_file.and_then(|path| read_token_file(&path)),
        };
        value.ok_or(GitloadError::MissingToken).and_then(Self::new)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

fn home_token_file() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".github-token"))
}

fn read_token_file(path: &Path) -> Option<String> {
    let text = std::fs::read_to_string(path).ok()?;
    let token = parse_token_file(&text);
    if token.is_some() {
        tracing::debug!(path = %path.display(), "using token from file");
    }
    token
}

/// Extracts the value after the first `GITHUB_TOKEN=` up to the end of that line.
pub fn parse_token_file(text: &str) -> Option<String> {
    let start = text.find(TOKEN_PREFIX)? + TOKEN_PREFIX.len();
    let rest = &text[start..];
    let value = match rest.find('\n') {
        Some(end) => &rest[..end],
        None => rest,
    };
    let value = value.trim_end_matches('\r');
    if value.is_empty() { None } else { Some(value.to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_token_line_among_others() {
        let text = "export FOO=bar\nGITHUB_TOKEN=ghp_abc123\nOTHER=1\n";
        assert_eq!(parse_token_file(text).as_deref(), Some("ghp_abc123"));
    }

    #[test]
    fn parses_token_without_trailing_newline() {
        assert_eq!(parse_token_file("GITHUB_TOKEN=xyz").as_deref(), Some("xyz"));
    }

    #[test]
    fn missing_prefix_or_empty_value_yields_none() {
        assert_eq!(parse_token_file("TOKEN=xyz\n"), None);
        assert_eq!(parse_token_file("GITHUB_TOKEN=\n"), None);
    }

    #[test]
    fn read_token_file_handles_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_token_file(&dir.path().join("absent")), None);
        let path = dir.path().join(".github-token");
        std::fs::write(&path, "GITHUB_TOKEN=from-file\r\n").unwrap();
        assert_eq!(read_token_file(&path).as_deref(), Some("from-file"));
    }

    #[test]
    fn blank_env_value_falls_back_to_token_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".github-token");
        std::fs::write(&path, "GITHUB_TOKEN=from-file\n").unwrap();

        let token = Token::discover_from(Some("  \t".into()), Some(path.clone())).unwrap();
        assert_eq!(token.expose(), "from-file");

        let token = Token::discover_from(Some("from-env".into()), Some(path)).unwrap();
        assert_eq!(token.expose(), "from-env");

        let err = Token::discover_from(Some(" ".into()), None).unwrap_err();
        assert_eq!(err.kind(), "missing_token");
    }

    #[test]
    fn blank_token_is_rejected_and_debug_is_redacted() {
        assert!(matches!(Token::new("  "), Err(GitloadError::MissingToken)));
        let token = Token::new("secret").unwrap();
        assert_eq!(format!("{:?}", token), "Token(***)");
        assert_eq!(token.expose(), "secret");
    }
}
