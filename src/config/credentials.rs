// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! API token lookup from the environment or a deployment secrets file.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Environment variable (and secrets-file key) carrying the token.
pub const TOKEN_ENV_VAR: &str = "ZENODOTOKEN";

/// Bearer token for the deposit API. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken(***)")
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("missing credential: set {TOKEN_ENV_VAR} or add it to {path:?}")]
    Missing { path: PathBuf },
    #[error("failed to read token file {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Resolve the token: an explicit value (normally from `ZENODOTOKEN`) wins,
/// otherwise `token_file` is scanned for a `ZENODOTOKEN=` line.
///
/// A missing file is not an I/O error; it simply means no credential.
pub fn load_token(from_env: Option<&str>, token_file: &Path) -> Result<ApiToken, CredentialError> {
    if let Some(token) = from_env.and_then(ApiToken::new) {
        tracing::debug!("Using token from {}", TOKEN_ENV_VAR);
        return Ok(token);
    }

    let contents = match fs::read_to_string(token_file) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(CredentialError::Missing {
                path: token_file.to_path_buf(),
            });
        }
        Err(source) => {
            return Err(CredentialError::Read {
                path: token_file.to_path_buf(),
                source,
            });
        }
    };

    tracing::debug!("Scanning {:?} for {}", token_file, TOKEN_ENV_VAR);
    parse_token_line(&contents).ok_or_else(|| CredentialError::Missing {
        path: token_file.to_path_buf(),
    })
}

/// First `ZENODOTOKEN=value` line, quotes stripped; comments and blanks skipped.
fn parse_token_line(contents: &str) -> Option<ApiToken> {
    let prefix = format!("{TOKEN_ENV_VAR}=");
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.strip_prefix(prefix.as_str()))
        .map(strip_quotes)
        .find_map(ApiToken::new)
}

fn strip_quotes(value: &str) -> &str {
    let value = value.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value.trim_matches(|c| c == '"' || c == '\'')
}

#[cfg(test)]
mod tests {
    use super::{ApiToken, CredentialError, load_token, parse_token_line};
    use tempfile::TempDir;

    #[test]
    fn environment_value_wins_over_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("token.txt");
        std::fs::write(&path, "ZENODOTOKEN=from-file\n").unwrap();

        let token = load_token(Some("from-env"), &path).unwrap();
        assert_eq!(token.expose(), "from-env");
    }

    #[test]
    fn blank_environment_value_falls_back_to_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("token.txt");
        std::fs::write(&path, "ZENODOTOKEN=\"abc123\"\n").unwrap();

        let token = load_token(Some("   "), &path).unwrap();
        assert_eq!(token.expose(), "abc123");
    }

    #[test]
    fn parse_skips_comments_and_other_keys() {
        let contents = "\
# ZENODOTOKEN=commented\n\
GITHUBTOKEN=nope\n\
\n\
  ZENODOTOKEN='single-quoted'  \n\
ZENODOTOKEN=second\n";

        let token = parse_token_line(contents).unwrap();
        assert_eq!(token.expose(), "single-quoted");
    }

    #[test]
    fn parse_returns_none_without_key() {
        assert!(parse_token_line("OTHER=1\n# ZENODOTOKEN=x\n").is_none());
        assert!(parse_token_line("ZENODOTOKEN=\"\"\n").is_none());
    }

    #[test]
    fn missing_file_is_a_missing_credential() {
        let tmp = TempDir::new().unwrap();
        let err = load_token(None, &tmp.path().join("absent.txt")).unwrap_err();

        assert!(matches!(err, CredentialError::Missing { .. }));
        assert!(err.to_string().starts_with("missing credential"));
    }

    #[test]
    fn unreadable_path_is_a_read_error() {
        let tmp = TempDir::new().unwrap();
        // A directory cannot be read as a string.
        let err = load_token(None, tmp.path()).unwrap_err();
        assert!(matches!(err, CredentialError::Read { .. }));
    }

    #[test]
    fn debug_output_redacts_token() {
        let token = ApiToken::new("secret").unwrap();
        assert_eq!(format!("{token:?}"), "ApiToken(***)");
    }
}
