//! Login strategies.
//!
//! The portal login is an interactive browser flow. The client never drives
//! it directly: an [`Authenticator`] produces the session cookies, and the
//! client attaches them to every request.

use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::process::Command;

/// Marker in the names of the cookies that carry the portal session.
pub const SESSION_COOKIE_MARKER: &str = "appSession";

/// Cookies that authenticate a portal session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCredential {
    cookies: Vec<(String, String)>,
}

impl SessionCredential {
    pub fn new(cookies: Vec<(String, String)>) -> Self {
        Self { cookies }
    }

    pub fn cookies(&self) -> &[(String, String)] {
        &self.cookies
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Value for a `Cookie` request header, with any extra cookies appended.
    pub fn cookie_header(&self, extra: &[(&str, &str)]) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .chain(extra.iter().map(|(name, value)| format!("{}={}", name, value)))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self) -> Result<SessionCredential>;
}

/// Uses cookies copied from an already logged-in browser session.
#[derive(Debug, Clone)]
pub struct StaticCookieAuthenticator {
    cookies: BTreeMap<String, String>,
}

impl StaticCookieAuthenticator {
    pub fn new(cookies: BTreeMap<String, String>) -> Self {
        Self { cookies }
    }
}

#[async_trait]
impl Authenticator for StaticCookieAuthenticator {
    async fn authenticate(&self) -> Result<SessionCredential> {
        let cookies: Vec<(String, String)> = self
            .cookies
            .iter()
            .filter(|(_, value)| !value.trim().is_empty() && !value.starts_with("${"))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        if cookies.is_empty() {
            return Err(EtlError::AuthenticationError {
                message: "no session cookies configured (is the environment variable set?)".to_string(),
            });
        }

        tracing::info!("🔑 Using {} configured session cookies", cookies.len());
        Ok(SessionCredential::new(cookies))
    }
}

/// Runs an external login helper (typically a headless browser script).
///
/// The helper receives `LCR_USERNAME` and `LCR_PASSWORD` in its environment
/// and prints one cookie per line as `name=value` or `name<TAB>value`. Only
/// session cookies are kept.
#[derive(Debug, Clone)]
pub struct CommandAuthenticator {
    program: String,
    args: Vec<String>,
    username: String,
    password: String,
    timeout: Duration,
}

impl CommandAuthenticator {
    pub fn new(
        command: &[String],
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let (program, args) = command.split_first().ok_or_else(|| EtlError::MissingConfigError {
            field: "auth.command".to_string(),
        })?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            username: username.to_string(),
            password: password.to_string(),
            timeout,
        })
    }
}

pub fn parse_cookie_lines(output: &str) -> Vec<(String, String)> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let (name, value) = line.split_once('\t').or_else(|| line.split_once('='))?;
            let (name, value) = (name.trim(), value.trim());
            (!name.is_empty() && name.contains(SESSION_COOKIE_MARKER))
                .then(|| (name.to_string(), value.to_string()))
        })
        .collect()
}

#[async_trait]
impl Authenticator for CommandAuthenticator {
    async fn authenticate(&self) -> Result<SessionCredential> {
        tracing::info!("Logging in");
        tracing::debug!("Running login helper: {} {:?}", self.program, self.args);

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .env("LCR_USERNAME", &self.username)
            .env("LCR_PASSWORD", &self.password)
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| EtlError::AuthenticationError {
                message: format!("login helper did not finish within {:?}", self.timeout),
            })??;

        if !output.status.success() {
            return Err(EtlError::AuthenticationError {
                message: format!(
                    "login helper exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let cookies = parse_cookie_lines(&String::from_utf8_lossy(&output.stdout));
        if cookies.is_empty() {
            return Err(EtlError::AuthenticationError {
                message: format!("login helper printed no {} cookies", SESSION_COOKIE_MARKER),
            });
        }

        tracing::info!("🔑 Logged in ({} session cookies)", cookies.len());
        Ok(SessionCredential::new(cookies))
    }
}
