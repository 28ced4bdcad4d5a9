//! Shared HTTP transport, session context, and error types for the CLI.

use std::fmt::{self, Display, Formatter};
use std::io::{self, IsTerminal};
use std::time::Duration;

use anyhow::anyhow;
use reqwest::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use url::Url;

use crate::filter::IdConvention;

pub(crate) const HEADER_X_AUTH_TOKEN: &str = "X-Auth-Token";
pub(crate) const MANAGER_PATH: &str = "/redfish/v1/Managers/iDRAC.Embedded.1";
pub(crate) const LCLOG_PATH: &str = "/redfish/v1/Managers/iDRAC.Embedded.1/Logs/Lclog";
pub(crate) const LCLOG_ENTRIES_PATH: &str =
    "/redfish/v1/Managers/iDRAC.Embedded.1/LogServices/Lclog/Entries";

/// CLI-level error type. Variants map to the user-visible failure kinds.
#[derive(Debug)]
pub(crate) enum CliError {
    /// Bad or missing argument, raised before any request.
    Validation(String),
    /// The controller rejected the credentials or token (401).
    Auth(String),
    /// The controller does not expose the Lifecycle log endpoint.
    Unsupported(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub(crate) fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    /// Exit code used when strict exit codes are requested.
    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
            Self::Auth(_) => 4,
            Self::Unsupported(_) => 5,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) | Self::Auth(message) | Self::Unsupported(message) => {
                message.clone()
            }
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

/// How each request authenticates. Exactly one per run.
#[derive(Clone)]
pub(crate) enum Credentials {
    Basic { username: String, password: String },
    Token(String),
}

impl Credentials {
    pub(crate) const fn kind(&self) -> &'static str {
        match self {
            Self::Basic { .. } => "basic",
            Self::Token(_) => "x-auth-token",
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic { username, .. } => formatter
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Token(_) => formatter.write_str("Token(<redacted>)"),
        }
    }
}

/// Per-run session state. Built once at startup and read-only afterwards.
#[derive(Clone)]
pub(crate) struct SessionContext {
    pub(crate) client: Client,
    pub(crate) base_url: Url,
    pub(crate) credentials: Credentials,
    pub(crate) verify_tls: bool,
    pub(crate) convention: IdConvention,
}

impl SessionContext {
    /// Returns a copy carrying the detected message-ID convention.
    #[must_use]
    pub(crate) fn with_convention(self, convention: IdConvention) -> Self {
        Self { convention, ..self }
    }

    /// Resolve a controller path against the base URL.
    pub(crate) fn endpoint(&self, path: &str) -> CliResult<Url> {
        self.base_url
            .join(path)
            .map_err(|err| CliError::failure(anyhow!("invalid base URL: {err}")))
    }

    /// Issue an authenticated GET and capture status and body.
    pub(crate) async fn get(&self, url: Url) -> CliResult<HttpReply> {
        let path = url.path().to_string();
        let request = self.client.get(url);
        let request = match &self.credentials {
            Credentials::Token(token) => request.header(HEADER_X_AUTH_TOKEN, token),
            Credentials::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
        };

        let response = request
            .send()
            .await
            .map_err(|err| CliError::failure(anyhow!("request to {path} failed: {err}")))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|err| {
            CliError::failure(anyhow!("failed to read response from {path}: {err}"))
        })?;

        tracing::debug!(%path, status, bytes = body.len(), "controller replied");
        Ok(HttpReply { status, body })
    }
}

/// Raw reply from the controller.
#[derive(Debug, Clone)]
pub(crate) struct HttpReply {
    pub(crate) status: u16,
    pub(crate) body: String,
}

/// Construct the per-run HTTP client.
pub(crate) fn build_http_client(verify_tls: bool, timeout_secs: u64) -> CliResult<Client> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .danger_accept_invalid_certs(!verify_tls)
        .default_headers(default_headers)
        .build()
        .map_err(|err| CliError::failure(anyhow!("failed to build HTTP client: {err}")))
}

/// Parse the base URL override provided to the CLI.
pub(crate) fn parse_url(input: &str) -> Result<Url, String> {
    input
        .parse::<Url>()
        .map_err(|err| format!("invalid URL '{input}': {err}"))
}

/// `true` enables certificate verification; anything else disables it.
#[allow(clippy::unnecessary_wraps)]
pub(crate) fn parse_ssl(input: &str) -> Result<bool, String> {
    Ok(input.trim().eq_ignore_ascii_case("true"))
}

/// Derive the controller base URL from `--base-url` or `--ip`.
pub(crate) fn resolve_base_url(base_url: Option<Url>, host: Option<&str>) -> CliResult<Url> {
    if let Some(url) = base_url {
        return Ok(url);
    }
    let host = host
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| CliError::validation("iDRAC host is required (pass --ip or set IDRAC_HOST)"))?;
    format!("https://{host}")
        .parse::<Url>()
        .map_err(|err| CliError::validation(format!("invalid iDRAC host '{host}': {err}")))
}

/// Pick the credential mode. A session token wins over username/password; a
/// missing password is prompted for when stdin is interactive.
pub(crate) fn resolve_credentials(
    username: Option<String>,
    password: Option<String>,
    token: Option<String>,
) -> CliResult<Credentials> {
    if let Some(token) = token.map(|value| value.trim().to_string())
        && !token.is_empty()
    {
        return Ok(Credentials::Token(token));
    }

    let username = username
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            CliError::validation("credentials required: pass -u/--username or -x/--token")
        })?;

    let password = match password {
        Some(value) => value,
        None if io::stdin().is_terminal() => rpassword::prompt_password(format!(
            "\n- Argument -p not detected, pass in iDRAC user {username} password: "
        ))
        .map_err(|err| CliError::failure(anyhow!("failed to read password from stdin: {err}")))?,
        None => {
            return Err(CliError::validation(
                "password required; supply via --password when running non-interactively",
            ));
        }
    };

    Ok(Credentials::Basic { username, password })
}
