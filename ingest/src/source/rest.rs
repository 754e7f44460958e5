//! Generic cursor-paginated REST source.
//!
//! Connection details come from the credential store:
//!
//! * `base_url` (required): prefix of every endpoint.
//! * `token`: static bearer token.
//! * `auth_url`, `username`, `password`: login endpoint returning a bearer
//!   token (`access_token` or `token` field) that is cached for the session.
//!
//! Without a token or a login endpoint the source is queried anonymously.

use std::time::Duration;

use ingest_config::Secret;
use ingest_config::shared::{LoadType, RestSourceConfig};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::credentials::Credentials;
use crate::error::{ErrorKind, IngestResult};
use crate::source::Source;
use crate::types::{PageRequest, PageResult, TableRow};
use crate::{bail, ingest_error};

/// Fields of a login response that may carry the bearer token.
const TOKEN_FIELDS: [&str; 2] = ["access_token", "token"];

/// Maximum number of response body bytes kept in an error detail.
const MAX_ERROR_BODY_LEN: usize = 512;

#[derive(Debug)]
enum RestAuth {
    Anonymous,
    Token(Secret),
    Login {
        auth_url: String,
        username: String,
        password: Secret,
    },
}

#[derive(Debug)]
pub struct RestSource {
    client: Client,
    base_url: String,
    auth: RestAuth,
    config: RestSourceConfig,
    session_token: RwLock<Option<SecretString>>,
}

impl RestSource {
    pub fn from_credentials(
        credentials: &Credentials,
        config: RestSourceConfig,
    ) -> IngestResult<Self> {
        let base_url = credentials.require("base_url")?.trim_end_matches('/').to_owned();

        let auth = if let Some(token) = credentials.get("token") {
            RestAuth::Token(Secret::new(token))
        } else if let Some(auth_url) = credentials.get("auth_url") {
            RestAuth::Login {
                auth_url: auth_url.to_owned(),
                username: credentials.require("username")?.to_owned(),
                password: Secret::new(credentials.require("password")?),
            }
        } else {
            RestAuth::Anonymous
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| {
                ingest_error!(ErrorKind::ConfigError, "Failed to build HTTP client", err)
            })?;

        Ok(Self {
            client,
            base_url,
            auth,
            config,
            session_token: RwLock::new(None),
        })
    }

    async fn bearer_token(&self) -> Option<String> {
        match &self.auth {
            RestAuth::Anonymous => None,
            RestAuth::Token(token) => Some(token.expose().to_owned()),
            RestAuth::Login { .. } => self
                .session_token
                .read()
                .await
                .as_ref()
                .map(|token| token.expose_secret().to_owned()),
        }
    }

    async fn login(&self, auth_url: &str, username: &str, password: &Secret) -> IngestResult<()> {
        let response = self
            .client
            .post(auth_url)
            .json(&json!({ "username": username, "password": password.expose() }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            bail!(
                ErrorKind::AuthenticationError,
                "Login endpoint rejected the credentials",
                status
            );
        }

        let body: serde_json::Value = response.json().await?;
        let Some(token) = TOKEN_FIELDS
            .iter()
            .find_map(|field| body.get(*field).and_then(serde_json::Value::as_str))
        else {
            bail!(
                ErrorKind::AuthenticationError,
                "Login response carries no token"
            );
        };

        *self.session_token.write().await = Some(SecretString::from(token.to_owned()));

        Ok(())
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }
}

impl Source for RestSource {
    async fn authenticate(&self) -> bool {
        let RestAuth::Login {
            auth_url,
            username,
            password,
        } = &self.auth
        else {
            return true;
        };

        if self.session_token.read().await.is_some() {
            return true;
        }

        match self.login(auth_url, username, password).await {
            Ok(()) => {
                debug!(auth_url, "authenticated against source");
                true
            }
            Err(err) => {
                warn!(auth_url, error = %err, "source authentication failed");
                false
            }
        }
    }

    fn initial_request(&self, _load_type: LoadType) -> PageRequest {
        PageRequest::default().with_param(
            self.config.page_size_param.clone(),
            self.config.page_size.to_string(),
        )
    }

    async fn fetch_page(
        &self,
        _load_type: LoadType,
        endpoint: &str,
        request: &PageRequest,
    ) -> IngestResult<PageResult> {
        let mut query: Vec<(&str, &str)> = request
            .params
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect();
        if let Some(cursor) = &request.cursor {
            query.push((self.config.cursor_param.as_str(), cursor.as_str()));
        }

        let mut builder = self.client.get(self.endpoint_url(endpoint)).query(&query);
        if let Some(token) = self.bearer_token().await {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            // Force a new login on the next authentication.
            self.session_token.write().await.take();
            bail!(
                ErrorKind::AuthenticationError,
                "Source API rejected the credentials",
                format!("{endpoint}: {status}")
            );
        }
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            truncate_on_char_boundary(&mut body, MAX_ERROR_BODY_LEN);
            bail!(
                ErrorKind::SourceFetchFailed,
                "Source API returned an error status",
                format!("{endpoint}: {status}: {body}")
            );
        }

        let body: serde_json::Value = response.json().await?;
        parse_page(body, &self.config, request)
    }
}

/// Extracts the records and the continuation of a response body.
///
/// A missing, null or empty cursor marks the final page.
pub fn parse_page(
    mut body: serde_json::Value,
    config: &RestSourceConfig,
    request: &PageRequest,
) -> IngestResult<PageResult> {
    let next_cursor = match body.pointer(&config.next_cursor_pointer) {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(cursor)) if cursor.is_empty() => None,
        Some(serde_json::Value::String(cursor)) => Some(cursor.clone()),
        Some(serde_json::Value::Number(cursor)) => Some(cursor.to_string()),
        Some(other) => bail!(
            ErrorKind::InvalidData,
            "Next cursor is neither a string nor a number",
            other
        ),
    };

    let records = match body.pointer_mut(&config.records_pointer) {
        Some(serde_json::Value::Array(records)) => std::mem::take(records),
        Some(serde_json::Value::Null) => Vec::new(),
        Some(_) => bail!(
            ErrorKind::InvalidData,
            "Records field is not an array",
            &config.records_pointer
        ),
        None => bail!(
            ErrorKind::InvalidData,
            "Response has no records field",
            &config.records_pointer
        ),
    };

    let rows = records.into_iter().map(TableRow::from_json).collect();

    Ok(match next_cursor {
        Some(cursor) => PageResult::more(rows, request.advance(cursor)),
        None => PageResult::last(rows),
    })
}

fn truncate_on_char_boundary(text: &mut String, max_len: usize) {
    if text.len() <= max_len {
        return;
    }

    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
}
