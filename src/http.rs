//! HTTP client for the Discord REST API.
//!
//! All outbound HTTP calls go through [`DiscordHttpClient`] so that auth
//! headers and error decoding live in one place. The provisioning pipeline
//! and the completion watcher only see the [`DiscordApi`] trait.

use std::future::Future;

use reqwest::Method;
use tracing::debug;

use crate::error::ApiError;
use crate::types::*;

const USER_AGENT: &str = concat!(
    "DiscordBot (https://github.com/create-discord-guild, ",
    env!("CARGO_PKG_VERSION"),
    ")"
);

// ---------------------------------------------------------------------------
// API surface used by the run
// ---------------------------------------------------------------------------

/// The REST endpoints the provisioning run depends on.
pub trait DiscordApi {
    /// `POST /guilds`
    fn create_guild(&self, body: &CreateGuild)
        -> impl Future<Output = Result<Guild, ApiError>> + Send;

    /// `GET /guilds/{guild_id}/channels`
    fn get_guild_channels(
        &self,
        guild_id: &str,
    ) -> impl Future<Output = Result<Vec<Channel>, ApiError>> + Send;

    /// `POST /channels/{channel_id}/invites`
    fn create_invite(
        &self,
        channel_id: &str,
        body: &CreateInvite,
    ) -> impl Future<Output = Result<Invite, ApiError>> + Send;

    /// `PUT /guilds/{guild_id}/members/{user_id}/roles/{role_id}`
    fn add_member_role(
        &self,
        guild_id: &str,
        user_id: &str,
        role_id: &str,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// `GET /oauth2/applications/@me`
    fn get_current_application(&self)
        -> impl Future<Output = Result<Application, ApiError>> + Send;
}

// ---------------------------------------------------------------------------
// DiscordHttpClient
// ---------------------------------------------------------------------------

/// A thin bot-authenticated client for the Discord REST API.
///
/// Cheap to clone (`reqwest::Client` is reference counted).
#[derive(Clone)]
pub struct DiscordHttpClient {
    token: String,
    base_url: String,
    client: reqwest::Client,
}

impl DiscordHttpClient {
    /// Create a new client with the given bot token and API base URL.
    pub fn new(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn build_request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header(reqwest::header::AUTHORIZATION, format!("Bot {}", self.token))
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
    }

    /// Send a request to `{base_url}/{path}` and return the raw body.
    ///
    /// Any status outside `200..300` becomes an [`ApiError`] decoded from the
    /// response body. There is no retry.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Vec<u8>, ApiError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!(method = %method, path, "discord request");

        let req = self.build_request(method.clone(), &url);
        let req = match body {
            Some(json) => req.json(json),
            // Discord's edge answers 411 to a bodyless write without a length.
            None if sends_body(&method) => req.header(reqwest::header::CONTENT_LENGTH, "0"),
            None => req,
        };

        let resp = req
            .send()
            .await
            .map_err(|e| ApiError::transport(format!("{} {}: {}", method, path, e)))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ApiError::transport(format!("{} {}: {}", method, path, e)))?;

        if status.is_success() {
            debug!(method = %method, path, status = status.as_u16(), "discord response");
            return Ok(bytes.to_vec());
        }

        Err(ApiError::from_response(status.as_u16(), &bytes))
    }

    /// Like [`request`](Self::request) but deserialises the response body as
    /// JSON.
    pub async fn request_json<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T, ApiError> {
        let bytes = self.request(method, path, body).await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            let raw: String = String::from_utf8_lossy(&bytes).chars().take(200).collect();
            ApiError::transport(format!("unexpected response from {}: {}: {}", path, e, raw))
        })
    }
}

fn sends_body(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

fn to_body<T: serde::Serialize>(body: &T) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::transport(e.to_string()))
}

impl DiscordApi for DiscordHttpClient {
    async fn create_guild(&self, body: &CreateGuild) -> Result<Guild, ApiError> {
        let body = to_body(body)?;
        self.request_json(Method::POST, "guilds", Some(&body)).await
    }

    async fn get_guild_channels(&self, guild_id: &str) -> Result<Vec<Channel>, ApiError> {
        let path = format!("guilds/{}/channels", guild_id);
        self.request_json(Method::GET, &path, None).await
    }

    async fn create_invite(&self, channel_id: &str, body: &CreateInvite) -> Result<Invite, ApiError> {
        let path = format!("channels/{}/invites", channel_id);
        let body = to_body(body)?;
        self.request_json(Method::POST, &path, Some(&body)).await
    }

    async fn add_member_role(
        &self,
        guild_id: &str,
        user_id: &str,
        role_id: &str,
    ) -> Result<(), ApiError> {
        let path = format!("guilds/{}/members/{}/roles/{}", guild_id, user_id, role_id);
        // Discord answers 204 No Content; don't parse JSON.
        self.request(Method::PUT, &path, None).await?;
        Ok(())
    }

    async fn get_current_application(&self) -> Result<Application, ApiError> {
        self.request_json(Method::GET, "oauth2/applications/@me", None)
            .await
    }
}

impl std::fmt::Debug for DiscordHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordHttpClient")
            .field("token", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
