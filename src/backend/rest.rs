//! REST implementation of the backend collaborator.
//!
//! Talks to the hosted service's auth and row endpoints:
//! `GET /auth/v1/session`, `POST /auth/v1/logout`, and
//! `GET /rest/v1/profiles?email=eq.{email}&limit=1`. Requests carry the
//! project API key plus a bearer token, matching the hosted client
//! contract. Response bodies are camelCase JSON.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{Backend, Profile, Session};

/// Hosted-backend client over HTTP.
pub struct RestBackend {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestBackend {
    /// Build a client for `base_url` authenticated with `api_key`.
    ///
    /// The transport-level timeout is deliberately generous; per-operation
    /// budgets are enforced by the caller's deadline race.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn auth_url(&self, tail: &str) -> String {
        format!("{}/auth/v1/{tail}", self.base_url)
    }
}

// ─── API types (deserialize responses) ───────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    user: SessionUser,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct SessionUser {
    email: String,
}

#[async_trait]
impl Backend for RestBackend {
    async fn get_session(&self) -> Result<Option<Session>> {
        let resp = self
            .http
            .get(self.auth_url("session"))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("session request failed")?;

        // Signed out — the auth service answers with an empty 204/404.
        if resp.status() == reqwest::StatusCode::NO_CONTENT
            || resp.status() == reqwest::StatusCode::NOT_FOUND
        {
            return Ok(None);
        }

        let body: Option<SessionResponse> = resp
            .error_for_status()
            .context("session request rejected")?
            .json()
            .await
            .context("malformed session response")?;

        Ok(body.map(|s| Session {
            user_email: s.user.email,
            expires_at: s.expires_at,
        }))
    }

    async fn sign_out(&self) -> Result<()> {
        self.http
            .post(self.auth_url("logout"))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("logout request failed")?
            .error_for_status()
            .context("logout request rejected")?;
        Ok(())
    }

    async fn query_profile(&self, email: &str) -> Result<Option<Profile>> {
        let rows: Vec<Profile> = self
            .http
            .get(format!("{}/rest/v1/profiles", self.base_url))
            .query(&[("email", format!("eq.{email}")), ("limit", "1".to_string())])
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("profile query failed")?
            .error_for_status()
            .context("profile query rejected")?
            .json()
            .await
            .context("malformed profile response")?;

        Ok(rows.into_iter().next())
    }
}
