//! Hosted-backend collaborator: auth sessions and profile rows.
//!
//! The backend owns all durable state — this crate only reads sessions and
//! profile rows and asks for sign-outs. The [`Backend`] trait is the seam;
//! [`rest::RestBackend`] is the production implementation and tests
//! substitute in-memory fakes.

pub mod rest;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ─── Wire types ──────────────────────────────────────────────────────────────

/// Credential bundle issued by the hosted auth service.
///
/// Created and refreshed by the backend; immutable input to every
/// reconciliation attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_email: String,
    /// Absolute expiry instant. A session at or past this instant is never
    /// treated as valid.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Application-level user record keyed by email, distinct from the auth
/// session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub display_name: String,
}

/// Which top-level shell an authenticated profile mounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::User => write!(f, "user"),
        }
    }
}

// ─── Collaborator trait ──────────────────────────────────────────────────────

/// Operations the hosted backend must provide.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Current auth session, or `None` when signed out.
    async fn get_session(&self) -> Result<Option<Session>>;

    /// Invalidate the current session server-side.
    async fn sign_out(&self) -> Result<()>;

    /// Profile row for `email`, or `None` when no row matches.
    async fn query_profile(&self, email: &str) -> Result<Option<Profile>>;
}

// ─── Process-wide handle ─────────────────────────────────────────────────────

static GLOBAL: OnceCell<Arc<dyn Backend>> = OnceCell::new();

/// Install the process-wide backend handle.
///
/// Initialization happens at most once: a second call is rejected, so a
/// duplicate client can never replace the one already in use.
pub fn install(backend: Arc<dyn Backend>) -> Result<()> {
    GLOBAL
        .set(backend)
        .map_err(|_| anyhow::anyhow!("backend handle already installed"))
}

/// The installed backend handle.
pub fn global() -> Result<Arc<dyn Backend>> {
    GLOBAL
        .get()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("backend handle not installed — call backend::install first"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn expiry_is_inclusive_at_the_boundary() {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let session = Session {
            user_email: "a@b.c".into(),
            expires_at: at,
        };
        assert!(session.is_expired(at));
        assert!(session.is_expired(at + chrono::Duration::seconds(1)));
        assert!(!session.is_expired(at - chrono::Duration::seconds(1)));
    }

    #[test]
    fn global_handle_installs_exactly_once() {
        struct NullBackend;

        #[async_trait]
        impl Backend for NullBackend {
            async fn get_session(&self) -> Result<Option<Session>> {
                Ok(None)
            }
            async fn sign_out(&self) -> Result<()> {
                Ok(())
            }
            async fn query_profile(&self, _email: &str) -> Result<Option<Profile>> {
                Ok(None)
            }
        }

        install(Arc::new(NullBackend)).unwrap();
        assert!(install(Arc::new(NullBackend)).is_err());
        assert!(global().is_ok());
    }
}
