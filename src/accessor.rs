//! Session store accessor — bounded reads of the auth session and the
//! profile row, with proactive expiry invalidation.
//!
//! Both fetches race the backend call against the budget for their stage.
//! Running out of budget is a distinct [`BootstrapError::Timeout`], never
//! silently "no session": the reconciler decides whether a timeout earns a
//! retry, while a genuine signed-out state goes straight to the sign-in
//! view.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::backend::{Backend, Profile, Session};
use crate::config::BootstrapProfile;
use crate::deadline::with_deadline;
use crate::error::BootstrapError;

#[derive(Clone)]
pub struct SessionAccessor {
    backend: Arc<dyn Backend>,
    budgets: BootstrapProfile,
}

impl SessionAccessor {
    pub fn new(backend: Arc<dyn Backend>, budgets: BootstrapProfile) -> Self {
        Self { backend, budgets }
    }

    /// Current session, or `None` when signed out or expired.
    ///
    /// An expired session is invalidated server-side before `None` is
    /// returned — it must never surface as valid.
    pub async fn fetch_session(&self) -> Result<Option<Session>, BootstrapError> {
        let fetched = with_deadline(self.budgets.session_timeout, self.backend.get_session())
            .await
            .map_err(|e| BootstrapError::Timeout { limit_ms: e.limit_ms })?
            .map_err(BootstrapError::Transport)?;

        let Some(session) = fetched else {
            return Ok(None);
        };

        if session.is_expired(Utc::now()) {
            warn!(email = %session.user_email, "session expired — invalidating");
            if let Err(e) = self.backend.sign_out().await {
                warn!(err = %e, "sign-out of expired session failed");
            }
            return Ok(None);
        }

        Ok(Some(session))
    }

    /// Profile row for the session's email.
    ///
    /// `Ok(None)` means the session lapsed between the two fetches — the
    /// calls are not atomic, and a session that expired in between must
    /// not authenticate. A live session with no matching row is
    /// [`BootstrapError::NotFound`], which the reconciler handles as a
    /// soft "no user" state rather than a hard failure.
    pub async fn fetch_profile(
        &self,
        session: &Session,
    ) -> Result<Option<Profile>, BootstrapError> {
        if session.is_expired(Utc::now()) {
            warn!(email = %session.user_email, "session expired between fetches");
            return Ok(None);
        }

        let row = with_deadline(
            self.budgets.profile_lookup_timeout,
            self.backend.query_profile(&session.user_email),
        )
        .await
        .map_err(|e| BootstrapError::Timeout { limit_ms: e.limit_ms })?
        .map_err(BootstrapError::Transport)?;

        match row {
            Some(profile) => Ok(Some(profile)),
            None => {
                info!(email = %session.user_email, "no profile row for session email");
                Err(BootstrapError::NotFound {
                    email: session.user_email.clone(),
                })
            }
        }
    }
}
