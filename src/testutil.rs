//! Shared test doubles for the backend collaborator.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::backend::{Backend, Profile, Role, Session};

/// Scripted reply for one backend call.
#[derive(Clone)]
pub enum Reply<T: Clone> {
    Ok(T),
    /// Settles after a delay — exercises interleavings without hanging.
    Slow(T, u64),
    /// Never settles — exercises deadline races.
    Hang,
    /// The call itself fails with this message.
    Fail(String),
}

/// Backend fake driven by per-call reply scripts.
///
/// Replies are consumed front-to-back; the last entry repeats once the
/// script runs out. Call counts are observable for single-flight checks.
pub struct MockBackend {
    session_replies: Mutex<Vec<Reply<Option<Session>>>>,
    profile_replies: Mutex<Vec<Reply<Option<Profile>>>>,
    pub session_calls: AtomicU32,
    pub profile_calls: AtomicU32,
    pub sign_outs: AtomicU32,
}

impl MockBackend {
    pub fn scripted(
        sessions: Vec<Reply<Option<Session>>>,
        profiles: Vec<Reply<Option<Profile>>>,
    ) -> Self {
        Self {
            session_replies: Mutex::new(sessions),
            profile_replies: Mutex::new(profiles),
            session_calls: AtomicU32::new(0),
            profile_calls: AtomicU32::new(0),
            sign_outs: AtomicU32::new(0),
        }
    }

    /// A signed-out backend: no session, no profile rows.
    pub fn signed_out() -> Self {
        Self::scripted(vec![Reply::Ok(None)], vec![Reply::Ok(None)])
    }

    fn next<T: Clone>(replies: &Mutex<Vec<Reply<T>>>) -> Reply<T> {
        let mut replies = replies.lock().unwrap();
        if replies.len() > 1 {
            replies.remove(0)
        } else {
            replies
                .first()
                .cloned()
                .expect("mock backend script is empty")
        }
    }

    async fn resolve<T: Clone>(reply: Reply<T>) -> Result<T> {
        match reply {
            Reply::Ok(value) => Ok(value),
            Reply::Slow(value, delay_ms) => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(value)
            }
            Reply::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            Reply::Fail(msg) => Err(anyhow::anyhow!(msg)),
        }
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn get_session(&self) -> Result<Option<Session>> {
        self.session_calls.fetch_add(1, Ordering::SeqCst);
        Self::resolve(Self::next(&self.session_replies)).await
    }

    async fn sign_out(&self) -> Result<()> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn query_profile(&self, _email: &str) -> Result<Option<Profile>> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        Self::resolve(Self::next(&self.profile_replies)).await
    }
}

/// A session expiring `ttl_ms` from now (negative = already expired).
pub fn session(email: &str, ttl_ms: i64) -> Session {
    Session {
        user_email: email.to_string(),
        expires_at: Utc::now() + chrono::Duration::milliseconds(ttl_ms),
    }
}

pub fn profile(email: &str, role: Role) -> Profile {
    Profile {
        id: "p-1".to_string(),
        email: email.to_string(),
        role,
        display_name: "Test User".to_string(),
    }
}
