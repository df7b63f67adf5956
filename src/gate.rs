// SPDX-License-Identifier: MIT
//! Render decision for the embedding shell.
//!
//! Exactly one of four views is rendered for any reconciler state, in a
//! fixed precedence: a hard failure always wins, anything still moving
//! shows the loading view, and only an attempt that finished without a
//! user — and asked for it — shows the sign-in form.

use serde::Serialize;

use crate::backend::Role;
use crate::reconciler::{Phase, StateSnapshot};

/// One of the four mutually exclusive views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum RenderState {
    /// Bootstrap is in flight, or a retry window is open.
    Loading,
    /// Hard failure with a user-facing message; paired with the manual
    /// retry action.
    Error { message: String },
    /// No authenticated user — show the sign-in form.
    Login,
    /// Authenticated; `role` selects the admin or user shell.
    App { role: Role },
}

/// Map a state snapshot to its render state.
///
/// A snapshot that reached Succeeded without a user and without the
/// sign-in flag (a retry window) renders Loading — the sign-in form must
/// not flash mid-retry.
pub fn decide(snapshot: &StateSnapshot) -> RenderState {
    match snapshot.phase {
        Phase::Failed => RenderState::Error {
            message: snapshot
                .error_message()
                .unwrap_or("Something went wrong during sign-in.")
                .to_string(),
        },
        Phase::Idle | Phase::Running => RenderState::Loading,
        Phase::Succeeded => match (&snapshot.authenticated_user, snapshot.show_login) {
            (Some(profile), _) => RenderState::App { role: profile.role },
            (None, true) => RenderState::Login,
            (None, false) => RenderState::Loading,
        },
    }
}
