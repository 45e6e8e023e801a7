//! Identity and session state model.
//!
//! # Responsibility
//! - Define the signed-in identity record and the derived session state.
//! - Define the outcome envelope returned by mutating session operations.
//!
//! # Invariants
//! - `Identity::id` never changes once assigned; linking mutates only
//!   `email` and `is_anonymous`.
//! - `SessionState::Authenticated` iff an identity is present.
//! - `SessionState::Loading` is only an initial value and is never produced by
//!   `SessionState::project`.

use serde::{Deserialize, Serialize};

/// Identity id; also used as the key of the owning item collection.
pub type SessionKey = String;

/// Email assigned to every anonymous identity.
pub const ANONYMOUS_EMAIL: &str = "anonymous@temp.com";

/// The single signed-in user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: SessionKey,
    pub email: String,
    pub is_anonymous: bool,
}

impl Identity {
    /// Builds a permanent identity whose id is derived from `email`.
    pub fn permanent(email: impl Into<String>) -> Self {
        let email = email.into();
        Self {
            id: format!("user-{}", stable_hash(email.as_str())),
            email,
            is_anonymous: false,
        }
    }

    /// Builds an anonymous identity with a fresh random id.
    pub fn anonymous() -> Self {
        Self {
            id: format!("anon-{}", uuid::Uuid::new_v4()),
            email: ANONYMOUS_EMAIL.to_string(),
            is_anonymous: true,
        }
    }

    /// Returns the upgraded copy of an anonymous identity, keeping `id`.
    ///
    /// Returns `None` when this identity is already permanent.
    pub fn linked(&self, email: impl Into<String>) -> Option<Self> {
        if !self.is_anonymous {
            return None;
        }
        Some(Self {
            id: self.id.clone(),
            email: email.into(),
            is_anonymous: false,
        })
    }
}

/// Three-way view of the current identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    /// Observation pipeline not wired yet.
    Loading,
    Unauthenticated,
    Authenticated { identity: Identity },
}

impl SessionState {
    pub fn project(identity: Option<Identity>) -> Self {
        match identity {
            Some(identity) => Self::Authenticated { identity },
            None => Self::Unauthenticated,
        }
    }

    /// Item collection key for the active session, if any.
    pub fn active_key(&self) -> Option<&str> {
        match self {
            Self::Authenticated { identity } => Some(identity.id.as_str()),
            Self::Loading | Self::Unauthenticated => None,
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Authenticated { identity } => Some(identity),
            Self::Loading | Self::Unauthenticated => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// Result of a mutating session operation. Never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum ActionStatus {
    Success,
    Failure(String),
}

impl ActionStatus {
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(message.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn failure_message(&self) -> Option<&str> {
        match self {
            Self::Success => None,
            Self::Failure(message) => Some(message.as_str()),
        }
    }
}

/// 32-bit polynomial string hash over UTF-16 code units.
///
/// Stable across runs and platforms, so a given email always maps to the
/// same `user-<hash>` id.
pub fn stable_hash(value: &str) -> i32 {
    value
        .encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
}
