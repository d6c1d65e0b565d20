// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user Fitbit OAuth credential.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Access/refresh token pair with its absolute expiry.
///
/// The three fields are always written together; a store never holds a new
/// access token next to a stale refresh token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at,
        }
    }

    /// Build a credential from a token grant that is valid for
    /// `expires_in_secs` seconds from `now`.
    ///
    /// Returns `None` for a non-positive lifetime or one whose expiry
    /// cannot be represented.
    pub fn from_grant(
        access_token: String,
        refresh_token: String,
        expires_in_secs: i64,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        if expires_in_secs <= 0 {
            return None;
        }
        let expires_at = now.checked_add_signed(Duration::try_seconds(expires_in_secs)?)?;

        Some(Self {
            access_token,
            refresh_token,
            expires_at,
        })
    }

    /// True once `now + margin` reaches the expiry instant.
    pub fn is_expired(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        now + margin >= self.expires_at
    }

    /// A credential with no access token means the account was never linked.
    pub fn is_connected(&self) -> bool {
        !self.access_token.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Credential as persisted in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    pub access_token: String,
    pub refresh_token: String,
    /// When the access token expires (RFC 3339)
    pub expires_at: String,
    /// When this document was last written (RFC 3339)
    pub updated_at: String,
}

/// RFC 3339 with a `Z` suffix. Sub-second digits are kept so a stored
/// expiry reads back exactly as written.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

impl From<&Credential> for StoredCredential {
    fn from(credential: &Credential) -> Self {
        Self {
            access_token: credential.access_token.clone(),
            refresh_token: credential.refresh_token.clone(),
            expires_at: format_utc_rfc3339(credential.expires_at),
            updated_at: format_utc_rfc3339(Utc::now()),
        }
    }
}

impl TryFrom<StoredCredential> for Credential {
    type Error = chrono::ParseError;

    fn try_from(stored: StoredCredential) -> Result<Self, Self::Error> {
        let expires_at = DateTime::parse_from_rfc3339(&stored.expires_at)?.with_timezone(&Utc);
        Ok(Self {
            access_token: stored.access_token,
            refresh_token: stored.refresh_token,
            expires_at,
        })
    }
}
