// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Account model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity record stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Account ID (UUID, also used as document ID)
    pub id: String,
    /// Login email, normalized to lowercase
    pub email: String,
    /// Argon2id PHC string
    pub password_hash: String,
    /// When the account was created
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Normalize an email address for storage and lookup.
    pub fn normalize_email(email: &str) -> String {
        email.trim().to_ascii_lowercase()
    }
}

/// Caller role, resolved from the admin-roles relation on every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn from_admin_flag(is_admin: bool) -> Self {
        if is_admin {
            Role::Admin
        } else {
            Role::User
        }
    }
}
