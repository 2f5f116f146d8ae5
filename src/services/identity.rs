// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account credentials: signup, login and password hashing.
//!
//! Passwords are hashed with Argon2id and stored as PHC strings. Roles are
//! not part of the account; they come from the admin-roles relation.

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{Account, Profile};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use serde::Deserialize;
use validator::Validate;

/// Credentials submitted to signup or login.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Credentials {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// Hash a password using Argon2id with a random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Password hashing failed: {}", e)))
}

/// Verify a password against a stored PHC string.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Stored hash is malformed: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AppError::Internal(anyhow::anyhow!(
            "Password verification failed: {}",
            e
        ))),
    }
}

/// Identity operations backed by the accounts collection.
#[derive(Clone)]
pub struct IdentityService {
    db: Database,
}

impl IdentityService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create an account and its default profile.
    pub async fn sign_up(&self, credentials: &Credentials) -> Result<Account> {
        credentials.validate()?;

        let now = Utc::now();
        let account = Account {
            id: uuid::Uuid::new_v4().to_string(),
            email: Account::normalize_email(&credentials.email),
            password_hash: hash_password(&credentials.password)?,
            created_at: now,
        };

        self.db.create_account(&account).await?;

        // The profile is provisioned after the account row. Readers that race
        // ahead of it fall back to a default profile.
        let profile = Profile::new_default(&account.id, &account.email, now);
        if let Err(e) = self.db.upsert_profile(&profile).await {
            tracing::warn!(account_id = %account.id, error = %e, "Profile provisioning failed");
        }

        tracing::info!(account_id = %account.id, "Account created");
        Ok(account)
    }

    /// Verify credentials. Unknown email and wrong password are indistinguishable.
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<Account> {
        let Some(account) = self.db.find_account_by_email(&credentials.email).await? else {
            return Err(AppError::InvalidCredentials);
        };

        if !verify_password(&credentials.password, &account.password_hash)? {
            tracing::info!(account_id = %account.id, "Password mismatch");
            return Err(AppError::InvalidCredentials);
        }

        Ok(account)
    }
}
