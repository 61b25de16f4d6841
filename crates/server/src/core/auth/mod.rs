//! Authentication Module
//!
//! Credential store (users table) and server-side sessions.

pub mod handlers;
pub mod middleware;
pub mod session;

use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{SqliteExecutor, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::db::{format_timestamp, parse_timestamp};
use crate::core::error::{Error, Result};
use session::SessionSigner;

/// User record stored in database
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Advisory; see [`User::has_active_premium`]
    pub is_premium: bool,
    pub premium_until: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub stripe_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Premium only counts while the paid period is still running
    pub fn has_active_premium(&self, now: DateTime<Utc>) -> bool {
        self.is_premium && self.premium_until.is_some_and(|until| until > now)
    }
}

type UserRow = (
    i64,
    String,
    String,
    bool,
    Option<String>,
    Option<String>,
    String,
);

const USER_COLUMNS: &str =
    "id, email, password_hash, is_premium, premium_until, stripe_customer_id, created_at";

fn user_from_row(row: UserRow) -> Result<User> {
    let (id, email, password_hash, is_premium, premium_until, stripe_customer_id, created_at) =
        row;
    Ok(User {
        id,
        email,
        password_hash,
        is_premium,
        premium_until: premium_until.as_deref().map(parse_timestamp).transpose()?,
        stripe_customer_id,
        created_at: parse_timestamp(&created_at)?,
    })
}

/// Session token for authenticated requests
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Auth manager handles all authentication
pub struct AuthManager {
    pool: SqlitePool,
    signer: SessionSigner,
    session_ttl: chrono::Duration,
}

impl AuthManager {
    pub fn new(pool: SqlitePool, secret_key: &str, session_ttl: chrono::Duration) -> Self {
        Self {
            pool,
            signer: SessionSigner::new(secret_key),
            session_ttl,
        }
    }

    /// Client-facing credential for a stored session
    pub fn credential(&self, session: &Session) -> Result<String> {
        self.signer.sign(&session.token)
    }

    /// Register a new user and open a session for them
    pub async fn register(&self, email: &str, password: &str) -> Result<(User, Session)> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(Error::Validation("Email and password required".to_string()));
        }

        // Check if email already exists
        let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(&self.pool)
            .await?;

        if existing.is_some() {
            return Err(Error::EmailTaken);
        }

        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash(password, DEFAULT_COST))
            .await
            .map_err(|e| Error::Internal(format!("hash task: {}", e)))?
            .map_err(|e| Error::Internal(format!("Failed to hash password: {}", e)))?;

        let created_at = Utc::now();
        let inserted = sqlx::query(
            "INSERT INTO users (email, password_hash, is_premium, created_at) VALUES (?, ?, 0, ?)",
        )
        .bind(&email)
        .bind(&password_hash)
        .bind(format_timestamp(created_at))
        .execute(&self.pool)
        .await;

        let user_id = match inserted {
            Ok(result) => result.last_insert_rowid(),
            // Lost a race with a concurrent registration of the same email
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(Error::EmailTaken)
            }
            Err(e) => return Err(e.into()),
        };

        let user = User {
            id: user_id,
            email,
            password_hash,
            is_premium: false,
            premium_until: None,
            stripe_customer_id: None,
            created_at,
        };
        let session = self.create_session(user.id).await?;

        info!("[Auth] User registered: {}", user.email);

        Ok((user, session))
    }

    /// Login user and create session
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, Session)> {
        let email = normalize_email(email);

        let Some(user) = self.find_by_email(&email).await? else {
            warn!("[Auth] Login attempt for unknown account");
            return Err(Error::Unauthenticated);
        };

        let password = password.to_string();
        let stored_hash = user.password_hash.clone();
        let valid = tokio::task::spawn_blocking(move || verify(password, &stored_hash))
            .await
            .map_err(|e| Error::Internal(format!("verify task: {}", e)))?
            .unwrap_or(false);

        if !valid {
            warn!("[Auth] Failed login attempt for {}", email);
            return Err(Error::Unauthenticated);
        }

        let session = self.create_session(user.id).await?;

        info!("[Auth] User logged in: {}", user.email);

        Ok((user, session))
    }

    async fn create_session(&self, user_id: i64) -> Result<Session> {
        let now = Utc::now();
        let session = Session {
            token: Uuid::new_v4().to_string(),
            user_id,
            created_at: now,
            expires_at: now + self.session_ttl,
        };

        sqlx::query(
            "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&session.token)
        .bind(session.user_id)
        .bind(format_timestamp(session.created_at))
        .bind(format_timestamp(session.expires_at))
        .execute(&self.pool)
        .await?;

        Ok(session)
    }

    /// Resolve a client credential to its live session
    pub async fn validate_session(&self, credential: &str) -> Result<Session> {
        let token = self
            .signer
            .verify(credential)
            .ok_or(Error::Unauthenticated)?;

        let row: Option<(String, i64, String, String)> = sqlx::query_as(
            "SELECT token, user_id, created_at, expires_at FROM sessions WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        let (token, user_id, created_at, expires_at) = row.ok_or(Error::Unauthenticated)?;
        let session = Session {
            token,
            user_id,
            created_at: parse_timestamp(&created_at)?,
            expires_at: parse_timestamp(&expires_at)?,
        };

        if session.expires_at <= Utc::now() {
            sqlx::query("DELETE FROM sessions WHERE token = ?")
                .bind(&session.token)
                .execute(&self.pool)
                .await?;
            return Err(Error::Unauthenticated);
        }

        Ok(session)
    }

    /// Logout user (invalidate session)
    pub async fn logout(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;

        info!("[Auth] Session invalidated");

        Ok(())
    }

    /// Get user by ID
    pub async fn get_user(&self, user_id: i64) -> Result<User> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        // Dangling session ids count as not logged in
        row.map(user_from_row).transpose()?.ok_or(Error::Unauthenticated)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;

        row.map(user_from_row).transpose()
    }

    /// Remember the payment provider's customer id
    pub async fn set_stripe_customer(&self, user_id: i64, customer_id: &str) -> Result<()> {
        sqlx::query("UPDATE users SET stripe_customer_id = ? WHERE id = ?")
            .bind(customer_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Grant premium until the given instant. Returns false for unknown users.
pub async fn grant_premium<'e, E>(executor: E, user_id: i64, until: DateTime<Utc>) -> Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("UPDATE users SET is_premium = 1, premium_until = ? WHERE id = ?")
        .bind(format_timestamp(until))
        .bind(user_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
