//! Users, sessions and rate limiting

use crate::models::{User, UserRole};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Advisory lock serializing registrations while the first admin is decided
const REGISTRATION_LOCK_KEY: i64 = 0x6369_7669_636c_656e;

/// The very first account becomes the admin.
fn role_for_new_user(has_users: bool) -> UserRole {
    if has_users {
        UserRole::User
    } else {
        UserRole::Admin
    }
}

/// Insert a user. Concurrent first registrations queue on an advisory lock,
/// so exactly one of them becomes admin.
pub async fn insert_user(
    pool: &PgPool,
    username: &str,
    password_hash: &str,
    display_name: Option<&str>,
) -> Result<User, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(REGISTRATION_LOCK_KEY)
        .execute(&mut *tx)
        .await?;

    let has_users: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users)")
        .fetch_one(&mut *tx)
        .await?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, password_hash, display_name, role)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(username)
    .bind(password_hash)
    .bind(display_name)
    .bind(role_for_new_user(has_users))
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(user)
}

pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await
}

pub async fn set_role(pool: &PgPool, user_id: Uuid, role: UserRole) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("UPDATE users SET role = $1 WHERE id = $2 RETURNING *")
        .bind(role)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn touch_last_login(pool: &PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

// =============================================================================
// Sessions
// =============================================================================

pub async fn create_session(
    pool: &PgPool,
    user_id: Uuid,
    token_hash: &str,
    expires_at: DateTime<Utc>,
    ip_address: &str,
    user_agent: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO sessions (user_id, token_hash, expires_at, ip_address, user_agent)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(user_id)
    .bind(token_hash)
    .bind(expires_at)
    .bind(ip_address)
    .bind(user_agent)
    .execute(pool)
    .await?;
    Ok(())
}

/// User owning an unexpired session
pub async fn find_session_user(pool: &PgPool, token_hash: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT u.* FROM sessions s
        JOIN users u ON u.id = s.user_id
        WHERE s.token_hash = $1 AND s.expires_at > NOW()
        "#,
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await
}

/// Delete a session, returning its owner
pub async fn delete_session(pool: &PgPool, token_hash: &str) -> Result<Option<Uuid>, sqlx::Error> {
    sqlx::query_scalar("DELETE FROM sessions WHERE token_hash = $1 RETURNING user_id")
        .bind(token_hash)
        .fetch_optional(pool)
        .await
}

pub async fn delete_expired_sessions(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= NOW()")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

// =============================================================================
// Rate limiting
// =============================================================================

/// True while `ip` has made fewer than `max_attempts` calls to `endpoint` in the last hour
pub async fn check_rate_limit(
    pool: &PgPool,
    ip: &str,
    endpoint: &str,
    max_attempts: i64,
) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM rate_limit_attempts
        WHERE ip_address = $1 AND endpoint = $2
        AND attempted_at > NOW() - INTERVAL '1 hour'
        "#,
    )
    .bind(ip)
    .bind(endpoint)
    .fetch_one(pool)
    .await?;

    Ok(count < max_attempts)
}

pub async fn record_attempt(pool: &PgPool, ip: &str, endpoint: &str) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO rate_limit_attempts (ip_address, endpoint) VALUES ($1, $2)")
        .bind(ip)
        .bind(endpoint)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn prune_rate_limit_attempts(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM rate_limit_attempts WHERE attempted_at < NOW() - INTERVAL '1 hour'",
    )
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_user_becomes_admin() {
        assert_eq!(role_for_new_user(false), UserRole::Admin);
    }

    #[test]
    fn test_later_users_are_plain_users() {
        assert_eq!(role_for_new_user(true), UserRole::User);
    }
}
