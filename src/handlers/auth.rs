//! Authentication handlers
//!
//! Password verification produces a session token. The token travels as an
//! HttpOnly cookie and only its SHA-256 hash is stored.

use crate::db;
use crate::db::audit::AuditEvent;
use crate::models::*;
use crate::validation::validate_request;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::net::SocketAddr;

use super::error::{conflict_on_unique, ApiError, ApiResult};
use super::middleware::ClientIp;
use super::AppState;

/// Session cookie name
pub const SESSION_COOKIE: &str = "civic_lens_session";

/// Rate limit: max attempts per IP per hour
const MAX_LOGIN_ATTEMPTS: i64 = 10;
const MAX_REGISTER_ATTEMPTS: i64 = 5;

// =============================================================================
// Register / Login / Logout
// =============================================================================

/// Register a citizen account
pub async fn register(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(input): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let client_ip = get_client_ip(peer, &headers, &state.trusted_proxies);
    enforce_rate_limit(&state, &client_ip, "register", MAX_REGISTER_ATTEMPTS).await?;

    validate_request(&input)?;
    let username = input.username.trim();

    let password_hash = hash_password(&input.password).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        ApiError::PasswordHash
    })?;

    let user = db::users::insert_user(
        &state.pool,
        username,
        &password_hash,
        input.display_name.as_deref().map(str::trim),
    )
    .await
    .map_err(|e| conflict_on_unique(e, "Username is already taken"))?;

    tracing::info!("Registered user {} with role {:?}", user.username, user.role);
    db::audit::log_audit(
        &state.pool,
        AuditEvent::new("user_registered", "user")
            .entity(user.id)
            .actor(Some(user.id), Some(client_ip.as_str())),
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(UserResponse::from(user))),
    ))
}

/// Verify a password and open a session
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(input): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let client_ip = get_client_ip(peer, &headers, &state.trusted_proxies);
    enforce_rate_limit(&state, &client_ip, "login", MAX_LOGIN_ATTEMPTS).await?;

    // Don't reveal whether username exists
    let invalid = || ApiError::Unauthorized("Invalid username or password".to_string());

    let user = db::users::find_by_username(&state.pool, input.username.trim())
        .await?
        .ok_or_else(invalid)?;

    let parsed_hash = PasswordHash::new(&user.password_hash).map_err(|_| {
        tracing::error!("Invalid password hash in database for user {}", user.username);
        ApiError::PasswordHash
    })?;

    if Argon2::default()
        .verify_password(input.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(invalid());
    }

    let token = generate_session_token();
    let expires_at = Utc::now() + Duration::hours(state.session_expiry_hours);
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.chars().take(500).collect::<String>());

    db::users::create_session(
        &state.pool,
        user.id,
        &hash_token(&token),
        expires_at,
        &client_ip,
        user_agent.as_deref(),
    )
    .await?;

    if let Err(e) = db::users::touch_last_login(&state.pool, user.id).await {
        tracing::warn!("Failed to update last login for {}: {}", user.username, e);
    }

    db::audit::log_audit(
        &state.pool,
        AuditEvent::new("user_login", "user")
            .entity(user.id)
            .actor(Some(user.id), Some(client_ip.as_str())),
    )
    .await;

    let cookie = session_cookie(&token, state.session_expiry_hours * 3600, state.is_production);

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(ApiResponse::success(UserResponse::from(user))),
    ))
}

/// End the caller's session
pub async fn logout(
    State(state): State<AppState>,
    Extension(client_ip): Extension<ClientIp>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    if let Some(token) = extract_session_token(&headers) {
        if let Some(user_id) = db::users::delete_session(&state.pool, &hash_token(&token)).await? {
            db::audit::log_audit(
                &state.pool,
                AuditEvent::new("user_logout", "user")
                    .entity(user_id)
                    .actor(Some(user_id), client_ip.as_deref()),
            )
            .await;
        }
    }

    // Clear cookie
    let cookie = session_cookie("", 0, state.is_production);

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(ApiResponse::success(())),
    ))
}

// =============================================================================
// Caller Role
// =============================================================================

/// Role of the caller; `guest` without a session
pub async fn get_caller_role(Extension(actor): Extension<Actor>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(ApiResponse::success(RoleResponse { role: actor.role })),
    )
}

pub async fn is_caller_admin(Extension(actor): Extension<Actor>) -> impl IntoResponse {
    (StatusCode::OK, Json(ApiResponse::success(actor.is_admin())))
}

/// Features this server supports
pub async fn capabilities() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(ApiResponse::success(Capabilities {
            version: env!("CARGO_PKG_VERSION"),
            features: vec![
                "password-session",
                "photo-storage",
                "duplicate-check",
                "escalation",
                "escalation-sweep",
                "citizen-feedback",
                "official-responses",
            ],
        })),
    )
}

// =============================================================================
// Password & Token Utilities
// =============================================================================

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;

    for cookie in cookie_header.split(';') {
        let cookie = cookie.trim();
        if let Some(value) = cookie.strip_prefix(&format!("{}=", SESSION_COOKIE)) {
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }

    None
}

fn generate_session_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}

/// SHA-256 of a session token, as stored in the sessions table
pub(crate) fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}{}",
        SESSION_COOKIE,
        token,
        max_age_secs,
        if secure { "; Secure" } else { "" }
    )
}

// =============================================================================
// Client IP & Rate Limiting
// =============================================================================

/// Client IP for rate limiting and audit.
///
/// Forwarding headers are honoured only when the direct peer matches one of
/// the trusted proxy prefixes; otherwise anyone could pick their own IP.
pub(crate) fn get_client_ip(peer: SocketAddr, headers: &HeaderMap, trusted_proxies: &[String]) -> String {
    let peer_ip = peer.ip().to_string();
    if !trusted_proxies.iter().any(|p| peer_ip.starts_with(p.as_str())) {
        return peer_ip;
    }

    // Check X-Forwarded-For first (for reverse proxy setups)
    if let Some(first_ip) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return first_ip.to_string();
    }

    // Check X-Real-IP
    if let Some(real_ip) = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return real_ip.to_string();
    }

    peer_ip
}

/// Reject the call once `ip` has used up its hourly allowance for `endpoint`,
/// otherwise count this attempt.
pub(crate) async fn enforce_rate_limit(
    state: &AppState,
    ip: &str,
    endpoint: &str,
    max_attempts: i64,
) -> ApiResult<()> {
    if !db::users::check_rate_limit(&state.pool, ip, endpoint, max_attempts).await? {
        tracing::warn!("Rate limit hit for {} on {}", ip, endpoint);
        return Err(ApiError::TooManyRequests(
            "Too many attempts. Please try again later.".to_string(),
        ));
    }
    db::users::record_attempt(&state.pool, ip, endpoint).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer(ip: &str) -> SocketAddr {
        format!("{}:4000", ip).parse().unwrap()
    }

    #[test]
    fn test_extract_session_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; civic_lens_session=abc123; other=1"),
        );
        assert_eq!(extract_session_token(&headers), Some("abc123".to_string()));

        headers.insert(header::COOKIE, HeaderValue::from_static("civic_lens_session="));
        assert_eq!(extract_session_token(&headers), None);

        assert_eq!(extract_session_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_session_token_shape() {
        let a = generate_session_token();
        let b = generate_session_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_token_is_stable_sha256() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(hash_token("abc").len(), 64);
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("correct horse battery").unwrap();
        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(Argon2::default()
            .verify_password(b"correct horse battery", &parsed)
            .is_ok());
        assert!(Argon2::default().verify_password(b"wrong", &parsed).is_err());
    }

    #[test]
    fn test_forwarded_for_ignored_from_untrusted_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4"));
        let trusted = vec!["10.0.0.".to_string()];
        assert_eq!(get_client_ip(peer("203.0.113.9"), &headers, &trusted), "203.0.113.9");
    }

    #[test]
    fn test_forwarded_for_used_from_trusted_proxy() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4, 10.0.0.2"));
        let trusted = vec!["10.0.0.".to_string()];
        assert_eq!(get_client_ip(peer("10.0.0.7"), &headers, &trusted), "1.2.3.4");

        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("5.6.7.8"));
        assert_eq!(get_client_ip(peer("10.0.0.7"), &headers, &trusted), "5.6.7.8");
    }

    #[test]
    fn test_session_cookie_flags() {
        let cookie = session_cookie("tok", 3600, true);
        assert!(cookie.starts_with("civic_lens_session=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.ends_with("; Secure"));
        assert!(!session_cookie("tok", 3600, false).contains("Secure"));
    }
}
