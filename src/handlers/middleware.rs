//! Middleware for caller resolution, authorization and security headers

use crate::db;
use crate::engine::EngineError;
use crate::handlers::auth::{extract_session_token, get_client_ip, hash_token};
use crate::handlers::error::ApiError;
use crate::handlers::AppState;
use crate::models::Actor;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

/// Client address recorded with audit events. `None` when the connection
/// info is unavailable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientIp(pub Option<String>);

impl ClientIp {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

/// Resolve the caller from the session cookie and insert it as
/// `Extension<Actor>`, next to its `Extension<ClientIp>`. Requests without a
/// valid session proceed as guests.
pub async fn resolve_caller(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = extract_session_token(request.headers());
    let actor = match token {
        Some(token) => match db::users::find_session_user(&state.pool, &hash_token(&token)).await {
            Ok(Some(user)) => Actor::user(user.id, user.role),
            Ok(None) => Actor::guest(),
            Err(e) => return ApiError::Database(e).into_response(),
        },
        None => Actor::guest(),
    };

    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(peer)| get_client_ip(*peer, request.headers(), &state.trusted_proxies));

    request.extensions_mut().insert(actor);
    request.extensions_mut().insert(ClientIp(client_ip));
    next.run(request).await
}

/// Gate for `/api/admin`; runs after [`resolve_caller`].
pub async fn require_admin(request: Request<Body>, next: Next) -> Response {
    let is_admin = request
        .extensions()
        .get::<Actor>()
        .map(Actor::is_admin)
        .unwrap_or(false);

    if !is_admin {
        return ApiError::Engine(EngineError::Forbidden).into_response();
    }

    next.run(request).await
}

/// Security headers middleware
pub async fn security_headers(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        "Content-Security-Policy",
        HeaderValue::from_static(
            "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' data: blob:; font-src 'self'; form-action 'self'; base-uri 'self'; frame-ancestors 'none'",
        ),
    );

    if state.is_production {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=63072000; includeSubDomains"),
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::PhotoStore;
    use axum::{middleware::from_fn_with_state, routing::get, Extension, Router};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    fn state(trusted_proxies: &[&str]) -> AppState {
        AppState {
            pool: PgPoolOptions::new()
                .connect_lazy("postgres://localhost/civic_lens")
                .unwrap(),
            photos: PhotoStore::new(std::env::temp_dir().join("civic-lens-middleware-test")),
            max_photo_size: 1024,
            session_expiry_hours: 8,
            is_production: false,
            trusted_proxies: trusted_proxies.iter().map(|p| p.to_string()).collect(),
        }
    }

    async fn seen_ip(state: AppState, request: Request<Body>) -> String {
        let app = Router::new()
            .route(
                "/ip",
                get(|Extension(ip): Extension<ClientIp>| async move {
                    ip.0.unwrap_or_else(|| "none".to_string())
                }),
            )
            .layer(from_fn_with_state(state.clone(), resolve_caller))
            .with_state(state);

        let response = app.oneshot(request).await.unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    fn request_from(peer: &str) -> Request<Body> {
        let mut request = Request::builder()
            .uri("/ip")
            .header("x-forwarded-for", "198.51.100.4")
            .body(Body::empty())
            .unwrap();
        let peer: SocketAddr = format!("{}:40000", peer).parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(peer));
        request
    }

    #[test]
    fn test_client_ip_is_recorded_for_handlers() {
        tokio_test::block_on(async {
            let ip = seen_ip(state(&[]), request_from("203.0.113.9")).await;
            assert_eq!(ip, "203.0.113.9");
        });
    }

    #[test]
    fn test_client_ip_follows_trusted_proxy() {
        tokio_test::block_on(async {
            let ip = seen_ip(state(&["10.0.0."]), request_from("10.0.0.7")).await;
            assert_eq!(ip, "198.51.100.4");
        });
    }

    #[test]
    fn test_client_ip_absent_without_connect_info() {
        tokio_test::block_on(async {
            let request = Request::builder().uri("/ip").body(Body::empty()).unwrap();
            assert_eq!(seen_ip(state(&[]), request).await, "none");
        });
    }
}
