//! Quick-action authentication.
//!
//! Two middleware layers guard the action endpoints. The signed-token layer
//! proves the link came from a card we issued and scopes it to one
//! `(tenant, fingerprint)`. The login layer identifies the real operator:
//! a JWT from the `Authorization` header or cookie; anyone without one is
//! 302-redirected to the quick-login page with the original URL preserved.

use crate::state::{AppState, AuthUser, TokenContext};
use crate::templates;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Response};
use chrono::Utc;
use faultline_common::token::verify_quick_token;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

const TOKEN_TYPE: &str = "Bearer";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub iat: u64,
    pub exp: u64,
}

pub fn create_token(
    secret: &str,
    user_id: &str,
    username: &str,
    expire_secs: u64,
) -> anyhow::Result<String> {
    let now = Utc::now().timestamp() as u64;
    let claims = Claims {
        sub: user_id.to_string(),
        username: username.to_string(),
        iat: now,
        exp: now + expire_secs,
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

pub fn validate_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

fn html_error(msg: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Html(templates::render_error_page(msg)),
    )
        .into_response()
}

/// 快捷操作 Token 验证中间件
///
/// Reads the signed token from the query string (GET links) or the form
/// body (the silence form POST) and stores its payload in the request
/// extensions. Failures render the HTML error page.
pub async fn quick_action_token_auth(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let secret = &state.config.quick_action.secret_key;
    if secret.is_empty() {
        return html_error("快捷操作未配置密钥");
    }

    let (mut req, token) = match extract_token(req).await {
        Ok(pair) => pair,
        Err(response) => return response,
    };
    let Some(token) = token else {
        return html_error("缺少Token参数");
    };

    match verify_quick_token(&token, secret, Utc::now().timestamp()) {
        Ok(payload) => {
            req.extensions_mut().insert(TokenContext {
                tenant_id: payload.tenant_id,
                fingerprint: payload.fingerprint,
            });
            next.run(req).await
        }
        Err(e) => html_error(&format!("Token验证失败: {e}")),
    }
}

/// 快捷操作登录验证中间件
///
/// Unlike the admin API's JSON 401, a missing or invalid login redirects
/// (302) to the quick-login page, carrying the absolute original URL.
pub async fn quick_action_login_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = bearer_token(&req);
    let Some(token) = token else {
        return redirect_to_login(&state, &req);
    };

    let claims = match validate_token(&state.config.auth.jwt_secret, &token) {
        Ok(claims) => claims,
        Err(_) => return redirect_to_login(&state, &req),
    };

    // the account must still exist; deleted users lose their sessions
    match state.users.get_by_username(&claims.username).await {
        Ok(Some(member)) => {
            req.extensions_mut().insert(AuthUser {
                user_id: member.user_id,
                username: member.username,
            });
            next.run(req).await
        }
        Ok(None) => redirect_to_login(&state, &req),
        Err(e) => {
            tracing::error!(error = %e, "登录校验查询用户失败");
            redirect_to_login(&state, &req)
        }
    }
}

/// `Authorization` header first, cookie second (the browser flow).
fn bearer_token(req: &Request<Body>) -> Option<String> {
    if let Some(header_value) = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        let token = header_value.strip_prefix("Bearer ").unwrap_or(header_value);
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    let cookies = req
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?;
    for cookie in cookies.split(';') {
        let cookie = cookie.trim();
        if let Some(value) = cookie.strip_prefix("Authorization=") {
            let value = value.strip_prefix(TOKEN_TYPE).unwrap_or(value).trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

fn redirect_to_login(state: &AppState, req: &Request<Body>) -> Response {
    // the redirect target must be absolute: the link is opened from chat apps
    let api_url = state.config.quick_action.api_or_base_url();
    let original = format!(
        "{}{}",
        api_url,
        req.uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
    );
    let location = format!(
        "/api/v1/alert/quick-login?redirect={}",
        urlencoding::encode(&original)
    );
    Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, location)
        .body(Body::empty())
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Token from `?token=` or, for form posts, the buffered body. The body is
/// reassembled so handlers can still read it.
async fn extract_token(req: Request<Body>) -> Result<(Request<Body>, Option<String>), Response> {
    if let Some(token) = req
        .uri()
        .query()
        .and_then(|query| form_value(query, "token"))
    {
        return Ok((req, Some(token)));
    }

    if req.method() != Method::POST {
        return Ok((req, None));
    }

    let (parts, body) = req.into_parts();
    let bytes = match axum::body::to_bytes(body, 64 * 1024).await {
        Ok(bytes) => bytes,
        Err(_) => return Err(html_error("请求体读取失败")),
    };
    let token = std::str::from_utf8(&bytes)
        .ok()
        .and_then(|form| form_value(form, "token"));
    let req = Request::from_parts(parts, Body::from(bytes));
    Ok((req, token))
}

/// Minimal `application/x-www-form-urlencoded` / query-string field lookup.
pub(crate) fn form_value(encoded: &str, key: &str) -> Option<String> {
    for pair in encoded.split('&') {
        let Some((k, v)) = pair.split_once('=') else {
            continue;
        };
        if k == key {
            let v = v.replace('+', " ");
            return urlencoding::decode(&v).ok().map(|s| s.into_owned());
        }
    }
    None
}
