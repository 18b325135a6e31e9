//! Quick-action HTTP handlers.

use crate::state::{AppState, AuthUser, TokenContext};
use crate::templates;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::{Extension, Form, Json};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;

fn html_ok(body: String) -> Response {
    (StatusCode::OK, Html(body)).into_response()
}

fn html_error(msg: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Html(templates::render_error_page(msg)),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct QuickActionQuery {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub fingerprint: String,
    #[serde(default = "default_duration")]
    pub duration: String,
}

fn default_duration() -> String {
    "1h".to_string()
}

/// `GET /api/v1/alert/quick-action`: claim / silence / resolve.
pub async fn quick_action(
    State(state): State<AppState>,
    Extension(token): Extension<TokenContext>,
    Extension(user): Extension<AuthUser>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Query(params): Query<QuickActionQuery>,
) -> Response {
    if params.action.is_empty() {
        return html_error("操作类型不能为空");
    }
    let fingerprint = if params.fingerprint.is_empty() {
        token.fingerprint.clone()
    } else {
        params.fingerprint.clone()
    };
    let client_ip = peer.ip().to_string();
    let service = &state.quick_actions;

    let (result, action_name) = match params.action.as_str() {
        "claim" => (
            service
                .claim_alert(&token.tenant_id, &fingerprint, &user.username, &client_ip)
                .await,
            "认领",
        ),
        "silence" => (
            service
                .silence_alert(
                    &token.tenant_id,
                    &fingerprint,
                    &params.duration,
                    &user.username,
                    None,
                    &client_ip,
                )
                .await,
            "静默",
        ),
        "resolve" => (
            service
                .resolve_alert(&token.tenant_id, &fingerprint, &user.username, &client_ip)
                .await,
            "标记已处理",
        ),
        other => return html_error(&format!("不支持的操作类型: {other}")),
    };

    match result {
        Ok(()) => html_ok(templates::render_success_page(action_name)),
        Err(e) => html_error(&e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub struct SilenceFormQuery {
    #[serde(default)]
    pub fingerprint: String,
    #[serde(default)]
    pub token: String,
}

/// `GET /api/v1/alert/quick-silence`: the custom-silence form.
pub async fn quick_silence_form(
    State(state): State<AppState>,
    Extension(token): Extension<TokenContext>,
    Query(params): Query<SilenceFormQuery>,
) -> Response {
    let fingerprint = if params.fingerprint.is_empty() {
        token.fingerprint.clone()
    } else {
        params.fingerprint.clone()
    };
    let alert_title = match state
        .quick_actions
        .get_alert_by_fingerprint(&token.tenant_id, &fingerprint)
        .await
    {
        Ok(alert) => alert.rule_name,
        Err(_) => "告警".to_string(),
    };
    html_ok(templates::render_silence_form(
        &alert_title,
        &fingerprint,
        &params.token,
    ))
}

#[derive(Debug, Deserialize)]
pub struct SilenceSubmitForm {
    #[serde(default)]
    pub fingerprint: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub reason: String,
}

/// `POST /api/v1/alert/quick-silence`: custom silence with mandatory reason.
pub async fn quick_silence_submit(
    State(state): State<AppState>,
    Extension(token): Extension<TokenContext>,
    Extension(user): Extension<AuthUser>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Form(form): Form<SilenceSubmitForm>,
) -> Response {
    if form.reason.trim().is_empty() {
        return html_error("静默原因不能为空");
    }
    if form.duration.is_empty() {
        return html_error("静默时长不能为空");
    }
    let fingerprint = if form.fingerprint.is_empty() {
        token.fingerprint.clone()
    } else {
        form.fingerprint.clone()
    };

    let result = state
        .quick_actions
        .silence_alert(
            &token.tenant_id,
            &fingerprint,
            &form.duration,
            &user.username,
            Some(form.reason.trim()),
            &peer.ip().to_string(),
        )
        .await;

    match result {
        Ok(()) => html_ok(templates::render_success_page("静默")),
        Err(e) => html_error(&e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginPageQuery {
    #[serde(default)]
    pub redirect: String,
}

/// `GET /api/v1/alert/quick-login`: the login page.
pub async fn quick_login_page(Query(params): Query<LoginPageQuery>) -> Response {
    html_ok(templates::render_login_page(&params.redirect))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub redirect: String,
}

/// `POST /api/v1/alert/quick-login`: returns `{code, msg, data:{token}}`;
/// the page script stores the token in the `Authorization` cookie.
pub async fn quick_login_submit(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Response {
    let member = match state.users.get_by_username(&request.username).await {
        Ok(Some(member)) => member,
        Ok(None) => return login_failure("用户名或密码错误"),
        Err(e) => {
            tracing::error!(error = %e, "登录查询用户失败");
            return login_failure("登录失败,请稍后重试");
        }
    };

    match faultline_storage::auth::verify_password(&request.password, &member.password) {
        Ok(true) => {}
        _ => return login_failure("用户名或密码错误"),
    }

    let token = match crate::auth::create_token(
        &state.config.auth.jwt_secret,
        &member.user_id,
        &member.username,
        state.config.auth.token_expire_secs,
    ) {
        Ok(token) => token,
        Err(e) => {
            tracing::error!(error = %e, "登录签发Token失败");
            return login_failure("登录失败,请稍后重试");
        }
    };

    Json(json!({
        "code": 200,
        "msg": "登录成功",
        "data": { "token": token },
    }))
    .into_response()
}

fn login_failure(msg: &str) -> Response {
    Json(json!({ "code": 400, "msg": msg, "data": null })).into_response()
}
