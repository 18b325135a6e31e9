use crate::state::AppState;
use crate::{api, auth};
use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

/// Assemble the quick-action HTTP surface.
///
/// The login endpoints are open; the action endpoints sit behind the
/// signed-token layer (proves the link) and the login layer (identifies the
/// operator), in that order.
pub fn build_http_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        .route("/api/v1/alert/quick-action", get(api::quick_action))
        .route(
            "/api/v1/alert/quick-silence",
            get(api::quick_silence_form).post(api::quick_silence_submit),
        )
        // layers run outside-in: token auth first, then login auth
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::quick_action_login_auth,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::quick_action_token_auth,
        ));

    Router::new()
        .route(
            "/api/v1/alert/quick-login",
            get(api::quick_login_page).post(api::quick_login_submit),
        )
        .merge(protected)
        .layer(cors)
        .with_state(state)
}
