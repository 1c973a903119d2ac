use super::handlers::{comments, reactions, sessions, sse};
use crate::config::UploadSettings;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, patch, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

const METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
];

fn cors_layer(allowed_origins: &str) -> CorsLayer {
    let any = || {
        CorsLayer::new()
            .allow_methods(METHODS)
            .allow_origin(Any)
            .allow_headers(Any)
    };
    if allowed_origins == "*" {
        return any();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    if origins.is_empty() {
        tracing::warn!("CORS config is invalid or empty, falling back to allow ANY.");
        any()
    } else {
        tracing::info!("CORS enabled for origins: {:?}", origins);
        CorsLayer::new()
            .allow_methods(METHODS)
            .allow_origin(origins)
            .allow_headers(Any)
    }
}

pub fn build_router(state: AppState, allowed_origins: &str, uploads: &UploadSettings) -> Router {
    let api = Router::new()
        .route(
            "/api/nodes/:node_id/comments",
            get(comments::list_comments).post(comments::post_comment),
        )
        .route("/api/nodes/:node_id/thread", get(comments::thread_view))
        .route("/api/nodes/:node_id/sessions", post(sessions::open_session))
        .route("/api/nodes/:node_id/events", get(sse::sse_handler))
        .route(
            "/api/comments/:id",
            patch(comments::edit_comment).delete(comments::delete_comment),
        )
        .route(
            "/api/comments/:id/reactions",
            get(reactions::list_reactions).post(reactions::toggle_reaction),
        )
        .route(
            "/api/sessions/:sid",
            get(sessions::get_session).delete(sessions::cancel_session),
        )
        .route("/api/sessions/:sid/draft", put(sessions::put_draft))
        .route("/api/sessions/:sid/preview", post(sessions::toggle_preview))
        .route("/api/sessions/:sid/refresh", post(sessions::refresh_edit_base))
        .route("/api/sessions/:sid/keys", post(sessions::key_press))
        .route("/api/sessions/:sid/publish", post(sessions::publish))
        .route(
            "/api/sessions/:sid/attachment",
            post(sessions::attach)
                .delete(sessions::detach)
                .layer(DefaultBodyLimit::max(uploads.max_bytes)),
        );

    let prefix = uploads.url_prefix.trim_end_matches('/');
    let app = if prefix.starts_with('/') && prefix.len() > 1 {
        api.nest_service(prefix, ServeDir::new(&uploads.dir))
    } else {
        tracing::warn!("Upload URL prefix {:?} is not servable, uploads are not exposed", prefix);
        api
    };

    app.layer(TraceLayer::new_for_http())
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}
