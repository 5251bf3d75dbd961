use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse},
    routing::{get, post},
    Router,
};
use minijinja::context;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;
use super::static_files::static_handler;
use super::templates::render_template;

// UI Routes - web interface
pub fn ui_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::ui::index_handler))
        .route("/static/{*path}", get(static_handler))
}

// API Routes - JSON API used by the UI
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new().nest(
        "/api",
        Router::new()
            // Question answering
            .route("/ask", post(handlers::api::ask))
            .route("/generate", post(handlers::api::generate_sql))
            .route("/query", post(handlers::api::execute_query))
            .route("/explain", post(handlers::api::explain_query))
            .route("/chart", post(handlers::api::chart_config))
            .route("/suggestions", get(handlers::api::list_suggestions))

            // Data export
            .route("/export/{format}", post(handlers::api::export_data))

            // Table access
            .route("/schema", get(handlers::api::get_schema))
            .route(
                "/prompts",
                get(handlers::api::list_prompts).post(handlers::api::create_prompt),
            )

            // System status
            .route("/status", get(handlers::api::system_status)),
    )
}

async fn not_found(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = render_template(
        &state.template_env,
        "error.html",
        context! { status => 404, message => "Page not found" },
    );
    (StatusCode::NOT_FOUND, Html(body))
}

/// Full application with middleware, ready to serve.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(ui_routes())
        .merge(api_routes())
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(CompressionLayer::new())
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("no-store"),
                )),
        )
        .with_state(state)
}
