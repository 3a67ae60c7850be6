pub mod auth;
pub mod embed;
pub mod error;
pub mod render;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::{middleware, Router};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with all pages, API routes and middleware.
/// Used by `serve_on()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let protected = Router::new()
        // Dashboard
        .route("/", get(routes::dashboard::dashboard))
        .route("/logout", post(routes::session::logout))
        // Form actions
        .route("/actions/update", post(routes::actions::update_action))
        .route("/actions/{script}", post(routes::actions::run_action))
        // JSON API
        .route("/api/status", get(routes::api::status))
        .route("/api/branches", get(routes::api::branches))
        .route("/api/logs/{name}", get(routes::api::log))
        .route("/api/run/{script}", post(routes::api::run))
        .route("/api/update", post(routes::api::update))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            auth::require_login,
        ));

    Router::new()
        .merge(protected)
        .route(
            "/login",
            get(routes::session::login_form).post(routes::session::login),
        )
        .route("/assets/{*path}", get(embed::asset_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Serve the dashboard on a pre-bound listener until the server stops.
pub async fn serve_on(
    app_state: AppState,
    listener: tokio::net::TcpListener,
    open_browser: bool,
) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let app = build_router(app_state);

    tracing::info!("deploy dashboard listening on http://localhost:{actual_port}");

    if open_browser {
        let url = format!("http://localhost:{actual_port}");
        let _ = open::that(&url);
    }

    axum::serve(listener, app).await?;
    Ok(())
}
