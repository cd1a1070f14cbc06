//! Web服务器

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::auth::{auth_middleware, login_handler, register_handler};
use crate::handlers::{api_root, health};
use crate::metrics::{metrics_handler, track_metrics};
use crate::state::AppState;
use crate::{diagnoses, images, logs, users};

pub struct WebServer {
    addr: SocketAddr,
    app: Router,
}

impl WebServer {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        Self {
            addr,
            app: create_app(state),
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        info!("Starting web server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| anyhow::anyhow!("Web server failed: {}", e))?;

        info!("Web server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// 构建完整路由
pub fn create_app(state: AppState) -> Router {
    Router::new()
        // 无需token的路由
        .route("/", get(api_root))
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        // 需要认证的路由
        .merge(protected_routes(state.clone()))
        // 全局中间件
        .layer(middleware::from_fn_with_state(state.clone(), track_metrics))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}

fn protected_routes(state: AppState) -> Router<AppState> {
    let upload_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    Router::new()
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/:id",
            get(users::get_user).put(users::update_user).delete(users::delete_user),
        )
        .route("/patients", get(users::list_patients))
        .route("/add-patient", post(users::add_patient))
        .route("/upload-image", post(images::upload_image).layer(upload_limit))
        .route("/images", get(images::list_images))
        .route(
            "/images/:id",
            get(images::get_image).put(images::update_image).delete(images::delete_image),
        )
        .route("/images/:id/file", get(images::get_image_file))
        .route(
            "/diagnoses",
            get(diagnoses::list_diagnoses).post(diagnoses::create_diagnosis),
        )
        .route(
            "/diagnoses/:id",
            get(diagnoses::get_diagnosis)
                .put(diagnoses::update_diagnosis)
                .delete(diagnoses::delete_diagnosis),
        )
        .route("/logs", get(logs::list_logs))
        .route("/logs/:id", get(logs::get_log))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
