use axum::{
    Router, middleware,
    routing::{get, patch, post, put},
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::AppConfig,
    handlers::{attendance, events, health, registrations},
    middleware as app_middleware,
    state::AppState,
};

pub struct RollcallServer {
    addr: std::net::SocketAddr,
    app: Router,
}

pub fn build_app(cfg: &AppConfig, state: AppState) -> Router {
    let body_limit = cfg.server.body_limit_bytes;
    Router::new()
        // Health and info endpoints
        .route("/", get(health::root))
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        // Event capacity and organizer management
        .route("/events/{event_id}/capacity", put(events::put_capacity))
        .route("/events/{event_id}/occupancy", get(events::occupancy))
        .route(
            "/events/{event_id}/registrations",
            get(events::list_registrations).post(registrations::register),
        )
        .route(
            "/events/{event_id}/registrations/{volunteer_id}",
            get(registrations::check_registration).delete(registrations::withdraw),
        )
        .route(
            "/events/{event_id}/bans/{volunteer_id}",
            post(events::ban_volunteer).delete(events::unban_volunteer),
        )
        .route(
            "/events/{event_id}/volunteers/{volunteer_id}",
            axum::routing::delete(events::remove_volunteer),
        )
        // Attendance
        .route(
            "/registrations/{registration_id}/attendance",
            post(attendance::mark_attendance),
        )
        .route(
            "/registrations/{registration_id}/check-out",
            post(attendance::check_out),
        )
        .route(
            "/registrations/{registration_id}/exit-credential",
            get(attendance::exit_credential),
        )
        .route(
            "/registrations/{registration_id}/times",
            patch(attendance::edit_times),
        )
        .route("/scan/entry", post(attendance::scan_entry))
        .route("/scan/exit", post(attendance::scan_exit))
        .with_state(state)
        // Middleware stack (order: request id -> compression/cors/trace -> body limit)
        .layer(middleware::from_fn(app_middleware::request_id))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    let req_id = req
                        .extensions()
                        .get::<axum::http::HeaderValue>()
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %method,
                        http.target = %uri,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

pub struct ServerBuilder {
    addr: std::net::SocketAddr,
    config: AppConfig,
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: std::net::SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub fn build(self) -> RollcallServer {
        let state = AppState::from_config(&self.config);
        let app = build_app(&self.config, state);

        RollcallServer {
            addr: self.addr,
            app,
        }
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RollcallServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
