use std::{net::SocketAddr, sync::Arc};

use axum::{Router, middleware, routing::get};
use tower_http::trace::TraceLayer;
use wyrm_auth::{AnonymousUsers, CurrentUserProvider, OAuthServer, passive_bearer_auth};

use crate::{config::AppConfig, handlers, identity::ProxyHeaderUsers, middleware as app_middleware};

/// Builds the application router and the authorization server behind it.
pub fn build_app(cfg: &AppConfig) -> anyhow::Result<(Router, OAuthServer)> {
    let users: Arc<dyn CurrentUserProvider> = if cfg.proxy_auth.enabled {
        let users = ProxyHeaderUsers::new(&cfg.proxy_auth.header).ok_or_else(|| {
            anyhow::anyhow!("invalid proxy_auth.header '{}'", cfg.proxy_auth.header)
        })?;
        Arc::new(users)
    } else {
        Arc::new(AnonymousUsers)
    };

    let oauth = OAuthServer::builder(cfg.auth.clone()).users(users).build()?;
    let app = build_router(cfg, &oauth);
    Ok((app, oauth))
}

/// Routes for an already assembled authorization server.
pub fn build_router(cfg: &AppConfig, oauth: &OAuthServer) -> Router {
    let body_limit = cfg.server.body_limit_bytes;

    let api = Router::new()
        .route("/api/v1/me", get(handlers::me))
        .route("/api/v1/whoami", get(handlers::whoami))
        .with_state(oauth.guard());

    Router::new()
        .route("/healthz", get(handlers::healthz))
        .merge(oauth.routes())
        .merge(api)
        .layer(middleware::from_fn_with_state(
            oauth.passive_state(),
            passive_bearer_auth,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    let req_id = req
                        .extensions()
                        .get::<axum::http::HeaderValue>()
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    // Only the path: query strings on /oauth carry codes and state.
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri().path(),
                        http.status_code = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(middleware::from_fn(app_middleware::request_id))
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub fn build(self) -> anyhow::Result<WyrmServer> {
        let (app, oauth) = build_app(&self.config)?;
        Ok(WyrmServer {
            addr: self.addr,
            app,
            oauth,
        })
    }
}

pub struct WyrmServer {
    addr: SocketAddr,
    app: Router,
    oauth: OAuthServer,
}

impl WyrmServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);

        let sweeper = tokio::spawn(sweep_expired(self.oauth.clone()));

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        sweeper.abort();
        Ok(())
    }
}

/// Periodically drops expired codes and pending authorizations.
async fn sweep_expired(oauth: OAuthServer) {
    let mut interval = tokio::time::interval(oauth.config().oauth.cleanup_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;
    loop {
        interval.tick().await;
        if let Err(e) = oauth.cleanup_expired().await {
            tracing::warn!(error = %e, "Expired record sweep failed");
        }
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
