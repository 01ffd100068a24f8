use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
mod middleware;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use axum::body::Body;
use http::{HeaderValue, StatusCode};
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::SmartIpKeyExtractor;
use tower_governor::{GovernorError, GovernorLayer};

mod config;
mod error;
mod routes;
mod services;
mod store;

use config::Config;
use services::dispatch::DispatchCoordinator;
use services::fcm::{FcmGateway, PushGateway};
use store::{NotificationStore, TokenRegistry};

pub struct AppState {
    pub store: Arc<NotificationStore>,
    pub tokens: Arc<TokenRegistry>,
    pub dispatcher: DispatchCoordinator,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portal_notifications=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Portal Notifications Service");

    // Initialize the push gateway; bad credentials fail startup rather
    // than the first dispatch.
    let gateway: Arc<dyn PushGateway> = Arc::new(FcmGateway::new(&config.fcm).await?);

    // All state lives for the process lifetime; a restart starts empty.
    let store = Arc::new(NotificationStore::new());
    let tokens = Arc::new(TokenRegistry::new());
    let dispatcher = DispatchCoordinator::new(store.clone(), tokens.clone(), gateway);

    let app_state = Arc::new(AppState {
        store,
        tokens,
        dispatcher,
    });

    let thread_shutdown = Arc::new(AtomicBool::new(false));

    // Rate limiter for the public trigger endpoints, with a custom error
    // handler returning the same error shape as `AppError::RateLimited`.
    let mut trigger_builder = GovernorConfigBuilder::default();
    trigger_builder.per_second(config.rate_limit.trigger_per_second.into());
    trigger_builder.burst_size(config.rate_limit.trigger_burst);
    trigger_builder.key_extractor(SmartIpKeyExtractor);
    trigger_builder.error_handler(|error: GovernorError| -> http::Response<Body> {
        match error {
            GovernorError::TooManyRequests { wait_time, headers } => {
                // `wait_time` is provided as seconds
                let retry_after = wait_time;

                let body = serde_json::json!({
                    "error": {
                        "code": "RATE_LIMITED",
                        "message": "Rate limit exceeded",
                        "details": { "retry_after_seconds": retry_after }
                    }
                })
                .to_string();

                let mut resp = http::Response::new(Body::from(body));
                *resp.status_mut() = StatusCode::TOO_MANY_REQUESTS;

                resp.headers_mut().insert(
                    http::header::CONTENT_TYPE,
                    http::HeaderValue::from_static("application/json"),
                );

                if let Some(hmap) = headers {
                    for (name, value) in hmap.iter() {
                        resp.headers_mut().append(name.clone(), value.clone());
                    }
                }

                resp.headers_mut().insert(
                    http::header::RETRY_AFTER,
                    http::HeaderValue::from_str(&retry_after.to_string()).unwrap(),
                );

                resp
            }
            GovernorError::UnableToExtractKey => {
                let body = serde_json::json!({
                    "error": {
                        "code": "INVALID_REQUEST",
                        "message": "Unable to determine client IP for rate limiting"
                    }
                })
                .to_string();

                let mut resp = http::Response::new(Body::from(body));
                *resp.status_mut() = StatusCode::BAD_REQUEST;
                resp.headers_mut().insert(
                    http::header::CONTENT_TYPE,
                    http::HeaderValue::from_static("application/json"),
                );
                resp
            }
            GovernorError::Other { code, msg, headers } => {
                let body = msg.unwrap_or_else(|| "Rate limiting error".to_string());
                let mut resp = http::Response::new(Body::from(body));
                let status = StatusCode::from_u16(code.as_u16())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                *resp.status_mut() = status;
                if let Some(hmap) = headers {
                    for (name, value) in hmap.iter() {
                        resp.headers_mut().append(name.clone(), value.clone());
                    }
                }
                resp
            }
        }
    });

    let trigger_gov_conf = Arc::new(
        trigger_builder
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Failed to build trigger governor config"))?,
    );

    // Background cleanup for the limiter storage
    let trigger_cleaner = {
        let limiter = trigger_gov_conf.limiter().clone();
        let interval = Duration::from_secs(60);
        let flag = thread_shutdown.clone();
        std::thread::spawn(move || {
            // Use smaller sleep granularity to allow quick shutdown.
            let tick = Duration::from_secs(1);
            loop {
                for _ in 0..interval.as_secs() {
                    if flag.load(Ordering::SeqCst) {
                        tracing::info!("Trigger rate limiter cleanup thread exiting");
                        return;
                    }
                    std::thread::sleep(tick);
                }
                tracing::debug!("trigger rate limiter size: {}", limiter.len());
                limiter.retain_recent();
            }
        })
    };

    let admin_trigger_rate_layer = GovernorLayer {
        config: trigger_gov_conf.clone(),
    };
    let user_trigger_rate_layer = GovernorLayer {
        config: trigger_gov_conf.clone(),
    };

    // Build router: both portals share token registration and history
    // routes; the trigger endpoints differ per role and carry the rate
    // limiter.
    let admin_routes = routes::tokens::router()
        .merge(routes::notifications::router())
        .merge(routes::notifications::admin_trigger_router().layer(admin_trigger_rate_layer));
    let user_routes = routes::tokens::router()
        .merge(routes::notifications::router())
        .merge(routes::notifications::user_trigger_router().layer(user_trigger_rate_layer));

    let app = Router::new()
        // Health check
        .route("/health", get(routes::health::health_check))
        // Admin portal surface
        .nest("/admin", admin_routes)
        // User portal surface
        .nest("/user", user_routes)
        // Add shared state
        .with_state(app_state.clone())
        // Security headers on every response
        .layer(axum::middleware::from_fn(
            middleware::headers::security_headers_middleware,
        ))
        // Add middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(
                    config
                        .server
                        .frontend_url
                        .parse::<HeaderValue>()
                        .expect("Invalid FRONTEND_URL for CORS"),
                )
                .allow_methods([http::Method::GET, http::Method::POST, http::Method::OPTIONS])
                .allow_headers([http::header::CONTENT_TYPE, http::header::ACCEPT]),
        );

    // Start server
    let host = config.server.host.clone();
    let port = config.server.port;
    let addr = format!("{}:{}", host, port);

    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let server_fut = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    );

    let thread_shutdown_clone = thread_shutdown.clone();

    let signal_fut = async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut term =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("Failed to bind SIGTERM");
            tokio::select! {
                _ = ctrl_c => {},
                _ = term.recv() => {},
            }
        }

        #[cfg(not(unix))]
        {
            ctrl_c.await.expect("Failed to bind Ctrl+C");
        }

        tracing::info!("Shutdown signal received");
        thread_shutdown_clone.store(true, Ordering::SeqCst);
    };

    tokio::select! {
        res = server_fut => {
            if let Err(e) = res {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = signal_fut => {
            tracing::info!("Signal handler completed; server future dropped to stop accepting new connections");
        }
    }

    // Join the cleanup thread; it checks `thread_shutdown` and should exit
    // quickly.
    if let Err(e) = trigger_cleaner.join() {
        tracing::warn!("Trigger cleanup thread join failed: {:?}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
