//! LiveNest server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use axum::{Router, extract::DefaultBodyLimit};
use chrono::Duration;
use livenest_api::{AppState, Collaborators};
use livenest_common::{Config, LocalStorage};
use livenest_core::{
    Argon2Credentials, EventPublisherService, JwtTokenService, MailServiceRef, PayPalGateway,
    PaymentGatewayRef, SmtpMailer,
};
use livenest_realtime::{Broadcaster, RedisPubSub};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

/// How often idle real-time channels are dropped.
const CHANNEL_CLEANUP_INTERVAL: StdDuration = StdDuration::from_secs(300);

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

/// Initialize tracing; `LIVENEST_LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "livenest=debug,tower_http=debug".into());
    let json = std::env::var("LIVENEST_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Path part of the media base URL, without surrounding slashes.
fn files_path(base_url: &str) -> String {
    let path = match Url::parse(base_url) {
        Ok(url) => url.path().to_string(),
        // Relative, e.g. `/files`
        Err(_) => base_url.to_string(),
    };
    path.trim_matches('/').to_string()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine
    let _ = dotenvy::dotenv();
    init_tracing();

    info!("Starting LiveNest server...");

    let config = Config::load()?;

    let db = livenest_db::init(&config).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    livenest_db::migrate(&db).await?;
    info!("Migrations completed");

    // Real-time fan-out: Redis when configured, otherwise in process only
    let broadcaster = Broadcaster::new();
    let mut pubsub = None;
    let publisher: EventPublisherService = match &config.redis {
        Some(redis) => {
            let bridge = RedisPubSub::new(&redis.url, &redis.prefix, broadcaster.clone()).await?;
            bridge.start().await?;
            info!("Real-time events distributed through Redis");
            pubsub = Some(bridge.clone());
            Arc::new(bridge)
        }
        None => {
            info!("Redis not configured; real-time events stay in process");
            Arc::new(broadcaster.clone())
        }
    };

    let mail: Option<MailServiceRef> = match &config.mail {
        Some(mail_config) => Some(Arc::new(SmtpMailer::new(mail_config)?)),
        None => {
            warn!("Mail not configured; outgoing mail is disabled");
            None
        }
    };

    let gateway: Option<PaymentGatewayRef> = match &config.paypal {
        Some(paypal) => Some(Arc::new(PayPalGateway::new(paypal.clone())?)),
        None => {
            warn!("PayPal not configured; Premium checkout is disabled");
            None
        }
    };

    let state = AppState::new(
        Arc::new(db),
        Collaborators {
            credentials: Arc::new(Argon2Credentials::new()),
            tokens: Arc::new(JwtTokenService::new(&config.auth.jwt_secret)?),
            storage: Arc::new(LocalStorage::new(
                config.storage.base_path.clone(),
                config.storage.base_url.clone(),
            )),
            mail,
            gateway,
            publisher,
            broadcaster: broadcaster.clone(),
            plan: config.subscription.clone(),
            access_token_ttl: Duration::seconds(config.auth.access_token_ttl_secs),
            reset_token_ttl: Duration::seconds(config.auth.reset_token_ttl_secs),
        },
    );

    tokio::spawn({
        let broadcaster = broadcaster.clone();
        async move {
            let mut interval = tokio::time::interval(CHANNEL_CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                broadcaster.cleanup().await;
            }
        }
    });

    let mut app = Router::new().nest("/api", livenest_api::app(state));

    // Serve uploads ourselves when they live under a local path
    let files_route = files_path(&config.storage.base_url);
    if !files_route.is_empty() {
        app = app.nest_service(
            &format!("/{files_route}"),
            ServeDir::new(&config.storage.base_path),
        );
    }

    let app = app
        .layer(DefaultBodyLimit::max(config.storage.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let host: std::net::IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::from((host, config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(pubsub) = pubsub
        && let Err(e) = pubsub.shutdown().await
    {
        warn!(error = %e, "Failed to close Redis Pub/Sub");
    }

    info!("Server shutdown complete");
    Ok(())
}
