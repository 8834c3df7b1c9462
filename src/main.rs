use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use mailcfg::auth::nonce::NonceKey;
use mailcfg::config::Config;
use mailcfg::mail::mailer::LettreMailer;
use mailcfg::store::memory::MemoryStore;
use mailcfg::store::pg::PgStore;
use mailcfg::store::{self, AppState, PrincipalStore, SettingsStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load();

    tracing_subscriber::registry()
        .with(cfg.log_filter())
        .with(fmt::layer().json())
        .init();

    // lettre and sqlx both use rustls; pin the provider before either builds a config.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let (settings, principals): (Arc<dyn SettingsStore>, Arc<dyn PrincipalStore>) =
        if let Some(url) = &cfg.database_url {
            let pg = Arc::new(PgStore::connect(url).await?);
            (
                pg.clone() as Arc<dyn SettingsStore>,
                pg as Arc<dyn PrincipalStore>,
            )
        } else {
            tracing::warn!("DATABASE_URL not set; settings are kept in memory only");
            let mem = Arc::new(MemoryStore::new());
            (
                mem.clone() as Arc<dyn SettingsStore>,
                mem as Arc<dyn PrincipalStore>,
            )
        };

    if cfg.nonce_secret.is_none() {
        tracing::warn!("MAILCFG_NONCE_SECRET not set; nonces will not survive a restart");
    }
    let nonces = NonceKey::from_secret(cfg.nonce_secret.as_deref())?;

    let state = AppState {
        settings,
        principals,
        mailer: Arc::new(LettreMailer),
        nonces,
        config: Arc::new(cfg.clone()),
    };

    store::bootstrap::run(&state).await?;

    let app = axum::Router::new()
        .route("/healthz", axum::routing::get(|| async { "ok" }))
        .merge(mailcfg::api::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = cfg.listen.parse()?;
    tracing::info!(%addr, "starting mailcfg");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("mailcfg stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
