//! CallGuard Server Entry Point

use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use callguard_config::{load_settings, Settings};
use callguard_core::PhoneNumber;
use callguard_screening::{
    create_line_directory, AlertDispatcher, RegistryConfig, ScreeningEngine, SessionRegistry,
};
use callguard_server::{create_router, init_metrics, AppState, ServerError};
use callguard_telephony::{create_call_control, create_notifier};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Priority: env vars > config/{env} > config/default > defaults
    let env = std::env::var("CALLGUARD_ENV").ok();
    let config = match load_settings(env.as_deref()) {
        Ok(settings) => {
            // Tracing not yet initialized
            eprintln!(
                "Loaded configuration from files (env: {})",
                env.as_deref().unwrap_or("default")
            );
            settings
        },
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return Err(e.into());
        },
    };

    init_tracing(&config);

    tracing::info!("Starting CallGuard Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        environment = ?config.environment,
        dry_run = config.telephony.dry_run,
        "Configuration loaded"
    );

    let metrics_handle = if config.observability.metrics_enabled {
        let handle = init_metrics();
        if handle.is_some() {
            tracing::info!("Initialized Prometheus metrics at /metrics");
        }
        handle
    } else {
        None
    };

    let engine = Arc::new(build_engine(&config)?);
    let sweeper = engine.registry().start_sweeper();

    let mut state = AppState::new(config.clone(), Arc::clone(&engine));
    if let Some(handle) = metrics_handle {
        state = state.with_metrics(handle);
    }

    let app = create_router(state);

    let ip: std::net::IpAddr = config
        .server
        .host
        .parse()
        .map_err(|e| ServerError::Startup(format!("invalid server.host {}: {}", config.server.host, e)))?;
    let addr = SocketAddr::new(ip, config.server.port);
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = sweeper.send(true);
    engine.alerts().drain().await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wire directory, provider clients and registry into the engine
fn build_engine(config: &Settings) -> Result<ScreeningEngine, ServerError> {
    let directory = create_line_directory(&config.lines)?;
    let call_control = create_call_control(&config.telephony)?;
    let notifier = create_notifier(&config.telephony)?;

    let sender = config
        .telephony
        .alert_sender
        .as_deref()
        .and_then(PhoneNumber::parse);
    let alerts = Arc::new(AlertDispatcher::new(notifier, sender));
    let registry = Arc::new(SessionRegistry::new(RegistryConfig::from_config(&config.sessions)));

    tracing::info!(
        line_directory = directory.kind(),
        dry_run = call_control.is_dry_run(),
        "Initialized screening engine"
    );

    Ok(ScreeningEngine::new(
        directory,
        call_control,
        alerts,
        registry,
        &config.screening,
    ))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

fn init_tracing(config: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.observability.log_level;
        let crates = ["callguard", "callguard_server", "callguard_screening", "callguard_telephony", "callguard_core", "callguard_config"];
        let mut directives: Vec<String> = crates.iter().map(|c| format!("{}={}", c, level)).collect();
        directives.push("tower_http=info".to_string());
        directives.join(",").into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    subscriber.with(fmt_layer).init();
}
