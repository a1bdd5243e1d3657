// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, process::ExitCode, time::Duration};

use axum_server::{tls_rustls::RustlsConfig, Handle};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use school_portal_server::{
    api::router,
    config::{AppConfig, LogFormat},
    seed::{seed_admin, seed_demo},
    state::AppState,
};

/// In-flight requests get this long to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(config.log_format);
    tracing::info!(?config, "Loaded configuration");

    // Must happen before any TLS operation.
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::warn!("A rustls crypto provider was already installed");
    }

    let state = match AppState::open(config.clone()) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, data_dir = %config.data_dir.display(), "Failed to open storage");
            return ExitCode::FAILURE;
        }
    };

    if config.seed_demo {
        if let Err(e) = seed_demo(&state) {
            tracing::error!(error = %e, "Failed to seed demo data");
            return ExitCode::FAILURE;
        }
    }

    if let Err(e) = seed_admin(&state) {
        tracing::error!(error = %e, "Failed to seed administrator");
        return ExitCode::FAILURE;
    }

    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(error = %e, host = %config.host, "Invalid bind address");
            return ExitCode::FAILURE;
        }
    };

    let app = router(state);
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    let handle = Handle::new();
    let served = match &config.tls {
        Some(tls) => {
            let tls_config = match RustlsConfig::from_pem_file(&tls.cert, &tls.key).await {
                Ok(tls_config) => tls_config,
                Err(e) => {
                    tracing::error!(error = %e, cert = %tls.cert.display(), "Failed to load TLS certificate");
                    return ExitCode::FAILURE;
                }
            };
            let server = axum_server::bind_rustls(addr, tls_config).handle(handle.clone());
            tokio::spawn(drain_on(shutdown.clone(), {
                let handle = handle.clone();
                move || handle.graceful_shutdown(Some(SHUTDOWN_GRACE))
            }));
            tracing::info!(%addr, "School portal listening on https (docs at /docs)");
            server.serve(app.into_make_service()).await
        }
        None => {
            let server = axum_server::bind(addr).handle(handle.clone());
            tokio::spawn(drain_on(shutdown.clone(), {
                let handle = handle.clone();
                move || handle.graceful_shutdown(Some(SHUTDOWN_GRACE))
            }));
            tracing::info!(%addr, "School portal listening on http (docs at /docs)");
            server.serve(app.into_make_service()).await
        }
    };

    match served {
        Ok(()) => {
            tracing::info!("Graceful shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Run `drain` once `shutdown` fires.
async fn drain_on(shutdown: CancellationToken, drain: impl FnOnce()) {
    shutdown.cancelled().await;
    drain();
}

/// Resolves on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT, starting graceful shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
