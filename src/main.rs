// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, sync::Arc};

use claims_gateway::{
    api::router,
    config::{GatewayConfig, Settings},
    service::GatewayService,
    state::AppState,
    storage::{
        descriptors::{load_seed_file, seed_descriptors},
        GatewayDatabase,
    },
    telemetry,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    let config = GatewayConfig::from_settings(&Settings::from_env()).expect("Invalid configuration");
    telemetry::init(config.log_json).expect("Failed to install tracing subscriber");

    let database_path = config.database_path();
    let database =
        Arc::new(GatewayDatabase::open(&database_path).expect("Failed to open gateway database"));
    info!(path = %database_path.display(), "Gateway database opened");

    if let Some(seed_file) = &config.seed_descriptors_file {
        let descriptors = load_seed_file(seed_file).expect("Failed to read descriptor seed file");
        let seeded = seed_descriptors(database.as_ref(), &descriptors)
            .expect("Failed to seed operation descriptors");
        info!(count = seeded, file = %seed_file.display(), "Operation descriptors seeded");
    }

    let service =
        GatewayService::new(&config, database).expect("Failed to build gateway service");
    let shutdown = CancellationToken::new();
    let app = router(AppState::new(service, shutdown.clone()));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Failed to parse bind address");
    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    info!(%addr, "Claims gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .expect("HTTP server failed");

    info!("Claims gateway stopped");
}

/// Resolve on Ctrl-C or SIGTERM and cancel in-flight invocations.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown signal received, cancelling in-flight operations");
    shutdown.cancel();
}
