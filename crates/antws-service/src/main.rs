//! antws - ANT+ sensors over WebSocket pub/sub.
//!
//! Run with: `cargo run -p antws-service -- --simulate`

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use antws_service::{AppState, Args, Config, app, net, pipeline, state, tls};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("antws_service=info".parse()?)
                .add_directive("antws_core=info".parse()?),
        )
        .init();

    let config = Config::from_args(&args)?;
    run_server(config).await
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    let host = config.server.host.clone();
    let port = config.server.effective_port();
    let scheme = config.server.scheme();
    let secure = config.server.secure;

    let state = AppState::new(config);
    let _tracker = state::track_discovery(Arc::clone(&state), state.events.subscribe());
    let discovery = Arc::new(pipeline::build_discovery(&state)?);

    let listener = TcpListener::bind((host.as_str(), port)).await?;
    let local = listener.local_addr()?;
    let lan = net::lan_ip();
    for url in net::base_urls(scheme, lan, local.port()) {
        info!("ANT-WS Server URL: {}", url);
    }
    info!("CTRL-C to exit");

    // Discovery starts only once the listener is bound, and never blocks it.
    let _discovery_task = pipeline::spawn_discovery(Arc::clone(&discovery));

    let router = app(Arc::clone(&state));
    if secure {
        let mut hosts: Vec<String> = lan.map(|ip| ip.to_string()).into_iter().collect();
        if !host.parse::<std::net::IpAddr>().is_ok_and(|ip| ip.is_unspecified()) {
            hosts.push(host.clone());
        }
        let tls = tls::rustls_config(&hosts).await?;

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown_handle.graceful_shutdown(Some(Duration::from_secs(5)));
        });

        axum_server::from_tcp_rustls(listener.into_std()?, tls)
            .handle(handle)
            .serve(router.into_make_service())
            .await?;
    } else {
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    }

    info!("Server stopped");
    drop(discovery);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for CTRL-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
