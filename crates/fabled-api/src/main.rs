//! Fabled CLI and HTTP relay entry point.
//!
//! Binary name: `fabled`
//!
//! Parses CLI arguments, loads configuration, initializes the database and
//! services, then dispatches to a command handler or starts the HTTP server.

mod cli;
mod http;
mod state;

use clap::Parser;

use fabled_infra::config::{load_global_config, resolve_data_dir};
use fabled_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = TracingOptions::from_verbosity(cli.verbose, cli.quiet)
        .with_otel(cli.otel)
        .with_json(cli.log_json);
    if let Err(e) = init_tracing(&options) {
        eprintln!("failed to initialize tracing: {e}");
    }

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let data_dir = cli.data_dir.clone().unwrap_or_else(resolve_data_dir);
    let mut config = load_global_config(&data_dir).await;
    cli.apply_overrides(&mut config);

    let state = AppState::init(data_dir, config).await?;

    match cli.command {
        Commands::Serve { port, host } => {
            state.seed_personas().await?;

            let host = host.unwrap_or_else(|| state.config.server.host.clone());
            let port = port.unwrap_or(state.config.server.port);
            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            if !cli.quiet {
                println!(
                    "  {} Fabled relay listening on {}",
                    console::style("⚡").bold(),
                    console::style(format!("http://{addr}")).cyan()
                );
                println!(
                    "  {} {}",
                    console::style("upstream").dim(),
                    console::style(state.upstream.chat_url()).dim()
                );
                println!(
                    "  {} {}",
                    console::style("data").dim(),
                    console::style(state.data_dir.display()).dim()
                );
                println!("  {}", console::style("Press Ctrl+C to stop").dim());
            }

            let router = http::router::build_router(state);

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            if !cli.quiet {
                println!("\n  Server stopped.");
            }
        }

        Commands::Models => {
            cli::models::list_models(&state, cli.json).await?;
        }

        Commands::History {
            session_id,
            persona,
        } => {
            cli::history::show_history(&state, session_id, persona.as_deref(), cli.json).await?;
        }

        Commands::Chat {
            session,
            model,
            persona,
            message,
        } => {
            state.seed_personas().await?;
            cli::chat::run_chat(&state, session, model, persona, message, cli.json).await?;
        }
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
