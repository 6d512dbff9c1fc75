// Atrium plugin host
// Main entry point for the atrium binary

use atrium_engine::app::{build_store, App};
use atrium_engine::cli::{Cli, Command, PluginAction};
use atrium_engine::config::{Config, StorageKind};
use atrium_engine::storage::Storage;
use atrium_engine::telemetry::{init_telemetry, init_telemetry_with_level};
use clap::Parser;
use cookiesession::CookieSessionPlugin;
use htmlengine::HtmlEnginePlugin;
use pathrouter::PathRouterPlugin;
use sdk::PluginLoader;
use std::sync::Arc;
use welcome::WelcomePlugin;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize basic telemetry first (before config is loaded)
    init_telemetry();

    tracing::info!("Atrium v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // Re-initialize telemetry: --log beats the config file, RUST_LOG beats both
    let log_level = cli
        .log
        .clone()
        .unwrap_or_else(|| config.server.log_level.clone());
    init_telemetry_with_level(&log_level);

    match cli.command {
        Command::Serve { host, port } => {
            let app = App::new(&config, default_loader(&config)?).await?;
            let router = app.handler(config.server.dev_console).await?;

            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
            tracing::info!("listening on http://{}:{}", host, port);
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
            Ok(())
        }

        Command::Init => {
            // Registering the loader's plugins seeds their records; the
            // explicit save writes the document even when nothing changed.
            let app = App::new(&config, default_loader(&config)?).await?;
            app.storage().save().await?;

            println!("Config: {}", Config::default_config_path()?.display());
            if config.storage.kind == StorageKind::Local {
                println!("Site document: {}", config.storage.path.display());
            }
            Ok(())
        }

        Command::Plugins { action } => match action {
            PluginAction::List => {
                let storage = Storage::open(build_store(&config)?).await?;
                let plugins = storage.read(|site| site.plugins.clone());

                if plugins.is_empty() {
                    println!("No plugin records found.");
                } else {
                    let mut names: Vec<_> = plugins.keys().cloned().collect();
                    names.sort();

                    println!("Plugins ({}):", names.len());
                    println!();
                    for name in &names {
                        let data = &plugins[name];
                        let state = if data.enabled { "enabled" } else { "disabled" };
                        let granted = data.grants.values().filter(|granted| **granted).count();
                        println!(
                            "  {} v{} [{}] ({} grant(s))",
                            name, data.version, state, granted
                        );
                    }
                }
                Ok(())
            }
        },
    }
}

/// The first-party plugin set: router, template engine and welcome pages as
/// regular plugins, the cookie session plugin as middleware.
fn default_loader(config: &Config) -> anyhow::Result<PluginLoader> {
    let session_key = config.session_key()?;
    Ok(PluginLoader {
        plugins: vec![
            Arc::new(PathRouterPlugin::new()),
            Arc::new(HtmlEnginePlugin::new()),
            Arc::new(WelcomePlugin::new()),
        ],
        middleware: vec![Arc::new(CookieSessionPlugin::new(session_key))],
        trusted_plugins: config.plugins.trusted.clone(),
    })
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(e) => tracing::error!(error = %e, "failed to listen for shutdown signal"),
    }
}
