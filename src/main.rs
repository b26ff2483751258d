mod cli;

use clap::Parser;
use sqlx::migrate::Migrator;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tabpay_core::config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Setup logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_info = Config::from_env()?;
    let config = config_info.config;
    tracing::info!(
        environment = config_info.environment.as_str(),
        overrides = ?config_info.overrides,
        "configuration loaded"
    );

    let args = cli::Cli::parse();
    match args.command {
        Some(cli::Commands::Mpesa(cli::MpesaCommands::Sync { tenant_id })) => {
            return cli::handle_mpesa_sync(&config, tenant_id).await;
        }
        Some(cli::Commands::Mpesa(cli::MpesaCommands::Repair { tenant_id })) => {
            return cli::handle_mpesa_repair(&config, tenant_id).await;
        }
        Some(cli::Commands::Mpesa(cli::MpesaCommands::Enable { tenant_id })) => {
            return cli::handle_mpesa_set_status(&config, tenant_id, true).await;
        }
        Some(cli::Commands::Mpesa(cli::MpesaCommands::Disable { tenant_id })) => {
            return cli::handle_mpesa_set_status(&config, tenant_id, false).await;
        }
        Some(cli::Commands::Db(cli::DbCommands::Migrate)) => {
            return cli::handle_db_migrate(&config).await;
        }
        Some(cli::Commands::Config) => {
            return cli::handle_config_validate(&config);
        }
        Some(cli::Commands::Serve) | None => {}
    }

    // Database pool
    let pool = tabpay_core::db::create_pool(&config).await?;

    // Run migrations
    let migrator = Migrator::new(Path::new("./migrations")).await?;
    migrator.run(&pool).await?;
    tracing::info!("Database migrations completed");

    let codec = config.credential_codec()?;
    let daraja = tabpay_core::mpesa::DarajaClient::new(config.daraja_base_url.clone());

    let app_state = tabpay_core::AppState {
        db: pool,
        daraja,
        codec: Arc::new(codec),
        environment: config.mpesa_environment,
        callback_base_url: config.callback_base_url.clone(),
    };

    let app = tabpay_core::create_app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
