use clap::{Parser, Subcommand};
use tabpay_core::config::Config;
use tabpay_core::db::queries::PgStore;
use tabpay_core::services::SyncManager;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "tabpay-core")]
#[command(about = "TabPay Core - M-Pesa Payment Processor", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// M-Pesa enablement-flag management
    #[command(subcommand)]
    Mpesa(MpesaCommands),

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum MpesaCommands {
    /// Check whether a tenant's enablement flags agree
    Sync {
        /// Tenant UUID
        #[arg(value_name = "TENANT_ID")]
        tenant_id: Uuid,
    },

    /// Repair a diverged enablement flag pair
    Repair {
        /// Tenant UUID
        #[arg(value_name = "TENANT_ID")]
        tenant_id: Uuid,
    },

    /// Enable M-Pesa for a tenant (both flags)
    Enable {
        /// Tenant UUID
        #[arg(value_name = "TENANT_ID")]
        tenant_id: Uuid,
    },

    /// Disable M-Pesa for a tenant (both flags)
    Disable {
        /// Tenant UUID
        #[arg(value_name = "TENANT_ID")]
        tenant_id: Uuid,
    },
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

async fn sync_manager(config: &Config) -> anyhow::Result<SyncManager<PgStore>> {
    let pool = tabpay_core::db::create_pool(config).await?;
    let store = PgStore::new(pool, config.mpesa_environment);
    Ok(SyncManager::new(store))
}

pub async fn handle_mpesa_sync(config: &Config, tenant_id: Uuid) -> anyhow::Result<()> {
    let manager = sync_manager(config).await?;
    let validation = manager.validate_sync(tenant_id).await;

    if let Some(error) = &validation.error {
        anyhow::bail!("validation failed: {}", error);
    }

    println!("Tenant {}", tenant_id);
    println!("  Credentials configured: {}", validation.credentials_configured);
    println!("  Credentials flag:       {}", validation.credentials_active);
    println!("  Bar profile flag:       {}", validation.bar_enabled);
    if validation.is_consistent {
        println!("✓ Flags are consistent");
    } else {
        println!("⚠️  Flags diverged - run `mpesa repair {}`", tenant_id);
    }
    Ok(())
}

pub async fn handle_mpesa_repair(config: &Config, tenant_id: Uuid) -> anyhow::Result<()> {
    let manager = sync_manager(config).await?;
    let outcome = manager.repair_inconsistency(tenant_id).await;

    if let Some(error) = &outcome.error {
        anyhow::bail!("repair failed: {}", error);
    }

    if outcome.repaired {
        println!(
            "✓ Repaired: bar profile flag {:?} -> {:?}",
            outcome.previous_bar_status, outcome.new_bar_status
        );
    } else {
        println!("✓ Already consistent, nothing to repair");
    }
    Ok(())
}

pub async fn handle_mpesa_set_status(
    config: &Config,
    tenant_id: Uuid,
    active: bool,
) -> anyhow::Result<()> {
    let manager = sync_manager(config).await?;
    let outcome = manager.sync_mpesa_status(tenant_id, active).await;

    if outcome.success {
        println!(
            "✓ M-Pesa {} for tenant {}",
            if active { "enabled" } else { "disabled" },
            tenant_id
        );
        return Ok(());
    }

    if outcome.credentials_updated && !outcome.bar_status_updated {
        anyhow::bail!(
            "credentials flag committed but profile write failed ({}); run `mpesa repair {}`",
            outcome.error.unwrap_or_default(),
            tenant_id
        );
    }
    anyhow::bail!(
        "status change failed: {}",
        outcome.error.unwrap_or_default()
    )
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    use sqlx::migrate::Migrator;
    use std::path::Path;

    let pool = tabpay_core::db::create_pool(config).await?;
    let migrator = Migrator::new(Path::new("./migrations")).await?;

    tracing::info!("Running database migrations...");
    migrator.run(&pool).await?;

    tracing::info!("Database migrations completed");
    println!("✓ Database migrations completed");

    Ok(())
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    // Fails fast when key material is unusable.
    config.credential_codec()?;

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Database URL: {}", mask_password(&config.database_url));
    println!("  M-Pesa Environment: {}", config.mpesa_environment.as_str());
    println!("  Daraja Base URL: {}", config.daraja_base_url);
    println!("  Callback Base URL: {}", config.callback_base_url);
    println!("  Encryption Key: ****",);

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user_start = slash_pos + 2;
                let user = &url[user_start..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}
