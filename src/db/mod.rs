//! Database module

pub mod queries;

use anyhow::Result;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Create a database connection pool
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Run the embedded migrations.
///
/// A database without `_sqlx_migrations` is treated as fresh and migrated
/// from scratch; otherwise the versions still to apply are logged first.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    info!("Running database migrations...");

    match applied_versions(pool).await? {
        None => info!("Fresh database, applying all {} migrations", compiled_versions().len()),
        Some(applied) => {
            let pending = pending_versions(&compiled_versions(), &applied);
            info!("Pending migration versions: {:?}", pending);
        }
    }

    MIGRATOR.run(pool).await?;

    info!("Database migrations complete");
    Ok(())
}

fn compiled_versions() -> Vec<i64> {
    MIGRATOR
        .iter()
        .filter(|m| !m.migration_type.is_down_migration())
        .map(|m| m.version)
        .collect()
}

/// Versions recorded in `_sqlx_migrations`, or `None` when the table does
/// not exist on the connection's search path yet
async fn applied_versions(pool: &PgPool) -> Result<Option<Vec<i64>>> {
    let table_exists: bool = sqlx::query_scalar("SELECT to_regclass('_sqlx_migrations') IS NOT NULL")
        .fetch_one(pool)
        .await?;

    if !table_exists {
        return Ok(None);
    }

    let versions: Vec<i64> = sqlx::query_scalar("SELECT version FROM _sqlx_migrations ORDER BY version")
        .fetch_all(pool)
        .await?;

    Ok(Some(versions))
}

fn pending_versions(compiled: &[i64], applied: &[i64]) -> Vec<i64> {
    compiled
        .iter()
        .copied()
        .filter(|version| !applied.contains(version))
        .collect()
}
