//! Database migration commands.
//!
//! Migration files live in `crates/storefront/migrations/` and are embedded
//! into the binary at compile time.
//!
//! # Environment Variables
//!
//! - `DRIFTWOOD_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection
//!   string

use sqlx::PgPool;

/// Migration failures.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Missing environment variable: DRIFTWOOD_DATABASE_URL")]
    MissingEnvVar,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run the storefront database migrations.
///
/// With `dry_run`, only reports the embedded migration set.
///
/// # Errors
///
/// Returns [`MigrationError`] when the database URL is missing or a
/// migration fails to apply.
pub async fn run(dry_run: bool) -> Result<(), MigrationError> {
    dotenvy::dotenv().ok();

    let migrator = sqlx::migrate!("../storefront/migrations");

    if dry_run {
        for migration in migrator.iter() {
            tracing::info!(
                version = migration.version,
                description = %migration.description,
                "pending or applied migration"
            );
        }
        return Ok(());
    }

    let database_url = std::env::var("DRIFTWOOD_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| MigrationError::MissingEnvVar)?;

    tracing::info!("Connecting to storefront database...");
    let pool = PgPool::connect(&database_url).await?;

    tracing::info!("Running storefront migrations...");
    migrator.run(&pool).await?;

    tracing::info!("Storefront migrations complete!");
    Ok(())
}
