//! Schema migration runner.

use sqlx::PgPool;

/// Applies all pending migrations under `migrations/`. Safe to call on every
/// startup -- `sqlx::migrate!` tracks applied versions in its own table.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
