// Schema migrations, applied in version order

use sqlx::SqlitePool;
use tracing::info;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "jobs table",
        sql: include_str!("../migrations/001_initial_schema.sql"),
    },
    Migration {
        version: 2,
        name: "live cache key index",
        sql: include_str!("../migrations/002_live_cache_key.sql"),
    },
];

/// Bring the schema up to the latest version
///
/// Each migration records its own row in `schema_version`, so running this
/// on an up-to-date database is a no-op.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), Box<dyn std::error::Error>> {
    let current = schema_version(pool).await?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();

    if pending.is_empty() {
        info!(version = current, "Schema up to date");
        return Ok(());
    }

    for migration in pending {
        info!(version = migration.version, name = migration.name, "Applying migration");
        let mut tx = pool.begin().await?;
        for statement in statements(migration.sql) {
            sqlx::query(&statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;
    }

    info!(version = schema_version(pool).await?, "Migrations applied");
    Ok(())
}

async fn schema_version(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let tables: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
    )
    .fetch_one(pool)
    .await?;
    if tables == 0 {
        return Ok(0);
    }

    let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await?;
    Ok(version.unwrap_or(0))
}

/// Split a migration file into statements, dropping `--` comment lines
fn statements(sql: &str) -> Vec<String> {
    sql.split(';')
        .map(|chunk| {
            chunk
                .lines()
                .filter(|line| !line.trim_start().starts_with("--"))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
