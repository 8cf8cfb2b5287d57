//! Forward-only schema migrations, tracked in a `_migrations` table.

use sqlx::SqlitePool;
use tracing::info;

struct Migration {
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    name: "001_initial_schema",
    sql: include_str!("../migrations/001_initial_schema.sql"),
}];

/// Apply every migration that has not been recorded yet, in order.
pub async fn run(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS _migrations (
            name TEXT PRIMARY KEY,
            applied_ts INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    for m in MIGRATIONS {
        if is_applied(pool, m.name).await? {
            continue;
        }
        apply(pool, m).await?;
        info!(migration = m.name, "migration applied");
    }

    Ok(())
}

async fn is_applied(pool: &SqlitePool, name: &str) -> Result<bool, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM _migrations WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// The migration's statements and its tracking row commit together, so a
/// failing statement leaves the migration fully unapplied.
async fn apply(pool: &SqlitePool, m: &Migration) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    // multi-statement files are split on semicolons
    for statement in m.sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        sqlx::query(statement).execute(&mut *tx).await?;
    }

    sqlx::query("INSERT INTO _migrations (name, applied_ts) VALUES (?, ?)")
        .bind(m.name)
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;

    tx.commit().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_is_idempotent() {
        let pool = crate::connect_memory().await.unwrap();
        run(&pool).await.unwrap();
        run(&pool).await.unwrap();
        assert!(is_applied(&pool, "001_initial_schema").await.unwrap());
    }

    #[tokio::test]
    async fn failed_migration_rolls_back_and_stays_pending() {
        let pool = crate::connect_memory().await.unwrap();
        run(&pool).await.unwrap();

        let broken = Migration {
            name: "002_broken",
            sql: "CREATE TABLE half_done (id TEXT PRIMARY KEY);\nTHIS IS NOT SQL;",
        };
        assert!(apply(&pool, &broken).await.is_err());
        assert!(!is_applied(&pool, "002_broken").await.unwrap());

        // the statement before the bad one rolled back too
        let leaked = sqlx::query("SELECT count(*) FROM half_done")
            .fetch_one(&pool)
            .await;
        assert!(leaked.is_err());
    }
}
