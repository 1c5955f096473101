//! Bounded retry for inserts into tables whose autoincrement sequence has
//! fallen behind manually seeded primary keys.
//!
//! A colliding insert fails with a unique violation on the primary key. The
//! loop advances the table's sequence by one and tries again, giving up after
//! [`IdRetryConfig::max_attempts`] attempts with
//! [`ServiceError::IdGenerationExhausted`]. Every other error is returned
//! immediately.

use crate::errors::ServiceError;
use sea_orm::{ConnectionTrait, DbBackend, DbErr, SqlErr, Statement};
use std::future::Future;
use tracing::{debug, error, warn};

/// Insert attempts allowed before giving up on a lagging sequence
pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdRetryConfig {
    pub max_attempts: u32,
}

impl Default for IdRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Retry policy for determining if an error is retryable
pub trait RetryPolicy<E> {
    fn is_retryable(&self, error: &E) -> bool;
}

/// Retries only unique violations on the primary key of one table
#[derive(Debug, Clone, Copy)]
pub struct PrimaryKeyCollision<'a> {
    table: &'a str,
}

impl<'a> PrimaryKeyCollision<'a> {
    pub fn new(table: &'a str) -> Self {
        Self { table }
    }
}

impl RetryPolicy<DbErr> for PrimaryKeyCollision<'_> {
    fn is_retryable(&self, error: &DbErr) -> bool {
        is_primary_key_collision(error, self.table)
    }
}

pub fn is_primary_key_collision(error: &DbErr, table: &str) -> bool {
    match error.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(message)) => names_primary_key(&message, table),
        _ => false,
    }
}

// postgres: duplicate key value violates unique constraint "substances_pkey"
// sqlite:   UNIQUE constraint failed: substances.id
fn names_primary_key(message: &str, table: &str) -> bool {
    message.contains(&format!("\"{table}_pkey\""))
        || message.trim_end().ends_with(&format!(" {table}.id"))
}

/// Moves the table's autoincrement sequence forward by one
pub async fn advance_sequence<C>(db: &C, table: &str) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    let backend = db.get_database_backend();
    let stmt = match backend {
        DbBackend::Postgres => Statement::from_sql_and_values(
            backend,
            "SELECT nextval(pg_get_serial_sequence($1, 'id'))",
            [table.into()],
        ),
        DbBackend::Sqlite => Statement::from_sql_and_values(
            backend,
            "UPDATE sqlite_sequence SET seq = seq + 1 WHERE name = ?",
            [table.into()],
        ),
        DbBackend::MySql => {
            // AUTO_INCREMENT never trails MAX(id) on InnoDB
            debug!(table, "sequence advance is a no-op on MySQL");
            return Ok(());
        }
    };

    db.execute(stmt).await?;
    Ok(())
}

/// Runs `insert` until it succeeds, fails with a non-collision error, or the
/// attempt ceiling is reached. Each collision advances the sequence once.
pub async fn insert_with_id_retry<C, F, Fut, T>(
    db: &C,
    table: &str,
    config: IdRetryConfig,
    mut insert: F,
) -> Result<T, ServiceError>
where
    C: ConnectionTrait,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbErr>>,
{
    let policy = PrimaryKeyCollision::new(table);
    let max_attempts = config.max_attempts.max(1);
    let mut attempts = 0;

    loop {
        attempts += 1;

        match insert().await {
            Ok(row) => {
                if attempts > 1 {
                    debug!(table, attempts, "insert succeeded after primary key collisions");
                }
                return Ok(row);
            }
            Err(err) if policy.is_retryable(&err) => {
                warn!(table, attempt = attempts, "primary key collision; advancing sequence");
                advance_sequence(db, table).await?;

                if attempts >= max_attempts {
                    error!(table, attempts, "giving up on id generation");
                    return Err(ServiceError::IdGenerationExhausted {
                        table: table.to_string(),
                        attempts,
                    });
                }
            }
            Err(err) => return Err(ServiceError::from(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::StatusCode;
    use sea_orm::{ConnectOptions, Database, DatabaseConnection, Value};

    async fn widgets_db() -> DatabaseConnection {
        let mut opt = ConnectOptions::new("sqlite::memory:".to_string());
        opt.max_connections(1).min_connections(1).sqlx_logging(false);
        let db = Database::connect(opt).await.unwrap();
        db.execute(Statement::from_string(
            DbBackend::Sqlite,
            "CREATE TABLE widgets (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL UNIQUE)",
        ))
        .await
        .unwrap();
        // Seeded row; sqlite_sequence now holds 1
        db.execute(Statement::from_string(
            DbBackend::Sqlite,
            "INSERT INTO widgets (id, name) VALUES (1, 'seeded')",
        ))
        .await
        .unwrap();
        db
    }

    fn insert_stmt(id: Option<i64>, name: &str) -> Statement {
        match id {
            Some(id) => Statement::from_sql_and_values(
                DbBackend::Sqlite,
                "INSERT INTO widgets (id, name) VALUES (?, ?)",
                [Value::from(id), Value::from(name)],
            ),
            None => Statement::from_sql_and_values(
                DbBackend::Sqlite,
                "INSERT INTO widgets (name) VALUES (?)",
                [Value::from(name)],
            ),
        }
    }

    async fn sequence_value(db: &DatabaseConnection) -> i64 {
        db.query_one(Statement::from_string(
            DbBackend::Sqlite,
            "SELECT seq FROM sqlite_sequence WHERE name = 'widgets'",
        ))
        .await
        .unwrap()
        .unwrap()
        .try_get::<i64>("", "seq")
        .unwrap()
    }

    #[test]
    fn recognises_primary_key_constraint_messages() {
        assert!(names_primary_key(
            "duplicate key value violates unique constraint \"substances_pkey\"",
            "substances"
        ));
        assert!(names_primary_key(
            "UNIQUE constraint failed: substances.id",
            "substances"
        ));
        assert!(!names_primary_key(
            "UNIQUE constraint failed: dealers.username",
            "dealers"
        ));
        assert!(!names_primary_key(
            "duplicate key value violates unique constraint \"provider_transports_pkey\"",
            "substances"
        ));
    }

    #[test]
    fn non_sql_errors_are_not_collisions() {
        assert!(!is_primary_key_collision(
            &DbErr::Custom("UNIQUE constraint failed: widgets.id".into()),
            "widgets"
        ));
    }

    #[tokio::test]
    async fn succeeds_after_collisions_and_advances_once_per_collision() {
        let db = widgets_db().await;
        let mut calls = 0u32;

        let inserted = insert_with_id_retry(&db, "widgets", IdRetryConfig::default(), || {
            calls += 1;
            // The first three attempts reuse the seeded key
            let stmt = if calls <= 3 {
                insert_stmt(Some(1), "fresh")
            } else {
                insert_stmt(None, "fresh")
            };
            let db = &db;
            async move { db.execute(stmt).await.map(|res| res.last_insert_id()) }
        })
        .await
        .unwrap();

        assert_eq!(calls, 4);
        // seq went 1 -> 4 through three advances, then the insert took 5
        assert_eq!(inserted, 5);
        assert_eq!(sequence_value(&db).await, 5);
    }

    #[tokio::test]
    async fn gives_up_after_the_attempt_ceiling() {
        let db = widgets_db().await;
        let mut calls = 0u32;

        let result = insert_with_id_retry(&db, "widgets", IdRetryConfig::default(), || {
            calls += 1;
            let stmt = insert_stmt(Some(1), "never");
            let db = &db;
            async move { db.execute(stmt).await.map(|res| res.last_insert_id()) }
        })
        .await;

        assert_eq!(calls, DEFAULT_MAX_ATTEMPTS);
        assert_matches!(
            result,
            Err(ServiceError::IdGenerationExhausted { ref table, attempts: 20 }) if table == "widgets"
        );
        assert_eq!(
            result.unwrap_err().status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn respects_a_custom_ceiling() {
        let db = widgets_db().await;
        let mut calls = 0u32;

        let result = insert_with_id_retry(&db, "widgets", IdRetryConfig { max_attempts: 3 }, || {
            calls += 1;
            let stmt = insert_stmt(Some(1), "never");
            let db = &db;
            async move { db.execute(stmt).await.map(|res| res.last_insert_id()) }
        })
        .await;

        assert_eq!(calls, 3);
        assert_matches!(result, Err(ServiceError::IdGenerationExhausted { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn other_unique_violations_fail_without_retry() {
        let db = widgets_db().await;
        let mut calls = 0u32;

        let result = insert_with_id_retry(&db, "widgets", IdRetryConfig::default(), || {
            calls += 1;
            let stmt = insert_stmt(None, "seeded");
            let db = &db;
            async move { db.execute(stmt).await.map(|res| res.last_insert_id()) }
        })
        .await;

        assert_eq!(calls, 1);
        let err = result.unwrap_err();
        assert_matches!(err, ServiceError::DatabaseError(_));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(sequence_value(&db).await, 1);
    }
}
