//! Database connection management.

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr, RuntimeErr};
use std::time::Duration;

use crate::config::DbConfig;

/// Matches the pool size the game server grants each satellite service.
const POOL_MAX_CONNECTIONS: u32 = 5;

/// Establish a SeaORM connection pool against the shared MySQL database.
///
/// The pool is created once at startup and shared by every caller; individual
/// statements acquire and release connections lazily.
pub async fn establish_connection(cfg: &DbConfig) -> Result<DatabaseConnection, DbErr> {
    let url = cfg
        .connection_url()
        .map_err(|e| DbErr::Conn(RuntimeErr::Internal(e)))?;

    let mut options = ConnectOptions::new(url);
    options
        .max_connections(POOL_MAX_CONNECTIONS)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(8))
        .sqlx_logging(false);

    Database::connect(options).await
}

/// Drain and close the connection pool. Called once on shutdown.
pub async fn close_connection(conn: DatabaseConnection) -> Result<(), DbErr> {
    conn.close().await?;
    Ok(())
}
