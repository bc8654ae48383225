use sqlx::{Connection, MySqlConnection};
use tracing::{debug, warn};

use super::LockProvider;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{LockName, WaitTimeout};

/// Advisory locks via `GET_LOCK` / `RELEASE_LOCK` on one MySQL session.
pub struct MySqlLockProvider {
    conn: Option<MySqlConnection>,
}

impl MySqlLockProvider {
    /// Connect and ping within `config.connect_timeout`. No retries.
    pub async fn open(config: &Config) -> Result<Self> {
        let options = config.connect_options();
        let connect = async {
            let mut conn = MySqlConnection::connect_with(&options)
                .await
                .map_err(Error::Connection)?;
            if let Err(e) = conn.ping().await {
                let _ = conn.close().await;
                return Err(Error::Connection(e));
            }
            Ok(conn)
        };

        let conn = tokio::time::timeout(config.connect_timeout, connect)
            .await
            .map_err(|_| Error::ConnectTimeout(config.connect_timeout.as_secs()))??;

        debug!(endpoint = %config.endpoint(), "connected to lock server");
        Ok(Self { conn: Some(conn) })
    }

    fn connection(&mut self) -> Result<&mut MySqlConnection> {
        self.conn.as_mut().ok_or(Error::ProviderClosed)
    }
}

impl LockProvider for MySqlLockProvider {
    async fn acquire(&mut self, name: &LockName, timeout: WaitTimeout) -> Result<bool> {
        let conn = self.connection()?;

        // 1 = acquired, 0 = timed out, NULL = server-side error (e.g. killed)
        let result: Option<i64> = sqlx::query_scalar("SELECT GET_LOCK(?, ?)")
            .bind(name.as_str())
            .bind(timeout.as_secs())
            .fetch_one(conn)
            .await
            .map_err(|source| Error::Provider {
                op: "acquire",
                source,
            })?;

        debug!(lock = %name, ?result, "GET_LOCK returned");
        Ok(result == Some(1))
    }

    async fn release(&mut self, name: &LockName) -> Result<bool> {
        let conn = self.connection()?;

        // 1 = released, 0 = held by another session, NULL = not held at all
        let result: Option<i64> = sqlx::query_scalar("SELECT RELEASE_LOCK(?)")
            .bind(name.as_str())
            .fetch_one(conn)
            .await
            .map_err(|source| Error::Provider {
                op: "release",
                source,
            })?;

        debug!(lock = %name, ?result, "RELEASE_LOCK returned");
        Ok(result == Some(1))
    }

    async fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = conn.close().await {
                warn!("Failed to close lock server connection: {}", e);
            }
        }
    }
}
