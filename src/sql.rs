//! # SQLite wrapper.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension};
use tokio::sync::Mutex;

/// Errors of the key/value store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Sqlite error: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("Database is not opened")]
    SqlNoConnection,
    #[error("Database is already open")]
    SqlAlreadyOpen,
    #[error("{0:#}")]
    Other(anyhow::Error),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Error {
        Error::Other(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// A wrapper around the underlying Sqlite3 object.
///
/// All access is serialized on the connection lock; any operation that
/// touches the store suspends on it.
#[derive(Debug, Default)]
pub struct Sql {
    conn: Mutex<Option<Connection>>,
}

impl Sql {
    pub fn new() -> Sql {
        Self::default()
    }

    /// Returns true if the database connection is open.
    pub async fn is_open(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    /// Opens the database at `dbfile` and runs the schema migration.
    pub async fn open(&self, dbfile: &Path) -> Result<()> {
        {
            let mut lock = self.conn.lock().await;
            if lock.is_some() {
                return Err(Error::SqlAlreadyOpen);
            }
            let conn = Connection::open(dbfile)?;
            conn.pragma_update(None, "secure_delete", "on")?;
            *lock = Some(conn);
        }

        self.run_migrations().await?;

        Ok(())
    }

    /// Closes the database connection.
    pub async fn close(&self) {
        let _ = self.conn.lock().await.take();
    }

    async fn run_migrations(&self) -> Result<()> {
        self.execute_batch(
            r#"
CREATE TABLE IF NOT EXISTS config (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  keyname TEXT,
  value TEXT
);
CREATE INDEX IF NOT EXISTS config_index1 ON config (keyname);
CREATE TABLE IF NOT EXISTS keypairs (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  addr TEXT DEFAULT '' COLLATE NOCASE,
  is_default INTEGER DEFAULT 0,
  private_key BLOB,
  public_key BLOB,
  created INTEGER DEFAULT 0
);
CREATE TABLE IF NOT EXISTS acpeerstates (
  addr TEXT PRIMARY KEY COLLATE NOCASE,
  last_seen INTEGER DEFAULT 0,
  last_seen_autocrypt INTEGER DEFAULT 0,
  prefer_encrypted INTEGER DEFAULT 0,
  public_key BLOB,
  gossip_timestamp INTEGER DEFAULT 0,
  gossip_key BLOB,
  public_key_fingerprint TEXT,
  gossip_key_fingerprint TEXT,
  verified_key BLOB,
  verified_key_fingerprint TEXT
);
CREATE INDEX IF NOT EXISTS acpeerstates_index1 ON acpeerstates (addr COLLATE NOCASE);
CREATE INDEX IF NOT EXISTS acpeerstates_index2 ON acpeerstates (public_key_fingerprint);
CREATE INDEX IF NOT EXISTS acpeerstates_index3 ON acpeerstates (gossip_key_fingerprint);
CREATE INDEX IF NOT EXISTS acpeerstates_index4 ON acpeerstates (verified_key_fingerprint);
"#,
        )
        .await
    }

    /// Executes multiple statements separated by `;`.
    pub async fn execute_batch(&self, queries: &str) -> Result<()> {
        let lock = self.conn.lock().await;
        let conn = lock.as_ref().ok_or(Error::SqlNoConnection)?;
        conn.execute_batch(queries)?;
        Ok(())
    }

    /// Executes a query which is expected to return zero or more modified rows.
    pub async fn execute(&self, query: &str, params: impl rusqlite::Params) -> Result<usize> {
        let lock = self.conn.lock().await;
        let conn = lock.as_ref().ok_or(Error::SqlNoConnection)?;
        let res = conn.execute(query, params)?;
        Ok(res)
    }

    /// Executes a query which is expected to return exactly one row.
    pub async fn query_row<T>(
        &self,
        query: &str,
        params: impl rusqlite::Params,
        f: impl FnOnce(&rusqlite::Row) -> rusqlite::Result<T>,
    ) -> Result<T> {
        let lock = self.conn.lock().await;
        let conn = lock.as_ref().ok_or(Error::SqlNoConnection)?;
        let res = conn.query_row(query, params, f)?;
        Ok(res)
    }

    /// Executes a query which is expected to return zero or one row.
    pub async fn query_row_optional<T>(
        &self,
        query: &str,
        params: impl rusqlite::Params,
        f: impl FnOnce(&rusqlite::Row) -> rusqlite::Result<T>,
    ) -> Result<Option<T>> {
        let lock = self.conn.lock().await;
        let conn = lock.as_ref().ok_or(Error::SqlNoConnection)?;
        let res = conn.query_row(query, params, f).optional()?;
        Ok(res)
    }

    /// Executes a query returning a single value in a single row, if any.
    pub async fn query_get_value<T>(
        &self,
        query: &str,
        params: impl rusqlite::Params,
    ) -> Result<Option<T>>
    where
        T: rusqlite::types::FromSql,
    {
        self.query_row_optional(query, params, |row| row.get::<_, T>(0))
            .await
    }

    /// Maps each row of a query with `f` and collects the results.
    pub async fn query_map<T>(
        &self,
        query: &str,
        params: impl rusqlite::Params,
        f: impl FnMut(&rusqlite::Row) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>> {
        let lock = self.conn.lock().await;
        let conn = lock.as_ref().ok_or(Error::SqlNoConnection)?;
        let mut stmt = conn.prepare(query)?;
        let res = stmt
            .query_map(params, f)?
            .collect::<rusqlite::Result<Vec<T>>>()?;
        Ok(res)
    }

    /// Returns true if a query returns at least one row.
    pub async fn exists(&self, query: &str, params: impl rusqlite::Params) -> Result<bool> {
        let lock = self.conn.lock().await;
        let conn = lock.as_ref().ok_or(Error::SqlNoConnection)?;
        let mut stmt = conn.prepare(query)?;
        let res = stmt.exists(params)?;
        Ok(res)
    }

    /// Runs `callback` inside a transaction.
    ///
    /// If the callback returns an error the transaction is rolled back,
    /// otherwise it is committed. Read-modify-write sequences such as a
    /// peerstate load/mutate/save must run through this so that a
    /// received message updates the store atomically.
    pub async fn transaction<T>(
        &self,
        callback: impl FnOnce(&mut rusqlite::Transaction<'_>) -> anyhow::Result<T>,
    ) -> Result<T> {
        let mut lock = self.conn.lock().await;
        let conn = lock.as_mut().ok_or(Error::SqlNoConnection)?;
        let mut transaction = conn.transaction()?;
        match callback(&mut transaction) {
            Ok(res) => {
                transaction.commit()?;
                Ok(res)
            }
            Err(err) => {
                transaction.rollback()?;
                Err(Error::Other(err))
            }
        }
    }

    /// Sets a configuration value, deleting the row when `value` is `None`.
    pub async fn set_raw_config(&self, key: &str, value: Option<&str>) -> Result<()> {
        if let Some(value) = value {
            let exists = self
                .exists("SELECT value FROM config WHERE keyname=?;", (key,))
                .await?;
            if exists {
                self.execute("UPDATE config SET value=? WHERE keyname=?;", (value, key))
                    .await?;
            } else {
                self.execute(
                    "INSERT INTO config (keyname, value) VALUES (?, ?);",
                    (key, value),
                )
                .await?;
            }
        } else {
            self.execute("DELETE FROM config WHERE keyname=?;", (key,))
                .await?;
        }

        Ok(())
    }

    /// Returns a configuration value.
    pub async fn get_raw_config(&self, key: &str) -> Result<Option<String>> {
        self.query_get_value("SELECT value FROM config WHERE keyname=?;", (key,))
            .await
    }

    pub async fn set_raw_config_int(&self, key: &str, value: i32) -> Result<()> {
        self.set_raw_config(key, Some(&format!("{value}"))).await
    }

    pub async fn get_raw_config_int(&self, key: &str) -> Result<Option<i32>> {
        Ok(self
            .get_raw_config(key)
            .await?
            .and_then(|s| s.parse().ok()))
    }

    pub async fn set_raw_config_bool(&self, key: &str, value: bool) -> Result<()> {
        self.set_raw_config_int(key, i32::from(value)).await
    }

    pub async fn get_raw_config_bool(&self, key: &str) -> Result<bool> {
        let res = self.get_raw_config_int(key).await?;
        Ok(res.unwrap_or_default() > 0)
    }
}
