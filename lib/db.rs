use std::ops::{Deref, DerefMut};
use std::str::FromStr;
use std::time::Duration;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use crate::schema::create_tables;
use crate::Result;

/// Handle to the record store.
///
/// Cheap to clone; all clones share one connection pool. The challenge
/// tracker lives in `challenges.rs` and the score ledger in `ledger.rs`,
/// both as methods on this type.
#[derive(Clone, Debug)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    /// Open (and create, if need be) the database at `path` and make
    /// sure the schema exists.
    pub async fn open(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Self::from_pool(pool).await
    }

    /// A private database that disappears with the handle.
    ///
    /// In-memory databases are per connection, so the pool is pinned to
    /// a single connection that is never recycled.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    /// Wrap an existing pool.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        create_tables(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a transaction that holds the write lock from the start.
    ///
    /// A plain `BEGIN` only takes the lock on the first write; in WAL mode,
    /// a transaction that read before another writer committed then fails
    /// with `SQLITE_BUSY_SNAPSHOT` instead of waiting. With the lock taken
    /// up front, concurrent writers queue on the busy timeout and every
    /// read inside the transaction sees the latest data.
    pub(crate) async fn begin_write(&self) -> Result<WriteTx> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE;").execute(&mut *conn).await?;
        Ok(WriteTx { conn: Some(conn) })
    }

    /// Merge the WAL into the main db file.
    pub async fn checkpoint(&self) -> Result<()> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// An open `BEGIN IMMEDIATE` transaction; see [`Db::begin_write`].
///
/// End it with [`WriteTx::finish`]. If it is dropped instead (e.g. because
/// the future running it was cancelled), the connection is closed rather
/// than returned to the pool, which discards the transaction.
pub(crate) struct WriteTx {
    conn: Option<PoolConnection<Sqlite>>,
}

impl WriteTx {
    /// Commit if `res` is `Ok`, roll back otherwise, and pass `res` on.
    pub(crate) async fn finish<T>(mut self, res: Result<T>) -> Result<T> {
        let Some(mut conn) = self.conn.take() else { return res; };
        let end = if res.is_ok() { "COMMIT;" } else { "ROLLBACK;" };
        if let Err(e) = sqlx::query(end).execute(&mut *conn).await {
            drop(conn.detach());
            return res.and(Err(e.into()));
        }

        res
    }
}

impl Deref for WriteTx {
    type Target = SqliteConnection;
    fn deref(&self) -> &SqliteConnection {
        self.conn.as_deref().expect("connection is only taken by finish()")
    }
}

impl DerefMut for WriteTx {
    fn deref_mut(&mut self) -> &mut SqliteConnection {
        self.conn.as_deref_mut().expect("connection is only taken by finish()")
    }
}

impl Drop for WriteTx {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() { drop(conn.detach()); }
    }
}
