//! PostgreSQL backend over `tokio-postgres`.
//!
//! ```ignore
//! use fluentdb::{ConnectConfig, DatabaseKind};
//! use fluentdb::driver::postgres::PgConnection;
//!
//! let config = ConnectConfig::new(DatabaseKind::PostgreSql)
//!     .database("books")
//!     .credentials("app", "secret");
//! let conn = PgConnection::connect(&config).await?;
//! ```

mod decode;
mod metadata;
mod statement;

pub use statement::{PgCallableStatement, PgPreparedStatement};

use crate::config::ConnectConfig;
use crate::driver::{CallableStatement, Connection, MetadataSource, PreparedStatement};
use crate::error::{DbError, DbResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls};

/// A single PostgreSQL connection.
///
/// Auto-commit is on by default. While it is off there is always an open
/// transaction: `commit` and `rollback` finish it and immediately begin the
/// next one.
pub struct PgConnection {
    client: Arc<Client>,
    auto_commit: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PgConnection {
    /// Connect using `config`, bounded by its login timeout.
    pub async fn connect(config: &ConnectConfig) -> DbResult<Self> {
        let pg_config = pg_config(config)?;
        let timeout = config.login_timeout_duration();

        let connecting = pg_config.connect(NoTls);
        let (client, connection) = if timeout.is_zero() {
            connecting.await?
        } else {
            tokio::time::timeout(timeout, connecting)
                .await
                .map_err(|_| DbError::Timeout(timeout))??
        };

        let task = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(target: "fluentdb.sql", error = %e, "postgres connection error");
            }
        });

        Ok(Self {
            client: Arc::new(client),
            auto_commit: Arc::new(AtomicBool::new(true)),
            task: Mutex::new(Some(task)),
        })
    }

    /// Wrap a client whose connection task is driven elsewhere.
    pub fn from_client(client: Client) -> Self {
        Self {
            client: Arc::new(client),
            auto_commit: Arc::new(AtomicBool::new(true)),
            task: Mutex::new(None),
        }
    }

    /// The underlying client.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

fn pg_config(config: &ConnectConfig) -> DbResult<tokio_postgres::Config> {
    if let Some(url) = &config.url {
        return url
            .parse()
            .map_err(|e: tokio_postgres::Error| DbError::Config(format!("invalid url: {e}")));
    }
    if config.database.is_empty() {
        return Err(DbError::Config("database name not informed".to_string()));
    }

    let mut pg = tokio_postgres::Config::new();
    pg.host(&config.server).dbname(&config.database);
    if let Some(port) = config.port {
        pg.port(port);
    }
    if !config.user.is_empty() {
        pg.user(&config.user);
    }
    if !config.password.is_empty() {
        pg.password(&config.password);
    }
    let timeout = config.login_timeout_duration();
    if !timeout.is_zero() {
        pg.connect_timeout(timeout);
    }
    Ok(pg)
}

#[async_trait]
impl Connection for PgConnection {
    fn prepare(&self, sql: &str) -> DbResult<Box<dyn PreparedStatement>> {
        Ok(Box::new(PgPreparedStatement::new(
            self.client.clone(),
            self.auto_commit.clone(),
            sql,
        )))
    }

    fn prepare_call(&self, procedure: &str) -> DbResult<Box<dyn CallableStatement>> {
        Ok(Box::new(PgCallableStatement::new(
            self.client.clone(),
            procedure,
        )))
    }

    async fn set_auto_commit(&self, auto_commit: bool) -> DbResult<()> {
        let previous = self.auto_commit.swap(auto_commit, Ordering::SeqCst);
        if previous == auto_commit {
            return Ok(());
        }
        let sql = if auto_commit { "COMMIT" } else { "BEGIN" };
        if let Err(e) = self.client.batch_execute(sql).await {
            self.auto_commit.store(previous, Ordering::SeqCst);
            return Err(e.into());
        }
        Ok(())
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit.load(Ordering::SeqCst)
    }

    async fn commit(&self) -> DbResult<()> {
        if self.auto_commit() {
            return Ok(());
        }
        self.client.batch_execute("COMMIT; BEGIN").await?;
        Ok(())
    }

    async fn rollback(&self) -> DbResult<()> {
        if self.auto_commit() {
            return Ok(());
        }
        self.client.batch_execute("ROLLBACK; BEGIN").await?;
        Ok(())
    }

    async fn is_valid(&self) -> DbResult<bool> {
        if self.client.is_closed() {
            return Ok(false);
        }
        Ok(self.client.simple_query("SELECT 1").await.is_ok())
    }

    async fn close(&self) -> DbResult<()> {
        let task = self
            .task
            .lock()
            .map_err(|_| DbError::Connection("connection task lock poisoned".to_string()))?
            .take();
        if let Some(task) = task {
            task.abort();
        }
        Ok(())
    }

    fn metadata(&self) -> &dyn MetadataSource {
        self
    }
}
