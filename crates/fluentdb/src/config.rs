//! Connection configuration.

use crate::dialect::DatabaseKind;
use crate::error::{DbError, DbResult};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Login timeout applied when none is configured.
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(15);

/// Everything needed to open a connection for one database kind.
///
/// Load it from TOML:
///
/// ```toml
/// kind = "postgresql"
/// server = "localhost"
/// port = 5432
/// database = "books"
/// user = "app"
/// password = "${APP_DB_PASSWORD}"
/// ```
///
/// `${VAR}` references in string fields are expanded from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectConfig {
    pub kind: DatabaseKind,
    pub server: String,
    pub port: Option<u16>,
    /// Database directory (file-based engines such as H2).
    pub directory: String,
    pub database: String,
    /// Named instance (SQL Server kinds).
    pub instance: Option<String>,
    pub user: String,
    pub password: String,
    pub login_timeout_secs: u64,
    /// Explicit connection URL; overrides the dialect template when set.
    pub url: Option<String>,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            kind: DatabaseKind::default(),
            server: "localhost".to_string(),
            port: None,
            directory: String::new(),
            database: String::new(),
            instance: None,
            user: String::new(),
            password: String::new(),
            login_timeout_secs: DEFAULT_LOGIN_TIMEOUT.as_secs(),
            url: None,
        }
    }
}

impl ConnectConfig {
    /// Create a configuration for `kind` with defaults.
    pub fn new(kind: DatabaseKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.server = server.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn directory(mut self, directory: impl Into<String>) -> Self {
        self.directory = directory.into();
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    /// Set user and password.
    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    pub fn login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout_secs = timeout.as_secs();
        self
    }

    /// Use an explicit URL instead of rendering the dialect template.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn login_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }

    /// The connection URL: the explicit one, or the dialect template rendered
    /// with this configuration's endpoint.
    pub fn connection_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        let port = self.port.map(|p| p.to_string()).unwrap_or_default();
        self.kind.dialect().render_url(
            &self.server,
            &port,
            &self.directory,
            &self.database,
            self.instance.as_deref(),
        )
    }

    /// Parse a TOML document.
    pub fn from_toml_str(raw: &str) -> DbResult<Self> {
        let mut config: ConnectConfig = toml::from_str(raw)
            .map_err(|e| DbError::Config(format!("failed to parse connection config: {e}")))?;
        config.expand_env()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DbError::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Build a configuration from `FLUENTDB_*` environment variables.
    ///
    /// `FLUENTDB_URL` alone is enough for PostgreSQL; otherwise
    /// `FLUENTDB_KIND`, `FLUENTDB_SERVER`, `FLUENTDB_PORT`, `FLUENTDB_DIR`,
    /// `FLUENTDB_DATABASE`, `FLUENTDB_INSTANCE`, `FLUENTDB_USER`,
    /// `FLUENTDB_PASSWORD` and `FLUENTDB_LOGIN_TIMEOUT` are read when present.
    pub fn from_env() -> DbResult<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        let mut config = ConnectConfig::default();
        if let Some(kind) = var("FLUENTDB_KIND") {
            config.kind = kind.parse()?;
        }
        if let Some(server) = var("FLUENTDB_SERVER") {
            config.server = server;
        }
        if let Some(port) = var("FLUENTDB_PORT") {
            config.port = Some(
                port.parse()
                    .map_err(|e| DbError::Config(format!("FLUENTDB_PORT: {e}")))?,
            );
        }
        if let Some(timeout) = var("FLUENTDB_LOGIN_TIMEOUT") {
            config.login_timeout_secs = timeout
                .parse()
                .map_err(|e| DbError::Config(format!("FLUENTDB_LOGIN_TIMEOUT: {e}")))?;
        }
        config.directory = var("FLUENTDB_DIR").unwrap_or_default();
        config.database = var("FLUENTDB_DATABASE").unwrap_or_default();
        config.instance = var("FLUENTDB_INSTANCE");
        config.user = var("FLUENTDB_USER").unwrap_or_default();
        config.password = var("FLUENTDB_PASSWORD").unwrap_or_default();
        config.url = var("FLUENTDB_URL");

        if config.url.is_none() && config.database.is_empty() {
            return Err(DbError::Config(
                "neither FLUENTDB_URL nor FLUENTDB_DATABASE is set".to_string(),
            ));
        }
        Ok(config)
    }

    fn expand_env(&mut self) -> DbResult<()> {
        for field in [
            &mut self.server,
            &mut self.directory,
            &mut self.database,
            &mut self.user,
            &mut self.password,
        ] {
            *field = expand_env_vars(field)?;
        }
        for field in [&mut self.instance, &mut self.url].into_iter().flatten() {
            *field = expand_env_vars(field)?;
        }
        Ok(())
    }
}

/// Expand `${VAR}` references.
fn expand_env_vars(input: &str) -> DbResult<String> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(DbError::Config(format!("unterminated ${{...}} in '{input}'")));
        };
        let name = &after[..end];
        let value = std::env::var(name)
            .map_err(|_| DbError::Config(format!("environment variable '{name}' is not set")))?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}
