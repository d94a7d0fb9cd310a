//! # fluentdb
//!
//! A fluent, dialect-aware SQL builder that executes through a small
//! connectivity layer and returns rows as JSON-like records.
//!
//! ## Features
//!
//! - **One API, many dialects**: limit syntax, alias style and identifier
//!   quoting come from an immutable per-database descriptor
//! - **Lazy SQL**: statements are compiled on first use and cached
//! - **Records, not structs**: rows come back as ordered
//!   `serde_json::Map`s with dates normalized to `yyyy-MM-dd HH:mm:ss.SSS`
//! - **Batches and procedures**: one round trip for bulk inserts, out
//!   parameters and multi-result procedure calls
//! - **Pluggable backends**: the [`driver`] traits are all the session needs;
//!   PostgreSQL ships in-tree
//!
//! ## Usage
//!
//! ```ignore
//! use fluentdb::{ConnectConfig, Session};
//!
//! let mut db = Session::connect(&ConnectConfig::load("fluentdb.toml")?).await?;
//!
//! db.insert("publisher").fields("id, name").param(5000).param("Acme");
//! db.execute().await?;
//!
//! let rows = db
//!     .select("p.id, p.name")
//!     .aliases("id, name")
//!     .from("publisher p")
//!     .order_by("p.name")
//!     .max_results(10)
//!     .query()
//!     .await?;
//! ```

pub mod config;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod record;
pub mod session;
pub mod value;

pub use config::ConnectConfig;
pub use dialect::{AliasStyle, DatabaseKind, Dialect, LimitSyntax};
pub use driver::{
    CallableStatement, Connection, MetadataSource, OutType, PreparedStatement, ResultSet, SqlType,
};
pub use error::{DbError, DbResult};
pub use record::Record;
pub use session::{FieldList, Operation, Session};
pub use value::SqlValue;
