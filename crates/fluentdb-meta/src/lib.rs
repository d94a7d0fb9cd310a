//! fluentdb-meta
//!
//! Schema reflection for any connection that implements
//! [`fluentdb::driver::MetadataSource`].
//!
//! # Features
//!
//! - **Catalog listing**: catalogs, schemas and base tables
//! - **Table description**: ordered columns with a coarse semantic type,
//!   size, nullability and primary-key/index flags
//! - **Foreign-key inference**: a `<table>_id` column references `<table>`
//!   when that table exists
//! - **JSON**: [`Table`] and [`Column`] round-trip through `serde_json`
//!
//! # Example
//!
//! ```ignore
//! use fluentdb::{ConnectConfig, Session};
//! use fluentdb_meta::MetadataIntrospector;
//!
//! let db = Session::connect(&ConnectConfig::from_env()?).await?;
//! let mut meta = MetadataIntrospector::new(db.metadata()?);
//!
//! for name in meta.list_tables(None, Some("public")).await? {
//!     let table = meta.describe_table(None, Some("public"), &name).await?;
//!     println!("{}", table.to_json_pretty()?);
//! }
//! ```

pub mod error;
pub mod introspect;
pub mod table;
pub mod type_map;

pub use error::{MetaError, MetaResult};
pub use introspect::MetadataIntrospector;
pub use table::{Column, Table};
pub use type_map::{SemanticType, semantic_type};
