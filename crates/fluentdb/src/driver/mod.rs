//! Connectivity boundary.
//!
//! [`Session`](crate::Session) only talks to the database through these
//! traits, so any relational backend can sit underneath it:
//!
//! - [`Connection`]: statement factories, auto-commit and transaction control
//! - [`PreparedStatement`]: positional binding, update/query/batch execution
//! - [`CallableStatement`]: stored procedures with out parameters and
//!   multiple results
//! - [`MetadataSource`]: catalog reflection, reported with the conventional
//!   catalog column labels listed in [`labels`]
//!
//! The traits use `async_trait` so they can be boxed; every call is awaited
//! to completion before the session moves on.
//!
//! [`postgres`] provides the in-tree implementation over `tokio-postgres`.

mod result_set;
pub mod postgres;
pub mod types;

pub use result_set::ResultSet;
pub use types::{OutType, SqlType};

use crate::error::DbResult;
use crate::value::SqlValue;
use async_trait::async_trait;

/// Column labels of the metadata result sets.
pub mod labels {
    pub const TABLE_CAT: &str = "TABLE_CAT";
    pub const TABLE_SCHEM: &str = "TABLE_SCHEM";
    pub const TABLE_NAME: &str = "TABLE_NAME";
    pub const TABLE_TYPE: &str = "TABLE_TYPE";
    pub const COLUMN_NAME: &str = "COLUMN_NAME";
    pub const DATA_TYPE: &str = "DATA_TYPE";
    pub const TYPE_NAME: &str = "TYPE_NAME";
    pub const COLUMN_SIZE: &str = "COLUMN_SIZE";
    pub const IS_NULLABLE: &str = "IS_NULLABLE";
    pub const ORDINAL_POSITION: &str = "ORDINAL_POSITION";
    pub const KEY_SEQ: &str = "KEY_SEQ";
    pub const INDEX_NAME: &str = "INDEX_NAME";
    pub const NON_UNIQUE: &str = "NON_UNIQUE";
}

/// A live database connection.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Create a prepared statement for `sql` (with `?` placeholders).
    ///
    /// Implementations may defer the server round trip to the first execution.
    fn prepare(&self, sql: &str) -> DbResult<Box<dyn PreparedStatement>>;

    /// Create a callable statement for a procedure invocation such as
    /// `"update_stock(?, ?)"`.
    fn prepare_call(&self, procedure: &str) -> DbResult<Box<dyn CallableStatement>>;

    /// Toggle auto-commit. Turning it off opens a transaction; turning it
    /// back on commits the open one.
    async fn set_auto_commit(&self, auto_commit: bool) -> DbResult<()>;

    fn auto_commit(&self) -> bool;

    async fn commit(&self) -> DbResult<()>;

    async fn rollback(&self) -> DbResult<()>;

    /// Whether the connection is still usable.
    async fn is_valid(&self) -> DbResult<bool>;

    async fn close(&self) -> DbResult<()>;

    /// The metadata facility of this connection.
    fn metadata(&self) -> &dyn MetadataSource;
}

/// A prepared statement with 1-based positional parameters.
#[async_trait]
pub trait PreparedStatement: Send + Sync {
    fn sql(&self) -> &str;

    /// Bind `value` at the 1-based `index`.
    fn bind(&mut self, index: usize, value: SqlValue) -> DbResult<()>;

    fn clear_parameters(&mut self);

    /// Execute a data-changing statement; returns the affected row count.
    async fn execute_update(&mut self) -> DbResult<u64>;

    async fn execute_query(&mut self) -> DbResult<ResultSet>;

    /// Execute any statement (DDL included); `true` when it produced rows.
    async fn execute(&mut self) -> DbResult<bool>;

    /// Queue the currently bound parameters as one batch entry.
    fn add_batch(&mut self) -> DbResult<()>;

    /// Run every queued entry in one round trip.
    async fn execute_batch(&mut self) -> DbResult<Vec<u64>>;

    /// Release server-side resources. The statement is unusable afterwards.
    fn close(&mut self);
}

/// A stored-procedure call.
#[async_trait]
pub trait CallableStatement: Send + Sync {
    fn sql(&self) -> &str;

    fn bind(&mut self, index: usize, value: SqlValue) -> DbResult<()>;

    fn register_out_parameter(&mut self, index: usize, sql_type: SqlType) -> DbResult<()>;

    /// Execute the call; `true` when the first result is a result set.
    async fn execute(&mut self) -> DbResult<bool>;

    /// Execute the call and return its first result set.
    async fn execute_query(&mut self) -> DbResult<ResultSet>;

    /// Take the current result set, if the current result is one.
    fn result_set(&mut self) -> DbResult<Option<ResultSet>>;

    /// Move to the next result; `true` when it is a result set.
    async fn more_results(&mut self) -> DbResult<bool>;

    /// Update count of the current result; `-1` when the current result is a
    /// result set or there are no more results.
    fn update_count(&self) -> i64;

    /// Value of the out parameter at the 1-based `index` after execution.
    fn out_value(&self, index: usize) -> DbResult<Option<SqlValue>>;

    fn close(&mut self);
}

/// Catalog reflection.
///
/// Empty strings and `None` both mean "do not filter".
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Rows labelled `TABLE_CAT`.
    async fn catalogs(&self) -> DbResult<ResultSet>;

    /// Rows labelled `TABLE_SCHEM`.
    async fn schemas(&self) -> DbResult<ResultSet>;

    /// Rows labelled `TABLE_CAT`, `TABLE_SCHEM`, `TABLE_NAME`, `TABLE_TYPE`.
    async fn tables(&self, catalog: Option<&str>, schema: Option<&str>) -> DbResult<ResultSet>;

    /// Rows labelled `COLUMN_NAME`, `DATA_TYPE`, `TYPE_NAME`, `COLUMN_SIZE`,
    /// `IS_NULLABLE`, `ORDINAL_POSITION`, in ordinal order.
    async fn columns(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: &str,
    ) -> DbResult<ResultSet>;

    /// Rows labelled `COLUMN_NAME`, `KEY_SEQ`.
    async fn primary_keys(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: &str,
    ) -> DbResult<ResultSet>;

    /// Rows labelled `INDEX_NAME`, `NON_UNIQUE`, `COLUMN_NAME`, `ORDINAL_POSITION`.
    async fn index_info(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: &str,
    ) -> DbResult<ResultSet>;
}

/// Store `value` at the 1-based `index`, padding gaps with NULL.
pub fn bind_at(params: &mut Vec<SqlValue>, index: usize, value: SqlValue) -> DbResult<()> {
    if index == 0 {
        return Err(crate::DbError::Other(
            "parameter indexes are 1-based".to_string(),
        ));
    }
    if params.len() < index {
        params.resize(index, SqlValue::Null);
    }
    params[index - 1] = value;
    Ok(())
}
