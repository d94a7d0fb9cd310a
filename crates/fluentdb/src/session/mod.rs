//! The fluent statement session.
//!
//! A [`Session`] owns one connection and accumulates statement intent
//! through chained calls. SQL is compiled lazily, on the first execution or
//! SQL accessor call, and cached until the operation is replaced or the
//! session is reset.
//!
//! # Example
//!
//! ```ignore
//! use fluentdb::{ConnectConfig, DatabaseKind, Session};
//!
//! let mut db = Session::connect(&ConnectConfig::from_env()?).await?;
//!
//! db.insert("book").fields("id, title, price").param(1).param("Dune").param(9.9);
//! db.execute().await?;
//!
//! let books = db
//!     .select("id, title")
//!     .from("book")
//!     .where_("price < ?")
//!     .param(20)
//!     .query()
//!     .await?;
//! ```

pub mod compile;
mod execute;
mod query;


use crate::config::ConnectConfig;
use crate::dialect::{DatabaseKind, Dialect};
use crate::driver::postgres::PgConnection;
use crate::driver::{CallableStatement, Connection, MetadataSource, PreparedStatement};
use crate::error::{DbError, DbResult};
use crate::value::SqlValue;
use compile::{SelectParts, split_list};

/// The statement kind a session is currently building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operation {
    #[default]
    None,
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Procedure,
}

/// Anything that can be turned into a field or alias list.
///
/// A single string is split on commas, so `"id, title"` and
/// `["id", "title"]` are equivalent.
pub trait FieldList {
    fn into_fields(self) -> Vec<String>;
}

impl FieldList for &str {
    fn into_fields(self) -> Vec<String> {
        split_list(self)
    }
}

impl FieldList for String {
    fn into_fields(self) -> Vec<String> {
        split_list(&self)
    }
}

impl FieldList for &String {
    fn into_fields(self) -> Vec<String> {
        split_list(self)
    }
}

impl FieldList for Vec<String> {
    fn into_fields(self) -> Vec<String> {
        self
    }
}

impl FieldList for &[String] {
    fn into_fields(self) -> Vec<String> {
        self.to_vec()
    }
}

impl FieldList for Vec<&str> {
    fn into_fields(self) -> Vec<String> {
        self.into_iter().map(str::to_string).collect()
    }
}

impl FieldList for &[&str] {
    fn into_fields(self) -> Vec<String> {
        self.iter().map(|s| (*s).to_string()).collect()
    }
}

impl<const N: usize> FieldList for [&str; N] {
    fn into_fields(self) -> Vec<String> {
        self.iter().map(|s| (*s).to_string()).collect()
    }
}

#[derive(Default)]
struct SelectState {
    fields: Vec<String>,
    aliases: Option<Vec<String>>,
    from: String,
    where_clause: String,
    order_by: String,
    max_results: u32,
    sql: Option<String>,
}

#[derive(Default)]
struct InsertState {
    table: String,
    fields: Vec<String>,
    sql: Option<String>,
}

#[derive(Default)]
struct UpdateState {
    table: String,
    fields: Vec<String>,
    where_clause: String,
    sql: Option<String>,
}

#[derive(Default)]
struct DeleteState {
    table: String,
    where_clause: String,
    sql: Option<String>,
}

#[derive(Default)]
struct ProcedureState {
    name: String,
    fields: Vec<String>,
    aliases: Option<Vec<String>>,
    statement: Option<Box<dyn CallableStatement>>,
}

impl ProcedureState {
    fn release(&mut self) {
        if let Some(mut statement) = self.statement.take() {
            statement.close();
        }
    }
}

/// A fluent, stateful statement builder bound to one connection.
///
/// Each operation kind keeps its own state, so an INSERT prepared between
/// two SELECTs does not disturb the SELECT's fields or predicate. The
/// parameter list is shared and cleared after every execution and whenever a
/// new operation is started.
pub struct Session {
    conn: Option<Box<dyn Connection>>,
    kind: DatabaseKind,
    database_id: String,
    operation: Operation,
    params: Vec<SqlValue>,
    schema: String,
    last_sql: String,
    select: SelectState,
    insert: InsertState,
    update: UpdateState,
    delete: DeleteState,
    create_sql: Option<String>,
    procedure: ProcedureState,
}

impl Session {
    /// Open a connection described by `config`.
    ///
    /// Only PostgreSQL has an in-tree driver; other kinds are served by
    /// passing a [`Connection`] implementation to [`Session::with_connection`].
    pub async fn connect(config: &ConnectConfig) -> DbResult<Self> {
        match config.kind {
            DatabaseKind::PostgreSql => {
                let conn = PgConnection::connect(config).await?;
                let mut session = Self::with_connection(config.kind, Box::new(conn));
                session.database_id = config.database.clone();
                Ok(session)
            }
            other => Err(DbError::Unsupported(format!(
                "no in-tree driver for {other}; use Session::with_connection"
            ))),
        }
    }

    /// Wrap an open connection; `kind` selects the SQL dialect.
    pub fn with_connection(kind: DatabaseKind, conn: Box<dyn Connection>) -> Self {
        Self {
            conn: Some(conn),
            kind,
            database_id: String::new(),
            operation: Operation::None,
            params: Vec::new(),
            schema: String::new(),
            last_sql: String::new(),
            select: SelectState::default(),
            insert: InsertState::default(),
            update: UpdateState::default(),
            delete: DeleteState::default(),
            create_sql: None,
            procedure: ProcedureState::default(),
        }
    }

    pub fn kind(&self) -> DatabaseKind {
        self.kind
    }

    pub fn dialect(&self) -> &'static Dialect {
        self.kind.dialect()
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    pub fn set_database_id(&mut self, id: impl Into<String>) {
        self.database_id = id.into();
    }

    /// The SQL most recently compiled or assigned.
    pub fn last_sql(&self) -> &str {
        &self.last_sql
    }

    /// The parameters bound so far for the next execution.
    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    /// The live connection, if it has not been closed.
    pub fn connection(&self) -> Option<&dyn Connection> {
        self.conn.as_deref()
    }

    /// The metadata facility of the live connection.
    pub fn metadata(&self) -> DbResult<&dyn MetadataSource> {
        Ok(self.live_connection()?.metadata())
    }

    fn live_connection(&self) -> DbResult<&dyn Connection> {
        self.conn
            .as_deref()
            .ok_or_else(|| DbError::Connection("connection is closed".to_string()))
    }

    // ==================== Operations ====================

    /// Start a SELECT of `fields`.
    pub fn select(&mut self, fields: impl FieldList) -> &mut Self {
        self.select = SelectState {
            fields: fields.into_fields(),
            ..SelectState::default()
        };
        self.start(Operation::Select)
    }

    /// Start an INSERT into `table`.
    pub fn insert(&mut self, table: &str) -> &mut Self {
        self.insert = InsertState {
            table: table.to_string(),
            ..InsertState::default()
        };
        self.start(Operation::Insert)
    }

    /// Start an UPDATE of `table`.
    pub fn update(&mut self, table: &str) -> &mut Self {
        self.update = UpdateState {
            table: table.to_string(),
            ..UpdateState::default()
        };
        self.start(Operation::Update)
    }

    /// Start a DELETE from `table`.
    pub fn delete(&mut self, table: &str) -> &mut Self {
        self.delete = DeleteState {
            table: table.to_string(),
            ..DeleteState::default()
        };
        self.start(Operation::Delete)
    }

    /// Use caller-written SQL.
    ///
    /// The operation is taken from the earliest `select`, `insert`, `update`,
    /// `delete` or `create` keyword. Text with none of them leaves the
    /// session without an operation, and executing it fails.
    pub fn sql(&mut self, text: &str) -> &mut Self {
        let operation = compile::classify(text);
        let text = text.to_string();
        match operation {
            Operation::Select => {
                self.select = SelectState {
                    sql: Some(text.clone()),
                    ..SelectState::default()
                };
            }
            Operation::Insert => {
                self.insert = InsertState {
                    sql: Some(text.clone()),
                    ..InsertState::default()
                };
            }
            Operation::Update => {
                self.update = UpdateState {
                    sql: Some(text.clone()),
                    ..UpdateState::default()
                };
            }
            Operation::Delete => {
                self.delete = DeleteState {
                    sql: Some(text.clone()),
                    ..DeleteState::default()
                };
            }
            Operation::Create => self.create_sql = Some(text.clone()),
            Operation::None | Operation::Procedure => {
                tracing::warn!(target: "fluentdb.sql", sql = %text, "no statement keyword found");
            }
        }
        self.last_sql = text;
        self.start(operation)
    }

    /// Prepare a stored-procedure call such as `"update_stock(?, ?)"`.
    pub fn call(&mut self, procedure: &str) -> DbResult<&mut Self> {
        let statement = self.live_connection()?.prepare_call(procedure)?;
        self.procedure.release();
        self.last_sql = statement.sql().to_string();
        self.procedure = ProcedureState {
            name: procedure.to_string(),
            statement: Some(statement),
            ..ProcedureState::default()
        };
        Ok(self.start(Operation::Procedure))
    }

    fn start(&mut self, operation: Operation) -> &mut Self {
        self.operation = operation;
        self.params.clear();
        self
    }

    // ==================== Clauses ====================

    /// Set the field list of the active SELECT, INSERT, UPDATE or procedure.
    pub fn fields(&mut self, fields: impl FieldList) -> &mut Self {
        let fields = fields.into_fields();
        match self.operation {
            Operation::Select => self.select.fields = fields,
            Operation::Insert => self.insert.fields = fields,
            Operation::Update => self.update.fields = fields,
            Operation::Procedure => self.procedure.fields = fields,
            _ => {}
        }
        self
    }

    /// Set explicit result aliases for the active SELECT or procedure.
    pub fn aliases(&mut self, aliases: impl FieldList) -> &mut Self {
        let aliases = Some(aliases.into_fields());
        match self.operation {
            Operation::Procedure => self.procedure.aliases = aliases,
            _ => self.select.aliases = aliases,
        }
        self
    }

    pub fn from(&mut self, from: &str) -> &mut Self {
        self.select.from = from.to_string();
        self
    }

    /// Set the predicate of the active SELECT, UPDATE or DELETE.
    ///
    /// For SELECT, fragments starting with `join`, `inner`, `group` or
    /// `where` are appended as-is; anything else gets a `where` prefix.
    pub fn where_(&mut self, predicate: &str) -> &mut Self {
        let predicate = predicate.to_string();
        match self.operation {
            Operation::Select => self.select.where_clause = predicate,
            Operation::Update => self.update.where_clause = predicate,
            Operation::Delete => self.delete.where_clause = predicate,
            _ => {}
        }
        self
    }

    pub fn order_by(&mut self, clause: &str) -> &mut Self {
        self.select.order_by = clause.to_string();
        self
    }

    /// Qualify table names with `schema` (quoted per dialect).
    pub fn schema(&mut self, schema: &str) -> &mut Self {
        self.schema = schema.to_string();
        self
    }

    /// Limit SELECT rows; `0` means unlimited.
    pub fn max_results(&mut self, n: u32) -> &mut Self {
        self.select.max_results = n;
        self
    }

    // ==================== Parameters ====================

    /// Append a positional parameter.
    pub fn param(&mut self, value: impl Into<SqlValue>) -> &mut Self {
        self.params.push(value.into());
        self
    }

    /// Set the parameter at the 1-based `index`, padding gaps with NULL.
    ///
    /// An index of `0` is treated as `1`.
    pub fn param_at(&mut self, index: usize, value: impl Into<SqlValue>) -> &mut Self {
        let index = index.max(1);
        if self.params.len() < index {
            self.params.resize(index, SqlValue::Null);
        }
        self.params[index - 1] = value.into();
        self
    }

    // ==================== SQL accessors ====================

    /// Compile (once) and return the SELECT text.
    pub fn select_sql(&mut self) -> DbResult<String> {
        self.compiled_sql(Operation::Select)
    }

    pub fn insert_sql(&mut self) -> DbResult<String> {
        self.compiled_sql(Operation::Insert)
    }

    pub fn update_sql(&mut self) -> DbResult<String> {
        self.compiled_sql(Operation::Update)
    }

    pub fn delete_sql(&mut self) -> DbResult<String> {
        self.compiled_sql(Operation::Delete)
    }

    /// The cached SQL of `operation`, compiling it first if needed.
    pub(crate) fn compiled_sql(&mut self, operation: Operation) -> DbResult<String> {
        let dialect = self.kind.dialect();
        let schema = self.schema.as_str();
        let (cached, compiled) = match operation {
            Operation::Select => {
                let s = &self.select;
                match &s.sql {
                    Some(sql) => (true, sql.clone()),
                    None => (
                        false,
                        compile::compile_select(
                            dialect,
                            &SelectParts {
                                fields: &s.fields,
                                aliases: s.aliases.as_deref(),
                                from: &s.from,
                                where_clause: &s.where_clause,
                                order_by: &s.order_by,
                                max_results: s.max_results,
                                schema,
                            },
                        )?,
                    ),
                }
            }
            Operation::Insert => match &self.insert.sql {
                Some(sql) => (true, sql.clone()),
                None => (
                    false,
                    compile::compile_insert(dialect, schema, &self.insert.table, &self.insert.fields)?,
                ),
            },
            Operation::Update => match &self.update.sql {
                Some(sql) => (true, sql.clone()),
                None => (
                    false,
                    compile::compile_update(
                        dialect,
                        schema,
                        &self.update.table,
                        &self.update.fields,
                        &self.update.where_clause,
                    )?,
                ),
            },
            Operation::Delete => match &self.delete.sql {
                Some(sql) => (true, sql.clone()),
                None => (
                    false,
                    compile::compile_delete(
                        dialect,
                        schema,
                        &self.delete.table,
                        &self.delete.where_clause,
                    )?,
                ),
            },
            Operation::Create => match &self.create_sql {
                Some(sql) => (true, sql.clone()),
                None => return Err(DbError::invalid_operation("compile", operation)),
            },
            Operation::None | Operation::Procedure => {
                return Err(DbError::invalid_operation("compile", operation));
            }
        };

        if !cached {
            tracing::debug!(
                target: "fluentdb.sql",
                query_type = ?operation,
                dialect = %self.kind,
                sql = %compiled,
                "compiled statement"
            );
            match operation {
                Operation::Select => self.select.sql = Some(compiled.clone()),
                Operation::Insert => self.insert.sql = Some(compiled.clone()),
                Operation::Update => self.update.sql = Some(compiled.clone()),
                Operation::Delete => self.delete.sql = Some(compiled.clone()),
                _ => {}
            }
        }
        self.last_sql = compiled.clone();
        Ok(compiled)
    }

    /// Prepare `sql` and bind the current parameters.
    fn open_statement(&self, sql: &str) -> DbResult<Box<dyn PreparedStatement>> {
        let mut statement = self.live_connection()?.prepare(sql)?;
        for (i, value) in self.params.iter().enumerate() {
            statement.bind(i + 1, value.clone())?;
        }
        tracing::debug!(
            target: "fluentdb.sql",
            query_type = ?self.operation,
            param_count = self.params.len(),
            sql = %sql,
            "executing"
        );
        Ok(statement)
    }

    // ==================== Lifecycle ====================

    /// Clear every per-operation state and release the procedure handle.
    ///
    /// The connection, schema and database id are kept.
    pub fn reset(&mut self) {
        self.procedure.release();
        self.procedure = ProcedureState::default();
        self.select = SelectState::default();
        self.insert = InsertState::default();
        self.update = UpdateState::default();
        self.delete = DeleteState::default();
        self.create_sql = None;
        self.params.clear();
        self.operation = Operation::None;
    }

    /// Whether the connection is open and answering.
    pub async fn connection_is_valid(&self) -> DbResult<bool> {
        match &self.conn {
            Some(conn) => conn.is_valid().await,
            None => Ok(false),
        }
    }

    /// Release every handle and close the connection.
    pub async fn close(&mut self) -> DbResult<()> {
        self.reset();
        match self.conn.take() {
            Some(conn) => conn.close().await,
            None => Ok(()),
        }
    }

    // ==================== Transactions ====================

    /// Turn auto-commit off; statements run in one transaction until
    /// [`Session::commit_transaction`].
    pub async fn begin_transaction(&self) -> DbResult<()> {
        match &self.conn {
            Some(conn) => conn.set_auto_commit(false).await,
            None => Ok(()),
        }
    }

    pub async fn commit(&self) -> DbResult<()> {
        match &self.conn {
            Some(conn) => conn.commit().await,
            None => Ok(()),
        }
    }

    pub async fn rollback(&self) -> DbResult<()> {
        match &self.conn {
            Some(conn) => conn.rollback().await,
            None => Ok(()),
        }
    }

    /// Commit and turn auto-commit back on.
    pub async fn commit_transaction(&self) -> DbResult<()> {
        self.commit().await?;
        match &self.conn {
            Some(conn) => conn.set_auto_commit(true).await,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("kind", &self.kind)
            .field("database_id", &self.database_id)
            .field("operation", &self.operation)
            .field("params", &self.params)
            .field("last_sql", &self.last_sql)
            .field("connected", &self.conn.is_some())
            .finish()
    }
}
