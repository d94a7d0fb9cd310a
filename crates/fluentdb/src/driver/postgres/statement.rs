use super::decode;
use crate::driver::{CallableStatement, PreparedStatement, ResultSet, SqlType, bind_at};
use crate::error::{DbError, DbResult};
use crate::value::SqlValue;
use async_trait::async_trait;
use futures_util::future::try_join_all;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, SimpleQueryMessage, Statement};

/// Rewrite `?` placeholders to `$1, $2, ...`, leaving quoted text and
/// comments untouched.
pub(crate) fn rewrite_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut chars = sql.chars().peekable();
    let mut n = 0usize;

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                out.push(c);
                for inner in chars.by_ref() {
                    out.push(inner);
                    if inner == c {
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                out.push(c);
                for inner in chars.by_ref() {
                    out.push(inner);
                    if inner == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                out.push(c);
                let mut prev = '\0';
                for inner in chars.by_ref() {
                    out.push(inner);
                    if prev == '*' && inner == '/' {
                        break;
                    }
                    prev = inner;
                }
            }
            '?' => {
                n += 1;
                out.push('$');
                out.push_str(&n.to_string());
            }
            _ => out.push(c),
        }
    }
    out
}

fn param_refs(params: &[SqlValue]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

fn closed_error(sql: &str) -> DbError {
    DbError::Other(format!("statement is closed: {sql}"))
}

/// A lazily prepared statement.
///
/// The server-side statement is created on first execution and reused until
/// [`PreparedStatement::close`].
pub struct PgPreparedStatement {
    client: Arc<Client>,
    auto_commit: Arc<AtomicBool>,
    sql: String,
    pg_sql: String,
    statement: Option<Statement>,
    params: Vec<SqlValue>,
    batch: Vec<Vec<SqlValue>>,
    closed: bool,
}

impl PgPreparedStatement {
    pub(crate) fn new(client: Arc<Client>, auto_commit: Arc<AtomicBool>, sql: &str) -> Self {
        Self {
            client,
            auto_commit,
            sql: sql.to_string(),
            pg_sql: rewrite_placeholders(sql),
            statement: None,
            params: Vec::new(),
            batch: Vec::new(),
            closed: false,
        }
    }

    async fn statement(&mut self) -> DbResult<Statement> {
        if self.closed {
            return Err(closed_error(&self.sql));
        }
        if let Some(statement) = &self.statement {
            return Ok(statement.clone());
        }
        let statement = self.client.prepare(&self.pg_sql).await?;
        self.statement = Some(statement.clone());
        Ok(statement)
    }
}

#[async_trait]
impl PreparedStatement for PgPreparedStatement {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn bind(&mut self, index: usize, value: SqlValue) -> DbResult<()> {
        bind_at(&mut self.params, index, value)
    }

    fn clear_parameters(&mut self) {
        self.params.clear();
    }

    async fn execute_update(&mut self) -> DbResult<u64> {
        let statement = self.statement().await?;
        let affected = self
            .client
            .execute(&statement, &param_refs(&self.params))
            .await?;
        Ok(affected)
    }

    async fn execute_query(&mut self) -> DbResult<ResultSet> {
        let statement = self.statement().await?;
        let rows = self
            .client
            .query(&statement, &param_refs(&self.params))
            .await?;
        decode::result_set(statement.columns(), &rows)
    }

    async fn execute(&mut self) -> DbResult<bool> {
        if self.closed {
            return Err(closed_error(&self.sql));
        }
        if self.params.is_empty() {
            // simple protocol so DDL scripts with several statements work
            let messages = self.client.simple_query(&self.sql).await?;
            return Ok(messages
                .iter()
                .any(|m| matches!(m, SimpleQueryMessage::Row(_))));
        }
        let statement = self.statement().await?;
        self.client
            .execute(&statement, &param_refs(&self.params))
            .await?;
        Ok(!statement.columns().is_empty())
    }

    fn add_batch(&mut self) -> DbResult<()> {
        if self.closed {
            return Err(closed_error(&self.sql));
        }
        self.batch.push(std::mem::take(&mut self.params));
        Ok(())
    }

    async fn execute_batch(&mut self) -> DbResult<Vec<u64>> {
        let statement = self.statement().await?;
        let batch = std::mem::take(&mut self.batch);

        // Outside a transaction the batch gets its own, so a failing entry
        // leaves none of the others behind.
        let own_transaction = self.auto_commit.load(Ordering::SeqCst);
        if own_transaction {
            self.client.batch_execute("BEGIN").await?;
        }

        let client = &self.client;
        let statement = &statement;
        // All entries are in flight together; the client pipelines them.
        let result = try_join_all(batch.iter().map(|params| async move {
            client.execute(statement, &param_refs(params)).await
        }))
        .await;

        match result {
            Ok(counts) => {
                if own_transaction {
                    self.client.batch_execute("COMMIT").await?;
                }
                Ok(counts)
            }
            Err(error) if own_transaction => match self.client.batch_execute("ROLLBACK").await {
                Ok(()) => Err(error.into()),
                Err(rollback_err) => Err(DbError::Other(format!(
                    "{error} (rollback failed: {rollback_err})"
                ))),
            },
            Err(error) => Err(error.into()),
        }
    }

    fn close(&mut self) {
        self.statement = None;
        self.params.clear();
        self.batch.clear();
        self.closed = true;
    }
}

enum CallResult {
    Rows(ResultSet),
    Count(u64),
}

/// A `CALL` of a stored procedure.
///
/// Out parameters are read from the single row PostgreSQL returns for
/// `OUT`/`INOUT` arguments, in ascending parameter order.
pub struct PgCallableStatement {
    client: Arc<Client>,
    sql: String,
    pg_sql: String,
    params: Vec<SqlValue>,
    out_params: BTreeMap<usize, SqlType>,
    out_values: BTreeMap<usize, SqlValue>,
    pending: VecDeque<CallResult>,
    current: Option<CallResult>,
    closed: bool,
}

impl PgCallableStatement {
    pub(crate) fn new(client: Arc<Client>, procedure: &str) -> Self {
        let procedure = procedure.trim();
        let sql = if procedure.contains('(') {
            format!("CALL {procedure}")
        } else {
            format!("CALL {procedure}()")
        };
        Self {
            client,
            pg_sql: rewrite_placeholders(&sql),
            sql,
            params: Vec::new(),
            out_params: BTreeMap::new(),
            out_values: BTreeMap::new(),
            pending: VecDeque::new(),
            current: None,
            closed: false,
        }
    }

    /// Always the extended protocol, so result columns decode by their
    /// server type whether or not parameters were bound.
    async fn run_prepared(&self) -> DbResult<Vec<CallResult>> {
        let statement = self.client.prepare(&self.pg_sql).await?;
        let rows = self
            .client
            .query(&statement, &param_refs(&self.params))
            .await?;
        if statement.columns().is_empty() {
            return Ok(vec![CallResult::Count(rows.len() as u64)]);
        }
        Ok(vec![CallResult::Rows(decode::result_set(
            statement.columns(),
            &rows,
        )?)])
    }

    fn capture_out_values(&mut self) {
        if self.out_params.is_empty() {
            return;
        }
        let Some(CallResult::Rows(rs)) = self.pending.front() else {
            return;
        };
        if let Some(row) = rs.row(0) {
            self.out_values = typed_out_values(&self.out_params, row);
        }
        // the out-parameter row is not a caller-visible result
        self.pending.pop_front();
    }
}

/// Pair registered out parameters with the out-parameter row, in ascending
/// index order, converting each value to its registered type.
fn typed_out_values(
    out_params: &BTreeMap<usize, SqlType>,
    row: &[SqlValue],
) -> BTreeMap<usize, SqlValue> {
    out_params
        .iter()
        .zip(row)
        .map(|((index, sql_type), value)| (*index, value.clone().convert_to(*sql_type)))
        .collect()
}

#[async_trait]
impl CallableStatement for PgCallableStatement {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn bind(&mut self, index: usize, value: SqlValue) -> DbResult<()> {
        bind_at(&mut self.params, index, value)
    }

    fn register_out_parameter(&mut self, index: usize, sql_type: SqlType) -> DbResult<()> {
        if index == 0 {
            return Err(DbError::Other("parameter indexes are 1-based".to_string()));
        }
        self.out_params.insert(index, sql_type);
        Ok(())
    }

    async fn execute(&mut self) -> DbResult<bool> {
        if self.closed {
            return Err(closed_error(&self.sql));
        }
        self.pending.clear();
        self.current = None;
        self.out_values.clear();

        self.pending = self.run_prepared().await?.into();
        self.capture_out_values();
        self.current = self.pending.pop_front();
        Ok(matches!(self.current, Some(CallResult::Rows(_))))
    }

    async fn execute_query(&mut self) -> DbResult<ResultSet> {
        if self.execute().await? {
            return Ok(self.result_set()?.unwrap_or_default());
        }
        Ok(ResultSet::empty())
    }

    fn result_set(&mut self) -> DbResult<Option<ResultSet>> {
        match self.current.take() {
            Some(CallResult::Rows(rs)) => Ok(Some(rs)),
            other => {
                self.current = other;
                Ok(None)
            }
        }
    }

    async fn more_results(&mut self) -> DbResult<bool> {
        self.current = self.pending.pop_front();
        Ok(matches!(self.current, Some(CallResult::Rows(_))))
    }

    fn update_count(&self) -> i64 {
        match &self.current {
            Some(CallResult::Count(n)) => i64::try_from(*n).unwrap_or(i64::MAX),
            _ => -1,
        }
    }

    fn out_value(&self, index: usize) -> DbResult<Option<SqlValue>> {
        if !self.out_params.contains_key(&index) {
            return Err(DbError::Other(format!(
                "parameter {index} is not registered as an out parameter"
            )));
        }
        Ok(self.out_values.get(&index).cloned())
    }

    fn close(&mut self) {
        self.params.clear();
        self.pending.clear();
        self.current = None;
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_placeholders_in_order() {
        assert_eq!(
            rewrite_placeholders("insert into book (id, title) values (?, ?)"),
            "insert into book (id, title) values ($1, $2)"
        );
    }

    #[test]
    fn leaves_quoted_and_commented_marks_alone() {
        assert_eq!(
            rewrite_placeholders("select '?' as q, \"a?\" from t where x = ? -- why?\n and y = ?"),
            "select '?' as q, \"a?\" from t where x = $1 -- why?\n and y = $2"
        );
        assert_eq!(
            rewrite_placeholders("select /* ? */ ? from t"),
            "select /* ? */ $1 from t"
        );
    }

    #[test]
    fn out_values_take_their_registered_type() {
        let out_params = BTreeMap::from([(2, SqlType::BIGINT), (3, SqlType::VARCHAR)]);
        let row = [SqlValue::Text("42".into()), SqlValue::Int(7)];
        let values = typed_out_values(&out_params, &row);
        assert_eq!(values[&2], SqlValue::Int(42));
        assert_eq!(values[&3], SqlValue::Text("7".into()));
    }

    #[test]
    fn escaped_quotes_stay_inside_the_literal() {
        assert_eq!(
            rewrite_placeholders("select 'it''s ?' , ?"),
            "select 'it''s ?' , $1"
        );
    }
}
