//! Statement execution: data changes, DDL, batches, procedure calls and
//! their out parameters.

use super::{Operation, Session};
use crate::driver::{OutType, PreparedStatement};
use crate::error::{DbError, DbResult};
use crate::record::Record;
use crate::value::SqlValue;
use chrono::NaiveDate;
use serde_json::Value;

impl Session {
    /// Execute the active INSERT, UPDATE, DELETE, CREATE or procedure.
    ///
    /// Returns the affected row count (`0` for DDL). Parameters are cleared
    /// and the statement is released whether or not execution succeeds.
    pub async fn execute(&mut self) -> DbResult<u64> {
        let operation = self.operation;
        let result = match operation {
            Operation::Insert | Operation::Update | Operation::Delete => {
                self.execute_update(operation).await
            }
            Operation::Create => self.execute_create().await,
            Operation::Procedure => self.execute_procedure().await,
            Operation::None | Operation::Select => {
                Err(DbError::invalid_operation("execute", operation))
            }
        };
        self.params.clear();
        result
    }

    async fn execute_update(&mut self, operation: Operation) -> DbResult<u64> {
        let sql = self.compiled_sql(operation)?;
        let mut statement = self.open_statement(&sql)?;
        let result = statement.execute_update().await;
        statement.close();
        result
    }

    async fn execute_create(&mut self) -> DbResult<u64> {
        let sql = self.compiled_sql(Operation::Create)?;
        let mut statement = self.live_connection()?.prepare(&sql)?;
        tracing::debug!(target: "fluentdb.sql", query_type = ?Operation::Create, sql = %sql, "executing");
        let result = statement.execute().await;
        statement.close();
        result.map(|_| 0)
    }

    async fn execute_procedure(&mut self) -> DbResult<u64> {
        let Some(statement) = self.procedure.statement.as_mut() else {
            return Err(DbError::invalid_operation("execute", Operation::Procedure));
        };
        for (i, value) in self.params.iter().enumerate() {
            statement.bind(i + 1, value.clone())?;
        }
        tracing::debug!(
            target: "fluentdb.sql",
            query_type = ?Operation::Procedure,
            param_count = self.params.len(),
            sql = %statement.sql(),
            "executing"
        );
        statement.execute().await?;
        Ok(u64::try_from(statement.update_count()).unwrap_or(0))
    }

    /// Insert every record in one batch round trip.
    ///
    /// Only valid after [`Session::insert`] (or raw INSERT SQL with
    /// [`Session::fields`]). Each record is bound in declared field order; a
    /// record missing a field fails the whole batch with that record attached
    /// to the error.
    pub async fn execute_batch(&mut self, records: &[Record]) -> DbResult<Vec<u64>> {
        let result = self.run_batch(records).await;
        self.params.clear();
        result
    }

    async fn run_batch(&mut self, records: &[Record]) -> DbResult<Vec<u64>> {
        if self.operation != Operation::Insert {
            return Err(DbError::invalid_operation("execute_batch", self.operation));
        }
        let sql = self.compiled_sql(Operation::Insert)?;
        let mut statement = self.live_connection()?.prepare(&sql)?;
        tracing::debug!(
            target: "fluentdb.sql",
            query_type = ?Operation::Insert,
            batch_size = records.len(),
            sql = %sql,
            "executing batch"
        );
        let result = fill_batch(statement.as_mut(), &self.insert.fields, records).await;
        statement.close();
        result
    }

    // ==================== Out parameters ====================

    /// Register the 1-based `index` of the active procedure as an out
    /// parameter of `out_type`. A NULL placeholder is bound at that index.
    pub fn out_param(&mut self, index: usize, out_type: OutType) -> DbResult<&mut Self> {
        if self.operation != Operation::Procedure {
            return Err(DbError::invalid_operation("out_param", self.operation));
        }
        let Some(statement) = self.procedure.statement.as_mut() else {
            return Err(DbError::invalid_operation("out_param", self.operation));
        };
        statement.register_out_parameter(index.max(1), out_type.sql_type())?;
        Ok(self.param_at(index, SqlValue::Null))
    }

    /// Raw value of an out parameter after execution; `None` when unset,
    /// NULL or when no procedure is active.
    pub fn out_value(&self, index: usize) -> DbResult<Option<SqlValue>> {
        match &self.procedure.statement {
            Some(statement) => Ok(statement.out_value(index)?.filter(|v| !v.is_null())),
            None => Ok(None),
        }
    }

    pub fn out_string(&self, index: usize) -> DbResult<Option<String>> {
        Ok(self.out_value(index)?.and_then(|v| v.to_text()))
    }

    pub fn out_i64(&self, index: usize) -> DbResult<Option<i64>> {
        Ok(self.out_value(index)?.and_then(|v| v.as_i64()))
    }

    pub fn out_f64(&self, index: usize) -> DbResult<Option<f64>> {
        Ok(self.out_value(index)?.and_then(|v| v.as_f64()))
    }

    pub fn out_bool(&self, index: usize) -> DbResult<Option<bool>> {
        Ok(self.out_value(index)?.and_then(|v| v.as_bool()))
    }

    pub fn out_date(&self, index: usize) -> DbResult<Option<NaiveDate>> {
        Ok(self.out_value(index)?.and_then(|v| v.as_date()))
    }
}

async fn fill_batch(
    statement: &mut dyn PreparedStatement,
    fields: &[String],
    records: &[Record],
) -> DbResult<Vec<u64>> {
    if fields.is_empty() {
        return Err(DbError::MissingFields(Operation::Insert));
    }
    for record in records {
        for (i, field) in fields.iter().enumerate() {
            let value = record_value(record, field).ok_or_else(|| DbError::Batch {
                message: format!("field '{field}' not found in record"),
                record: Value::Object(record.clone()).to_string(),
            })?;
            statement
                .bind(i + 1, SqlValue::from(value))
                .map_err(|e| DbError::Batch {
                    message: e.to_string(),
                    record: Value::Object(record.clone()).to_string(),
                })?;
        }
        statement.add_batch()?;
    }
    statement.execute_batch().await
}

/// Look a field up by its full name, then without a table qualifier.
fn record_value<'a>(record: &'a Record, field: &str) -> Option<&'a Value> {
    record.get(field).or_else(|| {
        field
            .split_once('.')
            .and_then(|(_, column)| record.get(column))
    })
}
