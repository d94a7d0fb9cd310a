//! Queries and result materialization.

use super::compile::resolve_aliases;
use super::{Operation, Session};
use crate::dialect::Dialect;
use crate::driver::{CallableStatement, ResultSet};
use crate::error::{DbError, DbResult};
use crate::record::{Record, normalize};

impl Session {
    /// Run the active SELECT (or procedure) and return every row as a record.
    pub async fn query(&mut self) -> DbResult<Vec<Record>> {
        match self.operation {
            Operation::Select => {
                let result = self.run_select().await;
                self.params.clear();
                result.and_then(|(rs, aliases)| materialize(rs, aliases.as_deref()))
            }
            Operation::Procedure => self.query_procedure(false).await,
            operation => Err(DbError::invalid_operation("query", operation)),
        }
    }

    /// Run the active SELECT and return its first row.
    ///
    /// An empty result gives an empty record, and "no data" errors from the
    /// cursor are treated the same way.
    pub async fn query_unique(&mut self) -> DbResult<Record> {
        if self.operation != Operation::Select {
            return Err(DbError::invalid_operation("query_unique", self.operation));
        }
        let result = self.run_select().await;
        self.params.clear();
        let first = result.and_then(|(mut rs, aliases)| {
            if !rs.next() {
                return Ok(Record::new());
            }
            let labels = aliases.unwrap_or_else(|| rs.columns().to_vec());
            current_record(&rs, &labels)
        });
        match first {
            Err(e) if e.is_no_data() => {
                tracing::debug!(target: "fluentdb.sql", error = %e, "query_unique found no row");
                Ok(Record::new())
            }
            other => other,
        }
    }

    /// Run the active SELECT and read the first column of its first row as
    /// an integer; `0` when there is no row.
    pub async fn query_count(&mut self) -> DbResult<i64> {
        if self.operation != Operation::Select {
            return Err(DbError::invalid_operation("query_count", self.operation));
        }
        let result = self.run_select().await;
        self.params.clear();
        let (mut rs, _) = result?;
        if !rs.next() {
            return Ok(0);
        }
        let value = rs.get_at(1)?;
        if value.is_null() {
            return Ok(0);
        }
        value
            .as_i64()
            .ok_or_else(|| DbError::decode("1", format!("count is not an integer: {value}")))
    }

    /// Call the active procedure and collect the rows it returns.
    ///
    /// With `complex` unset the call must produce exactly one result set.
    /// With `complex` set every result is walked: result sets are
    /// materialized in order and update counts are skipped until the driver
    /// reports no more results. A failed execute/advance is retried once;
    /// a second consecutive failure is returned.
    pub async fn query_procedure(&mut self, complex: bool) -> DbResult<Vec<Record>> {
        if self.operation != Operation::Procedure {
            return Err(DbError::invalid_operation("query_procedure", self.operation));
        }
        let result = self.run_procedure(complex).await;
        self.params.clear();
        result
    }

    /// Execute the active SELECT; returns the cursor and the labels to read.
    async fn run_select(&mut self) -> DbResult<(ResultSet, Option<Vec<String>>)> {
        let sql = self.compiled_sql(Operation::Select)?;
        let aliases = projection_aliases(
            self.kind.dialect(),
            &self.select.fields,
            self.select.aliases.as_deref(),
        )?;
        let mut statement = self.open_statement(&sql)?;
        let result = statement.execute_query().await;
        statement.close();
        Ok((result?, aliases))
    }

    async fn run_procedure(&mut self, complex: bool) -> DbResult<Vec<Record>> {
        let aliases = projection_aliases(
            self.kind.dialect(),
            &self.procedure.fields,
            self.procedure.aliases.as_deref(),
        )?;
        let Some(statement) = self.procedure.statement.as_mut() else {
            return Err(DbError::invalid_operation("query_procedure", Operation::Procedure));
        };
        for (i, value) in self.params.iter().enumerate() {
            statement.bind(i + 1, value.clone())?;
        }
        tracing::debug!(
            target: "fluentdb.sql",
            query_type = ?Operation::Procedure,
            procedure = %self.procedure.name,
            param_count = self.params.len(),
            complex,
            "calling procedure"
        );

        if !complex {
            let rs = statement.execute_query().await?;
            return materialize(rs, aliases.as_deref());
        }
        collect_results(statement.as_mut(), aliases.as_deref()).await
    }
}

/// Aliases to read from the cursor; `None` means "use the cursor's labels".
fn projection_aliases(
    dialect: &Dialect,
    fields: &[String],
    aliases: Option<&[String]>,
) -> DbResult<Option<Vec<String>>> {
    match (fields.is_empty(), aliases) {
        (true, None) => Ok(None),
        (true, Some(aliases)) => Ok(Some(aliases.to_vec())),
        (false, aliases) => resolve_aliases(dialect, fields, aliases).map(Some),
    }
}

async fn collect_results(
    statement: &mut dyn CallableStatement,
    aliases: Option<&[String]>,
) -> DbResult<Vec<Record>> {
    let mut records = Vec::new();
    let mut first = true;
    let mut failed = false;

    loop {
        let probe = if first {
            statement.execute().await
        } else {
            statement.more_results().await
        };
        let has_rows = match probe {
            Ok(has_rows) => {
                first = false;
                failed = false;
                has_rows
            }
            Err(e) if !failed => {
                tracing::warn!(target: "fluentdb.sql", error = %e, "procedure result probe failed, retrying");
                failed = true;
                continue;
            }
            Err(e) => return Err(e),
        };

        if has_rows {
            if let Some(rs) = statement.result_set()? {
                records.extend(materialize(rs, aliases)?);
            }
        } else if statement.update_count() == -1 {
            break;
        }
    }
    Ok(records)
}

/// Walk `rs` and build one record per row, keyed by `aliases` (or by the
/// cursor's own labels).
pub(crate) fn materialize(mut rs: ResultSet, aliases: Option<&[String]>) -> DbResult<Vec<Record>> {
    let labels = match aliases {
        Some(aliases) => aliases.to_vec(),
        None => rs.columns().to_vec(),
    };
    let mut records = Vec::with_capacity(rs.len());
    while rs.next() {
        records.push(current_record(&rs, &labels)?);
    }
    Ok(records)
}

fn current_record(rs: &ResultSet, labels: &[String]) -> DbResult<Record> {
    let mut record = Record::new();
    for label in labels {
        record.insert(label.clone(), normalize(rs.get(label)?.clone()));
    }
    Ok(record)
}
