//! SQL compilation.
//!
//! Pure functions from builder state to dialect-correct SQL text. Nothing
//! here touches a connection, so every dialect can be exercised in isolation.

use super::Operation;
use crate::dialect::{AliasStyle, Dialect, LimitSyntax};
use crate::error::{DbError, DbResult};
use std::fmt::Write as _;

/// Everything a SELECT is compiled from.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectParts<'a> {
    pub fields: &'a [String],
    /// Explicit aliases; `None` derives them from `fields`.
    pub aliases: Option<&'a [String]>,
    pub from: &'a str,
    pub where_clause: &'a str,
    pub order_by: &'a str,
    /// Row limit; `0` means unlimited.
    pub max_results: u32,
    pub schema: &'a str,
}

/// Skip leading whitespace, comments and parentheses.
fn strip_sql_prefix(sql: &str) -> &str {
    let mut s = sql;
    loop {
        let before = s;
        s = s.trim_start();
        if s.starts_with("--") {
            match s.find('\n') {
                Some(pos) => {
                    s = &s[pos + 1..];
                    continue;
                }
                None => return "",
            }
        }
        if s.starts_with("/*") {
            match s.find("*/") {
                Some(pos) => {
                    s = &s[pos + 2..];
                    continue;
                }
                None => return "",
            }
        }
        if let Some(rest) = s.strip_prefix('(') {
            s = rest;
            continue;
        }
        if s == before {
            break;
        }
    }
    s
}

fn starts_with_keyword(s: &str, keyword: &str) -> bool {
    match s.get(0..keyword.len()) {
        Some(prefix) => {
            prefix.eq_ignore_ascii_case(keyword)
                && !s[keyword.len()..]
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_alphanumeric() || c == '_')
        }
        None => false,
    }
}

/// Remove `--` and `/* */` comments anywhere in `sql`.
fn strip_comments(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut rest = sql;
    loop {
        let line = rest.find("--");
        let block = rest.find("/*");
        let (pos, is_line) = match (line, block) {
            (Some(l), Some(b)) if l < b => (l, true),
            (Some(_), Some(b)) | (None, Some(b)) => (b, false),
            (Some(l), None) => (l, true),
            (None, None) => {
                out.push_str(rest);
                return out;
            }
        };
        out.push_str(&rest[..pos]);
        out.push(' ');
        let tail = &rest[pos + 2..];
        let skip = if is_line { tail.find('\n') } else { tail.find("*/").map(|p| p + 1) };
        match skip {
            Some(end) => rest = &tail[end + 1..],
            None => return out,
        }
    }
}

/// Classify raw SQL by the earliest whole-word `select`, `insert`,
/// `update`, `delete` or `create` keyword, ignoring case and comments.
pub fn classify(sql: &str) -> Operation {
    let text = strip_comments(sql);
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .find_map(|word| match word.to_ascii_lowercase().as_str() {
            "select" => Some(Operation::Select),
            "insert" => Some(Operation::Insert),
            "update" => Some(Operation::Update),
            "delete" => Some(Operation::Delete),
            "create" => Some(Operation::Create),
            _ => None,
        })
        .unwrap_or(Operation::None)
}

/// Split a comma-separated list, trimming each entry and dropping empty ones.
pub fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Aliases derived from field names.
///
/// Dialects whose cursors cannot look up dotted labels get `_` instead of `.`.
pub fn default_aliases(dialect: &Dialect, fields: &[String]) -> Vec<String> {
    fields
        .iter()
        .map(|field| {
            if dialect.qualified_labels {
                field.clone()
            } else {
                field.replace('.', "_")
            }
        })
        .collect()
}

/// The aliases a SELECT projects, validated against its fields.
pub fn resolve_aliases(
    dialect: &Dialect,
    fields: &[String],
    aliases: Option<&[String]>,
) -> DbResult<Vec<String>> {
    match aliases {
        Some(aliases) if aliases.len() != fields.len() => Err(DbError::FieldAliasMismatch {
            fields: fields.len(),
            aliases: aliases.len(),
        }),
        Some(aliases) => Ok(aliases.to_vec()),
        None => Ok(default_aliases(dialect, fields)),
    }
}

fn unqualified(field: &str) -> &str {
    match field.find('.') {
        Some(p) if p > 0 => &field[p + 1..],
        _ => field,
    }
}

fn push_target(sql: &mut String, dialect: &Dialect, schema: &str, table: &str) -> DbResult<()> {
    if table.trim().is_empty() {
        return Err(DbError::MissingTableName);
    }
    if !schema.is_empty() {
        sql.push_str(&dialect.quote(schema));
        sql.push('.');
    }
    sql.push_str(table);
    Ok(())
}

/// Predicates that already carry their own clause keyword.
fn needs_where(predicate: &str) -> bool {
    let p = strip_sql_prefix(predicate);
    !["join", "inner", "group", "where"]
        .iter()
        .any(|kw| starts_with_keyword(p, kw))
}

/// Byte offset of the first whole-word `keyword` outside quotes and
/// parentheses.
fn find_keyword(sql: &str, keyword: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote = None;
    let mut prev_word = false;
    for (i, c) in sql.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            prev_word = false;
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 && !prev_word && starts_with_keyword(&sql[i..], keyword) => {
                return Some(i);
            }
            _ => {}
        }
        prev_word = c.is_alphanumeric() || c == '_';
    }
    None
}

/// Emit the predicate with a `rownum` bound that covers the whole filter:
/// an existing condition is parenthesized, and the bound goes after any
/// join and before any `group by`.
fn push_rownum_filter(sql: &mut String, predicate: &str, limit: u32) {
    let bound = format!("rownum <= {limit}");
    let (head, tail) = match find_keyword(predicate, "group") {
        Some(pos) => (predicate[..pos].trim_end(), &predicate[pos..]),
        None => (predicate, ""),
    };

    let filter = match find_keyword(head, "where") {
        Some(pos) => format!(
            "{}where ({}) and {bound}",
            &head[..pos],
            head[pos + "where".len()..].trim()
        ),
        None if head.is_empty() => format!("where {bound}"),
        None if needs_where(head) => format!("where ({head}) and {bound}"),
        None => format!("{head} where {bound}"),
    };
    sql.push(' ');
    sql.push_str(&filter);
    if !tail.is_empty() {
        sql.push(' ');
        sql.push_str(tail);
    }
}

pub fn compile_select(dialect: &Dialect, parts: &SelectParts<'_>) -> DbResult<String> {
    if parts.fields.is_empty() {
        return Err(DbError::MissingFields(Operation::Select));
    }
    let aliases = resolve_aliases(dialect, parts.fields, parts.aliases)?;
    if parts.from.trim().is_empty() {
        return Err(DbError::MissingFrom);
    }
    let limit = parts.max_results;

    let mut sql = String::from("select ");
    if limit > 0 {
        match dialect.limit {
            LimitSyntax::Top => {
                let _ = write!(sql, "top {limit} ");
            }
            LimitSyntax::First => {
                let _ = write!(sql, "first {limit} ");
            }
            _ => {}
        }
    }

    let projection: Vec<String> = parts
        .fields
        .iter()
        .zip(&aliases)
        .map(|(field, alias)| match dialect.alias_style {
            AliasStyle::As => format!("{field} as {}", dialect.quote(alias)),
            AliasStyle::Bare => format!("{field} {}", dialect.quote(alias)),
        })
        .collect();
    sql.push_str(&projection.join(", "));

    sql.push_str(" from ");
    if !parts.schema.is_empty() {
        sql.push_str(&dialect.quote(parts.schema));
        sql.push('.');
    }
    sql.push_str(parts.from.trim());

    let predicate = parts.where_clause.trim();
    if limit > 0 && dialect.limit == LimitSyntax::RowNum {
        push_rownum_filter(&mut sql, predicate, limit);
    } else if !predicate.is_empty() {
        sql.push(' ');
        if needs_where(predicate) {
            sql.push_str("where ");
        }
        sql.push_str(predicate);
    }

    let order_by = parts.order_by.trim();
    if !order_by.is_empty() {
        sql.push_str(" order by ");
        sql.push_str(order_by);
    }
    if limit > 0 && dialect.limit == LimitSyntax::Limit {
        let _ = write!(sql, " limit {limit}");
    }
    if dialect.nolock_hint {
        sql.push_str(" with (nolock)");
    }
    Ok(sql)
}

pub fn compile_insert(
    dialect: &Dialect,
    schema: &str,
    table: &str,
    fields: &[String],
) -> DbResult<String> {
    let mut sql = String::from("insert into ");
    push_target(&mut sql, dialect, schema, table)?;
    if fields.is_empty() {
        return Err(DbError::MissingFields(Operation::Insert));
    }
    let columns: Vec<&str> = fields.iter().map(|f| unqualified(f)).collect();
    let _ = write!(
        sql,
        " ({}) values ({})",
        columns.join(","),
        vec!["?"; fields.len()].join(",")
    );
    Ok(sql)
}

pub fn compile_update(
    dialect: &Dialect,
    schema: &str,
    table: &str,
    fields: &[String],
    where_clause: &str,
) -> DbResult<String> {
    let mut sql = String::from("update ");
    push_target(&mut sql, dialect, schema, table)?;
    if fields.is_empty() {
        return Err(DbError::MissingFields(Operation::Update));
    }
    let assignments: Vec<String> = fields
        .iter()
        .map(|f| format!("{}=?", unqualified(f)))
        .collect();
    sql.push_str(" set ");
    sql.push_str(&assignments.join(", "));
    let predicate = where_clause.trim();
    if !predicate.is_empty() {
        sql.push_str(" where ");
        sql.push_str(predicate);
    }
    Ok(sql)
}

pub fn compile_delete(
    dialect: &Dialect,
    schema: &str,
    table: &str,
    where_clause: &str,
) -> DbResult<String> {
    let mut sql = String::from("delete from ");
    push_target(&mut sql, dialect, schema, table)?;
    let predicate = where_clause.trim();
    if !predicate.is_empty() {
        sql.push_str(" where ");
        sql.push_str(predicate);
    }
    Ok(sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DatabaseKind;

    fn fields(list: &str) -> Vec<String> {
        split_list(list)
    }

    #[test]
    fn classifies_by_earliest_keyword() {
        assert_eq!(classify("SELECT * FROM book"), Operation::Select);
        assert_eq!(classify("  insert into book values (1)"), Operation::Insert);
        assert_eq!(
            classify("update book set title = 'select me'"),
            Operation::Update
        );
        assert_eq!(
            classify("delete from book where created_at < now()"),
            Operation::Delete
        );
        assert_eq!(classify("-- select\ncreate table x (id int)"), Operation::Create);
        assert_eq!(classify("/* delete */ select 1"), Operation::Select);
        assert_eq!(classify("truncate book"), Operation::None);
        assert_eq!(classify("select updated_at from book"), Operation::Select);
    }

    #[test]
    fn select_with_aliases_and_where() {
        let fields = fields("b.id, b.title");
        let aliases = fields_aliases();
        let sql = compile_select(
            DatabaseKind::PostgreSql.dialect(),
            &SelectParts {
                fields: &fields,
                aliases: Some(&aliases),
                from: "book b",
                where_clause: "b.id = ?",
                ..SelectParts::default()
            },
        )
        .unwrap();
        assert_eq!(
            sql,
            r#"select b.id as "id", b.title as "title" from book b where b.id = ?"#
        );
    }

    fn fields_aliases() -> Vec<String> {
        vec!["id".to_string(), "title".to_string()]
    }

    #[test]
    fn alias_count_must_match_fields() {
        let fields = fields("id, title, price");
        let aliases = fields_aliases();
        let err = compile_select(
            DatabaseKind::H2.dialect(),
            &SelectParts {
                fields: &fields,
                aliases: Some(&aliases),
                from: "book",
                ..SelectParts::default()
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DbError::FieldAliasMismatch {
                fields: 3,
                aliases: 2
            }
        ));
        assert!(err.is_configuration());
    }

    #[test]
    fn select_requires_from() {
        let fields = fields("id");
        let err = compile_select(
            DatabaseKind::H2.dialect(),
            &SelectParts {
                fields: &fields,
                ..SelectParts::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, DbError::MissingFrom));
    }

    #[test]
    fn limit_placement_per_dialect() {
        let fields = fields("id");
        let parts = |where_clause| SelectParts {
            fields: &fields,
            from: "book",
            where_clause,
            order_by: "id",
            max_results: 5,
            ..SelectParts::default()
        };

        let pg = compile_select(DatabaseKind::PostgreSql.dialect(), &parts("")).unwrap();
        assert!(pg.ends_with(" order by id limit 5"), "{pg}");

        let mysql = compile_select(DatabaseKind::MySql.dialect(), &parts("")).unwrap();
        assert_eq!(mysql, "select id `id` from book order by id limit 5");

        let h2 = compile_select(DatabaseKind::H2.dialect(), &parts("")).unwrap();
        assert!(h2.starts_with("select top 5 id"), "{h2}");
        assert!(!h2.contains("limit"));

        let fb = compile_select(DatabaseKind::Firebird.dialect(), &parts("")).unwrap();
        assert!(fb.starts_with("select first 5 id"), "{fb}");

        let ora = compile_select(DatabaseKind::Oracle.dialect(), &parts("")).unwrap();
        assert_eq!(
            ora,
            r#"select id "id" from book where rownum <= 5 order by id"#
        );
        let ora = compile_select(DatabaseKind::Oracle.dialect(), &parts("price > ?")).unwrap();
        assert_eq!(
            ora,
            r#"select id "id" from book where (price > ?) and rownum <= 5 order by id"#
        );
    }

    #[test]
    fn rownum_bound_covers_the_whole_filter() {
        let fields = fields("id");
        let oracle = |from, where_clause| {
            compile_select(
                DatabaseKind::Oracle.dialect(),
                &SelectParts {
                    fields: &fields,
                    from,
                    where_clause,
                    max_results: 5,
                    ..SelectParts::default()
                },
            )
            .unwrap()
        };

        assert_eq!(
            oracle("book", "status = 'a' or status = 'b'"),
            r#"select id "id" from book where (status = 'a' or status = 'b') and rownum <= 5"#
        );
        assert_eq!(
            oracle("book b", "join publisher p on p.id = b.publisher_id"),
            r#"select id "id" from book b join publisher p on p.id = b.publisher_id where rownum <= 5"#
        );
        assert_eq!(
            oracle("book", "group by id"),
            r#"select id "id" from book where rownum <= 5 group by id"#
        );
        assert_eq!(
            oracle(
                "book b",
                "join publisher p on p.id = b.publisher_id where p.id = ? or p.id = ? group by id"
            ),
            r#"select id "id" from book b join publisher p on p.id = b.publisher_id where (p.id = ? or p.id = ?) and rownum <= 5 group by id"#
        );
        assert_eq!(
            oracle("book", "where title = 'group where'"),
            r#"select id "id" from book where (title = 'group where') and rownum <= 5"#
        );
        assert_eq!(
            oracle("book", "publisher_id in (select id from publisher where name = ?)"),
            r#"select id "id" from book where (publisher_id in (select id from publisher where name = ?)) and rownum <= 5"#
        );
    }

    #[test]
    fn zero_limit_emits_nothing() {
        let fields = fields("id");
        for kind in DatabaseKind::ALL {
            let sql = compile_select(
                kind.dialect(),
                &SelectParts {
                    fields: &fields,
                    from: "book",
                    ..SelectParts::default()
                },
            )
            .unwrap();
            assert!(!sql.contains("limit"), "{kind}: {sql}");
            assert!(!sql.contains("top"), "{kind}: {sql}");
            assert!(!sql.contains("rownum"), "{kind}: {sql}");
        }
    }

    #[test]
    fn join_and_group_predicates_skip_where() {
        let fields = fields("b.title, p.name");
        let sql = compile_select(
            DatabaseKind::PostgreSql.dialect(),
            &SelectParts {
                fields: &fields,
                from: "book b",
                where_clause: "JOIN publisher p ON p.id = b.publisher_id",
                ..SelectParts::default()
            },
        )
        .unwrap();
        assert!(sql.contains("from book b JOIN publisher"), "{sql}");
        assert!(!sql.contains("where"));

        let sql = compile_select(
            DatabaseKind::PostgreSql.dialect(),
            &SelectParts {
                fields: &fields,
                from: "book b",
                where_clause: "group by b.title, p.name",
                ..SelectParts::default()
            },
        )
        .unwrap();
        assert!(sql.ends_with("from book b group by b.title, p.name"), "{sql}");
    }

    #[test]
    fn schema_is_quoted_and_progress_gets_nolock() {
        let fields = fields("id");
        let sql = compile_select(
            DatabaseKind::Progress.dialect(),
            &SelectParts {
                fields: &fields,
                from: "book",
                schema: "PUB",
                ..SelectParts::default()
            },
        )
        .unwrap();
        assert_eq!(sql, r#"select id "id" from "PUB".book with (nolock)"#);
    }

    #[test]
    fn pervasive_aliases_drop_dots() {
        let fields = fields("b.id, title");
        let dialect = DatabaseKind::PervasivePsql.dialect();
        assert_eq!(default_aliases(dialect, &fields), vec!["b_id", "title"]);
        assert_eq!(
            default_aliases(DatabaseKind::H2.dialect(), &fields),
            vec!["b.id", "title"]
        );
    }

    #[test]
    fn insert_strips_qualifiers() {
        let sql = compile_insert(
            DatabaseKind::H2.dialect(),
            "",
            "book",
            &fields("b.a, b.b, c"),
        )
        .unwrap();
        assert_eq!(sql, "insert into book (a,b,c) values (?,?,?)");
    }

    #[test]
    fn update_has_no_trailing_separator() {
        let sql = compile_update(
            DatabaseKind::PostgreSql.dialect(),
            "app",
            "book",
            &fields("a, b, c"),
            "id = ?",
        )
        .unwrap();
        assert_eq!(sql, r#"update "app".book set a=?, b=?, c=? where id = ?"#);
    }

    #[test]
    fn data_changes_require_a_table() {
        let dialect = DatabaseKind::H2.dialect();
        assert!(matches!(
            compile_insert(dialect, "", "", &fields("a")),
            Err(DbError::MissingTableName)
        ));
        assert!(matches!(
            compile_update(dialect, "", " ", &fields("a"), ""),
            Err(DbError::MissingTableName)
        ));
        assert!(matches!(
            compile_delete(dialect, "", "", ""),
            Err(DbError::MissingTableName)
        ));
    }

    #[test]
    fn delete_with_and_without_predicate() {
        let dialect = DatabaseKind::H2.dialect();
        assert_eq!(compile_delete(dialect, "", "book", "").unwrap(), "delete from book");
        assert_eq!(
            compile_delete(dialect, "", "book", "id = ?").unwrap(),
            "delete from book where id = ?"
        );
    }

    #[test]
    fn splits_comma_lists() {
        assert_eq!(split_list(" id ,title,, price "), vec!["id", "title", "price"]);
    }
}
