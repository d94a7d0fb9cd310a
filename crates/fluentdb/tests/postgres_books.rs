use fluentdb::{ConnectConfig, DatabaseKind, DbResult, OutType, Record, Session, SqlValue};
use serde_json::json;

async fn connect(test: &str) -> DbResult<Option<Session>> {
    dotenvy::dotenv().ok();
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(v) => v,
        Err(_) => {
            eprintln!("DATABASE_URL is not set; skipping {test}");
            return Ok(None);
        }
    };
    let config = ConnectConfig::new(DatabaseKind::PostgreSql).url(database_url);
    let mut db = Session::connect(&config).await?;
    db.sql(
        "create temp table book (
            id integer primary key,
            title varchar(120) not null,
            price double precision,
            published date,
            publisher_id bigint
        )",
    )
    .execute()
    .await?;
    Ok(Some(db))
}

fn records(values: Vec<serde_json::Value>) -> Vec<Record> {
    values
        .into_iter()
        .filter_map(|v| v.as_object().cloned())
        .collect()
}

#[tokio::test]
async fn book_lifecycle() -> DbResult<()> {
    let Some(mut db) = connect("book_lifecycle").await? else {
        return Ok(());
    };

    let inserted = db
        .insert("book")
        .fields("id, title, price, published")
        .param(1)
        .param("Dune")
        .param(9.5)
        .param(chrono::NaiveDate::from_ymd_opt(1965, 8, 1))
        .execute()
        .await?;
    assert_eq!(inserted, 1);

    let batch = records(vec![
        json!({"id": 2, "title": "Emma", "price": 4.0, "published": null}),
        json!({"id": 3, "title": "Ulysses", "price": 12.25, "published": null}),
    ]);
    let counts = db
        .insert("book")
        .fields("id, title, price, published")
        .execute_batch(&batch)
        .await?;
    assert_eq!(counts, vec![1, 1]);

    let books = db
        .select("b.id, b.title, b.published")
        .aliases("id, title, published")
        .from("book b")
        .where_("b.price < ?")
        .order_by("b.id")
        .param(10)
        .query()
        .await?;
    assert_eq!(books.len(), 2);
    assert_eq!(books[0]["title"], json!("Dune"));
    assert_eq!(books[0]["published"], json!("1965-08-01 00:00:00.000"));
    assert_eq!(books[1]["published"], json!(null));

    let cheapest = db
        .select("title")
        .from("book")
        .order_by("price")
        .max_results(1)
        .query_unique()
        .await?;
    assert_eq!(cheapest["title"], json!("Emma"));

    let missing = db
        .select("title")
        .from("book")
        .where_("id = ?")
        .param(99)
        .query_unique()
        .await?;
    assert!(missing.is_empty());

    let updated = db
        .update("book")
        .fields("price")
        .where_("id = ?")
        .param(11.0)
        .param(1)
        .execute()
        .await?;
    assert_eq!(updated, 1);

    let deleted = db.delete("book").where_("price > ?").param(10).execute().await?;
    assert_eq!(deleted, 2);

    assert_eq!(db.sql("select count(*) from book").query_count().await?, 1);
    db.close().await?;
    Ok(())
}

#[tokio::test]
async fn rollback_discards_changes() -> DbResult<()> {
    let Some(mut db) = connect("rollback_discards_changes").await? else {
        return Ok(());
    };

    db.begin_transaction().await?;
    db.insert("book")
        .fields("id, title")
        .param(10)
        .param("Draft")
        .execute()
        .await?;
    db.rollback().await?;
    db.commit_transaction().await?;

    assert_eq!(db.sql("select count(*) from book").query_count().await?, 0);
    assert!(db.connection_is_valid().await?);
    db.close().await?;
    Ok(())
}

#[tokio::test]
async fn raw_select_keeps_cursor_labels() -> DbResult<()> {
    let Some(mut db) = connect("raw_select_keeps_cursor_labels").await? else {
        return Ok(());
    };

    db.insert("book")
        .fields("id, title")
        .param(7)
        .param("Emma")
        .execute()
        .await?;
    let rows = db
        .sql("select id, upper(title) as shout from book where id = ?")
        .param(7)
        .query()
        .await?;
    assert_eq!(rows[0]["shout"], json!("EMMA"));
    assert_eq!(rows[0]["id"], json!(7));
    Ok(())
}

#[tokio::test]
async fn books_by_publisher() -> DbResult<()> {
    let Some(mut db) = connect("books_by_publisher").await? else {
        return Ok(());
    };

    for (id, title, publisher) in [
        (2001, "Dune", 900),
        (2002, "Linux Bible", 1000),
        (2003, "Emma", 1100),
    ] {
        db.insert("book")
            .fields("id, title, publisher_id")
            .param(id)
            .param(title)
            .param(publisher)
            .execute()
            .await?;
    }

    let rows = db
        .select("id, title")
        .from("book")
        .where_("publisher_id = ?")
        .param(1000)
        .query()
        .await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["title"], json!("Linux Bible"));
    Ok(())
}

#[tokio::test]
async fn update_is_visible_to_the_next_read() -> DbResult<()> {
    let Some(mut db) = connect("update_is_visible_to_the_next_read").await? else {
        return Ok(());
    };

    db.insert("book")
        .fields("id, title")
        .param(2004)
        .param("Ulysses")
        .execute()
        .await?;
    let updated = db
        .update("book")
        .fields("title")
        .where_("id = ?")
        .param("X")
        .param(2004)
        .execute()
        .await?;
    assert_eq!(updated, 1);

    let book = db
        .select("title")
        .from("book")
        .where_("id = ?")
        .param(2004)
        .query_unique()
        .await?;
    assert_eq!(book["title"], json!("X"));
    Ok(())
}

#[tokio::test]
async fn batch_adds_every_record() -> DbResult<()> {
    let Some(mut db) = connect("batch_adds_every_record").await? else {
        return Ok(());
    };

    let before = db.sql("select count(*) from book").query_count().await?;
    let batch = records(vec![
        json!({"id": 3001, "title": "Emma", "publisher_id": 1000}),
        json!({"id": 3002, "title": "Dune", "publisher_id": 1000}),
        json!({"id": 3003, "title": "Ulysses", "publisher_id": 1100}),
    ]);
    let counts = db
        .insert("book")
        .fields("id, title, publisher_id")
        .execute_batch(&batch)
        .await?;
    assert_eq!(counts, vec![1, 1, 1]);

    let after = db.sql("select count(*) from book").query_count().await?;
    assert_eq!(after - before, 3);
    Ok(())
}

#[tokio::test]
async fn failed_batch_inserts_nothing() -> DbResult<()> {
    let Some(mut db) = connect("failed_batch_inserts_nothing").await? else {
        return Ok(());
    };

    let batch = records(vec![
        json!({"id": 1, "title": "Emma"}),
        json!({"id": 1, "title": "Emma again"}),
        json!({"id": 3, "title": "Dune"}),
    ]);
    let result = db.insert("book").fields("id, title").execute_batch(&batch).await;
    assert!(result.is_err());

    assert_eq!(db.sql("select count(*) from book").query_count().await?, 0);
    assert!(db.connection_is_valid().await?);
    Ok(())
}

#[tokio::test]
async fn arrays_and_intervals_are_readable() -> DbResult<()> {
    let Some(mut db) = connect("arrays_and_intervals_are_readable").await? else {
        return Ok(());
    };

    let rows = db
        .sql("select array[1,2] as tags, interval '1 day' as span")
        .query()
        .await?;
    assert_eq!(rows[0]["tags"], json!([1, 2]));
    assert_eq!(rows[0]["span"], json!("1 day"));
    Ok(())
}

#[tokio::test]
async fn procedure_rows_keep_column_types() -> DbResult<()> {
    let Some(mut db) = connect("procedure_rows_keep_column_types").await? else {
        return Ok(());
    };

    db.sql(
        "create procedure pg_temp.double_it(inout n integer default 21)
         language plpgsql as $$ begin n := coalesce(n, 21) * 2; end $$",
    )
    .execute()
    .await?;

    let plain = db.call("pg_temp.double_it()")?.query_procedure(false).await?;
    assert_eq!(plain.len(), 1);
    assert_eq!(plain[0]["n"], json!(42));

    let bound = db
        .call("pg_temp.double_it(?)")?
        .param(5)
        .query_procedure(false)
        .await?;
    assert_eq!(bound[0]["n"], json!(10));

    db.call("pg_temp.double_it(?)")?.out_param(1, OutType::Varchar)?;
    db.execute().await?;
    assert_eq!(db.out_value(1)?, Some(SqlValue::Text("42".to_string())));
    Ok(())
}
