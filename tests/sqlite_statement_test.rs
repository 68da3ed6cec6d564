//! End-to-end statement tests against an in-memory SQLite database.

use serde_json::json;
use shard_db::db::{Connection, SqliteConnection};
use shard_db::error::{DbError, DbResult};
use shard_db::models::{FromRow, Parameters, Query, Row, RowKey, Value};
use shard_db::params;
use shard_db::transform::{FieldMap, FieldTransform};
use tempfile::NamedTempFile;

#[derive(Debug, PartialEq)]
struct User {
    id: i64,
    name: String,
    active: bool,
}

impl FromRow for User {
    fn from_row(row: &Row) -> DbResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            active: row.try_get("active")?,
        })
    }
}

async fn seeded() -> SqliteConnection {
    let conn = SqliteConnection::from_url("sqlite::memory:").unwrap();
    conn.statement(Query::new(
        "CREATE TABLE users (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            active BOOLEAN NOT NULL,
            meta TEXT
        )",
    ))
    .execute(Parameters::new())
    .await
    .unwrap();

    let mut insert = conn.statement(Query::new(
        "INSERT INTO users (id, name, active, meta) VALUES (:id, :name, :active, :meta)",
    ));
    let users = [
        (1, "ada", true, Value::Json(json!({"role": "admin"}))),
        (2, "brian", false, Value::Null),
        (3, "cleo", true, Value::Null),
    ];
    for (id, name, active, meta) in users {
        insert
            .execute(params! { "id" => id, "name" => name, "active" => active, "meta" => meta })
            .await
            .unwrap();
        assert_eq!(insert.affected_rows().unwrap(), 1);
    }
    conn
}

#[tokio::test]
async fn test_select_with_parameters() {
    let conn = seeded().await;
    let mut stmt = conn.statement(Query::new(
        "SELECT id, name, active FROM users WHERE active = :active ORDER BY id",
    ));

    let users: Vec<User> = stmt
        .execute(params! { "active" => true })
        .await
        .unwrap()
        .fetch_objects()
        .unwrap();
    assert_eq!(
        users.iter().map(|u| u.name.as_str()).collect::<Vec<_>>(),
        vec!["ada", "cleo"]
    );
    assert!(users.iter().all(|u| u.active));

    stmt.execute(params! { "active" => false }).await.unwrap();
    let user: User = stmt.fetch_object().unwrap().unwrap();
    assert_eq!(user.id, 2);
    assert!(stmt.fetch_object::<User>().unwrap().is_none());
}

#[tokio::test]
async fn test_fetch_modes() {
    let conn = seeded().await;
    let mut stmt = conn.statement(Query::new("SELECT id, name, active FROM users ORDER BY id"));
    stmt.execute(Parameters::new()).await.unwrap();

    assert_eq!(stmt.columns().unwrap(), ["id", "name", "active"]);
    assert_eq!(stmt.fetch_column(1).unwrap(), Some(Value::from("ada")));
    assert_eq!(
        stmt.fetch_columns(0).unwrap(),
        vec![Value::Int(2), Value::Int(3)]
    );

    stmt.execute(Parameters::new()).await.unwrap();
    let by_name = stmt.fetch_objects_indexed::<User>("name").unwrap();
    assert_eq!(by_name.len(), 3);
    assert_eq!(by_name[&RowKey::from("brian")].id, 2);
}

#[tokio::test]
async fn test_affected_rows_for_update() {
    let conn = seeded().await;
    let mut stmt = conn.statement(Query::new("UPDATE users SET active = :active WHERE id > :id"));
    stmt.execute(params! { "active" => false, "id" => 1 })
        .await
        .unwrap();

    assert!(stmt.columns().unwrap().is_empty());
    assert_eq!(stmt.affected_rows().unwrap(), 2);
}

#[tokio::test]
async fn test_pinned_query_parameters() {
    let conn = seeded().await;
    let query = Query::with_parameters(
        "SELECT name FROM users WHERE id = :id",
        params! { "id" => 3 },
    );
    let mut stmt = conn.statement(query);

    stmt.execute(params! { "id" => 1 }).await.unwrap();
    assert_eq!(stmt.fetch_columns(0).unwrap(), vec![Value::from("cleo")]);
}

#[tokio::test]
async fn test_constraint_violation_reports_driver_error() {
    let conn = seeded().await;
    let mut stmt = conn.statement(Query::new(
        "INSERT INTO users (id, name, active) VALUES (:id, :name, 1)",
    ));

    let err = stmt
        .execute(params! { "id" => 9, "name" => "ada" })
        .await
        .unwrap_err();
    let DbError::Execution { source } = &err else {
        panic!("expected an execution error, got {err:?}");
    };
    assert!(!source.code.is_empty());
    assert!(source.message.contains("UNIQUE"), "{}", source.message);

    stmt.execute(params! { "id" => 9, "name" => "dora" })
        .await
        .unwrap();
    assert_eq!(stmt.affected_rows().unwrap(), 1);
}

#[tokio::test]
async fn test_backslash_literal_before_placeholder() {
    let conn = seeded().await;
    let mut stmt = conn.statement(Query::new(
        r"SELECT 'C:\' AS path, name FROM users WHERE id = :id",
    ));

    stmt.execute(params! { "id" => 2 }).await.unwrap();
    let row = stmt.fetch_array().unwrap().unwrap();
    assert_eq!(row.get("path"), Some(&Value::from(r"C:\")));
    assert_eq!(row.get("name"), Some(&Value::from("brian")));
}

#[tokio::test]
async fn test_syntax_error_on_prepare() {
    let conn = seeded().await;
    let mut stmt = conn.statement(Query::new("SELEC name FROM users"));

    let err = stmt.execute(Parameters::new()).await.unwrap_err();
    assert!(err.driver_error().is_some());
    assert!(!stmt.is_prepared());
}

#[tokio::test]
async fn test_field_transforms_on_real_rows() {
    let conn = seeded().await;
    let fields = FieldMap::new()
        .with("active", FieldTransform::Bool)
        .with("meta", FieldTransform::Json);
    let mut stmt = conn
        .statement(Query::new("SELECT active, meta FROM users WHERE id = :id"))
        .with_fields(fields);

    stmt.execute(params! { "id" => 1 }).await.unwrap();
    let row = stmt.fetch_array().unwrap().unwrap();
    assert_eq!(row.get("active"), Some(&Value::Bool(true)));
    assert_eq!(row.get("meta"), Some(&Value::Json(json!({"role": "admin"}))));

    stmt.execute(params! { "id" => 2 }).await.unwrap();
    let row = stmt.fetch_array().unwrap().unwrap();
    assert_eq!(row.get("meta"), Some(&Value::Null));
}

#[tokio::test]
async fn test_file_database_reopens_after_close() {
    let file = NamedTempFile::new().unwrap();
    let url = format!("sqlite://{}", file.path().display());

    let conn = SqliteConnection::from_url(&url).unwrap();
    conn.statement(Query::new("CREATE TABLE kv (k TEXT PRIMARY KEY, v INTEGER)"))
        .execute(Parameters::new())
        .await
        .unwrap();
    conn.statement(Query::new("INSERT INTO kv (k, v) VALUES (:k, :v)"))
        .execute(params! { "k" => "a", "v" => 1 })
        .await
        .unwrap();
    conn.close().await.unwrap();
    assert!(!conn.is_connected().await);

    let mut stmt = conn.statement(Query::new("SELECT v FROM kv WHERE k = :k"));
    stmt.execute(params! { "k" => "a" }).await.unwrap();
    assert_eq!(stmt.fetch_columns(0).unwrap(), vec![Value::Int(1)]);
}
