//! Integration tests for the localdb-sqlite crate.

use std::path::{Path, PathBuf};

use localdb_config::{Backend, Settings};
use localdb_core::{Request, Response, Row, TreeState, Value};
use localdb_sqlite::{
    DatabaseHandle, EditError, EditedRow, PanelRouter, QueryConsole, Session, SqliteError,
    TableEditor,
};
use rusqlite::Connection;

/// Creates a database file with the given setup script.
fn create_db(dir: &Path, name: &str, setup: &str) -> PathBuf {
    let path = dir.join(name);
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(setup).unwrap();
    path
}

/// Reads a single scalar straight from the file, bypassing any handle.
fn scalar_on_disk<T: rusqlite::types::FromSql>(path: &Path, sql: &str) -> T {
    Connection::open(path)
        .unwrap()
        .query_row(sql, [], |row| row.get(0))
        .unwrap()
}

fn blog(dir: &Path) -> PathBuf {
    create_db(
        dir,
        "blog.db",
        "CREATE TABLE authors (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
         CREATE TABLE posts (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             author_id INTEGER REFERENCES authors(id),
             title TEXT NOT NULL DEFAULT 'untitled',
             body BLOB
         );
         INSERT INTO authors VALUES (1, 'ada'), (2, 'grace');
         INSERT INTO posts (author_id, title, body) VALUES (1, 'hello', x'0001');",
    )
}

#[test]
fn test_tables_and_dense_ordinals() {
    let dir = tempfile::tempdir().unwrap();
    let handle = DatabaseHandle::open(blog(dir.path()), Backend::Buffered).unwrap();
    let inspector = handle.inspector();

    let names: Vec<String> = inspector
        .list_tables()
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, vec!["authors", "posts"]);

    for table in &names {
        let columns = inspector.list_columns(table).unwrap();
        let ordinals: Vec<usize> = columns.iter().map(|c| c.ordinal).collect();
        assert_eq!(ordinals, (0..columns.len()).collect::<Vec<_>>());
    }

    let posts = inspector.list_columns("posts").unwrap();
    assert!(posts[0].is_auto_increment());
    assert_eq!(posts[2].default_value.as_deref(), Some("'untitled'"));
    assert_eq!(posts[3].declared_type, "BLOB");
}

#[test]
fn test_catalog_is_stable_without_mutation() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::default();
    session.open(blog(dir.path())).unwrap();

    let first = session.expand_tree().unwrap();
    session.refresh_tree().unwrap();
    let second = session.expand_tree().unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_console_insert_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = blog(dir.path());
    let mut handle = DatabaseHandle::open(&path, Backend::Buffered).unwrap();

    QueryConsole::default()
        .run(&mut handle, "INSERT INTO authors (name) VALUES ('linus')")
        .unwrap();
    drop(handle);

    let mut reopened = DatabaseHandle::open(&path, Backend::Buffered).unwrap();
    let result = reopened
        .execute("SELECT name FROM authors WHERE name = 'linus'")
        .unwrap();
    assert_eq!(result.len(), 1);
}

#[test]
fn test_window_of_large_and_empty_tables() {
    let dir = tempfile::tempdir().unwrap();
    let path = create_db(
        dir.path(),
        "big.db",
        "CREATE TABLE big (n INTEGER PRIMARY KEY, label TEXT);
         WITH RECURSIVE s(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM s WHERE x < 250)
         INSERT INTO big SELECT x, 'row ' || x FROM s;
         CREATE TABLE empty (a TEXT, b INTEGER);",
    );
    let handle = DatabaseHandle::open(&path, Backend::Buffered).unwrap();
    let editor = TableEditor::default();

    let window = editor.load(&handle, "big").unwrap();
    assert_eq!(window.rows.len(), 100);
    assert_eq!(window.rows[0].get("n"), Some(&Value::Integer(1)));

    let window = editor.load(&handle, "empty").unwrap();
    assert!(window.rows.is_empty());
    assert_eq!(window.column_names(), vec!["a", "b"]);
}

#[test]
fn test_save_reaches_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = create_db(
        dir.path(),
        "t.db",
        "CREATE TABLE T (id INTEGER PRIMARY KEY, name TEXT);
         INSERT INTO T VALUES (1, 'a');",
    );
    let mut handle = DatabaseHandle::open(&path, Backend::Buffered).unwrap();

    let edits = vec![EditedRow::new(
        vec![Value::Integer(1)],
        Row::new().with("id", 1).with("name", "b"),
    )];
    TableEditor::default().save(&mut handle, "T", &edits).unwrap();

    let name: String = scalar_on_disk(&path, "SELECT name FROM T WHERE id = 1");
    assert_eq!(name, "b");
    assert_eq!(scalar_on_disk::<i64>(&path, "SELECT count(*) FROM T"), 1);
}

#[test]
fn test_query_error_leaves_session_usable() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::default();
    session.open(blog(dir.path())).unwrap();

    let err = session.run_query("SELECT * FROM nonexistent").unwrap_err();
    assert_eq!(err.to_string(), "no such table: nonexistent");

    let outcome = session.run_query("SELECT count(*) AS n FROM authors").unwrap();
    assert_eq!(outcome.result.rows[0].get("n"), Some(&Value::Integer(2)));
}

#[test]
fn test_key_edit_leaves_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = blog(dir.path());
    let before = std::fs::read(&path).unwrap();
    let mut session = Session::default();
    session.open(&path).unwrap();

    let edits = vec![EditedRow::new(
        vec![Value::Integer(1)],
        Row::new().with("id", 7).with("name", "ada"),
    )];
    let err = session.save_table("authors", &edits).unwrap_err();
    assert!(matches!(
        err,
        SqliteError::EditError(EditError::KeyEdited { .. })
    ));
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[test]
fn test_batch_failure_rolls_back_everything() {
    let dir = tempfile::tempdir().unwrap();
    let path = blog(dir.path());
    let mut session = Session::default();
    session.open(&path).unwrap();

    let edits = vec![
        EditedRow::new(
            vec![Value::Integer(1)],
            Row::new().with("id", 1).with("name", "changed"),
        ),
        EditedRow::new(
            vec![Value::Integer(2)],
            Row::new().with("id", 2).with("name", Value::Null),
        ),
    ];
    let err = session.save_table("authors", &edits).unwrap_err();
    assert!(err.to_string().contains("NOT NULL"));

    let name: String = scalar_on_disk(&path, "SELECT name FROM authors WHERE id = 1");
    assert_eq!(name, "ada");
    let window = session.load_table("authors").unwrap();
    assert_eq!(window.rows[0].get("name"), Some(&Value::from("ada")));
}

#[test]
fn test_native_and_buffered_agree_after_persist() {
    let dir = tempfile::tempdir().unwrap();
    for backend in [Backend::Native, Backend::Buffered] {
        let path = create_db(
            dir.path(),
            &format!("{backend:?}.db"),
            "CREATE TABLE kv (k TEXT PRIMARY KEY, v TEXT);",
        );
        let mut handle = DatabaseHandle::open(&path, backend).unwrap();
        TableEditor::default()
            .add_row(&mut handle, "kv", vec![Value::from("a"), Value::from("1")])
            .unwrap();
        assert!(!handle.is_dirty());

        let v: String = scalar_on_disk(&path, "SELECT v FROM kv WHERE k = 'a'");
        assert_eq!(v, "1", "backend {backend:?}");
    }
}

#[test]
fn test_blob_cells_round_trip_through_panel() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::default();
    session.open(blog(dir.path())).unwrap();
    let mut router = PanelRouter::new();

    let replies = router.dispatch(
        &mut session,
        Request::OpenTable {
            table_name: "posts".into(),
        },
    );
    let Response::Render { rows, .. } = &replies[0] else {
        panic!("expected render, got {replies:?}");
    };
    let json = serde_json::to_string(rows).unwrap();
    assert!(json.contains(r#""body":{"$blob":"AAE="}"#));

    let mut edited: Vec<Row> = serde_json::from_str(&json).unwrap();
    edited[0].push("title", "renamed");
    let replies = router.dispatch(&mut session, Request::SaveData { data: edited });
    assert_eq!(replies[0], Response::info("Data saved successfully."));

    let body: Vec<u8> = scalar_on_disk(session.path().unwrap(), "SELECT body FROM posts");
    assert_eq!(body, vec![0, 1]);
}

#[test]
fn test_close_and_switch() {
    let dir = tempfile::tempdir().unwrap();
    let first = blog(dir.path());
    let second = create_db(dir.path(), "other.db", "CREATE TABLE only_here (x);");
    let mut session = Session::new(Settings::default());

    session.open(&first).unwrap();
    session
        .run_query("INSERT INTO authors (name) VALUES ('tim')")
        .unwrap();
    session.open(&second).unwrap();
    assert_eq!(session.tables().unwrap()[0].name, "only_here");

    session.close().unwrap();
    assert_eq!(session.tree().state(), TreeState::Unloaded);
    assert!(matches!(session.tables(), Err(SqliteError::NotOpen)));

    let count: i64 = scalar_on_disk(&first, "SELECT count(*) FROM authors");
    assert_eq!(count, 3);
}

#[test]
fn test_open_rejects_garbage() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbage.db");
    std::fs::write(&path, vec![0x42u8; 4096]).unwrap();
    let mut session = Session::default();
    let err = session.open(&path).unwrap_err();
    assert!(matches!(err, SqliteError::OpenError { .. }));
    assert!(!session.is_open());
}
