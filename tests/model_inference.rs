// Model inference over real files: naming, relations and invalid-file handling.
use std::fs;
use std::path::Path;

use csvmodel::api::{ErrorKind, ModelOptions, build_model, is_valid_identifier};

fn write(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("mkdir");
    }
    fs::write(&path, contents).expect("write");
    path.display().to_string()
}

fn relation_names(db: &csvmodel::api::Database, table: &str) -> Vec<String> {
    db.table(table)
        .expect("table")
        .relations
        .iter()
        .map(|relation| relation.code_name.clone())
        .collect()
}

#[test]
fn id_and_foreign_key_link_both_ways() {
    let temp = tempfile::tempdir().expect("tempdir");
    let a = write(temp.path(), "a.csv", "id,name\n1,x\n");
    let b = write(temp.path(), "b.csv", "id,aid\n5,1\n");

    let db = build_model(&[a, b], &ModelOptions::new()).expect("model");
    assert_eq!(db.tables.len(), 2);
    assert_eq!(db.name, temp.path().to_string_lossy());
    assert_eq!(relation_names(&db, "a"), vec!["b"]);
    assert_eq!(relation_names(&db, "b"), vec!["a"]);

    let a_to_b = &db.table("a").expect("a").relations[0];
    assert_eq!(a_to_b.source_column, 0);
    assert_eq!(a_to_b.target_table, db.table_id("b").expect("b id"));
    assert_eq!(a_to_b.target_column, 1);
    assert!(a_to_b.display_name.starts_with("b ("));
}

#[test]
fn singular_foreign_key_matches_plural_table() {
    let temp = tempfile::tempdir().expect("tempdir");
    let items = write(temp.path(), "items.csv", "id,label\n1,x\n");
    let orders = write(temp.path(), "orders.csv", "id,ItemId\n9,1\n");

    let db = build_model(&[items, orders], &ModelOptions::new()).expect("model");
    assert_eq!(relation_names(&db, "items"), vec!["orders"]);
    assert_eq!(relation_names(&db, "orders"), vec!["items"]);
}

#[test]
fn es_plural_is_stripped() {
    let temp = tempfile::tempdir().expect("tempdir");
    let fishes = write(temp.path(), "fishes.csv", "id\n1\n");
    let tanks = write(temp.path(), "tanks.csv", "id,fishid\n1,1\n");

    let db = build_model(&[fishes, tanks], &ModelOptions::new()).expect("model");
    assert_eq!(relation_names(&db, "fishes"), vec!["tanks"]);
    assert_eq!(relation_names(&db, "tanks"), vec!["fishes"]);
}

#[test]
fn relation_detection_can_be_disabled() {
    let temp = tempfile::tempdir().expect("tempdir");
    let a = write(temp.path(), "a.csv", "id\n1\n");
    let b = write(temp.path(), "b.csv", "aid\n1\n");

    let options = ModelOptions::new().with_detect_relations(false);
    let db = build_model(&[a, b], &options).expect("model");
    assert_eq!(db.relation_count(), 0);
}

#[test]
fn duplicate_and_odd_headers_become_distinct_identifiers() {
    let temp = tempfile::tempdir().expect("tempdir");
    let file = write(temp.path(), "people.csv", "Name,name,,2nd col,Name\na,b,c,d,e\n");

    let db = build_model(&[file], &ModelOptions::new()).expect("model");
    let columns: Vec<&str> = db.tables[0]
        .columns
        .iter()
        .map(|column| column.code_name.as_str())
        .collect();
    assert_eq!(columns, vec!["Name", "name", "_empty", "_2nd_col", "Name1"]);
    assert!(columns.iter().all(|name| is_valid_identifier(name)));
    assert_eq!(db.tables[0].columns[3].header, "2nd col");
}

#[test]
fn files_in_subdirectories_get_directory_suffixes() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = write(temp.path(), "users.csv", "id\n1\n");
    let nested = write(temp.path(), "archive/users.csv", "id\n2\n");

    let db = build_model(&[root, nested], &ModelOptions::new()).expect("model");
    let names: Vec<&str> = db.tables.iter().map(|table| table.code_name.as_str()).collect();
    assert_eq!(names, vec!["users", "users_archive"]);
    assert!(db.tables[1].display_name.contains("users.csv in archive"));
}

#[test]
fn glob_patterns_expand_in_sorted_order() {
    let temp = tempfile::tempdir().expect("tempdir");
    write(temp.path(), "b.csv", "id\n1\n");
    write(temp.path(), "a.csv", "id\n1\n");
    write(temp.path(), "notes.txt", "not a table\n");

    let pattern = format!("{}/*.csv", temp.path().display());
    let db = build_model(&[pattern], &ModelOptions::new()).expect("model");
    let names: Vec<&str> = db.tables.iter().map(|table| table.code_name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
fn missing_files_are_skipped() {
    let temp = tempfile::tempdir().expect("tempdir");
    let present = write(temp.path(), "a.csv", "id\n1\n");
    let missing = temp.path().join("gone.csv").display().to_string();

    let db = build_model(&[present, missing], &ModelOptions::new()).expect("model");
    assert_eq!(db.tables.len(), 1);
}

#[test]
fn semicolon_files_are_detected() {
    let temp = tempfile::tempdir().expect("tempdir");
    let file = write(temp.path(), "prices.csv", "id;amount;currency\n1;2,50;EUR\n2;3,10;EUR\n");

    let db = build_model(&[file], &ModelOptions::new()).expect("model");
    assert_eq!(db.tables[0].delimiter, b';');
    assert_eq!(db.tables[0].columns.len(), 3);
}

#[test]
fn explicit_delimiter_overrides_detection() {
    let temp = tempfile::tempdir().expect("tempdir");
    let file = write(temp.path(), "pipes.csv", "a|b,c\n1|2,3\n");

    let options = ModelOptions::new().with_delimiter(Some(b'|'));
    let db = build_model(&[file], &options).expect("model");
    let columns: Vec<&str> = db.tables[0]
        .columns
        .iter()
        .map(|column| column.header.as_str())
        .collect();
    assert_eq!(columns, vec!["a", "b,c"]);
}

#[test]
fn ragged_files_are_dropped_only_when_tolerated() {
    let temp = tempfile::tempdir().expect("tempdir");
    let good = write(temp.path(), "good.csv", "id,name\n1,a\n2,b\n");
    let ragged = write(temp.path(), "ragged.csv", "id,name\n1,a,extra\n2\n");

    let options = ModelOptions::new()
        .with_delimiter(Some(b','))
        .with_ignore_invalid_files(true);
    let db = build_model(&[good.clone(), ragged.clone()], &options).expect("model");
    let names: Vec<&str> = db.tables.iter().map(|table| table.code_name.as_str()).collect();
    assert_eq!(names, vec!["good"]);

    let strict = ModelOptions::new().with_delimiter(Some(b','));
    let db = build_model(&[good, ragged], &strict).expect("model");
    assert_eq!(db.tables.len(), 2);
}

#[test]
fn unreadable_header_fails_without_tolerance() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("binary.csv");
    fs::write(&path, [0xff, 0xfe, b',', 0xfd, b'\n']).expect("write");

    let options = ModelOptions::new().with_delimiter(Some(b','));
    let err = build_model(&[path.display().to_string()], &options).expect_err("bad header");
    assert_eq!(err.kind(), ErrorKind::Parse);
    assert_eq!(err.path(), Some(path.as_path()));
}

#[test]
fn empty_input_yields_empty_database() {
    let db = build_model::<&str>(&[], &ModelOptions::new()).expect("model");
    assert!(db.tables.is_empty());
    assert_eq!(db.relation_count(), 0);
}
