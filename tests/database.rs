use std::fs;

use codemodel::database::{unix_millis, SymbolDatabase};
use codemodel::symbol::{SourceLocation, Symbol, SymbolKind};

use super::with_temporary_file;

fn symbol(name: &str, qualification: &str, kind: SymbolKind, file: &str, line: u32) -> Symbol {
    Symbol::new(name, qualification, kind, SourceLocation::new(file, line, 1, 0))
}

fn file_millis(file: &std::path::Path) -> i64 {
    unix_millis(fs::metadata(file).unwrap().modified().unwrap())
}

#[test]
fn test_queries() {
    let mut database = SymbolDatabase::new();
    assert!(database.is_empty());

    database.insert_symbol(symbol("C", "N", SymbolKind::Class, "a.cpp", 1), 1);
    database.insert_symbol(symbol("f", "N::C", SymbolKind::Method, "a.cpp", 2), 2);
    database.insert_symbol(symbol("g", "", SymbolKind::Function, "b.cpp", 1), 3);

    assert!(!database.is_empty());
    assert!(database.contains_file("a.cpp"));
    assert!(database.contains_file("b.cpp"));
    assert!(!database.contains_file("c.cpp"));

    assert_eq!(database.symbols("a.cpp").len(), 2);
    assert_eq!(database.symbols_of_kind("a.cpp", SymbolKind::Class).len(), 1);
    assert_eq!(database.symbols_of_kind("a.cpp", SymbolKind::Function).len(), 0);
    assert_eq!(database.symbols_by_kind(SymbolKind::Function).len(), 1);

    let named = database.symbols_named("a.cpp", SymbolKind::Method, "f");
    assert_eq!(named.len(), 1);
    assert_eq!(named[0].qualification, "N::C");

    let mut files = database.files();
    files.sort();
    assert_eq!(files, vec!["a.cpp".to_string(), "b.cpp".to_string()]);
}

#[test]
fn test_update_in_place() {
    let mut database = SymbolDatabase::new();

    database.insert_symbol(symbol("C", "N", SymbolKind::Class, "a.cpp", 1), 1);
    database.insert_symbol(symbol("C", "N", SymbolKind::Class, "a.cpp", 7), 2);

    // Same file, kind, name, and qualification updates the location in place.
    let classes = database.symbols_of_kind("a.cpp", SymbolKind::Class);
    assert_eq!(classes.len(), 1);
    assert_eq!(classes[0].location.line(), 7);

    // A different qualification is a different symbol.
    database.insert_symbol(symbol("C", "M", SymbolKind::Class, "a.cpp", 9), 3);
    assert_eq!(database.symbols_of_kind("a.cpp", SymbolKind::Class).len(), 2);
}

#[test]
fn test_insertion_order() {
    let mut database = SymbolDatabase::new();

    for line in 1..6 {
        let name = format!("f{}", line);
        database.insert_symbol(symbol(&name, "", SymbolKind::Function, "a.cpp", line), 1);
    }

    let lines = database.symbols("a.cpp").iter()
        .map(|s| s.location.line())
        .collect::<Vec<_>>();
    assert_eq!(lines, vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_remove_file() {
    let mut database = SymbolDatabase::new();

    database.insert_symbol(symbol("C", "", SymbolKind::Class, "a.cpp", 1), 1);
    database.insert_symbol(symbol("g", "", SymbolKind::Function, "b.cpp", 1), 1);
    database.insert_file("c.cpp", 1);

    database.remove_file("a.cpp");
    assert!(!database.contains_file("a.cpp"));
    assert!(database.symbols("a.cpp").is_empty());
    assert_eq!(database.symbols_by_kind(SymbolKind::Function).len(), 1);

    database.remove_files(&["b.cpp".to_string(), "c.cpp".to_string()]);
    assert!(database.is_empty());

    database.insert_symbol(symbol("h", "", SymbolKind::Function, "d.cpp", 1), 1);
    database.clear();
    assert!(database.is_empty());
    assert!(database.symbols("d.cpp").is_empty());
}

#[test]
fn test_round_trip() {
    let mut database = SymbolDatabase::new();

    database.insert_symbol(symbol("C", "N", SymbolKind::Class, "a.cpp", 1), 11);
    database.insert_symbol(symbol("f", "N::C", SymbolKind::Method, "a.cpp", 2), 12);
    database.insert_symbol(symbol("g", "", SymbolKind::Function, "b.cpp", 3), 13);
    database.insert_symbol(symbol("E", "", SymbolKind::Enum, "b.cpp", 4), 13);
    database.insert_file("empty.cpp", 14);

    let mut restored = SymbolDatabase::new();
    restored.deserialize(&database.serialize());

    assert_eq!(restored.all_symbols(), database.all_symbols());

    let mut expected = database.files();
    expected.sort();
    let mut files = restored.files();
    files.sort();
    assert_eq!(files, expected);

    // Indices are rebuilt identically.
    assert_eq!(
        restored.symbols_named("a.cpp", SymbolKind::Method, "f"),
        database.symbols_named("a.cpp", SymbolKind::Method, "f"),
    );
}

#[test]
fn test_format_resilience() {
    let mut database = SymbolDatabase::new();
    database.insert_symbol(symbol("C", "", SymbolKind::Class, "a.cpp", 1), 1);

    // Unknown magic is ignored entirely.
    let bogus = vec![0xEF, 0xBE, 0xAD, 0xDE, 1, 0, 0, 0];
    database.deserialize(&bogus);
    assert_eq!(database.symbols_by_kind(SymbolKind::Class).len(), 1);

    // An unknown version is ignored as well.
    let mut versioned = database.serialize();
    versioned[4] = 0xFF;
    versioned[5] = 0xFF;
    database.deserialize(&versioned);
    assert_eq!(database.symbols_by_kind(SymbolKind::Class).len(), 1);

    // Truncated data leaves the database unchanged.
    let serialized = database.serialize();
    database.deserialize(&serialized[..serialized.len() / 2]);
    assert_eq!(database.symbols_by_kind(SymbolKind::Class).len(), 1);
}

#[test]
fn test_validate() {
    with_temporary_file("source.cpp", "int x;\n", |_, file| {
        let mut database = SymbolDatabase::new();
        let path = file.to_str().unwrap();

        // Never inserted.
        assert!(!database.validate(path));

        // Tracked at or after the on-disk modification time.
        database.insert_file(path, file_millis(file) + 10_000);
        assert!(database.validate(path));

        // Tracked before the on-disk modification time.
        database.insert_file(path, file_millis(file) - 10_000);
        assert!(!database.validate(path));

        // A file that no longer exists never validates.
        database.insert_file("does-not-exist.cpp", i64::max_value());
        assert!(!database.validate("does-not-exist.cpp"));
    });
}
