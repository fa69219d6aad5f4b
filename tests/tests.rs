extern crate codemodel;
extern crate tempfile;

use std::fs;
use std::path::{Path, PathBuf};

use codemodel::unit::{Unit};

//================================================
// Functions
//================================================

fn with_temporary_files<F: FnOnce(&Path, Vec<PathBuf>)>(files: &[(&str, &str)], f: F) {
    let directory = tempfile::tempdir().unwrap();

    let files = files.iter().map(|&(name, contents)| {
        let file = directory.path().join(name);
        fs::write(&file, contents).unwrap();
        file
    }).collect::<Vec<_>>();

    f(directory.path(), files);
}

fn with_temporary_file<F: FnOnce(&Path, &Path)>(name: &str, contents: &str, f: F) {
    with_temporary_files(&[(name, contents)], |d, fs| f(d, &fs[0]));
}

fn with_unit<F: FnOnce(&Path, &Unit)>(name: &str, contents: &str, arguments: &[&str], f: F) {
    with_temporary_file(name, contents, |_, file| {
        let unit = Unit::with_file_name(file.to_str().unwrap());
        unit.set_compile_options(arguments.iter().map(|a| a.to_string()).collect());
        unit.parse().unwrap();
        f(file, &unit);
    });
}

//================================================
// Tests
//================================================

#[path="completion.rs"]
mod completion_test;
#[path="database.rs"]
mod database_test;
#[path="indexer.rs"]
mod indexer_test;
#[path="liveunits.rs"]
mod liveunits_test;
#[path="navigator.rs"]
mod navigator_test;
#[path="options.rs"]
mod options_test;
#[path="semantic.rs"]
mod semantic_test;
#[path="unit.rs"]
mod unit_test;

// Everything that touches `libclang` runs from this one entry point so the
// library is never exercised from multiple test threads at once.
#[test]
fn test() {
    codemodel::initialize();

    unit_test::test();
    completion_test::test();
    semantic_test::test();
    indexer_test::test();
    navigator_test::test();
}
