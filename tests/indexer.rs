use std::fs;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration};

use codemodel::indexer::{Indexer, ProjectPart, SearchControl, SearchQuery};
use codemodel::liveunits::{LiveUnits};
use codemodel::symbol::{Symbol, SymbolKind};

use super::with_temporary_files;

fn indexer_over(files: &[&std::path::PathBuf], storage: &std::path::Path) -> (Indexer, Arc<LiveUnits>) {
    let live_units = Arc::new(LiveUnits::new());
    let indexer = Indexer::new(live_units.clone());
    indexer.initialize(storage.to_str().unwrap());

    let part = Arc::new(ProjectPart::default());
    for file in files {
        assert!(indexer.add_file(file.to_str().unwrap(), part.clone()));
    }

    (indexer, live_units)
}

fn names(symbols: &[Symbol]) -> Vec<String> {
    let mut names = symbols.iter().map(|s| s.name.clone()).collect::<Vec<_>>();
    names.sort();
    names
}

pub fn test() {
    test_classification();
    test_cross_file_dedup();
    test_queue_and_restart();
    test_search();
}

// `namespace N { class C { ... void f(); }; }` with an out-of-line
// definition of `f` classifies and qualifies both symbols.
fn test_classification() {
    let source = "namespace N { class C { int x; void f(); }; } void N::C::f() { x = 1; }\n";

    with_temporary_files(&[("s1.cpp", source)], |directory, files| {
        let (indexer, _live_units) = indexer_over(
            &[&files[0]], &directory.join("symbols.db")
        );

        indexer.regenerate();
        indexer.wait();

        let classes = indexer.all_classes();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].name, "C");
        assert_eq!(classes[0].qualification, "N");
        assert_eq!(classes[0].kind, SymbolKind::Class);
        assert_eq!(classes[0].location.line(), 1);

        let methods = indexer.all_methods();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].name, "f");
        assert_eq!(methods[0].qualification, "N::C");
        assert_eq!(methods[0].location.line(), 1);

        let path = files[0].to_str().unwrap();
        assert_eq!(indexer.classes_from_file(path).len(), 1);
        assert!(indexer.all_from_file(path).iter().any(|s| s.name == "f"));
        assert!(indexer.contains_file(path));

        indexer.finalize();
    });
}

// A header included by two implementation files contributes its symbols
// exactly once, and stale persisted symbols are dropped on restore.
fn test_cross_file_dedup() {
    let files = [
        ("h.h", "struct S { int a; };\n"),
        ("a.cpp", "#include \"h.h\"\nint g(){S s;return s.a;}\n"),
        ("b.cpp", "#include \"h.h\"\nint g2(){return sizeof(S);}\n"),
    ];

    with_temporary_files(&files, |directory, files| {
        let storage = directory.join("symbols.db");
        let header = files[0].to_str().unwrap().to_string();

        {
            let (indexer, live_units) = indexer_over(
                &[&files[0], &files[1], &files[2]], &storage
            );

            // Units for tracked files get published on completion.
            live_units.request_tracking(files[1].to_str().unwrap());

            indexer.regenerate();
            indexer.wait();

            let structs = indexer.classes_from_file(&header);
            assert_eq!(structs.len(), 1);
            assert_eq!(structs[0].name, "S");

            assert_eq!(names(&indexer.all_functions()), vec!["g", "g2"]);

            assert!(live_units.find(files[1].to_str().unwrap()).is_loaded());

            // Touching a file after the run makes it stale.
            assert!(indexer.validate(&header));
            thread::sleep(Duration::from_millis(1100));
            fs::write(&files[0], "struct S { int a; int b; };\n").unwrap();
            assert!(!indexer.validate(&header));

            indexer.finalize();
            assert!(fs::metadata(&storage).unwrap().len() > 0);
        }

        // A fresh indexer over the same storage drops the symbols of files
        // nobody tracks, stale or otherwise, and re-indexes nothing.
        {
            let live_units = Arc::new(LiveUnits::new());
            let indexer = Indexer::new(live_units);
            indexer.initialize(storage.to_str().unwrap());

            indexer.regenerate();
            indexer.wait();

            assert!(indexer.classes_from_file(&header).is_empty());
            assert!(!indexer.contains_file(&header));
        }
    });
}

// A full run requested during another run cancels it; exactly one finish
// follows, and the resulting database matches a clean run's.
fn test_queue_and_restart() {
    let files = [
        ("q1.cpp", "class Q1 { };\nvoid q1f() { }\n"),
        ("q2.cpp", "class Q2 { };\nvoid q2f() { }\n"),
    ];

    with_temporary_files(&files, |directory, files| {
        let (indexer, _live_units) = indexer_over(
            &[&files[0], &files[1]], &directory.join("symbols.db")
        );

        let finishes = Arc::new(AtomicUsize::new(0));
        let counter = finishes.clone();
        indexer.on_indexing_finished(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        indexer.regenerate();
        indexer.regenerate();
        indexer.wait();

        assert!(finishes.load(Ordering::SeqCst) >= 1);
        assert_eq!(names(&indexer.all_classes()), vec!["Q1", "Q2"]);
        assert_eq!(names(&indexer.all_functions()), vec!["q1f", "q2f"]);

        // Re-evaluating a changed file replaces its symbols.
        fs::write(&files[0], "class Q1 { };\nvoid q1f() { }\nvoid q3f() { }\n").unwrap();
        indexer.evaluate_file(files[0].to_str().unwrap());
        indexer.wait();

        assert_eq!(names(&indexer.all_functions()), vec!["q1f", "q2f", "q3f"]);

        indexer.finalize();
    });
}

fn test_search() {
    let files = [
        ("search.cpp", "class Widget { public: void repaint(); };\n\
                        void Widget::repaint() { }\n\
                        void paint() { }\n\
                        void paint_all() { }\n"),
    ];

    with_temporary_files(&files, |directory, files| {
        let (indexer, _live_units) = indexer_over(&[&files[0]], &directory.join("symbols.db"));
        indexer.regenerate();
        indexer.wait();

        let collect = |query: &SearchQuery| {
            let found = Arc::new(Mutex::new(vec![]));
            let sink = found.clone();
            indexer.search(query, &SearchControl::new(), move |chunk: &[Symbol]| {
                sink.lock().unwrap().extend(chunk.iter().cloned());
            });
            let mut results = found.lock().unwrap().clone();
            results.sort_by(|a, b| a.name.cmp(&b.name));
            results
        };

        // Plain text matches substrings, case-insensitively by default.
        let query = SearchQuery::new("PAINT");
        assert_eq!(
            names(&collect(&query)),
            vec!["paint", "paint_all", "repaint"],
        );

        // Case sensitivity is honored.
        let mut sensitive = SearchQuery::new("PAINT");
        sensitive.case_sensitive = true;
        assert!(collect(&sensitive).is_empty());

        // Whole words wrap the pattern in word boundaries, which excludes
        // both `repaint` and `paint_all`.
        let mut whole = SearchQuery::new("paint");
        whole.whole_words = true;
        assert_eq!(names(&collect(&whole)), vec!["paint"]);

        // Plain text is escaped; regular expressions are not.
        let mut regex = SearchQuery::new("^paint.*");
        regex.regex = true;
        assert_eq!(names(&collect(&regex)), vec!["paint", "paint_all"]);

        let literal = SearchQuery::new("^paint.*");
        assert!(collect(&literal).is_empty());

        // Kind filtering.
        let mut classes_only = SearchQuery::new("");
        classes_only.regex = true;
        classes_only.text = ".*".into();
        classes_only.kinds.functions = false;
        assert_eq!(names(&collect(&classes_only)), vec!["Widget"]);

        // A canceled search reports nothing.
        let control = SearchControl::new();
        control.cancel();
        let found = Arc::new(Mutex::new(Vec::<Symbol>::new()));
        let sink = found.clone();
        indexer.search(&SearchQuery::new("paint"), &control, move |chunk: &[Symbol]| {
            sink.lock().unwrap().extend(chunk.iter().cloned());
        });
        assert!(found.lock().unwrap().is_empty());

        indexer.finalize();
    });
}
