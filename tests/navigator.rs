use std::sync::{Arc};

use codemodel::{ParseOptions};
use codemodel::indexer::{Indexer, ProjectPart};
use codemodel::liveunits::{LiveUnits};
use codemodel::navigator::{CodeNavigator};
use codemodel::unit::{Unit};

use super::with_temporary_files;

// Publishes a parsed unit ahead of time so navigation needs no background
// parse.
fn publish(live_units: &LiveUnits, path: &str) -> Unit {
    let unit = Unit::with_file_name(path);
    unit.set_management_flags(ParseOptions::indexing());
    unit.parse().unwrap();

    live_units.request_tracking(path);
    live_units.update_unit(path, unit.clone());
    unit
}

pub fn test() {
    // Definitions inside the unit resolve directly.
    let files = [("nav.cpp", "struct S { int a; };\nS make();\nint use_it() { S s; return s.a; }\n")];
    with_temporary_files(&files, |directory, files| {
        let live_units = Arc::new(LiveUnits::new());
        let indexer = Indexer::new(live_units.clone());
        indexer.initialize(directory.join("symbols.db").to_str().unwrap());

        let path = files[0].to_str().unwrap();
        publish(&live_units, path);

        let mut navigator = CodeNavigator::new(path, &indexer, live_units.clone());
        assert_eq!(navigator.file_name(), path);

        // `S` in `S s;` on line 3 points back at the struct definition.
        let definition = navigator.follow(3, 16);
        assert_eq!(definition.file_name(), path);
        assert_eq!(definition.line(), 1);

        // Degenerate positions resolve to nothing.
        assert!(navigator.follow(0, 1).is_null());
    });

    // Inclusion directives resolve to the included file.
    let files = [
        ("h.h", "struct H { };\n"),
        ("inc.cpp", "#include \"h.h\"\nH h;\n"),
    ];
    with_temporary_files(&files, |directory, files| {
        let live_units = Arc::new(LiveUnits::new());
        let indexer = Indexer::new(live_units.clone());
        indexer.initialize(directory.join("symbols.db").to_str().unwrap());

        let path = files[1].to_str().unwrap();
        publish(&live_units, path);

        let mut navigator = CodeNavigator::new(path, &indexer, live_units.clone());
        let target = navigator.follow(1, 2);
        assert!(target.file_name().ends_with("h.h"));
    });

    // Definitions in another translation unit come from the database.
    let files = [
        ("def.cpp", "struct T { int x; };\n"),
        ("use.cpp", "struct T;\nT* global_t;\n"),
    ];
    with_temporary_files(&files, |directory, files| {
        let live_units = Arc::new(LiveUnits::new());
        let indexer = Indexer::new(live_units.clone());
        indexer.initialize(directory.join("symbols.db").to_str().unwrap());

        let part = Arc::new(ProjectPart::default());
        assert!(indexer.add_file(files[0].to_str().unwrap(), part));
        indexer.regenerate();
        indexer.wait();

        let path = files[1].to_str().unwrap();
        publish(&live_units, path);

        let mut navigator = CodeNavigator::new(path, &indexer, live_units.clone());

        // The forward declaration of `T` has no definition in this unit, so
        // the indexed database supplies it.
        let fallback = navigator.follow(1, 8);
        assert!(fallback.file_name().ends_with("def.cpp"));
        assert_eq!(fallback.line(), 1);

        indexer.finalize();
    });
}
