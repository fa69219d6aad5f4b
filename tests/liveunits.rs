use std::sync::{Arc, Mutex};

use codemodel::liveunits::{LiveUnits};
use codemodel::unit::{Unit};

#[test]
fn test_tracking_lifecycle() {
    let live_units = LiveUnits::new();
    assert!(!live_units.is_tracking("a.cpp"));

    live_units.request_tracking("a.cpp");
    assert!(live_units.is_tracking("a.cpp"));

    // Requesting again keeps the existing entry.
    let unit = live_units.find("a.cpp");
    live_units.request_tracking("a.cpp");
    assert_eq!(live_units.find("a.cpp").file_name(), unit.file_name());

    // A unit somebody else holds survives a cancellation...
    live_units.cancel_tracking("a.cpp");
    assert!(live_units.is_tracking("a.cpp"));

    // ...until the holder drops it.
    drop(unit);
    live_units.cancel_tracking("a.cpp");
    assert!(!live_units.is_tracking("a.cpp"));
}

#[test]
fn test_find_untracked() {
    let live_units = LiveUnits::new();

    let unit = live_units.find("missing.cpp");
    assert_eq!(unit.file_name(), "");
    assert!(!unit.is_loaded());
}

#[test]
fn test_update_unit() {
    let live_units = LiveUnits::new();

    let published = Arc::new(Mutex::new(vec![]));
    let sink = published.clone();
    live_units.subscribe(Box::new(move |file_name, _| {
        sink.lock().unwrap().push(file_name.to_string());
    }));

    // Updates for untracked files are ignored.
    live_units.update_unit("a.cpp", Unit::with_file_name("a.cpp"));
    assert!(!live_units.is_tracking("a.cpp"));
    assert!(published.lock().unwrap().is_empty());

    live_units.request_tracking("a.cpp");
    let replacement = Unit::with_file_name("a.cpp");
    replacement.set_compile_options(vec!["-std=c++11".into()]);
    live_units.update_unit("a.cpp", replacement);

    assert_eq!(live_units.find("a.cpp").compile_options(), vec!["-std=c++11".to_string()]);
    assert_eq!(*published.lock().unwrap(), vec!["a.cpp".to_string()]);
}

#[test]
fn test_remove() {
    let live_units = LiveUnits::new();

    live_units.request_tracking("a.cpp");
    let _holder = live_units.find("a.cpp");

    // Removal is unconditional, unlike cancellation.
    live_units.remove("a.cpp");
    assert!(!live_units.is_tracking("a.cpp"));
}
