use codemodel::{Severity, Unsaved};
use codemodel::error::{UnitError};
use codemodel::unit::{PchInfo, Unit};

use super::{with_temporary_file, with_unit};

#[test]
fn test_configuration() {
    let unit = Unit::new();
    assert_eq!(unit.file_name(), "");
    assert!(!unit.is_loaded());
    assert!(unit.is_unique());

    unit.set_file_name("a.cpp");
    unit.set_compile_options(vec!["-std=c++11".into()]);
    assert_eq!(unit.file_name(), "a.cpp");
    assert_eq!(unit.compile_options(), vec!["-std=c++11".to_string()]);

    assert!(unit.pch().is_empty());
    unit.set_pch(PchInfo::with_path("/tmp/header.pch"));
    assert!(!unit.pch().is_empty());

    // Parsing an unconfigured unit reports the missing handle.
    assert_eq!(Unit::new().parse().unwrap_err(), UnitError::NoHandle);
    assert_eq!(Unit::new().reparse().unwrap_err(), UnitError::NoHandle);
    assert_eq!(Unit::new().save("/tmp/nothing.ast").unwrap_err(), UnitError::NoHandle);
}

#[test]
fn test_make_unique() {
    let mut unit = Unit::with_file_name("a.cpp");
    let clone = unit.clone();
    assert!(!unit.is_unique());
    assert!(!clone.is_unique());

    unit.make_unique();
    assert!(unit.is_unique());
    assert!(clone.is_unique());

    // Mutations after detaching no longer affect the other holder.
    unit.set_file_name("b.cpp");
    assert_eq!(unit.file_name(), "b.cpp");
    assert_eq!(clone.file_name(), "a.cpp");
}

pub fn test() {
    // Parsing, invalidation on reconfiguration, and reparsing.
    with_unit("test.cpp", "int main() { int x; return 0; }", &[], |file, unit| {
        assert!(unit.is_loaded());
        assert!(unit.time_stamp() > std::time::SystemTime::UNIX_EPOCH);

        let diagnostics = |unit: &Unit| {
            unit.with_translation_unit(|tu| {
                tu.get_diagnostics().iter()
                    .map(|d| (d.get_severity(), d.get_text()))
                    .collect::<Vec<_>>()
            }).unwrap()
        };

        let parsed = diagnostics(unit);
        unit.reparse().unwrap();
        assert!(unit.is_loaded());
        assert_eq!(diagnostics(unit), parsed);

        // A changed file name invalidates the handle.
        unit.set_file_name("other.cpp");
        assert!(!unit.is_loaded());
        unit.set_file_name(file.to_str().unwrap());

        // Changed compile options invalidate the handle.
        unit.parse().unwrap();
        assert!(unit.is_loaded());
        unit.set_compile_options(vec!["-std=c++11".into()]);
        assert!(!unit.is_loaded());

        // Explicit invalidation preserves the configuration.
        unit.parse().unwrap();
        unit.invalidate();
        assert!(!unit.is_loaded());
        assert_eq!(unit.file_name(), file.to_str().unwrap());
        assert_eq!(unit.compile_options(), vec!["-std=c++11".to_string()]);
    });

    // A detached clone of a loaded unit starts unloaded.
    with_unit("test.cpp", "int x = 322;", &[], |_, unit| {
        let mut clone = unit.clone();
        clone.make_unique();
        assert!(unit.is_loaded());
        assert!(!clone.is_loaded());
        assert_eq!(clone.file_name(), unit.file_name());
    });

    // Saving writes a serialized translation unit.
    with_unit("test.cpp", "int x = 322;", &[], |file, unit| {
        let ast = file.with_extension("ast");
        unit.save(&ast).unwrap();
        assert!(std::fs::metadata(&ast).unwrap().len() > 0);
    });

    // The unsaved overlay takes precedence over on-disk contents.
    with_temporary_file("test.cpp", "int bogus bogus bogus;", |_, file| {
        let path = file.to_str().unwrap();
        let unit = Unit::with_file_name(path);
        unit.set_unsaved(vec![Unsaved::new(path, "int fine = 1;")]);
        unit.parse().unwrap();

        let errors = unit.with_translation_unit(|tu| {
            tu.get_diagnostics().iter()
                .filter(|d| d.get_severity() >= Severity::Error)
                .count()
        }).unwrap();
        assert_eq!(errors, 0);
    });
}
