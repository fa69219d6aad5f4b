use codemodel::{Severity};
use codemodel::semantic::{MarkerKind, SemanticMarker, SourceMarker};
use codemodel::symbol::{SourceLocation};

use super::with_temporary_file;

fn kinds_on_line(markers: &[SourceMarker], line: u32) -> Vec<MarkerKind> {
    markers.iter()
        .filter(|m| m.location.line() == line)
        .map(|m| m.kind)
        .collect()
}

#[test]
fn test_marker_ordering() {
    let first = SourceMarker::new(SourceLocation::new("a.cpp", 1, 2, 1), 3, MarkerKind::Type);
    let second = SourceMarker::new(SourceLocation::new("a.cpp", 1, 8, 7), 3, MarkerKind::Local);
    let third = SourceMarker::new(SourceLocation::new("a.cpp", 2, 1, 20), 5, MarkerKind::Field);

    let mut markers = vec![third.clone(), second.clone(), first.clone()];
    markers.sort();
    assert_eq!(markers, vec![first.clone(), second, third]);

    assert!(first.is_valid());
    assert!(!SourceMarker::new(SourceLocation::null(), 0, MarkerKind::Type).is_valid());
}

pub fn test() {
    let source = "\
class Foo { public: virtual void vm(); int field; };\n\
void free_func() { }\n\
int main() { Foo f; f.field = 1; f.vm(); free_func(); return 0; }\n";

    with_temporary_file("test.cpp", source, |_, file| {
        let marker = SemanticMarker::new(file.to_str().unwrap(), vec![]);
        marker.reparse(&[]);

        let markers = marker.markers_in_range(1, 3);
        assert!(!markers.is_empty());

        // Markers come back sorted and without duplicates.
        let mut sorted = markers.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(markers, sorted);
        assert!(markers.iter().all(|m| m.is_valid()));
        assert!(markers.iter().all(|m| m.length > 0));

        // The class declaration line carries the expected classifications.
        let first_line = kinds_on_line(&markers, 1);
        assert!(first_line.contains(&MarkerKind::Type));
        assert!(first_line.contains(&MarkerKind::VirtualMethod));
        assert!(first_line.contains(&MarkerKind::Field));

        assert!(kinds_on_line(&markers, 2).contains(&MarkerKind::Function));

        let usage_line = kinds_on_line(&markers, 3);
        assert!(usage_line.contains(&MarkerKind::Type));
        assert!(usage_line.contains(&MarkerKind::Local));
        assert!(usage_line.contains(&MarkerKind::Field));
        assert!(usage_line.contains(&MarkerKind::VirtualMethod));
        assert!(usage_line.contains(&MarkerKind::Function));

        // A narrowed range produces only markers inside it.
        let narrowed = marker.markers_in_range(2, 2);
        assert!(narrowed.iter().all(|m| m.location.line() == 2));

        // Degenerate ranges produce nothing.
        assert!(marker.markers_in_range(3, 1).is_empty());
        assert!(marker.markers_in_range(0, 2).is_empty());
    });

    // Diagnostics skip notes and fold them into their parents.
    with_temporary_file("test.cpp", "int x;\nfloat x;\n", |_, file| {
        let marker = SemanticMarker::new(file.to_str().unwrap(), vec![]);
        marker.reparse(&[]);

        let diagnostics = marker.diagnostics();
        assert!(!diagnostics.is_empty());
        assert!(diagnostics.iter().all(|d| d.severity >= Severity::Warning));

        let redefinition = diagnostics.iter().find(|d| d.location.line() == 2).unwrap();
        assert!(redefinition.spelling.contains("redefinition"));
        // The previous-definition note is folded into the message.
        assert!(redefinition.spelling.contains("\n  "));
    });

    // An unloaded marker produces no markers and no diagnostics.
    let unloaded = SemanticMarker::new("missing.cpp", vec![]);
    assert!(unloaded.markers_in_range(1, 10).is_empty());
    assert!(unloaded.diagnostics().is_empty());
}
