use std::fs;

use codemodel::{Availability, Unsaved};
use codemodel::completer::{
    activation_sequence, active_argument, completion_operator, doxygen_completions,
    include_completions, local_completions, preprocessor_completions, CodeCompletionResult,
    CompletionEngine, CompletionKind, CompletionOperator,
};

use super::{with_temporary_file, with_temporary_files};

fn result(priority: u32, kind: CompletionKind, text: &str) -> CodeCompletionResult {
    let mut result = CodeCompletionResult::default();
    result.priority = priority;
    result.kind = kind;
    result.text = text.into();
    result
}

#[test]
fn test_result_ordering() {
    let mut results = vec![
        result(20, CompletionKind::Variable, "b"),
        result(10, CompletionKind::Variable, "b"),
        result(10, CompletionKind::Function, "a"),
        result(10, CompletionKind::Function, "b"),
    ];
    results.sort();

    // Priority ranks before kind, kind before typed text.
    assert_eq!(results[0].text, "a");
    assert_eq!(results[1], result(10, CompletionKind::Function, "b"));
    assert_eq!(results[2], result(10, CompletionKind::Variable, "b"));
    assert_eq!(results[3].priority, 20);

    assert!(!result(0, CompletionKind::Other, "").is_valid());
    assert!(result(0, CompletionKind::Other, "x").is_valid());
    assert_eq!(result(0, CompletionKind::Other, "x").availability, Availability::Available);
}

#[test]
fn test_activation_sequences() {
    let sequence = |text: &str| {
        let mut characters = text.chars().rev();
        let ch = characters.next();
        let ch2 = characters.next();
        let ch3 = characters.next();
        activation_sequence(ch, ch2, ch3, true)
    };

    assert_eq!(sequence("p."), (CompletionOperator::Dot, 1));
    assert_eq!(sequence("p->"), (CompletionOperator::Arrow, 2));
    assert_eq!(sequence("N::"), (CompletionOperator::ColonColon, 2));
    assert_eq!(sequence("p.*"), (CompletionOperator::DotStar, 2));
    assert_eq!(sequence("p->*"), (CompletionOperator::ArrowStar, 3));
    assert_eq!(sequence("f("), (CompletionOperator::LeftParen, 1));
    assert_eq!(sequence("a,"), (CompletionOperator::Comma, 1));
    assert_eq!(sequence("#"), (CompletionOperator::Pound, 1));
    assert_eq!(sequence("<"), (CompletionOperator::IncludeAngle, 1));
    assert_eq!(sequence("\""), (CompletionOperator::IncludeQuote, 1));
    assert_eq!(sequence("a/"), (CompletionOperator::IncludeSlash, 1));

    // An ellipsis is not a member access.
    assert_eq!(sequence("..").0, CompletionOperator::None);
    // Three colons are not a scope access.
    assert_eq!(sequence(":::").0, CompletionOperator::None);
    // A doxygen tag begins at a word boundary.
    assert_eq!(sequence(" @"), (CompletionOperator::DoxygenTag, 1));
    assert_eq!(sequence("a@").0, CompletionOperator::None);

    // Function call triggers can be turned off.
    assert_eq!(activation_sequence(Some('('), None, None, false).0, CompletionOperator::None);
}

#[test]
fn test_completion_operator() {
    assert_eq!(completion_operator("p.", 3, true), CompletionOperator::Dot);
    assert_eq!(completion_operator("p->", 4, true), CompletionOperator::Arrow);

    // `#` only triggers at the start of a line.
    assert_eq!(completion_operator("#", 2, true), CompletionOperator::Pound);
    assert_eq!(completion_operator("x #", 4, true), CompletionOperator::None);

    assert_eq!(completion_operator("", 1, true), CompletionOperator::None);
    assert!(CompletionOperator::Pound.is_local());
    assert!(CompletionOperator::DoxygenTag.is_local());
    assert!(!CompletionOperator::Dot.is_local());
}

#[test]
fn test_active_argument() {
    assert_eq!(active_argument(""), 0);
    assert_eq!(active_argument("1"), 0);
    assert_eq!(active_argument("1, 2"), 1);
    assert_eq!(active_argument("1, 2, "), 2);

    // Nested calls and brackets hide their commas.
    assert_eq!(active_argument("f(a, b), "), 1);
    assert_eq!(active_argument("{1, 2}, x"), 1);

    // Literals hide their commas, including escaped quotes.
    assert_eq!(active_argument("\"a,b\""), 0);
    assert_eq!(active_argument("'a', 'b'"), 1);
    assert_eq!(active_argument("\"\\\",\""), 0);
}

#[test]
fn test_local_completions() {
    let doxygen = doxygen_completions();
    assert!(doxygen.iter().any(|r| r.text == "brief"));
    assert!(doxygen.iter().any(|r| r.text == "param"));
    assert!(doxygen.iter().all(|r| r.is_valid()));

    let directives = preprocessor_completions();
    assert!(directives.iter().any(|r| r.text == "include"));
    assert!(directives.iter().all(|r| r.kind == CompletionKind::Preprocessor));

    // The dispatcher covers exactly the triggers that need no unit.
    assert!(local_completions(CompletionOperator::DoxygenTag, &[], "").is_some());
    assert!(local_completions(CompletionOperator::Pound, &[], "").is_some());
    assert!(local_completions(CompletionOperator::IncludeQuote, &[], "").is_some());
    assert!(local_completions(CompletionOperator::Dot, &[], "").is_none());
}

#[test]
fn test_include_completions() {
    let headers = [("a.h", ""), ("b.hpp", ""), ("vector", ""), ("notes.txt", "")];

    with_temporary_files(&headers, |directory, _| {
        fs::create_dir(directory.join("sub")).unwrap();
        fs::write(directory.join("sub").join("inner.h"), "").unwrap();

        let directories = vec![directory.to_path_buf()];

        let texts = |fragment: &str| {
            include_completions(&directories, fragment).iter()
                .map(|r| r.text.clone())
                .collect::<Vec<_>>()
        };

        // Headers, extensionless files, and subdirectories complete; other
        // files do not.
        let all = texts("");
        assert!(all.contains(&"a.h".to_string()));
        assert!(all.contains(&"b.hpp".to_string()));
        assert!(all.contains(&"vector".to_string()));
        assert!(all.contains(&"sub/".to_string()));
        assert!(!all.contains(&"notes.txt".to_string()));

        // The last path segment is the completion prefix.
        assert_eq!(texts("a"), vec!["a.h".to_string()]);
        assert_eq!(texts("sub/"), vec!["inner.h".to_string()]);
        assert!(texts("missing/").is_empty());
    });
}

pub fn test() {
    let source = "struct P { int field; void meth(); int sum(int a, int b); };\n\
                  void g(){ P p; p. }\n";

    with_temporary_file("test.cpp", source, |_, file| {
        let engine = CompletionEngine::new(file.to_str().unwrap(), vec![]);
        assert!(!engine.objc_enabled());

        // The cursor sits right after `p.`.
        let results = engine.code_complete_at(2, 18, &[]);

        let field = results.iter().find(|r| r.text == "field").unwrap();
        assert_eq!(field.kind, CompletionKind::Variable);

        let meth = results.iter().find(|r| r.text == "meth").unwrap();
        assert_eq!(meth.kind, CompletionKind::Function);
        assert!(!meth.has_parameters);
        assert!(meth.hint.contains("meth"));

        let sum = results.iter().find(|r| r.text == "sum").unwrap();
        assert_eq!(sum.kind, CompletionKind::Function);
        assert!(sum.has_parameters);

        // Completion is deterministic for a fixed unit and cursor.
        let again = engine.code_complete_at(2, 18, &[]);
        assert_eq!(results, again);

        // Function hints filter to the named callable.
        let hints = engine.function_hints("sum", 2, 18, "1, ", &[]).unwrap();
        assert!(hints.proposals.iter().all(|p| p.text == "sum"));
        assert_eq!(hints.active_argument, 1);
        assert!(engine.function_hints("no_such_function", 2, 18, "", &[]).is_none());
    });

    // The unsaved overlay drives completion for unsaved buffers.
    with_temporary_file("test.cpp", "int x;\n", |_, file| {
        let path = file.to_str().unwrap();
        let engine = CompletionEngine::new(path, vec![]);
        let overlay = Unsaved::new(
            path,
            "struct Q { int quux; };\nvoid g(){ Q q; q. }\n",
        );

        let results = engine.code_complete_at(2, 18, &[overlay]);
        assert!(results.iter().any(|r| r.text == "quux"));
    });
}
