use codemodel::indexer::{
    clang_options, identify_file_type, non_project_options, objc_option, FileType, Language,
    ProjectPart, QtVersion,
};

fn part(language: Language) -> ProjectPart {
    let mut part = ProjectPart::default();
    part.language = language;
    part
}

fn windows_extras() -> Vec<String> {
    if cfg!(windows) {
        vec!["-fms-extensions".into(), "-fdelayed-template-parsing".into()]
    } else {
        vec![]
    }
}

#[test]
fn test_synthesis() {
    let mut part = part(Language::Cxx11);
    part.qt_version = QtVersion::Qt5;
    part.defines = vec![
        "#define FOO 1".into(),
        "#define _X".into(),
        "#define OBJC_NEW_PROPERTIES 1".into(),
    ];
    part.include_paths = vec!["/a".into(), "/b".into()];
    part.framework_paths = vec!["/F".into()];

    let mut expected: Vec<String> = vec!["-std=c++11".into(), "-include".into()];
    expected.push(format!("{}/data/qt5-qobjectdefs-injected.h", env!("CARGO_MANIFEST_DIR")));
    expected.extend(windows_extras());
    expected.push("-nobuiltininc".into());
    expected.push("-DFOO=1".into());
    expected.push("-F/F".into());
    expected.push("-I/a".into());
    expected.push("-I/b".into());

    assert_eq!(clang_options(&part), expected);
}

#[test]
fn test_standards() {
    assert_eq!(clang_options(&part(Language::C89))[0], "-std=gnu89");
    assert_eq!(clang_options(&part(Language::C99))[0], "-std=gnu99");
    assert_eq!(clang_options(&part(Language::Cxx98))[0], "-std=gnu++98");
    assert_eq!(clang_options(&part(Language::Cxx11))[0], "-std=c++11");
}

#[test]
fn test_objc() {
    assert_eq!(objc_option(false), "-ObjC");
    assert_eq!(objc_option(true), "-ObjC++");

    let mut c = part(Language::C99);
    c.objc = true;
    assert_eq!(clang_options(&c)[1], "-ObjC");

    let mut cxx = part(Language::Cxx98);
    cxx.objc = true;
    assert_eq!(clang_options(&cxx)[1], "-ObjC++");
}

#[test]
fn test_qt4() {
    let mut part = part(Language::Cxx98);
    part.qt_version = QtVersion::Qt4;

    let options = clang_options(&part);
    assert_eq!(options[1], "-include");
    assert!(options[2].ends_with("/data/qt4-qobjectdefs-injected.h"));
}

#[test]
fn test_defines() {
    let mut part = part(Language::Cxx11);
    part.defines = vec![
        "".into(),
        "not a define".into(),
        "#define _RESERVED 1".into(),
        "#define PLAIN".into(),
        "#define VALUE 42".into(),
        "#define STR \\\"quoted\\\"".into(),
        "#define VALUE 42".into(),
    ];

    let options = clang_options(&part);
    let defines = options.iter().filter(|o| o.starts_with("-D")).collect::<Vec<_>>();
    assert_eq!(defines, vec!["-DPLAIN", "-DVALUE=42", "-DSTR=quoted"]);
}

#[test]
fn test_empty_include_paths() {
    let mut part = part(Language::Cxx11);
    part.include_paths = vec!["".into(), "/x".into()];

    let options = clang_options(&part);
    assert!(!options.contains(&"-I".to_string()));
    assert!(options.contains(&"-I/x".to_string()));
}

#[test]
fn test_non_project_options() {
    assert_eq!(non_project_options(), vec!["-std=c++11".to_string()]);
}

#[test]
fn test_file_types() {
    assert_eq!(identify_file_type("a.c"), FileType::Implementation);
    assert_eq!(identify_file_type("a.cc"), FileType::Implementation);
    assert_eq!(identify_file_type("a.cpp"), FileType::Implementation);
    assert_eq!(identify_file_type("a.CXX"), FileType::Implementation);
    assert_eq!(identify_file_type("a.m"), FileType::Implementation);
    assert_eq!(identify_file_type("a.mm"), FileType::Implementation);

    assert_eq!(identify_file_type("a.h"), FileType::Header);
    assert_eq!(identify_file_type("a.hpp"), FileType::Header);
    // Unknown suffixes are headers so standard library files still index.
    assert_eq!(identify_file_type("vector"), FileType::Header);
    assert_eq!(identify_file_type("a.txt"), FileType::Header);
}
