// Copyright 2016 Kyle Mayes
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The code completion engine.
//!
//! Completion requests acquire the engine's unit, parsing it on demand, and
//! run the native completion entry point at the cursor. The activation
//! heuristics and the doxygen, `#include`, and preprocessor completions are
//! pure text functions that need no translation unit at all.

use std::cmp::{Ordering};
use std::fs;
use std::path::{PathBuf};

use clang_sys::*;

use completion::{self, CompletionChunk, CompletionResults};
use unit::{Unit};
use super::{Availability, ParseOptions, Unsaved};

//================================================
// Enums
//================================================

// CompletionKind ________________________________

/// Indicates the categorization of a code completion result.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CompletionKind {
    /// A function, method, or anything else callable.
    Function,
    /// A C++ constructor.
    Constructor,
    /// A C++ destructor.
    Destructor,
    /// A variable or data member.
    Variable,
    /// A class, struct, union, typedef, or template.
    Class,
    /// An enum.
    Enum,
    /// An enum constant.
    Enumerator,
    /// A namespace or namespace alias.
    Namespace,
    /// A preprocessor entity (macro, directive, or inclusion).
    Preprocessor,
    /// A Qt signal.
    Signal,
    /// A Qt slot.
    Slot,
    /// A completion result of some other kind.
    Other,
}

// CompletionOperator ____________________________

/// The completion triggers recognized at a cursor position.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CompletionOperator {
    /// No trigger.
    None,
    /// A member access (`.`).
    Dot,
    /// A member access through a pointer (`->`).
    Arrow,
    /// A scope access (`::`).
    ColonColon,
    /// A pointer-to-member access (`.*`).
    DotStar,
    /// A pointer-to-member access through a pointer (`->*`).
    ArrowStar,
    /// A function call opening parenthesis.
    LeftParen,
    /// An argument separator inside a function call.
    Comma,
    /// A doxygen tag (`\` or `@`).
    DoxygenTag,
    /// A quoted `#include` path.
    IncludeQuote,
    /// An angle-bracketed `#include` path.
    IncludeAngle,
    /// A path separator inside an `#include` path.
    IncludeSlash,
    /// A preprocessor directive (`#`).
    Pound,
}

impl CompletionOperator {
    /// Returns whether this trigger is served locally without a translation
    /// unit.
    pub fn is_local(self) -> bool {
        matches!(
            self,
            CompletionOperator::DoxygenTag
                | CompletionOperator::IncludeQuote
                | CompletionOperator::IncludeAngle
                | CompletionOperator::IncludeSlash
                | CompletionOperator::Pound
        )
    }
}

//================================================
// Structs
//================================================

// CodeCompletionResult __________________________

/// A ranked code completion candidate.
///
/// Ordering is lexicographic on priority, kind, typed text, hint, parameter
/// presence, and availability; lower priorities rank better.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeCompletionResult {
    /// The rank of this result; smaller is better.
    pub priority: u32,
    /// The categorization of this result.
    pub kind: CompletionKind,
    /// The availability of the entity this result completes to.
    pub availability: Availability,
    /// The typed text, i.e. the completion token itself.
    pub text: String,
    /// The full signature-style rendering of this result.
    pub hint: String,
    /// Whether this result completes to something taking parameters.
    pub has_parameters: bool,
}

impl CodeCompletionResult {
    //- Constructors -----------------------------

    fn with_priority(priority: u32) -> CodeCompletionResult {
        CodeCompletionResult { priority, ..CodeCompletionResult::default() }
    }

    //- Accessors --------------------------------

    /// Returns whether this result carries a completion token.
    pub fn is_valid(&self) -> bool {
        !self.text.is_empty()
    }
}

impl Default for CodeCompletionResult {
    fn default() -> CodeCompletionResult {
        CodeCompletionResult {
            priority: 0,
            kind: CompletionKind::Other,
            availability: Availability::Available,
            text: String::new(),
            hint: String::new(),
            has_parameters: false,
        }
    }
}

impl PartialOrd for CodeCompletionResult {
    fn partial_cmp(&self, other: &CodeCompletionResult) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CodeCompletionResult {
    fn cmp(&self, other: &CodeCompletionResult) -> Ordering {
        self.priority.cmp(&other.priority)
            .then_with(|| self.kind.cmp(&other.kind))
            .then_with(|| self.text.cmp(&other.text))
            .then_with(|| self.hint.cmp(&other.hint))
            .then_with(|| self.has_parameters.cmp(&other.has_parameters))
            .then_with(|| self.availability.cmp(&other.availability))
    }
}

// FunctionHint __________________________________

/// A function signature proposal with the active argument tracked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionHint {
    /// The matching function completions.
    pub proposals: Vec<CodeCompletionResult>,
    /// The 0-based number of the argument being typed.
    pub active_argument: usize,
}

// CompletionEngine ______________________________

/// Produces ranked completion candidates at a cursor.
pub struct CompletionEngine {
    unit: Unit,
}

impl CompletionEngine {
    //- Constructors -----------------------------

    /// Constructs a new `CompletionEngine` for the supplied file and
    /// compiler options.
    pub fn new<F: Into<String>>(file_name: F, options: Vec<String>) -> CompletionEngine {
        let unit = Unit::with_file_name(file_name);
        unit.set_compile_options(options);
        unit.set_management_flags(ParseOptions::editing());
        CompletionEngine { unit }
    }

    /// Constructs a `CompletionEngine` over an existing unit.
    pub fn from_unit(unit: Unit) -> CompletionEngine {
        CompletionEngine { unit }
    }

    //- Accessors --------------------------------

    /// Returns the name of the file completions are computed in.
    pub fn file_name(&self) -> String {
        self.unit.file_name()
    }

    /// Returns the unit backing this engine.
    pub fn unit(&self) -> Unit {
        self.unit.clone()
    }

    /// Returns whether the configured options enable Objective-C++.
    pub fn objc_enabled(&self) -> bool {
        self.unit.compile_options().iter().any(|o| o == "-ObjC++")
    }

    //- Mutators ---------------------------------

    /// Sets the file completions are computed in; a changed file invalidates
    /// the backing unit.
    pub fn set_file_name<F: Into<String>>(&self, file_name: F) {
        self.unit.set_file_name(file_name);
    }

    /// Sets the compiler options; changed options invalidate the backing unit.
    pub fn set_options(&self, options: Vec<String>) {
        self.unit.set_compile_options(options);
    }

    /// Brings the backing unit up to date with the supplied unsaved files.
    ///
    /// Parses from scratch when no translation unit is loaded. Returns
    /// whether a loaded translation unit is available afterwards.
    pub fn reparse(&self, unsaved: &[Unsaved]) -> bool {
        let _lock = self.unit.lock();
        self.unit.set_unsaved(unsaved.to_vec());

        if self.unit.is_loaded() {
            self.unit.reparse().is_ok()
        } else {
            self.unit.parse().is_ok()
        }
    }

    /// Returns the completion candidates at the supplied cursor.
    ///
    /// Parses the backing unit first when it is not loaded; an unparsable
    /// unit produces no candidates.
    pub fn code_complete_at(
        &self, line: u32, column: u32, unsaved: &[Unsaved]
    ) -> Vec<CodeCompletionResult> {
        let _lock = self.unit.lock();
        self.unit.set_unsaved(unsaved.to_vec());

        if !self.unit.is_loaded() && self.unit.parse().is_err() {
            return vec![];
        }

        let file_name = self.unit.file_name();
        self.unit.with_translation_unit(|tu| {
            match completion::complete_at(tu, &file_name, line, column, unsaved) {
                Some(results) => convert_results(&results),
                None => vec![],
            }
        }).unwrap_or_default()
    }

    /// Computes function signature proposals for a call to `identifier`.
    ///
    /// Completion is re-run at the identifier's position and filtered to the
    /// function completions whose typed text matches. `arguments` is the
    /// buffer contents between the call's opening parenthesis and the
    /// cursor; the active argument is derived from its unbalanced commas.
    pub fn function_hints(
        &self,
        identifier: &str,
        line: u32,
        column: u32,
        arguments: &str,
        unsaved: &[Unsaved],
    ) -> Option<FunctionHint> {
        let proposals = self.code_complete_at(line, column, unsaved)
            .into_iter()
            .filter(|r| r.text == identifier)
            .filter(|r| {
                matches!(
                    r.kind,
                    CompletionKind::Function
                        | CompletionKind::Constructor
                        | CompletionKind::Signal
                        | CompletionKind::Slot
                )
            })
            .collect::<Vec<_>>();

        if proposals.is_empty() {
            None
        } else {
            Some(FunctionHint { proposals, active_argument: active_argument(arguments) })
        }
    }
}

//================================================
// Functions
//================================================

fn convert_results(results: &CompletionResults) -> Vec<CodeCompletionResult> {
    let mut converted = vec![];

    for result in results.get_results() {
        let mut candidate = CodeCompletionResult::with_priority(result.string.get_priority());
        candidate.availability = result.string.get_availability();
        candidate.kind = completion_kind(result.cursor_kind);

        let mut previous_was_left_paren = false;
        for chunk in result.string.get_chunks() {
            match chunk {
                CompletionChunk::TypedText(ref text) => candidate.text = text.clone(),
                CompletionChunk::RightParenthesis if previous_was_left_paren => {
                    candidate.has_parameters = false;
                },
                _ => {},
            }

            if let CompletionChunk::LeftParenthesis = chunk {
                previous_was_left_paren = true;
                candidate.has_parameters = true;
            } else {
                previous_was_left_paren = false;
            }

            if let Some(text) = chunk.get_text() {
                if !text.is_empty() {
                    let alphanumeric = candidate.hint
                        .chars()
                        .last()
                        .map_or(false, |c| c.is_alphanumeric());
                    if alphanumeric {
                        candidate.hint.push(' ');
                    }
                    candidate.hint.push_str(&text);
                }
            }
        }

        converted.push(candidate);
    }

    converted
}

fn completion_kind(kind: CXCursorKind) -> CompletionKind {
    match kind {
        CXCursor_Constructor => CompletionKind::Constructor,
        CXCursor_Destructor => CompletionKind::Destructor,
        CXCursor_CXXMethod |
        CXCursor_ConversionFunction |
        CXCursor_FunctionDecl |
        CXCursor_FunctionTemplate |
        CXCursor_MemberRef |
        CXCursor_MemberRefExpr => CompletionKind::Function,
        CXCursor_FieldDecl |
        CXCursor_VarDecl => CompletionKind::Variable,
        CXCursor_Namespace |
        CXCursor_NamespaceAlias |
        CXCursor_NamespaceRef => CompletionKind::Namespace,
        CXCursor_StructDecl |
        CXCursor_UnionDecl |
        CXCursor_ClassDecl |
        CXCursor_TypeRef |
        CXCursor_TemplateRef |
        CXCursor_TypedefDecl |
        CXCursor_ClassTemplate |
        CXCursor_ClassTemplatePartialSpecialization => CompletionKind::Class,
        CXCursor_EnumConstantDecl => CompletionKind::Enumerator,
        CXCursor_EnumDecl => CompletionKind::Enum,
        CXCursor_PreprocessingDirective |
        CXCursor_MacroDefinition |
        CXCursor_MacroExpansion |
        CXCursor_InclusionDirective => CompletionKind::Preprocessor,
        _ => CompletionKind::Other,
    }
}

// Activation heuristics _________________________

/// Doxygen tags completed locally after `\` or `@`.
pub const DOXYGEN_TAGS: [&str; 62] = [
    "a", "addindex", "addtogroup", "anchor", "arg", "attention", "author", "b", "brief", "bug",
    "c", "class", "code", "date", "def", "defgroup", "deprecated", "e", "em", "endcode",
    "enddot", "endif", "endlink", "endverbatim", "enum", "example", "exception", "file", "fn",
    "if", "image", "include", "ingroup", "internal", "invariant", "li", "line", "link",
    "mainpage", "name", "namespace", "note", "overload", "p", "page", "par", "param", "post",
    "pre", "ref", "relates", "remarks", "return", "retval", "sa", "section", "see", "since",
    "struct", "todo", "union", "warning",
];

/// Preprocessor directives completed locally after `#`.
pub const PREPROCESSOR_DIRECTIVES: [&str; 13] = [
    "define", "elif", "else", "endif", "error", "if", "ifdef", "ifndef", "include", "line",
    "pragma", "undef", "warning",
];

/// Examines up to three characters preceding the cursor and returns the
/// trigger they form together with its length in characters.
///
/// `want_function_call` controls whether `(` and `,` count as triggers.
pub fn activation_sequence(
    ch: Option<char>, ch2: Option<char>, ch3: Option<char>, want_function_call: bool
) -> (CompletionOperator, usize) {
    match ch {
        Some('.') if ch2 != Some('.') => (CompletionOperator::Dot, 1),
        Some(',') => (CompletionOperator::Comma, 1),
        Some('(') if want_function_call => (CompletionOperator::LeftParen, 1),
        Some(':') if ch2 == Some(':') && ch3 != Some(':') => (CompletionOperator::ColonColon, 2),
        Some('>') if ch2 == Some('-') => (CompletionOperator::Arrow, 2),
        Some('*') if ch2 == Some('.') => (CompletionOperator::DotStar, 2),
        Some('*') if ch2 == Some('>') && ch3 == Some('-') => (CompletionOperator::ArrowStar, 3),
        Some('\\') | Some('@') if ch2.map_or(true, |c| c.is_whitespace()) => {
            (CompletionOperator::DoxygenTag, 1)
        },
        Some('<') => (CompletionOperator::IncludeAngle, 1),
        Some('"') => (CompletionOperator::IncludeQuote, 1),
        Some('/') => (CompletionOperator::IncludeSlash, 1),
        Some('#') => (CompletionOperator::Pound, 1),
        _ => (CompletionOperator::None, 0),
    }
}

/// Returns the trigger in effect for a cursor at the 1-based `column` of
/// `line`.
///
/// `#` only triggers at the start of the line, and identifier-prefix
/// triggering kicks in after three identifier characters not preceded by a
/// fourth.
pub fn completion_operator(line: &str, column: u32, want_function_call: bool) -> CompletionOperator {
    let characters = line.chars().collect::<Vec<_>>();
    let position = (column as usize).saturating_sub(1).min(characters.len());

    let at = |back: usize| -> Option<char> {
        position.checked_sub(back).and_then(|i| characters.get(i).cloned())
    };

    let (operator, _) = activation_sequence(at(1), at(2), at(3), want_function_call);

    if operator == CompletionOperator::Pound && position != 1 {
        return CompletionOperator::None;
    }

    if operator == CompletionOperator::None && triggers_after_identifier(&characters, position) {
        return CompletionOperator::Dot;
    }

    operator
}

/// Returns the 0-based number of the argument being typed, given the buffer
/// contents between a call's opening parenthesis and the cursor.
///
/// Commas inside nested brackets, string literals, and character literals
/// are not argument separators.
pub fn active_argument(text: &str) -> usize {
    let mut commas = 0;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut in_char = false;
    let mut escaped = false;

    for c in text.chars() {
        if escaped {
            escaped = false;
            continue;
        }

        match c {
            '\\' if in_string || in_char => escaped = true,
            '"' if !in_char => in_string = !in_string,
            '\'' if !in_string => in_char = !in_char,
            _ if in_string || in_char => {},
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => commas += 1,
            _ => {},
        }
    }

    commas
}

/// Returns the doxygen tag completions, served without a translation unit.
pub fn doxygen_completions() -> Vec<CodeCompletionResult> {
    DOXYGEN_TAGS.iter().map(|tag| {
        let mut result = CodeCompletionResult::default();
        result.text = (*tag).into();
        result.hint = format!("\\{}", tag);
        result
    }).collect()
}

/// Returns the preprocessor directive completions, served without a
/// translation unit.
pub fn preprocessor_completions() -> Vec<CodeCompletionResult> {
    PREPROCESSOR_DIRECTIVES.iter().map(|directive| {
        let mut result = CodeCompletionResult::default();
        result.kind = CompletionKind::Preprocessor;
        result.text = (*directive).into();
        result.hint = format!("#{}", directive);
        result
    }).collect()
}

/// Returns `#include` path completions over the supplied search directories,
/// served without a translation unit.
///
/// `fragment` is the path typed so far inside the quotes or angle brackets;
/// its last segment is completed. Subdirectories complete with a trailing
/// `/` so completion can continue into them.
pub fn include_completions(
    directories: &[PathBuf], fragment: &str
) -> Vec<CodeCompletionResult> {
    let (relative, prefix) = match fragment.rfind('/') {
        Some(slash) => (&fragment[..slash + 1], &fragment[slash + 1..]),
        None => ("", fragment),
    };

    let mut results = vec![];
    for directory in directories {
        let listing = match fs::read_dir(directory.join(relative)) {
            Ok(listing) => listing,
            Err(_) => continue,
        };

        for entry in listing.filter_map(|e| e.ok()) {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(prefix) {
                continue;
            }

            let is_directory = entry.file_type().map_or(false, |t| t.is_dir());
            if is_directory {
                let mut result = CodeCompletionResult::default();
                result.text = format!("{}/", name);
                result.hint = format!("{}{}/", relative, name);
                results.push(result);
            } else if is_header_name(&name) {
                let mut result = CodeCompletionResult::default();
                result.text = name.clone();
                result.hint = format!("{}{}", relative, name);
                results.push(result);
            }
        }
    }

    results.sort();
    results.dedup();
    results
}

/// Returns the completions for a trigger served without a translation unit,
/// or `None` when the trigger needs one.
pub fn local_completions(
    operator: CompletionOperator, include_directories: &[PathBuf], fragment: &str
) -> Option<Vec<CodeCompletionResult>> {
    match operator {
        CompletionOperator::DoxygenTag => Some(doxygen_completions()),
        CompletionOperator::Pound => Some(preprocessor_completions()),
        CompletionOperator::IncludeQuote |
        CompletionOperator::IncludeAngle |
        CompletionOperator::IncludeSlash => {
            Some(include_completions(include_directories, fragment))
        },
        _ => None,
    }
}

// Files without an extension still complete; the standard library headers
// carry none.
fn is_header_name(name: &str) -> bool {
    match name.rfind('.') {
        Some(dot) => name[dot + 1..].starts_with('h'),
        None => true,
    }
}

// Three identifier characters immediately before the cursor trigger
// completion, provided a fourth does not precede them (the proposal would
// already be showing).
fn triggers_after_identifier(characters: &[char], position: usize) -> bool {
    fn identifier(c: char) -> bool {
        c.is_alphanumeric() || c == '_'
    }

    if position < 3 {
        return false;
    }

    let window = &characters[position - 3..position];
    if !window.iter().all(|&c| identifier(c)) {
        return false;
    }

    position == 3 || !identifier(characters[position - 4])
}
