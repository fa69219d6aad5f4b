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

//! Semantic highlighting markers and diagnostics.
//!
//! Markers are produced by lexing a line range, keeping the identifier
//! tokens, annotating them with their entities in one batch, and
//! classifying each token by its entity's kind. For reference expressions
//! the classification follows the referenced entity instead.

use std::cmp::{Ordering};

use clang_sys::*;

use diagnostic::{Severity};
use source;
use symbol::{SourceLocation};
use token::{TokenKind};
use unit::{Unit};
use super::{Entity, ParseOptions, Unsaved};

// Child notes folded into a parent diagnostic are capped.
const ATTACHED_NOTES_LIMIT: usize = 10;

//================================================
// Enums
//================================================

// MarkerKind ____________________________________

/// Indicates the categorization of a source marker.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MarkerKind {
    /// A class, struct, union, enum, namespace, typedef, or template.
    Type,
    /// A local variable or parameter.
    Local,
    /// A data member, Objective-C instance variable, or property.
    Field,
    /// A static member.
    Static,
    /// A virtual method or destructor.
    VirtualMethod,
    /// A statement label.
    Label,
    /// An enum constant.
    Enumeration,
    /// A free function or unresolved overload.
    Function,
    /// A contextual keyword such as `override`, `final`, or Objective-C `self`.
    PseudoKeyword,
    /// A macro definition or expansion.
    Macro,
    /// An Objective-C message or selector.
    ObjectiveCMessage,
}

//================================================
// Structs
//================================================

// SourceMarker __________________________________

/// A classified marker over a span of source text.
///
/// Valid iff its location has a non-zero line. Markers order by line,
/// column, and length.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceMarker {
    /// The start of the marked span.
    pub location: SourceLocation,
    /// The length of the marked span in bytes.
    pub length: u32,
    /// The categorization of the marked text.
    pub kind: MarkerKind,
}

impl SourceMarker {
    //- Constructors -----------------------------

    /// Constructs a new `SourceMarker`.
    pub fn new(location: SourceLocation, length: u32, kind: MarkerKind) -> SourceMarker {
        SourceMarker { location, length, kind }
    }

    //- Accessors --------------------------------

    /// Returns whether this marker points at an actual source line.
    pub fn is_valid(&self) -> bool {
        self.location.line() != 0
    }
}

impl PartialOrd for SourceMarker {
    fn partial_cmp(&self, other: &SourceMarker) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SourceMarker {
    fn cmp(&self, other: &SourceMarker) -> Ordering {
        self.location.line().cmp(&other.location.line())
            .then_with(|| self.location.column().cmp(&other.location.column()))
            .then_with(|| self.length.cmp(&other.length))
            .then_with(|| self.kind.cmp(&other.kind))
    }
}

// Diagnostic ____________________________________

/// A diagnostic extracted from a translation unit.
///
/// A `length` of zero marks a point diagnostic rather than a range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// The severity of this diagnostic.
    pub severity: Severity,
    /// The start of the source span this diagnostic covers.
    pub location: SourceLocation,
    /// The length of the covered span, or zero for a point diagnostic.
    pub length: u32,
    /// The message, with attached notes folded in.
    pub spelling: String,
}

// SemanticMarker ________________________________

/// Produces classified source markers and diagnostics for a file.
pub struct SemanticMarker {
    unit: Unit,
}

impl SemanticMarker {
    //- Constructors -----------------------------

    /// Constructs a new `SemanticMarker` for the supplied file and compiler
    /// options.
    pub fn new<F: Into<String>>(file_name: F, options: Vec<String>) -> SemanticMarker {
        let unit = Unit::with_file_name(file_name);
        unit.set_compile_options(options);
        unit.set_management_flags(ParseOptions::editing());
        SemanticMarker { unit }
    }

    /// Constructs a `SemanticMarker` over an existing unit.
    pub fn from_unit(unit: Unit) -> SemanticMarker {
        SemanticMarker { unit }
    }

    //- Accessors --------------------------------

    /// Returns the name of the file markers are produced for.
    pub fn file_name(&self) -> String {
        self.unit.file_name()
    }

    /// Returns the unit backing this marker.
    pub fn unit(&self) -> Unit {
        self.unit.clone()
    }

    /// Returns the diagnostics of the backing unit.
    ///
    /// Ignored diagnostics and free-standing notes are dropped; the first
    /// few notes attached to a diagnostic are folded into its message. A
    /// diagnostic produces one entry per reported range, or a single point
    /// entry at its expansion location when it reports no ranges.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.unit.with_translation_unit(|tu| {
            let mut diagnostics = vec![];

            for diagnostic in tu.get_diagnostics() {
                let severity = diagnostic.get_severity();
                if severity == Severity::Ignored || severity == Severity::Note {
                    continue;
                }

                let mut spelling = diagnostic.get_text();
                for child in diagnostic.get_children().iter().take(ATTACHED_NOTES_LIMIT) {
                    spelling.push_str("\n  ");
                    spelling.push_str(&child.get_text());
                }

                let ranges = diagnostic.get_ranges();
                if ranges.is_empty() {
                    let location = diagnostic.get_location().get_expansion_location();
                    diagnostics.push(Diagnostic {
                        severity,
                        location: SourceLocation::from_native(&location),
                        length: 0,
                        spelling,
                    });
                } else {
                    for range in ranges {
                        let start = range.get_start().get_spelling_location();
                        let end = range.get_end().get_spelling_location();
                        diagnostics.push(Diagnostic {
                            severity,
                            location: SourceLocation::from_native(&start),
                            length: end.offset.saturating_sub(start.offset),
                            spelling: spelling.clone(),
                        });
                    }
                }
            }

            diagnostics
        }).unwrap_or_default()
    }

    /// Returns the classified markers for the supplied inclusive line range,
    /// sorted by line, column, and length, without duplicates.
    pub fn markers_in_range(&self, first_line: u32, last_line: u32) -> Vec<SourceMarker> {
        if first_line == 0 || first_line > last_line {
            return vec![];
        }

        let file_name = self.unit.file_name();
        self.unit.with_translation_unit(|tu| {
            let file = match tu.get_file(&file_name) {
                Some(file) => file,
                None => return vec![],
            };

            let start = file.get_location(first_line, 1);
            let end = file.get_location(last_line, 1);
            let range = source::SourceRange::new(start, end);

            let tokens = tu.tokenize(range);
            let identifiers = tokens.iter()
                .filter(|t| t.get_kind() == TokenKind::Identifier)
                .collect::<Vec<_>>();
            let entities = tu.annotate(&identifiers);

            let mut markers = vec![];
            for (token, entity) in identifiers.iter().zip(entities.iter()) {
                if entity.is_invalid() {
                    continue;
                }

                if let Some(kind) = classify(entity) {
                    add_marker(&mut markers, token.get_range(), kind);
                }
            }

            markers.sort();
            markers.dedup();
            markers
        }).unwrap_or_default()
    }

    //- Mutators ---------------------------------

    /// Sets the file markers are produced for; a changed file invalidates
    /// the backing unit but keeps the compiler options.
    pub fn set_file_name<F: Into<String>>(&self, file_name: F) {
        self.unit.set_file_name(file_name);
    }

    /// Sets the compiler options; changed options invalidate the backing unit.
    pub fn set_compile_options(&self, options: Vec<String>) {
        self.unit.set_compile_options(options);
    }

    /// Brings the backing unit up to date with the supplied unsaved files,
    /// reparsing when loaded and parsing from scratch otherwise.
    pub fn reparse(&self, unsaved: &[Unsaved]) {
        let _lock = self.unit.lock();
        self.unit.set_unsaved(unsaved.to_vec());

        if self.unit.is_loaded() {
            let _ = self.unit.reparse();
        } else {
            let _ = self.unit.parse();
        }
    }
}

//================================================
// Functions
//================================================

fn add_marker(markers: &mut Vec<SourceMarker>, extent: source::SourceRange, kind: MarkerKind) {
    let start = extent.get_start().get_expansion_location();
    let end = extent.get_end().get_expansion_location();

    if start.offset < end.offset {
        let location = SourceLocation::from_native(&start);
        markers.push(SourceMarker::new(location, end.offset - start.offset, kind));
    }
}

fn classify(entity: &Entity) -> Option<MarkerKind> {
    match entity.kind() {
        CXCursor_EnumConstantDecl => Some(MarkerKind::Enumeration),

        CXCursor_ClassDecl |
        CXCursor_ClassTemplate |
        CXCursor_ClassTemplatePartialSpecialization |
        CXCursor_EnumDecl |
        CXCursor_Namespace |
        CXCursor_NamespaceRef |
        CXCursor_NamespaceAlias |
        CXCursor_StructDecl |
        CXCursor_TemplateRef |
        CXCursor_TypeRef |
        CXCursor_TypedefDecl |
        CXCursor_Constructor |
        CXCursor_TemplateTypeParameter |
        CXCursor_UnexposedDecl => Some(MarkerKind::Type),

        CXCursor_ParmDecl |
        CXCursor_VariableRef |
        CXCursor_VarDecl => Some(MarkerKind::Local),

        CXCursor_MemberRefExpr |
        CXCursor_MemberRef |
        CXCursor_DeclRefExpr |
        CXCursor_CallExpr => {
            match classify_referenced(entity) {
                Some(kind) => Some(kind),
                // A member of a template class used in a template function
                // annotates without a resolvable reference.
                None if entity.kind() == CXCursor_MemberRefExpr => Some(MarkerKind::Field),
                None => None,
            }
        },

        CXCursor_FieldDecl => Some(MarkerKind::Field),

        CXCursor_Destructor |
        CXCursor_CXXMethod => {
            if entity.is_virtual_method() {
                Some(MarkerKind::VirtualMethod)
            } else {
                Some(MarkerKind::Function)
            }
        },

        CXCursor_CXXOverrideAttr |
        CXCursor_CXXFinalAttr => Some(MarkerKind::PseudoKeyword),

        CXCursor_FunctionDecl |
        CXCursor_FunctionTemplate |
        CXCursor_OverloadedDeclRef => Some(MarkerKind::Function),

        CXCursor_ObjCSelfExpr => Some(MarkerKind::PseudoKeyword),

        CXCursor_ObjCInstanceMethodDecl |
        CXCursor_ObjCClassMethodDecl |
        CXCursor_ObjCSelectorExpr |
        CXCursor_ObjCMessageExpr => Some(MarkerKind::ObjectiveCMessage),

        CXCursor_ObjCCategoryDecl |
        CXCursor_ObjCCategoryImplDecl |
        CXCursor_ObjCImplementationDecl |
        CXCursor_ObjCInterfaceDecl |
        CXCursor_ObjCProtocolDecl |
        CXCursor_ObjCProtocolRef |
        CXCursor_ObjCClassRef => Some(MarkerKind::Type),

        CXCursor_ObjCSynthesizeDecl |
        CXCursor_ObjCPropertyDecl |
        CXCursor_ObjCIvarDecl => Some(MarkerKind::Field),

        CXCursor_MacroDefinition |
        CXCursor_MacroExpansion => Some(MarkerKind::Macro),

        CXCursor_LabelRef |
        CXCursor_LabelStmt => Some(MarkerKind::Label),

        _ => None,
    }
}

// Reference expressions are classified by the entity they refer to.
fn classify_referenced(entity: &Entity) -> Option<MarkerKind> {
    let referenced = entity.get_reference()?;

    match referenced.kind() {
        CXCursor_EnumConstantDecl => Some(MarkerKind::Enumeration),

        CXCursor_FieldDecl |
        CXCursor_ObjCIvarDecl |
        CXCursor_ObjCPropertyDecl => Some(MarkerKind::Field),

        CXCursor_FunctionDecl |
        CXCursor_FunctionTemplate |
        CXCursor_Constructor => Some(MarkerKind::Function),

        CXCursor_VarDecl |
        CXCursor_ParmDecl => Some(MarkerKind::Local),

        CXCursor_CXXMethod => {
            if referenced.is_virtual_method() {
                Some(MarkerKind::VirtualMethod)
            } else {
                Some(MarkerKind::Function)
            }
        },

        // Calling a method as a property, e.g. `layer.shouldRasterize = YES`.
        CXCursor_ObjCClassMethodDecl |
        CXCursor_ObjCInstanceMethodDecl => Some(MarkerKind::Field),

        // The NSObject `self` method, a pseudo keyword in practice.
        CXCursor_UnexposedDecl => {
            let language = unsafe { clang_getCursorLanguage(referenced.raw) };
            if language == CXLanguage_ObjC {
                Some(MarkerKind::PseudoKeyword)
            } else {
                None
            }
        },

        _ => None,
    }
}
