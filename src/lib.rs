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

//! A clang-based code model for C, C++, and Objective-C.
//!
//! This crate wraps the translation unit lifecycle of `libclang` and builds
//! the services an editor needs on top of it: a project-wide symbol indexer
//! with a persistent database, code completion, semantic highlighting, and
//! code navigation.

extern crate byteorder;
extern crate clang_sys;
extern crate crossbeam_channel;
extern crate libc;
#[macro_use]
extern crate log;
extern crate num_cpus;
extern crate parking_lot;
extern crate regex;
extern crate slab;
extern crate thiserror;

#[macro_use]
mod utility;

pub mod completion;
pub mod diagnostic;
pub mod error;
pub mod source;
pub mod token;

pub mod completer;
pub mod database;
pub mod indexer;
pub mod liveunits;
pub mod navigator;
pub mod semantic;
pub mod symbol;
pub mod unit;

use std::cmp;
use std::fmt;
use std::hash;
use std::mem;
use std::ffi::{CString};
use std::path::{Path};
use std::sync::{Once};

use clang_sys::*;

use libc::{c_int, c_uint, c_ulong};

use error::{SaveError, SourceError};
use source::{File, SourceLocation, SourceRange};
use token::{Token, TokenSet};
use utility::{FromError, Nullable};

pub use completer::{CodeCompletionResult, CompletionEngine, CompletionKind};
pub use database::{SymbolDatabase};
pub use diagnostic::{Severity};
pub use indexer::{Indexer, ProjectPart};
pub use liveunits::{LiveUnits};
pub use navigator::{CodeNavigator};
pub use semantic::{SemanticMarker, SourceMarker};
pub use symbol::{Symbol, SymbolKind};
pub use unit::{PchInfo, Unit};

//================================================
// Functions
//================================================

static INITIALIZE: Once = Once::new();

/// Prepares `libclang` for use by this process.
///
/// Loads the shared library when the `runtime` feature is enabled and then
/// enables crash recovery and stack traces. Subsequent calls have no effect
/// and the initialization is never torn down.
///
/// # Panics
///
/// * the `runtime` feature is enabled and `libclang` could not be loaded
pub fn initialize() {
    INITIALIZE.call_once(|| {
        #[cfg(feature="runtime")]
        {
            if let Err(error) = clang_sys::load() {
                panic!("failed to load `libclang`: {}", error);
            }
        }

        unsafe {
            clang_toggleCrashRecovery(1);
            clang_enableStackTraces();
        }
    });
}

//================================================
// Enums
//================================================

// Availability __________________________________

/// Indicates the availability of an AST entity or a completion result.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Availability {
    /// The entity is available.
    Available,
    /// The entity is available but has been deprecated and any usage of it will be a warning.
    Deprecated,
    /// The entity is not available and any usage of it will be an error.
    NotAvailable,
    /// The entity is available but is not accessible and any usage of it will be an error.
    NotAccessible,
}

impl Availability {
    //- Constructors -----------------------------

    pub(crate) fn from_raw(raw: CXAvailabilityKind) -> Availability {
        match raw {
            CXAvailability_Deprecated => Availability::Deprecated,
            CXAvailability_NotAvailable => Availability::NotAvailable,
            CXAvailability_NotAccessible => Availability::NotAccessible,
            _ => Availability::Available,
        }
    }
}

// EntityVisitResult _____________________________

/// Indicates how a entity visitation should proceed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(C)]
pub enum EntityVisitResult {
    /// Do not continue visiting entities.
    Break = 0,
    /// Continue visiting sibling entities iteratively, skipping child entities.
    Continue = 1,
    /// Continue visiting sibling and child entities recursively, children first.
    Recurse = 2,
}

//================================================
// Structs
//================================================

// Index _________________________________________

/// A `libclang` index, the context translation units are parsed in.
pub struct Index {
    ptr: CXIndex,
}

impl Index {
    //- Constructors -----------------------------

    /// Constructs a new `Index`.
    ///
    /// `exclude` determines whether declarations from precompiled headers are
    /// excluded and `diagnostics` determines whether diagnostics are printed
    /// while parsing source files.
    pub fn new(exclude: bool, diagnostics: bool) -> Index {
        initialize();
        let ptr = unsafe { clang_createIndex(exclude as c_int, diagnostics as c_int) };
        Index { ptr }
    }
}

impl Drop for Index {
    fn drop(&mut self) {
        unsafe { clang_disposeIndex(self.ptr); }
    }
}

// The index is only ever used by the translation unit that owns it, and every
// operation on that translation unit is serialized by its unit's lock.
unsafe impl Send for Index { }

// ParseOptions __________________________________

options! {
    /// A set of options that determines how a source file is parsed into a translation unit.
    #[derive(Default)]
    options ParseOptions: CXTranslationUnit_Flags {
        /// Indicates whether certain code completion results will be cached
        /// when the translation unit is reparsed.
        pub cache_completion_results: CXTranslationUnit_CacheCompletionResults,
        /// Indicates whether a detailed preprocessing record will be
        /// constructed which includes all macro definitions and instantiations.
        pub detailed_preprocessing_record: CXTranslationUnit_DetailedPreprocessingRecord,
        /// Indicates whether the translation unit will be considered incomplete.
        pub incomplete: CXTranslationUnit_Incomplete,
        /// Indicates whether function and method bodies will be skipped.
        pub skip_function_bodies: CXTranslationUnit_SkipFunctionBodies,
    }
}

impl ParseOptions {
    //- Constructors -----------------------------

    /// Returns the options used for units built by the indexer.
    pub fn indexing() -> ParseOptions {
        let mut options = ParseOptions::default();
        options.detailed_preprocessing_record = true;
        options
    }

    /// Returns the options used for units backing editor services.
    pub fn editing() -> ParseOptions {
        initialize();
        let flags = unsafe { clang_defaultEditingTranslationUnitOptions() };
        let mut options = ParseOptions::from(flags);
        options.detailed_preprocessing_record = true;
        options.incomplete = true;
        options.cache_completion_results = false;
        options
    }
}

// TranslationUnit _______________________________

/// A preprocessed and parsed source file.
///
/// A translation unit owns both its parse handle and the index it was parsed
/// in; the handle is released before the index.
pub struct TranslationUnit {
    pub(crate) ptr: CXTranslationUnit,
    index: Index,
}

impl TranslationUnit {
    //- Constructors -----------------------------

    /// Parses a source file into a new `TranslationUnit`.
    ///
    /// # Failures
    ///
    /// * an error occurs while deserializing an AST file
    /// * `libclang` crashes
    /// * an unknown error occurs
    pub fn from_source<F: AsRef<Path>>(
        index: Index,
        file: F,
        arguments: &[String],
        unsaved: &[Unsaved],
        options: ParseOptions,
    ) -> Result<TranslationUnit, SourceError> {
        let arguments = arguments.iter().map(utility::from_string).collect::<Vec<_>>();
        let arguments = arguments.iter().map(|a| a.as_ptr()).collect::<Vec<_>>();
        let unsaved = unsaved.iter().map(|u| u.as_raw()).collect::<Vec<_>>();

        unsafe {
            let mut ptr = mem::MaybeUninit::uninit();

            let code = clang_parseTranslationUnit2(
                index.ptr,
                utility::from_path(file).as_ptr(),
                arguments.as_ptr(),
                arguments.len() as c_int,
                unsaved.as_ptr() as *mut CXUnsavedFile,
                unsaved.len() as c_uint,
                options.into(),
                ptr.as_mut_ptr(),
            );

            SourceError::from_error(code)?;
            Ok(TranslationUnit { ptr: ptr.assume_init(), index })
        }
    }

    //- Accessors --------------------------------

    /// Returns the diagnostics for this translation unit.
    pub fn get_diagnostics(&self) -> Vec<diagnostic::Diagnostic> {
        iter!(
            clang_getNumDiagnostics(self.ptr),
            clang_getDiagnostic(self.ptr),
        ).map(|d| diagnostic::Diagnostic::from_ptr(d, self)).collect()
    }

    /// Returns the entity for this translation unit.
    pub fn get_entity(&self) -> Entity {
        unsafe { Entity::from_raw(clang_getTranslationUnitCursor(self.ptr), self) }
    }

    /// Returns the file at the supplied path in this translation unit, if any.
    pub fn get_file<F: AsRef<Path>>(&self, file: F) -> Option<File> {
        let file = unsafe { clang_getFile(self.ptr, utility::from_path(file).as_ptr()) };
        file.map(|f| File::from_ptr(f, self))
    }

    /// Lexes the supplied source range into tokens.
    pub fn tokenize(&self, range: SourceRange) -> TokenSet {
        unsafe {
            let mut ptr = mem::MaybeUninit::uninit();
            let mut count = mem::MaybeUninit::uninit();
            clang_tokenize(self.ptr, range.raw(), ptr.as_mut_ptr(), count.as_mut_ptr());
            TokenSet::from_raw(ptr.assume_init(), count.assume_init(), self)
        }
    }

    /// Annotates the supplied tokens with the entities they belong to.
    ///
    /// The returned entities correspond to the supplied tokens by position.
    pub fn annotate(&self, tokens: &[Token]) -> Vec<Entity> {
        let mut raws = tokens.iter().map(|t| t.raw).collect::<Vec<_>>();
        let mut cursors = vec![unsafe { clang_getNullCursor() }; tokens.len()];

        unsafe {
            clang_annotateTokens(
                self.ptr,
                raws.as_mut_ptr(),
                raws.len() as c_uint,
                cursors.as_mut_ptr(),
            );
        }

        cursors.into_iter().map(|c| Entity::from_raw(c, self)).collect()
    }

    /// Visits the files transitively included while parsing this translation
    /// unit.
    ///
    /// The second argument of the callback is the inclusion chain for the
    /// included file, beginning with the site that included it.
    pub fn visit_inclusions<F: FnMut(File, &[SourceLocation])>(&self, f: F) {
        trait InclusionCallback<'tu> {
            fn call(&mut self, file: File<'tu>, chain: &[SourceLocation<'tu>]);
        }

        impl<'tu, F: FnMut(File<'tu>, &[SourceLocation<'tu>])> InclusionCallback<'tu> for F {
            fn call(&mut self, file: File<'tu>, chain: &[SourceLocation<'tu>]) {
                self(file, chain)
            }
        }

        extern "C" fn visit(
            file: CXFile, locations: *mut CXSourceLocation, count: c_uint, data: CXClientData
        ) {
            unsafe {
                let &mut (tu, ref mut callback):
                    &mut (&TranslationUnit, Box<dyn InclusionCallback>) = mem::transmute(data);

                let chain = (0..count as usize)
                    .map(|i| SourceLocation::from_raw(*locations.add(i), tu))
                    .collect::<Vec<_>>();
                callback.call(File::from_ptr(file, tu), &chain);
            }
        }

        let mut data = (self, Box::new(f) as Box<dyn InclusionCallback>);
        unsafe { clang_getInclusions(self.ptr, visit, mem::transmute(&mut data)); }
    }

    /// Saves this translation unit to an AST file.
    ///
    /// # Failures
    ///
    /// * errors in the translation unit prevented saving
    /// * an unknown error occurs
    pub fn save<F: AsRef<Path>>(&self, file: F) -> Result<(), SaveError> {
        let code = unsafe {
            clang_saveTranslationUnit(
                self.ptr, utility::from_path(file).as_ptr(), CXSaveTranslationUnit_None
            )
        };
        SaveError::from_error(code)
    }

    //- Mutators ---------------------------------

    /// Reparses the source file this translation unit was built from with the
    /// same arguments that were used originally.
    ///
    /// When reparsing fails the handle is no longer usable for anything but
    /// disposal, which happens when this translation unit is dropped.
    pub fn reparse(&mut self, unsaved: &[Unsaved]) -> Result<(), SourceError> {
        let unsaved = unsaved.iter().map(|u| u.as_raw()).collect::<Vec<_>>();

        let code = unsafe {
            clang_reparseTranslationUnit(
                self.ptr,
                unsaved.len() as c_uint,
                unsaved.as_ptr() as *mut CXUnsavedFile,
                clang_defaultReparseOptions(self.ptr),
            )
        };
        SourceError::from_error(code)
    }
}

impl Drop for TranslationUnit {
    fn drop(&mut self) {
        unsafe { clang_disposeTranslationUnit(self.ptr); }
    }
}

impl fmt::Debug for TranslationUnit {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        let spelling = unsafe { clang_getTranslationUnitSpelling(self.ptr) };
        formatter.debug_struct("TranslationUnit")
            .field("spelling", &utility::to_string(spelling))
            .finish()
    }
}

// Access to a translation unit is serialized by the lock of the unit that
// owns it (see the `unit` module).
unsafe impl Send for TranslationUnit { }

// Entity ________________________________________

/// An AST entity.
#[derive(Copy, Clone)]
pub struct Entity<'tu> {
    pub(crate) raw: CXCursor,
    tu: &'tu TranslationUnit,
}

impl<'tu> Entity<'tu> {
    //- Constructors -----------------------------

    pub(crate) fn from_raw(raw: CXCursor, tu: &'tu TranslationUnit) -> Entity<'tu> {
        Entity { raw, tu }
    }

    //- Accessors --------------------------------

    pub(crate) fn kind(&self) -> CXCursorKind {
        unsafe { clang_getCursorKind(self.raw) }
    }

    pub(crate) fn hash_value(&self) -> u32 {
        unsafe { clang_hashCursor(self.raw) as u32 }
    }

    /// Returns the AST entity that describes the definition of this AST entity, if any.
    pub fn get_definition(&self) -> Option<Entity<'tu>> {
        unsafe { clang_getCursorDefinition(self.raw).map(|c| Entity::from_raw(c, self.tu)) }
    }

    /// Returns the file included by this inclusion directive, if applicable.
    pub fn get_included_file(&self) -> Option<File<'tu>> {
        let file = unsafe { clang_getIncludedFile(self.raw) };

        if !file.is_null() {
            Some(File::from_ptr(file, self.tu))
        } else {
            None
        }
    }

    /// Returns the source location of this AST entity, if any.
    pub fn get_location(&self) -> Option<SourceLocation<'tu>> {
        unsafe {
            let location = clang_getCursorLocation(self.raw);
            location.map(|l| SourceLocation::from_raw(l, self.tu))
        }
    }

    /// Returns the name of this AST entity, if any.
    pub fn get_name(&self) -> Option<String> {
        unsafe { utility::to_string_option(clang_getCursorSpelling(self.raw)) }
    }

    /// Returns the source range of this AST entity, if any.
    pub fn get_range(&self) -> Option<SourceRange<'tu>> {
        unsafe {
            let range = clang_getCursorExtent(self.raw);
            range.map(|r| SourceRange::from_raw(r, self.tu))
        }
    }

    /// Returns the AST entity referred to by this AST entity, if any.
    pub fn get_reference(&self) -> Option<Entity<'tu>> {
        unsafe { clang_getCursorReferenced(self.raw).map(|c| Entity::from_raw(c, self.tu)) }
    }

    /// Returns the semantic parent of this AST entity, if any.
    pub fn get_semantic_parent(&self) -> Option<Entity<'tu>> {
        let parent = unsafe { clang_getCursorSemanticParent(self.raw) };
        parent.map(|p| Entity::from_raw(p, self.tu))
    }

    /// Returns the translation unit which contains this AST entity.
    pub fn get_translation_unit(&self) -> &'tu TranslationUnit {
        self.tu
    }

    /// Returns whether this AST entity is a declaration.
    pub fn is_declaration(&self) -> bool {
        unsafe { clang_isDeclaration(self.raw.kind) != 0 }
    }

    /// Returns whether this AST entity is the definition of the entity it
    /// declares or refers to.
    pub fn is_definition(&self) -> bool {
        unsafe { clang_isCursorDefinition(self.raw) != 0 }
    }

    /// Returns whether the kind of this AST entity is invalid.
    pub fn is_invalid(&self) -> bool {
        unsafe { clang_isInvalid(self.raw.kind) != 0 }
    }

    /// Returns whether this AST entity is categorized as a reference.
    pub fn is_reference(&self) -> bool {
        unsafe { clang_isReference(self.raw.kind) != 0 }
    }

    /// Returns whether this AST entity is a virtual method.
    pub fn is_virtual_method(&self) -> bool {
        unsafe { clang_CXXMethod_isVirtual(self.raw) != 0 }
    }

    /// Visits the children of this AST entity recursively and returns whether
    /// visitation was ended by the callback returning `EntityVisitResult::Break`.
    ///
    /// The first argument of the callback is the AST entity being visited and
    /// the second argument is the parent of that AST entity.
    pub fn visit_children<F: FnMut(Entity<'tu>, Entity<'tu>) -> EntityVisitResult>(
        &self, f: F
    ) -> bool {
        trait EntityCallback<'tu> {
            fn call(&mut self, entity: Entity<'tu>, parent: Entity<'tu>) -> EntityVisitResult;
        }

        impl<'tu, F: FnMut(Entity<'tu>, Entity<'tu>) -> EntityVisitResult> EntityCallback<'tu> for F {
            fn call(&mut self, entity: Entity<'tu>, parent: Entity<'tu>) -> EntityVisitResult {
                self(entity, parent)
            }
        }

        extern "C" fn visit(
            cursor: CXCursor, parent: CXCursor, data: CXClientData
        ) -> CXChildVisitResult {
            unsafe {
                let &mut (tu, ref mut callback):
                    &mut (&TranslationUnit, Box<dyn EntityCallback>) = mem::transmute(data);

                let entity = Entity::from_raw(cursor, tu);
                let parent = Entity::from_raw(parent, tu);
                callback.call(entity, parent) as CXChildVisitResult
            }
        }

        let mut data = (self.tu, Box::new(f) as Box<dyn EntityCallback>);
        unsafe { clang_visitChildren(self.raw, visit, mem::transmute(&mut data)) != 0 }
    }
}

impl<'tu> cmp::PartialEq for Entity<'tu> {
    fn eq(&self, other: &Entity<'tu>) -> bool {
        unsafe { clang_equalCursors(self.raw, other.raw) != 0 }
    }
}

impl<'tu> cmp::Eq for Entity<'tu> { }

impl<'tu> fmt::Debug for Entity<'tu> {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.debug_struct("Entity")
            .field("kind", &self.kind())
            .field("name", &self.get_name())
            .field("location", &self.get_location())
            .finish()
    }
}

impl<'tu> hash::Hash for Entity<'tu> {
    fn hash<H: hash::Hasher>(&self, hasher: &mut H) {
        self.hash_value().hash(hasher);
    }
}

// Unsaved _______________________________________

/// The path to and unsaved contents of a previously existing file.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Unsaved {
    path: CString,
    contents: CString,
}

impl Unsaved {
    //- Constructors -----------------------------

    /// Constructs a new `Unsaved`.
    pub fn new<P: AsRef<Path>, C: AsRef<str>>(path: P, contents: C) -> Unsaved {
        Unsaved { path: utility::from_path(path), contents: utility::from_string(contents) }
    }

    //- Accessors --------------------------------

    pub(crate) fn as_raw(&self) -> CXUnsavedFile {
        CXUnsavedFile {
            Filename: self.path.as_ptr(),
            Contents: self.contents.as_ptr(),
            Length: self.contents.as_bytes().len() as c_ulong,
        }
    }
}
