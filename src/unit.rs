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

//! Shared translation unit management.
//!
//! A `Unit` is a value type whose backing state is shared between clones.
//! It owns the configuration a translation unit is parsed from (file name,
//! compiler options, precompiled header, unsaved file overlay, management
//! flags) together with the parse handle itself.
//!
//! The parse handle is not thread-safe, so every operation goes through the
//! unit's own reentrant lock. The lock being reentrant is what allows
//! visitation callbacks to call back into the unit without deadlocking.

use std::cell::{RefCell};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc};
use std::time::{SystemTime};

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

use error::{UnitError};
use super::{Index, ParseOptions, TranslationUnit, Unsaved};

//================================================
// Structs
//================================================

// PchInfo _______________________________________

/// An opaque reference to a precompiled header produced externally.
///
/// An empty `PchInfo` means "no precompiled header"; otherwise it carries the
/// path of an artifact this crate never mutates.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct PchInfo {
    path: Option<PathBuf>,
}

impl PchInfo {
    //- Constructors -----------------------------

    /// Constructs a `PchInfo` that refers to no precompiled header.
    pub fn empty() -> PchInfo {
        PchInfo::default()
    }

    /// Constructs a `PchInfo` that refers to the precompiled header at the
    /// supplied path.
    pub fn with_path<P: Into<PathBuf>>(path: P) -> PchInfo {
        PchInfo { path: Some(path.into()) }
    }

    //- Accessors --------------------------------

    /// Returns the path to the precompiled header, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_ref().map(|p| p.as_path())
    }

    /// Returns whether this `PchInfo` refers to no precompiled header.
    pub fn is_empty(&self) -> bool {
        self.path.is_none()
    }
}

// UnitData ______________________________________

struct UnitData {
    file_name: String,
    compile_options: Vec<String>,
    pch: PchInfo,
    unsaved: Vec<Unsaved>,
    management_flags: ParseOptions,
    tu: Option<TranslationUnit>,
    time_stamp: SystemTime,
}

impl UnitData {
    fn new(file_name: String) -> UnitData {
        UnitData {
            file_name,
            compile_options: vec![],
            pch: PchInfo::empty(),
            unsaved: vec![],
            management_flags: ParseOptions::default(),
            tu: None,
            time_stamp: SystemTime::UNIX_EPOCH,
        }
    }

    fn arguments(&self) -> Vec<String> {
        let mut arguments = self.compile_options.clone();
        if let Some(path) = self.pch.path() {
            arguments.push("-include-pch".into());
            arguments.push(path.to_string_lossy().into_owned());
        }
        arguments
    }
}

// UnitState _____________________________________

struct UnitState(ReentrantMutex<RefCell<UnitData>>);

// The parse handle is only reachable through the reentrant lock, which
// serializes every native call on this unit.
unsafe impl Send for UnitState { }
unsafe impl Sync for UnitState { }

// Unit __________________________________________

/// A translation unit with shared backing state.
///
/// Clones share the same state; `make_unique` detaches a clone onto fresh
/// backing state.
#[derive(Clone)]
pub struct Unit {
    state: Arc<UnitState>,
}

/// Keeps a unit's lock held across a sequence of operations.
///
/// The lock is reentrant, so the unit's own operations remain callable while
/// a `UnitLock` is alive.
pub struct UnitLock<'u> {
    _guard: ReentrantMutexGuard<'u, RefCell<UnitData>>,
}

impl Unit {
    //- Constructors -----------------------------

    /// Constructs an empty `Unit` with no file name.
    pub fn new() -> Unit {
        Unit::with_file_name(String::new())
    }

    /// Constructs an empty `Unit` for the supplied file.
    pub fn with_file_name<F: Into<String>>(file_name: F) -> Unit {
        let data = UnitData::new(file_name.into());
        Unit { state: Arc::new(UnitState(ReentrantMutex::new(RefCell::new(data)))) }
    }

    //- Accessors --------------------------------

    /// Returns the name of the file this unit is configured for.
    pub fn file_name(&self) -> String {
        let guard = self.state.0.lock();
        let borrowed = guard.borrow();
        borrowed.file_name.clone()
    }

    /// Returns the compiler options this unit is configured with.
    pub fn compile_options(&self) -> Vec<String> {
        let guard = self.state.0.lock();
        let borrowed = guard.borrow();
        borrowed.compile_options.clone()
    }

    /// Returns the precompiled header this unit is configured with.
    pub fn pch(&self) -> PchInfo {
        let guard = self.state.0.lock();
        let borrowed = guard.borrow();
        borrowed.pch.clone()
    }

    /// Returns the management flags this unit is configured with.
    pub fn management_flags(&self) -> ParseOptions {
        let guard = self.state.0.lock();
        let borrowed = guard.borrow();
        borrowed.management_flags
    }

    /// Returns the wall-clock moment of the last successful parse.
    pub fn time_stamp(&self) -> SystemTime {
        let guard = self.state.0.lock();
        let borrowed = guard.borrow();
        borrowed.time_stamp
    }

    /// Returns whether a parse handle is present.
    pub fn is_loaded(&self) -> bool {
        let guard = self.state.0.lock();
        let borrowed = guard.borrow();
        borrowed.tu.is_some()
    }

    /// Returns whether this unit is the sole holder of its backing state.
    pub fn is_unique(&self) -> bool {
        Arc::strong_count(&self.state) == 1
    }

    /// Acquires this unit's lock for a sequence of operations.
    pub fn lock(&self) -> UnitLock {
        UnitLock { _guard: self.state.0.lock() }
    }

    /// Supplies the translation unit backing this unit to the callback, if
    /// one is loaded.
    ///
    /// The unit's lock is held for the duration of the call. The callback
    /// must not parse or invalidate this unit.
    pub fn with_translation_unit<T, F: FnOnce(&TranslationUnit) -> T>(&self, f: F) -> Option<T> {
        let guard = self.state.0.lock();
        let borrowed = guard.borrow();
        borrowed.tu.as_ref().map(f)
    }

    //- Mutators ---------------------------------

    /// Sets the file this unit is configured for, invalidating the parse
    /// handle when the file changes.
    pub fn set_file_name<F: Into<String>>(&self, file_name: F) {
        let file_name = file_name.into();
        let guard = self.state.0.lock();
        let mut borrowed = guard.borrow_mut();
        if borrowed.file_name != file_name {
            borrowed.file_name = file_name;
            borrowed.tu = None;
        }
    }

    /// Sets the compiler options this unit is configured with, invalidating
    /// the parse handle when the options change.
    pub fn set_compile_options(&self, compile_options: Vec<String>) {
        let guard = self.state.0.lock();
        let mut borrowed = guard.borrow_mut();
        if borrowed.compile_options != compile_options {
            borrowed.compile_options = compile_options;
            borrowed.tu = None;
        }
    }

    /// Sets the precompiled header this unit parses against.
    ///
    /// Takes effect on the next parse.
    pub fn set_pch(&self, pch: PchInfo) {
        let guard = self.state.0.lock();
        let mut borrowed = guard.borrow_mut();
        borrowed.pch = pch;
    }

    /// Sets the unsaved file overlay supplied to parses and reparses.
    pub fn set_unsaved(&self, unsaved: Vec<Unsaved>) {
        let guard = self.state.0.lock();
        let mut borrowed = guard.borrow_mut();
        borrowed.unsaved = unsaved;
    }

    /// Sets the management flags translation units are parsed with.
    ///
    /// Takes effect on the next parse.
    pub fn set_management_flags(&self, management_flags: ParseOptions) {
        let guard = self.state.0.lock();
        let mut borrowed = guard.borrow_mut();
        borrowed.management_flags = management_flags;
    }

    /// Parses the configured file, materializing a fresh parse handle.
    ///
    /// Any existing handle is released first. On success the unit's time
    /// stamp is updated to the current wall-clock time.
    pub fn parse(&self) -> Result<(), UnitError> {
        let guard = self.state.0.lock();
        let mut borrowed = guard.borrow_mut();

        borrowed.tu = None;
        if borrowed.file_name.is_empty() {
            return Err(UnitError::NoHandle);
        }

        let index = Index::new(true, false);
        let arguments = borrowed.arguments();
        let tu = TranslationUnit::from_source(
            index,
            &borrowed.file_name,
            &arguments,
            &borrowed.unsaved,
            borrowed.management_flags,
        ).map_err(|error| {
            debug!("parsing {} failed: {}", borrowed.file_name, error);
            error
        })?;

        borrowed.tu = Some(tu);
        borrowed.time_stamp = SystemTime::now();
        Ok(())
    }

    /// Reparses the configured file with the current unsaved file overlay.
    ///
    /// Requires a parse handle. When the underlying operation fails the
    /// handle is invalidated so the next call parses from scratch.
    pub fn reparse(&self) -> Result<(), UnitError> {
        let guard = self.state.0.lock();
        let mut borrowed = guard.borrow_mut();

        let unsaved = borrowed.unsaved.clone();
        let result = match borrowed.tu {
            Some(ref mut tu) => tu.reparse(&unsaved),
            None => return Err(UnitError::NoHandle),
        };

        if let Err(error) = result {
            debug!("reparsing {} failed: {}", borrowed.file_name, error);
            borrowed.tu = None;
            return Err(error.into());
        }

        borrowed.time_stamp = SystemTime::now();
        Ok(())
    }

    /// Saves the loaded translation unit to an AST file at the supplied path.
    ///
    /// # Failures
    ///
    /// * no parse handle is loaded
    /// * errors in the translation unit prevented saving
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), UnitError> {
        let guard = self.state.0.lock();
        let borrowed = guard.borrow();

        match borrowed.tu {
            Some(ref tu) => tu.save(path).map_err(|e| e.into()),
            None => Err(UnitError::NoHandle),
        }
    }

    /// Releases the parse handle while preserving the configuration.
    pub fn invalidate(&self) {
        let guard = self.state.0.lock();
        let mut borrowed = guard.borrow_mut();
        borrowed.tu = None;
    }

    /// Ensures this unit is the sole holder of its backing state.
    ///
    /// When the state is shared, this unit is detached onto a copy of the
    /// configuration; the parse handle cannot be duplicated and stays with
    /// the previous state, so the detached copy starts unloaded. When this
    /// unit is already the sole holder, nothing changes.
    pub fn make_unique(&mut self) {
        if self.is_unique() {
            return;
        }

        let detached = {
            let guard = self.state.0.lock();
            let borrowed = guard.borrow();
            UnitData {
                file_name: borrowed.file_name.clone(),
                compile_options: borrowed.compile_options.clone(),
                pch: borrowed.pch.clone(),
                unsaved: borrowed.unsaved.clone(),
                management_flags: borrowed.management_flags,
                tu: None,
                time_stamp: borrowed.time_stamp,
            }
        };

        self.state = Arc::new(UnitState(ReentrantMutex::new(RefCell::new(detached))));
    }
}

impl Default for Unit {
    fn default() -> Unit {
        Unit::new()
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.debug_struct("Unit")
            .field("file_name", &self.file_name())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
