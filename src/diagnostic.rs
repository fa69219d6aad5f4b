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

//! Issues with source files.

use std::cmp;
use std::fmt;

use clang_sys::*;

use utility;
use super::{TranslationUnit};
use source::{SourceLocation, SourceRange};

//================================================
// Enums
//================================================

// Severity ______________________________________

/// Indicates the severity of a diagnostic.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// The diagnostic has been suppressed (e.g., by a command-line option).
    Ignored,
    /// The diagnostic is attached to the previous non-note diagnostic.
    Note,
    /// The diagnostic targets suspicious code that may or may not be wrong.
    Warning,
    /// The diagnostic targets ill-formed code.
    Error,
    /// The diagnostic targets code that is ill-formed in such a way that parser recovery is
    /// unlikely to produce any useful results.
    Fatal,
}

impl Severity {
    //- Constructors -----------------------------

    pub(crate) fn from_raw(raw: CXDiagnosticSeverity) -> Severity {
        match raw {
            CXDiagnostic_Note => Severity::Note,
            CXDiagnostic_Warning => Severity::Warning,
            CXDiagnostic_Error => Severity::Error,
            CXDiagnostic_Fatal => Severity::Fatal,
            _ => Severity::Ignored,
        }
    }
}

//================================================
// Structs
//================================================

// Diagnostic ____________________________________

/// A message from the compiler about an issue with a source file.
///
/// Owns the underlying diagnostic, which is released exactly once when this
/// value is dropped.
pub struct Diagnostic<'tu> {
    ptr: CXDiagnostic,
    tu: &'tu TranslationUnit,
}

impl<'tu> Diagnostic<'tu> {
    //- Constructors -----------------------------

    pub(crate) fn from_ptr(ptr: CXDiagnostic, tu: &'tu TranslationUnit) -> Diagnostic<'tu> {
        assert!(!ptr.is_null());
        Diagnostic { ptr, tu }
    }

    //- Accessors --------------------------------

    /// Returns the severity of this diagnostic.
    pub fn get_severity(&self) -> Severity {
        Severity::from_raw(unsafe { clang_getDiagnosticSeverity(self.ptr) })
    }

    /// Returns the text of this diagnostic.
    pub fn get_text(&self) -> String {
        unsafe { utility::to_string(clang_getDiagnosticSpelling(self.ptr)) }
    }

    /// Returns the source location of this diagnostic.
    pub fn get_location(&self) -> SourceLocation<'tu> {
        unsafe { SourceLocation::from_raw(clang_getDiagnosticLocation(self.ptr), self.tu) }
    }

    /// Returns the source ranges of this diagnostic.
    pub fn get_ranges(&self) -> Vec<SourceRange<'tu>> {
        iter!(
            clang_getDiagnosticNumRanges(self.ptr),
            clang_getDiagnosticRange(self.ptr),
        ).map(|r| SourceRange::from_raw(r, self.tu)).collect()
    }

    /// Returns the child diagnostics of this diagnostic.
    pub fn get_children(&self) -> Vec<Diagnostic<'tu>> {
        let ptr = unsafe { clang_getChildDiagnostics(self.ptr) };
        iter!(
            clang_getNumDiagnosticsInSet(ptr),
            clang_getDiagnosticInSet(ptr),
        ).map(|d| Diagnostic::from_ptr(d, self.tu)).collect()
    }
}

impl<'tu> Drop for Diagnostic<'tu> {
    fn drop(&mut self) {
        unsafe { clang_disposeDiagnostic(self.ptr); }
    }
}

/// Orders by severity.
impl<'tu> cmp::PartialOrd for Diagnostic<'tu> {
    fn partial_cmp(&self, other: &Diagnostic<'tu>) -> Option<cmp::Ordering> {
        Some(self.get_severity().cmp(&other.get_severity()))
    }
}

impl<'tu> cmp::PartialEq for Diagnostic<'tu> {
    fn eq(&self, other: &Diagnostic<'tu>) -> bool {
        self.ptr == other.ptr
    }
}

impl<'tu> fmt::Debug for Diagnostic<'tu> {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.debug_struct("Diagnostic")
            .field("location", &self.get_location())
            .field("severity", &self.get_severity())
            .field("text", &self.get_text())
            .finish()
    }
}
