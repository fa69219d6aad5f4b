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

//! The native code completion surface.

use std::fmt;
use std::marker::{PhantomData};
use std::slice;

use clang_sys::*;

use libc::{c_uint};

use utility;
use super::{Availability, TranslationUnit, Unsaved};

//================================================
// Enums
//================================================

// CompletionChunk _______________________________

/// A piece of a code completion string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompletionChunk<'r> {
    /// A colon (`':'`).
    Colon,
    /// A comma (`','`).
    Comma,
    /// An equals sign (`'='`).
    Equals,
    /// A semicolon (`';'`).
    Semicolon,
    /// A left angle bracket (`'<'`).
    LeftAngleBracket,
    /// A right angle bracket (`'>'`).
    RightAngleBracket,
    /// A left brace (`'{'`).
    LeftBrace,
    /// A right brace (`'}'`).
    RightBrace,
    /// A left parenthesis (`'('`).
    LeftParenthesis,
    /// A right parenthesis (`')'`).
    RightParenthesis,
    /// A left square bracket (`'['`).
    LeftSquareBracket,
    /// A right square bracket (`']'`).
    RightSquareBracket,
    /// Horizontal space (e.g., `' '`).
    HorizontalSpace(String),
    /// Vertical space (e.g., `'\n'`).
    VerticalSpace(String),
    /// Text that describes the current parameter when code completion was run
    /// on a function call, message send, or template specialization.
    CurrentParameter(String),
    /// Informative text that should be displayed but not inserted as part of
    /// the template.
    Informative(String),
    /// Text that should be replaced by the user.
    Placeholder(String),
    /// Text that specifies the result type of the containing result.
    ResultType(String),
    /// Text that should be inserted.
    Text(String),
    /// Text that the user would be expected to type to get the containing
    /// code completion result.
    TypedText(String),
    /// An optional piece that could be part of the template but is not required.
    Optional(CompletionString<'r>),
}

impl<'r> CompletionChunk<'r> {
    //- Accessors --------------------------------

    /// Returns the text associated with this completion chunk if this chunk is not optional.
    pub fn get_text(&self) -> Option<String> {
        match *self {
            CompletionChunk::Colon => Some(":".into()),
            CompletionChunk::Comma => Some(",".into()),
            CompletionChunk::Equals => Some("=".into()),
            CompletionChunk::Semicolon => Some(";".into()),
            CompletionChunk::LeftAngleBracket => Some("<".into()),
            CompletionChunk::RightAngleBracket => Some(">".into()),
            CompletionChunk::LeftBrace => Some("{".into()),
            CompletionChunk::RightBrace => Some("}".into()),
            CompletionChunk::LeftParenthesis => Some("(".into()),
            CompletionChunk::RightParenthesis => Some(")".into()),
            CompletionChunk::LeftSquareBracket => Some("[".into()),
            CompletionChunk::RightSquareBracket => Some("]".into()),
            CompletionChunk::CurrentParameter(ref text) |
            CompletionChunk::Informative(ref text) |
            CompletionChunk::Placeholder(ref text) |
            CompletionChunk::ResultType(ref text) |
            CompletionChunk::TypedText(ref text) |
            CompletionChunk::Text(ref text) |
            CompletionChunk::HorizontalSpace(ref text) |
            CompletionChunk::VerticalSpace(ref text) => Some(text.clone()),
            CompletionChunk::Optional(_) => None,
        }
    }

    /// Returns whether this completion chunk is optional.
    pub fn is_optional(&self) -> bool {
        matches!(*self, CompletionChunk::Optional(_))
    }
}

//================================================
// Structs
//================================================

// CompletionResult ______________________________

/// A code completion result.
#[derive(Copy, Clone, Debug)]
pub struct CompletionResult<'r> {
    pub(crate) cursor_kind: CXCursorKind,
    /// The completion string for this code completion result.
    pub string: CompletionString<'r>,
}

// CompletionResults _____________________________

/// A set of code completion results.
///
/// Owns the underlying buffer, which is released exactly once when this set
/// is dropped.
pub struct CompletionResults {
    ptr: *mut CXCodeCompleteResults,
}

impl CompletionResults {
    //- Constructors -----------------------------

    fn from_ptr(ptr: *mut CXCodeCompleteResults) -> CompletionResults {
        assert!(!ptr.is_null());
        CompletionResults { ptr }
    }

    //- Accessors --------------------------------

    /// Returns the code completion results in this set.
    pub fn get_results(&self) -> Vec<CompletionResult> {
        unsafe {
            let raws = slice::from_raw_parts((*self.ptr).Results, (*self.ptr).NumResults as usize);
            raws.iter().map(|r| CompletionResult {
                cursor_kind: r.CursorKind,
                string: CompletionString::from_ptr(r.CompletionString),
            }).collect()
        }
    }
}

impl Drop for CompletionResults {
    fn drop(&mut self) {
        unsafe { clang_disposeCodeCompleteResults(self.ptr); }
    }
}

impl fmt::Debug for CompletionResults {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.debug_struct("CompletionResults")
            .field("results", &self.get_results())
            .finish()
    }
}

// CompletionString ______________________________

/// A semantic string that describes a code completion result.
#[derive(Copy, Clone)]
pub struct CompletionString<'r> {
    ptr: CXCompletionString,
    _marker: PhantomData<&'r CompletionResults>,
}

impl<'r> CompletionString<'r> {
    //- Constructors -----------------------------

    fn from_ptr(ptr: CXCompletionString) -> CompletionString<'r> {
        assert!(!ptr.is_null());
        CompletionString { ptr, _marker: PhantomData }
    }

    //- Accessors --------------------------------

    /// Returns an integer that represents how likely a user is to select this
    /// completion string as determined by internal heuristics. Smaller values
    /// indicate higher priorities.
    pub fn get_priority(&self) -> u32 {
        unsafe { clang_getCompletionPriority(self.ptr) as u32 }
    }

    /// Returns the availability of this completion string.
    pub fn get_availability(&self) -> Availability {
        Availability::from_raw(unsafe { clang_getCompletionAvailability(self.ptr) })
    }

    /// Returns the text of the typed text chunk for this completion string, if any.
    pub fn get_typed_text(&self) -> Option<String> {
        for chunk in self.get_chunks() {
            if let CompletionChunk::TypedText(text) = chunk {
                return Some(text);
            }
        }
        None
    }

    /// Returns the chunks of this completion string.
    pub fn get_chunks(&self) -> Vec<CompletionChunk> {
        iter!(
            clang_getNumCompletionChunks(self.ptr),
            clang_getCompletionChunkKind(self.ptr),
        ).enumerate().map(|(i, k)| {
            macro_rules! text {
                ($variant:ident) => ({
                    let text = unsafe { clang_getCompletionChunkText(self.ptr, i as c_uint) };
                    CompletionChunk::$variant(utility::to_string(text))
                });
            }

            match k {
                CXCompletionChunk_Colon => CompletionChunk::Colon,
                CXCompletionChunk_Comma => CompletionChunk::Comma,
                CXCompletionChunk_Equal => CompletionChunk::Equals,
                CXCompletionChunk_SemiColon => CompletionChunk::Semicolon,
                CXCompletionChunk_LeftAngle => CompletionChunk::LeftAngleBracket,
                CXCompletionChunk_RightAngle => CompletionChunk::RightAngleBracket,
                CXCompletionChunk_LeftBrace => CompletionChunk::LeftBrace,
                CXCompletionChunk_RightBrace => CompletionChunk::RightBrace,
                CXCompletionChunk_LeftParen => CompletionChunk::LeftParenthesis,
                CXCompletionChunk_RightParen => CompletionChunk::RightParenthesis,
                CXCompletionChunk_LeftBracket => CompletionChunk::LeftSquareBracket,
                CXCompletionChunk_RightBracket => CompletionChunk::RightSquareBracket,
                CXCompletionChunk_HorizontalSpace => text!(HorizontalSpace),
                CXCompletionChunk_VerticalSpace => text!(VerticalSpace),
                CXCompletionChunk_CurrentParameter => text!(CurrentParameter),
                CXCompletionChunk_TypedText => text!(TypedText),
                CXCompletionChunk_Text => text!(Text),
                CXCompletionChunk_Placeholder => text!(Placeholder),
                CXCompletionChunk_Informative => text!(Informative),
                CXCompletionChunk_ResultType => text!(ResultType),
                CXCompletionChunk_Optional => {
                    let i = i as c_uint;
                    let ptr = unsafe { clang_getCompletionChunkCompletionString(self.ptr, i) };
                    CompletionChunk::Optional(CompletionString::from_ptr(ptr))
                },
                _ => {
                    let text = unsafe { clang_getCompletionChunkText(self.ptr, i as c_uint) };
                    CompletionChunk::Text(utility::to_string(text))
                },
            }
        }).collect()
    }
}

impl<'r> fmt::Debug for CompletionString<'r> {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.debug_struct("CompletionString")
            .field("chunks", &self.get_chunks())
            .finish()
    }
}

impl<'r> PartialEq for CompletionString<'r> {
    fn eq(&self, other: &CompletionString<'r>) -> bool {
        self.get_chunks() == other.get_chunks()
    }
}

impl<'r> Eq for CompletionString<'r> { }

//================================================
// Functions
//================================================

/// Runs code completion at the supplied location, if possible.
pub fn complete_at(
    tu: &TranslationUnit,
    file: &str,
    line: u32,
    column: u32,
    unsaved: &[Unsaved],
) -> Option<CompletionResults> {
    let unsaved = unsaved.iter().map(|u| u.as_raw()).collect::<Vec<_>>();

    unsafe {
        let ptr = clang_codeCompleteAt(
            tu.ptr,
            utility::from_path(file).as_ptr(),
            line as c_uint,
            column as c_uint,
            unsaved.as_ptr() as *mut CXUnsavedFile,
            unsaved.len() as c_uint,
            clang_defaultCodeCompleteOptions(),
        );

        if !ptr.is_null() {
            Some(CompletionResults::from_ptr(ptr))
        } else {
            None
        }
    }
}
