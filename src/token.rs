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

//! Lexed pieces of source files.

use std::fmt;

use clang_sys::*;

use libc::{c_uint};

use utility;
use super::{TranslationUnit};
use source::{SourceLocation, SourceRange};

//================================================
// Enums
//================================================

// TokenKind _____________________________________

/// Indicates the categorization of a token.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// A comment token.
    Comment,
    /// An identifier token.
    Identifier,
    /// A keyword token.
    Keyword,
    /// A literal token.
    Literal,
    /// A punctuation token.
    Punctuation,
}

//================================================
// Structs
//================================================

// Token _________________________________________

/// A lexed piece of a source file.
#[derive(Copy, Clone)]
pub struct Token<'tu> {
    pub(crate) raw: CXToken,
    tu: &'tu TranslationUnit,
}

impl<'tu> Token<'tu> {
    //- Constructors -----------------------------

    fn from_raw(raw: CXToken, tu: &'tu TranslationUnit) -> Token<'tu> {
        Token { raw, tu }
    }

    //- Accessors --------------------------------

    /// Returns the categorization of this token.
    pub fn get_kind(&self) -> TokenKind {
        match unsafe { clang_getTokenKind(self.raw) } {
            CXToken_Comment => TokenKind::Comment,
            CXToken_Identifier => TokenKind::Identifier,
            CXToken_Keyword => TokenKind::Keyword,
            CXToken_Literal => TokenKind::Literal,
            _ => TokenKind::Punctuation,
        }
    }

    /// Returns the textual representation of this token.
    pub fn get_spelling(&self) -> String {
        unsafe { utility::to_string(clang_getTokenSpelling(self.tu.ptr, self.raw)) }
    }

    /// Returns the source location of this token.
    pub fn get_location(&self) -> SourceLocation<'tu> {
        unsafe { SourceLocation::from_raw(clang_getTokenLocation(self.tu.ptr, self.raw), self.tu) }
    }

    /// Returns the source range of this token.
    pub fn get_range(&self) -> SourceRange<'tu> {
        unsafe { SourceRange::from_raw(clang_getTokenExtent(self.tu.ptr, self.raw), self.tu) }
    }
}

impl<'tu> fmt::Debug for Token<'tu> {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.debug_struct("Token")
            .field("kind", &self.get_kind())
            .field("spelling", &self.get_spelling())
            .field("range", &self.get_range())
            .finish()
    }
}

// TokenSet ______________________________________

/// The tokens lexed from a source range.
///
/// Owns the underlying token buffer, which is released exactly once when this
/// set is dropped.
pub struct TokenSet<'tu> {
    ptr: *mut CXToken,
    count: c_uint,
    tu: &'tu TranslationUnit,
}

impl<'tu> TokenSet<'tu> {
    //- Constructors -----------------------------

    pub(crate) fn from_raw(ptr: *mut CXToken, count: c_uint, tu: &'tu TranslationUnit) -> TokenSet<'tu> {
        TokenSet { ptr, count, tu }
    }

    //- Accessors --------------------------------

    /// Returns the number of tokens in this set.
    pub fn len(&self) -> usize {
        self.count as usize
    }

    /// Returns whether this set contains no tokens.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns the token at the supplied index.
    ///
    /// # Panics
    ///
    /// * `index` is out of bounds
    pub fn get(&self, index: usize) -> Token<'tu> {
        assert!(index < self.len());
        unsafe { Token::from_raw(*self.ptr.add(index), self.tu) }
    }

    /// Returns an iterator over the tokens in this set.
    pub fn iter<'s>(&'s self) -> impl Iterator<Item=Token<'tu>> + 's {
        (0..self.len()).map(move |i| self.get(i))
    }
}

impl<'tu> Drop for TokenSet<'tu> {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe { clang_disposeTokens(self.tu.ptr, self.ptr, self.count); }
        }
    }
}

impl<'tu> fmt::Debug for TokenSet<'tu> {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.debug_list().entries(self.iter()).finish()
    }
}
