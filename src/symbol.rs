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

//! Indexed symbols and their source locations.

use std::fmt;

use source;

//================================================
// Enums
//================================================

// SymbolKind ____________________________________

/// Indicates the categorization of an indexed symbol.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    /// An enum.
    Enum,
    /// A class, struct, union, or class template.
    Class,
    /// A member function.
    Method,
    /// A free function, global or within a namespace.
    Function,
    /// A declaration statement.
    Declaration,
    /// A C++ constructor.
    Constructor,
    /// A C++ destructor.
    Destructor,
    /// A symbol of some other kind.
    Unknown,
}

impl SymbolKind {
    //- Constructors -----------------------------

    pub(crate) fn from_i8(value: i8) -> Option<SymbolKind> {
        match value {
            0 => Some(SymbolKind::Enum),
            1 => Some(SymbolKind::Class),
            2 => Some(SymbolKind::Method),
            3 => Some(SymbolKind::Function),
            4 => Some(SymbolKind::Declaration),
            5 => Some(SymbolKind::Constructor),
            6 => Some(SymbolKind::Destructor),
            7 => Some(SymbolKind::Unknown),
            _ => None,
        }
    }

    //- Accessors --------------------------------

    pub(crate) fn to_i8(self) -> i8 {
        match self {
            SymbolKind::Enum => 0,
            SymbolKind::Class => 1,
            SymbolKind::Method => 2,
            SymbolKind::Function => 3,
            SymbolKind::Declaration => 4,
            SymbolKind::Constructor => 5,
            SymbolKind::Destructor => 6,
            SymbolKind::Unknown => 7,
        }
    }
}

//================================================
// Structs
//================================================

// SourceLocation ________________________________

/// The file, line, column, and character offset of an indexed symbol.
///
/// Lines and columns are 1-based; the offset is a byte position in the file.
/// A null location has an empty file name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    file_name: String,
    line: u32,
    column: u32,
    offset: u32,
}

impl SourceLocation {
    //- Constructors -----------------------------

    /// Constructs a new `SourceLocation`.
    pub fn new<F: Into<String>>(file_name: F, line: u32, column: u32, offset: u32) -> SourceLocation {
        SourceLocation { file_name: file_name.into(), line, column, offset }
    }

    /// Constructs a null `SourceLocation`.
    pub fn null() -> SourceLocation {
        SourceLocation::default()
    }

    pub(crate) fn from_native(location: &source::Location) -> SourceLocation {
        let file_name = location.file
            .map(|f| f.get_path().to_string_lossy().into_owned())
            .unwrap_or_default();
        SourceLocation::new(file_name, location.line, location.column, location.offset)
    }

    //- Accessors --------------------------------

    /// Returns the name of the file this location points into.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Returns the 1-based line of this location.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Returns the 1-based column of this location.
    pub fn column(&self) -> u32 {
        self.column
    }

    /// Returns the byte offset of this location.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Returns whether this location points nowhere.
    pub fn is_null(&self) -> bool {
        self.file_name.is_empty()
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "{}:{}:{}", self.file_name, self.line, self.column)
    }
}

// Symbol ________________________________________

/// A symbol collected by the indexer.
///
/// Two symbols are equal iff their names, qualifications, kinds, and
/// locations all match.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Symbol {
    /// The unqualified name of this symbol.
    pub name: String,
    /// The `::`-joined chain of namespaces and record scopes enclosing this
    /// symbol, excluding the symbol's own name.
    pub qualification: String,
    /// The categorization of this symbol.
    pub kind: SymbolKind,
    /// The location of this symbol's definition.
    pub location: SourceLocation,
}

impl Symbol {
    //- Constructors -----------------------------

    /// Constructs a new `Symbol`.
    pub fn new<N: Into<String>, Q: Into<String>>(
        name: N, qualification: Q, kind: SymbolKind, location: SourceLocation
    ) -> Symbol {
        Symbol { name: name.into(), qualification: qualification.into(), kind, location }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        if self.qualification.is_empty() {
            write!(formatter, "{}", self.name)
        } else {
            write!(formatter, "{}::{}", self.qualification, self.name)
        }
    }
}
