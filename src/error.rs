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

//! Error types.

use std::error::{Error};
use std::fmt;

use clang_sys::*;

use thiserror::{Error as ThisError};

use utility::{FromError};

//================================================
// Macros
//================================================

macro_rules! error {
    (
        $(#[$meta:meta])*
        pub enum $name:ident: $underlying:ty {
            $(#[$variantdoc:meta] $variant:ident = ($error:pat, $message:expr)), +,
        }
    ) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        pub enum $name {
            $(#[$variantdoc] $variant), +
        }

        impl Error for $name { }

        impl From<$name> for String {
            fn from(error: $name) -> String {
                error.to_string()
            }
        }

        impl FromError<$underlying> for $name {
            fn from_error(error: $underlying) -> Result<(), $name> {
                match error {
                    $($error => Err($name::$variant)), +,
                    _ => Ok(()),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                match *self {
                    $($name::$variant => write!(f, $message)), +
                }
            }
        }
    };
}

//================================================
// Enums
//================================================

// SaveError _____________________________________

error! {
    /// Indicates the type of error that prevented the saving of a translation unit to an AST file.
    pub enum SaveError: CXSaveError {
        /// Errors in the translation unit prevented saving.
        Errors = (CXSaveError_InvalidTU, "errors in the translation unit prevented saving"),
        /// An unknown error occurred.
        Unknown = (CXSaveError_Unknown, "an unknown error occurred"),
    }
}

// SourceError ___________________________________

error! {
    /// Indicates the type of error that prevented the loading of a translation unit from a source
    /// file.
    pub enum SourceError: CXErrorCode {
        /// An error occurred while deserializing an AST file.
        AstDeserialization = (CXError_ASTReadError, "AST deserialization failed"),
        /// `libclang` crashed.
        Crash = (CXError_Crashed, "`libclang` crashed"),
        /// An unknown error occurred.
        Unknown = (CXError_Failure, "an unknown error occurred"),
    }
}

// UnitError _____________________________________

/// The error type for operations on a `Unit`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ThisError)]
pub enum UnitError {
    /// An operation requiring a loaded translation unit was invoked on an
    /// unloaded one.
    #[error("no translation unit handle is loaded")]
    NoHandle,
    /// Parsing or reparsing failed.
    #[error("parsing failed: {0}")]
    Parse(#[from] SourceError),
    /// Saving the translation unit failed.
    #[error("saving failed: {0}")]
    Save(#[from] SaveError),
}
