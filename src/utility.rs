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

use std::ffi::{CStr, CString};
use std::path::{Path};

use clang_sys::*;

use libc::{c_void};

//================================================
// Macros
//================================================

// iter! _________________________________________

/// Returns an iterator over the values returned by `get_argument`.
macro_rules! iter {
    ($num:ident($($num_argument:expr), *), $get:ident($($get_argument:expr), *),) => ({
        let count = unsafe { $num($($num_argument), *) };
        (0..count).map(|i| unsafe { $get($($get_argument), *, i) })
    });
}

// options! ______________________________________

/// Defines a struct that maps bitflags to fields.
macro_rules! options {
    ($(#[$attribute:meta])* options $name:ident: $underlying:ident {
        $($(#[$fattribute:meta])* pub $option:ident: $flag:ident), +,
    }) => (
        $(#[$attribute])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        pub struct $name {
            $($(#[$fattribute])* pub $option: bool), +,
        }

        impl From<::clang_sys::$underlying> for $name {
            fn from(flags: ::clang_sys::$underlying) -> $name {
                $name { $($option: (flags & ::clang_sys::$flag) != 0), + }
            }
        }

        impl From<$name> for ::clang_sys::$underlying {
            fn from(options: $name) -> ::clang_sys::$underlying {
                let mut flags: ::clang_sys::$underlying = 0;
                $(if options.$option { flags |= ::clang_sys::$flag; })+
                flags
            }
        }
    );
}

//================================================
// Traits
//================================================

// FromError _____________________________________

/// A type that can convert a `T` into a `Result<(), Self>`.
pub trait FromError<T>: Sized where T: Sized {
    fn from_error(error: T) -> Result<(), Self>;
}

// Nullable ______________________________________

/// A type which may be null or otherwise invalid.
pub trait Nullable: Sized {
    fn map<U, F: FnOnce(Self) -> U>(self, f: F) -> Option<U>;
}

impl Nullable for *mut c_void {
    fn map<U, F: FnOnce(*mut c_void) -> U>(self, f: F) -> Option<U> {
        if !self.is_null() {
            Some(f(self))
        } else {
            None
        }
    }
}

impl Nullable for CXCursor {
    fn map<U, F: FnOnce(CXCursor) -> U>(self, f: F) -> Option<U> {
        unsafe {
            let null = clang_getNullCursor();
            if clang_equalCursors(self, null) == 0 && clang_isInvalid(self.kind) == 0 {
                Some(f(self))
            } else {
                None
            }
        }
    }
}

impl Nullable for CXSourceLocation {
    fn map<U, F: FnOnce(CXSourceLocation) -> U>(self, f: F) -> Option<U> {
        unsafe {
            if clang_equalLocations(self, clang_getNullLocation()) == 0 {
                Some(f(self))
            } else {
                None
            }
        }
    }
}

impl Nullable for CXSourceRange {
    fn map<U, F: FnOnce(CXSourceRange) -> U>(self, f: F) -> Option<U> {
        unsafe {
            if clang_Range_isNull(self) == 0 {
                Some(f(self))
            } else {
                None
            }
        }
    }
}

impl Nullable for CXString {
    fn map<U, F: FnOnce(CXString) -> U>(self, f: F) -> Option<U> {
        if !self.data.is_null() {
            Some(f(self))
        } else {
            None
        }
    }
}

//================================================
// Functions
//================================================

pub fn from_path<P: AsRef<Path>>(path: P) -> CString {
    from_string(path.as_ref().as_os_str().to_str().expect("invalid C string"))
}

pub fn from_string<S: AsRef<str>>(string: S) -> CString {
    CString::new(string.as_ref()).expect("invalid C string")
}

pub fn to_string(clang: CXString) -> String {
    unsafe {
        let c = CStr::from_ptr(clang_getCString(clang));
        let rust = c.to_str().expect("invalid Rust string").into();
        clang_disposeString(clang);
        rust
    }
}

pub fn to_string_option(clang: CXString) -> Option<String> {
    clang.map(to_string).and_then(|s| {
        if !s.is_empty() {
            Some(s)
        } else {
            None
        }
    })
}
