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

//! The persistent symbol database.
//!
//! Symbols live in a stable-keyed arena; removal of any symbol never
//! invalidates the keys of the others. A nested index maps file name, kind,
//! and unqualified name to the arena keys, and a per-file table tracks the
//! wall-clock moment of the most recent insertion so restored databases can
//! be checked for staleness against on-disk modification times.
//!
//! The serialized form is versioned and fixed little-endian; unknown magic
//! numbers or versions are ignored so a stale cache never poisons a fresh
//! session.

use std::collections::{HashMap};
use std::fs;
use std::io::{Cursor, Read};
use std::time::{SystemTime, UNIX_EPOCH};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use slab::{Slab};

use symbol::{SourceLocation, Symbol, SymbolKind};

const MAGIC: u32 = 0x0A0B_FFEE;
const VERSION: u16 = 1;

/// Converts a wall-clock moment into milliseconds since the Unix epoch.
pub fn unix_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_millis() as i64,
        Err(_) => 0,
    }
}

//================================================
// Structs
//================================================

// SymbolDatabase ________________________________

type NameIndex = HashMap<String, Vec<usize>>;
type KindIndex = HashMap<SymbolKind, NameIndex>;

/// An append-only store of symbols with composite indices and per-file
/// modification time stamps.
pub struct SymbolDatabase {
    symbols: Slab<Symbol>,
    by_file: HashMap<String, KindIndex>,
    time_stamps: HashMap<String, i64>,
}

impl SymbolDatabase {
    //- Constructors -----------------------------

    /// Constructs a new, empty `SymbolDatabase`.
    pub fn new() -> SymbolDatabase {
        SymbolDatabase {
            symbols: Slab::new(),
            by_file: HashMap::new(),
            time_stamps: HashMap::new(),
        }
    }

    //- Accessors --------------------------------

    /// Returns all symbols found in the supplied file, in insertion order.
    pub fn symbols(&self, file_name: &str) -> Vec<Symbol> {
        let mut keys = vec![];
        if let Some(kinds) = self.by_file.get(file_name) {
            for names in kinds.values() {
                for entries in names.values() {
                    keys.extend_from_slice(entries);
                }
            }
        }
        self.resolve(keys)
    }

    /// Returns the symbols of the supplied kind found in the supplied file,
    /// in insertion order.
    pub fn symbols_of_kind(&self, file_name: &str, kind: SymbolKind) -> Vec<Symbol> {
        let mut keys = vec![];
        if let Some(names) = self.by_file.get(file_name).and_then(|kinds| kinds.get(&kind)) {
            for entries in names.values() {
                keys.extend_from_slice(entries);
            }
        }
        self.resolve(keys)
    }

    /// Returns the symbols with the supplied unqualified name, kind, and
    /// file, in insertion order.
    pub fn symbols_named(&self, file_name: &str, kind: SymbolKind, name: &str) -> Vec<Symbol> {
        let keys = self.by_file.get(file_name)
            .and_then(|kinds| kinds.get(&kind))
            .and_then(|names| names.get(name))
            .cloned()
            .unwrap_or_default();
        self.resolve(keys)
    }

    /// Returns all symbols of the supplied kind, ordered by file and then by
    /// insertion.
    pub fn symbols_by_kind(&self, kind: SymbolKind) -> Vec<Symbol> {
        let mut files = self.by_file.keys().cloned().collect::<Vec<_>>();
        files.sort();
        files.iter().flat_map(|f| self.symbols_of_kind(f, kind)).collect()
    }

    /// Returns all symbols, ordered by file and then by insertion.
    pub fn all_symbols(&self) -> Vec<Symbol> {
        let mut files = self.files();
        files.sort();
        files.iter().flat_map(|f| self.symbols(f)).collect()
    }

    /// Returns the files known to this database, including files that were
    /// processed without producing any symbols.
    pub fn files(&self) -> Vec<String> {
        self.time_stamps.keys().cloned().collect()
    }

    /// Returns whether the supplied file is known to this database.
    pub fn contains_file(&self, file_name: &str) -> bool {
        self.time_stamps.contains_key(file_name)
    }

    /// Returns whether this database knows no files.
    pub fn is_empty(&self) -> bool {
        self.time_stamps.is_empty()
    }

    /// Returns whether the symbols tracked for the supplied file are still
    /// current.
    ///
    /// True iff a time stamp is tracked for the file and it is not older
    /// than the file's on-disk modification time.
    pub fn validate(&self, file_name: &str) -> bool {
        let tracked = match self.time_stamps.get(file_name) {
            Some(&millis) => millis,
            None => return false,
        };

        let modified = fs::metadata(file_name)
            .and_then(|m| m.modified())
            .map(unix_millis);

        match modified {
            Ok(millis) => millis <= tracked,
            Err(_) => false,
        }
    }

    /// Serializes this database into its versioned binary form.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buffer = vec![];

        // The write target is a Vec, so none of these can fail.
        let _ = buffer.write_u32::<LittleEndian>(MAGIC);
        let _ = buffer.write_u16::<LittleEndian>(VERSION);

        let symbols = self.all_symbols();
        let _ = buffer.write_u32::<LittleEndian>(symbols.len() as u32);
        for symbol in &symbols {
            write_string(&mut buffer, &symbol.name);
            write_string(&mut buffer, &symbol.qualification);
            write_string(&mut buffer, symbol.location.file_name());
            let _ = buffer.write_u32::<LittleEndian>(symbol.location.line());
            let _ = buffer.write_u16::<LittleEndian>(symbol.location.column() as u16);
            let _ = buffer.write_u32::<LittleEndian>(symbol.location.offset());
            let _ = buffer.write_i8(symbol.kind.to_i8());
        }

        let mut files = self.files();
        files.sort();
        let _ = buffer.write_u32::<LittleEndian>(files.len() as u32);
        for file in &files {
            write_string(&mut buffer, file);
            let _ = buffer.write_i64::<LittleEndian>(self.time_stamps[file]);
        }

        buffer
    }

    //- Mutators ---------------------------------

    /// Inserts a symbol, tracking the supplied time stamp as the most recent
    /// for the symbol's file.
    ///
    /// When a symbol with the same file, kind, unqualified name, and
    /// qualification already exists, its location is updated in place.
    pub fn insert_symbol(&mut self, symbol: Symbol, millis: i64) {
        self.time_stamps.insert(symbol.location.file_name().into(), millis);
        self.insert_indexed(symbol);
    }

    /// Registers a file even when no symbols were extracted from it, so
    /// staleness tracking covers it.
    pub fn insert_file<F: Into<String>>(&mut self, file_name: F, millis: i64) {
        self.time_stamps.insert(file_name.into(), millis);
    }

    /// Removes the supplied file, its time stamp, and all of its symbols.
    pub fn remove_file(&mut self, file_name: &str) {
        if let Some(kinds) = self.by_file.remove(file_name) {
            for names in kinds.values() {
                for entries in names.values() {
                    for &key in entries {
                        self.symbols.remove(key);
                    }
                }
            }
        }
        self.time_stamps.remove(file_name);
    }

    /// Removes the supplied files, their time stamps, and all of their symbols.
    pub fn remove_files(&mut self, file_names: &[String]) {
        for file_name in file_names {
            self.remove_file(file_name);
        }
    }

    /// Removes every symbol, file, and time stamp.
    pub fn clear(&mut self) {
        self.symbols.clear();
        self.by_file.clear();
        self.time_stamps.clear();
    }

    /// Restores this database from its versioned binary form.
    ///
    /// Data with an unknown magic number or version, or that is otherwise
    /// malformed, leaves this database unchanged. Indices are rebuilt by
    /// re-inserting every restored symbol through the insertion path.
    pub fn deserialize(&mut self, data: &[u8]) {
        let (symbols, time_stamps) = match parse(data) {
            Some(parsed) => parsed,
            None => return,
        };

        self.clear();
        for symbol in symbols {
            self.insert_indexed(symbol);
        }
        self.time_stamps = time_stamps;
    }

    //- Implementation ---------------------------

    fn resolve(&self, mut keys: Vec<usize>) -> Vec<Symbol> {
        keys.sort();
        keys.iter().filter_map(|&k| self.symbols.get(k).cloned()).collect()
    }

    fn insert_indexed(&mut self, symbol: Symbol) {
        let entries = self.by_file
            .entry(symbol.location.file_name().to_string())
            .or_insert_with(HashMap::new)
            .entry(symbol.kind)
            .or_insert_with(HashMap::new)
            .entry(symbol.name.clone())
            .or_insert_with(Vec::new);

        for &key in entries.iter() {
            if let Some(existing) = self.symbols.get_mut(key) {
                if existing.qualification == symbol.qualification {
                    existing.location = symbol.location;
                    return;
                }
            }
        }

        entries.push(self.symbols.insert(symbol));
    }
}

impl Default for SymbolDatabase {
    fn default() -> SymbolDatabase {
        SymbolDatabase::new()
    }
}

//================================================
// Functions
//================================================

fn write_string(buffer: &mut Vec<u8>, string: &str) {
    let _ = buffer.write_u32::<LittleEndian>(string.len() as u32);
    buffer.extend_from_slice(string.as_bytes());
}

fn read_string(cursor: &mut Cursor<&[u8]>) -> Option<String> {
    let length = cursor.read_u32::<LittleEndian>().ok()? as usize;
    if length > cursor.get_ref().len() {
        return None;
    }

    let mut bytes = vec![0; length];
    cursor.read_exact(&mut bytes).ok()?;
    String::from_utf8(bytes).ok()
}

fn parse(data: &[u8]) -> Option<(Vec<Symbol>, HashMap<String, i64>)> {
    let mut cursor = Cursor::new(data);

    if cursor.read_u32::<LittleEndian>().ok()? != MAGIC {
        return None;
    }
    if cursor.read_u16::<LittleEndian>().ok()? != VERSION {
        return None;
    }

    let count = cursor.read_u32::<LittleEndian>().ok()? as usize;
    let mut symbols = Vec::with_capacity(count);
    for _ in 0..count {
        let name = read_string(&mut cursor)?;
        let qualification = read_string(&mut cursor)?;
        let file_name = read_string(&mut cursor)?;
        let line = cursor.read_u32::<LittleEndian>().ok()?;
        let column = cursor.read_u16::<LittleEndian>().ok()? as u32;
        let offset = cursor.read_u32::<LittleEndian>().ok()?;
        let kind = SymbolKind::from_i8(cursor.read_i8().ok()?)?;
        let location = SourceLocation::new(file_name, line, column, offset);
        symbols.push(Symbol::new(name, qualification, kind, location));
    }

    let count = cursor.read_u32::<LittleEndian>().ok()? as usize;
    let mut time_stamps = HashMap::with_capacity(count);
    for _ in 0..count {
        let file_name = read_string(&mut cursor)?;
        let millis = cursor.read_i64::<LittleEndian>().ok()?;
        time_stamps.insert(file_name, millis);
    }

    Some((symbols, time_stamps))
}
