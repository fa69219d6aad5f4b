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

//! Follow-definition navigation.
//!
//! Navigation prefers the live translation unit for a file. Definitions the
//! unit itself cannot resolve fall back to the indexed symbol database,
//! which covers definitions living in other translation units.

use std::sync::{Arc};
use std::thread;

use clang_sys::*;

use indexer::{Indexer};
use liveunits::{LiveUnits};
use symbol::{SourceLocation};
use unit::{Unit};
use super::{Entity, ParseOptions};

//================================================
// Structs
//================================================

// CodeNavigator _________________________________

/// Resolves "follow definition" requests for one file.
pub struct CodeNavigator {
    file_name: String,
    unit: Unit,
    indexer: Indexer,
    live_units: Arc<LiveUnits>,
}

impl CodeNavigator {
    //- Constructors -----------------------------

    /// Constructs a new `CodeNavigator` for the supplied file.
    ///
    /// When no live unit exists for the file yet, one is parsed on a
    /// background thread with the options the indexer tracks for the file
    /// and published into the registry on completion.
    pub fn new<F: Into<String>>(
        file_name: F, indexer: &Indexer, live_units: Arc<LiveUnits>
    ) -> CodeNavigator {
        let file_name = file_name.into();
        let unit = live_units.find(&file_name);

        if !unit.is_loaded() {
            live_units.request_tracking(&file_name);

            let background = file_name.clone();
            let options = indexer.compile_options_for(&file_name);
            let registry = live_units.clone();
            thread::spawn(move || {
                let unit = Unit::with_file_name(background.as_str());
                unit.set_compile_options(options);
                unit.set_management_flags(ParseOptions::indexing());
                if unit.parse().is_ok() {
                    registry.update_unit(&background, unit);
                }
            });
        }

        CodeNavigator { file_name, unit, indexer: indexer.clone(), live_units }
    }

    //- Accessors --------------------------------

    /// Returns the name of the file navigation requests resolve in.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Returns the source location of the definition of the entity at the
    /// supplied position, or a null location when none can be found.
    ///
    /// An inclusion directive resolves to the included file.
    pub fn follow(&mut self, line: u32, column: u32) -> SourceLocation {
        if line == 0 || column == 0 {
            return SourceLocation::null();
        }

        // The registry may have published a fresher unit since the last call.
        if self.live_units.is_tracking(&self.file_name) {
            let unit = self.live_units.find(&self.file_name);
            if unit.is_loaded() {
                self.unit = unit;
            }
        }

        let file_name = self.file_name.clone();
        let indexer = self.indexer.clone();
        self.unit.with_translation_unit(|tu| {
            let file = match tu.get_file(&file_name) {
                Some(file) => file,
                None => return SourceLocation::null(),
            };

            let location = file.get_location(line, column);
            if location.is_null() {
                return SourceLocation::null();
            }

            let entity = match location.get_entity() {
                Some(entity) => entity,
                None => return SourceLocation::null(),
            };

            if entity.kind() == CXCursor_InclusionDirective {
                return follow_include(&entity);
            }

            find_definition(&indexer, &entity)
        }).unwrap_or_else(SourceLocation::null)
    }
}

//================================================
// Functions
//================================================

fn follow_include(entity: &Entity) -> SourceLocation {
    match entity.get_included_file() {
        Some(file) => {
            SourceLocation::new(file.get_path().to_string_lossy().into_owned(), 0, 0, 0)
        },
        None => SourceLocation::null(),
    }
}

fn find_definition(indexer: &Indexer, entity: &Entity) -> SourceLocation {
    let definition = if entity.is_definition() {
        Some(*entity)
    } else {
        entity.get_definition()
    };

    if let Some(definition) = definition {
        if let Some(location) = definition.get_location() {
            return SourceLocation::from_native(&location.get_expansion_location());
        }
    }

    // The definition is not in this unit; fall back to the indexed data.
    if entity.is_declaration() || entity.is_reference() {
        let candidates = match entity.kind() {
            CXCursor_ClassDecl |
            CXCursor_StructDecl |
            CXCursor_UnionDecl => indexer.all_classes(),
            CXCursor_FunctionDecl |
            CXCursor_FunctionTemplate |
            CXCursor_CXXMethod => {
                let mut candidates = indexer.all_functions();
                candidates.extend(indexer.all_methods());
                candidates
            },
            CXCursor_Constructor => indexer.all_constructors(),
            CXCursor_Destructor => indexer.all_destructors(),
            _ => vec![],
        };

        if let Some(spelling) = entity.get_name() {
            for candidate in candidates {
                if candidate.name == spelling {
                    return candidate.location;
                }
            }
        }
    }

    SourceLocation::null()
}
