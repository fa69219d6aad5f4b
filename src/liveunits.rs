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

//! A registry sharing one live translation unit per file.
//!
//! The registry is a collaborator handed to the components that need it
//! rather than a process-wide singleton; tests construct their own instance.

use std::cell::{RefCell};
use std::collections::{HashMap};

use parking_lot::{Mutex, ReentrantMutex};

use unit::{Unit};

/// A callback invoked when an updated unit becomes available.
pub type UnitSubscriber = Box<dyn Fn(&str, &Unit) + Send + Sync>;

// LiveUnits _____________________________________

/// A registry mapping file names to their current translation units.
///
/// A file is *tracked* iff it is present in the registry. Notifications are
/// delivered while the registry lock is held; the lock is reentrant, so
/// subscribers may call back into the registry, but they must re-check the
/// registry before using a unit.
pub struct LiveUnits {
    units: ReentrantMutex<RefCell<HashMap<String, Unit>>>,
    subscribers: Mutex<Vec<UnitSubscriber>>,
}

impl LiveUnits {
    //- Constructors -----------------------------

    /// Constructs a new, empty `LiveUnits`.
    pub fn new() -> LiveUnits {
        LiveUnits {
            units: ReentrantMutex::new(RefCell::new(HashMap::new())),
            subscribers: Mutex::new(vec![]),
        }
    }

    //- Accessors --------------------------------

    /// Returns whether the supplied file is being tracked.
    pub fn is_tracking(&self, file_name: &str) -> bool {
        let guard = self.units.lock();
        let borrowed = guard.borrow();
        borrowed.contains_key(file_name)
    }

    /// Returns the unit for the supplied file, or an empty unit when the
    /// file is not tracked.
    pub fn find(&self, file_name: &str) -> Unit {
        let guard = self.units.lock();
        let borrowed = guard.borrow();
        borrowed.get(file_name).cloned().unwrap_or_else(Unit::new)
    }

    //- Mutators ---------------------------------

    /// Starts tracking the supplied file with an empty unit.
    ///
    /// Idempotent; a file already tracked keeps its current unit.
    pub fn request_tracking(&self, file_name: &str) {
        let guard = self.units.lock();
        let mut borrowed = guard.borrow_mut();
        if !borrowed.contains_key(file_name) {
            borrowed.insert(file_name.into(), Unit::with_file_name(file_name));
        }
    }

    /// Stops tracking the supplied file iff the registry holds the sole
    /// reference to its unit.
    ///
    /// When another consumer still holds the unit the entry is left in place
    /// and remains tracked until that consumer drops it and tracking is
    /// canceled again.
    pub fn cancel_tracking(&self, file_name: &str) {
        let guard = self.units.lock();
        let mut borrowed = guard.borrow_mut();
        let sole = match borrowed.get(file_name) {
            Some(unit) => unit.is_unique(),
            None => return,
        };
        if sole {
            borrowed.remove(file_name);
        }
    }

    /// Replaces the unit for a tracked file and notifies subscribers.
    ///
    /// Does nothing when the file is not tracked.
    pub fn update_unit(&self, file_name: &str, unit: Unit) {
        let guard = self.units.lock();
        {
            let mut borrowed = guard.borrow_mut();
            if !borrowed.contains_key(file_name) {
                return;
            }
            borrowed.insert(file_name.into(), unit.clone());
        }

        for subscriber in self.subscribers.lock().iter() {
            subscriber(file_name, &unit);
        }
    }

    /// Removes the supplied file from the registry unconditionally.
    pub fn remove(&self, file_name: &str) {
        let guard = self.units.lock();
        let mut borrowed = guard.borrow_mut();
        borrowed.remove(file_name);
    }

    /// Registers a callback invoked whenever an updated unit is published.
    pub fn subscribe(&self, subscriber: UnitSubscriber) {
        self.subscribers.lock().push(subscriber);
    }
}

impl Default for LiveUnits {
    fn default() -> LiveUnits {
        LiveUnits::new()
    }
}
