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

//! Project-wide symbol indexing.
//!
//! The indexer drives batched, parallel translation unit construction over a
//! project's files and streams the symbols it finds into the symbol
//! database. Workers parse units concurrently and hand them over a channel
//! to a single reducer, which walks each AST, tracks inclusions, and applies
//! every result to the database atomically.
//!
//! Headers already visited through some implementation file's inclusions are
//! not re-indexed; a second pass picks up only the headers no implementation
//! file reached.

use std::cmp;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use clang_sys::*;

use crossbeam_channel;

use num_cpus;

use parking_lot::{Condvar, Mutex};

use regex::{self, RegexBuilder};

use database::{unix_millis, SymbolDatabase};
use liveunits::{LiveUnits};
use symbol::{SourceLocation, Symbol, SymbolKind};
use unit::{PchInfo, Unit};
use super::{Entity, EntityVisitResult, ParseOptions};

const PROCESSING_BATCH_SIZE: usize = 4;
const SEARCH_CHUNK_SIZE: usize = 10;

//================================================
// Enums
//================================================

// FileType ______________________________________

/// Indicates how a file participates in indexing.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FileType {
    /// A file compiled as its own translation unit.
    Implementation,
    /// A file reached through the inclusions of implementation files.
    Header,
}

/// Classifies a file by its extension, case-insensitively.
///
/// Everything that is not an implementation file is treated as a header.
/// This makes things easier when handling standard library files and any
/// other file that does not use conventional suffixes.
pub fn identify_file_type(file_name: &str) -> FileType {
    const IMPLEMENTATION_SUFFIXES: [&str; 6] = [".c", ".cc", ".cpp", ".cxx", ".m", ".mm"];

    let lowered = file_name.to_lowercase();
    if IMPLEMENTATION_SUFFIXES.iter().any(|s| lowered.ends_with(s)) {
        FileType::Implementation
    } else {
        FileType::Header
    }
}

// Language ______________________________________

/// Indicates the language a project part is compiled as.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Language {
    /// C with the C89 standard.
    C89,
    /// C with the C99 standard.
    C99,
    /// C++ with the C++98 standard.
    Cxx98,
    /// C++ with the C++11 standard.
    Cxx11,
}

impl Language {
    fn is_cxx(self) -> bool {
        matches!(self, Language::Cxx98 | Language::Cxx11)
    }
}

// QtVersion _____________________________________

/// Indicates the Qt major version a project part is built against, if any.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum QtVersion {
    /// No Qt.
    None,
    /// Qt 4.
    Qt4,
    /// Qt 5.
    Qt5,
}

//================================================
// Structs
//================================================

// ProjectPart ___________________________________

/// A coherent compilation configuration shared by a group of files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectPart {
    /// The language the files are compiled as.
    pub language: Language,
    /// Whether the files are Objective-C or Objective-C++.
    pub objc: bool,
    /// The Qt version the files are built against.
    pub qt_version: QtVersion,
    /// Preprocessor defines in `#define NAME VALUE` form.
    pub defines: Vec<String>,
    /// Include search paths.
    pub include_paths: Vec<String>,
    /// Framework search paths.
    pub framework_paths: Vec<String>,
    /// The precompiled header the files are parsed against.
    pub pch: PchInfo,
}

impl Default for ProjectPart {
    fn default() -> ProjectPart {
        ProjectPart {
            language: Language::Cxx11,
            objc: false,
            qt_version: QtVersion::None,
            defines: vec![],
            include_paths: vec![],
            framework_paths: vec![],
            pch: PchInfo::empty(),
        }
    }
}

// CancelToken ___________________________________

/// A cooperatively polled cancellation signal.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Constructs a new, uncanceled `CancelToken`.
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    /// Signals cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Returns whether cancellation has been signaled.
    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

// SearchQuery ___________________________________

/// The categories of symbols a search considers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SearchKinds {
    /// Consider classes, structs, and unions.
    pub classes: bool,
    /// Consider functions, methods, constructors, and destructors.
    pub functions: bool,
    /// Consider enums.
    pub enums: bool,
    /// Consider other declarations.
    pub declarations: bool,
}

impl Default for SearchKinds {
    fn default() -> SearchKinds {
        SearchKinds { classes: true, functions: true, enums: true, declarations: true }
    }
}

impl SearchKinds {
    fn accepts(&self, kind: SymbolKind) -> bool {
        match kind {
            SymbolKind::Class => self.classes,
            SymbolKind::Enum => self.enums,
            SymbolKind::Method |
            SymbolKind::Function |
            SymbolKind::Constructor |
            SymbolKind::Destructor => self.functions,
            SymbolKind::Declaration => self.declarations,
            SymbolKind::Unknown => false,
        }
    }
}

/// A symbol search request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchQuery {
    /// The text or pattern to match against unqualified symbol names.
    pub text: String,
    /// Whether matching is case-sensitive.
    pub case_sensitive: bool,
    /// Whether matches must span whole words.
    pub whole_words: bool,
    /// Whether `text` is a regular expression rather than plain text.
    pub regex: bool,
    /// The categories of symbols to consider.
    pub kinds: SearchKinds,
}

impl SearchQuery {
    /// Constructs a plain-text, case-insensitive query over all symbol
    /// categories.
    pub fn new<T: Into<String>>(text: T) -> SearchQuery {
        SearchQuery {
            text: text.into(),
            case_sensitive: false,
            whole_words: false,
            regex: false,
            kinds: SearchKinds::default(),
        }
    }

    fn pattern(&self) -> String {
        let escaped = if self.regex {
            self.text.clone()
        } else {
            regex::escape(&self.text)
        };

        if self.whole_words {
            format!(r"\b{}\b", escaped)
        } else {
            escaped
        }
    }
}

// SearchControl _________________________________

struct SearchControlState {
    paused: bool,
    canceled: bool,
}

/// Pauses, resumes, and cancels an in-flight symbol search.
///
/// The search honors these signals between chunks of symbols.
#[derive(Clone)]
pub struct SearchControl {
    state: Arc<(Mutex<SearchControlState>, Condvar)>,
}

impl SearchControl {
    /// Constructs a new, running `SearchControl`.
    pub fn new() -> SearchControl {
        let state = SearchControlState { paused: false, canceled: false };
        SearchControl { state: Arc::new((Mutex::new(state), Condvar::new())) }
    }

    /// Pauses the search at the next chunk boundary.
    pub fn pause(&self) {
        self.state.0.lock().paused = true;
    }

    /// Resumes a paused search.
    pub fn resume(&self) {
        self.state.0.lock().paused = false;
        self.state.1.notify_all();
    }

    /// Cancels the search at the next chunk boundary.
    pub fn cancel(&self) {
        self.state.0.lock().canceled = true;
        self.state.1.notify_all();
    }

    // Blocks while paused; returns whether the search may proceed.
    fn proceed(&self) -> bool {
        let mut state = self.state.0.lock();
        while state.paused && !state.canceled {
            self.state.1.wait(&mut state);
        }
        !state.canceled
    }
}

impl Default for SearchControl {
    fn default() -> SearchControl {
        SearchControl::new()
    }
}

// FileData ______________________________________

#[derive(Clone)]
struct FileData {
    file_name: String,
    part: Arc<ProjectPart>,
    management_flags: ParseOptions,
    up_to_date: bool,
}

impl FileData {
    fn new(file_name: &str, part: Arc<ProjectPart>) -> FileData {
        FileData {
            file_name: file_name.into(),
            part,
            management_flags: ParseOptions::indexing(),
            up_to_date: false,
        }
    }
}

// FilesTable ____________________________________

struct FilesTable {
    implementations: HashMap<String, FileData>,
    headers: HashMap<String, FileData>,
}

impl FilesTable {
    fn new() -> FilesTable {
        FilesTable { implementations: HashMap::new(), headers: HashMap::new() }
    }

    fn by_type(&self, file_type: FileType) -> &HashMap<String, FileData> {
        match file_type {
            FileType::Implementation => &self.implementations,
            FileType::Header => &self.headers,
        }
    }

    fn by_type_mut(&mut self, file_type: FileType) -> &mut HashMap<String, FileData> {
        match file_type {
            FileType::Implementation => &mut self.implementations,
            FileType::Header => &mut self.headers,
        }
    }

    fn add_or_update(&mut self, file_name: &str, part: Arc<ProjectPart>, up_to_date: bool) {
        let table = self.by_type_mut(identify_file_type(file_name));
        let data = table
            .entry(file_name.to_string())
            .or_insert_with(|| FileData::new(file_name, part.clone()));
        data.part = part;
        data.up_to_date = up_to_date;
    }

    fn clear(&mut self) {
        self.implementations.clear();
        self.headers.clear();
    }
}

// IndexingResult ________________________________

// The symbols found in one translation unit, handed from the reducer to the
// synchronization step.
struct IndexingResult {
    symbols: Vec<Symbol>,
    processed_files: HashSet<String>,
    unit: Unit,
    part: Arc<ProjectPart>,
}

// RunContext ____________________________________

// Per-run bookkeeping consulted during AST visitation and inclusion walks.
struct RunContext {
    all_files: HashMap<String, FileData>,
    known_headers: HashSet<String>,
    newly_seen_headers: HashSet<String>,
}

impl RunContext {
    fn new(headers: &HashMap<String, FileData>, impls: &HashMap<String, FileData>) -> RunContext {
        let mut all_files = impls.clone();
        for (name, data) in headers {
            all_files.insert(name.clone(), data.clone());
        }

        RunContext {
            all_files,
            known_headers: headers.keys().cloned().collect(),
            newly_seen_headers: HashSet::new(),
        }
    }
}

// RunState ______________________________________

struct RunState {
    running: bool,
    cancel: Option<CancelToken>,
    queued_full: bool,
    queued_files: HashSet<String>,
}

impl RunState {
    fn new() -> RunState {
        RunState { running: false, cancel: None, queued_full: false, queued_files: HashSet::new() }
    }
}

// IndexerState __________________________________

struct IndexerState {
    files: Mutex<FilesTable>,
    database: Mutex<SymbolDatabase>,
    live_units: Arc<LiveUnits>,
    storage_path: Mutex<Option<PathBuf>>,
    loaded: AtomicBool,
    loading: AtomicBool,
    run: Mutex<RunState>,
    idle: Condvar,
    finished_callbacks: Mutex<Vec<Box<dyn Fn() + Send + Sync>>>,
}

// Indexer _______________________________________

/// Orchestrates batched parallel indexing of a project's files into a
/// persistent symbol database.
#[derive(Clone)]
pub struct Indexer {
    state: Arc<IndexerState>,
}

impl Indexer {
    //- Constructors -----------------------------

    /// Constructs a new `Indexer` publishing into the supplied registry.
    pub fn new(live_units: Arc<LiveUnits>) -> Indexer {
        let state = IndexerState {
            files: Mutex::new(FilesTable::new()),
            database: Mutex::new(SymbolDatabase::new()),
            live_units,
            storage_path: Mutex::new(None),
            loaded: AtomicBool::new(false),
            loading: AtomicBool::new(false),
            run: Mutex::new(RunState::new()),
            idle: Condvar::new(),
            finished_callbacks: Mutex::new(vec![]),
        };
        Indexer { state: Arc::new(state) }
    }

    //- Accessors --------------------------------

    /// Returns whether an indexing run or the initial load is in flight.
    pub fn is_busy(&self) -> bool {
        self.state.run.lock().running || self.state.loading.load(Ordering::SeqCst)
    }

    /// Returns whether the supplied file has been added to this indexer.
    pub fn is_tracking_file(&self, file_name: &str) -> bool {
        let file_type = identify_file_type(file_name);
        self.state.files.lock().by_type(file_type).contains_key(file_name)
    }

    /// Returns every file added to this indexer, implementation files first.
    pub fn all_files(&self) -> Vec<String> {
        let files = self.state.files.lock();
        let mut all = files.implementations.keys().cloned().collect::<Vec<_>>();
        all.extend(files.headers.keys().cloned());
        all
    }

    /// Returns the compiler options the supplied file is indexed with, or
    /// the non-project fallback options when the file is unknown.
    pub fn compile_options_for(&self, file_name: &str) -> Vec<String> {
        let file_type = identify_file_type(file_name);
        let files = self.state.files.lock();
        match files.by_type(file_type).get(file_name) {
            Some(data) => clang_options(&data.part),
            None => non_project_options(),
        }
    }

    /// Returns all free functions in the database.
    pub fn all_functions(&self) -> Vec<Symbol> {
        self.symbols_by_kind(SymbolKind::Function)
    }

    /// Returns all classes, structs, and unions in the database.
    pub fn all_classes(&self) -> Vec<Symbol> {
        self.symbols_by_kind(SymbolKind::Class)
    }

    /// Returns all member functions in the database.
    pub fn all_methods(&self) -> Vec<Symbol> {
        self.symbols_by_kind(SymbolKind::Method)
    }

    /// Returns all constructors in the database.
    pub fn all_constructors(&self) -> Vec<Symbol> {
        self.symbols_by_kind(SymbolKind::Constructor)
    }

    /// Returns all destructors in the database.
    pub fn all_destructors(&self) -> Vec<Symbol> {
        self.symbols_by_kind(SymbolKind::Destructor)
    }

    /// Returns the free functions found in the supplied file.
    pub fn functions_from_file(&self, file_name: &str) -> Vec<Symbol> {
        self.symbols_from_file(file_name, SymbolKind::Function)
    }

    /// Returns the classes, structs, and unions found in the supplied file.
    pub fn classes_from_file(&self, file_name: &str) -> Vec<Symbol> {
        self.symbols_from_file(file_name, SymbolKind::Class)
    }

    /// Returns the member functions found in the supplied file.
    pub fn methods_from_file(&self, file_name: &str) -> Vec<Symbol> {
        self.symbols_from_file(file_name, SymbolKind::Method)
    }

    /// Returns the constructors found in the supplied file.
    pub fn constructors_from_file(&self, file_name: &str) -> Vec<Symbol> {
        self.symbols_from_file(file_name, SymbolKind::Constructor)
    }

    /// Returns the destructors found in the supplied file.
    pub fn destructors_from_file(&self, file_name: &str) -> Vec<Symbol> {
        self.symbols_from_file(file_name, SymbolKind::Destructor)
    }

    /// Returns every symbol found in the supplied file.
    pub fn all_from_file(&self, file_name: &str) -> Vec<Symbol> {
        if self.state.loading.load(Ordering::SeqCst) {
            return vec![];
        }
        self.state.database.lock().symbols(file_name)
    }

    /// Returns whether the database still knows the supplied file.
    pub fn contains_file(&self, file_name: &str) -> bool {
        if self.state.loading.load(Ordering::SeqCst) {
            return false;
        }
        self.state.database.lock().contains_file(file_name)
    }

    /// Returns whether the symbols tracked for the supplied file are still
    /// current with respect to its on-disk modification time.
    pub fn validate(&self, file_name: &str) -> bool {
        self.state.database.lock().validate(file_name)
    }

    /// Searches the database for symbols matching the supplied query.
    ///
    /// Results are reported to `receiver` incrementally; pause, resume, and
    /// cancellation requests on `control` are honored between chunks. While
    /// the initial load is in flight nothing is reported.
    pub fn search<F: FnMut(&[Symbol])>(
        &self, query: &SearchQuery, control: &SearchControl, mut receiver: F
    ) {
        if self.state.loading.load(Ordering::SeqCst) {
            return;
        }

        let matcher = match RegexBuilder::new(&query.pattern())
            .case_insensitive(!query.case_sensitive)
            .build() {
            Ok(matcher) => matcher,
            Err(error) => {
                warn!("invalid symbol search pattern: {}", error);
                return;
            },
        };

        let symbols = self.state.database.lock().all_symbols();

        let mut results = vec![];
        for (number, symbol) in symbols.iter().enumerate() {
            if number % SEARCH_CHUNK_SIZE == 0 {
                if !results.is_empty() {
                    receiver(&results);
                    results.clear();
                }
                if !control.proceed() {
                    return;
                }
            }

            if query.kinds.accepts(symbol.kind) && matcher.is_match(&symbol.name) {
                results.push(symbol.clone());
            }
        }

        if !results.is_empty() {
            receiver(&results);
        }
    }

    /// Blocks until neither an indexing run nor the initial load is in flight.
    pub fn wait(&self) {
        let mut run = self.state.run.lock();
        while run.running || self.state.loading.load(Ordering::SeqCst) {
            self.state.idle.wait(&mut run);
        }
    }

    //- Mutators ---------------------------------

    /// Remembers the path the symbol database is persisted at.
    ///
    /// Nothing is read until the first `regenerate`.
    pub fn initialize<P: Into<PathBuf>>(&self, storage_path: P) {
        *self.state.storage_path.lock() = Some(storage_path.into());
    }

    /// Adds a file to the project under the supplied part.
    ///
    /// Rejected while the indexer is busy, and for empty or non-existent
    /// files. Re-adding a known file marks it for re-indexing.
    pub fn add_file(&self, file_name: &str, part: Arc<ProjectPart>) -> bool {
        if self.is_busy() || file_name.trim().is_empty() || !Path::new(file_name).is_file() {
            return false;
        }

        let file_type = identify_file_type(file_name);
        let mut files = self.state.files.lock();
        let mut database = self.state.database.lock();

        let table = files.by_type_mut(file_type);
        if table.contains_key(file_name) {
            if let Some(data) = table.get_mut(file_name) {
                data.part = part;
                data.up_to_date = false;
            }
            database.remove_file(file_name);
        } else {
            table.insert(file_name.into(), FileData::new(file_name, part));
        }

        true
    }

    /// Enqueues a full indexing run across all files.
    ///
    /// The first call restores the persisted database and drops the symbols
    /// of files that went stale while the index was not running. A full run
    /// requested while another run is in flight cancels it and is issued
    /// when the in-flight run winds down.
    pub fn regenerate(&self) {
        if !self.state.loaded.load(Ordering::SeqCst) {
            start_loading(&self.state);
        } else {
            run_full(&self.state);
        }
    }

    /// Enqueues a constrained run over the supplied file.
    ///
    /// Does nothing until the initial load has happened. Requests made while
    /// a run is in flight are unioned and issued when it winds down.
    pub fn evaluate_file(&self, file_name: &str) {
        if !self.state.loaded.load(Ordering::SeqCst) {
            return;
        }
        run_files(&self.state, vec![file_name.to_string()]);
    }

    /// Cancels the in-flight run, if any, optionally blocking until all
    /// workers have wound down.
    pub fn cancel(&self, wait: bool) {
        {
            let run = self.state.run.lock();
            if let Some(ref token) = run.cancel {
                token.cancel();
            }
        }
        if wait {
            self.wait();
        }
    }

    /// Cancels any in-flight work, persists the symbol database, and clears
    /// all state.
    pub fn finalize(&self) {
        self.cancel(true);

        let storage_path = self.state.storage_path.lock().clone();
        if let Some(path) = storage_path {
            let data = self.state.database.lock().serialize();
            if let Err(error) = fs::write(&path, &data) {
                warn!("failed to persist the symbol database to {}: {}", path.display(), error);
            }
        }

        self.state.files.lock().clear();
        self.state.database.lock().clear();

        {
            let mut run = self.state.run.lock();
            run.queued_full = false;
            run.queued_files.clear();
        }

        *self.state.storage_path.lock() = None;
        self.state.loaded.store(false, Ordering::SeqCst);
    }

    /// Registers a callback fired after a run (including any runs queued
    /// behind it) winds down.
    pub fn on_indexing_finished(&self, callback: Box<dyn Fn() + Send + Sync>) {
        self.state.finished_callbacks.lock().push(callback);
    }

    //- Implementation ---------------------------

    fn symbols_by_kind(&self, kind: SymbolKind) -> Vec<Symbol> {
        if self.state.loading.load(Ordering::SeqCst) {
            return vec![];
        }
        self.state.database.lock().symbols_by_kind(kind)
    }

    fn symbols_from_file(&self, file_name: &str, kind: SymbolKind) -> Vec<Symbol> {
        if self.state.loading.load(Ordering::SeqCst) {
            return vec![];
        }
        self.state.database.lock().symbols_of_kind(file_name, kind)
    }
}

//================================================
// Functions
//================================================

// Compile-option synthesis ______________________

/// Produces the deterministic compiler option sequence for a project part.
///
/// The output is part of the stable interface; other tools consume it
/// verbatim.
pub fn clang_options(part: &ProjectPart) -> Vec<String> {
    let mut options: Vec<String> = vec![];

    options.push(match part.language {
        Language::C89 => "-std=gnu89",
        Language::C99 => "-std=gnu99",
        Language::Cxx98 => "-std=gnu++98",
        Language::Cxx11 => "-std=c++11",
    }.into());

    if part.objc {
        options.push(objc_option(part.language.is_cxx()).into());
    }

    match part.qt_version {
        QtVersion::Qt4 => {
            options.push("-include".into());
            options.push(injected_header('4'));
        },
        QtVersion::Qt5 => {
            options.push("-include".into());
            options.push(injected_header('5'));
        },
        QtVersion::None => {},
    }

    if cfg!(windows) {
        options.push("-fms-extensions".into());
        options.push("-fdelayed-template-parsing".into());
    }

    options.push("-nobuiltininc".into());

    for define in &part.defines {
        if let Some(option) = define_option(define) {
            if !options.contains(&option) {
                options.push(option);
            }
        }
    }

    for path in &part.framework_paths {
        options.push(format!("-F{}", path));
    }

    for path in &part.include_paths {
        if !path.is_empty() {
            options.push(format!("-I{}", path));
        }
    }

    options
}

/// Returns the Objective-C language switch for C (`-ObjC`) or C++
/// (`-ObjC++`) parts.
pub fn objc_option(cxx: bool) -> &'static str {
    if cxx {
        "-ObjC++"
    } else {
        "-ObjC"
    }
}

/// Returns the options used for files that belong to no project part.
pub fn non_project_options() -> Vec<String> {
    vec!["-std=c++11".into()]
}

// Compiler-defined and reserved macros are dropped; quoting is normalized
// out of macro bodies because the options are not shell-interpreted.
fn define_option(define: &str) -> Option<String> {
    if define.is_empty() || !define.starts_with("#define ") {
        return None;
    }

    let body = &define[8..];
    if body.starts_with('_') || body.starts_with("OBJC_NEW_PROPERTIES") {
        return None;
    }

    let option = match body.find(' ') {
        Some(space) => format!("-D{}={}", &body[..space], &body[space + 1..]),
        None => format!("-D{}", body),
    };

    Some(option.replace("\\\"", "\"").replace('"', ""))
}

fn injected_header(qt: char) -> String {
    format!("{}/data/qt{}-qobjectdefs-injected.h", env!("CARGO_MANIFEST_DIR"), qt)
}

// Run orchestration _____________________________

fn pool_size() -> usize {
    cmp::max(1, num_cpus::get().saturating_sub(1))
}

fn snapshot_files(state: &IndexerState) -> (HashMap<String, FileData>, HashMap<String, FileData>) {
    let files = state.files.lock();
    (files.headers.clone(), files.implementations.clone())
}

fn select_files(
    state: &IndexerState, names: &[String]
) -> (HashMap<String, FileData>, HashMap<String, FileData>) {
    let mut headers = HashMap::new();
    let mut impls = HashMap::new();

    let mut files = state.files.lock();
    let mut database = state.database.lock();
    for name in names {
        let file_type = identify_file_type(name);
        let data = match files.by_type_mut(file_type).get_mut(name.as_str()) {
            Some(data) => data,
            None => continue,
        };

        data.up_to_date = false;
        let data = data.clone();
        database.remove_file(name);

        match file_type {
            FileType::Header => headers.insert(name.clone(), data),
            FileType::Implementation => impls.insert(name.clone(), data),
        };
    }

    (headers, impls)
}

fn start_run(
    state: &Arc<IndexerState>,
    run: &mut RunState,
    headers: HashMap<String, FileData>,
    impls: HashMap<String, FileData>,
) {
    let token = CancelToken::new();
    run.running = true;
    run.cancel = Some(token.clone());

    let state = state.clone();
    thread::spawn(move || process_run(state, headers, impls, token));
}

fn run_full(state: &Arc<IndexerState>) {
    let mut run = state.run.lock();
    if run.running {
        run.queued_full = true;
        if let Some(ref token) = run.cancel {
            token.cancel();
        }
        return;
    }

    let (headers, impls) = snapshot_files(state);
    start_run(state, &mut run, headers, impls);
}

fn run_files(state: &Arc<IndexerState>, names: Vec<String>) {
    let mut run = state.run.lock();
    if run.running {
        run.queued_files.extend(names);
        return;
    }

    let (headers, impls) = select_files(state, &names);
    start_run(state, &mut run, headers, impls);
}

fn start_loading(state: &Arc<IndexerState>) {
    if state.loading.swap(true, Ordering::SeqCst) {
        return;
    }

    let state = state.clone();
    thread::spawn(move || {
        load_persisted(&state);
        analyze_restored(&state);

        state.loaded.store(true, Ordering::SeqCst);
        run_full(&state);
        state.loading.store(false, Ordering::SeqCst);
        state.idle.notify_all();
    });
}

fn load_persisted(state: &IndexerState) {
    let storage_path = state.storage_path.lock().clone();
    let path = match storage_path {
        Some(path) => path,
        None => return,
    };

    match fs::read(&path) {
        Ok(data) => state.database.lock().deserialize(&data),
        Err(error) => debug!("no persisted symbols at {}: {}", path.display(), error),
    }
}

// Restored files are validated against their on-disk modification times.
// No dependency information survives a restart, so restored files nobody
// tracks are dropped and re-indexed from scratch by the following run.
fn analyze_restored(state: &IndexerState) {
    let mut files = state.files.lock();
    let mut database = state.database.lock();

    for file_name in database.files() {
        let up_to_date = database.validate(&file_name);
        let file_type = identify_file_type(&file_name);

        if files.by_type(file_type).contains_key(&file_name) {
            if up_to_date {
                if let Some(data) = files.by_type_mut(file_type).get_mut(&file_name) {
                    data.up_to_date = true;
                }
            }
        } else {
            database.remove_file(&file_name);
            continue;
        }

        if !up_to_date && database.contains_file(&file_name) {
            database.remove_file(&file_name);
        }
    }
}

fn process_run(
    state: Arc<IndexerState>,
    headers: HashMap<String, FileData>,
    impls: HashMap<String, FileData>,
    token: CancelToken,
) {
    let mut context = RunContext::new(&headers, &impls);
    debug!("indexing run over {} files", context.all_files.len());

    // Implementation files first, grouped by project part.
    for group in group_by_part(impls.values()) {
        if token.is_canceled() {
            break;
        }
        process_files(&state, &mut context, &group, &token);
    }

    // Headers no implementation file reached go in a second pass.
    if !token.is_canceled() {
        let mut known = context.known_headers.iter().cloned().collect::<Vec<_>>();
        known.sort();
        process_files(&state, &mut context, &known, &token);
    }

    debug!("indexing run finished (canceled: {})", token.is_canceled());
    finish_run(&state);
}

fn group_by_part<'f, I: Iterator<Item=&'f FileData>>(files: I) -> Vec<Vec<String>> {
    let mut sorted = files.collect::<Vec<_>>();
    sorted.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    let mut groups: Vec<(Arc<ProjectPart>, Vec<String>)> = vec![];
    for data in sorted {
        match groups.iter_mut().find(|g| Arc::ptr_eq(&g.0, &data.part)) {
            Some(group) => group.1.push(data.file_name.clone()),
            None => groups.push((data.part.clone(), vec![data.file_name.clone()])),
        }
    }

    groups.into_iter().map(|g| g.1).collect()
}

fn process_files(
    state: &Arc<IndexerState>, context: &mut RunContext, names: &[String], token: &CancelToken
) {
    let mut batch = Vec::with_capacity(PROCESSING_BATCH_SIZE);

    for name in names {
        if token.is_canceled() {
            return;
        }

        // Files another unit's inclusions already covered are skipped.
        match context.all_files.get(name) {
            Some(data) if !data.up_to_date => batch.push(data.clone()),
            _ => continue,
        }

        if batch.len() == PROCESSING_BATCH_SIZE {
            process_batch(state, context, &batch, token);
            batch.clear();
        }
    }

    if !batch.is_empty() && !token.is_canceled() {
        process_batch(state, context, &batch, token);
    }
}

// Workers parse units in parallel; the reducer consumes each completed unit
// as it arrives, in no particular order.
fn process_batch(
    state: &Arc<IndexerState>, context: &mut RunContext, batch: &[FileData], token: &CancelToken
) {
    let (task_sender, task_receiver) = crossbeam_channel::unbounded::<FileData>();
    let (unit_sender, unit_receiver) = crossbeam_channel::unbounded::<(Unit, FileData)>();

    for data in batch {
        let _ = task_sender.send(data.clone());
    }
    drop(task_sender);

    let mut workers = vec![];
    for _ in 0..cmp::min(batch.len(), pool_size()) {
        let tasks = task_receiver.clone();
        let units = unit_sender.clone();
        let token = token.clone();
        workers.push(thread::spawn(move || {
            while let Ok(data) = tasks.recv() {
                if token.is_canceled() {
                    break;
                }
                let unit = compute_unit(&data);
                if units.send((unit, data)).is_err() {
                    break;
                }
            }
        }));
    }
    drop(unit_sender);

    for (unit, data) in unit_receiver.iter() {
        if token.is_canceled() {
            unit.invalidate();
            continue;
        }
        if !unit.is_loaded() {
            continue;
        }

        let result = reduce_unit(context, unit, &data);
        synchronize(state, result);
    }

    for worker in workers {
        let _ = worker.join();
    }
}

fn compute_unit(data: &FileData) -> Unit {
    let unit = Unit::with_file_name(data.file_name.as_str());
    unit.set_compile_options(clang_options(&data.part));
    unit.set_pch(data.part.pch.clone());
    unit.set_management_flags(data.management_flags);
    let _ = unit.parse();
    unit
}

// Walks the unit's AST collecting symbols, then its inclusions, and marks
// the files it covered as up to date within this run.
fn reduce_unit(context: &mut RunContext, unit: Unit, data: &FileData) -> IndexingResult {
    let mut symbols = vec![];

    {
        let lookup = &*context;
        unit.with_translation_unit(|tu| {
            let root = tu.get_entity();
            let mut qualifications = HashMap::new();
            qualifications.insert(root.hash_value(), String::new());

            root.visit_children(|cursor, parent| {
                visit_for_symbols(lookup, &mut qualifications, &mut symbols, cursor, parent)
            });
        });
    }

    let file_name = unit.file_name();
    if let Some(data) = context.all_files.get_mut(&file_name) {
        data.up_to_date = true;
    }

    let mut processed_files = HashSet::new();
    processed_files.insert(file_name);

    unit.with_translation_unit(|tu| {
        tu.visit_inclusions(|file, _| {
            let included = file.get_path().to_string_lossy().into_owned();
            processed_files.insert(included.clone());

            if identify_file_type(&included) != FileType::Header {
                return;
            }

            // Headers reached here were fully visited by this unit, so later
            // units and the second pass need not revisit them. Headers the
            // project does not track are remembered so the symbols collected
            // from them by this unit are kept.
            if let Some(data) = context.all_files.get_mut(&included) {
                data.up_to_date = true;
            } else {
                context.newly_seen_headers.insert(included);
            }
        });
    });

    IndexingResult { symbols, processed_files, unit, part: data.part.clone() }
}

fn visit_for_symbols(
    context: &RunContext,
    qualifications: &mut HashMap<u32, String>,
    symbols: &mut Vec<Symbol>,
    cursor: Entity,
    parent: Entity,
) -> EntityVisitResult {
    let kind = cursor.kind();
    let spelling = cursor.get_name().unwrap_or_default();

    // Qualification tracking: containers append their spelling to the
    // enclosing qualification, everything else inherits it. Anonymous
    // containers contribute no segment.
    let parent_hash = parent.hash_value();
    let current_hash = cursor.hash_value();
    let parent_qualification = qualifications.get(&parent_hash).cloned().unwrap_or_default();

    let container = kind == CXCursor_ClassDecl
        || kind == CXCursor_StructDecl
        || kind == CXCursor_Namespace;
    if container && !spelling.is_empty() {
        let qualification = if parent_qualification.is_empty() {
            spelling.clone()
        } else {
            format!("{}::{}", parent_qualification, spelling)
        };
        qualifications.insert(current_hash, qualification);
    } else {
        qualifications.insert(current_hash, parent_qualification.clone());
    }

    let mut is_definition = false;
    if cursor.is_declaration() {
        let defines_itself = cursor.get_definition().map_or(false, |d| d == cursor);
        if defines_itself && !spelling.trim().is_empty() {
            is_definition = true;

            let location = cursor.get_location().map(|l| l.get_expansion_location());
            let location = match location {
                Some(ref l) => SourceLocation::from_native(l),
                None => SourceLocation::null(),
            };

            // Symbols in headers some earlier unit of this run already
            // covered are not reported again.
            let file_name = location.file_name().to_string();
            let suppressed = match context.all_files.get(&file_name) {
                Some(data) => {
                    data.up_to_date && !context.newly_seen_headers.contains(&file_name)
                },
                None => false,
            };

            if !file_name.trim().is_empty() && !suppressed {
                // Out-of-line definitions appear lexically outside their
                // semantic scope; their qualification comes from the
                // semantic parent chain instead.
                let qualification = match cursor.get_semantic_parent() {
                    Some(semantic) if semantic != parent => semantic_qualification(&cursor),
                    _ => parent_qualification,
                };

                symbols.push(Symbol::new(
                    spelling,
                    qualification,
                    symbol_kind(&cursor),
                    location,
                ));
            }
        }
    }

    if is_definition
        || kind == CXCursor_Namespace
        || kind == CXCursor_LinkageSpec
        || kind == CXCursor_UnexposedStmt {
        EntityVisitResult::Recurse
    } else {
        EntityVisitResult::Continue
    }
}

fn symbol_kind(cursor: &Entity) -> SymbolKind {
    match cursor.kind() {
        CXCursor_ClassDecl |
        CXCursor_StructDecl |
        CXCursor_UnionDecl |
        CXCursor_ClassTemplate |
        CXCursor_ClassTemplatePartialSpecialization => SymbolKind::Class,
        CXCursor_FunctionDecl => SymbolKind::Function,
        CXCursor_CXXMethod => SymbolKind::Method,
        CXCursor_FunctionTemplate => {
            // A function template is a method iff its semantic parent is a
            // record or class template.
            match cursor.get_semantic_parent().map(|p| p.kind()) {
                Some(CXCursor_ClassDecl) |
                Some(CXCursor_StructDecl) |
                Some(CXCursor_UnionDecl) |
                Some(CXCursor_ClassTemplate) |
                Some(CXCursor_ClassTemplatePartialSpecialization) => SymbolKind::Method,
                _ => SymbolKind::Function,
            }
        },
        CXCursor_Constructor => SymbolKind::Constructor,
        CXCursor_Destructor => SymbolKind::Destructor,
        CXCursor_EnumDecl => SymbolKind::Enum,
        CXCursor_DeclStmt => SymbolKind::Declaration,
        _ => SymbolKind::Unknown,
    }
}

fn semantic_qualification(cursor: &Entity) -> String {
    let mut segments = vec![];

    let mut parent = cursor.get_semantic_parent();
    while let Some(entity) = parent {
        let kind = entity.kind();
        if kind == CXCursor_TranslationUnit {
            break;
        }

        let container = kind == CXCursor_Namespace
            || kind == CXCursor_ClassDecl
            || kind == CXCursor_StructDecl
            || kind == CXCursor_UnionDecl
            || kind == CXCursor_ClassTemplate
            || kind == CXCursor_ClassTemplatePartialSpecialization;
        if container {
            if let Some(name) = entity.get_name() {
                segments.push(name);
            }
        }

        parent = entity.get_semantic_parent();
    }

    segments.reverse();
    segments.join("::")
}

fn synchronize(state: &Arc<IndexerState>, mut result: IndexingResult) {
    result.unit.make_unique();
    let millis = unix_millis(result.unit.time_stamp());
    let file_name = result.unit.file_name();

    {
        let mut files = state.files.lock();
        let mut database = state.database.lock();

        for symbol in &result.symbols {
            files.add_or_update(symbol.location.file_name(), result.part.clone(), true);
            database.insert_symbol(symbol.clone(), millis);
        }

        // Files processed without producing any symbols still need to be
        // known to the database so staleness tracking covers them.
        result.processed_files.insert(file_name.clone());
        for file in &result.processed_files {
            if !database.contains_file(file) {
                database.insert_file(file.as_str(), millis);
            }
        }
    }

    // A unit someone is tracking stays alive in the registry; anything else
    // is invalidated so parse handles do not pile up.
    if state.live_units.is_tracking(&file_name) {
        state.live_units.update_unit(&file_name, result.unit);
    } else {
        result.unit.invalidate();
    }
}

fn finish_run(state: &Arc<IndexerState>) {
    {
        let mut run = state.run.lock();
        run.running = false;
        run.cancel = None;

        // A queued full run subsumes queued files. Re-issuing under the run
        // lock leaves no window in which the indexer appears idle.
        if run.queued_full {
            run.queued_full = false;
            run.queued_files.clear();
            let (headers, impls) = snapshot_files(state);
            start_run(state, &mut run, headers, impls);
            return;
        }

        if !run.queued_files.is_empty() {
            let names = run.queued_files.drain().collect::<Vec<_>>();
            let (headers, impls) = select_files(state, &names);
            start_run(state, &mut run, headers, impls);
            return;
        }
    }

    for callback in state.finished_callbacks.lock().iter() {
        callback();
    }
    state.idle.notify_all();
}
