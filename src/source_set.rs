//! The in-memory, editable representation of a directory of source files
//! for the duration of one pipeline run.
//!
//! A `SourceSet` owns every `SourceFile` it holds. Renderers reach a file
//! through a short-lived `FileHandle` borrowed from the set rather than
//! through a stored back-reference: file operations take `&mut self` on
//! the set and look up by path, instead of giving `SourceFile` an owning
//! pointer back to its `SourceSet`.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use walkdir::WalkDir;

use crate::error::{PipelineError, Result};
use crate::insertion_point::{InsertionCursors, InsertionPoint};

/// A path relative to a `SourceSet`'s root directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelativePath(PathBuf);

impl RelativePath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        RelativePath(path.into())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// True if the path's extension matches `ext` (without the leading
    /// dot), the predicate `InsertionPointPrinter::for_files` and
    /// per-language renderers are built around.
    pub fn has_extension(&self, ext: &str) -> bool {
        self.0.extension().and_then(|e| e.to_str()) == Some(ext)
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl From<&str> for RelativePath {
    fn from(path: &str) -> Self {
        RelativePath(PathBuf::from(path))
    }
}

impl From<String> for RelativePath {
    fn from(path: String) -> Self {
        RelativePath(PathBuf::from(path))
    }
}

impl From<PathBuf> for RelativePath {
    fn from(path: PathBuf) -> Self {
        RelativePath(path)
    }
}

/// A deferred callback fired the first time a file's code is read. Takes
/// the file's path so a caller like `InsertionPointPrinter` can scope
/// itself to the files it cares about without the core knowing anything
/// about languages or extensions.
type PreReadAction = Rc<dyn Fn(&RelativePath, &mut String)>;

/// A single mutable source file, owned by exactly one `SourceSet`.
struct SourceFile {
    path: RelativePath,
    code: String,
    changed: bool,
    already_read: bool,
    pre_read_actions: Vec<PreReadAction>,
    cursors: InsertionCursors,
}

impl SourceFile {
    fn read(root: &Path, path: RelativePath) -> Result<Self> {
        let absolute = root.join(path.as_path());
        let code = fs::read_to_string(&absolute)
            .map_err(|source| PipelineError::SourceRead { path: absolute, source })?;
        Ok(SourceFile {
            path,
            code,
            changed: false,
            already_read: false,
            pre_read_actions: Vec::new(),
            cursors: InsertionCursors::default(),
        })
    }

    fn from_code(path: RelativePath, code: impl Into<String>) -> Self {
        SourceFile {
            path,
            code: code.into(),
            changed: true,
            already_read: false,
            pre_read_actions: Vec::new(),
            cursors: InsertionCursors::default(),
        }
    }

    fn fire_pending_actions(&mut self) {
        if self.already_read {
            return;
        }
        self.already_read = true;
        let actions = std::mem::take(&mut self.pre_read_actions);
        for action in actions {
            action(&self.path, &mut self.code);
        }
    }

    fn code(&mut self) -> &str {
        self.fire_pending_actions();
        &self.code
    }

    fn overwrite(&mut self, code: impl Into<String>) {
        // Deliberately does not force pending pre-read actions: a hook
        // registered before this overwrite still fires, on the new
        // content, the first time someone reads it afterwards.
        if self.code.contains("INSERT:'") {
            log::warn!("overwrite() on {} drops insertion point markers the previous content carried", self.path);
        }
        self.code = code.into();
        self.changed = true;
        // The cached marker line numbers describe content that no longer
        // exists; drop them so the next insertion re-scans the new code
        // instead of indexing into it with stale positions.
        self.cursors.reset();
    }

    fn insert_at(&mut self, point: &InsertionPoint, lines: &[String]) {
        self.fire_pending_actions();
        self.cursors.insert(&mut self.code, point, lines);
        self.changed = true;
    }
}

/// The in-memory aggregate of a directory of source files for one
/// pipeline run.
pub struct SourceSet {
    root_dir: PathBuf,
    files: HashMap<RelativePath, SourceFile>,
    deleted: HashSet<RelativePath>,
    pre_read_actions: Vec<PreReadAction>,
}

impl SourceSet {
    /// Walks `root_dir` recursively, reading every regular file
    /// (following symlinks once) as UTF-8 text.
    pub fn from_directory(root_dir: impl Into<PathBuf>) -> Result<Self> {
        let root_dir = root_dir.into();
        let mut files = HashMap::new();
        for entry in WalkDir::new(&root_dir).follow_links(true) {
            let entry = entry.map_err(|err| PipelineError::SourceRead {
                path: err.path().map(Path::to_path_buf).unwrap_or_else(|| root_dir.clone()),
                source: io::Error::new(io::ErrorKind::Other, err.to_string()),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&root_dir)
                .unwrap_or_else(|_| entry.path())
                .to_path_buf();
            let path = RelativePath::new(relative);
            let file = SourceFile::read(&root_dir, path.clone())?;
            files.insert(path, file);
        }
        log::debug!("read {} file(s) from {}", files.len(), root_dir.display());
        Ok(SourceSet { root_dir, files, deleted: HashSet::new(), pre_read_actions: Vec::new() })
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Exact match first; otherwise the unique stored path ending in
    /// `path`. `FileNotFound` if none match, `AmbiguousPath` if more than
    /// one does.
    fn resolve(&self, path: &Path) -> Result<RelativePath> {
        let exact = RelativePath::new(path.to_path_buf());
        if self.files.contains_key(&exact) {
            return Ok(exact);
        }
        let matches: Vec<&RelativePath> =
            self.files.keys().filter(|stored| stored.as_path().ends_with(path)).collect();
        match matches.len() {
            0 => Err(PipelineError::FileNotFound(path.to_path_buf())),
            1 => Ok(matches[0].clone()),
            _ => Err(PipelineError::AmbiguousPath {
                path: path.to_path_buf(),
                candidates: matches.into_iter().map(|p| p.as_path().to_path_buf()).collect(),
            }),
        }
    }

    /// Looks up a file by exact relative path, or by unique path suffix.
    pub fn file(&mut self, path: impl AsRef<Path>) -> Result<FileHandle<'_>> {
        let key = self.resolve(path.as_ref())?;
        Ok(FileHandle { set: self, key })
    }

    /// Whether `path` resolves to exactly one stored file.
    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.resolve(path.as_ref()).is_ok()
    }

    /// Inserts a new file marked changed. Any `prepare_code` actions
    /// already registered on the set are attached to it.
    pub fn create_file(&mut self, path: impl Into<RelativePath>, code: impl Into<String>) -> FileHandle<'_> {
        let key = path.into();
        let mut file = SourceFile::from_code(key.clone(), code);
        file.pre_read_actions = self.pre_read_actions.clone();
        self.deleted.remove(&key);
        log::debug!("created {key}");
        self.files.insert(key.clone(), file);
        FileHandle { set: self, key }
    }

    /// Removes the file at `path` and records it for recursive on-disk
    /// removal at `write`.
    pub fn delete(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let key = self.resolve(path.as_ref())?;
        self.delete_key(key);
        Ok(())
    }

    fn delete_key(&mut self, key: RelativePath) {
        self.files.remove(&key);
        log::warn!("{key} scheduled for recursive deletion on write");
        self.deleted.insert(key);
    }

    /// Registers `action` to run the first time any file's code is read,
    /// including files created after this call.
    pub fn prepare_code(&mut self, action: impl Fn(&mut String) + 'static) {
        self.prepare_code_matching(|_| true, action);
    }

    /// As `prepare_code`, but `action` only ever runs for files whose
    /// path satisfies `matches` -- used by renderers like
    /// `InsertionPointPrinter` that must not perturb files outside their
    /// own language.
    pub fn prepare_code_matching(
        &mut self,
        matches: impl Fn(&RelativePath) -> bool + 'static,
        action: impl Fn(&mut String) + 'static,
    ) {
        let scoped: PreReadAction = Rc::new(move |path, code| {
            if matches(path) {
                action(code);
            }
        });
        for file in self.files.values_mut() {
            file.pre_read_actions.push(Rc::clone(&scoped));
        }
        self.pre_read_actions.push(scoped);
    }

    /// Creates `root_dir` if missing, recursively deletes every path
    /// recorded by `delete`, writes every changed file, and leaves
    /// unchanged files untouched.
    pub fn write(&mut self) -> Result<()> {
        fs::create_dir_all(&self.root_dir)
            .map_err(|source| PipelineError::SourceWrite { path: self.root_dir.clone(), source })?;

        for path in &self.deleted {
            let absolute = self.root_dir.join(path.as_path());
            let remove = if absolute.is_dir() { fs::remove_dir_all(&absolute) } else { fs::remove_file(&absolute) };
            if let Err(source) = remove {
                if source.kind() != io::ErrorKind::NotFound {
                    return Err(PipelineError::SourceWrite { path: absolute, source });
                }
            }
        }

        for file in self.files.values_mut() {
            if !file.changed {
                continue;
            }
            file.fire_pending_actions();
            let absolute = self.root_dir.join(file.path.as_path());
            if let Some(parent) = absolute.parent() {
                fs::create_dir_all(parent)
                    .map_err(|source| PipelineError::SourceWrite { path: absolute.clone(), source })?;
            }
            log::trace!("writing {}", file.path);
            fs::write(&absolute, &file.code)
                .map_err(|source| PipelineError::SourceWrite { path: absolute, source })?;
        }
        Ok(())
    }
}

/// A short-lived, mutable view onto one file in a `SourceSet`.
pub struct FileHandle<'a> {
    set: &'a mut SourceSet,
    key: RelativePath,
}

impl<'a> FileHandle<'a> {
    pub fn path(&self) -> &RelativePath {
        &self.key
    }

    /// The file's current content, materializing any pending pre-read
    /// actions (e.g. insertion-point markers) on first access.
    pub fn code(&mut self) -> &str {
        self.file_mut().code()
    }

    /// Replaces the file's content outright. Any insertion-point markers
    /// the previous content carried are lost -- prefer `at(point).add`
    /// when the file might still need them.
    pub fn overwrite(&mut self, code: impl Into<String>) {
        self.file_mut().overwrite(code);
    }

    /// Starts an insertion at `point`.
    pub fn at(&mut self, point: InsertionPoint) -> Insertion<'_, 'a> {
        Insertion { handle: self, point }
    }

    /// Deletes this file, recorded for recursive removal at `write`.
    pub fn delete(self) -> Result<()> {
        let FileHandle { set, key } = self;
        set.delete_key(key);
        Ok(())
    }

    fn file_mut(&mut self) -> &mut SourceFile {
        self.set.files.get_mut(&self.key).expect("file handle key always present in its set")
    }
}

/// A pending insertion at a single `InsertionPoint` on a `FileHandle`.
pub struct Insertion<'h, 'a> {
    handle: &'h mut FileHandle<'a>,
    point: InsertionPoint,
}

impl Insertion<'_, '_> {
    /// Inserts `lines` after every line containing this point's marker.
    pub fn add<S: Into<String>>(&mut self, lines: impl IntoIterator<Item = S>) {
        self.add_indented(lines, 0);
    }

    /// As `add`, prefixing every inserted line with `4 * extra_indent`
    /// spaces.
    pub fn add_indented<S: Into<String>>(&mut self, lines: impl IntoIterator<Item = S>, extra_indent: usize) {
        let indent = " ".repeat(4 * extra_indent);
        let block: Vec<String> = lines.into_iter().map(|line| format!("{indent}{}", line.into())).collect();
        self.handle.file_mut().insert_at(&self.point, &block);
    }
}
