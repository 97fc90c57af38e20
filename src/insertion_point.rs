//! The canonical text-marker format for insertion points, plus a generic
//! renderer that prints those markers.
//!
//! The marker substring is `INSERT:'<label>'`; the surrounding comment
//! syntax (`// ...`, `# ...`, ...) is supplied by whatever prints the
//! marker, never by this module -- the core only ever matches the
//! substring.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::Result;
use crate::plugin::Renderer;
use crate::projection::ProjectionContext;
use crate::source_set::{RelativePath, SourceSet};

/// A named location in a source file where a renderer may insert lines.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InsertionPoint {
    label: String,
}

impl InsertionPoint {
    pub fn new(label: impl Into<String>) -> Self {
        InsertionPoint { label: label.into() }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The substring a compliant marker line must contain.
    pub fn marker(&self) -> String {
        format!("INSERT:'{}'", self.label)
    }
}

impl std::fmt::Display for InsertionPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.marker())
    }
}

/// Per-file state tracking where the next `add` at a given label should
/// land, so repeated calls on the same point compose in call order
/// instead of clobbering each other or re-scanning stale marker
/// positions once earlier insertions have shifted the file's lines.
#[derive(Debug, Default, Clone)]
pub(crate) struct InsertionCursors {
    by_label: HashMap<String, Vec<usize>>,
}

impl InsertionCursors {
    /// Drops every cached cursor. Called whenever a file's content is
    /// replaced by something other than an insertion, so the next
    /// `insert` re-scans the new content instead of trusting line
    /// numbers that no longer describe it.
    pub(crate) fn reset(&mut self) {
        self.by_label.clear();
    }

    /// Inserts `lines` after every occurrence of `point`'s marker in
    /// `code`, mutating it in place. A no-op if the marker is absent.
    pub(crate) fn insert(&mut self, code: &mut String, point: &InsertionPoint, lines: &[String]) {
        let mut all_lines: Vec<String> = code.split('\n').map(str::to_string).collect();
        let marker = point.marker();
        let positions = self.by_label.entry(point.label().to_string()).or_insert_with(|| {
            all_lines
                .iter()
                .enumerate()
                .filter(|(_, line)| line.contains(&marker))
                .map(|(idx, _)| idx)
                .collect()
        });
        if positions.is_empty() {
            return;
        }
        let original_positions = positions.clone();

        let block_len = lines.len();
        let mut shift = 0usize;
        for pos in positions.iter_mut() {
            let insert_at = (*pos + shift + 1).min(all_lines.len());
            for (offset, line) in lines.iter().enumerate() {
                all_lines.insert(insert_at + offset, line.clone());
            }
            *pos = insert_at + block_len - 1;
            shift += block_len;
        }
        *code = all_lines.join("\n");

        // Other labels' markers sitting below any of this insertion's
        // points shifted down by the inserted block; their cached
        // cursors need the same adjustment or the next insert at that
        // label would land in the wrong place.
        for (label, cached) in self.by_label.iter_mut() {
            if label == point.label() {
                continue;
            }
            for cursor in cached.iter_mut() {
                let shift_for_cursor =
                    original_positions.iter().filter(|&&inserted_after| inserted_after < *cursor).count() * block_len;
                *cursor += shift_for_cursor;
            }
        }
    }
}

/// A generic, language-agnostic renderer that prints insertion-point
/// markers into matching files the first time anything reads them.
///
/// Emitting actual Java/Kotlin/JS source is out of scope for this crate;
/// this renderer only prints the bracketing comment line needed to
/// exercise the insertion-point protocol, parameterized by the comment
/// prefix a target language would use (`"//"` for Java/Kotlin/JS, `"#"`
/// for shell).
pub struct InsertionPointPrinter {
    comment_prefix: String,
    leading: Vec<InsertionPoint>,
    trailing: Vec<InsertionPoint>,
    matches: Rc<dyn Fn(&RelativePath) -> bool>,
}

impl InsertionPointPrinter {
    pub fn new(comment_prefix: impl Into<String>) -> Self {
        InsertionPointPrinter {
            comment_prefix: comment_prefix.into(),
            leading: Vec::new(),
            trailing: Vec::new(),
            matches: Rc::new(|_| true),
        }
    }

    /// Prints `point`'s marker as the first line of every matching file.
    pub fn leading(mut self, point: InsertionPoint) -> Self {
        self.leading.push(point);
        self
    }

    /// Prints `point`'s marker as the last line of every matching file.
    pub fn trailing(mut self, point: InsertionPoint) -> Self {
        self.trailing.push(point);
        self
    }

    /// Restricts which files this printer touches, e.g. by extension, so
    /// a Java printer never perturbs a sibling `.js` file.
    pub fn for_files(mut self, matches: impl Fn(&RelativePath) -> bool + 'static) -> Self {
        self.matches = Rc::new(matches);
        self
    }

    fn marker_line(&self, point: &InsertionPoint) -> String {
        format!("{} {}", self.comment_prefix, point.marker())
    }
}

impl Renderer for InsertionPointPrinter {
    fn render(&self, _context: &ProjectionContext, source_set: &mut SourceSet) -> Result<()> {
        let leading: Vec<String> = self.leading.iter().map(|p| self.marker_line(p)).collect();
        let trailing: Vec<String> = self.trailing.iter().map(|p| self.marker_line(p)).collect();
        let matches = Rc::clone(&self.matches);

        source_set.prepare_code_matching(
            move |path| matches(path),
            move |code| {
                if leading.is_empty() && trailing.is_empty() {
                    return;
                }
                let mut lines: Vec<String> = Vec::with_capacity(leading.len() + trailing.len() + 1);
                lines.extend(leading.iter().cloned());
                lines.extend(code.split('\n').map(str::to_string));
                lines.extend(trailing.iter().cloned());
                *code = lines.join("\n");
            },
        );
        Ok(())
    }
}
