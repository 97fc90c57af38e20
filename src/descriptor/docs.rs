//! Doc comment resolution from a file's `SourceCodeInfo` location list.
//!
//! Doc resolution is a pure function of `(path through the descriptor tree)
//! -> location.leading_comments + trailing_comments`, following the same
//! binary-search-over-sorted-locations strategy used by a Protobuf code
//! generator walking `source_code_info`.

use prost_types::source_code_info::Location;
use prost_types::SourceCodeInfo;

/// Comments attached to a single descriptor element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comments {
    /// Blocks of comments that precede the element but are separated from
    /// it by a blank line.
    pub leading_detached: Vec<String>,
    /// Comments immediately preceding the element.
    pub leading: String,
    /// Comments immediately following the element, on the same line.
    pub trailing: String,
}

impl Comments {
    fn from_location(location: &Location) -> Comments {
        Comments {
            leading_detached: location.leading_detached_comments.clone(),
            leading: location.leading_comments.clone().unwrap_or_default(),
            trailing: location.trailing_comments.clone().unwrap_or_default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.leading.is_empty() && self.trailing.is_empty() && self.leading_detached.is_empty()
    }
}

/// A sorted index over a file's `source_code_info`, supporting lookup of
/// comments by the descriptor-tree path that locates an element.
pub struct DocIndex {
    locations: Vec<Location>,
}

impl DocIndex {
    pub fn new(source_code_info: Option<SourceCodeInfo>) -> Self {
        let mut locations = source_code_info.map(|s| s.location).unwrap_or_default();
        // Locations for a single span (e.g. spans opened and closed by the
        // same path) are kept; locations is sorted so that binary search by
        // path works below.
        locations.retain(|loc| !loc.path.is_empty());
        locations.sort_by(|a, b| a.path.cmp(&b.path));
        DocIndex { locations }
    }

    /// Resolves the comments attached to the descriptor-tree `path`, or an
    /// empty `Comments` if no comment is attached there.
    pub fn resolve(&self, path: &[i32]) -> Comments {
        match self
            .locations
            .binary_search_by_key(&path, |location| location.path.as_slice())
        {
            Ok(idx) => Comments::from_location(&self.locations[idx]),
            Err(_) => Comments::default(),
        }
    }
}
