//! `TypeName`: the stable identity carried by every entity event.

use std::fmt;

/// Default domain prefix Protobuf uses for `google.protobuf.Any`-style
/// type URLs.
pub const DEFAULT_TYPE_URL_PREFIX: &str = "type.googleapis.com";

/// A fully-qualified Protobuf type identity.
///
/// `qualified_name()` is the invariant the core relies on for keying
/// projections and for building the `FileNotFound`/suffix-match behavior
/// of `SourceSet::file`: it is always `package_name + "." + (nesting path)
/// + simple_name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeName {
    simple_name: String,
    package_name: String,
    nesting_type_names: Vec<String>,
    type_url_prefix: String,
}

impl TypeName {
    pub fn new(
        package_name: impl Into<String>,
        nesting_type_names: Vec<String>,
        simple_name: impl Into<String>,
    ) -> Self {
        TypeName {
            simple_name: simple_name.into(),
            package_name: package_name.into(),
            nesting_type_names,
            type_url_prefix: DEFAULT_TYPE_URL_PREFIX.to_string(),
        }
    }

    pub fn with_type_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.type_url_prefix = prefix.into();
        self
    }

    /// Builds the nested name for a type declared inside `self`.
    pub fn nested(&self, simple_name: impl Into<String>) -> Self {
        let mut nesting = self.nesting_type_names.clone();
        nesting.push(self.simple_name.clone());
        TypeName {
            simple_name: simple_name.into(),
            package_name: self.package_name.clone(),
            nesting_type_names: nesting,
            type_url_prefix: self.type_url_prefix.clone(),
        }
    }

    pub fn simple_name(&self) -> &str {
        &self.simple_name
    }

    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    pub fn nesting_type_names(&self) -> &[String] {
        &self.nesting_type_names
    }

    pub fn type_url_prefix(&self) -> &str {
        &self.type_url_prefix
    }

    /// `package_name + "." + nesting path + simple_name`, or just the
    /// nesting path and simple name when `package_name` is empty.
    pub fn qualified_name(&self) -> String {
        let mut out = self.package_name.clone();
        for nested in &self.nesting_type_names {
            if !out.is_empty() {
                out.push('.');
            }
            out.push_str(nested);
        }
        if !out.is_empty() {
            out.push('.');
        }
        out.push_str(&self.simple_name);
        out
    }

    /// `type_url_prefix/qualified_name`, as used for `google.protobuf.Any`.
    pub fn type_url(&self) -> String {
        format!("{}/{}", self.type_url_prefix, self.qualified_name())
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified_name())
    }
}
