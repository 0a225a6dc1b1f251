//! Attribute paths for error reporting.

use std::fmt;

/// Location of a value inside the model being encoded.
///
/// Paths are built on the stack as the encoder descends and only rendered
/// when something goes wrong. Rendering follows the host convention:
/// `items[0].name`, `tags['k'].value`.
#[derive(Debug, Clone, Copy)]
pub enum AttributePath<'a> {
    /// The model itself
    Root,
    /// A named attribute
    Field(&'a AttributePath<'a>, &'a str),
    /// An array element
    Index(&'a AttributePath<'a>, usize),
    /// A map entry
    Key(&'a AttributePath<'a>, &'a str),
}

impl AttributePath<'_> {
    /// Whether this is the root path.
    pub fn is_root(&self) -> bool {
        matches!(self, AttributePath::Root)
    }
}

impl fmt::Display for AttributePath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributePath::Root => Ok(()),
            AttributePath::Field(parent, name) if parent.is_root() => write!(f, "{}", name),
            AttributePath::Field(parent, name) => write!(f, "{}.{}", parent, name),
            AttributePath::Index(parent, index) => write!(f, "{}[{}]", parent, index),
            AttributePath::Key(parent, key) => write!(f, "{}['{}']", parent, key),
        }
    }
}
