#![forbid(unsafe_code)]

//! Key paths into a value tree.
//!
//! A [`Path`] is an ordered sequence of string keys. The textual form joins
//! keys with `.` (`"profile.name"`); the empty string is the root. List
//! elements are addressed by decimal keys (`"items.0"`).
//!
//! # Invariants
//!
//! 1. Every segment is non-empty and contains neither `.` nor whitespace.
//! 2. Paths compare structurally, segment by segment.
//! 3. `a.is_related(b)` holds iff one path is a prefix of the other
//!    (equality included).

use std::fmt;
use std::rc::Rc;

use crate::error::{Result, StateError};

/// Ordered sequence of keys identifying a location in a value tree.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    segments: Vec<Rc<str>>,
}

fn check_segment(segment: &str) -> std::result::Result<(), &'static str> {
    if segment.is_empty() {
        return Err("empty segment");
    }
    if segment.contains('.') {
        return Err("segment contains '.'");
    }
    if segment.chars().any(char::is_whitespace) {
        return Err("segment contains whitespace");
    }
    Ok(())
}

impl Path {
    /// The root path (no segments).
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a dotted path. `""` is the root.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::InvalidPath`] for empty segments (`"a..b"`,
    /// `".a"`, `"a."`) or segments containing whitespace.
    pub fn parse(text: &str) -> Result<Self> {
        if text.is_empty() {
            return Ok(Self::root());
        }
        let segments = text
            .split('.')
            .map(|segment| {
                check_segment(segment)
                    .map(|()| Rc::<str>::from(segment))
                    .map_err(|reason| StateError::invalid_path(text, reason))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { segments })
    }

    /// Build a path from individual keys.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::InvalidPath`] if any key is not a valid segment.
    pub fn from_segments<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut path = Self::root();
        for segment in segments {
            path = path.child(segment.as_ref())?;
        }
        Ok(path)
    }

    /// Path of the child `key` below this one.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::InvalidPath`] if `key` is not a valid segment.
    pub fn child(&self, key: &str) -> Result<Self> {
        check_segment(key).map_err(|reason| {
            let shown = if self.is_root() {
                key.to_string()
            } else {
                format!("{self}.{key}")
            };
            StateError::invalid_path(shown, reason)
        })?;
        let mut segments = self.segments.clone();
        segments.push(Rc::from(key));
        Ok(Self { segments })
    }

    /// Concatenate two paths.
    #[must_use]
    pub fn join(&self, other: &Path) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// The enclosing path, or `None` at the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, init) = self.segments.split_last()?;
        Some(Self {
            segments: init.to_vec(),
        })
    }

    /// Whether this is the root path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Same as [`is_root`](Self::is_root).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.is_root()
    }

    /// Iterate over the segments from the root down.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(|s| &**s)
    }

    pub(crate) fn keys(&self) -> &[Rc<str>] {
        &self.segments
    }

    /// Whether `prefix` is equal to or an ancestor of this path.
    #[must_use]
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Whether either path is a prefix of the other.
    ///
    /// This is the relation that decides which subscriptions a write
    /// reaches: equal paths, ancestors and descendants.
    #[must_use]
    pub fn is_related(&self, other: &Path) -> bool {
        self.starts_with(other) || other.starts_with(self)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({:?})", self.to_string())
    }
}

impl std::str::FromStr for Path {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Anything that can name a path: dotted text or an existing [`Path`].
pub trait IntoPath {
    /// Convert into a validated path.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::InvalidPath`] for malformed text.
    fn into_path(self) -> Result<Path>;
}

impl IntoPath for Path {
    fn into_path(self) -> Result<Path> {
        Ok(self)
    }
}

impl IntoPath for &Path {
    fn into_path(self) -> Result<Path> {
        Ok(self.clone())
    }
}

impl IntoPath for &str {
    fn into_path(self) -> Result<Path> {
        Path::parse(self)
    }
}

impl IntoPath for String {
    fn into_path(self) -> Result<Path> {
        Path::parse(&self)
    }
}

impl IntoPath for &String {
    fn into_path(self) -> Result<Path> {
        Path::parse(self)
    }
}
