use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Character separating segments in the textual form of a path.
pub const SEPARATOR: char = '/';

/// A hierarchical object address such as `bucket/photos/2024/a.jpg`.
///
/// A path is an ordered sequence of non-empty segments. No segment contains
/// `/`. The empty sequence is the root path: it is a valid listing prefix
/// (meaning "everything") but never addresses a stored object.
///
/// Ordering is segment-wise lexicographic, which is exactly the byte order
/// of the encoded keys produced by [`crate::codec::encode`].
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// The root (empty) path.
    pub const fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Build a path from explicit segments, validating each one.
    pub fn new<I, S>(segments: I) -> Result<Self, TypeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        for segment in &segments {
            validate_segment(segment, &segments)?;
        }
        Ok(Self { segments })
    }

    /// Parse the slash-delimited textual form.
    ///
    /// One leading and one trailing `/` are ignored, so `"/a/b/"` and
    /// `"a/b"` name the same path. Interior empty segments (`"a//b"`) are
    /// rejected. The empty string is the root path.
    ///
    /// ```
    /// use pathdb_types::Path;
    ///
    /// let p = Path::parse("bucket/a/b").unwrap();
    /// assert_eq!(p.depth(), 3);
    /// assert!(Path::parse("").unwrap().is_root());
    /// assert!(Path::parse("a//b").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let trimmed = s.strip_prefix(SEPARATOR).unwrap_or(s);
        let trimmed = trimmed.strip_suffix(SEPARATOR).unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        let mut segments = Vec::new();
        for segment in trimmed.split(SEPARATOR) {
            if segment.is_empty() {
                return Err(TypeError::InvalidPath {
                    path: s.to_string(),
                    reason: "empty segment".into(),
                });
            }
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    /// Segments already validated by the key codec.
    pub(crate) fn from_validated(segments: Vec<String>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The final segment, if any.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// The path with the final segment removed. The root has no parent.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(self.truncated(self.depth() - 1))
    }

    /// Append one segment.
    pub fn join(&self, segment: &str) -> Result<Self, TypeError> {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        validate_segment(segment, &segments)?;
        Ok(Self { segments })
    }

    /// Concatenate two paths.
    pub fn concat(&self, other: &Path) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// The ancestor (or self) holding the first `depth` segments.
    pub fn truncated(&self, depth: usize) -> Self {
        let depth = depth.min(self.depth());
        Self {
            segments: self.segments[..depth].to_vec(),
        }
    }

    /// Returns `true` if `prefix` is this path or one of its ancestors.
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Returns `true` if this path lies strictly below `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &Path) -> bool {
        self.depth() > ancestor.depth() && self.starts_with(ancestor)
    }
}

fn validate_segment(segment: &str, all: &[String]) -> Result<(), TypeError> {
    let reason = if segment.is_empty() {
        "empty segment"
    } else if segment.contains(SEPARATOR) {
        "segment contains '/'"
    } else {
        return Ok(());
    };
    Err(TypeError::InvalidPath {
        path: all.join("/"),
        reason: reason.into(),
    })
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({self})")
    }
}

impl FromStr for Path {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
