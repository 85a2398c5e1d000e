//! Schema path parsing
//!
//! Paths are `/`-separated segments, each optionally `prefix:name`, with `..`
//! for the parent. Bracketed predicates (list key selectors) are stripped
//! before segmentation since they never change which schema node is reached.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

// Each `[...]` is removed on its own
static PREDICATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]").expect("predicate pattern is valid"));

/// One step of a schema path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// `..`
    Parent,
    /// `.`
    Current,
    /// `prefix:name` or `name`
    Step { prefix: Option<String>, name: String },
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Parent => f.write_str(".."),
            Segment::Current => f.write_str("."),
            Segment::Step { prefix: Some(p), name } => write!(f, "{}:{}", p, name),
            Segment::Step { prefix: None, name } => f.write_str(name),
        }
    }
}

/// A parsed absolute or relative schema path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaPath {
    raw: String,
    absolute: bool,
    segments: Vec<Segment>,
}

impl SchemaPath {
    pub fn parse(raw: &str) -> Self {
        let stripped = PREDICATE.replace_all(raw.trim(), "");
        let absolute = stripped.starts_with('/');

        let segments = stripped
            .split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| match s {
                ".." => Segment::Parent,
                "." => Segment::Current,
                _ => {
                    let (prefix, name) = split_qualified(s);
                    Segment::Step {
                        prefix: prefix.map(str::to_string),
                        name: name.to_string(),
                    }
                }
            })
            .collect();

        Self {
            raw: raw.to_string(),
            absolute,
            segments,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Prefix of the first segment, which selects the start module of an
    /// absolute path
    pub fn leading_prefix(&self) -> Option<&str> {
        match self.segments.first() {
            Some(Segment::Step { prefix: Some(p), .. }) => Some(p),
            _ => None,
        }
    }

    /// Rendering of the first `count` segments, as reached so far
    pub fn accumulated(&self, count: usize) -> String {
        let joined = self.segments[..count.min(self.segments.len())]
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join("/");
        if self.absolute {
            format!("/{}", joined)
        } else {
            joined
        }
    }
}

/// Split `prefix:name` into its parts; unprefixed names yield `None`
pub fn split_qualified(qualified: &str) -> (Option<&str>, &str) {
    match qualified.split_once(':') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, qualified),
    }
}
