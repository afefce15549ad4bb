use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::tree::Level;

/// Error parsing a dotted index path like `0.2.1`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathParseError {
    #[error("empty path")]
    Empty,
    #[error("path has {0} segments; a task tree has at most 4 levels")]
    TooDeep(usize),
    #[error("invalid path segment: {0:?}")]
    BadSegment(String),
}

/// Position of a node in the tree: `[cat]`, `[cat, proj]`, `[cat, proj, task]`
/// or `[cat, proj, task, sub]`.
///
/// Positions are only meaningful against the tree they were computed from.
/// Inserting or removing a sibling shifts every later index, so a stored path
/// may silently point at a different node after a structural edit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexPath(Vec<usize>);

impl IndexPath {
    pub fn category(cat: usize) -> Self {
        IndexPath(vec![cat])
    }

    pub fn project(cat: usize, proj: usize) -> Self {
        IndexPath(vec![cat, proj])
    }

    pub fn task(cat: usize, proj: usize, task: usize) -> Self {
        IndexPath(vec![cat, proj, task])
    }

    pub fn subtask(cat: usize, proj: usize, task: usize, sub: usize) -> Self {
        IndexPath(vec![cat, proj, task, sub])
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    /// Level of the node this path addresses
    pub fn level(&self) -> Level {
        // Construction guarantees 1..=4 segments
        Level::from_depth(self.0.len() - 1).unwrap_or(Level::Subtask)
    }

    /// Path of the parent node, `None` for categories
    pub fn parent(&self) -> Option<IndexPath> {
        if self.0.len() <= 1 {
            None
        } else {
            Some(IndexPath(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Path of the `idx`-th child, `None` below subtasks
    pub fn child(&self, idx: usize) -> Option<IndexPath> {
        if self.0.len() >= 4 {
            return None;
        }
        let mut v = self.0.clone();
        v.push(idx);
        Some(IndexPath(v))
    }

    /// Last index (position among siblings)
    pub fn last(&self) -> usize {
        self.0.last().copied().unwrap_or(0)
    }

    /// Whether `self` lies strictly beneath `ancestor`
    pub fn is_descendant_of(&self, ancestor: &IndexPath) -> bool {
        self.0.len() > ancestor.0.len() && self.0.starts_with(&ancestor.0)
    }
}

impl TryFrom<Vec<usize>> for IndexPath {
    type Error = PathParseError;

    fn try_from(v: Vec<usize>) -> Result<Self, Self::Error> {
        match v.len() {
            0 => Err(PathParseError::Empty),
            1..=4 => Ok(IndexPath(v)),
            n => Err(PathParseError::TooDeep(n)),
        }
    }
}

impl FromStr for IndexPath {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PathParseError::Empty);
        }
        let parts = s
            .split('.')
            .map(|p| {
                p.parse::<usize>()
                    .map_err(|_| PathParseError::BadSegment(p.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        IndexPath::try_from(parts)
    }
}

impl fmt::Display for IndexPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for idx in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{}", idx)?;
            first = false;
        }
        Ok(())
    }
}

impl Serialize for IndexPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IndexPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Identity of a node: its stable id when it has one, otherwise its position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKey {
    StableId(String),
    Positional(IndexPath),
}

impl NodeKey {
    /// Key for a node with an optional id at `path`
    pub fn for_node(id: Option<&str>, path: &IndexPath) -> NodeKey {
        match id {
            Some(id) => NodeKey::StableId(id.to_string()),
            None => NodeKey::Positional(path.clone()),
        }
    }

    /// Interpret a raw completion key. Keys that parse as an index path are
    /// treated as positional; anything else is a stable id.
    pub fn parse_loose(raw: &str) -> NodeKey {
        match raw.parse::<IndexPath>() {
            Ok(path) => NodeKey::Positional(path),
            Err(_) => NodeKey::StableId(raw.to_string()),
        }
    }

    pub fn is_positional(&self) -> bool {
        matches!(self, NodeKey::Positional(_))
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKey::StableId(id) => f.write_str(id),
            NodeKey::Positional(path) => write!(f, "{}", path),
        }
    }
}
