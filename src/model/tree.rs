use serde::{Deserialize, Serialize};

/// The four levels of a task tree, outermost first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Category,
    Project,
    Task,
    Subtask,
}

impl Level {
    /// Nesting depth (0 = category)
    pub fn depth(self) -> usize {
        match self {
            Level::Category => 0,
            Level::Project => 1,
            Level::Task => 2,
            Level::Subtask => 3,
        }
    }

    /// The level at a given depth, if any
    pub fn from_depth(depth: usize) -> Option<Level> {
        match depth {
            0 => Some(Level::Category),
            1 => Some(Level::Project),
            2 => Some(Level::Task),
            3 => Some(Level::Subtask),
            _ => None,
        }
    }

    /// Glyph used by the rendered summary
    pub fn glyph(self) -> &'static str {
        match self {
            Level::Category => "📁",
            Level::Project => "📋",
            Level::Task => "✓",
            Level::Subtask => "•",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::Category => write!(f, "category"),
            Level::Project => write!(f, "project"),
            Level::Task => write!(f, "task"),
            Level::Subtask => write!(f, "subtask"),
        }
    }
}

/// Root of the hierarchy: an ordered list of categories
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTree {
    pub categories: Vec<Category>,
}

/// Top level grouping (e.g. "Household", "Academic")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Stable identifier assigned by the backend; absent for local nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    #[serde(default)]
    pub projects: Vec<Project>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    /// Free-text references, display only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    /// Breakdown request flag. `None` and `Some(false)` both mean "not flagged"
    /// but are kept distinct so JSON round-trips stay lossless.
    #[serde(
        rename = "needsBreakdown",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub needs_breakdown: Option<bool>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(
        rename = "needsBreakdown",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub needs_breakdown: Option<bool>,
}

impl TaskTree {
    pub fn new() -> Self {
        TaskTree::default()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Total number of nodes at every level
    pub fn node_count(&self) -> usize {
        self.categories
            .iter()
            .map(|c| {
                1 + c
                    .projects
                    .iter()
                    .map(|p| {
                        1 + p
                            .tasks
                            .iter()
                            .map(|t| 1 + t.subtasks.len())
                            .sum::<usize>()
                    })
                    .sum::<usize>()
            })
            .sum()
    }
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Category {
            id: None,
            name: name.into(),
            emoji: None,
            projects: Vec::new(),
        }
    }
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Project {
            id: None,
            name: name.into(),
            emoji: None,
            dependencies: Vec::new(),
            tasks: Vec::new(),
        }
    }
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        Task {
            id: None,
            name: name.into(),
            emoji: None,
            dependencies: Vec::new(),
            needs_breakdown: None,
            subtasks: Vec::new(),
        }
    }

    /// Whether the task has no subtasks (only then is its own flag meaningful)
    pub fn is_leaf(&self) -> bool {
        self.subtasks.is_empty()
    }

    /// The flag as stored on the task itself
    pub fn is_flagged(&self) -> bool {
        self.needs_breakdown == Some(true)
    }

    /// Breakdown state as the user sees it: the task's own flag while it is a
    /// leaf, otherwise whether any subtask is flagged.
    pub fn effective_needs_breakdown(&self) -> bool {
        if self.is_leaf() {
            self.is_flagged()
        } else {
            self.subtasks.iter().any(Subtask::is_flagged)
        }
    }
}

impl Subtask {
    pub fn new(name: impl Into<String>) -> Self {
        Subtask {
            id: None,
            name: name.into(),
            emoji: None,
            dependencies: Vec::new(),
            needs_breakdown: None,
        }
    }

    pub fn is_flagged(&self) -> bool {
        self.needs_breakdown == Some(true)
    }
}

/// Borrowed view of any node, used for level-agnostic reads
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Category(&'a Category),
    Project(&'a Project),
    Task(&'a Task),
    Subtask(&'a Subtask),
}

impl<'a> NodeRef<'a> {
    pub fn level(&self) -> Level {
        match self {
            NodeRef::Category(_) => Level::Category,
            NodeRef::Project(_) => Level::Project,
            NodeRef::Task(_) => Level::Task,
            NodeRef::Subtask(_) => Level::Subtask,
        }
    }

    pub fn id(&self) -> Option<&'a str> {
        match self {
            NodeRef::Category(c) => c.id.as_deref(),
            NodeRef::Project(p) => p.id.as_deref(),
            NodeRef::Task(t) => t.id.as_deref(),
            NodeRef::Subtask(s) => s.id.as_deref(),
        }
    }

    pub fn name(&self) -> &'a str {
        match self {
            NodeRef::Category(c) => &c.name,
            NodeRef::Project(p) => &p.name,
            NodeRef::Task(t) => &t.name,
            NodeRef::Subtask(s) => &s.name,
        }
    }

    pub fn emoji(&self) -> Option<&'a str> {
        match self {
            NodeRef::Category(c) => c.emoji.as_deref(),
            NodeRef::Project(p) => p.emoji.as_deref(),
            NodeRef::Task(t) => t.emoji.as_deref(),
            NodeRef::Subtask(s) => s.emoji.as_deref(),
        }
    }

    /// Dependencies (categories have none)
    pub fn dependencies(&self) -> &'a [String] {
        match self {
            NodeRef::Category(_) => &[],
            NodeRef::Project(p) => &p.dependencies,
            NodeRef::Task(t) => &t.dependencies,
            NodeRef::Subtask(s) => &s.dependencies,
        }
    }
}
