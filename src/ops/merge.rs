use crate::model::identity::IndexPath;
use crate::model::tree::{Category, Project, Task, TaskTree};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    #[error("no tasks or subtasks selected for breakdown")]
    NothingSelected,
}

/// Outcome of folding a refine response back into the tree it came from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Paths (in the original tree) of tasks that were replaced
    pub replaced: Vec<IndexPath>,
    /// Response nodes with no same-named counterpart, as `Cat / Project / Task`
    pub unmatched: Vec<String>,
    /// Matched nodes that share their name with a later sibling. Only the
    /// first of the group was updated.
    pub ambiguous: Vec<IndexPath>,
}

impl MergeReport {
    pub fn is_clean(&self) -> bool {
        self.unmatched.is_empty() && self.ambiguous.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Selective extraction
// ---------------------------------------------------------------------------

/// Reduce `tree` to the part flagged for breakdown.
///
/// A flagged task is kept with all of its subtasks. An unflagged task is kept
/// only if some subtask is flagged, and then carries just those subtasks.
/// Projects and categories left empty are dropped.
pub fn extract_selection(tree: &TaskTree) -> Result<TaskTree, MergeError> {
    let categories: Vec<Category> = tree
        .categories
        .iter()
        .filter_map(|cat| {
            let projects: Vec<Project> = cat
                .projects
                .iter()
                .filter_map(|proj| {
                    let tasks: Vec<Task> = proj.tasks.iter().filter_map(select_task).collect();
                    (!tasks.is_empty()).then(|| Project {
                        tasks,
                        ..proj.clone()
                    })
                })
                .collect();
            (!projects.is_empty()).then(|| Category {
                projects,
                ..cat.clone()
            })
        })
        .collect();

    if categories.is_empty() {
        return Err(MergeError::NothingSelected);
    }
    Ok(TaskTree { categories })
}

fn select_task(task: &Task) -> Option<Task> {
    if task.is_flagged() {
        return Some(task.clone());
    }
    let subtasks: Vec<_> = task
        .subtasks
        .iter()
        .filter(|s| s.is_flagged())
        .cloned()
        .collect();
    (!subtasks.is_empty()).then(|| Task {
        subtasks,
        ..task.clone()
    })
}

// ---------------------------------------------------------------------------
// Merge-back
// ---------------------------------------------------------------------------

/// Fold a selective-refine response into the original, unpruned tree.
///
/// Categories, projects and tasks are joined by exact name at each level; the
/// first same-named sibling wins. Every matched task is replaced by the
/// refined one with its breakdown flag cleared. Everything the response does
/// not mention is left alone.
pub fn merge_refined(original: &mut TaskTree, refined: TaskTree) -> MergeReport {
    let mut report = MergeReport::default();

    for rcat in refined.categories {
        let Some(ci) = first_named(&original.categories, &rcat.name, |c| &c.name) else {
            report.unmatched.push(rcat.name);
            continue;
        };
        note_ambiguity(&mut report, &original.categories, ci, |c| &c.name, || {
            IndexPath::category(ci)
        });

        for rproj in rcat.projects {
            let projects = &original.categories[ci].projects;
            let Some(pi) = first_named(projects, &rproj.name, |p| &p.name) else {
                report
                    .unmatched
                    .push(format!("{} / {}", rcat.name, rproj.name));
                continue;
            };
            note_ambiguity(&mut report, projects, pi, |p| &p.name, || {
                IndexPath::project(ci, pi)
            });

            for mut rtask in rproj.tasks {
                let tasks = &original.categories[ci].projects[pi].tasks;
                let Some(ti) = first_named(tasks, &rtask.name, |t| &t.name) else {
                    report.unmatched.push(format!(
                        "{} / {} / {}",
                        rcat.name, rproj.name, rtask.name
                    ));
                    continue;
                };
                note_ambiguity(&mut report, tasks, ti, |t| &t.name, || {
                    IndexPath::task(ci, pi, ti)
                });

                rtask.needs_breakdown = None;
                original.categories[ci].projects[pi].tasks[ti] = rtask;
                report.replaced.push(IndexPath::task(ci, pi, ti));
            }
        }
    }

    report
}

/// Full refine: the response becomes the tree.
pub fn accept_full(current: &mut TaskTree, replacement: TaskTree) {
    *current = replacement;
}

fn first_named<T>(items: &[T], name: &str, name_of: impl Fn(&T) -> &String) -> Option<usize> {
    items.iter().position(|item| name_of(item) == name)
}

fn note_ambiguity<T>(
    report: &mut MergeReport,
    siblings: &[T],
    matched: usize,
    name_of: impl Fn(&T) -> &String,
    path: impl FnOnce() -> IndexPath,
) {
    let name = name_of(&siblings[matched]);
    let dupes = siblings.iter().filter(|s| name_of(s) == name).count();
    if dupes > 1 {
        let path = path();
        if !report.ambiguous.contains(&path) {
            report.ambiguous.push(path);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tree::Subtask;
    use pretty_assertions::assert_eq;

    fn task(name: &str, flagged: bool, subs: &[(&str, bool)]) -> Task {
        let mut t = Task::new(name);
        if flagged {
            t.needs_breakdown = Some(true);
        }
        t.subtasks = subs
            .iter()
            .map(|(n, f)| {
                let mut s = Subtask::new(*n);
                if *f {
                    s.needs_breakdown = Some(true);
                }
                s
            })
            .collect();
        t
    }

    fn project(name: &str, tasks: Vec<Task>) -> Project {
        let mut p = Project::new(name);
        p.tasks = tasks;
        p
    }

    fn category(name: &str, projects: Vec<Project>) -> Category {
        let mut c = Category::new(name);
        c.projects = projects;
        c
    }

    fn three_categories() -> TaskTree {
        TaskTree {
            categories: vec![
                category(
                    "Household",
                    vec![project(
                        "Kitchen",
                        vec![
                            task("Clean fridge", false, &[]),
                            task("Deep clean oven", true, &[]),
                        ],
                    )],
                ),
                category(
                    "Work",
                    vec![project("Report", vec![task("Draft", false, &[("Outline", false)])])],
                ),
                category("Health", vec![project("Gym", vec![task("Book trainer", false, &[])])]),
            ],
        }
    }

    // --- Extraction ---

    #[test]
    fn test_extract_single_flagged_task() {
        let pruned = extract_selection(&three_categories()).unwrap();
        assert_eq!(pruned.categories.len(), 1);
        assert_eq!(pruned.categories[0].name, "Household");
        assert_eq!(pruned.categories[0].projects.len(), 1);
        assert_eq!(pruned.categories[0].projects[0].tasks.len(), 1);
        assert_eq!(pruned.categories[0].projects[0].tasks[0].name, "Deep clean oven");
    }

    #[test]
    fn test_extract_flagged_task_keeps_all_subtasks() {
        let tree = TaskTree {
            categories: vec![category(
                "C",
                vec![project(
                    "P",
                    vec![task("T", true, &[("a", false), ("b", true), ("c", false)])],
                )],
            )],
        };
        let pruned = extract_selection(&tree).unwrap();
        assert_eq!(pruned.categories[0].projects[0].tasks[0].subtasks.len(), 3);
    }

    #[test]
    fn test_extract_flagged_subtasks_only() {
        let tree = TaskTree {
            categories: vec![category(
                "C",
                vec![project(
                    "P",
                    vec![task("T", false, &[("a", false), ("b", true), ("c", true)])],
                )],
            )],
        };
        let pruned = extract_selection(&tree).unwrap();
        let names: Vec<&str> = pruned.categories[0].projects[0].tasks[0]
            .subtasks
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[test]
    fn test_extract_nothing_flagged() {
        let mut tree = three_categories();
        tree.categories[0].projects[0].tasks[1].needs_breakdown = Some(false);
        assert_eq!(extract_selection(&tree), Err(MergeError::NothingSelected));
        assert_eq!(
            extract_selection(&TaskTree::new()),
            Err(MergeError::NothingSelected)
        );
    }

    #[test]
    fn test_extract_does_not_touch_input() {
        let tree = three_categories();
        let before = tree.clone();
        extract_selection(&tree).unwrap();
        assert_eq!(tree, before);
    }

    // --- Merge-back ---

    #[test]
    fn test_merge_replaces_task_and_clears_flag() {
        let mut original = three_categories();
        let refined = TaskTree {
            categories: vec![category(
                "Household",
                vec![project(
                    "Kitchen",
                    vec![task("Deep clean oven", true, &[("S1", false), ("S2", false)])],
                )],
            )],
        };

        let report = merge_refined(&mut original, refined);

        let oven = &original.categories[0].projects[0].tasks[1];
        let subs: Vec<&str> = oven.subtasks.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(subs, vec!["S1", "S2"]);
        assert_eq!(oven.needs_breakdown, None);
        assert_eq!(report.replaced, vec![IndexPath::task(0, 0, 1)]);
        assert!(report.is_clean());

        // Untouched siblings stay as they were
        assert_eq!(original.categories[0].projects[0].tasks[0].name, "Clean fridge");
        assert_eq!(original.categories.len(), 3);
    }

    #[test]
    fn test_merge_reports_unmatched() {
        let mut original = three_categories();
        let before = original.clone();
        let refined = TaskTree {
            categories: vec![
                category("Garden", vec![]),
                category("Work", vec![project("Report", vec![task("Renamed", false, &[])])]),
            ],
        };
        let report = merge_refined(&mut original, refined);
        assert_eq!(report.unmatched, vec!["Garden", "Work / Report / Renamed"]);
        assert!(report.replaced.is_empty());
        assert_eq!(original, before);
    }

    #[test]
    fn test_merge_duplicate_names_first_match_wins() {
        let mut original = TaskTree {
            categories: vec![category(
                "C",
                vec![project(
                    "P",
                    vec![task("Same", true, &[]), task("Same", true, &[])],
                )],
            )],
        };
        let refined = TaskTree {
            categories: vec![category(
                "C",
                vec![project("P", vec![task("Same", false, &[("new", false)])])],
            )],
        };

        let report = merge_refined(&mut original, refined);

        let tasks = &original.categories[0].projects[0].tasks;
        assert_eq!(tasks[0].subtasks.len(), 1);
        assert_eq!(tasks[0].needs_breakdown, None);
        // Known limitation: the second same-named task is never reached
        assert!(tasks[1].subtasks.is_empty());
        assert_eq!(tasks[1].needs_breakdown, Some(true));
        assert_eq!(report.ambiguous, vec![IndexPath::task(0, 0, 0)]);
    }

    #[test]
    fn test_accept_full_replaces_wholesale() {
        let mut current = three_categories();
        let replacement = TaskTree {
            categories: vec![category("Only", vec![])],
        };
        accept_full(&mut current, replacement.clone());
        assert_eq!(current, replacement);
    }
}
