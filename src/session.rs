use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

use crate::api::{ApiError, CreateTreeRequest, PlannerBackend, RefineRequest, TodoRequest};
use crate::io::recovery::{self, RecoveryCategory, RecoveryEntry};
use crate::model::saved::{SavedTree, SessionDraft, Stage};
use crate::model::todo::TodoEntry;
use crate::model::tree::TaskTree;
use crate::ops::cascade;
use crate::ops::check::{check_tree, CheckResult};
use crate::ops::merge::{accept_full, extract_selection, merge_refined, MergeError, MergeReport};
use crate::ops::tree_ops::TreeError;
use crate::parse::summary::format_tree;
use crate::parse::tree_json::{parse_tree, serialize_tree, TreeJsonError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("a backend request is already in progress")]
    Busy,
    #[error("no task tree loaded (run `pt generate` or `pt load`)")]
    NoTree,
    #[error("enter at least one brain dump or add a file")]
    EmptyBrainDump,
    #[error("task tree is invalid: {0}")]
    Invalid(String),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error(transparent)]
    Json(#[from] TreeJsonError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

// ---------------------------------------------------------------------------
// Single-flight guard
// ---------------------------------------------------------------------------

/// Marks a backend call as in flight. The flag clears when the guard drops,
/// whether the call returned, failed or panicked.
pub struct FlightGuard {
    busy: Rc<Cell<bool>>,
}

impl FlightGuard {
    fn start(busy: &Rc<Cell<bool>>) -> Result<Self, SessionError> {
        if busy.get() {
            return Err(SessionError::Busy);
        }
        busy.set(true);
        Ok(FlightGuard {
            busy: Rc::clone(busy),
        })
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.busy.set(false);
    }
}

// ---------------------------------------------------------------------------
// Brain dump
// ---------------------------------------------------------------------------

/// Raw input for tree generation
#[derive(Debug, Clone, Default)]
pub struct BrainDump {
    pub texts: Vec<String>,
    /// `(file name, contents)` of uploaded text files or OCR results
    pub files: Vec<(String, String)>,
    pub context: Option<String>,
}

impl BrainDump {
    /// Join the non-empty dumps and file contents with blank lines.
    pub fn assemble(&self) -> Result<String, SessionError> {
        let mut parts: Vec<String> = self
            .texts
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        for (name, content) in &self.files {
            parts.push(format!("[From file: {}]\n{}", name, content));
        }
        if parts.is_empty() {
            return Err(SessionError::EmptyBrainDump);
        }
        Ok(parts.join("\n\n"))
    }

    fn context(&self) -> Option<String> {
        self.context
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
    }
}

/// How much of the tree a refine sends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefineMode {
    /// Send the whole tree, take the reply as the new tree
    Full,
    /// Send only what is flagged for breakdown, merge the reply back by name
    Selected,
}

/// What a generate or refine did to the tree
#[derive(Debug)]
pub struct Outcome {
    pub stage: Stage,
    /// Present for selective refines
    pub merge: Option<MergeReport>,
    pub check: CheckResult,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The current tree and its two derived views.
///
/// The tree is the only source of truth. Every change goes through a method
/// here, which swaps in a new tree and republishes the JSON text and the
/// summary. The only way back from text is [`Session::apply_json`].
pub struct Session {
    tree: Option<TaskTree>,
    stage: Option<Stage>,
    json_view: String,
    summary_view: String,
    busy: Rc<Cell<bool>>,
    recovery_dir: Option<PathBuf>,
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Session {
            tree: None,
            stage: None,
            json_view: String::new(),
            summary_view: String::new(),
            busy: Rc::new(Cell::new(false)),
            recovery_dir: None,
        }
    }

    /// Rejected imports and unusable backend replies get logged under `dir`
    pub fn with_recovery_dir(mut self, dir: PathBuf) -> Self {
        self.recovery_dir = Some(dir);
        self
    }

    pub fn from_draft(draft: SessionDraft) -> Result<Self, SessionError> {
        let mut session = Session::new();
        session.replace(draft.task_tree, draft.stage)?;
        Ok(session)
    }

    pub fn to_draft(&self) -> Option<SessionDraft> {
        self.tree.as_ref().map(|tree| SessionDraft {
            task_tree: tree.clone(),
            stage: self.stage,
        })
    }

    pub fn tree(&self) -> Option<&TaskTree> {
        self.tree.as_ref()
    }

    pub fn require_tree(&self) -> Result<&TaskTree, SessionError> {
        self.tree.as_ref().ok_or(SessionError::NoTree)
    }

    pub fn stage(&self) -> Option<Stage> {
        self.stage
    }

    pub fn json_view(&self) -> &str {
        &self.json_view
    }

    pub fn summary_view(&self) -> &str {
        &self.summary_view
    }

    pub fn is_busy(&self) -> bool {
        self.busy.get()
    }

    /// Mark a backend call as started. Fails if one is already running.
    pub fn begin_flight(&self) -> Result<FlightGuard, SessionError> {
        FlightGuard::start(&self.busy)
    }

    /// Drop the current tree (start over)
    pub fn clear(&mut self) {
        self.tree = None;
        self.stage = None;
        self.json_view.clear();
        self.summary_view.clear();
    }

    // -- publishing --

    /// Swap in `tree` and regenerate both views. Nothing changes on error.
    fn replace(&mut self, tree: TaskTree, stage: Option<Stage>) -> Result<(), SessionError> {
        let json = serialize_tree(&tree)?;
        self.summary_view = format_tree(&tree);
        self.json_view = json;
        self.tree = Some(tree);
        self.stage = stage;
        Ok(())
    }

    /// Apply an edit to a copy of the tree and swap it in on success.
    pub fn mutate<T>(
        &mut self,
        edit: impl FnOnce(&mut TaskTree) -> Result<T, TreeError>,
    ) -> Result<T, SessionError> {
        let mut next = self.require_tree()?.clone();
        let out = edit(&mut next)?;
        self.replace(next, self.stage)?;
        Ok(out)
    }

    /// Replace the tree from edited JSON text.
    ///
    /// The text must parse and pass validation; otherwise the tree and both
    /// views are left as they were and the text goes to the recovery log.
    pub fn apply_json(&mut self, text: &str) -> Result<CheckResult, SessionError> {
        let parsed = match parse_tree(text) {
            Ok(tree) => tree,
            Err(e) => {
                self.log_rejected("apply", &e.to_string(), text);
                return Err(e.into());
            }
        };
        let check = check_tree(&parsed);
        if !check.valid {
            let reason = invalid_reason(&check);
            self.log_rejected("apply", &reason, text);
            return Err(SessionError::Invalid(reason));
        }
        let stage = self.stage.or(Some(Stage::Initial));
        self.replace(parsed, stage)?;
        Ok(check)
    }

    /// Make a saved tree the current tree
    pub fn load_saved(&mut self, saved: SavedTree) -> Result<(), SessionError> {
        self.replace(saved.task_tree, Some(Stage::Loaded))
    }

    /// Set every task and subtask breakdown flag. Returns the nodes touched.
    pub fn set_all_breakdown(&mut self, value: bool) -> Result<usize, SessionError> {
        self.mutate(|tree| Ok(cascade::set_all_breakdown(tree, value)))
    }

    // -- backend calls --

    /// Generate a tree from a brain dump. The current tree, if any, is sent
    /// along so the backend can fold the new items into it.
    pub fn generate(
        &mut self,
        backend: &dyn PlannerBackend,
        dump: &BrainDump,
    ) -> Result<Outcome, SessionError> {
        let prompt = dump.assemble()?;
        let request = CreateTreeRequest {
            prompt,
            context: dump.context(),
            existing_task_tree: self.tree.clone(),
        };

        let response = {
            let _flight = self.begin_flight()?;
            backend
                .create_task_tree(&request)
                .map_err(|e| self.log_api_error("create-task-tree", e))?
        };

        let check = self.accept_backend_tree("create-task-tree", &response.task_tree)?;
        self.replace(response.task_tree, Some(response.stage))?;
        Ok(Outcome {
            stage: response.stage,
            merge: None,
            check,
        })
    }

    /// Ask the backend to break the tree down further.
    pub fn refine(
        &mut self,
        backend: &dyn PlannerBackend,
        mode: RefineMode,
    ) -> Result<Outcome, SessionError> {
        let current = self.require_tree()?;
        let request = RefineRequest {
            task_tree: match mode {
                RefineMode::Full => current.clone(),
                RefineMode::Selected => extract_selection(current)?,
            },
        };

        let response = {
            let _flight = self.begin_flight()?;
            backend
                .refine_task_tree(&request)
                .map_err(|e| self.log_api_error("refine-task-tree", e))?
        };

        let mut next = self.require_tree()?.clone();
        let merge = match mode {
            RefineMode::Full => {
                accept_full(&mut next, response.task_tree);
                None
            }
            RefineMode::Selected => Some(merge_refined(&mut next, response.task_tree)),
        };
        let check = self.accept_backend_tree("refine-task-tree", &next)?;
        self.replace(next, Some(response.stage))?;
        Ok(Outcome {
            stage: response.stage,
            merge,
            check,
        })
    }

    /// Ask the backend for to-do items derived from the current tree
    pub fn generate_ai_todo(
        &self,
        backend: &dyn PlannerBackend,
        custom_prompt: Option<&str>,
    ) -> Result<Vec<TodoEntry>, SessionError> {
        let request = TodoRequest {
            task_tree: self.require_tree()?.clone(),
            custom_prompt: custom_prompt
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
        };
        let _flight = self.begin_flight()?;
        let response = backend
            .generate_todo(&request)
            .map_err(|e| self.log_api_error("generate-todo", e))?;
        Ok(response.todo_items)
    }

    /// Read handwritten text from an image
    pub fn extract_text(
        &self,
        backend: &dyn PlannerBackend,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<String, SessionError> {
        let _flight = self.begin_flight()?;
        backend
            .extract_text_from_image(file_name, bytes)
            .map_err(|e| self.log_api_error("extract-text-from-image", e).into())
    }

    // -- recovery --

    fn log_rejected(&self, source: &str, reason: &str, text: &str) {
        if let Some(dir) = &self.recovery_dir {
            recovery::log_rejected_import(dir, source, reason, text);
        }
    }

    /// Validate a tree produced from a backend response. An invalid tree
    /// is refused and written to the recovery log.
    fn accept_backend_tree(&self, endpoint: &str, tree: &TaskTree) -> Result<CheckResult, SessionError> {
        let check = check_tree(tree);
        if check.valid {
            return Ok(check);
        }
        let reason = invalid_reason(&check);
        if let Some(dir) = &self.recovery_dir {
            let body = serialize_tree(tree).unwrap_or_default();
            recovery::log_recovery(
                dir,
                RecoveryEntry::new(RecoveryCategory::Backend, reason.clone(), body)
                    .with_field("Endpoint", endpoint),
            );
        }
        Err(SessionError::Invalid(reason))
    }

    fn log_api_error(&self, endpoint: &str, err: ApiError) -> ApiError {
        if let (Some(dir), ApiError::Decode { message, body }) = (&self.recovery_dir, &err) {
            recovery::log_recovery(
                dir,
                RecoveryEntry::new(RecoveryCategory::Backend, message.clone(), body.clone())
                    .with_field("Endpoint", endpoint),
            );
        }
        err
    }
}

fn invalid_reason(check: &CheckResult) -> String {
    check
        .errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{HealthStatus, TodoResponse, TreeResponse};
    use crate::model::identity::IndexPath;
    use crate::ops::tree_ops::{add_node, rename, InsertPosition};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Backend double: returns a canned tree (or error) and records requests.
    struct FakeBackend {
        reply: RefCell<Option<Result<TreeResponse, ApiError>>>,
        seen_refine: RefCell<Vec<TaskTree>>,
        seen_create: RefCell<Vec<CreateTreeRequest>>,
        was_busy_during_call: Rc<Cell<bool>>,
        busy_probe: Option<Rc<Cell<bool>>>,
    }

    impl FakeBackend {
        fn replying(reply: Result<TreeResponse, ApiError>) -> Self {
            FakeBackend {
                reply: RefCell::new(Some(reply)),
                seen_refine: RefCell::new(Vec::new()),
                seen_create: RefCell::new(Vec::new()),
                was_busy_during_call: Rc::new(Cell::new(false)),
                busy_probe: None,
            }
        }

        fn take_reply(&self) -> Result<TreeResponse, ApiError> {
            if let Some(probe) = &self.busy_probe {
                self.was_busy_during_call.set(probe.get());
            }
            self.reply
                .borrow_mut()
                .take()
                .unwrap_or_else(|| Err(ApiError::Transport("no more replies".into())))
        }
    }

    impl PlannerBackend for FakeBackend {
        fn create_task_tree(&self, request: &CreateTreeRequest) -> Result<TreeResponse, ApiError> {
            self.seen_create.borrow_mut().push(request.clone());
            self.take_reply()
        }

        fn refine_task_tree(&self, request: &RefineRequest) -> Result<TreeResponse, ApiError> {
            self.seen_refine.borrow_mut().push(request.task_tree.clone());
            self.take_reply()
        }

        fn generate_todo(&self, _request: &TodoRequest) -> Result<TodoResponse, ApiError> {
            Err(ApiError::Status {
                code: 500,
                detail: "model unavailable".into(),
            })
        }

        fn extract_text_from_image(&self, _name: &str, _bytes: Vec<u8>) -> Result<String, ApiError> {
            Ok("buy milk".into())
        }

        fn health(&self) -> Result<HealthStatus, ApiError> {
            Ok(HealthStatus {
                status: "healthy".into(),
            })
        }
    }

    fn tree_json() -> &'static str {
        r#"{
  "categories": [
    {
      "id": "c1",
      "name": "Home",
      "projects": [
        {
          "id": "p1",
          "name": "Kitchen",
          "tasks": [
            {"id": "t1", "name": "Oven", "needsBreakdown": true, "subtasks": []},
            {"id": "t2", "name": "Fridge", "subtasks": []}
          ]
        }
      ]
    },
    {"id": "c2", "name": "Work", "projects": []}
  ]
}"#
    }

    fn loaded_session() -> Session {
        let mut s = Session::new();
        s.apply_json(tree_json()).unwrap();
        s
    }

    fn tree_reply(json: &str, stage: Stage) -> Result<TreeResponse, ApiError> {
        Ok(TreeResponse {
            task_tree: parse_tree(json).unwrap(),
            stage,
            formatted_tree: None,
        })
    }

    // --- Views ---

    #[test]
    fn test_views_follow_edits() {
        let mut s = loaded_session();
        assert!(s.summary_view().contains("✓ Oven"));

        s.mutate(|t| rename(t, &IndexPath::task(0, 0, 0), "Range"))
            .unwrap();

        assert!(s.summary_view().contains("✓ Range"));
        assert!(s.json_view().contains("\"name\": \"Range\""));
        assert_eq!(parse_tree(s.json_view()).unwrap(), *s.tree().unwrap());
    }

    #[test]
    fn test_failed_edit_changes_nothing() {
        let mut s = loaded_session();
        let json = s.json_view().to_string();
        let err = s.mutate(|t| rename(t, &IndexPath::task(0, 0, 9), "x"));
        assert!(matches!(err, Err(SessionError::Tree(TreeError::NotFound(_)))));
        assert_eq!(s.json_view(), json);
    }

    #[test]
    fn test_mutate_without_tree() {
        let mut s = Session::new();
        assert!(matches!(
            s.mutate(|t| add_node(t, None, "A", InsertPosition::Bottom)),
            Err(SessionError::NoTree)
        ));
    }

    #[test]
    fn test_edits_keep_category_names_unique() {
        let mut s = loaded_session();
        assert!(matches!(
            s.mutate(|t| add_node(t, None, "Home", InsertPosition::Bottom)),
            Err(SessionError::Tree(TreeError::DuplicateCategory(_)))
        ));
        assert!(matches!(
            s.mutate(|t| rename(t, &IndexPath::category(1), "Home")),
            Err(SessionError::Tree(TreeError::DuplicateCategory(_)))
        ));
        s.mutate(|t| add_node(t, None, "Garden", InsertPosition::Top))
            .unwrap();

        // The session's own JSON view always re-applies cleanly
        let own = s.json_view().to_string();
        s.apply_json(&own).unwrap();
        assert_eq!(s.tree().unwrap().categories.len(), 3);
    }

    #[test]
    fn test_failed_apply_leaves_tree_and_views() {
        let tmp = TempDir::new().unwrap();
        let mut s = loaded_session().with_recovery_dir(tmp.path().to_path_buf());
        let tree = s.tree().cloned();
        let json = s.json_view().to_string();
        let summary = s.summary_view().to_string();

        assert!(matches!(s.apply_json("{\"categories\": [}"), Err(SessionError::Json(_))));
        assert!(matches!(
            s.apply_json(r#"{"categories":[{"name":"A","projects":[]},{"name":"A","projects":[]}]}"#),
            Err(SessionError::Invalid(_))
        ));

        assert_eq!(s.tree().cloned(), tree);
        assert_eq!(s.json_view(), json);
        assert_eq!(s.summary_view(), summary);

        let logged = recovery::read_recovery_entries(tmp.path(), None, None);
        assert_eq!(logged.len(), 2);
        assert_eq!(logged[1].body, "{\"categories\": [}");
    }

    #[test]
    fn test_apply_replaces_wholesale() {
        let mut s = loaded_session();
        s.apply_json(r#"{"categories":[{"name":"Only","projects":[]}]}"#)
            .unwrap();
        assert_eq!(s.tree().unwrap().categories.len(), 1);
        assert_eq!(s.summary_view(), "📁 Only\n");
    }

    #[test]
    fn test_draft_round_trip() {
        let s = loaded_session();
        let draft = s.to_draft().unwrap();
        let restored = Session::from_draft(draft).unwrap();
        assert_eq!(restored.tree(), s.tree());
        assert_eq!(restored.json_view(), s.json_view());
    }

    // --- Brain dump ---

    #[test]
    fn test_brain_dump_assembly() {
        let dump = BrainDump {
            texts: vec!["  call plumber ".into(), "   ".into(), "taxes".into()],
            files: vec![("notes.txt".into(), "buy milk".into())],
            context: None,
        };
        assert_eq!(
            dump.assemble().unwrap(),
            "call plumber\n\ntaxes\n\n[From file: notes.txt]\nbuy milk"
        );
        assert!(matches!(
            BrainDump::default().assemble(),
            Err(SessionError::EmptyBrainDump)
        ));
    }

    // --- Backend calls ---

    #[test]
    fn test_generate_sends_existing_tree() {
        let mut s = loaded_session();
        let backend = FakeBackend::replying(tree_reply(
            r#"{"categories":[{"id":"n","name":"New","projects":[]}]}"#,
            Stage::Initial,
        ));
        let dump = BrainDump {
            texts: vec!["more stuff".into()],
            files: vec![],
            context: Some("  weekend ".into()),
        };
        let outcome = s.generate(&backend, &dump).unwrap();
        assert_eq!(outcome.stage, Stage::Initial);

        let sent = &backend.seen_create.borrow()[0];
        assert_eq!(sent.context.as_deref(), Some("weekend"));
        assert_eq!(sent.existing_task_tree.as_ref().unwrap().categories.len(), 2);
        assert_eq!(s.tree().unwrap().categories[0].name, "New");
    }

    #[test]
    fn test_selective_refine_sends_pruned_and_merges() {
        let mut s = loaded_session();
        let backend = FakeBackend::replying(tree_reply(
            r#"{"categories":[{"name":"Home","projects":[{"name":"Kitchen","tasks":[
                {"name":"Oven","subtasks":[{"name":"S1"},{"name":"S2"}]}
            ]}]}]}"#,
            Stage::Refined,
        ));

        let outcome = s.refine(&backend, RefineMode::Selected).unwrap();

        let sent = &backend.seen_refine.borrow()[0];
        assert_eq!(sent.categories.len(), 1);
        assert_eq!(sent.categories[0].projects[0].tasks.len(), 1);

        let tree = s.tree().unwrap();
        assert_eq!(tree.categories.len(), 2);
        let oven = &tree.categories[0].projects[0].tasks[0];
        assert_eq!(oven.subtasks.len(), 2);
        assert_eq!(oven.needs_breakdown, None);
        assert_eq!(s.stage(), Some(Stage::Refined));
        assert_eq!(outcome.merge.unwrap().replaced, vec![IndexPath::task(0, 0, 0)]);
    }

    #[test]
    fn test_selective_refine_with_nothing_flagged_makes_no_call() {
        let mut s = Session::new();
        s.apply_json(r#"{"categories":[{"name":"A","projects":[{"name":"P","tasks":[{"name":"T","subtasks":[]}]}]}]}"#)
            .unwrap();
        let backend = FakeBackend::replying(Err(ApiError::Transport("unused".into())));
        assert!(matches!(
            s.refine(&backend, RefineMode::Selected),
            Err(SessionError::Merge(MergeError::NothingSelected))
        ));
        assert!(backend.seen_refine.borrow().is_empty());
    }

    #[test]
    fn test_full_refine_replaces() {
        let mut s = loaded_session();
        let backend = FakeBackend::replying(tree_reply(
            r#"{"categories":[{"id":"c9","name":"Rebuilt","projects":[]}]}"#,
            Stage::Refined,
        ));
        let outcome = s.refine(&backend, RefineMode::Full).unwrap();
        assert!(outcome.merge.is_none());
        assert_eq!(backend.seen_refine.borrow()[0].categories.len(), 2);
        assert_eq!(s.tree().unwrap().categories[0].name, "Rebuilt");
    }

    #[test]
    fn test_invalid_backend_tree_is_refused_and_logged() {
        let tmp = TempDir::new().unwrap();
        let mut s = loaded_session().with_recovery_dir(tmp.path().to_path_buf());
        let before = s.json_view().to_string();
        let backend = FakeBackend::replying(tree_reply(
            r#"{"categories":[{"name":"Errands","projects":[]},{"name":"Errands","projects":[]}]}"#,
            Stage::Refined,
        ));

        assert!(matches!(
            s.refine(&backend, RefineMode::Full),
            Err(SessionError::Invalid(_))
        ));
        assert_eq!(s.json_view(), before);
        assert!(!s.is_busy());

        let logged = recovery::read_recovery_entries(tmp.path(), None, None);
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].category, RecoveryCategory::Backend);
        assert_eq!(logged[0].fields["Endpoint"], "refine-task-tree");
        assert!(logged[0].body.contains("\"Errands\""));
    }

    #[test]
    fn test_busy_flag_set_during_call_and_cleared_after_failure() {
        let mut s = loaded_session();
        let mut backend = FakeBackend::replying(Err(ApiError::Status {
            code: 500,
            detail: "boom".into(),
        }));
        backend.busy_probe = Some(Rc::clone(&s.busy));
        let before = s.json_view().to_string();

        assert!(matches!(s.refine(&backend, RefineMode::Full), Err(SessionError::Api(_))));

        assert!(backend.was_busy_during_call.get());
        assert!(!s.is_busy());
        assert_eq!(s.json_view(), before);
    }

    #[test]
    fn test_second_call_while_busy_is_rejected() {
        let s = loaded_session();
        let backend = FakeBackend::replying(Err(ApiError::Transport("unused".into())));
        let flight = s.begin_flight().unwrap();
        assert!(matches!(
            s.extract_text(&backend, "note.png", vec![1, 2, 3]),
            Err(SessionError::Busy)
        ));
        drop(flight);
        assert_eq!(s.extract_text(&backend, "note.png", vec![1]).unwrap(), "buy milk");
        assert!(!s.is_busy());
    }

    #[test]
    fn test_ai_todo_error_surfaces() {
        let s = loaded_session();
        let backend = FakeBackend::replying(Err(ApiError::Transport("unused".into())));
        match s.generate_ai_todo(&backend, Some("short")) {
            Err(SessionError::Api(ApiError::Status { code, detail })) => {
                assert_eq!(code, 500);
                assert_eq!(detail, "model unavailable");
            }
            other => panic!("expected status error, got {:?}", other),
        }
        assert!(!s.is_busy());
    }

    #[test]
    fn test_decode_failure_is_logged() {
        let tmp = TempDir::new().unwrap();
        let mut s = loaded_session().with_recovery_dir(tmp.path().to_path_buf());
        let backend = FakeBackend::replying(Err(ApiError::Decode {
            message: "missing task_tree".into(),
            body: "{\"oops\":1}".into(),
        }));
        assert!(s.refine(&backend, RefineMode::Full).is_err());
        let logged = recovery::read_recovery_entries(tmp.path(), None, None);
        assert_eq!(logged[0].category, RecoveryCategory::Backend);
        assert_eq!(logged[0].body, "{\"oops\":1}");
    }
}
