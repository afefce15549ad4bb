pub mod http;

use serde::{Deserialize, Serialize};

use crate::model::saved::Stage;
use crate::model::todo::TodoEntry;
use crate::model::tree::TaskTree;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Non-2xx reply; `detail` is the backend's own message when it sent one
    #[error("backend returned {code}: {detail}")]
    Status { code: u16, detail: String },
    #[error("could not reach backend: {0}")]
    Transport(String),
    #[error("unexpected backend response: {message}")]
    Decode {
        message: String,
        /// Raw response body, for the recovery log
        body: String,
    },
}

/// `POST /api/create-task-tree`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateTreeRequest {
    pub prompt: String,
    pub context: Option<String>,
    pub existing_task_tree: Option<TaskTree>,
}

/// `POST /api/refine-task-tree`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefineRequest {
    pub task_tree: TaskTree,
}

/// `POST /api/generate-todo`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TodoRequest {
    pub task_tree: TaskTree,
    pub custom_prompt: Option<String>,
}

/// Reply to create and refine
#[derive(Debug, Clone, PartialEq)]
pub struct TreeResponse {
    pub task_tree: TaskTree,
    pub stage: Stage,
    /// Server-rendered summary, when the backend sends one
    pub formatted_tree: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TodoResponse {
    pub todo_items: Vec<TodoEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OcrResponse {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: String,
}

/// The planning backend: turns brain dumps into task trees, refines trees,
/// derives to-do items and reads text out of images.
pub trait PlannerBackend {
    fn create_task_tree(&self, request: &CreateTreeRequest) -> Result<TreeResponse, ApiError>;
    fn refine_task_tree(&self, request: &RefineRequest) -> Result<TreeResponse, ApiError>;
    fn generate_todo(&self, request: &TodoRequest) -> Result<TodoResponse, ApiError>;
    /// Upload an image and return the text read from it
    fn extract_text_from_image(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, ApiError>;
    fn health(&self) -> Result<HealthStatus, ApiError>;
}
