use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{
    ApiError, CreateTreeRequest, HealthStatus, OcrResponse, PlannerBackend, RefineRequest,
    TodoRequest, TodoResponse, TreeResponse,
};
use crate::model::config::BackendConfig;
use crate::model::saved::Stage;
use crate::parse::tree_json::tree_from_value;

/// Blocking HTTP client for the planning backend
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, ApiError> {
        // No timeout unless configured: tree generation can take minutes
        let client = Client::builder()
            .timeout(config.timeout_secs.map(Duration::from_secs))
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(HttpBackend {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<String, ApiError> {
        send(self.client.post(self.url(path)).json(body))
    }
}

/// Send a request and return the body of a 2xx reply
fn send(request: RequestBuilder) -> Result<String, ApiError> {
    let response = request
        .send()
        .map_err(|e| ApiError::Transport(e.to_string()))?;
    let status = response.status();
    let body = response
        .text()
        .map_err(|e| ApiError::Transport(e.to_string()))?;
    if !status.is_success() {
        return Err(ApiError::Status {
            code: status.as_u16(),
            detail: error_detail(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            }),
        });
    }
    Ok(body)
}

/// The `detail` of an error body: a string, or the messages of a
/// validation error list.
fn error_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let msgs: Vec<&str> = items
                .iter()
                .filter_map(|i| i.get("msg").and_then(Value::as_str))
                .collect();
            (!msgs.is_empty()).then(|| msgs.join("; "))
        }
        other => Some(other.to_string()),
    }
}

fn decode<T: DeserializeOwned>(body: String) -> Result<T, ApiError> {
    serde_json::from_str(&body).map_err(|e| ApiError::Decode {
        message: e.to_string(),
        body,
    })
}

/// Decode a create/refine reply. The tree may arrive nested under extra
/// `task_tree` keys.
fn decode_tree_response(body: String, fallback_stage: Stage) -> Result<TreeResponse, ApiError> {
    let decode_err = |message: String, body: &str| ApiError::Decode {
        message,
        body: body.to_string(),
    };
    let mut value: Value = serde_json::from_str(&body).map_err(|e| decode_err(e.to_string(), &body))?;

    let stage = match value.get("stage") {
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| decode_err(format!("stage: {}", e), &body))?,
        None => fallback_stage,
    };
    let formatted_tree = value
        .get("formatted_tree")
        .and_then(Value::as_str)
        .map(str::to_string);
    let tree_value = value
        .get_mut("task_tree")
        .map(Value::take)
        .ok_or_else(|| decode_err("missing task_tree".to_string(), &body))?;
    let task_tree = tree_from_value(tree_value).map_err(|e| decode_err(e.to_string(), &body))?;

    Ok(TreeResponse {
        task_tree,
        stage,
        formatted_tree,
    })
}

/// MIME type for an uploaded image, from its extension
fn image_mime(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        _ => "image/jpeg",
    }
}

impl PlannerBackend for HttpBackend {
    fn create_task_tree(&self, request: &CreateTreeRequest) -> Result<TreeResponse, ApiError> {
        let body = self.post_json("/api/create-task-tree", request)?;
        decode_tree_response(body, Stage::Initial)
    }

    fn refine_task_tree(&self, request: &RefineRequest) -> Result<TreeResponse, ApiError> {
        let body = self.post_json("/api/refine-task-tree", request)?;
        decode_tree_response(body, Stage::Refined)
    }

    fn generate_todo(&self, request: &TodoRequest) -> Result<TodoResponse, ApiError> {
        decode(self.post_json("/api/generate-todo", request)?)
    }

    fn extract_text_from_image(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, ApiError> {
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(image_mime(file_name))
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let form = Form::new().part("file", part);
        let body = send(
            self.client
                .post(self.url("/api/extract-text-from-image"))
                .multipart(form),
        )?;
        let reply: OcrResponse = decode(body)?;
        Ok(reply.text)
    }

    fn health(&self) -> Result<HealthStatus, ApiError> {
        decode(send(self.client.get(self.url("/health")))?)
    }
}
