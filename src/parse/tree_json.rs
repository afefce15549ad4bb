use serde_json::Value;

use crate::model::tree::TaskTree;

#[derive(Debug, thiserror::Error)]
pub enum TreeJsonError {
    #[error("invalid JSON at line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },
    #[error("task tree has no \"categories\" array")]
    MissingCategories,
    #[error("task tree has the wrong shape: {0}")]
    Shape(String),
    #[error("could not encode task tree: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Serialize a tree as 2-space-indented JSON, the form shown in the JSON view.
pub fn serialize_tree(tree: &TaskTree) -> Result<String, TreeJsonError> {
    serde_json::to_string_pretty(tree).map_err(TreeJsonError::Encode)
}

/// Parse JSON text into a tree.
///
/// Accepts a bare tree or one nested any number of times under `task_tree`
/// (the shape some saved records have). The innermost object must carry a
/// `categories` array.
pub fn parse_tree(text: &str) -> Result<TaskTree, TreeJsonError> {
    let value: Value = serde_json::from_str(text).map_err(|e| TreeJsonError::Syntax {
        line: e.line(),
        column: e.column(),
        message: e.to_string(),
    })?;
    tree_from_value(value)
}

/// Convert an already-parsed value, unwrapping `task_tree` nesting first.
pub fn tree_from_value(value: Value) -> Result<TaskTree, TreeJsonError> {
    let inner = unwrap_task_tree(value)?;
    serde_json::from_value(inner).map_err(|e| TreeJsonError::Shape(e.to_string()))
}

/// Strip `{task_tree: …}` wrappers until an object with `categories` remains.
pub fn unwrap_task_tree(mut value: Value) -> Result<Value, TreeJsonError> {
    loop {
        let Value::Object(mut map) = value else {
            return Err(TreeJsonError::MissingCategories);
        };
        if map.contains_key("categories") {
            return match map.get("categories") {
                Some(Value::Array(_)) => Ok(Value::Object(map)),
                _ => Err(TreeJsonError::MissingCategories),
            };
        }
        match map.remove("task_tree") {
            Some(inner) => value = inner,
            None => return Err(TreeJsonError::MissingCategories),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const SAMPLE: &str = r#"{
  "categories": [
    {
      "id": "c1",
      "name": "Home",
      "emoji": "🏠",
      "projects": [
        {
          "id": "p1",
          "name": "Kitchen",
          "dependencies": [
            "Buy sponges"
          ],
          "tasks": [
            {
              "id": "t1",
              "name": "Dishes",
              "needsBreakdown": false,
              "subtasks": [
                {
                  "id": "s1",
                  "name": "Load",
                  "needsBreakdown": true
                }
              ]
            }
          ]
        }
      ]
    }
  ]
}"#;

    #[test]
    fn test_serialize_is_stable() {
        let tree = parse_tree(SAMPLE).unwrap();
        let once = serialize_tree(&tree).unwrap();
        assert_eq!(once, SAMPLE);
        let twice = serialize_tree(&parse_tree(&once).unwrap()).unwrap();
        assert_eq!(twice, once);
    }

    #[test]
    fn test_false_flag_survives_round_trip() {
        let tree = parse_tree(SAMPLE).unwrap();
        assert_eq!(tree.categories[0].projects[0].tasks[0].needs_breakdown, Some(false));
    }

    #[test]
    fn test_nested_task_tree_unwraps() {
        let wrapped = json!({"task_tree": {"task_tree": {"categories": [{"name": "A", "projects": []}]}}});
        let tree = tree_from_value(wrapped).unwrap();
        assert_eq!(tree.categories.len(), 1);
        assert_eq!(tree.categories[0].name, "A");
    }

    #[test]
    fn test_missing_categories() {
        assert!(matches!(
            parse_tree(r#"{"task_tree": {"stage": "initial"}}"#),
            Err(TreeJsonError::MissingCategories)
        ));
        assert!(matches!(
            parse_tree(r#"{"categories": {}}"#),
            Err(TreeJsonError::MissingCategories)
        ));
        assert!(matches!(parse_tree("[]"), Err(TreeJsonError::MissingCategories)));
    }

    #[test]
    fn test_syntax_error_reports_position() {
        match parse_tree("{\n  \"categories\": [,]\n}") {
            Err(TreeJsonError::Syntax { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_shape_error() {
        assert!(matches!(
            parse_tree(r#"{"categories": [{"projects": []}]}"#),
            Err(TreeJsonError::Shape(_))
        ));
    }
}
