//! The execution engine seam.
//!
//! gqlhttp does not parse, validate or execute documents. It hands the
//! decoded request to an [`ExecutableSchema`] and serializes what comes back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::{RootValue, TypedContext};
use crate::request::RequestOptions;

/// Everything the schema needs to run one request.
#[derive(Debug)]
pub struct ExecutionParams {
    /// The GraphQL document text.
    pub query: String,
    /// Variable values keyed by name.
    pub variables: Map<String, Value>,
    /// Operation to run when the document defines several.
    pub operation_name: String,
    /// Caller-supplied context.
    pub context: TypedContext,
    /// Root value carrying transport metadata.
    pub root: RootValue,
}

impl ExecutionParams {
    /// Builds execution parameters from decoded request options.
    pub fn new(options: RequestOptions, context: TypedContext, root: RootValue) -> Self {
        Self {
            query: options.query,
            variables: options.variables,
            operation_name: options.operation_name,
            context,
            root,
        }
    }

    /// Returns the operation name, or `None` when it was not supplied.
    pub fn operation_name(&self) -> Option<&str> {
        if self.operation_name.is_empty() {
            None
        } else {
            Some(&self.operation_name)
        }
    }
}

/// A schema that can execute GraphQL requests.
#[async_trait]
pub trait ExecutableSchema: Send + Sync {
    /// Executes one request. Failures belong in [`ExecutionResult::errors`].
    async fn execute(&self, params: ExecutionParams) -> ExecutionResult;
}

/// Location of an error in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

/// A segment of a response path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

/// An error produced while executing a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<SourceLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PathSegment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
    /// Captured stack, logged but never sent to the client.
    #[serde(skip)]
    pub stack: Option<String>,
}

impl GraphQLError {
    /// Creates an error with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: Vec::new(),
            path: None,
            extensions: None,
            stack: None,
        }
    }

    /// Adds a source location.
    #[must_use]
    pub fn with_location(mut self, line: usize, column: usize) -> Self {
        self.locations.push(SourceLocation { line, column });
        self
    }

    /// Sets the response path.
    #[must_use]
    pub fn with_path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = Some(path);
        self
    }

    /// Adds an extension entry.
    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extensions
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Attaches a captured stack.
    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

impl std::fmt::Display for GraphQLError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// The result of executing a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Always serialized, `null` when absent.
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQLError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
}

impl ExecutionResult {
    /// Creates a successful result.
    pub fn from_data(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    /// Creates a result carrying a single error and no data.
    pub fn from_error(error: GraphQLError) -> Self {
        Self {
            data: None,
            errors: vec![error],
            extensions: None,
        }
    }

    /// Returns true if execution reported any error.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_without_errors_omits_key() {
        let result = ExecutionResult::from_data(json!({"hello": "world"}));
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(json, r#"{"data":{"hello":"world"}}"#);
        assert!(!result.has_errors());
    }

    #[test]
    fn test_result_with_error_serializes_null_data() {
        let result = ExecutionResult::from_error(
            GraphQLError::new("Cannot query field \"nope\"")
                .with_location(1, 3)
                .with_stack("frame one"),
        );
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(
            json,
            r#"{"data":null,"errors":[{"message":"Cannot query field \"nope\"","locations":[{"line":1,"column":3}]}]}"#
        );
        assert!(result.has_errors());
    }

    #[test]
    fn test_error_path_and_extensions() {
        let error = GraphQLError::new("boom")
            .with_path(vec![
                PathSegment::Field("users".into()),
                PathSegment::Index(0),
                PathSegment::Field("name".into()),
            ])
            .with_extension("code", "INTERNAL");
        let value = serde_json::to_value(&error).unwrap();
        assert_eq!(
            value,
            json!({
                "message": "boom",
                "path": ["users", 0, "name"],
                "extensions": {"code": "INTERNAL"}
            })
        );
    }

    #[test]
    fn test_params_operation_name() {
        let mut options = RequestOptions::default();
        let params = ExecutionParams::new(
            options.clone(),
            TypedContext::new(),
            RootValue::default(),
        );
        assert_eq!(params.operation_name(), None);

        options.operation_name = "GetUser".into();
        let params = ExecutionParams::new(options, TypedContext::new(), RootValue::default());
        assert_eq!(params.operation_name(), Some("GetUser"));
    }
}
