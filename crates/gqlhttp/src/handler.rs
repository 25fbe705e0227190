//! The GraphQL HTTP handler.
//!
//! A [`Handler`] decodes a request, runs it against its schema and
//! serializes the result. The response status is always `200 OK`; GraphQL
//! errors travel in the body.

use bytes::Bytes;
use hyper::StatusCode;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error};

use crate::context::{RootValue, TypedContext};
use crate::engine::{ExecutableSchema, ExecutionParams, ExecutionResult, GraphQLError};
use crate::error::{Error, ErrorCode, Result};
use crate::observer::{ErrorEvent, HandlerObserver, SlowResponseEvent, TracingObserver};
use crate::request::{decode, IncomingRequest};

/// Handler configuration.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Indent responses with tabs.
    pub pretty: bool,
    /// Report requests slower than `slow_response_threshold`.
    pub log_slow_responses: bool,
    /// Threshold for slow-response reports.
    pub slow_response_threshold: Duration,
    /// Log raw error stacks instead of the filtered report.
    pub show_full_stack_trace: bool,
    /// Maximum accepted request body size in bytes.
    pub max_body_size: usize,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerConfig {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Self {
            pretty: true,
            log_slow_responses: false,
            slow_response_threshold: Duration::from_millis(200),
            show_full_stack_trace: false,
            max_body_size: 2 * 1024 * 1024,
        }
    }

    /// Sets whether responses are indented.
    #[must_use]
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Enables slow-response reports above the given threshold.
    #[must_use]
    pub fn log_slow_responses(mut self, threshold: Duration) -> Self {
        self.log_slow_responses = true;
        self.slow_response_threshold = threshold;
        self
    }

    /// Logs raw error stacks.
    #[must_use]
    pub fn show_full_stack_trace(mut self) -> Self {
        self.show_full_stack_trace = true;
        self
    }

    /// Sets the maximum request body size.
    #[must_use]
    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }

    /// Checks that the values can be used to serve requests.
    pub fn validate(&self) -> Result<()> {
        if self.max_body_size == 0 {
            return Err(Error::new(
                ErrorCode::InvalidConfig,
                "max_body_size must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// A transport-independent response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: StatusCode,
    pub body: Bytes,
}

impl Response {
    /// Content type of every handler response.
    pub const CONTENT_TYPE: &'static str = "application/json";

    /// Returns the body as UTF-8 text.
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Handler builder.
#[derive(Default)]
pub struct HandlerBuilder {
    config: HandlerConfig,
    schema: Option<Arc<dyn ExecutableSchema>>,
    observer: Option<Arc<dyn HandlerObserver>>,
}

impl HandlerBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the schema requests are executed against.
    #[must_use]
    pub fn schema(mut self, schema: impl ExecutableSchema + 'static) -> Self {
        self.schema = Some(Arc::new(schema));
        self
    }

    /// Sets an already shared schema.
    #[must_use]
    pub fn shared_schema(mut self, schema: Arc<dyn ExecutableSchema>) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: HandlerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the observer. Defaults to a [`TracingObserver`].
    #[must_use]
    pub fn observer(mut self, observer: impl HandlerObserver + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Builds the handler.
    pub fn build(self) -> Result<Handler> {
        let Some(schema) = self.schema else {
            return Err(Error::no_schema());
        };
        self.config.validate()?;

        let observer = self.observer.unwrap_or_else(|| {
            Arc::new(TracingObserver::new(self.config.show_full_stack_trace))
        });

        Ok(Handler {
            schema,
            config: self.config,
            observer,
        })
    }
}

/// Decodes GraphQL requests and executes them against a schema.
pub struct Handler {
    schema: Arc<dyn ExecutableSchema>,
    config: HandlerConfig,
    observer: Arc<dyn HandlerObserver>,
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Handler {
    /// Creates a handler with the default observer.
    pub fn new(schema: impl ExecutableSchema + 'static, config: HandlerConfig) -> Self {
        let observer = Arc::new(TracingObserver::new(config.show_full_stack_trace));
        Self {
            schema: Arc::new(schema),
            config,
            observer,
        }
    }

    /// Creates a new handler builder.
    pub fn builder() -> HandlerBuilder {
        HandlerBuilder::new()
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    /// Handles a request with an empty context.
    pub async fn handle<R: IncomingRequest>(&self, request: R) -> Response {
        self.handle_with_context(TypedContext::new(), request).await
    }

    /// Handles a request, handing `context` to the schema.
    pub async fn handle_with_context<R: IncomingRequest>(
        &self,
        context: TypedContext,
        mut request: R,
    ) -> Response {
        let started_at = Instant::now();

        let options = decode(&mut request, self.config.max_body_size).await;
        let root = RootValue::new(request.header("authorization"));

        debug!(
            operation_name = %options.operation_name,
            "executing query: {}",
            options.query.chars().take(100).collect::<String>()
        );

        let params = ExecutionParams::new(options, context, root);
        let query = params.query.clone();
        let operation_name = params.operation_name.clone();

        let result = self.schema.execute(params).await;
        self.report_errors(&result);

        let response = self.respond(&result);

        let elapsed = started_at.elapsed();
        if self.config.log_slow_responses && elapsed > self.config.slow_response_threshold {
            self.observer.on_slow_response(&SlowResponseEvent {
                elapsed,
                query: &query,
                operation_name: &operation_name,
            });
        }

        response
    }

    fn report_errors(&self, result: &ExecutionResult) {
        for err in &result.errors {
            self.observer.on_execution_error(&ErrorEvent {
                kind: ErrorCode::ExecutionError,
                message: &err.message,
                stack: err.stack.as_deref(),
            });
        }
    }

    fn respond(&self, result: &ExecutionResult) -> Response {
        let body = match serialize(result, self.config.pretty) {
            Ok(body) => body,
            Err(err) => {
                error!("failed to serialize execution result: {}", err);
                let fallback = ExecutionResult::from_error(GraphQLError::new(err.message));
                serialize(&fallback, false).unwrap_or_else(|_| {
                    Bytes::from_static(br#"{"data":null,"errors":[{"message":"Internal error"}]}"#)
                })
            }
        };

        Response {
            status: StatusCode::OK,
            body,
        }
    }
}

/// Serializes `value` as JSON, tab-indented when `pretty`.
pub fn serialize<T: Serialize>(value: &T, pretty: bool) -> Result<Bytes> {
    let mut buf = Vec::new();
    let outcome = if pretty {
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        value.serialize(&mut serializer)
    } else {
        serde_json::to_writer(&mut buf, value)
    };

    outcome
        .map(|()| Bytes::from(buf))
        .map_err(|e| Error::serialize(format!("failed to serialize response: {e}")))
}
