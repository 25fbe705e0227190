//! GraphQL over HTTP
//!
//! This crate turns HTTP requests into GraphQL executions: it decodes the
//! query, variables and operation name from the URL or the body, hands them to
//! an [`ExecutableSchema`] together with the request's `Authorization` header
//! and writes the result back as JSON.
//!
//! # Serving a schema
//!
//! ```ignore
//! use gqlhttp::{ExecutableSchema, ExecutionParams, ExecutionResult, Handler, ServerConfig};
//! use std::sync::Arc;
//!
//! struct Hello;
//!
//! #[async_trait::async_trait]
//! impl ExecutableSchema for Hello {
//!     async fn execute(&self, params: ExecutionParams) -> ExecutionResult {
//!         ExecutionResult::from_data(serde_json::json!({ "hello": "world" }))
//!     }
//! }
//!
//! let handler = Handler::builder().schema(Hello).build()?;
//! gqlhttp::serve(Arc::new(handler), &ServerConfig::new().port(4000)).await?;
//! ```
//!
//! # Decoding only
//!
//! ```ignore
//! use gqlhttp::{decode, HyperRequest};
//!
//! let mut request = HyperRequest::new(req);
//! let options = decode(&mut request, 2 * 1024 * 1024).await;
//! println!("{}", options.query);
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod handler;
pub mod http;
pub mod observer;
pub mod request;

pub use context::{ContextExt, RootValue, TypedContext};
pub use engine::{
    ExecutableSchema, ExecutionParams, ExecutionResult, GraphQLError, PathSegment, SourceLocation,
};
pub use error::{Error, ErrorCode, Result, ResultExt};
pub use handler::{Handler, HandlerBuilder, HandlerConfig, Response};
pub use http::{into_hyper_response, serve, HyperRequest, ServerConfig};
pub use observer::{HandlerObserver, NoopObserver, TracingObserver};
pub use request::{decode, IncomingRequest, RequestContentType, RequestOptions};
