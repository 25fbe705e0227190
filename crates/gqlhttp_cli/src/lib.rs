//! Command-line interface for gqlhttp.
//!
//! # Usage
//!
//! ```bash
//! # Serve the echo schema on localhost:4000/graphql
//! gqlhttp serve
//!
//! # Serve compact responses and report requests slower than 100ms
//! gqlhttp serve --port 8080 --compact --log-slow-responses --slow-threshold-ms 100
//!
//! # Decode a request without a server
//! gqlhttp decode --content-type application/json --body '{"query":"{ me }"}'
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use clap::{Parser, Subcommand};
use gqlhttp::{
    decode, ErrorCode, ExecutableSchema, ExecutionParams, ExecutionResult, GraphQLError, Handler,
    HandlerConfig, HyperRequest, RequestOptions, ResultExt, ServerConfig,
};
use http_body_util::Full;
use hyper::{Method, Request};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "gqlhttp")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Log filter used when `RUST_LOG` is not set.
    pub fn default_log_filter(&self) -> &'static str {
        if self.verbose {
            "gqlhttp=debug"
        } else if self.quiet {
            "gqlhttp=warn"
        } else {
            "gqlhttp=info"
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the echo schema over HTTP
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "localhost")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value = "4000")]
        port: u16,

        /// Path of the GraphQL endpoint
        #[arg(long, default_value = "/graphql")]
        endpoint: String,

        /// Write responses without indentation
        #[arg(long)]
        compact: bool,

        /// Report slow responses
        #[arg(long)]
        log_slow_responses: bool,

        /// Slow-response threshold in milliseconds
        #[arg(long, default_value = "200")]
        slow_threshold_ms: u64,

        /// Log raw error stacks
        #[arg(long)]
        full_stack_trace: bool,

        /// Maximum request body size in bytes
        #[arg(long, default_value = "2097152")]
        max_body_size: usize,
    },

    /// Decode one request and print the result as JSON
    Decode {
        /// Request method
        #[arg(short, long, default_value = "POST")]
        method: String,

        /// Content-Type header
        #[arg(short, long)]
        content_type: Option<String>,

        /// Raw URL query string, without the leading '?'
        #[arg(long, default_value = "")]
        query_string: String,

        /// Request body
        #[arg(short, long)]
        body: Option<String>,
    },
}

/// Returns the decoded request as data.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoSchema;

#[async_trait]
impl ExecutableSchema for EchoSchema {
    async fn execute(&self, params: ExecutionParams) -> ExecutionResult {
        if params.query.trim().is_empty() {
            return ExecutionResult::from_error(GraphQLError::new("Must provide an operation."));
        }

        ExecutionResult::from_data(json!({
            "query": params.query,
            "variables": params.variables,
            "operationName": params.operation_name,
            "authorized": params.root.authorization().is_some(),
        }))
    }
}

/// Runs a parsed command line.
pub async fn run(cli: Cli) -> gqlhttp::Result<()> {
    match cli.command {
        Commands::Serve {
            host,
            port,
            endpoint,
            compact,
            log_slow_responses,
            slow_threshold_ms,
            full_stack_trace,
            max_body_size,
        } => {
            let mut config = HandlerConfig::new()
                .pretty(!compact)
                .max_body_size(max_body_size);
            if log_slow_responses {
                config = config.log_slow_responses(Duration::from_millis(slow_threshold_ms));
            }
            if full_stack_trace {
                config = config.show_full_stack_trace();
            }

            let handler = Handler::builder().schema(EchoSchema).config(config).build()?;
            let server = ServerConfig::new().host(host).port(port).endpoint(endpoint);

            info!("Serving the echo schema");
            gqlhttp::serve(Arc::new(handler), &server).await
        }

        Commands::Decode {
            method,
            content_type,
            query_string,
            body,
        } => {
            let options = decode_request(
                &method,
                content_type.as_deref(),
                &query_string,
                body.as_deref(),
            )
            .await?;
            let json = serde_json::to_string_pretty(&options).map_code(ErrorCode::SerializeError)?;
            println!("{json}");
            Ok(())
        }
    }
}

/// Builds a request from its parts and decodes it.
pub async fn decode_request(
    method: &str,
    content_type: Option<&str>,
    query_string: &str,
    body: Option<&str>,
) -> gqlhttp::Result<RequestOptions> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_code_with(ErrorCode::InvalidConfig, format!("invalid method: {method}"))?;

    let uri = if query_string.is_empty() {
        "/".to_string()
    } else {
        format!("/?{}", query_string.trim_start_matches('?'))
    };

    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(content_type) = content_type {
        builder = builder.header("content-type", content_type);
    }
    let request = builder
        .body(Full::new(Bytes::from(body.unwrap_or_default().to_owned())))
        .map_code(ErrorCode::InvalidConfig)?;

    Ok(decode(&mut HyperRequest::new(request), usize::MAX).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gqlhttp::{RootValue, TypedContext};

    #[test]
    fn test_parse_serve() {
        let cli = Cli::parse_from([
            "gqlhttp",
            "serve",
            "--port",
            "8080",
            "--compact",
            "--log-slow-responses",
            "--slow-threshold-ms",
            "50",
        ]);
        assert_eq!(cli.default_log_filter(), "gqlhttp=info");

        match cli.command {
            Commands::Serve {
                port,
                compact,
                log_slow_responses,
                slow_threshold_ms,
                endpoint,
                ..
            } => {
                assert_eq!(port, 8080);
                assert!(compact);
                assert!(log_slow_responses);
                assert_eq!(slow_threshold_ms, 50);
                assert_eq!(endpoint, "/graphql");
            }
            Commands::Decode { .. } => panic!("expected serve"),
        }
    }

    #[test]
    fn test_verbosity_filters() {
        let cli = Cli::parse_from(["gqlhttp", "-v", "decode"]);
        assert_eq!(cli.default_log_filter(), "gqlhttp=debug");

        let cli = Cli::parse_from(["gqlhttp", "decode", "--quiet"]);
        assert_eq!(cli.default_log_filter(), "gqlhttp=warn");
    }

    #[tokio::test]
    async fn test_decode_request_json() {
        let options = decode_request(
            "post",
            Some("application/json"),
            "",
            Some(r#"{"query":"{ me }","variables":{"a":1}}"#),
        )
        .await
        .unwrap();

        assert_eq!(options.query, "{ me }");
        assert_eq!(options.variables["a"], 1);
    }

    #[tokio::test]
    async fn test_decode_request_query_string() {
        let options = decode_request("GET", None, "?query=%7Bme%7D&operationName=Me", None)
            .await
            .unwrap();

        assert_eq!(options.query, "{me}");
        assert_eq!(options.operation_name, "Me");
    }

    #[tokio::test]
    async fn test_decode_request_rejects_bad_method() {
        let err = decode_request("BAD METHOD", None, "", None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfig);
    }

    #[tokio::test]
    async fn test_echo_requires_operation() {
        let params = ExecutionParams::new(
            RequestOptions::default(),
            TypedContext::new(),
            RootValue::default(),
        );
        let result = EchoSchema.execute(params).await;

        assert_eq!(result.data, None);
        assert_eq!(result.errors[0].message, "Must provide an operation.");
    }

    #[tokio::test]
    async fn test_echo_reports_authorization() {
        let options = RequestOptions {
            query: "{ me }".into(),
            ..RequestOptions::default()
        };
        let params = ExecutionParams::new(options, TypedContext::new(), RootValue::new("Bearer t"));
        let result = EchoSchema.execute(params).await;

        assert_eq!(
            result.data,
            Some(json!({
                "query": "{ me }",
                "variables": {},
                "operationName": "",
                "authorized": true
            }))
        );
    }
}
