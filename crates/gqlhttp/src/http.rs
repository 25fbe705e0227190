//! hyper integration.
//!
//! Provides the [`IncomingRequest`] adapter for `hyper::Request`, response
//! conversion and a small HTTP/1.1 server:
//! - `<endpoint>` (any method) - GraphQL requests
//! - GET /health - Health check

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Incoming};
use hyper::header::CONTENT_TYPE;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{HeaderMap, Method, Request, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::error::{Error, ErrorCode, Result, ResultExt};
use crate::handler::{Handler, Response};
use crate::request::IncomingRequest;

/// A `hyper::Request` whose body can be taken once.
#[derive(Debug)]
pub struct HyperRequest<B> {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Option<B>,
}

impl<B> HyperRequest<B> {
    pub fn new(request: Request<B>) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body: Some(body),
        }
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl<B> From<Request<B>> for HyperRequest<B> {
    fn from(request: Request<B>) -> Self {
        Self::new(request)
    }
}

#[async_trait]
impl<B> IncomingRequest for HyperRequest<B>
where
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    fn method(&self) -> &Method {
        &self.method
    }

    fn header(&self, name: &str) -> &str {
        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
    }

    fn raw_query(&self) -> &str {
        self.uri.query().unwrap_or("")
    }

    fn has_body(&self) -> bool {
        self.body.as_ref().is_some_and(|body| !body.is_end_stream())
    }

    async fn read_body(&mut self, limit: usize) -> Result<Bytes> {
        let body = self.body.take().ok_or_else(Error::body_consumed)?;

        let collected = Limited::new(body, limit).collect().await.map_err(|err| {
            if err.downcast_ref::<LengthLimitError>().is_some() {
                Error::payload_too_large(limit)
            } else {
                Error::body_read(format!("failed to read request body: {err}"))
            }
        })?;

        Ok(collected.to_bytes())
    }
}

/// Converts a handler response into a hyper response.
pub fn into_hyper_response(response: Response) -> hyper::Response<Full<Bytes>> {
    let mut res = hyper::Response::new(Full::new(response.body));
    *res.status_mut() = response.status;
    res.headers_mut().insert(
        CONTENT_TYPE,
        hyper::header::HeaderValue::from_static(Response::CONTENT_TYPE),
    );
    res
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on.
    pub port: u16,
    /// Host to bind to.
    pub host: String,
    /// Path GraphQL requests are served on.
    pub endpoint: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerConfig {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Self {
            port: 4000,
            host: "localhost".to_string(),
            endpoint: "/graphql".to_string(),
        }
    }

    /// Sets the port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the GraphQL endpoint path.
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Checks the endpoint shape.
    pub fn validate(&self) -> Result<()> {
        if !self.endpoint.starts_with('/') {
            return Err(Error::new(
                ErrorCode::InvalidConfig,
                format!("endpoint must start with '/': {}", self.endpoint),
            ));
        }
        Ok(())
    }
}

pub(crate) fn health_response() -> &'static str {
    r#"{"status":"healthy"}"#
}

fn static_response(status: StatusCode, body: &'static str) -> hyper::Response<Full<Bytes>> {
    into_hyper_response(Response {
        status,
        body: Bytes::from_static(body.as_bytes()),
    })
}

/// Routes one request.
pub async fn route<B>(
    handler: &Handler,
    endpoint: &str,
    request: Request<B>,
) -> hyper::Response<Full<Bytes>>
where
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    if request.uri().path() == endpoint {
        return into_hyper_response(handler.handle(HyperRequest::new(request)).await);
    }

    let path = request.uri().path();
    if request.method() == Method::GET && path == "/health" {
        return static_response(StatusCode::OK, health_response());
    }

    debug!("no route for {} {}", request.method(), path);
    static_response(StatusCode::NOT_FOUND, r#"{"error":"Not Found"}"#)
}

/// Serves `handler` until the listener fails.
pub async fn serve(handler: Arc<Handler>, config: &ServerConfig) -> Result<()> {
    config.validate()?;

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_code_with(ErrorCode::ServerError, format!("Failed to bind {addr}"))?;
    let local_addr: SocketAddr = listener
        .local_addr()
        .map_code(ErrorCode::ServerError)?;

    info!("Listening on http://{}{}", local_addr, config.endpoint);

    let endpoint: Arc<str> = Arc::from(config.endpoint.as_str());
    loop {
        let (stream, peer) = listener
            .accept()
            .await
            .map_code_with(ErrorCode::ServerError, "Failed to accept")?;
        debug!("accepted connection from {}", peer);

        let io = TokioIo::new(stream);
        let handler = Arc::clone(&handler);
        let endpoint = Arc::clone(&endpoint);

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<Incoming>| {
                let handler = Arc::clone(&handler);
                let endpoint = Arc::clone(&endpoint);
                async move { Ok::<_, Infallible>(route(&handler, &endpoint, req).await) }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                if !err.is_incomplete_message() {
                    error!("Connection error: {:?}", err);
                }
            }
        });
    }
}
