use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::Json;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// A type-erased error raised by a handler, middleware, or preloader.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Boxed future returned by every chain stage.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Response, HandlerError>> + Send>>;

type HandlerFn = Arc<dyn Fn(Request) -> HandlerFuture + Send + Sync>;

/// A request-time failure forwarded out of a chain stage.
///
/// Any stage may fail, synchronously or mid-await; the chain catches the
/// failure and renders it with [`IntoResponse`] instead of letting it
/// unwind. Defaults to `500 Internal Server Error`.
pub struct HandlerError {
    status: StatusCode,
    source: BoxError,
}

impl HandlerError {
    pub fn new(source: impl Into<BoxError>) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, source)
    }

    pub fn with_status(status: StatusCode, source: impl Into<BoxError>) -> Self {
        Self {
            status,
            source: source.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerError")
            .field("status", &self.status)
            .field("source", &self.source)
            .finish()
    }
}

impl std::error::Error for HandlerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.source)
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({
                "statusCode": self.status.as_u16(),
                "message": self.source.to_string(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            })),
        )
            .into_response()
    }
}

/// Represents the rest of a route's chain.
pub struct Next {
    run: Box<dyn FnOnce(Request) -> HandlerFuture + Send>,
}

impl Next {
    pub(crate) fn new<F>(f: F) -> Self
    where
        F: FnOnce(Request) -> HandlerFuture + Send + 'static,
    {
        Self { run: Box::new(f) }
    }

    /// Passes the request on to the remaining stages.
    pub async fn run(self, request: Request) -> Result<Response, HandlerError> {
        (self.run)(request).await
    }
}

/// The terminal stage of a route chain.
///
/// Carries a diagnostic name (captured from the wrapped function's type
/// name) that survives wrapper composition, standing in for the handler
/// key of the route it serves.
#[derive(Clone)]
pub struct RouteHandler {
    pub(crate) name: &'static str,
    pub(crate) f: HandlerFn,
}

impl RouteHandler {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Invokes the underlying function.
    pub fn call(&self, request: Request) -> HandlerFuture {
        (self.f)(request)
    }
}

impl fmt::Debug for RouteHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteHandler")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A chain stage that runs around the rest of its route's chain.
pub type Middleware = Arc<dyn Fn(Request, Next) -> HandlerFuture + Send + Sync>;

/// A preloader invoked with the captured value of a named path parameter
/// before the rest of the chain runs.
pub type ParamPreloader = Arc<dyn Fn(Request, Next, String) -> HandlerFuture + Send + Sync>;

/// Wraps an async function as a [`RouteHandler`].
pub fn handler<F, Fut>(f: F) -> RouteHandler
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, HandlerError>> + Send + 'static,
{
    RouteHandler {
        name: fn_name::<F>(),
        f: Arc::new(move |request| Box::pin(f(request))),
    }
}

/// Wraps an async function as a [`Middleware`].
pub fn middleware<F, Fut>(f: F) -> Middleware
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, HandlerError>> + Send + 'static,
{
    Arc::new(move |request, next| Box::pin(f(request, next)))
}

/// Wraps an async function as a [`ParamPreloader`].
pub fn preloader<F, Fut>(f: F) -> ParamPreloader
where
    F: Fn(Request, Next, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, HandlerError>> + Send + 'static,
{
    Arc::new(move |request, next, value| Box::pin(f(request, next, value)))
}

fn fn_name<F>() -> &'static str {
    let full = std::any::type_name::<F>();
    full.rsplit("::").next().unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use serde_json::Value;

    async fn probe(_request: Request) -> Result<Response, HandlerError> {
        Ok(StatusCode::OK.into_response())
    }

    fn terminal_next() -> Next {
        Next::new(|_request| Box::pin(async { Ok(StatusCode::NO_CONTENT.into_response()) }))
    }

    #[test]
    fn handler_captures_function_name() {
        assert_eq!(handler(probe).name(), "probe");
    }

    #[tokio::test]
    async fn handler_error_renders_terminal_response() {
        let error = HandlerError::new("downstream exploded");
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["statusCode"], 500);
        assert_eq!(body["message"], "downstream exploded");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn route_handler_invokes_wrapped_function() {
        let wrapped = handler(probe);
        let response = wrapped.call(Request::new(Body::empty())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn middleware_delegates_through_next() {
        let stage = middleware(|request: Request, next: Next| next.run(request));
        let response = stage(Request::new(Body::empty()), terminal_next())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
