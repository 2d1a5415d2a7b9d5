use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::extract::{FromRequestParts, RawPathParams, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tower::{Layer, Service};

use crate::controller::ParamDescriptor;
use crate::handler::{Middleware, Next};

/// One router-attached stage of a controller's request chain.
#[derive(Clone)]
pub(crate) enum Stage {
    /// Controller-wide or route-specific middleware.
    Middleware(Middleware),
    /// A parameter preloader; fires only when its id is among the matched
    /// path parameters.
    Preload(ParamDescriptor),
    /// Digit constraint for rewritten parameters; a non-numeric value is
    /// answered like a router non-match.
    DigitGuard(Vec<String>),
}

/// Tower layer installing one chain [`Stage`] around the rest of a route's
/// chain. Failures raised by the stage are forwarded into the terminal
/// error presentation here instead of unwinding through the router.
#[derive(Clone)]
pub(crate) struct StageLayer {
    stage: Stage,
}

impl StageLayer {
    pub(crate) fn new(stage: Stage) -> Self {
        Self { stage }
    }
}

impl<S> Layer<S> for StageLayer {
    type Service = StageService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        StageService {
            inner,
            stage: self.stage.clone(),
        }
    }
}

#[derive(Clone)]
pub(crate) struct StageService<S> {
    inner: S,
    stage: Stage,
}

impl<S> Service<Request> for StageService<S>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let stage = self.stage.clone();
        let inner = self.inner.clone();

        Box::pin(async move {
            let next = Next::new(move |request| {
                Box::pin(async move {
                    let mut inner = inner;
                    match inner.call(request).await {
                        Ok(response) => Ok(response),
                        Err(infallible) => match infallible {},
                    }
                })
            });

            Ok(run_stage(stage, request, next).await)
        })
    }
}

async fn run_stage(stage: Stage, request: Request, next: Next) -> Response {
    match stage {
        Stage::Middleware(stage) => stage(request, next).await.unwrap_or_else(|error| {
            tracing::error!(%error, "middleware failed");
            error.into_response()
        }),
        Stage::Preload(descriptor) => {
            let (value, request) = path_param(request, &descriptor.id).await;
            match value {
                Some(value) => (descriptor.preloader)(request, next, value)
                    .await
                    .unwrap_or_else(|error| {
                        tracing::error!(param = %descriptor.id, %error, "preloader failed");
                        error.into_response()
                    }),
                None => next
                    .run(request)
                    .await
                    .unwrap_or_else(IntoResponse::into_response),
            }
        }
        Stage::DigitGuard(names) => {
            let (numeric, request) = all_numeric(request, &names).await;
            if numeric {
                next.run(request)
                    .await
                    .unwrap_or_else(IntoResponse::into_response)
            } else {
                StatusCode::NOT_FOUND.into_response()
            }
        }
    }
}

async fn path_param(request: Request, id: &str) -> (Option<String>, Request) {
    let (mut parts, body) = request.into_parts();
    let value = match RawPathParams::from_request_parts(&mut parts, &()).await {
        Ok(params) => params
            .iter()
            .find(|(key, _)| *key == id)
            .map(|(_, value)| value.to_owned()),
        Err(_) => None,
    };
    (value, Request::from_parts(parts, body))
}

async fn all_numeric(request: Request, names: &[String]) -> (bool, Request) {
    let (mut parts, body) = request.into_parts();
    let numeric = match RawPathParams::from_request_parts(&mut parts, &()).await {
        Ok(params) => names.iter().all(|name| {
            params
                .iter()
                .find(|(key, _)| *key == name.as_str())
                .is_none_or(|(_, value)| !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()))
        }),
        Err(_) => true,
    };
    (numeric, Request::from_parts(parts, body))
}
