//! Controller metadata accumulation and materialization.
//!
//! A controller declares its routes and parameter preloaders by filling a
//! [`ControllerDef`] inside [`Controller::configure`]. [`materialize`]
//! consumes the accumulated descriptors exactly once and builds the
//! controller's concrete sub-router, which the registry then mounts.

use std::fmt;

use axum::Router;
use axum::extract::Request;
use axum::response::IntoResponse;
use axum::routing::{MethodRouter, any, delete, get, head, options, patch, post, put};
use strum_macros::{Display, EnumString};

use crate::error::{Result, SwitchyardError};
use crate::handler::{Middleware, ParamPreloader, RouteHandler};
use crate::path::{NormalizeOptions, normalize, to_axum_path};

mod layer;

use layer::{Stage, StageLayer};

/// HTTP verbs a route can bind to. `All` answers every method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum RouteMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    All,
}

impl RouteMethod {
    fn method_router<H, T>(self, endpoint: H) -> MethodRouter
    where
        H: axum::handler::Handler<T, ()>,
        T: 'static,
    {
        match self {
            Self::Get => get(endpoint),
            Self::Post => post(endpoint),
            Self::Put => put(endpoint),
            Self::Patch => patch(endpoint),
            Self::Delete => delete(endpoint),
            Self::Head => head(endpoint),
            Self::Options => options(endpoint),
            Self::All => any(endpoint),
        }
    }
}

/// A single route binding: verb, normalized path (parameters already
/// rewritten), the handler, and route-specific middleware.
pub struct RouteDescriptor {
    pub(crate) method: RouteMethod,
    pub(crate) path: String,
    pub(crate) middleware: Vec<Middleware>,
    pub(crate) handler: RouteHandler,
}

impl fmt::Debug for RouteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDescriptor")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("handler", &self.handler)
            .finish_non_exhaustive()
    }
}

impl RouteDescriptor {
    pub fn method(&self) -> RouteMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn handler_name(&self) -> &'static str {
        self.handler.name()
    }
}

/// A parameter preloader registration. The id is taken verbatim.
#[derive(Clone)]
pub struct ParamDescriptor {
    pub(crate) id: String,
    pub(crate) preloader: ParamPreloader,
}

impl fmt::Debug for ParamDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamDescriptor")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl ParamDescriptor {
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Per-controller metadata accumulator.
///
/// Append-only: every builder call adds a descriptor in declaration order.
/// Each materialization runs [`Controller::configure`] against a fresh
/// def, so metadata can never leak between controllers or accumulate
/// across repeated registrations.
#[derive(Default, Debug)]
pub struct ControllerDef {
    routes: Vec<RouteDescriptor>,
    params: Vec<ParamDescriptor>,
}

impl ControllerDef {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a route. The path is normalized with parameter rewriting
    /// enabled, so `:id`-style segments become digit-constrained here and
    /// only here.
    pub fn route(
        &mut self,
        method: RouteMethod,
        path: &str,
        handler: RouteHandler,
    ) -> Result<&mut Self> {
        self.route_with(method, path, Vec::new(), handler)
    }

    /// Appends a route with route-specific middleware, run in the given
    /// order between the controller middleware and the handler.
    pub fn route_with(
        &mut self,
        method: RouteMethod,
        path: &str,
        middleware: Vec<Middleware>,
        handler: RouteHandler,
    ) -> Result<&mut Self> {
        let path = normalize(
            path,
            NormalizeOptions {
                rewrite_params: true,
            },
        )?;
        self.routes.push(RouteDescriptor {
            method,
            path,
            middleware,
            handler,
        });
        Ok(self)
    }

    pub fn get(&mut self, path: &str, handler: RouteHandler) -> Result<&mut Self> {
        self.route(RouteMethod::Get, path, handler)
    }

    pub fn post(&mut self, path: &str, handler: RouteHandler) -> Result<&mut Self> {
        self.route(RouteMethod::Post, path, handler)
    }

    pub fn put(&mut self, path: &str, handler: RouteHandler) -> Result<&mut Self> {
        self.route(RouteMethod::Put, path, handler)
    }

    pub fn patch(&mut self, path: &str, handler: RouteHandler) -> Result<&mut Self> {
        self.route(RouteMethod::Patch, path, handler)
    }

    pub fn delete(&mut self, path: &str, handler: RouteHandler) -> Result<&mut Self> {
        self.route(RouteMethod::Delete, path, handler)
    }

    pub fn head(&mut self, path: &str, handler: RouteHandler) -> Result<&mut Self> {
        self.route(RouteMethod::Head, path, handler)
    }

    pub fn options(&mut self, path: &str, handler: RouteHandler) -> Result<&mut Self> {
        self.route(RouteMethod::Options, path, handler)
    }

    pub fn all(&mut self, path: &str, handler: RouteHandler) -> Result<&mut Self> {
        self.route(RouteMethod::All, path, handler)
    }

    /// Appends a parameter preloader for `id`. No normalization is
    /// performed on the id.
    pub fn param(&mut self, id: impl Into<String>, preloader: ParamPreloader) -> &mut Self {
        self.params.push(ParamDescriptor {
            id: id.into(),
            preloader,
        });
        self
    }

    pub fn routes(&self) -> &[RouteDescriptor] {
        &self.routes
    }

    pub fn params(&self) -> &[ParamDescriptor] {
        &self.params
    }
}

/// A controller: a type whose implementation declares a base path, shared
/// middleware, and a set of routes and preloaders.
pub trait Controller: 'static {
    /// Base path under which every route of this controller is registered.
    fn basepath() -> &'static str;

    /// Controller-wide middleware, run ahead of every route-specific stage.
    fn middleware() -> Vec<Middleware> {
        Vec::new()
    }

    /// Declares the controller's routes and parameter preloaders.
    fn configure(def: &mut ControllerDef) -> Result<()>;
}

/// A controller's concrete sub-router, produced by [`materialize`].
#[derive(Clone, Debug)]
pub struct MountedController {
    pub(crate) name: &'static str,
    pub(crate) router: Router,
    entries: usize,
}

impl MountedController {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// A handle to the materialized sub-router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Number of chain entries registered on the sub-router: one per
    /// parameter preloader plus one per route.
    pub fn entries(&self) -> usize {
        self.entries
    }
}

pub(crate) fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

/// Builds a controller's sub-router from its accumulated metadata.
///
/// Fails with `MissingBasepath` before any router is created, and with
/// `InvalidPath` if the basepath concatenation is malformed. The request
/// chain ends up ordered: preloaders, controller middleware, route
/// middleware, handler; every stage's failures are forwarded to the
/// terminal error presentation, never unwound.
pub fn materialize<C: Controller>() -> Result<MountedController> {
    let name = short_type_name::<C>();
    let basepath = C::basepath();
    if basepath.is_empty() {
        return Err(SwitchyardError::MissingBasepath { controller: name });
    }

    let mut def = ControllerDef::new();
    C::configure(&mut def)?;
    let ControllerDef { routes, params } = def;
    let entries = params.len() + routes.len();

    let mut router = Router::new();

    for descriptor in routes {
        let RouteDescriptor {
            method,
            path,
            middleware: route_middleware,
            handler,
        } = descriptor;

        // The concatenation is normalized without parameter rewriting:
        // only the route fragment was rewritten, at attachment time, so a
        // basepath parameter stays unconstrained.
        let full = normalize(&format!("{basepath}{path}"), NormalizeOptions::default())?;
        let (route_path, constrained) = to_axum_path(&full);

        tracing::debug!(
            controller = name,
            %method,
            path = %route_path,
            handler = handler.name(),
            "registering route"
        );

        let endpoint = {
            let handler = handler.clone();
            move |request: Request| {
                let handler = handler.clone();
                async move {
                    match handler.call(request).await {
                        Ok(response) => response,
                        Err(error) => {
                            tracing::error!(handler = handler.name(), %error, "handler failed");
                            error.into_response()
                        }
                    }
                }
            }
        };

        let mut method_router = method.method_router(endpoint);
        for stage in route_middleware.into_iter().rev() {
            method_router = method_router.layer(StageLayer::new(Stage::Middleware(stage)));
        }
        if !constrained.is_empty() {
            method_router = method_router.layer(StageLayer::new(Stage::DigitGuard(constrained)));
        }

        router = router.route(&route_path, method_router);
    }

    for stage in C::middleware().into_iter().rev() {
        router = router.layer(StageLayer::new(Stage::Middleware(stage)));
    }

    for descriptor in params.into_iter().rev() {
        tracing::debug!(controller = name, param = %descriptor.id, "registering preloader");
        router = router.layer(StageLayer::new(Stage::Preload(descriptor)));
    }

    tracing::info!(controller = name, entries, "controller materialized");

    Ok(MountedController {
        name,
        router,
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{HandlerError, handler, preloader};
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, StatusCode};
    use axum::response::Response;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn ok_handler(_request: Request) -> Result<Response, HandlerError> {
        Ok(StatusCode::OK.into_response())
    }

    async fn failing_handler(_request: Request) -> Result<Response, HandlerError> {
        Err(HandlerError::new("kaboom"))
    }

    fn request(method: Method, uri: &str) -> Request {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn accumulation_preserves_declaration_order() {
        let mut def = ControllerDef::new();
        def.get("/first", handler(ok_handler))
            .unwrap()
            .post("/second", handler(ok_handler))
            .unwrap()
            .delete("/third", handler(ok_handler))
            .unwrap();

        let paths: Vec<_> = def.routes().iter().map(RouteDescriptor::path).collect();
        assert_eq!(paths, vec!["/first", "/second", "/third"]);
        assert_eq!(def.routes()[1].method(), RouteMethod::Post);
        assert_eq!(def.routes()[0].handler_name(), "ok_handler");
    }

    #[test]
    fn route_attachment_rewrites_params() {
        let mut def = ControllerDef::new();
        def.get("/users/:id", handler(ok_handler)).unwrap();
        assert_eq!(def.routes()[0].path(), "/users/:id(\\d+)");
    }

    #[test]
    fn route_attachment_rejects_bad_paths() {
        let mut def = ControllerDef::new();
        let err = def.get("noleadingslash", handler(ok_handler)).unwrap_err();
        assert!(matches!(err, SwitchyardError::InvalidPath { .. }));
    }

    #[test]
    fn param_ids_are_taken_verbatim() {
        let mut def = ControllerDef::new();
        def.param("param", preloader(capture)).param("other", preloader(capture));
        let ids: Vec<_> = def.params().iter().map(ParamDescriptor::id).collect();
        assert_eq!(ids, vec!["param", "other"]);
    }

    struct Empty;

    impl Controller for Empty {
        fn basepath() -> &'static str {
            "/"
        }

        fn configure(_def: &mut ControllerDef) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn empty_controller_still_materializes() {
        let mounted = materialize::<Empty>().unwrap();
        assert_eq!(mounted.name(), "Empty");
        assert_eq!(mounted.entries(), 0);
    }

    struct NoBasepath;

    impl Controller for NoBasepath {
        fn basepath() -> &'static str {
            ""
        }

        fn configure(_def: &mut ControllerDef) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn missing_basepath_is_fatal() {
        let err = materialize::<NoBasepath>().unwrap_err();
        assert!(
            matches!(err, SwitchyardError::MissingBasepath { controller } if controller == "NoBasepath")
        );
    }

    #[derive(Clone)]
    struct Captured(String);

    async fn capture(
        mut request: Request,
        next: crate::handler::Next,
        value: String,
    ) -> Result<Response, HandlerError> {
        request.extensions_mut().insert(Captured(value));
        next.run(request).await
    }

    async fn without_capture(request: Request) -> Result<Response, HandlerError> {
        assert!(request.extensions().get::<Captured>().is_none());
        Ok(StatusCode::OK.into_response())
    }

    struct Counted;

    impl Controller for Counted {
        fn basepath() -> &'static str {
            "/counted"
        }

        fn configure(def: &mut ControllerDef) -> Result<()> {
            def.param("param", preloader(capture));
            def.get("/a", handler(ok_handler))?
                .get("/b", handler(ok_handler))?
                .get("/plain", handler(without_capture))?;
            Ok(())
        }
    }

    #[test]
    fn entries_count_params_and_routes() {
        let mounted = materialize::<Counted>().unwrap();
        assert_eq!(mounted.entries(), 4);
    }

    #[tokio::test]
    async fn preloader_skipped_without_matching_param() {
        let router = materialize::<Counted>().unwrap().router();
        let response = router
            .oneshot(request(Method::GET, "/counted/plain"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    struct Constrained;

    impl Controller for Constrained {
        fn basepath() -> &'static str {
            "/users"
        }

        fn configure(def: &mut ControllerDef) -> Result<()> {
            def.get("/:userId", handler(ok_handler))?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn rewritten_params_reject_non_numeric_values() {
        let router = materialize::<Constrained>().unwrap().router();

        let hit = router
            .clone()
            .oneshot(request(Method::GET, "/users/42"))
            .await
            .unwrap();
        assert_eq!(hit.status(), StatusCode::OK);

        let miss = router
            .oneshot(request(Method::GET, "/users/forty-two"))
            .await
            .unwrap();
        assert_eq!(miss.status(), StatusCode::NOT_FOUND);
    }

    struct Wide;

    impl Controller for Wide {
        fn basepath() -> &'static str {
            "/wide"
        }

        fn configure(def: &mut ControllerDef) -> Result<()> {
            def.all("/any", handler(ok_handler))?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn all_routes_answer_every_method() {
        let router = materialize::<Wide>().unwrap().router();

        for method in [Method::GET, Method::POST, Method::DELETE] {
            let response = router
                .clone()
                .oneshot(request(method, "/wide/any"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    struct Failing;

    impl Controller for Failing {
        fn basepath() -> &'static str {
            "/"
        }

        fn configure(def: &mut ControllerDef) -> Result<()> {
            def.get("/boom", handler(failing_handler))?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn handler_failures_are_forwarded_not_unwound() {
        let router = materialize::<Failing>().unwrap().router();
        let response = router
            .oneshot(request(Method::GET, "/boom"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["statusCode"], 500);
        assert_eq!(body["message"], "kaboom");
    }

    #[test]
    fn route_methods_display_lowercase() {
        assert_eq!(RouteMethod::Get.to_string(), "get");
        assert_eq!(RouteMethod::Delete.to_string(), "delete");
        assert_eq!("patch".parse::<RouteMethod>().unwrap(), RouteMethod::Patch);
    }
}
