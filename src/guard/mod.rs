//! Content-type gating for route handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::Request;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use serde_json::json;

use crate::handler::RouteHandler;

/// Wraps `inner` so requests whose `Content-Type` does not match
/// `expected` are answered with `400` and never reach `inner`. Matching
/// requests are delegated unchanged, `inner`'s own failures propagating
/// as usual.
///
/// Matching compares media-type essences: parameters such as
/// `; charset=utf-8` are ignored, `type/*` wildcards are honored, and a
/// bare subtype like `"json"` also matches `+json` suffixed types.
pub fn content_type(expected: &'static str, inner: RouteHandler) -> RouteHandler {
    let name = inner.name;

    RouteHandler {
        name,
        f: Arc::new(move |request: Request| {
            let inner = inner.clone();
            Box::pin(async move {
                let matches = request
                    .headers()
                    .get(header::CONTENT_TYPE)
                    .and_then(|value| value.to_str().ok())
                    .is_some_and(|declared| media_type_matches(declared, expected));

                if matches {
                    inner.call(request).await
                } else {
                    Ok((
                        StatusCode::BAD_REQUEST,
                        Json(json!({
                            "message": format!("Route requires Content-Type: {expected}"),
                        })),
                    )
                        .into_response())
                }
            })
        }),
    }
}

fn media_type_matches(declared: &str, expected: &str) -> bool {
    let declared = essence(declared);
    let expected = expected.trim().to_ascii_lowercase();

    if expected == "*/*" || declared == expected {
        return true;
    }

    match (declared.split_once('/'), expected.split_once('/')) {
        (Some((dtype, dsub)), Some((etype, esub))) => {
            (etype == "*" || etype == dtype)
                && (esub == "*" || esub == dsub || dsub.ends_with(&format!("+{esub}")))
        }
        // A bare subtype: "json" matches application/json and +json types.
        (Some((_, dsub)), None) => dsub == expected || dsub.ends_with(&format!("+{expected}")),
        _ => false,
    }
}

fn essence(value: &str) -> String {
    value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
