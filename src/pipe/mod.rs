//! Payload validation for route handlers.
//!
//! The validation engine is the `jsonschema` crate; this module only
//! selects the payload (query for GET, JSON body otherwise), normalizes
//! the schema, and turns failures into `400` responses.

use std::sync::Arc;

use axum::Json;
use axum::body::{Body, to_bytes};
use axum::extract::Request;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::error::{Result, SwitchyardError};
use crate::handler::{HandlerError, RouteHandler};

/// Largest body the validator will buffer.
const BODY_LIMIT: usize = 2 * 1024 * 1024;

/// A payload schema for [`validate`].
pub enum Schema {
    /// A complete JSON Schema document.
    Composite(Value),
    /// Field-name-to-schema mapping, normalized into an object schema
    /// whose mapped fields are all required.
    Fields(Vec<(String, Value)>),
}

impl Schema {
    pub fn object(schema: Value) -> Self {
        Self::Composite(schema)
    }

    pub fn fields<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self::Fields(
            fields
                .into_iter()
                .map(|(name, schema)| (name.into(), schema))
                .collect(),
        )
    }

    fn into_composite(self) -> Value {
        match self {
            Self::Composite(schema) => schema,
            Self::Fields(fields) => {
                let required: Vec<_> = fields.iter().map(|(name, _)| name.clone()).collect();
                let properties: Map<String, Value> = fields.into_iter().collect();
                json!({
                    "type": "object",
                    "properties": properties,
                    "required": required,
                })
            }
        }
    }
}

impl From<Value> for Schema {
    fn from(schema: Value) -> Self {
        Self::Composite(schema)
    }
}

#[derive(Debug, Serialize)]
struct ValidationDetail {
    message: String,
    path: String,
}

enum Payload {
    Checked(Value, Request),
    Malformed(Vec<ValidationDetail>),
}

/// Wraps `inner` so the request payload is validated before it runs: the
/// query parameters for a GET request, the buffered JSON body otherwise.
///
/// On failure the route answers `400` with a JSON array of
/// `{message, path}` details and `inner` is never invoked; on success the
/// request is delegated with its body restored. Schema compilation
/// failures are startup-fatal.
pub fn validate(schema: impl Into<Schema>, inner: RouteHandler) -> Result<RouteHandler> {
    let composite = schema.into().into_composite();
    let validator =
        jsonschema::validator_for(&composite).map_err(|error| SwitchyardError::InvalidSchema {
            reason: error.to_string(),
        })?;
    let validator = Arc::new(validator);
    let name = inner.name;

    Ok(RouteHandler {
        name,
        f: Arc::new(move |request: Request| {
            let validator = validator.clone();
            let inner = inner.clone();
            Box::pin(async move {
                let (payload, request) = match extract_payload(request).await? {
                    Payload::Checked(payload, request) => (payload, request),
                    Payload::Malformed(details) => return Ok(bad_request(details)),
                };

                let details: Vec<ValidationDetail> = validator
                    .iter_errors(&payload)
                    .map(|error| ValidationDetail {
                        message: error.to_string(),
                        path: error.instance_path.to_string(),
                    })
                    .collect();

                if details.is_empty() {
                    inner.call(request).await
                } else {
                    Ok(bad_request(details))
                }
            })
        }),
    })
}

fn bad_request(details: Vec<ValidationDetail>) -> Response {
    (StatusCode::BAD_REQUEST, Json(details)).into_response()
}

async fn extract_payload(request: Request) -> std::result::Result<Payload, HandlerError> {
    if request.method() == Method::GET {
        return Ok(match query_payload(request.uri().query().unwrap_or("")) {
            Ok(payload) => Payload::Checked(payload, request),
            Err(error) => Payload::Malformed(vec![ValidationDetail {
                message: format!("malformed query string: {error}"),
                path: String::new(),
            }]),
        });
    }

    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, BODY_LIMIT).await.map_err(HandlerError::new)?;

    let payload = if bytes.is_empty() {
        Value::Object(Map::new())
    } else {
        match serde_json::from_slice(&bytes) {
            Ok(payload) => payload,
            Err(error) => {
                return Ok(Payload::Malformed(vec![ValidationDetail {
                    message: format!("invalid JSON payload: {error}"),
                    path: String::new(),
                }]));
            }
        }
    };

    let request = Request::from_parts(parts, Body::from(bytes));
    Ok(Payload::Checked(payload, request))
}

/// Query parameters as a JSON object. A value that parses as JSON is
/// validated as its parsed form (`include=[1,2,3]` is an array), anything
/// else stays a string.
fn query_payload(query: &str) -> std::result::Result<Value, serde_urlencoded::de::Error> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)?;
    let mut object = Map::new();
    for (key, raw) in pairs {
        let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
        object.insert(key, value);
    }
    Ok(Value::Object(object))
}
