//! Invocation adapter
//!
//! Turns incoming tool calls and resource reads into handler invocations:
//! looks up the registration, binds and coerces arguments, runs the handler
//! and classifies whatever goes wrong. A failing invocation never touches
//! shared state, so one bad call cannot contaminate the next.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::endpoint::{EndpointError, JsonObject, ParamKind, ParamSpec};
use crate::registry::{DispatchMaps, ResourceRegistration};

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("unknown tool '{0}'")]
    ToolNotFound(String),
    #[error("no resource matches '{0}'")]
    ResourceNotFound(String),
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("handler failed: {0}")]
    Handler(String),
    #[error("response not serializable: {0}")]
    Serialization(String),
}

/// Payload of a successful resource read.
#[derive(Debug, Clone)]
pub struct ResourceContent {
    pub uri: String,
    pub mime_type: String,
    pub value: Value,
}

/// Read-only view over the dispatch maps that executes invocations.
#[derive(Clone)]
pub struct Dispatcher {
    maps: Arc<DispatchMaps>,
}

impl Dispatcher {
    pub fn new(maps: Arc<DispatchMaps>) -> Self {
        Self { maps }
    }

    pub fn maps(&self) -> &DispatchMaps {
        &self.maps
    }

    /// Call a tool by name with a JSON argument object.
    pub async fn invoke_tool(&self, name: &str, args: JsonObject) -> Result<Value, InvokeError> {
        let registration = self
            .maps
            .tool(name)
            .ok_or_else(|| InvokeError::ToolNotFound(name.to_string()))?;
        let bound = bind_arguments(&registration.params, args)?;
        registration
            .handler
            .call(bound)
            .await
            .map_err(classify_handler_error)
    }

    /// Read a resource by URI.
    ///
    /// The URI is matched against the registered templates; captured
    /// segments are parsed into the declared parameter kinds and any
    /// remaining parameters are filled from defaults.
    pub async fn read_resource(&self, uri: &str) -> Result<ResourceContent, InvokeError> {
        let (registration, captures) = self
            .maps
            .match_resource(uri)
            .ok_or_else(|| InvokeError::ResourceNotFound(uri.to_string()))?;

        let args = resource_arguments(registration, captures)?;
        let value = registration
            .handler
            .call(args)
            .await
            .map_err(classify_handler_error)?;

        Ok(ResourceContent {
            uri: uri.to_string(),
            mime_type: registration.mime_type.clone(),
            value,
        })
    }
}

fn classify_handler_error(err: EndpointError) -> InvokeError {
    match err {
        EndpointError::BadInput(msg) => InvokeError::InvalidArguments(msg),
        EndpointError::Failed(msg) => InvokeError::Handler(msg),
        EndpointError::Unserializable(msg) => InvokeError::Serialization(msg),
    }
}

/// Bind a caller argument object against the declared parameters.
///
/// Explicit `null` counts as absent. Missing values take the declared
/// default when there is one; a missing required parameter and any argument
/// the endpoint never declared are both rejected.
fn bind_arguments(params: &[ParamSpec], mut args: JsonObject) -> Result<JsonObject, InvokeError> {
    let mut bound = JsonObject::new();

    for param in params {
        match args.remove(&param.name) {
            Some(value) if !value.is_null() => {
                check_kind(param, &value)?;
                bound.insert(param.name.clone(), value);
            }
            _ => match &param.default {
                Some(default) if !default.is_null() => {
                    bound.insert(param.name.clone(), default.clone());
                }
                _ if param.required => {
                    return Err(InvokeError::InvalidArguments(format!(
                        "missing required argument '{}'",
                        param.name
                    )));
                }
                _ => {}
            },
        }
    }

    if let Some(name) = args.keys().next() {
        return Err(InvokeError::InvalidArguments(format!(
            "unexpected argument '{}'",
            name
        )));
    }

    Ok(bound)
}

fn check_kind(param: &ParamSpec, value: &Value) -> Result<(), InvokeError> {
    let ok = match param.kind {
        ParamKind::String => value.is_string(),
        ParamKind::Integer => value.as_i64().is_some() || value.as_u64().is_some(),
        ParamKind::Number => value.is_number(),
        ParamKind::Boolean => value.is_boolean(),
        ParamKind::Array => value.is_array(),
        ParamKind::Object => value.is_object(),
    };
    if ok {
        Ok(())
    } else {
        Err(InvokeError::InvalidArguments(format!(
            "argument '{}' must have type {}",
            param.name,
            param.kind.json_type()
        )))
    }
}

fn resource_arguments(
    registration: &ResourceRegistration,
    captures: Vec<(String, String)>,
) -> Result<JsonObject, InvokeError> {
    let mut args = JsonObject::new();

    for (name, raw) in captures {
        let value = match registration.params.iter().find(|p| p.name == name) {
            Some(param) => parse_segment(param, &raw)?,
            // Placeholders with no declared parameter pass through as text.
            None => Value::String(raw),
        };
        args.insert(name, value);
    }

    for param in &registration.params {
        if args.contains_key(&param.name) {
            continue;
        }
        match &param.default {
            Some(default) if !default.is_null() => {
                args.insert(param.name.clone(), default.clone());
            }
            _ if param.required => {
                return Err(InvokeError::InvalidArguments(format!(
                    "resource '{}' needs '{}', which the URI does not carry",
                    registration.template.raw(),
                    param.name
                )));
            }
            _ => {}
        }
    }

    Ok(args)
}

/// Parse one captured URI segment into the declared kind.
fn parse_segment(param: &ParamSpec, raw: &str) -> Result<Value, InvokeError> {
    let cannot = || {
        InvokeError::InvalidArguments(format!(
            "cannot parse '{}' as {} for '{}'",
            raw,
            param.kind.json_type(),
            param.name
        ))
    };

    let value = match param.kind {
        ParamKind::String => Value::String(raw.to_string()),
        ParamKind::Integer => raw
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| cannot())?,
        ParamKind::Number => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(cannot)?,
        ParamKind::Boolean => match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => return Err(cannot()),
        },
        ParamKind::Array => {
            let parsed: Value = serde_json::from_str(raw).map_err(|_| cannot())?;
            if !parsed.is_array() {
                return Err(cannot());
            }
            parsed
        }
        ParamKind::Object => {
            let parsed: Value = serde_json::from_str(raw).map_err(|_| cannot())?;
            if !parsed.is_object() {
                return Err(cannot());
            }
            parsed
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::{AnnotationStore, ResourceMeta};
    use crate::endpoint::{handler, typed_handler, EndpointDescriptor, HttpMethod};
    use crate::registry::{scan, ExposurePolicy};
    use serde_json::json;

    fn args(value: Value) -> JsonObject {
        match value {
            Value::Object(map) => map,
            _ => panic!("test arguments must be an object"),
        }
    }

    fn echo_endpoint(identifier: &str, method: HttpMethod, path: &str) -> EndpointDescriptor {
        let marker = identifier.to_string();
        EndpointDescriptor::new(
            identifier,
            method,
            path,
            handler(move |args: JsonObject| {
                let marker = marker.clone();
                async move { Ok(json!({"handled_by": marker, "args": args})) }
            }),
        )
    }

    fn dispatcher(endpoints: Vec<EndpointDescriptor>, annotations: AnnotationStore) -> Dispatcher {
        let maps = scan(endpoints, &annotations, &ExposurePolicy::default()).unwrap();
        Dispatcher::new(Arc::new(maps))
    }

    #[tokio::test]
    async fn tools_route_to_their_own_handlers() {
        let dispatcher = dispatcher(
            vec![
                echo_endpoint("create_note", HttpMethod::Post, "/notes"),
                echo_endpoint("delete_note", HttpMethod::Post, "/notes/delete"),
            ],
            AnnotationStore::new(),
        );

        let created = dispatcher
            .invoke_tool("create_note", JsonObject::new())
            .await
            .unwrap();
        assert_eq!(created["handled_by"], "create_note");

        let deleted = dispatcher
            .invoke_tool("delete_note", JsonObject::new())
            .await
            .unwrap();
        assert_eq!(deleted["handled_by"], "delete_note");
    }

    #[tokio::test]
    async fn unknown_tool_reports_not_found() {
        let dispatcher = dispatcher(vec![], AnnotationStore::new());
        let err = dispatcher
            .invoke_tool("nope", JsonObject::new())
            .await
            .unwrap_err();
        assert!(matches!(err, InvokeError::ToolNotFound(name) if name == "nope"));
    }

    #[tokio::test]
    async fn binding_enforces_required_defaults_and_types() {
        let endpoint = echo_endpoint("search_notes", HttpMethod::Post, "/notes/search")
            .with_params(vec![
                ParamSpec::new("query", ParamKind::String),
                ParamSpec::optional("limit", ParamKind::Integer).with_default(json!(10)),
            ]);
        let dispatcher = dispatcher(vec![endpoint], AnnotationStore::new());

        let out = dispatcher
            .invoke_tool("search_notes", args(json!({"query": "rust"})))
            .await
            .unwrap();
        assert_eq!(out["args"], json!({"limit": 10, "query": "rust"}));

        let err = dispatcher
            .invoke_tool("search_notes", args(json!({"limit": 3})))
            .await
            .unwrap_err();
        assert!(matches!(err, InvokeError::InvalidArguments(ref msg) if msg.contains("query")));

        let err = dispatcher
            .invoke_tool("search_notes", args(json!({"query": "rust", "limit": "three"})))
            .await
            .unwrap_err();
        assert!(matches!(err, InvokeError::InvalidArguments(ref msg) if msg.contains("limit")));
    }

    #[tokio::test]
    async fn explicit_null_counts_as_absent() {
        let endpoint = echo_endpoint("search_notes", HttpMethod::Post, "/notes/search")
            .with_params(vec![
                ParamSpec::new("query", ParamKind::String),
                ParamSpec::optional("limit", ParamKind::Integer).with_default(json!(10)),
            ]);
        let dispatcher = dispatcher(vec![endpoint], AnnotationStore::new());

        let out = dispatcher
            .invoke_tool("search_notes", args(json!({"query": "rust", "limit": null})))
            .await
            .unwrap();
        assert_eq!(out["args"]["limit"], json!(10));

        let err = dispatcher
            .invoke_tool("search_notes", args(json!({"query": null})))
            .await
            .unwrap_err();
        assert!(matches!(err, InvokeError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn undeclared_arguments_are_rejected() {
        let endpoint = echo_endpoint("create_note", HttpMethod::Post, "/notes")
            .with_param(ParamSpec::new("title", ParamKind::String));
        let dispatcher = dispatcher(vec![endpoint], AnnotationStore::new());

        let err = dispatcher
            .invoke_tool("create_note", args(json!({"title": "x", "sneaky": true})))
            .await
            .unwrap_err();
        assert!(matches!(err, InvokeError::InvalidArguments(ref msg) if msg.contains("sneaky")));
    }

    #[tokio::test]
    async fn resource_segments_parse_into_declared_kinds() {
        let endpoint = echo_endpoint("recent_notes", HttpMethod::Get, "/notes/recent/{count}")
            .with_param(ParamSpec::new("count", ParamKind::Integer));
        let annotations = AnnotationStore::new().resource(
            "recent_notes",
            ResourceMeta::new().at("notes://recent/{count}"),
        );
        let dispatcher = dispatcher(vec![endpoint], annotations);

        let content = dispatcher.read_resource("notes://recent/5").await.unwrap();
        assert_eq!(content.value["args"]["count"], json!(5));
        assert_eq!(content.mime_type, "application/json");
        assert_eq!(content.uri, "notes://recent/5");

        let err = dispatcher
            .read_resource("notes://recent/soon")
            .await
            .unwrap_err();
        assert!(matches!(err, InvokeError::InvalidArguments(ref msg) if msg.contains("soon")));
    }

    #[tokio::test]
    async fn undeclared_placeholders_pass_through_as_text() {
        let endpoint = echo_endpoint("get_note", HttpMethod::Get, "/notes/{id}");
        let annotations =
            AnnotationStore::new().resource("get_note", ResourceMeta::new().at("notes://{id}"));
        let dispatcher = dispatcher(vec![endpoint], annotations);

        let content = dispatcher.read_resource("notes://42").await.unwrap();
        assert_eq!(content.value["args"]["id"], json!("42"));
    }

    #[tokio::test]
    async fn unmatched_uri_reports_not_found() {
        let dispatcher = dispatcher(
            vec![echo_endpoint("list_notes", HttpMethod::Get, "/notes")],
            AnnotationStore::new(),
        );
        let err = dispatcher.read_resource("gantry://missing").await.unwrap_err();
        assert!(matches!(err, InvokeError::ResourceNotFound(uri) if uri == "gantry://missing"));
    }

    #[tokio::test]
    async fn required_param_outside_the_uri_is_rejected() {
        let endpoint = echo_endpoint("list_notes", HttpMethod::Get, "/notes")
            .with_param(ParamSpec::new("tenant", ParamKind::String));
        let dispatcher = dispatcher(vec![endpoint], AnnotationStore::new());

        let err = dispatcher.read_resource("gantry://notes").await.unwrap_err();
        assert!(matches!(err, InvokeError::InvalidArguments(ref msg) if msg.contains("tenant")));
    }

    #[tokio::test]
    async fn handler_failures_are_classified_and_isolated() {
        let failing = EndpointDescriptor::new(
            "broken_tool",
            HttpMethod::Post,
            "/broken",
            handler(|_args: JsonObject| async move {
                Err(EndpointError::Failed("database unavailable".to_string()))
            }),
        );
        let dispatcher = dispatcher(
            vec![failing, echo_endpoint("create_note", HttpMethod::Post, "/notes")],
            AnnotationStore::new(),
        );

        let err = dispatcher
            .invoke_tool("broken_tool", JsonObject::new())
            .await
            .unwrap_err();
        assert!(matches!(err, InvokeError::Handler(ref msg) if msg == "database unavailable"));

        // The failure leaves no trace for the next call.
        let out = dispatcher
            .invoke_tool("create_note", JsonObject::new())
            .await
            .unwrap();
        assert_eq!(out["handled_by"], "create_note");
        let err = dispatcher
            .invoke_tool("broken_tool", JsonObject::new())
            .await
            .unwrap_err();
        assert!(matches!(err, InvokeError::Handler(_)));
    }

    #[tokio::test]
    async fn unserializable_output_is_reported_as_such() {
        struct Opaque;

        impl serde::Serialize for Opaque {
            fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("opaque value"))
            }
        }

        #[derive(serde::Deserialize)]
        struct Empty {}

        let endpoint = EndpointDescriptor::new(
            "export_blob",
            HttpMethod::Post,
            "/export",
            typed_handler(|_input: Empty| async move { Ok(Opaque) }),
        );
        let dispatcher = dispatcher(vec![endpoint], AnnotationStore::new());

        let err = dispatcher
            .invoke_tool("export_blob", JsonObject::new())
            .await
            .unwrap_err();
        assert!(matches!(err, InvokeError::Serialization(_)));
    }
}
