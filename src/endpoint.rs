//! Host endpoint model
//!
//! Hosts describe their routing table as a list of `EndpointDescriptor`s.
//! The adapter never inspects host handler objects; everything it needs
//! (identifier, HTTP method, path, parameter specs, a callable) is carried
//! explicitly on the descriptor.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// JSON object shape used for call arguments.
pub type JsonObject = serde_json::Map<String, Value>;

/// HTTP methods the adapter recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON type of a declared parameter.
///
/// Mirrors the JSON Schema primitive vocabulary. Anything a host cannot
/// express here degrades to `String`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamKind {
    /// JSON Schema type name for this kind.
    pub fn json_type(&self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
            ParamKind::Number => "number",
            ParamKind::Boolean => "boolean",
            ParamKind::Array => "array",
            ParamKind::Object => "object",
        }
    }

    pub(crate) fn from_json_type(name: &str) -> Option<Self> {
        match name {
            "string" => Some(ParamKind::String),
            "integer" => Some(ParamKind::Integer),
            "number" => Some(ParamKind::Number),
            "boolean" => Some(ParamKind::Boolean),
            "array" => Some(ParamKind::Array),
            "object" => Some(ParamKind::Object),
            _ => None,
        }
    }
}

/// Declared parameter of an endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParamSpec {
    /// Required parameter with no default.
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            default: None,
            description: None,
        }
    }

    /// Optional parameter with no default.
    pub fn optional(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            required: false,
            ..Self::new(name, kind)
        }
    }

    /// Attach a default value. A parameter with a default is never required.
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self.required = false;
        self
    }

    pub fn with_description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }
}

/// Failure surface a handler can report.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// Arguments did not bind to the handler's input type.
    #[error("{0}")]
    BadInput(String),
    /// The handler ran and failed.
    #[error("{0}")]
    Failed(String),
    /// The result could not be represented as JSON.
    #[error("{0}")]
    Unserializable(String),
}

/// The callable side of an endpoint.
///
/// Receives the bound argument object and returns a JSON value. The adapter
/// owns coercion and default injection; by the time `call` runs, `args`
/// holds exactly the declared parameters.
#[async_trait]
pub trait EndpointHandler: Send + Sync {
    async fn call(&self, args: JsonObject) -> Result<Value, EndpointError>;
}

/// Shared, non-owning handler reference stored in registrations.
pub type HandlerRef = Arc<dyn EndpointHandler>;

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> EndpointHandler for FnHandler<F>
where
    F: Fn(JsonObject) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, EndpointError>> + Send,
{
    async fn call(&self, args: JsonObject) -> Result<Value, EndpointError> {
        (self.0)(args).await
    }
}

/// Wrap a closure over the raw argument object.
pub fn handler<F, Fut>(f: F) -> HandlerRef
where
    F: Fn(JsonObject) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, EndpointError>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

struct TypedHandler<F, In, Out> {
    f: F,
    _marker: PhantomData<fn(In) -> Out>,
}

#[async_trait]
impl<F, Fut, In, Out> EndpointHandler for TypedHandler<F, In, Out>
where
    F: Fn(In) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Out, EndpointError>> + Send,
    In: DeserializeOwned + Send,
    Out: Serialize + Send,
{
    async fn call(&self, args: JsonObject) -> Result<Value, EndpointError> {
        let input: In = serde_json::from_value(Value::Object(args))
            .map_err(|e| EndpointError::BadInput(format!("cannot bind arguments: {}", e)))?;
        let out = (self.f)(input).await?;
        serde_json::to_value(out).map_err(|e| EndpointError::Unserializable(e.to_string()))
    }
}

/// Wrap a closure over a typed input.
///
/// The argument object is deserialized into `In`; the `Out` value is
/// serialized back to JSON. Serialization failure surfaces as
/// `EndpointError::Unserializable`.
pub fn typed_handler<In, Out, F, Fut>(f: F) -> HandlerRef
where
    F: Fn(In) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Out, EndpointError>> + Send + 'static,
    In: DeserializeOwned + Send + 'static,
    Out: Serialize + Send + 'static,
{
    Arc::new(TypedHandler {
        f,
        _marker: PhantomData,
    })
}

/// One host endpoint as the adapter sees it.
#[derive(Clone)]
pub struct EndpointDescriptor {
    /// Unique identifier within the host (typically the handler name).
    pub identifier: String,
    pub method: HttpMethod,
    /// Route path, may contain `{param}` segments.
    pub path: String,
    /// Optional one-line doc from the host.
    pub summary: Option<String>,
    pub params: Vec<ParamSpec>,
    pub handler: HandlerRef,
}

impl EndpointDescriptor {
    pub fn new(
        identifier: impl Into<String>,
        method: HttpMethod,
        path: impl Into<String>,
        handler: HandlerRef,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            method,
            path: path.into(),
            summary: None,
            params: Vec::new(),
            handler,
        }
    }

    pub fn with_param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn with_params(mut self, params: Vec<ParamSpec>) -> Self {
        self.params = params;
        self
    }

    pub fn with_summary(mut self, text: impl Into<String>) -> Self {
        self.summary = Some(text.into());
        self
    }
}

impl fmt::Debug for EndpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointDescriptor")
            .field("identifier", &self.identifier)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Pull-based view of a host's routing table.
///
/// The coordinator asks for endpoints exactly once, at scan time, after the
/// host reports startup completion. There is no ambient registry; whoever
/// builds the coordinator decides what is visible.
pub trait EndpointSource: Send + Sync {
    fn list_endpoints(&self) -> Vec<EndpointDescriptor>;
}

impl EndpointSource for Vec<EndpointDescriptor> {
    fn list_endpoints(&self) -> Vec<EndpointDescriptor> {
        self.clone()
    }
}
