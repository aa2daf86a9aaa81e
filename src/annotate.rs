//! Registration side-table
//!
//! Intent to expose an endpoint lives here, keyed by endpoint identifier,
//! instead of being written onto host handler objects. The scanner consults
//! the store; endpoints without an entry fall back to auto-exposure policy.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Overrides for an endpoint exposed as a tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolMeta {
    /// Tool name; defaults to the endpoint identifier.
    pub name: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

impl ToolMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }
}

/// Overrides for an endpoint exposed as a resource.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceMeta {
    /// URI template, e.g. `"notes://{id}"`. Defaults to a URI derived
    /// from the endpoint path.
    pub uri_template: Option<String>,
    pub name: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Defaults to `application/json`; results are serialized JSON.
    pub mime_type: Option<String>,
}

impl ResourceMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(mut self, uri_template: impl Into<String>) -> Self {
        self.uri_template = Some(uri_template.into());
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn mime(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// Intents recorded for one endpoint.
///
/// An endpoint may be exposed as a tool, a resource, or both at once; the
/// scanner registers every intent present.
#[derive(Debug, Clone, Default)]
pub struct EndpointIntents {
    pub tool: Option<ToolMeta>,
    pub resource: Option<ResourceMeta>,
}

/// Side-table of registration intents, keyed by endpoint identifier.
///
/// Tool and resource intents for the same identifier coexist. Annotating
/// an identifier again with the same kind replaces that kind only.
#[derive(Debug, Default)]
pub struct AnnotationStore {
    entries: HashMap<String, EndpointIntents>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record tool intent for an endpoint.
    pub fn tool(mut self, identifier: impl Into<String>, meta: ToolMeta) -> Self {
        self.insert_tool(identifier, meta);
        self
    }

    /// Record resource intent for an endpoint.
    pub fn resource(mut self, identifier: impl Into<String>, meta: ResourceMeta) -> Self {
        self.insert_resource(identifier, meta);
        self
    }

    pub fn insert_tool(&mut self, identifier: impl Into<String>, meta: ToolMeta) {
        self.entries.entry(identifier.into()).or_default().tool = Some(meta);
    }

    pub fn insert_resource(&mut self, identifier: impl Into<String>, meta: ResourceMeta) {
        self.entries.entry(identifier.into()).or_default().resource = Some(meta);
    }

    pub fn get(&self, identifier: &str) -> Option<&EndpointIntents> {
        self.entries.get(identifier)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
