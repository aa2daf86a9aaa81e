//! Dispatch maps
//!
//! The scanner's output: immutable lookup tables from tool name and resource
//! URI template to registration records. Built once, then shared read-only
//! behind an `Arc` for the lifetime of the server.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Serialize;

use crate::endpoint::{HandlerRef, HttpMethod, ParamSpec};
use crate::registry::uri::UriTemplate;

/// Where a registration came from.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointRef {
    pub identifier: String,
    pub method: HttpMethod,
    pub path: String,
}

/// A tool entry in the dispatch maps.
#[derive(Clone)]
pub struct ToolRegistration {
    pub name: String,
    pub title: Option<String>,
    pub description: String,
    /// Prebuilt JSON Schema for the tool input, root `"type": "object"`.
    pub input_schema: crate::endpoint::JsonObject,
    pub params: Vec<ParamSpec>,
    pub endpoint: EndpointRef,
    pub handler: HandlerRef,
    pub auto_exposed: bool,
}

impl fmt::Debug for ToolRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistration")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("auto_exposed", &self.auto_exposed)
            .finish_non_exhaustive()
    }
}

/// A resource entry in the dispatch maps.
#[derive(Clone)]
pub struct ResourceRegistration {
    pub template: UriTemplate,
    pub name: String,
    pub title: Option<String>,
    pub description: String,
    pub mime_type: String,
    pub params: Vec<ParamSpec>,
    pub endpoint: EndpointRef,
    pub handler: HandlerRef,
    pub auto_exposed: bool,
}

impl fmt::Debug for ResourceRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRegistration")
            .field("template", &self.template)
            .field("endpoint", &self.endpoint)
            .field("auto_exposed", &self.auto_exposed)
            .finish_non_exhaustive()
    }
}

/// Immutable tool and resource lookup tables.
///
/// Tools are keyed by tool name. Resources are keyed by raw template text in
/// a sorted map so pattern matching tries candidates in a deterministic
/// order.
#[derive(Default)]
pub struct DispatchMaps {
    tools: HashMap<String, ToolRegistration>,
    resources: BTreeMap<String, ResourceRegistration>,
}

impl DispatchMaps {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert_tool(&mut self, registration: ToolRegistration) {
        self.tools.insert(registration.name.clone(), registration);
    }

    pub(crate) fn insert_resource(&mut self, registration: ResourceRegistration) {
        self.resources
            .insert(registration.template.raw().to_string(), registration);
    }

    pub fn tool(&self, name: &str) -> Option<&ToolRegistration> {
        self.tools.get(name)
    }

    pub fn resource_exact(&self, template: &str) -> Option<&ResourceRegistration> {
        self.resources.get(template)
    }

    /// Tool registrations sorted by name.
    pub fn tools(&self) -> Vec<&ToolRegistration> {
        let mut tools: Vec<&ToolRegistration> = self.tools.values().collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    /// Resource registrations sorted by raw template.
    pub fn resources(&self) -> Vec<&ResourceRegistration> {
        self.resources.values().collect()
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty() && self.resources.is_empty()
    }

    /// Resolve a URI to a resource registration.
    ///
    /// Exact raw-template match wins; otherwise templates are tried in
    /// sorted order and the first pattern match is taken. Captures are
    /// placeholder name/value pairs in template order.
    pub fn match_resource(&self, uri: &str) -> Option<(&ResourceRegistration, Vec<(String, String)>)> {
        if let Some(registration) = self.resources.get(uri) {
            return Some((registration, Vec::new()));
        }
        for registration in self.resources.values() {
            if registration.template.is_concrete() {
                continue;
            }
            if let Some(captures) = registration.template.matches(uri) {
                return Some((registration, captures));
            }
        }
        None
    }

    /// Deterministic hash over all registrations.
    ///
    /// Computed from the sorted tool names and resource templates together
    /// with their backing endpoints. Changes whenever the exposed surface
    /// changes; reported at startup and on the debug endpoint.
    pub fn compute_hash(&self) -> String {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut entries: Vec<String> = self
            .tools
            .values()
            .map(|t| {
                format!(
                    "tool:{}:{} {}",
                    t.name, t.endpoint.method, t.endpoint.path
                )
            })
            .chain(self.resources.values().map(|r| {
                format!(
                    "resource:{}:{} {}",
                    r.template.raw(),
                    r.endpoint.method,
                    r.endpoint.path
                )
            }))
            .collect();
        entries.sort();

        let combined = entries.join(";");
        let mut hasher = DefaultHasher::new();
        combined.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }
}

impl fmt::Debug for DispatchMaps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchMaps")
            .field("tools", &self.tools.len())
            .field("resources", &self.resources.len())
            .finish()
    }
}
