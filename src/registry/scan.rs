//! Registry scanner
//!
//! Walks the host application's endpoint descriptors once, consults the
//! annotation store, and produces the dispatch maps. Any registration
//! conflict aborts the scan with an error naming both endpoints involved.

use std::collections::HashSet;

use thiserror::Error;
use tracing::debug;

use crate::annotate::{AnnotationStore, ResourceMeta, ToolMeta};
use crate::endpoint::{EndpointDescriptor, HttpMethod};
use crate::registry::maps::{DispatchMaps, EndpointRef, ResourceRegistration, ToolRegistration};
use crate::registry::uri::{TemplateError, UriTemplate};
use crate::schema;

/// Controls which unannotated endpoints get exposed.
///
/// Annotated endpoints are always registered as annotated, whatever their
/// method. Unannotated endpoints are exposed only when `auto_expose` is on:
/// `tool_methods` become tools and `resource_methods` become resources.
/// Every other method (by default DELETE, HEAD and OPTIONS) is skipped.
#[derive(Debug, Clone)]
pub struct ExposurePolicy {
    pub auto_expose: bool,
    pub tool_methods: Vec<HttpMethod>,
    pub resource_methods: Vec<HttpMethod>,
    /// Scheme for URIs derived from endpoint paths.
    pub uri_scheme: String,
}

impl Default for ExposurePolicy {
    fn default() -> Self {
        Self {
            auto_expose: true,
            tool_methods: vec![HttpMethod::Post, HttpMethod::Put, HttpMethod::Patch],
            resource_methods: vec![HttpMethod::Get],
            uri_scheme: "gantry".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("duplicate tool name '{name}': endpoints '{first}' and '{second}'")]
    DuplicateTool {
        name: String,
        first: String,
        second: String,
    },
    #[error("duplicate resource template '{uri}': endpoints '{first}' and '{second}'")]
    DuplicateResource {
        uri: String,
        first: String,
        second: String,
    },
    #[error("invalid resource template '{uri}' on endpoint '{endpoint}'")]
    BadTemplate {
        endpoint: String,
        uri: String,
        #[source]
        source: TemplateError,
    },
    #[error("duplicate endpoint identifier '{0}'")]
    DuplicateEndpoint(String),
}

/// Build dispatch maps from the host's endpoints.
///
/// The scan is a pure function of its inputs. On any error the partial maps
/// are dropped and nothing is registered.
pub fn scan(
    endpoints: Vec<EndpointDescriptor>,
    annotations: &AnnotationStore,
    policy: &ExposurePolicy,
) -> Result<DispatchMaps, ScanError> {
    let mut maps = DispatchMaps::new();
    let mut seen: HashSet<String> = HashSet::new();

    for endpoint in &endpoints {
        if !seen.insert(endpoint.identifier.clone()) {
            return Err(ScanError::DuplicateEndpoint(endpoint.identifier.clone()));
        }

        match annotations.get(&endpoint.identifier) {
            Some(intents) => {
                if let Some(meta) = &intents.tool {
                    register_tool(&mut maps, endpoint, Some(meta))?;
                }
                if let Some(meta) = &intents.resource {
                    register_resource(&mut maps, endpoint, Some(meta), policy)?;
                }
            }
            None if policy.auto_expose => {
                if policy.tool_methods.contains(&endpoint.method) {
                    register_tool(&mut maps, endpoint, None)?;
                } else if policy.resource_methods.contains(&endpoint.method) {
                    register_resource(&mut maps, endpoint, None, policy)?;
                } else {
                    debug!(
                        "Skipping endpoint '{}': {} is not an exposed method",
                        endpoint.identifier, endpoint.method
                    );
                }
            }
            None => {
                debug!(
                    "Skipping endpoint '{}': auto-expose is disabled",
                    endpoint.identifier
                );
            }
        }
    }

    Ok(maps)
}

fn endpoint_ref(endpoint: &EndpointDescriptor) -> EndpointRef {
    EndpointRef {
        identifier: endpoint.identifier.clone(),
        method: endpoint.method,
        path: endpoint.path.clone(),
    }
}

fn register_tool(
    maps: &mut DispatchMaps,
    endpoint: &EndpointDescriptor,
    meta: Option<&ToolMeta>,
) -> Result<(), ScanError> {
    let auto_exposed = meta.is_none();
    let name = meta
        .and_then(|m| m.name.clone())
        .unwrap_or_else(|| endpoint.identifier.clone());

    if let Some(existing) = maps.tool(&name) {
        return Err(ScanError::DuplicateTool {
            name,
            first: existing.endpoint.identifier.clone(),
            second: endpoint.identifier.clone(),
        });
    }

    let description = meta
        .and_then(|m| m.description.clone())
        .or_else(|| endpoint.summary.clone())
        .unwrap_or_else(|| {
            if auto_exposed {
                format!("Auto-exposed tool: {}", endpoint.identifier)
            } else {
                format!("Tool: {}", name)
            }
        });

    debug!(
        "Registering tool '{}' for endpoint '{}' ({} {})",
        name, endpoint.identifier, endpoint.method, endpoint.path
    );

    maps.insert_tool(ToolRegistration {
        name,
        title: meta.and_then(|m| m.title.clone()),
        description,
        input_schema: schema::input_schema(&endpoint.params),
        params: endpoint.params.clone(),
        endpoint: endpoint_ref(endpoint),
        handler: endpoint.handler.clone(),
        auto_exposed,
    });
    Ok(())
}

fn register_resource(
    maps: &mut DispatchMaps,
    endpoint: &EndpointDescriptor,
    meta: Option<&ResourceMeta>,
    policy: &ExposurePolicy,
) -> Result<(), ScanError> {
    let auto_exposed = meta.is_none();
    let raw = meta
        .and_then(|m| m.uri_template.clone())
        .unwrap_or_else(|| derive_uri(&policy.uri_scheme, &endpoint.path));

    let template = UriTemplate::parse(&raw).map_err(|source| ScanError::BadTemplate {
        endpoint: endpoint.identifier.clone(),
        uri: raw.clone(),
        source,
    })?;

    if let Some(existing) = maps.resource_exact(template.raw()) {
        return Err(ScanError::DuplicateResource {
            uri: raw,
            first: existing.endpoint.identifier.clone(),
            second: endpoint.identifier.clone(),
        });
    }

    let name = meta
        .and_then(|m| m.name.clone())
        .unwrap_or_else(|| endpoint.identifier.clone());
    let description = meta
        .and_then(|m| m.description.clone())
        .or_else(|| endpoint.summary.clone())
        .unwrap_or_else(|| {
            if auto_exposed {
                format!("Auto-exposed resource: {}", endpoint.identifier)
            } else {
                format!("Resource: {}", name)
            }
        });
    let mime_type = meta
        .and_then(|m| m.mime_type.clone())
        .unwrap_or_else(|| "application/json".to_string());

    debug!(
        "Registering resource '{}' for endpoint '{}' ({} {})",
        template.raw(),
        endpoint.identifier,
        endpoint.method,
        endpoint.path
    );

    maps.insert_resource(ResourceRegistration {
        template,
        name,
        title: meta.and_then(|m| m.title.clone()),
        description,
        mime_type,
        params: endpoint.params.clone(),
        endpoint: endpoint_ref(endpoint),
        handler: endpoint.handler.clone(),
        auto_exposed,
    });
    Ok(())
}

/// Derive a resource URI from an endpoint path.
///
/// Path separators flatten to underscores and placeholder segments are kept
/// verbatim, so `/notes/{id}` under the `gantry` scheme becomes
/// `gantry://notes_{id}`.
fn derive_uri(scheme: &str, path: &str) -> String {
    let flattened = path.replace('/', "_");
    format!("{}://{}", scheme, flattened.trim_matches('_'))
}
