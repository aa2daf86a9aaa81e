//! MCP server bridge using rmcp over the scanned dispatch maps
//!
//! This module implements the MCP protocol using the rmcp crate, bridging
//! MCP tool calls and resource reads to host endpoint handlers.

use std::sync::Arc;

use rmcp::{
    ErrorData as McpError,
    ServerHandler,
    model::*,
    service::{RequestContext, RoleServer},
};
use serde_json::json;

use crate::dispatch::{Dispatcher, InvokeError};
use crate::lifecycle::Gantry;
use crate::registry::DispatchMaps;

// =============================================================================
// Registration Transformation
// =============================================================================

/// Convert tool registrations to rmcp Tool format.
///
/// The scanner builds every input schema with "type": "object" at the root,
/// which is what MCP requires.
fn registrations_to_rmcp_tools(maps: &DispatchMaps) -> Vec<Tool> {
    maps.tools()
        .into_iter()
        .map(|registration| {
            Tool::new(
                registration.name.clone(),
                registration.description.clone(),
                Arc::new(registration.input_schema.clone()),
            )
        })
        .collect()
}

/// Concrete resource registrations as listable rmcp Resources.
fn registrations_to_rmcp_resources(maps: &DispatchMaps) -> Vec<Resource> {
    maps.resources()
        .into_iter()
        .filter(|registration| registration.template.is_concrete())
        .map(|registration| {
            let mut resource =
                RawResource::new(registration.template.raw(), registration.name.clone());
            resource.description = Some(registration.description.clone());
            resource.mime_type = Some(registration.mime_type.clone());
            resource.no_annotation()
        })
        .collect()
}

/// Parameterized resource registrations as rmcp ResourceTemplates.
fn registrations_to_rmcp_templates(maps: &DispatchMaps) -> Vec<ResourceTemplate> {
    maps.resources()
        .into_iter()
        .filter(|registration| !registration.template.is_concrete())
        .map(|registration| {
            RawResourceTemplate {
                uri_template: registration.template.raw().to_string(),
                name: registration.name.clone(),
                title: registration.title.clone(),
                description: Some(registration.description.clone()),
                mime_type: Some(registration.mime_type.clone()),
            }
            .no_annotation()
        })
        .collect()
}

/// Render an invocation result the way clients expect text content: strings
/// pass through untouched, everything else pretty-prints as JSON.
fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_default(),
    }
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert InvokeError to McpError
fn invoke_to_mcp_error(e: InvokeError) -> McpError {
    match e {
        InvokeError::ToolNotFound(name) => {
            McpError::invalid_params(format!("Unknown tool: {}", name), None)
        }
        InvokeError::ResourceNotFound(uri) => McpError::resource_not_found(
            format!("Unknown resource: {}", uri),
            Some(json!({ "uri": uri })),
        ),
        InvokeError::InvalidArguments(reason) => McpError::invalid_params(reason, None),
        InvokeError::Handler(error) => McpError::internal_error(error, None),
        InvokeError::Serialization(error) => {
            McpError::internal_error(format!("Result not serializable: {}", error), None)
        }
    }
}

// =============================================================================
// Gantry MCP Bridge
// =============================================================================

/// MCP handler that bridges to the scanned endpoint registry
#[derive(Clone)]
pub struct GantryMcpBridge {
    gantry: Arc<Gantry>,
}

impl GantryMcpBridge {
    pub fn new(gantry: Arc<Gantry>) -> Self {
        Self { gantry }
    }

    fn dispatcher(&self) -> Result<Dispatcher, McpError> {
        self.gantry
            .dispatcher()
            .map_err(|_| McpError::internal_error("Endpoints have not been scanned yet", None))
    }
}

impl ServerHandler for GantryMcpBridge {
    fn get_info(&self) -> ServerInfo {
        let config = self.gantry.config();
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .enable_logging()
                .build(),
            server_info: Implementation {
                name: config.server_name.clone(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(format!(
                "{} - exposes the host application's endpoints as MCP tools and resources.",
                config.server_name
            )),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let dispatcher = self.dispatcher()?;
        let tools = registrations_to_rmcp_tools(dispatcher.maps());

        tracing::debug!("Listing {} tools", tools.len());

        Ok(ListToolsResult {
            tools,
            next_cursor: None,
            meta: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        ctx: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let tool_name = request.name.clone();
        let arguments = request.arguments.unwrap_or_default();

        tracing::debug!("Calling tool: {} with args: {:?}", tool_name, arguments);

        let dispatcher = self.dispatcher()?;
        let outcome = tokio::select! {
            _ = ctx.ct.cancelled() => {
                return Err(McpError::internal_error("Cancelled", None));
            }
            outcome = dispatcher.invoke_tool(&tool_name, arguments) => outcome,
        };

        match outcome {
            Ok(value) => Ok(CallToolResult::success(vec![Content::text(render_value(
                &value,
            ))])),
            // Handler failures stay inside the tool result so the session
            // keeps going; the client also gets a logging notification.
            Err(InvokeError::Handler(message)) => {
                let _ = ctx
                    .peer
                    .notify_logging_message(LoggingMessageNotificationParam {
                        level: LoggingLevel::Error,
                        logger: Some(format!("gantry.{}", tool_name)),
                        data: json!({
                            "type": "error",
                            "tool": tool_name,
                            "error": message,
                        }),
                    })
                    .await;
                Ok(CallToolResult::error(vec![Content::text(message)]))
            }
            Err(other) => Err(invoke_to_mcp_error(other)),
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        let dispatcher = self.dispatcher()?;
        let resources = registrations_to_rmcp_resources(dispatcher.maps());

        tracing::debug!("Listing {} resources", resources.len());

        Ok(ListResourcesResult {
            resources,
            next_cursor: None,
            meta: None,
        })
    }

    async fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParam>,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<ListResourceTemplatesResult, McpError> {
        let dispatcher = self.dispatcher()?;
        let resource_templates = registrations_to_rmcp_templates(dispatcher.maps());

        tracing::debug!("Listing {} resource templates", resource_templates.len());

        Ok(ListResourceTemplatesResult {
            resource_templates,
            next_cursor: None,
            meta: None,
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        ctx: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let uri = request.uri;

        tracing::debug!("Reading resource: {}", uri);

        let dispatcher = self.dispatcher()?;
        let content = tokio::select! {
            _ = ctx.ct.cancelled() => {
                return Err(McpError::internal_error("Cancelled", None));
            }
            outcome = dispatcher.read_resource(&uri) => outcome.map_err(invoke_to_mcp_error)?,
        };

        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(render_value(&content.value), uri)],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::{AnnotationStore, ResourceMeta, ToolMeta};
    use crate::config::McpConfig;
    use crate::endpoint::{handler, EndpointDescriptor, HttpMethod, JsonObject};
    use crate::registry::{scan, ExposurePolicy};
    use serde_json::Value;

    fn endpoint(identifier: &str, method: HttpMethod, path: &str) -> EndpointDescriptor {
        EndpointDescriptor::new(
            identifier,
            method,
            path,
            handler(|_args: JsonObject| async move { Ok(Value::Null) }),
        )
    }

    fn demo_maps() -> DispatchMaps {
        let endpoints = vec![
            endpoint("create_note", HttpMethod::Post, "/notes"),
            endpoint("list_notes", HttpMethod::Get, "/notes"),
            endpoint("get_note", HttpMethod::Get, "/notes/{id}"),
        ];
        let annotations = AnnotationStore::new()
            .tool("create_note", ToolMeta::new().describe("Create a note"))
            .resource("get_note", ResourceMeta::new().at("notes://{id}"));
        scan(endpoints, &annotations, &ExposurePolicy::default()).unwrap()
    }

    #[test]
    fn tools_convert_with_object_schemas() {
        let maps = demo_maps();
        let tools = registrations_to_rmcp_tools(&maps);

        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "create_note");
        assert_eq!(tools[0].description.as_deref(), Some("Create a note"));
        assert_eq!(
            tools[0].input_schema.get("type"),
            Some(&serde_json::json!("object"))
        );
    }

    #[test]
    fn resources_split_into_concrete_and_templated() {
        let maps = demo_maps();

        let resources = registrations_to_rmcp_resources(&maps);
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].uri, "gantry://notes");

        let templates = registrations_to_rmcp_templates(&maps);
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].uri_template, "notes://{id}");
    }

    #[test]
    fn errors_map_to_protocol_errors() {
        let err = invoke_to_mcp_error(InvokeError::ToolNotFound("nope".to_string()));
        assert!(err.message.contains("Unknown tool: nope"));

        let err = invoke_to_mcp_error(InvokeError::ResourceNotFound("x://y".to_string()));
        assert!(err.message.contains("Unknown resource: x://y"));
        assert_eq!(err.data, Some(json!({ "uri": "x://y" })));

        let err = invoke_to_mcp_error(InvokeError::InvalidArguments(
            "missing required argument 'query'".to_string(),
        ));
        assert!(err.message.contains("query"));
    }

    #[test]
    fn get_info_reports_the_configured_server() {
        let gantry = Gantry::new(
            McpConfig::default(),
            Vec::<EndpointDescriptor>::new(),
            AnnotationStore::new(),
        );
        let bridge = GantryMcpBridge::new(Arc::new(gantry));

        let info = bridge.get_info();
        assert_eq!(info.server_info.name, "gantry-mcp-server");
        assert!(info.capabilities.tools.is_some());
        assert!(info.capabilities.resources.is_some());
    }
}
