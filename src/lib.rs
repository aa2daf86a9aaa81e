pub mod annotate;
pub mod config;
pub mod demo;
pub mod dispatch;
pub mod endpoint;
pub mod lifecycle;
pub mod mcp_bridge;
pub mod registry;
pub mod schema;
pub mod transport;

// Re-export commonly used items
pub use annotate::{AnnotationStore, EndpointIntents, ResourceMeta, ToolMeta};
pub use config::{McpConfig, TransportKind};
pub use dispatch::{Dispatcher, InvokeError, ResourceContent};
pub use endpoint::{
    handler, typed_handler, EndpointDescriptor, EndpointError, EndpointSource, HttpMethod,
    JsonObject, ParamKind, ParamSpec,
};
pub use lifecycle::{Gantry, LifecycleError, LifecycleState};
pub use mcp_bridge::GantryMcpBridge;
pub use registry::{scan, DispatchMaps, ExposurePolicy, ScanError, UriTemplate};
