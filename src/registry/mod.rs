//! Endpoint registry
//!
//! Everything between the host's endpoint listing and the MCP surface:
//! URI templates, the scanner, and the dispatch maps it produces.

pub mod maps;
pub mod scan;
pub mod uri;

pub use maps::{DispatchMaps, EndpointRef, ResourceRegistration, ToolRegistration};
pub use scan::{scan, ExposurePolicy, ScanError};
pub use uri::{TemplateError, UriTemplate};
