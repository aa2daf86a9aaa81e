//! Adapter configuration
//!
//! Loaded from a TOML file, with every field defaulted so an empty file (or
//! no file at all) yields a working development setup.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::endpoint::HttpMethod;
use crate::registry::ExposurePolicy;

/// How the MCP surface is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Streamable HTTP mounted under `mcp_path_prefix`.
    Http,
    /// The process's own stdin/stdout.
    Stdio,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    /// Master switch; when off the adapter refuses to serve.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Name reported to MCP clients during initialization.
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Expose unannotated endpoints automatically.
    #[serde(default = "default_auto_expose")]
    pub auto_expose: bool,

    /// Carried for host deployments that front the adapter with an
    /// authenticating proxy. The adapter itself never enforces it.
    #[serde(default)]
    pub auth_required: bool,

    /// URL prefix the MCP service is nested under.
    #[serde(default = "default_path_prefix")]
    pub mcp_path_prefix: String,

    #[serde(default = "default_transport")]
    pub transport: TransportKind,

    /// Methods auto-exposed as tools.
    #[serde(default = "default_tool_methods")]
    pub tool_methods: Vec<HttpMethod>,

    /// Methods auto-exposed as resources.
    #[serde(default = "default_resource_methods")]
    pub resource_methods: Vec<HttpMethod>,

    /// Scheme for resource URIs derived from paths.
    #[serde(default = "default_uri_scheme")]
    pub uri_scheme: String,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_enabled() -> bool {
    true
}

fn default_server_name() -> String {
    "gantry-mcp-server".to_string()
}

fn default_auto_expose() -> bool {
    true
}

fn default_path_prefix() -> String {
    "/mcp".to_string()
}

fn default_transport() -> TransportKind {
    TransportKind::Http
}

fn default_tool_methods() -> Vec<HttpMethod> {
    vec![HttpMethod::Post, HttpMethod::Put, HttpMethod::Patch]
}

fn default_resource_methods() -> Vec<HttpMethod> {
    vec![HttpMethod::Get]
}

fn default_uri_scheme() -> String {
    "gantry".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4445
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            server_name: default_server_name(),
            auto_expose: default_auto_expose(),
            auth_required: false,
            mcp_path_prefix: default_path_prefix(),
            transport: default_transport(),
            tool_methods: default_tool_methods(),
            resource_methods: default_resource_methods(),
            uri_scheme: default_uri_scheme(),
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config TOML '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl McpConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: McpConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path, or walk the usual spots.
    ///
    /// Order: `gantry.toml` in the working directory, then
    /// `gantry/config.toml` under the platform config directory, then
    /// built-in defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            debug!("Loading config from {}", path.display());
            return Self::from_path(path);
        }
        for candidate in Self::candidate_paths() {
            if candidate.exists() {
                debug!("Loading config from {}", candidate.display());
                return Self::from_path(&candidate);
            }
        }
        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn candidate_paths() -> Vec<PathBuf> {
        let mut candidates = vec![PathBuf::from("gantry.toml")];
        if let Some(dir) = dirs::config_dir() {
            candidates.push(dir.join("gantry").join("config.toml"));
        }
        candidates
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "server_name",
                reason: "must not be empty".to_string(),
            });
        }
        if !self.mcp_path_prefix.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "mcp_path_prefix",
                reason: format!("'{}' must start with '/'", self.mcp_path_prefix),
            });
        }
        if self.mcp_path_prefix.len() < 2 || self.mcp_path_prefix.ends_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "mcp_path_prefix",
                reason: format!("'{}' must name a non-root prefix without a trailing '/'", self.mcp_path_prefix),
            });
        }
        if self.uri_scheme.is_empty()
            || !self
                .uri_scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
        {
            return Err(ConfigError::InvalidValue {
                field: "uri_scheme",
                reason: format!("'{}' is not a valid URI scheme", self.uri_scheme),
            });
        }
        Ok(())
    }

    pub fn exposure_policy(&self) -> ExposurePolicy {
        ExposurePolicy {
            auto_expose: self.auto_expose,
            tool_methods: self.tool_methods.clone(),
            resource_methods: self.resource_methods.clone(),
            uri_scheme: self.uri_scheme.clone(),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_describe_a_working_dev_setup() {
        let config = McpConfig::default();
        assert!(config.enabled);
        assert!(config.auto_expose);
        assert!(!config.auth_required);
        assert_eq!(config.server_name, "gantry-mcp-server");
        assert_eq!(config.mcp_path_prefix, "/mcp");
        assert_eq!(config.transport, TransportKind::Http);
        assert_eq!(config.bind_addr(), "127.0.0.1:4445");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_fills_the_rest_from_defaults() {
        let config: McpConfig = toml::from_str(
            r#"
            server_name = "notes-mcp"
            transport = "stdio"
            tool_methods = ["POST"]
            "#,
        )
        .unwrap();
        assert_eq!(config.server_name, "notes-mcp");
        assert_eq!(config.transport, TransportKind::Stdio);
        assert_eq!(config.tool_methods, vec![HttpMethod::Post]);
        assert_eq!(config.port, 4445);
        assert!(config.auto_expose);
    }

    #[test]
    fn from_path_reads_and_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 9000\nauto_expose = false").unwrap();

        let config = McpConfig::from_path(file.path()).unwrap();
        assert_eq!(config.port, 9000);
        assert!(!config.auto_expose);
        assert!(!config.exposure_policy().auto_expose);
    }

    #[test]
    fn bad_path_prefix_is_rejected() {
        for prefix in ["mcp", "/", "/mcp/"] {
            let config = McpConfig {
                mcp_path_prefix: prefix.to_string(),
                ..McpConfig::default()
            };
            let err = config.validate().unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidValue { field, .. } if field == "mcp_path_prefix"),
                "prefix {prefix:?} should be rejected"
            );
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = McpConfig::from_path(Path::new("/nonexistent/gantry.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
