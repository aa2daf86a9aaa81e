//! Lifecycle coordinator
//!
//! Owns the adapter's state machine and the single dispatch-map slot. The
//! host drives it in order: construct, `host_starting`, `host_ready`,
//! `scan`, `start_serving`. Scanning is idempotent once it has succeeded;
//! a failed scan leaves the coordinator ready to try again.

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::annotate::AnnotationStore;
use crate::config::McpConfig;
use crate::dispatch::Dispatcher;
use crate::endpoint::EndpointSource;
use crate::registry::{scan, DispatchMaps, ScanError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Uninitialized,
    HostStarting,
    HostReady,
    Scanned,
    Serving,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::HostStarting => "host_starting",
            LifecycleState::HostReady => "host_ready",
            LifecycleState::Scanned => "scanned",
            LifecycleState::Serving => "serving",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("invalid lifecycle transition from {from} to {to}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },
    #[error("endpoints have not been scanned yet")]
    NotScanned,
    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// The adapter itself: configuration, endpoint source, annotations and the
/// state machine tying them together.
///
/// The dispatch maps live in a `OnceLock` so the serving path reads them
/// without taking the state lock.
pub struct Gantry {
    config: McpConfig,
    source: Arc<dyn EndpointSource>,
    annotations: AnnotationStore,
    state: Mutex<LifecycleState>,
    maps: OnceLock<Arc<DispatchMaps>>,
}

impl Gantry {
    pub fn new(
        config: McpConfig,
        source: impl EndpointSource + 'static,
        annotations: AnnotationStore,
    ) -> Self {
        Self {
            config,
            source: Arc::new(source),
            annotations,
            state: Mutex::new(LifecycleState::Uninitialized),
            maps: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &McpConfig {
        &self.config
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock().unwrap()
    }

    /// The host has begun starting up.
    pub fn host_starting(&self) -> Result<(), LifecycleError> {
        self.transition(LifecycleState::Uninitialized, LifecycleState::HostStarting)
    }

    /// The host finished starting; its endpoint listing is now stable.
    pub fn host_ready(&self) -> Result<(), LifecycleError> {
        self.transition(LifecycleState::HostStarting, LifecycleState::HostReady)
    }

    fn transition(
        &self,
        expected: LifecycleState,
        next: LifecycleState,
    ) -> Result<(), LifecycleError> {
        let mut state = self.state.lock().unwrap();
        if *state != expected {
            return Err(LifecycleError::InvalidTransition {
                from: *state,
                to: next,
            });
        }
        *state = next;
        Ok(())
    }

    /// Scan the host's endpoints into dispatch maps.
    ///
    /// Repeated calls after a successful scan return the same maps. A
    /// failed scan registers nothing and leaves the state at `HostReady`.
    pub fn scan(&self) -> Result<Arc<DispatchMaps>, LifecycleError> {
        let mut state = self.state.lock().unwrap();
        match *state {
            LifecycleState::Scanned | LifecycleState::Serving => {
                self.maps.get().cloned().ok_or(LifecycleError::NotScanned)
            }
            LifecycleState::HostReady => {
                let endpoints = self.source.list_endpoints();
                let count = endpoints.len();
                let maps =
                    scan(endpoints, &self.annotations, &self.config.exposure_policy()).map_err(
                        |e| {
                            error!("Endpoint scan failed: {}", e);
                            LifecycleError::Scan(e)
                        },
                    )?;
                info!(
                    "Scanned {} endpoints: {} tools, {} resources (hash {})",
                    count,
                    maps.tool_count(),
                    maps.resource_count(),
                    maps.compute_hash()
                );
                let maps = self.maps.get_or_init(|| Arc::new(maps)).clone();
                *state = LifecycleState::Scanned;
                Ok(maps)
            }
            from => Err(LifecycleError::InvalidTransition {
                from,
                to: LifecycleState::Scanned,
            }),
        }
    }

    /// Begin serving. Requires a successful scan; calling again while
    /// already serving is a no-op.
    pub fn start_serving(&self) -> Result<(), LifecycleError> {
        let mut state = self.state.lock().unwrap();
        match *state {
            LifecycleState::Scanned => {
                *state = LifecycleState::Serving;
                info!("MCP adapter '{}' serving", self.config.server_name);
                Ok(())
            }
            LifecycleState::Serving => Ok(()),
            from => Err(LifecycleError::InvalidTransition {
                from,
                to: LifecycleState::Serving,
            }),
        }
    }

    /// The scanned maps, if scanning has happened. Lock-free.
    pub fn maps(&self) -> Option<Arc<DispatchMaps>> {
        self.maps.get().cloned()
    }

    pub fn dispatcher(&self) -> Result<Dispatcher, LifecycleError> {
        self.maps()
            .map(Dispatcher::new)
            .ok_or(LifecycleError::NotScanned)
    }

    /// Convenience for hosts without staged startup: walks the whole
    /// ladder and returns once serving.
    pub fn start(&self) -> Result<(), LifecycleError> {
        self.host_starting()?;
        self.host_ready()?;
        self.scan()?;
        self.start_serving()
    }
}

impl fmt::Debug for Gantry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gantry")
            .field("server_name", &self.config.server_name)
            .field("state", &self.state())
            .field("scanned", &self.maps.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::ToolMeta;
    use crate::endpoint::{handler, EndpointDescriptor, HttpMethod, JsonObject};
    use serde_json::Value;

    fn endpoint(identifier: &str, method: HttpMethod, path: &str) -> EndpointDescriptor {
        EndpointDescriptor::new(
            identifier,
            method,
            path,
            handler(|_args: JsonObject| async move { Ok(Value::Null) }),
        )
    }

    fn gantry(endpoints: Vec<EndpointDescriptor>, annotations: AnnotationStore) -> Gantry {
        Gantry::new(McpConfig::default(), endpoints, annotations)
    }

    #[test]
    fn ladder_runs_in_order() {
        let gantry = gantry(
            vec![endpoint("create_note", HttpMethod::Post, "/notes")],
            AnnotationStore::new(),
        );
        assert_eq!(gantry.state(), LifecycleState::Uninitialized);

        gantry.host_starting().unwrap();
        gantry.host_ready().unwrap();
        assert_eq!(gantry.state(), LifecycleState::HostReady);

        let maps = gantry.scan().unwrap();
        assert_eq!(maps.tool_count(), 1);
        assert_eq!(gantry.state(), LifecycleState::Scanned);

        gantry.start_serving().unwrap();
        assert_eq!(gantry.state(), LifecycleState::Serving);
    }

    #[test]
    fn steps_cannot_be_skipped() {
        let gantry = gantry(vec![], AnnotationStore::new());

        assert!(matches!(
            gantry.host_ready(),
            Err(LifecycleError::InvalidTransition { .. })
        ));
        assert!(matches!(
            gantry.scan(),
            Err(LifecycleError::InvalidTransition { .. })
        ));
        assert!(matches!(
            gantry.start_serving(),
            Err(LifecycleError::InvalidTransition { .. })
        ));
        assert!(matches!(
            gantry.dispatcher(),
            Err(LifecycleError::NotScanned)
        ));
    }

    #[test]
    fn rescan_returns_the_same_maps() {
        let gantry = gantry(
            vec![endpoint("create_note", HttpMethod::Post, "/notes")],
            AnnotationStore::new(),
        );
        gantry.host_starting().unwrap();
        gantry.host_ready().unwrap();

        let first = gantry.scan().unwrap();
        let second = gantry.scan().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        gantry.start_serving().unwrap();
        let third = gantry.scan().unwrap();
        assert!(Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn conflicting_scan_never_reaches_serving() {
        let endpoints = vec![
            endpoint("first_create", HttpMethod::Post, "/a"),
            endpoint("second_create", HttpMethod::Post, "/b"),
        ];
        let annotations = AnnotationStore::new()
            .tool("first_create", ToolMeta::new().named("create"))
            .tool("second_create", ToolMeta::new().named("create"));
        let gantry = gantry(endpoints, annotations);

        gantry.host_starting().unwrap();
        gantry.host_ready().unwrap();

        assert!(matches!(
            gantry.scan(),
            Err(LifecycleError::Scan(ScanError::DuplicateTool { .. }))
        ));
        assert_eq!(gantry.state(), LifecycleState::HostReady);
        assert!(gantry.maps().is_none());
        assert!(matches!(
            gantry.start_serving(),
            Err(LifecycleError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn serving_twice_is_tolerated() {
        let gantry = gantry(vec![], AnnotationStore::new());
        gantry.start().unwrap();
        assert_eq!(gantry.state(), LifecycleState::Serving);
        gantry.start_serving().unwrap();
    }
}
