//! Demo host application
//!
//! A small in-memory notes service that exercises every registration shape:
//! auto-exposed tools and resources, annotated overrides, templated URIs,
//! typed handlers and an endpoint the default policy ignores.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::annotate::{AnnotationStore, ResourceMeta, ToolMeta};
use crate::endpoint::{
    handler, typed_handler, EndpointDescriptor, EndpointError, EndpointSource, HttpMethod,
    JsonObject, ParamKind, ParamSpec,
};
use crate::schema;

#[derive(Debug, Clone, Serialize)]
pub struct Note {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct CreateNoteInput {
    /// Title for the new note.
    title: String,
    /// Body text; empty when omitted.
    #[serde(default)]
    body: String,
}

/// In-memory notes store shared by every endpoint handler.
#[derive(Clone)]
pub struct NotesApp {
    notes: Arc<RwLock<HashMap<Uuid, Note>>>,
    started_at: Instant,
}

impl NotesApp {
    pub fn new() -> Self {
        Self {
            notes: Arc::new(RwLock::new(HashMap::new())),
            started_at: Instant::now(),
        }
    }

    /// An app with a couple of notes already in it.
    pub fn seeded() -> Self {
        let mut notes = HashMap::new();
        for (title, body) in [
            ("Welcome", "This instance exposes a notes service over MCP."),
            ("Reading list", "Start with the debug endpoint."),
        ] {
            let note = Note {
                id: Uuid::new_v4(),
                title: title.to_string(),
                body: body.to_string(),
                created_at: Utc::now(),
            };
            notes.insert(note.id, note);
        }
        Self {
            notes: Arc::new(RwLock::new(notes)),
            started_at: Instant::now(),
        }
    }

    /// Registration intents for the endpoints that want more than the
    /// auto-expose defaults.
    pub fn annotations() -> AnnotationStore {
        AnnotationStore::new()
            .resource(
                "get_note",
                ResourceMeta::new()
                    .at("notes://{id}")
                    .describe("One note, looked up by id"),
            )
            .resource(
                "recent_notes",
                ResourceMeta::new()
                    .at("notes://recent/{count}")
                    .describe("The most recently created notes"),
            )
            .tool(
                "create_note",
                ToolMeta::new()
                    .titled("Create note")
                    .describe("Create a new note and return it"),
            )
            .tool(
                "search_notes",
                ToolMeta::new().describe("Case-insensitive search over titles and bodies"),
            )
    }

    fn health_endpoint(&self) -> EndpointDescriptor {
        let started_at = self.started_at;
        EndpointDescriptor::new(
            "health",
            HttpMethod::Get,
            "/health",
            handler(move |_args: JsonObject| {
                let uptime = started_at.elapsed().as_secs();
                async move {
                    let host = hostname::get()
                        .ok()
                        .and_then(|h| h.into_string().ok())
                        .unwrap_or_else(|| "unknown".to_string());
                    Ok(json!({
                        "status": "healthy",
                        "host": host,
                        "uptime_seconds": uptime,
                        "timestamp": Utc::now().timestamp(),
                    }))
                }
            }),
        )
        .with_summary("Service health and uptime")
    }

    fn list_notes_endpoint(&self) -> EndpointDescriptor {
        let notes = self.notes.clone();
        EndpointDescriptor::new(
            "list_notes",
            HttpMethod::Get,
            "/notes",
            handler(move |_args: JsonObject| {
                let notes = notes.clone();
                async move {
                    let notes = notes.read().await;
                    let mut all: Vec<&Note> = notes.values().collect();
                    all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
                    serde_json::to_value(all)
                        .map_err(|e| EndpointError::Unserializable(e.to_string()))
                }
            }),
        )
        .with_summary("Every note, oldest first")
    }

    fn get_note_endpoint(&self) -> EndpointDescriptor {
        let notes = self.notes.clone();
        EndpointDescriptor::new(
            "get_note",
            HttpMethod::Get,
            "/notes/{id}",
            handler(move |args: JsonObject| {
                let notes = notes.clone();
                async move {
                    let raw = args
                        .get("id")
                        .and_then(Value::as_str)
                        .ok_or_else(|| EndpointError::BadInput("'id' must be a string".into()))?;
                    let id = Uuid::parse_str(raw).map_err(|_| {
                        EndpointError::BadInput(format!("'{}' is not a note id", raw))
                    })?;
                    let notes = notes.read().await;
                    let note = notes
                        .get(&id)
                        .ok_or_else(|| EndpointError::Failed(format!("no note with id {}", id)))?;
                    serde_json::to_value(note)
                        .map_err(|e| EndpointError::Unserializable(e.to_string()))
                }
            }),
        )
        .with_param(ParamSpec::new("id", ParamKind::String).with_description("Note id"))
    }

    fn recent_notes_endpoint(&self) -> EndpointDescriptor {
        let notes = self.notes.clone();
        EndpointDescriptor::new(
            "recent_notes",
            HttpMethod::Get,
            "/notes/recent/{count}",
            handler(move |args: JsonObject| {
                let notes = notes.clone();
                async move {
                    let count = args.get("count").and_then(Value::as_i64).unwrap_or(0);
                    let count = usize::try_from(count)
                        .map_err(|_| EndpointError::BadInput("'count' must not be negative".into()))?;
                    let notes = notes.read().await;
                    let mut all: Vec<&Note> = notes.values().collect();
                    all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                    all.truncate(count);
                    serde_json::to_value(all)
                        .map_err(|e| EndpointError::Unserializable(e.to_string()))
                }
            }),
        )
        .with_param(
            ParamSpec::new("count", ParamKind::Integer).with_description("How many to return"),
        )
    }

    fn create_note_endpoint(&self) -> EndpointDescriptor {
        let notes = self.notes.clone();
        EndpointDescriptor::new(
            "create_note",
            HttpMethod::Post,
            "/notes",
            typed_handler(move |input: CreateNoteInput| {
                let notes = notes.clone();
                async move {
                    let note = Note {
                        id: Uuid::new_v4(),
                        title: input.title,
                        body: input.body,
                        created_at: Utc::now(),
                    };
                    notes.write().await.insert(note.id, note.clone());
                    Ok(note)
                }
            }),
        )
        .with_params(schema::params_from_schema::<CreateNoteInput>())
    }

    fn delete_note_endpoint(&self) -> EndpointDescriptor {
        let notes = self.notes.clone();
        EndpointDescriptor::new(
            "delete_note",
            HttpMethod::Post,
            "/notes/delete",
            handler(move |args: JsonObject| {
                let notes = notes.clone();
                async move {
                    let raw = args
                        .get("id")
                        .and_then(Value::as_str)
                        .ok_or_else(|| EndpointError::BadInput("'id' must be a string".into()))?;
                    let id = Uuid::parse_str(raw).map_err(|_| {
                        EndpointError::BadInput(format!("'{}' is not a note id", raw))
                    })?;
                    let removed = notes.write().await.remove(&id);
                    Ok(json!({ "deleted": removed.is_some() }))
                }
            }),
        )
        .with_summary("Delete a note by id")
        .with_param(ParamSpec::new("id", ParamKind::String).with_description("Note id"))
    }

    fn search_notes_endpoint(&self) -> EndpointDescriptor {
        let notes = self.notes.clone();
        EndpointDescriptor::new(
            "search_notes",
            HttpMethod::Post,
            "/notes/search",
            handler(move |args: JsonObject| {
                let notes = notes.clone();
                async move {
                    let query = args
                        .get("query")
                        .and_then(Value::as_str)
                        .ok_or_else(|| EndpointError::BadInput("'query' must be a string".into()))?
                        .to_lowercase();
                    let limit = args.get("limit").and_then(Value::as_i64).unwrap_or(10);
                    let limit = usize::try_from(limit)
                        .map_err(|_| EndpointError::BadInput("'limit' must not be negative".into()))?;

                    let notes = notes.read().await;
                    let mut matches: Vec<&Note> = notes
                        .values()
                        .filter(|note| {
                            note.title.to_lowercase().contains(&query)
                                || note.body.to_lowercase().contains(&query)
                        })
                        .collect();
                    matches.sort_by(|a, b| a.created_at.cmp(&b.created_at));
                    matches.truncate(limit);
                    serde_json::to_value(matches)
                        .map_err(|e| EndpointError::Unserializable(e.to_string()))
                }
            }),
        )
        .with_params(vec![
            ParamSpec::new("query", ParamKind::String).with_description("Text to look for"),
            ParamSpec::optional("limit", ParamKind::Integer)
                .with_default(json!(10))
                .with_description("Maximum number of matches"),
        ])
    }

    fn admin_reset_endpoint(&self) -> EndpointDescriptor {
        let notes = self.notes.clone();
        // DELETE is outside the default exposure policy, so this endpoint
        // stays host-only unless someone annotates it.
        EndpointDescriptor::new(
            "admin_reset",
            HttpMethod::Delete,
            "/notes",
            handler(move |_args: JsonObject| {
                let notes = notes.clone();
                async move {
                    notes.write().await.clear();
                    Ok(Value::Null)
                }
            }),
        )
        .with_summary("Drop every note")
    }
}

impl Default for NotesApp {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointSource for NotesApp {
    fn list_endpoints(&self) -> Vec<EndpointDescriptor> {
        vec![
            self.health_endpoint(),
            self.list_notes_endpoint(),
            self.get_note_endpoint(),
            self.recent_notes_endpoint(),
            self.create_note_endpoint(),
            self.delete_note_endpoint(),
            self.search_notes_endpoint(),
            self.admin_reset_endpoint(),
        ]
    }
}
