//! Monitoring event model and its projection for templates.
//!
//! The event arrives as JSON from the monitoring pipeline. Only the fields
//! the mailer needs are modelled; everything else is ignored during
//! deserialization.
//!
//! Templates never see the raw event. They render against a
//! [`TemplateContext`], a fixed projection that exposes the same values under
//! flat names (`EntityName`, `CheckOutput`, ...) and nested names
//! (`Entity.Name`, `Check.Output`, ...).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Object metadata shared by entities, checks and hooks.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
}

/// The monitored entity (host, container, service...).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Entity {
    #[serde(default)]
    pub metadata: ObjectMeta,
}

/// A hook executed alongside a check.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Hook {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub status: i32,
}

/// The check result that triggered the event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Check {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub status: u32,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub hooks: Vec<Hook>,
}

/// A monitoring event as delivered by the pipeline.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub entity: Entity,
    #[serde(default)]
    pub check: Check,
}

impl Event {
    /// Parse an event from its JSON representation.
    pub fn from_json(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }

    /// Look up an annotation, preferring the check over the entity.
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.check
            .metadata
            .annotations
            .get(key)
            .or_else(|| self.entity.metadata.annotations.get(key))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Hook fields visible to templates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HookContext {
    pub name: String,
    pub command: String,
    pub output: String,
    pub status: i32,
}

/// Nested `Entity` object visible to templates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EntityContext {
    pub name: String,
    pub namespace: String,
}

/// Nested `Check` object visible to templates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CheckContext {
    pub name: String,
    pub state: String,
    pub status: u32,
    pub output: String,
    pub hooks: Vec<HookContext>,
}

/// Statically known projection of an [`Event`] consumed by templates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateContext {
    pub entity_name: String,
    pub entity_namespace: String,
    pub check_name: String,
    pub check_state: String,
    pub check_status: u32,
    pub check_output: String,
    pub hooks: Vec<HookContext>,
    pub entity: EntityContext,
    pub check: CheckContext,
}

impl From<&Event> for TemplateContext {
    fn from(event: &Event) -> Self {
        let hooks: Vec<HookContext> = event
            .check
            .hooks
            .iter()
            .map(|h| HookContext {
                name: h.metadata.name.clone(),
                command: h.command.clone(),
                output: h.output.clone(),
                status: h.status,
            })
            .collect();

        Self {
            entity_name: event.entity.metadata.name.clone(),
            entity_namespace: event.entity.metadata.namespace.clone(),
            check_name: event.check.metadata.name.clone(),
            check_state: event.check.state.clone(),
            check_status: event.check.status,
            check_output: event.check.output.clone(),
            hooks: hooks.clone(),
            entity: EntityContext {
                name: event.entity.metadata.name.clone(),
                namespace: event.entity.metadata.namespace.clone(),
            },
            check: CheckContext {
                name: event.check.metadata.name.clone(),
                state: event.check.state.clone(),
                status: event.check.status,
                output: event.check.output.clone(),
                hooks,
            },
        }
    }
}
