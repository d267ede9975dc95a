use crate::error::{CpiscanError, Result};
use crate::layout::EventLayout;
use crate::types::{EventDiscriminator, IdlField};
use anchor_lang::solana_program::hash::hash;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::warn;

/// The subset of an Anchor IDL this crate consumes: the program address,
/// the event list, and the `types` array that events without inline fields
/// point into.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgramIdl {
    pub address: String,
    #[serde(default)]
    pub events: Vec<IdlEventEntry>,
    #[serde(default)]
    pub types: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdlEventEntry {
    pub name: String,
    #[serde(default)]
    pub discriminator: Option<Vec<u8>>,
    #[serde(default)]
    pub fields: Option<Vec<IdlField>>,
}

/// Immutable per-program event registry: discriminator -> event name, and
/// event name -> layout. Built once from the program's IDL artifact and
/// passed by reference into the decoder and scanner.
#[derive(Debug, Clone)]
pub struct EventRegistry {
    address: String,
    discriminators: HashMap<EventDiscriminator, String>,
    layouts: HashMap<String, EventLayout>,
}

impl EventRegistry {
    pub fn from_idl_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_idl_str(&content)
    }

    pub fn from_idl_str(json: &str) -> Result<Self> {
        let idl: ProgramIdl = serde_json::from_str(json)
            .map_err(|e| CpiscanError::IdlParse(format!("failed to parse IDL JSON: {}", e)))?;
        Self::from_idl(idl)
    }

    pub fn from_idl(idl: ProgramIdl) -> Result<Self> {
        let mut discriminators = HashMap::new();
        let mut layouts = HashMap::new();

        for event in &idl.events {
            // Newer IDLs spell the discriminator out; otherwise it is
            // Anchor's sha256("event:<name>")[..8].
            let disc = match &event.discriminator {
                Some(bytes) => EventDiscriminator::try_from(bytes.as_slice()).map_err(|_| {
                    CpiscanError::IdlParse(format!(
                        "event {} has a {}-byte discriminator, expected 8",
                        event.name,
                        bytes.len()
                    ))
                })?,
                None => compute_discriminator(&event.name),
            };
            discriminators.insert(disc, event.name.clone());

            let fields = event
                .fields
                .clone()
                .or_else(|| struct_fields_from_types(&idl, &event.name));

            // An event whose fields resolve nowhere keeps its discriminator
            // but gets no layout; decoding it later is a hard registry
            // fault, not a skip.
            match fields {
                Some(fields) => {
                    layouts.insert(event.name.clone(), EventLayout::new(fields));
                }
                None => {
                    warn!("event {} has no field definition in the IDL", event.name);
                }
            }
        }

        Ok(Self {
            address: idl.address,
            discriminators,
            layouts,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn event_count(&self) -> usize {
        self.discriminators.len()
    }

    pub fn event_name(&self, discriminator: &[u8]) -> Option<&str> {
        self.discriminators.get(discriminator).map(String::as_str)
    }

    pub fn layout(&self, name: &str) -> Option<&EventLayout> {
        self.layouts.get(name)
    }
}

/// Anchor's event discriminator rule: sha256("event:<name>")[..8].
pub fn compute_discriminator(event_name: &str) -> EventDiscriminator {
    let preimage = format!("event:{}", event_name);
    let digest = hash(preimage.as_bytes());
    let mut disc = [0u8; 8];
    disc.copy_from_slice(&digest.to_bytes()[..8]);
    disc
}

/// Events in newer IDLs carry no inline fields; their struct definition
/// lives in the top-level `types` array under the same name.
fn struct_fields_from_types(idl: &ProgramIdl, event_name: &str) -> Option<Vec<IdlField>> {
    let types = idl.types.as_ref()?;

    for type_def in types {
        if type_def.get("name").and_then(|n| n.as_str()) != Some(event_name) {
            continue;
        }
        let ty = type_def.get("type")?;
        if ty.get("kind").and_then(|k| k.as_str()) != Some("struct") {
            return None;
        }
        let fields = ty.get("fields").cloned().unwrap_or_else(|| serde_json::json!([]));
        match serde_json::from_value::<Vec<IdlField>>(fields) {
            Ok(fields) => return Some(fields),
            Err(e) => {
                warn!("failed to parse fields for {}: {}", event_name, e);
                return None;
            }
        }
    }

    None
}
