//! Serializable network snapshots.
//!
//! A snapshot records processors by class identifier and instance identifier,
//! their serializable property values, and connections and links addressed by
//! instance and port/property identifiers. Restoring goes through the regular
//! network API under one lock, so the whole restore produces a single
//! evaluation request.

use crate::error::{Result, VisFlowError};
use crate::network::graph::Network;
use crate::network::id::ProcessorId;
use crate::network::link::PropertyRef;
use crate::network::property::{PropertyOwner, PropertyValue};
use crate::network::registry::ProcessorRegistry;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// A saved processor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorSnapshot {
    pub class_identifier: String,
    pub identifier: String,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
}

/// A saved connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSnapshot {
    pub from_processor: String,
    pub from_port: String,
    pub to_processor: String,
    pub to_port: String,
}

/// A saved property link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSnapshot {
    pub source_processor: String,
    pub source_path: String,
    pub destination_processor: String,
    pub destination_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    #[serde(default = "default_snapshot_version")]
    pub version: u32,
    pub saved_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub processors: Vec<ProcessorSnapshot>,
    #[serde(default)]
    pub connections: Vec<ConnectionSnapshot>,
    #[serde(default)]
    pub links: Vec<LinkSnapshot>,
}

fn default_snapshot_version() -> u32 {
    SNAPSHOT_VERSION
}

impl NetworkSnapshot {
    /// Save snapshot to a JSON file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| {
            VisFlowError::Io(e).with_context(format!("Failed to write snapshot {:?}", path))
        })
    }

    /// Load snapshot from a JSON file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            VisFlowError::Io(e).with_context(format!("Failed to read snapshot {:?}", path))
        })?;
        let snapshot: Self = serde_json::from_str(&json)?;
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(VisFlowError::Serialization(format!(
                "snapshot version {} is newer than supported version {}",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }
        Ok(snapshot)
    }
}

/// What a restore added, plus everything it had to skip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestoreReport {
    pub processors: Vec<ProcessorId>,
    pub connections: usize,
    pub links: usize,
    pub warnings: Vec<String>,
}

impl Network {
    /// Capture the current network.
    pub fn snapshot(&self) -> NetworkSnapshot {
        let processors = self
            .processors()
            .map(|node| ProcessorSnapshot {
                class_identifier: node.info().class_identifier.to_string(),
                identifier: node.identifier().to_string(),
                properties: node.property_values().into_iter().collect(),
            })
            .collect();

        let port_name = |processor: ProcessorId, index: u16| -> Option<(String, String)> {
            let node = self.processor(processor)?;
            let port = node.ports().get(index as usize)?;
            Some((node.identifier().to_string(), port.identifier().to_string()))
        };
        let connections = self
            .connections()
            .iter()
            .filter_map(|c| {
                let (from_processor, from_port) =
                    port_name(c.outport.processor(), c.outport.port_index())?;
                let (to_processor, to_port) =
                    port_name(c.inport.processor(), c.inport.port_index())?;
                Some(ConnectionSnapshot {
                    from_processor,
                    from_port,
                    to_processor,
                    to_port,
                })
            })
            .collect();

        let identifier = |processor: ProcessorId| {
            self.processor(processor)
                .map(|node| node.identifier().to_string())
        };
        let links = self
            .links()
            .iter()
            .filter_map(|l| {
                Some(LinkSnapshot {
                    source_processor: identifier(l.source.processor)?,
                    source_path: l.source.path.clone(),
                    destination_processor: identifier(l.destination.processor)?,
                    destination_path: l.destination.path.clone(),
                })
            })
            .collect();

        NetworkSnapshot {
            version: SNAPSHOT_VERSION,
            saved_at: chrono::Utc::now(),
            processors,
            connections,
            links,
        }
    }

    /// Add everything in `snapshot` to this network.
    ///
    /// Items that cannot be restored are skipped with a warning. Identifiers
    /// that are already taken get a numbered variant.
    pub fn restore(&mut self, snapshot: &NetworkSnapshot, registry: &ProcessorRegistry) -> RestoreReport {
        let mut report = RestoreReport::default();
        let mut network = self.lock_guard();
        let mut ids: HashMap<&str, ProcessorId> = HashMap::new();

        for saved in &snapshot.processors {
            let added = registry
                .create(&saved.class_identifier)
                .and_then(|processor| network.add_processor_as(processor, &saved.identifier));
            let processor = match added {
                Ok(processor) => processor,
                Err(e) => {
                    report
                        .warnings
                        .push(format!("processor '{}': {}", saved.identifier, e));
                    continue;
                }
            };
            for (path, value) in &saved.properties {
                if let Err(e) = network.set_property(processor, path, value.clone()) {
                    report
                        .warnings
                        .push(format!("property '{}.{}': {}", saved.identifier, path, e));
                }
            }
            ids.insert(saved.identifier.as_str(), processor);
            report.processors.push(processor);
        }

        for saved in &snapshot.connections {
            let (Some(&from), Some(&to)) = (
                ids.get(saved.from_processor.as_str()),
                ids.get(saved.to_processor.as_str()),
            ) else {
                report.warnings.push(format!(
                    "connection '{}.{}' -> '{}.{}': unknown processor",
                    saved.from_processor, saved.from_port, saved.to_processor, saved.to_port
                ));
                continue;
            };
            match network.connect(from, &saved.from_port, to, &saved.to_port) {
                Ok(_) => report.connections += 1,
                Err(e) => report.warnings.push(format!(
                    "connection '{}.{}' -> '{}.{}': {}",
                    saved.from_processor, saved.from_port, saved.to_processor, saved.to_port, e
                )),
            }
        }

        for saved in &snapshot.links {
            let (Some(&source), Some(&destination)) = (
                ids.get(saved.source_processor.as_str()),
                ids.get(saved.destination_processor.as_str()),
            ) else {
                report.warnings.push(format!(
                    "link '{}.{}' -> '{}.{}': unknown processor",
                    saved.source_processor,
                    saved.source_path,
                    saved.destination_processor,
                    saved.destination_path
                ));
                continue;
            };
            let source = PropertyRef::new(source, saved.source_path.clone());
            let destination = PropertyRef::new(destination, saved.destination_path.clone());
            match network.add_link(source, destination) {
                Ok(()) => report.links += 1,
                Err(e) => report.warnings.push(format!(
                    "link '{}.{}' -> '{}.{}': {}",
                    saved.source_processor,
                    saved.source_path,
                    saved.destination_processor,
                    saved.destination_path,
                    e
                )),
            }
        }

        for warning in &report.warnings {
            tracing::warn!("Restore skipped {}", warning);
        }
        tracing::info!(
            "Restored {} processors, {} connections, {} links",
            report.processors.len(),
            report.connections,
            report.links
        );
        report
    }
}
