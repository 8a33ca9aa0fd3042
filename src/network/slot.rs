//! Per-processor state held by the network.

use crate::network::error::{NetworkError, NetworkResult};
use crate::network::id::{PortId, ProcessorId};
use crate::network::invalidation::InvalidationLevel;
use crate::network::port::{Inport, Outport, Port};
use crate::network::processor::{AnyProcessor, ProcessorInfo};
use crate::network::property::{Property, PropertyOwner};
use crate::observer::{AsObserver, Observable};
use std::collections::HashSet;

/// Processor-level notifications. All methods default to no-ops.
pub trait ProcessorObserver: AsObserver {
    fn on_invalidation_begin(&self, _processor: ProcessorId, _level: InvalidationLevel) {}
    fn on_invalidation_end(&self, _processor: ProcessorId) {}
    /// A sink was invalidated and needs an evaluation pass.
    fn on_evaluate_request(&self, _processor: ProcessorId) {}
    fn on_processed(&self, _processor: ProcessorId) {}
    fn on_process_error(&self, _processor: ProcessorId, _message: &str) {}
}

/// A processor together with its ports, properties and invalidation state.
pub struct ProcessorNode {
    pub(crate) id: ProcessorId,
    pub(crate) identifier: String,
    pub(crate) info: ProcessorInfo,
    pub(crate) processor: AnyProcessor,
    pub(crate) ports: Vec<Port>,
    pub(crate) properties: Vec<Property>,
    pub(crate) level: InvalidationLevel,
    /// Open `disable_invalidation` scopes.
    pub(crate) suppression_depth: u32,
    /// Highest level requested while suppressed.
    pub(crate) suppressed_level: Option<InvalidationLevel>,
    pub(crate) diagnostic: Option<String>,
    pub(crate) pending_job: Option<u64>,
    pub(crate) process_count: u64,
    observers: Observable<dyn ProcessorObserver>,
}

impl ProcessorNode {
    pub(crate) fn new(
        id: ProcessorId,
        identifier: String,
        processor: AnyProcessor,
    ) -> NetworkResult<Self> {
        let info = processor.info();
        let descriptors = processor.ports();
        if descriptors.len() > PortId::MAX_PORTS {
            return Err(NetworkError::PortMismatch(format!(
                "'{}' declares {} ports, at most {} are supported",
                info.class_identifier,
                descriptors.len(),
                PortId::MAX_PORTS
            )));
        }

        let mut seen = HashSet::new();
        for descriptor in &descriptors {
            if !seen.insert(descriptor.identifier) {
                return Err(NetworkError::DuplicatePort(descriptor.identifier.to_string()));
            }
        }

        let mut properties = Vec::new();
        for property in processor.properties() {
            properties.add_property(property)?;
        }

        Ok(Self {
            id,
            identifier,
            info,
            processor,
            ports: descriptors.into_iter().map(Port::from_descriptor).collect(),
            properties,
            level: InvalidationLevel::InvalidResources,
            suppression_depth: 0,
            suppressed_level: None,
            diagnostic: None,
            pending_job: None,
            process_count: 0,
            observers: Observable::new(),
        })
    }

    pub fn id(&self) -> ProcessorId {
        self.id
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn info(&self) -> ProcessorInfo {
        self.info
    }

    pub fn processor(&self) -> &AnyProcessor {
        &self.processor
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn port_index(&self, identifier: &str) -> Option<u16> {
        self.ports
            .iter()
            .position(|p| p.identifier() == identifier)
            .map(|i| i as u16)
    }

    pub fn inports(&self) -> impl Iterator<Item = &Inport> {
        self.ports.iter().filter_map(Port::as_inport)
    }

    pub fn outports(&self) -> impl Iterator<Item = &Outport> {
        self.ports.iter().filter_map(Port::as_outport)
    }

    pub fn invalidation_level(&self) -> InvalidationLevel {
        self.level
    }

    pub fn is_valid(&self) -> bool {
        self.level.is_valid()
    }

    /// A processor without outports.
    pub fn is_sink(&self) -> bool {
        self.outports().next().is_none()
    }

    pub fn all_inports_connected(&self) -> bool {
        self.inports().all(Inport::is_connected)
    }

    pub fn is_invalidation_suppressed(&self) -> bool {
        self.suppression_depth > 0
    }

    /// Message of the last failed `process()` or job, cleared on success.
    pub fn diagnostic(&self) -> Option<&str> {
        self.diagnostic.as_deref()
    }

    pub fn process_count(&self) -> u64 {
        self.process_count
    }

    pub fn has_pending_job(&self) -> bool {
        self.pending_job.is_some()
    }

    pub fn observers(&self) -> &Observable<dyn ProcessorObserver> {
        &self.observers
    }

    pub(crate) fn invalidate_outports(&mut self) {
        self.ports
            .iter_mut()
            .filter_map(Port::as_outport_mut)
            .for_each(Outport::invalidate);
    }

    /// Commit point after a successful evaluation.
    pub(crate) fn set_valid(&mut self) {
        self.level = InvalidationLevel::Valid;
        for port in &mut self.ports {
            match port {
                Port::Inport(inport) => inport.clear_changed(),
                Port::Outport(outport) => outport.set_valid(),
            }
        }
        self.properties
            .iter_mut()
            .for_each(Property::clear_modified);
    }

    pub(crate) fn inport_mut(&mut self, index: u16) -> Option<&mut Inport> {
        self.ports.get_mut(index as usize)?.as_inport_mut()
    }

    pub(crate) fn outport_mut(&mut self, index: u16) -> Option<&mut Outport> {
        self.ports.get_mut(index as usize)?.as_outport_mut()
    }

    pub(crate) fn into_processor(self) -> AnyProcessor {
        self.processor
    }
}

impl PropertyOwner for ProcessorNode {
    fn properties(&self) -> &[Property] {
        &self.properties
    }

    fn properties_mut(&mut self) -> &mut Vec<Property> {
        &mut self.properties
    }
}

impl std::fmt::Debug for ProcessorNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorNode")
            .field("id", &self.id)
            .field("identifier", &self.identifier)
            .field("class", &self.info.class_identifier)
            .field("level", &self.level)
            .field("ports", &self.ports.len())
            .field("properties", &self.properties.len())
            .finish()
    }
}
