//! The processor network: processors, connections, links and the
//! invalidation walk.
//!
//! Every mutation follows the same pattern:
//! 1. Validate, returning an error without touching state on failure.
//! 2. Open an edit scope.
//! 3. Mutate and invalidate the affected processors.
//! 4. Close the edit scope; the outermost close forwards at most one
//!    evaluation request to network observers, unless the network is locked.

use crate::config::EngineConfig;
use crate::network::error::{NetworkError, NetworkResult, ProcessError};
use crate::network::id::{Connection, InportId, OutportId, PortId, ProcessorId};
use crate::network::identifier::IdentifierRegistry;
use crate::network::invalidation::InvalidationLevel;
use crate::network::jobs::{JobCompletion, JobPool};
use crate::network::link::{self, PropertyLink, PropertyRef};
use crate::network::port::{
    DataHandle, Inport, InportState, InportView, Outport, PortDirection, SourceData,
};
use crate::network::processor::{AnyProcessor, ProcessContext};
use crate::network::property::{Property, PropertyOwner, PropertyValue};
use crate::network::slot::ProcessorNode;
use crate::network::traversal;
use crate::observer::{AsObserver, Observable};
use std::any::Any;
use std::collections::{HashSet, VecDeque};
use std::ops::{Deref, DerefMut};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

/// Network-wide notifications. All methods default to no-ops.
pub trait NetworkObserver: AsObserver {
    fn on_processor_added(&self, _processor: ProcessorId, _identifier: &str) {}
    fn on_processor_will_be_removed(&self, _processor: ProcessorId, _identifier: &str) {}
    fn on_processor_removed(&self, _processor: ProcessorId, _identifier: &str) {}
    fn on_identifier_changed(&self, _processor: ProcessorId, _old: &str, _new: &str) {}
    fn on_connection_added(&self, _connection: Connection) {}
    fn on_connection_removed(&self, _connection: Connection) {}
    fn on_connection_moved(&self, _from: Connection, _to: Connection) {}
    fn on_link_added(&self, _link: &PropertyLink) {}
    fn on_link_removed(&self, _link: &PropertyLink) {}
    fn on_property_changed(&self, _processor: ProcessorId, _path: &str, _value: &PropertyValue) {}
    /// Sent once per outermost edit (or final unlock) that left work to evaluate.
    fn on_evaluate_request(&self) {}
}

/// Result of trying to run one processor during an evaluation pass.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Executed,
    /// `process()` reported an intentionally incomplete result.
    Incomplete,
    Failed(String),
    NotReady,
    /// A direct predecessor is still invalid.
    Blocked,
    /// A background job is computing the outputs.
    Pending,
    /// Already valid or no longer part of the network.
    Skipped,
}

pub struct Network {
    processors: Vec<Option<ProcessorNode>>,
    /// Slots emptied by `remove_processor`, reused before the arena grows.
    free_slots: Vec<ProcessorId>,
    connections: Vec<Connection>,
    links: Vec<PropertyLink>,
    identifiers: IdentifierRegistry,
    lock_depth: u32,
    edit_depth: u32,
    evaluation_owed: bool,
    jobs: JobPool,
    next_ticket: u64,
    observers: Observable<dyn NetworkObserver>,
}

impl Network {
    /// A network whose background jobs run inline.
    pub fn new() -> Self {
        Self::with_job_pool(JobPool::inline())
    }

    pub fn with_config(config: &EngineConfig) -> Self {
        Self::with_job_pool(JobPool::new(config.jobs.worker_threads))
    }

    pub fn with_job_pool(jobs: JobPool) -> Self {
        Self {
            processors: Vec::new(),
            free_slots: Vec::new(),
            connections: Vec::new(),
            links: Vec::new(),
            identifiers: IdentifierRegistry::new(),
            lock_depth: 0,
            edit_depth: 0,
            evaluation_owed: false,
            jobs,
            next_ticket: 0,
            observers: Observable::new(),
        }
    }

    // ── Observers ──

    pub fn add_observer(&self, observer: Rc<dyn NetworkObserver>) -> bool {
        self.observers.add_observer(observer)
    }

    pub fn remove_observer(&self, observer: &(dyn NetworkObserver + 'static)) -> bool {
        self.observers.remove_observer(observer)
    }

    pub fn observers(&self) -> &Observable<dyn NetworkObserver> {
        &self.observers
    }

    // ── Processors ──

    /// Add a processor under its class display name (made unique).
    pub fn add_processor(&mut self, processor: impl Into<AnyProcessor>) -> NetworkResult<ProcessorId> {
        let processor = processor.into();
        let base = processor.info().display_name;
        self.add_processor_as(processor, base)
    }

    /// Add a processor under `identifier`, or a numbered variant of it if taken.
    pub fn add_processor_as(
        &mut self,
        processor: impl Into<AnyProcessor>,
        identifier: &str,
    ) -> NetworkResult<ProcessorId> {
        let id = match self.free_slots.last() {
            Some(&slot) => slot,
            None => ProcessorId::from_index(self.processors.len())
                .ok_or(NetworkError::CapacityExceeded(ProcessorId::MAX_PROCESSORS))?,
        };
        let identifier = self.identifiers.reserve(identifier);
        let node = match ProcessorNode::new(id, identifier.clone(), processor.into()) {
            Ok(node) => node,
            Err(e) => {
                self.identifiers.release(&identifier);
                return Err(e);
            }
        };
        let is_sink = node.is_sink();
        if self.free_slots.last() == Some(&id) {
            self.free_slots.pop();
            self.processors[id.index()] = Some(node);
        } else {
            self.processors.push(Some(node));
        }

        tracing::info!("Added processor {:?} '{}'", id, identifier);
        self.observers
            .for_each_observer(|o| o.on_processor_added(id, &identifier));

        if is_sink {
            self.begin_edit();
            self.evaluation_owed = true;
            self.end_edit();
        }
        Ok(id)
    }

    /// Remove a processor after severing its connections and links.
    pub fn remove_processor(&mut self, processor: ProcessorId) -> NetworkResult<AnyProcessor> {
        let identifier = self.node(processor)?.identifier.clone();
        self.observers
            .for_each_observer(|o| o.on_processor_will_be_removed(processor, &identifier));

        self.lock();
        let attached: Vec<Connection> = self
            .connections
            .iter()
            .filter(|c| c.from_processor() == processor || c.to_processor() == processor)
            .copied()
            .collect();
        for connection in attached {
            self.remove_connection(connection.outport, connection.inport);
        }
        let links: Vec<PropertyLink> = self
            .links
            .iter()
            .filter(|l| l.involves(processor))
            .cloned()
            .collect();
        for l in links {
            self.remove_link(&l.source, &l.destination);
        }
        let node = self.processors[processor.index()].take();
        self.free_slots.push(processor);
        self.identifiers.release(&identifier);
        self.unlock();

        tracing::info!("Removed processor {:?} '{}'", processor, identifier);
        self.observers
            .for_each_observer(|o| o.on_processor_removed(processor, &identifier));

        node.map(ProcessorNode::into_processor)
            .ok_or(NetworkError::UnknownProcessor(processor))
    }

    /// Rename a processor. Returns the identifier actually assigned.
    pub fn set_identifier(&mut self, processor: ProcessorId, identifier: &str) -> NetworkResult<String> {
        let old = self.node(processor)?.identifier.clone();
        if old == identifier.trim() {
            return Ok(old);
        }
        self.identifiers.release(&old);
        let new = self.identifiers.reserve(identifier);
        self.node_mut(processor)?.identifier = new.clone();

        tracing::info!("Renamed processor '{}' to '{}'", old, new);
        self.observers
            .for_each_observer(|o| o.on_identifier_changed(processor, &old, &new));
        Ok(new)
    }

    pub fn processor(&self, processor: ProcessorId) -> Option<&ProcessorNode> {
        self.processors.get(processor.index()).and_then(Option::as_ref)
    }

    pub fn processor_by_identifier(&self, identifier: &str) -> Option<ProcessorId> {
        self.processors()
            .find(|p| p.identifier == identifier)
            .map(|p| p.id)
    }

    pub fn processors(&self) -> impl Iterator<Item = &ProcessorNode> {
        self.processors.iter().flatten()
    }

    pub fn processor_count(&self) -> usize {
        self.processors().count()
    }

    pub fn is_empty(&self) -> bool {
        self.processor_count() == 0
    }

    pub fn identifiers(&self) -> &IdentifierRegistry {
        &self.identifiers
    }

    fn node(&self, processor: ProcessorId) -> NetworkResult<&ProcessorNode> {
        self.processor(processor)
            .ok_or(NetworkError::UnknownProcessor(processor))
    }

    fn node_mut(&mut self, processor: ProcessorId) -> NetworkResult<&mut ProcessorNode> {
        self.processors
            .get_mut(processor.index())
            .and_then(Option::as_mut)
            .ok_or(NetworkError::UnknownProcessor(processor))
    }

    // ── Ports ──

    pub fn outport(&self, processor: ProcessorId, identifier: &str) -> NetworkResult<OutportId> {
        self.port_id(processor, identifier, PortDirection::Output)
            .map(OutportId)
    }

    pub fn inport(&self, processor: ProcessorId, identifier: &str) -> NetworkResult<InportId> {
        self.port_id(processor, identifier, PortDirection::Input)
            .map(InportId)
    }

    fn port_id(
        &self,
        processor: ProcessorId,
        identifier: &str,
        direction: PortDirection,
    ) -> NetworkResult<PortId> {
        let node = self.node(processor)?;
        node.ports
            .iter()
            .position(|p| p.identifier() == identifier && p.direction() == direction)
            .map(|i| PortId::new(processor, i as u16))
            .ok_or_else(|| NetworkError::UnknownPort {
                processor,
                port: identifier.to_string(),
            })
    }

    pub fn outport_ref(&self, id: OutportId) -> Option<&Outport> {
        self.processor(id.processor())?
            .ports
            .get(id.port_index() as usize)?
            .as_outport()
    }

    pub fn inport_ref(&self, id: InportId) -> Option<&Inport> {
        self.processor(id.processor())?
            .ports
            .get(id.port_index() as usize)?
            .as_inport()
    }

    fn inport_mut(&mut self, id: InportId) -> Option<&mut Inport> {
        self.processors
            .get_mut(id.processor().index())?
            .as_mut()?
            .inport_mut(id.port_index())
    }

    pub fn outport_data(&self, id: OutportId) -> Option<DataHandle> {
        self.outport_ref(id)?.data().cloned()
    }

    /// Typed payload currently held by an outport.
    pub fn outport_value<T: Any + Send + Sync>(&self, id: OutportId) -> Option<Arc<T>> {
        self.outport_data(id)?.downcast::<T>().ok()
    }

    fn sources_ready(&self, inport: &Inport) -> bool {
        inport.is_connected()
            && inport
                .connections()
                .iter()
                .all(|&o| self.outport_ref(o).is_some_and(Outport::is_ready))
    }

    pub fn inport_state(&self, id: InportId) -> Option<InportState> {
        let inport = self.inport_ref(id)?;
        Some(if !inport.is_connected() {
            InportState::Disconnected
        } else if self.sources_ready(inport) {
            InportState::ConnectedReady
        } else {
            InportState::ConnectedNotReady
        })
    }

    pub fn is_inport_ready(&self, id: InportId) -> bool {
        self.inport_ref(id)
            .is_some_and(|inport| self.sources_ready(inport))
    }

    pub fn is_inport_changed(&self, id: InportId) -> bool {
        self.inport_ref(id).is_some_and(Inport::is_changed)
    }

    pub fn inport_has_data(&self, id: InportId) -> bool {
        self.inport_ref(id)
            .and_then(|inport| inport.connections().first())
            .and_then(|&o| self.outport_ref(o))
            .is_some_and(Outport::has_data)
    }

    // ── Readiness ──

    /// Every mandatory inport is connected and all its sources are ready.
    /// Unconnected optional inports are ignored.
    pub fn is_ready(&self, processor: ProcessorId) -> bool {
        self.processor(processor).is_some_and(|node| {
            node.inports().all(|inport| {
                (inport.is_optional() && !inport.is_connected()) || self.sources_ready(inport)
            })
        })
    }

    pub fn is_sink(&self, processor: ProcessorId) -> bool {
        self.processor(processor).is_some_and(ProcessorNode::is_sink)
    }

    pub fn all_inports_connected(&self, processor: ProcessorId) -> bool {
        self.processor(processor)
            .is_some_and(ProcessorNode::all_inports_connected)
    }

    pub fn invalidation_level(&self, processor: ProcessorId) -> Option<InvalidationLevel> {
        self.processor(processor).map(ProcessorNode::invalidation_level)
    }

    /// Unknown processors count as valid so they never block an evaluation.
    pub fn is_valid(&self, processor: ProcessorId) -> bool {
        self.processor(processor).map_or(true, ProcessorNode::is_valid)
    }

    // ── Connections ──

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn is_connected(&self, outport: OutportId, inport: InportId) -> bool {
        self.connections.contains(&Connection::new(outport, inport))
    }

    /// Check whether `outport -> inport` may be added, without changing anything.
    pub fn can_connect(&self, outport: OutportId, inport: InportId) -> NetworkResult<()> {
        let from = self.node(outport.processor())?;
        let to = self.node(inport.processor())?;
        let out_port = self.outport_ref(outport).ok_or_else(|| {
            NetworkError::invalid_connection(format!("{:?} is not an outport", outport))
        })?;
        let in_port = self.inport_ref(inport).ok_or_else(|| {
            NetworkError::invalid_connection(format!("{:?} is not an inport", inport))
        })?;

        if outport.processor() == inport.processor() {
            return Err(NetworkError::invalid_connection(format!(
                "'{}' cannot be connected to itself",
                from.identifier
            )));
        }
        if out_port.descriptor().data_type != in_port.descriptor().data_type {
            return Err(NetworkError::invalid_connection(format!(
                "type mismatch: '{}.{}' produces {}, '{}.{}' expects {}",
                from.identifier,
                out_port.descriptor().identifier,
                out_port.descriptor().data_type.name(),
                to.identifier,
                in_port.descriptor().identifier,
                in_port.descriptor().data_type.name()
            )));
        }
        if !in_port.can_accept_connection() {
            return Err(NetworkError::invalid_connection(format!(
                "inport '{}.{}' accepts at most {} connection(s)",
                to.identifier,
                in_port.descriptor().identifier,
                in_port.descriptor().max_connections
            )));
        }
        if traversal::would_create_cycle(self, outport.processor(), inport.processor()) {
            return Err(NetworkError::invalid_connection(format!(
                "connecting '{}' to '{}' would create a cycle",
                from.identifier, to.identifier
            )));
        }
        Ok(())
    }

    /// Connect `outport` to `inport`. Adding an existing connection is a no-op.
    pub fn add_connection(&mut self, outport: OutportId, inport: InportId) -> NetworkResult<Connection> {
        let connection = Connection::new(outport, inport);
        if self.connections.contains(&connection) {
            return Ok(connection);
        }
        self.can_connect(outport, inport)?;

        self.begin_edit();
        self.attach(connection);
        tracing::info!("Added connection {:?} -> {:?}", outport, inport);
        self.observers
            .for_each_observer(|o| o.on_connection_added(connection));
        self.evaluation_owed = true;
        self.invalidate_inner(inport.processor(), InvalidationLevel::InvalidOutput, None);
        self.end_edit();
        Ok(connection)
    }

    /// Connect two ports addressed by processor and port identifier.
    pub fn connect(
        &mut self,
        from: ProcessorId,
        outport: &str,
        to: ProcessorId,
        inport: &str,
    ) -> NetworkResult<Connection> {
        let outport = self.outport(from, outport)?;
        let inport = self.inport(to, inport)?;
        self.add_connection(outport, inport)
    }

    /// Remove a connection. Returns `false` if it does not exist.
    pub fn remove_connection(&mut self, outport: OutportId, inport: InportId) -> bool {
        let connection = Connection::new(outport, inport);
        if !self.detach(connection) {
            return false;
        }

        self.begin_edit();
        tracing::info!("Removed connection {:?} -> {:?}", outport, inport);
        self.observers
            .for_each_observer(|o| o.on_connection_removed(connection));
        self.evaluation_owed = true;
        self.invalidate_inner(inport.processor(), InvalidationLevel::InvalidOutput, None);
        self.end_edit();
        true
    }

    /// Re-target an existing connection to another inport, reported as one move.
    pub fn move_connection(
        &mut self,
        connection: Connection,
        inport: InportId,
    ) -> NetworkResult<Connection> {
        if !self.connections.contains(&connection) {
            return Err(NetworkError::invalid_connection(format!(
                "{:?} -> {:?} does not exist",
                connection.outport, connection.inport
            )));
        }
        if connection.inport == inport {
            return Ok(connection);
        }
        let moved = Connection::new(connection.outport, inport);
        if self.connections.contains(&moved) {
            return Err(NetworkError::invalid_connection(format!(
                "{:?} -> {:?} already exists",
                moved.outport, moved.inport
            )));
        }
        self.can_connect(moved.outport, moved.inport)?;

        self.begin_edit();
        self.detach(connection);
        self.attach(moved);
        tracing::info!(
            "Moved connection {:?} from {:?} to {:?}",
            connection.outport,
            connection.inport,
            inport
        );
        self.observers
            .for_each_observer(|o| o.on_connection_moved(connection, moved));
        self.evaluation_owed = true;
        self.invalidate_inner(
            connection.inport.processor(),
            InvalidationLevel::InvalidOutput,
            None,
        );
        self.invalidate_inner(inport.processor(), InvalidationLevel::InvalidOutput, None);
        self.end_edit();
        Ok(moved)
    }

    fn attach(&mut self, connection: Connection) {
        if let Some(inport) = self.inport_mut(connection.inport) {
            inport.connect(connection.outport);
        }
        self.connections.push(connection);
    }

    fn detach(&mut self, connection: Connection) -> bool {
        let Some(pos) = self.connections.iter().position(|c| *c == connection) else {
            return false;
        };
        self.connections.remove(pos);
        if let Some(inport) = self.inport_mut(connection.inport) {
            inport.disconnect(connection.outport);
        }
        true
    }

    // ── Links ──

    pub fn links(&self) -> &[PropertyLink] {
        &self.links
    }

    pub fn is_linked(&self, source: &PropertyRef, destination: &PropertyRef) -> bool {
        self.links
            .iter()
            .any(|l| &l.source == source && &l.destination == destination)
    }

    pub fn is_linked_bidirectional(&self, a: &PropertyRef, b: &PropertyRef) -> bool {
        link::is_linked_bidirectional(&self.links, a, b)
    }

    /// Every property a change of `property` propagates to.
    pub fn properties_linked_to(&self, property: &PropertyRef) -> Vec<PropertyRef> {
        link::properties_linked_to(&self.links, property)
    }

    /// Link `source` to `destination`. Both must be value properties of the same type.
    pub fn add_link(&mut self, source: PropertyRef, destination: PropertyRef) -> NetworkResult<()> {
        if source == destination {
            return Err(NetworkError::InvalidLink(format!(
                "{} cannot be linked to itself",
                source
            )));
        }
        if self.is_linked(&source, &destination) {
            return Err(NetworkError::InvalidLink(format!(
                "{} is already linked to {}",
                source, destination
            )));
        }
        let source_value = self.link_endpoint(&source)?;
        let destination_value = self.link_endpoint(&destination)?;
        if !source_value.same_type(destination_value) {
            return Err(NetworkError::InvalidLink(format!(
                "{} holds {}, {} holds {}",
                source,
                source_value.type_name(),
                destination,
                destination_value.type_name()
            )));
        }

        let new_link = PropertyLink::new(source, destination);
        tracing::info!("Added link {} -> {}", new_link.source, new_link.destination);
        self.observers.for_each_observer(|o| o.on_link_added(&new_link));
        self.links.push(new_link);
        Ok(())
    }

    pub fn remove_link(&mut self, source: &PropertyRef, destination: &PropertyRef) -> bool {
        let Some(pos) = self
            .links
            .iter()
            .position(|l| &l.source == source && &l.destination == destination)
        else {
            return false;
        };
        let removed = self.links.remove(pos);
        tracing::info!("Removed link {} -> {}", removed.source, removed.destination);
        self.observers.for_each_observer(|o| o.on_link_removed(&removed));
        true
    }

    fn link_endpoint(&self, property: &PropertyRef) -> NetworkResult<&PropertyValue> {
        self.node(property.processor)?
            .property(&property.path)
            .and_then(Property::value)
            .ok_or_else(|| {
                NetworkError::InvalidLink(format!("{} is not a value property", property))
            })
    }

    // ── Properties ──

    pub fn property(&self, processor: ProcessorId, path: &str) -> Option<&Property> {
        self.processor(processor)?.property(path)
    }

    pub fn property_value(&self, processor: ProcessorId, path: &str) -> Option<&PropertyValue> {
        self.property(processor, path)?.value()
    }

    /// Set a property and propagate the change through links and invalidation.
    ///
    /// Returns `false` when the value was already current.
    pub fn set_property(
        &mut self,
        processor: ProcessorId,
        path: &str,
        value: impl Into<PropertyValue>,
    ) -> NetworkResult<bool> {
        let value = value.into();
        self.begin_edit();
        let result = self.set_property_linked(PropertyRef::new(processor, path), value);
        self.end_edit();
        result
    }

    /// Reset every property of a processor to its default.
    ///
    /// Each reset value goes through the same path as `set_property`, so
    /// linked properties follow and observers see every change.
    pub fn reset_properties(&mut self, processor: ProcessorId) -> NetworkResult<()> {
        let defaults = self.node(processor)?.property_defaults();
        self.begin_edit();
        let result = defaults.into_iter().try_for_each(|(path, value)| {
            self.set_property_linked(PropertyRef::new(processor, path), value)
                .map(|_| ())
        });
        self.end_edit();
        result
    }

    fn set_property_linked(&mut self, origin: PropertyRef, value: PropertyValue) -> NetworkResult<bool> {
        if !self.apply_property(&origin, value.clone())? {
            return Ok(false);
        }

        let mut visited: HashSet<PropertyRef> = HashSet::new();
        let mut queue: VecDeque<PropertyRef> =
            link::linked_destinations(&self.links, &origin).into();
        visited.insert(origin);

        while let Some(destination) = queue.pop_front() {
            if !visited.insert(destination.clone()) {
                continue;
            }
            match self.apply_property(&destination, value.clone()) {
                Ok(true) => queue.extend(link::linked_destinations(&self.links, &destination)),
                Ok(false) => {}
                Err(e) => tracing::warn!("Skipping link target {}: {}", destination, e),
            }
        }
        Ok(true)
    }

    fn apply_property(&mut self, target: &PropertyRef, value: PropertyValue) -> NetworkResult<bool> {
        let node = self.node_mut(target.processor)?;
        let Some(level) = node.set_property_value(&target.path, value.clone())? else {
            return Ok(false);
        };

        self.observers
            .for_each_observer(|o| o.on_property_changed(target.processor, &target.path, &value));
        self.invalidate_inner(target.processor, level, Some(target.path.as_str()));
        Ok(true)
    }

    // ── Invalidation ──

    /// Raise a processor to at least `level` and propagate downstream.
    pub fn invalidate(&mut self, processor: ProcessorId, level: InvalidationLevel) -> NetworkResult<()> {
        self.node(processor)?;
        self.begin_edit();
        self.invalidate_inner(processor, level, None);
        self.end_edit();
        Ok(())
    }

    /// Open a suppression scope. Invalidations are recorded, not propagated.
    pub fn disable_invalidation(&mut self, processor: ProcessorId) -> NetworkResult<()> {
        let node = self.node_mut(processor)?;
        node.suppression_depth += 1;
        Ok(())
    }

    /// Close a suppression scope. Closing the outermost one replays the highest
    /// level requested while suppressed, once.
    pub fn enable_invalidation(&mut self, processor: ProcessorId) -> NetworkResult<()> {
        let node = self.node_mut(processor)?;
        node.suppression_depth = node.suppression_depth.saturating_sub(1);
        if node.suppression_depth > 0 {
            return Ok(());
        }
        if let Some(level) = node.suppressed_level.take() {
            self.invalidate(processor, level)?;
        }
        Ok(())
    }

    /// Run `f` with invalidation of `processor` suppressed.
    pub fn with_invalidation_disabled<R>(
        &mut self,
        processor: ProcessorId,
        f: impl FnOnce(&mut Network) -> R,
    ) -> NetworkResult<R> {
        self.disable_invalidation(processor)?;
        let result = f(self);
        self.enable_invalidation(processor)?;
        Ok(result)
    }

    fn invalidate_inner(&mut self, processor: ProcessorId, level: InvalidationLevel, origin: Option<&str>) {
        let Some(node) = self
            .processors
            .get_mut(processor.index())
            .and_then(Option::as_mut)
        else {
            return;
        };

        if node.pending_job.take().is_some() {
            tracing::debug!("Superseded background job of '{}'", node.identifier);
            self.evaluation_owed = true;
        }
        if node.suppression_depth > 0 {
            node.suppressed_level = Some(node.suppressed_level.map_or(level, |l| l.max(level)));
            tracing::debug!("Deferred invalidation of '{}' ({})", node.identifier, level);
            return;
        }
        if node.level >= level {
            // Downstream is already invalid and may be waiting on this processor.
            if !level.is_valid() {
                self.evaluation_owed = true;
            }
            return;
        }

        let previous = node.level;
        node.level = level;
        node.invalidate_outports();
        tracing::debug!(
            "Invalidated '{}': {} -> {}{}",
            node.identifier,
            previous,
            level,
            origin.map(|p| format!(" (property '{}')", p)).unwrap_or_default()
        );
        node.observers()
            .for_each_observer(|o| o.on_invalidation_begin(processor, level));
        let is_sink = node.is_sink();

        for successor in traversal::direct_successors(self, processor) {
            self.invalidate_inner(successor, InvalidationLevel::InvalidOutput, None);
        }

        if let Some(node) = self.processor(processor) {
            if is_sink {
                node.observers()
                    .for_each_observer(|o| o.on_evaluate_request(processor));
            }
            node.observers()
                .for_each_observer(|o| o.on_invalidation_end(processor));
        }
        if is_sink {
            self.evaluation_owed = true;
        }
    }

    // ── Locking ──

    /// Defer evaluation requests until the matching `unlock`.
    pub fn lock(&mut self) {
        self.lock_depth += 1;
    }

    pub fn unlock(&mut self) {
        if self.lock_depth == 0 {
            tracing::warn!("Unbalanced network unlock ignored");
            return;
        }
        self.lock_depth -= 1;
        self.flush_evaluation_request();
    }

    pub fn is_locked(&self) -> bool {
        self.lock_depth > 0
    }

    /// Lock the network until the returned guard is dropped.
    pub fn lock_guard(&mut self) -> NetworkLock<'_> {
        self.lock();
        NetworkLock { network: self }
    }

    /// True when an evaluation request is waiting for the edit scope or lock to close.
    pub fn is_evaluation_owed(&self) -> bool {
        self.evaluation_owed
    }

    fn begin_edit(&mut self) {
        self.edit_depth += 1;
    }

    fn end_edit(&mut self) {
        self.edit_depth = self.edit_depth.saturating_sub(1);
        self.flush_evaluation_request();
    }

    fn flush_evaluation_request(&mut self) {
        if self.edit_depth > 0 || self.lock_depth > 0 || !self.evaluation_owed {
            return;
        }
        self.evaluation_owed = false;
        tracing::debug!("Evaluation requested");
        self.observers.for_each_observer(|o| o.on_evaluate_request());
    }

    // ── Evaluation ──

    fn inport_views(&self, node: &ProcessorNode) -> Vec<InportView> {
        node.inports()
            .map(|inport| {
                let sources = inport
                    .connections()
                    .iter()
                    .map(|&outport| {
                        let port = self.outport_ref(outport);
                        SourceData {
                            outport,
                            data: port.and_then(|p| p.data().cloned()),
                            ready: port.is_some_and(Outport::is_ready),
                            changed: inport.is_source_changed(outport),
                        }
                    })
                    .collect();
                InportView::new(inport.descriptor().clone(), sources, inport.is_changed())
            })
            .collect()
    }

    /// Run one processor if it is eligible. Used by the evaluator.
    pub(crate) fn evaluate_processor(&mut self, processor: ProcessorId) -> StepOutcome {
        let Some(node) = self.processor(processor) else {
            return StepOutcome::Skipped;
        };
        if node.is_valid() {
            return StepOutcome::Skipped;
        }
        if node.has_pending_job() {
            return StepOutcome::Pending;
        }
        if traversal::direct_predecessors(self, processor)
            .into_iter()
            .any(|p| !self.is_valid(p))
        {
            return StepOutcome::Blocked;
        }
        if !self.is_ready(processor) {
            if let Ok(node) = self.node_mut(processor) {
                node.processor.on_not_ready();
            }
            return StepOutcome::NotReady;
        }

        let Some(node) = self.processor(processor) else {
            return StepOutcome::Skipped;
        };
        let views = self.inport_views(node);
        let Some(node) = self
            .processors
            .get_mut(processor.index())
            .and_then(Option::as_mut)
        else {
            return StepOutcome::Skipped;
        };

        let mut ctx = ProcessContext::new(
            processor,
            &node.identifier,
            &views,
            &node.ports,
            &node.properties,
        );
        let result = node.processor.process(&mut ctx);
        let output = ctx.finish();
        node.process_count += 1;

        let incomplete = match result {
            Ok(()) => false,
            Err(ProcessError::Incomplete) => true,
            Err(e) => {
                let message = e.to_string();
                tracing::error!("Processor '{}' failed: {}", node.identifier, message);
                node.observers()
                    .for_each_observer(|o| o.on_process_error(processor, &message));
                node.diagnostic = Some(message.clone());
                return StepOutcome::Failed(message);
            }
        };

        let mut produced = Vec::with_capacity(output.outputs.len());
        for (index, data) in output.outputs {
            if let Some(outport) = node.outport_mut(index) {
                outport.set_data(data);
                produced.push(OutportId(PortId::new(processor, index)));
            }
        }
        node.diagnostic = None;

        if let Some(request) = output.job {
            let ticket = self.next_ticket;
            self.next_ticket += 1;
            node.pending_job = Some(ticket);
            tracing::debug!("'{}' started background job {}", node.identifier, ticket);
            self.jobs.submit(processor, ticket, request);
            self.mark_consumers_changed(&produced);
            return StepOutcome::Pending;
        }

        node.set_valid();
        node.observers()
            .for_each_observer(|o| o.on_processed(processor));
        self.mark_consumers_changed(&produced);
        if incomplete {
            StepOutcome::Incomplete
        } else {
            StepOutcome::Executed
        }
    }

    fn mark_consumers_changed(&mut self, outports: &[OutportId]) {
        if outports.is_empty() {
            return;
        }
        let consumers: Vec<Connection> = self
            .connections
            .iter()
            .filter(|c| outports.contains(&c.outport))
            .copied()
            .collect();
        for connection in consumers {
            if let Some(port) = self.inport_mut(connection.inport) {
                port.mark_changed(connection.outport);
            }
        }
    }

    // ── Background jobs ──

    pub fn has_pending_jobs(&self) -> bool {
        self.processors().any(ProcessorNode::has_pending_job)
    }

    pub fn job_pool(&self) -> &JobPool {
        &self.jobs
    }

    /// Apply every finished background job. Returns how many were applied.
    pub fn poll_jobs(&mut self) -> usize {
        let completions = self.jobs.try_completions();
        if completions.is_empty() {
            return 0;
        }
        self.apply_completions(completions)
    }

    /// Block up to `timeout` for one job, then apply everything that finished.
    pub fn wait_for_jobs(&mut self, timeout: Duration) -> usize {
        let Some(first) = self.jobs.wait_completion(timeout) else {
            return 0;
        };
        let mut completions = vec![first];
        completions.extend(self.jobs.try_completions());
        self.apply_completions(completions)
    }

    fn apply_completions(&mut self, completions: Vec<JobCompletion>) -> usize {
        self.begin_edit();
        let applied = completions
            .into_iter()
            .filter(|completion| self.apply_completion(completion))
            .count();
        self.end_edit();
        applied
    }

    fn apply_completion(&mut self, completion: &JobCompletion) -> bool {
        let processor = completion.processor;
        let Some(node) = self
            .processors
            .get_mut(processor.index())
            .and_then(Option::as_mut)
        else {
            tracing::debug!("Discarding job result for removed processor {:?}", processor);
            return false;
        };
        if node.pending_job != Some(completion.ticket) {
            tracing::warn!(
                "Discarding superseded job {} of '{}'",
                completion.ticket,
                node.identifier
            );
            return false;
        }
        node.pending_job = None;

        let data = match &completion.result {
            Ok(data) => data.clone(),
            Err(message) => {
                tracing::error!("Background job of '{}' failed: {}", node.identifier, message);
                node.observers()
                    .for_each_observer(|o| o.on_process_error(processor, message));
                node.diagnostic = Some(message.clone());
                return false;
            }
        };

        let Some(outport) = node.outport_mut(completion.outport) else {
            return false;
        };
        outport.set_data(data);
        node.set_valid();
        node.diagnostic = None;
        node.observers()
            .for_each_observer(|o| o.on_processed(processor));
        tracing::debug!("Applied job {} of '{}'", completion.ticket, node.identifier);

        self.mark_consumers_changed(&[OutportId(PortId::new(processor, completion.outport))]);
        for successor in traversal::direct_successors(self, processor) {
            self.invalidate_inner(successor, InvalidationLevel::InvalidOutput, None);
        }
        self.evaluation_owed = true;
        true
    }
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("processors", &self.processor_count())
            .field("connections", &self.connections.len())
            .field("links", &self.links.len())
            .field("locked", &self.lock_depth)
            .finish()
    }
}

/// Keeps a network locked. Evaluation requests made while it is alive are
/// sent once when it is dropped.
pub struct NetworkLock<'a> {
    network: &'a mut Network,
}

impl Deref for NetworkLock<'_> {
    type Target = Network;

    fn deref(&self) -> &Network {
        self.network
    }
}

impl DerefMut for NetworkLock<'_> {
    fn deref_mut(&mut self) -> &mut Network {
        self.network
    }
}

impl Drop for NetworkLock<'_> {
    fn drop(&mut self) {
        self.network.unlock();
    }
}
