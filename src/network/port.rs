//! Typed ports and the readiness protocol.
//!
//! Each processor declares its ports via `PortDescriptor`s. Outports hold a
//! shared, type-erased data handle plus a validity flag; inports only store the
//! ids of their connected outports and aggregate readiness over them.

use crate::network::error::{NetworkError, NetworkResult};
use crate::network::id::OutportId;
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Shared, read-only port payload.
pub type DataHandle = Arc<dyn Any + Send + Sync>;

/// Runtime tag for the payload type carried by a port.
#[derive(Clone, Copy)]
pub struct DataType {
    id: TypeId,
    name: &'static str,
}

impl DataType {
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn name(self) -> &'static str {
        self.name
    }
}

impl PartialEq for DataType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DataType {}

impl Hash for DataType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataType({})", self.name)
    }
}

/// Whether a port is an input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

/// Descriptor for a processor's port.
#[derive(Debug, Clone)]
pub struct PortDescriptor {
    pub identifier: &'static str,
    pub direction: PortDirection,
    pub data_type: DataType,
    /// An unconnected optional inport does not block readiness.
    pub optional: bool,
    /// Maximum number of connections for inports. 0 = unlimited.
    pub max_connections: usize,
    pub group: &'static str,
}

impl PortDescriptor {
    pub const DEFAULT_GROUP: &'static str = "default";

    pub fn inport(identifier: &'static str, data_type: DataType) -> Self {
        Self {
            identifier,
            direction: PortDirection::Input,
            data_type,
            optional: false,
            max_connections: 1,
            group: Self::DEFAULT_GROUP,
        }
    }

    /// An inport accepting any number of connections.
    pub fn multi_inport(identifier: &'static str, data_type: DataType) -> Self {
        Self {
            max_connections: 0,
            ..Self::inport(identifier, data_type)
        }
    }

    pub fn outport(identifier: &'static str, data_type: DataType) -> Self {
        Self {
            identifier,
            direction: PortDirection::Output,
            data_type,
            optional: false,
            max_connections: 0,
            group: Self::DEFAULT_GROUP,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn in_group(mut self, group: &'static str) -> Self {
        self.group = group;
        self
    }

    pub fn is_multi(&self) -> bool {
        self.direction == PortDirection::Input && self.max_connections != 1
    }
}

/// Output side: owns the data its processor produced.
#[derive(Debug)]
pub struct Outport {
    descriptor: PortDescriptor,
    data: Option<DataHandle>,
    valid: bool,
    generation: u64,
}

impl Outport {
    pub(crate) fn new(descriptor: PortDescriptor) -> Self {
        Self {
            descriptor,
            data: None,
            valid: false,
            generation: 0,
        }
    }

    pub fn descriptor(&self) -> &PortDescriptor {
        &self.descriptor
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// Holds data and has not been invalidated since it was produced.
    pub fn is_ready(&self) -> bool {
        self.valid && self.data.is_some()
    }

    pub fn data(&self) -> Option<&DataHandle> {
        self.data.as_ref()
    }

    /// Incremented every time new data is set.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn set_data(&mut self, data: DataHandle) {
        self.data = Some(data);
        self.generation += 1;
        self.valid = true;
    }

    pub(crate) fn invalidate(&mut self) {
        self.valid = false;
    }

    pub(crate) fn set_valid(&mut self) {
        self.valid = true;
    }
}

/// Input side: references connected outports, never owns their data.
#[derive(Debug)]
pub struct Inport {
    descriptor: PortDescriptor,
    connections: Vec<OutportId>,
    changed: bool,
    /// Outports whose data arrived since the last consume.
    changed_sources: Vec<OutportId>,
}

impl Inport {
    pub(crate) fn new(descriptor: PortDescriptor) -> Self {
        Self {
            descriptor,
            connections: Vec::new(),
            changed: false,
            changed_sources: Vec::new(),
        }
    }

    pub fn descriptor(&self) -> &PortDescriptor {
        &self.descriptor
    }

    pub fn connections(&self) -> &[OutportId] {
        &self.connections
    }

    pub fn is_connected(&self) -> bool {
        !self.connections.is_empty()
    }

    pub fn is_optional(&self) -> bool {
        self.descriptor.optional
    }

    /// True if at least one connected outport produced data not yet consumed.
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// The given outport produced data since the last consume.
    pub fn is_source_changed(&self, outport: OutportId) -> bool {
        self.changed_sources.contains(&outport)
    }

    pub fn can_accept_connection(&self) -> bool {
        self.descriptor.max_connections == 0
            || self.connections.len() < self.descriptor.max_connections
    }

    pub(crate) fn connect(&mut self, outport: OutportId) {
        self.connections.push(outport);
        self.mark_changed(outport);
    }

    pub(crate) fn disconnect(&mut self, outport: OutportId) -> bool {
        let before = self.connections.len();
        self.connections.retain(|&o| o != outport);
        self.changed_sources.retain(|&o| o != outport);
        let removed = self.connections.len() != before;
        if removed {
            self.changed = true;
        }
        removed
    }

    pub(crate) fn mark_changed(&mut self, outport: OutportId) {
        self.changed = true;
        if !self.changed_sources.contains(&outport) {
            self.changed_sources.push(outport);
        }
    }

    pub(crate) fn clear_changed(&mut self) {
        self.changed = false;
        self.changed_sources.clear();
    }
}

/// A port slot of a processor.
#[derive(Debug)]
pub enum Port {
    Inport(Inport),
    Outport(Outport),
}

impl Port {
    pub(crate) fn from_descriptor(descriptor: PortDescriptor) -> Self {
        match descriptor.direction {
            PortDirection::Input => Port::Inport(Inport::new(descriptor)),
            PortDirection::Output => Port::Outport(Outport::new(descriptor)),
        }
    }

    pub fn descriptor(&self) -> &PortDescriptor {
        match self {
            Port::Inport(p) => p.descriptor(),
            Port::Outport(p) => p.descriptor(),
        }
    }

    pub fn identifier(&self) -> &'static str {
        self.descriptor().identifier
    }

    pub fn direction(&self) -> PortDirection {
        self.descriptor().direction
    }

    pub fn as_inport(&self) -> Option<&Inport> {
        match self {
            Port::Inport(p) => Some(p),
            Port::Outport(_) => None,
        }
    }

    pub fn as_outport(&self) -> Option<&Outport> {
        match self {
            Port::Outport(p) => Some(p),
            Port::Inport(_) => None,
        }
    }

    pub(crate) fn as_inport_mut(&mut self) -> Option<&mut Inport> {
        match self {
            Port::Inport(p) => Some(p),
            Port::Outport(_) => None,
        }
    }

    pub(crate) fn as_outport_mut(&mut self) -> Option<&mut Outport> {
        match self {
            Port::Outport(p) => Some(p),
            Port::Inport(_) => None,
        }
    }
}

/// Aggregate state of an inport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InportState {
    Disconnected,
    ConnectedNotReady,
    ConnectedReady,
}

/// Data of one connected outport as seen from a consuming inport.
#[derive(Clone)]
pub struct SourceData {
    pub outport: OutportId,
    pub data: Option<DataHandle>,
    pub ready: bool,
    pub changed: bool,
}

impl fmt::Debug for SourceData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceData")
            .field("outport", &self.outport)
            .field("has_data", &self.data.is_some())
            .field("ready", &self.ready)
            .field("changed", &self.changed)
            .finish()
    }
}

/// Read access to an inport while its processor is processing.
#[derive(Debug, Clone)]
pub struct InportView {
    descriptor: PortDescriptor,
    sources: Vec<SourceData>,
    changed: bool,
}

impl InportView {
    pub(crate) fn new(descriptor: PortDescriptor, sources: Vec<SourceData>, changed: bool) -> Self {
        Self {
            descriptor,
            sources,
            changed,
        }
    }

    pub fn identifier(&self) -> &'static str {
        self.descriptor.identifier
    }

    pub fn is_connected(&self) -> bool {
        !self.sources.is_empty()
    }

    /// Every connected outport is ready.
    pub fn is_ready(&self) -> bool {
        self.is_connected() && self.sources.iter().all(|s| s.ready)
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn has_data(&self) -> bool {
        self.sources.first().is_some_and(|s| s.data.is_some())
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn state(&self) -> InportState {
        if !self.is_connected() {
            InportState::Disconnected
        } else if self.is_ready() {
            InportState::ConnectedReady
        } else {
            InportState::ConnectedNotReady
        }
    }

    /// Payload of the (first) connected outport.
    pub fn data<T: Any + Send + Sync>(&self) -> NetworkResult<Arc<T>> {
        let source = self
            .sources
            .first()
            .filter(|s| s.ready)
            .ok_or_else(|| self.missing())?;
        let handle = source.data.as_ref().ok_or_else(|| self.missing())?;
        self.downcast(handle)
    }

    /// Payloads of every connected outport, in connection order.
    pub fn vector_data<T: Any + Send + Sync>(&self) -> NetworkResult<Vec<Arc<T>>> {
        if !self.is_ready() {
            return Err(self.missing());
        }
        self.sources
            .iter()
            .map(|s| {
                s.data
                    .as_ref()
                    .ok_or_else(|| self.missing())
                    .and_then(|h| self.downcast(h))
            })
            .collect()
    }

    /// Payloads of every connected outport paired with whether that outport
    /// produced new data since this inport was last consumed.
    pub fn changed_data<T: Any + Send + Sync>(&self) -> NetworkResult<Vec<(bool, Arc<T>)>> {
        if !self.is_ready() {
            return Err(self.missing());
        }
        self.sources
            .iter()
            .map(|s| {
                let handle = s.data.as_ref().ok_or_else(|| self.missing())?;
                Ok((s.changed, self.downcast(handle)?))
            })
            .collect()
    }

    fn missing(&self) -> NetworkError {
        NetworkError::MissingData {
            port: self.descriptor.identifier.to_string(),
        }
    }

    fn downcast<T: Any + Send + Sync>(&self, handle: &DataHandle) -> NetworkResult<Arc<T>> {
        Arc::clone(handle).downcast::<T>().map_err(|_| {
            NetworkError::PortMismatch(format!(
                "port '{}' carries {}, requested {}",
                self.descriptor.identifier,
                self.descriptor.data_type.name(),
                std::any::type_name::<T>()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::id::{PortId, ProcessorId};

    fn source(port: u16, value: Option<f64>, ready: bool) -> SourceData {
        SourceData {
            outport: OutportId(PortId::new(ProcessorId(0), port)),
            data: value.map(|v| Arc::new(v) as DataHandle),
            ready,
            changed: port == 0,
        }
    }

    fn view(sources: Vec<SourceData>) -> InportView {
        InportView::new(
            PortDescriptor::multi_inport("in", DataType::of::<f64>()),
            sources,
            true,
        )
    }

    #[test]
    fn test_data_type_identity() {
        assert_eq!(DataType::of::<f64>(), DataType::of::<f64>());
        assert_ne!(DataType::of::<f64>(), DataType::of::<f32>());
        assert!(DataType::of::<Vec<u8>>().name().contains("Vec"));
    }

    #[test]
    fn test_outport_ready_requires_data() {
        let mut outport = Outport::new(PortDescriptor::outport("out", DataType::of::<f64>()));
        assert!(!outport.is_ready());
        outport.set_valid();
        assert!(!outport.is_ready());

        outport.set_data(Arc::new(1.0_f64));
        assert!(outport.is_ready());
        assert_eq!(outport.generation(), 1);

        outport.invalidate();
        assert!(!outport.is_ready());
        assert!(outport.has_data());
    }

    #[test]
    fn test_inport_connection_limits() {
        let mut inport = Inport::new(PortDescriptor::inport("in", DataType::of::<f64>()));
        let out = OutportId(PortId::new(ProcessorId(1), 0));
        assert!(inport.can_accept_connection());
        inport.connect(out);
        assert!(inport.is_changed());
        assert!(!inport.can_accept_connection());

        inport.clear_changed();
        assert!(!inport.disconnect(OutportId(PortId::new(ProcessorId(2), 0))));
        assert!(!inport.is_changed());
        assert!(inport.disconnect(out));
        assert!(inport.is_changed());
        assert!(!inport.is_connected());
    }

    #[test]
    fn test_inport_tracks_changed_sources() {
        let mut inport = Inport::new(PortDescriptor::multi_inport("in", DataType::of::<f64>()));
        let a = OutportId(PortId::new(ProcessorId(1), 0));
        let b = OutportId(PortId::new(ProcessorId(2), 0));
        inport.connect(a);
        inport.connect(b);
        inport.clear_changed();

        inport.mark_changed(b);
        assert!(inport.is_changed());
        assert!(!inport.is_source_changed(a));
        assert!(inport.is_source_changed(b));

        inport.clear_changed();
        assert!(!inport.is_source_changed(b));
    }

    #[test]
    fn test_view_changed_data() {
        let ready = view(vec![source(0, Some(1.0), true), source(1, Some(2.0), true)]);
        let pairs: Vec<(bool, f64)> = ready
            .changed_data::<f64>()
            .unwrap()
            .into_iter()
            .map(|(changed, v)| (changed, *v))
            .collect();
        assert_eq!(pairs, vec![(true, 1.0), (false, 2.0)]);

        let partial = view(vec![source(0, Some(1.0), true), source(1, None, false)]);
        assert!(partial.changed_data::<f64>().is_err());
    }

    #[test]
    fn test_view_aggregates_readiness() {
        assert_eq!(view(vec![]).state(), InportState::Disconnected);
        assert_eq!(
            view(vec![source(0, Some(1.0), true), source(1, None, false)]).state(),
            InportState::ConnectedNotReady
        );
        assert_eq!(
            view(vec![source(0, Some(1.0), true), source(1, Some(2.0), true)]).state(),
            InportState::ConnectedReady
        );
        assert_eq!(view(vec![source(0, None, false)]).source_count(), 1);
    }

    #[test]
    fn test_descriptor_groups_and_multiplicity() {
        let single = PortDescriptor::inport("in", DataType::of::<f64>());
        assert!(!single.is_multi());
        assert_eq!(single.group, PortDescriptor::DEFAULT_GROUP);

        let multi = PortDescriptor::multi_inport("in", DataType::of::<f64>()).in_group("inputs");
        assert!(multi.is_multi());
        assert_eq!(multi.group, "inputs");
        assert!(!PortDescriptor::outport("out", DataType::of::<f64>()).is_multi());
    }

    #[test]
    fn test_view_data_access() {
        let ready = view(vec![source(0, Some(1.5), true), source(1, Some(2.5), true)]);
        assert_eq!(*ready.data::<f64>().unwrap(), 1.5);
        let all: Vec<f64> = ready
            .vector_data::<f64>()
            .unwrap()
            .iter()
            .map(|v| **v)
            .collect();
        assert_eq!(all, vec![1.5, 2.5]);

        let err = ready.data::<String>().unwrap_err();
        assert!(matches!(err, NetworkError::PortMismatch(_)));

        let stale = view(vec![source(0, Some(1.5), false)]);
        assert_eq!(
            stale.data::<f64>().unwrap_err(),
            NetworkError::MissingData {
                port: "in".to_string()
            }
        );
    }
}
