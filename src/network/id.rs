//! Identity types for the processor network.
//!
//! All IDs are newtypes over `u32` that serve as direct array indices
//! into their respective storage vectors, providing O(1) lookup.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index into `Network::processors`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcessorId(pub u32);

impl ProcessorId {
    /// Processors addressable by a `PortId`.
    pub const MAX_PROCESSORS: usize = 1 << (32 - PortId::PORT_BITS);

    /// The id for arena slot `index`, if ports on it can still be packed.
    pub fn from_index(index: usize) -> Option<Self> {
        (index < Self::MAX_PROCESSORS).then_some(ProcessorId(index as u32))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ProcessorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProcessorId({})", self.0)
    }
}

impl fmt::Display for ProcessorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Compact port identifier. High 20 bits = processor index, low 12 bits = port index.
/// Supports up to ~1M processors with 4096 ports each.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId(pub u32);

impl PortId {
    const PORT_BITS: u32 = 12;
    const PORT_MASK: u32 = (1 << Self::PORT_BITS) - 1;
    pub const MAX_PORTS: usize = 1 << Self::PORT_BITS;

    pub fn new(processor: ProcessorId, port_index: u16) -> Self {
        debug_assert!(port_index < (1 << Self::PORT_BITS) as u16);
        Self((processor.0 << Self::PORT_BITS) | (port_index as u32 & Self::PORT_MASK))
    }

    #[inline]
    pub fn processor(self) -> ProcessorId {
        ProcessorId(self.0 >> Self::PORT_BITS)
    }

    #[inline]
    pub fn port_index(self) -> u16 {
        (self.0 & Self::PORT_MASK) as u16
    }
}

impl fmt::Debug for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PortId(processor={}, port={})",
            self.processor().0,
            self.port_index()
        )
    }
}

/// A port known to be an outport.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutportId(pub PortId);

/// A port known to be an inport.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InportId(pub PortId);

macro_rules! directed_port_id {
    ($name:ident) => {
        impl $name {
            #[inline]
            pub fn processor(self) -> ProcessorId {
                self.0.processor()
            }

            #[inline]
            pub fn port_index(self) -> u16 {
                self.0.port_index()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(
                    f,
                    concat!(stringify!($name), "(processor={}, port={})"),
                    self.processor().0,
                    self.port_index()
                )
            }
        }
    };
}

directed_port_id!(OutportId);
directed_port_id!(InportId);

/// A directed connection between an outport and an inport.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Connection {
    pub outport: OutportId,
    pub inport: InportId,
}

impl Connection {
    pub fn new(outport: OutportId, inport: InportId) -> Self {
        Self { outport, inport }
    }

    #[inline]
    pub fn from_processor(&self) -> ProcessorId {
        self.outport.processor()
    }

    #[inline]
    pub fn to_processor(&self) -> ProcessorId {
        self.inport.processor()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processor_id() {
        let id = ProcessorId(42);
        assert_eq!(id.index(), 42);
        assert_eq!(format!("{:?}", id), "ProcessorId(42)");
    }

    #[test]
    fn test_processor_id_from_index_respects_port_packing() {
        let last = ProcessorId::MAX_PROCESSORS - 1;
        let id = ProcessorId::from_index(last).unwrap();
        assert_eq!(PortId::new(id, 1).processor(), id);
        assert_eq!(ProcessorId::from_index(ProcessorId::MAX_PROCESSORS), None);
    }

    #[test]
    fn test_port_id_packing() {
        let processor = ProcessorId(100);
        let port = PortId::new(processor, 7);
        assert_eq!(port.processor(), processor);
        assert_eq!(port.port_index(), 7);
    }

    #[test]
    fn test_port_id_limits() {
        let processor = ProcessorId((1 << 20) - 1);
        let port = PortId::new(processor, 4095);
        assert_eq!(port.processor(), processor);
        assert_eq!(port.port_index(), 4095);
    }

    #[test]
    fn test_connection_endpoints() {
        let out = OutportId(PortId::new(ProcessorId(1), 0));
        let inp = InportId(PortId::new(ProcessorId(2), 3));
        let connection = Connection::new(out, inp);
        assert_eq!(connection.from_processor(), ProcessorId(1));
        assert_eq!(connection.to_processor(), ProcessorId(2));
        assert_eq!(format!("{:?}", inp), "InportId(processor=2, port=3)");
    }
}
