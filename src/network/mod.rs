//! Processor network with demand-driven invalidation and evaluation.
//!
//! Processors own typed ports and a property tree. Changing a property or the
//! connection graph raises the owner's invalidation level, which propagates
//! downstream; an invalidated sink asks for an evaluation, and the evaluator
//! re-runs exactly the invalid processors that feed an invalid sink.
//!
//! # Architecture
//!
//! ```text
//! set_property ──► Property tree ──► Processor level ──► successors (InvalidOutput)
//!                                                               │
//!                                          invalid sink ◄───────┘
//!                                               │
//!                        edit scope closes ──► NetworkObserver::on_evaluate_request
//!                                               │
//!                      NetworkEvaluator ──► evaluation_order ──► process()
//! ```
//!
//! # Design
//!
//! - **Arena storage** — processors live in `Vec<Option<ProcessorNode>>`, indexed by `ProcessorId`.
//! - **Packed port ids** — `PortId` carries the owning processor, so lookups need no map.
//! - **Enum dispatch** — `BuiltinProcessor` for shipped processors, `Box<dyn Processor>` for the rest.
//! - **Monotonic levels** — invalidation only raises levels; a successful process resets to `Valid`.
//! - **One request per edit** — nested edits and locks collapse into a single evaluation request.
//! - **Background jobs** — results return over a crossbeam channel and are applied on the owning thread.

pub mod error;
pub mod evaluator;
pub mod graph;
pub mod id;
pub mod identifier;
pub mod invalidation;
pub mod jobs;
pub mod kind;
pub mod link;
pub mod nodes;
pub mod port;
pub mod processor;
pub mod property;
pub mod registry;
pub mod slot;
pub mod snapshot;
pub mod traversal;

pub use error::{NetworkError, NetworkResult, ProcessError};
pub use evaluator::{EvaluationReport, NetworkEvaluator};
pub use graph::{Network, NetworkLock, NetworkObserver, StepOutcome};
pub use id::{Connection, InportId, OutportId, PortId, ProcessorId};
pub use identifier::IdentifierRegistry;
pub use invalidation::InvalidationLevel;
pub use jobs::{JobCompletion, JobPool};
pub use kind::BuiltinKind;
pub use link::{PropertyLink, PropertyRef};
pub use port::{
    DataHandle, DataType, Inport, InportState, InportView, Outport, Port, PortDescriptor,
    PortDirection,
};
pub use processor::{AnyProcessor, BuiltinProcessor, ProcessContext, Processor, ProcessorInfo};
pub use property::{Property, PropertyObserver, PropertyOwner, PropertyValue};
pub use registry::ProcessorRegistry;
pub use slot::{ProcessorNode, ProcessorObserver};
pub use snapshot::{NetworkSnapshot, RestoreReport};
