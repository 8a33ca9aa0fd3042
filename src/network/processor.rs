//! Processor abstraction.
//!
//! Two-layer design:
//! - **`Processor` trait** — for user-defined processors.
//! - **`BuiltinProcessor` enum** — for the processors shipped with the crate,
//!   dispatched with a `match` instead of a vtable.
//!
//! `AnyProcessor` wraps either variant so the network can handle both uniformly.

use crate::network::error::{NetworkError, NetworkResult, ProcessError};
use crate::network::id::ProcessorId;
use crate::network::jobs::JobRequest;
use crate::network::nodes::{
    BackgroundSquareProcessor, CollectorProcessor, ConstantSourceProcessor, ScaleProcessor,
    SumProcessor,
};
use crate::network::port::{DataHandle, DataType, InportView, Port, PortDescriptor, PortDirection};
use crate::network::property::{Property, PropertyOwner, PropertyValue};
use std::any::Any;
use std::sync::Arc;

/// Static description of a processor class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorInfo {
    /// Stable identifier used by the registry and snapshots.
    pub class_identifier: &'static str,
    /// Default base for instance identifiers.
    pub display_name: &'static str,
    pub category: &'static str,
}

/// Everything a processor may touch while processing.
pub struct ProcessContext<'a> {
    processor: ProcessorId,
    identifier: &'a str,
    inports: &'a [InportView],
    ports: &'a [Port],
    properties: &'a Vec<Property>,
    outputs: Vec<(u16, DataHandle)>,
    job: Option<JobRequest>,
}

/// What a processor produced during one `process()` call.
pub(crate) struct ProcessOutput {
    pub outputs: Vec<(u16, DataHandle)>,
    pub job: Option<JobRequest>,
}

impl<'a> ProcessContext<'a> {
    pub(crate) fn new(
        processor: ProcessorId,
        identifier: &'a str,
        inports: &'a [InportView],
        ports: &'a [Port],
        properties: &'a Vec<Property>,
    ) -> Self {
        Self {
            processor,
            identifier,
            inports,
            ports,
            properties,
            outputs: Vec::new(),
            job: None,
        }
    }

    pub(crate) fn finish(self) -> ProcessOutput {
        ProcessOutput {
            outputs: self.outputs,
            job: self.job,
        }
    }

    pub fn processor(&self) -> ProcessorId {
        self.processor
    }

    pub fn identifier(&self) -> &str {
        self.identifier
    }

    pub fn inports(&self) -> &[InportView] {
        self.inports
    }

    pub fn inport(&self, identifier: &str) -> NetworkResult<&InportView> {
        self.inports
            .iter()
            .find(|p| p.identifier() == identifier)
            .ok_or_else(|| NetworkError::UnknownPort {
                processor: self.processor,
                port: identifier.to_string(),
            })
    }

    pub fn property(&self, path: &str) -> Option<&Property> {
        self.properties.property(path)
    }

    pub fn value(&self, path: &str) -> NetworkResult<&PropertyValue> {
        self.property(path)
            .and_then(Property::value)
            .ok_or_else(|| NetworkError::UnknownProperty(path.to_string()))
    }

    pub fn float(&self, path: &str) -> NetworkResult<f64> {
        let value = self.value(path)?;
        value.as_float().ok_or_else(|| mismatch(path, "Float", value))
    }

    pub fn int(&self, path: &str) -> NetworkResult<i64> {
        let value = self.value(path)?;
        value.as_int().ok_or_else(|| mismatch(path, "Int", value))
    }

    pub fn bool(&self, path: &str) -> NetworkResult<bool> {
        let value = self.value(path)?;
        value.as_bool().ok_or_else(|| mismatch(path, "Bool", value))
    }

    pub fn text(&self, path: &str) -> NetworkResult<&str> {
        let value = self.value(path)?;
        value.as_str().ok_or_else(|| mismatch(path, "Text", value))
    }

    /// Publish `value` on an outport once `process()` returns successfully.
    pub fn set_output<T: Any + Send + Sync>(&mut self, outport: &str, value: T) -> NetworkResult<()> {
        let index = self.outport_index(outport, DataType::of::<T>())?;
        self.outputs.retain(|(i, _)| *i != index);
        self.outputs.push((index, Arc::new(value) as DataHandle));
        Ok(())
    }

    /// Compute an outport's data on the job pool.
    ///
    /// The processor stays invalid until the job completes and its result is
    /// applied by `Network::poll_jobs`.
    pub fn spawn_job<T, F>(&mut self, outport: &str, work: F) -> NetworkResult<()>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Result<T, String> + Send + 'static,
    {
        let index = self.outport_index(outport, DataType::of::<T>())?;
        self.job = Some(JobRequest {
            outport: index,
            work: Box::new(move || work().map(|value| Arc::new(value) as DataHandle)),
        });
        Ok(())
    }

    fn outport_index(&self, identifier: &str, data_type: DataType) -> NetworkResult<u16> {
        let (index, port) = self
            .ports
            .iter()
            .enumerate()
            .find(|(_, p)| p.direction() == PortDirection::Output && p.identifier() == identifier)
            .ok_or_else(|| NetworkError::UnknownPort {
                processor: self.processor,
                port: identifier.to_string(),
            })?;
        if port.descriptor().data_type != data_type {
            return Err(NetworkError::PortMismatch(format!(
                "outport '{}' carries {}, got {}",
                identifier,
                port.descriptor().data_type.name(),
                data_type.name()
            )));
        }
        Ok(index as u16)
    }
}

fn mismatch(path: &str, expected: &'static str, found: &PropertyValue) -> NetworkError {
    NetworkError::PropertyTypeMismatch {
        property: path.to_string(),
        expected,
        found: found.type_name(),
    }
}

/// Trait for user-defined processors.
pub trait Processor {
    fn info(&self) -> ProcessorInfo;

    /// Port descriptors, queried once when the processor is added.
    fn ports(&self) -> Vec<PortDescriptor>;

    /// Initial properties, queried once when the processor is added.
    fn properties(&self) -> Vec<Property> {
        Vec::new()
    }

    /// Recompute outputs from inputs and properties.
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), ProcessError>;

    /// Called instead of `process()` when an evaluation pass finds the processor not ready.
    fn on_not_ready(&mut self) {}
}

/// Enum dispatch for built-in processors.
pub enum BuiltinProcessor {
    ConstantSource(ConstantSourceProcessor),
    Scale(ScaleProcessor),
    Sum(SumProcessor),
    Collector(CollectorProcessor),
    BackgroundSquare(BackgroundSquareProcessor),
}

impl BuiltinProcessor {
    pub fn info(&self) -> ProcessorInfo {
        match self {
            BuiltinProcessor::ConstantSource(p) => p.info(),
            BuiltinProcessor::Scale(p) => p.info(),
            BuiltinProcessor::Sum(p) => p.info(),
            BuiltinProcessor::Collector(p) => p.info(),
            BuiltinProcessor::BackgroundSquare(p) => p.info(),
        }
    }

    pub fn ports(&self) -> Vec<PortDescriptor> {
        match self {
            BuiltinProcessor::ConstantSource(p) => p.ports(),
            BuiltinProcessor::Scale(p) => p.ports(),
            BuiltinProcessor::Sum(p) => p.ports(),
            BuiltinProcessor::Collector(p) => p.ports(),
            BuiltinProcessor::BackgroundSquare(p) => p.ports(),
        }
    }

    pub fn properties(&self) -> Vec<Property> {
        match self {
            BuiltinProcessor::ConstantSource(p) => p.properties(),
            BuiltinProcessor::Scale(p) => p.properties(),
            BuiltinProcessor::Sum(p) => p.properties(),
            BuiltinProcessor::Collector(p) => p.properties(),
            BuiltinProcessor::BackgroundSquare(p) => p.properties(),
        }
    }

    pub fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), ProcessError> {
        match self {
            BuiltinProcessor::ConstantSource(p) => p.process(ctx),
            BuiltinProcessor::Scale(p) => p.process(ctx),
            BuiltinProcessor::Sum(p) => p.process(ctx),
            BuiltinProcessor::Collector(p) => p.process(ctx),
            BuiltinProcessor::BackgroundSquare(p) => p.process(ctx),
        }
    }
}

/// Either a built-in or a user-defined processor.
pub enum AnyProcessor {
    Builtin(BuiltinProcessor),
    Plugin(Box<dyn Processor>),
}

impl AnyProcessor {
    pub fn info(&self) -> ProcessorInfo {
        match self {
            AnyProcessor::Builtin(p) => p.info(),
            AnyProcessor::Plugin(p) => p.info(),
        }
    }

    pub fn ports(&self) -> Vec<PortDescriptor> {
        match self {
            AnyProcessor::Builtin(p) => p.ports(),
            AnyProcessor::Plugin(p) => p.ports(),
        }
    }

    pub fn properties(&self) -> Vec<Property> {
        match self {
            AnyProcessor::Builtin(p) => p.properties(),
            AnyProcessor::Plugin(p) => p.properties(),
        }
    }

    pub fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), ProcessError> {
        match self {
            AnyProcessor::Builtin(p) => p.process(ctx),
            AnyProcessor::Plugin(p) => p.process(ctx),
        }
    }

    pub fn on_not_ready(&mut self) {
        if let AnyProcessor::Plugin(p) = self {
            p.on_not_ready();
        }
    }
}

impl From<BuiltinProcessor> for AnyProcessor {
    fn from(p: BuiltinProcessor) -> Self {
        AnyProcessor::Builtin(p)
    }
}

impl From<Box<dyn Processor>> for AnyProcessor {
    fn from(p: Box<dyn Processor>) -> Self {
        AnyProcessor::Plugin(p)
    }
}

macro_rules! builtin_from {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for AnyProcessor {
                fn from(p: $ty) -> Self {
                    AnyProcessor::Builtin(BuiltinProcessor::$variant(p))
                }
            }
        )*
    };
}

builtin_from!(
    ConstantSource(ConstantSourceProcessor),
    Scale(ScaleProcessor),
    Sum(SumProcessor),
    Collector(CollectorProcessor),
    BackgroundSquare(BackgroundSquareProcessor),
);
