//! ScaleProcessor — `out = in * factor + offset`.
//!
//! `factor` and `offset` live under the `transform` composite, which raises
//! the processor to `InvalidResources` when either changes.

use crate::network::error::ProcessError;
use crate::network::invalidation::InvalidationLevel;
use crate::network::port::{DataType, PortDescriptor};
use crate::network::processor::{ProcessContext, ProcessorInfo};
use crate::network::property::Property;

#[derive(Default)]
pub struct ScaleProcessor;

impl ScaleProcessor {
    pub fn new() -> Self {
        Self
    }

    pub fn info(&self) -> ProcessorInfo {
        ProcessorInfo {
            class_identifier: "visflow.Scale",
            display_name: "Scale",
            category: "Transform",
        }
    }

    pub fn ports(&self) -> Vec<PortDescriptor> {
        vec![
            PortDescriptor::inport("in", DataType::of::<f64>()),
            PortDescriptor::outport("out", DataType::of::<f64>()),
        ]
    }

    pub fn properties(&self) -> Vec<Property> {
        vec![Property::composite("transform", "Transform")
            .with_invalidation_level(InvalidationLevel::InvalidResources)
            .with_child(Property::new("factor", "Factor", 1.0))
            .with_child(Property::new("offset", "Offset", 0.0))]
    }

    pub fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), ProcessError> {
        let input = *ctx.inport("in")?.data::<f64>()?;
        let factor = ctx.float("transform.factor")?;
        let offset = ctx.float("transform.offset")?;
        let output = input * factor + offset;
        if !output.is_finite() {
            return Err(ProcessError::recoverable(format!(
                "{} * {} + {} is not finite",
                input, factor, offset
            )));
        }
        ctx.set_output("out", output)?;
        Ok(())
    }
}
