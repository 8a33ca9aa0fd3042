//! ConstantSourceProcessor — publishes the value of its `value` property.

use crate::network::error::ProcessError;
use crate::network::port::{DataType, PortDescriptor};
use crate::network::processor::{ProcessContext, ProcessorInfo};
use crate::network::property::Property;

pub struct ConstantSourceProcessor {
    initial: f64,
}

impl ConstantSourceProcessor {
    pub fn new(initial: f64) -> Self {
        Self { initial }
    }

    pub fn info(&self) -> ProcessorInfo {
        ProcessorInfo {
            class_identifier: "visflow.ConstantSource",
            display_name: "Constant",
            category: "Source",
        }
    }

    pub fn ports(&self) -> Vec<PortDescriptor> {
        vec![PortDescriptor::outport("out", DataType::of::<f64>())]
    }

    pub fn properties(&self) -> Vec<Property> {
        vec![Property::new("value", "Value", self.initial)]
    }

    pub fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), ProcessError> {
        let value = ctx.float("value")?;
        ctx.set_output("out", value)?;
        Ok(())
    }
}

impl Default for ConstantSourceProcessor {
    fn default() -> Self {
        Self::new(0.0)
    }
}
