//! SumProcessor — adds every value arriving on its multi-inport.

use crate::network::error::ProcessError;
use crate::network::port::{DataType, PortDescriptor};
use crate::network::processor::{ProcessContext, ProcessorInfo};
use crate::network::property::Property;

#[derive(Default)]
pub struct SumProcessor;

impl SumProcessor {
    pub fn new() -> Self {
        Self
    }

    pub fn info(&self) -> ProcessorInfo {
        ProcessorInfo {
            class_identifier: "visflow.Sum",
            display_name: "Sum",
            category: "Transform",
        }
    }

    pub fn ports(&self) -> Vec<PortDescriptor> {
        vec![
            PortDescriptor::multi_inport("in", DataType::of::<f64>()),
            PortDescriptor::outport("out", DataType::of::<f64>()),
        ]
    }

    pub fn properties(&self) -> Vec<Property> {
        Vec::new()
    }

    pub fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), ProcessError> {
        let inputs = ctx.inport("in")?.changed_data::<f64>()?;
        let changed = inputs.iter().filter(|(changed, _)| *changed).count();
        tracing::debug!("Sum of {} inputs ({} changed)", inputs.len(), changed);
        let total: f64 = inputs.iter().map(|(_, v)| **v).sum();
        ctx.set_output("out", total)?;
        Ok(())
    }
}
