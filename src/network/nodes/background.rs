//! BackgroundSquareProcessor — squares its input on the job pool.
//!
//! The processor stays invalid while the job runs. `delay_ms` simulates an
//! expensive computation.

use crate::network::error::ProcessError;
use crate::network::port::{DataType, PortDescriptor};
use crate::network::processor::{ProcessContext, ProcessorInfo};
use crate::network::property::Property;
use std::time::Duration;

#[derive(Default)]
pub struct BackgroundSquareProcessor;

impl BackgroundSquareProcessor {
    pub fn new() -> Self {
        Self
    }

    pub fn info(&self) -> ProcessorInfo {
        ProcessorInfo {
            class_identifier: "visflow.BackgroundSquare",
            display_name: "Background Square",
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
        vec![Property::new("delay_ms", "Delay (ms)", 0i64)]
    }

    pub fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), ProcessError> {
        let input = *ctx.inport("in")?.data::<f64>()?;
        let delay = Duration::from_millis(ctx.int("delay_ms")?.max(0) as u64);

        ctx.spawn_job("out", move || {
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            if input.is_nan() {
                return Err("input is not a number".to_string());
            }
            Ok(input * input)
        })?;
        Ok(())
    }
}
