//! CollectorProcessor — sink that records every value it receives.
//!
//! The history is shared through `Rc<RefCell<_>>` so callers can keep a
//! handle after moving the processor into a network.

use crate::network::error::ProcessError;
use crate::network::port::{DataType, PortDescriptor};
use crate::network::processor::{ProcessContext, ProcessorInfo};
use crate::network::property::Property;
use std::cell::RefCell;
use std::rc::Rc;

/// Default number of values kept before the oldest are dropped.
pub const DEFAULT_CAPACITY: i64 = 1024;

pub struct CollectorProcessor {
    history: Rc<RefCell<Vec<f64>>>,
}

impl CollectorProcessor {
    pub fn new() -> Self {
        Self {
            history: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Shared handle to the received values, oldest first.
    pub fn history(&self) -> Rc<RefCell<Vec<f64>>> {
        Rc::clone(&self.history)
    }

    pub fn info(&self) -> ProcessorInfo {
        ProcessorInfo {
            class_identifier: "visflow.Collector",
            display_name: "Collector",
            category: "Sink",
        }
    }

    pub fn ports(&self) -> Vec<PortDescriptor> {
        vec![PortDescriptor::inport("in", DataType::of::<f64>())]
    }

    pub fn properties(&self) -> Vec<Property> {
        vec![Property::new("capacity", "Capacity", DEFAULT_CAPACITY)]
    }

    pub fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), ProcessError> {
        let value = *ctx.inport("in")?.data::<f64>()?;
        let capacity = ctx.int("capacity")?.max(1) as usize;

        let mut history = self.history.borrow_mut();
        history.push(value);
        if history.len() > capacity {
            let excess = history.len() - capacity;
            history.drain(..excess);
        }
        Ok(())
    }
}

impl Default for CollectorProcessor {
    fn default() -> Self {
        Self::new()
    }
}
