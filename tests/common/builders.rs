//! Test processors and a network fixture

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use visflow::network::{
    DataType, EvaluationReport, InvalidationLevel, Network, NetworkEvaluator, OutportId,
    PortDescriptor, ProcessContext, ProcessError, Processor, ProcessorId, ProcessorInfo, Property,
};

/// Names of processors in the order they ran
pub type CallLog = Rc<RefCell<Vec<String>>>;

/// Configurable processor that records every `process()` call.
///
/// Outputs `value + sum(inputs)` on `out`. The `mode` property switches
/// between `ok`, `fail`, `incomplete` and `job`.
pub struct TestProcessor {
    name: String,
    inports: Vec<&'static str>,
    optional: Vec<&'static str>,
    has_outport: bool,
    log: CallLog,
    not_ready: Rc<Cell<u32>>,
}

impl TestProcessor {
    pub fn source(name: &str, log: &CallLog) -> Self {
        Self::new(name, &[], true, log)
    }

    pub fn transform(name: &str, inports: &[&'static str], log: &CallLog) -> Self {
        Self::new(name, inports, true, log)
    }

    pub fn sink(name: &str, inports: &[&'static str], log: &CallLog) -> Self {
        Self::new(name, inports, false, log)
    }

    fn new(name: &str, inports: &[&'static str], has_outport: bool, log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            inports: inports.to_vec(),
            optional: Vec::new(),
            has_outport,
            log: Rc::clone(log),
            not_ready: Rc::new(Cell::new(0)),
        }
    }

    pub fn with_optional(mut self, inport: &'static str) -> Self {
        self.optional.push(inport);
        self
    }

    /// Counter of `on_not_ready` calls
    pub fn not_ready_calls(&self) -> Rc<Cell<u32>> {
        Rc::clone(&self.not_ready)
    }
}

impl Processor for TestProcessor {
    fn info(&self) -> ProcessorInfo {
        ProcessorInfo {
            class_identifier: "test.Processor",
            display_name: "Test",
            category: "Test",
        }
    }

    fn ports(&self) -> Vec<PortDescriptor> {
        let mut ports: Vec<PortDescriptor> = self
            .inports
            .iter()
            .map(|&id| PortDescriptor::inport(id, DataType::of::<f64>()))
            .collect();
        ports.extend(
            self.optional
                .iter()
                .map(|&id| PortDescriptor::inport(id, DataType::of::<f64>()).optional()),
        );
        if self.has_outport {
            ports.push(PortDescriptor::outport("out", DataType::of::<f64>()));
        }
        ports
    }

    fn properties(&self) -> Vec<Property> {
        vec![
            Property::new("value", "Value", 0.0),
            Property::new("mode", "Mode", "ok"),
            Property::composite("resources", "Resources")
                .with_invalidation_level(InvalidationLevel::InvalidResources)
                .with_child(Property::new("size", "Size", 1i64)),
        ]
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), ProcessError> {
        self.log.borrow_mut().push(self.name.clone());

        let mut total = ctx.float("value")?;
        for inport in ctx.inports() {
            if inport.is_connected() {
                total += *inport.data::<f64>()?;
            }
        }
        let mode = ctx.text("mode")?.to_string();

        match mode.as_str() {
            "fail" => Err(ProcessError::recoverable(format!("{} failed", self.name))),
            "incomplete" => {
                if self.has_outport {
                    ctx.set_output("out", total)?;
                }
                Err(ProcessError::Incomplete)
            }
            "job" => {
                ctx.spawn_job("out", move || Ok(total * 2.0))?;
                Ok(())
            }
            _ => {
                if self.has_outport {
                    ctx.set_output("out", total)?;
                }
                Ok(())
            }
        }
    }

    fn on_not_ready(&mut self) {
        self.not_ready.set(self.not_ready.get() + 1);
    }
}

/// A network with an attached evaluator and a shared call log
pub struct TestNetwork {
    pub network: Network,
    pub evaluator: NetworkEvaluator,
    pub log: CallLog,
}

impl TestNetwork {
    pub fn new() -> Self {
        let network = Network::new();
        let evaluator = NetworkEvaluator::new(&network);
        Self {
            network,
            evaluator,
            log: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn add(&mut self, name: &str, processor: TestProcessor) -> ProcessorId {
        self.network
            .add_processor_as(Box::new(processor) as Box<dyn Processor>, name)
            .expect("add processor")
    }

    pub fn source(&mut self, name: &str) -> ProcessorId {
        let processor = TestProcessor::source(name, &self.log);
        self.add(name, processor)
    }

    pub fn transform(&mut self, name: &str, inports: &[&'static str]) -> ProcessorId {
        let processor = TestProcessor::transform(name, inports, &self.log);
        self.add(name, processor)
    }

    pub fn sink(&mut self, name: &str, inports: &[&'static str]) -> ProcessorId {
        let processor = TestProcessor::sink(name, inports, &self.log);
        self.add(name, processor)
    }

    pub fn connect(&mut self, from: ProcessorId, to: ProcessorId, inport: &str) {
        self.network
            .connect(from, "out", to, inport)
            .expect("connect");
    }

    pub fn out(&self, processor: ProcessorId) -> OutportId {
        self.network.outport(processor, "out").expect("outport")
    }

    pub fn evaluate(&mut self) -> EvaluationReport {
        self.evaluator.evaluate(&mut self.network)
    }

    /// Names logged since the last call, clearing the log
    pub fn take_log(&self) -> Vec<String> {
        std::mem::take(&mut *self.log.borrow_mut())
    }

    pub fn calls(&self, name: &str) -> usize {
        self.log.borrow().iter().filter(|n| n.as_str() == name).count()
    }

    pub fn value(&self, processor: ProcessorId) -> Option<f64> {
        self.network
            .outport_value::<f64>(self.out(processor))
            .map(|v| *v)
    }

    /// source -> transform -> sink, evaluated once
    pub fn chain() -> (Self, [ProcessorId; 3]) {
        let mut t = Self::new();
        let p1 = t.source("P1");
        let p2 = t.transform("P2", &["in"]);
        let p3 = t.sink("P3", &["in"]);
        t.connect(p1, p2, "in");
        t.connect(p2, p3, "in");
        t.evaluate();
        t.take_log();
        (t, [p1, p2, p3])
    }

    /// A -> {B, C} -> D -> sink, evaluated once
    pub fn diamond() -> (Self, [ProcessorId; 5]) {
        let mut t = Self::new();
        let a = t.source("A");
        let b = t.transform("B", &["in"]);
        let c = t.transform("C", &["in"]);
        let d = t.transform("D", &["left", "right"]);
        let sink = t.sink("Sink", &["in"]);
        t.connect(a, b, "in");
        t.connect(a, c, "in");
        t.connect(b, d, "left");
        t.connect(c, d, "right");
        t.connect(d, sink, "in");
        t.evaluate();
        t.take_log();
        (t, [a, b, c, d, sink])
    }
}

impl Default for TestNetwork {
    fn default() -> Self {
        Self::new()
    }
}
