//! Observers that record notifications

use std::cell::{Cell, RefCell};
use visflow::network::{
    Connection, InvalidationLevel, NetworkObserver, ProcessorId, ProcessorObserver, PropertyLink,
    PropertyValue,
};
use visflow::observer::{AsObserver, Observer};

/// Records network events as short strings
#[derive(Default)]
pub struct NetworkRecorder {
    observer: Observer,
    pub events: RefCell<Vec<String>>,
    pub evaluate_requests: Cell<u32>,
}

impl NetworkRecorder {
    pub fn requests(&self) -> u32 {
        self.evaluate_requests.get()
    }

    pub fn reset(&self) {
        self.events.borrow_mut().clear();
        self.evaluate_requests.set(0);
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    fn push(&self, event: String) {
        self.events.borrow_mut().push(event);
    }
}

impl AsObserver for NetworkRecorder {
    fn as_observer(&self) -> &Observer {
        &self.observer
    }
}

impl NetworkObserver for NetworkRecorder {
    fn on_processor_added(&self, processor: ProcessorId, identifier: &str) {
        self.push(format!("added {} {}", processor, identifier));
    }

    fn on_processor_will_be_removed(&self, processor: ProcessorId, _identifier: &str) {
        self.push(format!("removing {}", processor));
    }

    fn on_processor_removed(&self, processor: ProcessorId, _identifier: &str) {
        self.push(format!("removed {}", processor));
    }

    fn on_identifier_changed(&self, _processor: ProcessorId, old: &str, new: &str) {
        self.push(format!("renamed {} {}", old, new));
    }

    fn on_connection_added(&self, connection: Connection) {
        self.push(format!("connected {:?}", connection));
    }

    fn on_connection_removed(&self, connection: Connection) {
        self.push(format!("disconnected {:?}", connection));
    }

    fn on_connection_moved(&self, from: Connection, to: Connection) {
        self.push(format!("moved {:?} {:?}", from, to));
    }

    fn on_link_added(&self, link: &PropertyLink) {
        self.push(format!("linked {} {}", link.source, link.destination));
    }

    fn on_link_removed(&self, link: &PropertyLink) {
        self.push(format!("unlinked {} {}", link.source, link.destination));
    }

    fn on_property_changed(&self, processor: ProcessorId, path: &str, _value: &PropertyValue) {
        self.push(format!("property {} {}", processor, path));
    }

    fn on_evaluate_request(&self) {
        self.evaluate_requests.set(self.evaluate_requests.get() + 1);
    }
}

/// Counts processor notifications
#[derive(Default)]
pub struct ProcessorRecorder {
    observer: Observer,
    pub begins: RefCell<Vec<InvalidationLevel>>,
    pub ends: Cell<u32>,
    pub evaluate_requests: Cell<u32>,
    pub processed: Cell<u32>,
    pub errors: RefCell<Vec<String>>,
}

impl AsObserver for ProcessorRecorder {
    fn as_observer(&self) -> &Observer {
        &self.observer
    }
}

impl ProcessorObserver for ProcessorRecorder {
    fn on_invalidation_begin(&self, _processor: ProcessorId, level: InvalidationLevel) {
        self.begins.borrow_mut().push(level);
    }

    fn on_invalidation_end(&self, _processor: ProcessorId) {
        self.ends.set(self.ends.get() + 1);
    }

    fn on_evaluate_request(&self, _processor: ProcessorId) {
        self.evaluate_requests
            .set(self.evaluate_requests.get() + 1);
    }

    fn on_processed(&self, _processor: ProcessorId) {
        self.processed.set(self.processed.get() + 1);
    }

    fn on_process_error(&self, _processor: ProcessorId, message: &str) {
        self.errors.borrow_mut().push(message.to_string());
    }
}
