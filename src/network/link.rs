//! Property links: directed value propagation between properties of
//! different processors.

use crate::network::id::ProcessorId;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::fmt;

/// A property addressed by processor and dotted path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyRef {
    pub processor: ProcessorId,
    pub path: String,
}

impl PropertyRef {
    pub fn new(processor: ProcessorId, path: impl Into<String>) -> Self {
        Self {
            processor,
            path: path.into(),
        }
    }
}

impl fmt::Display for PropertyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.processor.0, self.path)
    }
}

/// Changing `source` copies its value into `destination`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyLink {
    pub source: PropertyRef,
    pub destination: PropertyRef,
}

impl PropertyLink {
    pub fn new(source: PropertyRef, destination: PropertyRef) -> Self {
        Self {
            source,
            destination,
        }
    }

    pub fn involves(&self, processor: ProcessorId) -> bool {
        self.source.processor == processor || self.destination.processor == processor
    }

    pub fn reversed(&self) -> Self {
        Self::new(self.destination.clone(), self.source.clone())
    }
}

/// Direct link destinations of `source`, in link order.
pub fn linked_destinations(links: &[PropertyLink], source: &PropertyRef) -> Vec<PropertyRef> {
    links
        .iter()
        .filter(|l| &l.source == source)
        .map(|l| l.destination.clone())
        .collect()
}

pub fn is_linked_bidirectional(links: &[PropertyLink], a: &PropertyRef, b: &PropertyRef) -> bool {
    let forward = links.iter().any(|l| &l.source == a && &l.destination == b);
    let backward = links.iter().any(|l| &l.source == b && &l.destination == a);
    forward && backward
}

/// Every property reachable from `start` through links, excluding `start`.
pub fn properties_linked_to(links: &[PropertyLink], start: &PropertyRef) -> Vec<PropertyRef> {
    let mut visited: HashSet<&PropertyRef> = HashSet::new();
    visited.insert(start);
    let mut queue: VecDeque<&PropertyRef> = VecDeque::from([start]);
    let mut out = Vec::new();

    while let Some(current) = queue.pop_front() {
        for link in links.iter().filter(|l| &l.source == current) {
            if visited.insert(&link.destination) {
                out.push(link.destination.clone());
                queue.push_back(&link.destination);
            }
        }
    }
    out
}
