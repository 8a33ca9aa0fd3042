//! Graph queries over the connection table.
//!
//! The connection graph is small and edited often, so nothing here is cached:
//! every query walks `Network::connections` directly.

use crate::network::id::ProcessorId;
use crate::network::graph::Network;
use std::collections::HashSet;

/// Processors feeding `processor` through one connection.
pub fn direct_predecessors(network: &Network, processor: ProcessorId) -> Vec<ProcessorId> {
    let mut out: Vec<ProcessorId> = network
        .connections()
        .iter()
        .filter(|c| c.to_processor() == processor)
        .map(|c| c.from_processor())
        .collect();
    out.sort();
    out.dedup();
    out
}

/// Processors fed by `processor` through one connection.
pub fn direct_successors(network: &Network, processor: ProcessorId) -> Vec<ProcessorId> {
    let mut out: Vec<ProcessorId> = network
        .connections()
        .iter()
        .filter(|c| c.from_processor() == processor)
        .map(|c| c.to_processor())
        .collect();
    out.sort();
    out.dedup();
    out
}

/// Check if connecting `from` to `to` would create a cycle.
pub fn would_create_cycle(network: &Network, from: ProcessorId, to: ProcessorId) -> bool {
    // If `to` can reach `from` through existing connections, adding from->to closes a loop.
    let mut visited = HashSet::new();
    let mut stack = vec![to];

    while let Some(current) = stack.pop() {
        if current == from {
            return true;
        }
        if !visited.insert(current) {
            continue;
        }
        stack.extend(
            network
                .connections()
                .iter()
                .filter(|c| c.from_processor() == current)
                .map(|c| c.to_processor()),
        );
    }
    false
}

/// Execution order for one evaluation pass.
///
/// Walks backward from every invalid sink through invalid predecessors and
/// emits processors in post-order, so each appears after everything it
/// depends on. Valid processors and invalid processors that do not feed an
/// invalid sink are not part of the order.
pub fn evaluation_order(network: &Network) -> Vec<ProcessorId> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    for processor in network.processors() {
        if processor.is_sink() && !processor.is_valid() {
            visit_invalid(network, processor.id(), &mut visited, &mut order);
        }
    }
    order
}

fn visit_invalid(
    network: &Network,
    processor: ProcessorId,
    visited: &mut HashSet<ProcessorId>,
    order: &mut Vec<ProcessorId>,
) {
    if !visited.insert(processor) {
        return;
    }
    for predecessor in direct_predecessors(network, processor) {
        if !network.is_valid(predecessor) {
            visit_invalid(network, predecessor, visited, order);
        }
    }
    order.push(processor);
}
