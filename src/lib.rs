//! # visflow: reactive processor networks
//!
//! A dataflow engine in which processors are connected through typed ports and
//! configured through properties. Edits invalidate exactly the processors they
//! affect, and evaluation re-runs only what an invalid sink depends on.
//!
//! ## Architecture
//!
//! - **Observer**: weak, reentrancy-safe publish/subscribe used throughout
//! - **Network**: processors, connections, property links and invalidation
//! - **Evaluator**: runs invalid processors in dependency order on request
//! - **Jobs**: crossbeam-based worker pool for long-running processor work
//!
//! ## Configuration
//!
//! Engine settings (job threads, evaluation limits, logging) are read from
//! `visflow.toml` in the platform config directory under `dev.visflow`.
//!
//! ## Example
//!
//! ```ignore
//! use visflow::network::{
//!     nodes::{CollectorProcessor, ConstantSourceProcessor},
//!     Network, NetworkEvaluator,
//! };
//!
//! let mut network = Network::new();
//! let mut evaluator = NetworkEvaluator::new(&network);
//!
//! let source = network.add_processor(ConstantSourceProcessor::new(1.0))?;
//! let sink = network.add_processor(CollectorProcessor::new())?;
//! network.connect(source, "out", sink, "in")?;
//! evaluator.evaluate(&mut network);
//!
//! network.set_property(source, "value", 2.0)?;
//! evaluator.evaluate_if_requested(&mut network);
//! ```

pub mod config;
pub mod error;
pub mod network;
pub mod observer;

// Re-export commonly used types
pub use config::EngineConfig;
pub use error::{Result, ResultExt, VisFlowError};
pub use network::{
    InvalidationLevel, Network, NetworkError, NetworkEvaluator, NetworkObserver, ProcessorId,
    Property, PropertyValue,
};
pub use observer::{AsObserver, Observable, Observer};
