//! Built-in processor kinds for dynamic creation.

use crate::network::nodes::{
    BackgroundSquareProcessor, CollectorProcessor, ConstantSourceProcessor, ScaleProcessor,
    SumProcessor,
};
use crate::network::processor::AnyProcessor;
use serde::{Deserialize, Serialize};

/// Processor classes shipped with the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuiltinKind {
    // Sources
    ConstantSource,

    // Transforms
    Scale,
    Sum,
    BackgroundSquare,

    // Sinks
    Collector,
}

impl BuiltinKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            BuiltinKind::ConstantSource => "Constant",
            BuiltinKind::Scale => "Scale",
            BuiltinKind::Sum => "Sum",
            BuiltinKind::BackgroundSquare => "Background Square",
            BuiltinKind::Collector => "Collector",
        }
    }

    /// Identifier stored in snapshots and used by the registry.
    pub fn class_identifier(&self) -> &'static str {
        match self {
            BuiltinKind::ConstantSource => "visflow.ConstantSource",
            BuiltinKind::Scale => "visflow.Scale",
            BuiltinKind::Sum => "visflow.Sum",
            BuiltinKind::BackgroundSquare => "visflow.BackgroundSquare",
            BuiltinKind::Collector => "visflow.Collector",
        }
    }

    pub fn all() -> &'static [BuiltinKind] {
        &[
            BuiltinKind::ConstantSource,
            BuiltinKind::Scale,
            BuiltinKind::Sum,
            BuiltinKind::BackgroundSquare,
            BuiltinKind::Collector,
        ]
    }

    pub fn from_class_identifier(class_identifier: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|k| k.class_identifier() == class_identifier)
    }

    pub fn is_sink(&self) -> bool {
        matches!(self, BuiltinKind::Collector)
    }

    pub fn description(&self) -> &'static str {
        match self {
            BuiltinKind::ConstantSource =>
                "Publishes the value of its `value` property.\n\
                 Has no inports.",

            BuiltinKind::Scale =>
                "Computes in * factor + offset.\n\
                 Changing the transform re-initializes resources.",

            BuiltinKind::Sum =>
                "Adds every connected input.\n\
                 Accepts any number of connections.",

            BuiltinKind::BackgroundSquare =>
                "Squares its input on the job pool.\n\
                 Stays invalid until the job completes.",

            BuiltinKind::Collector =>
                "Records received values.\n\
                 Keeps at most `capacity` of them.",
        }
    }

    /// A fresh processor of this kind with default properties.
    pub fn create(&self) -> AnyProcessor {
        match self {
            BuiltinKind::ConstantSource => ConstantSourceProcessor::default().into(),
            BuiltinKind::Scale => ScaleProcessor::new().into(),
            BuiltinKind::Sum => SumProcessor::new().into(),
            BuiltinKind::BackgroundSquare => BackgroundSquareProcessor::new().into(),
            BuiltinKind::Collector => CollectorProcessor::new().into(),
        }
    }
}

impl std::fmt::Display for BuiltinKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
