//! Built-in processor implementations.

pub mod background;
pub mod collector;
pub mod constant;
pub mod scale;
pub mod sum;

pub use background::BackgroundSquareProcessor;
pub use collector::CollectorProcessor;
pub use constant::ConstantSourceProcessor;
pub use scale::ScaleProcessor;
pub use sum::SumProcessor;
