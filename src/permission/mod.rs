pub mod catalogue;
pub mod condition;
pub mod evaluator;

pub use catalogue::*;
pub use condition::*;
pub use evaluator::*;
