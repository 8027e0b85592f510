pub mod mapper;
pub mod set;

pub use mapper::*;
pub use set::*;
