pub mod coordinator;
pub mod order;

pub use coordinator::*;
pub use order::*;
