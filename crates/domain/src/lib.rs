pub mod entities;
pub mod events;
pub mod ports;
pub mod repositories;

pub use entities::*;
pub use events::*;
pub use ports::*;
pub use repositories::*;
pub use scheduler_errors::{SchedulerError, SchedulerResult};
