pub mod app;
pub mod logging;
pub mod shutdown;

pub use app::{MasterCollaborators, MasterCoordinationServer};
pub use logging::init_logging;
pub use shutdown::ShutdownManager;
