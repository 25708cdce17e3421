pub mod app_config;
pub mod logging;
pub mod master;

pub use app_config::*;
pub use logging::*;
pub use master::*;
