//! Master协调服务配置

pub mod models;

pub use models::{
    LogConfig, LogLevel, MasterConfig, OutputFormat, RegistryConfig, ServerConfig,
    TaskGroupConfig, TaskGroupQueueOrder, WorkerGroupConfig,
};
