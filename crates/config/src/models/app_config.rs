use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    logging::LogConfig,
    master::{
        RegistryConfig, ServerConfig, TaskGroupConfig, TaskGroupQueueOrder, WorkerGroupConfig,
    },
};

/// Master coordination configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MasterConfig {
    pub server: ServerConfig,
    pub registry: RegistryConfig,
    pub worker_group: WorkerGroupConfig,
    pub task_group: TaskGroupConfig,
    pub logging: LogConfig,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                listen_port: 5678,
            },
            registry: RegistryConfig {
                master_path: "/nodes/master".to_string(),
                worker_path: "/nodes/worker".to_string(),
                task_group_lock_path: "/lock/master-task-group-coordinator".to_string(),
            },
            worker_group: WorkerGroupConfig {
                refresh_interval_seconds: 60,
            },
            task_group: TaskGroupConfig {
                enabled: true,
                tick_millis: 1000,
                round_interval_multiplier: 5,
                page_size: 1000,
                rpc_timeout_millis: 3000,
                queue_order: TaskGroupQueueOrder::default(),
            },
            logging: LogConfig::default(),
        }
    }
}

impl MasterConfig {
    /// Load configuration from config file and environment variables
    ///
    /// Load order:
    /// 1. Default configuration
    /// 2. Config file (TOML format), if a path is given
    /// 3. Environment variable overrides (prefix: MASTER_, nested keys separated by `__`)
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults = toml::to_string(&MasterConfig::default()).context("序列化默认配置失败")?;
        let mut builder =
            ConfigBuilder::builder().add_source(File::from_str(&defaults, FileFormat::Toml));

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("MASTER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: MasterConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: MasterConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    pub fn validate(&self) -> Result<()> {
        self.server.validate().context("服务配置验证失败")?;
        self.registry.validate().context("注册中心配置验证失败")?;
        self.worker_group
            .validate()
            .context("Worker分组配置验证失败")?;
        self.task_group.validate().context("任务组配置验证失败")?;
        Ok(())
    }
}
