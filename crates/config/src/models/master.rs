use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub listen_port: u16,
}

impl ServerConfig {
    /// 当前Master在集群中的地址，与心跳中的 `host:port` 一致
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.listen_port)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.host.trim().is_empty() {
            return Err(anyhow::anyhow!("主机名不能为空"));
        }
        if self.listen_port == 0 {
            return Err(anyhow::anyhow!("监听端口必须大于0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistryConfig {
    pub master_path: String,
    pub worker_path: String,
    pub task_group_lock_path: String,
}

impl RegistryConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.master_path.is_empty() || self.worker_path.is_empty() {
            return Err(anyhow::anyhow!("注册中心节点路径不能为空"));
        }
        if self.task_group_lock_path.is_empty() {
            return Err(anyhow::anyhow!("任务组协调器锁路径不能为空"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerGroupConfig {
    pub refresh_interval_seconds: u64,
}

impl WorkerGroupConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.refresh_interval_seconds == 0 {
            return Err(anyhow::anyhow!("Worker分组刷新间隔必须大于0"));
        }
        Ok(())
    }
}

/// 等待队列在容量不足时的准入顺序
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskGroupQueueOrder {
    /// 优先级降序，同优先级按入队顺序（id升序）
    #[default]
    PriorityDescThenId,
    /// 严格按入队顺序
    IdAsc,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskGroupConfig {
    pub enabled: bool,
    /// 协调循环的基础时间单位
    pub tick_millis: u64,
    /// 两轮协调之间间隔 `tick_millis * round_interval_multiplier`
    pub round_interval_multiplier: u32,
    pub page_size: usize,
    pub rpc_timeout_millis: u64,
    pub queue_order: TaskGroupQueueOrder,
}

impl TaskGroupConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.tick_millis == 0 {
            return Err(anyhow::anyhow!("任务组协调器时间单位必须大于0"));
        }
        if self.round_interval_multiplier == 0 {
            return Err(anyhow::anyhow!("任务组协调间隔倍数必须大于0"));
        }
        if self.page_size == 0 {
            return Err(anyhow::anyhow!("任务组队列分页大小必须大于0"));
        }
        if self.rpc_timeout_millis == 0 {
            return Err(anyhow::anyhow!("RPC超时时间必须大于0"));
        }
        Ok(())
    }
}
