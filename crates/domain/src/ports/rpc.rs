use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use scheduler_errors::SchedulerResult;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskInstanceWakeupRequest {
    pub process_instance_id: i64,
    pub task_instance_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskInstanceWakeupResponse {
    pub success: bool,
    pub message: String,
}

impl TaskInstanceWakeupResponse {
    pub fn success() -> Self {
        Self {
            success: true,
            message: String::new(),
        }
    }

    pub fn fail<S: Into<String>>(message: S) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// 负责工作流实例的Master暴露的事件监听接口
///
/// `host` 为目标Master的 `host:port`，传输层的超时与连接错误以
/// `SchedulerError::Rpc` / `SchedulerError::Timeout` 返回。
#[async_trait]
pub trait TaskInstanceWakeupClient: Send + Sync {
    async fn wakeup_task_instance(
        &self,
        host: &str,
        request: TaskInstanceWakeupRequest,
    ) -> SchedulerResult<TaskInstanceWakeupResponse>;
}
