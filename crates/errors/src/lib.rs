use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("参数校验失败: {0}")]
    InvalidArgument(String),
    #[error("任务组队列记录已不适用: {reason}")]
    TaskGroupQueueNotApplicable { reason: String },
    #[error("持久化操作错误: {0}")]
    Persistence(String),
    #[error("注册中心错误: {0}")]
    Registry(String),
    #[error("RPC调用失败: {0}")]
    Rpc(String),
    #[error("操作超时: {0}")]
    Timeout(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

impl SchedulerError {
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }
    pub fn not_applicable<S: Into<String>>(reason: S) -> Self {
        Self::TaskGroupQueueNotApplicable {
            reason: reason.into(),
        }
    }
    pub fn persistence<S: Into<String>>(msg: S) -> Self {
        Self::Persistence(msg.into())
    }
    pub fn registry<S: Into<String>>(msg: S) -> Self {
        Self::Registry(msg.into())
    }
    pub fn rpc<S: Into<String>>(msg: S) -> Self {
        Self::Rpc(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    /// 目标任务或工作流已不存在/已结束，对应队列记录应直接释放而不是重试
    pub fn is_not_applicable(&self) -> bool {
        matches!(self, SchedulerError::TaskGroupQueueNotApplicable { .. })
    }
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SchedulerError::Internal(_) | SchedulerError::Configuration(_)
        )
    }
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SchedulerError::Persistence(_)
                | SchedulerError::Registry(_)
                | SchedulerError::Rpc(_)
                | SchedulerError::Timeout(_)
        )
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        SchedulerError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for SchedulerError {
    fn from(err: anyhow::Error) -> Self {
        SchedulerError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests;
