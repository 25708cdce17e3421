use std::sync::Arc;

use async_trait::async_trait;

use crate::events::RegistryEvent;
use scheduler_errors::SchedulerResult;

/// 注册中心事件的订阅者
#[async_trait]
pub trait RegistryEventListener: Send + Sync {
    async fn notify(&self, event: RegistryEvent);
}

/// 注册中心客户端，同时提供订阅和分布式锁
#[async_trait]
pub trait RegistryClient: Send + Sync {
    async fn subscribe(
        &self,
        path: &str,
        listener: Arc<dyn RegistryEventListener>,
    ) -> SchedulerResult<()>;

    /// 尝试获取指定路径上的集群级互斥锁，获取成功返回 `true`
    async fn get_lock(&self, path: &str) -> SchedulerResult<bool>;

    async fn release_lock(&self, path: &str) -> SchedulerResult<bool>;
}
