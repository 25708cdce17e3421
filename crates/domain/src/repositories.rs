//! 领域仓储抽象
//!
//! 定义数据访问的抽象接口，具体的关系型存储实现由上层服务提供

use async_trait::async_trait;

use crate::entities::{ProcessInstance, TaskGroup, TaskGroupQueue, TaskInstance, WorkerGroup};
use scheduler_errors::SchedulerResult;

/// 任务组仓储抽象
#[async_trait]
pub trait TaskGroupRepository: Send + Sync {
    async fn query_all_task_groups(&self) -> SchedulerResult<Vec<TaskGroup>>;
    /// 已启用且 `use_size < group_size` 的任务组
    async fn query_available_task_groups(&self) -> SchedulerResult<Vec<TaskGroup>>;
    async fn query_by_id(&self, id: i64) -> SchedulerResult<Option<TaskGroup>>;
    async fn update_by_id(&self, task_group: &TaskGroup) -> SchedulerResult<bool>;
    /// 条件更新: 仅当 `use_size < group_size` 时占用一个名额，竞争失败返回 `false`
    async fn acquire_task_group_slot(&self, id: i64) -> SchedulerResult<bool>;
    /// 条件更新: 仅当 `use_size > 0` 时归还一个名额
    async fn release_task_group_slot(&self, id: i64) -> SchedulerResult<bool>;
}

/// 任务组队列仓储抽象
#[async_trait]
pub trait TaskGroupQueueRepository: Send + Sync {
    /// `in_queue = true` 且 `id > min_id` 的记录，按id升序
    async fn query_in_queue_task_group_queue(
        &self,
        min_id: i64,
        limit: usize,
    ) -> SchedulerResult<Vec<TaskGroupQueue>>;
    /// 等待通知的强制启动记录: `in_queue = true`、未释放、`force_start = true`
    async fn query_wait_notify_force_start_task_group_queue(
        &self,
        min_id: i64,
        limit: usize,
    ) -> SchedulerResult<Vec<TaskGroupQueue>>;
    async fn query_all_in_queue_task_group_queue_by_group_id(
        &self,
        group_id: i64,
    ) -> SchedulerResult<Vec<TaskGroupQueue>>;
    async fn query_by_task_instance_id(
        &self,
        task_instance_id: i64,
    ) -> SchedulerResult<Vec<TaskGroupQueue>>;
    /// 插入新记录，返回分配的id
    async fn insert(&self, queue: &TaskGroupQueue) -> SchedulerResult<i64>;
    async fn update_by_id(&self, queue: &TaskGroupQueue) -> SchedulerResult<bool>;
    /// 正在占用名额（ACQUIRE_SUCCESS 且非强制启动）的记录数
    async fn count_using_task_group_queue_by_group_id(&self, group_id: i64)
        -> SchedulerResult<i32>;
}

#[async_trait]
pub trait TaskInstanceRepository: Send + Sync {
    async fn query_by_id(&self, id: i64) -> SchedulerResult<Option<TaskInstance>>;
    async fn query_by_ids(&self, ids: &[i64]) -> SchedulerResult<Vec<TaskInstance>>;
}

#[async_trait]
pub trait ProcessInstanceRepository: Send + Sync {
    async fn query_by_id(&self, id: i64) -> SchedulerResult<Option<ProcessInstance>>;
}

#[async_trait]
pub trait WorkerGroupRepository: Send + Sync {
    async fn query_all(&self) -> SchedulerResult<Vec<WorkerGroup>>;
}
