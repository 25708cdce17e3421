use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use scheduler_config::{MasterConfig, TaskGroupQueueOrder};
use scheduler_domain::entities::{
    TaskExecutionStatus, TaskGroup, TaskGroupQueue, TaskGroupQueueStatus, TaskInstance,
};
use scheduler_domain::ports::{RegistryClient, TaskInstanceWakeupClient, TaskInstanceWakeupRequest};
use scheduler_domain::repositories::{
    ProcessInstanceRepository, TaskGroupQueueRepository, TaskGroupRepository,
    TaskInstanceRepository,
};
use scheduler_errors::{SchedulerError, SchedulerResult};

use super::order::sort_waiting_queue;

/// 任务组协调器配置
#[derive(Debug, Clone)]
pub struct TaskGroupCoordinatorConfig {
    /// 集群级互斥锁路径，同一时刻只有一个Master执行协调
    pub lock_path: String,
    /// 两轮协调之间的间隔
    pub round_interval: Duration,
    /// 分页扫描队列时每页的记录数
    pub page_size: usize,
    pub rpc_timeout: Duration,
    pub queue_order: TaskGroupQueueOrder,
}

impl Default for TaskGroupCoordinatorConfig {
    fn default() -> Self {
        Self::from_master_config(&MasterConfig::default())
    }
}

impl TaskGroupCoordinatorConfig {
    pub fn from_master_config(config: &MasterConfig) -> Self {
        let task_group = &config.task_group;
        Self {
            lock_path: config.registry.task_group_lock_path.clone(),
            round_interval: Duration::from_millis(
                task_group.tick_millis * task_group.round_interval_multiplier as u64,
            ),
            page_size: task_group.page_size,
            rpc_timeout: Duration::from_millis(task_group.rpc_timeout_millis),
            queue_order: task_group.queue_order,
        }
    }
}

/// 任务组准入协调器
///
/// 任务实例只负责插入 WAIT_QUEUE 记录，名额的授予、释放以及
/// `use_size` 的修正全部由后台协调循环完成。每一轮协调在集群锁内依次执行:
/// 1. 修正任务组 `use_size`
/// 2. 释放任务实例已不存在或已结束的队列记录
/// 3. 通知强制启动的记录
/// 4. 为等待中的记录分配空闲名额
pub struct TaskGroupCoordinator {
    registry: Arc<dyn RegistryClient>,
    task_group_repo: Arc<dyn TaskGroupRepository>,
    task_group_queue_repo: Arc<dyn TaskGroupQueueRepository>,
    task_instance_repo: Arc<dyn TaskInstanceRepository>,
    process_instance_repo: Arc<dyn ProcessInstanceRepository>,
    wakeup_client: Arc<dyn TaskInstanceWakeupClient>,
    config: TaskGroupCoordinatorConfig,
    running: Arc<tokio::sync::RwLock<bool>>,
    stop_signal: Notify,
}

impl TaskGroupCoordinator {
    pub fn new(
        registry: Arc<dyn RegistryClient>,
        task_group_repo: Arc<dyn TaskGroupRepository>,
        task_group_queue_repo: Arc<dyn TaskGroupQueueRepository>,
        task_instance_repo: Arc<dyn TaskInstanceRepository>,
        process_instance_repo: Arc<dyn ProcessInstanceRepository>,
        wakeup_client: Arc<dyn TaskInstanceWakeupClient>,
        config: TaskGroupCoordinatorConfig,
    ) -> Self {
        Self {
            registry,
            task_group_repo,
            task_group_queue_repo,
            task_instance_repo,
            process_instance_repo,
            wakeup_client,
            config,
            running: Arc::new(tokio::sync::RwLock::new(false)),
            stop_signal: Notify::new(),
        }
    }

    /// 任务实例声明了任务组，且任务组存在并已启用
    pub async fn need_acquire_task_group_slot(
        &self,
        task_instance: &TaskInstance,
    ) -> SchedulerResult<bool> {
        if !task_instance.uses_task_group() {
            return Ok(false);
        }
        let task_group = self
            .task_group_repo
            .query_by_id(task_instance.task_group_id)
            .await?;
        Ok(task_group.map(|group| group.is_enabled()).unwrap_or(false))
    }

    /// 插入一条等待记录后立即返回，名额由协调循环异步授予并通过RPC唤醒任务实例
    pub async fn acquire_task_group_slot(&self, task_instance: &TaskInstance) -> SchedulerResult<()> {
        if !task_instance.uses_task_group() {
            return Err(SchedulerError::invalid_argument(format!(
                "任务实例 {} 未使用任务组",
                task_instance.id
            )));
        }
        let task_group = self
            .task_group_repo
            .query_by_id(task_instance.task_group_id)
            .await?
            .ok_or_else(|| {
                SchedulerError::invalid_argument(format!(
                    "任务组 {} 不存在",
                    task_instance.task_group_id
                ))
            })?;
        if !task_group.is_enabled() {
            return Err(SchedulerError::invalid_argument(format!(
                "任务组 {} 未启用",
                task_group.id
            )));
        }

        let now = Utc::now();
        let queue = TaskGroupQueue {
            id: 0,
            task_id: task_instance.id,
            task_name: task_instance.name.clone(),
            group_id: task_group.id,
            process_id: task_instance.process_instance_id,
            priority: task_instance.task_group_priority,
            status: TaskGroupQueueStatus::WaitQueue,
            force_start: false,
            in_queue: true,
            create_time: now,
            update_time: now,
        };
        let queue_id = self.task_group_queue_repo.insert(&queue).await?;
        info!(
            "任务实例 {} 进入任务组 {} 等待队列, 队列记录: {}",
            task_instance.id, task_group.id, queue_id
        );
        Ok(())
    }

    pub fn need_to_release_task_group_slot(&self, task_instance: &TaskInstance) -> bool {
        task_instance.uses_task_group()
    }

    /// 释放任务实例的全部队列记录，已释放的记录不会重复写入
    pub async fn release_task_group_slot(&self, task_instance: &TaskInstance) -> SchedulerResult<()> {
        if !task_instance.uses_task_group() {
            return Err(SchedulerError::invalid_argument(format!(
                "任务实例 {} 未使用任务组",
                task_instance.id
            )));
        }
        let queues = self
            .task_group_queue_repo
            .query_by_task_instance_id(task_instance.id)
            .await?;
        for queue in queues {
            self.release_task_group_queue(queue).await?;
        }
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// 启动后台协调循环
    pub async fn start(self: &Arc<Self>) -> JoinHandle<()> {
        *self.running.write().await = true;
        info!(
            "启动任务组协调器, 协调间隔: {}ms",
            self.config.round_interval.as_millis()
        );

        let coordinator = Arc::clone(self);
        tokio::spawn(async move { coordinator.coordination_loop().await })
    }

    pub async fn stop(&self) {
        info!("停止任务组协调器");
        *self.running.write().await = false;
        self.stop_signal.notify_one();
    }

    async fn coordination_loop(&self) {
        loop {
            if !self.is_running().await {
                info!("收到停止信号，退出任务组协调循环");
                break;
            }

            match self.run_once().await {
                Ok(true) => debug!("任务组协调完成"),
                Ok(false) => debug!("未获取到任务组协调锁, 跳过本轮"),
                Err(e) => error!("任务组协调失败: {}", e),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.round_interval) => {}
                _ = self.stop_signal.notified() => {}
            }
        }
    }

    /// 在集群锁内执行一轮协调，未获取到锁时返回 `Ok(false)`
    pub async fn run_once(&self) -> SchedulerResult<bool> {
        if !self.registry.get_lock(&self.config.lock_path).await? {
            return Ok(false);
        }

        let result = AssertUnwindSafe(self.reconcile()).catch_unwind().await;

        if let Err(e) = self.registry.release_lock(&self.config.lock_path).await {
            error!("释放任务组协调锁失败: {}", e);
        }

        metrics::counter!("task_group_coordinator_rounds_total").increment(1);
        match result {
            Ok(outcome) => outcome.map(|_| true),
            Err(_) => Err(SchedulerError::Internal(
                "任务组协调过程中发生panic".to_string(),
            )),
        }
    }

    async fn reconcile(&self) -> SchedulerResult<()> {
        self.amend_task_group_use_size().await?;
        self.amend_task_group_queue_status().await?;
        self.deal_with_force_start_task_group_queue().await?;
        self.deal_with_wait_task_group_queue().await?;
        Ok(())
    }

    /// 以队列记录为准修正缓存的 `use_size`
    async fn amend_task_group_use_size(&self) -> SchedulerResult<()> {
        let task_groups = self.task_group_repo.query_all_task_groups().await?;
        for task_group in task_groups {
            let group_id = task_group.id;
            if let Err(e) = self.amend_use_size_of(task_group).await {
                error!("修正任务组 {} 的 useSize 失败, 下一轮重试: {}", group_id, e);
            }
        }
        Ok(())
    }

    async fn amend_use_size_of(&self, mut task_group: TaskGroup) -> SchedulerResult<()> {
        let actual_use_size = self
            .task_group_queue_repo
            .count_using_task_group_queue_by_group_id(task_group.id)
            .await?;
        if task_group.use_size != actual_use_size {
            warn!(
                "任务组 {} 的 useSize {} 与实际占用 {} 不一致, 已修正",
                task_group.name, task_group.use_size, actual_use_size
            );
            task_group.use_size = actual_use_size;
            task_group.update_time = Utc::now();
            self.task_group_repo.update_by_id(&task_group).await?;
        }
        Ok(())
    }

    /// 释放任务实例已不存在或已结束的队列记录
    async fn amend_task_group_queue_status(&self) -> SchedulerResult<()> {
        let mut min_id = 0;
        loop {
            let queues = self
                .task_group_queue_repo
                .query_in_queue_task_group_queue(min_id, self.config.page_size)
                .await?;
            let Some(last) = queues.last() else {
                break;
            };
            min_id = last.id;
            let is_last_page = queues.len() < self.config.page_size;

            let task_ids: Vec<i64> = queues.iter().map(|queue| queue.task_id).collect();
            let task_instances: HashMap<i64, TaskInstance> = self
                .task_instance_repo
                .query_by_ids(&task_ids)
                .await?
                .into_iter()
                .map(|task_instance| (task_instance.id, task_instance))
                .collect();

            for queue in queues {
                match task_instances.get(&queue.task_id) {
                    None => {
                        info!(
                            "任务组队列记录 {} 对应的任务实例 {} 不存在, 释放",
                            queue.id, queue.task_id
                        );
                    }
                    Some(task_instance) if task_instance.state.is_finished() => {
                        info!(
                            "任务组队列记录 {} 对应的任务实例 {} 已结束({:?}), 释放",
                            queue.id, queue.task_id, task_instance.state
                        );
                    }
                    Some(_) => continue,
                }
                let queue_id = queue.id;
                if let Err(e) = self.release_task_group_queue(queue).await {
                    error!("释放队列记录 {} 失败, 下一轮重试: {}", queue_id, e);
                }
            }

            if is_last_page {
                break;
            }
        }
        Ok(())
    }

    /// 强制启动的记录不占用名额，通知后直接释放
    async fn deal_with_force_start_task_group_queue(&self) -> SchedulerResult<()> {
        let mut min_id = 0;
        loop {
            let queues = self
                .task_group_queue_repo
                .query_wait_notify_force_start_task_group_queue(min_id, self.config.page_size)
                .await?;
            let Some(last) = queues.last() else {
                break;
            };
            min_id = last.id;
            let is_last_page = queues.len() < self.config.page_size;

            for queue in queues {
                let queue_id = queue.id;
                if let Err(e) = self.force_start(queue).await {
                    error!("处理强制启动的队列记录 {} 失败, 下一轮重试: {}", queue_id, e);
                }
            }

            if is_last_page {
                break;
            }
        }
        Ok(())
    }

    async fn force_start(&self, queue: TaskGroupQueue) -> SchedulerResult<()> {
        match self.notify_waiting_task_instance(&queue).await {
            Ok(()) => {
                info!(
                    "已通知强制启动的任务实例 {}, 释放队列记录 {}",
                    queue.task_id, queue.id
                );
                metrics::counter!("task_group_force_start_total").increment(1);
                self.release_task_group_queue(queue).await
            }
            Err(e) if e.is_not_applicable() => {
                warn!("强制启动的队列记录 {} 已不适用, 直接释放: {}", queue.id, e);
                self.release_task_group_queue(queue).await
            }
            Err(e) => Err(e),
        }
    }

    /// 按空闲名额为等待中的记录授予名额
    async fn deal_with_wait_task_group_queue(&self) -> SchedulerResult<()> {
        let task_groups = self.task_group_repo.query_available_task_groups().await?;
        for task_group in task_groups {
            if !task_group.is_enabled() {
                continue;
            }
            let available_size = task_group.available_size() as usize;
            if available_size == 0 {
                continue;
            }

            let mut waiting_queues: Vec<TaskGroupQueue> = match self
                .task_group_queue_repo
                .query_all_in_queue_task_group_queue_by_group_id(task_group.id)
                .await
            {
                Ok(queues) => queues.into_iter().filter(|queue| queue.is_waiting()).collect(),
                Err(e) => {
                    error!("查询任务组 {} 的等待队列失败, 下一轮重试: {}", task_group.name, e);
                    continue;
                }
            };
            if waiting_queues.is_empty() {
                continue;
            }
            sort_waiting_queue(self.config.queue_order, &mut waiting_queues);
            waiting_queues.truncate(available_size);

            debug!(
                "任务组 {} 空闲名额 {}, 尝试唤醒 {} 个等待任务",
                task_group.name,
                available_size,
                waiting_queues.len()
            );

            for queue in waiting_queues {
                let queue_id = queue.id;
                if let Err(e) = self.admit_waiting_queue(&task_group, queue).await {
                    error!("处理等待中的队列记录 {} 失败, 下一轮重试: {}", queue_id, e);
                }
            }
        }
        Ok(())
    }

    /// 占用一个名额后唤醒任务实例，唤醒或持久化失败时归还名额
    async fn admit_waiting_queue(
        &self,
        task_group: &TaskGroup,
        mut queue: TaskGroupQueue,
    ) -> SchedulerResult<()> {
        if !self
            .task_group_repo
            .acquire_task_group_slot(task_group.id)
            .await?
        {
            warn!(
                "任务组 {} 名额竞争失败, 队列记录 {} 留待下一轮",
                task_group.name, queue.id
            );
            return Ok(());
        }

        match self.notify_waiting_task_instance(&queue).await {
            Ok(()) => {
                queue.status = TaskGroupQueueStatus::AcquireSuccess;
                queue.update_time = Utc::now();
                if let Err(e) = self.task_group_queue_repo.update_by_id(&queue).await {
                    self.return_slot(task_group).await;
                    return Err(e);
                }
                metrics::counter!("task_group_slot_acquired_total").increment(1);
                info!(
                    "任务实例 {} 获取任务组 {} 名额成功",
                    queue.task_id, task_group.name
                );
                Ok(())
            }
            Err(e) if e.is_not_applicable() => {
                warn!("等待中的队列记录 {} 已不适用, 直接释放: {}", queue.id, e);
                self.return_slot(task_group).await;
                self.release_task_group_queue(queue).await
            }
            Err(e) => {
                self.return_slot(task_group).await;
                Err(e)
            }
        }
    }

    async fn return_slot(&self, task_group: &TaskGroup) {
        if let Err(e) = self
            .task_group_repo
            .release_task_group_slot(task_group.id)
            .await
        {
            error!(
                "归还任务组 {} 名额失败, 等待 useSize 修正: {}",
                task_group.name, e
            );
        }
    }

    async fn release_task_group_queue(&self, mut queue: TaskGroupQueue) -> SchedulerResult<()> {
        if queue.is_released() {
            debug!("任务组队列记录 {} 已释放, 跳过", queue.id);
            return Ok(());
        }
        queue.in_queue = false;
        queue.status = TaskGroupQueueStatus::Release;
        queue.update_time = Utc::now();
        self.task_group_queue_repo.update_by_id(&queue).await?;
        metrics::counter!("task_group_queue_released_total").increment(1);
        info!(
            "释放任务实例 {} 的任务组 {} 队列记录 {}",
            queue.task_id, queue.group_id, queue.id
        );
        Ok(())
    }

    /// 唤醒等待任务组名额的任务实例
    ///
    /// 任务实例或工作流实例已不存在、状态不再匹配、或工作流实例正在容错
    /// （没有负责的Master）时返回 `TaskGroupQueueNotApplicable`，调用方应直接释放队列记录。
    pub async fn notify_waiting_task_instance(&self, queue: &TaskGroupQueue) -> SchedulerResult<()> {
        let task_instance = self
            .task_instance_repo
            .query_by_id(queue.task_id)
            .await?
            .ok_or_else(|| {
                SchedulerError::not_applicable(format!("任务实例 {} 不存在", queue.task_id))
            })?;
        if task_instance.state != TaskExecutionStatus::SubmittedSuccess {
            return Err(SchedulerError::not_applicable(format!(
                "任务实例 {} 状态为 {:?}, 不在等待派发状态",
                task_instance.id, task_instance.state
            )));
        }

        let process_instance = self
            .process_instance_repo
            .query_by_id(queue.process_id)
            .await?
            .ok_or_else(|| {
                SchedulerError::not_applicable(format!("工作流实例 {} 不存在", queue.process_id))
            })?;
        if !process_instance.state.is_running() {
            return Err(SchedulerError::not_applicable(format!(
                "工作流实例 {} 状态为 {:?}, 不在运行中",
                process_instance.id, process_instance.state
            )));
        }
        let host = process_instance
            .host
            .filter(|host| !host.is_empty())
            .ok_or_else(|| {
                SchedulerError::not_applicable(format!(
                    "工作流实例 {} 没有负责的Master, 可能正在容错",
                    process_instance.id
                ))
            })?;

        let request = TaskInstanceWakeupRequest {
            process_instance_id: process_instance.id,
            task_instance_id: task_instance.id,
        };
        let response = tokio::time::timeout(
            self.config.rpc_timeout,
            self.wakeup_client.wakeup_task_instance(&host, request),
        )
        .await
        .map_err(|_| SchedulerError::Timeout(format!("唤醒任务实例 {} 超时, host: {}", task_instance.id, host)))??;

        if !response.success {
            return Err(SchedulerError::rpc(format!(
                "唤醒任务实例 {} 失败, host: {}, message: {}",
                task_instance.id, host, response.message
            )));
        }
        debug!("已唤醒任务实例 {}, host: {}", task_instance.id, host);
        Ok(())
    }
}
