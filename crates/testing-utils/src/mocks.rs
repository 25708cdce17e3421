//! In-memory implementations of repository and port traits
//!
//! These can be used for unit and integration testing without a database,
//! registry or RPC transport.

use async_trait::async_trait;
use scheduler_domain::entities::{
    ProcessInstance, TaskGroup, TaskGroupQueue, TaskGroupQueueStatus, TaskInstance, WorkerGroup,
};
use scheduler_domain::events::RegistryEvent;
use scheduler_domain::ports::{
    RegistryClient, RegistryEventListener, TaskInstanceWakeupClient, TaskInstanceWakeupRequest,
    TaskInstanceWakeupResponse,
};
use scheduler_domain::repositories::{
    ProcessInstanceRepository, TaskGroupQueueRepository, TaskGroupRepository,
    TaskInstanceRepository, WorkerGroupRepository,
};
use scheduler_errors::{SchedulerError, SchedulerResult};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory TaskGroupRepository
#[derive(Debug, Clone, Default)]
pub struct MockTaskGroupRepository {
    groups: Arc<Mutex<HashMap<i64, TaskGroup>>>,
    update_calls: Arc<AtomicUsize>,
}

impl MockTaskGroupRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_task_groups(groups: Vec<TaskGroup>) -> Self {
        let repo = Self::new();
        for group in groups {
            repo.put(group);
        }
        repo
    }

    pub fn put(&self, group: TaskGroup) {
        self.groups.lock().unwrap().insert(group.id, group);
    }

    pub fn get(&self, id: i64) -> Option<TaskGroup> {
        self.groups.lock().unwrap().get(&id).cloned()
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskGroupRepository for MockTaskGroupRepository {
    async fn query_all_task_groups(&self) -> SchedulerResult<Vec<TaskGroup>> {
        let mut groups: Vec<TaskGroup> = self.groups.lock().unwrap().values().cloned().collect();
        groups.sort_by_key(|group| group.id);
        Ok(groups)
    }

    async fn query_available_task_groups(&self) -> SchedulerResult<Vec<TaskGroup>> {
        let mut groups: Vec<TaskGroup> = self
            .groups
            .lock()
            .unwrap()
            .values()
            .filter(|group| group.is_enabled() && group.use_size < group.group_size)
            .cloned()
            .collect();
        groups.sort_by_key(|group| group.id);
        Ok(groups)
    }

    async fn query_by_id(&self, id: i64) -> SchedulerResult<Option<TaskGroup>> {
        Ok(self.get(id))
    }

    async fn update_by_id(&self, task_group: &TaskGroup) -> SchedulerResult<bool> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let mut groups = self.groups.lock().unwrap();
        match groups.get_mut(&task_group.id) {
            Some(existing) => {
                *existing = task_group.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn acquire_task_group_slot(&self, id: i64) -> SchedulerResult<bool> {
        let mut groups = self.groups.lock().unwrap();
        match groups.get_mut(&id) {
            Some(group) if group.use_size < group.group_size => {
                group.use_size += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_task_group_slot(&self, id: i64) -> SchedulerResult<bool> {
        let mut groups = self.groups.lock().unwrap();
        match groups.get_mut(&id) {
            Some(group) if group.use_size > 0 => {
                group.use_size -= 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// In-memory TaskGroupQueueRepository
#[derive(Debug, Clone)]
pub struct MockTaskGroupQueueRepository {
    queues: Arc<Mutex<BTreeMap<i64, TaskGroupQueue>>>,
    next_id: Arc<Mutex<i64>>,
    update_calls: Arc<AtomicUsize>,
    failing_updates: Arc<Mutex<HashSet<i64>>>,
}

impl MockTaskGroupQueueRepository {
    pub fn new() -> Self {
        Self {
            queues: Arc::new(Mutex::new(BTreeMap::new())),
            next_id: Arc::new(Mutex::new(1)),
            update_calls: Arc::new(AtomicUsize::new(0)),
            failing_updates: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Makes every `update_by_id` for the given row fail with a persistence error
    pub fn fail_updates_for(&self, id: i64) {
        self.failing_updates.lock().unwrap().insert(id);
    }

    pub fn with_queues(queues: Vec<TaskGroupQueue>) -> Self {
        let repo = Self::new();
        for queue in queues {
            repo.put(queue);
        }
        repo
    }

    pub fn put(&self, queue: TaskGroupQueue) {
        let mut next_id = self.next_id.lock().unwrap();
        if queue.id >= *next_id {
            *next_id = queue.id + 1;
        }
        self.queues.lock().unwrap().insert(queue.id, queue);
    }

    pub fn get(&self, id: i64) -> Option<TaskGroupQueue> {
        self.queues.lock().unwrap().get(&id).cloned()
    }

    pub fn get_all(&self) -> Vec<TaskGroupQueue> {
        self.queues.lock().unwrap().values().cloned().collect()
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    fn select<F>(&self, min_id: i64, limit: usize, predicate: F) -> Vec<TaskGroupQueue>
    where
        F: Fn(&TaskGroupQueue) -> bool,
    {
        self.queues
            .lock()
            .unwrap()
            .values()
            .filter(|queue| queue.id > min_id && predicate(queue))
            .take(limit)
            .cloned()
            .collect()
    }
}

impl Default for MockTaskGroupQueueRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskGroupQueueRepository for MockTaskGroupQueueRepository {
    async fn query_in_queue_task_group_queue(
        &self,
        min_id: i64,
        limit: usize,
    ) -> SchedulerResult<Vec<TaskGroupQueue>> {
        Ok(self.select(min_id, limit, |queue| queue.in_queue))
    }

    async fn query_wait_notify_force_start_task_group_queue(
        &self,
        min_id: i64,
        limit: usize,
    ) -> SchedulerResult<Vec<TaskGroupQueue>> {
        Ok(self.select(min_id, limit, |queue| {
            queue.in_queue && queue.force_start && queue.status != TaskGroupQueueStatus::Release
        }))
    }

    async fn query_all_in_queue_task_group_queue_by_group_id(
        &self,
        group_id: i64,
    ) -> SchedulerResult<Vec<TaskGroupQueue>> {
        Ok(self.select(0, usize::MAX, |queue| {
            queue.in_queue && queue.group_id == group_id
        }))
    }

    async fn query_by_task_instance_id(
        &self,
        task_instance_id: i64,
    ) -> SchedulerResult<Vec<TaskGroupQueue>> {
        Ok(self.select(0, usize::MAX, |queue| queue.task_id == task_instance_id))
    }

    async fn insert(&self, queue: &TaskGroupQueue) -> SchedulerResult<i64> {
        let mut next_id = self.next_id.lock().unwrap();
        let mut new_queue = queue.clone();
        new_queue.id = *next_id;
        *next_id += 1;

        self.queues.lock().unwrap().insert(new_queue.id, new_queue.clone());
        Ok(new_queue.id)
    }

    async fn update_by_id(&self, queue: &TaskGroupQueue) -> SchedulerResult<bool> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_updates.lock().unwrap().contains(&queue.id) {
            return Err(SchedulerError::persistence(format!(
                "task group queue {} is locked",
                queue.id
            )));
        }
        let mut queues = self.queues.lock().unwrap();
        match queues.get_mut(&queue.id) {
            Some(existing) => {
                *existing = queue.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count_using_task_group_queue_by_group_id(
        &self,
        group_id: i64,
    ) -> SchedulerResult<i32> {
        let count = self
            .queues
            .lock()
            .unwrap()
            .values()
            .filter(|queue| queue.group_id == group_id && queue.is_using_slot())
            .count();
        Ok(count as i32)
    }
}

/// In-memory TaskInstanceRepository
#[derive(Debug, Clone, Default)]
pub struct MockTaskInstanceRepository {
    task_instances: Arc<Mutex<HashMap<i64, TaskInstance>>>,
}

impl MockTaskInstanceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_task_instances(task_instances: Vec<TaskInstance>) -> Self {
        let repo = Self::new();
        for task_instance in task_instances {
            repo.put(task_instance);
        }
        repo
    }

    pub fn put(&self, task_instance: TaskInstance) {
        self.task_instances
            .lock()
            .unwrap()
            .insert(task_instance.id, task_instance);
    }

    pub fn remove(&self, id: i64) {
        self.task_instances.lock().unwrap().remove(&id);
    }
}

#[async_trait]
impl TaskInstanceRepository for MockTaskInstanceRepository {
    async fn query_by_id(&self, id: i64) -> SchedulerResult<Option<TaskInstance>> {
        Ok(self.task_instances.lock().unwrap().get(&id).cloned())
    }

    async fn query_by_ids(&self, ids: &[i64]) -> SchedulerResult<Vec<TaskInstance>> {
        let task_instances = self.task_instances.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| task_instances.get(id).cloned())
            .collect())
    }
}

/// In-memory ProcessInstanceRepository
#[derive(Debug, Clone, Default)]
pub struct MockProcessInstanceRepository {
    process_instances: Arc<Mutex<HashMap<i64, ProcessInstance>>>,
}

impl MockProcessInstanceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_process_instances(process_instances: Vec<ProcessInstance>) -> Self {
        let repo = Self::new();
        for process_instance in process_instances {
            repo.put(process_instance);
        }
        repo
    }

    pub fn put(&self, process_instance: ProcessInstance) {
        self.process_instances
            .lock()
            .unwrap()
            .insert(process_instance.id, process_instance);
    }
}

#[async_trait]
impl ProcessInstanceRepository for MockProcessInstanceRepository {
    async fn query_by_id(&self, id: i64) -> SchedulerResult<Option<ProcessInstance>> {
        Ok(self.process_instances.lock().unwrap().get(&id).cloned())
    }
}

/// In-memory WorkerGroupRepository, can be switched into a failing mode
#[derive(Debug, Clone, Default)]
pub struct MockWorkerGroupRepository {
    worker_groups: Arc<Mutex<Vec<WorkerGroup>>>,
    failing: Arc<AtomicBool>,
    query_calls: Arc<AtomicUsize>,
}

impl MockWorkerGroupRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_worker_groups(&self, worker_groups: Vec<WorkerGroup>) {
        *self.worker_groups.lock().unwrap() = worker_groups;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkerGroupRepository for MockWorkerGroupRepository {
    async fn query_all(&self) -> SchedulerResult<Vec<WorkerGroup>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SchedulerError::persistence("worker group table unavailable"));
        }
        Ok(self.worker_groups.lock().unwrap().clone())
    }
}

/// In-memory registry: subscriptions are fanned out by `publish`,
/// locks are a set of held paths
#[derive(Clone, Default)]
pub struct MockRegistryClient {
    listeners: Arc<Mutex<HashMap<String, Vec<Arc<dyn RegistryEventListener>>>>>,
    locks: Arc<Mutex<HashSet<String>>>,
    lock_calls: Arc<AtomicUsize>,
    release_calls: Arc<AtomicUsize>,
}

impl MockRegistryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 向订阅了 `event.path` 的监听器投递事件
    pub async fn publish(&self, event: RegistryEvent) {
        let listeners: Vec<Arc<dyn RegistryEventListener>> = self
            .listeners
            .lock()
            .unwrap()
            .get(&event.path)
            .cloned()
            .unwrap_or_default();
        for listener in listeners {
            listener.notify(event.clone()).await;
        }
    }

    pub fn subscriber_count(&self, path: &str) -> usize {
        self.listeners
            .lock()
            .unwrap()
            .get(path)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// 模拟其他Master持有锁
    pub fn hold_lock(&self, path: &str) {
        self.locks.lock().unwrap().insert(path.to_string());
    }

    pub fn is_locked(&self, path: &str) -> bool {
        self.locks.lock().unwrap().contains(path)
    }

    pub fn lock_calls(&self) -> usize {
        self.lock_calls.load(Ordering::SeqCst)
    }

    pub fn release_calls(&self) -> usize {
        self.release_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RegistryClient for MockRegistryClient {
    async fn subscribe(
        &self,
        path: &str,
        listener: Arc<dyn RegistryEventListener>,
    ) -> SchedulerResult<()> {
        self.listeners
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push(listener);
        Ok(())
    }

    async fn get_lock(&self, path: &str) -> SchedulerResult<bool> {
        self.lock_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.locks.lock().unwrap().insert(path.to_string()))
    }

    async fn release_lock(&self, path: &str) -> SchedulerResult<bool> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.locks.lock().unwrap().remove(path))
    }
}

/// Scripted behaviour of [`MockWakeupClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WakeupBehavior {
    Success,
    Reject(String),
    TransportError(String),
}

/// Records wake-up RPCs and answers according to the configured behaviour
#[derive(Debug, Clone)]
pub struct MockWakeupClient {
    requests: Arc<Mutex<Vec<(String, TaskInstanceWakeupRequest)>>>,
    behavior: Arc<Mutex<WakeupBehavior>>,
}

impl MockWakeupClient {
    pub fn new() -> Self {
        Self::with_behavior(WakeupBehavior::Success)
    }

    pub fn with_behavior(behavior: WakeupBehavior) -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            behavior: Arc::new(Mutex::new(behavior)),
        }
    }

    pub fn set_behavior(&self, behavior: WakeupBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn requests(&self) -> Vec<(String, TaskInstanceWakeupRequest)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Default for MockWakeupClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskInstanceWakeupClient for MockWakeupClient {
    async fn wakeup_task_instance(
        &self,
        host: &str,
        request: TaskInstanceWakeupRequest,
    ) -> SchedulerResult<TaskInstanceWakeupResponse> {
        self.requests
            .lock()
            .unwrap()
            .push((host.to_string(), request));
        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            WakeupBehavior::Success => Ok(TaskInstanceWakeupResponse::success()),
            WakeupBehavior::Reject(message) => Ok(TaskInstanceWakeupResponse::fail(message)),
            WakeupBehavior::TransportError(message) => Err(SchedulerError::rpc(message)),
        }
    }
}
