use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use scheduler_domain::entities::WorkerGroup;
use scheduler_domain::repositories::WorkerGroupRepository;
use scheduler_errors::SchedulerResult;

/// Worker分组变更监听器，只需实现关心的回调
pub trait WorkerGroupListener: Send + Sync {
    fn on_worker_group_add(&self, _groups: &[WorkerGroup]) {}

    fn on_worker_group_delete(&self, _groups: &[WorkerGroup]) {}

    fn on_worker_group_change(&self, _groups: &[WorkerGroup]) {}
}

/// 一次比对的结果，按分组名计算
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerGroupChanges {
    pub added: Vec<WorkerGroup>,
    pub removed: Vec<WorkerGroup>,
    pub changed: Vec<WorkerGroup>,
}

impl WorkerGroupChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    fn diff(previous: &HashMap<String, WorkerGroup>, current: &HashMap<String, WorkerGroup>) -> Self {
        let mut changes = WorkerGroupChanges::default();

        for (name, group) in current {
            match previous.get(name) {
                None => changes.added.push(group.clone()),
                Some(old) if old != group => changes.changed.push(group.clone()),
                Some(_) => {}
            }
        }
        for (name, group) in previous {
            if !current.contains_key(name) {
                changes.removed.push(group.clone());
            }
        }

        changes.added.sort_by(|a, b| a.name.cmp(&b.name));
        changes.removed.sort_by(|a, b| a.name.cmp(&b.name));
        changes.changed.sort_by(|a, b| a.name.cmp(&b.name));
        changes
    }
}

/// 定期全量读取Worker分组表，与内存快照比对后通知订阅者
pub struct WorkerGroupChangeNotifier {
    worker_group_repo: Arc<dyn WorkerGroupRepository>,
    refresh_interval: Duration,
    snapshot: Mutex<HashMap<String, WorkerGroup>>,
    listeners: RwLock<Vec<Arc<dyn WorkerGroupListener>>>,
    running: Arc<tokio::sync::RwLock<bool>>,
    stop_signal: Notify,
}

impl WorkerGroupChangeNotifier {
    pub fn new(worker_group_repo: Arc<dyn WorkerGroupRepository>, refresh_interval: Duration) -> Self {
        Self {
            worker_group_repo,
            refresh_interval,
            snapshot: Mutex::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
            running: Arc::new(tokio::sync::RwLock::new(false)),
            stop_signal: Notify::new(),
        }
    }

    pub fn subscribe_worker_groups_change(&self, listener: Arc<dyn WorkerGroupListener>) {
        self.listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(listener);
    }

    /// 立即执行一次比对，然后按固定间隔周期执行
    pub async fn start(self: &Arc<Self>) -> JoinHandle<()> {
        *self.running.write().await = true;
        info!(
            "启动Worker分组变更检测, 间隔: {}秒",
            self.refresh_interval.as_secs()
        );

        self.detect_and_notify().await;

        let notifier = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(notifier.refresh_interval) => {}
                    _ = notifier.stop_signal.notified() => {}
                }
                if !*notifier.running.read().await {
                    info!("收到停止信号，退出Worker分组变更检测循环");
                    break;
                }
                notifier.detect_and_notify().await;
            }
        })
    }

    pub async fn stop(&self) {
        *self.running.write().await = false;
        self.stop_signal.notify_one();
    }

    async fn detect_and_notify(&self) {
        if let Err(e) = self.detect_worker_group_changes().await {
            error!("检测Worker分组变更失败: {}", e);
        }
    }

    /// 读取最新分组表并通知变更，读取失败时快照保持不变
    pub async fn detect_worker_group_changes(&self) -> SchedulerResult<WorkerGroupChanges> {
        let mut snapshot = self.snapshot.lock().await;

        let current: HashMap<String, WorkerGroup> = self
            .worker_group_repo
            .query_all()
            .await?
            .into_iter()
            .map(|group| (group.name.clone(), group))
            .collect();

        let changes = WorkerGroupChanges::diff(&snapshot, &current);
        *snapshot = current;
        drop(snapshot);

        if changes.is_empty() {
            debug!("Worker分组无变化");
            return Ok(changes);
        }

        info!(
            "Worker分组变更: 新增 {}, 删除 {}, 修改 {}",
            changes.added.len(),
            changes.removed.len(),
            changes.changed.len()
        );
        self.notify_listeners(&changes);
        Ok(changes)
    }

    fn notify_listeners(&self, changes: &WorkerGroupChanges) {
        let listeners: Vec<Arc<dyn WorkerGroupListener>> = self
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        for listener in &listeners {
            if !changes.added.is_empty() {
                Self::fire("add", || listener.on_worker_group_add(&changes.added));
            }
            if !changes.removed.is_empty() {
                Self::fire("delete", || listener.on_worker_group_delete(&changes.removed));
            }
            if !changes.changed.is_empty() {
                Self::fire("change", || listener.on_worker_group_change(&changes.changed));
            }
        }
    }

    fn fire(event: &str, callback: impl FnOnce()) {
        if catch_unwind(AssertUnwindSafe(callback)).is_err() {
            error!("Worker分组监听器处理 {} 事件失败", event);
        }
    }
}
