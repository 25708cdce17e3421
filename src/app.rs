use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use scheduler_config::MasterConfig;
use scheduler_domain::entities::{MasterServerMetadata, WorkerServerMetadata};
use scheduler_domain::ports::{RegistryClient, TaskInstanceWakeupClient};
use scheduler_domain::repositories::{
    ProcessInstanceRepository, TaskGroupQueueRepository, TaskGroupRepository,
    TaskInstanceRepository, WorkerGroupRepository,
};
use scheduler_master::cluster::{
    ClusterSubscriptionAdapter, MasterClusters, WorkerClusters, WorkerGroupChangeNotifier,
};
use scheduler_master::slot_manager::MasterSlotManager;
use scheduler_master::task_group::{TaskGroupCoordinator, TaskGroupCoordinatorConfig};

use crate::shutdown::{wait_for_shutdown_signal, ShutdownManager};

const STOP_TIMEOUT: Duration = Duration::from_secs(30);

/// 由外部提供的持久化、注册中心和RPC实现
#[derive(Clone)]
pub struct MasterCollaborators {
    pub registry: Arc<dyn RegistryClient>,
    pub task_group_repo: Arc<dyn TaskGroupRepository>,
    pub task_group_queue_repo: Arc<dyn TaskGroupQueueRepository>,
    pub task_instance_repo: Arc<dyn TaskInstanceRepository>,
    pub process_instance_repo: Arc<dyn ProcessInstanceRepository>,
    pub worker_group_repo: Arc<dyn WorkerGroupRepository>,
    pub wakeup_client: Arc<dyn TaskInstanceWakeupClient>,
}

/// Master协调服务
///
/// 组装集群视图、槽位管理、Worker分组检测和任务组协调器。
/// 构造时只建立对象之间的订阅关系，注册中心订阅和后台循环在 `start` 中启动。
pub struct MasterCoordinationServer {
    config: MasterConfig,
    registry: Arc<dyn RegistryClient>,
    master_clusters: Arc<MasterClusters>,
    worker_clusters: Arc<WorkerClusters>,
    slot_manager: Arc<MasterSlotManager>,
    worker_group_notifier: Arc<WorkerGroupChangeNotifier>,
    task_group_coordinator: Arc<TaskGroupCoordinator>,
    shutdown_manager: ShutdownManager,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl MasterCoordinationServer {
    pub fn new(config: MasterConfig, collaborators: MasterCollaborators) -> Result<Self> {
        config.validate().context("Master配置校验失败")?;
        let self_address = config.server.address();
        info!("初始化Master协调服务, 当前节点: {}", self_address);

        let master_clusters = Arc::new(MasterClusters::new());
        let worker_clusters = Arc::new(WorkerClusters::new());
        let slot_manager = MasterSlotManager::register(self_address, &master_clusters);

        let worker_group_notifier = Arc::new(WorkerGroupChangeNotifier::new(
            collaborators.worker_group_repo,
            Duration::from_secs(config.worker_group.refresh_interval_seconds),
        ));
        worker_group_notifier.subscribe_worker_groups_change(worker_clusters.clone());

        let task_group_coordinator = Arc::new(TaskGroupCoordinator::new(
            collaborators.registry.clone(),
            collaborators.task_group_repo,
            collaborators.task_group_queue_repo,
            collaborators.task_instance_repo,
            collaborators.process_instance_repo,
            collaborators.wakeup_client,
            TaskGroupCoordinatorConfig::from_master_config(&config),
        ));

        Ok(Self {
            config,
            registry: collaborators.registry,
            master_clusters,
            worker_clusters,
            slot_manager,
            worker_group_notifier,
            task_group_coordinator,
            shutdown_manager: ShutdownManager::new(),
            handles: Mutex::new(Vec::new()),
        })
    }

    pub fn master_clusters(&self) -> &Arc<MasterClusters> {
        &self.master_clusters
    }

    pub fn worker_clusters(&self) -> &Arc<WorkerClusters> {
        &self.worker_clusters
    }

    pub fn slot_manager(&self) -> &Arc<MasterSlotManager> {
        &self.slot_manager
    }

    pub fn task_group_coordinator(&self) -> &Arc<TaskGroupCoordinator> {
        &self.task_group_coordinator
    }

    /// 订阅Master/Worker心跳并启动后台循环
    pub async fn start(&self) -> Result<()> {
        let registry_config = &self.config.registry;

        self.registry
            .subscribe(
                &registry_config.master_path,
                Arc::new(ClusterSubscriptionAdapter::<MasterServerMetadata>::new(
                    self.master_clusters.clone(),
                )),
            )
            .await
            .with_context(|| format!("订阅Master节点失败: {}", registry_config.master_path))?;
        self.registry
            .subscribe(
                &registry_config.worker_path,
                Arc::new(ClusterSubscriptionAdapter::<WorkerServerMetadata>::new(
                    self.worker_clusters.clone(),
                )),
            )
            .await
            .with_context(|| format!("订阅Worker节点失败: {}", registry_config.worker_path))?;

        let mut handles = self.handles.lock().await;
        handles.push(self.worker_group_notifier.start().await);

        if self.config.task_group.enabled {
            handles.push(self.task_group_coordinator.start().await);
        } else {
            warn!("任务组协调器已在配置中禁用");
        }

        let mut shutdown_rx = self.shutdown_manager.subscribe().await;
        let notifier = Arc::clone(&self.worker_group_notifier);
        let coordinator = Arc::clone(&self.task_group_coordinator);
        handles.push(tokio::spawn(async move {
            let _ = shutdown_rx.recv().await;
            notifier.stop().await;
            coordinator.stop().await;
        }));

        info!("Master协调服务已启动");
        Ok(())
    }

    /// 通知后台循环退出并等待其结束
    pub async fn stop(&self) {
        self.shutdown_manager.shutdown().await;

        let handles: Vec<JoinHandle<()>> = self.handles.lock().await.drain(..).collect();
        for handle in handles {
            match tokio::time::timeout(STOP_TIMEOUT, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("后台任务异常退出: {}", e),
                Err(_) => warn!("等待后台任务退出超时"),
            }
        }
        info!("Master协调服务已停止");
    }

    /// 启动后一直运行到收到 Ctrl+C 或 SIGTERM
    pub async fn run_until_signal(&self) -> Result<()> {
        self.start().await?;
        wait_for_shutdown_signal().await;
        info!("收到关闭信号，开始优雅关闭...");
        self.stop().await;
        Ok(())
    }
}
