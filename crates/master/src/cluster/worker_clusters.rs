use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use scheduler_domain::entities::{
    ServerMetadata, WorkerGroup, WorkerServerMetadata, DEFAULT_WORKER_GROUP,
};

use super::clusters::{Clusters, ServerChangeHandler};
use super::listener::ClusterChangeListener;
use super::worker_group_notifier::WorkerGroupListener;

/// Worker 集群视图，额外维护 分组名 -> Worker地址 的索引
///
/// 分组变更与节点变更来自两条独立通道，索引中可能残留已下线的地址，
/// 读取时按当前成员过滤，而不是在节点下线时主动清理。
pub struct WorkerClusters {
    clusters: Clusters<WorkerServerMetadata>,
    worker_groups: DashMap<String, Vec<String>>,
}

impl WorkerClusters {
    pub fn new() -> Self {
        Self {
            clusters: Clusters::with_role("worker"),
            worker_groups: DashMap::new(),
        }
    }

    pub fn get_servers(&self) -> Vec<WorkerServerMetadata> {
        self.clusters.get_servers()
    }

    pub fn get_normal_servers(&self) -> Vec<WorkerServerMetadata> {
        self.clusters.get_normal_servers()
    }

    pub fn get_worker_server_by_address(&self, address: &str) -> Option<WorkerServerMetadata> {
        self.clusters.get_server(address)
    }

    pub fn register_listener(&self, listener: Arc<dyn ClusterChangeListener<WorkerServerMetadata>>) {
        self.clusters.register_listener(listener);
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// 分组内当前在线的Worker地址，`default` 分组返回全部Worker
    pub fn get_worker_server_address_by_group(&self, group: &str) -> Vec<String> {
        if group == DEFAULT_WORKER_GROUP {
            return self.clusters.addresses();
        }
        self.worker_groups
            .get(group)
            .map(|addresses| {
                addresses
                    .iter()
                    .filter(|address| self.clusters.contains(address))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 分组内状态为 NORMAL 的Worker地址
    pub fn get_normal_worker_server_address_by_group(&self, group: &str) -> Vec<String> {
        self.get_worker_server_address_by_group(group)
            .into_iter()
            .filter(|address| {
                self.clusters
                    .get_server(address)
                    .map(|server| server.is_normal())
                    .unwrap_or(false)
            })
            .collect()
    }

    pub fn contains_worker_group(&self, group: &str) -> bool {
        group == DEFAULT_WORKER_GROUP || self.worker_groups.contains_key(group)
    }

    pub fn get_worker_groups(&self) -> Vec<String> {
        let mut groups: Vec<String> = self
            .worker_groups
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        groups.sort();
        groups
    }

    fn refresh_worker_groups(&self, groups: &[WorkerGroup]) {
        for group in groups {
            let addresses: Vec<String> = group
                .worker_addresses()
                .into_iter()
                .filter(|address| self.clusters.contains(address))
                .collect();
            info!(
                "Worker分组 {} 更新为 {} 个在线Worker: {:?}",
                group.name,
                addresses.len(),
                addresses
            );
            self.worker_groups.insert(group.name.clone(), addresses);
        }
    }
}

impl Default for WorkerClusters {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerChangeHandler<WorkerServerMetadata> for WorkerClusters {
    fn on_server_added(&self, server: WorkerServerMetadata) {
        self.clusters.on_server_added(server);
    }

    fn on_server_remove(&self, server: WorkerServerMetadata) {
        self.clusters.on_server_remove(server);
    }

    fn on_server_update(&self, server: WorkerServerMetadata) {
        self.clusters.on_server_update(server);
    }
}

impl WorkerGroupListener for WorkerClusters {
    fn on_worker_group_add(&self, groups: &[WorkerGroup]) {
        self.refresh_worker_groups(groups);
    }

    fn on_worker_group_delete(&self, groups: &[WorkerGroup]) {
        for group in groups {
            if self.worker_groups.remove(&group.name).is_some() {
                info!("移除Worker分组: {}", group.name);
            }
        }
    }

    fn on_worker_group_change(&self, groups: &[WorkerGroup]) {
        self.refresh_worker_groups(groups);
    }
}
