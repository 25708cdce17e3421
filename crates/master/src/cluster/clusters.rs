use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use tracing::{debug, error, info};

use scheduler_domain::entities::ServerMetadata;

use super::listener::ClusterChangeListener;

/// 订阅适配器调用的变更入口，同一订阅流上的调用已被串行化
pub trait ServerChangeHandler<T>: Send + Sync {
    fn on_server_added(&self, server: T);

    fn on_server_remove(&self, server: T);

    fn on_server_update(&self, server: T);
}

/// 某一角色的集群成员视图: 地址 -> 元数据
pub struct Clusters<T: ServerMetadata> {
    role: &'static str,
    servers: DashMap<String, T>,
    listeners: RwLock<Vec<Arc<dyn ClusterChangeListener<T>>>>,
}

impl<T: ServerMetadata> Clusters<T> {
    pub fn with_role(role: &'static str) -> Self {
        Self {
            role,
            servers: DashMap::new(),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn role(&self) -> &'static str {
        self.role
    }

    /// 当前全部成员的快照，按地址排序
    pub fn get_servers(&self) -> Vec<T> {
        let mut servers: Vec<T> = self
            .servers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        servers.sort_by(|a, b| a.address().cmp(b.address()));
        servers
    }

    /// 状态为 NORMAL 的成员快照，按地址排序
    pub fn get_normal_servers(&self) -> Vec<T> {
        self.get_servers()
            .into_iter()
            .filter(|server| server.is_normal())
            .collect()
    }

    pub fn get_server(&self, address: &str) -> Option<T> {
        self.servers.get(address).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, address: &str) -> bool {
        self.servers.contains_key(address)
    }

    pub fn addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> =
            self.servers.iter().map(|entry| entry.key().clone()).collect();
        addresses.sort();
        addresses
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// 注册监听器，进程生命周期内不会移除
    pub fn register_listener(&self, listener: Arc<dyn ClusterChangeListener<T>>) {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        listeners.push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    fn record_size(&self) {
        metrics::gauge!("master_cluster_servers", "role" => self.role).set(self.servers.len() as f64);
    }

    /// 依注册顺序通知监听器，单个监听器panic不影响其余监听器
    fn fire_listeners<F>(&self, event: &str, server: &T, notify: F)
    where
        F: Fn(&dyn ClusterChangeListener<T>, &T),
    {
        let listeners: Vec<Arc<dyn ClusterChangeListener<T>>> = self
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        for listener in listeners {
            let result = catch_unwind(AssertUnwindSafe(|| notify(listener.as_ref(), server)));
            if result.is_err() {
                error!(
                    "{} 集群监听器处理 {} 事件失败, server: {}",
                    self.role,
                    event,
                    server.address()
                );
            }
        }
    }
}

impl<T: ServerMetadata> ServerChangeHandler<T> for Clusters<T> {
    fn on_server_added(&self, server: T) {
        self.servers
            .insert(server.address().to_string(), server.clone());
        self.record_size();
        info!("{} 集群新增节点: {}", self.role, server.address());

        self.fire_listeners("added", &server, |listener, server| {
            listener.on_server_added(server)
        });
    }

    fn on_server_remove(&self, server: T) {
        if self.servers.remove(server.address()).is_none() {
            debug!("{} 集群中不存在待移除节点: {}", self.role, server.address());
        }
        self.record_size();
        info!("{} 集群移除节点: {}", self.role, server.address());

        self.fire_listeners("removed", &server, |listener, server| {
            listener.on_server_removed(server)
        });
    }

    fn on_server_update(&self, server: T) {
        if self
            .servers
            .insert(server.address().to_string(), server.clone())
            .is_none()
        {
            self.record_size();
        }
        debug!("{} 集群更新节点: {}", self.role, server.address());

        self.fire_listeners("updated", &server, |listener, server| {
            listener.on_server_updated(server)
        });
    }
}
