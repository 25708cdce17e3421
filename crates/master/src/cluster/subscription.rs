use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use scheduler_domain::entities::ServerMetadata;
use scheduler_domain::events::{EventType, RegistryEvent};
use scheduler_domain::ports::RegistryEventListener;

use super::clusters::ServerChangeHandler;

/// 将注册中心的心跳事件转换为集群成员变更
///
/// 同一个适配器上的事件严格串行处理，避免新增/移除乱序导致幽灵节点或丢失节点。
pub struct ClusterSubscriptionAdapter<T: ServerMetadata> {
    handler: Arc<dyn ServerChangeHandler<T>>,
    dispatch_lock: Mutex<()>,
    _metadata: PhantomData<fn() -> T>,
}

impl<T: ServerMetadata> ClusterSubscriptionAdapter<T> {
    pub fn new(handler: Arc<dyn ServerChangeHandler<T>>) -> Self {
        Self {
            handler,
            dispatch_lock: Mutex::new(()),
            _metadata: PhantomData,
        }
    }

    fn dispatch(&self, event_type: EventType, server: T) {
        match event_type {
            EventType::Add => self.handler.on_server_added(server),
            EventType::Remove => self.handler.on_server_remove(server),
            EventType::Update => self.handler.on_server_update(server),
            EventType::Unknown => {
                debug!("忽略未知类型的注册中心事件, server: {}", server.address());
            }
        }
    }
}

#[async_trait]
impl<T: ServerMetadata> RegistryEventListener for ClusterSubscriptionAdapter<T> {
    async fn notify(&self, event: RegistryEvent) {
        let _guard = self.dispatch_lock.lock().await;

        let server = match T::parse_heartbeat(&event.data) {
            Ok(server) => server,
            Err(e) => {
                warn!("无法解析心跳数据, 忽略事件: {:?}, 错误: {}", event, e);
                return;
            }
        };

        let result = catch_unwind(AssertUnwindSafe(|| self.dispatch(event.event_type, server)));
        if result.is_err() {
            error!("notify event failed: {:?}", event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::master_clusters::MasterClusters;
    use scheduler_domain::entities::MasterServerMetadata;

    fn heartbeat(host: &str, status: &str) -> String {
        format!(
            r#"{{"host":"{host}","port":5678,"cpuUsage":0.1,"memoryUsage":0.2,"serverStatus":"{status}"}}"#
        )
    }

    #[tokio::test]
    async fn test_events_are_applied_in_order() {
        let clusters = Arc::new(MasterClusters::new());
        let adapter = ClusterSubscriptionAdapter::<MasterServerMetadata>::new(clusters.clone());

        adapter
            .notify(RegistryEvent::new("/nodes/master", EventType::Add, heartbeat("10.0.0.1", "NORMAL")))
            .await;
        adapter
            .notify(RegistryEvent::new("/nodes/master", EventType::Add, heartbeat("10.0.0.2", "NORMAL")))
            .await;
        adapter
            .notify(RegistryEvent::new("/nodes/master", EventType::Update, heartbeat("10.0.0.2", "BUSY")))
            .await;
        adapter
            .notify(RegistryEvent::new("/nodes/master", EventType::Remove, heartbeat("10.0.0.1", "NORMAL")))
            .await;

        let servers = clusters.get_servers();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].address, "10.0.0.2:5678");
        assert!(clusters.get_normal_servers().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_dropped() {
        let clusters = Arc::new(MasterClusters::new());
        let adapter = ClusterSubscriptionAdapter::<MasterServerMetadata>::new(clusters.clone());

        adapter
            .notify(RegistryEvent::new("/nodes/master", EventType::Add, "{broken"))
            .await;
        adapter
            .notify(RegistryEvent::new("/nodes/master", EventType::Add, heartbeat("10.0.0.1", "NORMAL")))
            .await;

        assert_eq!(clusters.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_event_type_is_ignored() {
        let clusters = Arc::new(MasterClusters::new());
        let adapter = ClusterSubscriptionAdapter::<MasterServerMetadata>::new(clusters.clone());

        adapter
            .notify(RegistryEvent::new("/nodes/master", EventType::Unknown, heartbeat("10.0.0.1", "NORMAL")))
            .await;

        assert!(clusters.is_empty());
    }
}
