use scheduler_domain::entities::MasterServerMetadata;

use super::clusters::Clusters;

pub type MasterClusters = Clusters<MasterServerMetadata>;

impl MasterClusters {
    pub fn new() -> Self {
        Clusters::with_role("master")
    }
}

impl Default for MasterClusters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{clusters::ServerChangeHandler, listener::ClusterChangeListener};
    use scheduler_domain::entities::ServerStatus;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingListener {
        events: Mutex<Vec<(String, String)>>,
    }

    impl ClusterChangeListener<MasterServerMetadata> for RecordingListener {
        fn on_server_added(&self, server: &MasterServerMetadata) {
            self.events
                .lock()
                .unwrap()
                .push(("added".to_string(), server.address.clone()));
        }

        fn on_server_removed(&self, server: &MasterServerMetadata) {
            self.events
                .lock()
                .unwrap()
                .push(("removed".to_string(), server.address.clone()));
        }

        fn on_server_updated(&self, server: &MasterServerMetadata) {
            self.events
                .lock()
                .unwrap()
                .push(("updated".to_string(), server.address.clone()));
        }
    }

    fn master(address: &str, status: ServerStatus) -> MasterServerMetadata {
        MasterServerMetadata {
            address: address.to_string(),
            cpu_usage: 0.1,
            memory_usage: 0.1,
            server_status: status,
            startup_time: 0,
        }
    }

    #[test]
    fn test_listener_receives_each_event_once() {
        let clusters = MasterClusters::new();
        let listener = Arc::new(RecordingListener::default());
        clusters.register_listener(listener.clone());

        let server = master("10.0.0.1:5678", ServerStatus::Normal);
        clusters.on_server_added(server.clone());
        clusters.on_server_update(server.clone());
        clusters.on_server_remove(server);

        let events = listener.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                ("added".to_string(), "10.0.0.1:5678".to_string()),
                ("updated".to_string(), "10.0.0.1:5678".to_string()),
                ("removed".to_string(), "10.0.0.1:5678".to_string()),
            ]
        );
    }

    #[test]
    fn test_normal_servers_subset() {
        let clusters = MasterClusters::new();
        clusters.on_server_added(master("10.0.0.3:5678", ServerStatus::Normal));
        clusters.on_server_added(master("10.0.0.1:5678", ServerStatus::Busy));
        clusters.on_server_added(master("10.0.0.2:5678", ServerStatus::Abnormal));

        let all = clusters.get_servers();
        let normal = clusters.get_normal_servers();

        assert_eq!(all.len(), 3);
        assert_eq!(normal.len(), 1);
        assert!(normal.iter().all(|s| all.contains(s) && s.server_status.is_normal()));
        // 快照按地址排序
        assert_eq!(all[0].address, "10.0.0.1:5678");
    }
}
