use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use tracing::{info, warn};

use scheduler_domain::entities::{MasterServerMetadata, ServerMetadata};

use crate::cluster::{ClusterCallbacks, MasterClusters};

/// 当前Master的槽位与槽位总数，两者作为一个整体发布
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSnapshot {
    pub current_slot: i32,
    pub total_slots: i32,
}

impl SlotSnapshot {
    pub const INVALID: SlotSnapshot = SlotSnapshot {
        current_slot: -1,
        total_slots: 0,
    };

    pub fn is_valid(&self) -> bool {
        self.total_slots > 0 && self.current_slot >= 0
    }
}

/// 根据健康Master集合计算当前Master的槽位
///
/// 槽位是当前节点在按地址排序的健康Master列表中的下标，
/// 任何Master的增减都会改变所有节点的槽位，因此每次集群变更都需要重新计算。
pub struct MasterSlotManager {
    self_address: String,
    snapshot: ArcSwap<SlotSnapshot>,
}

impl MasterSlotManager {
    pub fn new<S: Into<String>>(self_address: S) -> Self {
        Self {
            self_address: self_address.into(),
            snapshot: ArcSwap::from_pointee(SlotSnapshot::INVALID),
        }
    }

    /// 创建槽位管理器并注册到Master集群，集群任意变更都会触发重新计算
    pub fn register(self_address: impl Into<String>, master_clusters: &Arc<MasterClusters>) -> Arc<Self> {
        let slot_manager = Arc::new(Self::new(self_address));

        let clusters: Weak<MasterClusters> = Arc::downgrade(master_clusters);
        let manager = Arc::clone(&slot_manager);
        master_clusters.register_listener(Arc::new(ClusterCallbacks::new().on_any_change(
            move |_: &MasterServerMetadata| {
                if let Some(clusters) = clusters.upgrade() {
                    manager.do_re_balance(&clusters.get_normal_servers());
                }
            },
        )));

        slot_manager
    }

    pub fn self_address(&self) -> &str {
        &self.self_address
    }

    /// 当前槽位，不在健康Master集合中时为 -1
    pub fn get_current_master_slot(&self) -> i32 {
        self.snapshot.load().current_slot
    }

    pub fn get_total_master_slots(&self) -> i32 {
        self.snapshot.load().total_slots
    }

    pub fn get_slot_snapshot(&self) -> SlotSnapshot {
        **self.snapshot.load()
    }

    pub fn check_slot_valid(&self) -> bool {
        self.get_slot_snapshot().is_valid()
    }

    /// 按槽位分片判断某个工作流实例是否归当前Master负责
    pub fn is_slot_owner(&self, workflow_instance_id: i64) -> bool {
        let snapshot = self.get_slot_snapshot();
        if !snapshot.is_valid() {
            return false;
        }
        workflow_instance_id.rem_euclid(snapshot.total_slots as i64) == snapshot.current_slot as i64
    }

    pub fn do_re_balance(&self, normal_master_servers: &[MasterServerMetadata]) {
        let mut addresses: Vec<&str> = normal_master_servers
            .iter()
            .map(|server| server.address())
            .collect();
        addresses.sort_unstable();
        addresses.dedup();

        let total_slots = addresses.len() as i32;
        let previous = self.get_slot_snapshot();

        let current_slot = match addresses
            .iter()
            .position(|address| *address == self.self_address)
        {
            Some(index) => index as i32,
            None => {
                warn!(
                    "当前Master {} 不在健康Master列表中, 暂停处理需要槽位的任务, 健康Master: {:?}",
                    self.self_address, addresses
                );
                -1
            }
        };

        let next = SlotSnapshot {
            current_slot,
            total_slots,
        };
        if next == previous {
            return;
        }

        self.snapshot.store(Arc::new(next));
        metrics::counter!("master_slot_rebalance_total").increment(1);
        info!(
            "Master槽位变更: {}/{} -> {}/{}",
            previous.current_slot, previous.total_slots, next.current_slot, next.total_slots
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ServerChangeHandler;
    use scheduler_domain::entities::ServerStatus;

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
    fn test_invalid_after_construction() {
        let manager = MasterSlotManager::new("10.0.0.1:5678");
        assert!(!manager.check_slot_valid());
        assert_eq!(manager.get_current_master_slot(), -1);
        assert_eq!(manager.get_total_master_slots(), 0);
    }

    #[test]
    fn test_slot_follows_sorted_address_order() {
        let manager = MasterSlotManager::new("10.0.0.2:5678");
        manager.do_re_balance(&[
            master("10.0.0.3:5678", ServerStatus::Normal),
            master("10.0.0.1:5678", ServerStatus::Normal),
            master("10.0.0.2:5678", ServerStatus::Normal),
        ]);

        assert_eq!(manager.get_total_master_slots(), 3);
        assert_eq!(manager.get_current_master_slot(), 1);
        assert!(manager.check_slot_valid());
    }

    #[test]
    fn test_absent_self_invalidates_slot() {
        let manager = MasterSlotManager::new("10.0.0.9:5678");
        manager.do_re_balance(&[master("10.0.0.1:5678", ServerStatus::Normal)]);

        assert_eq!(manager.get_current_master_slot(), -1);
        assert!(!manager.check_slot_valid());
    }

    #[test]
    fn test_absent_self_reports_latest_total() {
        let manager = MasterSlotManager::new("10.0.0.2:5678");
        manager.do_re_balance(&[
            master("10.0.0.1:5678", ServerStatus::Normal),
            master("10.0.0.2:5678", ServerStatus::Normal),
            master("10.0.0.3:5678", ServerStatus::Normal),
        ]);
        assert_eq!(manager.get_total_master_slots(), 3);

        manager.do_re_balance(&[master("10.0.0.1:5678", ServerStatus::Normal)]);
        assert_eq!(manager.get_current_master_slot(), -1);
        assert_eq!(manager.get_total_master_slots(), 1);
        assert!(!manager.check_slot_valid());
        assert!(!manager.is_slot_owner(0));
    }

    #[test]
    fn test_rebalance_on_cluster_changes() {
        let clusters = Arc::new(MasterClusters::new());
        let manager = MasterSlotManager::register("10.0.0.2:5678", &clusters);

        clusters.on_server_added(master("10.0.0.1:5678", ServerStatus::Normal));
        clusters.on_server_added(master("10.0.0.2:5678", ServerStatus::Normal));
        clusters.on_server_added(master("10.0.0.3:5678", ServerStatus::Normal));
        clusters.on_server_added(master("10.0.0.4:5678", ServerStatus::Busy));

        assert_eq!(manager.get_total_master_slots(), 3);
        let slot = manager.get_current_master_slot();
        assert!((0..=2).contains(&slot));

        clusters.on_server_remove(master("10.0.0.3:5678", ServerStatus::Normal));
        assert_eq!(manager.get_total_master_slots(), 2);
        assert!(manager.check_slot_valid());
    }

    #[test]
    fn test_is_slot_owner() {
        let manager = MasterSlotManager::new("10.0.0.1:5678");
        assert!(!manager.is_slot_owner(10));

        manager.do_re_balance(&[
            master("10.0.0.1:5678", ServerStatus::Normal),
            master("10.0.0.2:5678", ServerStatus::Normal),
        ]);
        assert!(manager.is_slot_owner(10));
        assert!(!manager.is_slot_owner(11));
    }
}
